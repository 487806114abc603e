//! Text rendering for student summaries and score charts.

use gradebook_core::{title_case, StudentSnapshot};
use std::collections::BTreeMap;

/// Width of a full-score bar, in characters.
pub const CHART_WIDTH: usize = 40;
const BAR_CHAR: char = '#';

/// Multi-line summary: name, age, subjects and average to two decimals.
pub fn summary_text(student: &StudentSnapshot) -> String {
    let mut summary = format!(
        "Name: {}\nAge: {}\nSubjects and Scores:\n",
        student.display_name, student.record.age()
    );
    for (subject, score) in student.record.subjects() {
        summary.push_str(&format!("  {}: {score}\n", title_case(subject)));
    }
    summary.push_str(&format!("Average Score: {:.2}", student.average()));
    summary
}

/// Horizontal bar chart of subject scores scaled to `score_max`.
///
/// Returns no lines when there are no subjects.
pub fn bar_chart(subjects: &BTreeMap<String, u32>, score_max: u32, width: usize) -> Vec<String> {
    let labels: Vec<String> = subjects.keys().map(|subject| title_case(subject)).collect();
    let label_width = labels
        .iter()
        .map(|label| label.chars().count())
        .max()
        .unwrap_or(0);

    labels
        .iter()
        .zip(subjects.values())
        .map(|(label, score)| {
            let bar = bar_length(*score, score_max, width);
            format!(
                "{label:<label_width$} | {}{} {score}",
                BAR_CHAR.to_string().repeat(bar),
                " ".repeat(width - bar)
            )
        })
        .collect()
}

fn bar_length(score: u32, score_max: u32, width: usize) -> usize {
    if score_max == 0 {
        return width;
    }
    let scaled = (f64::from(score.min(score_max)) / f64::from(score_max) * width as f64).round();
    (scaled as usize).min(width)
}
