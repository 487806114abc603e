//! Interactive menu loop.
//!
//! # Responsibility
//! - Collect raw input through a `Prompter` and call the gradebook service.
//! - Re-prompt where a field must eventually be valid (new student age,
//!   edited age, edited score); report and move on elsewhere.
//!
//! # Invariants
//! - Cancelled input never crashes a flow; it ends the current step.
//! - A save failure is reported and the user may retry; nothing is dropped.

use crate::journal::SummaryJournal;
use crate::prompt::Prompter;
use crate::render::{bar_chart, summary_text, CHART_WIDTH};
use gradebook_core::{
    canonical_subject, title_case, EntryIssue, GradebookService, RecordStore, ScoreEntry,
    ServiceError, StoreError, StudentKey, StudentListing, SubjectEdit,
};
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    AddOrUpdate,
    EditOrDelete,
    Search,
    ViewAll,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        Self::AddOrUpdate,
        Self::EditOrDelete,
        Self::Search,
        Self::ViewAll,
        Self::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::AddOrUpdate => "Add/Update Student",
            Self::EditOrDelete => "Edit/Delete Student",
            Self::Search => "Search Student",
            Self::ViewAll => "View All Students",
            Self::Exit => "Exit",
        }
    }
}

/// One interactive session over a service and a prompter.
pub struct Menu<'a, S: RecordStore, P: Prompter> {
    service: &'a mut GradebookService<S>,
    prompter: &'a mut P,
    journal: Option<&'a SummaryJournal>,
}

impl<'a, S: RecordStore, P: Prompter> Menu<'a, S, P> {
    pub fn new(
        service: &'a mut GradebookService<S>,
        prompter: &'a mut P,
        journal: Option<&'a SummaryJournal>,
    ) -> Self {
        Self {
            service,
            prompter,
            journal,
        }
    }

    /// Tells the user the stored gradebook could not be loaded.
    ///
    /// When no copy of the unreadable data exists, asks whether later saves
    /// may replace it; declining keeps this session unsaved.
    pub fn report_load_error(&mut self, err: &StoreError) {
        self.prompter.show_message(&format!(
            "Could not load the gradebook ({err}). Starting with an empty gradebook."
        ));
        if !self.service.is_overwrite_guarded() {
            return;
        }
        let choice = self.prompter.prompt_choice(
            "Saving would replace the unreadable data. What should happen to changes made now?",
            &["Keep them unsaved", "Save them over the old data"],
        );
        if choice == Some(1) {
            self.service.allow_overwrite();
            self.prompter.show_message("Changes will be saved.");
        } else {
            self.prompter
                .show_message("The old data will not be touched; changes stay unsaved.");
        }
    }

    /// Runs until Exit is chosen or input ends.
    pub fn run(&mut self) {
        let labels = MenuAction::ALL.map(MenuAction::label);
        loop {
            let action = self
                .prompter
                .prompt_choice("Student Gradebook Manager - choose an option:", &labels)
                .and_then(|index| MenuAction::ALL.get(index).copied())
                .unwrap_or(MenuAction::Exit);

            match action {
                MenuAction::AddOrUpdate => self.add_or_update(),
                MenuAction::EditOrDelete => self.edit_or_delete(),
                MenuAction::Search => self.search(),
                MenuAction::ViewAll => self.view_all(),
                MenuAction::Exit => {
                    self.exit();
                    return;
                }
            }
        }
    }

    fn add_or_update(&mut self) {
        let Some(name) = self.prompter.prompt_text("Enter student's name:") else {
            return;
        };
        if StudentKey::from_raw(&name).is_none() {
            self.prompter.show_message("Name cannot be blank.");
            return;
        }
        let policy = *self.service.policy();

        let age = if let Some(existing) = self.service.search_student(&name) {
            self.prompter.show_message(&format!(
                "Student {} already exists. You can add or update their scores.",
                existing.display_name
            ));
            None
        } else {
            let label = format!(
                "Enter student's age ({}-{}):",
                policy.age.min(),
                policy.age.max()
            );
            loop {
                let Some(raw) = self.prompter.prompt_text(&label) else {
                    self.prompter.show_message("Add cancelled.");
                    return;
                };
                match policy.validate_age(&raw) {
                    Ok(_) => break Some(raw),
                    Err(err) => self.prompter.show_message(&format!("Invalid age: {err}.")),
                }
            }
        };

        let mut entries = Vec::new();
        loop {
            let Some(subject) = self
                .prompter
                .prompt_text("Enter subject name (or leave blank to finish):")
                .filter(|raw| !raw.trim().is_empty())
            else {
                break;
            };
            let label = format!(
                "Enter score for {} ({}-{}):",
                title_case(&canonical_subject(&subject).unwrap_or_default()),
                policy.score.min(),
                policy.score.max()
            );
            let Some(score) = self.prompter.prompt_text(&label) else {
                break;
            };
            match policy.validate_score(&score) {
                Ok(_) => entries.push(ScoreEntry::new(subject, score)),
                Err(err) => self
                    .prompter
                    .show_message(&format!("Invalid score: {err}.")),
            }
        }

        match self
            .service
            .add_or_update_student(&name, age.as_deref(), entries)
        {
            Ok(report) => {
                self.show_issues(&report.rejected);
                self.prompter.show_message(&format!(
                    "Student {} updated successfully!",
                    report.student.display_name
                ));
                let summary = summary_text(&report.student);
                self.prompter.show_message(&summary);
                self.record_summary(&summary);
            }
            Err(ServiceError::Store(err)) => self.recover_from_save_failure(err),
            Err(err) => self.prompter.show_message(&err.to_string()),
        }
    }

    fn edit_or_delete(&mut self) {
        let Some(name) = self
            .prompter
            .prompt_text("Enter the student's name to edit:")
            .filter(|raw| !raw.trim().is_empty())
        else {
            return;
        };
        let Some(student) = self.service.search_student(&name) else {
            self.prompter
                .show_message(&format!("{} not found.", name.trim()));
            return;
        };
        let policy = *self.service.policy();

        let age_label = format!(
            "Current age is {}. Enter new age or leave blank:",
            student.record.age()
        );
        let new_age = loop {
            let raw = self
                .prompter
                .prompt_text(&age_label)
                .filter(|raw| !raw.trim().is_empty());
            let Some(raw) = raw else {
                self.prompter.show_message("Age not changed.");
                break None;
            };
            match policy.validate_age(&raw) {
                Ok(_) => break Some(raw),
                Err(err) => self.prompter.show_message(&format!("Invalid age: {err}.")),
            }
        };

        // Tracks the record as edited so far, so repeated subjects see
        // earlier deletions and overwrites.
        let mut working = student.record.clone();
        let mut edits = Vec::new();
        loop {
            let Some(subject) = self
                .prompter
                .prompt_text("Enter subject to edit or delete (or leave blank to finish):")
                .and_then(|raw| canonical_subject(&raw))
            else {
                break;
            };
            let Some(current) = working.score(&subject) else {
                self.prompter.show_message("Subject not found.");
                continue;
            };

            let score_label =
                format!("Current score is {current}. Enter new score or leave blank to delete:");
            loop {
                // End of input leaves the subject untouched.
                let Some(raw) = self.prompter.prompt_text(&score_label) else {
                    break;
                };
                if raw.trim().is_empty() {
                    working.remove_subject(&subject);
                    edits.push(SubjectEdit::delete(subject.clone()));
                    break;
                }
                match policy.validate_score(&raw) {
                    Ok(score) => {
                        working.set_score(subject.clone(), score);
                        edits.push(SubjectEdit::set(subject.clone(), raw));
                        break;
                    }
                    Err(err) => self
                        .prompter
                        .show_message(&format!("Invalid score: {err}.")),
                }
            }
        }

        match self
            .service
            .edit_student(&name, new_age.as_deref(), edits)
        {
            Ok(report) => {
                self.show_issues(&report.rejected);
                self.prompter.show_message(&format!(
                    "Student {} updated.",
                    report.student.display_name
                ));
            }
            Err(ServiceError::Store(err)) => self.recover_from_save_failure(err),
            Err(err) => self.prompter.show_message(&err.to_string()),
        }
    }

    fn search(&mut self) {
        let Some(name) = self
            .prompter
            .prompt_text("Enter the student's name to search:")
            .filter(|raw| !raw.trim().is_empty())
        else {
            return;
        };

        match self.service.search_student(&name) {
            Some(student) => {
                self.prompter.show_message(&summary_text(&student));
                let chart = bar_chart(
                    student.record.subjects(),
                    self.service.policy().score.max(),
                    CHART_WIDTH,
                );
                if !chart.is_empty() {
                    self.prompter
                        .show_list(&format!("{}'s Scores", student.display_name), &chart);
                }
            }
            None => self.prompter.show_message(&format!(
                "No summary found for student '{}'.",
                name.trim()
            )),
        }
    }

    fn view_all(&mut self) {
        match self.service.list_students() {
            StudentListing::Empty => self.prompter.show_message("No students in the gradebook."),
            StudentListing::Names(names) => self.prompter.show_list("All Students:", &names),
        }
    }

    fn exit(&mut self) {
        if self.service.is_dirty() {
            match self.service.flush() {
                Ok(()) => {}
                Err(ServiceError::Store(err)) => self.recover_from_save_failure(err),
                Err(err) => self.prompter.show_message(&err.to_string()),
            }
        }
        info!("event=menu_exit module=cli status=ok unsaved={}", self.service.is_dirty());
        self.prompter.show_message("Exiting the program. Goodbye!");
    }

    fn show_issues(&mut self, issues: &[EntryIssue]) {
        for issue in issues {
            self.prompter.show_message(&format!(
                "Skipped {}: {}.",
                title_case(&issue.subject),
                issue.error
            ));
        }
    }

    fn record_summary(&mut self, summary: &str) {
        let Some(journal) = self.journal else {
            return;
        };
        if let Err(err) = journal.append(summary) {
            warn!("event=journal_append module=cli status=error error={}", err);
            self.prompter
                .show_message(&format!("Could not write summary log: {err}"));
        }
    }

    fn recover_from_save_failure(&mut self, first: StoreError) {
        if matches!(first, StoreError::OverwriteRefused { .. }) {
            self.prompter
                .show_message(&format!("Not saved: {first}. Your changes are kept in memory."));
            return;
        }
        let mut error = first;
        loop {
            self.prompter.show_message(&format!(
                "Could not save the gradebook: {error}. Your changes are kept in memory."
            ));
            let retry = self
                .prompter
                .prompt_choice("Retry saving now?", &["Retry", "Continue without saving"]);
            if retry != Some(0) {
                return;
            }
            match self.service.flush() {
                Ok(()) => {
                    self.prompter.show_message("Gradebook saved.");
                    return;
                }
                Err(ServiceError::Store(err)) => error = err,
                Err(err) => {
                    self.prompter.show_message(&err.to_string());
                    return;
                }
            }
        }
    }
}
