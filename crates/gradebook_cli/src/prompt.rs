//! Presentation collaborator used by the menu loop.
//!
//! # Invariants
//! - End of input and cancellation both surface as `None`.
//! - Output failures are logged, never propagated into gradebook flows.

use log::warn;
use std::fmt::Arguments;
use std::io::{BufRead, Stdout, Write};

/// Input/output capability consumed by the menu flows.
pub trait Prompter {
    /// Asks for one line of text; `None` when input is closed or cancelled.
    fn prompt_text(&mut self, label: &str) -> Option<String>;
    /// Asks for one of `options`; returns its index, `None` when cancelled.
    fn prompt_choice(&mut self, label: &str, options: &[&str]) -> Option<usize>;
    fn show_message(&mut self, text: &str);
    fn show_list(&mut self, title: &str, items: &[String]);
}

/// Line-oriented prompter over any reader/writer pair.
pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompter<std::io::StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn emit(&mut self, args: Arguments<'_>) {
        let result = self
            .output
            .write_fmt(args)
            .and_then(|()| self.output.flush());
        if let Err(err) = result {
            warn!("event=console_write module=cli status=error error={}", err);
        }
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn prompt_text(&mut self, label: &str) -> Option<String> {
        self.emit(format_args!("{label} "));
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                warn!("event=console_read module=cli status=error error={}", err);
                None
            }
        }
    }

    fn prompt_choice(&mut self, label: &str, options: &[&str]) -> Option<usize> {
        loop {
            self.emit(format_args!("\n{label}\n"));
            for (index, option) in options.iter().enumerate() {
                self.emit(format_args!("{}. {option}\n", index + 1));
            }
            let answer = self.prompt_text(&format!("Enter your choice (1-{}):", options.len()))?;
            let answer = answer.trim();

            let by_number = answer
                .parse::<usize>()
                .ok()
                .filter(|number| (1..=options.len()).contains(number))
                .map(|number| number - 1);
            let by_label = || {
                options
                    .iter()
                    .position(|option| option.eq_ignore_ascii_case(answer))
            };
            match by_number.or_else(by_label) {
                Some(index) => return Some(index),
                None => self.show_message("Invalid choice. Please try again."),
            }
        }
    }

    fn show_message(&mut self, text: &str) {
        self.emit(format_args!("{text}\n"));
    }

    fn show_list(&mut self, title: &str, items: &[String]) {
        self.emit(format_args!("{title}\n"));
        for item in items {
            self.emit(format_args!("  {item}\n"));
        }
    }
}
