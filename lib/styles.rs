//! CLI styles for clap and terminal spinners.

use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A single-line spinner that resolves to a ✓ or ✗ line.
#[derive(Clone)]
pub struct Spinner {
    bar: ProgressBar,
    message: String,
    indent: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Spinner {
    /// Start a spinner with the default indent.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_indent(message, 2)
    }

    /// Start a spinner indented by `indent` spaces.
    pub fn with_indent(message: impl Into<String>, indent: usize) -> Self {
        let message = message.into();
        let bar = ProgressBar::new_spinner();
        let template = format!("{}{{spinner:.cyan}} {{msg}}", " ".repeat(indent));
        if let Ok(style) = ProgressStyle::default_spinner().template(&template) {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        bar.set_message(message.clone());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self {
            bar,
            message,
            indent,
        }
    }

    /// Print a line above the spinner without disturbing it.
    pub fn println(&self, line: impl AsRef<str>) {
        self.bar.println(line);
    }

    /// Finish with a success mark. `None` keeps the original message.
    pub fn succeed(&self, message: Option<&str>) {
        self.finish("✓".bright_green().to_string(), message);
    }

    /// Finish with a failure mark. `None` keeps the original message.
    pub fn fail(&self, message: Option<&str>) {
        self.finish("✗".bright_red().to_string(), message);
    }

    fn finish(&self, mark: String, message: Option<&str>) {
        self.bar.finish_and_clear();
        println!(
            "{}{} {}",
            " ".repeat(self.indent),
            mark,
            message.unwrap_or(&self.message)
        );
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

pub fn styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .usage(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
}
