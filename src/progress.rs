use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::sink::{BufferSink, Severity, StatusSink};

/// Controls how status output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress bar with status lines printed above it.
    Normal,
    /// Like Normal; the terminal tracing layer is also enabled.
    Verbose,
    /// Progress bar, only warnings and errors printed.
    Quiet,
    /// No ANSI, plain println output (for piped/non-TTY).
    Plain,
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Status sink that renders to the terminal.
///
/// Every line is also kept in an in-memory buffer so the boot log can be
/// stored after a run.
pub struct TerminalSink {
    bar: ProgressBar,
    mode: OutputMode,
    buffer: BufferSink,
}

impl TerminalSink {
    pub fn new(title: &str, mode: OutputMode) -> Self {
        let bar = if mode == OutputMode::Plain {
            ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(100)
        };
        bar.set_style(bar_style());
        bar.set_message(title.to_string());
        Self {
            bar,
            mode,
            buffer: BufferSink::new(),
        }
    }

    /// Remove the progress bar, keeping printed lines.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn print(&self, line: &str, severity: Severity) {
        // A hidden bar swallows println, so fall back to plain lines.
        if self.mode == OutputMode::Plain || self.bar.is_hidden() {
            match severity {
                Severity::Info => println!("{line}"),
                Severity::Warning => println!("warning: {line}"),
                Severity::Error => eprintln!("error: {line}"),
            }
            return;
        }

        let rendered = match severity {
            Severity::Info => line.to_string(),
            Severity::Warning => style(line).yellow().to_string(),
            Severity::Error => style(line).red().bold().to_string(),
        };
        self.bar.println(rendered);
    }
}

impl StatusSink for TerminalSink {
    fn append(&self, text: &str, severity: Severity) {
        self.buffer.append(text, severity);

        if self.mode == OutputMode::Quiet && severity == Severity::Info {
            return;
        }
        for line in text.lines() {
            self.print(line, severity);
        }
    }

    fn set_progress(&self, percent: u8) {
        let percent = percent.min(100);
        self.buffer.set_progress(percent);
        if self.mode == OutputMode::Plain {
            println!("[{percent:>3}%]");
        } else {
            self.bar.set_position(u64::from(percent));
        }
    }

    fn content(&self) -> String {
        self.buffer.content()
    }
}
