use std::cell::RefCell;

/// Tag attached to a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Append-only status display with a 0–100 progress indicator.
///
/// Methods take `&self`: the sink is shared between the running operations
/// and the step callback, all on one thread.
pub trait StatusSink {
    fn append(&self, text: &str, severity: Severity);

    fn set_progress(&self, percent: u8);

    /// Everything appended so far, one entry per line.
    fn content(&self) -> String;

    fn log(&self, text: &str) {
        self.append(text, Severity::Info);
    }

    /// One-shot user notice. Terminal front ends show it as a warning.
    fn notice(&self, text: &str) {
        self.append(text, Severity::Warning);
    }
}

/// Progress percentage for `completed` of `total` steps.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed.min(total) * 100) / total) as u8
}

/// Collects status lines in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: RefCell<Vec<(Severity, String)>>,
    progress: RefCell<u8>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.borrow().clone()
    }

    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|(_, line)| line.contains(needle))
    }
}

impl StatusSink for BufferSink {
    fn append(&self, text: &str, severity: Severity) {
        self.lines.borrow_mut().push((severity, text.to_string()));
    }

    fn set_progress(&self, percent: u8) {
        *self.progress.borrow_mut() = percent.min(100);
    }

    fn content(&self) -> String {
        let lines = self.lines.borrow();
        let mut out = String::new();
        for (_, line) in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
