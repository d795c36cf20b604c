/// Caller-supplied logging hook for long-running operations.
///
/// There is no process-wide default: call sites that want progress output
/// receive an implementation explicitly (the CLI picks one from `-v`).
pub trait Log {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
}

/// Prints every message to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrLog;

impl Log for StderrLog {
    fn info(&self, msg: &str) {
        eprintln!("{msg}");
    }

    fn warn(&self, msg: &str) {
        eprintln!("warning: {msg}");
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuietLog;

impl Log for QuietLog {
    fn info(&self, _msg: &str) {}

    fn warn(&self, _msg: &str) {}
}
