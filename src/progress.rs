//! Rebuild and index progress reporting.
//!
//! Progress is emitted on **stderr** so stdout (the command tally) remains
//! parseable for scripts. Each update is one line: `done` of `total` weeks
//! or files finished for a task.

use std::io::Write;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Progress<'a> {
    pub task: &'a str,
    pub done: u64,
    pub total: u64,
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn report(self, progress: Progress<'_>) {
        if let Some(line) = self.render(&progress) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }

    fn render(self, p: &Progress<'_>) -> Option<String> {
        match self {
            ProgressMode::Off => None,
            ProgressMode::Human => Some(format!("{}  {} / {}", p.task, p.done, p.total)),
            ProgressMode::Json => serde_json::to_string(p).ok(),
        }
    }
}
