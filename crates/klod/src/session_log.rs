//! The session log file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use klod_core::SessionLog;
use klod_model::Message;

/// Appends every message of the conversation to a text file, one line
/// per message: `[<timestamp>] <ROLE>: <content>`.
///
/// The file and its parent directories are created on the first write.
#[derive(Clone, Debug)]
pub struct FileSessionLog {
    path: PathBuf,
}

impl FileSessionLog {
    /// Creates a log writing to `path`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the log file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionLog for FileSessionLog {
    fn append(&mut self, message: &Message) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file =
            OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(format_entry(Local::now(), message).as_bytes())
    }
}

/// Formats one log line, including the trailing line feed.
pub fn format_entry(timestamp: DateTime<Local>, message: &Message) -> String {
    format!(
        "[{}] {}: {}\n",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        message.role.as_str().to_uppercase(),
        message.content
    )
}
