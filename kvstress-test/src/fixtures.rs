//! Fixture files for document payloads.
//!
//! ```
//! use kvstress_test::fixtures::DocumentFile;
//!
//! let file = DocumentFile::with_lines(&["  {\"name\": ", "\"roadie\"}  "]);
//! assert!(file.path().exists());
//! ```

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// A temporary document source file, deleted when dropped.
#[derive(Debug)]
pub struct DocumentFile {
    file: NamedTempFile,
}

impl DocumentFile {
    /// Writes the given lines, each terminated by a newline, to a fresh temporary file.
    pub fn with_lines(lines: &[&str]) -> Self {
        let mut file = NamedTempFile::new().expect("failed to create document file");
        for line in lines {
            writeln!(file, "{line}").expect("failed to write document file");
        }
        file.flush().expect("failed to flush document file");
        Self { file }
    }

    /// Creates a file containing `size` bytes of a repeated ASCII pattern on a single line.
    pub fn with_size(size: usize) -> Self {
        let line: String = "abcdefghijklmnopqrstuvwxyz"
            .chars()
            .cycle()
            .take(size)
            .collect();
        Self::with_lines(&[&line])
    }

    /// Path of the file on disk.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
