//! Small text-file helpers for transcripts, notes, and prompt files.

use std::path::{Path, PathBuf};

/// Errors from reading or writing text files
#[derive(Debug)]
pub enum FileError {
    /// Failed to read a file
    Read { path: PathBuf, message: String },
    /// Failed to write a file
    Write { path: PathBuf, message: String },
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileError::Read { path, message } => {
                write!(f, "Failed to read {:?}: {}", path, message)
            }
            FileError::Write { path, message } => {
                write!(f, "Failed to write {:?}: {}", path, message)
            }
        }
    }
}

impl std::error::Error for FileError {}

/// Read a UTF-8 text file.
pub fn load_text(path: &Path) -> Result<String, FileError> {
    std::fs::read_to_string(path).map_err(|e| FileError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a text file, creating parent directories as needed.
pub fn save_text(text: &str, path: &Path) -> Result<(), FileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| FileError::Write {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }
    }
    std::fs::write(path, text).map_err(|e| FileError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Make sure a directory exists.
pub fn ensure_dir(path: &Path) -> Result<(), FileError> {
    std::fs::create_dir_all(path).map_err(|e| FileError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
