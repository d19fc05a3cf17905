//! File identifiers of the form `group/remote-filename`.

use std::fmt;
use std::str::FromStr;

use crate::protocol::GROUP_NAME_MAX_LEN;
use crate::{DfsError, Result};

/// Address of one stored file: its group plus the server-assigned filename.
///
/// The textual form joins the two with `/`. Splitting on the first `/`
/// always recovers exactly these parts; the filename itself may contain
/// further slashes (storage servers assign nested path names).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId {
    group: String,
    remote_filename: String,
}

impl FileId {
    /// Creates a file id from its parts.
    ///
    /// # Errors
    /// - `DfsError::InvalidFileId` - Empty group, group containing `/`, or
    ///   group longer than the fixed 16-byte field
    pub fn new(group: impl Into<String>, remote_filename: impl Into<String>) -> Result<Self> {
        let group = group.into();
        let remote_filename = remote_filename.into();
        if group.is_empty() || group.contains('/') || group.len() > GROUP_NAME_MAX_LEN {
            return Err(DfsError::InvalidFileId {
                id: format!("{group}/{remote_filename}"),
            });
        }
        Ok(Self {
            group,
            remote_filename,
        })
    }

    /// Group holding the file.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Server-assigned filename within the group.
    pub fn remote_filename(&self) -> &str {
        &self.remote_filename
    }
}

impl FromStr for FileId {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        let (group, remote_filename) = s.split_once('/').ok_or_else(|| DfsError::InvalidFileId {
            id: s.to_string(),
        })?;
        Self::new(group, remote_filename)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.remote_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_first_slash_only() {
        let id: FileId = "group1/M00/00/01/wKgBcFX0.jpg".parse().unwrap();
        assert_eq!(id.group(), "group1");
        assert_eq!(id.remote_filename(), "M00/00/01/wKgBcFX0.jpg");
        assert_eq!(id.to_string(), "group1/M00/00/01/wKgBcFX0.jpg");
    }

    #[test]
    fn test_rejects_missing_slash() {
        let result = "plain-name".parse::<FileId>();
        assert!(matches!(result, Err(DfsError::InvalidFileId { .. })));
    }

    #[test]
    fn test_rejects_oversized_group() {
        let result = FileId::new("group-name-well-past-sixteen", "file");
        assert!(matches!(result, Err(DfsError::InvalidFileId { .. })));
    }

    #[test]
    fn test_rejects_empty_group() {
        let result = "/just-a-filename".parse::<FileId>();
        assert!(matches!(result, Err(DfsError::InvalidFileId { .. })));
    }
}
