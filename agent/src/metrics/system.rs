//! Directory listing with type classification

use std::fs::FileType;
use std::path::Path;

use crate::errors::AgentError;
use crate::protocol::{DirEntryRow, EntryKind};

fn classify(file_type: FileType) -> EntryKind {
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

/// List `path` (the current directory when absent), classifying each entry.
/// Entries that vanish or cannot be stat'ed mid-listing are kept with
/// unknown type rather than failing the listing.
pub fn collect(path: Option<&str>) -> Result<Vec<DirEntryRow>, AgentError> {
    let path = Path::new(path.unwrap_or("."));

    let entries = std::fs::read_dir(path)
        .map_err(|e| AgentError::Unavailable(format!("cannot list {}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let (kind, size_bytes) = match entry.metadata() {
            Ok(metadata) => (
                classify(metadata.file_type()),
                metadata.is_file().then(|| metadata.len()),
            ),
            Err(_) => (EntryKind::Other, None),
        };
        rows.push(DirEntryRow {
            name,
            kind,
            size_bytes,
        });
    }

    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_classifies_entries() {
        let dir = std::env::temp_dir().join(format!("vigil-system-test-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("subdir")).unwrap();
        std::fs::write(dir.join("data.txt"), b"hello").unwrap();

        let rows = collect(dir.to_str()).unwrap();

        let file = rows.iter().find(|row| row.name == "data.txt").unwrap();
        assert_eq!(file.kind, EntryKind::File);
        assert_eq!(file.size_bytes, Some(5));

        let subdir = rows.iter().find(|row| row.name == "subdir").unwrap();
        assert_eq!(subdir.kind, EntryKind::Directory);
        assert_eq!(subdir.size_bytes, None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_path_is_unavailable() {
        let err = collect(Some("/definitely/not/a/real/path")).unwrap_err();
        assert!(matches!(err, AgentError::Unavailable(_)));
    }
}
