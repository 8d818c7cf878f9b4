use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::FoldError;

/// Immediate child directory of a listing root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntryName {
    /// Directory name (last path component).
    pub name: String,
    /// Full path of the directory.
    pub path: PathBuf,
}

/// List the immediate child directories of `root` whose name starts with `prefix`.
///
/// Files are ignored. Results are sorted lexicographically by name, so
/// `fold_10` sorts before `fold_2`.
pub fn child_dirs_with_prefix(root: &Path, prefix: &str) -> Result<Vec<DirEntryName>, FoldError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            err.into_io_error()
                .map(FoldError::Io)
                .unwrap_or_else(|| FoldError::Io(std::io::Error::other("directory walk loop")))
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name.starts_with(prefix) {
            out.push(DirEntryName {
                name: name.to_string(),
                path: entry.path().to_path_buf(),
            });
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lists_matching_directories_in_lexicographic_order() {
        let temp = tempdir().unwrap();
        for name in ["fold_2", "fold_10", "fold_0", "other", "fold"] {
            fs::create_dir(temp.path().join(name)).unwrap();
        }
        fs::write(temp.path().join("fold.manifest.json"), "{}").unwrap();
        fs::create_dir_all(temp.path().join("fold_0").join("fold_nested")).unwrap();

        let names: Vec<String> = child_dirs_with_prefix(temp.path(), "fold")
            .unwrap()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["fold", "fold_0", "fold_10", "fold_2"]);
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let temp = tempdir().unwrap();
        assert!(matches!(
            child_dirs_with_prefix(&temp.path().join("absent"), "x"),
            Err(FoldError::Io(_))
        ));
    }
}
