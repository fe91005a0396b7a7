use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SOURCE_EXTENSION: &str = "java";

/// Java sources under `root`, sorted by path.
pub fn find_source_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}
