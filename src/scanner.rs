//! Scanner module - walks the media directory into a nested snapshot

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::models::{DirInfo, FileInfo, FileSnapshot};

/// Walk `root` without blocking the async runtime
///
/// The walk runs on the blocking pool; any inaccessible entry aborts the
/// whole scan.
pub async fn walk(root: &Path) -> Result<FileSnapshot, ScanError> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || walk_directory(&root))
        .await
        .map_err(|e| ScanError::io_error(None, format!("directory walk aborted: {}", e)))?
}

/// Recursively snapshot `root`, depth first
pub fn walk_directory(root: &Path) -> Result<FileSnapshot, ScanError> {
    let root_meta = std::fs::metadata(root).map_err(|e| ScanError::from_io(root, e))?;
    if !root_meta.is_dir() {
        return Err(ScanError::invalid_path(
            root.to_path_buf(),
            format!("Not a directory: {:?}", root),
        ));
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    // Open directories from the root down to the current one.
    let mut stack: Vec<DirInfo> = Vec::new();

    for entry in walker {
        let entry = entry?;
        let depth = entry.depth();

        while stack.len() > depth {
            close_directory(&mut stack);
        }

        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path().to_path_buf();

        if entry.file_type().is_dir() {
            stack.push(DirInfo {
                name,
                path,
                children: Default::default(),
            });
            continue;
        }

        if !entry.file_type().is_file() {
            log::debug!("Skipping special file {:?}", path);
            continue;
        }

        let metadata = entry.metadata()?;
        if let Some(parent) = stack.last_mut() {
            parent.children.insert(
                name.clone(),
                FileSnapshot::File(FileInfo {
                    name,
                    path,
                    size: metadata.len(),
                }),
            );
        }
    }

    while stack.len() > 1 {
        close_directory(&mut stack);
    }

    stack
        .pop()
        .map(FileSnapshot::Dir)
        .ok_or_else(|| ScanError::not_found(PathBuf::from(root)))
}

/// Pop the innermost open directory into its parent
fn close_directory(stack: &mut Vec<DirInfo>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(dir) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent
                .children
                .insert(dir.name.clone(), FileSnapshot::Dir(dir));
        }
    }
}
