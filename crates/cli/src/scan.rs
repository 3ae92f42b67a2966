use crate::workspace::to_workspace_path;
use anchormark_syntax::{find_markers, language_id_for_path, MARKER_TOKEN};
use ignore::WalkBuilder;
use log::{debug, info, warn};
use std::path::Path;

/// Files above this size are never opened
const MAX_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024;

/// Workspace-relative paths of files holding at least one marker comment (.gitignore aware)
pub fn marked_files(root: &Path) -> Vec<String> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true);

    let mut files = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }
        let path = entry.path();
        if let Ok(meta) = entry.metadata() {
            if meta.len() > MAX_FILE_SIZE_BYTES {
                debug!("Skipping large file {} ({} bytes)", path.display(), meta.len());
                continue;
            }
        }
        let Ok(text) = std::fs::read_to_string(path) else {
            debug!("Skipping unreadable or non-UTF-8 file {}", path.display());
            continue;
        };
        if !MARKER_TOKEN.is_match(&text) {
            continue;
        }
        match find_markers(&text, language_id_for_path(path)) {
            Ok(found) if !found.is_empty() => {
                if let Some(relative) = to_workspace_path(root, path) {
                    files.push(relative);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to scan {}: {e}", path.display()),
        }
    }

    files.sort();
    info!("Found {} files with markers", files.len());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marked_files_respects_comments_and_ignores() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".anchormark")).unwrap();
        std::fs::write(root.join("src/a.rs"), "fn a() {} // :ab12;\n").unwrap();
        std::fs::write(root.join("src/b.rs"), "let s = \":ab12;\";\n").unwrap();
        std::fs::write(root.join("c.py"), "x = 1  # :cd34;\n").unwrap();
        std::fs::write(root.join(".anchormark/state.json"), "// :ef56;").unwrap();

        assert_eq!(marked_files(root), vec!["c.py".to_string(), "src/a.rs".to_string()]);
    }
}
