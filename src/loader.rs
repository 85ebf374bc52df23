//! Markdown file discovery.
//!
//! Walks a directory tree lazily and yields every file whose extension is
//! `md`. Entries are visited in file-name order within each directory, so
//! the sequence is stable for an unchanged tree and reruns see the same
//! order.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};
use walkdir::WalkDir;

const MARKDOWN_EXTENSION: &str = "md";

/// Lazy iterator over the Markdown files under a root directory.
pub struct MarkdownFiles {
    walker: walkdir::IntoIter,
}

impl Iterator for MarkdownFiles {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if is_markdown(entry.path()) {
                trace!("Found markdown file {}", entry.path().display());
                return Some(entry.into_path());
            }
        }
    }
}

/// Start walking `root` for Markdown files.
///
/// # Errors
///
/// Returns the IO error for `root` itself when it does not exist or is not
/// a directory. Errors on entries below the root are logged and skipped.
pub fn markdown_files(root: &Path) -> io::Result<MarkdownFiles> {
    let metadata = std::fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        ));
    }

    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    Ok(MarkdownFiles { walker })
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == MARKDOWN_EXTENSION)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("guides/deep")).unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join("notes.txt"), "skip").unwrap();
        fs::write(root.join("README.MD"), "wrong case").unwrap();
        fs::write(root.join("guides/intro.md"), "intro").unwrap();
        fs::write(root.join("guides/deep/more.md"), "more").unwrap();
        fs::write(root.join("guides/deep/image.png"), "png").unwrap();
        tmp
    }

    fn relative(root: &Path, paths: Vec<PathBuf>) -> Vec<String> {
        paths
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_finds_markdown_recursively_in_sorted_order() {
        let tmp = tree();
        let files: Vec<PathBuf> = markdown_files(tmp.path()).unwrap().collect();
        assert_eq!(
            relative(tmp.path(), files),
            vec!["a.md", "b.md", "guides/deep/more.md", "guides/intro.md"]
        );
    }

    #[test]
    fn test_rerun_yields_same_sequence() {
        let tmp = tree();
        let first: Vec<PathBuf> = markdown_files(tmp.path()).unwrap().collect();
        let second: Vec<PathBuf> = markdown_files(tmp.path()).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = markdown_files(&tmp.path().join("nope")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(markdown_files(tmp.path()).unwrap().count(), 0);
    }
}
