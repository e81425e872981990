// File discovery - audio and labeled-example files under a directory

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use walkdir::WalkDir;

use crate::error::PipelineError;

/// Extensions accepted as audio input
pub const AUDIO_EXTENSIONS: &[&str] = &["wav"];

/// Extension of labeled-example files written by preprocessing
pub const EXAMPLE_EXTENSION: &str = "mfc";

/// Find files under `root` whose extension matches one of `extensions`
///
/// # Arguments
/// * `root` - Directory to search
/// * `extensions` - Lowercase extensions without the dot; matching ignores case
/// * `recurse` - Descend into subdirectories instead of listing `root` only
///
/// # Returns
/// Matching paths in file-name order. Unreadable entries are logged and
/// skipped.
///
/// # Errors
/// `MalformedInput` if `root` is not a directory.
pub fn discover_files<P: AsRef<Path>>(
    root: P,
    extensions: &[&str],
    recurse: bool,
) -> Result<Vec<PathBuf>, PipelineError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(PipelineError::malformed(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let files: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(if recurse { usize::MAX } else { 1 })
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| {
            entry
                .map_err(|err| {
                    tracing::warn!("[Discovery] Error reading directory entry: {}", err);
                    err
                })
                .ok()
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
                .is_some_and(|ext| extensions.contains(&ext.as_str()))
        })
        .map(|entry| entry.into_path())
        .collect();

    tracing::info!(
        "[Discovery] Found {} {:?} files in {}",
        files.len(),
        extensions,
        root.display()
    );
    Ok(files)
}

/// Shuffle `files` and keep at most `n` of them
pub fn select_random<R: Rng + ?Sized>(mut files: Vec<PathBuf>, n: usize, rng: &mut R) -> Vec<PathBuf> {
    files.shuffle(rng);
    files.truncate(n);
    files
}
