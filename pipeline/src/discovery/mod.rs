//! Transaction file discovery.
//!
//! Walks a directory tree and yields every regular file with a given extension.
//! The walk is lazy and visits entries in file-name order, so the same tree
//! always produces the same file list.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Lazily walk `root` for files ending in `.<extension>`.
///
/// The extension match is exact and case-sensitive. `root` may itself be a
/// single matching file.
pub fn discover<'a>(
    root: &'a Path,
    extension: &'a str,
) -> impl Iterator<Item = DiscoveryResult<PathBuf>> + 'a {
    let extension = extension.trim_start_matches('.');

    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                let matches = entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|e| e == extension);
                matches.then(|| Ok(entry.into_path()))
            }
            Err(source) => Some(Err(DiscoveryError::Walk {
                root: root.to_path_buf(),
                source,
            })),
        })
}

/// Collect [`discover`] into a list, failing if nothing matched.
pub fn resolve_paths(root: &Path, extension: &str) -> DiscoveryResult<Vec<PathBuf>> {
    let paths = discover(root, extension).collect::<DiscoveryResult<Vec<_>>>()?;

    if paths.is_empty() {
        return Err(DiscoveryError::NoFiles {
            root: root.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        });
    }
    Ok(paths)
}
