//! Discovery of archives stored across numbered files.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

/// Path of split part `index`: `base` followed by `.` and the index zero-padded to `digits`
pub fn split_path(base: impl AsRef<Path>, index: usize, digits: usize) -> PathBuf {
    let mut path = base.as_ref().as_os_str().to_owned();
    path.push(format!(".{index:0digits$}"));
    PathBuf::from(path)
}

/// Probe `base.0`, `base.1`, ... (zero-padded to `digits`) and return every part up to the first missing one
///
/// ```no_run
/// // with ghz200.pac.000 to ghz200.pac.004 on disk
/// let parts = hedge_archive::split::split_archives("ghz200.pac", 3);
/// assert_eq!(parts.len(), 5);
/// ```
#[instrument(skip(base), fields(base = %base.as_ref().display()))]
pub fn split_archives(base: impl AsRef<Path>, digits: usize) -> Vec<PathBuf> {
    let base = base.as_ref();
    let limit = 10usize.saturating_pow(digits as u32);

    let parts: Vec<_> = (0..limit)
        .map(|i| split_path(base, i, digits))
        .take_while(|path| path.is_file())
        .collect();

    debug!("found {} split parts", parts.len());
    parts
}

/// Strip a numeric split suffix of exactly `digits` digits, turning `name.ar.03` into `name.ar`
pub fn strip_split_suffix(path: impl AsRef<Path>, digits: usize) -> Option<PathBuf> {
    let path = path.as_ref();
    let extension = path.extension()?.to_str()?;
    if extension.len() == digits && extension.bytes().all(|b| b.is_ascii_digit()) {
        Some(path.with_extension(""))
    } else {
        None
    }
}
