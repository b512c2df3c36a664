//! In-memory archive tree shared by every format.
//!

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::error::{Error, FileNotFoundError, Result};

/// Separator used between segments of an archive path
pub const PATH_SEPARATOR: char = '/';

/// A file stored in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    name: String,
    data: Vec<u8>,
}

impl ArchiveFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Name of the file (a single path segment)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contents of the file
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the file, in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Part of the name after the first `.`, which is how the games tell resource types apart
    /// (`chr_sonic.skl.hkx` has the extension `skl.hkx`)
    pub fn extension(&self) -> &str {
        self.name.split_once('.').map_or("", |(_, ext)| ext)
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// A directory stored in an archive
///
/// Children keep the order they were added in. Full paths are rebuilt while walking the tree, so a
/// directory holds no reference to its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveDirectory {
    name: String,
    entries: Vec<ArchiveEntry>,
}

impl ArchiveDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entries(name: impl Into<String>, entries: Vec<ArchiveEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<ArchiveEntry> {
        &mut self.entries
    }
}

/// A node of the archive tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    File(ArchiveFile),
    Directory(ArchiveDirectory),
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        match self {
            ArchiveEntry::File(file) => file.name(),
            ArchiveEntry::Directory(dir) => dir.name(),
        }
    }

    pub fn as_file(&self) -> Option<&ArchiveFile> {
        match self {
            ArchiveEntry::File(file) => Some(file),
            ArchiveEntry::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&ArchiveDirectory> {
        match self {
            ArchiveEntry::File(_) => None,
            ArchiveEntry::Directory(dir) => Some(dir),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ArchiveEntry::Directory(_))
    }
}

impl From<ArchiveFile> for ArchiveEntry {
    fn from(value: ArchiveFile) -> Self {
        ArchiveEntry::File(value)
    }
}

impl From<ArchiveDirectory> for ArchiveEntry {
    fn from(value: ArchiveDirectory) -> Self {
        ArchiveEntry::Directory(value)
    }
}

impl PartialOrd for ArchiveEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArchiveEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }
}

/// A file found while walking an archive, together with its full path
#[derive(Debug, Clone)]
pub struct ArchiveFileRef<'a> {
    /// Path from the archive root, segments joined with [`PATH_SEPARATOR`]
    pub path: String,
    /// The file itself
    pub file: &'a ArchiveFile,
}

/// An archive loaded into memory
///
/// ```
/// use hedge_archive::Archive;
///
/// let mut archive = Archive::new();
/// archive.add_file("Stage/ghz200.ar", b"...".to_vec()).unwrap();
/// archive.add_file("readme.txt", b"hi".to_vec()).unwrap();
///
/// let files: Vec<_> = archive.files(true).into_iter().map(|f| f.path).collect();
/// assert_eq!(files, ["Stage/ghz200.ar", "readme.txt"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    saved: bool,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<ArchiveEntry>) -> Self {
        Self {
            entries,
            saved: false,
        }
    }

    /// Entries at the root of the archive
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ArchiveEntry> {
        self.entries
    }

    /// Mutable access to the root entries; marks the archive as changed
    pub fn entries_mut(&mut self) -> &mut Vec<ArchiveEntry> {
        self.saved = false;
        &mut self.entries
    }

    /// Whether the archive is unchanged since it was last written
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub(crate) fn mark_saved(&mut self) {
        self.saved = true;
    }

    /// Number of files in the archive, including those in directories
    pub fn len(&self) -> usize {
        self.files(true).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add an entry to the root of the archive
    pub fn push(&mut self, entry: impl Into<ArchiveEntry>) {
        self.saved = false;
        self.entries.push(entry.into());
    }

    /// Add a file at `path`, creating missing directories and replacing a file of the same path
    pub fn add_file(&mut self, path: &str, data: Vec<u8>) -> Result<()> {
        let (parent, name) = match path.rsplit_once(PATH_SEPARATOR) {
            Some((parent, name)) => (Some(parent), name),
            None => (None, path),
        };
        if name.is_empty() {
            return Err(Error::CustomError(format!("invalid file path {path}")));
        }

        let entries = match parent {
            Some(parent) => self.directory_entries_mut(parent)?,
            None => &mut self.entries,
        };

        let file = ArchiveEntry::File(ArchiveFile::new(name, data));
        match entries.iter_mut().find(|e| e.name() == name) {
            Some(existing @ ArchiveEntry::File(_)) => *existing = file,
            Some(ArchiveEntry::Directory(_)) => {
                return Err(Error::CustomError(format!("{path} is a directory")));
            }
            None => entries.push(file),
        }

        self.saved = false;
        Ok(())
    }

    /// Create the directory at `path` (and its parents) if it does not exist yet
    pub fn add_directory_entry(&mut self, path: &str) -> Result<()> {
        self.directory_entries_mut(path)?;
        self.saved = false;
        Ok(())
    }

    /// Import the contents of a directory on disk into the root of the archive
    ///
    /// With `recursive` sub directories become directory entries, otherwise only the files directly
    /// inside `input` are added.
    #[instrument(skip(self, input), fields(input = %input.as_ref().display()), err)]
    pub fn add_directory(&mut self, input: impl AsRef<Path>, recursive: bool) -> Result<()> {
        let input = input.as_ref();
        let walker = WalkDir::new(input)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| Error::CustomError(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(input)
                .map_err(|e| Error::CustomError(e.to_string()))?;
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join(&PATH_SEPARATOR.to_string());

            if entry.file_type().is_dir() {
                self.add_directory_entry(&path)?;
            } else if entry.file_type().is_file() {
                debug!("adding {path}");
                self.add_file(&path, fs::read(entry.path())?)?;
            }
        }

        Ok(())
    }

    /// Look up an entry by its full path
    pub fn find(&self, path: &str) -> Option<&ArchiveEntry> {
        let mut entries = &self.entries;
        let mut segments = path.split(PATH_SEPARATOR).peekable();
        while let Some(segment) = segments.next() {
            let entry = entries.iter().find(|e| e.name() == segment)?;
            if segments.peek().is_none() {
                return Some(entry);
            }
            entries = &entry.as_directory()?.entries;
        }
        None
    }

    /// Look up a file by its full path
    pub fn file(&self, path: &str) -> Result<&ArchiveFile> {
        self.find(path)
            .and_then(ArchiveEntry::as_file)
            .ok_or_else(|| FileNotFoundError::Name(path.to_owned()).into())
    }

    /// Remove the entry at `path`, returning it
    pub fn remove(&mut self, path: &str) -> Option<ArchiveEntry> {
        let (parent, name) = match path.rsplit_once(PATH_SEPARATOR) {
            Some((parent, name)) => (Some(parent), name),
            None => (None, path),
        };

        let entries = match parent {
            Some(parent) => self.existing_directory_entries_mut(parent)?,
            None => &mut self.entries,
        };
        let index = entries.iter().position(|e| e.name() == name)?;
        let removed = entries.remove(index);

        self.saved = false;
        Some(removed)
    }

    /// Order every level of the tree by name
    pub fn sort(&mut self) {
        fn sort_entries(entries: &mut [ArchiveEntry]) {
            entries.sort();
            for entry in entries {
                if let ArchiveEntry::Directory(dir) = entry {
                    sort_entries(&mut dir.entries);
                }
            }
        }

        sort_entries(&mut self.entries);
        self.saved = false;
    }

    /// Files of the archive with their full paths, in tree order
    ///
    /// Without `recursive` only files at the root are returned.
    pub fn files(&self, recursive: bool) -> Vec<ArchiveFileRef<'_>> {
        fn collect<'a>(
            entries: &'a [ArchiveEntry],
            prefix: &str,
            recursive: bool,
            out: &mut Vec<ArchiveFileRef<'a>>,
        ) {
            for entry in entries {
                let path = if prefix.is_empty() {
                    entry.name().to_owned()
                } else {
                    format!("{prefix}{PATH_SEPARATOR}{}", entry.name())
                };
                match entry {
                    ArchiveEntry::File(file) => out.push(ArchiveFileRef { path, file }),
                    ArchiveEntry::Directory(dir) if recursive => {
                        collect(&dir.entries, &path, recursive, out)
                    }
                    ArchiveEntry::Directory(_) => {}
                }
            }
        }

        let mut files = Vec::new();
        collect(&self.entries, "", recursive, &mut files);
        files
    }

    /// Write every entry below `output`, recreating the directory tree
    ///
    /// Existing files are overwritten.
    #[instrument(skip(self, output), fields(output = %output.as_ref().display()), err)]
    pub fn extract(&self, output: impl AsRef<Path>) -> Result<()> {
        fn extract_entries(entries: &[ArchiveEntry], dir: &Path) -> Result<()> {
            fs::create_dir_all(dir)?;
            for entry in entries {
                let name = entry.name();
                if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                    return Err(Error::Integrity(format!(
                        "refusing to extract entry named {name:?}"
                    )));
                }

                let path = dir.join(name);
                match entry {
                    ArchiveEntry::File(file) => {
                        debug!("writing {}", path.display());
                        fs::write(&path, file.data())?;
                    }
                    ArchiveEntry::Directory(sub) => extract_entries(&sub.entries, &path)?,
                }
            }
            Ok(())
        }

        extract_entries(&self.entries, output.as_ref())
    }

    fn directory_entries_mut(&mut self, path: &str) -> Result<&mut Vec<ArchiveEntry>> {
        let mut entries = &mut self.entries;
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            let index = match entries.iter().position(|e| e.name() == segment) {
                Some(index) => index,
                None => {
                    entries.push(ArchiveDirectory::new(segment).into());
                    entries.len() - 1
                }
            };
            entries = match &mut entries[index] {
                ArchiveEntry::Directory(dir) => &mut dir.entries,
                ArchiveEntry::File(_) => {
                    return Err(Error::CustomError(format!("{segment} in {path} is a file")));
                }
            };
        }
        Ok(entries)
    }

    fn existing_directory_entries_mut(&mut self, path: &str) -> Option<&mut Vec<ArchiveEntry>> {
        let mut entries = &mut self.entries;
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            entries = match entries.iter_mut().find(|e| e.name() == segment)? {
                ArchiveEntry::Directory(dir) => &mut dir.entries,
                ArchiveEntry::File(_) => return None,
            };
        }
        Some(entries)
    }
}
