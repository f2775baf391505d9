use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

pub type Span = std::ops::Range<usize>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Location of a declaration inside a loaded manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pos {
    pub file: FileId,
    pub span: Span,
}

impl Pos {
    pub fn new(file: FileId, span: Span) -> Self {
        Self { file, span }
    }

    /// Start of `file`, for problems that concern a whole manifest.
    pub fn file_start(file: FileId) -> Self {
        Self { file, span: 0..0 }
    }
}

#[derive(Clone, Debug)]
pub struct Spanned<T> {
    pub file: FileId,
    pub span: Span,
    pub value: T,
}

impl<T> Spanned<T> {
    pub fn pos(&self) -> Pos {
        Pos::new(self.file, self.span.clone())
    }
}

#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

/// Every manifest read while building one unit, plus the directories
/// searched for imported packages.
#[derive(Clone, Debug)]
pub struct SourceManager {
    manifests: Vec<SourceFile>,
    by_path: FxHashMap<PathBuf, FileId>,
    package_dirs: Vec<PathBuf>,
}

impl SourceManager {
    pub fn new(package_dirs: Vec<PathBuf>) -> Self {
        Self {
            manifests: Vec::new(),
            by_path: FxHashMap::default(),
            package_dirs,
        }
    }

    /// Directories searched for imports of the manifest `entry`: its own
    /// directory first, then the configured package directories.
    pub fn search_roots(&self, entry: FileId) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.package_dirs.len() + 1);
        if let Some(parent) = self.file(entry).path.parent() {
            roots.push(absolute_path(parent));
        }
        for dir in &self.package_dirs {
            let dir = absolute_path(dir);
            if !roots.contains(&dir) {
                roots.push(dir);
            }
        }
        roots
    }

    /// Reads a manifest from disk. A path that was already read returns the
    /// same id.
    pub fn load_path(&mut self, path: &Path) -> Result<FileId, std::io::Error> {
        let absolute = absolute_path(path);
        if let Some(id) = self.by_path.get(&absolute).copied() {
            return Ok(id);
        }

        let text = std::fs::read_to_string(path)?;
        Ok(self.insert(absolute, &text))
    }

    pub fn add_virtual_file(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> FileId {
        self.insert(path.into(), &text.into())
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.manifests[id.0 as usize]
    }

    pub fn files(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.manifests
            .iter()
            .enumerate()
            .map(|(idx, file)| (FileId(idx as u32), file))
    }

    fn insert(&mut self, path: PathBuf, text: &str) -> FileId {
        let id = FileId(self.manifests.len() as u32);
        self.by_path.insert(path.clone(), id);
        // Lines are the unit of the manifest grammar.
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        self.manifests.push(SourceFile { path, text });
        id
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}
