//! Extension → converter dispatch table.
//!
//! The set of document kinds is closed ([`DocumentKind`]); the registry maps
//! each kind to an `Arc<dyn Transform>`. It is built once before a batch
//! starts and only read afterwards, so workers share it through an `Arc`
//! with no locking.
//!
//! Converters themselves are opaque: the batch only sees
//! `Ok(())` or a [`ConversionError`]. [`TransformRegistry::with_default_converters`]
//! wires up the usual external tools (`unstructured`, `pandoc`,
//! `ebook-convert`); tests and embedders register their own.

use crate::error::{ConversionError, ItemError};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;

/// A converter capability: read `src`, write the converted document to `dst`.
///
/// Called from blocking worker threads, possibly for many items at once, so
/// implementations must not rely on shared mutable state.
pub trait Transform: Send + Sync {
    fn transform(&self, src: &Path, dst: &Path) -> Result<(), ConversionError>;

    /// External programs this transform needs on `PATH`.
    fn required_tools(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F> Transform for F
where
    F: Fn(&Path, &Path) -> Result<(), ConversionError> + Send + Sync,
{
    fn transform(&self, src: &Path, dst: &Path) -> Result<(), ConversionError> {
        self(src, dst)
    }
}

/// Document types the conversion pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    Pdf,
    Epub,
    Doc,
    Docx,
    Txt,
    Mobi,
    Azw,
    Azw3,
    Lit,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 9] = [
        DocumentKind::Pdf,
        DocumentKind::Epub,
        DocumentKind::Doc,
        DocumentKind::Docx,
        DocumentKind::Txt,
        DocumentKind::Mobi,
        DocumentKind::Azw,
        DocumentKind::Azw3,
        DocumentKind::Lit,
    ];

    /// Lower-case extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Epub => "epub",
            DocumentKind::Doc => "doc",
            DocumentKind::Docx => "docx",
            DocumentKind::Txt => "txt",
            DocumentKind::Mobi => "mobi",
            DocumentKind::Azw => "azw",
            DocumentKind::Azw3 => "azw3",
            DocumentKind::Lit => "lit",
        }
    }

    /// Kind of the file at `path`, judged by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl FromStr for DocumentKind {
    type Err = ItemError;

    /// Case-insensitive, with or without a leading dot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim_start_matches('.').to_ascii_lowercase();
        DocumentKind::ALL
            .into_iter()
            .find(|k| k.extension() == needle)
            .ok_or_else(|| ItemError::NotFound {
                discriminator: s.to_string(),
            })
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// Immutable map from [`DocumentKind`] to converter.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<DocumentKind, Arc<dyn Transform>>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.transforms.keys().collect();
        kinds.sort();
        f.debug_struct("TransformRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl TransformRegistry {
    /// An empty registry; every lookup is `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock converter table.
    ///
    /// | Kind | Converter |
    /// |------|-----------|
    /// | pdf | `unstructured partition pdf` (chunked by title) |
    /// | epub, doc, docx | `pandoc -t markdown` |
    /// | txt | plain copy |
    /// | mobi, azw, azw3, lit | Calibre `ebook-convert` |
    pub fn with_default_converters() -> Self {
        let pandoc: Arc<dyn Transform> = Arc::new(CommandTransform::pandoc());
        let calibre: Arc<dyn Transform> = Arc::new(CommandTransform::ebook_convert());

        Self::new()
            .register(DocumentKind::Pdf, Arc::new(CommandTransform::unstructured_pdf()))
            .register(DocumentKind::Epub, Arc::clone(&pandoc))
            .register(DocumentKind::Doc, Arc::clone(&pandoc))
            .register(DocumentKind::Docx, pandoc)
            .register(DocumentKind::Txt, Arc::new(CopyTransform))
            .register(DocumentKind::Mobi, Arc::clone(&calibre))
            .register(DocumentKind::Azw, Arc::clone(&calibre))
            .register(DocumentKind::Azw3, Arc::clone(&calibre))
            .register(DocumentKind::Lit, calibre)
    }

    /// Add or replace the converter for `kind`.
    pub fn register(mut self, kind: DocumentKind, transform: Arc<dyn Transform>) -> Self {
        self.transforms.insert(kind, transform);
        self
    }

    /// Converter for a discriminator (file extension, case-insensitive).
    ///
    /// # Errors
    /// [`ItemError::NotFound`] when the extension is unknown or has no
    /// converter registered.
    pub fn lookup(&self, discriminator: &str) -> Result<Arc<dyn Transform>, ItemError> {
        let kind: DocumentKind = discriminator.parse()?;
        self.transforms
            .get(&kind)
            .cloned()
            .ok_or_else(|| ItemError::NotFound {
                discriminator: discriminator.to_string(),
            })
    }

    /// `true` if a converter is registered for the file's extension.
    pub fn handles(&self, path: &Path) -> bool {
        DocumentKind::from_path(path).is_some_and(|k| self.transforms.contains_key(&k))
    }

    pub fn kinds(&self) -> impl Iterator<Item = DocumentKind> + '_ {
        self.transforms.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Programs required by registered converters that are not on `PATH`.
    pub fn missing_tools(&self) -> Vec<String> {
        let required: BTreeSet<String> = self
            .transforms
            .values()
            .flat_map(|t| t.required_tools())
            .collect();
        required
            .into_iter()
            .filter(|tool| find_on_path(tool).is_none())
            .collect()
    }
}

// ── Built-in converters ──────────────────────────────────────────────────────

/// Copies the source byte-for-byte.
pub struct CopyTransform;

impl Transform for CopyTransform {
    fn transform(&self, src: &Path, dst: &Path) -> Result<(), ConversionError> {
        std::fs::copy(src, dst)?;
        Ok(())
    }
}

/// One argument of a [`CommandTransform`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Literal(String),
    Source,
    Destination,
}

/// Runs an external program; non-zero exit is a [`ConversionError::ToolFailed`]
/// carrying the program's stderr.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    program: String,
    args: Vec<Arg>,
}

impl CommandTransform {
    pub fn new(program: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `unstructured partition pdf <src> --output-file <dst> --output-format md --chunking_strategy by_title`
    pub fn unstructured_pdf() -> Self {
        Self::new(
            "unstructured",
            vec![
                lit("partition"),
                lit("pdf"),
                Arg::Source,
                lit("--output-file"),
                Arg::Destination,
                lit("--output-format"),
                lit("md"),
                lit("--chunking_strategy"),
                lit("by_title"),
            ],
        )
    }

    /// `pandoc <src> -t markdown -o <dst>`
    pub fn pandoc() -> Self {
        Self::new(
            "pandoc",
            vec![
                Arg::Source,
                lit("-t"),
                lit("markdown"),
                lit("-o"),
                Arg::Destination,
            ],
        )
    }

    /// `ebook-convert <src> <dst>`
    pub fn ebook_convert() -> Self {
        Self::new("ebook-convert", vec![Arg::Source, Arg::Destination])
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn build_args(&self, src: &Path, dst: &Path) -> Vec<std::ffi::OsString> {
        self.args
            .iter()
            .map(|a| match a {
                Arg::Literal(s) => s.into(),
                Arg::Source => src.as_os_str().to_owned(),
                Arg::Destination => dst.as_os_str().to_owned(),
            })
            .collect()
    }
}

fn lit(s: &str) -> Arg {
    Arg::Literal(s.to_string())
}

impl Transform for CommandTransform {
    fn transform(&self, src: &Path, dst: &Path) -> Result<(), ConversionError> {
        let output = Command::new(&self.program)
            .args(self.build_args(src, dst))
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ConversionError::ToolNotFound {
                    program: self.program.clone(),
                },
                _ => ConversionError::Io(format!("{}: {}", self.program, e)),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ConversionError::ToolFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn required_tools(&self) -> Vec<String> {
        vec![self.program.clone()]
    }
}

/// First executable named `program` on `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .flat_map(|dir| {
            let plain = dir.join(program);
            let exe = dir.join(format!("{program}{}", std::env::consts::EXE_SUFFIX));
            [plain, exe]
        })
        .find(|p| p.is_file())
}
