//! Source generation for compiled decode tables.
//!
//! A [`Backend`] renders a [`CompiledUnit`] into a set of in-memory
//! [`GeneratedFile`]s. Nothing touches the filesystem until every file of a
//! run has rendered; [`write_generated`] then stages them and renames them
//! into place.
//!
//! Two backends are provided:
//! - [`CppBackend`]: `opcode.h`, `opcode_strings.i`, `nonp_tables.i`, `protos.cpp`
//! - [`RustBackend`]: `opcode.rs`, `tables.rs`, `fields.rs`

mod cpp;
mod rust;

pub use cpp::CppBackend;
pub use rust::RustBackend;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::tablegen::CompiledUnit;

/// Errors raised while rendering or writing generated sources.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("unknown backend '{0}' (expected 'cpp' or 'rust')")]
    UnknownBackend(String),
    #[error("formatting failed: {0}")]
    Format(#[from] fmt::Error),
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// File name relative to the output directory
    pub name: String,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(name: impl Into<String>, contents: String) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }
}

/// A target language for the generated tables.
pub trait Backend {
    /// Short name used on the command line.
    fn name(&self) -> &'static str;

    /// Render every output file for a compiled unit.
    fn render(&self, unit: &CompiledUnit) -> Result<Vec<GeneratedFile>, EmitError>;
}

/// Available backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cpp,
    Rust,
}

impl BackendKind {
    /// Instantiate the backend. `namespace` only applies to C++ output.
    pub fn create(self, namespace: &str) -> Box<dyn Backend> {
        match self {
            BackendKind::Cpp => Box::new(CppBackend::new(namespace)),
            BackendKind::Rust => Box::new(RustBackend::new()),
        }
    }
}

impl FromStr for BackendKind {
    type Err = EmitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpp" | "c++" => Ok(BackendKind::Cpp),
            "rust" | "rs" => Ok(BackendKind::Rust),
            _ => Err(EmitError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cpp => write!(f, "cpp"),
            BackendKind::Rust => write!(f, "rust"),
        }
    }
}

/// Hex digits needed for a `width`-bit literal.
pub(crate) fn hex_digits(width: usize) -> usize {
    width.div_ceil(4).max(1)
}

/// Write rendered files into `dir`, creating it if needed.
///
/// Every file is first written to a `.tmp` sibling. Only when all of them
/// are on disk are they renamed into place, so a failed write leaves the
/// previous outputs untouched. Returns the paths written, in input order.
pub fn write_generated(dir: impl AsRef<Path>, files: &[GeneratedFile]) -> Result<Vec<PathBuf>, EmitError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|source| EmitError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.name);
        let tmp = temp_path(&path);
        if let Err(source) = std::fs::write(&tmp, &file.contents) {
            discard_staged(&staged);
            let _ = std::fs::remove_file(&tmp);
            return Err(EmitError::Io {
                path: tmp.display().to_string(),
                source,
            });
        }
        staged.push((tmp, path));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (i, (tmp, path)) in staged.iter().enumerate() {
        if let Err(source) = std::fs::rename(tmp, path) {
            discard_staged(&staged[i..]);
            return Err(EmitError::Io {
                path: path.display().to_string(),
                source,
            });
        }
        log::info!("Wrote {}", path.display());
        written.push(path.clone());
    }
    Ok(written)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        if let Err(e) = std::fs::remove_file(tmp) {
            log::warn!("Failed to remove {}: {}", tmp.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("cpp".parse::<BackendKind>().unwrap(), BackendKind::Cpp);
        assert_eq!("Rust".parse::<BackendKind>().unwrap(), BackendKind::Rust);
        assert!(matches!(
            "verilog".parse::<BackendKind>(),
            Err(EmitError::UnknownBackend(name)) if name == "verilog"
        ));
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(BackendKind::Cpp.create("hop56").name(), "cpp");
        assert_eq!(BackendKind::Rust.create("hop56").name(), "rust");
        assert_eq!(BackendKind::Rust.to_string(), "rust");
    }

    #[test]
    fn test_hex_digits() {
        assert_eq!(hex_digits(20), 5);
        assert_eq!(hex_digits(21), 6);
        assert_eq!(hex_digits(16), 4);
        assert_eq!(hex_digits(0), 1);
    }

    #[test]
    fn test_write_generated() {
        let dir = std::env::temp_dir().join(format!("decodegen-emit-{}", std::process::id()));
        let files = vec![
            GeneratedFile::new("a.txt", "alpha\n".to_string()),
            GeneratedFile::new("b.txt", "beta\n".to_string()),
        ];

        let written = write_generated(&dir, &files).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.join("b.txt")).unwrap(), "beta\n");
        assert!(!dir.join("a.txt.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_write_keeps_previous_outputs() {
        let dir = std::env::temp_dir().join(format!("decodegen-emit-fail-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.txt"), "old\n").unwrap();

        // The second file's parent directory doesn't exist, so its write fails
        let files = vec![
            GeneratedFile::new("a.txt", "new\n".to_string()),
            GeneratedFile::new("missing/b.txt", "beta\n".to_string()),
        ];
        let result = write_generated(&dir, &files);

        assert!(matches!(result, Err(EmitError::Io { .. })));
        assert_eq!(std::fs::read_to_string(dir.join("a.txt")).unwrap(), "old\n");
        assert!(!dir.join("a.txt.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
