// registry.rs — Built-in signature registry
//
// Maps built-in names to their compiled `ParameterSpecList`. Format text is
// parsed once; identical text shares one `Arc` through the intern cache, so
// every call site of a built-in reuses the same list.
//
// Signature files hold one `name: format` pair per line. Blank lines and
// lines starting with `#` are skipped.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::error::GrammarError;
use crate::spec::{ParameterSpec, ParameterSpecList};

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },
    #[error("signature '{name}': {source}")]
    Format {
        name: String,
        #[source]
        source: GrammarError,
    },
    #[error("duplicate signature '{name}'")]
    Duplicate { name: String },
}

// ── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Signature {
    format: String,
    spec: Arc<ParameterSpecList>,
    origin: Option<PathBuf>,
}

/// Named signatures plus the parse-once cache.
#[derive(Debug, Default)]
pub struct Registry {
    signatures: BTreeMap<String, Signature>,
    interned: HashMap<String, Arc<ParameterSpecList>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled list for `format`, parsed on first use.
    pub fn intern(&mut self, format: &str) -> Result<Arc<ParameterSpecList>, GrammarError> {
        if let Some(spec) = self.interned.get(format) {
            return Ok(Arc::clone(spec));
        }
        let spec = Arc::new(ParameterSpecList::parse(format)?);
        debug!(format, params = spec.len(), "interned format");
        self.interned.insert(format.to_string(), Arc::clone(&spec));
        Ok(spec)
    }

    pub fn register(
        &mut self,
        name: &str,
        format: &str,
    ) -> Result<Arc<ParameterSpecList>, RegistryError> {
        self.insert(name, format, None)
    }

    fn insert(
        &mut self,
        name: &str,
        format: &str,
        origin: Option<&Path>,
    ) -> Result<Arc<ParameterSpecList>, RegistryError> {
        if self.signatures.contains_key(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
            });
        }
        let spec = self.intern(format).map_err(|source| RegistryError::Format {
            name: name.to_string(),
            source,
        })?;
        self.signatures.insert(
            name.to_string(),
            Signature {
                format: format.to_string(),
                spec: Arc::clone(&spec),
                origin: origin.map(Path::to_path_buf),
            },
        );
        Ok(spec)
    }

    /// Load a signature file. Returns the number of signatures added.
    pub fn load_signatures(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let source = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut count = 0;
        for (i, line) in source.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parse_error = |message: String| RegistryError::Parse {
                file: path.to_path_buf(),
                line: line_no,
                message,
            };
            let (name, format) = trimmed
                .split_once(':')
                .ok_or_else(|| parse_error("expected `name: format`".to_string()))?;
            let (name, format) = (name.trim(), format.trim());
            if !is_identifier(name) {
                return Err(parse_error(format!("invalid signature name '{name}'")));
            }
            match self.insert(name, format, Some(path)) {
                Err(RegistryError::Format { source, .. }) => {
                    return Err(parse_error(source.to_string()))
                }
                other => other?,
            };
            count += 1;
        }
        debug!(path = %path.display(), count, "loaded signatures");
        Ok(count)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ParameterSpecList>> {
        self.signatures.get(name).map(|s| Arc::clone(&s.spec))
    }

    /// File a signature was loaded from; `None` when registered in code.
    pub fn origin(&self, name: &str) -> Option<&Path> {
        self.signatures.get(name)?.origin.as_deref()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signatures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Every signature as pretty JSON, sorted by name.
    pub fn manifest_json(&self) -> serde_json::Result<String> {
        let entries: Vec<ManifestEntry<'_>> = self
            .signatures
            .iter()
            .map(|(name, s)| {
                let (min, max) = s.spec.arity();
                ManifestEntry {
                    name,
                    format: &s.format,
                    canonical: s.spec.to_string(),
                    arity: [min, max],
                    has_return: s.spec.has_return(),
                    params: s.spec.params(),
                }
            })
            .collect();
        serde_json::to_string_pretty(&entries)
    }
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    name: &'a str,
    format: &'a str,
    canonical: String,
    arity: [usize; 2],
    has_return: bool,
    params: &'a [ParameterSpec],
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
