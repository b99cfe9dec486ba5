//! MDF Loading
//!
//! Reads MDF YAML from files, directories, URLs or in-memory text, rejects
//! duplicate mapping keys and duplicate list elements, and deep-merges
//! multi-file models into one document.
//!
//! Loading is configured per call through [`LoaderConfig`]; nothing here
//! keeps process-wide state.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

use crate::checksum::SourceDigest;
use crate::error::{MdfError, Result};
use crate::mdf::convert::scalar_string;

/// Configuration for MDF loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Reject a list that holds the same string twice
    #[serde(default = "default_true")]
    pub reject_duplicate_elements: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            reject_duplicate_elements: true,
        }
    }
}

/// Where one piece of an MDF model comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdfSource {
    /// A single YAML file
    Path(PathBuf),
    /// Every `*.yml`/`*.yaml` file below a directory, in path order
    Directory(PathBuf),
    /// `file://`, `http://` or `https://` URL
    Url(String),
    /// YAML already in memory
    Text { name: String, content: String },
}

impl MdfSource {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Classify a command-line style argument
    pub fn parse(arg: &str) -> Self {
        if is_url(arg) {
            Self::Url(arg.to_string())
        } else if Path::new(arg).is_dir() {
            Self::Directory(PathBuf::from(arg))
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }
}

impl From<&str> for MdfSource {
    fn from(arg: &str) -> Self {
        Self::parse(arg)
    }
}

impl From<&Path> for MdfSource {
    fn from(path: &Path) -> Self {
        if path.is_dir() {
            Self::Directory(path.to_path_buf())
        } else {
            Self::Path(path.to_path_buf())
        }
    }
}

impl fmt::Display for MdfSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) | Self::Directory(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
            Self::Text { name, .. } => write!(f, "{}", name),
        }
    }
}

/// True for strings that look like `file://`, `http://` or `https://` URLs
pub fn is_url(s: &str) -> bool {
    s.starts_with("file://") || s.starts_with("http://") || s.starts_with("https://")
}

/// Retrieves the text behind a URL
pub trait Fetch {
    fn fetch(&self, url: &Url) -> Result<String>;
}

/// Serves `file://` URLs from the local filesystem
///
/// HTTP(S) URLs need a caller-supplied [`Fetch`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

impl Fetch for LocalFetcher {
    fn fetch(&self, url: &Url) -> Result<String> {
        if url.scheme() != "file" {
            return Err(MdfError::Fetch {
                url: url.to_string(),
                reason: format!("no fetcher configured for scheme '{}'", url.scheme()),
            });
        }
        let path = url.to_file_path().map_err(|_| MdfError::Fetch {
            url: url.to_string(),
            reason: "not a local file path".to_string(),
        })?;
        fs::read_to_string(&path).map_err(|e| MdfError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Rewrite a GitHub `blob` page URL to the raw file URL; other URLs pass through
pub fn convert_github_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    if url.host_str() != Some("github.com") {
        return Ok(url);
    }
    let parts: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    if parts.len() < 4 || parts[2] != "blob" {
        return Ok(url);
    }
    let (user, repo, branch) = (parts[0], parts[1], parts[3]);
    let file_path = parts[4..].join("/");
    Ok(Url::parse(&format!(
        "https://raw.githubusercontent.com/{}/{}/{}/{}",
        user, repo, branch, file_path
    ))?)
}

/// One parsed YAML document and where it came from
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub digest: SourceDigest,
    pub value: Value,
}

/// The merged result of loading every source of a model
#[derive(Debug, Clone)]
pub struct LoadedMdf {
    pub mdf: Mapping,
    pub digests: Vec<SourceDigest>,
}

/// Loads and merges MDF YAML
pub struct MdfLoader {
    config: LoaderConfig,
    fetcher: Box<dyn Fetch>,
}

impl Default for MdfLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl MdfLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            fetcher: Box::new(LocalFetcher),
        }
    }

    /// Use a different fetcher for URL sources
    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load all sources and deep-merge them, later sources overriding earlier
    pub fn load(&self, sources: &[MdfSource]) -> Result<LoadedMdf> {
        let documents = self.load_documents(sources)?;
        let mut merged = Value::Mapping(Mapping::new());
        let mut digests = Vec::with_capacity(documents.len());

        for doc in documents {
            match doc.value {
                Value::Mapping(_) => merge_yaml(&mut merged, doc.value),
                Value::Null => {}
                _ => {
                    return Err(MdfError::parse(
                        doc.digest.source,
                        "top level of an MDF document must be a mapping",
                    ))
                }
            }
            digests.push(doc.digest);
        }

        let mdf = match merged {
            Value::Mapping(mapping) => mapping,
            _ => Mapping::new(),
        };
        Ok(LoadedMdf { mdf, digests })
    }

    /// Load each source into its own document, without merging
    pub fn load_documents(&self, sources: &[MdfSource]) -> Result<Vec<LoadedDocument>> {
        let mut documents = Vec::new();
        for source in sources {
            match source {
                MdfSource::Path(path) => documents.push(self.load_file(path)?),
                MdfSource::Directory(dir) => {
                    for path in yaml_files(dir) {
                        documents.push(self.load_file(&path)?);
                    }
                }
                MdfSource::Url(url) => documents.push(self.load_url(url)?),
                MdfSource::Text { name, content } => documents.push(self.parse_document(name, content)?),
            }
        }
        Ok(documents)
    }

    pub fn load_file(&self, path: &Path) -> Result<LoadedDocument> {
        tracing::debug!(path = %path.display(), "loading MDF file");
        let content = fs::read_to_string(path)?;
        self.parse_document(&path.display().to_string(), &content)
    }

    pub fn load_url(&self, raw: &str) -> Result<LoadedDocument> {
        let url = convert_github_url(raw)?;
        tracing::debug!(url = %url, "fetching MDF");
        let content = self.fetcher.fetch(&url)?;
        self.parse_document(url.as_str(), &content)
    }

    /// Parse one YAML text, applying the duplicate checks
    pub fn parse_document(&self, name: &str, content: &str) -> Result<LoadedDocument> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|e| MdfError::parse(name, e.to_string()))?;
        if self.config.reject_duplicate_elements {
            check_duplicate_elements(&value).map_err(|msg| MdfError::parse(name, msg))?;
        }
        Ok(LoadedDocument {
            digest: SourceDigest::new(name, content),
            value,
        })
    }
}

/// YAML files below a directory, sorted by path
fn yaml_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| ext == "yml" || ext == "yaml")
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Find the first list anywhere in `value` that repeats a scalar element,
/// comparing scalars by their text form
fn check_duplicate_elements(value: &Value) -> std::result::Result<(), String> {
    match value {
        Value::Sequence(items) => {
            let mut seen = HashSet::new();
            for item in items {
                if let Some(text) = scalar_string(item) {
                    if !seen.insert(text.clone()) {
                        return Err(format!("found duplicated element ({})", text));
                    }
                }
                check_duplicate_elements(item)?;
            }
            Ok(())
        }
        Value::Mapping(mapping) => {
            for v in mapping.values() {
                check_duplicate_elements(v)?;
            }
            Ok(())
        }
        Value::Tagged(tagged) => check_duplicate_elements(&tagged.value),
        _ => Ok(()),
    }
}

/// Merge `overlay` into `base`: mappings merge key by key, everything else is replaced
pub fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                let nested = value.is_mapping()
                    && base_map.get(&key).map(Value::is_mapping).unwrap_or(false);
                if !nested {
                    base_map.insert(key, value);
                } else if let Some(existing) = base_map.get_mut(&key) {
                    merge_yaml(existing, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
