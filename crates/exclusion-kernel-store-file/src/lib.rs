use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use exclusion_kernel_core::{ContentProvider, ProviderError, RawRuleSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Extensions tried, in order, when resolving an asset name to a file.
const ASSET_EXTENSIONS: [(&str, AssetFormat); 3] =
    [("json", AssetFormat::Json), ("yaml", AssetFormat::Yaml), ("yml", AssetFormat::Yaml)];

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset name is not a relative content path: {0:?}")]
    InvalidName(String),
    #[error("asset {asset} not found under {root}")]
    NotFound { asset: String, root: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8: {source}")]
    Utf8 {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl AssetError {
    fn into_provider_error(self, asset: &str) -> ProviderError {
        match self {
            Self::NotFound { .. } => ProviderError::NotFound(asset.to_string()),
            Self::Io { .. } => {
                ProviderError::Io { asset: asset.to_string(), message: self.to_string() }
            }
            Self::InvalidName(_) | Self::Utf8 { .. } | Self::Json { .. } | Self::Yaml { .. } => {
                ProviderError::Malformed { asset: asset.to_string(), message: self.to_string() }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AssetFormat {
    Json,
    Yaml,
}

impl AssetFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Provenance of the most recent successful load of one asset.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AssetInfo {
    pub asset: String,
    pub path: PathBuf,
    pub format: AssetFormat,
    pub source_hash: String,
    pub entries: usize,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct LoadedAsset {
    info: AssetInfo,
    stamp: FileStamp,
    raw: RawRuleSet,
}

/// Serves assets from files under a content root: asset `Data/Foo` is read
/// from `Data/Foo.json`, `Data/Foo.yaml` or `Data/Foo.yml`.
///
/// A loaded asset is reused until its file changes size or modification time,
/// or until it is invalidated.
#[derive(Debug)]
pub struct AssetDirectory {
    root: PathBuf,
    loaded: RefCell<BTreeMap<String, LoadedAsset>>,
    reads: Cell<u64>,
}

impl AssetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), loaded: RefCell::new(BTreeMap::new()), reads: Cell::new(0) }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the file backing `asset`.
    ///
    /// # Errors
    /// Returns [`AssetError::InvalidName`] for names that escape the content
    /// root and [`AssetError::NotFound`] when no candidate file exists.
    pub fn resolve(&self, asset: &str) -> Result<(PathBuf, AssetFormat), AssetError> {
        let mut base = self.root.clone();
        for segment in asset_segments(asset)? {
            base.push(segment);
        }

        for (extension, format) in ASSET_EXTENSIONS {
            let candidate = base.with_extension(extension);
            if candidate.is_file() {
                return Ok((candidate, format));
            }
        }

        Err(AssetError::NotFound { asset: asset.to_string(), root: self.root.clone() })
    }

    /// Provenance of the last successful load of `asset`, if any.
    #[must_use]
    pub fn info(&self, asset: &str) -> Option<AssetInfo> {
        self.loaded.borrow().get(asset).map(|loaded| loaded.info.clone())
    }

    /// Number of times a file was actually read from disk.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.get()
    }

    fn load(&self, asset: &str) -> Result<RawRuleSet, AssetError> {
        let (path, format) = self.resolve(asset)?;
        let stamp = file_stamp(&path)?;

        if let Some(loaded) = self.loaded.borrow().get(asset) {
            if loaded.info.path == path && loaded.stamp == stamp && stamp.modified.is_some() {
                return Ok(loaded.raw.clone());
            }
        }

        let bytes =
            fs::read(&path).map_err(|source| AssetError::Io { path: path.clone(), source })?;
        self.reads.set(self.reads.get() + 1);
        let raw = decode(&bytes, format, &path)?;
        let info = AssetInfo {
            asset: asset.to_string(),
            path,
            format,
            source_hash: source_hash(&bytes),
            entries: raw.len(),
        };

        tracing::debug!(
            target: "exclusions",
            asset,
            path = %info.path.display(),
            source_hash = %info.source_hash,
            entries = info.entries,
            "loaded exclusion asset"
        );

        self.loaded
            .borrow_mut()
            .insert(asset.to_string(), LoadedAsset { info, stamp, raw: raw.clone() });
        Ok(raw)
    }
}

impl ContentProvider for AssetDirectory {
    fn fetch(&self, asset: &str) -> Result<RawRuleSet, ProviderError> {
        self.load(asset).map_err(|err| err.into_provider_error(asset))
    }

    fn invalidate(&self, asset: &str) {
        self.loaded.borrow_mut().remove(asset);
    }
}

fn asset_segments(asset: &str) -> Result<Vec<&str>, AssetError> {
    let segments = asset.split('/').collect::<Vec<_>>();
    let valid = !asset.trim().is_empty()
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && *segment != "."
                && *segment != ".."
                && !segment.contains(['\\', ':'])
        });
    if valid {
        Ok(segments)
    } else {
        Err(AssetError::InvalidName(asset.to_string()))
    }
}

fn file_stamp(path: &Path) -> Result<FileStamp, AssetError> {
    let metadata =
        fs::metadata(path).map_err(|source| AssetError::Io { path: path.to_path_buf(), source })?;
    Ok(FileStamp { modified: metadata.modified().ok(), len: metadata.len() })
}

fn decode(bytes: &[u8], format: AssetFormat, path: &Path) -> Result<RawRuleSet, AssetError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|source| AssetError::Utf8 { path: path.to_path_buf(), source })?;
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Ok(RawRuleSet::new());
    }

    match format {
        AssetFormat::Json => serde_json::from_str(text)
            .map_err(|source| AssetError::Json { path: path.to_path_buf(), source }),
        AssetFormat::Yaml => serde_yaml::from_str(text)
            .map_err(|source| AssetError::Yaml { path: path.to_path_buf(), source }),
    }
}

/// `sha256:<hex>` digest of the asset bytes.
#[must_use]
pub fn source_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("sha256:{digest:x}")
}
