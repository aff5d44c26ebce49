//! Plugin manifest types.
//!
//! A manifest lists the module sources that make up a plugin and the sandbox
//! policy the engine applies to it. Manifests can be built in code, parsed
//! from JSON or TOML, or loaded from disk. Before a manifest reaches the
//! engine it is serialized to the engine's JSON schema (inline bytes as
//! base64) and decoded on the other side.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BindingError, BindingResult};

/// Identity shared by every module source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMeta {
    /// Expected SHA-256 hex digest of the module bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Module name. The module named `main` (or the last one) is the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Where a module's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleSource {
    /// Bytes supplied inline. Serialized as base64.
    Data {
        /// Raw module bytes.
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        /// Hash and name.
        #[serde(flatten)]
        meta: ModuleMeta,
    },
    /// A module file on disk, read by the engine.
    File {
        /// Path to the `.wasm` file.
        path: PathBuf,
        /// Hash and name.
        #[serde(flatten)]
        meta: ModuleMeta,
    },
    /// A module fetched over HTTP by the engine.
    Url {
        /// Module URL.
        url: String,
        /// Request headers.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
        /// HTTP method, `GET` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        /// Hash and name.
        #[serde(flatten)]
        meta: ModuleMeta,
    },
}

impl ModuleSource {
    /// Inline module bytes.
    #[must_use]
    pub fn data(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Data {
            data: bytes.into(),
            meta: ModuleMeta::default(),
        }
    }

    /// A module file the engine reads at instantiation.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            meta: ModuleMeta::default(),
        }
    }

    /// A module the engine downloads at instantiation.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url {
            url: url.into(),
            headers: BTreeMap::new(),
            method: None,
            meta: ModuleMeta::default(),
        }
    }

    /// Load a module from disk.
    ///
    /// `.wat` text is compiled to binary here and inlined, named after the
    /// file stem. Any other file becomes a [`ModuleSource::File`].
    ///
    /// # Errors
    ///
    /// Returns an error if a text module cannot be read or compiled.
    pub fn from_path(path: impl AsRef<Path>) -> BindingResult<Self> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext == "wat") {
            let text = std::fs::read_to_string(path)?;
            let bytes = wat::parse_str(&text).map_err(|e| BindingError::InvalidModuleText {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            let mut source = Self::data(bytes);
            if let Some(stem) = path.file_stem() {
                source = source.with_name(stem.to_string_lossy());
            }
            return Ok(source);
        }
        Ok(Self::file(path))
    }

    /// Declare the expected SHA-256 hex digest.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.meta_mut().hash = Some(hash.into());
        self
    }

    /// Name the module.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.meta_mut().name = Some(name.into());
        self
    }

    /// Add a request header. No effect on non-URL sources.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Url { headers, .. } = &mut self {
            headers.insert(key.into(), value.into());
        }
        self
    }

    /// Set the request method. No effect on non-URL sources.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        if let Self::Url { method: m, .. } = &mut self {
            *m = Some(method.into());
        }
        self
    }

    /// Hash and name of this source.
    #[must_use]
    pub fn meta(&self) -> &ModuleMeta {
        match self {
            Self::Data { meta, .. } | Self::File { meta, .. } | Self::Url { meta, .. } => meta,
        }
    }

    fn meta_mut(&mut self) -> &mut ModuleMeta {
        match self {
            Self::Data { meta, .. } | Self::File { meta, .. } | Self::Url { meta, .. } => meta,
        }
    }

    /// Human-readable label for diagnostics.
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(name) = &self.meta().name {
            return name.clone();
        }
        match self {
            Self::Data { .. } => "<inline>".to_string(),
            Self::File { path, .. } => path.display().to_string(),
            Self::Url { url, .. } => url.clone(),
        }
    }

    /// Check the declared hash against the module bytes.
    ///
    /// URL sources are only checked by the engine after download.
    fn verify(&self) -> BindingResult<()> {
        let Some(expected) = self.meta().hash.as_deref() else {
            return Ok(());
        };
        let actual = match self {
            Self::Data { data, .. } => hex::encode(Sha256::digest(data)),
            Self::File { path, .. } => hex::encode(Sha256::digest(std::fs::read(path)?)),
            Self::Url { url, .. } => {
                tracing::debug!(%url, "integrity of remote module deferred to engine");
                return Ok(());
            },
        };
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(BindingError::IntegrityMismatch {
                module: self.label(),
                expected: expected.to_string(),
                actual,
            });
        }
        tracing::debug!(module = %self.label(), "module hash verified");
        Ok(())
    }

    fn resolve_relative(&mut self, base: &Path) {
        if let Self::File { path, .. } = self
            && path.is_relative()
        {
            *path = base.join(&*path);
        }
    }
}

/// Guest memory limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryOptions {
    /// Maximum linear memory, in 64 KiB pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    /// Maximum size of an HTTP response body the guest may read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_http_response_bytes: Option<u64>,
    /// Maximum total size of plugin variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_var_bytes: Option<u64>,
}

impl MemoryOptions {
    fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

/// A plugin manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Module sources. Must not be empty.
    #[serde(default)]
    pub wasm: Vec<ModuleSource>,
    /// Memory limits.
    #[serde(default, skip_serializing_if = "MemoryOptions::is_unset")]
    pub memory: MemoryOptions,
    /// Configuration visible to the guest.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    /// Hosts the guest may reach over HTTP. Glob patterns are allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_hosts: Vec<String>,
    /// Host directories mapped into the guest, host path to guest path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allowed_paths: BTreeMap<String, PathBuf>,
    /// Per-call time limit in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Manifest {
    /// A manifest with the given modules and default policy.
    #[must_use]
    pub fn new(wasm: impl IntoIterator<Item = ModuleSource>) -> Self {
        Self {
            wasm: wasm.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Append a module source.
    #[must_use]
    pub fn with_module(mut self, source: ModuleSource) -> Self {
        self.wasm.push(source);
        self
    }

    /// Cap linear memory at `pages` 64 KiB pages.
    #[must_use]
    pub fn with_memory_max(mut self, pages: u32) -> Self {
        self.memory.max_pages = Some(pages);
        self
    }

    /// Cap HTTP response bodies read by the guest.
    #[must_use]
    pub fn with_http_response_max(mut self, bytes: u64) -> Self {
        self.memory.max_http_response_bytes = Some(bytes);
        self
    }

    /// Cap plugin variable storage.
    #[must_use]
    pub fn with_var_max(mut self, bytes: u64) -> Self {
        self.memory.max_var_bytes = Some(bytes);
        self
    }

    /// Set one configuration key.
    #[must_use]
    pub fn with_config_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Merge configuration entries.
    #[must_use]
    pub fn with_config<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Allow HTTP requests to `host`.
    #[must_use]
    pub fn with_allowed_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.push(host.into());
        self
    }

    /// Map host directory `host` to `guest` inside the sandbox.
    #[must_use]
    pub fn with_allowed_path(mut self, host: impl Into<String>, guest: impl Into<PathBuf>) -> Self {
        self.allowed_paths.insert(host.into(), guest.into());
        self
    }

    /// Limit each call to `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Check structural requirements.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::EmptyManifest`] if no module is declared.
    pub fn validate(&self) -> BindingResult<()> {
        if self.wasm.is_empty() {
            return Err(BindingError::EmptyManifest);
        }
        Ok(())
    }

    /// Verify every declared hash of inline and file modules.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::IntegrityMismatch`] on the first mismatch, or
    /// an I/O error if a module file cannot be read.
    pub fn verify_integrity(&self) -> BindingResult<()> {
        self.wasm.iter().try_for_each(ModuleSource::verify)
    }

    /// Serialize to the JSON document the engine consumes.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::ManifestSerialization`] on failure.
    pub fn to_json(&self) -> BindingResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| BindingError::ManifestSerialization(e.to_string()))
    }

    /// Validate, verify and convert into the engine's manifest.
    pub(crate) fn to_engine(&self) -> BindingResult<extism::Manifest> {
        self.validate()?;
        self.verify_integrity()?;
        let json = self.to_json()?;
        serde_json::from_slice(&json).map_err(|e| BindingError::ManifestSerialization(e.to_string()))
    }

    /// Parse a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::ManifestParse`] if the document is invalid.
    pub fn from_json_str(s: &str) -> BindingResult<Self> {
        serde_json::from_str(s).map_err(|e| BindingError::ManifestParse {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Parse a TOML manifest.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::ManifestParse`] if the document is invalid.
    pub fn from_toml_str(s: &str) -> BindingResult<Self> {
        toml::from_str(s).map_err(|e| BindingError::ManifestParse {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Load a manifest file.
    ///
    /// `.json` and `.toml` are parsed as such; any other extension is tried
    /// as JSON, then TOML. Relative module paths resolve against the
    /// manifest's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> BindingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let parsed = match ext {
            "json" => Self::from_json_str(&text),
            "toml" => Self::from_toml_str(&text),
            _ => Self::from_json_str(&text).or_else(|_| Self::from_toml_str(&text)),
        };
        let mut manifest = parsed.map_err(|e| match e {
            BindingError::ManifestParse { message, .. } => BindingError::ManifestParse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        if let Some(base) = path.parent() {
            for source in &mut manifest.wasm {
                source.resolve_relative(base);
            }
        }
        tracing::debug!(path = %path.display(), modules = manifest.wasm.len(), "manifest loaded");
        Ok(manifest)
    }
}

impl From<Vec<u8>> for Manifest {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new([ModuleSource::data(bytes)])
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
