//! Workflow configuration.
//!
//! Everything the workflow used to pick up from ambient state (shared volume
//! root, storage endpoint, credentials, sampling seed, job defaults) lives in
//! [`WorkflowConfig`] and is passed explicitly to each component.
//!
//! Configuration precedence, lowest first:
//! 1. Defaults
//! 2. Global config file (`~/.geotune/config.toml`)
//! 3. Local config file (`./.geotunerc`)
//! 4. Environment variables (`GEOTUNE_*`)
//! 5. CLI arguments (applied by the binary)

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_SHARED_ROOT: &str = "/opt/app-root/src/data/";
pub const DEFAULT_S3_ENDPOINT: &str = "https://s3.us-south.cloud-object-storage.appdomain.cloud";
pub const DEFAULT_S3_REGION: &str = "us-south";
pub const DEFAULT_SAMPLE_SEED: u64 = 17;
pub const DEFAULT_IMAGE: &str = "quay.io/bedwards-ibm/mmsegmentation-geo:latest";
pub const DEFAULT_CHECKPOINT: &str = "latest.pth";
pub const DEFAULT_BANDS: &str = "[2,1,0,3]";
pub const DEFAULT_TRAIN_MEMORY_MB: u32 = 26_000;
pub const DEFAULT_EVAL_MEMORY_MB: u32 = 8_000;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const ACCESS_KEY_SECRET_VAR: &str = "AWS_ACCESS_KEY_SECRET";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";

/// Resolved configuration handed to every component.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub shared_root: PathBuf,
    pub storage: StorageConfig,
    pub sample_seed: u64,
    pub jobs: JobDefaults,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    /// Filled from the environment only; never read from config files.
    pub credentials: Option<StorageCredentials>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl StorageCredentials {
    /// Read access-key credentials from the process environment.
    pub fn from_env() -> TrainingResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StorageCredentials::from_env`] but with an injectable lookup.
    ///
    /// The secret is taken from `AWS_ACCESS_KEY_SECRET`, falling back to the
    /// conventional `AWS_SECRET_ACCESS_KEY`.
    pub fn from_lookup<F>(lookup: F) -> TrainingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key_id = lookup(ACCESS_KEY_ID_VAR)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TrainingError::Config(format!("{ACCESS_KEY_ID_VAR} is not set")))?;
        let secret_access_key = lookup(ACCESS_KEY_SECRET_VAR)
            .filter(|v| !v.is_empty())
            .or_else(|| lookup(SECRET_ACCESS_KEY_VAR).filter(|v| !v.is_empty()))
            .ok_or_else(|| {
                TrainingError::Config(format!(
                    "neither {ACCESS_KEY_SECRET_VAR} nor {SECRET_ACCESS_KEY_VAR} is set"
                ))
            })?;
        Ok(Self { access_key_id, secret_access_key })
    }
}

/// Defaults for job submission, overridable per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefaults {
    pub image: String,
    pub num_gpus: u32,
    pub train_memory_mb: u32,
    pub eval_memory_mb: u32,
    pub checkpoint: String,
    pub bands: String,
    /// Overrides the namespace derived from the cluster context.
    pub namespace: Option<String>,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            num_gpus: 1,
            train_memory_mb: DEFAULT_TRAIN_MEMORY_MB,
            eval_memory_mb: DEFAULT_EVAL_MEMORY_MB,
            checkpoint: DEFAULT_CHECKPOINT.to_string(),
            bands: DEFAULT_BANDS.to_string(),
            namespace: None,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            shared_root: PathBuf::from(DEFAULT_SHARED_ROOT),
            storage: StorageConfig {
                endpoint: DEFAULT_S3_ENDPOINT.to_string(),
                region: DEFAULT_S3_REGION.to_string(),
                credentials: None,
            },
            sample_seed: DEFAULT_SAMPLE_SEED,
            jobs: JobDefaults::default(),
        }
    }
}

/// On-disk configuration file. Every field is optional; present values
/// override whatever was loaded before.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub shared_root: Option<PathBuf>,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
    #[serde(default)]
    pub sample_seed: Option<u64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub num_gpus: Option<u32>,
    #[serde(default)]
    pub train_memory_mb: Option<u32>,
    #[serde(default)]
    pub eval_memory_mb: Option<u32>,
    #[serde(default)]
    pub checkpoint: Option<String>,
    #[serde(default)]
    pub bands: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        if !path.exists() {
            return Err(TrainingError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| TrainingError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".geotune")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".geotunerc")
    }
}

impl WorkflowConfig {
    /// Discover and load configuration files, then apply `GEOTUNE_*`
    /// environment overrides. Missing or unreadable discovered files are
    /// skipped.
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();

        if let Ok(global) = ConfigFile::load_from_file(&ConfigFile::default_global_path()) {
            config.merge(&global);
        }
        if let Ok(local) = ConfigFile::load_from_file(&ConfigFile::default_local_path()) {
            config.merge(&local);
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration. An explicit path must exist and parse; without
    /// one, falls back to [`WorkflowConfig::discover_and_load`].
    pub fn load(explicit: Option<&Path>) -> TrainingResult<Self> {
        let Some(path) = explicit else {
            return Ok(Self::discover_and_load());
        };

        let mut config = Self::default();
        config.merge(&ConfigFile::load_from_file(path)?);
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Merge a config file into this one. Present values win.
    pub fn merge(&mut self, file: &ConfigFile) {
        if let Some(ref root) = file.shared_root {
            self.shared_root = root.clone();
        }
        if let Some(ref endpoint) = file.s3_endpoint {
            self.storage.endpoint = endpoint.clone();
        }
        if let Some(ref region) = file.s3_region {
            self.storage.region = region.clone();
        }
        if let Some(seed) = file.sample_seed {
            self.sample_seed = seed;
        }
        if let Some(ref image) = file.image {
            self.jobs.image = image.clone();
        }
        if let Some(gpus) = file.num_gpus {
            self.jobs.num_gpus = gpus;
        }
        if let Some(mb) = file.train_memory_mb {
            self.jobs.train_memory_mb = mb;
        }
        if let Some(mb) = file.eval_memory_mb {
            self.jobs.eval_memory_mb = mb;
        }
        if let Some(ref checkpoint) = file.checkpoint {
            self.jobs.checkpoint = checkpoint.clone();
        }
        if let Some(ref bands) = file.bands {
            self.jobs.bands = bands.clone();
        }
        if let Some(ref namespace) = file.namespace {
            self.jobs.namespace = Some(namespace.clone());
        }
    }

    /// Apply `GEOTUNE_SHARED_ROOT`, `GEOTUNE_S3_ENDPOINT`,
    /// `GEOTUNE_S3_REGION` and `GEOTUNE_NAMESPACE`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("GEOTUNE_SHARED_ROOT").filter(|v| !v.is_empty()) {
            self.shared_root = PathBuf::from(root);
        }
        if let Some(endpoint) = lookup("GEOTUNE_S3_ENDPOINT").filter(|v| !v.is_empty()) {
            self.storage.endpoint = endpoint;
        }
        if let Some(region) = lookup("GEOTUNE_S3_REGION").filter(|v| !v.is_empty()) {
            self.storage.region = region;
        }
        if let Some(namespace) = lookup("GEOTUNE_NAMESPACE").filter(|v| !v.is_empty()) {
            self.jobs.namespace = Some(namespace);
        }
    }

    /// Attach storage credentials from the process environment.
    pub fn with_env_credentials(mut self) -> TrainingResult<Self> {
        self.storage.credentials = Some(StorageCredentials::from_env()?);
        Ok(self)
    }
}
