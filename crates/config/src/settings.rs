//! Configuration sections and their validation into the types the rest of
//! the workspace works with.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pkgrepo_layout::{Anchors, DEFAULT_ARCHITECTURES, Family, Layout, SigningKeys, SupportedRepos};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub repos: ReposConfig,
    /// Anchor name to the values it expands to.
    pub anchors: HashMap<String, Vec<String>>,
    /// Binary rpm architectures; `noarch` packages are published to each.
    pub architectures: Vec<String>,
    pub signing: SigningConfig,
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            repos: ReposConfig::default(),
            anchors: HashMap::new(),
            architectures: DEFAULT_ARCHITECTURES.iter().map(ToString::to_string).collect(),
            signing: SigningConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    S3,
    Local,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Prefix inside the bucket (or root directory) all repositories live under.
    pub base_path: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    /// Give written packages and metadata the `public-read` ACL.
    pub public_read: bool,
    /// Root directory of the `local` backend.
    pub root: Option<PathBuf>,
}

/// Validated store connection details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Store {
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
        public_read: bool,
    },
    Local {
        root: PathBuf,
    },
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => exn::bail!(ErrorKind::Invalid(format!("store.{name} is required"))),
    }
}

impl StoreConfig {
    pub fn store(&self) -> Result<Store> {
        match self.backend {
            StoreBackend::S3 => Ok(Store::S3 {
                bucket: required(&self.bucket, "bucket")?,
                region: required(&self.region, "region")?,
                endpoint: self.endpoint.clone(),
                key_id: required(&self.key_id, "key_id")?,
                key_secret: required(&self.key_secret, "key_secret")?,
                public_read: self.public_read,
            }),
            StoreBackend::Local => match &self.root {
                Some(root) if root.is_absolute() => Ok(Store::Local { root: root.clone() }),
                Some(root) => exn::bail!(ErrorKind::Invalid(format!(
                    "store.root must be an absolute path, got {}",
                    root.display()
                ))),
                None => exn::bail!(ErrorKind::Invalid("store.root is required".to_string())),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReposConfig {
    pub kinds: Vec<String>,
    pub series: Vec<String>,
    pub distros: BTreeMap<String, DistroConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DistroConfig {
    /// `rpm` or `deb`.
    pub family: String,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Key identifier used for every series without an override. Unset
    /// means unsigned metadata.
    pub default_key: Option<String>,
    pub series_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Regenerate every existing repository when starting up.
    pub on_start: bool,
    /// Pass `--force` to the metadata generator.
    pub force: bool,
    pub burst_workers: usize,
    pub idle_interval_secs: u64,
    pub retry_backoff_secs: Option<u64>,
    /// Regeneration attempts per repository before `upload` and `update`
    /// stop waiting for it. The background worker retries forever.
    pub max_attempts: usize,
    /// Metadata generator executable, looked up in `PATH`.
    pub command: String,
    pub deb_origin: Option<String>,
    pub deb_label: Option<String>,
    pub deb_description: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            on_start: false,
            force: false,
            burst_workers: 20,
            idle_interval_secs: 5,
            retry_backoff_secs: None,
            max_attempts: 3,
            command: "mkrepo".to_string(),
            deb_origin: None,
            deb_label: None,
            deb_description: None,
        }
    }
}

impl SyncConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Option<Duration> {
        self.retry_backoff_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}

impl Config {
    /// Builds the repository descriptor, rejecting unknown families and empty
    /// sets.
    pub fn supported_repos(&self) -> Result<SupportedRepos> {
        let repos = &self.repos;
        for (name, values) in [("repos.kinds", &repos.kinds), ("repos.series", &repos.series)] {
            if values.is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("{name} must not be empty")));
            }
        }
        if repos.distros.is_empty() {
            exn::bail!(ErrorKind::Invalid("repos.distros must not be empty".to_string()));
        }
        let mut supported = SupportedRepos::new(repos.kinds.iter().cloned(), repos.series.iter().cloned());
        for (name, distro) in &repos.distros {
            let family = distro
                .family
                .parse::<Family>()
                .or_raise(|| ErrorKind::Invalid(format!("repos.distros.{name}.family")))?;
            if distro.versions.is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("repos.distros.{name}.versions must not be empty")));
            }
            supported = supported.with_distro(name.clone(), family, distro.versions.iter().cloned());
        }
        Ok(supported)
    }

    pub fn anchors(&self) -> Anchors {
        self.anchors.clone()
    }

    pub fn layout(&self) -> Result<Layout> {
        if self.architectures.is_empty() {
            exn::bail!(ErrorKind::Invalid("architectures must not be empty".to_string()));
        }
        let layout = Layout::default()
            .with_base_path(self.store.base_path.as_deref())
            .or_raise(|| ErrorKind::Invalid("store.base_path".to_string()))?;
        Ok(layout.with_architectures(self.architectures.iter().cloned()))
    }

    pub fn signing_keys(&self) -> SigningKeys {
        self.signing
            .series_keys
            .iter()
            .fold(SigningKeys::new(self.signing.default_key.clone()), |keys, (series, key)| {
                keys.with_series_key(series.clone(), key.clone())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config() -> Config {
        let mut config = Config::default();
        config.repos.kinds = vec!["live".to_string()];
        config.repos.series = vec!["1.10".to_string()];
        config.repos.distros.insert(
            "fedora".to_string(),
            DistroConfig { family: "rpm".to_string(), versions: vec!["31".to_string()] },
        );
        config
    }

    #[test]
    fn test_supported_repos() {
        let repos = config().supported_repos().unwrap();
        assert_eq!(repos.distro("fedora").unwrap().family, Family::Rpm);
        assert!(repos.coordinate("live", "1.10", "fedora", "31").is_ok());
    }

    #[test]
    fn test_unknown_family_is_rejected() {
        let mut config = config();
        config.repos.distros.get_mut("fedora").unwrap().family = "apk".to_string();
        let err = config.supported_repos().unwrap_err();
        assert_eq!(*err, ErrorKind::Invalid("repos.distros.fedora.family".to_string()));
    }

    #[rstest]
    #[case::kinds(|c: &mut Config| c.repos.kinds.clear())]
    #[case::series(|c: &mut Config| c.repos.series.clear())]
    #[case::distros(|c: &mut Config| c.repos.distros.clear())]
    #[case::versions(|c: &mut Config| c.repos.distros.get_mut("fedora").unwrap().versions.clear())]
    fn test_empty_sets_are_rejected(#[case] edit: fn(&mut Config)) {
        let mut config = config();
        edit(&mut config);
        let err = config.supported_repos().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_s3_store_requires_credentials() {
        let mut store = StoreConfig {
            bucket: Some("packages".to_string()),
            region: Some("us-east-1".to_string()),
            key_id: Some("id".to_string()),
            ..StoreConfig::default()
        };
        let err = store.store().unwrap_err();
        assert_eq!(*err, ErrorKind::Invalid("store.key_secret is required".to_string()));
        store.key_secret = Some("secret".to_string());
        assert!(matches!(store.store().unwrap(), Store::S3 { public_read: false, .. }));
    }

    #[test]
    fn test_local_store_requires_absolute_root() {
        let mut store = StoreConfig { backend: StoreBackend::Local, ..StoreConfig::default() };
        assert!(store.store().is_err());
        store.root = Some(PathBuf::from("relative"));
        assert!(store.store().is_err());
        store.root = Some(PathBuf::from("/srv/repos"));
        assert_eq!(store.store().unwrap(), Store::Local { root: PathBuf::from("/srv/repos") });
    }

    #[test]
    fn test_layout() {
        let mut config = config();
        config.store.base_path = Some("/repos/".to_string());
        let layout = config.layout().unwrap();
        assert_eq!(layout.base_path(), Some("repos"));
        assert_eq!(layout.architectures(), ["x86_64", "aarch64"]);
        config.architectures.clear();
        assert!(config.layout().is_err());
    }

    #[test]
    fn test_signing_keys() {
        let mut config = config();
        config.signing.default_key = Some("DEFAULT".to_string());
        config.signing.series_keys.insert("modules".to_string(), "MODULES".to_string());
        let keys = config.signing_keys();
        assert_eq!(keys.for_series("modules"), Some("MODULES"));
        assert_eq!(keys.for_series("1.10"), Some("DEFAULT"));
    }

    #[test]
    fn test_sync_durations() {
        let mut sync = SyncConfig::default();
        assert_eq!(sync.idle_interval(), Duration::from_secs(5));
        assert_eq!(sync.retry_backoff(), None);
        assert_eq!(sync.max_attempts, 3);
        sync.retry_backoff_secs = Some(0);
        assert_eq!(sync.retry_backoff(), None);
        sync.retry_backoff_secs = Some(10);
        assert_eq!(sync.retry_backoff(), Some(Duration::from_secs(10)));
    }
}
