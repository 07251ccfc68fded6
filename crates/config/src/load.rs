use crate::error::{ErrorKind, Result};
use crate::settings::Config;
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding the configuration file, e.g.
/// `PKGREPO_STORE__BUCKET`.
pub const ENV_PREFIX: &str = "PKGREPO_";
const FILE_NAME: &str = "config.toml";

/// Platform configuration file, e.g. `~/.config/pkgrepo/config.toml` on Linux.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pkgrepo").map(|dirs| dirs.config_dir().join(FILE_NAME))
}

fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

impl Config {
    /// Loads defaults, then the configuration file, then `PKGREPO_*`
    /// environment variables (`__` separates nested keys).
    ///
    /// An explicit `path` must exist. Without one, the platform default
    /// location is used if there is a file there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration file");
                figment = file_provider(figment, path)?;
            },
            None => match default_path().filter(|p| p.is_file()) {
                Some(default) => {
                    tracing::debug!(path = %default.display(), "Loading default configuration file");
                    figment = file_provider(figment, &default)?;
                },
                None => tracing::debug!("No configuration file; using defaults and environment"),
            },
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| exn::Exn::from(ErrorKind::Load(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StoreBackend;
    use figment::Jail;

    const TOML: &str = r#"
        architectures = ["x86_64", "aarch64", "ppc64le"]

        [store]
        bucket = "packages"
        region = "us-east-1"
        key_id = "id"
        key_secret = "secret"

        [repos]
        kinds = ["live", "release"]
        series = ["1.10", "2.8"]

        [repos.distros.fedora]
        family = "rpm"
        versions = ["31", "32"]

        [repos.distros.ubuntu]
        family = "deb"
        versions = ["focal"]

        [anchors]
        enabled = ["1.10", "2.8"]

        [sync]
        on_start = true
    "#;

    #[test]
    fn test_load_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("pkgrepo.toml", TOML)?;
            let config = Config::load(Some(Path::new("pkgrepo.toml"))).unwrap();
            assert_eq!(config.store.bucket.as_deref(), Some("packages"));
            assert_eq!(config.architectures.len(), 3);
            assert_eq!(config.anchors["enabled"], ["1.10", "2.8"]);
            assert!(config.sync.on_start);
            assert_eq!(config.sync.burst_workers, 20);
            assert_eq!(config.sync.command, "mkrepo");
            assert!(config.supported_repos().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("pkgrepo.toml", TOML)?;
            jail.set_env("PKGREPO_STORE__BUCKET", "other");
            jail.set_env("PKGREPO_SYNC__BURST_WORKERS", "4");
            jail.set_env("PKGREPO_SIGNING__DEFAULT_KEY", "ABCDEF");
            let config = Config::load(Some(Path::new("pkgrepo.toml"))).unwrap();
            assert_eq!(config.store.bucket.as_deref(), Some("other"));
            assert_eq!(config.sync.burst_workers, 4);
            assert_eq!(config.signing.default_key.as_deref(), Some("ABCDEF"));
            Ok(())
        });
    }

    #[test]
    fn test_load_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "pkgrepo.yaml",
                "store:\n  backend: local\n  root: /srv/repos\nrepos:\n  kinds: [live]\n  series: ['1.10']\n  distros:\n    ubuntu:\n      family: deb\n      versions: [focal]\n",
            )?;
            let config = Config::load(Some(Path::new("pkgrepo.yaml"))).unwrap();
            assert_eq!(config.store.backend, StoreBackend::Local);
            assert_eq!(config.repos.series, ["1.10"]);
            Ok(())
        });
    }

    #[test]
    fn test_load_json() {
        Jail::expect_with(|jail| {
            jail.create_file("pkgrepo.json", r#"{"sync": {"force": true, "retry_backoff_secs": 30}}"#)?;
            let config = Config::load(Some(Path::new("pkgrepo.json"))).unwrap();
            assert!(config.sync.force);
            assert_eq!(config.sync.retry_backoff_secs, Some(30));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&temp_dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pkgrepo.ini");
        std::fs::write(&path, "bucket = packages").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file("pkgrepo.toml", "[sync]\nburst_workers = \"many\"\n")?;
            let err = Config::load(Some(Path::new("pkgrepo.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load(_)));
            Ok(())
        });
    }
}
