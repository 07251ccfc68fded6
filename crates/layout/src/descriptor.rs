//! Description of the repositories the service is allowed to publish into.

use crate::coordinate::RepositoryCoordinate;
use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Packaging family of a distribution; decides how files are placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    /// Red Hat style (`<version>/<arch>/Packages/...`)
    Rpm,
    /// Debian style (`pool/<codename>/main/...`)
    Deb,
}

impl FromStr for Family {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rpm" => Ok(Self::Rpm),
            "deb" => Ok(Self::Deb),
            _ => exn::bail!(ErrorKind::UnsupportedRepositoryFamily(s.to_string())),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rpm => "rpm",
            Self::Deb => "deb",
        })
    }
}

/// A supported distribution and the versions of it that may be targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distro {
    pub family: Family,
    pub versions: Vec<String>,
}

/// Static descriptor of every repository kind, series, distribution and
/// distribution version the service accepts.
///
/// ```
/// use pkgrepo_layout::{Family, SupportedRepos};
///
/// let repos = SupportedRepos::new(["live", "release"], ["1.10", "2.8"])
///     .with_distro("fedora", Family::Rpm, ["31", "32"])
///     .with_distro("ubuntu", Family::Deb, ["focal", "jammy"]);
/// let coordinate = repos.coordinate("live", "1.10", "fedora", "31").unwrap();
/// assert_eq!(coordinate.family(), Family::Rpm);
/// assert!(repos.coordinate("live", "1.10", "fedora", "focal").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedRepos {
    kinds: Vec<String>,
    series: Vec<String>,
    distros: BTreeMap<String, Distro>,
}

impl SupportedRepos {
    pub fn new(
        kinds: impl IntoIterator<Item = impl Into<String>>,
        series: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
            series: series.into_iter().map(Into::into).collect(),
            distros: BTreeMap::new(),
        }
    }

    pub fn with_distro(
        mut self,
        name: impl Into<String>,
        family: Family,
        versions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let versions = versions.into_iter().map(Into::into).collect();
        self.distros.insert(name.into(), Distro { family, versions });
        self
    }

    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    pub fn series(&self) -> &[String] {
        &self.series
    }

    /// Distributions in name order.
    pub fn distros(&self) -> impl Iterator<Item = (&str, &Distro)> {
        self.distros.iter().map(|(name, distro)| (name.as_str(), distro))
    }

    pub fn distro(&self, name: &str) -> Option<&Distro> {
        self.distros.get(name)
    }

    /// Validates each component and builds a coordinate.
    ///
    /// Components are checked in order (kind, series, distribution, version)
    /// and the first unsupported one is named in the error.
    pub fn coordinate(&self, kind: &str, series: &str, distro: &str, version: &str) -> Result<RepositoryCoordinate> {
        if !self.kinds.iter().any(|k| k == kind) {
            exn::bail!(ErrorKind::UnsupportedKind(kind.to_string()));
        }
        if !self.series.iter().any(|s| s == series) {
            exn::bail!(ErrorKind::UnsupportedSeries(series.to_string()));
        }
        let Some(description) = self.distros.get(distro) else {
            exn::bail!(ErrorKind::UnsupportedDistro(distro.to_string()));
        };
        if !description.versions.iter().any(|v| v == version) {
            exn::bail!(ErrorKind::UnsupportedVersion(version.to_string()));
        }
        Ok(RepositoryCoordinate::new(kind, series, distro, version, description.family))
    }
}
