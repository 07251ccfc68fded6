use crate::descriptor::Family;
use std::fmt;

/// Logical identity of one repository: `kind/series/distro/version`.
///
/// Only [`SupportedRepos::coordinate`](crate::SupportedRepos::coordinate)
/// constructs these, so every coordinate in circulation has been validated
/// against the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryCoordinate {
    kind: String,
    series: String,
    distro: String,
    version: String,
    family: Family,
}

impl RepositoryCoordinate {
    pub(crate) fn new(kind: &str, series: &str, distro: &str, version: &str, family: Family) -> Self {
        Self {
            kind: kind.to_string(),
            series: series.to_string(),
            distro: distro.to_string(),
            version: version.to_string(),
            family,
        }
    }

    /// Repository kind, e.g. `live` or `release`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn distro(&self) -> &str {
        &self.distro
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn family(&self) -> Family {
        self.family
    }
}

impl fmt::Display for RepositoryCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.kind, self.series, self.distro, self.version)
    }
}
