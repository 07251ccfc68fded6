//! Package placement.
//!
//! Maps a package filename and a [`RepositoryCoordinate`] onto the object
//! store keys the file must be written to, and the repository each key
//! belongs to (so the repository can have its metadata regenerated after the
//! write).
//!
//! ```text
//! rpm: <root>/<version>/<arch>/Packages/<file>       (<root>/<version>/<arch>)
//!      <root>/<version>/SRPMS/Packages/<file>        (<root>/<version>/SRPMS)
//! deb: <root>/pool/<version>/main/<p>/<product>/<file>  (<root>)
//!
//! where <root> = [<base path>/]<kind>/<series>/<distro>
//! ```

use crate::coordinate::RepositoryCoordinate;
use crate::descriptor::{Family, SupportedRepos};
use crate::error::{ErrorKind, Result};
use crate::repository::{RepositoryPath, normalize};

/// Architectures binary rpm repositories are published for unless configured
/// otherwise.
pub const DEFAULT_ARCHITECTURES: [&str; 2] = ["x86_64", "aarch64"];
const RPM_NOARCH_SUFFIX: &str = ".noarch.rpm";
const RPM_SOURCE_SUFFIX: &str = ".src.rpm";
const RPM_SOURCE_REPOSITORY: &str = "SRPMS";
/// Binary packages, source control files and source archives.
const DEB_SUFFIXES: [&str; 4] = [".deb", ".dsc", ".tar.xz", ".tar.gz"];

/// One destination of a package file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// The repository whose metadata must be regenerated once the key is written.
    pub repository: RepositoryPath,
    /// Object store key the file is written to.
    pub key: String,
}

/// How a [`Scan`] decides which repositories exist under its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// The prefix is itself a repository, provided it has any content (deb).
    Itself,
    /// Every child prefix is a repository (rpm: `x86_64/`, `SRPMS/`, ...).
    Children,
}

/// A store prefix to list when discovering which repositories physically
/// exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Always ends with `/`.
    pub prefix: String,
    pub mode: ScanMode,
    /// Series the discovered repositories belong to (selects the signing key).
    pub series: String,
}

/// Store layout: optional base path inside the bucket and the binary rpm
/// architectures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base_path: Option<String>,
    architectures: Vec<String>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            base_path: None,
            architectures: DEFAULT_ARCHITECTURES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Layout {
    /// Sets the prefix all repositories live under. An empty or `/` base path
    /// is the same as none.
    pub fn with_base_path(mut self, base_path: Option<&str>) -> Result<Self> {
        self.base_path = match base_path {
            None => None,
            Some(raw) => match normalize(raw) {
                Some(path) if path.is_empty() => None,
                Some(path) => Some(path),
                None => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
            },
        };
        Ok(self)
    }

    pub fn with_architectures(mut self, architectures: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.architectures = architectures.into_iter().map(Into::into).collect();
        self
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    /// Root of a distribution: `[<base>/]<kind>/<series>/<distro>`.
    pub fn distro_root(&self, kind: &str, series: &str, distro: &str) -> String {
        match &self.base_path {
            Some(base) => format!("{base}/{kind}/{series}/{distro}"),
            None => format!("{kind}/{series}/{distro}"),
        }
    }

    /// Computes every destination of `filename` for the given coordinate.
    ///
    /// Binary rpm packages go to the repository of their architecture, and
    /// `noarch` packages fan out to every configured architecture. Deb files
    /// are pooled by `product`, which is then required.
    pub fn resolve(
        &self,
        coordinate: &RepositoryCoordinate,
        filename: &str,
        product: Option<&str>,
    ) -> Result<Vec<Placement>> {
        if filename.is_empty() || filename.contains('/') || filename == "." || filename == ".." {
            exn::bail!(ErrorKind::InvalidArtifact(filename.to_string()));
        }
        let root = self.distro_root(coordinate.kind(), coordinate.series(), coordinate.distro());
        match coordinate.family() {
            Family::Rpm => self.resolve_rpm(&root, coordinate.version(), filename),
            Family::Deb => Self::resolve_deb(&root, coordinate.version(), filename, product),
        }
    }

    fn resolve_rpm(&self, root: &str, version: &str, filename: &str) -> Result<Vec<Placement>> {
        let repositories: Vec<&str> = if filename.ends_with(RPM_NOARCH_SUFFIX) {
            self.architectures.iter().map(String::as_str).collect()
        } else if filename.ends_with(RPM_SOURCE_SUFFIX) {
            vec![RPM_SOURCE_REPOSITORY]
        } else if let Some(arch) =
            self.architectures.iter().find(|arch| filename.ends_with(&format!(".{arch}.rpm")))
        {
            vec![arch.as_str()]
        } else {
            exn::bail!(ErrorKind::InvalidArtifact(filename.to_string()));
        };
        repositories
            .into_iter()
            .map(|repository| {
                let repository = format!("{root}/{version}/{repository}");
                Ok(Placement {
                    key: format!("{repository}/Packages/{filename}"),
                    repository: RepositoryPath::new(repository)?,
                })
            })
            .collect()
    }

    fn resolve_deb(root: &str, version: &str, filename: &str, product: Option<&str>) -> Result<Vec<Placement>> {
        let Some(product) = product.map(str::trim).filter(|p| !p.is_empty()) else {
            exn::bail!(ErrorKind::MissingProduct);
        };
        if product.contains('/') {
            exn::bail!(ErrorKind::InvalidArtifact(product.to_string()));
        }
        if !DEB_SUFFIXES.iter().any(|suffix| filename.ends_with(suffix)) {
            exn::bail!(ErrorKind::InvalidArtifact(filename.to_string()));
        }
        // Non-empty, so there is always a first character.
        let initial: String = product.chars().take(1).collect();
        Ok(vec![Placement {
            key: format!("{root}/pool/{version}/main/{initial}/{product}/{filename}"),
            repository: RepositoryPath::new(root)?,
        }])
    }

    /// The prefix to list to find the existing repositories of a single
    /// coordinate.
    pub fn scan(&self, coordinate: &RepositoryCoordinate) -> Scan {
        let root = self.distro_root(coordinate.kind(), coordinate.series(), coordinate.distro());
        match coordinate.family() {
            Family::Rpm => Scan {
                prefix: format!("{root}/{}/", coordinate.version()),
                mode: ScanMode::Children,
                series: coordinate.series().to_string(),
            },
            // All versions of a deb distribution share one archive root.
            Family::Deb => Scan {
                prefix: format!("{root}/"),
                mode: ScanMode::Itself,
                series: coordinate.series().to_string(),
            },
        }
    }

    /// Every prefix that may hold a repository, across all declared
    /// combinations of the descriptor.
    pub fn scans(&self, repos: &SupportedRepos) -> Vec<Scan> {
        let mut scans = Vec::new();
        for kind in repos.kinds() {
            for series in repos.series() {
                for (distro, description) in repos.distros() {
                    let root = self.distro_root(kind, series, distro);
                    match description.family {
                        Family::Deb => scans.push(Scan {
                            prefix: format!("{root}/"),
                            mode: ScanMode::Itself,
                            series: series.clone(),
                        }),
                        Family::Rpm => scans.extend(description.versions.iter().map(|version| Scan {
                            prefix: format!("{root}/{version}/"),
                            mode: ScanMode::Children,
                            series: series.clone(),
                        })),
                    }
                }
            }
        }
        scans
    }
}
