//! Request path parsing and anchor expansion.
//!
//! A request path names a repository as `kind/series/distro/version`. Any of
//! those four segments may instead be the name of an anchor, such as
//! `enabled`, which stands for a list of concrete values. A path containing
//! anchors expands to the Cartesian product of the anchor values, each
//! combination validated independently against the [`SupportedRepos`]
//! descriptor.

use crate::coordinate::RepositoryCoordinate;
use crate::descriptor::SupportedRepos;
use crate::error::{ErrorKind, Result};
use crate::repository::normalize;
use std::collections::HashMap;

/// Number of positional segments in a repository request path.
pub const SEGMENTS: usize = 4;

/// Anchor name to substitution values.
pub type Anchors = HashMap<String, Vec<String>>;

/// One positional segment of a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Named anchor, resolved to its substitution values when parsed.
    Anchor { name: String, values: Vec<String> },
}

impl Segment {
    fn choices(&self) -> Vec<&str> {
        match self {
            Self::Literal(value) => vec![value.as_str()],
            Self::Anchor { values, .. } => values.iter().map(|v| v.trim_matches('/')).collect(),
        }
    }
}

/// A parsed request path: exactly [`SEGMENTS`] segments, in positional order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    segments: Vec<Segment>,
}

impl PathSpec {
    /// Splits `raw` into its positional segments, marking the segments whose
    /// value is a declared anchor name.
    pub fn parse(raw: &str, anchors: &Anchors) -> Result<Self> {
        let Some(normalized) = normalize(raw) else {
            exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
        };
        let parts: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != SEGMENTS {
            exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
        }
        let segments = parts
            .into_iter()
            .map(|part| match anchors.get(part) {
                Some(values) => Segment::Anchor { name: part.to_string(), values: values.clone() },
                None => Segment::Literal(part.to_string()),
            })
            .collect();
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_anchors(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Anchor { .. }))
    }

    /// Expands the path into validated coordinates.
    ///
    /// Combinations are produced with the first anchored position varying
    /// slowest, then in value-list order. Callers should still treat the
    /// result as a set.
    pub fn expand(&self, repos: &SupportedRepos) -> Result<Vec<RepositoryCoordinate>> {
        let mut combinations: Vec<Vec<&str>> = vec![Vec::with_capacity(SEGMENTS)];
        for segment in &self.segments {
            let choices = segment.choices();
            combinations = combinations
                .into_iter()
                .flat_map(|prefix| {
                    choices.iter().map(move |choice| {
                        let mut next = prefix.clone();
                        next.push(*choice);
                        next
                    })
                })
                .collect();
        }
        if combinations.is_empty() {
            // An anchor with no values: nothing to publish into.
            exn::bail!(ErrorKind::InvalidPath(self.to_string()));
        }
        tracing::trace!(path = %self, combinations = combinations.len(), "Expanded request path");
        combinations
            .into_iter()
            .map(|c| repos.coordinate(c[0], c[1], c[2], c[3]))
            .collect()
    }
}

impl std::fmt::Display for PathSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<&str> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(value) => value.as_str(),
                Segment::Anchor { name, .. } => name.as_str(),
            })
            .collect();
        f.write_str(&rendered.join("/"))
    }
}

/// Parses and expands a raw request path in one go.
///
/// ```
/// use pkgrepo_layout::{Anchors, Family, SupportedRepos, expand};
///
/// let repos = SupportedRepos::new(["live"], ["1.10", "2.8"]).with_distro("fedora", Family::Rpm, ["31"]);
/// let anchors = Anchors::from([("enabled".to_string(), vec!["1.10".to_string(), "2.8".to_string()])]);
/// let coordinates = expand("live/enabled/fedora/31", &anchors, &repos).unwrap();
/// assert_eq!(coordinates.len(), 2);
/// ```
pub fn expand(raw: &str, anchors: &Anchors, repos: &SupportedRepos) -> Result<Vec<RepositoryCoordinate>> {
    PathSpec::parse(raw, anchors)?.expand(repos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Family;
    use rstest::rstest;
    use std::collections::HashSet;

    fn repos() -> SupportedRepos {
        SupportedRepos::new(["live", "release"], ["1.10", "2.8", "2.10", "modules"])
            .with_distro("fedora", Family::Rpm, ["31", "32"])
            .with_distro("el", Family::Rpm, ["7", "8"])
            .with_distro("ubuntu", Family::Deb, ["focal", "jammy"])
    }

    fn anchors() -> Anchors {
        Anchors::from([
            ("enabled".to_string(), vec!["1.10".to_string(), "2.8".to_string(), "2.10".to_string()]),
            ("all-kinds".to_string(), vec!["live".to_string(), "release".to_string()]),
            ("nothing".to_string(), vec![]),
            ("broken".to_string(), vec!["1.10".to_string(), "9.9".to_string()]),
        ])
    }

    #[rstest]
    #[case("live/1.10/fedora")]
    #[case("live/1.10/fedora/31/x86_64")]
    #[case("")]
    #[case("../live/1.10/fedora/31")]
    fn test_segment_count(#[case] raw: &str) {
        let err = PathSpec::parse(raw, &anchors()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_parse_marks_anchors() {
        let spec = PathSpec::parse("/live/enabled/fedora/31/", &anchors()).unwrap();
        assert!(spec.has_anchors());
        assert_eq!(spec.segments()[0], Segment::Literal("live".to_string()));
        assert!(matches!(&spec.segments()[1], Segment::Anchor { name, values } if name == "enabled" && values.len() == 3));
        assert_eq!(spec.to_string(), "live/enabled/fedora/31");
    }

    #[test]
    fn test_no_anchor_single_coordinate() {
        let coordinates = expand("live/1.10/fedora/31", &anchors(), &repos()).unwrap();
        assert_eq!(coordinates.len(), 1);
        assert_eq!(coordinates[0].to_string(), "live/1.10/fedora/31");
    }

    #[test]
    fn test_single_anchor_three_values() {
        let coordinates = expand("live/enabled/ubuntu/focal", &anchors(), &repos()).unwrap();
        assert_eq!(coordinates.len(), 3);
        let series: HashSet<_> = coordinates.iter().map(|c| c.series().to_string()).collect();
        assert_eq!(series, HashSet::from(["1.10".to_string(), "2.8".to_string(), "2.10".to_string()]));
        for coordinate in &coordinates {
            assert_eq!(coordinate.kind(), "live");
            assert_eq!(coordinate.distro(), "ubuntu");
            assert_eq!(coordinate.version(), "focal");
        }
    }

    #[test]
    fn test_two_anchors_cartesian_product() {
        let coordinates = expand("all-kinds/enabled/el/8", &anchors(), &repos()).unwrap();
        let rendered: Vec<_> = coordinates.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            [
                "live/1.10/el/8",
                "live/2.8/el/8",
                "live/2.10/el/8",
                "release/1.10/el/8",
                "release/2.8/el/8",
                "release/2.10/el/8",
            ]
        );
    }

    #[test]
    fn test_expansion_validates_every_combination() {
        let err = expand("live/broken/fedora/31", &anchors(), &repos()).unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedSeries("9.9".to_string()));
    }

    #[test]
    fn test_empty_anchor() {
        let err = expand("live/nothing/fedora/31", &anchors(), &repos()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[rstest]
    #[case("nightly/1.10/fedora/31", ErrorKind::UnsupportedKind("nightly".to_string()))]
    #[case("live/1.9/fedora/31", ErrorKind::UnsupportedSeries("1.9".to_string()))]
    #[case("live/1.10/arch/31", ErrorKind::UnsupportedDistro("arch".to_string()))]
    #[case("live/1.10/ubuntu/31", ErrorKind::UnsupportedVersion("31".to_string()))]
    fn test_validation_names_component(#[case] raw: &str, #[case] expected: ErrorKind) {
        let err = expand(raw, &anchors(), &repos()).unwrap_err();
        assert_eq!(*err, expected);
    }
}
