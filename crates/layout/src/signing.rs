use std::collections::HashMap;

/// Selects the key repository metadata is signed with.
///
/// Series listed in the override table use their own key; every other series
/// uses the default. With no default, those repositories are left unsigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningKeys {
    default: Option<String>,
    series: HashMap<String, String>,
}

impl SigningKeys {
    pub fn new(default: Option<String>) -> Self {
        Self { default, series: HashMap::new() }
    }

    pub fn with_series_key(mut self, series: impl Into<String>, key: impl Into<String>) -> Self {
        self.series.insert(series.into(), key.into());
        self
    }

    pub fn for_series(&self, series: &str) -> Option<&str> {
        self.series.get(series).or(self.default.as_ref()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("modules", Some("MODULES"))]
    #[case("2.8", Some("DEFAULT"))]
    fn test_for_series(#[case] series: &str, #[case] expected: Option<&str>) {
        let keys = SigningKeys::new(Some("DEFAULT".to_string())).with_series_key("modules", "MODULES");
        assert_eq!(keys.for_series(series), expected);
    }

    #[test]
    fn test_unsigned_without_default() {
        let keys = SigningKeys::default().with_series_key("modules", "MODULES");
        assert_eq!(keys.for_series("1.10"), None);
        assert_eq!(keys.for_series("modules"), Some("MODULES"));
    }
}
