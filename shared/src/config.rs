/// Access credentials for the keyed map services.
///
/// Both keys are optional. A blank or whitespace-only value counts as absent so a
/// build with `MAPTILER_KEY=""` behaves exactly like one without the variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapConfig {
    maptiler_key: Option<String>,
    openweather_key: Option<String>,
}

impl MapConfig {
    pub fn new(maptiler_key: Option<&str>, openweather_key: Option<&str>) -> Self {
        Self {
            maptiler_key: normalize_key(maptiler_key),
            openweather_key: normalize_key(openweather_key),
        }
    }

    /// Config with no credentials: every provider falls back to public services.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn maptiler_key(&self) -> Option<&str> {
        self.maptiler_key.as_deref()
    }

    pub fn openweather_key(&self) -> Option<&str> {
        self.openweather_key.as_deref()
    }
}

fn normalize_key(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_count_as_absent() {
        let config = MapConfig::new(Some("   "), Some(""));
        assert_eq!(config, MapConfig::anonymous());
        assert_eq!(config.maptiler_key(), None);
        assert_eq!(config.openweather_key(), None);
    }

    #[test]
    fn keys_are_trimmed() {
        let config = MapConfig::new(Some(" abc123 \n"), None);
        assert_eq!(config.maptiler_key(), Some("abc123"));
        assert_eq!(config.openweather_key(), None);
    }
}
