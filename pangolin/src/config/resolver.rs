use std::time::Duration;

use super::persisted::PersistedConfig;

/// Section of the persisted config that holds client defaults.
pub const CLIENT_DEFAULTS_SECTION: &str = "olm_defaults";

/// A value type the persisted config can supply.
pub trait ConfigValue: Sized {
    fn from_config(config: &PersistedConfig, key: &str) -> Option<Self>;
}

impl ConfigValue for String {
    fn from_config(config: &PersistedConfig, key: &str) -> Option<Self> {
        config.get_string(key)
    }
}

impl ConfigValue for bool {
    fn from_config(config: &PersistedConfig, key: &str) -> Option<Self> {
        config.get_bool(key)
    }
}

impl ConfigValue for i64 {
    fn from_config(config: &PersistedConfig, key: &str) -> Option<Self> {
        config.get_int(key)
    }
}

impl ConfigValue for u32 {
    fn from_config(config: &PersistedConfig, key: &str) -> Option<Self> {
        let value = config.get_int(key)?;
        match u32::try_from(value) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value, "ignoring out-of-range config value");
                None
            }
        }
    }
}

/// Picks each setting from an explicit flag, the persisted config, or a
/// compiled default, in that order.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    config: &'a PersistedConfig,
    section: &'a str,
}

impl<'a> ConfigResolver<'a> {
    /// Resolver over the `[olm_defaults]` section.
    pub fn new(config: &'a PersistedConfig) -> Self {
        Self::with_section(config, CLIENT_DEFAULTS_SECTION)
    }

    pub fn with_section(config: &'a PersistedConfig, section: &'a str) -> Self {
        Self { config, section }
    }

    /// `flag` is `Some` only when the user passed it on the command line.
    pub fn resolve<T: ConfigValue>(&self, flag: Option<T>, key: &str, default: T) -> T {
        self.resolve_optional(flag, key).unwrap_or(default)
    }

    /// Like [`resolve`](Self::resolve) for settings without a default.
    pub fn resolve_optional<T: ConfigValue>(&self, flag: Option<T>, key: &str) -> Option<T> {
        if flag.is_some() {
            return flag;
        }
        T::from_config(self.config, &self.key(key))
    }

    pub fn string(&self, flag: Option<&str>, key: &str, default: &str) -> String {
        self.resolve(flag.map(str::to_string), key, default.to_string())
    }

    fn key(&self, key: &str) -> String {
        if self.section.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.section, key)
        }
    }
}

/// Parse a duration like `5s` or `250ms`, falling back on empty or bad input.
pub fn parse_duration(value: &str, fallback: Duration) -> Duration {
    let value = value.trim();
    if value.is_empty() {
        return fallback;
    }
    match humantime::parse_duration(value) {
        Ok(d) => d,
        Err(e) => {
            let fallback_text = humantime::format_duration(fallback);
            crate::output::warning(&format!(
                "Invalid duration format '{value}', using default: {fallback_text}"
            ));
            tracing::warn!(value, error = %e, fallback = %fallback_text, "invalid duration");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PersistedConfig {
        PersistedConfig::parse(
            r#"
hostname = "from-config.example.com"

[olm_defaults]
mtu = 1380
dns = "9.9.9.9"
enable_api = false
"#,
        )
        .unwrap()
    }

    #[test]
    fn explicit_flag_wins_over_config_and_default() {
        let config = config();
        let r = ConfigResolver::new(&config);
        assert_eq!(r.resolve(Some(1420u32), "mtu", 1280), 1420);
        assert_eq!(r.string(Some("1.1.1.1"), "dns", "8.8.8.8"), "1.1.1.1");
        assert!(r.resolve(Some(true), "enable_api", false));
    }

    #[test]
    fn explicit_flag_wins_even_when_it_equals_the_default() {
        let config = config();
        let r = ConfigResolver::new(&config);
        assert_eq!(r.resolve(Some(1280u32), "mtu", 1280), 1280);
        assert!(!r.resolve(Some(false), "enable_api", true));
    }

    #[test]
    fn config_wins_over_default_when_flag_unset() {
        let config = config();
        let r = ConfigResolver::new(&config);
        assert_eq!(r.resolve(None::<u32>, "mtu", 1280), 1380);
        assert_eq!(r.string(None, "dns", "8.8.8.8"), "9.9.9.9");
        assert!(!r.resolve(None, "enable_api", true));
    }

    #[test]
    fn default_used_when_flag_and_config_absent() {
        let config = PersistedConfig::default();
        let r = ConfigResolver::new(&config);
        assert_eq!(r.resolve(None::<u32>, "mtu", 1280), 1280);
        assert_eq!(r.string(None, "interface_name", "olm"), "olm");
        assert_eq!(r.resolve_optional(None::<String>, "tls_client_cert"), None);
    }

    #[test]
    fn flag_precedence_holds_for_any_persisted_or_default_value() {
        for persisted in ["", "mtu = 1", "mtu = 9000", "mtu = \"oops\""] {
            let config =
                PersistedConfig::parse(&format!("[olm_defaults]\n{persisted}\n")).unwrap();
            let r = ConfigResolver::new(&config);
            for default in [0u32, 1280, u32::MAX] {
                assert_eq!(r.resolve(Some(1500u32), "mtu", default), 1500);
            }
        }
    }

    #[test]
    fn top_level_section_reads_unprefixed_keys() {
        let config = config();
        let r = ConfigResolver::with_section(&config, "");
        assert_eq!(r.string(None, "hostname", ""), "from-config.example.com");
    }

    #[test]
    fn parse_duration_accepts_go_style_units() {
        let fallback = Duration::from_secs(5);
        assert_eq!(parse_duration("10s", fallback), Duration::from_secs(10));
        assert_eq!(parse_duration("250ms", fallback), Duration::from_millis(250));
        assert_eq!(parse_duration("1m 30s", fallback), Duration::from_secs(90));
        assert_eq!(parse_duration("1h30m", fallback), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5s", fallback), Duration::from_millis(1500));
        assert_eq!(parse_duration("300us", fallback), Duration::from_micros(300));
    }

    #[test]
    fn parse_duration_falls_back_on_empty_or_invalid() {
        let fallback = Duration::from_secs(5);
        assert_eq!(parse_duration("", fallback), fallback);
        assert_eq!(parse_duration("   ", fallback), fallback);
        assert_eq!(parse_duration("soon", fallback), fallback);
    }
}
