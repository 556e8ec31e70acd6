use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Process-level configuration, layered TOML-file-then-env the way `figment` is meant to be used:
/// defaults, then an optional file, then `RANGEJOIN_*` env overrides win last.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default staleness (microseconds) applied to a join that doesn't specify its own.
    pub default_staleness_us: u64,
    /// Largest triecut length for which the ahash shortcut map is worth maintaining.
    pub hash_shortcut_max_triecut: usize,
    /// Thread-local log verbosity installed at `EngineConfig::apply`.
    pub log_level: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_staleness_us: 0,
            hash_shortcut_max_triecut: 8,
            log_level: 2,
        }
    }
}

impl EngineConfig {
    /// Loads defaults, then `path` if it exists, then `RANGEJOIN_`-prefixed env vars.
    pub fn load(path: Option<&str>) -> Result<Self, figment::Error> {
        let mut f = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            f = f.merge(Toml::file(path));
        }
        f = f.merge(Env::prefixed("RANGEJOIN_"));
        f.extract()
    }

    /// Installs this config's log level into the calling thread's logger.
    pub fn apply(&self) {
        crate::log::set_log_level(self.log_level);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_round_trip_through_figment() {
        let cfg = EngineConfig::load(None).unwrap();
        assert_eq!(cfg.hash_shortcut_max_triecut, 8);
        assert_eq!(cfg.default_staleness_us, 0);
    }

    #[test]
    fn env_override_wins() {
        std::env::set_var("RANGEJOIN_LOG_LEVEL", "5");
        let cfg = EngineConfig::load(None).unwrap();
        assert_eq!(cfg.log_level, 5);
        std::env::remove_var("RANGEJOIN_LOG_LEVEL");
    }
}
