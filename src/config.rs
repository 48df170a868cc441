use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::host::memory::MemoryStore;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Why a configuration file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    /// Initial environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Initial aliases.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Root process name, used as the stderr prefix of the shell itself.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Warn once per session that external programs ignore pipes and redirections.
    #[serde(default = "default_true")]
    pub warn_external: bool,
    #[serde(default = "default_true")]
    pub color_errors: bool,
}

fn default_name() -> String {
    "flux".into()
}

fn default_history_size() -> usize {
    30
}

fn default_log_level() -> String {
    "warn".into()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: default_name(),
            history_size: default_history_size(),
            log_level: default_log_level(),
            warn_external: true,
            color_errors: true,
        }
    }
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    env: TableOverlay,
    #[serde(default)]
    aliases: TableOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    name: Option<String>,
    history_size: Option<usize>,
    log_level: Option<String>,
    warn_external: Option<bool>,
    color_errors: Option<bool>,
}

/// A key/value section: plain keys add or override, `replace` drops the
/// defaults first, `remove` deletes keys from the defaults.
#[derive(Debug, Deserialize, Default)]
struct TableOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    remove: Vec<String>,
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

// ── Merge logic ──

/// Merge an overlay table into a base table.
fn merge_table(base: &mut BTreeMap<String, String>, overlay: TableOverlay) {
    if overlay.replace {
        base.clear();
    } else {
        for key in &overlay.remove {
            base.remove(key);
        }
    }
    base.extend(overlay.entries);
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/flux-shell/config.toml (if exists)
    ///
    /// A broken overlay is reported on stderr and ignored.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        let Some(path) = Self::overlay_path() else {
            return config;
        };
        if !path.exists() {
            return config;
        }
        match Self::load_overlay(&path) {
            Ok(overlay) => config.apply_overlay(overlay),
            Err(e) => {
                log::warn!("ignoring user config: {e}");
                eprintln!("flux: config error: {e}");
            }
        }
        config
    }

    fn overlay_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/flux-shell/config.toml"))
    }

    fn load_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        // Settings: scalar overrides
        let s = overlay.settings;
        if let Some(v) = s.name {
            self.settings.name = v;
        }
        if let Some(v) = s.history_size {
            self.settings.history_size = v;
        }
        if let Some(v) = s.log_level {
            self.settings.log_level = v;
        }
        if let Some(v) = s.warn_external {
            self.settings.warn_external = v;
        }
        if let Some(v) = s.color_errors {
            self.settings.color_errors = v;
        }

        merge_table(&mut self.env, overlay.env);
        merge_table(&mut self.aliases, overlay.aliases);
    }

    /// The `env` and `aliases` tables as a store the shell reads at startup.
    pub fn store(&self) -> MemoryStore {
        let mut store = MemoryStore::default();
        for (key, value) in &self.env {
            store.insert("env", key.clone(), value.clone());
        }
        for (key, value) in &self.aliases {
            store.insert("aliases", key.clone(), value.clone());
        }
        store
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
