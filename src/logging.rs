use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

use crate::config::Settings;

/// Map a `log_level` setting to a filter. Unknown names fall back to `Warn`.
pub fn level_filter(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Warn)
}

fn log_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(std::path::Path::new(&home).join(".local/share/flux-shell"))
}

/// Install a file logger at ~/.local/share/flux-shell/flux.log.
/// Best-effort: failures leave logging disabled (logging must never block the shell).
pub fn init(settings: &Settings) {
    let level = level_filter(&settings.log_level);
    if level == LevelFilter::Off {
        return;
    }
    let Some(dir) = log_dir() else {
        return;
    };
    let _ = std::fs::create_dir_all(&dir);

    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("flux.log"))
    else {
        return;
    };

    let config = ConfigBuilder::new().set_thread_level(LevelFilter::Off).build();
    if WriteLogger::init(level, config, file).is_ok() {
        log::info!("logging initialised at {level}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels() {
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter("off"), LevelFilter::Off);
        assert_eq!(level_filter("TRACE"), LevelFilter::Trace);
    }

    #[test]
    fn unknown_level_is_warn() {
        assert_eq!(level_filter("loud"), LevelFilter::Warn);
    }
}
