// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Layered configuration for the daemon.
//!
//! Values resolve command line over environment over config file over
//! built-in default; the slot count has no environment spelling. Each
//! resolved value keeps the rung that supplied it so `--config-report`
//! can show where every setting came from.

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

const APP_DIR_NAME: &str = "myqs";
const CONFIG_FILE_NAME: &str = "myqsd.toml";
const CONFIG_ENV_VAR: &str = "MYQSD_CONFIG_PATH";
const POLL_INTERVAL_ENV_VAR: &str = "MYQSD_POLL_INTERVAL_SECS";
const VERBOSE_ENV_VAR: &str = "MYQSD_VERBOSE";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// The effective daemon settings once every layer is applied.
#[derive(Debug)]
pub struct Config {
    /// `None` when neither the command line nor the config file named
    /// a slot count.
    pub slots: Option<u32>,
    pub poll_interval_secs: u64,
    pub verbose: bool,
    /// The file consulted, if any rung named one.
    #[allow(dead_code)]
    pub config_path: Option<PathBuf>,
}

/// The rung that supplied a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Env => "env",
            Self::ConfigFile => "config",
            Self::Default => "default",
        }
    }
}

/// A resolved value tagged with its provenance.
#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

/// Everything `--config-report` prints.
#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub slots: ConfigValue<Option<u32>>,
    pub poll_interval_secs: ConfigValue<u64>,
    pub verbose: ConfigValue<bool>,
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

/// Values the command line forces over every other layer.
#[derive(Debug, Default)]
pub struct Overrides {
    pub slots: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub verbose: Option<bool>,
}

/// What `myqsd.toml` may contain. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    slots: Option<u32>,
    poll_interval_secs: Option<u64>,
    verbose: Option<bool>,
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let choice = find_config_file(config_path_override)?;
    let (file_config, config_file_present) = match &choice {
        Some(choice) => load_config_file(choice)?,
        None => (FileConfig::default(), false),
    };

    let slots = pick(
        overrides.slots.map(Some),
        || Ok(None),
        file_config.slots.map(Some),
        None,
    )?;
    if slots.value == Some(0) {
        bail!("slots must be a positive integer");
    }

    let poll_interval_secs = pick(
        overrides.poll_interval_secs,
        poll_interval_from_env,
        file_config.poll_interval_secs,
        DEFAULT_POLL_INTERVAL_SECS,
    )?;
    if poll_interval_secs.value == 0 {
        bail!("poll interval must be a positive number of seconds");
    }

    let verbose = pick(
        overrides.verbose,
        verbose_from_env,
        file_config.verbose,
        false,
    )?;

    let (config_path, config_path_source) = match choice {
        Some(choice) => (Some(choice.path), Some(choice.source)),
        None => (None, None),
    };
    let config = Config {
        slots: slots.value,
        poll_interval_secs: poll_interval_secs.value,
        verbose: verbose.value,
        config_path: config_path.clone(),
    };
    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        slots,
        poll_interval_secs,
        verbose,
    };
    Ok(LoadResult { config, report })
}

/// Resolves one value through the rungs, highest first. The
/// environment rung is consulted only when no flag forced the value.
fn pick<T>(
    forced: Option<T>,
    env: impl FnOnce() -> Result<Option<T>>,
    file: Option<T>,
    fallback: T,
) -> Result<ConfigValue<T>> {
    let picked = if let Some(value) = forced {
        ConfigValue {
            value,
            source: ConfigSource::Override,
        }
    } else if let Some(value) = env()? {
        ConfigValue {
            value,
            source: ConfigSource::Env,
        }
    } else if let Some(value) = file {
        ConfigValue {
            value,
            source: ConfigSource::ConfigFile,
        }
    } else {
        ConfigValue {
            value: fallback,
            source: ConfigSource::Default,
        }
    };
    Ok(picked)
}

/// Where the config file search landed.
struct ConfigFilePath {
    path: PathBuf,
    source: ConfigSource,
    /// An explicitly named file must exist; the default location may
    /// be absent.
    explicit: bool,
}

/// Walks the config file rungs: `--config`, then `MYQSD_CONFIG_PATH`,
/// then the per-user default location.
fn find_config_file(cli_path: Option<PathBuf>) -> Result<Option<ConfigFilePath>> {
    if let Some(path) = cli_path {
        return Ok(Some(ConfigFilePath {
            path: expand_tilde(path),
            source: ConfigSource::Override,
            explicit: true,
        }));
    }
    if let Some(value) = std::env::var_os(CONFIG_ENV_VAR) {
        if value.is_empty() {
            bail!("{CONFIG_ENV_VAR} is set but empty");
        }
        return Ok(Some(ConfigFilePath {
            path: expand_tilde(PathBuf::from(value)),
            source: ConfigSource::Env,
            explicit: true,
        }));
    }
    Ok(dirs::config_dir().map(|base| ConfigFilePath {
        path: base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME),
        source: ConfigSource::Default,
        explicit: false,
    }))
}

/// Reads the chosen file, reporting whether it was present.
fn load_config_file(choice: &ConfigFilePath) -> Result<(FileConfig, bool)> {
    let contents = match fs::read_to_string(&choice.path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if choice.explicit {
                bail!("config file not found at {}", choice.path.display());
            }
            return Ok((FileConfig::default(), false));
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read config file {}", choice.path.display())
            });
        }
    };
    let parsed = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", choice.path.display()))?;
    Ok((parsed, true))
}

fn expand_tilde(path: PathBuf) -> PathBuf {
    let raw = path.to_string_lossy().into_owned();
    let expanded = shellexpand::tilde(&raw);
    PathBuf::from(expanded.as_ref())
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn poll_interval_from_env() -> Result<Option<u64>> {
    let Some(value) = env_trimmed(POLL_INTERVAL_ENV_VAR) else {
        return Ok(None);
    };
    let secs = value.parse::<u64>().with_context(|| {
        format!("{POLL_INTERVAL_ENV_VAR} must be a whole number of seconds, got {value:?}")
    })?;
    Ok(Some(secs))
}

fn verbose_from_env() -> Result<Option<bool>> {
    let Some(value) = env_trimmed(VERBOSE_ENV_VAR) else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => bail!("{VERBOSE_ENV_VAR} must be a boolean, got {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());
    const SANDBOX_VARS: [&str; 3] = [CONFIG_ENV_VAR, POLL_INTERVAL_ENV_VAR, VERBOSE_ENV_VAR];

    /// Holds the env lock for the test's duration, with every daemon
    /// variable cleared on entry and restored on drop.
    struct EnvSandbox {
        saved: Vec<(&'static str, Option<OsString>)>,
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvSandbox {
        fn clean() -> Self {
            let lock = ENV_LOCK.lock().unwrap();
            let saved = SANDBOX_VARS
                .iter()
                .map(|&name| {
                    let previous = std::env::var_os(name);
                    // SAFETY: mutations are serialized by the lock held
                    // in _lock.
                    unsafe { std::env::remove_var(name) };
                    (name, previous)
                })
                .collect();
            Self { saved, _lock: lock }
        }

        fn set(&self, name: &'static str, value: &str) {
            // SAFETY: mutations are serialized by the lock held in
            // _lock.
            unsafe { std::env::set_var(name, value) };
        }
    }

    impl Drop for EnvSandbox {
        fn drop(&mut self) {
            // SAFETY: mutations are serialized by the lock held in
            // _lock.
            for (name, previous) in self.saved.drain(..) {
                match previous {
                    Some(value) => unsafe { std::env::set_var(name, value) },
                    None => unsafe { std::env::remove_var(name) },
                }
            }
        }
    }

    fn config_file_with(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, contents).unwrap();
        path
    }

    fn config_of(path: PathBuf, overrides: Overrides) -> Config {
        load_with_report(Some(path), overrides).unwrap().config
    }

    #[test]
    fn missing_file_at_the_default_location_is_fine() {
        let dir = TempDir::new().unwrap();
        let choice = ConfigFilePath {
            path: dir.path().join("absent.toml"),
            source: ConfigSource::Default,
            explicit: false,
        };
        let (file_config, present) = load_config_file(&choice).unwrap();
        assert!(!present);
        assert!(file_config.slots.is_none());
        assert!(file_config.poll_interval_secs.is_none());
    }

    #[test]
    fn missing_file_named_explicitly_is_an_error() {
        let dir = TempDir::new().unwrap();
        let choice = ConfigFilePath {
            path: dir.path().join("absent.toml"),
            source: ConfigSource::Override,
            explicit: true,
        };
        let err = load_config_file(&choice).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn reads_slots_and_poll_interval_from_config() {
        let _sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\npoll_interval_secs = 9\n");

        let config = config_of(path.clone(), Overrides::default());
        assert_eq!(config.slots, Some(8));
        assert_eq!(config.poll_interval_secs, 9);
        assert!(!config.verbose);
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn flags_beat_the_config_file() {
        let _sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\npoll_interval_secs = 9\nverbose = false\n");

        let config = config_of(
            path,
            Overrides {
                slots: Some(2),
                poll_interval_secs: Some(4),
                verbose: Some(true),
            },
        );
        assert_eq!(config.slots, Some(2));
        assert_eq!(config.poll_interval_secs, 4);
        assert!(config.verbose);
    }

    #[test]
    fn each_flag_overrides_independently() {
        let _sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\npoll_interval_secs = 9\n");

        let config = config_of(
            path,
            Overrides {
                poll_interval_secs: Some(4),
                ..Overrides::default()
            },
        );
        assert_eq!(config.slots, Some(8));
        assert_eq!(config.poll_interval_secs, 4);
    }

    #[test]
    fn poll_interval_falls_back_to_the_default() {
        let _sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\n");

        let LoadResult { config, report } =
            load_with_report(Some(path), Overrides::default()).unwrap();
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(report.poll_interval_secs.source, ConfigSource::Default);
        assert_eq!(report.slots.source, ConfigSource::ConfigFile);
    }

    #[test]
    fn verbose_comes_from_the_config_file() {
        let _sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\nverbose = true\n");

        let LoadResult { config, report } =
            load_with_report(Some(path), Overrides::default()).unwrap();
        assert!(config.verbose);
        assert_eq!(report.verbose.source, ConfigSource::ConfigFile);
    }

    #[test]
    fn zero_slots_in_config_is_rejected() {
        let _sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 0\n");

        let err = load_with_report(Some(path), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("slots must be a positive integer"));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let _sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\npoll_interval_secs = 0\n");

        let err = load_with_report(Some(path), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("poll interval"));
    }

    #[test]
    fn env_names_the_config_file_when_no_flag_does() {
        let sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\npoll_interval_secs = 9\n");
        sandbox.set(CONFIG_ENV_VAR, path.to_str().unwrap());

        let LoadResult { config, report } = load_with_report(None, Overrides::default()).unwrap();
        assert_eq!(config.slots, Some(8));
        assert_eq!(config.config_path, Some(path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Env));
        assert!(report.config_file_present);
    }

    #[test]
    fn config_flag_beats_the_env_path() {
        let sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join("env.toml");
        let cli_path = dir.path().join("cli.toml");
        fs::write(&env_path, "slots = 8\n").unwrap();
        fs::write(&cli_path, "slots = 4\n").unwrap();
        sandbox.set(CONFIG_ENV_VAR, env_path.to_str().unwrap());

        let LoadResult { config, report } =
            load_with_report(Some(cli_path.clone()), Overrides::default()).unwrap();
        assert_eq!(config.slots, Some(4));
        assert_eq!(config.config_path, Some(cli_path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Override));
    }

    #[test]
    fn env_poll_interval_beats_config_file() {
        let sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\npoll_interval_secs = 9\n");
        sandbox.set(POLL_INTERVAL_ENV_VAR, "5");

        let LoadResult { config, report } =
            load_with_report(Some(path), Overrides::default()).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(report.poll_interval_secs.source, ConfigSource::Env);
    }

    #[test]
    fn cli_poll_interval_beats_env() {
        let sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\n");
        sandbox.set(POLL_INTERVAL_ENV_VAR, "5");

        let config = config_of(
            path,
            Overrides {
                poll_interval_secs: Some(3),
                ..Overrides::default()
            },
        );
        assert_eq!(config.poll_interval_secs, 3);
    }

    #[test]
    fn env_verbose_accepts_common_spellings() {
        let sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\n");

        for (spelling, expected) in [("1", true), ("TRUE", true), ("off", false), ("no", false)] {
            sandbox.set(VERBOSE_ENV_VAR, spelling);
            let config = config_of(path.clone(), Overrides::default());
            assert_eq!(config.verbose, expected, "spelling {spelling:?}");
        }
    }

    #[test]
    fn garbage_env_verbose_errors() {
        let sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\n");
        sandbox.set(VERBOSE_ENV_VAR, "maybe");

        let err = load_with_report(Some(path), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains(VERBOSE_ENV_VAR));
    }

    #[test]
    fn blank_env_values_count_as_unset() {
        let sandbox = EnvSandbox::clean();
        let dir = TempDir::new().unwrap();
        let path = config_file_with(&dir, "slots = 8\npoll_interval_secs = 9\n");
        sandbox.set(POLL_INTERVAL_ENV_VAR, "  ");
        sandbox.set(VERBOSE_ENV_VAR, "");

        let LoadResult { config, report } =
            load_with_report(Some(path), Overrides::default()).unwrap();
        assert_eq!(config.poll_interval_secs, 9);
        assert_eq!(report.poll_interval_secs.source, ConfigSource::ConfigFile);
        assert!(!config.verbose);
    }
}
