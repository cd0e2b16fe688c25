#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::services::DEFAULT_PAGE_SIZE;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
pub enum ConfigKey {
    #[strum(serialize = "backend-url")]
    BackendURL,
    #[strum(serialize = "config-file")]
    ConfigFile,
    #[strum(serialize = "page-size")]
    PageSize,
    #[strum(serialize = "state-dir")]
    StateDir,
    #[strum(serialize = "timeout")]
    Timeout,
}

impl ConfigKey {
    fn is_numeric(&self) -> bool {
        return matches!(self, ConfigKey::PageSize | ConfigKey::Timeout);
    }
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let res = match key {
            ConfigKey::BackendURL => "http://localhost:8000".to_string(),
            ConfigKey::PageSize => DEFAULT_PAGE_SIZE.to_string(),
            ConfigKey::Timeout => DEFAULT_TIMEOUT_MS.to_string(),

            // Special
            ConfigKey::ConfigFile => base_dir(dirs::config_dir())
                .join("parley/config.toml")
                .to_string_lossy()
                .to_string(),
            ConfigKey::StateDir => base_dir(dirs::cache_dir())
                .join("parley")
                .to_string_lossy()
                .to_string(),
        };

        return res;
    }

    pub fn page_size() -> usize {
        return parse_positive(&Config::get(ConfigKey::PageSize))
            .map(|val| return val as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE);
    }

    pub fn timeout() -> Duration {
        let millis =
            parse_positive(&Config::get(ConfigKey::Timeout)).unwrap_or(DEFAULT_TIMEOUT_MS);
        return Duration::from_millis(millis);
    }

    pub fn state_dir() -> path::PathBuf {
        return path::PathBuf::from(Config::get(ConfigKey::StateDir));
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }
        Config::set(ConfigKey::ConfigFile, &config_file);

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(&config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if key == ConfigKey::ConfigFile {
                    continue;
                }

                if let Some(val) = doc.get(&key.to_string()) {
                    // Use clap value parsers to do validation.
                    let mut possible_values = vec![];
                    if let Some(arg) = find_arg(&cmd, key) {
                        possible_values = arg
                            .get_possible_values()
                            .iter()
                            .map(|e| return e.get_name().to_string())
                            .collect::<Vec<String>>();
                    }

                    if let Some(val_int) = val.as_integer() {
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        if !possible_values.is_empty()
                            && !possible_values.contains(&val_str.to_string())
                        {
                            bail!(format!("config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}", possible_values.join(", ")));
                        }
                        Config::set(key, val_str);
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        for key in ConfigKey::iter().filter(|key| return key.is_numeric()) {
            let val = Config::get(key);
            if parse_positive(&val).is_none() {
                bail!(format!("'{key}' must be a positive integer, got: {val}"));
            }
        }

        tracing::debug!(
            backend_url = Config::get(ConfigKey::BackendURL),
            page_size = Config::get(ConfigKey::PageSize),
            state_dir = Config::get(ConfigKey::StateDir),
            timeout = Config::get(ConfigKey::Timeout),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = find_arg(&cmd, key)?;

                let mut description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name())
                        .collect::<Vec<_>>()
                        .join(", ");
                    description = format!("{description} [possible values: {}]", possible_values);
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if key.is_numeric() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}

fn find_arg(cmd: &Command, key: ConfigKey) -> Option<&clap::Arg> {
    let name = key.to_string();
    return cmd
        .get_arguments()
        .find(|e| return e.get_long() == Some(name.as_str()));
}

fn parse_positive(val: &str) -> Option<u64> {
    return val.trim().parse::<u64>().ok().filter(|val| return *val > 0);
}

fn base_dir(dir: Option<path::PathBuf>) -> path::PathBuf {
    return dir.unwrap_or_else(|| return path::PathBuf::from("."));
}
