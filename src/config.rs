use crate::weather::BaseTime;
use anyhow::Context;
use log::{info, warn};
use serde::Deserialize;
use std::{env, fs::File, io, path::Path, time::Duration};

/// App configuration, loaded once at startup and handed to whatever needs it
#[derive(Clone, Debug)]
pub struct Config {
    /// Needed only when a city isn't in the built-in table
    pub google_api_key: Option<String>,
    /// Service key for the weather observation API
    pub weather_api_key: Option<String>,
    pub base_time: BaseTime,
    pub request_timeout: Duration,
    pub geocode_url: String,
    pub weather_url: String,
}

/// On-disk shape of the config file. Everything is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    google_api_key: Option<String>,
    weather_api_key: Option<String>,
    base_time: Option<BaseTime>,
    request_timeout_secs: Option<u64>,
    geocode_url: Option<String>,
    weather_url: Option<String>,
}

impl Config {
    const PATH: &'static str = "./config.json";
    const ENV_GOOGLE_API_KEY: &'static str = "GOOGLE_MAPS_API_KEY";
    const ENV_WEATHER_API_KEY: &'static str = "WEATHER_API_KEY";
    const ENV_BASE_TIME: &'static str = "WEATHER_BASE_TIME";

    pub const DEFAULT_GEOCODE_URL: &'static str =
        "https://maps.googleapis.com/maps/api/geocode/json";
    pub const DEFAULT_WEATHER_URL: &'static str = "http://apis.data.go.kr/1360000/VilageFcstInfoService_2.0/getUltraSrtNcst";
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Load config from the optional config file, then apply environment
    /// overrides
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new(Self::PATH))
    }

    /// Load config from a specific file. A missing file just means defaults
    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let file = match File::open(path) {
            Ok(file) => {
                info!("Loading config from `{}`", path.display());
                serde_json::from_reader(file).with_context(|| {
                    format!("Error parsing config file {}", path.display())
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("No config file at `{}`, using defaults", path.display());
                ConfigFile::default()
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Error opening config file {}", path.display())
                })
            }
        };
        let config = Self::from_sources(file, |key| env::var(key).ok())?;

        if config.google_api_key.is_none() {
            warn!(
                "{} is not set; only built-in cities can be looked up",
                Self::ENV_GOOGLE_API_KEY
            );
        }
        if config.weather_api_key.is_none() {
            warn!(
                "{} is not set; weather requests will fail",
                Self::ENV_WEATHER_API_KEY
            );
        }
        Ok(config)
    }

    /// Merge the config file with the environment. Environment wins. Empty
    /// variables count as unset.
    fn from_sources(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let env =
            |key: &str| env(key).filter(|value: &String| !value.is_empty());

        let base_time = match env(Self::ENV_BASE_TIME) {
            Some(value) => value.parse().with_context(|| {
                format!("Invalid {}", Self::ENV_BASE_TIME)
            })?,
            None => file.base_time.unwrap_or_default(),
        };

        Ok(Self {
            google_api_key: env(Self::ENV_GOOGLE_API_KEY)
                .or(file.google_api_key),
            weather_api_key: env(Self::ENV_WEATHER_API_KEY)
                .or(file.weather_api_key),
            base_time,
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(Self::DEFAULT_TIMEOUT),
            geocode_url: file
                .geocode_url
                .unwrap_or_else(|| Self::DEFAULT_GEOCODE_URL.into()),
            weather_url: file
                .weather_url
                .unwrap_or_else(|| Self::DEFAULT_WEATHER_URL.into()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            weather_api_key: None,
            base_time: BaseTime::default(),
            request_timeout: Self::DEFAULT_TIMEOUT,
            geocode_url: Self::DEFAULT_GEOCODE_URL.into(),
            weather_url: Self::DEFAULT_WEATHER_URL.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, fs};

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_sources(ConfigFile::default(), env(&[])).unwrap();
        assert_eq!(config.google_api_key, None);
        assert_eq!(config.weather_api_key, None);
        assert_eq!(config.base_time, BaseTime::default());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.geocode_url, Config::DEFAULT_GEOCODE_URL);
        assert_eq!(config.weather_url, Config::DEFAULT_WEATHER_URL);
    }

    #[test]
    fn test_file() {
        let file: ConfigFile = serde_json::from_str(
            r#"{
                "google_api_key": "g",
                "weather_api_key": "w",
                "base_time": "latest",
                "request_timeout_secs": 5
            }"#,
        )
        .unwrap();
        let config = Config::from_sources(file, env(&[])).unwrap();
        assert_eq!(config.google_api_key.as_deref(), Some("g"));
        assert_eq!(config.weather_api_key.as_deref(), Some("w"));
        assert_eq!(config.base_time, BaseTime::Latest);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            google_api_key: Some("from file".into()),
            weather_api_key: Some("from file".into()),
            ..Default::default()
        };
        let config = Config::from_sources(
            file,
            env(&[
                ("GOOGLE_MAPS_API_KEY", "from env"),
                ("WEATHER_API_KEY", ""),
                ("WEATHER_BASE_TIME", "1300"),
            ]),
        )
        .unwrap();
        assert_eq!(config.google_api_key.as_deref(), Some("from env"));
        // Empty variable doesn't clobber the file
        assert_eq!(config.weather_api_key.as_deref(), Some("from file"));
        assert_eq!(config.base_time, "1300".parse::<BaseTime>().unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config::load_from(&path).unwrap();
        // Only check fields the environment can't override
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.geocode_url, Config::DEFAULT_GEOCODE_URL);
        assert_eq!(config.weather_url, Config::DEFAULT_WEATHER_URL);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"request_timeout_secs": 5, "weather_url": "http://localhost/"}"#,
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.weather_url, "http://localhost/");
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, "{\"google_api_key\": ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(
            err.to_string().contains("Error parsing config file"),
            "{err}"
        );

        fs::write(&path, r#"{"request_timeout_secs": "soon"}"#).unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_invalid() {
        assert!(Config::from_sources(
            ConfigFile::default(),
            env(&[("WEATHER_BASE_TIME", "25:00")])
        )
        .is_err());
        assert!(serde_json::from_str::<ConfigFile>(r#"{"base_time": "6"}"#)
            .is_err());
        assert!(
            serde_json::from_str::<ConfigFile>(r#"{"api_key": "x"}"#).is_err()
        );
    }
}
