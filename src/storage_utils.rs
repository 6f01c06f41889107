use crate::indicators::{DEFAULT_MA_WINDOW, DEFAULT_RSI_PERIOD};
use crate::signals::DEFAULT_FLUCTUATION_THRESHOLD;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

// CONFIGURATION STRUCTS
// Deserialized from storage/config.json; missing sections fall back to defaults.

/// Alert threshold the interactive tool starts with, tighter than the operation default.
pub const CLI_FLUCTUATION_THRESHOLD: f64 = 5.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub window_size: usize,         // moving average and volatility band window
    pub rsi_period: usize,          // e.g., 2 bars
    pub fluctuation_threshold: f64, // percent
}

impl IndicatorConfig {
    /// Configured alert threshold in percent. Negative or non-finite values fall back to the
    /// operation default.
    pub fn threshold(&self) -> f64 {
        if self.fluctuation_threshold.is_finite() && self.fluctuation_threshold >= 0.0 {
            self.fluctuation_threshold
        } else {
            warn!(
                "Ignoring fluctuation_threshold {}, using {}",
                self.fluctuation_threshold, DEFAULT_FLUCTUATION_THRESHOLD
            );
            DEFAULT_FLUCTUATION_THRESHOLD
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_MA_WINDOW,
            rsi_period: DEFAULT_RSI_PERIOD,
            fluctuation_threshold: CLI_FLUCTUATION_THRESHOLD,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub interval: String, // e.g., "1d", "1wk"
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            interval: "1d".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) stock-charter/0.1".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub default_style: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            default_style: "default".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub indicators: IndicatorConfig,
    pub source: SourceConfig,
    pub chart: ChartConfig,
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Creates a manager rooted at `relative_path` next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);
        Self::at(base_dir).await
    }

    /// Creates a manager rooted at an explicit directory, creating it if needed.
    pub async fn at(base_dir: PathBuf) -> anyhow::Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    /// Serializes `data` as pretty JSON. Writes a .tmp file first and renames it over the target.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let file_name = format!("{}.json", filename);
        let final_path = self.base_dir.join(&file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        let json_bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));
        let content = fs::read(path).await?;
        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Loads `config.json`, writing the defaults first when the file does not exist yet.
    pub async fn load_or_init_config(&self) -> anyhow::Result<AppConfig> {
        let path = self.base_dir.join("config.json");
        if !path.exists() {
            let config = AppConfig::default();
            if let Err(e) = self.save("config", &config).await {
                warn!("Could not write default config to {:?}: {}", path, e);
            } else {
                info!("Wrote default config to {:?}", path);
            }
            return Ok(config);
        }
        self.load("config").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stock-charter-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn missing_config_is_initialised_with_defaults() {
        let dir = scratch_dir("init");
        let _ = fs::remove_dir_all(&dir).await;
        let storage = AsyncStorageManager::at(dir.clone()).await.unwrap();

        let config = storage.load_or_init_config().await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(dir.join("config.json").exists());
        assert!(!dir.join("config.json.tmp").exists());

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn partial_config_keeps_defaults_for_missing_fields() {
        let dir = scratch_dir("partial");
        let _ = fs::remove_dir_all(&dir).await;
        let storage = AsyncStorageManager::at(dir.clone()).await.unwrap();
        fs::write(
            dir.join("config.json"),
            r#"{ "indicators": { "window_size": 10 }, "chart": { "default_style": "bmh" } }"#,
        )
        .await
        .unwrap();

        let config = storage.load_or_init_config().await.unwrap();
        assert_eq!(config.indicators.window_size, 10);
        assert_eq!(config.indicators.rsi_period, DEFAULT_RSI_PERIOD);
        assert_eq!(config.chart.default_style, "bmh");
        assert_eq!(config.chart.width, 1000);
        assert_eq!(config.source, SourceConfig::default());

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn cli_threshold_defaults_to_five_percent() {
        let config = IndicatorConfig::default();
        assert_eq!(config.threshold(), 5.0);
        assert!(config.threshold() < DEFAULT_FLUCTUATION_THRESHOLD);
    }

    #[test]
    fn unusable_threshold_falls_back_to_operation_default() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let config = IndicatorConfig {
                fluctuation_threshold: bad,
                ..IndicatorConfig::default()
            };
            assert_eq!(config.threshold(), DEFAULT_FLUCTUATION_THRESHOLD);
        }
    }
}
