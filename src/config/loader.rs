//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（versevox.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, SynthesisProvider};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["versevox", "versevox.local"];

/// API Key 的后备环境变量
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `VERSEVOX_`，层级分隔符 `__`）
/// 2. 配置文件（versevox.toml 或 versevox.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `VERSEVOX_DISPATCH__POOL_SIZE=20`
/// - `VERSEVOX_PATHS__AUDIO_DIR=/data/wav`
/// - `VERSEVOX_SYNTHESIS__PROVIDER=fake`
/// - `GEMINI_API_KEY=...`（未配置 `synthesis.api_key` 时使用）
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 配置文件（如果存在）；缺省值由各结构体的 serde default 提供
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 2. 环境变量（最高优先级）
    // 例如: VERSEVOX_DISPATCH__POOL_SIZE=20
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("VERSEVOX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let mut app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    if app_config.synthesis.api_key.is_none() {
        app_config.synthesis.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
    }

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    config
        .chunker
        .chunker_config()
        .validate()
        .map_err(ConfigError::ValidationError)?;

    if config.dispatch.pool_size == 0 {
        return Err(ConfigError::ValidationError(
            "Pool size cannot be 0".to_string(),
        ));
    }

    if config.dispatch.idle_timeout_secs == 0 || config.dispatch.segment_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Dispatch timeouts cannot be 0".to_string(),
        ));
    }

    if config.synthesis.provider == SynthesisProvider::Live && config.synthesis.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Synthesis URL cannot be empty".to_string(),
        ));
    }

    if config.synthesis.replacements.iter().any(|r| r.from.is_empty()) {
        return Err(ConfigError::ValidationError(
            "Replacement source text cannot be empty".to_string(),
        ));
    }

    if config.synthesis.sample_rate == 0 {
        return Err(ConfigError::ValidationError(
            "Sample rate cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Input Directory: {:?}", config.paths.input_dir);
    tracing::info!("Segments Directory: {:?}", config.paths.segments_dir);
    tracing::info!("Audio Directory: {:?}", config.paths.audio_dir);
    tracing::info!(
        "Chunker: min {} / max {} chars",
        config.chunker.min_chars,
        config.chunker.max_chars
    );
    tracing::info!("Pool Size: {}", config.dispatch.pool_size);
    tracing::info!("Max Retries: {}", config.dispatch.max_retries);
    tracing::info!(
        "Timeouts: idle {}s, segment {}s, close grace {}ms",
        config.dispatch.idle_timeout_secs,
        config.dispatch.segment_timeout_secs,
        config.dispatch.close_grace_ms
    );
    tracing::info!("Synthesis Provider: {:?}", config.synthesis.provider);
    if config.synthesis.provider == SynthesisProvider::Live {
        tracing::info!("Synthesis URL: {}", config.synthesis.url);
        tracing::info!("Model: {}", config.synthesis.model);
        tracing::info!(
            "Voice: {} ({})",
            config.synthesis.voice_name,
            config.synthesis.language_code
        );
        tracing::info!(
            "API Key: {}",
            if config.synthesis.api_key.is_some() {
                "<redacted>"
            } else {
                "<not set>"
            }
        );
    }
    tracing::info!("Replacements: {}", config.synthesis.replacements.len());
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Replacement;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_pool_size() {
        let mut config = AppConfig::default();
        config.dispatch.pool_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_inverted_chunker_bounds() {
        let mut config = AppConfig::default();
        config.chunker.min_chars = 200;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_timeout() {
        let mut config = AppConfig::default();
        config.dispatch.idle_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_replacement() {
        let mut config = AppConfig::default();
        config.synthesis.replacements = vec![Replacement::new("", "Herr")];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_empty_url_allowed_for_fake_provider() {
        let mut config = AppConfig::default();
        config.synthesis.url = String::new();
        assert!(validate_config(&config).is_err());

        config.synthesis.provider = SynthesisProvider::Fake;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[paths]
audio_dir = "out/wav"

[dispatch]
pool_size = 8
max_retries = 2

[synthesis]
provider = "fake"
api_key = "from-file"

[[synthesis.replacements]]
from = "ZEBAOTH"
to = "Zebaoth"

[[synthesis.replacements]]
from = "HERR"
to = "Herr"
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.paths.audio_dir, std::path::PathBuf::from("out/wav"));
        assert_eq!(config.paths.input_dir, std::path::PathBuf::from("txt"));
        assert_eq!(config.dispatch.pool_size, 8);
        assert_eq!(config.dispatch.max_retries, 2);
        assert_eq!(config.dispatch.idle_timeout_secs, 30);
        assert_eq!(config.synthesis.provider, SynthesisProvider::Fake);
        assert_eq!(config.synthesis.api_key.as_deref(), Some("from-file"));
        assert_eq!(
            config.synthesis.replacements,
            vec![
                Replacement::new("ZEBAOTH", "Zebaoth"),
                Replacement::new("HERR", "Herr"),
            ]
        );
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = load_config_from_path(Some(Path::new("/nonexistent/versevox.toml")));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
