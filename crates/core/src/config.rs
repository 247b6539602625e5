use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::{ProfileSettings, DEFAULT_TREND_DEAD_ZONE};
use crate::ranking::DEFAULT_TOP_N;
use crate::risk::{RiskThresholds, DEFAULT_LOW_SUPPLIER_RATING};
use crate::scoring::{ScoringWeights, DEFAULT_TIE_EPSILON, DEFAULT_WEIGHTS};

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["wattwise.toml", "config/wattwise.toml"];

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub ranking: RankingConfig,
    pub scoring: ScoringConfig,
    pub risk: RiskConfig,
    pub usage: UsageConfig,
    pub explanation: ExplanationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankingConfig {
    pub top_n: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoringConfig {
    pub cost_low: f64,
    pub cost_medium: f64,
    pub cost_high: f64,
    pub renewable: f64,
    pub flexibility: f64,
    pub contract_match_bonus: f64,
    pub termination_fee_penalty: f64,
    pub tie_epsilon: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RiskConfig {
    pub termination_fee_multiplier: f64,
    pub critical_fee_multiplier: f64,
    pub low_supplier_rating: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UsageConfig {
    pub trend_dead_zone_ratio: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExplanationConfig {
    pub enabled: bool,
    /// Shared budget for explaining the whole top-N list.
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub top_n: Option<usize>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub explanation_enabled: Option<bool>,
    pub explanation_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ranking: RankingConfig { top_n: DEFAULT_TOP_N },
            scoring: ScoringConfig {
                cost_low: DEFAULT_WEIGHTS.cost_low,
                cost_medium: DEFAULT_WEIGHTS.cost_medium,
                cost_high: DEFAULT_WEIGHTS.cost_high,
                renewable: DEFAULT_WEIGHTS.renewable,
                flexibility: DEFAULT_WEIGHTS.flexibility,
                contract_match_bonus: DEFAULT_WEIGHTS.contract_match_bonus,
                termination_fee_penalty: DEFAULT_WEIGHTS.termination_fee_penalty,
                tie_epsilon: DEFAULT_TIE_EPSILON,
            },
            risk: RiskConfig {
                termination_fee_multiplier: 1.5,
                critical_fee_multiplier: 3.0,
                low_supplier_rating: DEFAULT_LOW_SUPPLIER_RATING,
            },
            usage: UsageConfig {
                trend_dead_zone_ratio: DEFAULT_TREND_DEAD_ZONE,
            },
            explanation: ExplanationConfig { enabled: true, timeout_ms: 2_000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ScoringConfig {
    pub fn weights(&self) -> ScoringWeights {
        ScoringWeights {
            cost_low: self.cost_low,
            cost_medium: self.cost_medium,
            cost_high: self.cost_high,
            renewable: self.renewable,
            flexibility: self.flexibility,
            contract_match_bonus: self.contract_match_bonus,
            termination_fee_penalty: self.termination_fee_penalty,
        }
    }
}

impl RiskConfig {
    pub fn thresholds(&self) -> RiskThresholds {
        let defaults = RiskThresholds::default();
        RiskThresholds {
            termination_fee_multiplier: Decimal::from_f64(self.termination_fee_multiplier)
                .unwrap_or(defaults.termination_fee_multiplier),
            critical_fee_multiplier: Decimal::from_f64(self.critical_fee_multiplier)
                .unwrap_or(defaults.critical_fee_multiplier),
            low_supplier_rating: self.low_supplier_rating,
        }
    }
}

impl UsageConfig {
    pub fn profile_settings(&self) -> ProfileSettings {
        ProfileSettings { trend_dead_zone_ratio: self.trend_dead_zone_ratio }
    }
}

impl ExplanationConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl EngineConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(ranking) = patch.ranking {
            if let Some(top_n) = ranking.top_n {
                self.ranking.top_n = top_n;
            }
        }

        if let Some(scoring) = patch.scoring {
            let targets = [
                (scoring.cost_low, &mut self.scoring.cost_low),
                (scoring.cost_medium, &mut self.scoring.cost_medium),
                (scoring.cost_high, &mut self.scoring.cost_high),
                (scoring.renewable, &mut self.scoring.renewable),
                (scoring.flexibility, &mut self.scoring.flexibility),
                (scoring.contract_match_bonus, &mut self.scoring.contract_match_bonus),
                (scoring.termination_fee_penalty, &mut self.scoring.termination_fee_penalty),
                (scoring.tie_epsilon, &mut self.scoring.tie_epsilon),
            ];
            for (value, target) in targets {
                if let Some(value) = value {
                    *target = value;
                }
            }
        }

        if let Some(risk) = patch.risk {
            if let Some(multiplier) = risk.termination_fee_multiplier {
                self.risk.termination_fee_multiplier = multiplier;
            }
            if let Some(multiplier) = risk.critical_fee_multiplier {
                self.risk.critical_fee_multiplier = multiplier;
            }
            if let Some(rating) = risk.low_supplier_rating {
                self.risk.low_supplier_rating = rating;
            }
        }

        if let Some(usage) = patch.usage {
            if let Some(ratio) = usage.trend_dead_zone_ratio {
                self.usage.trend_dead_zone_ratio = ratio;
            }
        }

        if let Some(explanation) = patch.explanation {
            if let Some(enabled) = explanation.enabled {
                self.explanation.enabled = enabled;
            }
            if let Some(timeout_ms) = explanation.timeout_ms {
                self.explanation.timeout_ms = timeout_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("WATTWISE_RANKING_TOP_N") {
            self.ranking.top_n = parse_usize("WATTWISE_RANKING_TOP_N", &value)?;
        }

        let scoring_vars = [
            ("WATTWISE_SCORING_COST_LOW", &mut self.scoring.cost_low),
            ("WATTWISE_SCORING_COST_MEDIUM", &mut self.scoring.cost_medium),
            ("WATTWISE_SCORING_COST_HIGH", &mut self.scoring.cost_high),
            ("WATTWISE_SCORING_RENEWABLE", &mut self.scoring.renewable),
            ("WATTWISE_SCORING_FLEXIBILITY", &mut self.scoring.flexibility),
            ("WATTWISE_SCORING_CONTRACT_MATCH_BONUS", &mut self.scoring.contract_match_bonus),
            ("WATTWISE_SCORING_TERMINATION_FEE_PENALTY", &mut self.scoring.termination_fee_penalty),
            ("WATTWISE_SCORING_TIE_EPSILON", &mut self.scoring.tie_epsilon),
        ];
        for (key, target) in scoring_vars {
            if let Some(value) = read_env(key) {
                *target = parse_f64(key, &value)?;
            }
        }

        if let Some(value) = read_env("WATTWISE_RISK_TERMINATION_FEE_MULTIPLIER") {
            self.risk.termination_fee_multiplier =
                parse_f64("WATTWISE_RISK_TERMINATION_FEE_MULTIPLIER", &value)?;
        }
        if let Some(value) = read_env("WATTWISE_RISK_CRITICAL_FEE_MULTIPLIER") {
            self.risk.critical_fee_multiplier =
                parse_f64("WATTWISE_RISK_CRITICAL_FEE_MULTIPLIER", &value)?;
        }
        if let Some(value) = read_env("WATTWISE_RISK_LOW_SUPPLIER_RATING") {
            self.risk.low_supplier_rating = parse_f64("WATTWISE_RISK_LOW_SUPPLIER_RATING", &value)?;
        }

        if let Some(value) = read_env("WATTWISE_USAGE_TREND_DEAD_ZONE_RATIO") {
            self.usage.trend_dead_zone_ratio =
                parse_f64("WATTWISE_USAGE_TREND_DEAD_ZONE_RATIO", &value)?;
        }

        if let Some(value) = read_env("WATTWISE_EXPLANATION_ENABLED") {
            self.explanation.enabled = parse_bool("WATTWISE_EXPLANATION_ENABLED", &value)?;
        }
        if let Some(value) = read_env("WATTWISE_EXPLANATION_TIMEOUT_MS") {
            self.explanation.timeout_ms = parse_u64("WATTWISE_EXPLANATION_TIMEOUT_MS", &value)?;
        }

        let log_level =
            read_env("WATTWISE_LOGGING_LEVEL").or_else(|| read_env("WATTWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WATTWISE_LOGGING_FORMAT").or_else(|| read_env("WATTWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(top_n) = overrides.top_n {
            self.ranking.top_n = top_n;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(enabled) = overrides.explanation_enabled {
            self.explanation.enabled = enabled;
        }
        if let Some(timeout_ms) = overrides.explanation_timeout_ms {
            self.explanation.timeout_ms = timeout_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ranking(&self.ranking)?;
        validate_scoring(&self.scoring)?;
        validate_risk(&self.risk)?;
        validate_usage(&self.usage)?;
        validate_explanation(&self.explanation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Path of the config file `load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_ranking(ranking: &RankingConfig) -> Result<(), ConfigError> {
    if ranking.top_n == 0 || ranking.top_n > 50 {
        return Err(ConfigError::Validation("ranking.top_n must be in range 1..=50".to_string()));
    }
    Ok(())
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    let weights = [
        ("scoring.cost_low", scoring.cost_low),
        ("scoring.cost_medium", scoring.cost_medium),
        ("scoring.cost_high", scoring.cost_high),
        ("scoring.renewable", scoring.renewable),
        ("scoring.flexibility", scoring.flexibility),
        ("scoring.contract_match_bonus", scoring.contract_match_bonus),
        ("scoring.termination_fee_penalty", scoring.termination_fee_penalty),
    ];
    for (key, value) in weights {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0.0..=1.0")));
        }
    }

    if !(scoring.tie_epsilon > 0.0 && scoring.tie_epsilon < 0.01) {
        return Err(ConfigError::Validation(
            "scoring.tie_epsilon must be greater than 0 and below 0.01".to_string(),
        ));
    }

    Ok(())
}

fn validate_risk(risk: &RiskConfig) -> Result<(), ConfigError> {
    if !(risk.termination_fee_multiplier.is_finite() && risk.termination_fee_multiplier >= 1.0) {
        return Err(ConfigError::Validation(
            "risk.termination_fee_multiplier must be at least 1.0".to_string(),
        ));
    }

    if !(risk.critical_fee_multiplier.is_finite()
        && risk.critical_fee_multiplier >= risk.termination_fee_multiplier)
    {
        return Err(ConfigError::Validation(
            "risk.critical_fee_multiplier must be at least risk.termination_fee_multiplier"
                .to_string(),
        ));
    }

    if !(0.0..=5.0).contains(&risk.low_supplier_rating) {
        return Err(ConfigError::Validation(
            "risk.low_supplier_rating must be in range 0.0..=5.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_usage(usage: &UsageConfig) -> Result<(), ConfigError> {
    if !(0.0..1.0).contains(&usage.trend_dead_zone_ratio) {
        return Err(ConfigError::Validation(
            "usage.trend_dead_zone_ratio must be in range 0.0..1.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_explanation(explanation: &ExplanationConfig) -> Result<(), ConfigError> {
    if explanation.timeout_ms == 0 || explanation.timeout_ms > 30_000 {
        return Err(ConfigError::Validation(
            "explanation.timeout_ms must be in range 1..=30000".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    ranking: Option<RankingPatch>,
    scoring: Option<ScoringPatch>,
    risk: Option<RiskPatch>,
    usage: Option<UsagePatch>,
    explanation: Option<ExplanationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RankingPatch {
    top_n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScoringPatch {
    cost_low: Option<f64>,
    cost_medium: Option<f64>,
    cost_high: Option<f64>,
    renewable: Option<f64>,
    flexibility: Option<f64>,
    contract_match_bonus: Option<f64>,
    termination_fee_penalty: Option<f64>,
    tie_epsilon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RiskPatch {
    termination_fee_multiplier: Option<f64>,
    critical_fee_multiplier: Option<f64>,
    low_supplier_rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UsagePatch {
    trend_dead_zone_ratio: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExplanationPatch {
    enabled: Option<bool>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{ConfigError, ConfigOverrides, EngineConfig, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_engine_constants() -> Result<(), String> {
        let config = EngineConfig::default();

        ensure(config.ranking.top_n == 3, "default top_n should be 3")?;
        ensure(config.explanation.timeout_ms == 2_000, "default explanation budget is 2s")?;
        ensure(
            config.risk.thresholds().termination_fee_multiplier == Decimal::new(15, 1),
            "fee multiplier should convert to exactly 1.5",
        )?;
        ensure(config.validate().is_ok(), "defaults should validate")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_WATTWISE_TOP_N", "5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("wattwise.toml");
            fs::write(
                &path,
                r#"
[ranking]
top_n = ${TEST_WATTWISE_TOP_N}

[scoring]
cost_high = 0.7
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = EngineConfig::load(LoadOptions {
                config_path: Some(path),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.ranking.top_n == 5, "top_n should be interpolated from environment")?;
            ensure(
                (config.scoring.weights().cost_high - 0.7).abs() < f64::EPSILON,
                "file weight should be applied",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_WATTWISE_TOP_N"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WATTWISE_LOG_LEVEL", "warn");
        env::set_var("WATTWISE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = EngineConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["WATTWISE_LOG_LEVEL", "WATTWISE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WATTWISE_RANKING_TOP_N", "4");
        env::set_var("WATTWISE_EXPLANATION_TIMEOUT_MS", "750");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("wattwise.toml");
            fs::write(
                &path,
                r#"
[ranking]
top_n = 2

[explanation]
timeout_ms = 1500
enabled = false

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = EngineConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    top_n: Some(6),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.ranking.top_n == 6, "override top_n should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.explanation.timeout_ms == 750,
                "env timeout should win over file and defaults",
            )?;
            ensure(!config.explanation.enabled, "file value should win over default")?;
            Ok(())
        })();

        clear_vars(&["WATTWISE_RANKING_TOP_N", "WATTWISE_EXPLANATION_TIMEOUT_MS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WATTWISE_SCORING_COST_HIGH", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match EngineConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("scoring.cost_high")
            );
            ensure(has_message, "validation failure should mention scoring.cost_high")
        })();

        clear_vars(&["WATTWISE_SCORING_COST_HIGH"]);
        result
    }

    #[test]
    fn malformed_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WATTWISE_EXPLANATION_ENABLED", "maybe");

        let result = (|| -> Result<(), String> {
            let error = EngineConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "expected invalid override error".to_string())?;
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "WATTWISE_EXPLANATION_ENABLED"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["WATTWISE_EXPLANATION_ENABLED"]);
        result
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("missing.toml");

        let error = EngineConfig::load(LoadOptions {
            config_path: Some(path),
            require_file: true,
            ..LoadOptions::default()
        })
        .err()
        .ok_or_else(|| "expected missing file error".to_string())?;

        ensure(matches!(error, ConfigError::MissingConfigFile(_)), "missing file should be reported")
    }

    #[test]
    fn usage_grading_threshold_is_not_configurable() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("wattwise.toml");
        fs::write(
            &path,
            r#"
[usage]
trend_dead_zone_ratio = 0.05
min_partial_months = 1
"#,
        )
        .map_err(|err| err.to_string())?;

        let error = EngineConfig::load(LoadOptions {
            config_path: Some(path),
            ..LoadOptions::default()
        })
        .err()
        .ok_or_else(|| "expected unknown usage key to be rejected".to_string())?;

        ensure(
            matches!(error, ConfigError::ParseFile { .. }),
            "unknown usage key should fail file parsing",
        )
    }
}
