use std::env;
use std::fs;
use std::path::Path;

use toml::Value;
use wattwise_core::config::{resolve_config_path, EngineConfig, LoadOptions};

use crate::commands::{CommandResult, EXIT_INPUT};

struct Row {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Row {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match EngineConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_INPUT,
            )
        }
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = config_file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for row in rows(&config) {
        let source = field_source(
            row.key,
            row.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", row.key, row.value));
    }

    CommandResult::text(lines.join("\n"))
}

fn rows(config: &EngineConfig) -> Vec<Row> {
    let scoring = &config.scoring;
    let risk = &config.risk;
    vec![
        Row::new("ranking.top_n", config.ranking.top_n, &["WATTWISE_RANKING_TOP_N"]),
        Row::new("scoring.cost_low", scoring.cost_low, &["WATTWISE_SCORING_COST_LOW"]),
        Row::new("scoring.cost_medium", scoring.cost_medium, &["WATTWISE_SCORING_COST_MEDIUM"]),
        Row::new("scoring.cost_high", scoring.cost_high, &["WATTWISE_SCORING_COST_HIGH"]),
        Row::new("scoring.renewable", scoring.renewable, &["WATTWISE_SCORING_RENEWABLE"]),
        Row::new("scoring.flexibility", scoring.flexibility, &["WATTWISE_SCORING_FLEXIBILITY"]),
        Row::new(
            "scoring.contract_match_bonus",
            scoring.contract_match_bonus,
            &["WATTWISE_SCORING_CONTRACT_MATCH_BONUS"],
        ),
        Row::new(
            "scoring.termination_fee_penalty",
            scoring.termination_fee_penalty,
            &["WATTWISE_SCORING_TERMINATION_FEE_PENALTY"],
        ),
        Row::new("scoring.tie_epsilon", scoring.tie_epsilon, &["WATTWISE_SCORING_TIE_EPSILON"]),
        Row::new(
            "risk.termination_fee_multiplier",
            risk.termination_fee_multiplier,
            &["WATTWISE_RISK_TERMINATION_FEE_MULTIPLIER"],
        ),
        Row::new(
            "risk.critical_fee_multiplier",
            risk.critical_fee_multiplier,
            &["WATTWISE_RISK_CRITICAL_FEE_MULTIPLIER"],
        ),
        Row::new(
            "risk.low_supplier_rating",
            risk.low_supplier_rating,
            &["WATTWISE_RISK_LOW_SUPPLIER_RATING"],
        ),
        Row::new(
            "usage.trend_dead_zone_ratio",
            config.usage.trend_dead_zone_ratio,
            &["WATTWISE_USAGE_TREND_DEAD_ZONE_RATIO"],
        ),
        Row::new(
            "explanation.enabled",
            config.explanation.enabled,
            &["WATTWISE_EXPLANATION_ENABLED"],
        ),
        Row::new(
            "explanation.timeout_ms",
            config.explanation.timeout_ms,
            &["WATTWISE_EXPLANATION_TIMEOUT_MS"],
        ),
        Row::new(
            "logging.level",
            &config.logging.level,
            &["WATTWISE_LOGGING_LEVEL", "WATTWISE_LOG_LEVEL"],
        ),
        Row::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["WATTWISE_LOGGING_FORMAT", "WATTWISE_LOG_FORMAT"],
        ),
    ]
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let (Some(doc), Some(path)) = (config_file_doc, config_file_path) {
        if contains_path(doc, key_path) {
            return format!("file ({})", path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path
        .split('.')
        .try_fold(root, |current, key| current.get(key))
        .is_some()
}
