use std::env;
use std::time::Duration;

/// Risk-engine tuning, all overridable via environment (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    pub max_global_liability: f64,
    pub min_house_edge: f64,
    pub hedge_rounding: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_global_liability: 30_000.0,
            min_house_edge: -0.05,
            hedge_rounding: 50.0,
        }
    }
}

impl RiskConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_global_liability: env_f64("MAX_GLOBAL_LIABILITY", default.max_global_liability),
            min_house_edge: env_f64("MIN_HOUSE_EDGE", default.min_house_edge),
            hedge_rounding: env_f64("HEDGE_ROUNDING_LOT", default.hedge_rounding),
        }
    }
}

/// Top-level engine config: risk thresholds plus the ambient knobs (feed
/// timeout, cache TTL, team dictionary path, API key) spec.md §6 names.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub risk: RiskConfig,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub team_mapping_path: String,
    pub odds_api_key: Option<String>,
    pub fuzzy_match_threshold: f64,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let cache_ttl_secs = env_u64("CACHE_TTL_SECONDS", 60);
        let request_timeout_secs = env_u64("REQUEST_TIMEOUT", 15);
        let team_mapping_path =
            env::var("TEAM_MAPPING_PATH").unwrap_or_else(|_| "data/team_mapping.json".to_string());
        let odds_api_key = env::var("ODDS_API_KEY").ok().filter(|s| !s.is_empty());

        Self {
            risk: RiskConfig::from_env(),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            team_mapping_path,
            odds_api_key,
            fuzzy_match_threshold: env_f64("FUZZY_MATCH_THRESHOLD", 85.0),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
