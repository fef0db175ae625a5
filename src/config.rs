//! Runtime configuration read from the environment.

use crate::session::Plan;

#[derive(Debug, Clone)]
pub struct Config {
    pub seed: u64,
    pub advisor_delay_ms: u64,
    pub forecast_horizon: usize,
    pub forecast_min_history: usize,
    pub cluster_threshold: f64,
    pub tick_ms: u64,
    pub live_ticks: usize,
    pub history_len: usize,
    pub demo_user: String,
    pub demo_email: String,
    pub demo_plan: Plan,
    pub export_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 42,
            advisor_delay_ms: 800,
            forecast_horizon: 6,
            forecast_min_history: crate::forecast::DEFAULT_MIN_HISTORY,
            cluster_threshold: crate::risk::CLUSTER_THRESHOLD,
            tick_ms: 2000,
            live_ticks: 5,
            history_len: 12,
            demo_user: "Alex Morgan".to_string(),
            demo_email: "alex.morgan@example.com".to_string(),
            demo_plan: Plan::Professional,
            export_path: "out/dashboard.json".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable keys keep their default.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            seed: get("SI_SEED").and_then(|v| v.parse().ok()).unwrap_or(d.seed),
            advisor_delay_ms: get("ADVISOR_DELAY_MS").and_then(|v| v.parse().ok()).unwrap_or(d.advisor_delay_ms),
            forecast_horizon: get("FORECAST_HORIZON").and_then(|v| v.parse().ok()).unwrap_or(d.forecast_horizon),
            forecast_min_history: get("FORECAST_MIN_HISTORY")
                .and_then(|v| v.parse::<usize>().ok())
                .map(|v| v.max(crate::forecast::MIN_HISTORY_FLOOR))
                .unwrap_or(d.forecast_min_history),
            cluster_threshold: get("CLUSTER_THRESHOLD")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(d.cluster_threshold),
            tick_ms: get("TICK_MS").and_then(|v| v.parse().ok()).unwrap_or(d.tick_ms),
            live_ticks: get("LIVE_TICKS").and_then(|v| v.parse().ok()).unwrap_or(d.live_ticks),
            history_len: get("HISTORY_LEN").and_then(|v| v.parse().ok()).unwrap_or(d.history_len),
            demo_user: get("DEMO_USER").unwrap_or(d.demo_user),
            demo_email: get("DEMO_EMAIL").unwrap_or(d.demo_email),
            demo_plan: get("DEMO_PLAN").and_then(|v| Plan::parse(&v)).unwrap_or(d.demo_plan),
            export_path: get("EXPORT_PATH").unwrap_or(d.export_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.forecast_min_history >= crate::forecast::MIN_HISTORY_FLOOR);
        assert!(cfg.cluster_threshold > 0.0 && cfg.cluster_threshold <= 1.0);
        assert!(cfg.history_len >= cfg.forecast_min_history);
        assert_eq!(cfg.demo_plan, Plan::Professional);
    }

    fn with(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_lookup_overrides() {
        let cfg = with(&[("SI_SEED", "7"), ("DEMO_PLAN", "starter"), ("LIVE_TICKS", "oops")]);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.demo_plan, Plan::Starter);
        assert_eq!(cfg.live_ticks, Config::default().live_ticks);
    }

    #[test]
    fn test_min_history_floor() {
        assert_eq!(with(&[("FORECAST_MIN_HISTORY", "1")]).forecast_min_history, crate::forecast::MIN_HISTORY_FLOOR);
        assert_eq!(with(&[("FORECAST_MIN_HISTORY", "8")]).forecast_min_history, 8);
    }

    #[test]
    fn test_cluster_threshold_clamped_and_finite() {
        assert_eq!(with(&[("CLUSTER_THRESHOLD", "1.7")]).cluster_threshold, 1.0);
        assert_eq!(with(&[("CLUSTER_THRESHOLD", "-0.2")]).cluster_threshold, 0.0);
        for bad in ["nan", "NaN", "inf", "-inf"] {
            let cfg = with(&[("CLUSTER_THRESHOLD", bad)]);
            assert_eq!(cfg.cluster_threshold, crate::risk::CLUSTER_THRESHOLD, "{}", bad);
        }
    }
}
