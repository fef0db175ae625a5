//! Dashboard snapshot: every panel's derived data in one serializable value.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, write};
use std::path::Path;

use crate::config::Config;
use crate::forecast::{self, Forecast};
use crate::logging::{self, log_export, v_num, v_str, ProfileScope};
use crate::mock::{ActivityEntry, Kpi, MockGenerator};
use crate::risk::{self, ExposureSummary, RiskCluster, RiskFactor};
use crate::scenario::{self, Driver, ScenarioOutcome};
use crate::session::AppState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPanel {
    pub outcome: ScenarioOutcome,
    pub drivers: Vec<Driver>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPanel {
    pub factors: Vec<RiskFactor>,
    pub clusters: Vec<RiskCluster>,
    pub exposure: ExposureSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: u64,
    pub seed: u64,
    pub user: String,
    pub plan: String,
    pub kpis: Vec<Kpi>,
    pub activity: Vec<ActivityEntry>,
    pub scenario: ScenarioPanel,
    pub revenue_forecast: Forecast,
    pub risk: RiskPanel,
}

impl DashboardSnapshot {
    /// Assemble the dashboard from session state and mock data. Draws from
    /// `mock` in a fixed order, so the same seed gives the same snapshot.
    pub fn build(state: &AppState, mock: &mut MockGenerator, cfg: &Config, now: u64) -> Self {
        let _scope = ProfileScope::with_context(
            "dashboard_snapshot",
            &[("seed", v_num(mock.seed() as f64)), ("plan", v_str(state.user.plan.as_str()))],
        );

        let kpis = mock.kpis();
        let activity = mock.activity_feed(8, now);
        let history_start = now.saturating_sub(cfg.history_len as u64 * 86_400);
        let history = mock.history(cfg.history_len, 42.0, 0.6, 1.5, history_start);
        let revenue_forecast = forecast::forecast(&history, cfg.forecast_horizon, cfg.forecast_min_history);

        let matrix = risk::default_matrix();
        let clusters = matrix.clusters(cfg.cluster_threshold);
        let factors = matrix.filter_factors(&state.risk_filter).into_iter().cloned().collect();

        Self {
            generated_at: now,
            seed: mock.seed(),
            user: state.user.name.clone(),
            plan: state.user.plan.as_str().to_string(),
            kpis,
            activity,
            scenario: ScenarioPanel {
                outcome: scenario::evaluate(&state.scenario),
                drivers: scenario::drivers(&state.scenario),
            },
            revenue_forecast,
            risk: RiskPanel {
                factors,
                clusters,
                exposure: matrix.exposure(),
            },
        }
    }

    /// SHA-256 (hex) over the compact JSON body.
    pub fn fingerprint(&self) -> Result<String> {
        let body = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&body);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Pretty-printed JSON export. Parent directories are created.
    pub fn write_json(&self, path: &Path) -> Result<String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let fingerprint = self.fingerprint()?;
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("fingerprint".to_string(), serde_json::Value::String(fingerprint.clone()));
        }
        let body = serde_json::to_string_pretty(&value)?;
        write(path, &body).with_context(|| format!("writing {}", path.display()))?;
        log_export(&path.to_string_lossy(), &fingerprint, body.len());
        logging::agg_increment(logging::Activity::Export);
        Ok(fingerprint)
    }
}
