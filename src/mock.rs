//! Seeded mock data for the dashboard.
//!
//! Everything the demo shows as "live" comes from here. The generator is
//! driven by a seed so identical seeds replay identical dashboards.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration};

use crate::forecast::Observation;

const DAY_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub value: f64,
    /// Change versus the previous period, percent.
    pub delta_pct: f64,
    pub sparkline: Vec<f64>,
    /// Whether a rising value is good news.
    pub higher_is_better: bool,
}

impl Kpi {
    pub fn is_improving(&self) -> bool {
        if self.higher_is_better {
            self.delta_pct >= 0.0
        } else {
            self.delta_pct <= 0.0
        }
    }
}

struct KpiTemplate {
    id: &'static str,
    name: &'static str,
    unit: &'static str,
    base: f64,
    volatility: f64,
    higher_is_better: bool,
}

const KPI_CATALOG: &[KpiTemplate] = &[
    KpiTemplate { id: "revenue", name: "Revenue", unit: "$M", base: 48.2, volatility: 0.04, higher_is_better: true },
    KpiTemplate { id: "gross_margin", name: "Gross Margin", unit: "%", base: 62.5, volatility: 0.015, higher_is_better: true },
    KpiTemplate { id: "market_share", name: "Market Share", unit: "%", base: 18.4, volatility: 0.02, higher_is_better: true },
    KpiTemplate { id: "customer_nps", name: "Customer NPS", unit: "pts", base: 47.0, volatility: 0.05, higher_is_better: true },
    KpiTemplate { id: "churn_rate", name: "Churn Rate", unit: "%", base: 3.2, volatility: 0.06, higher_is_better: false },
    KpiTemplate { id: "risk_index", name: "Risk Index", unit: "pts", base: 54.0, volatility: 0.03, higher_is_better: false },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Report,
    Scenario,
    Alert,
    Comment,
    Login,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub ts: u64,
    pub actor: String,
    pub kind: ActivityKind,
    pub message: String,
}

const ACTORS: &[&str] = &["Sarah Chen", "Marcus Webb", "Priya Natarajan", "Tom Alvarez", "Lena Fischer"];

const ACTIVITY_TEMPLATES: &[(ActivityKind, &str)] = &[
    (ActivityKind::Report, "generated the Q3 SWOT analysis"),
    (ActivityKind::Report, "exported the PESTEL briefing"),
    (ActivityKind::Scenario, "saved a new market-expansion scenario"),
    (ActivityKind::Scenario, "compared growth and cost presets"),
    (ActivityKind::Alert, "acknowledged a supply-chain risk alert"),
    (ActivityKind::Alert, "raised the FX exposure threshold"),
    (ActivityKind::Comment, "commented on the Five Forces review"),
    (ActivityKind::Comment, "asked the advisor about pricing pressure"),
    (ActivityKind::Login, "signed in from a new device"),
];

/// Seeded source of dashboard mock data.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    rng: StdRng,
    seed: u64,
}

impl MockGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Random walk of `len` points starting at `base`; each step moves by at
    /// most `volatility` of the current value. Never negative.
    pub fn sparkline(&mut self, len: usize, base: f64, volatility: f64) -> Vec<f64> {
        let mut value = base.max(0.0);
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(value);
            let shock: f64 = self.rng.gen_range(-1.0..=1.0);
            value = (value * (1.0 + shock * volatility)).max(0.0);
        }
        out
    }

    pub fn kpis(&mut self) -> Vec<Kpi> {
        KPI_CATALOG
            .iter()
            .map(|tpl| {
                let sparkline = self.sparkline(12, tpl.base, tpl.volatility);
                let value = sparkline.last().copied().unwrap_or(tpl.base);
                let prev = sparkline.len().checked_sub(2).map(|i| sparkline[i]).unwrap_or(value);
                Kpi {
                    id: tpl.id.to_string(),
                    name: tpl.name.to_string(),
                    unit: tpl.unit.to_string(),
                    value,
                    delta_pct: pct_change(prev, value),
                    sparkline,
                    higher_is_better: tpl.higher_is_better,
                }
            })
            .collect()
    }

    /// One live-update step: every KPI moves and its sparkline scrolls.
    pub fn tick(&mut self, kpis: &mut [Kpi]) {
        for kpi in kpis.iter_mut() {
            let vol = KPI_CATALOG
                .iter()
                .find(|s| s.id == kpi.id)
                .map(|s| s.volatility)
                .unwrap_or(0.02);
            let shock: f64 = self.rng.gen_range(-1.0..=1.0);
            let prev = kpi.value;
            kpi.value = (prev * (1.0 + shock * vol)).max(0.0);
            kpi.delta_pct = pct_change(prev, kpi.value);
            if !kpi.sparkline.is_empty() {
                kpi.sparkline.remove(0);
            }
            kpi.sparkline.push(kpi.value);
        }
    }

    /// `n` activity entries ending at `now`, newest first.
    pub fn activity_feed(&mut self, n: usize, now: u64) -> Vec<ActivityEntry> {
        let mut ts = now;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let actor = ACTORS[self.rng.gen_range(0..ACTORS.len())];
            let (kind, msg) = ACTIVITY_TEMPLATES[self.rng.gen_range(0..ACTIVITY_TEMPLATES.len())];
            out.push(ActivityEntry {
                ts,
                actor: actor.to_string(),
                kind,
                message: format!("{} {}", actor, msg),
            });
            ts = ts.saturating_sub(self.rng.gen_range(300..7_200));
        }
        out
    }

    /// Daily series with linear drift plus uniform noise, for the forecaster.
    pub fn history(&mut self, len: usize, start: f64, drift: f64, noise: f64, start_ts: u64) -> Vec<Observation> {
        (0..len)
            .map(|i| {
                let jitter: f64 = if noise > 0.0 { self.rng.gen_range(-noise..=noise) } else { 0.0 };
                Observation {
                    ts: start_ts + i as u64 * DAY_SECS,
                    value: start + drift * i as f64 + jitter,
                }
            })
            .collect()
    }
}

fn pct_change(prev: f64, next: f64) -> f64 {
    if prev.abs() < f64::EPSILON {
        0.0
    } else {
        (next - prev) / prev * 100.0
    }
}

/// Drive `ticks` live updates, one per `tick_ms`, handing each snapshot to
/// `on_tick`. Returns the final KPI state.
pub async fn live_ticks<F>(generator: &mut MockGenerator, mut kpis: Vec<Kpi>, ticks: usize, tick_ms: u64, mut on_tick: F) -> Vec<Kpi>
where
    F: FnMut(usize, &[Kpi]),
{
    let mut timer = interval(Duration::from_millis(tick_ms.max(1)));
    // first tick of a tokio interval completes immediately
    timer.tick().await;
    for i in 0..ticks {
        timer.tick().await;
        generator.tick(&mut kpis);
        on_tick(i, &kpis);
    }
    kpis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_output() {
        let mut a = MockGenerator::new(7);
        let mut b = MockGenerator::new(7);
        assert_eq!(a.kpis(), b.kpis());
        assert_eq!(a.activity_feed(5, 1_000_000), b.activity_feed(5, 1_000_000));
    }

    #[test]
    fn test_different_seed_differs() {
        let mut a = MockGenerator::new(1);
        let mut b = MockGenerator::new(2);
        assert_ne!(a.sparkline(20, 100.0, 0.1), b.sparkline(20, 100.0, 0.1));
    }

    #[test]
    fn test_sparkline_non_negative() {
        let mut g = MockGenerator::new(3);
        let s = g.sparkline(200, 1.0, 1.0);
        assert_eq!(s.len(), 200);
        assert!(s.iter().all(|v| *v >= 0.0));
        assert_eq!(s[0], 1.0);
    }

    #[test]
    fn test_kpis_cover_catalog() {
        let mut g = MockGenerator::new(11);
        let kpis = g.kpis();
        assert_eq!(kpis.len(), KPI_CATALOG.len());
        for k in &kpis {
            assert_eq!(k.sparkline.len(), 12);
            assert_eq!(Some(&k.value), k.sparkline.last());
        }
    }

    #[test]
    fn test_tick_scrolls_sparkline() {
        let mut g = MockGenerator::new(5);
        let mut kpis = g.kpis();
        let before = kpis[0].sparkline.clone();
        g.tick(&mut kpis);
        assert_eq!(kpis[0].sparkline.len(), before.len());
        assert_eq!(kpis[0].sparkline[..11], before[1..]);
        assert_eq!(kpis[0].sparkline.last(), Some(&kpis[0].value));
    }

    #[test]
    fn test_activity_feed_newest_first() {
        let mut g = MockGenerator::new(9);
        let feed = g.activity_feed(10, 1_700_000_000);
        assert_eq!(feed[0].ts, 1_700_000_000);
        for pair in feed.windows(2) {
            assert!(pair[0].ts > pair[1].ts);
        }
    }

    #[test]
    fn test_history_spacing_and_drift() {
        let mut g = MockGenerator::new(4);
        let h = g.history(10, 100.0, 2.0, 0.0, 0);
        assert_eq!(h[1].ts - h[0].ts, DAY_SECS);
        assert_eq!(h[9].value, 118.0);
    }

    #[test]
    fn test_improving_respects_direction() {
        let mut k = MockGenerator::new(1).kpis().remove(4);
        assert!(!k.higher_is_better);
        k.delta_pct = -1.0;
        assert!(k.is_improving());
    }

    #[tokio::test]
    async fn test_live_ticks_runs_requested_count() {
        let mut g = MockGenerator::new(21);
        let kpis = g.kpis();
        let mut seen = 0;
        let out = live_ticks(&mut g, kpis, 3, 1, |_, _| seen += 1).await;
        assert_eq!(seen, 3);
        assert_eq!(out.len(), KPI_CATALOG.len());
    }
}
