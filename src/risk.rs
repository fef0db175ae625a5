//! Risk factor correlations and cluster detection.
//!
//! Correlation edges are stored once per unordered pair and mirrored on
//! lookup. Clusters are the connected components of the graph formed by
//! edges whose absolute correlation clears a threshold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum |correlation| for two factors to share a cluster.
pub const CLUSTER_THRESHOLD: f64 = 0.6;
const CRITICAL_AVG: f64 = 0.7;
const HIGH_AVG: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Market,
    Operational,
    Financial,
    Regulatory,
    Technology,
    Strategic,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Market => "market",
            RiskCategory::Operational => "operational",
            RiskCategory::Financial => "financial",
            RiskCategory::Regulatory => "regulatory",
            RiskCategory::Technology => "technology",
            RiskCategory::Strategic => "strategic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "market" => Some(RiskCategory::Market),
            "operational" => Some(RiskCategory::Operational),
            "financial" => Some(RiskCategory::Financial),
            "regulatory" => Some(RiskCategory::Regulatory),
            "technology" => Some(RiskCategory::Technology),
            "strategic" => Some(RiskCategory::Strategic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTrend {
    Rising,
    Stable,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskBand {
    pub fn from_level(level: u8) -> Self {
        match level {
            0..=29 => RiskBand::Low,
            30..=49 => RiskBand::Moderate,
            50..=69 => RiskBand::High,
            _ => RiskBand::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub id: String,
    pub code: String,
    pub name: String,
    pub category: RiskCategory,
    /// 0-100
    pub level: u8,
    pub trend: RiskTrend,
}

impl RiskFactor {
    pub fn new(id: &str, code: &str, name: &str, category: RiskCategory, level: u8, trend: RiskTrend) -> Self {
        Self {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            category,
            level: level.min(100),
            trend,
        }
    }

    pub fn band(&self) -> RiskBand {
        RiskBand::from_level(self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCorrelationEdge {
    pub a: String,
    pub b: String,
    /// -1..=1
    pub correlation: f64,
    pub description: String,
}

impl RiskCorrelationEdge {
    pub fn new(a: &str, b: &str, correlation: f64, description: &str) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
            correlation: correlation.clamp(-1.0, 1.0),
            description: description.to_string(),
        }
    }

    pub fn connects(&self, x: &str, y: &str) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    pub fn touches(&self, id: &str) -> bool {
        self.a == id || self.b == id
    }

    /// The endpoint that is not `id`.
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.a == id {
            Some(&self.b)
        } else if self.b == id {
            Some(&self.a)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSeverity {
    Moderate,
    High,
    Critical,
}

impl ClusterSeverity {
    pub fn from_avg(avg: f64) -> Self {
        if avg >= CRITICAL_AVG {
            ClusterSeverity::Critical
        } else if avg >= HIGH_AVG {
            ClusterSeverity::High
        } else {
            ClusterSeverity::Moderate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterSeverity::Moderate => "moderate",
            ClusterSeverity::High => "high",
            ClusterSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCluster {
    /// Factor ids, sorted.
    pub members: Vec<String>,
    /// Mean |correlation| over every stored edge inside the cluster.
    pub avg_correlation: f64,
    pub edge_count: usize,
    pub severity: ClusterSeverity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureSummary {
    pub mean_level: f64,
    pub max_level: u8,
    pub low: usize,
    pub moderate: usize,
    pub high: usize,
    pub critical: usize,
    pub rising: usize,
}

/// Risk-view filter. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFilter {
    pub category: Option<RiskCategory>,
    pub trend: Option<RiskTrend>,
    pub min_band: Option<RiskBand>,
}

impl RiskFilter {
    pub fn matches(&self, f: &RiskFactor) -> bool {
        self.category.map_or(true, |c| f.category == c)
            && self.trend.map_or(true, |t| f.trend == t)
            && self.min_band.map_or(true, |b| f.band() >= b)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskMatrix {
    factors: Vec<RiskFactor>,
    edges: Vec<RiskCorrelationEdge>,
}

impl RiskMatrix {
    /// Self-correlations, edges naming unknown factors and repeated pairs
    /// (in either direction) are dropped; the first occurrence wins.
    pub fn new(factors: Vec<RiskFactor>, edges: Vec<RiskCorrelationEdge>) -> Self {
        let known: BTreeSet<&str> = factors.iter().map(|f| f.id.as_str()).collect();
        let mut kept: Vec<RiskCorrelationEdge> = Vec::with_capacity(edges.len());
        for e in edges {
            if e.a == e.b || !known.contains(e.a.as_str()) || !known.contains(e.b.as_str()) {
                continue;
            }
            if kept.iter().any(|k| k.connects(&e.a, &e.b)) {
                continue;
            }
            kept.push(e);
        }
        Self { factors, edges: kept }
    }

    pub fn factors(&self) -> &[RiskFactor] {
        &self.factors
    }

    pub fn edges(&self) -> &[RiskCorrelationEdge] {
        &self.edges
    }

    pub fn factor(&self, id: &str) -> Option<&RiskFactor> {
        self.factors.iter().find(|f| f.id == id)
    }

    /// Edge between two factors in either stored direction.
    pub fn edge(&self, a: &str, b: &str) -> Option<&RiskCorrelationEdge> {
        if a == b {
            return None;
        }
        self.edges.iter().find(|e| e.connects(a, b))
    }

    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.edge(a, b).map(|e| e.correlation)
    }

    /// Full matrix in factor order: 1.0 on the diagonal, 0.0 where no edge
    /// is stored.
    pub fn dense(&self) -> Vec<Vec<f64>> {
        self.factors
            .iter()
            .map(|row| {
                self.factors
                    .iter()
                    .map(|col| {
                        if row.id == col.id {
                            1.0
                        } else {
                            self.correlation(&row.id, &col.id).unwrap_or(0.0)
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Factors correlated with `id`, strongest first.
    pub fn neighbours(&self, id: &str) -> Vec<(&str, f64)> {
        let mut out: Vec<(&str, f64)> = self
            .edges
            .iter()
            .filter_map(|e| e.other(id).map(|o| (o, e.correlation)))
            .collect();
        out.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    /// Connected groups of factors linked by |correlation| >= `threshold`,
    /// highest average correlation first. Singletons are never reported.
    pub fn clusters(&self, threshold: f64) -> Vec<RiskCluster> {
        let mut groups: Vec<BTreeSet<&str>> = Vec::new();
        for e in self.edges.iter().filter(|e| e.correlation.abs() >= threshold) {
            let ia = groups.iter().position(|g| g.contains(e.a.as_str()));
            let ib = groups.iter().position(|g| g.contains(e.b.as_str()));
            match (ia, ib) {
                (None, None) => {
                    groups.push([e.a.as_str(), e.b.as_str()].into_iter().collect());
                }
                (Some(i), None) => {
                    groups[i].insert(e.b.as_str());
                }
                (None, Some(j)) => {
                    groups[j].insert(e.a.as_str());
                }
                (Some(i), Some(j)) if i != j => {
                    let (keep, drop) = (i.min(j), i.max(j));
                    let merged = groups.swap_remove(drop);
                    groups[keep].extend(merged);
                }
                _ => {}
            }
        }

        let mut clusters: Vec<RiskCluster> = groups
            .into_iter()
            .filter(|g| g.len() > 1)
            .map(|g| {
                let inside: Vec<f64> = self
                    .edges
                    .iter()
                    .filter(|e| g.contains(e.a.as_str()) && g.contains(e.b.as_str()))
                    .map(|e| e.correlation.abs())
                    .collect();
                let avg = if inside.is_empty() {
                    0.0
                } else {
                    inside.iter().sum::<f64>() / inside.len() as f64
                };
                RiskCluster {
                    members: g.into_iter().map(String::from).collect(),
                    avg_correlation: avg,
                    edge_count: inside.len(),
                    severity: ClusterSeverity::from_avg(avg),
                }
            })
            .collect();

        clusters.sort_by(|a, b| {
            b.avg_correlation
                .partial_cmp(&a.avg_correlation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.members.cmp(&b.members))
        });
        clusters
    }

    pub fn exposure(&self) -> ExposureSummary {
        if self.factors.is_empty() {
            return ExposureSummary::default();
        }
        let mut s = ExposureSummary::default();
        let mut total = 0.0;
        for f in &self.factors {
            total += f.level as f64;
            s.max_level = s.max_level.max(f.level);
            match f.band() {
                RiskBand::Low => s.low += 1,
                RiskBand::Moderate => s.moderate += 1,
                RiskBand::High => s.high += 1,
                RiskBand::Critical => s.critical += 1,
            }
            if f.trend == RiskTrend::Rising {
                s.rising += 1;
            }
        }
        s.mean_level = total / self.factors.len() as f64;
        s
    }

    pub fn filter_factors(&self, filter: &RiskFilter) -> Vec<&RiskFactor> {
        self.factors.iter().filter(|f| filter.matches(f)).collect()
    }
}

pub fn default_factors() -> Vec<RiskFactor> {
    use RiskCategory::*;
    use RiskTrend::*;
    vec![
        RiskFactor::new("supply_chain", "SC", "Supply Chain Disruption", Operational, 72, Rising),
        RiskFactor::new("fx_volatility", "FX", "Currency Volatility", Financial, 58, Rising),
        RiskFactor::new("cyber_security", "CY", "Cyber Security Breach", Technology, 65, Stable),
        RiskFactor::new("regulatory_change", "RG", "Regulatory Change", Regulatory, 45, Stable),
        RiskFactor::new("talent_shortage", "TL", "Talent Shortage", Operational, 61, Rising),
        RiskFactor::new("market_demand", "MD", "Market Demand Shift", Market, 52, Falling),
        RiskFactor::new("competitor_entry", "CE", "New Competitor Entry", Strategic, 48, Rising),
        RiskFactor::new("interest_rate", "IR", "Interest Rate Exposure", Financial, 55, Stable),
    ]
}

pub fn default_edges() -> Vec<RiskCorrelationEdge> {
    vec![
        RiskCorrelationEdge::new("supply_chain", "fx_volatility", 0.78, "Imported components are priced in USD"),
        RiskCorrelationEdge::new("fx_volatility", "interest_rate", 0.72, "Rate decisions move the currency"),
        RiskCorrelationEdge::new("supply_chain", "interest_rate", 0.65, "Supplier financing costs track rates"),
        RiskCorrelationEdge::new("cyber_security", "talent_shortage", 0.62, "Security staffing gaps widen the attack surface"),
        RiskCorrelationEdge::new("market_demand", "competitor_entry", -0.66, "New entrants erode addressable demand"),
        RiskCorrelationEdge::new("supply_chain", "market_demand", 0.42, "Stock-outs depress order volume"),
        RiskCorrelationEdge::new("regulatory_change", "cyber_security", 0.38, "Data-protection rules raise breach cost"),
        RiskCorrelationEdge::new("regulatory_change", "talent_shortage", 0.25, "Compliance roles are hard to fill"),
        RiskCorrelationEdge::new("interest_rate", "market_demand", -0.45, "Higher rates cool customer spending"),
        RiskCorrelationEdge::new("competitor_entry", "talent_shortage", 0.31, "Entrants compete for the same engineers"),
        RiskCorrelationEdge::new("fx_volatility", "market_demand", 0.28, "Export demand follows currency strength"),
        RiskCorrelationEdge::new("cyber_security", "competitor_entry", 0.22, "Incidents push customers to rivals"),
    ]
}

pub fn default_matrix() -> RiskMatrix {
    RiskMatrix::new(default_factors(), default_edges())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_shape() {
        let m = default_matrix();
        assert_eq!(m.factors().len(), 8);
        assert_eq!(m.edges().len(), 12);
    }

    #[test]
    fn test_lookup_is_symmetric() {
        let m = default_matrix();
        for e in m.edges() {
            assert_eq!(m.correlation(&e.a, &e.b), m.correlation(&e.b, &e.a));
            assert_eq!(m.correlation(&e.a, &e.b), Some(e.correlation));
        }
    }

    #[test]
    fn test_no_self_correlation() {
        let m = default_matrix();
        assert!(m.correlation("supply_chain", "supply_chain").is_none());
        let f = default_factors();
        let m = RiskMatrix::new(f, vec![RiskCorrelationEdge::new("fx_volatility", "fx_volatility", 1.0, "")]);
        assert!(m.edges().is_empty());
    }

    #[test]
    fn test_duplicate_and_unknown_edges_dropped() {
        let edges = vec![
            RiskCorrelationEdge::new("supply_chain", "fx_volatility", 0.5, "first"),
            RiskCorrelationEdge::new("fx_volatility", "supply_chain", 0.9, "mirror"),
            RiskCorrelationEdge::new("supply_chain", "ghost", 0.9, "unknown"),
        ];
        let m = RiskMatrix::new(default_factors(), edges);
        assert_eq!(m.edges().len(), 1);
        assert_eq!(m.correlation("fx_volatility", "supply_chain"), Some(0.5));
    }

    #[test]
    fn test_coefficient_clamped() {
        let e = RiskCorrelationEdge::new("a", "b", 1.7, "");
        assert_eq!(e.correlation, 1.0);
    }

    #[test]
    fn test_default_clusters() {
        let clusters = default_matrix().clusters(CLUSTER_THRESHOLD);
        assert_eq!(clusters.len(), 3);

        let top = &clusters[0];
        assert_eq!(top.members, vec!["fx_volatility", "interest_rate", "supply_chain"]);
        assert_eq!(top.edge_count, 3);
        assert!((top.avg_correlation - (0.78 + 0.72 + 0.65) / 3.0).abs() < 1e-9);
        assert_eq!(top.severity, ClusterSeverity::Critical);

        assert_eq!(clusters[1].members, vec!["competitor_entry", "market_demand"]);
        assert!((clusters[1].avg_correlation - 0.66).abs() < 1e-9);
        assert_eq!(clusters[1].severity, ClusterSeverity::High);

        assert_eq!(clusters[2].members, vec!["cyber_security", "talent_shortage"]);
        for pair in clusters.windows(2) {
            assert!(pair[0].avg_correlation >= pair[1].avg_correlation);
        }
    }

    #[test]
    fn test_weakly_linked_factor_never_clustered() {
        let m = default_matrix();
        let clusters = m.clusters(CLUSTER_THRESHOLD);
        assert!(clusters.iter().all(|c| !c.members.iter().any(|id| id == "regulatory_change")));
    }

    #[test]
    fn test_bridge_edge_merges_groups() {
        let factors: Vec<RiskFactor> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| RiskFactor::new(id, id, id, RiskCategory::Market, 50, RiskTrend::Stable))
            .collect();
        let edges = vec![
            RiskCorrelationEdge::new("a", "b", 0.9, ""),
            RiskCorrelationEdge::new("c", "d", 0.9, ""),
            RiskCorrelationEdge::new("b", "c", 0.6, ""),
            RiskCorrelationEdge::new("a", "d", 0.1, ""),
        ];
        let clusters = RiskMatrix::new(factors, edges).clusters(CLUSTER_THRESHOLD);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 4);
        assert_eq!(clusters[0].edge_count, 4);
        // (0.9 + 0.9 + 0.6 + 0.1) / 4
        assert!((clusters[0].avg_correlation - 0.625).abs() < 1e-9);
        assert_eq!(clusters[0].severity, ClusterSeverity::High);
    }

    #[test]
    fn test_weak_internal_edges_make_moderate_cluster() {
        let factors: Vec<RiskFactor> = ["a", "b", "c"]
            .iter()
            .map(|id| RiskFactor::new(id, id, id, RiskCategory::Market, 50, RiskTrend::Stable))
            .collect();
        let edges = vec![
            RiskCorrelationEdge::new("a", "b", 0.6, ""),
            RiskCorrelationEdge::new("b", "c", 0.6, ""),
            RiskCorrelationEdge::new("a", "c", 0.0, ""),
        ];
        let clusters = RiskMatrix::new(factors, edges).clusters(CLUSTER_THRESHOLD);
        assert_eq!(clusters[0].severity, ClusterSeverity::Moderate);
    }

    #[test]
    fn test_dense_matrix_is_symmetric() {
        let m = default_matrix();
        let d = m.dense();
        for i in 0..d.len() {
            assert_eq!(d[i][i], 1.0);
            for j in 0..d.len() {
                assert_eq!(d[i][j], d[j][i]);
            }
        }
    }

    #[test]
    fn test_neighbours_sorted() {
        let m = default_matrix();
        let n = m.neighbours("supply_chain");
        assert_eq!(n[0], ("fx_volatility", 0.78));
        assert_eq!(n.len(), 3);
    }

    #[test]
    fn test_exposure_and_filter() {
        let m = default_matrix();
        let s = m.exposure();
        assert_eq!(s.max_level, 72);
        assert_eq!(s.rising, 4);
        assert_eq!(s.low + s.moderate + s.high + s.critical, 8);

        let financial = m.filter_factors(&RiskFilter {
            category: Some(RiskCategory::Financial),
            ..Default::default()
        });
        assert_eq!(financial.len(), 2);

        let hot = m.filter_factors(&RiskFilter {
            trend: Some(RiskTrend::Rising),
            min_band: Some(RiskBand::High),
            ..Default::default()
        });
        let ids: Vec<&str> = hot.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["supply_chain", "fx_volatility", "talent_shortage"]);
    }
}
