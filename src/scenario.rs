//! What-if scenario impact model.
//!
//! Each slider variable moves four output scores in proportion to how far it
//! sits from its default, scaled by the variable's range:
//!
//! ```text
//! deviation    = (current - default) / (max - min) * 10
//! contribution = deviation * weight[axis] * 5
//! ```
//!
//! Contributions are summed onto fixed baselines and clamped afterwards, so
//! evaluation order never matters.

use serde::{Deserialize, Serialize};

pub const BASELINE_REVENUE: f64 = 100.0;
pub const BASELINE_RISK: f64 = 50.0;
pub const BASELINE_AGILITY: f64 = 70.0;
pub const BASELINE_EFFICIENCY: f64 = 65.0;

/// Multiplier applied to every weighted deviation.
pub const IMPACT_SCALE: f64 = 5.0;
const DEVIATION_SPAN: f64 = 10.0;

pub const REVENUE_MAX: f64 = 200.0;
pub const SCORE_MAX: f64 = 100.0;

const W_REVENUE: f64 = 0.40;
const W_RISK: f64 = 0.25;
const W_AGILITY: f64 = 0.20;
const W_EFFICIENCY: f64 = 0.15;

/// Per-unit impact of a variable on each output axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactWeights {
    pub revenue: f64,
    pub risk: f64,
    pub agility: f64,
    pub efficiency: f64,
}

impl ImpactWeights {
    pub const fn new(revenue: f64, risk: f64, agility: f64, efficiency: f64) -> Self {
        Self { revenue, risk, agility, efficiency }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawVariable")]
pub struct ScenarioVariable {
    pub id: String,
    pub name: String,
    pub unit: String,
    min: f64,
    max: f64,
    default: f64,
    current: f64,
    pub weights: ImpactWeights,
}

/// Wire shape of a variable. Every deserialized variable goes back through
/// `ScenarioVariable::new`, so bounds are ordered and `current` is in range.
#[derive(Deserialize)]
struct RawVariable {
    id: String,
    name: String,
    unit: String,
    min: f64,
    max: f64,
    default: f64,
    current: Option<f64>,
    weights: ImpactWeights,
}

impl From<RawVariable> for ScenarioVariable {
    fn from(raw: RawVariable) -> Self {
        let mut v = ScenarioVariable::new(&raw.id, &raw.name, &raw.unit, raw.min, raw.max, raw.default, raw.weights);
        if let Some(current) = raw.current {
            v.set_value(current);
        }
        v
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl ScenarioVariable {
    /// Bounds given in the wrong order are swapped; the default is pulled
    /// into range. A non-finite min becomes 0, a non-finite max collapses
    /// onto min, and a non-finite default sits at min.
    pub fn new(id: &str, name: &str, unit: &str, min: f64, max: f64, default: f64, weights: ImpactWeights) -> Self {
        let lo = finite_or(min, 0.0);
        let hi = finite_or(max, lo);
        let (min, max) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let default = finite_or(default, min).clamp(min, max);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            min,
            max,
            default,
            current: default,
            weights,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Move the slider. Out-of-range (and NaN) values are clamped.
    pub fn set_value(&mut self, value: f64) {
        self.current = if value.is_nan() { self.default } else { value.clamp(self.min, self.max) };
    }

    pub fn reset(&mut self) {
        self.current = self.default;
    }

    /// Normalized distance from the default. Spans [-5, 5] when the default
    /// sits mid-range.
    pub fn deviation(&self) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        (self.current - self.default) / span * DEVIATION_SPAN
    }

    pub fn contribution(&self) -> ImpactWeights {
        let d = self.deviation() * IMPACT_SCALE;
        ImpactWeights {
            revenue: d * self.weights.revenue,
            risk: d * self.weights.risk,
            agility: d * self.weights.agility,
            efficiency: d * self.weights.efficiency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    ProceedWithMonitoring,
    Revise,
    Reconsider,
}

impl Recommendation {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            Recommendation::Proceed
        } else if score >= 65 {
            Recommendation::ProceedWithMonitoring
        } else if score >= 50 {
            Recommendation::Revise
        } else {
            Recommendation::Reconsider
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::Proceed => {
                "Strong scenario. The projected upside outweighs the added risk; proceed with implementation."
            }
            Recommendation::ProceedWithMonitoring => {
                "Favourable scenario. Proceed, but monitor risk indicators closely during rollout."
            }
            Recommendation::Revise => {
                "Mixed outlook. Revisit the levers with the largest negative impact before committing."
            }
            Recommendation::Reconsider => {
                "Weak scenario. The combined risk and cost profile does not justify this configuration."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// 0-200
    pub revenue: f64,
    /// 0-100, lower is better
    pub risk: f64,
    pub agility: f64,
    pub efficiency: f64,
    /// Unrounded weighted blend.
    pub overall: f64,
    pub score: u32,
    pub recommendation: Recommendation,
}

/// Evaluate a set of slider variables.
pub fn evaluate(variables: &[ScenarioVariable]) -> ScenarioOutcome {
    let mut total = ImpactWeights::new(BASELINE_REVENUE, BASELINE_RISK, BASELINE_AGILITY, BASELINE_EFFICIENCY);
    for v in variables {
        let c = v.contribution();
        total.revenue += c.revenue;
        total.risk += c.risk;
        total.agility += c.agility;
        total.efficiency += c.efficiency;
    }

    let revenue = total.revenue.clamp(0.0, REVENUE_MAX);
    let risk = total.risk.clamp(0.0, SCORE_MAX);
    let agility = total.agility.clamp(0.0, SCORE_MAX);
    let efficiency = total.efficiency.clamp(0.0, SCORE_MAX);

    let overall = overall_score(revenue, risk, agility, efficiency);
    let score = overall.round().max(0.0) as u32;

    ScenarioOutcome {
        revenue,
        risk,
        agility,
        efficiency,
        overall,
        score,
        recommendation: Recommendation::from_score(score),
    }
}

pub fn overall_score(revenue: f64, risk: f64, agility: f64, efficiency: f64) -> f64 {
    revenue * W_REVENUE + (SCORE_MAX - risk) * W_RISK + agility * W_AGILITY + efficiency * W_EFFICIENCY
}

/// One variable's share of the outcome, for the key-drivers panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub deviation: f64,
    pub contribution: ImpactWeights,
    /// Contribution pushed through the overall blend (risk inverted).
    pub overall_impact: f64,
}

/// Per-variable contributions, largest absolute overall impact first.
/// Variables sitting at their default are omitted.
pub fn drivers(variables: &[ScenarioVariable]) -> Vec<Driver> {
    let mut out: Vec<Driver> = variables
        .iter()
        .filter(|v| v.deviation() != 0.0)
        .map(|v| {
            let c = v.contribution();
            Driver {
                id: v.id.clone(),
                name: v.name.clone(),
                deviation: v.deviation(),
                contribution: c,
                overall_impact: c.revenue * W_REVENUE - c.risk * W_RISK + c.agility * W_AGILITY
                    + c.efficiency * W_EFFICIENCY,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.overall_impact
            .abs()
            .partial_cmp(&a.overall_impact.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDelta {
    pub revenue: f64,
    pub risk: f64,
    pub agility: f64,
    pub efficiency: f64,
    pub overall: f64,
}

/// `b - a` on every axis.
pub fn compare(a: &ScenarioOutcome, b: &ScenarioOutcome) -> OutcomeDelta {
    OutcomeDelta {
        revenue: b.revenue - a.revenue,
        risk: b.risk - a.risk,
        agility: b.agility - a.agility,
        efficiency: b.efficiency - a.efficiency,
        overall: b.overall - a.overall,
    }
}

// =============================================================================
// Built-in levers and presets
// =============================================================================

pub fn default_variables() -> Vec<ScenarioVariable> {
    vec![
        ScenarioVariable::new(
            "market_investment",
            "Market Investment",
            "%",
            -20.0,
            50.0,
            0.0,
            ImpactWeights::new(1.2, 0.6, 0.3, -0.2),
        ),
        ScenarioVariable::new(
            "price_change",
            "Price Change",
            "%",
            -15.0,
            15.0,
            0.0,
            ImpactWeights::new(0.8, 0.4, 0.0, 0.2),
        ),
        ScenarioVariable::new(
            "headcount_change",
            "Headcount Change",
            "%",
            -25.0,
            25.0,
            0.0,
            ImpactWeights::new(0.5, 0.2, 0.4, -0.6),
        ),
        ScenarioVariable::new(
            "rd_budget",
            "R&D Budget",
            "% of revenue",
            5.0,
            25.0,
            12.0,
            ImpactWeights::new(0.6, 0.3, 0.8, -0.3),
        ),
        ScenarioVariable::new(
            "automation_level",
            "Process Automation",
            "%",
            0.0,
            100.0,
            40.0,
            ImpactWeights::new(0.2, -0.3, 0.5, 1.0),
        ),
        ScenarioVariable::new(
            "supplier_diversification",
            "Supplier Diversification",
            "suppliers",
            1.0,
            10.0,
            3.0,
            ImpactWeights::new(0.0, -0.8, 0.3, -0.1),
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Baseline,
    AggressiveGrowth,
    CostOptimization,
    DigitalFirst,
    Defensive,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Baseline,
        Preset::AggressiveGrowth,
        Preset::CostOptimization,
        Preset::DigitalFirst,
        Preset::Defensive,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "baseline" => Some(Preset::Baseline),
            "aggressive_growth" | "growth" => Some(Preset::AggressiveGrowth),
            "cost_optimization" | "cost" => Some(Preset::CostOptimization),
            "digital_first" | "digital" => Some(Preset::DigitalFirst),
            "defensive" => Some(Preset::Defensive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Baseline => "baseline",
            Preset::AggressiveGrowth => "aggressive_growth",
            Preset::CostOptimization => "cost_optimization",
            Preset::DigitalFirst => "digital_first",
            Preset::Defensive => "defensive",
        }
    }

    /// Slider positions by variable id. Ids not listed stay at default.
    fn positions(&self) -> &'static [(&'static str, f64)] {
        match self {
            Preset::Baseline => &[],
            Preset::AggressiveGrowth => &[
                ("market_investment", 40.0),
                ("price_change", -5.0),
                ("headcount_change", 20.0),
                ("rd_budget", 18.0),
            ],
            Preset::CostOptimization => &[
                ("market_investment", -10.0),
                ("headcount_change", -15.0),
                ("automation_level", 80.0),
            ],
            Preset::DigitalFirst => &[
                ("rd_budget", 22.0),
                ("automation_level", 90.0),
                ("market_investment", 15.0),
            ],
            Preset::Defensive => &[
                ("market_investment", -5.0),
                ("price_change", 3.0),
                ("supplier_diversification", 8.0),
            ],
        }
    }

    /// Reset every variable, then move the preset's sliders.
    pub fn apply(&self, variables: &mut [ScenarioVariable]) {
        for v in variables.iter_mut() {
            v.reset();
        }
        for (id, value) in self.positions() {
            if let Some(v) = variables.iter_mut().find(|v| v.id == *id) {
                v.set_value(*value);
            }
        }
    }
}
