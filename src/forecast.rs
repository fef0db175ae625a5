//! Least-squares trend forecaster with widening confidence bands.
//!
//! A line is fitted over (index, value). Each future step gets the standard
//! prediction interval, inflated by `1 + 0.1 * step` so the band keeps
//! opening with distance, and a confidence figure that decays per step.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Histories shorter than this produce no forecast.
pub const DEFAULT_MIN_HISTORY: usize = 5;
/// Lowest guard a caller may configure; the residual error needs n - 2 > 0.
pub const MIN_HISTORY_FLOOR: usize = 3;

const Z_95: f64 = 1.96;
const STEP_INFLATION: f64 = 0.1;
const CONFIDENCE_START: f64 = 0.95;
const CONFIDENCE_STEP: f64 = 0.05;
const CONFIDENCE_FLOOR: f64 = 0.5;
/// Relative slope below which a trend is reported as flat.
const FLAT_SLOPE_FRAC: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub ts: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ts: u64,
    pub step: usize,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
    /// 0.5-0.95
    pub confidence: f64,
}

impl ForecastPoint {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    /// Residual standard error, sqrt(SSE / (n - 2)).
    pub stderr: f64,
    pub r_squared: f64,
    pub n: usize,
    pub x_mean: f64,
    /// Sum of squared deviations of the index from its mean.
    pub sxx: f64,
    pub direction: TrendDirection,
}

impl TrendFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Half-width of the 95% prediction interval at index `x`.
    pub fn prediction_margin(&self, x: f64) -> f64 {
        let n = self.n as f64;
        Z_95 * self.stderr * (1.0 + 1.0 / n + (x - self.x_mean).powi(2) / self.sxx).sqrt()
    }
}

/// Ordinary least squares over (index, value). Returns `None` when fewer
/// than three points are given, since the residual error is undefined.
pub fn fit(values: &[f64]) -> Option<TrendFit> {
    let n = values.len();
    if n < MIN_HISTORY_FLOOR {
        return None;
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxx += dx * dx;
        sxy += dx * (y - y_mean);
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let mut sse = 0.0;
    let mut sst = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let resid = y - (slope * i as f64 + intercept);
        sse += resid * resid;
        sst += (y - y_mean).powi(2);
    }
    let stderr = (sse / (nf - 2.0)).max(0.0).sqrt();
    let r_squared = if sst > 0.0 { (1.0 - sse / sst).clamp(0.0, 1.0) } else { 1.0 };

    let scale = y_mean.abs().max(1e-9);
    let direction = if (slope / scale).abs() < FLAT_SLOPE_FRAC {
        TrendDirection::Flat
    } else if slope > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    Some(TrendFit {
        slope,
        intercept,
        stderr,
        r_squared,
        n,
        x_mean,
        sxx,
        direction,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastStatus {
    Ready,
    InsufficientHistory { have: usize, need: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub status: ForecastStatus,
    pub fit: Option<TrendFit>,
    pub history: Vec<Observation>,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn is_ready(&self) -> bool {
        self.status == ForecastStatus::Ready
    }
}

/// Mean spacing between history timestamps; 1 when it cannot be derived.
fn ts_step(history: &[Observation]) -> u64 {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) if history.len() > 1 && last.ts > first.ts => {
            ((last.ts - first.ts) / (history.len() as u64 - 1)).max(1)
        }
        _ => 1,
    }
}

/// Project `horizon` steps past the end of `history`.
///
/// `min_history` is raised to [`MIN_HISTORY_FLOOR`] if set lower. Short
/// histories return an empty, non-ready forecast rather than an error.
pub fn forecast(history: &[Observation], horizon: usize, min_history: usize) -> Forecast {
    let need = min_history.max(MIN_HISTORY_FLOOR);
    let insufficient = Forecast {
        status: ForecastStatus::InsufficientHistory { have: history.len(), need },
        fit: None,
        history: history.to_vec(),
        points: Vec::new(),
    };
    if history.len() < need || history.iter().any(|o| !o.value.is_finite()) {
        return insufficient;
    }

    let values: Vec<f64> = history.iter().map(|o| o.value).collect();
    let trend = match fit(&values) {
        Some(t) => t,
        None => return insufficient,
    };

    let n = history.len();
    let step_secs = ts_step(history);
    let last_ts = history.last().map(|o| o.ts).unwrap_or(0);

    let points = (1..=horizon)
        .map(|i| {
            let x = (n - 1 + i) as f64;
            let predicted = trend.predict(x);
            let margin = trend.prediction_margin(x) * (1.0 + STEP_INFLATION * i as f64);
            let confidence = (CONFIDENCE_START - CONFIDENCE_STEP * (i - 1) as f64).max(CONFIDENCE_FLOOR);
            ForecastPoint {
                ts: last_ts.saturating_add(step_secs.saturating_mul(i as u64)),
                step: i,
                predicted,
                lower: predicted - margin,
                upper: predicted + margin,
                confidence,
            }
        })
        .collect();

    Forecast {
        status: ForecastStatus::Ready,
        fit: Some(trend),
        history: history.to_vec(),
        points,
    }
}

/// Index a bare value list as observations `0, 1, 2, ...`.
pub fn observations(values: &[f64]) -> Vec<Observation> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| Observation { ts: i as u64, value })
        .collect()
}

pub fn parse_series_line(line: &str) -> Result<Observation> {
    let parts: Vec<&str> = line.split(',').map(|p| p.trim()).collect();
    if parts.len() < 2 {
        return Err(anyhow!("expected ts,value; got {} column(s)", parts.len()));
    }
    let ts = parts[0].parse::<u64>().map_err(|e| anyhow!("bad ts {:?}: {}", parts[0], e))?;
    let value = parts[1].parse::<f64>().map_err(|e| anyhow!("bad value {:?}: {}", parts[1], e))?;
    if !value.is_finite() {
        return Err(anyhow!("value is not finite: {}", parts[1]));
    }
    Ok(Observation { ts, value })
}

/// Parse `ts,value` lines. Blank lines, `#` comments and a `ts,` header are
/// skipped; rows must be in ascending ts order.
pub fn parse_series_csv(content: &str) -> Result<Vec<Observation>> {
    let mut out: Vec<Observation> = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.to_lowercase().starts_with("ts,") {
            continue;
        }
        let obs = parse_series_line(trimmed).map_err(|e| anyhow!("line {}: {}", lineno + 1, e))?;
        if let Some(prev) = out.last() {
            if obs.ts <= prev.ts {
                return Err(anyhow!("line {}: ts {} not after {}", lineno + 1, obs.ts, prev.ts));
            }
        }
        out.push(obs);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(n: usize) -> Vec<Observation> {
        observations(&(0..n).map(|i| 10.0 + 10.0 * i as f64).collect::<Vec<_>>())
    }

    #[test]
    fn test_perfect_line_recovers_slope() {
        let f = forecast(&linear(10), 5, DEFAULT_MIN_HISTORY);
        assert!(f.is_ready());
        let fit = f.fit.unwrap();
        assert!((fit.slope - 10.0).abs() < 1e-9);
        assert!((fit.intercept - 10.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(fit.direction, TrendDirection::Up);
        for p in &f.points {
            let expected = 10.0 + 10.0 * (9 + p.step) as f64;
            assert!((p.predicted - expected).abs() < 1e-6);
            assert!(p.width() < 1e-6, "margin should vanish, got {}", p.width());
        }
    }

    #[test]
    fn test_short_history_yields_empty_forecast() {
        let f = forecast(&linear(4), 5, DEFAULT_MIN_HISTORY);
        assert!(!f.is_ready());
        assert!(f.points.is_empty());
        assert_eq!(f.status, ForecastStatus::InsufficientHistory { have: 4, need: 5 });
    }

    #[test]
    fn test_guard_cannot_drop_below_floor() {
        let f = forecast(&linear(2), 3, 0);
        assert_eq!(f.status, ForecastStatus::InsufficientHistory { have: 2, need: 3 });
        let f = forecast(&linear(3), 3, 0);
        assert!(f.is_ready());
        assert!(f.points.iter().all(|p| p.lower.is_finite() && p.upper.is_finite()));
    }

    #[test]
    fn test_band_widens_with_horizon() {
        let values = [12.0, 15.0, 11.0, 18.0, 16.0, 21.0, 19.0, 24.0];
        let f = forecast(&observations(&values), 8, DEFAULT_MIN_HISTORY);
        assert!(f.is_ready());
        for pair in f.points.windows(2) {
            assert!(pair[1].width() >= pair[0].width());
            assert!(pair[1].confidence <= pair[0].confidence);
        }
        assert!(f.points[0].width() > 0.0);
    }

    #[test]
    fn test_confidence_decays_to_floor() {
        let f = forecast(&linear(6), 20, DEFAULT_MIN_HISTORY);
        assert!((f.points[0].confidence - 0.95).abs() < 1e-12);
        assert!((f.points[1].confidence - 0.90).abs() < 1e-12);
        assert_eq!(f.points.last().unwrap().confidence, 0.5);
    }

    #[test]
    fn test_constant_series_is_flat_with_zero_band() {
        let f = forecast(&observations(&[7.0; 8]), 3, DEFAULT_MIN_HISTORY);
        let fit = f.fit.unwrap();
        assert_eq!(fit.direction, TrendDirection::Flat);
        assert!(fit.slope.abs() < 1e-12);
        assert!(f.points.iter().all(|p| (p.predicted - 7.0).abs() < 1e-9 && p.width() < 1e-9));
    }

    #[test]
    fn test_non_finite_history_is_rejected() {
        let mut h = linear(6);
        h[2].value = f64::NAN;
        assert!(!forecast(&h, 3, DEFAULT_MIN_HISTORY).is_ready());
    }

    #[test]
    fn test_timestamps_continue_spacing() {
        let h: Vec<Observation> = (0..6)
            .map(|i| Observation { ts: 1_000 + i * 86_400, value: i as f64 })
            .collect();
        let f = forecast(&h, 2, DEFAULT_MIN_HISTORY);
        assert_eq!(f.points[0].ts, 1_000 + 6 * 86_400);
        assert_eq!(f.points[1].ts, 1_000 + 7 * 86_400);
    }

    #[test]
    fn test_parse_series_csv() {
        let csv = "ts,value\n# comment\n1,10.5\n2, 11\n\n3,12.25\n";
        let rows = parse_series_csv(csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], Observation { ts: 3, value: 12.25 });
    }

    #[test]
    fn test_parse_series_csv_reports_line() {
        let err = parse_series_csv("1,10\n2,abc\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        let err = parse_series_csv("5,1\n4,2\n").unwrap_err();
        assert!(err.to_string().contains("not after"));
    }
}
