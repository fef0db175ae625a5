//! Structured JSON-lines logging.
//!
//! Every record carries a run id, a sequence number, level and domain, so a
//! demo session can be replayed and summarized from its log files:
//!
//! - `events.jsonl`: info and above
//! - `trace.jsonl`: trace/debug
//! - `metrics.jsonl`: periodic aggregates
//!
//! Records are also echoed to stderr, keeping stdout free for command output.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Advisor,  // Questions, matched replies
    Scenario, // Slider changes, evaluations
    Forecast, // Fits, insufficient-history guards
    Risk,     // Cluster detection
    Mock,     // Live KPI ticks
    Session,  // Start, reset, tab changes
    System,   // CLI startup, aggregates
    Profile,  // Timing scopes
    Audit,    // Export fingerprints
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Advisor => "advisor",
            Domain::Scenario => "scenario",
            Domain::Forecast => "forecast",
            Domain::Risk => "risk",
            Domain::Mock => "mock",
            Domain::Session => "session",
            Domain::System => "system",
            Domain::Profile => "profile",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
    metrics: Option<Mutex<BufWriter<File>>>,
}

fn open_log(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_log(run_dir.join("events.jsonl")),
            trace: open_log(run_dir.join("trace.jsonl")),
            metrics: open_log(run_dir.join("metrics.jsonl")),
            run_id,
        }
    })
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["email", "password", "token"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["user", "scenario_id", "factor_id", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Epoch seconds
pub fn now_ts() -> u64 {
    Utc::now().timestamp() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

/// Build the JSON record without writing it.
fn build_record(run_id: &str, seq: u64, level: Level, component: &str, event: &str, fields: Map<String, Value>) -> Value {
    let fields = sanitize_fields(fields);
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(seq));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry)
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let line = build_record(&ctx.run_id, next_seq(), level, component, event, fields).to_string();

    if event.starts_with("metrics.") {
        write_line(&ctx.metrics, &line);
    }
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    eprintln!("{}", line);
}

// =============================================================================
// Domain-specific helpers
// =============================================================================

pub fn log_forecast(series: &str, history_len: usize, horizon: usize, slope: Option<f64>, ready: bool) {
    let level = if ready { Level::Info } else { Level::Warn };
    log(
        level,
        Domain::Forecast,
        if ready { "forecast_ready" } else { "forecast_insufficient_history" },
        obj(&[
            ("series", v_str(series)),
            ("history_len", json!(history_len)),
            ("horizon", json!(horizon)),
            ("slope", slope.map(v_num).unwrap_or(Value::Null)),
        ]),
    );
}

pub fn log_clusters(threshold: f64, clusters: &[(Vec<String>, f64, &str)]) {
    let items: Vec<Value> = clusters
        .iter()
        .map(|(members, avg, severity)| json!({"members": members, "avg": avg, "severity": severity}))
        .collect();
    log(
        Level::Info,
        Domain::Risk,
        "clusters_detected",
        obj(&[
            ("threshold", v_num(threshold)),
            ("count", json!(clusters.len())),
            ("clusters", Value::Array(items)),
        ]),
    );
}

pub fn log_export(path: &str, fingerprint: &str, bytes: usize) {
    log(
        Level::Info,
        Domain::Audit,
        "snapshot_exported",
        obj(&[
            ("path", v_str(path)),
            ("fingerprint", v_str(fingerprint)),
            ("bytes", json!(bytes)),
        ]),
    );
}

pub fn log_tick(tick: usize, kpis: &[(&str, f64)]) {
    let values: Map<String, Value> = kpis.iter().map(|(k, v)| (k.to_string(), v_num(*v))).collect();
    log(
        Level::Debug,
        Domain::Mock,
        "kpi_tick",
        obj(&[("tick", json!(tick)), ("kpis", Value::Object(values))]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            context: None,
            started: Instant::now(),
            enabled: Self::should_sample(),
        }
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let enabled = Self::should_sample();
        Self {
            label,
            context: if enabled { Some(obj(fields)) } else { None },
            started: Instant::now(),
            enabled,
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|p| {
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
                    let bucket = (seq % 10_000) as f64 / 10_000.0;
                    bucket < p
                }
            })
            .unwrap_or(true)
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Session activity aggregator
// =============================================================================

static AGGREGATOR: OnceLock<Mutex<ActivityAggregator>> = OnceLock::new();

fn get_aggregator() -> &'static Mutex<ActivityAggregator> {
    AGGREGATOR.get_or_init(|| Mutex::new(ActivityAggregator::default()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Question,
    ScenarioRun,
    Forecast,
    Export,
}

#[derive(Debug, Default)]
struct ActivityAggregator {
    questions: u64,
    scenario_runs: u64,
    forecasts: u64,
    exports: u64,
}

impl ActivityAggregator {
    fn increment(&mut self, activity: Activity) {
        match activity {
            Activity::Question => self.questions += 1,
            Activity::ScenarioRun => self.scenario_runs += 1,
            Activity::Forecast => self.forecasts += 1,
            Activity::Export => self.exports += 1,
        }
    }

    fn take(&mut self) -> (u64, u64, u64, u64) {
        let out = (self.questions, self.scenario_runs, self.forecasts, self.exports);
        *self = Self::default();
        out
    }
}

/// Count one user interaction toward the next summary.
pub fn agg_increment(activity: Activity) {
    if let Ok(mut agg) = get_aggregator().lock() {
        agg.increment(activity);
    }
}

/// Emit and reset the interaction counters.
pub fn flush_activity_summary() {
    if let Ok(mut agg) = get_aggregator().lock() {
        let (questions, scenario_runs, forecasts, exports) = agg.take();
        log(
            Level::Info,
            Domain::System,
            "metrics.activity",
            obj(&[
                ("questions", json!(questions)),
                ("scenario_runs", json!(scenario_runs)),
                ("forecasts", json!(forecasts)),
                ("exports", json!(exports)),
            ]),
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }

    #[test]
    fn test_record_redacts_and_lifts_fields() {
        let rec = build_record(
            "r-test",
            7,
            Level::Info,
            "session",
            "session_start",
            obj(&[
                ("user", v_str("Alex")),
                ("email", v_str("alex@example.com")),
                ("plan", v_str("pro")),
            ]),
        );
        assert_eq!(rec["run_id"], "r-test");
        assert_eq!(rec["seq"], 7);
        assert_eq!(rec["lvl"], "INFO");
        assert_eq!(rec["user"], "Alex");
        assert_eq!(rec["data"]["email"], "[REDACTED]");
        assert_eq!(rec["data"]["plan"], "pro");
        assert!(rec["data"].get("user").is_none());
    }

    #[test]
    fn test_profile_scope_carries_context() {
        let scope = ProfileScope::with_context("forecast", &[("series", v_str("mock_revenue"))]);
        let series = scope.context.as_ref().and_then(|c| c.get("series")).cloned();
        if scope.enabled {
            assert_eq!(series, Some(v_str("mock_revenue")));
        } else {
            assert_eq!(series, None);
        }
    }

    #[test]
    fn test_aggregator_take_resets() {
        let mut agg = ActivityAggregator::default();
        agg.increment(Activity::Question);
        agg.increment(Activity::Question);
        agg.increment(Activity::Export);
        assert_eq!(agg.take(), (2, 0, 0, 1));
        assert_eq!(agg.take(), (0, 0, 0, 0));
    }
}
