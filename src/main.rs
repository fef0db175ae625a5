use std::path::Path;

use anyhow::{anyhow, Context, Result};
use stratintel::advisor::{self, Advisor, ScriptedAdvisor};
use stratintel::config::Config;
use stratintel::forecast::{self, Observation};
use stratintel::logging::{
    agg_increment, flush_activity_summary, log, log_clusters, log_forecast, log_tick, now_ts, obj, v_num, v_str,
    Activity, Domain, Level, ProfileScope,
};
use stratintel::mock::{live_ticks, MockGenerator};
use stratintel::report::DashboardSnapshot;
use stratintel::risk;
use stratintel::scenario::{self, Preset};
use stratintel::session::{AppState, DashboardTab};

const USAGE: &str = "usage: stratintel <command>

commands:
  scenario [preset]     evaluate the scenario model (baseline, growth, cost, digital, defensive)
  forecast [csv]        fit and project a ts,value series (mock history when omitted)
  risk                  list risk clusters and exposure
  advisor <question>    ask the scripted advisor
  dashboard [out.json]  export a full dashboard snapshot
  live                  stream simulated KPI updates";

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[("command", v_str(command)), ("seed", v_num(cfg.seed as f64))]),
    );

    let result = match command.as_str() {
        "scenario" => cmd_scenario(&cfg, rest),
        "forecast" => cmd_forecast(&cfg, rest),
        "risk" => cmd_risk(&cfg),
        "advisor" => cmd_advisor(&cfg, rest).await,
        "dashboard" => cmd_dashboard(&cfg, rest),
        "live" => cmd_live(&cfg).await,
        "help" | "-h" | "--help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => Err(anyhow!("unknown command {:?}\n\n{}", other, USAGE)),
    };

    flush_activity_summary();
    result
}

fn cmd_scenario(cfg: &Config, rest: &[String]) -> Result<()> {
    let preset = match rest.first() {
        Some(name) => Preset::parse(name).ok_or_else(|| anyhow!("unknown preset {:?}", name))?,
        None => Preset::Baseline,
    };
    let mut state = AppState::new(cfg, now_ts());
    state.apply_preset(preset);
    let outcome = state.evaluate_scenario();
    agg_increment(Activity::ScenarioRun);

    println!("Scenario: {}", preset.as_str());
    for v in &state.scenario {
        println!("  {:<26} {:>8.1} {}", v.name, v.current(), v.unit);
    }
    println!();
    println!("  Revenue    {:>7.1}", outcome.revenue);
    println!("  Risk       {:>7.1}", outcome.risk);
    println!("  Agility    {:>7.1}", outcome.agility);
    println!("  Efficiency {:>7.1}", outcome.efficiency);
    println!("  Overall    {:>7}  ({:.2})", outcome.score, outcome.overall);
    println!();
    println!("{}", outcome.recommendation.message());

    let drivers = scenario::drivers(&state.scenario);
    if !drivers.is_empty() {
        println!();
        println!("Key drivers:");
        for d in drivers {
            println!("  {:<26} {:+.2}", d.name, d.overall_impact);
        }
    }
    Ok(())
}

fn cmd_forecast(cfg: &Config, rest: &[String]) -> Result<()> {
    let (label, history): (String, Vec<Observation>) = match rest.first() {
        Some(path) => {
            let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            (path.clone(), forecast::parse_series_csv(&content)?)
        }
        None => {
            let mut mock = MockGenerator::new(cfg.seed);
            let start = now_ts().saturating_sub(cfg.history_len as u64 * 86_400);
            ("mock_revenue".to_string(), mock.history(cfg.history_len, 42.0, 0.6, 1.5, start))
        }
    };

    let f = {
        let _scope = ProfileScope::with_context(
            "forecast",
            &[("series", v_str(&label)), ("points", v_num(history.len() as f64))],
        );
        forecast::forecast(&history, cfg.forecast_horizon, cfg.forecast_min_history)
    };
    agg_increment(Activity::Forecast);
    log_forecast(&label, history.len(), cfg.forecast_horizon, f.fit.map(|t| t.slope), f.is_ready());

    match (&f.status, &f.fit) {
        (forecast::ForecastStatus::Ready, Some(fit)) => {
            println!(
                "Trend {} slope={:.4} r2={:.3} stderr={:.4}",
                fit.direction.as_str(),
                fit.slope,
                fit.r_squared,
                fit.stderr
            );
            println!("{:>12} {:>10} {:>10} {:>10} {:>6}", "ts", "predicted", "lower", "upper", "conf");
            for p in &f.points {
                println!(
                    "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>5.0}%",
                    p.ts,
                    p.predicted,
                    p.lower,
                    p.upper,
                    p.confidence * 100.0
                );
            }
        }
        (forecast::ForecastStatus::InsufficientHistory { have, need }, _) => {
            println!("No forecast available: {} point(s) of history, need {}", have, need);
        }
        (forecast::ForecastStatus::Ready, None) => {
            return Err(anyhow!("forecast marked ready without a fit"));
        }
    }
    Ok(())
}

fn cmd_risk(cfg: &Config) -> Result<()> {
    let matrix = risk::default_matrix();
    let clusters = {
        let _scope = ProfileScope::new("risk_clusters");
        matrix.clusters(cfg.cluster_threshold)
    };
    let summary: Vec<(Vec<String>, f64, &str)> = clusters
        .iter()
        .map(|c| (c.members.clone(), c.avg_correlation, c.severity.as_str()))
        .collect();
    log_clusters(cfg.cluster_threshold, &summary);

    println!("Risk factors:");
    for f in matrix.factors() {
        println!("  [{}] {:<26} {:>3} {:?} {:?}", f.code, f.name, f.level, f.band(), f.trend);
    }
    println!();
    println!("Clusters (|corr| >= {:.2}):", cfg.cluster_threshold);
    for c in &clusters {
        let codes: Vec<&str> = c
            .members
            .iter()
            .filter_map(|id| matrix.factor(id).map(|f| f.code.as_str()))
            .collect();
        println!("  {:<9} avg={:.3} {}", c.severity.as_str(), c.avg_correlation, codes.join(" + "));
    }
    let e = matrix.exposure();
    println!();
    println!(
        "Exposure: mean {:.1}, max {}, rising {}, critical {}, high {}",
        e.mean_level, e.max_level, e.rising, e.critical, e.high
    );
    Ok(())
}

async fn cmd_advisor(cfg: &Config, rest: &[String]) -> Result<()> {
    let question = rest.join(" ");
    if question.trim().is_empty() {
        return Err(anyhow!("advisor needs a question"));
    }
    let mut state = AppState::new(cfg, now_ts());
    state.enter_tab(DashboardTab::Advisor)?;
    let bot = ScriptedAdvisor::with_default_catalog(cfg.advisor_delay_ms);
    let reply = bot.ask(&question).await;
    state.record_exchange(&question, &reply, now_ts());
    agg_increment(Activity::Question);

    println!("{}", reply.text);
    println!();
    println!("confidence: {}%", reply.confidence);
    if !reply.related_metrics.is_empty() {
        println!("related: {}", reply.related_metrics.join(", "));
    }
    for tip in advisor::suggestions(&reply, bot.catalog(), 3) {
        println!("  > {}", tip);
    }
    Ok(())
}

fn cmd_dashboard(cfg: &Config, rest: &[String]) -> Result<()> {
    let path = rest.first().cloned().unwrap_or_else(|| cfg.export_path.clone());
    let now = now_ts();
    let state = AppState::new(cfg, now);
    if !state.flags.export {
        log(
            Level::Warn,
            Domain::Session,
            "export_not_in_plan",
            obj(&[("plan", v_str(state.user.plan.as_str()))]),
        );
    }
    let mut mock = MockGenerator::new(cfg.seed);
    let snapshot = DashboardSnapshot::build(&state, &mut mock, cfg, now);
    let fingerprint = snapshot.write_json(Path::new(&path))?;
    println!("wrote {} ({})", path, fingerprint);
    Ok(())
}

async fn cmd_live(cfg: &Config) -> Result<()> {
    let mut mock = MockGenerator::new(cfg.seed);
    let kpis = mock.kpis();
    live_ticks(&mut mock, kpis, cfg.live_ticks, cfg.tick_ms, |i, kpis| {
        let values: Vec<(&str, f64)> = kpis.iter().map(|k| (k.id.as_str(), k.value)).collect();
        log_tick(i, &values);
        let line: Vec<String> = kpis
            .iter()
            .map(|k| format!("{} {:.2}{} ({:+.2}%)", k.name, k.value, k.unit, k.delta_pct))
            .collect();
        println!("[tick {}] {}", i + 1, line.join(" | "));
    })
    .await;
    Ok(())
}
