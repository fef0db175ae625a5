//! Interactive chat with the scripted advisor.
//!
//! Run with: cargo run --bin advisor_chat
//! Type a question per line; `reset` clears the session, `quit` exits.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use stratintel::advisor::{suggestions, Advisor, ScriptedAdvisor};
use stratintel::config::Config;
use stratintel::logging::{agg_increment, flush_activity_summary, now_ts, Activity};
use stratintel::session::{Access, AppState, DashboardTab};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let mut state = AppState::new(&cfg, now_ts());
    match state.open_tab(DashboardTab::Advisor) {
        Access::Granted => {}
        Access::NotInPlan => {
            println!("The advisor is not included in the {} plan.", state.user.plan.as_str());
            return Ok(());
        }
        Access::Denied(p) => {
            println!("Role {} lacks {:?}.", state.user.role.as_str(), p);
            return Ok(());
        }
    }

    let bot = ScriptedAdvisor::with_default_catalog(cfg.advisor_delay_ms);
    println!("Strategy advisor ready. Ask about revenue, risk, costs, markets...");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        match question {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => {
                state.reset();
                println!("(session reset)");
                continue;
            }
            _ => {}
        }

        println!("...");
        let reply = bot.ask(question).await;
        state.record_exchange(question, &reply, now_ts());
        agg_increment(Activity::Question);

        println!("{}", reply.text);
        println!("[confidence {}%]", reply.confidence);
        for tip in suggestions(&reply, bot.catalog(), 2) {
            println!("  > {}", tip);
        }
        println!();
    }

    println!("{} message(s) this session.", state.chat.len());
    flush_activity_summary();
    Ok(())
}
