//! fleet-runner: headless runner for the fleet scoring core.
//!
//! Usage:
//!   fleet-runner --snapshot fleet.json --config-dir data --weeks-ago 1 --team North
//!   fleet-runner --seed 12345 --drivers 120 --json
//!   fleet-runner --seed 12345 --ipc-mode

mod synth;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use fleetscore_core::{
    clock::PayrollClock,
    config::EngineConfig,
    engine::{FleetEngine, FleetView, ViewFilter},
    snapshot::FleetSnapshot,
    types::ContractFilter,
};
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    View {
        #[serde(default)]
        filter: ViewFilter,
    },
    SetRiskWeight {
        metric: String,
        weight: f64,
    },
    SetComplianceWeight {
        metric: String,
        weight: f64,
    },
    Invalidate,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let drivers = parse_arg(&args, "--drivers", 60usize);
    let weeks_ago = parse_arg(&args, "--weeks-ago", 1i64);
    let json = args.iter().any(|a| a == "--json");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let snapshot_path = str_arg(&args, "--snapshot");
    let config_dir = str_arg(&args, "--config-dir");
    let team = str_arg(&args, "--team");
    let contract = match str_arg(&args, "--contract") {
        Some("OO") => ContractFilter::OwnerOperator,
        Some("LOO") => ContractFilter::LeaseOwnerOperator,
        Some(other) => return Err(anyhow!("Unknown contract filter {other}: expected OO or LOO")),
        None => ContractFilter::All,
    };
    let clock = match str_arg(&args, "--today") {
        Some(raw) => PayrollClock::new(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| anyhow!("Bad --today {raw}: {e}"))?,
        ),
        None => PayrollClock::today_utc(),
    };

    let config = match config_dir {
        Some(dir) => EngineConfig::load(dir)?,
        None => EngineConfig::default(),
    };
    let snapshot = match snapshot_path {
        Some(path) => {
            FleetSnapshot::load(path).map_err(|e| anyhow!("Cannot load snapshot {path}: {e}"))?
        }
        None => synth::generate_fleet(seed, drivers, clock.today),
    };

    if !ipc_mode && !json {
        println!("fleet-runner");
        println!("  today:     {}", clock.today);
        match snapshot_path {
            Some(path) => println!("  snapshot:  {path}"),
            None => println!("  synthetic: seed {seed}, {drivers} drivers"),
        }
        println!("  config:    {}", config_dir.unwrap_or("(defaults)"));
        println!();
    }

    let mut engine = FleetEngine::new(clock, config, snapshot);

    if ipc_mode {
        return run_ipc_loop(&mut engine);
    }

    let mut filter = ViewFilter::weeks_ago(weeks_ago).with_contract(contract);
    if let Some(team) = team {
        filter = filter.with_team(team);
    }
    let view = engine.view(&filter)?;
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
    } else {
        print_summary(view);
    }
    Ok(())
}

/// One JSON line in, one JSON line out, until `quit` or EOF.
fn run_ipc_loop(engine: &mut FleetEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Some(reply) = handle_line(engine, &line) else {
            break;
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Reply to one command line; `None` means stop.
fn handle_line(engine: &mut FleetEngine, line: &str) -> Option<Value> {
    let cmd: IpcCommand = match serde_json::from_str(line) {
        Ok(cmd) => cmd,
        Err(e) => return Some(json!({ "error": format!("bad command: {e}") })),
    };
    log::debug!("ipc command {line}");

    let reply = match cmd {
        IpcCommand::Quit => return None,
        IpcCommand::View { filter } => engine
            .view(&filter)
            .map_err(anyhow::Error::from)
            .and_then(|view| Ok(serde_json::to_value(view)?))
            .unwrap_or_else(|e| json!({ "error": e.to_string() })),
        IpcCommand::SetRiskWeight { metric, weight } => {
            engine.update_config(|cfg| cfg.risk_weights.set(&metric, weight));
            json!({ "ok": true })
        }
        IpcCommand::SetComplianceWeight { metric, weight } => {
            engine.update_config(|cfg| cfg.compliance_weights.set(&metric, weight));
            json!({ "ok": true })
        }
        IpcCommand::Invalidate => {
            engine.invalidate();
            json!({ "ok": true })
        }
    };
    Some(reply)
}

fn print_summary(view: &FleetView) {
    let k = &view.kpis;
    println!(
        "=== Window {} .. {}{} ===",
        view.window.start,
        view.window.end,
        if view.live { " (live)" } else { "" }
    );
    println!("  Active trucks:     {}", k.active_trucks);
    println!("  Total gross:       ${:.2}", k.total_gross);
    println!("  Team RPM:          {:.2}", k.team_rpm);
    println!("  Team margin:       ${:.2}", k.team_margin);
    println!("  Liability:         ${:.2}", k.total_liability);
    println!("  Canceled loads:    {}", k.canceled_loads);
    println!("  Trailer drops:     {}", k.trailer_drops);
    println!("  Median drop risk:  {:.1}", k.median_drop_risk);
    println!("  Median wellness:   {:.1}%", k.median_wellness);
    println!("  Median compliance: {:.1}", k.median_compliance);
    match k.retention_pct {
        Some(pct) => println!(
            "  Retention:         {pct:.1}% ({} retained / {} terminated / {} transferred)",
            k.retention.retained, k.retention.terminated, k.retention.transferred
        ),
        None => println!("  Retention:         n/a"),
    }

    println!();
    println!("=== Dispatchers ===");
    for d in &view.dispatchers {
        println!(
            "  {:<22} {:<6} OO {:>2} LOO {:>2}  compliance {:>5.1}  retention {:>6}  tenure OO {:>5} LOO {:>5}",
            d.id,
            d.team.as_deref().unwrap_or("-"),
            d.roster_oo,
            d.roster_loo,
            d.compliance.composite,
            fmt_opt(d.retention_pct, "%"),
            fmt_opt(d.tenure.oo, ""),
            fmt_opt(d.tenure.loo, ""),
        );
    }

    println!();
    println!("=== Highest drop risk ===");
    let mut drivers: Vec<_> = view.drivers.iter().collect();
    drivers.sort_by(|a, b| b.drop_risk.total_cmp(&a.drop_risk).then(a.id.cmp(&b.id)));
    for d in drivers.iter().take(10) {
        let labels: Vec<&str> = d.flags.iter().map(|f| f.label.as_str()).collect();
        println!(
            "  {:<10} {:>5.1}  {:<22} {}",
            d.id,
            d.drop_risk,
            d.dispatcher.as_deref().unwrap_or("-"),
            labels.join(", ")
        );
    }
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}{suffix}"))
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FleetEngine {
        let clock = PayrollClock::new(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        let snapshot = synth::generate_fleet(7, 24, clock.today);
        FleetEngine::new(clock, EngineConfig::default(), snapshot)
    }

    #[test]
    fn view_command_returns_the_view() {
        let mut engine = engine();
        let reply = handle_line(&mut engine, r#"{"type":"view","filter":{"weeks_ago":1}}"#).unwrap();
        assert!(reply.get("kpis").is_some(), "reply: {reply}");
        assert_eq!(reply["live"], json!(false));
    }

    #[test]
    fn errors_are_replies_not_exits() {
        let mut engine = engine();
        let bad = handle_line(&mut engine, "not json").unwrap();
        assert!(bad["error"].as_str().unwrap().starts_with("bad command"));

        let negative = handle_line(&mut engine, r#"{"type":"view","filter":{"weeks_ago":-2}}"#).unwrap();
        assert!(negative["error"].as_str().unwrap().contains("-2"));
    }

    #[test]
    fn weight_edit_invalidates_and_quit_stops() {
        let mut engine = engine();
        handle_line(&mut engine, r#"{"type":"view"}"#).unwrap();
        assert_eq!(engine.cache().len(), 1);

        let ok = handle_line(&mut engine, r#"{"type":"set_risk_weight","metric":"lowNet","weight":40}"#);
        assert_eq!(ok, Some(json!({ "ok": true })));
        assert!(engine.cache().is_empty());
        assert_eq!(engine.config().risk_weights.get("lowNet"), 40.0);

        assert_eq!(handle_line(&mut engine, r#"{"type":"quit"}"#), None);
    }
}
