use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use grafsim_core::config::AppConfig;
use grafsim_core::diagram::{Diagram, Variable};
use grafsim_core::event::EventBus;
use grafsim_core::types::SimEvent;
use grafsim_core::value::Value;
use grafsim_engine::expr::Condition;
use grafsim_engine::{Analyzer, Scenario, ScenarioRunner, Simulator, TickRunner, VariableWrite};

fn load_inputs(diagram: &Path, variables: Option<&Path>) -> anyhow::Result<(Diagram, Vec<Variable>)> {
    let parsed = Diagram::load(diagram)
        .with_context(|| format!("Failed to load diagram {}", diagram.display()))?;
    let vars = match variables {
        Some(path) => Variable::load_list(path)
            .with_context(|| format!("Failed to load variables {}", path.display()))?,
        None => Vec::new(),
    };
    info!(
        steps = parsed.steps.len(),
        transitions = parsed.transitions.len(),
        variables = vars.len(),
        "Diagram loaded"
    );
    Ok((parsed, vars))
}

/// Split `name=value` into its parts.
pub fn parse_assignment(raw: &str) -> anyhow::Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Empty variable name in '{}'", raw);
    }
    let value = Value::parse(value).with_context(|| format!("Invalid value in '{}'", raw))?;
    Ok((name.to_string(), value))
}

pub fn check(
    config: &AppConfig,
    diagram: &Path,
    variables: Option<&Path>,
    actions: &[String],
    strict: bool,
) -> anyhow::Result<()> {
    let (diagram, vars) = load_inputs(diagram, variables)?;
    let report = Analyzer::new(&vars)
        .with_actions(actions.iter().cloned())
        .analyze(&diagram);
    print!("{}", report.render());

    let strict = strict || config.analysis.warnings_as_errors;
    let passed = if strict {
        report.passed_strict()
    } else {
        report.passed()
    };
    if !passed {
        bail!(
            "Analysis failed: {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
    }
    Ok(())
}

pub fn simulate(
    config: &AppConfig,
    diagram: &Path,
    variables: Option<&Path>,
    scenarios: Option<&Path>,
    tick_ms: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let (diagram, vars) = load_inputs(diagram, variables)?;
    let scenarios = match scenarios {
        Some(path) => Scenario::load_list(path)
            .with_context(|| format!("Failed to load scenarios {}", path.display()))?,
        None => vec![Scenario::new("idle")],
    };

    let mut sim_config = config.simulation.clone();
    if let Some(ms) = tick_ms {
        if ms == 0 {
            bail!("--tick-ms must be greater than zero");
        }
        sim_config.tick_ms = ms;
    }

    let report = ScenarioRunner::from_config(&sim_config).run(&diagram, &vars, &scenarios)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}

pub async fn run(
    config: &AppConfig,
    diagram: &Path,
    variables: Option<&Path>,
    ticks: Option<u64>,
    set: &[String],
    interactive: bool,
) -> anyhow::Result<()> {
    let (diagram, vars) = load_inputs(diagram, variables)?;

    let mut sim_config = config.simulation.clone();
    if let Some(n) = ticks {
        sim_config.max_ticks = n;
    }

    let event_bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel::<VariableWrite>(64);

    for raw in set {
        let (name, value) = parse_assignment(raw)?;
        tx.send(VariableWrite::new(name, value)).await?;
    }

    if interactive {
        // Detached blocking reader.
        let tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines().map_while(|l| l.ok()) {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_assignment(line) {
                    Ok((name, value)) => {
                        if tx.blocking_send(VariableWrite::new(name, value)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Ignoring input line"),
                }
            }
        });
    }
    drop(tx);

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let mut events = event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SimEvent::Started { active_steps, .. } => {
                    println!("start        active: {}", active_steps.join(", "));
                }
                SimEvent::Tick {
                    tick,
                    time_ms,
                    active_steps,
                    fired_transitions,
                    ..
                } if !fired_transitions.is_empty() => {
                    println!(
                        "#{:<4} {:>7}ms  fired: {}  active: {}",
                        tick,
                        time_ms,
                        fired_transitions.join(", "),
                        active_steps.join(", ")
                    );
                }
                SimEvent::Tick { .. } => {}
                SimEvent::Stopped { ticks, .. } => {
                    println!("stopped after {} tick(s)", ticks);
                    break;
                }
            }
        }
    });

    let simulator = Simulator::new(&diagram, &vars);
    let summary = TickRunner::new(sim_config, simulator, event_bus, cancel)
        .with_inputs(rx)
        .run()
        .await?;
    printer.await.ok();

    info!(
        session = %summary.session_id,
        ticks = summary.ticks,
        firings = summary.firings,
        "Run finished"
    );
    Ok(())
}

pub fn eval(expression: &str, vars: &[String], prev: &[String], show_rpn: bool) -> anyhow::Result<()> {
    let to_map = |raw: &[String]| -> anyhow::Result<HashMap<String, Value>> {
        raw.iter().map(|r| parse_assignment(r)).collect()
    };
    let current = to_map(vars)?;
    let previous = to_map(prev)?;

    let condition = Condition::parse(expression);
    if show_rpn {
        println!("rpn: {}", condition.rpn_string());
    }
    println!("{}", condition.evaluate(&current, &previous));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("start=true").unwrap(), ("start".to_string(), Value::Bool(true)));
        assert_eq!(parse_assignment(" level = 2.5").unwrap(), ("level".to_string(), Value::Number(2.5)));
        assert!(parse_assignment("start").is_err());
        assert!(parse_assignment("=1").is_err());
        assert!(parse_assignment("x=maybe").is_err());
    }
}
