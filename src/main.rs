mod commands;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grafsim_core::config::AppConfig;

#[derive(Parser)]
#[command(name = "grafsim", version, about = "GRAFCET/SFC diagram checker and simulator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "grafsim.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Statically analyse a diagram
    Check {
        /// Diagram file (list or element JSON form)
        diagram: PathBuf,
        /// Variable definitions file
        #[arg(long)]
        variables: Option<PathBuf>,
        /// Fail on warnings as well as errors
        #[arg(long)]
        strict: bool,
        /// Output name that step actions may drive (repeatable)
        #[arg(long = "action", value_name = "NAME")]
        actions: Vec<String>,
    },
    /// Run scenarios on a logical clock and print the trace
    Simulate {
        diagram: PathBuf,
        #[arg(long)]
        variables: Option<PathBuf>,
        /// Scenario list file
        #[arg(long)]
        scenarios: Option<PathBuf>,
        /// Tick period override in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drive a diagram in real time
    Run {
        diagram: PathBuf,
        #[arg(long)]
        variables: Option<PathBuf>,
        /// Stop after this many ticks (0 = until Ctrl-C)
        #[arg(long)]
        ticks: Option<u64>,
        /// Initial variable write, `name=value` (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Read `name=value` writes from stdin while running
        #[arg(long)]
        interactive: bool,
    },
    /// Evaluate a single condition
    Eval {
        /// Condition text, e.g. "RE(start) AND NOT stop"
        expression: String,
        /// Current value, `name=value` (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
        /// Previous-tick value, `name=value` (repeatable)
        #[arg(long = "prev", value_name = "NAME=VALUE")]
        prev: Vec<String>,
        /// Also print the RPN form
        #[arg(long)]
        rpn: bool,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "grafsim", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    let default_filter = config
        .log
        .filter
        .clone()
        .unwrap_or_else(|| "grafsim=info,warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            diagram,
            variables,
            strict,
            actions,
        } => commands::check(&config, &diagram, variables.as_deref(), &actions, strict),
        Commands::Simulate {
            diagram,
            variables,
            scenarios,
            tick_ms,
            json,
        } => commands::simulate(
            &config,
            &diagram,
            variables.as_deref(),
            scenarios.as_deref(),
            tick_ms,
            json,
        ),
        Commands::Run {
            diagram,
            variables,
            ticks,
            set,
            interactive,
        } => {
            commands::run(
                &config,
                &diagram,
                variables.as_deref(),
                ticks,
                &set,
                interactive,
            )
            .await
        }
        Commands::Eval {
            expression,
            vars,
            prev,
            rpn,
        } => commands::eval(&expression, &vars, &prev, rpn),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }
}
