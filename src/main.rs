use anyhow::Result;
use clap::{Parser, Subcommand};
use opsmedic::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "opsmedic",
    about = "Automated incident detection and recovery orchestration",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (monitoring loop + dashboard API)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// Path to opsmedic.toml; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Inspect the detection-rule catalog
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to opsmedic.toml
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List the effective rule catalog
    List {
        /// Path to opsmedic.toml; built-in defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, config } => {
            tracing::info!(%bind, "Starting opsmedic daemon");
            let config = load_config(config.as_ref())?;
            opsmedic::serve(&bind, config).await?;
        }
        Commands::Rules { action } => match action {
            RulesAction::List { config } => {
                let catalog = load_config(config.as_ref())?.catalog()?;
                println!(
                    "{:<24} | {:<4} | {:<8} | {:<10} | Actions",
                    "Name", "Sev", "Enabled", "Escalation"
                );
                println!("{:-<24}-|-{:-<4}-|-{:-<8}-|-{:-<10}-|-{:-<30}", "", "", "", "", "");
                for rule in catalog.iter() {
                    let actions: Vec<String> =
                        rule.actions.iter().map(|a| a.to_string()).collect();
                    println!(
                        "{:<24} | {:<4} | {:<8} | {:>7}min | {}",
                        rule.name,
                        rule.severity.to_string(),
                        rule.enabled,
                        rule.escalation_minutes,
                        actions.join(" -> ")
                    );
                }
            }
        },
        Commands::CheckConfig { config } => {
            let parsed = Config::load(&config)?;
            let catalog = parsed.catalog()?;
            println!("Config OK: {}", config.display());
            println!(
                "  tick={}s backoff={}s settle={}s call_timeout={}s retention={}d auto_recovery={}",
                parsed.monitor.tick_secs,
                parsed.monitor.backoff_secs,
                parsed.monitor.settle_secs,
                parsed.monitor.call_timeout_secs,
                parsed.monitor.retention_days,
                parsed.monitor.auto_recovery,
            );
            println!(
                "  rules: {} ({} enabled)",
                catalog.len(),
                catalog.enabled_count()
            );
        }
    }

    Ok(())
}
