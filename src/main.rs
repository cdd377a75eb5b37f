use anyhow::{Context, Result};
use athena_federation_stack::{
    init_logging_with_default, CloudAssembly, Diagnostic, FederationStack, StackConfig, StackError,
    Synthesis,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Synthesize the Athena MySQL federation stack
#[derive(Parser)]
#[command(name = "athena-federation-stack")]
#[command(version)]
#[command(about = "Synthesize the Athena MySQL federation stack", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the template, or write a cloud assembly with --output
    Synth {
        /// Assembly directory (e.g. cdk.out)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Check the stack and print every diagnostic
    Validate,
    /// Show the stack name, environment and declared resources
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging_with_default(&cli.log_level);

    let config = load_config(&cli)?;
    let federation = FederationStack::build(&config).context("Failed to declare stack")?;

    match cli.command {
        Commands::Synth { output } => synth(&federation, output),
        Commands::Validate => validate(&federation),
        Commands::List => list(&federation),
    }
}

fn load_config(cli: &Cli) -> Result<StackConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        StackConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        StackConfig::load_or_default().context("Failed to load configuration")?
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Synthesize and log every diagnostic at its severity.
fn synthesize(federation: &FederationStack) -> Result<Synthesis> {
    match federation.synth() {
        Ok(synthesis) => {
            log_diagnostics(&synthesis.diagnostics);
            Ok(synthesis)
        },
        Err(e) => {
            log_diagnostics(e.diagnostics());
            Err(e).context("Synthesis failed")
        },
    }
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        if diagnostic.is_error() {
            error!("{}", diagnostic);
        } else {
            warn!("{}", diagnostic);
        }
    }
}

fn synth(federation: &FederationStack, output: Option<PathBuf>) -> Result<()> {
    let synthesis = synthesize(federation)?;
    match output {
        Some(dir) => {
            let assembly = CloudAssembly::write(&dir, &synthesis)
                .with_context(|| format!("Failed to write assembly to {}", dir.display()))?;
            info!(directory = %assembly.directory().display(), "synth complete");
        },
        None => println!("{}", synthesis.template.to_json_pretty()?),
    }
    Ok(())
}

/// Print diagnostics to stdout. Nothing is logged, so each appears once.
fn validate(federation: &FederationStack) -> Result<()> {
    match federation.synth() {
        Ok(synthesis) => {
            for diagnostic in &synthesis.diagnostics {
                println!("{}", diagnostic);
            }
            println!(
                "{}: valid ({} warning(s))",
                synthesis.stack_name,
                synthesis.diagnostics.len()
            );
            Ok(())
        },
        Err(StackError::Validation(diagnostics)) => {
            for diagnostic in &diagnostics {
                println!("{}", diagnostic);
            }
            anyhow::bail!(
                "{}: {} error(s)",
                federation.stack().name(),
                diagnostics.iter().filter(|d| d.is_error()).count()
            )
        },
        Err(e) => Err(e).context("Synthesis failed"),
    }
}

fn list(federation: &FederationStack) -> Result<()> {
    let stack = federation.stack();
    println!("{} ({})", stack.name(), stack.environment().uri());

    let template = synthesize(federation)?.template;
    for (logical_id, resource) in &template.resources {
        println!("  {:<24} {}", logical_id, resource.resource_type);
    }
    for (construct_id, reference) in template.external_references()? {
        println!(
            "  {:<24} {} (lookup {}={})",
            construct_id, reference.resource_type, reference.lookup_by, reference.identifier
        );
    }
    Ok(())
}
