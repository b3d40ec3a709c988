use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dagsel_core::{ErrorCode, OutputShape, ResourceType, Settings, SettingsError};
use dagsel_dbt::{Catalog, CatalogError, Declarations, DeclarationsError, DependencyGraph, GraphError};
use dagsel_engine::{
    project, NodeSelector, ResourceTypeFilter, SelectionRequest, SelectionSpec, SelectorParseError,
};

/// dagsel - resource graph and node selection for dbt-style projects
#[derive(Parser)]
#[command(name = "dagsel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dagsel.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resources matching a selection
    #[command(visible_alias = "list")]
    Ls(LsArgs),
}

#[derive(Args)]
struct LsArgs {
    /// Nodes to include (default: every node and source)
    #[arg(short, long, num_args = 1.., value_name = "SELECTOR")]
    select: Vec<String>,

    /// Legacy form of --select; implies --resource-type model
    #[arg(short = 'm', long = "models", num_args = 1.., value_name = "SELECTOR", conflicts_with = "select")]
    models: Vec<String>,

    /// Nodes to remove from the selection
    #[arg(long, num_args = 1.., value_name = "SELECTOR")]
    exclude: Vec<String>,

    /// Restrict to resource types (model, seed, snapshot, analysis, test, source, all, default)
    #[arg(long = "resource-type", num_args = 1.., value_name = "TYPE")]
    resource_types: Vec<String>,

    /// Output shape: name, selector, path or json
    #[arg(short, long)]
    output: Option<OutputShape>,

    /// Path to the declarations document (overrides the config file)
    #[arg(long)]
    declarations: Option<PathBuf>,

    /// Exit non-zero when nothing is selected
    #[arg(long)]
    fail_on_empty: bool,
}

/// Raised when an empty selection is escalated
#[derive(Debug, thiserror::Error)]
#[error("No nodes selected")]
struct EmptySelection;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match error_code(&err) {
                Some(code) => eprintln!("{} {:#}", format!("error[{}]:", code).red().bold(), err),
                None => eprintln!("{} {:#}", "error:".red().bold(), err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref(), cli.verbose)?;

    match &cli.command {
        Commands::Ls(args) => ls_command(&settings, args, cli.verbose),
    }
}

fn load_settings(path: Option<&Path>, verbose: bool) -> Result<Settings> {
    let settings = if let Some(path) = path {
        Settings::from_file(path)?
    } else if Path::new("dagsel.toml").exists() {
        Settings::from_file(Path::new("dagsel.toml"))?
    } else {
        tracing::debug!("no config file found, using defaults");
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Settings::default()
    };

    Ok(settings)
}

/// List command - resolve the selection and print one line per node
fn ls_command(settings: &Settings, args: &LsArgs, verbose: bool) -> Result<()> {
    let declarations_path = args
        .declarations
        .clone()
        .unwrap_or_else(|| settings.declarations_path());

    tracing::debug!(path = %declarations_path.display(), "loading declarations");
    if verbose {
        eprintln!("{} {}", "Loading declarations from:".cyan(), declarations_path.display());
    }

    let declarations = Declarations::from_file(&declarations_path)?;
    let catalog = Catalog::build(&declarations)?;
    let graph = DependencyGraph::from_catalog(&catalog)?;

    if verbose {
        eprintln!(
            "{} {} nodes ({} disabled)",
            "Catalog:".cyan(),
            catalog.len(),
            catalog.disabled().count()
        );
    }

    tracing::debug!(
        nodes = catalog.len(),
        disabled = catalog.disabled().count(),
        "project loaded"
    );

    let request = selection_request(args)?;
    let selection = NodeSelector::new(&catalog, &graph)
        .with_settings(&settings.selection)
        .select(&request);

    if selection.is_empty() && (args.fail_on_empty || settings.list.fail_on_empty_selection) {
        return Err(EmptySelection.into());
    }

    let shape = args.output.unwrap_or(settings.list.output);
    tracing::info!(selected = selection.len(), output = ?shape, "listing selection");
    let lines = project(&catalog, &selection, shape)?;

    let mut stdout = std::io::stdout().lock();
    for line in &lines {
        writeln!(stdout, "{}", line).context("Failed to write listing")?;
    }

    if verbose {
        eprintln!("{} {} nodes", "Selected".green(), selection.len());
    }

    Ok(())
}

fn selection_request(args: &LsArgs) -> Result<SelectionRequest> {
    let mut request = SelectionRequest::new();

    let (select, implied) = if args.models.is_empty() {
        (&args.select, None)
    } else {
        (&args.models, Some(ResourceType::Model))
    };

    if !select.is_empty() {
        request = request.with_select(SelectionSpec::parse(select)?);
    }
    if !args.exclude.is_empty() {
        request = request.with_exclude(SelectionSpec::parse(&args.exclude)?);
    }

    request = match (implied, args.resource_types.is_empty()) {
        (Some(resource_type), true) => request.with_resource_types(ResourceTypeFilter::only([resource_type])),
        _ => request.with_resource_types(ResourceTypeFilter::parse(&args.resource_types)?),
    };

    Ok(request)
}

/// Stable code of a known failure
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    if let Some(e) = err.downcast_ref::<CatalogError>() {
        return Some(e.code());
    }
    if let Some(e) = err.downcast_ref::<GraphError>() {
        return Some(e.code());
    }
    if let Some(e) = err.downcast_ref::<SelectorParseError>() {
        return Some(e.code());
    }
    if let Some(e) = err.downcast_ref::<DeclarationsError>() {
        return Some(e.code());
    }
    if let Some(e) = err.downcast_ref::<SettingsError>() {
        return Some(e.code());
    }
    if err.downcast_ref::<EmptySelection>().is_some() {
        return Some(ErrorCode::EmptySelection);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ls_args(argv: &[&str]) -> LsArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Ls(args) => args,
        }
    }

    #[test]
    fn models_flag_implies_model_resource_type() {
        let args = ls_args(&["dagsel", "ls", "--models", "outer+"]);
        let request = selection_request(&args).unwrap();

        assert!(request.resource_types.contains(ResourceType::Model));
        assert!(!request.resource_types.contains(ResourceType::Test));
    }

    #[test]
    fn known_failures_carry_codes() {
        let args = ls_args(&["dagsel", "list", "--select", "outer+x"]);
        let err = selection_request(&args).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::SelectorParseError));

        assert_eq!(error_code(&EmptySelection.into()), Some(ErrorCode::EmptySelection));
        assert_eq!(error_code(&anyhow::anyhow!("other")), None);
    }
}
