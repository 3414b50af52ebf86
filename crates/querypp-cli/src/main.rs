use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use querypp_core::{Config, Diagnostic, DiagnosticCode, Report, Severity};
use querypp_template::{QueryLoader, QuerySet, Template};

/// querypp - render SQL templates with named, optional blocks
#[derive(Parser)]
#[command(name = "querypp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: querypp.toml)
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
    /// Render a template with the given blocks kept
    Render {
        /// Template or multi-query file
        file: PathBuf,

        /// Query to render from a multi-query file
        #[arg(short, long)]
        query: Option<String>,

        /// Block to keep (repeatable)
        #[arg(short, long = "block")]
        blocks: Vec<String>,

        /// Keep every block
        #[arg(long, conflicts_with = "blocks")]
        all: bool,
    },

    /// List queries and their blocks
    List {
        /// Template or multi-query file
        file: PathBuf,
    },

    /// Check templates for malformed blocks
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file for report.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        load_config(config_path)?
    } else if Path::new("querypp.toml").exists() {
        load_config(Path::new("querypp.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    tracing::debug!(syntax = ?config.syntax, "configuration loaded");

    match cli.command {
        Commands::Render { file, query, blocks, all } => {
            render_command(&config, &file, query.as_deref(), &blocks, all)
        }
        Commands::List { file } => list_command(&config, &file),
        Commands::Check { files, output } => {
            check_command(&config, &files, output.as_deref(), cli.verbose)
        }
    }
}

/// Log to stderr; RUST_LOG overrides the verbosity flag
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Read a config file, reporting failures with their diagnostic code
fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path)
        .map_err(|e| diagnostic_error(e.to_diagnostic().in_file(path.display().to_string())))
}

fn query_loader(config: &Config) -> Result<QueryLoader> {
    QueryLoader::new(config.syntax.clone()).map_err(|e| diagnostic_error(e.to_diagnostic()))
}

/// Error carrying a diagnostic's stable code and location
fn diagnostic_error(diag: Diagnostic) -> anyhow::Error {
    match &diag.location {
        Some(location) => anyhow::anyhow!("[{}] {}: {}", diag.code, location, diag.message),
        None => anyhow::anyhow!("[{}] {}", diag.code, diag.message),
    }
}

/// Load a file as named queries, or as one unnamed template when it has no
/// `-- :name` markers
fn load_templates(config: &Config, path: &Path) -> Result<Vec<Template>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let queries = query_loader(config)?
        .load_str(&text)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if queries.is_empty() {
        let template = Template::with_syntax(None, &text, &config.syntax)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        return Ok(vec![template]);
    }

    Ok(queries.into_iter().collect())
}

/// Render command - print a template with the requested blocks
fn render_command(
    config: &Config,
    path: &Path,
    query: Option<&str>,
    blocks: &[String],
    all: bool,
) -> Result<()> {
    let template = match query {
        Some(name) => {
            let queries = query_loader(config)?
                .load_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            find_query(&queries, name)?
        }
        None => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Template::with_syntax(None, &text, &config.syntax)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
    };

    let rendered = if all {
        template.render_all()
    } else {
        template.render(blocks)?
    };

    print!("{}", rendered);
    Ok(())
}

/// Take a query out of a loaded set by name
fn find_query(queries: &QuerySet, name: &str) -> Result<Template> {
    queries
        .require(name)
        .cloned()
        .map_err(|e| diagnostic_error(e.to_diagnostic()))
}

/// List command - show queries and their blocks
fn list_command(config: &Config, path: &Path) -> Result<()> {
    let templates = load_templates(config, path)?;

    for template in &templates {
        let name = template.name().unwrap_or("<unnamed>");
        println!("{} ({} lines)", name.bold().green(), template.line_count());

        if template.blocks().is_empty() {
            println!("  {}", "no blocks".dimmed());
            continue;
        }

        for (block, lines) in template.blocks() {
            let first = lines.iter().next().map_or(0, |line| line + 1);
            println!("  {} {} (line {}, {} lines)", "-".cyan(), block, first, lines.len());
        }
    }

    Ok(())
}

/// Check command - parse every file and report malformed templates
fn check_command(
    config: &Config,
    files: &[PathBuf],
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let loader = query_loader(config)?;
    let mut report = Report::new();

    for path in files {
        if verbose {
            eprintln!("  {} {}...", "Checking".cyan(), path.display());
        }

        let file = path.display().to_string();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                report.add_diagnostic(
                    Diagnostic::new(
                        DiagnosticCode::LoadIoError,
                        Severity::Error,
                        format!("Failed to read {}: {}", file, e),
                    )
                    .in_file(&file),
                );
                report.record_file(0);
                continue;
            }
        };

        let parsed = match loader.load_str(&text) {
            Ok(queries) if queries.is_empty() => Template::with_syntax(None, &text, &config.syntax)
                .map(|_| 1)
                .map_err(|e| e.to_diagnostic()),
            Ok(queries) => Ok(queries.len()),
            Err(e) => Err(e.to_diagnostic()),
        };

        match parsed {
            Ok(count) => {
                report.record_file(count);
                if verbose {
                    eprintln!("    {} ({} queries)", "✓ OK".green(), count);
                }
            }
            Err(diag) => {
                report.record_file(0);
                if verbose {
                    eprintln!("    {} {}", "✗".red(), diag.message);
                }
                report.add_diagnostic(diag.in_file(&file));
            }
        }
    }

    if let Some(output) = output {
        report.save_to_file(output)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), output.display());
        }
    }

    print_report_summary(&report);

    // Exit with error code if there are errors
    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Template Check Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Files checked:  {}", report.summary.files_checked);
    println!("Queries parsed: {}", report.summary.queries_parsed);

    if report.summary.errors > 0 {
        println!("Errors:         {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("Errors:         {}", format!("{}", report.summary.errors).green());
    }
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ All templates are well-formed".green().bold());
    } else {
        for diag in &report.diagnostics {
            let severity = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan().bold(),
            };
            println!("  [{}] {}: {}", severity, diag.code, diag.message);

            if let Some(loc) = &diag.location {
                println!("    Location: {}", loc);
            }
            if let Some(query) = &diag.query {
                println!("    Query:    {}", query);
            }
            if let Some(snippet) = &diag.snippet {
                println!("    Line:     {}", snippet.dimmed());
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
