//! docbind CLI - render document templates from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use docbind::{formatters, Engine, EngineOptions, Template, TemplateFormat};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docbind")]
#[command(about = "docbind - render document templates with JSON data")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TemplateArgs {
    /// Template file
    template: PathBuf,

    /// Template format (defaults to the file extension, then txt)
    #[arg(short, long)]
    format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template with JSON data
    Render {
        #[command(flatten)]
        template: TemplateArgs,

        /// JSON data file (defaults to an empty object)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Engine options JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Disable the parse cache
        #[arg(long)]
        no_cache: bool,

        /// Print render metadata to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Parse a template and print its tags as JSON
    Parse {
        #[command(flatten)]
        template: TemplateArgs,
    },

    /// Resolve a template's tags against data and print the values as JSON
    Process {
        #[command(flatten)]
        template: TemplateArgs,

        /// JSON data file (defaults to an empty object)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// List available formatters
    Formatters,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let result = match cli.command {
        Commands::Render {
            template,
            data,
            output,
            config,
            no_cache,
            stats,
        } => render(
            &template,
            data.as_deref(),
            output.as_deref(),
            config.as_deref(),
            no_cache,
            stats,
        ),
        Commands::Parse { template } => parse(&template),
        Commands::Process { template, data } => process(&template, data.as_deref()),
        Commands::Formatters => {
            list_formatters();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn render(
    args: &TemplateArgs,
    data: Option<&Path>,
    output: Option<&Path>,
    config: Option<&Path>,
    no_cache: bool,
    stats: bool,
) -> Result<()> {
    let mut options = match config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            EngineOptions::from_json(&json)
                .with_context(|| format!("Invalid config '{}'", path.display()))?
        }
        None => EngineOptions::default(),
    };
    if no_cache {
        options.cache_enabled = false;
    }
    // Printed from the result instead
    options.log_warnings = false;

    let template = load_template(args)?;
    let data = load_data(data)?;
    let result = Engine::new(options).render(&template, &data);

    for warning in &result.warnings {
        eprintln!("{} {}", "warning:".yellow(), warning);
    }

    match output {
        Some(path) => fs::write(path, &result.content)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => print!("{}", result.text()),
    }

    if stats {
        eprintln!(
            "{} {} bytes in {:?} (template {})",
            "→".cyan(),
            result.metadata.output_size,
            result.metadata.duration,
            &result.metadata.template_id[..12]
        );
    }

    Ok(())
}

fn parse(args: &TemplateArgs) -> Result<()> {
    let template = load_template(args)?;
    let parsed = docbind::parse_template(&template.content, template.format);
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

fn process(args: &TemplateArgs, data: Option<&Path>) -> Result<()> {
    let template = load_template(args)?;
    let data = load_data(data)?;
    let parsed = docbind::parse_template(&template.content, template.format);
    let processed = docbind::process(&data, &parsed);
    println!("{}", serde_json::to_string_pretty(&processed)?);
    Ok(())
}

fn list_formatters() {
    for formatter in formatters::registry().list() {
        println!("{:<12} {}", formatter.category.to_string().dimmed(), formatter.name);
    }
}

fn load_template(args: &TemplateArgs) -> Result<Template> {
    let content = fs::read_to_string(&args.template)
        .with_context(|| format!("Failed to read template '{}'", args.template.display()))?;

    let format = match &args.format {
        Some(name) => name.parse::<TemplateFormat>()?,
        None => args
            .template
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or_default(),
    };

    Ok(Template::new(content, format))
}

fn load_data(path: Option<&Path>) -> Result<serde_json::Value> {
    let Some(path) = path else {
        return Ok(serde_json::json!({}));
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read data '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}
