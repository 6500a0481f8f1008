use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::LevelFilter;

use jobmatch::config::Config;
use jobmatch::domain::jobspec::Jobspec;
use jobmatch::domain::select::{SelectionAlgorithm, select};
use jobmatch::domain::transform::{TransformFormat, get_transformer, translate};
use jobmatch::error::{Error, TranslationError};
use jobmatch::loader::parser::{load_jobspec, read_text};
use jobmatch::{logger, satisfy_jobspec};

/// Validate, count, match and translate batch jobs
#[derive(Parser, Debug)]
#[command(name = "jobmatch", version, about, long_about = None)]
struct Cli {
    /// Store root holding `clusters/<cluster>/<subsystem>/graph.json`, defaults to $JOBMATCH_CONFIG_DIR or ~/.jobmatch
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log everything down to debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Only log errors
    #[arg(long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Also write log records to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a batch script or a canonical jobspec document
    Validate {
        path: PathBuf,

        /// Scheduler whose directives the script uses
        #[arg(long, default_value = "flux")]
        scheduler: TransformFormat,
    },

    /// Print the total count of every resource type in a jobspec
    Count { path: PathBuf },

    /// Match a jobspec against every cluster in the store
    Satisfy {
        path: PathBuf,

        /// How to pick one cluster out of several matches
        #[arg(long, default_value = "random")]
        select: SelectionAlgorithm,
    },

    /// Translate a job between formats
    Transform {
        path: PathBuf,

        #[arg(long)]
        to: TransformFormat,

        /// Source format, detected from the document when omitted
        #[arg(long)]
        from: Option<TransformFormat>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug {
        Some(LevelFilter::Debug)
    } else if cli.quiet {
        Some(LevelFilter::Error)
    } else {
        None
    };
    logger::init(level, cli.log_file.as_deref());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Validate { path, scheduler } => validate(&path, scheduler),
        Commands::Count { path } => {
            let jobspec = load_jobspec(&path).with_context(|| format!("Failed to load jobspec {}", path.display()))?;
            for (typ, count) in jobspec.count_resources() {
                println!("Type: {}, count: {}", typ, count);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Satisfy { path, select: algorithm } => {
            let config = Config::resolve(cli.config_dir.as_deref());
            let report = satisfy_jobspec(&path, &config).await?;

            for result in &report.results {
                println!("{}", format!("=> {}", result.cluster).bold());
                for step in &result.trace {
                    println!("   {}", step);
                }
                match &result.reason {
                    None => println!("   {}", "satisfied".green()),
                    Some(reason) => println!("   {}", reason.red()),
                }
            }

            match select(algorithm, &report.satisfied()) {
                Some(chosen) => {
                    println!("Selected cluster {} ({})", chosen.cluster.to_string().green().bold(), algorithm);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("{}", "No cluster can satisfy this job".red());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Transform { path, to, from } => {
            let text = read_text(&path)?;
            let from = match from.or_else(|| TransformFormat::detect(&path, &text)) {
                Some(format) => format,
                None => return Err(TranslationError::UndetectedFormat(path.display().to_string()).into()),
            };

            let translation = translate(&text, from, to)?;
            print!("{}", translation.artifact);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exit code 1 on any invalid input, with the full diagnostic on stderr.
fn validate(path: &Path, scheduler: TransformFormat) -> anyhow::Result<ExitCode> {
    let text = read_text(path)?;

    let outcome = match TransformFormat::detect(path, &text) {
        Some(TransformFormat::Jobspec) => Jobspec::from_document(&text),
        _ => get_transformer(scheduler).parse(&text).and_then(|request| Ok(request.to_jobspec()?)),
    };

    match outcome {
        Ok(jobspec) => {
            println!("{} {} is valid", "OK".green().bold(), path.display());
            for (typ, count) in jobspec.count_resources() {
                println!("Type: {}, count: {}", typ, count);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ (Error::DirectiveError(_) | Error::ValidationError(_) | Error::ParseError(_))) => {
            eprintln!("{}", e.to_string().red());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
