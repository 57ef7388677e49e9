//! CLI binary for crossref-ris.
//!
//! Usage: crossref-ris titles.txt references.ris --workers 4

#[cfg(feature = "cli")]
mod cli {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use clap::Parser;
    use crossref_ris::error::{ResolverError, Result};
    use crossref_ris::pipeline::{SkipReason, TitleStatus};
    use crossref_ris::{Config, Pipeline, RisFileWriter, RunSummary, WriteOutcome};
    use tokio_util::sync::CancellationToken;

    /// Exit status after an operator interrupt.
    pub const EXIT_INTERRUPTED: i32 = 130;

    #[derive(Parser)]
    #[command(
        name = "crossref-ris",
        about = "Resolve article titles via Crossref and write them as RIS",
        version
    )]
    struct Cli {
        /// Text file with one article title per line (prompted if omitted)
        input: Option<PathBuf>,

        /// Output RIS file (prompted if omitted)
        output: Option<PathBuf>,

        /// Concurrent resolution tasks
        #[arg(short, long)]
        workers: Option<usize>,

        /// Requests per second
        #[arg(long)]
        rate: Option<f64>,

        /// Requests allowed back to back before rate limiting kicks in
        #[arg(long)]
        burst: Option<u32>,

        /// Successful titles between checkpoint saves
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Attempts per title on network failure
        #[arg(long)]
        max_retries: Option<u32>,

        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Search hits to consider per title
        #[arg(long)]
        rows: Option<u32>,

        /// Contact email for the Crossref polite pool (or CROSSREF_MAILTO)
        #[arg(long)]
        mailto: Option<String>,

        /// Works search endpoint
        #[arg(long)]
        base_url: Option<String>,

        /// Extra title label marking non-article hits (repeatable)
        #[arg(long = "skip", value_name = "PATTERN")]
        skip: Vec<String>,

        /// Config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log file path
        #[arg(long, conflicts_with = "no_log_file")]
        log_file: Option<PathBuf>,

        /// Do not write a log file
        #[arg(long)]
        no_log_file: bool,

        /// Debug-level logging
        #[arg(short, long)]
        verbose: bool,
    }

    impl Cli {
        /// Overlay command-line flags on the loaded config.
        fn apply(&self, config: &mut Config) {
            if let Some(workers) = self.workers {
                config.workers = workers;
            }
            if let Some(rate) = self.rate {
                config.rate_per_second = rate;
            }
            if let Some(burst) = self.burst {
                config.burst = burst;
            }
            if let Some(batch) = self.batch_size {
                config.batch_size = batch;
            }
            if let Some(retries) = self.max_retries {
                config.max_retries = retries;
            }
            if let Some(secs) = self.timeout {
                config.timeout = Duration::from_secs(secs);
            }
            if let Some(rows) = self.rows {
                config.rows = rows;
            }
            if let Some(mailto) = &self.mailto {
                config.mailto = Some(mailto.clone());
            }
            if let Some(url) = &self.base_url {
                config.base_url = url.clone();
            }
            config.skip_patterns.extend(self.skip.iter().cloned());
            if self.no_log_file {
                config.log_file = None;
            } else if let Some(path) = &self.log_file {
                config.log_file = Some(path.clone());
            }
        }
    }

    fn prompt(message: &str, default: Option<&Path>) -> Result<String> {
        let mut input = dialoguer::Input::<String>::new().with_prompt(message);
        if let Some(default) = default {
            input = input
                .default(default.display().to_string())
                .show_default(true);
        }
        input
            .interact_text()
            .map_err(|e| ResolverError::InvalidInput(format!("Failed to read input: {}", e)))
    }

    /// Input and output paths from arguments, asking for whatever is missing.
    fn resolve_paths(cli: &Cli, config: &Config) -> Result<(PathBuf, PathBuf)> {
        let input = match &cli.input {
            Some(path) => path.clone(),
            None => PathBuf::from(
                prompt("Path to the text file with titles", None)?
                    .trim()
                    .to_string(),
            ),
        };
        crossref_ris::input::validate_input_path(&input)?;

        let output = output_path(cli.output.as_deref(), &config.default_output, |default| {
            prompt("Path for the output RIS file", Some(default))
        })?;
        Ok((input, output))
    }

    /// The output path from the command line, or else from `ask`. An empty
    /// answer selects `default`.
    fn output_path(
        given: Option<&Path>,
        default: &Path,
        ask: impl FnOnce(&Path) -> Result<String>,
    ) -> Result<PathBuf> {
        if let Some(path) = given {
            return Ok(path.to_path_buf());
        }
        let answer = ask(default)?;
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            default.to_path_buf()
        } else {
            PathBuf::from(answer)
        })
    }

    fn print_summary(summary: &RunSummary) {
        use comfy_table::{ContentArrangement, Table};

        println!();
        println!(
            "Resolved {} of {} titles ({} without a match, {} failed{})",
            summary.resolved,
            summary.total,
            summary.skipped,
            summary.failed,
            if summary.interrupted {
                format!(", {} not attempted", summary.abandoned)
            } else {
                String::new()
            }
        );

        if !summary.unresolved.is_empty() {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["#", "Status", "Title"]);
            for item in &summary.unresolved {
                let status = match &item.status {
                    TitleStatus::Skipped(SkipReason::NoHits) => "no match".to_string(),
                    TitleStatus::Skipped(SkipReason::Unformattable) => "bad record".to_string(),
                    TitleStatus::Failed(msg) => format!("failed: {}", msg),
                    TitleStatus::Pending | TitleStatus::Dispatched => "not attempted".to_string(),
                    TitleStatus::Resolved => continue,
                };
                let title = if item.title.chars().count() > 70 {
                    format!("{}...", item.title.chars().take(67).collect::<String>())
                } else {
                    item.title.clone()
                };
                table.add_row(vec![(item.index + 1).to_string(), status, title]);
            }
            println!("{table}");
        }

        match &summary.written {
            WriteOutcome::Primary(path) => {
                println!("Saved {} records to {}", summary.records.len(), path.display())
            }
            WriteOutcome::Backup(path) => println!(
                "Could not write the output file; saved {} records to {}",
                summary.records.len(),
                path.display()
            ),
            WriteOutcome::Failed => println!("Failed to save results (see log for details)"),
            WriteOutcome::Empty => println!("No records to save"),
        }
    }

    /// Run the tool and return the process exit status.
    pub async fn run() -> Result<i32> {
        let cli = Cli::parse();
        let mut config = Config::load(cli.config.as_deref())?;
        cli.apply(&mut config);
        config.validate()?;

        let _guard = crossref_ris::logging::init(config.log_file.as_deref(), cli.verbose)?;

        let (input, output) = resolve_paths(&cli, &config)?;
        let titles = crossref_ris::input::read_titles(&input)?;
        tracing::info!(count = titles.len(), input = %input.display(), "read titles");
        if titles.is_empty() {
            println!("No titles found in {}", input.display());
            return Ok(0);
        }

        let pipeline = Pipeline::crossref(&config)?;
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, saving partial results");
                cancel_clone.cancel();
            }
        });

        let sink = Arc::new(RisFileWriter::new(output));
        let summary = pipeline.run(&titles, sink, cancel).await;
        print_summary(&summary);

        Ok(if summary.interrupted { EXIT_INTERRUPTED } else { 0 })
    }

}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() {
    match cli::run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("This binary requires the 'cli' feature. Build with: cargo build --features cli");
    std::process::exit(1);
}
