//! Command-line interface for kessan.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kessan::{
    ConsolidationScope, DocId, EdinetConfig, EdinetProvider, FilingCache, KessanError, Pipeline,
    PipelineConfig, PipelineReport, Result, RetryPolicy, SqliteCache, effective_date, report,
};

/// Output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Tables and ratio lines
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Balance-sheet ratios from EDINET filings.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Document id to analyze (repeatable)
    #[arg(short = 'd', long = "doc-id", value_name = "DOC_ID")]
    doc_ids: Vec<String>,

    /// Filer name used to look up document ids when none are given
    #[arg(short = 'c', long)]
    company_name: Option<String>,

    /// Prefer consolidated figures (default: individual)
    #[arg(long)]
    consolidated: bool,

    /// Submission date of the document list (YYYY-MM-DD, default today)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// EDINET subscription key
    #[arg(long, env = "EDINET_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// SQLite cache file
    #[arg(long, default_value = "kessan.db", conflicts_with = "no_cache")]
    cache: PathBuf,

    /// Disable caching
    #[arg(long)]
    no_cache: bool,

    /// Filings processed at once
    #[arg(long, default_value_t = kessan::pipeline::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Download attempts per filing
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Seconds between two API requests
    #[arg(long, default_value_t = 5)]
    min_interval: u64,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Also print the narrative-analysis prompt
    #[arg(long)]
    show_prompt: bool,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("{s}: {e}"))
}

impl Cli {
    fn validate(&self) -> Result<()> {
        if self.doc_ids.is_empty() && self.company_name.is_none() {
            return Err(KessanError::InvalidParameter(
                "give a document id (--doc-id) or a company name (--company-name)".to_string(),
            ));
        }
        Ok(())
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            scope: if self.consolidated {
                ConsolidationScope::Consolidated
            } else {
                ConsolidationScope::Individual
            },
            concurrency: self.concurrency,
            retry: RetryPolicy::default().with_max_attempts(self.retries),
        }
    }

    fn edinet_config(&self) -> Result<EdinetConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                KessanError::InvalidParameter(
                    "EDINET subscription key missing (--api-key or EDINET_API_KEY)".to_string(),
                )
            })?;
        Ok(EdinetConfig::new(api_key.trim())
            .with_min_interval(Duration::from_secs(self.min_interval))
            .with_retry(RetryPolicy::default().with_max_attempts(self.retries)))
    }

    fn cache(&self) -> Result<Option<Arc<dyn FilingCache>>> {
        if self.no_cache {
            return Ok(None);
        }
        let cache = SqliteCache::new(&self.cache)?;
        Ok(Some(Arc::new(cache)))
    }
}

async fn run(cli: Cli) -> Result<PipelineReport> {
    cli.validate()?;

    let source = Arc::new(EdinetProvider::new(cli.edinet_config()?)?);
    let mut pipeline = Pipeline::new(source).with_config(cli.pipeline_config());
    if let Some(cache) = cli.cache()? {
        pipeline = pipeline.with_cache(cache);
    }

    let doc_ids: Vec<DocId> = if cli.doc_ids.is_empty() {
        let company = cli.company_name.as_deref().unwrap_or_default();
        let date = effective_date(cli.date, Local::now().date_naive());
        let documents = pipeline.resolve_documents(company, date).await?;
        info!(count = documents.len(), %date, "Resolved document ids");
        documents.into_iter().map(|doc| doc.doc_id).collect()
    } else {
        cli.doc_ids.iter().map(DocId::new).collect()
    };

    let report = pipeline.run(&doc_ids).await;
    print!("{}", render(&report, cli.format, cli.show_prompt)?);

    Ok(report)
}

/// Renders the report for stdout.
///
/// In JSON the prompt is a `narrativePrompt` field so the output stays one document.
fn render(report: &PipelineReport, format: Format, show_prompt: bool) -> Result<String> {
    let prompt = if show_prompt {
        Some(report.narrative_request()?.user)
    } else {
        None
    };

    match format {
        Format::Text => {
            let mut out = report::render_text(report)?;
            if let Some(prompt) = prompt {
                out.push_str(&format!("\n{prompt}\n"));
            }
            Ok(out)
        }
        Format::Json => {
            let mut value = report::to_json(report);
            if let (Some(prompt), Some(object)) = (prompt, value.as_object_mut()) {
                object.insert("narrativePrompt".to_string(), prompt.into());
            }
            let json = serde_json::to_string_pretty(&value)
                .map_err(|e| KessanError::Other(e.to_string()))?;
            Ok(format!("{json}\n"))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to initialize logging: {e}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        // Nothing could be extracted from any filing.
        Ok(report) if report.prior.filings == 0 && report.current.filings == 0 => {
            error!("No balance sheet could be extracted");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "kessan failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
