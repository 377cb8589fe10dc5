use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use resumatch_core::{FileSource, Query, Resume, SearchOptions, SearchSession};
use serde::Serialize;
use std::io::Read;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "resumatch")]
#[command(about = "Rank stored resumes against a job description", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank one owner's resumes against a job description
    Search {
        /// Resume store (a .json/.jsonl file or a directory of them)
        #[arg(long)]
        input: String,
        /// Owner whose resumes are searched
        #[arg(long)]
        owner: String,
        #[command(flatten)]
        query: QueryArgs,
        /// Maximum number of results (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Override the match threshold (0.0 exact .. 1.0 anything)
        #[arg(long)]
        threshold: Option<f64>,
        /// JSON file with search options
        #[arg(long)]
        options: Option<String>,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the phrases and keywords a job description is reduced to
    Normalize {
        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct QueryArgs {
    /// Job description text
    #[arg(long)]
    query: Option<String>,
    /// Read the job description from a file ("-" for stdin)
    #[arg(long)]
    query_file: Option<String>,
}

impl QueryArgs {
    fn read(&self) -> Result<String> {
        match (&self.query, &self.query_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) if path == "-" => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                Ok(buf)
            }
            (None, Some(path)) => std::fs::read_to_string(path).with_context(|| format!("reading {path}")),
            (None, None) => anyhow::bail!("either --query or --query-file is required"),
        }
    }
}

#[derive(Serialize)]
struct Row<'a> {
    rank: usize,
    score: f64,
    id: &'a str,
    name: &'a str,
    last_modified: String,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { input, owner, query, limit, threshold, options, json } => {
            let mut options = load_options(options.as_deref())?;
            if let Some(threshold) = threshold {
                options.threshold = threshold;
            }
            search(&input, &owner, &query.read()?, limit, options, json)
        }
        Commands::Normalize { query } => {
            let parsed = Query::parse(&query.read()?);
            println!("phrases ({}):", parsed.phrases.len());
            for p in &parsed.phrases {
                println!("  {p}");
            }
            println!("keywords ({}):", parsed.keywords.len());
            println!("  {}", parsed.keywords.join(" "));
            Ok(())
        }
    }
}

fn load_options(path: Option<&str>) -> Result<SearchOptions> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
        }
        None => Ok(SearchOptions::default()),
    }
}

fn search(input: &str, owner: &str, job: &str, limit: Option<usize>, options: SearchOptions, json: bool) -> Result<()> {
    let source = FileSource::open(input)?;
    let mut session: SearchSession<Resume> = SearchSession::new(owner, options);
    let documents = session.load(&source)?;
    tracing::info!(owner, documents, "loaded resumes");

    let limit = limit.unwrap_or(session.options().default_limit);
    let rows: Vec<Row> = session
        .rank(job)
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, hit)| Row {
            rank: i + 1,
            score: hit.score,
            id: &hit.document.id,
            name: &hit.document.name,
            last_modified: format_millis(hit.document.last_modified),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no matching resumes for {owner}");
        return Ok(());
    }
    for row in &rows {
        println!("{:>3}  {:>8.3}  {}  {}  {}", row.rank, row.score, row.id, row.name, row.last_modified);
    }
    Ok(())
}

fn format_millis(ms: i64) -> String {
    time::OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default()
}
