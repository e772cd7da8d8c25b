//! CLI entry point for `mailsift`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use mailsift::config::{self, Config};
use mailsift::index::{IndexOptions, SearchIndex};
use mailsift::indexer::{
    CancelFlag, IndexManager, IndexProgress, IndexReport, IndexerOptions, META_LAST_INDEXED_AT,
    META_LAST_RUN_ERRORS, META_LAST_RUN_INDEXED, META_LAST_RUN_SKIPPED,
};
use mailsift::metrics::IndexMetrics;
use mailsift::parser::MailFileParser;
use mailsift::scanner::ArchiveScanner;
use mailsift::search::query::{parse_query, SortOrder};
use mailsift::search::snippet::SnippetGenerator;
use mailsift::search::{SearchEngine, SearchResultSet};

#[derive(Parser)]
#[command(name = "mailsift", version, about = "Search a local email archive")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Index database to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH", env = "MAILSIFT_INDEX")]
    index: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Index (or re-index) an archive directory
    Index {
        root: PathBuf,
        /// Drop the existing index and reparse every file
        #[arg(long)]
        full: bool,
        /// Do not store full body text (content search sees subject and addresses only)
        #[arg(long)]
        no_body: bool,
    },
    /// Search the index
    Search {
        /// Free text with optional filters, e.g. `from:alice subject:"q3 plan" budget`
        query: String,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long)]
        take: Option<usize>,
        #[arg(long, value_enum, default_value_t = SortArg::DateDesc)]
        sort: SortArg,
        #[arg(long)]
        json: bool,
    },
    /// Show index statistics and health
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Wipe the index and rebuild it from an archive
    Rebuild {
        root: PathBuf,
        /// Confirm that the existing index should be destroyed
        #[arg(long)]
        yes: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    DateDesc,
    DateAsc,
    Relevance,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::DateDesc => SortOrder::DateDesc,
            SortArg::DateAsc => SortOrder::DateAsc,
            SortArg::Relevance => SortOrder::Relevance,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let index_path = cli.index.clone().unwrap_or_else(|| config::index_path(&config));

    match cli.command {
        Commands::Index {
            root,
            full,
            no_body,
        } => cmd_index(&config, &index_path, &root, full, !no_body),
        Commands::Search {
            query,
            skip,
            take,
            sort,
            json,
        } => cmd_search(&config, &index_path, &query, skip, take, sort.into(), json),
        Commands::Stats { json } => cmd_stats(&config, &index_path, json),
        Commands::Rebuild { root, yes } => {
            if !yes {
                anyhow::bail!(
                    "rebuild destroys {}; pass --yes to confirm",
                    index_path.display()
                );
            }
            cmd_index(&config, &index_path, &root, true, config.index.include_body)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_file = config::log_file_path(config);
    let log_dir = log_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mailsift.log".into());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsift", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Open an existing index for reading, with a friendly error when missing.
fn open_existing(config: &Config, index_path: &Path) -> anyhow::Result<SearchIndex> {
    if !index_path.exists() {
        anyhow::bail!(
            "no index at {}; run `mailsift index <ROOT>` first",
            index_path.display()
        );
    }
    Ok(SearchIndex::open_read_only(
        index_path,
        &IndexOptions::from(&config.performance),
    )?)
}

/// Index an archive, incrementally unless `full` is set.
fn cmd_index(
    config: &Config,
    index_path: &Path,
    root: &Path,
    full: bool,
    include_body: bool,
) -> anyhow::Result<()> {
    if !root.is_dir() {
        anyhow::bail!("archive root is not a directory: {}", root.display());
    }

    let index = SearchIndex::open(index_path, &IndexOptions::from(&config.performance))?;
    index.initialize()?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())?;
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Indexing [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let metrics = Arc::new(IndexMetrics::new());
    let options = IndexerOptions {
        include_body,
        ..IndexerOptions::from(&config.index)
    };
    let manager = IndexManager::new(
        &index,
        MailFileParser::new(config.index.preview_length),
        ArchiveScanner::new(&config.index.extensions),
        options,
        metrics.clone(),
    );

    let on_progress = |p: &IndexProgress<'_>| {
        pb.set_length(p.total as u64);
        pb.set_position(p.processed as u64);
        if let Some(name) = p.current_path.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }
    };

    let report = std::thread::scope(|s| {
        s.spawn(|| manager.run(root, full, &cancel, Some(&on_progress)))
            .join()
            .map_err(|_| anyhow::anyhow!("indexing thread panicked"))
    })??;
    pb.finish_and_clear();

    if !report.cancelled {
        index.optimize()?;
    }
    print_report(index_path, &report);
    tracing::debug!(metrics = ?metrics.snapshot(), "Indexing metrics");
    index.close();
    Ok(())
}

fn print_report(index_path: &Path, report: &IndexReport) {
    println!();
    if report.cancelled {
        println!("  Indexing cancelled; the last partial batch was discarded.");
    }
    println!("  {:<20} {}", "Index", index_path.display());
    println!("  {:<20} {}", "Indexed", report.indexed);
    println!("  {:<20} {}", "Skipped", report.skipped);
    println!("  {:<20} {}", "Errors", report.errors);
    println!("  {:<20} {:.2?}", "Elapsed", report.duration);
    println!();
}

/// Search the index and print one page of results.
fn cmd_search(
    config: &Config,
    index_path: &Path,
    input: &str,
    skip: usize,
    take: Option<usize>,
    sort: SortOrder,
    json: bool,
) -> anyhow::Result<()> {
    let index = open_existing(config, index_path)?;
    let engine = SearchEngine::new(
        &index,
        SnippetGenerator::new(config.search.snippet_length),
        Arc::new(IndexMetrics::new()),
    );

    let query = parse_query(input)
        .page(skip, take.unwrap_or(config.search.default_take))
        .sorted(sort);
    let page = engine.execute(&query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print_search_results_table(&page);
    }
    Ok(())
}

/// Print search results as a human-readable table.
fn print_search_results_table(page: &SearchResultSet) {
    println!();
    println!(
        "  {} of {} result(s) in {:.2?}",
        page.results.len(),
        page.total_count,
        page.elapsed
    );
    println!();

    if page.results.is_empty() {
        return;
    }

    println!(
        "  {:<5} {:<17} {:<25} {:<40} {:<12}",
        "#", "Date", "From", "Subject", "Folder"
    );
    println!("  {}", "-".repeat(102));

    for (i, result) in page.results.iter().enumerate() {
        let doc = &result.document;
        let date = doc
            .date_sent
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let from: String = doc.from_display().chars().take(24).collect();
        let subject: String = doc.subject.chars().take(39).collect();
        let folder: String = doc.folder.chars().take(12).collect();

        println!(
            "  {:<5} {:<17} {:<25} {:<40} {:<12}",
            page.skip + i + 1,
            date,
            from,
            subject,
            folder
        );
        if let Some(ref snippet) = result.snippet {
            println!("        {snippet}");
        }
        println!("        {}", doc.file_path.display());
    }

    if page.has_more() {
        println!();
        println!(
            "  More results available: --skip {}",
            page.skip + page.results.len()
        );
    }
    println!();
}

/// Show index statistics.
fn cmd_stats(config: &Config, index_path: &Path, json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let index = open_existing(config, index_path)?;
    let count = index.email_count()?;
    let size = index.database_size()?;
    let healthy = index.is_healthy();
    let meta = |key: &str| index.get_metadata(key);
    let last_indexed = meta(META_LAST_INDEXED_AT)?;
    let last_indexed_count = meta(META_LAST_RUN_INDEXED)?;
    let last_skipped = meta(META_LAST_RUN_SKIPPED)?;
    let last_errors = meta(META_LAST_RUN_ERRORS)?;

    if json {
        let stats = serde_json::json!({
            "index": index_path.to_string_lossy(),
            "email_count": count,
            "database_size": size,
            "healthy": healthy,
            "last_indexed_at": last_indexed,
            "last_run": {
                "indexed": last_indexed_count,
                "skipped": last_skipped,
                "errors": last_errors,
            },
        });
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!();
    println!("  {:<20} {}", "Index", index_path.display());
    println!("  {:<20} {}", "Messages", count);
    println!("  {:<20} {}", "Database size", format_size(size, BINARY));
    println!("  {:<20} {}", "Healthy", if healthy { "yes" } else { "NO" });
    println!("  {:<20} {}", "Last indexed", or_dash(last_indexed));
    println!(
        "  {:<20} {} indexed, {} skipped, {} errors",
        "Last run",
        or_dash(last_indexed_count),
        or_dash(last_skipped),
        or_dash(last_errors)
    );
    println!();
    Ok(())
}
