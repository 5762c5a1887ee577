use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikialias::extract::{run_extraction, RunOptions};
use wikialias::index::{AliasEntry, AliasIndex};
use wikialias::models::Tag;
use wikialias::sink::{CsvSink, NullSink};
use wikialias::stats::RunStatistics;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "wikialias")]
#[command(about = "Extract alternate names from Wikipedia infoboxes and look them up")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract alternate names from one or more dumps into a CSV file
    Extract(ExtractArgs),
    /// Look up the alternate names of a title
    Lookup(LookupArgs),
    /// List titles with exactly N alternate names
    Frequency(FrequencyArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Dump files (.xml or .xml.bz2), processed in order
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output CSV file
    #[arg(short, long)]
    output: String,

    /// Limit number of pages to process (for testing)
    #[arg(long)]
    limit: Option<u64>,

    /// Dry run - don't write the output file
    #[arg(long)]
    dry_run: bool,

    /// Also write run statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<String>,

    /// Hide the progress spinner
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct LookupArgs {
    /// Alias CSV written by `extract`
    #[arg(short, long)]
    input: String,

    /// Title to look up
    query: String,

    /// Suggestions to show when nothing matches
    #[arg(long, default_value_t = 5)]
    suggestions: usize,
}

#[derive(Args)]
struct FrequencyArgs {
    /// Alias CSV written by `extract`
    #[arg(short, long)]
    input: String,

    /// Number of alternate names
    count: usize,
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let options = RunOptions {
        limit: args.limit,
        show_progress: !args.quiet,
    };

    info!("Starting extraction pass");
    let start = Instant::now();
    let stats = if args.dry_run {
        let output = run_extraction(&args.inputs, NullSink::default(), &options)?;
        info!(records = output.sink.records, "Dry run, nothing written");
        output.stats
    } else {
        let sink = CsvSink::create(&args.output)?;
        run_extraction(&args.inputs, sink, &options)?.stats
    };
    let duration = start.elapsed();
    info!(duration_secs = duration.as_secs_f64(), "Extraction complete");

    if let Some(path) = &args.stats_json {
        write_stats_json(&stats, path)?;
        info!(path = %path, "Statistics written");
    }

    print_summary(&stats, duration.as_secs_f64());
    Ok(())
}

fn write_stats_json(stats: &RunStatistics, path: &str) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create stats file: {}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &stats.report())
        .with_context(|| format!("Failed to write stats file: {}", path))
}

fn print_summary(stats: &RunStatistics, secs: f64) {
    println!();
    println!("=== Summary ===");
    println!("Extraction time:    {:.2}s", secs);
    println!();
    println!("Pages scanned:      {}", stats.pages_scanned);
    println!("Pages with fields:  {}", stats.pages_with_fields);
    println!("Reserved pages:     {}", stats.reserved_pages);
    println!("Fields matched:     {}", stats.field_occurrences);
    println!("Fields abandoned:   {}", stats.fields_abandoned);
    println!("Names emitted:      {}", stats.names_emitted);
    println!("Page aggregates:    {}", stats.aggregates_emitted);
    println!("Records written:    {}", stats.records_written);

    for tag in Tag::ALL {
        let histogram = stats.histogram(tag);
        if histogram.total() == 0 {
            continue;
        }
        println!();
        println!("Names per {} occurrence:", tag);
        for (names, count) in histogram.non_empty() {
            println!("  {:>3}: {}", names, count);
        }
    }
}

fn print_entries(entries: &[&AliasEntry]) {
    for (i, entry) in entries.iter().enumerate() {
        println!("{}. {} --- {}", i + 1, entry.title, entry.names.join("; "));
    }
}

fn run_lookup(args: LookupArgs) -> Result<()> {
    let index = AliasIndex::load(&args.input)?;

    let hits = index.lookup(&args.query);
    if !hits.is_empty() {
        print_entries(&hits);
        return Ok(());
    }

    println!("No alternate names found.");
    let suggestions = index.suggest(&args.query, args.suggestions);
    if !suggestions.is_empty() {
        println!();
        println!("Did you mean:");
        print_entries(&suggestions);
    }
    Ok(())
}

fn run_frequency(args: FrequencyArgs) -> Result<()> {
    let index = AliasIndex::load(&args.input)?;
    let titles = index.titles_with_count(args.count);
    for title in &titles {
        println!("{}", title);
    }
    info!(count = args.count, titles = titles.len(), "Frequency query complete");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Lookup(args) => run_lookup(args),
        Commands::Frequency(args) => run_frequency(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
