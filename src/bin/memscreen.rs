//! CLI binary for memscreen.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use memscreen::{
    inspect, run, run_to_file, CountExpectations, IdentifierCorrections, LayoutConfig,
    PageSelection, PipelineConfig, PipelineInputs, PipelineOutput, PipelineProgressCallback,
    ProgressCallback, Stage,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner per stage, switching to a bar while lookup
/// batches are in flight. Each finished stage leaves one log line.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(Self::spinner_style());
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS)
    }

    fn batch_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} batches  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut started) = self.stage_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_style(Self::spinner_style());
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_stage_complete(&self, stage: Stage, rows: usize) {
        let elapsed = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.bar.println(format!(
            "  {} {:<10} {:>6} rows  {}",
            green("✓"),
            stage.as_str(),
            rows,
            dim(&format!("{elapsed:.1}s")),
        ));
    }

    fn on_batch_complete(&self, _batch: usize, total: usize, hits: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_style(Self::batch_style());
            self.bar.set_length(total as u64);
            self.bar.set_position(0);
        }
        self.bar.set_message(format!("{hits} hits"));
        self.bar.inc(1);
    }

    fn on_pipeline_complete(&self, records: usize, issues: usize) {
        self.bar.finish_and_clear();
        let tick = if issues == 0 { green("✔") } else { yellow("⚠") };
        eprintln!(
            "{} {} records, {} issues",
            tick,
            bold(&records.to_string()),
            issues
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run, table to a file
  memscreen paper.pdf --supplement supp.csv --catalog vdrc.tsv \
      --increased-pages 5 --decreased-pages 6-9 -o memory_screen.tsv

  # Check the scrape against the published counts and keep stage dumps
  memscreen paper.pdf --supplement supp.csv --increased-pages 5 \
      --decreased-pages 6-9 --expect-increased 42 --dump-dir stages/ -o out.tsv

  # Look at the raw cell matrices of a few pages before choosing ranges
  memscreen paper.pdf --inspect-only --inspect-pages 4-10

  # Offline: catalog join only, no gene lookup
  memscreen paper.pdf --supplement supp.csv --catalog vdrc.tsv \
      --increased-pages 5 --decreased-pages 6-9 --skip-lookup

ENVIRONMENT VARIABLES:
  MEMSCREEN_*       Every flag can also be set as MEMSCREEN_<FLAG>
  PDFIUM_LIB_PATH   Path to libpdfium; the system library is used otherwise
  RUST_LOG          Overrides --verbose / --quiet log filtering
"#;

/// Clean the tables of an RNAi memory-screen paper into one TSV.
#[derive(Parser, Debug)]
#[command(
    name = "memscreen",
    version,
    about = "Clean the tables of an RNAi memory-screen paper into one TSV",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Manuscript PDF: local path or HTTP/HTTPS URL.
    input: String,

    /// Supplementary full-results spreadsheet (CSV, or TSV by extension).
    #[arg(long, env = "MEMSCREEN_SUPPLEMENT", required_unless_present = "inspect_only")]
    supplement: Option<PathBuf>,

    /// VDRC stock catalog (CSV, or TSV by extension).
    #[arg(long, env = "MEMSCREEN_CATALOG")]
    catalog: Option<PathBuf>,

    /// Pages of the increased-memory table: 5, 3-15, or 1,3,5.
    #[arg(long, env = "MEMSCREEN_INCREASED_PAGES", required_unless_present = "inspect_only")]
    increased_pages: Option<PageSelection>,

    /// Pages of the decreased-memory table: 5, 3-15, or 1,3,5.
    #[arg(long, env = "MEMSCREEN_DECREASED_PAGES", required_unless_present = "inspect_only")]
    decreased_pages: Option<PageSelection>,

    /// Identifier corrections TSV (wrong<TAB>right per line).
    #[arg(long, env = "MEMSCREEN_CORRECTIONS")]
    corrections: Option<PathBuf>,

    /// Write the TSV to this file instead of stdout.
    #[arg(short, long, env = "MEMSCREEN_OUTPUT")]
    output: Option<PathBuf>,

    /// Also write intermediate tables (increased, decreased, significant, reconciled) here.
    #[arg(long, env = "MEMSCREEN_DUMP_DIR")]
    dump_dir: Option<PathBuf>,

    /// Print JSON: the full output without -o, a stats/issues summary with -o.
    #[arg(long, env = "MEMSCREEN_JSON")]
    json: bool,

    /// Print PDF metadata and raw cell matrices only.
    #[arg(long)]
    inspect_only: bool,

    /// Pages shown by --inspect-only.
    #[arg(long, env = "MEMSCREEN_INSPECT_PAGES", default_value = "all")]
    inspect_pages: PageSelection,

    /// Skip the external gene lookup.
    #[arg(long, env = "MEMSCREEN_SKIP_LOOKUP")]
    skip_lookup: bool,

    /// mygene.info-compatible query endpoint.
    #[arg(long, env = "MEMSCREEN_LOOKUP_URL", default_value = memscreen::config::DEFAULT_LOOKUP_URL)]
    lookup_url: String,

    /// Species filter for the lookup.
    #[arg(long, env = "MEMSCREEN_SPECIES", default_value = "fruitfly")]
    species: String,

    /// Identifiers per lookup request (1–1000).
    #[arg(long, env = "MEMSCREEN_BATCH_SIZE", default_value_t = 1000)]
    batch_size: usize,

    /// Lookup requests in flight at once.
    #[arg(short, long, env = "MEMSCREEN_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Retries per lookup batch.
    #[arg(long, env = "MEMSCREEN_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Expected number of increased-memory lines (reported, never enforced).
    #[arg(long, env = "MEMSCREEN_EXPECT_INCREASED")]
    expect_increased: Option<usize>,

    /// Expected number of decreased-memory lines.
    #[arg(long, env = "MEMSCREEN_EXPECT_DECREASED")]
    expect_decreased: Option<usize>,

    /// Expected number of significant lines after merging.
    #[arg(long, env = "MEMSCREEN_EXPECT_SIGNIFICANT")]
    expect_significant: Option<usize>,

    /// Vertical tolerance in points for grouping text into one row.
    #[arg(long, env = "MEMSCREEN_LINE_TOLERANCE", default_value_t = 2.5)]
    line_tolerance: f32,

    /// Horizontal gap in points below which text joins one cell.
    #[arg(long, env = "MEMSCREEN_CELL_GAP", default_value_t = 4.0)]
    cell_gap: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "MEMSCREEN_PASSWORD")]
    password: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "MEMSCREEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEMSCREEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MEMSCREEN_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MEMSCREEN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-request lookup timeout in seconds.
    #[arg(long, env = "MEMSCREEN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

/// What `--json -o` prints: everything but the records.
#[derive(Serialize)]
struct RunSummary<'a> {
    output: &'a std::path::Path,
    stats: &'a memscreen::PipelineStats,
    unmapped_identifiers: &'a [String],
    issues: &'a [memscreen::RowIssue],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the progress bar active only errors are logged; the bar and the
    // per-stage lines carry the feedback.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let layout = LayoutConfig {
        line_tolerance: cli.line_tolerance,
        cell_gap: cli.cell_gap,
    };

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let report = inspect(
            &cli.input,
            &cli.inspect_pages,
            cli.password.as_deref(),
            layout,
            cli.download_timeout,
        )
        .await
        .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            let meta = &report.metadata;
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            for table in &report.tables {
                println!(
                    "\n── page {} ({} rows, up to {} cells) ──",
                    table.page,
                    table.rows.len(),
                    table.max_columns()
                );
                print!("{}", table.to_tsv());
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, layout, progress_cb).await?;

    let supplement = cli
        .supplement
        .clone()
        .context("--supplement is required")?;
    let mut inputs = PipelineInputs::new(&cli.input, supplement);
    if let Some(ref catalog) = cli.catalog {
        inputs = inputs.with_catalog(catalog);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let output = run_to_file(&inputs, output_path, &config)
            .await
            .context("Cleaning run failed")?;

        if cli.json {
            let summary = RunSummary {
                output: output_path,
                stats: &output.stats,
                unmapped_identifiers: &output.unmapped_identifiers,
                issues: &output.issues,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else if !cli.quiet {
            print_summary(&output);
            eprintln!("   → {}", bold(&output_path.display().to_string()));
        }
    } else {
        let output = run(&inputs, &config).await.context("Cleaning run failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let tsv = output.to_tsv().context("Failed to render TSV")?;
            io::stdout()
                .lock()
                .write_all(tsv.as_bytes())
                .context("Failed to write to stdout")?;
            if !cli.quiet {
                print_summary(&output);
            }
        }
    }

    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    let s = &output.stats;
    eprintln!(
        "   {} increased, {} decreased → {} significant; {} reconciled, {} unmapped  {}",
        s.increased,
        s.decreased,
        s.significant,
        s.reconciled,
        s.unmapped,
        dim(&format!("{}ms", s.total_duration_ms)),
    );
    for m in &s.count_mismatches {
        eprintln!(
            "   {} {} table: expected {}, parsed {}",
            yellow("⚠"),
            m.table,
            m.expected,
            m.actual
        );
    }
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(
    cli: &Cli,
    layout: LayoutConfig,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let corrections = match cli.corrections {
        Some(ref path) => {
            let path = path.clone();
            tokio::task::spawn_blocking(move || IdentifierCorrections::load(&path))
                .await
                .context("Corrections loader panicked")?
                .with_context(|| format!("Failed to load corrections from {:?}", cli.corrections))?
        }
        None => IdentifierCorrections::default(),
    };

    let mut builder = PipelineConfig::builder()
        .layout(layout)
        .corrections(corrections)
        .skip_lookup(cli.skip_lookup)
        .lookup_url(&cli.lookup_url)
        .species(&cli.species)
        .batch_size(cli.batch_size)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .expectations(CountExpectations {
            increased: cli.expect_increased,
            decreased: cli.expect_decreased,
            significant: cli.expect_significant,
        });

    if let Some(ref pages) = cli.increased_pages {
        builder = builder.increased_pages(pages.clone());
    }
    if let Some(ref pages) = cli.decreased_pages {
        builder = builder.decreased_pages(pages.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref dir) = cli.dump_dir {
        builder = builder.dump_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
