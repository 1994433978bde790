//! vbuf entrypoint: open a file of any size through the line index and
//! print a window of lines, search hits or document statistics.
use anyhow::{Context, Result, bail};
use clap::Parser;
use core_config::{Config, load_from};
use core_model::Document;
use core_state::SearchQuery;
use core_text::IndexWorker;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Instant;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

mod report;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "vbuf", version, about = "Virtual buffer viewer for very large text files")]
struct Args {
    /// File to open (UTF-8 or UTF-16 with BOM).
    pub path: PathBuf,
    /// Optional configuration file path (overrides discovery of `vbuf.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// First logical line to print (0-based).
    #[arg(long, default_value_t = 0)]
    pub start: usize,
    /// Number of lines to print.
    #[arg(long, default_value_t = 20)]
    pub count: usize,
    /// Search for a pattern instead of printing lines.
    #[arg(long)]
    pub find: Option<String>,
    /// Treat `--find` as a regular expression.
    #[arg(long, requires = "find")]
    pub regex: bool,
    #[arg(long, requires = "find")]
    pub case_sensitive: bool,
    #[arg(long, requires = "find")]
    pub whole_word: bool,
    /// Stop after this many matches (0 = unlimited).
    #[arg(long, default_value_t = 1000)]
    pub max_matches: usize,
    /// Replace every match of `--find` in memory and print the affected window.
    #[arg(long, requires = "find")]
    pub replace: Option<String>,
    /// Wrap width in columns (overrides `[wrap] columns`; 0 disables).
    #[arg(long)]
    pub wrap: Option<u16>,
    /// Print line, byte and wrapped-row totals.
    #[arg(long)]
    pub stats: bool,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("vbuf.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "vbuf.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_ansi(false)
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = load_from(args.config.clone())?;
    if let Some(columns) = args.wrap {
        config.set_wrap_columns(columns);
    }
    Ok(config)
}

fn open_document(path: &Path, config: &Config) -> Result<Document> {
    let started = Instant::now();
    let worker = IndexWorker::spawn(path, config.index_options())
        .with_context(|| format!("failed to start indexing {}", path.display()))?;
    let show_progress = io::stderr().is_terminal();
    let index = worker
        .wait_with_progress(|fraction| {
            if show_progress {
                eprint!("\rindexing {:>5.1}%", fraction * 100.0);
            }
        })
        .inspect_err(|e| error!(target: "runtime", error = %e, "index_failed"))
        .with_context(|| format!("failed to index {}", path.display()))?;
    if show_progress {
        eprint!("\r                \r");
    }
    info!(
        target: "runtime",
        path = %path.display(),
        lines = index.total_lines(),
        bytes = index.byte_len(),
        encoding = index.encoding().display_name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "index_ready"
    );
    Ok(Document::from_index(Arc::new(index), config.document_options())
        .with_measure(config.wrap_measure()))
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    if args.replace.is_some() && args.stats {
        bail!("--replace and --stats cannot be combined");
    }
    let mut doc = open_document(&args.path, &config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.stats {
        report::write_stats(&mut out, &mut doc)?;
        return Ok(());
    }

    if let Some(pattern) = args.find.as_deref() {
        let query = if args.regex {
            SearchQuery::regex(pattern)
        } else {
            SearchQuery::literal(pattern)
        }
        .case_sensitive(args.case_sensitive)
        .whole_word(args.whole_word)
        .max_matches(args.max_matches);

        if let Some(replacement) = args.replace.as_deref() {
            let first = doc.search(&query)?.first().map(|m| m.line);
            let replaced = doc.replace_all(&query, replacement)?;
            writeln!(out, "replaced {replaced} occurrence(s)")?;
            if let Some(line) = first {
                report::write_window(&mut out, &mut doc, line, args.count)?;
            }
        } else {
            let show_progress = io::stderr().is_terminal();
            let mut search = doc.begin_search(query)?;
            let chunk_lines = config.search_chunk_lines();
            loop {
                let progress = doc.search_step(&mut search, chunk_lines);
                if show_progress {
                    eprint!("\r{}", report::progress_line(&progress));
                }
                if progress.done {
                    break;
                }
            }
            if show_progress {
                eprint!("\r{:40}\r", "");
            }
            report::write_matches(&mut out, search.matches())?;
        }
        return Ok(());
    }

    report::write_window(&mut out, &mut doc, args.start, args.count)?;
    Ok(())
}

fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let result = run(args);
    if let Err(e) = &result {
        error!(target: "runtime", error = %e, "run_failed");
    }
    info!(target: "runtime", ok = result.is_ok(), "shutdown");
    result
}
