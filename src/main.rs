use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{builder::RangedU64ValueParser, ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use reachscan::config::{ScanConfig, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_MS};
use reachscan::output;
use reachscan::probe::Prober;
use reachscan::proxy::ProxyAddr;
use reachscan::scanner::{self, ProgressReporter};
use reachscan::types::{ProbeMode, ProbeOutcome, ScanResults, Target};
use reachscan::{auth, logging, targets};

/// reachscan: bulk HTTP / TLS / WebSocket reachability prober.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reachscan",
    version,
    about = "Bulk HTTP / TLS / WebSocket reachability prober with bounded concurrency.",
    long_about = None
)]
struct Cli {
    /// Targets: `host`, `host:port`, or a URL. Combined with --list.
    targets: Vec<String>,

    /// Run token; the run aborts unless it matches.
    #[arg(long)]
    uid: String,

    /// TLS handshake scan (default port 443).
    #[arg(long, visible_alias = "tls", conflicts_with = "ws")]
    ssl: bool,

    /// WebSocket upgrade scan.
    #[arg(long)]
    ws: bool,

    /// Port override for targets without an explicit port.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// HTTP CONNECT proxy, host:port.
    #[arg(short = 'x', long)]
    proxy: Option<ProxyAddr>,

    /// Max probes in flight.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_CONCURRENCY,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    concurrency: usize,

    /// Per-probe timeout in milliseconds.
    #[arg(
        short = 't',
        long = "timeout",
        default_value_t = DEFAULT_TIMEOUT_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_ms: u64,

    /// File with newline-separated targets.
    #[arg(short, long)]
    list: Option<PathBuf>,

    /// Write results to this file (.json for JSON, anything else for text).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long, default_value_t = false)]
    no_progress: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn mode(&self) -> ProbeMode {
        if self.ws {
            ProbeMode::Upgrade
        } else if self.ssl {
            ProbeMode::Tls
        } else {
            ProbeMode::Plain
        }
    }

    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            mode: self.mode(),
            port: self.port,
            proxy: self.proxy.clone(),
            concurrency: self.concurrency,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    auth::check_uid(&cli.uid)?;

    let config = cli.scan_config();
    let raw = targets::collect_targets(&cli.targets, cli.list.as_deref())?;
    let targets = targets::resolve_targets(&raw, config.effective_port());
    let prober = Arc::new(Prober::new(&config)?);

    println!("reachscan configuration:");
    println!("  targets      : {}", targets.len());
    println!("  mode         : {}", config.mode);
    println!("  port         : {}", config.effective_port());
    println!(
        "  proxy        : {}",
        config
            .proxy
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!("  concurrency  : {}", config.concurrency);
    println!("  timeout_ms   : {}", cli.timeout_ms);

    // Ctrl-C stops launching new probes; in-flight ones still finish.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, draining in-flight probes");
            cancel_ctrlc.cancel();
        }
    });

    let reporter = BarReporter::new(targets.len(), !cli.no_progress)?;
    let results = scanner::scan_targets_with_cancel(
        &targets,
        prober,
        config.concurrency,
        &reporter,
        cancel,
    )
    .await;
    reporter.finish();

    print_results_table(&results);
    println!(
        "\nFinished: {}/{} reachable.\n",
        results.reachable_count,
        targets.len()
    );

    if let Some(path) = cli.out.as_deref() {
        match output::write_results(path, &results.outcomes) {
            Ok(_) => println!("Saved to {}", path.display()),
            Err(e) => {
                error!(error = %e, "output write failed");
                eprintln!("Cannot write output: {e:#}");
            }
        }
    }

    Ok(())
}

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// indicatif-backed progress reporter.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new(total: usize, visible: bool) -> Result<Self> {
        if !visible {
            return Ok(Self {
                bar: ProgressBar::hidden(),
            });
        }
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)?
            .progress_chars("#>-");
        bar.set_style(style);
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for BarReporter {
    fn on_start(&self, target: &Target) {
        self.bar.set_message(format!("{target} | ⏳"));
    }

    fn on_finish(&self, target: &Target, outcome: &ProbeOutcome) {
        self.bar.inc(1);
        self.bar.set_message(format!("{target} | {}", output::mark(outcome)));
    }
}

fn print_results_table(results: &ScanResults) {
    let reachable: Vec<&ProbeOutcome> =
        results.outcomes.iter().filter(|o| o.reachable).collect();
    if reachable.is_empty() {
        return;
    }

    let mut ep_w = "endpoint".len();
    let mut detail_w = "detail".len();
    let details: Vec<String> = reachable.iter().map(|o| detail(o)).collect();
    for (o, d) in reachable.iter().zip(&details) {
        ep_w = ep_w.max(o.endpoint().len());
        detail_w = detail_w.max(d.len().min(60));
    }
    let mode_w = "upgrade".len();
    let lat_w = "latency_ms".len();

    println!(
        "\nReachable: {} (probed: {})",
        reachable.len(),
        results.scanned_done
    );
    println!(
        "{:<ep_w$}  {:<mode_w$}  {:>lat_w$}  {:<detail_w$}",
        "endpoint", "mode", "latency_ms", "detail",
    );
    println!(
        "{:-<ep_w$}  {:-<mode_w$}  {:-<lat_w$}  {:-<detail_w$}",
        "", "", "", "",
    );
    for (o, d) in reachable.iter().zip(details) {
        let mut d = d;
        if d.len() > 60 {
            d = d.chars().take(60).collect();
        }
        println!(
            "{:<ep_w$}  {:<mode_w$}  {:>lat_w$}  {:<detail_w$}",
            o.endpoint(),
            o.mode.as_str(),
            o.elapsed_ms,
            d,
        );
    }
}

fn detail(o: &ProbeOutcome) -> String {
    match o.mode {
        ProbeMode::Plain => o.status.map(|s| format!("HTTP {s}")).unwrap_or_default(),
        ProbeMode::Tls => {
            let issuer = o.issuer.as_deref().unwrap_or("?");
            match o.expires.as_deref() {
                Some(exp) => format!("issuer={issuer} expires={exp}"),
                None => format!("issuer={issuer}"),
            }
        }
        ProbeMode::Upgrade => "101 Switching Protocols".to_string(),
    }
}
