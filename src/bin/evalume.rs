//! CLI binary for evalume.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig` / `ReportLayout`, drives an `AnalysisSession` and prints
//! the results.

use anyhow::{Context, Result};
use clap::Parser;
use evalume::config::DEFAULT_GATEWAY_URL;
use evalume::{
    AggregatedReport, AnalysisJob, AnalysisSession, ClientConfig, HttpGateway, ImageUpload,
    ReportLayout, RichText, Stage, StageStatus, SubmissionRequest, TrackingError,
    TrackingObserver, TrackingOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn italic(s: &str) -> String {
    format!("\x1b[3m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

/// Backend text with emphasis rendered as ANSI and all other markup removed.
fn render_rich(text: &str) -> String {
    RichText::parse(text)
        .spans
        .iter()
        .map(|span| match (span.style.bold, span.style.italic) {
            (true, true) => format!("\x1b[1;3m{}\x1b[0m", span.text),
            (true, false) => bold(&span.text),
            (false, true) => italic(&span.text),
            (false, false) => span.text.clone(),
        })
        .collect()
}

// ── CLI tracking observer using indicatif ────────────────────────────────────

/// Live spinner with one log line per stage as it finishes.
struct CliTrackingObserver {
    bar: ProgressBar,
    /// Last status printed for each polled stage.
    seen: Mutex<[StageStatus; 2]>,
}

impl CliTrackingObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.set_message("sending image…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            seen: Mutex::new(Default::default()),
        })
    }

    fn stage_line(stage: Stage, status: &StageStatus) -> String {
        match status {
            StageStatus::Completed(_) => format!("  {} {}", green("✓"), stage.label()),
            StageStatus::Failed(msg) => {
                format!("  {} {}  {}", red("✗"), stage.label(), red(msg))
            }
            StageStatus::Pending => format!("  {} {}", dim("…"), stage.label()),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TrackingObserver for CliTrackingObserver {
    fn on_tracking_start(&self, run_id: &str) {
        self.bar.set_prefix("Analyzing");
        self.bar.set_message(format!("run {}", dim(run_id)));
    }

    fn on_poll(&self, run_id: &str, attempt: u32) {
        self.bar
            .set_message(format!("run {}  status check #{attempt}", dim(run_id)));
    }

    fn on_update(&self, job: &AnalysisJob, _aggregated: &AggregatedReport) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        for (slot, stage) in seen.iter_mut().zip(Stage::POLLED) {
            let current = job.stage(stage);
            if current.is_terminal() && !slot.is_terminal() {
                self.bar.println(Self::stage_line(stage, current));
            }
            *slot = current.clone();
        }
    }

    fn on_settled(&self, _job: &AnalysisJob, aggregated: &AggregatedReport) {
        self.bar.finish_and_clear();
        if aggregated.errors.is_empty() {
            eprintln!("{} Analysis complete", green("✔"));
        } else {
            eprintln!(
                "{} Analysis finished with {} failed stage(s)",
                cyan("⚠"),
                aggregated.errors.len()
            );
        }
    }

    fn on_tracking_error(&self, _run_id: &str, error: &TrackingError) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(&error.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse an essay photo and write image-analysis-report.pdf
  evalume essay.jpg --topic "Climate policy"

  # Add motivational texts (inline or from a file)
  evalume essay.jpg --topic "Education" --context @prompts.txt

  # Custom output path, different backend
  evalume scan.png -t "Urban mobility" -o reports/mobility.pdf \
      --gateway https://analysis.example.org

  # Print the session as JSON and skip the PDF
  evalume scan.png -t "Urban mobility" --json --no-pdf > session.json

LIMITS:
  Images only (PNG, JPEG, GIF, WebP, BMP), at most 100 MB.
  The topic is required.

ENVIRONMENT VARIABLES:
  EVALUME_GATEWAY_URL       Backend base URL (default http://localhost:8000)
  EVALUME_POLL_INTERVAL_MS  Status check cadence in milliseconds (default 2000)
  EVALUME_TOPIC             Default topic
  EVALUME_OUTPUT            Default PDF output path
  RUST_LOG                  Override log filter (e.g. evalume=debug)

Press Ctrl-C while analysing to stop status checks; whatever finished so far
is still printed.
"#;

/// Analyse an image with the evaluation backend and export a PDF report.
#[derive(Parser, Debug)]
#[command(
    name = "evalume",
    version,
    about = "Analyse an image with the evaluation backend and export a PDF report",
    long_about = "Upload an image (e.g. a photographed essay) together with a topic, follow the \
backend's text-extraction, linguistic-analysis and argumentative-analysis stages until both \
analyses finish, print the results and write a paginated PDF report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file to analyse.
    image: PathBuf,

    /// Topic the text should be evaluated against (required).
    #[arg(short, long, env = "EVALUME_TOPIC")]
    topic: String,

    /// Motivational texts: inline text, or `@path` to read from a file.
    #[arg(short, long, env = "EVALUME_CONTEXT")]
    context: Option<String>,

    /// Write the PDF report here.
    #[arg(short, long, env = "EVALUME_OUTPUT")]
    output: Option<PathBuf>,

    /// Do not write a PDF report.
    #[arg(long, env = "EVALUME_NO_PDF")]
    no_pdf: bool,

    /// Print the final session state as JSON instead of text.
    #[arg(long, env = "EVALUME_JSON")]
    json: bool,

    /// Backend base URL.
    #[arg(long, env = "EVALUME_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    gateway: String,

    /// Milliseconds between status checks.
    #[arg(long, env = "EVALUME_POLL_INTERVAL_MS", default_value_t = 2000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "EVALUME_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// chrono format for the date in the PDF footer.
    #[arg(long, env = "EVALUME_DATE_FORMAT", default_value = "%Y-%m-%d")]
    date_format: String,

    /// Disable the live status spinner.
    #[arg(long, env = "EVALUME_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EVALUME_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "EVALUME_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let config = ClientConfig::builder()
        .base_url(&cli.gateway)
        .poll_interval_ms(cli.poll_interval_ms)
        .request_timeout_secs(cli.timeout)
        .build()
        .context("Invalid configuration")?;
    let layout = ReportLayout::builder()
        .date_format(&cli.date_format)
        .build()
        .context("Invalid report layout")?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&layout.file_name));

    let gateway = Arc::new(HttpGateway::new(&config).context("Failed to create HTTP client")?);
    let observer = show_progress.then(CliTrackingObserver::new);

    let mut session = AnalysisSession::new(gateway, config, layout);
    if let Some(ref obs) = observer {
        session = session.with_observer(obs.clone());
    }

    // ── Build request ────────────────────────────────────────────────────
    let image = ImageUpload::from_path(&cli.image)
        .await
        .context("Failed to load image")?;
    let mut request = SubmissionRequest::new(image, cli.topic.clone());
    if let Some(context) = read_context(cli.context.as_deref()).await? {
        request = request.with_context(context);
    }

    // ── Submit ───────────────────────────────────────────────────────────
    let submission = match session.start(request).await {
        Ok(s) => s,
        Err(e) => {
            if let Some(ref obs) = observer {
                obs.finish();
            }
            return Err(anyhow::Error::new(e).context("Analysis could not start"));
        }
    };
    if !cli.quiet && !cli.json {
        if let Some(ref obs) = observer {
            obs.bar.println(format!(
                "{} {}  {}",
                cyan("◆"),
                bold("Image accepted"),
                dim(&format!("run {}", submission.run_id))
            ));
        } else {
            eprintln!("Image accepted, run {}", submission.run_id);
        }
    }

    // ── Track until settled, failed, or interrupted ──────────────────────
    let outcome = tokio::select! {
        outcome = session.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            session.cancel();
            if let Some(ref obs) = observer {
                obs.finish();
            }
            if !cli.quiet {
                eprintln!("{} Cancelled; showing partial results", cyan("⚠"));
            }
            session.wait().await
        }
    };

    let view = session.view();

    // ── Print results ────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&view).context("Failed to serialise session")?;
        println!("{json}");
    } else {
        print_section("Extracted Text from Image", view.extracted_text.as_deref());
        print_section("Linguistic Analysis", view.aggregated.report.overview.as_deref());
        print_section(
            "Argumentative Analysis",
            view.aggregated.report.recommendations.as_deref(),
        );
        for error in &view.aggregated.errors {
            eprintln!("{} {}", red("✗"), red(error));
        }
    }

    if let Some(TrackingOutcome::Failed { error, .. }) = &outcome {
        anyhow::bail!("{}", error);
    }

    // ── Export ───────────────────────────────────────────────────────────
    if cli.no_pdf {
        return Ok(());
    }
    if !view.can_export() {
        if !cli.quiet {
            eprintln!("{}", dim("PDF not written: analysis did not finish."));
        }
        return Ok(());
    }

    let written = session
        .export_to_file(&output_path)
        .await
        .context("Failed to write PDF report")?;
    if !cli.quiet {
        eprintln!(
            "{} Report  →  {}",
            green("✔"),
            bold(&written.display().to_string())
        );
    }

    Ok(())
}

/// `@path` reads the file; anything else is taken literally.
async fn read_context(arg: Option<&str>) -> Result<Option<String>> {
    match arg {
        None => Ok(None),
        Some(value) => match value.strip_prefix('@') {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map(Some)
                .with_context(|| format!("Failed to read context from {:?}", path)),
            None => Ok(Some(value.to_string())),
        },
    }
}

fn print_section(heading: &str, body: Option<&str>) {
    let Some(body) = body.filter(|b| !b.trim().is_empty()) else {
        return;
    };
    println!("{}", bold(heading));
    println!("{}", render_rich(body));
    println!();
}
