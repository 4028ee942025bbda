use crate::config::{self, FileSettings, Settings};
use crate::error::OrchestratorError;
use crate::model::{
    Forecast, Generation, GeoPoint, PrecipitationUnit, Query, TemperatureUnit, WeatherCandidate,
    WeatherEvent, WindSpeedUnit,
};
use crate::orchestrator::{self, dispatch, Presenter, Progress, UiCommand};
use crate::source::{OpenMeteoConfig, OpenMeteoSource};
use crate::transport::{ReqwestTransport, TransportConfig};
use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Url;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "forecast-cli",
    version,
    about = "Current weather for a city, with interactive choice between matching places"
)]
pub struct Cli {
    /// City name to look up (matched exactly, case-sensitive)
    #[arg(long)]
    pub city: Option<String>,

    /// Region or state the city must be in; leave empty to list every match
    #[arg(long, default_value = "")]
    pub region: String,

    /// Print JSON result and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// When several places match, pick the Nth (1-based) instead of prompting
    #[arg(long)]
    pub pick: Option<usize>,

    /// Path to a TOML config file (default: <config dir>/forecast-cli/config.toml)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Geocoding endpoint for the location lookup
    #[arg(long, env = "FORECAST_GEOCODING_URL")]
    pub geocoding_url: Option<String>,

    /// Forecast endpoint for the weather lookup
    #[arg(long, env = "FORECAST_FORECAST_URL")]
    pub forecast_url: Option<String>,

    /// Maximum number of places requested from the geocoder (1-100)
    #[arg(long, env = "FORECAST_RESULT_COUNT")]
    pub count: Option<u32>,

    /// Language for place names
    #[arg(long, env = "FORECAST_LANGUAGE")]
    pub language: Option<String>,

    #[arg(long, value_enum)]
    pub temperature_unit: Option<TemperatureUnit>,

    #[arg(long, value_enum)]
    pub wind_speed_unit: Option<WindSpeedUnit>,

    #[arg(long, value_enum)]
    pub precipitation_unit: Option<PrecipitationUnit>,

    /// Static bearer token sent with every request
    #[arg(long, env = "FORECAST_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Also write the forecast as JSON to this file
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Increase log verbosity on stderr (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.pick == Some(0) {
        bail!("--pick is 1-based; use --pick 1 for the first match");
    }
    let settings = build_settings(&args)?;

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, settings).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_once(args, settings, OutputMode::Text).await;
        }
    }

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    run_once(args, settings, mode).await
}

/// Merge CLI flags over the config file and defaults.
pub fn build_settings(args: &Cli) -> Result<Settings> {
    let overrides = FileSettings {
        geocoding_url: args.geocoding_url.clone(),
        forecast_url: args.forecast_url.clone(),
        result_count: args.count,
        language: args.language.clone(),
        temperature_unit: args.temperature_unit,
        wind_speed_unit: args.wind_speed_unit,
        precipitation_unit: args.precipitation_unit,
        bearer_token: args.bearer_token.clone(),
    };
    config::load_settings(args.config.as_deref(), overrides)
}

/// Build the Open-Meteo source from resolved settings.
pub fn build_source(settings: &Settings) -> Result<Arc<OpenMeteoSource>> {
    let transport = ReqwestTransport::new(&TransportConfig {
        user_agent: format!("forecast-cli/{}", env!("CARGO_PKG_VERSION")),
        bearer_token: settings.bearer_token.clone(),
    })?;
    let cfg = OpenMeteoConfig {
        geocoding_url: Url::parse(&settings.geocoding_url)
            .with_context(|| format!("invalid geocoding URL {}", settings.geocoding_url))?,
        forecast_url: Url::parse(&settings.forecast_url)
            .with_context(|| format!("invalid forecast URL {}", settings.forecast_url))?,
        result_count: settings.result_count,
        language: settings.language.clone(),
        units: settings.units,
    };
    Ok(Arc::new(OpenMeteoSource::new(Arc::new(transport), cfg)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
}

/// How a one-shot run ended.
#[derive(Debug)]
enum Outcome {
    Forecast(Box<Forecast>),
    NoMatch(Query),
    /// Several places matched and no choice could be made non-interactively.
    Unresolved(Vec<WeatherCandidate>),
    Failed(OrchestratorError),
    /// The run stopped on our side, e.g. `--pick` out of range or stdin failing.
    Aborted(anyhow::Error),
}

/// Presenter for text and JSON modes: progress goes to stderr, the outcome is kept for the end.
struct OneShotPresenter {
    out: mpsc::UnboundedSender<OutputLine>,
    mode: OutputMode,
    pending_choice: Option<(Generation, Vec<WeatherCandidate>)>,
    outcome: Option<Outcome>,
}

impl Presenter<GeoPoint, Forecast> for OneShotPresenter {
    fn on_progress(&mut self, _generation: Generation, progress: Progress<'_, GeoPoint>) {
        if self.mode == OutputMode::Json {
            return;
        }
        let msg = match progress {
            Progress::Resolving(q) => format!("Looking up {q}…"),
            Progress::Fetching(c) => format!("Fetching weather for {c}…"),
        };
        let _ = self.out.send(OutputLine::Stderr(msg));
    }

    fn on_ambiguous(&mut self, generation: Generation, candidates: Vec<WeatherCandidate>) {
        if self.mode == OutputMode::Text {
            let _ = self.out.send(OutputLine::Stderr(format!(
                "{} places match:",
                candidates.len()
            )));
            for (i, c) in candidates.iter().enumerate() {
                let _ = self.out.send(OutputLine::Stderr(format!(
                    "  {}) {}",
                    i + 1,
                    crate::text_summary::describe_candidate(c)
                )));
            }
        }
        self.pending_choice = Some((generation, candidates));
    }

    fn on_no_match(&mut self, query: &Query) {
        self.outcome = Some(Outcome::NoMatch(query.clone()));
    }

    fn on_result(&mut self, detail: Forecast) {
        self.outcome = Some(Outcome::Forecast(Box::new(detail)));
    }

    fn on_error(&mut self, error: &OrchestratorError) {
        self.outcome = Some(Outcome::Failed(error.clone()));
    }
}

/// Resolve `--pick N` against the offered candidates, returning the 0-based index too.
fn pick_nth(candidates: &[WeatherCandidate], n: usize) -> Result<(usize, WeatherCandidate)> {
    let index = n.wrapping_sub(1);
    candidates
        .get(index)
        .map(|c| (index, c.clone()))
        .with_context(|| {
            format!(
                "--pick {n} is out of range: {} places match",
                candidates.len()
            )
        })
}

/// Parse a 1-based choice typed by the user.
fn parse_choice(input: &str, count: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    (1..=count).contains(&n).then_some(n)
}

/// Ask on stdin until a valid number is entered. `None` on end of input.
async fn prompt_choice(
    out: &mpsc::UnboundedSender<OutputLine>,
    count: usize,
) -> Result<Option<usize>> {
    loop {
        let _ = out.send(OutputLine::Stderr(format!("Choose a place [1-{count}]:")));
        let line = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            let read = std::io::stdin().lock().read_line(&mut buf)?;
            Ok::<_, std::io::Error>((read, buf))
        })
        .await
        .context("stdin reader task failed")?
        .context("read choice from stdin")?;

        match line {
            (0, _) => return Ok(None),
            (_, text) => {
                if let Some(n) = parse_choice(&text, count) {
                    return Ok(Some(n));
                }
                let _ = out.send(OutputLine::Stderr(format!(
                    "Please enter a number between 1 and {count}."
                )));
            }
        }
    }
}

/// Run a single lookup to completion and print its outcome.
async fn run_once(args: Cli, settings: Settings, mode: OutputMode) -> Result<()> {
    let Some(city) = args.city.clone() else {
        bail!("--city is required with --text or --json");
    };
    let query = Query::new(city.trim(), args.region.trim());
    if query.primary.is_empty() {
        bail!("--city must not be empty");
    }

    let source = build_source(&settings)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<WeatherEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand<GeoPoint>>();
    let handle = tokio::spawn(orchestrator::run_controller(source, event_tx, cmd_rx));

    let _ = cmd_tx.send(UiCommand::Submit(query));
    let outcome = drive(&args, mode, &out_tx, &mut event_rx, &cmd_tx).await;

    // Same teardown on every path: stop the controller, then flush output.
    let _ = cmd_tx.send(UiCommand::Quit);
    let controller = handle
        .await
        .context("controller task failed")
        .and_then(|r| r);
    let res = controller.and_then(|()| report_outcome(&args, mode, &out_tx, outcome));

    drop(out_tx);
    let _ = out_handle.await;
    res
}

/// Feed controller events to the presenter, answering choices, until an outcome is known.
async fn drive(
    args: &Cli,
    mode: OutputMode,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
    event_rx: &mut mpsc::UnboundedReceiver<WeatherEvent>,
    cmd_tx: &mpsc::UnboundedSender<UiCommand<GeoPoint>>,
) -> Outcome {
    let mut presenter = OneShotPresenter {
        out: out_tx.clone(),
        mode,
        pending_choice: None,
        outcome: None,
    };

    while let Some(ev) = event_rx.recv().await {
        dispatch(&mut presenter, ev);

        if let Some((generation, candidates)) = presenter.pending_choice.take() {
            let choice = match (args.pick, mode) {
                (Some(n), _) => pick_nth(&candidates, n).map(Some),
                (None, OutputMode::Text) => prompt_choice(out_tx, candidates.len())
                    .await
                    .map(|n| n.map(|n| (n - 1, candidates[n - 1].clone()))),
                (None, OutputMode::Json) => Ok(None),
            };
            match choice {
                Ok(Some((index, candidate))) => {
                    let _ = cmd_tx.send(UiCommand::Select {
                        generation,
                        index,
                        candidate,
                    });
                }
                Ok(None) => return Outcome::Unresolved(candidates),
                Err(e) => return Outcome::Aborted(e),
            }
        }

        if let Some(outcome) = presenter.outcome.take() {
            return outcome;
        }
    }
    Outcome::Aborted(anyhow::anyhow!("lookup ended without an outcome"))
}

fn report_outcome(
    args: &Cli,
    mode: OutputMode,
    out: &mpsc::UnboundedSender<OutputLine>,
    outcome: Outcome,
) -> Result<()> {
    match outcome {
        Outcome::Forecast(forecast) => {
            if let Some(p) = args.export_json.as_deref() {
                export_json(p, &forecast)?;
                let _ = out.send(OutputLine::Stderr(format!("Exported: {}", p.display())));
            }
            match mode {
                OutputMode::Json => {
                    let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(&forecast)?));
                }
                OutputMode::Text => {
                    for line in crate::text_summary::build_text_summary(&forecast).lines {
                        let _ = out.send(OutputLine::Stdout(line));
                    }
                }
            }
            Ok(())
        }
        Outcome::NoMatch(query) => {
            if mode == OutputMode::Json {
                let doc = serde_json::json!({ "status": "no_match", "query": query });
                let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(&doc)?));
            }
            bail!("No results found for {query}")
        }
        Outcome::Unresolved(candidates) => {
            if mode == OutputMode::Json {
                let doc = serde_json::json!({ "status": "ambiguous", "candidates": candidates });
                let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(&doc)?));
            }
            bail!(
                "{} places match; choose one with --pick N",
                candidates.len()
            )
        }
        Outcome::Failed(error) => {
            if mode == OutputMode::Json {
                let doc = serde_json::json!({
                    "status": "failed",
                    "stage": error.stage(),
                    "kind": error.kind(),
                    "message": error.to_string(),
                });
                let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(&doc)?));
            }
            Err(error.into())
        }
        Outcome::Aborted(error) => {
            if mode == OutputMode::Json {
                let doc = serde_json::json!({
                    "status": "failed",
                    "stage": crate::error::Stage::Selection,
                    "kind": "aborted",
                    "message": format!("{error:#}"),
                });
                let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(&doc)?));
            }
            Err(error)
        }
    }
}

/// Write a forecast as pretty JSON.
pub fn export_json(path: &std::path::Path, forecast: &Forecast) -> Result<()> {
    let body = serde_json::to_string_pretty(forecast)?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))
}
