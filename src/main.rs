use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use signstream::classifier::{Classifier, RawPrediction};
use signstream::cli::{Cli, Commands, ConfigAction};
use signstream::config::Config;
use signstream::dictionary::Dictionary;
use signstream::engine::{EngineEvent, FlushReport, Session};
use signstream::error::SignstreamError;
use signstream::landmarks::FeatureVector;
use signstream::pipeline::{JsonLinesSink, Pipeline, WordSink};
use signstream::replay::{self, FrameReader};
use signstream::suggest::SuggestionRanker;
use std::fs::File;
use std::io::{BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run {
            input,
            classifier_url,
            dictionary,
            idle_flush,
            json,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(url) = classifier_url {
                config.classifier.endpoint = Some(url);
            }
            if let Some(path) = dictionary {
                config.dictionary.path = Some(path);
            }
            if let Some(idle) = idle_flush {
                config.accumulator.idle_flush_ms = idle.as_millis() as u64;
            }
            config.validate()?;
            run_command(&config, input.as_deref(), json, cli.quiet)?;
        }
        Commands::Segment {
            letters,
            dictionary,
        } => {
            let config = load_validated_config(cli.config.as_deref())?;
            let dictionary = load_dictionary(&config, dictionary.as_deref())?;
            let result = signstream::segment(&letters.trim().to_uppercase(), &dictionary);
            let color = std::io::stdout().is_terminal();
            if !result.settled_words.is_empty() {
                println!("{}", paint_words(&result.settled_words, color));
            }
            if !result.remainder.is_empty() {
                println!("{}", render_remainder(&result.remainder, &[], color));
            }
        }
        Commands::Suggest {
            partial,
            dictionary,
        } => {
            let config = load_validated_config(cli.config.as_deref())?;
            let dictionary = load_dictionary(&config, dictionary.as_deref())?;
            let ranker = SuggestionRanker::new(dictionary, config.engine_config().suggestions);
            for word in ranker.suggest(&partial) {
                println!("{}", word);
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "signstream",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays machine-readable.
///
/// `RUST_LOG` wins over `-v`/`-q`.
fn init_logging(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/signstream/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };
    Ok(config.with_env_overrides())
}

/// [`load_config`] for commands that take no further overrides.
fn load_validated_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = load_config(custom_path)?;
    config.validate()?;
    Ok(config)
}

fn load_dictionary(config: &Config, override_path: Option<&Path>) -> Result<Arc<Dictionary>> {
    let path = override_path.or(config.dictionary.path.as_deref());
    Ok(Dictionary::load(path)?)
}

/// Stand-in when no classifier endpoint is configured: every frame without a
/// recorded label reads as "nothing recognized".
struct NoClassifier;

impl Classifier for NoClassifier {
    fn classify(&self, _features: &FeatureVector) -> signstream::Result<RawPrediction> {
        Ok(RawPrediction::new("", 0.0))
    }

    fn name(&self) -> &str {
        "none"
    }
}

fn build_classifier(config: &Config) -> Result<Arc<dyn Classifier>> {
    match &config.classifier.endpoint {
        #[cfg(feature = "http-classifier")]
        Some(endpoint) => {
            info!("classifying frames via {}", endpoint);
            let classifier = signstream::classifier::HttpClassifier::new(
                endpoint,
                std::time::Duration::from_millis(config.classifier.timeout_ms),
            )?;
            Ok(Arc::new(classifier))
        }
        #[cfg(not(feature = "http-classifier"))]
        Some(endpoint) => {
            bail!(
                "classifier endpoint {} configured, but signstream was built without the http-classifier feature",
                endpoint
            )
        }
        None => {
            info!("no classifier configured, only recorded labels will be used");
            Ok(Arc::new(NoClassifier))
        }
    }
}

/// Run frames from a file (deterministic replay) or stdin (live).
fn run_command(config: &Config, input: Option<&Path>, json: bool, quiet: bool) -> Result<()> {
    let dictionary = load_dictionary(config, None)?;
    let classifier = build_classifier(config)?;

    match input {
        Some(path) if path != Path::new("-") => {
            replay_file(config, path, classifier, dictionary, json, quiet)
        }
        _ => stream_stdin(config, classifier, dictionary, json, quiet),
    }
}

fn make_sink(json: bool, quiet: bool, origin: Instant) -> Box<dyn WordSink> {
    if json {
        Box::new(JsonLinesSink::new(std::io::stdout(), origin))
    } else {
        Box::new(TerminalSink::new(
            quiet,
            std::io::stdout().is_terminal(),
            std::io::stderr().is_terminal(),
        ))
    }
}

fn replay_file(
    config: &Config,
    path: &Path,
    classifier: Arc<dyn Classifier>,
    dictionary: Arc<Dictionary>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut session = Session::new(
        classifier,
        config.gateway_config(),
        config.engine_config(),
        dictionary,
    )?;

    let base = Instant::now();
    let events = replay::replay(&mut session, FrameReader::new(BufReader::new(file)), base)
        .with_context(|| format!("Failed to replay {}", path.display()))?;

    let mut sink = make_sink(json, quiet, base);
    for event in &events {
        sink.handle(event)?;
    }
    let words = sink.finish();
    info!(
        "replayed {}: {} words, {} malformed frames",
        path.display(),
        words.len(),
        session.malformed_frames()
    );
    Ok(())
}

fn stream_stdin(
    config: &Config,
    classifier: Arc<dyn Classifier>,
    dictionary: Arc<Dictionary>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let origin = Instant::now();
    let handle = Pipeline::new(config.pipeline_config()).start(
        classifier,
        dictionary,
        make_sink(json, quiet, origin),
    )?;

    let stdin = std::io::stdin().lock();
    for record in FrameReader::new(stdin) {
        let record = match record {
            Ok(record) => record,
            Err(e) if is_skippable(&e) => {
                warn!("skipping frame: {}", e);
                continue;
            }
            Err(e) => {
                warn!("stopped reading input: {}", e);
                break;
            }
        };
        // Live frames are stamped on arrival, not with their recorded offset.
        let mut frame = record.timed_frame(origin);
        frame.at = Instant::now();
        if handle.send_frame(frame).is_err() {
            warn!("pipeline closed, no longer reading input");
            break;
        }
    }

    let words = handle.stop();
    info!("stream ended: {} words", words.len());
    Ok(())
}

/// A bad line is skipped; a failing input stream ends the run.
fn is_skippable(error: &SignstreamError) -> bool {
    match error {
        SignstreamError::FrameDecode { .. } => true,
        SignstreamError::Io(e) => e.kind() == std::io::ErrorKind::InvalidData,
        _ => false,
    }
}

fn paint_words(words: &[String], color: bool) -> String {
    let line = words.join(" ");
    if color {
        line.green().bold().to_string()
    } else {
        line
    }
}

fn dim(text: &str, color: bool) -> String {
    if color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// `remainder: XYZ` with suggestions appended when there are any.
fn render_remainder(remainder: &str, suggestions: &[String], color: bool) -> String {
    let mut line = format!("{} {}", dim("remainder:", color), remainder);
    if !suggestions.is_empty() {
        line.push_str(&format!(
            "  {} {}",
            dim("suggestions:", color),
            suggestions.join(", ")
        ));
    }
    line
}

/// Human-readable output: one line per flush, settled letters on stderr.
struct TerminalSink {
    quiet: bool,
    color: bool,
    stderr_color: bool,
    words: Vec<String>,
}

impl TerminalSink {
    fn new(quiet: bool, color: bool, stderr_color: bool) -> Self {
        Self {
            quiet,
            color,
            stderr_color,
            words: Vec::new(),
        }
    }

    fn print_report(&self, report: &FlushReport) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        if !report.settled_words.is_empty() {
            writeln!(out, "{}", paint_words(&report.settled_words, self.color))?;
        }
        if !report.remainder.is_empty() {
            writeln!(
                out,
                "{}",
                render_remainder(&report.remainder, &report.suggestions, self.color)
            )?;
        }
        out.flush()
    }
}

impl WordSink for TerminalSink {
    fn handle(&mut self, event: &EngineEvent) -> signstream::Result<()> {
        match event {
            EngineEvent::Settled { token, .. } => {
                if !self.quiet {
                    eprintln!("{} {}", dim("+", self.stderr_color), token);
                }
            }
            EngineEvent::Flushed(report) => {
                self.words.extend(report.settled_words.iter().cloned());
                self.print_report(report)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Vec<String> {
        std::mem::take(&mut self.words)
    }

    fn name(&self) -> &'static str {
        "terminal"
    }
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = match custom_path {
        Some(path) => Some(path.to_path_buf()),
        None => Config::default_path(),
    };

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => match config_path {
            Some(path) => println!("{}", path.display()),
            None => bail!("No configuration directory on this platform; pass --config"),
        },
        ConfigAction::Init { force } => {
            let path: PathBuf = match config_path {
                Some(path) => path,
                None => bail!("No configuration directory on this platform; pass --config"),
            };
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, Config::default().to_toml()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let wrote = if std::io::stdout().is_terminal() {
                "Wrote".green().to_string()
            } else {
                "Wrote".to_string()
            };
            println!("{} {}", wrote, path.display());
        }
    }
    Ok(())
}
