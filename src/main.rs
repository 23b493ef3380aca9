use clap::{Args, Parser, Subcommand};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use tokio::signal;

mod framework;

use framework::{
    analyzers::{classify_from, FileLogger},
    config::{
        parse_chance, parse_consistency, parse_elo, parse_elo_variance, parse_skill_variance, ConfigStore,
        EngineSettings, Rgb, SettingsChange, SettingsError, Side,
    },
    core::{LogRecord, LogSource, TelemetryKind},
    runners::{Runner, StreamReader},
    supervisor::{ProcessSupervisor, SupervisorConfig},
    ui::{ConsolePresenter, ControlSurface, EvalBar, UiHandle, UiMessage, UserCommand},
};

fn parse_blunder(raw: &str) -> Result<f64, SettingsError> {
    parse_chance("blunder_chance", raw)
}

fn parse_suboptimal(raw: &str) -> Result<f64, SettingsError> {
    parse_chance("suboptimal_chance", raw)
}

#[derive(Parser)]
#[command(author, version, about = "Supervise an external chess engine process", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Values written to the settings file, overriding what is already there
#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// Side the engine plays for (white or black)
    #[arg(long)]
    side: Option<Side>,
    /// Engine strength
    #[arg(long, value_parser = parse_elo)]
    elo: Option<u32>,
    /// Arrow colour as #RRGGBB
    #[arg(long)]
    arrow_color: Option<Rgb>,
    /// Start with suggestions disabled
    #[arg(long)]
    disabled: bool,
    /// Enable or disable legit mode
    #[arg(long)]
    legit_mode: Option<bool>,
    /// Blunder probability in legit mode (0.1 or 10%)
    #[arg(long, value_parser = parse_blunder)]
    blunder_chance: Option<f64>,
    /// Suboptimal-move probability in legit mode (0.1 or 10%)
    #[arg(long, value_parser = parse_suboptimal)]
    suboptimal_chance: Option<f64>,
    /// How much the engine's skill varies in legit mode (0.0 to 1.0)
    #[arg(long, value_parser = parse_skill_variance)]
    skill_variance: Option<f64>,
    /// Consistency of play in legit mode (0 to 100)
    #[arg(long, value_parser = parse_consistency)]
    consistency: Option<u32>,
    /// How far the effective elo may drift in legit mode
    #[arg(long, value_parser = parse_elo_variance)]
    elo_variance: Option<u32>,
}

impl SettingsArgs {
    fn changes(&self) -> Vec<SettingsChange> {
        let mut changes = Vec::new();
        if let Some(side) = self.side {
            changes.push(SettingsChange::Side(side));
        }
        if let Some(elo) = self.elo {
            changes.push(SettingsChange::Elo(elo));
        }
        if let Some(color) = self.arrow_color {
            changes.push(SettingsChange::ArrowColor(color));
        }
        if self.disabled {
            changes.push(SettingsChange::Enabled(false));
        }
        if let Some(on) = self.legit_mode {
            changes.push(SettingsChange::LegitMode(on));
        }
        if let Some(chance) = self.blunder_chance {
            changes.push(SettingsChange::BlunderChance(chance));
        }
        if let Some(chance) = self.suboptimal_chance {
            changes.push(SettingsChange::SuboptimalChance(chance));
        }
        if let Some(variance) = self.skill_variance {
            changes.push(SettingsChange::SkillVariance(variance));
        }
        if let Some(consistency) = self.consistency {
            changes.push(SettingsChange::Consistency(consistency));
        }
        if let Some(variance) = self.elo_variance {
            changes.push(SettingsChange::EloVariance(variance));
        }
        changes
    }

    /// Persisted settings from `store` (or defaults) with these overrides applied
    fn resolve(&self, store: &ConfigStore) -> Result<EngineSettings, SettingsError> {
        let mut settings = store.load_or_default();
        for change in self.changes() {
            settings.apply(change)?;
        }
        Ok(settings)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the engine and supervise it, reading commands from stdin
    Run {
        /// Engine installation directory; settings.json is written here
        #[arg(short = 'd', long, default_value = ".")]
        engine_dir: PathBuf,
        /// Engine executable
        #[arg(short = 'p', long, default_value = "python3")]
        program: String,
        /// Argument passed to the engine before --settings-file (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Supervisor log file (defaults to <engine-dir>/supervisor.log)
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Enable log rotation
        #[arg(long)]
        rotate_logs: bool,
        /// Maximum log file size in MB (used with --rotate-logs)
        #[arg(long, default_value = "10")]
        max_log_size: u64,
        /// Do not echo engine output to the console
        #[arg(short, long)]
        quiet: bool,
        /// Wait for a `start` command instead of launching immediately
        #[arg(long)]
        no_autostart: bool,
        /// Width of the evaluation bar in characters
        #[arg(long, default_value = "40")]
        bar_width: u32,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Write the settings file without launching anything
    WriteSettings {
        /// Engine installation directory
        #[arg(short = 'd', long, default_value = ".")]
        engine_dir: PathBuf,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Feed recorded engine output (raw lines or a supervisor log) through
    /// the telemetry parser and print the final evaluation
    Replay {
        /// Input file (defaults to stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Width of the evaluation bar in characters
        #[arg(long, default_value = "40")]
        bar_width: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize env_logger with default log level of info; RUST_LOG overrides
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            engine_dir,
            program,
            args,
            log_file,
            rotate_logs,
            max_log_size,
            quiet,
            no_autostart,
            bar_width,
            settings,
        } => {
            let options = RunOptions {
                engine_dir,
                program,
                args,
                log_file,
                rotate_logs,
                max_log_size,
                quiet,
                autostart: !no_autostart,
                bar_width,
            };
            run_engine(options, &settings).await?
        }
        Commands::WriteSettings { engine_dir, settings } => write_settings(engine_dir, &settings)?,
        Commands::Replay { input, bar_width } => replay(input, bar_width).await?,
    }

    Ok(())
}

struct RunOptions {
    engine_dir: PathBuf,
    program: String,
    args: Vec<String>,
    log_file: Option<PathBuf>,
    rotate_logs: bool,
    max_log_size: u64,
    quiet: bool,
    autostart: bool,
    bar_width: u32,
}

/// Supervise the engine until `quit`, Ctrl-C, or stdin closing after a stop
async fn run_engine(options: RunOptions, overrides: &SettingsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = ConfigStore::new(&options.engine_dir);
    let settings = overrides.resolve(&store)?;

    let log_path = options
        .log_file
        .unwrap_or_else(|| options.engine_dir.join("supervisor.log"));
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let journal = if options.rotate_logs {
        FileLogger::with_max_size(&log_path, options.max_log_size)?
    } else {
        FileLogger::new(&log_path)?
    };
    info!("Logging engine output to {}", log_path.display());

    let (ui, rx) = UiHandle::channel();
    let config = SupervisorConfig::new(options.program)
        .with_args(options.args)
        .working_dir(&options.engine_dir)
        .echo_output(!options.quiet);
    let supervisor = ProcessSupervisor::new(config, store, journal.clone(), ui.clone());
    let mut surface = ControlSurface::new(
        supervisor,
        settings,
        EvalBar::new(options.bar_width),
        ConsolePresenter::new(),
        journal,
    );

    setup_signal_handler(ui.clone());
    spawn_command_reader(ui);

    if options.autostart {
        // A failed launch is already shown; the user can retry with `start`
        if let Err(e) = surface.start() {
            debug!("Initial start failed: {}", e);
        }
    } else {
        println!("Engine not started; type `start` (or `help`)");
    }

    surface.run(rx).await;
    Ok(())
}

fn setup_signal_handler(ui: UiHandle) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("\nReceived Ctrl-C, shutting down...");
                ui.post(UiMessage::Shutdown);
            }
            Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
        }
    });
}

/// Read commands from stdin on a plain thread and post them to the UI.
/// A blocking stdin read would otherwise hold up runtime shutdown.
fn spawn_command_reader(ui: UiHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read command: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<UserCommand>() {
                Ok(command) => {
                    if !ui.post(UiMessage::Command(command)) {
                        break;
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            }
        }
        info!("Command input closed");
    });
}

fn write_settings(engine_dir: PathBuf, overrides: &SettingsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = ConfigStore::new(&engine_dir);
    let settings = overrides.resolve(&store)?;
    store.write(&settings)?;
    println!("Wrote {}", store.path().display());
    println!("{}", settings.summary());
    Ok(())
}

/// Lines in a supervisor log are JSON records; anything else is raw stdout
fn as_engine_record(record: LogRecord) -> LogRecord {
    serde_json::from_str::<LogRecord>(&record.text).unwrap_or(record)
}

async fn replay(input: Option<PathBuf>, bar_width: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = match &input {
        Some(path) => StreamReader::new(LogSource::Stdout, tokio::fs::File::open(path).await?),
        None => StreamReader::new(LogSource::Stdout, tokio::io::stdin()),
    }
    .with_label("replay");

    let mut stream = reader.run().await.map_err(|e| e.to_string())?;
    let mut bar = EvalBar::new(bar_width);
    let (mut lines, mut evaluations, mut rejected, mut errors) = (0u64, 0u64, 0u64, 0u64);

    while let Some(record) = stream.next().await {
        let record = as_engine_record(record);
        if record.source == LogSource::Supervisor || record.text.trim().is_empty() {
            continue;
        }
        lines += 1;
        let event = classify_from(record.source, &record.text);
        match event.kind {
            TelemetryKind::Evaluation => {
                evaluations += 1;
                if bar.on_evaluation(&event.payload).is_err() {
                    rejected += 1;
                }
            }
            TelemetryKind::ErrorLine => errors += 1,
            TelemetryKind::LogLine => {}
        }
    }

    println!(
        "{} lines, {} evaluations ({} rejected), {} stderr lines",
        lines, evaluations, rejected, errors
    );
    println!("{}", bar.render());
    Ok(())
}
