#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use rule_panes::choices::{ChoiceLists, DisplayCapabilities};
use rule_panes::constants::cli::{CONFIRM_TIMEOUT_MS, WATCH_POLL_MS};
use rule_panes::placement;
use rule_panes::{
    FileRuleRegistry, FileSettingsStore, OperationFailure, PaneItem, PaneKey, Placement, Rect,
    RosterChange, RosterObserver, RuleId, SettingsWindow, ShowState,
};

#[derive(Parser)]
#[command(name = "rule-panes")]
#[command(about = "Headless settings window for per-window effect rules", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Rules file (defaults to the platform config dir)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Settings file holding window state
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level, overrides LOG_LEVEL
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the pane roster
    List,

    /// Create a rule matching a process name and select it
    AddProcess { name: String },

    /// Create a rule matching a window class name and select it
    AddClass { name: String },

    /// Remove a rule (process:<name> or class:<name>)
    Remove { id: RuleId },

    /// Re-read the rules file
    Reload,

    /// Show or replace the saved window placement
    Placement {
        #[arg(long, num_args = 4, value_names = ["LEFT", "TOP", "RIGHT", "BOTTOM"], allow_negative_numbers = true)]
        set: Option<Vec<i32>>,

        #[arg(long, value_enum, default_value = "normal")]
        show_state: ShowStateArg,
    },

    /// Keep the window open and apply registry changes until interrupted.
    /// SIGHUP reloads the rules file.
    Watch,

    /// Print the option lists offered by the rule editor
    Choices,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShowStateArg {
    Normal,
    Minimized,
    Maximized,
    Hidden,
}

impl From<ShowStateArg> for ShowState {
    fn from(arg: ShowStateArg) -> Self {
        match arg {
            ShowStateArg::Normal => ShowState::Normal,
            ShowStateArg::Minimized => ShowState::Minimized,
            ShowStateArg::Maximized => ShowState::Maximized,
            ShowStateArg::Hidden => ShowState::Hidden,
        }
    }
}

/// Logs roster activity and keeps failures for the command result
#[derive(Default)]
struct LogObserver {
    failures: Vec<OperationFailure>,
}

impl RosterObserver for LogObserver {
    fn roster_changed(&mut self, change: &RosterChange) {
        match change {
            RosterChange::Reset => info!("Roster reset"),
            RosterChange::Inserted { index, item } => {
                info!(index, pane = %item.key(), "Pane inserted")
            }
            RosterChange::Removed { index, item } => {
                info!(index, pane = %item.key(), "Pane removed")
            }
            RosterChange::Replaced { index, item } => {
                info!(index, pane = %item.key(), "Pane replaced")
            }
        }
    }

    fn selection_changed(&mut self, selected: &PaneItem) {
        info!(pane = %selected.key(), "Selection changed");
    }

    fn operation_failed(&mut self, failure: &OperationFailure) {
        self.failures.push(failure.clone());
    }
}

fn init_tracing(cli_level: Option<&str>) -> Result<()> {
    let level = cli_level
        .map(str::to_string)
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase();
    let log_level = match level.as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// Wait for the registry to confirm (or reject) the command just issued
fn await_confirmation(window: &mut SettingsWindow<LogObserver>) -> Result<()> {
    let handled = window.wait_and_pump(Duration::from_millis(CONFIRM_TIMEOUT_MS));
    if handled == 0 {
        warn!("No confirmation from rule registry before timeout");
    }
    if let Some(failure) = window
        .engine()
        .and_then(|engine| engine.observer().failures.first())
    {
        bail!("{failure}");
    }
    Ok(())
}

fn print_roster(window: &SettingsWindow<LogObserver>) {
    let Some(engine) = window.engine() else {
        return;
    };
    for (index, item) in engine.roster().iter().enumerate() {
        let marker = if item.matches(engine.selected()) { "*" } else { " " };
        let key = match item.key() {
            PaneKey::General => "general".to_string(),
            PaneKey::Rule(id) => id.to_string(),
        };
        println!("{marker} {index:>3}  {:<10} {key}", format!("{:?}", item.kind()));
    }
}

/// Build a placement from `--set` bounds, rejecting anything that would not save
fn placement_from_args(bounds: &[i32], show_state: ShowStateArg) -> Result<Placement> {
    let &[left, top, right, bottom] = bounds else {
        bail!("expected 4 bounds, got {}", bounds.len());
    };
    let requested = Placement::new(Rect::new(left, top, right, bottom), show_state.into());
    placement::encode(&requested).context("Invalid placement")?;
    Ok(requested)
}

#[cfg(unix)]
fn run_watch(
    window: &mut SettingsWindow<LogObserver>,
    registry: &FileRuleRegistry,
    runtime: &tokio::runtime::Runtime,
) -> Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use std::sync::atomic::{AtomicBool, Ordering};

    let stop = Arc::new(AtomicBool::new(false));
    let reload = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))
            .context("Failed to register shutdown signal handler")?;
    }
    signal_hook::flag::register(SIGHUP, Arc::clone(&reload))
        .context("Failed to register reload signal handler")?;

    info!("Watching rules (Ctrl+C to close, SIGHUP to reload)");
    while !stop.load(Ordering::Relaxed) {
        if reload.swap(false, Ordering::Relaxed) {
            if let Err(e) = runtime.block_on(registry.reload()) {
                warn!(error = %e, "Reload failed, keeping current rules");
            }
        }
        if window.wait_and_pump(Duration::from_millis(WATCH_POLL_MS)) > 0 {
            print_roster(window);
        }
    }
    info!("Shutdown requested");
    Ok(())
}

#[cfg(not(unix))]
fn run_watch(
    _window: &mut SettingsWindow<LogObserver>,
    _registry: &FileRuleRegistry,
    _runtime: &tokio::runtime::Runtime,
) -> Result<()> {
    bail!("watch is only supported on unix platforms")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let rules_path = cli.rules.unwrap_or_else(FileRuleRegistry::default_path);
    let settings_path = cli.settings.unwrap_or_else(FileSettingsStore::default_path);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let registry = Arc::new(
        FileRuleRegistry::open(&rules_path)
            .with_context(|| format!("Failed to open rules at {}", rules_path.display()))?,
    );
    let store = Arc::new(
        FileSettingsStore::open(&settings_path)
            .with_context(|| format!("Failed to open settings at {}", settings_path.display()))?,
    );

    let mut window = SettingsWindow::open(
        registry.clone(),
        store,
        runtime.handle().clone(),
        LogObserver::default(),
    );
    let mut placement = window.restored_placement();
    let shows_roster = !matches!(
        cli.command,
        Commands::Placement { .. } | Commands::Choices | Commands::Watch
    );

    let outcome = match cli.command {
        Commands::List => Ok(()),
        Commands::AddProcess { name } => {
            window.add_process_rule(&name);
            await_confirmation(&mut window)
        }
        Commands::AddClass { name } => {
            window.add_class_rule(&name);
            await_confirmation(&mut window)
        }
        Commands::Remove { id } => {
            if !window.select(PaneKey::Rule(id.clone())) {
                Err(anyhow::anyhow!("No rule '{id}'"))
            } else if !window.remove_selected_rule() {
                Err(anyhow::anyhow!("Rule '{id}' cannot be removed"))
            } else {
                await_confirmation(&mut window)
            }
        }
        Commands::Reload => runtime
            .block_on(registry.reload())
            .context("Failed to reload rules")
            .map(|_| {
                window.pump();
            }),
        Commands::Placement { set, show_state } => {
            if let Some(bounds) = set {
                placement = Some(placement_from_args(&bounds, show_state)?);
            }
            match placement {
                Some(p) => println!("{}", serde_json::to_string_pretty(&p)?),
                None => println!("no saved placement (platform default)"),
            }
            Ok(())
        }
        Commands::Watch => run_watch(&mut window, &registry, &runtime),
        Commands::Choices => {
            let lists = ChoiceLists::build(DisplayCapabilities::all());
            println!("{}", serde_json::to_string_pretty(&lists)?);
            Ok(())
        }
    };

    if shows_roster {
        print_roster(&window);
    }
    window.close(placement);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_from_args() {
        let placement = placement_from_args(&[0, 0, 800, 600], ShowStateArg::Maximized).unwrap();
        assert_eq!(placement.normal, Rect::new(0, 0, 800, 600));
        assert_eq!(placement.show_state, ShowState::Maximized);
    }

    #[test]
    fn test_inverted_placement_is_an_error() {
        assert!(placement_from_args(&[100, 0, 0, 10], ShowStateArg::Normal).is_err());
        assert!(placement_from_args(&[0, 0, 10], ShowStateArg::Normal).is_err());
    }
}
