extern crate clap;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use log::{debug, info};
use speed_lens::analytics::TimeWindow;
use speed_lens::diagnostics::diagnose;
use speed_lens::display::{
    render_diagnosis, render_history, render_result, render_summary, DisplayMode, TextProgress,
};
use speed_lens::engine::{ProbeConfig, ProbeEngine};
use speed_lens::errors::{exit_codes, format_error_for_display, SpeedLensError};
use speed_lens::export::{to_csv, to_json, ExportFormat};
use speed_lens::fallback::RandomFallback;
use speed_lens::history::FileStorage;
use speed_lens::probe::Client;
use speed_lens::progress::{NoProgress, ProgressCallback};
use speed_lens::results::ProbeResult;
use speed_lens::settings::{Settings, SpeedUnit};
use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SPEEDLENS_BUILD_GIT_HASH"),
    ")"
);

type Engine = ProbeEngine<Client, FileStorage, RandomFallback>;

#[derive(Parser)]
#[command(author, version = VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    probe: ProbeArgs,

    /// Directory holding history and settings
    #[arg(long, global = true, env = "SPEED_LENS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Args)]
struct ProbeArgs {
    /// Number of latency samples per cycle
    #[arg(long, global = true, default_value_t = 10)]
    pings: usize,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,

    /// Skip the pauses between samples and trials
    #[arg(long, global = true)]
    no_pause: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run one probe cycle (default unless auto test is on)
    Run {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run probe cycles repeatedly (default when auto test is on)
    Watch {
        /// Minutes between cycles, defaults to the stored setting
        #[arg(long)]
        interval: Option<u32>,

        /// Stop after this many cycles
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        count: Option<u64>,
    },
    /// Show or clear stored results
    History {
        #[arg(long)]
        clear: bool,

        /// Show at most this many results
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Summarize stored results over a time window
    Summary {
        /// One of 24h, 7d, 30d, 1y, all
        #[arg(long, default_value = "30d")]
        window: TimeWindow,

        #[arg(long)]
        json: bool,
    },
    /// Export stored results
    Export {
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Include an analytics summary over the whole history
        #[arg(long)]
        analytics: bool,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show or change settings
    Settings {
        /// Mbps, Kbps, Gbps or MBps
        #[arg(long)]
        unit: Option<SpeedUnit>,

        /// Minutes between cycles in watch mode
        #[arg(long)]
        interval: Option<u32>,

        #[arg(long)]
        notifications: Option<bool>,

        #[arg(long)]
        auto_test: Option<bool>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_error_for_display(&e).red());
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, SpeedLensError> {
    let engine = build_engine(&cli)?;
    let settings = engine.settings();
    let unit = settings.speed_unit;

    let default_command = if settings.auto_test {
        Command::Watch { interval: None, count: None }
    } else {
        Command::Run { json: false }
    };

    match cli.command.unwrap_or(default_command) {
        Command::Run { json } => {
            let mode = DisplayMode::detect(json, std::io::stdout().is_terminal());
            until_cancelled(run_once(&engine, mode, unit)).await
        }
        Command::Watch { interval, count } => {
            let mode = DisplayMode::detect(false, std::io::stdout().is_terminal());
            until_cancelled(watch(&engine, mode, interval, count)).await
        }
        Command::History { clear, limit, json } => {
            if clear {
                engine.clear_history()?;
                println!("History cleared.");
                return Ok(exit_codes::SUCCESS);
            }

            let shown = newest(engine.history(), limit);
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                print!("{}", render_history(&shown, unit));
            }
            Ok(exit_codes::SUCCESS)
        }
        Command::Summary { window, json } => {
            let summary = engine.summary(window, &chrono::Local::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", render_summary(&summary, window, unit));
            }
            Ok(exit_codes::SUCCESS)
        }
        Command::Export { format, analytics, output } => {
            export(&engine, format, analytics, output)?;
            Ok(exit_codes::SUCCESS)
        }
        Command::Settings { unit, interval, notifications, auto_test } => {
            let mut settings = engine.settings();
            let changed =
                unit.is_some() || interval.is_some() || notifications.is_some() || auto_test.is_some();

            if let Some(unit) = unit {
                settings.speed_unit = unit;
            }
            if let Some(interval) = interval {
                settings.auto_test_interval_minutes = interval;
            }
            if let Some(notifications) = notifications {
                settings.notifications = notifications;
            }
            if let Some(auto_test) = auto_test {
                settings.auto_test = auto_test;
            }

            if changed {
                engine.update_settings(settings.clone())?;
                info!("Settings saved");
            }
            print_settings(&settings);
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn build_engine(cli: &Cli) -> Result<Engine, SpeedLensError> {
    let mut config = ProbeConfig {
        ping_samples: cli.probe.pings,
        request_timeout: Duration::from_secs(cli.probe.timeout),
        ..ProbeConfig::default()
    };
    if cli.probe.no_pause {
        config = config.without_pauses();
    }

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    debug!("Using data directory {}", data_dir.display());

    let client = Client::new(config.request_timeout)?;
    let storage = FileStorage::new(data_dir)?;

    ProbeEngine::new(config, client, storage, RandomFallback)
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".speed-lens"))
        .unwrap_or_else(|| PathBuf::from(".speed-lens"))
}

/// Run `operation` until it finishes or Ctrl-C arrives.
async fn until_cancelled<F>(operation: F) -> Result<i32, SpeedLensError>
where
    F: Future<Output = Result<i32, SpeedLensError>>,
{
    tokio::select! {
        outcome = operation => outcome,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("\n{}", "Test stopped".yellow().bold());
            Ok(exit_codes::CANCELLED)
        }
    }
}

async fn cycle(engine: &Engine, mode: DisplayMode) -> Result<Option<ProbeResult>, SpeedLensError> {
    let progress: &dyn ProgressCallback =
        if mode.shows_progress() { &TextProgress } else { &NoProgress };

    engine.run_cycle(progress).await
}

async fn run_once(engine: &Engine, mode: DisplayMode, unit: SpeedUnit) -> Result<i32, SpeedLensError> {
    let Some(result) = cycle(engine, mode).await? else {
        return Ok(exit_codes::SUCCESS);
    };

    print_result(&result, mode, unit)?;
    Ok(exit_codes::SUCCESS)
}

async fn watch(
    engine: &Engine,
    mode: DisplayMode,
    interval: Option<u32>,
    count: Option<u64>,
) -> Result<i32, SpeedLensError> {
    let settings = engine.settings();
    let minutes = interval.unwrap_or(settings.auto_test_interval_minutes);
    if minutes == 0 {
        return Err(SpeedLensError::config("watch interval must be at least one minute"));
    }
    let pause = Duration::from_secs(u64::from(minutes) * 60);

    let mut completed: u64 = 0;
    loop {
        if let Some(result) = cycle(engine, mode).await? {
            print_result(&result, mode, settings.speed_unit)?;
            if settings.notifications {
                notify(&result);
            }
        }

        completed += 1;
        if count.is_some_and(|count| completed >= count) {
            return Ok(exit_codes::SUCCESS);
        }

        info!("Next cycle in {} minute(s)", minutes);
        tokio::time::sleep(pause).await;
    }
}

fn print_result(result: &ProbeResult, mode: DisplayMode, unit: SpeedUnit) -> Result<(), SpeedLensError> {
    let diagnosis = diagnose(result);

    match mode {
        DisplayMode::Json => {
            let output = serde_json::json!({
                "result": result,
                "diagnosis": diagnosis,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        DisplayMode::Text | DisplayMode::Silent => {
            println!();
            print!("{}", render_result(result, unit));
            println!();
            print!("{}", render_diagnosis(&diagnosis));
        }
    }

    Ok(())
}

fn notify(result: &ProbeResult) {
    let issues = diagnose(result).issues;
    if issues.is_empty() {
        return;
    }

    eprintln!("{}", "Connection issues detected:".yellow().bold());
    for issue in issues {
        eprintln!("  {}", issue.message);
    }
}

fn export(
    engine: &Engine,
    format: ExportFormat,
    analytics: bool,
    output: Option<PathBuf>,
) -> Result<(), SpeedLensError> {
    let history = engine.history();
    let summary = analytics.then(|| engine.summary(TimeWindow::All, &chrono::Local::now()));

    let document = match format {
        ExportFormat::Csv => to_csv(&history, summary.as_ref()),
        ExportFormat::Json => to_json(&history, summary.as_ref(), chrono::Utc::now())?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, document)?;
            eprintln!("Exported {} result(s) to {}", history.len(), path.display());
        }
        None => print!("{}", document),
    }

    Ok(())
}

/// The first `limit` results of a newest-first history, or all of them.
fn newest(mut history: Vec<ProbeResult>, limit: Option<usize>) -> Vec<ProbeResult> {
    if let Some(limit) = limit {
        history.truncate(limit);
    }
    history
}

fn print_settings(settings: &Settings) {
    println!("{:<22} {}", "Speed unit:".bold().white(), settings.speed_unit);
    println!("{:<22} {}", "Notifications:".bold().white(), settings.notifications);
    println!("{:<22} {}", "Auto test:".bold().white(), settings.auto_test);
    println!(
        "{:<22} {} min",
        "Auto test interval:".bold().white(),
        settings.auto_test_interval_minutes
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use speed_lens::measurements::Estimates;
    use speed_lens::scoring::ScoreCard;

    fn result(download: f64) -> ProbeResult {
        let estimates = Estimates {
            ping_ms: 20.0,
            jitter_ms: 2.0,
            packet_loss_percent: 0.0,
            download_mbps: download,
            upload_mbps: 10.0,
        };
        let scores = ScoreCard { signal_quality: 100.0, consistency: 100.0 };
        ProbeResult::new(chrono::Utc::now(), &estimates, &scores)
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watch_count_must_be_positive() {
        assert!(Cli::try_parse_from(["speed-lens", "watch", "--count", "0"]).is_err());

        let cli = Cli::try_parse_from(["speed-lens", "watch", "--count", "2"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Watch { count: Some(2), .. })));
    }

    #[test]
    fn test_history_limit() {
        let history = vec![result(3.0), result(2.0), result(1.0)];

        assert_eq!(newest(history.clone(), None).len(), 3);
        assert_eq!(newest(history.clone(), Some(10)).len(), 3);
        assert_eq!(newest(history.clone(), Some(0)).len(), 0);

        let shown = newest(history, Some(2));
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].download_speed(), 3.0);
    }
}
