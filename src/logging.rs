//! Structured logging and tracing for Forecourt
//!
//! Console and rolling-file output through `tracing-subscriber`, component
//! loggers that tag every line with `component=` (and the pump session when
//! known), and a broadcast copy of each formatted line for the live log
//! stream served by the web layer.

use crate::config::LoggingConfig;
use crate::error::{ForecourtError, Result};
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod broadcast;
mod level;
mod state;
mod structured;

pub use broadcast::subscribe_log_lines;
pub use level::{parse_line_level, parse_log_level};
pub use state::{get_web_log_level, set_web_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger};

use broadcast::{BroadcastMakeWriter, get_or_init_log_tx};
use level::{level_rank, min_level};
use state::{INIT_ERROR, INIT_ONCE, LOG_GUARD};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Environment variable that forces console-only logging
pub const DISABLE_FILE_LOG_ENV: &str = "FORECOURT_DISABLE_FILE_LOG";

/// Initialize logging system based on configuration
///
/// Safe to call more than once; only the first call installs the subscriber
/// and later calls report the outcome of that first attempt.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        if let Err(e) = install_subscriber(config) {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(ForecourtError::config(err.clone()));
    }
    Ok(())
}

fn install_subscriber(config: &LoggingConfig) -> Result<()> {
    let base_level = parse_log_level(&config.level)?;
    let override_or_base = |value: &Option<String>| {
        value
            .as_deref()
            .and_then(|s| parse_log_level(s).ok())
            .unwrap_or(base_level)
    };
    let console_level = override_or_base(&config.console_level);
    let file_level = override_or_base(&config.file_level);
    let web_level = override_or_base(&config.web_level);

    // The global filter admits the most verbose layer; layers narrow further
    let most_verbose = min_level(min_level(console_level, file_level), web_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("forecourt={}", most_verbose).into());

    let console_only = should_use_console_only();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if console_only || config.console_output {
        layers.push(fmt_layer(
            std::io::stdout,
            config.json_format,
            LevelFilter::from_level(console_level),
        ));
    }

    // Web stream always captures everything; the runtime level applies at send time
    layers.push(fmt_layer(
        BroadcastMakeWriter {
            tx: get_or_init_log_tx(),
        },
        config.json_format,
        LevelFilter::TRACE,
    ));

    if !console_only {
        let (dir, prefix, suffix) = log_file_parts(Path::new(&config.file));
        std::fs::create_dir_all(&dir)?;
        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(prefix)
            .filename_suffix(suffix)
            .max_log_files(config.backup_count.max(1) as usize)
            .build(&dir)
            .map_err(|e| ForecourtError::io(format!("Failed to create log file appender: {}", e)))?;
        let (writer, guard) = non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        layers.push(fmt_layer(
            writer,
            config.json_format,
            LevelFilter::from_level(file_level),
        ));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ForecourtError::config(format!("Failed to install subscriber: {}", e)))?;

    set_web_log_level(web_level);

    info!(
        "Logging initialized - console_level: {:?}, file_level: {:?}, web_level: {:?}, console_only: {}",
        console_level, file_level, web_level, console_only
    );
    Ok(())
}

fn fmt_layer<W>(writer: W, json: bool, level: LevelFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json {
        base.json().with_filter(level).boxed()
    } else {
        base.with_filter(level).boxed()
    }
}

/// Directory, prefix and suffix of the daily log files for `logging.file`
///
/// `/var/log/pump.log` rolls as `/var/log/pump.<date>.log`. A path without
/// an extension is taken as the directory for `forecourt.<date>.log`.
pub fn log_file_parts(configured: &Path) -> (PathBuf, String, String) {
    if configured.extension().is_none() {
        return (
            configured.to_path_buf(),
            "forecourt".to_string(),
            "log".to_string(),
        );
    }
    let dir = match configured.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stem = configured
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("forecourt")
        .to_string();
    let ext = configured
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("log")
        .to_string();
    (dir.to_path_buf(), stem, ext)
}

fn should_use_console_only() -> bool {
    cfg!(test) || std::env::var_os(DISABLE_FILE_LOG_ENV).is_some()
}

/// Helper to parse and set the web stream level from a string
pub fn set_web_log_level_str(level_str: &str) -> Result<()> {
    let lvl = parse_log_level(level_str)?;
    set_web_log_level(lvl);
    Ok(())
}

/// Whether a formatted line passes the current web stream level
pub fn should_emit_to_web(line: &str) -> bool {
    let current = get_web_log_level();
    match parse_line_level(line) {
        Some(line_lvl) => level_rank(line_lvl) >= level_rank(current),
        None => true,
    }
}

/// Level name as accepted by [`parse_log_level`]
pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARN",
        Level::ERROR => "ERROR",
    }
}
