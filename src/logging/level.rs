use crate::error::{ForecourtError, Result};
use tracing::Level;

/// Parse a configured level name (case-insensitive, WARNING accepted)
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(ForecourtError::config(format!(
            "Invalid log level: {}",
            level_str
        ))),
    }
}

pub fn level_rank(level: Level) -> u8 {
    match level {
        Level::TRACE => 0,
        Level::DEBUG => 1,
        Level::INFO => 2,
        Level::WARN => 3,
        Level::ERROR => 4,
    }
}

/// The more verbose of two levels
pub fn min_level(a: Level, b: Level) -> Level {
    if level_rank(a) <= level_rank(b) { a } else { b }
}

/// Try to parse a level out of a formatted log line
pub fn parse_line_level(line: &str) -> Option<Level> {
    const LEVELS: [(&str, Level); 5] = [
        ("TRACE", Level::TRACE),
        ("DEBUG", Level::DEBUG),
        ("INFO", Level::INFO),
        ("WARN", Level::WARN),
        ("ERROR", Level::ERROR),
    ];

    let line = strip_ansi_codes(line);
    // JSON lines first: ... "level":"INFO" ...
    for (name, level) in LEVELS {
        if line.contains(&format!("\"level\":\"{}\"", name)) {
            return Some(level);
        }
    }
    // Plain lines: timestamp SPACE LEVEL SPACE ...
    for (name, level) in LEVELS {
        if line.contains(&format!(" {} ", name)) {
            return Some(level);
        }
    }
    None
}

fn strip_ansi_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}
