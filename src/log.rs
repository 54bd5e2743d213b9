// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::fs::File;

use simplelog::{Config, LevelFilter, SimpleLogger, WriteLogger};

#[used]
#[cfg_attr(target_os = "linux", unsafe(link_section = ".init_array"))]
pub static INITIALIZE: extern "C" fn() = softmech_log_init;

fn level_from_env(value: Option<&str>) -> LevelFilter {
    match value {
        None => LevelFilter::Error,
        Some(l) => match l {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Trace,
        },
    }
}

/// Initializes a simple logger for tracing purposes based on the values of
/// the environment variable SOFTMECH_TRACE:
/// - stdout -> logs to standard output
/// - file -> any other value is interpreted as a file name to log into
/// - NOT PRESENT -> No tracing is initialized
///
/// If the logger initialization encounters an error, (for example the log
/// file can't be opened) no tracing is available and no error is reported.
///
/// The log level is selected with SOFTMECH_TRACE_LEVEL and defaults to
/// LevelFilter::Error. Valid values are: off, error, warn, info, debug,
/// trace. Any incorrect value triggers LevelFilter::Trace
#[unsafe(no_mangle)]
pub extern "C" fn softmech_log_init() {
    let level_var = std::env::var("SOFTMECH_TRACE_LEVEL").ok();
    let level = level_from_env(level_var.as_deref());
    match std::env::var("SOFTMECH_TRACE") {
        Err(_) => return,
        Ok(t) => match t.as_str() {
            "stdout" => {
                let _ = SimpleLogger::init(level, Config::default());
            }
            file_name => {
                let file = match File::create(file_name) {
                    Ok(w) => w,
                    Err(_) => return,
                };
                let _ = WriteLogger::init(level, Config::default(), file);
            }
        },
    }
}

#[test]
pub fn test_init() {
    softmech_log_init();
    assert_eq!(level_from_env(None), LevelFilter::Error);
    assert_eq!(level_from_env(Some("warn")), LevelFilter::Warn);
    assert_eq!(level_from_env(Some("bogus")), LevelFilter::Trace);
}
