use std::io::{self, Write};

use chrono::Local;
use log::{set_logger, set_max_level, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Installs the [`Logger`]. Records go to stderr so stdout only carries command output.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    set_logger(&Logger)?;
    set_max_level(level);
    Ok(())
}

#[derive(Copy, Clone, Debug)]
pub struct Logger;

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");

        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{}] {}", now, format_record(record));
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

fn format_record(record: &Record) -> String {
    let level = match record.level() {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };

    format!(
        "[{}:{}] [{}] {}",
        record.file().unwrap_or("???"),
        record.line().unwrap_or(0),
        level,
        record.args()
    )
}
