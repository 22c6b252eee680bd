use colored::Colorize;
use log::{Level, LevelFilter};
use std::sync::OnceLock;

#[derive(Clone)]
pub struct Logger {
  level: Level,
}

impl Logger {
  pub fn new(level: Level) -> Self {
    Logger { level }
  }

  fn format(&self, record: &log::Record) -> String {
    let time = chrono::Local::now()
      .format("%Y-%m-%d %H:%M:%S%.3f")
      .to_string()
      .magenta();

    let level = match record.level() {
      Level::Error => "ERROR".red(),
      Level::Warn => "WARN".yellow(),
      Level::Info => "INFO".green(),
      Level::Debug => "DEBUG".blue(),
      Level::Trace => "TRACE".dimmed(),
    };

    let prefix = match (record.file(), record.line()) {
      (Some(file), Some(line)) => format!("{}:{} ", file, line).cyan(),
      _ => String::new().normal(),
    };

    format!("{}{} {} {}", prefix, time, level, record.args())
  }
}

impl log::Log for Logger {
  fn enabled(&self, metadata: &log::Metadata) -> bool {
    metadata.level() <= self.level
  }

  fn log(&self, record: &log::Record) {
    if !self.enabled(record.metadata()) {
      return;
    }

    // Errors go to stderr so they stay visible when stdout is piped
    if record.level() == Level::Error {
      eprintln!("{}", self.format(record));
    } else {
      println!("{}", self.format(record));
    }
  }

  fn flush(&self) {}
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

pub fn init_logger() {
  init_logger_with_level(Level::Info);
}

/// Installs the global logger once. Later calls, whatever their level, are ignored.
pub fn init_logger_with_level(level: Level) {
  if LOGGER.get().is_some() {
    return;
  }

  let logger = LOGGER.get_or_init(|| Logger::new(level));

  // Another logger may already be installed by the host application
  if log::set_logger(logger).is_ok() {
    log::set_max_level(level.to_level_filter());
  }
}

pub fn max_level() -> LevelFilter {
  log::max_level()
}
