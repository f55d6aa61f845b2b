//! Logger setup: coloured console plus a plain-text file sink

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::path::Path;

/// Noisy dependencies are capped at WARN regardless of verbosity
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "sqlx", "rustls", "mio"];

fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the global logger. `log_file`'s parent directory is created if needed.
pub fn init(verbose: bool, log_file: &Path) -> Result<(), fern::InitError> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Cyan)
        .trace(Color::BrightBlack);

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {:<5} {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .level(console_level(verbose))
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Debug)
        .chain(fern::log_file(log_file)?);

    let mut root = fern::Dispatch::new().level(LevelFilter::Debug);
    for target in QUIET_TARGETS {
        root = root.level_for(*target, LevelFilter::Warn);
    }

    root.chain(console).chain(file).apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(false), LevelFilter::Info);
        assert_eq!(console_level(true), LevelFilter::Debug);
    }
}
