use std::error::Error;
use std::fs::File;
use std::path::Path;

use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};

/// Installs the global logger. Without a log file `RUST_LOG` drives `env_logger`; with one,
/// info goes to the terminal and everything down to debug goes to the file.
pub fn init(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match log_file {
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .format_timestamp_millis()
                .try_init()?;
        }
        Some(path) => {
            let file = File::create(path)?;
            CombinedLogger::init(vec![
                TermLogger::new(
                    LevelFilter::Info,
                    Config::default(),
                    TerminalMode::Mixed,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(LevelFilter::Debug, Config::default(), file),
            ])?;
            log::debug!(target: "pregen", "logging to {}", path.display());
        }
    }
    Ok(())
}
