use std::env;
use std::num::ParseIntError;

#[derive(Debug, Clone)]
/// Application configuration loaded from environment variables.
pub struct Config {
    /// Port the HTTP/WebSocket server listens on.
    pub port: u16,
    /// Logging level (e.g., "info", "debug").
    pub rust_log: String,
}

#[derive(Debug)]
/// Errors that can occur during configuration loading.
pub enum ConfigError {
    /// A port value could not be parsed as a 16-bit integer.
    InvalidPort(String, ParseIntError),
    /// A port value was 0, which is logically invalid for this application.
    PortOutOfRange(u16),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort(val, err) => {
                write!(f, "PORT must be a valid port number (got '{}': {})", val, err)
            }
            ConfigError::PortOutOfRange(port) => {
                write!(f, "PORT must be between 1 and 65535 (got {})", port)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validates environment variables and returns a Config object
/// Returns an error if any variable is present but invalid
pub fn validate_env() -> Result<Config, ConfigError> {
    // Optional: PORT (defaults to 9000)
    let port_str = env::var("PORT").unwrap_or_else(|_| "9000".to_string());

    let port: u16 = port_str
        .parse()
        .map_err(|e| ConfigError::InvalidPort(port_str.clone(), e))?;

    if port == 0 {
        return Err(ConfigError::PortOutOfRange(port));
    }

    // Optional: RUST_LOG (defaults to "info")
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| {
        eprintln!("RUST_LOG not set, using default: info");
        "info".to_string()
    });

    Ok(Config { port, rust_log })
}
