//! Log output for the portal binary.

use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::EnvFilter;

/// Dependencies that log every S3 or API round trip below `warn`.
const TRANSPORT_TARGETS: [&str; 4] = ["aws_config", "aws_smithy_runtime", "hyper_util", "reqwest"];

#[derive(Debug)]
pub enum TelemetryError {
    Filter { directive: String, source: ParseError },
    Install(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directive, .. } => {
                write!(f, "APP_LOG_LEVEL directive '{directive}' is not a valid filter")
            }
            TelemetryError::Install(err) => write!(f, "could not install logger: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(&**err),
        }
    }
}

/// Installs the global subscriber on stderr so stdout stays free for command output.
///
/// `RUST_LOG` is used verbatim when set; otherwise the configured level applies
/// with transport crates held at `warn`.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => portal_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}

fn portal_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let invalid = |source| TelemetryError::Filter {
        directive: level.to_string(),
        source,
    };
    let mut filter = EnvFilter::try_new(level).map_err(invalid)?;

    for target in TRANSPORT_TARGETS {
        if level.contains(target) {
            continue;
        }
        let directive: Directive = format!("{target}=warn").parse().map_err(invalid)?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}
