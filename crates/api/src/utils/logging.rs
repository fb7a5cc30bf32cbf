use relaygate_domain::GatewayError;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,relaygate=debug";

/// Set to `json` for one JSON object per log line
pub const LOG_FORMAT_ENV: &str = "RELAYGATE_LOG_FORMAT";

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. Calling it
/// twice leaves the first subscriber in place.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if json { builder.json().try_init() } else { builder.try_init() };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Convert a `GatewayError` into a stable label suitable for logging.
#[inline]
pub const fn error_label(error: &GatewayError) -> &'static str {
    match error {
        GatewayError::Config(_) => "config",
        GatewayError::Network(_) => "network",
        GatewayError::Timeout(_) => "timeout",
        GatewayError::Upstream { .. } => "upstream",
        GatewayError::Parse(_) => "parse",
        GatewayError::Unavailable(_) => "unavailable",
        GatewayError::InvalidInput(_) => "invalid_input",
        GatewayError::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(error_label(&GatewayError::InvalidInput("x".into())), "invalid_input");
        assert_eq!(
            error_label(&GatewayError::Upstream { status: 502, message: "Bad Gateway".into() }),
            "upstream"
        );
    }
}
