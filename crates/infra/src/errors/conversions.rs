//! Conversions from external infrastructure errors into domain errors.

use relaygate_domain::GatewayError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub GatewayError);

impl From<InfraError> for GatewayError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<GatewayError> for InfraError {
    fn from(value: GatewayError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoGatewayError {
    fn into_gateway(self) -> GatewayError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → GatewayError */
/* -------------------------------------------------------------------------- */

impl IntoGatewayError for HttpError {
    fn into_gateway(self) -> GatewayError {
        if self.is_timeout() {
            return GatewayError::Timeout("HTTP request timed out".into());
        }

        if self.is_connect() {
            return GatewayError::Network(format!("HTTP connection failure: {}", root_cause(&self)));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            return GatewayError::Upstream {
                status: code,
                message: status.canonical_reason().unwrap_or("unknown status").to_string(),
            };
        }

        if self.is_decode() {
            return GatewayError::Parse(format!("undecodable response body: {}", root_cause(&self)));
        }

        if self.is_builder() {
            return GatewayError::Config(format!("invalid HTTP request: {self}"));
        }

        GatewayError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_gateway())
    }
}

/* -------------------------------------------------------------------------- */
/* Config file errors → GatewayError */
/* -------------------------------------------------------------------------- */

impl IntoGatewayError for toml::de::Error {
    fn into_gateway(self) -> GatewayError {
        GatewayError::Config(format!("Invalid TOML format: {}", self.message()))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        Self(value.into_gateway())
    }
}

impl IntoGatewayError for std::io::Error {
    fn into_gateway(self) -> GatewayError {
        GatewayError::Config(format!("Failed to read config file: {self}"))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        Self(value.into_gateway())
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
