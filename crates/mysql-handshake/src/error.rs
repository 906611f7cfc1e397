//! Error types for connection establishment.
//!
//! Every handshake-phase failure resolves the connection's single ready
//! signal with one of these; there is no retry logic here and no fatal
//! pathway. Retry policy belongs to the caller.

use std::fmt;

use crate::protocol::ErrPacket;

/// The primary error type for connection establishment.
#[derive(Debug)]
pub enum Error {
    /// Client-side configuration rejected (unsupported capability request,
    /// missing password, field/flag mismatch in the handshake response)
    Config(ConfigError),
    /// Wire-level violation (short salt, legacy auth protocol, unexpected
    /// packet for the current phase, malformed payload)
    Protocol(ProtocolError),
    /// Operation refused on security grounds
    Security(SecurityError),
    /// Server requested an authentication plugin this client does not speak
    UnsupportedPlugin(String),
    /// The server reported an error packet
    Server(ServerError),
    /// Write or TLS-negotiation failure in the underlying transport
    Transport(TransportError),
    /// Connection torn down while an operation was pending
    ConnectionClosed,
}

/// Client-side configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

/// Wire-level protocol error.
#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
}

/// An operation refused on security grounds.
///
/// Carries the cause plus concrete remedies, so the rendered message tells
/// the operator what happened and what to change.
#[derive(Debug)]
pub struct SecurityError {
    pub reason: String,
    pub possible_causes: Vec<String>,
    pub suggested_fixes: Vec<String>,
}

/// A server-reported error, built from an ERR packet.
#[derive(Debug)]
pub struct ServerError {
    pub code: u16,
    pub sql_state: String,
    pub message: String,
}

/// A transport-level failure.
#[derive(Debug)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// A packet write failed or could not be flushed
    Write,
    /// TLS session negotiation or activation failed
    Tls,
}

impl TransportError {
    /// Write failure with a plain message.
    pub fn write(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Write,
            message: message.into(),
            source: None,
        }
    }

    /// TLS failure with a plain message.
    pub fn tls(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Tls,
            message: message.into(),
            source: None,
        }
    }
}

impl Error {
    /// Shorthand for a `ConfigError`.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
        })
    }

    /// Shorthand for a `ProtocolError`.
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
        })
    }
}

impl From<&ErrPacket> for ServerError {
    fn from(err: &ErrPacket) -> Self {
        Self {
            code: err.error_code,
            sql_state: err.sql_state.clone(),
            message: err.error_message.clone(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Security(e) => write!(f, "Security error: {}", e),
            Error::UnsupportedPlugin(plugin) => {
                write!(f, "Unsupported auth plugin: '{}'", plugin)
            }
            Error::Server(e) => {
                if e.sql_state.is_empty() {
                    write!(f, "Server error {}: {}", e.code, e.message)
                } else {
                    write!(
                        f,
                        "Server error {} (SQLSTATE {}): {}",
                        e.code, e.sql_state, e.message
                    )
                }
            }
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::ConnectionClosed => write!(f, "Connection closed while operation pending"),
        }
    }
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if !self.possible_causes.is_empty() {
            write!(f, " Possible causes: {}", self.possible_causes.join("; "))?;
        }
        if !self.suggested_fixes.is_empty() {
            write!(f, " Suggested fixes: {}", self.suggested_fixes.join("; "))?;
        }
        Ok(())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportErrorKind::Write => write!(f, "write failed: {}", self.message),
            TransportErrorKind::Tls => write!(f, "TLS failure: {}", self.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Transport(err)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: TransportErrorKind::Write,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Result type alias for connection establishment.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_from_err_packet() {
        let packet = ErrPacket {
            error_code: 1045,
            sql_state: "28000".to_string(),
            error_message: "Access denied".to_string(),
        };
        let err = Error::Server(ServerError::from(&packet));
        let rendered = err.to_string();
        assert!(rendered.contains("1045"));
        assert!(rendered.contains("28000"));
        assert!(rendered.contains("Access denied"));
    }

    #[test]
    fn security_error_enumerates_remedies() {
        let err = Error::Security(SecurityError {
            reason: "Full authentication not supported over insecure connections.".to_string(),
            possible_causes: vec!["caching_sha2_password over cleartext".to_string()],
            suggested_fixes: vec!["enable TLS".to_string(), "use mysql_native_password".to_string()],
        });
        let rendered = err.to_string();
        assert!(rendered.contains("insecure"));
        assert!(rendered.contains("enable TLS"));
        assert!(rendered.contains("mysql_native_password"));
    }

    #[test]
    fn transport_error_carries_io_source() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::from(TransportError::from(io));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("pipe closed"));
    }
}
