//! TLS upgrade support for the handshake.
//!
//! The upgrade is opportunistic and mid-handshake: after the greeting, the
//! client sends the 32-byte SSLRequest payload, switches the live stream to
//! TLS, and only then sends its full handshake response. [`TlsSettings`] is
//! always compiled so `ConnectOptions` can carry it; the rustls pieces
//! ([`build_client_config`], [`TlsStream`]) sit behind the `tls` feature:
//!
//! ```toml
//! [dependencies]
//! mysql-handshake = { version = "0.1", features = ["tls"] }
//! ```

use std::path::PathBuf;

use crate::error::{Error, TransportError};

#[cfg(feature = "tls")]
use std::io::{Read, Write};
#[cfg(feature = "tls")]
use std::sync::Arc;

/// TLS settings for the mid-handshake upgrade.
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    /// Server name for SNI and certificate verification, overriding the
    /// connection hostname
    pub server_name: Option<String>,
    /// Custom CA certificate bundle (PEM); webpki roots are used when unset
    pub ca_cert_path: Option<PathBuf>,
    /// Client certificate for mutual TLS (PEM)
    pub client_cert_path: Option<PathBuf>,
    /// Private key for the client certificate (PEM)
    pub client_key_path: Option<PathBuf>,
    /// Skip all server certificate verification. Insecure; intended for
    /// self-signed development servers only.
    pub danger_skip_verify: bool,
}

impl TlsSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SNI server name.
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Use a custom CA certificate bundle.
    #[must_use]
    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Present a client certificate.
    #[must_use]
    pub fn client_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_cert_path = Some(path.into());
        self
    }

    /// Private key for the client certificate.
    #[must_use]
    pub fn client_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_key_path = Some(path.into());
        self
    }

    /// Disable server certificate verification.
    #[must_use]
    pub fn skip_verify(mut self, skip: bool) -> Self {
        self.danger_skip_verify = skip;
        self
    }
}

/// Check a settings value for internal consistency.
pub fn validate_tls_settings(settings: &TlsSettings) -> Result<(), Error> {
    if settings.client_cert_path.is_some() && settings.client_key_path.is_none() {
        return Err(tls_error(
            "Client certificate provided without client key. \
             Both must be set for mutual TLS.",
        ));
    }
    Ok(())
}

/// A TLS-related transport error.
fn tls_error(message: impl Into<String>) -> Error {
    Error::Transport(TransportError::tls(message))
}

/// Stream wrapper running the rustls state machine over any blocking stream.
///
/// A `PacketChannel::begin_tls` implementation swaps its plain stream for
/// one of these; `Read`/`Write` then transparently encrypt.
#[cfg(feature = "tls")]
pub struct TlsStream<S: Read + Write> {
    conn: rustls::ClientConnection,
    stream: S,
}

#[cfg(feature = "tls")]
impl<S: Read + Write> std::fmt::Debug for TlsStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsStream")
            .field("protocol_version", &self.conn.protocol_version())
            .field("is_handshaking", &self.conn.is_handshaking())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "tls")]
impl<S: Read + Write> TlsStream<S> {
    /// Wrap a connected stream and drive the TLS handshake to completion.
    ///
    /// `server_name` is used for SNI and certificate verification unless the
    /// settings override it.
    pub fn new(mut stream: S, settings: &TlsSettings, server_name: &str) -> Result<Self, Error> {
        let config = build_client_config(settings)?;

        let sni_name = settings.server_name.as_deref().unwrap_or(server_name);
        let server_name = sni_name
            .to_string()
            .try_into()
            .map_err(|e| tls_error(format!("Invalid server name '{sni_name}': {e}")))?;

        let mut conn = rustls::ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| tls_error(format!("Failed to create TLS connection: {e}")))?;

        // Drive the handshake synchronously until complete
        while conn.is_handshaking() {
            while conn.wants_write() {
                conn.write_tls(&mut stream)
                    .map_err(|e| tls_error(format!("TLS handshake write error: {e}")))?;
            }

            if conn.wants_read() {
                conn.read_tls(&mut stream)
                    .map_err(|e| tls_error(format!("TLS handshake read error: {e}")))?;
                conn.process_new_packets()
                    .map_err(|e| tls_error(format!("TLS handshake error: {e}")))?;
            }
        }

        Ok(TlsStream { conn, stream })
    }

    /// Negotiated protocol version.
    pub fn protocol_version(&self) -> Option<rustls::ProtocolVersion> {
        self.conn.protocol_version()
    }

    /// Negotiated cipher suite.
    pub fn negotiated_cipher_suite(&self) -> Option<rustls::SupportedCipherSuite> {
        self.conn.negotiated_cipher_suite()
    }
}

#[cfg(feature = "tls")]
impl<S: Read + Write> Read for TlsStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            match self.conn.reader().read(buf) {
                Ok(n) if n > 0 => return Ok(n),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            if self.conn.wants_read() {
                let n = self.conn.read_tls(&mut self.stream)?;
                if n == 0 {
                    return Ok(0); // EOF
                }
                self.conn
                    .process_new_packets()
                    .map_err(|e| std::io::Error::other(format!("TLS error: {e}")))?;
            } else {
                return Ok(0);
            }
        }
    }
}

#[cfg(feature = "tls")]
impl<S: Read + Write> Write for TlsStream<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.conn.writer().write(buf)?;
        while self.conn.wants_write() {
            self.conn.write_tls(&mut self.stream)?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.conn.writer().flush()?;
        while self.conn.wants_write() {
            self.conn.write_tls(&mut self.stream)?;
        }
        self.stream.flush()
    }
}

/// Build a rustls `ClientConfig` from the settings.
///
/// Verification source in priority order: none when `danger_skip_verify`,
/// the custom CA bundle when one is configured, webpki roots otherwise.
#[cfg(feature = "tls")]
pub fn build_client_config(settings: &TlsSettings) -> Result<rustls::ClientConfig, Error> {
    validate_tls_settings(settings)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());

    if settings.danger_skip_verify {
        build_no_verify_config(&provider)
    } else if let Some(ca_path) = &settings.ca_cert_path {
        build_custom_ca_config(&provider, settings, ca_path)
    } else {
        build_webpki_config(&provider, settings)
    }
}

/// Build a config that accepts any server certificate.
#[cfg(feature = "tls")]
fn build_no_verify_config(
    provider: &Arc<rustls::crypto::CryptoProvider>,
) -> Result<rustls::ClientConfig, Error> {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error as RustlsError, SignatureScheme};

    /// A certificate verifier that accepts any certificate (insecure!).
    #[derive(Debug)]
    struct NoVerifier;

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, RustlsError> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, RustlsError> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, RustlsError> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ECDSA_NISTP521_SHA512,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::ED25519,
            ]
        }
    }

    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .map_err(|e| tls_error(format!("Failed to set TLS versions: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier))
        .with_no_client_auth();

    Ok(config)
}

/// Build a config using the webpki-roots CA bundle.
#[cfg(feature = "tls")]
fn build_webpki_config(
    provider: &Arc<rustls::crypto::CryptoProvider>,
    settings: &TlsSettings,
) -> Result<rustls::ClientConfig, Error> {
    use rustls::RootCertStore;

    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .map_err(|e| tls_error(format!("Failed to set TLS versions: {e}")))?
        .with_root_certificates(root_store);

    add_client_auth(builder, settings)
}

/// Build a config trusting a custom CA bundle.
#[cfg(feature = "tls")]
fn build_custom_ca_config(
    provider: &Arc<rustls::crypto::CryptoProvider>,
    settings: &TlsSettings,
    ca_path: &std::path::Path,
) -> Result<rustls::ClientConfig, Error> {
    use rustls::RootCertStore;
    use std::fs::File;
    use std::io::BufReader;

    let ca_file = File::open(ca_path).map_err(|e| {
        tls_error(format!(
            "Failed to open CA certificate '{}': {e}",
            ca_path.display()
        ))
    })?;
    let mut reader = BufReader::new(ca_file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(format!("Failed to parse CA certificate: {e}")))?;

    if certs.is_empty() {
        return Err(tls_error(format!(
            "No certificates found in CA file '{}'",
            ca_path.display()
        )));
    }

    let mut root_store = RootCertStore::empty();
    for cert in certs {
        root_store
            .add(cert)
            .map_err(|e| tls_error(format!("Failed to add CA certificate: {e}")))?;
    }

    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .map_err(|e| tls_error(format!("Failed to set TLS versions: {e}")))?
        .with_root_certificates(root_store);

    add_client_auth(builder, settings)
}

/// Attach the client certificate when one is configured.
#[cfg(feature = "tls")]
fn add_client_auth(
    builder: rustls::ConfigBuilder<rustls::ClientConfig, rustls::client::WantsClientCert>,
    settings: &TlsSettings,
) -> Result<rustls::ClientConfig, Error> {
    use std::fs::File;
    use std::io::BufReader;

    if let (Some(cert_path), Some(key_path)) =
        (&settings.client_cert_path, &settings.client_key_path)
    {
        let cert_file = File::open(cert_path).map_err(|e| {
            tls_error(format!(
                "Failed to open client cert '{}': {e}",
                cert_path.display()
            ))
        })?;
        let mut cert_reader = BufReader::new(cert_file);

        let certs = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| tls_error(format!("Failed to parse client certificate: {e}")))?;

        if certs.is_empty() {
            return Err(tls_error(format!(
                "No certificates found in client cert file '{}'",
                cert_path.display()
            )));
        }

        let key_file = File::open(key_path).map_err(|e| {
            tls_error(format!(
                "Failed to open client key '{}': {e}",
                key_path.display()
            ))
        })?;
        let mut key_reader = BufReader::new(key_file);

        let key = rustls_pemfile::private_key(&mut key_reader)
            .map_err(|e| tls_error(format!("Failed to parse client key: {e}")))?
            .ok_or_else(|| {
                tls_error(format!("No private key found in '{}'", key_path.display()))
            })?;

        builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| tls_error(format!("Failed to configure client auth: {e}")))
    } else {
        Ok(builder.with_no_client_auth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    #[test]
    fn default_settings_validate() {
        assert!(validate_tls_settings(&TlsSettings::new()).is_ok());
    }

    #[test]
    fn client_cert_without_key_is_rejected() {
        let settings = TlsSettings::new().client_cert("/path/to/client.pem");
        let err = validate_tls_settings(&settings).unwrap_err();
        match err {
            Error::Transport(t) => assert_eq!(t.kind, TransportErrorKind::Tls),
            other => panic!("expected Transport error, got {other:?}"),
        }
    }

    #[test]
    fn client_cert_with_key_validates() {
        let settings = TlsSettings::new()
            .client_cert("/path/to/client.pem")
            .client_key("/path/to/client-key.pem");
        assert!(validate_tls_settings(&settings).is_ok());
    }

    #[cfg(feature = "tls")]
    #[test]
    fn no_verify_config_builds() {
        let settings = TlsSettings::new().skip_verify(true);
        assert!(build_client_config(&settings).is_ok());
    }

    #[cfg(feature = "tls")]
    #[test]
    fn webpki_config_builds() {
        assert!(build_client_config(&TlsSettings::new()).is_ok());
    }

    #[cfg(feature = "tls")]
    #[test]
    fn missing_ca_file_fails() {
        let settings = TlsSettings::new().ca_cert("/nonexistent/ca.pem");
        assert!(build_client_config(&settings).is_err());
    }
}
