//! Connection options.

use crate::protocol::{charset, CapabilityFlags};
use crate::tls::TlsSettings;

/// Transport security for the connection.
#[derive(Debug, Clone, Default)]
pub enum Transport {
    /// Plain TCP or socket stream, no TLS upgrade.
    #[default]
    Cleartext,
    /// Upgrade to TLS mid-handshake, before credentials are sent.
    Tls(TlsSettings),
}

/// Credentials and knobs for one connection attempt.
///
/// Built fluently and handed to the connection handler, after which it is
/// never mutated:
///
/// ```
/// use mysql_handshake::ConnectOptions;
///
/// let options = ConnectOptions::new("app_user")
///     .password("s3cret")
///     .database("inventory");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub(crate) username: String,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) charset: u8,
    pub(crate) max_packet_size: u32,
    pub(crate) capabilities: CapabilityFlags,
    pub(crate) transport: Transport,
}

impl ConnectOptions {
    /// Capability flags requested when none are configured explicitly.
    pub const DEFAULT_CAPABILITIES: CapabilityFlags = CapabilityFlags::LONG_PASSWORD
        .union(CapabilityFlags::PROTOCOL_41)
        .union(CapabilityFlags::TRANSACTIONS)
        .union(CapabilityFlags::SECURE_CONNECTION)
        .union(CapabilityFlags::PLUGIN_AUTH);

    /// Options for the given user with library defaults: utf8mb4, 1024-byte
    /// max packet size, cleartext transport, [`Self::DEFAULT_CAPABILITIES`].
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            database: None,
            charset: charset::DEFAULT_CHARSET,
            max_packet_size: 1024,
            capabilities: Self::DEFAULT_CAPABILITIES,
            transport: Transport::Cleartext,
        }
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database to select on connect.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the connection character set.
    #[must_use]
    pub fn charset(mut self, charset: u8) -> Self {
        self.charset = charset;
        self
    }

    /// Set the maximum packet size advertised to the server.
    #[must_use]
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Set the desired capability flags, replacing the defaults.
    ///
    /// The set is sent to the server as-is (modulo the database and TLS
    /// additions below); requesting a capability this client does not
    /// implement fails the handshake with a configuration error before
    /// anything is sent.
    #[must_use]
    pub fn capabilities(mut self, capabilities: CapabilityFlags) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Request a TLS upgrade during the handshake.
    #[must_use]
    pub fn tls(mut self, settings: TlsSettings) -> Self {
        self.transport = Transport::Tls(settings);
        self
    }

    /// Set the transport directly.
    #[must_use]
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether a TLS upgrade is requested.
    pub fn wants_tls(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    /// Capability flags this client asks for: the configured set, plus
    /// `CONNECT_WITH_DB` when a database is set. `SSL` is inserted by the
    /// handler at upgrade time.
    pub fn capability_flags(&self) -> CapabilityFlags {
        let mut flags = self.capabilities;
        if self.database.is_some() {
            flags |= CapabilityFlags::CONNECT_WITH_DB;
        }
        flags
    }
}
