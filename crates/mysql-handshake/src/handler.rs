//! Connection handshake state machine.
//!
//! [`ConnectionHandler`] owns one connection attempt: it consumes decoded
//! [`ServerPacket`]s in arrival order, drives authentication (including the
//! mid-handshake TLS upgrade) through its [`PacketChannel`], and resolves
//! the ready signal exactly once. After the handshake it can mediate
//! caller-defined packet exchanges via [`ConnectionHandler::begin_exchange`].

use std::mem;

use crate::auth::{self, plugins};
use crate::channel::{ClientPacket, PacketChannel, ServerPacket};
use crate::error::{Error, Result, SecurityError};
use crate::options::{ConnectOptions, Transport};
use crate::protocol::{CapabilityFlags, HandshakeResponse, ServerHandshake, SslRequest};
use crate::signal::{self, Completion, Resolver};

/// Decides when a mid-connection exchange is complete.
///
/// Returns `Ok(true)` when the exchange is done, `Ok(false)` to keep
/// consuming packets, or `Err` to fail the exchange.
pub type ExchangePredicate = Box<dyn FnMut(&ServerPacket) -> Result<bool> + Send>;

/// The lifecycle phase of the connection.
enum Phase {
    /// Handshake in progress; holds the unresolved ready signal.
    Nascent { ready: Resolver },
    /// Handshake complete, no exchange in flight.
    SteadyState,
    /// An exchange is consuming packets until its predicate completes.
    AwaitingCompletion {
        resolver: Resolver,
        predicate: ExchangePredicate,
    },
    /// Torn down. Every packet is ignored from here on.
    Closed,
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Nascent { .. } => "Nascent",
            Phase::SteadyState => "SteadyState",
            Phase::AwaitingCompletion { .. } => "AwaitingCompletion",
            Phase::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Drives the connection phase over a caller-supplied transport.
#[derive(Debug)]
pub struct ConnectionHandler<C: PacketChannel> {
    options: ConnectOptions,
    channel: C,
    phase: Phase,
}

impl<C: PacketChannel> ConnectionHandler<C> {
    /// Create a handler for one connection attempt.
    ///
    /// The returned [`Completion`] resolves once, with the handshake
    /// outcome.
    pub fn new(options: ConnectOptions, channel: C) -> (Self, Completion) {
        let (ready, completion) = signal::completion();
        (
            Self {
                options,
                channel,
                phase: Phase::Nascent { ready },
            },
            completion,
        )
    }

    /// The transport this handler writes through.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Whether the connection has been torn down.
    pub fn is_closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    /// Process one decoded server packet.
    ///
    /// The single sequential entry point: the caller feeds packets strictly
    /// in arrival order.
    pub fn handle_packet(&mut self, packet: ServerPacket) {
        // Move the phase out so resolvers transfer by ownership and can
        // never be resolved twice.
        let phase = mem::replace(&mut self.phase, Phase::Closed);
        self.phase = match phase {
            Phase::Nascent { ready } => self.handle_nascent(packet, ready),
            Phase::SteadyState => {
                match packet {
                    ServerPacket::Ok(_) => {}
                    other => {
                        tracing::warn!(packet = ?other, "Unsolicited packet in steady state");
                    }
                }
                Phase::SteadyState
            }
            Phase::AwaitingCompletion {
                resolver,
                mut predicate,
            } => match predicate(&packet) {
                Ok(false) => Phase::AwaitingCompletion {
                    resolver,
                    predicate,
                },
                Ok(true) => {
                    resolver.resolve(Ok(()));
                    Phase::SteadyState
                }
                Err(e) => {
                    resolver.resolve(Err(e));
                    Phase::SteadyState
                }
            },
            Phase::Closed => {
                tracing::trace!("Packet after close, dropped");
                Phase::Closed
            }
        };
    }

    /// Start a packet exchange, valid only once the handshake has finished.
    ///
    /// Inbound packets are handed to `predicate` until it reports
    /// completion; the returned [`Completion`] carries the outcome.
    pub fn begin_exchange(&mut self, predicate: ExchangePredicate) -> Result<Completion> {
        match self.phase {
            Phase::SteadyState => {
                let (resolver, completion) = signal::completion();
                self.phase = Phase::AwaitingCompletion {
                    resolver,
                    predicate,
                };
                Ok(completion)
            }
            Phase::Closed => Err(Error::ConnectionClosed),
            Phase::Nascent { .. } | Phase::AwaitingCompletion { .. } => Err(Error::protocol(
                "An exchange is only possible on an idle, established connection",
            )),
        }
    }

    /// Tear the connection down.
    ///
    /// Any pending ready signal or exchange resolves with
    /// [`Error::ConnectionClosed`].
    pub fn close(&mut self) {
        match mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Nascent { ready } => ready.resolve(Err(Error::ConnectionClosed)),
            Phase::AwaitingCompletion { resolver, .. } => {
                resolver.resolve(Err(Error::ConnectionClosed));
            }
            Phase::SteadyState | Phase::Closed => {}
        }
    }

    fn handle_nascent(&mut self, packet: ServerPacket, ready: Resolver) -> Phase {
        match packet {
            ServerPacket::Handshake(greeting) => match self.respond_to_greeting(&greeting) {
                Ok(()) => Phase::Nascent { ready },
                Err(e) => {
                    ready.resolve(Err(e));
                    Phase::Closed
                }
            },
            ServerPacket::Ok(ok) => {
                tracing::debug!(status = ok.status_flags, "Handshake complete");
                ready.resolve(Ok(()));
                Phase::SteadyState
            }
            ServerPacket::FullAuthRequested => match self.answer_full_auth() {
                Ok(()) => Phase::Nascent { ready },
                Err(e) => {
                    ready.resolve(Err(e));
                    Phase::Closed
                }
            },
            ServerPacket::Err(err) => {
                tracing::debug!(code = err.error_code, "Server rejected handshake");
                ready.resolve(Err(Error::Server((&err).into())));
                Phase::Closed
            }
            ServerPacket::Eof(_) | ServerPacket::Data(_) => {
                ready.resolve(Err(Error::protocol(
                    "Unexpected packet during the handshake",
                )));
                Phase::Closed
            }
        }
    }

    /// Derive credentials from the greeting and send the response, with the
    /// TLS upgrade interposed when requested. TLS activation is strictly
    /// ordered after the SSLRequest send returns and strictly before the
    /// handshake response goes out.
    fn respond_to_greeting(&mut self, greeting: &ServerHandshake) -> Result<()> {
        tracing::debug!(
            server_version = %greeting.server_version,
            connection_id = greeting.connection_id,
            "Received server greeting"
        );

        let plugin = greeting
            .auth_plugin_name
            .as_deref()
            .unwrap_or(plugins::MYSQL_NATIVE_PASSWORD);
        let auth_response = auth::auth_response(
            plugin,
            self.options.password.as_deref(),
            greeting.capabilities,
            &greeting.auth_plugin_data,
        )?;

        let mut capabilities = self.options.capability_flags();
        let wants_tls = matches!(self.options.transport, Transport::Tls(_));
        if wants_tls {
            if !greeting.capabilities.contains(CapabilityFlags::SSL) {
                return Err(Error::Security(SecurityError {
                    reason: "TLS was requested but the server does not support it".to_string(),
                    possible_causes: vec![
                        "The server was built without SSL support".to_string(),
                        "SSL is disabled in the server configuration".to_string(),
                    ],
                    suggested_fixes: vec![
                        "Enable SSL on the server".to_string(),
                        "Connect with a cleartext transport".to_string(),
                    ],
                }));
            }
            capabilities |= CapabilityFlags::SSL;
        }

        let response = HandshakeResponse::new(
            capabilities,
            self.options.max_packet_size,
            self.options.charset,
            self.options.username.clone(),
            auth_response,
            self.options.database.clone(),
            capabilities
                .contains(CapabilityFlags::PLUGIN_AUTH)
                .then(|| plugin.to_string()),
        )?;

        if let Transport::Tls(settings) = &self.options.transport {
            let ssl_request = SslRequest::new(
                capabilities,
                self.options.max_packet_size,
                self.options.charset,
            );
            self.channel
                .send(ClientPacket::SslRequest(ssl_request))
                .map_err(Error::Transport)?;
            tracing::debug!("Upgrading connection to TLS");
            self.channel.begin_tls(settings).map_err(Error::Transport)?;
        }

        self.channel
            .send(ClientPacket::HandshakeResponse(response))
            .map_err(Error::Transport)?;
        Ok(())
    }

    /// Answer a full-authentication request, which carries the cleartext
    /// password and is therefore only honored on a secured channel.
    fn answer_full_auth(&mut self) -> Result<()> {
        if !self.channel.is_secure() {
            return Err(Error::Security(SecurityError {
                reason: "The server requested the cleartext password over an insecure channel"
                    .to_string(),
                possible_causes: vec![
                    "The account uses caching_sha2_password and its hash is not cached yet"
                        .to_string(),
                    "The connection is not using TLS".to_string(),
                ],
                suggested_fixes: vec![
                    "Enable TLS for this connection".to_string(),
                    "Switch the account to mysql_native_password".to_string(),
                    "Use a server older than MySQL 8.0.4".to_string(),
                ],
            }));
        }
        let password = self
            .options
            .password
            .clone()
            .ok_or_else(|| Error::config("Password required for full authentication"))?;
        self.channel
            .send(ClientPacket::PlaintextPassword(password))
            .map_err(Error::Transport)?;
        Ok(())
    }
}

impl<C: PacketChannel> Drop for ConnectionHandler<C> {
    fn drop(&mut self) {
        // Resolver Drop impls already deliver ConnectionClosed; close()
        // keeps the teardown explicit and idempotent.
        self.close();
    }
}
