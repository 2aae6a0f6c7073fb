//! Handshake driver.
//!
//! This module sequences handshake messages between client and server
//! on one connection: it selects the active message sequence, frames
//! outbound messages into records, reassembles fragmented inbound
//! messages, keeps the transcript current, and tolerates or rejects
//! interleaved record types. Payload parsing and construction stay
//! behind the [`MessageHandlers`] trait; record encryption and socket
//! I/O stay behind [`RecordIo`].

use alloc::boxed::Box;
use alloc::vec::Vec;

use rand_core::RngCore;

use crate::message::{HandshakeMessage, HandshakeType, Writer};
use crate::record::{ContentType, InboundRecord, RecordIo};
use crate::scratch::ScratchBuffer;
use crate::session::{SessionCache, SESSION_ID_LEN};
use crate::shape::HandshakeShape;
use crate::transcript::Transcript;
use crate::{Blocked, CipherSuite, Config, Mode, TlsError, TlsVersion};

/// Largest handshake message body the reader will reassemble.
pub const MAX_HANDSHAKE_MESSAGE_LEN: usize = 65536;

/// Length of a handshake message header on the wire.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// Payload handlers for the logical handshake messages.
///
/// The driver calls `compose` when this endpoint must produce a message
/// (the handler appends the body to the connection's scratch buffer)
/// and `consume` once a complete inbound message body sits in the
/// scratch buffer. Handlers never see partial messages.
pub trait MessageHandlers<T: RecordIo> {
    /// Produce the body of `msg` into the scratch buffer.
    fn compose(&mut self, conn: &mut Connection<T>, msg: HandshakeMessage)
        -> Result<(), TlsError>;

    /// Process the complete inbound body of `msg` from the scratch
    /// buffer. An error kills the connection.
    fn consume(&mut self, conn: &mut Connection<T>, msg: HandshakeMessage)
        -> Result<(), TlsError>;

    /// Process an SSLv2-framed ClientHello body from the scratch
    /// buffer. Endpoints that do not accept v2 hellos keep the default.
    fn consume_sslv2_client_hello(&mut self, conn: &mut Connection<T>) -> Result<(), TlsError> {
        let _ = conn;
        Err(TlsError::BadMessage)
    }

    /// Process an alert record fragment. Returning an error (fatal
    /// alert) kills the connection; returning `Ok` resumes the
    /// handshake where it left off.
    fn on_alert(&mut self, conn: &mut Connection<T>, fragment: &[u8]) -> Result<(), TlsError>;
}

/// One TLS connection's handshake state.
pub struct Connection<T: RecordIo> {
    mode: Mode,
    config: Config,
    transport: T,
    shape: HandshakeShape,
    cursor: usize,
    scratch: ScratchBuffer,
    transcript: Transcript,
    session_id: [u8; SESSION_ID_LEN],
    session_id_len: usize,
    cipher_suite: Option<CipherSuite>,
    status_request: bool,
    version: TlsVersion,
    resumed_session: Option<Vec<u8>>,
    session_cache: Option<Box<dyn SessionCache>>,
    rng: Option<Box<dyn RngCore>>,
    /// Whether this driver manages socket corking; decided on the first
    /// `negotiate` call so a caller-corked socket is left alone.
    cork_managed: Option<bool>,
    alive: bool,
}

impl<T: RecordIo> Connection<T> {
    /// Create a client-side connection.
    pub fn client(transport: T, config: Config) -> Self {
        Self::new(Mode::Client, transport, config)
    }

    /// Create a server-side connection.
    pub fn server(transport: T, config: Config) -> Self {
        Self::new(Mode::Server, transport, config)
    }

    fn new(mode: Mode, transport: T, config: Config) -> Self {
        let version = config.version;
        Self {
            mode,
            config,
            transport,
            shape: HandshakeShape::INITIAL,
            cursor: 0,
            scratch: ScratchBuffer::new(),
            transcript: Transcript::new(),
            session_id: [0u8; SESSION_ID_LEN],
            session_id_len: 0,
            cipher_suite: None,
            status_request: false,
            version,
            resumed_session: None,
            session_cache: None,
            rng: None,
            cork_managed: None,
            alive: true,
        }
    }

    /// Attach a session cache.
    pub fn with_session_cache(mut self, cache: Box<dyn SessionCache>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Attach the RNG used for session-id issuance.
    pub fn with_rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Endpoint role.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Connection configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Currently selected handshake shape.
    pub fn shape(&self) -> HandshakeShape {
        self.shape
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> TlsVersion {
        self.version
    }

    /// Record the negotiated protocol version.
    pub fn set_version(&mut self, version: TlsVersion) {
        self.version = version;
    }

    /// The record layer this connection drives.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the record layer.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The handshake I/O buffer.
    pub fn scratch(&self) -> &ScratchBuffer {
        &self.scratch
    }

    /// Mutable access to the handshake I/O buffer, for payload
    /// handlers composing a message body.
    pub fn scratch_mut(&mut self) -> &mut ScratchBuffer {
        &mut self.scratch
    }

    /// The running handshake transcript. Updates happen only inside
    /// the driver; handlers finalize clones for Finished computation.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Negotiated cipher suite, once the hello handlers recorded one.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.cipher_suite
    }

    /// Record the negotiated cipher suite.
    pub fn set_cipher_suite(&mut self, suite: CipherSuite) {
        self.cipher_suite = Some(suite);
    }

    /// Session identifier in force for this connection.
    pub fn session_id(&self) -> &[u8] {
        &self.session_id[..self.session_id_len]
    }

    /// Record the session identifier offered or echoed by the peer.
    pub fn set_session_id(&mut self, id: &[u8]) -> Result<(), TlsError> {
        if id.len() > SESSION_ID_LEN {
            return Err(TlsError::BadMessage);
        }
        self.session_id[..id.len()].copy_from_slice(id);
        self.session_id_len = id.len();
        Ok(())
    }

    /// Whether certificate-status stapling is in play.
    pub fn status_request(&self) -> bool {
        self.status_request
    }

    /// Record whether certificate-status stapling is in play. Servers
    /// set this once the client has asked for a status and a response
    /// is available; clients once the server confirmed stapling.
    pub fn set_status_request(&mut self, on: bool) {
        self.status_request = on;
    }

    /// Opaque session state recovered from the cache, when the shape
    /// resumed a cached session.
    pub fn resumed_session(&self) -> Option<&[u8]> {
        self.resumed_session.as_deref()
    }

    /// The logical message the driver is positioned at.
    pub fn current_message(&self) -> HandshakeMessage {
        self.shape
            .sequence()
            .get(self.cursor)
            .copied()
            .unwrap_or(HandshakeMessage::ApplicationData)
    }

    /// Index of the current message within the active sequence.
    pub fn message_index(&self) -> usize {
        self.cursor
    }

    /// Whether the handshake has reached the application-data slot.
    pub fn is_handshake_complete(&self) -> bool {
        self.shape.contains(HandshakeShape::NEGOTIATED)
            && self.current_message().descriptor().writer == Writer::Both
    }

    #[cfg(test)]
    pub(crate) fn force_handshake_state(&mut self, shape: HandshakeShape, cursor: usize) {
        self.shape = shape;
        self.cursor = cursor;
    }

    /// Select the handshake shape once negotiation has resolved.
    ///
    /// Called by the ClientHello handler (server side) or the
    /// ServerHello handler (client side). Reads the negotiation results
    /// previously recorded on the connection: the session id, the
    /// cipher suite and the stapling agreement. The cursor keeps its
    /// value; every negotiated sequence starts with the same two hello
    /// messages the bootstrap sequence has.
    pub fn set_handshake_type(&mut self) -> Result<(), TlsError> {
        self.shape = HandshakeShape::NEGOTIATED;
        self.resumed_session = None;

        if self.config.session_resumption && self.session_cache.is_some() {
            if self.session_id_len > 0 {
                let id = &self.session_id[..self.session_id_len];
                if let Some(state) = self.session_cache.as_mut().unwrap().lookup(id) {
                    self.shape |= HandshakeShape::RESUME;
                    self.resumed_session = Some(state);
                    log::debug!("[TLS] {:?} resuming cached session", self.mode);
                    return Ok(());
                }
            }
            if self.mode == Mode::Server {
                // Issue a fresh id for the full handshake so the new
                // session is cacheable.
                let rng = self.rng.as_mut().ok_or(TlsError::Internal)?;
                rng.fill_bytes(&mut self.session_id);
                self.session_id_len = SESSION_ID_LEN;
            }
        }

        self.shape |= HandshakeShape::FULL_HANDSHAKE;

        let suite = self.cipher_suite.ok_or(TlsError::Internal)?;
        if suite.key_exchange().is_ephemeral() {
            self.shape |= HandshakeShape::PERFECT_FORWARD_SECRECY;
        }

        let stapling = match self.mode {
            Mode::Server => self.status_request && self.config.ocsp_response.is_some(),
            Mode::Client => self.status_request,
        };
        if stapling {
            self.shape |= HandshakeShape::OCSP_STATUS;
        }

        log::debug!("[TLS] {:?} handshake type {:?}", self.mode, self.shape);
        Ok(())
    }

    /// Drive the handshake until it completes or blocks.
    ///
    /// Returns `Ok(())` once the terminal application-data slot is
    /// reached. [`TlsError::WouldBlock`] is the only retryable error:
    /// call again once the transport is ready and the driver resumes
    /// exactly where it stopped. Any other error leaves the connection
    /// dead.
    pub fn negotiate<H: MessageHandlers<T>>(&mut self, handlers: &mut H) -> Result<(), TlsError> {
        if !self.alive {
            return Err(TlsError::Closed);
        }
        if self.cork_managed.is_none() {
            self.cork_managed = Some(self.config.cork_io && !self.transport.was_corked());
        }

        loop {
            let seq = self.shape.sequence();
            if seq.is_empty() || self.cursor >= seq.len() {
                debug_assert!(false, "unpopulated shape or cursor overrun");
                self.kill();
                return Err(TlsError::Internal);
            }
            let msg = seq[self.cursor];
            let desc = msg.descriptor();
            if desc.writer == Writer::Both {
                break;
            }

            let result = if let Err(err) = self.transport.flush() {
                Err(retag(err, Blocked::Write))
            } else if desc.writer == self.writer_role() {
                self.write_message(handlers)
                    .map_err(|err| retag(err, Blocked::Write))
            } else {
                self.read_message(handlers)
                    .map_err(|err| retag(err, Blocked::Read))
            };

            if let Err(err) = result {
                if !err.is_would_block() {
                    log::debug!("[TLS] {:?} handshake failed at {:?}: {}", self.mode, msg, err);
                    self.kill();
                }
                return Err(err);
            }

            if self.current_message().descriptor().writer == Writer::Both {
                // Terminal slot reached; the handshake buffer is done.
                self.scratch.release();
            }
        }

        Ok(())
    }

    fn writer_role(&self) -> Writer {
        match self.mode {
            Mode::Client => Writer::Client,
            Mode::Server => Writer::Server,
        }
    }

    /// Mark the connection dead and purge any issued session id.
    fn kill(&mut self) {
        self.alive = false;
        if self.config.session_resumption && self.session_id_len > 0 {
            if let Some(cache) = self.session_cache.as_mut() {
                cache.delete(&self.session_id[..self.session_id_len]);
            }
        }
    }

    /// Produce the current message and frame it into records.
    fn write_message<H: MessageHandlers<T>>(&mut self, handlers: &mut H) -> Result<(), TlsError> {
        let msg = self.current_message();
        let desc = msg.descriptor();
        if desc.handler_for(self.mode).is_unsupported() {
            debug_assert!(false, "no payload handler for {:?}", msg);
            return Err(TlsError::Internal);
        }

        if self.scratch.is_wiped() {
            if desc.record_type == ContentType::Handshake {
                let wire = desc.wire_type.ok_or(TlsError::Internal)?;
                self.scratch.write(&[wire as u8, 0, 0, 0]);
            }
            handlers.compose(self, msg)?;
            if desc.record_type == ContentType::Handshake {
                let body_len = (self.scratch.len() - HANDSHAKE_HEADER_LEN) as u32;
                self.scratch.patch(1, &body_len.to_be_bytes()[1..]);
            }
            log::trace!(
                "[TLS] {:?} sending {:?} ({} bytes)",
                self.mode,
                msg,
                self.scratch.len()
            );
        }

        // Drain the composed message, at most one record payload per
        // iteration. Two messages never share a record; a message may
        // span several.
        while self.scratch.unread_len() > 0 {
            let max = self.transport.max_payload();
            debug_assert!(max > 0);
            let n = self.scratch.unread_len().min(max);
            let chunk = &self.scratch.unread()[..n];
            self.transport.write_record(desc.record_type, chunk)?;
            if desc.record_type == ContentType::Handshake {
                self.transcript.update(chunk);
            }
            self.scratch.advance(n);
            // A would-block here keeps the scratch buffer intact; a
            // resumed call re-enters this loop and sends only what is
            // still unsent.
            self.transport.flush()?;
        }

        self.scratch.wipe();
        self.advance_message();
        Ok(())
    }

    /// Read one record and process what it carries.
    fn read_message<H: MessageHandlers<T>>(&mut self, handlers: &mut H) -> Result<(), TlsError> {
        let record = self.transport.read_record()?;

        if record.sslv2 {
            return self.read_sslv2_client_hello(handlers, record);
        }

        match record.content_type() {
            None => {
                // Unknown record types are ignored for forward
                // compatibility.
                log::trace!(
                    "[TLS] {:?} ignoring record type {}",
                    self.mode,
                    record.type_byte
                );
                Ok(())
            }
            Some(ContentType::ApplicationData) => Err(TlsError::BadMessage),
            Some(ContentType::Alert) => handlers.on_alert(self, &record.body),
            Some(ContentType::ChangeCipherSpec) => {
                let desc = self.current_message().descriptor();
                if desc.record_type != ContentType::ChangeCipherSpec {
                    return Err(TlsError::BadMessage);
                }
                if record.body.len() != 1 {
                    return Err(TlsError::BadMessage);
                }
                let msg = self.current_message();
                self.scratch.wipe();
                self.scratch.write(&record.body);
                handlers.consume(self, msg)?;
                self.scratch.wipe();
                self.advance_message();
                Ok(())
            }
            Some(ContentType::Handshake) => self.read_handshake_record(handlers, &record.body),
        }
    }

    /// Reassemble and dispatch the handshake messages in one record
    /// body. The body may hold a partial message, one message, or
    /// several.
    fn read_handshake_record<H: MessageHandlers<T>>(
        &mut self,
        handlers: &mut H,
        body: &[u8],
    ) -> Result<(), TlsError> {
        let mut off = 0;

        while off < body.len() {
            if self.scratch.len() < HANDSHAKE_HEADER_LEN {
                let need = HANDSHAKE_HEADER_LEN - self.scratch.len();
                let take = need.min(body.len() - off);
                self.scratch.write(&body[off..off + take]);
                off += take;
                if self.scratch.len() < HANDSHAKE_HEADER_LEN {
                    // Header split across records; the next record
                    // continues it.
                    return Ok(());
                }
            }

            let header = self.scratch.bytes();
            let wire_byte = header[0];
            let body_len = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
            if body_len > MAX_HANDSHAKE_MESSAGE_LEN {
                return Err(TlsError::MessageTooLarge(body_len));
            }

            let have = self.scratch.len() - HANDSHAKE_HEADER_LEN;
            let take = (body_len - have).min(body.len() - off);
            self.scratch.write(&body[off..off + take]);
            off += take;

            if self.scratch.len() < HANDSHAKE_HEADER_LEN + body_len {
                // Message incomplete; keep what we have and wait for
                // the next record.
                self.scratch.rewind();
                return Ok(());
            }

            if wire_byte == HandshakeType::HelloRequest as u8 {
                // Renegotiation is unsupported; a HelloRequest is
                // dropped like an unrecognized record type, outside the
                // transcript and without moving the cursor.
                log::trace!("[TLS] {:?} ignoring HelloRequest", self.mode);
                self.scratch.wipe();
                return Ok(());
            }

            self.transcript.update(self.scratch.bytes());

            let msg = self.current_message();
            let desc = msg.descriptor();
            if desc.wire_type.map(|t| t as u8) != Some(wire_byte) {
                return Err(TlsError::BadMessage);
            }
            if desc.handler_for(self.mode).is_unsupported() {
                debug_assert!(false, "no payload handler for {:?}", msg);
                return Err(TlsError::Internal);
            }

            log::trace!(
                "[TLS] {:?} received {:?} ({} bytes)",
                self.mode,
                msg,
                self.scratch.len()
            );
            self.scratch.set_read(HANDSHAKE_HEADER_LEN);
            handlers.consume(self, msg)?;
            self.scratch.wipe();
            self.advance_message();
        }

        Ok(())
    }

    /// Process an SSLv2-framed ClientHello.
    ///
    /// Legal only while positioned at ClientHello. The transcript gets
    /// the bytes a v3 hello would have contributed: three bytes of the
    /// v2 header starting at offset 2, then the whole v2 body.
    fn read_sslv2_client_hello<H: MessageHandlers<T>>(
        &mut self,
        handlers: &mut H,
        record: InboundRecord,
    ) -> Result<(), TlsError> {
        if self.current_message() != HandshakeMessage::ClientHello {
            return Err(TlsError::BadMessage);
        }

        self.transcript.update(&record.header[2..5]);
        self.transcript.update(&record.body);

        self.scratch.wipe();
        self.scratch.write(&record.body);
        handlers.consume_sslv2_client_hello(self)?;
        self.scratch.wipe();
        self.advance_message();
        Ok(())
    }

    /// Step the cursor to the next message, managing socket corking
    /// when enabled.
    fn advance_message(&mut self) {
        let prev = self.current_message().descriptor().writer;
        self.cursor += 1;
        let next = self.current_message().descriptor().writer;

        if self.cork_managed != Some(true) || next == prev {
            return;
        }
        if next == self.writer_role() {
            // A run of our own messages starts; coalesce them.
            self.transport.cork();
        } else {
            self.transport.uncork();
        }
    }
}

fn retag(err: TlsError, blocked: Blocked) -> TlsError {
    match err {
        TlsError::WouldBlock(_) => TlsError::WouldBlock(blocked),
        other => other,
    }
}
