//! Shared fixtures for driver tests: an in-memory record layer and
//! scripted payload handlers exercising a miniature TLS 1.2 exchange.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use digest::Digest;
use sha2::Sha256;

use crate::handshake::{Connection, MessageHandlers};
use crate::message::HandshakeMessage;
use crate::record::{
    ContentType, InboundRecord, Record, RecordBuffer, RecordIo, MAX_FRAGMENT_SIZE,
    RECORD_HEADER_LEN,
};
use crate::transcript::Transcript;
use crate::{AlertDescription, Blocked, CipherSuite, Config, TlsError};

/// In-memory record layer. Two paired transports exchange framed
/// plaintext records through shared byte pipes.
pub struct MemoryTransport {
    out: Vec<u8>,
    tx: Rc<RefCell<Vec<u8>>>,
    rx: Rc<RefCell<Vec<u8>>>,
    recv: RecordBuffer,
    queued: VecDeque<InboundRecord>,
    pub records_written: Vec<(ContentType, Vec<u8>)>,
    pub max_payload: usize,
    /// When set, every other `flush` call reports a would-block.
    pub block_flushes: bool,
    flush_ready: bool,
    pub corked: bool,
    pub cork_calls: usize,
    pub uncork_calls: usize,
    /// Reported by `was_corked`; simulates a caller-corked socket.
    pub precorked: bool,
}

impl MemoryTransport {
    fn with_pipes(tx: Rc<RefCell<Vec<u8>>>, rx: Rc<RefCell<Vec<u8>>>) -> Self {
        Self {
            out: Vec::new(),
            tx,
            rx,
            recv: RecordBuffer::new(),
            queued: VecDeque::new(),
            records_written: Vec::new(),
            max_payload: MAX_FRAGMENT_SIZE,
            block_flushes: false,
            flush_ready: false,
            corked: false,
            cork_calls: 0,
            uncork_calls: 0,
            precorked: false,
        }
    }

    /// Create two transports wired to each other.
    pub fn pair() -> (Self, Self) {
        let a = Rc::new(RefCell::new(Vec::new()));
        let b = Rc::new(RefCell::new(Vec::new()));
        (
            Self::with_pipes(a.clone(), b.clone()),
            Self::with_pipes(b, a),
        )
    }

    /// Create an unpaired transport fed by injection.
    pub fn solo() -> Self {
        let (transport, _) = Self::pair();
        transport
    }

    /// Queue one framed record for the next reads.
    pub fn inject(&mut self, content_type: ContentType, payload: &[u8]) {
        self.recv
            .append(&Record::new(content_type, payload.to_vec()).to_bytes());
    }

    /// Queue raw wire bytes for the next reads.
    pub fn inject_raw(&mut self, bytes: &[u8]) {
        self.recv.append(bytes);
    }

    /// Queue an SSLv2-framed ClientHello.
    pub fn inject_sslv2(&mut self, header: [u8; RECORD_HEADER_LEN], body: &[u8]) {
        self.queued
            .push_back(InboundRecord::sslv2_client_hello(header, body.to_vec()));
    }
}

impl RecordIo for MemoryTransport {
    fn read_record(&mut self) -> Result<InboundRecord, TlsError> {
        if let Some(record) = self.queued.pop_front() {
            return Ok(record);
        }
        {
            let mut shared = self.rx.borrow_mut();
            if !shared.is_empty() {
                self.recv.append(&shared);
                shared.clear();
            }
        }
        match self.recv.try_read_record()? {
            Some(record) => Ok(record),
            None => Err(TlsError::WouldBlock(Blocked::Read)),
        }
    }

    fn write_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), TlsError> {
        self.records_written
            .push((content_type, payload.to_vec()));
        self.out
            .extend_from_slice(&Record::new(content_type, payload.to_vec()).to_bytes());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TlsError> {
        if self.block_flushes {
            self.flush_ready = !self.flush_ready;
            if self.flush_ready {
                return Err(TlsError::WouldBlock(Blocked::Write));
            }
        }
        if !self.out.is_empty() {
            self.tx.borrow_mut().extend_from_slice(&self.out);
            self.out.clear();
        }
        Ok(())
    }

    fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn cork(&mut self) {
        self.corked = true;
        self.cork_calls += 1;
    }

    fn uncork(&mut self) {
        self.corked = false;
        self.uncork_calls += 1;
    }

    fn was_corked(&self) -> bool {
        self.precorked
    }
}

/// Byte reader with bounds-checked primitives.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, TlsError> {
        let b = *self.data.get(self.pos).ok_or(TlsError::BadMessage)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, TlsError> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn u24(&mut self) -> Result<usize, TlsError> {
        Ok(u32::from_be_bytes([0, self.u8()?, self.u8()?, self.u8()?]) as usize)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TlsError> {
        let end = self.pos.checked_add(n).ok_or(TlsError::BadMessage)?;
        let slice = self.data.get(self.pos..end).ok_or(TlsError::BadMessage)?;
        self.pos = end;
        Ok(slice)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Truncated-hash stand-in for the Finished PRF; both sides derive the
/// same 12 bytes from the same transcript state.
pub fn verify_data(transcript: &Transcript, label: &[u8]) -> [u8; 12] {
    let mut h = Sha256::new();
    h.update(label);
    h.update(transcript.sha256());
    let digest = h.finalize();
    let mut out = [0u8; 12];
    out.copy_from_slice(&digest[..12]);
    out
}

const STATUS_REQUEST_EXT: u16 = 5;

/// Scripted payload handlers for both endpoint roles.
pub struct TestHandlers {
    /// Offered suites (client) or preference order (server).
    pub suites: Vec<CipherSuite>,
    /// Session id the client offers in its hello.
    pub offer_session_id: Vec<u8>,
    /// Whether the client asks for a stapled certificate status.
    pub request_ocsp: bool,
    /// Certificate blob the server presents.
    pub cert_chain: Vec<u8>,
    /// Emit a warning alert just before the server certificate.
    pub warn_alert_before_cert: bool,
    /// Every message composed or consumed, in order.
    pub handled: Vec<HandshakeMessage>,
    /// Alert fragments seen, as (level, description) pairs.
    pub alerts: Vec<(u8, u8)>,
    /// Leaf certificate received from the peer.
    pub received_cert: Vec<u8>,
    /// Stapled status received from the peer.
    pub received_status: Vec<u8>,
    /// Transcript snapshot taken inside the SSLv2 hello handler.
    pub sslv2_transcript: Option<[u8; 32]>,
    client_verify: Option<[u8; 12]>,
    server_verify: Option<[u8; 12]>,
}

impl TestHandlers {
    pub fn client() -> Self {
        Self::with_suites(alloc::vec![CipherSuite::RsaAes128CbcSha])
    }

    pub fn server() -> Self {
        Self::with_suites(alloc::vec![
            CipherSuite::RsaAes128CbcSha,
            CipherSuite::RsaAes256CbcSha,
            CipherSuite::RsaAes128GcmSha256,
            CipherSuite::DheRsaAes128CbcSha,
            CipherSuite::EcdheRsaAes128CbcSha,
            CipherSuite::EcdheRsaAes128GcmSha256,
            CipherSuite::EcdheRsaAes256GcmSha384,
            CipherSuite::EcdheEcdsaAes128GcmSha256,
        ])
    }

    pub fn with_suites(suites: Vec<CipherSuite>) -> Self {
        Self {
            suites,
            offer_session_id: Vec::new(),
            request_ocsp: false,
            cert_chain: alloc::vec![0xAB; 1200],
            warn_alert_before_cert: false,
            handled: Vec::new(),
            alerts: Vec::new(),
            received_cert: Vec::new(),
            received_status: Vec::new(),
            sslv2_transcript: None,
            client_verify: None,
            server_verify: None,
        }
    }

    fn compose_client_hello<T: RecordIo>(
        &mut self,
        conn: &mut Connection<T>,
    ) -> Result<(), TlsError> {
        let mut body = Vec::new();
        body.extend_from_slice(&conn.version().to_bytes());
        body.extend_from_slice(&[0x11; 32]);
        body.push(self.offer_session_id.len() as u8);
        body.extend_from_slice(&self.offer_session_id);
        body.extend_from_slice(&((self.suites.len() * 2) as u16).to_be_bytes());
        for suite in &self.suites {
            body.extend_from_slice(&suite.to_id().to_be_bytes());
        }
        body.extend_from_slice(&[1, 0]);

        let mut extensions = Vec::new();
        if self.request_ocsp {
            extensions.extend_from_slice(&STATUS_REQUEST_EXT.to_be_bytes());
            extensions.extend_from_slice(&5u16.to_be_bytes());
            extensions.extend_from_slice(&[1, 0, 0, 0, 0]);
        }
        body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        body.extend_from_slice(&extensions);

        conn.scratch_mut().write(&body);
        Ok(())
    }

    fn consume_client_hello<T: RecordIo>(
        &mut self,
        conn: &mut Connection<T>,
    ) -> Result<(), TlsError> {
        let body = conn.scratch().unread().to_vec();
        let mut reader = Reader::new(&body);

        reader.take(2)?;
        reader.take(32)?;
        let sid_len = reader.u8()? as usize;
        let sid = reader.take(sid_len)?.to_vec();
        let suites_len = reader.u16()? as usize;
        let mut offered = Vec::new();
        for _ in 0..suites_len / 2 {
            if let Some(suite) = CipherSuite::from_id(reader.u16()?) {
                offered.push(suite);
            }
        }
        let comp_len = reader.u8()? as usize;
        reader.take(comp_len)?;

        let mut wants_status = false;
        if reader.remaining() >= 2 {
            let ext_len = reader.u16()? as usize;
            let exts = reader.take(ext_len)?;
            let mut ext_reader = Reader::new(exts);
            while ext_reader.remaining() >= 4 {
                let ext_type = ext_reader.u16()?;
                let len = ext_reader.u16()? as usize;
                ext_reader.take(len)?;
                if ext_type == STATUS_REQUEST_EXT {
                    wants_status = true;
                }
            }
        }

        let chosen = offered
            .iter()
            .find(|s| self.suites.contains(s))
            .copied()
            .ok_or(TlsError::UnsupportedCipherSuite)?;
        conn.set_cipher_suite(chosen);
        conn.set_session_id(&sid)?;
        conn.set_status_request(wants_status && conn.config().ocsp_response.is_some());
        conn.set_handshake_type()
    }

    fn compose_server_hello<T: RecordIo>(
        &mut self,
        conn: &mut Connection<T>,
    ) -> Result<(), TlsError> {
        let suite = conn.cipher_suite().ok_or(TlsError::Internal)?;

        let mut body = Vec::new();
        body.extend_from_slice(&conn.version().to_bytes());
        body.extend_from_slice(&[0x22; 32]);
        body.push(conn.session_id().len() as u8);
        body.extend_from_slice(conn.session_id());
        body.extend_from_slice(&suite.to_id().to_be_bytes());
        body.push(0);

        let mut extensions = Vec::new();
        if conn.status_request() {
            extensions.extend_from_slice(&STATUS_REQUEST_EXT.to_be_bytes());
            extensions.extend_from_slice(&0u16.to_be_bytes());
        }
        body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        body.extend_from_slice(&extensions);

        conn.scratch_mut().write(&body);
        Ok(())
    }

    fn consume_server_hello<T: RecordIo>(
        &mut self,
        conn: &mut Connection<T>,
    ) -> Result<(), TlsError> {
        let body = conn.scratch().unread().to_vec();
        let mut reader = Reader::new(&body);

        reader.take(2)?;
        reader.take(32)?;
        let sid_len = reader.u8()? as usize;
        let sid = reader.take(sid_len)?.to_vec();
        let suite = CipherSuite::from_id(reader.u16()?).ok_or(TlsError::UnsupportedCipherSuite)?;
        reader.u8()?;

        let mut status_confirmed = false;
        if reader.remaining() >= 2 {
            let ext_len = reader.u16()? as usize;
            let exts = reader.take(ext_len)?;
            let mut ext_reader = Reader::new(exts);
            while ext_reader.remaining() >= 4 {
                let ext_type = ext_reader.u16()?;
                let len = ext_reader.u16()? as usize;
                ext_reader.take(len)?;
                if ext_type == STATUS_REQUEST_EXT {
                    status_confirmed = true;
                }
            }
        }

        conn.set_cipher_suite(suite);
        conn.set_session_id(&sid)?;
        conn.set_status_request(self.request_ocsp && status_confirmed);
        conn.set_handshake_type()
    }

    fn consume_server_cert<T: RecordIo>(
        &mut self,
        conn: &mut Connection<T>,
    ) -> Result<(), TlsError> {
        let body = conn.scratch().unread().to_vec();
        let mut reader = Reader::new(&body);
        let list_len = reader.u24()?;
        if list_len != reader.remaining() {
            return Err(TlsError::BadCertificate);
        }
        let cert_len = reader.u24()?;
        self.received_cert = reader.take(cert_len)?.to_vec();
        Ok(())
    }
}

impl<T: RecordIo> MessageHandlers<T> for TestHandlers {
    fn compose(&mut self, conn: &mut Connection<T>, msg: HandshakeMessage) -> Result<(), TlsError> {
        self.handled.push(msg);
        match msg {
            HandshakeMessage::ClientHello => self.compose_client_hello(conn),
            HandshakeMessage::ServerHello => self.compose_server_hello(conn),
            HandshakeMessage::ServerCert => {
                if self.warn_alert_before_cert {
                    conn.transport_mut().write_record(
                        ContentType::Alert,
                        &[1, AlertDescription::NoCertificateReserved as u8],
                    )?;
                }
                let mut body = Vec::new();
                let total = self.cert_chain.len() + 3;
                body.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
                body.extend_from_slice(&(self.cert_chain.len() as u32).to_be_bytes()[1..]);
                body.extend_from_slice(&self.cert_chain);
                conn.scratch_mut().write(&body);
                Ok(())
            }
            HandshakeMessage::ServerCertStatus => {
                let status = conn
                    .config()
                    .ocsp_response
                    .clone()
                    .ok_or(TlsError::Internal)?;
                let mut body = Vec::new();
                body.push(1);
                body.extend_from_slice(&(status.len() as u32).to_be_bytes()[1..]);
                body.extend_from_slice(&status);
                conn.scratch_mut().write(&body);
                Ok(())
            }
            HandshakeMessage::ServerKey => {
                let mut body = Vec::new();
                body.extend_from_slice(&[0x03, 0x00, 0x1D, 32]);
                body.extend_from_slice(&[0x5A; 32]);
                conn.scratch_mut().write(&body);
                Ok(())
            }
            HandshakeMessage::ServerHelloDone => Ok(()),
            HandshakeMessage::ClientKey => {
                let mut body = Vec::new();
                body.extend_from_slice(&48u16.to_be_bytes());
                body.extend_from_slice(&[0x6B; 48]);
                conn.scratch_mut().write(&body);
                Ok(())
            }
            HandshakeMessage::ClientChangeCipherSpec => {
                self.client_verify = Some(verify_data(conn.transcript(), b"client finished"));
                conn.scratch_mut().write(&[1]);
                Ok(())
            }
            HandshakeMessage::ServerChangeCipherSpec => {
                self.server_verify = Some(verify_data(conn.transcript(), b"server finished"));
                conn.scratch_mut().write(&[1]);
                Ok(())
            }
            HandshakeMessage::ClientFinished => {
                let verify = self.client_verify.ok_or(TlsError::Internal)?;
                conn.scratch_mut().write(&verify);
                Ok(())
            }
            HandshakeMessage::ServerFinished => {
                let verify = self.server_verify.ok_or(TlsError::Internal)?;
                conn.scratch_mut().write(&verify);
                Ok(())
            }
            _ => Err(TlsError::Internal),
        }
    }

    fn consume(&mut self, conn: &mut Connection<T>, msg: HandshakeMessage) -> Result<(), TlsError> {
        self.handled.push(msg);
        match msg {
            HandshakeMessage::ClientHello => self.consume_client_hello(conn),
            HandshakeMessage::ServerHello => self.consume_server_hello(conn),
            HandshakeMessage::ServerCert => self.consume_server_cert(conn),
            HandshakeMessage::ServerCertStatus => {
                let body = conn.scratch().unread().to_vec();
                let mut reader = Reader::new(&body);
                if reader.u8()? != 1 {
                    return Err(TlsError::BadMessage);
                }
                let len = reader.u24()?;
                self.received_status = reader.take(len)?.to_vec();
                Ok(())
            }
            HandshakeMessage::ServerKey => {
                if conn.scratch().unread_len() < 4 {
                    return Err(TlsError::BadMessage);
                }
                Ok(())
            }
            HandshakeMessage::ServerHelloDone => {
                if conn.scratch().unread_len() != 0 {
                    return Err(TlsError::BadMessage);
                }
                Ok(())
            }
            HandshakeMessage::ClientKey => {
                if conn.scratch().unread_len() < 2 {
                    return Err(TlsError::BadMessage);
                }
                Ok(())
            }
            HandshakeMessage::ClientChangeCipherSpec => {
                if conn.scratch().unread() != [1] {
                    return Err(TlsError::BadMessage);
                }
                self.client_verify = Some(verify_data(conn.transcript(), b"client finished"));
                Ok(())
            }
            HandshakeMessage::ServerChangeCipherSpec => {
                if conn.scratch().unread() != [1] {
                    return Err(TlsError::BadMessage);
                }
                self.server_verify = Some(verify_data(conn.transcript(), b"server finished"));
                Ok(())
            }
            HandshakeMessage::ClientFinished => {
                let verify = self.client_verify.ok_or(TlsError::Internal)?;
                if conn.scratch().unread() != verify {
                    return Err(TlsError::HandshakeFailure);
                }
                Ok(())
            }
            HandshakeMessage::ServerFinished => {
                let verify = self.server_verify.ok_or(TlsError::Internal)?;
                if conn.scratch().unread() != verify {
                    return Err(TlsError::HandshakeFailure);
                }
                Ok(())
            }
            _ => Err(TlsError::Internal),
        }
    }

    fn consume_sslv2_client_hello(&mut self, conn: &mut Connection<T>) -> Result<(), TlsError> {
        self.handled.push(HandshakeMessage::ClientHello);
        let body = conn.scratch().unread().to_vec();
        let mut reader = Reader::new(&body);

        let specs_len = reader.u16()? as usize;
        let sid_len = reader.u16()? as usize;
        let challenge_len = reader.u16()? as usize;
        let specs = reader.take(specs_len)?.to_vec();
        let sid = reader.take(sid_len)?.to_vec();
        reader.take(challenge_len)?;

        let mut chosen = None;
        for spec in specs.chunks_exact(3) {
            if spec[0] != 0 {
                continue;
            }
            let id = u16::from_be_bytes([spec[1], spec[2]]);
            if let Some(suite) = CipherSuite::from_id(id) {
                if self.suites.contains(&suite) {
                    chosen = Some(suite);
                    break;
                }
            }
        }
        conn.set_cipher_suite(chosen.ok_or(TlsError::UnsupportedCipherSuite)?);
        conn.set_session_id(&sid)?;
        conn.set_handshake_type()?;
        self.sslv2_transcript = Some(conn.transcript().sha256());
        Ok(())
    }

    fn on_alert(&mut self, _conn: &mut Connection<T>, fragment: &[u8]) -> Result<(), TlsError> {
        if fragment.len() < 2 {
            return Err(TlsError::BadMessage);
        }
        self.alerts.push((fragment[0], fragment[1]));
        if fragment[0] == 2 {
            let desc = AlertDescription::from_byte(fragment[1]).ok_or(TlsError::BadMessage)?;
            return Err(TlsError::AlertReceived(desc));
        }
        Ok(())
    }
}

/// Build a wired client/server connection pair.
pub fn connected_pair(
    client_config: Config,
    server_config: Config,
) -> (Connection<MemoryTransport>, Connection<MemoryTransport>) {
    let (client_transport, server_transport) = MemoryTransport::pair();
    (
        Connection::client(client_transport, client_config),
        Connection::server(server_transport, server_config),
    )
}

/// Alternate the two endpoints until both complete or one fails.
pub fn drive(
    client: &mut Connection<MemoryTransport>,
    client_handlers: &mut TestHandlers,
    server: &mut Connection<MemoryTransport>,
    server_handlers: &mut TestHandlers,
) -> Result<(), TlsError> {
    for _ in 0..10_000 {
        let c = client.negotiate(client_handlers);
        if let Err(err) = &c {
            if !err.is_would_block() {
                return Err(err.clone());
            }
        }
        let s = server.negotiate(server_handlers);
        if let Err(err) = &s {
            if !err.is_would_block() {
                return Err(err.clone());
            }
        }
        if c.is_ok() && s.is_ok() {
            return Ok(());
        }
    }
    panic!("handshake did not converge");
}
