//! Record layer interface and plaintext framing.
//!
//! The driver never encrypts or decrypts records itself; it drives an
//! implementation of [`RecordIo`] and works on decrypted record bodies.
//! The [`Record`] and [`RecordBuffer`] helpers implement the plaintext
//! TLS record framing for transports that need it.

use alloc::vec::Vec;

use crate::{TlsError, TlsVersion};

/// Content type for TLS records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    /// Change cipher spec.
    ChangeCipherSpec = 20,
    /// Alert.
    Alert = 21,
    /// Handshake.
    Handshake = 22,
    /// Application data.
    ApplicationData = 23,
}

impl ContentType {
    /// Parse from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

/// Alert level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    /// Warning.
    Warning = 1,
    /// Fatal.
    Fatal = 2,
}

impl AlertLevel {
    /// Parse from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(AlertLevel::Warning),
            2 => Some(AlertLevel::Fatal),
            _ => None,
        }
    }
}

/// Maximum record payload size (16KB).
pub const MAX_FRAGMENT_SIZE: usize = 16384;

/// Length of a record header on the wire.
pub const RECORD_HEADER_LEN: usize = 5;

/// One decrypted inbound record as surfaced to the driver.
///
/// The content type is kept as the raw wire byte so that record types
/// unknown to this crate can be ignored rather than rejected. For an
/// SSLv2-framed ClientHello the transport sets `sslv2` and `header`
/// holds the five bytes of the v2 record header.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    /// Raw content-type byte.
    pub type_byte: u8,
    /// Record header bytes as read from the wire.
    pub header: [u8; RECORD_HEADER_LEN],
    /// Decrypted record body.
    pub body: Vec<u8>,
    /// Whether this is an SSLv2-framed ClientHello.
    pub sslv2: bool,
}

impl InboundRecord {
    /// Build a plaintext inbound record of a known content type.
    pub fn new(content_type: ContentType, version: TlsVersion, body: Vec<u8>) -> Self {
        let ver = version.to_bytes();
        let len = (body.len() as u16).to_be_bytes();
        Self {
            type_byte: content_type as u8,
            header: [content_type as u8, ver[0], ver[1], len[0], len[1]],
            body,
            sslv2: false,
        }
    }

    /// Build an SSLv2-framed ClientHello record.
    ///
    /// `header` carries the five leading bytes of the v2 record
    /// (2-byte length, message type, 2-byte version); `body` carries
    /// everything after them.
    pub fn sslv2_client_hello(header: [u8; RECORD_HEADER_LEN], body: Vec<u8>) -> Self {
        Self {
            type_byte: ContentType::Handshake as u8,
            header,
            body,
            sslv2: true,
        }
    }

    /// Parsed content type, if known.
    pub fn content_type(&self) -> Option<ContentType> {
        ContentType::from_byte(self.type_byte)
    }
}

/// Abstract record layer driven by the handshake engine.
///
/// `read_record` and `flush` return [`TlsError::WouldBlock`] when the
/// underlying transport cannot make progress; the driver surfaces that
/// to its caller with all connection state preserved for resumption.
pub trait RecordIo {
    /// Read and decrypt the next full record.
    fn read_record(&mut self) -> Result<InboundRecord, TlsError>;

    /// Enqueue one record of the given type.
    fn write_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<(), TlsError>;

    /// Flush enqueued records to the transport.
    fn flush(&mut self) -> Result<(), TlsError>;

    /// Largest record payload currently permitted; may depend on the
    /// active cipher parameters.
    fn max_payload(&self) -> usize {
        MAX_FRAGMENT_SIZE
    }

    /// Engage send coalescing on the underlying socket.
    fn cork(&mut self) {}

    /// Release send coalescing on the underlying socket.
    fn uncork(&mut self) {}

    /// Whether the caller had already corked the socket.
    fn was_corked(&self) -> bool {
        false
    }
}

/// Plaintext TLS record.
#[derive(Debug, Clone)]
pub struct Record {
    /// Content type.
    pub content_type: ContentType,
    /// Protocol version.
    pub version: [u8; 2],
    /// Record payload.
    pub fragment: Vec<u8>,
}

impl Record {
    /// Create a new record.
    pub fn new(content_type: ContentType, fragment: Vec<u8>) -> Self {
        Self {
            content_type,
            version: TlsVersion::Tls12.to_bytes(),
            fragment,
        }
    }

    /// Create a record with an explicit protocol version.
    pub fn with_version(content_type: ContentType, version: TlsVersion, fragment: Vec<u8>) -> Self {
        Self {
            content_type,
            version: version.to_bytes(),
            fragment,
        }
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(RECORD_HEADER_LEN + self.fragment.len());
        data.push(self.content_type as u8);
        data.extend_from_slice(&self.version);
        data.extend_from_slice(&(self.fragment.len() as u16).to_be_bytes());
        data.extend_from_slice(&self.fragment);
        data
    }
}

/// Buffer accumulating wire bytes until a complete record is present.
#[derive(Debug, Clone, Default)]
pub struct RecordBuffer {
    buffer: Vec<u8>,
}

impl RecordBuffer {
    /// Create a new record buffer.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append wire data to the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a complete record.
    ///
    /// Unknown content-type bytes are passed through; the driver is the
    /// one deciding whether to ignore them.
    pub fn try_read_record(&mut self) -> Result<Option<InboundRecord>, TlsError> {
        if self.buffer.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }

        let length = u16::from_be_bytes([self.buffer[3], self.buffer[4]]) as usize;
        if length > MAX_FRAGMENT_SIZE {
            return Err(TlsError::InvalidRecord);
        }
        if self.buffer.len() < RECORD_HEADER_LEN + length {
            return Ok(None);
        }

        let mut header = [0u8; RECORD_HEADER_LEN];
        header.copy_from_slice(&self.buffer[..RECORD_HEADER_LEN]);
        let body = self.buffer[RECORD_HEADER_LEN..RECORD_HEADER_LEN + length].to_vec();
        self.buffer.drain(..RECORD_HEADER_LEN + length);

        Ok(Some(InboundRecord {
            type_byte: header[0],
            header,
            body,
            sslv2: false,
        }))
    }

    /// Check if the buffer has a complete record.
    pub fn has_complete_record(&self) -> bool {
        if self.buffer.len() < RECORD_HEADER_LEN {
            return false;
        }
        let length = u16::from_be_bytes([self.buffer[3], self.buffer[4]]) as usize;
        self.buffer.len() >= RECORD_HEADER_LEN + length
    }

    /// Get buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
