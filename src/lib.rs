//! Lockstep TLS handshake engine.
//!
//! This crate implements the handshake driver for TLS 1.0, 1.1 and 1.2:
//! the state machine that decides which handshake message comes next,
//! which endpoint writes it, how it is framed into record-layer records,
//! and how inbound records are defragmented back into messages while the
//! running transcript hashes are maintained for Finished verification.
//!
//! # Architecture
//!
//! The driver is organized into:
//!
//! - `message`: the catalogue of logical handshake messages
//! - `shape`: the ordered message sequences, one per handshake flavor
//! - `transcript`: the running multi-digest over all handshake bytes
//! - `scratch`: the per-connection handshake I/O buffer
//! - `record`: the record-layer interface and plaintext framing helpers
//! - `session`: the resumption cache interface
//! - `handshake`: the connection state and the `negotiate` driver loop
//!
//! Record encryption, socket I/O, payload codecs and alert policy are
//! external collaborators: the driver consumes them through the
//! [`RecordIo`], [`MessageHandlers`] and [`SessionCache`] traits.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod handshake;
pub mod message;
pub mod record;
pub mod scratch;
pub mod session;
pub mod shape;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testutil;

use alloc::vec::Vec;
use core::fmt;

pub use handshake::{Connection, MessageHandlers};
pub use message::{HandshakeMessage, HandshakeType, Writer};
pub use record::{ContentType, InboundRecord, RecordIo};
pub use session::{MemorySessionCache, SessionCache};
pub use shape::HandshakeShape;
pub use transcript::Transcript;

/// Endpoint role, fixed at connection construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Initiating endpoint.
    Client,
    /// Accepting endpoint.
    Server,
}

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.0.
    Tls10,
    /// TLS 1.1.
    Tls11,
    /// TLS 1.2.
    Tls12,
}

impl TlsVersion {
    /// Get the protocol version bytes.
    pub fn to_bytes(&self) -> [u8; 2] {
        match self {
            TlsVersion::Tls10 => [0x03, 0x01],
            TlsVersion::Tls11 => [0x03, 0x02],
            TlsVersion::Tls12 => [0x03, 0x03],
        }
    }

    /// Parse from bytes.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        match bytes {
            [0x03, 0x01] => Some(TlsVersion::Tls10),
            [0x03, 0x02] => Some(TlsVersion::Tls11),
            [0x03, 0x03] => Some(TlsVersion::Tls12),
            _ => None,
        }
    }
}

/// Key-exchange algorithm of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchange {
    /// RSA key transport.
    Rsa,
    /// Ephemeral finite-field Diffie-Hellman.
    Dhe,
    /// Ephemeral elliptic-curve Diffie-Hellman.
    Ecdhe,
}

impl KeyExchange {
    /// Whether the exchange uses ephemeral keys (forward secrecy).
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, KeyExchange::Dhe | KeyExchange::Ecdhe)
    }
}

/// TLS cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    /// TLS_RSA_WITH_AES_128_CBC_SHA.
    RsaAes128CbcSha,
    /// TLS_RSA_WITH_AES_256_CBC_SHA.
    RsaAes256CbcSha,
    /// TLS_RSA_WITH_AES_128_GCM_SHA256.
    RsaAes128GcmSha256,
    /// TLS_DHE_RSA_WITH_AES_128_CBC_SHA.
    DheRsaAes128CbcSha,
    /// TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA.
    EcdheRsaAes128CbcSha,
    /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256.
    EcdheRsaAes128GcmSha256,
    /// TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384.
    EcdheRsaAes256GcmSha384,
    /// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256.
    EcdheEcdsaAes128GcmSha256,
}

impl CipherSuite {
    /// Get cipher suite ID.
    pub fn to_id(&self) -> u16 {
        match self {
            CipherSuite::RsaAes128CbcSha => 0x002F,
            CipherSuite::RsaAes256CbcSha => 0x0035,
            CipherSuite::RsaAes128GcmSha256 => 0x009C,
            CipherSuite::DheRsaAes128CbcSha => 0x0033,
            CipherSuite::EcdheRsaAes128CbcSha => 0xC013,
            CipherSuite::EcdheRsaAes128GcmSha256 => 0xC02F,
            CipherSuite::EcdheRsaAes256GcmSha384 => 0xC030,
            CipherSuite::EcdheEcdsaAes128GcmSha256 => 0xC02B,
        }
    }

    /// Parse from ID.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x002F => Some(CipherSuite::RsaAes128CbcSha),
            0x0035 => Some(CipherSuite::RsaAes256CbcSha),
            0x009C => Some(CipherSuite::RsaAes128GcmSha256),
            0x0033 => Some(CipherSuite::DheRsaAes128CbcSha),
            0xC013 => Some(CipherSuite::EcdheRsaAes128CbcSha),
            0xC02F => Some(CipherSuite::EcdheRsaAes128GcmSha256),
            0xC030 => Some(CipherSuite::EcdheRsaAes256GcmSha384),
            0xC02B => Some(CipherSuite::EcdheEcdsaAes128GcmSha256),
            _ => None,
        }
    }

    /// Get the key-exchange algorithm.
    pub fn key_exchange(&self) -> KeyExchange {
        match self {
            CipherSuite::RsaAes128CbcSha
            | CipherSuite::RsaAes256CbcSha
            | CipherSuite::RsaAes128GcmSha256 => KeyExchange::Rsa,
            CipherSuite::DheRsaAes128CbcSha => KeyExchange::Dhe,
            CipherSuite::EcdheRsaAes128CbcSha
            | CipherSuite::EcdheRsaAes128GcmSha256
            | CipherSuite::EcdheRsaAes256GcmSha384
            | CipherSuite::EcdheEcdsaAes128GcmSha256 => KeyExchange::Ecdhe,
        }
    }
}

/// TLS alert description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    RecordOverflow = 22,
    NoCertificateReserved = 41,
    HandshakeFailure = 40,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    AccessDenied = 49,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    UserCanceled = 90,
    NoRenegotiation = 100,
    UnsupportedExtension = 110,
}

impl AlertDescription {
    /// Parse from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(AlertDescription::CloseNotify),
            10 => Some(AlertDescription::UnexpectedMessage),
            20 => Some(AlertDescription::BadRecordMac),
            22 => Some(AlertDescription::RecordOverflow),
            40 => Some(AlertDescription::HandshakeFailure),
            41 => Some(AlertDescription::NoCertificateReserved),
            42 => Some(AlertDescription::BadCertificate),
            43 => Some(AlertDescription::UnsupportedCertificate),
            44 => Some(AlertDescription::CertificateRevoked),
            45 => Some(AlertDescription::CertificateExpired),
            46 => Some(AlertDescription::CertificateUnknown),
            47 => Some(AlertDescription::IllegalParameter),
            48 => Some(AlertDescription::UnknownCa),
            49 => Some(AlertDescription::AccessDenied),
            50 => Some(AlertDescription::DecodeError),
            51 => Some(AlertDescription::DecryptError),
            70 => Some(AlertDescription::ProtocolVersion),
            71 => Some(AlertDescription::InsufficientSecurity),
            80 => Some(AlertDescription::InternalError),
            90 => Some(AlertDescription::UserCanceled),
            100 => Some(AlertDescription::NoRenegotiation),
            110 => Some(AlertDescription::UnsupportedExtension),
            _ => None,
        }
    }
}

/// Direction a would-block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocked {
    /// Waiting for inbound data.
    Read,
    /// Waiting for outbound capacity.
    Write,
}

/// TLS error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsError {
    /// I/O could not make progress; retry once the socket is ready.
    WouldBlock(Blocked),
    /// A record or message violated the handshake sequence.
    BadMessage,
    /// Handshake message body over the permitted length.
    MessageTooLarge(usize),
    /// Malformed record framing.
    InvalidRecord,
    /// Handshake failure.
    HandshakeFailure,
    /// Cipher suite not supported.
    UnsupportedCipherSuite,
    /// Bad certificate.
    BadCertificate,
    /// Decryption error.
    DecryptError,
    /// Alert received.
    AlertReceived(AlertDescription),
    /// Programming error inside the driver or its collaborators.
    Internal,
    /// Connection is dead; no further driving is possible.
    Closed,
}

impl TlsError {
    /// Whether the error is a transient would-block.
    pub fn is_would_block(&self) -> bool {
        matches!(self, TlsError::WouldBlock(_))
    }
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsError::WouldBlock(Blocked::Read) => write!(f, "Blocked on read"),
            TlsError::WouldBlock(Blocked::Write) => write!(f, "Blocked on write"),
            TlsError::BadMessage => write!(f, "Unexpected handshake message"),
            TlsError::MessageTooLarge(n) => write!(f, "Handshake message too large ({} bytes)", n),
            TlsError::InvalidRecord => write!(f, "Invalid record"),
            TlsError::HandshakeFailure => write!(f, "Handshake failure"),
            TlsError::UnsupportedCipherSuite => write!(f, "Unsupported cipher suite"),
            TlsError::BadCertificate => write!(f, "Bad certificate"),
            TlsError::DecryptError => write!(f, "Decryption error"),
            TlsError::AlertReceived(desc) => write!(f, "Alert received: {:?}", desc),
            TlsError::Internal => write!(f, "Internal error"),
            TlsError::Closed => write!(f, "Connection closed"),
        }
    }
}

#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
impl std::error::Error for TlsError {}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Protocol version advertised to the record layer.
    pub version: TlsVersion,
    /// Whether to consult the session cache during negotiation.
    pub session_resumption: bool,
    /// Whether the driver may coalesce consecutive outgoing records by
    /// corking the underlying socket.
    pub cork_io: bool,
    /// Stapled OCSP response, if the server has one to offer.
    pub ocsp_response: Option<Vec<u8>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: TlsVersion::Tls12,
            session_resumption: false,
            cork_io: false,
            ocsp_response: None,
        }
    }
}
