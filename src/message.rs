//! Handshake message catalogue.
//!
//! Each logical handshake message maps to a static descriptor: the
//! record type carrying it, its wire message-type byte, the endpoint
//! that writes it, and whether a payload handler exists for each
//! endpoint role. The catalogue is fixed at compile time; sequencing
//! across messages lives in [`crate::shape`].

use crate::record::ContentType;
use crate::Mode;

/// Wire handshake message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    CertificateStatus = 22,
}

impl HandshakeType {
    /// Parse from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(HandshakeType::HelloRequest),
            1 => Some(HandshakeType::ClientHello),
            2 => Some(HandshakeType::ServerHello),
            11 => Some(HandshakeType::Certificate),
            12 => Some(HandshakeType::ServerKeyExchange),
            13 => Some(HandshakeType::CertificateRequest),
            14 => Some(HandshakeType::ServerHelloDone),
            15 => Some(HandshakeType::CertificateVerify),
            16 => Some(HandshakeType::ClientKeyExchange),
            20 => Some(HandshakeType::Finished),
            22 => Some(HandshakeType::CertificateStatus),
            _ => None,
        }
    }
}

/// Logical handshake message.
///
/// One value per protocol step; a single message may span several
/// records on the wire. `ApplicationData` is the terminal sentinel the
/// driver stops at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMessage {
    ClientHello,
    ServerHello,
    ServerCert,
    ServerCertStatus,
    ServerKey,
    ServerCertReq,
    ServerHelloDone,
    ClientCert,
    ClientKey,
    ClientCertVerify,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    ApplicationData,
}

/// Endpoint that writes a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Writer {
    /// Written by the client.
    Client,
    /// Written by the server.
    Server,
    /// Terminal slot; both endpoints may write application data.
    Both,
}

/// Whether a payload handler exists for a catalogue cell.
///
/// Client authentication messages sit in the catalogue with no handler
/// on either side; dispatching into such a cell is a programming error,
/// never a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerSlot {
    /// A payload handler is available.
    Supported,
    /// No payload handler; reaching this cell is a bug.
    Unsupported,
}

impl HandlerSlot {
    /// Whether the cell has no handler.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, HandlerSlot::Unsupported)
    }
}

/// Static per-message descriptor.
#[derive(Debug, Clone, Copy)]
pub struct MessageDescriptor {
    /// Record type carrying the message.
    pub record_type: ContentType,
    /// Wire message-type byte; `None` for non-handshake records.
    pub wire_type: Option<HandshakeType>,
    /// Endpoint that writes the message.
    pub writer: Writer,
    /// Handler availability on the server side.
    pub server_handler: HandlerSlot,
    /// Handler availability on the client side.
    pub client_handler: HandlerSlot,
}

impl MessageDescriptor {
    /// Handler availability for the given endpoint role.
    pub fn handler_for(&self, mode: Mode) -> HandlerSlot {
        match mode {
            Mode::Server => self.server_handler,
            Mode::Client => self.client_handler,
        }
    }
}

use self::HandlerSlot::{Supported, Unsupported};
use crate::record::ContentType::{ApplicationData, ChangeCipherSpec, Handshake};

const fn handshake(
    wire_type: HandshakeType,
    writer: Writer,
    server_handler: HandlerSlot,
    client_handler: HandlerSlot,
) -> MessageDescriptor {
    MessageDescriptor {
        record_type: Handshake,
        wire_type: Some(wire_type),
        writer,
        server_handler,
        client_handler,
    }
}

const fn change_cipher_spec(writer: Writer) -> MessageDescriptor {
    MessageDescriptor {
        record_type: ChangeCipherSpec,
        wire_type: None,
        writer,
        server_handler: Supported,
        client_handler: Supported,
    }
}

impl HandshakeMessage {
    /// Look up the static descriptor for this message.
    pub const fn descriptor(self) -> MessageDescriptor {
        match self {
            HandshakeMessage::ClientHello => {
                handshake(HandshakeType::ClientHello, Writer::Client, Supported, Supported)
            }
            HandshakeMessage::ServerHello => {
                handshake(HandshakeType::ServerHello, Writer::Server, Supported, Supported)
            }
            HandshakeMessage::ServerCert => {
                handshake(HandshakeType::Certificate, Writer::Server, Supported, Supported)
            }
            HandshakeMessage::ServerCertStatus => handshake(
                HandshakeType::CertificateStatus,
                Writer::Server,
                Supported,
                Supported,
            ),
            HandshakeMessage::ServerKey => handshake(
                HandshakeType::ServerKeyExchange,
                Writer::Server,
                Supported,
                Supported,
            ),
            HandshakeMessage::ServerCertReq => handshake(
                HandshakeType::CertificateRequest,
                Writer::Server,
                Unsupported,
                Unsupported,
            ),
            HandshakeMessage::ServerHelloDone => handshake(
                HandshakeType::ServerHelloDone,
                Writer::Server,
                Supported,
                Supported,
            ),
            HandshakeMessage::ClientCert => handshake(
                HandshakeType::Certificate,
                Writer::Client,
                Unsupported,
                Unsupported,
            ),
            HandshakeMessage::ClientKey => handshake(
                HandshakeType::ClientKeyExchange,
                Writer::Client,
                Supported,
                Supported,
            ),
            HandshakeMessage::ClientCertVerify => handshake(
                HandshakeType::CertificateVerify,
                Writer::Client,
                Unsupported,
                Unsupported,
            ),
            HandshakeMessage::ClientChangeCipherSpec => change_cipher_spec(Writer::Client),
            HandshakeMessage::ClientFinished => {
                handshake(HandshakeType::Finished, Writer::Client, Supported, Supported)
            }
            HandshakeMessage::ServerChangeCipherSpec => change_cipher_spec(Writer::Server),
            HandshakeMessage::ServerFinished => {
                handshake(HandshakeType::Finished, Writer::Server, Supported, Supported)
            }
            HandshakeMessage::ApplicationData => MessageDescriptor {
                record_type: ApplicationData,
                wire_type: None,
                writer: Writer::Both,
                server_handler: Unsupported,
                client_handler: Unsupported,
            },
        }
    }
}
