//! Handshake shapes.
//!
//! A shape is a bitmask-identified ordered sequence of handshake
//! messages for one handshake flavor. Six bitmask values are populated;
//! every other value is unreachable in a correct driver and maps to an
//! empty sequence the driver asserts against.

use bitflags::bitflags;

use crate::message::HandshakeMessage;

bitflags! {
    /// Handshake flavor bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HandshakeShape: u8 {
        /// Negotiation has resolved.
        const NEGOTIATED = 0b00001;
        /// Full key establishment rather than resumption.
        const FULL_HANDSHAKE = 0b00010;
        /// Ephemeral key exchange adds ServerKeyExchange.
        const PERFECT_FORWARD_SECRECY = 0b00100;
        /// Stapled OCSP status adds CertificateStatus.
        const OCSP_STATUS = 0b01000;
        /// Abbreviated handshake from the session cache.
        const RESUME = 0b10000;
    }
}

impl Default for HandshakeShape {
    fn default() -> Self {
        Self::INITIAL
    }
}

use crate::message::HandshakeMessage::{
    ApplicationData, ClientChangeCipherSpec, ClientFinished, ClientHello, ClientKey,
    ServerCert, ServerCertStatus, ServerChangeCipherSpec, ServerFinished, ServerHello,
    ServerHelloDone, ServerKey,
};

/// Bootstrap sequence used until negotiation resolves.
const INITIAL_MESSAGES: &[HandshakeMessage] = &[ClientHello, ServerHello];

/// Abbreviated handshake.
const RESUME_MESSAGES: &[HandshakeMessage] = &[
    ClientHello,
    ServerHello,
    ServerChangeCipherSpec,
    ServerFinished,
    ClientChangeCipherSpec,
    ClientFinished,
    ApplicationData,
];

/// RSA key transport, no stapling.
const FULL_MESSAGES: &[HandshakeMessage] = &[
    ClientHello,
    ServerHello,
    ServerCert,
    ServerHelloDone,
    ClientKey,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    ApplicationData,
];

/// Ephemeral key exchange adds ServerKeyExchange.
const FULL_PFS_MESSAGES: &[HandshakeMessage] = &[
    ClientHello,
    ServerHello,
    ServerCert,
    ServerKey,
    ServerHelloDone,
    ClientKey,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    ApplicationData,
];

/// RSA key transport with a stapled OCSP response.
const FULL_OCSP_MESSAGES: &[HandshakeMessage] = &[
    ClientHello,
    ServerHello,
    ServerCert,
    ServerCertStatus,
    ServerHelloDone,
    ClientKey,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    ApplicationData,
];

/// Ephemeral key exchange and a stapled OCSP response.
const FULL_PFS_OCSP_MESSAGES: &[HandshakeMessage] = &[
    ClientHello,
    ServerHello,
    ServerCert,
    ServerCertStatus,
    ServerKey,
    ServerHelloDone,
    ClientKey,
    ClientChangeCipherSpec,
    ClientFinished,
    ServerChangeCipherSpec,
    ServerFinished,
    ApplicationData,
];

impl HandshakeShape {
    /// Bootstrap shape in force before negotiation resolves.
    pub const INITIAL: HandshakeShape = HandshakeShape::empty();

    /// The ordered message sequence for this shape.
    ///
    /// Returns an empty slice for bitmask values outside the six
    /// populated rows; the driver treats selecting one as a bug.
    pub fn sequence(self) -> &'static [HandshakeMessage] {
        const NEGOTIATED: HandshakeShape = HandshakeShape::NEGOTIATED;
        const RESUME: HandshakeShape =
            NEGOTIATED.union(HandshakeShape::RESUME);
        const FULL: HandshakeShape =
            NEGOTIATED.union(HandshakeShape::FULL_HANDSHAKE);
        const FULL_PFS: HandshakeShape =
            FULL.union(HandshakeShape::PERFECT_FORWARD_SECRECY);
        const FULL_OCSP: HandshakeShape = FULL.union(HandshakeShape::OCSP_STATUS);
        const FULL_PFS_OCSP: HandshakeShape =
            FULL_PFS.union(HandshakeShape::OCSP_STATUS);

        if self == HandshakeShape::INITIAL {
            INITIAL_MESSAGES
        } else if self == RESUME {
            RESUME_MESSAGES
        } else if self == FULL {
            FULL_MESSAGES
        } else if self == FULL_PFS {
            FULL_PFS_MESSAGES
        } else if self == FULL_OCSP {
            FULL_OCSP_MESSAGES
        } else if self == FULL_PFS_OCSP {
            FULL_PFS_OCSP_MESSAGES
        } else {
            &[]
        }
    }

    /// Whether this bitmask value is one of the populated rows.
    pub fn is_populated(self) -> bool {
        !self.sequence().is_empty()
    }

    /// Whether this shape resumes a cached session.
    pub fn is_resumption(self) -> bool {
        self.contains(HandshakeShape::RESUME)
    }

    /// Whether this shape performs full key establishment.
    pub fn is_full(self) -> bool {
        self.contains(HandshakeShape::FULL_HANDSHAKE)
    }
}
