//! Running handshake transcript.
//!
//! All four digests any TLS 1.0-1.2 cipher suite may need for its
//! Finished computation are maintained in parallel, fed with every
//! handshake byte in exact send/receive order. ChangeCipherSpec and
//! alert records never enter the transcript.

use core::fmt;

use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

/// Running multi-digest over the handshake byte stream.
#[derive(Clone)]
pub struct Transcript {
    md5: Md5,
    sha1: Sha1,
    sha256: Sha256,
    sha384: Sha384,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self {
            md5: Md5::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
            sha384: Sha384::new(),
        }
    }

    /// Feed handshake bytes into all digests.
    pub fn update(&mut self, bytes: &[u8]) {
        self.md5.update(bytes);
        self.sha1.update(bytes);
        self.sha256.update(bytes);
        self.sha384.update(bytes);
    }

    /// Current MD5 state, finalized on a clone.
    pub fn md5(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.md5.clone().finalize());
        out
    }

    /// Current SHA-1 state, finalized on a clone.
    pub fn sha1(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.sha1.clone().finalize());
        out
    }

    /// Concatenated MD5 and SHA-1 states, the TLS 1.0/1.1 PRF input.
    pub fn md5_sha1(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..16].copy_from_slice(&self.md5());
        out[16..].copy_from_slice(&self.sha1());
        out
    }

    /// Current SHA-256 state, finalized on a clone.
    pub fn sha256(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.sha256.clone().finalize());
        out
    }

    /// Current SHA-384 state, finalized on a clone.
    pub fn sha384(&self) -> [u8; 48] {
        let mut out = [0u8; 48];
        out.copy_from_slice(&self.sha384.clone().finalize());
        out
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript").finish_non_exhaustive()
    }
}
