//! Handshake I/O buffer.
//!
//! One in-flight handshake message lives here: outbound messages are
//! composed into the buffer before framing, inbound fragmented messages
//! are reassembled in it. The buffer distinguishes "wiped" (nothing
//! written for the current message yet) from merely empty, because that
//! flag gates the one-shot header and payload construction in the
//! writer.

use alloc::vec::Vec;

/// Per-connection handshake message buffer.
#[derive(Debug, Clone)]
pub struct ScratchBuffer {
    data: Vec<u8>,
    read: usize,
    wiped: bool,
}

impl ScratchBuffer {
    /// Create a new, wiped buffer.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            read: 0,
            wiped: true,
        }
    }

    /// Whether nothing has been written since the last wipe.
    pub fn is_wiped(&self) -> bool {
        self.wiped
    }

    /// Append bytes, clearing the wiped flag.
    pub fn write(&mut self, bytes: &[u8]) {
        self.wiped = false;
        self.data.extend_from_slice(bytes);
    }

    /// Total bytes held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All bytes held, regardless of the read cursor.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes past the read cursor.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.read..]
    }

    /// Number of bytes past the read cursor.
    pub fn unread_len(&self) -> usize {
        self.data.len() - self.read
    }

    /// Advance the read cursor.
    pub fn advance(&mut self, n: usize) {
        self.read = (self.read + n).min(self.data.len());
    }

    /// Place the read cursor at an absolute offset.
    pub fn set_read(&mut self, offset: usize) {
        self.read = offset.min(self.data.len());
    }

    /// Move the read cursor back to the start, keeping the bytes.
    pub fn rewind(&mut self) {
        self.read = 0;
    }

    /// Overwrite bytes at an absolute offset.
    ///
    /// Used to backfill the length field of a handshake header once the
    /// body size is known. The range must already exist.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Drop all bytes and mark the buffer wiped.
    pub fn wipe(&mut self) {
        self.data.clear();
        self.read = 0;
        self.wiped = true;
    }

    /// Wipe and release the backing storage.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.read = 0;
        self.wiped = true;
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}
