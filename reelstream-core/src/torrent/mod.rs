//! Torrent identity and metadata: info hashes, magnet links and `.torrent` files.

pub mod magnet;
pub mod metainfo;

use std::fmt;

use data_encoding::BASE32;

pub use magnet::MagnetLink;
pub use metainfo::{MetainfoFile, TorrentMetainfo};

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary. Its lowercase hex form is the
/// session identifier used throughout the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40 character hex hash, either case.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidInfoHash` - Wrong length or non-hex characters
    pub fn from_hex(value: &str) -> Result<Self, TorrentError> {
        let mut hash = [0u8; 20];
        hex::decode_to_slice(value, &mut hash).map_err(|e| TorrentError::InvalidInfoHash {
            reason: format!("{value}: {e}"),
        })?;
        Ok(Self(hash))
    }

    /// Parses a 32 character RFC 4648 base32 hash as found in older magnets.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidInfoHash` - Wrong length or invalid alphabet
    pub fn from_base32(value: &str) -> Result<Self, TorrentError> {
        let invalid = |reason: String| TorrentError::InvalidInfoHash {
            reason: format!("{value}: {reason}"),
        };
        if value.len() != 32 {
            return Err(invalid(format!("expected 32 base32 characters, got {}", value.len())));
        }

        let decoded = BASE32
            .decode(value.to_ascii_uppercase().as_bytes())
            .map_err(|e| invalid(e.to_string()))?;
        let hash: [u8; 20] = decoded
            .try_into()
            .map_err(|_| invalid("decoded hash is not 20 bytes".to_string()))?;
        Ok(Self(hash))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Errors from parsing torrent identities and metadata.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("Invalid magnet link: {reason}")]
    InvalidMagnet { reason: String },

    #[error("Invalid info hash: {reason}")]
    InvalidInfoHash { reason: String },

    #[error("Failed to parse torrent file: {reason}")]
    InvalidTorrentFile { reason: String },
}
