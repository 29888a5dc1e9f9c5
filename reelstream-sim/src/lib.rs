//! Reelstream Sim - a torrent engine backed by a local media library.
//!
//! Each top-level entry of the library directory is offered as one torrent
//! whose info hash is the SHA-1 of the entry name. Adding its magnet makes
//! metadata known after a short delay and copies the content into the
//! session directory at a throttled rate, so reads block on missing bytes
//! the way they would during a real download.

pub mod engine;
pub mod library;

pub use engine::{LibraryEngine, LibraryEngineFactory};
pub use library::{LibraryEntry, LibraryFile, entry_hash, scan_library};
