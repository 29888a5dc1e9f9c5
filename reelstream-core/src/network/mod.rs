//! Outbound networking: listening ports, proxy dialers and the shared HTTP client.
//!
//! Two consumers share one proxy setting without sharing code paths: torrent
//! engines receive a [`Dialer`] per session, while indexer calls and link
//! resolution go through the process-wide [`HttpTransport`].

pub mod dialer;
pub mod ports;
pub mod transport;

pub use dialer::{DialRoute, Dialer, DialerError, DialerFactory, Socks5Proxy};
pub use ports::{PortAllocator, PortLease};
pub use transport::{HttpTransport, TransportError};
