//! Outbound TCP dialers for torrent engines: direct or through SOCKS5.
//!
//! A [`Dialer`] is built once per session from the settings snapshot and
//! handed to the engine at construction time. The hop to the proxy itself is
//! always a direct TCP connection.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::{Host, Url};

use crate::config::NetworkConfig;
use crate::settings::Settings;

const SOCKS_VERSION: u8 = 0x05;
const AUTH_NONE: u8 = 0x00;
const AUTH_USERNAME_PASSWORD: u8 = 0x02;
const AUTH_NO_ACCEPTABLE: u8 = 0xFF;
const USERPASS_VERSION: u8 = 0x01;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const DEFAULT_SOCKS_PORT: u16 = 1080;

/// Errors from building or using a dialer.
#[derive(Debug, thiserror::Error)]
pub enum DialerError {
    #[error("Invalid proxy configuration: {reason}")]
    InvalidProxyConfig { reason: String },

    #[error("Connection to {target} timed out")]
    Timeout { target: String },

    #[error("SOCKS5 handshake with {proxy} failed: {reason}")]
    Handshake { proxy: String, reason: String },

    #[error("Failed to resolve {host}")]
    Resolve { host: String },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// RFC 1929 username/password credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SOCKS5 proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Proxy {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    /// `socks5h`: domain names are resolved by the proxy instead of locally
    pub remote_dns: bool,
}

impl Socks5Proxy {
    /// Parses `socks5://[user[:pass]@]host[:port]` or the `socks5h` variant.
    ///
    /// # Errors
    ///
    /// - `DialerError::InvalidProxyConfig` - Unparsable URL, other scheme,
    ///   missing host or credentials longer than 255 bytes
    pub fn from_url(proxy_url: &str) -> Result<Self, DialerError> {
        let invalid = |reason: String| DialerError::InvalidProxyConfig { reason };

        let url = Url::parse(proxy_url.trim()).map_err(|e| invalid(format!("{proxy_url}: {e}")))?;
        let remote_dns = match url.scheme() {
            "socks5" => false,
            "socks5h" => true,
            other => return Err(invalid(format!("unsupported proxy scheme '{other}'"))),
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(invalid(format!("{proxy_url}: missing proxy host"))),
        };

        let credentials = if url.username().is_empty() {
            None
        } else {
            let username = percent_decode(url.username())?;
            let password = percent_decode(url.password().unwrap_or_default())?;
            if username.len() > 255 || password.len() > 255 {
                return Err(invalid(
                    "proxy username and password must be at most 255 bytes".to_string(),
                ));
            }
            Some(Credentials { username, password })
        };

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_SOCKS_PORT),
            credentials,
            remote_dns,
        })
    }

    fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn percent_decode(value: &str) -> Result<String, DialerError> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| DialerError::InvalidProxyConfig {
            reason: "proxy credentials are not valid UTF-8".to_string(),
        })
}

/// How a dialer reaches its targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialRoute {
    Direct,
    Socks5(Socks5Proxy),
}

/// Opens outbound TCP connections for one session's engine.
#[derive(Debug, Clone)]
pub struct Dialer {
    route: DialRoute,
    connect_timeout: Duration,
}

impl Dialer {
    pub fn direct(connect_timeout: Duration) -> Self {
        Self {
            route: DialRoute::Direct,
            connect_timeout,
        }
    }

    pub fn socks5(proxy: Socks5Proxy, connect_timeout: Duration) -> Self {
        Self {
            route: DialRoute::Socks5(proxy),
            connect_timeout,
        }
    }

    pub fn route(&self) -> &DialRoute {
        &self.route
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self.route, DialRoute::Socks5(_))
    }

    /// Connects to `host:port`, through the proxy when one is configured.
    ///
    /// The whole operation, including the SOCKS5 handshake, is bounded by
    /// the connect timeout.
    ///
    /// # Errors
    ///
    /// - `DialerError::Timeout` - Connect or handshake took too long
    /// - `DialerError::Handshake` - The proxy rejected auth or the CONNECT
    /// - `DialerError::Io` - Socket failure
    pub async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, DialerError> {
        let target = format!("{host}:{port}");
        let attempt = async {
            match &self.route {
                DialRoute::Direct => TcpStream::connect((host, port))
                    .await
                    .map_err(DialerError::from),
                DialRoute::Socks5(proxy) => socks5_connect(proxy, host, port).await,
            }
        };

        tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| DialerError::Timeout { target })?
    }
}

/// Builds dialers from proxy settings.
#[derive(Debug, Clone)]
pub struct DialerFactory {
    connect_timeout: Duration,
}

impl DialerFactory {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
        }
    }

    /// Builds a dialer for `proxy_url`, or a direct dialer when `None`.
    ///
    /// # Errors
    ///
    /// - `DialerError::InvalidProxyConfig` - The proxy URL is not a valid SOCKS5 URL
    pub fn build(&self, proxy_url: Option<&str>) -> Result<Dialer, DialerError> {
        match proxy_url {
            None => Ok(Dialer::direct(self.connect_timeout)),
            Some(url) => Ok(Dialer::socks5(
                Socks5Proxy::from_url(url)?,
                self.connect_timeout,
            )),
        }
    }

    /// Builds the dialer a session created with `settings` should use.
    ///
    /// # Errors
    ///
    /// - `DialerError::InvalidProxyConfig` - Proxy enabled with an invalid URL
    pub fn for_settings(&self, settings: &Settings) -> Result<Dialer, DialerError> {
        self.build(settings.proxy().active_url())
    }
}

async fn socks5_connect(
    proxy: &Socks5Proxy,
    host: &str,
    port: u16,
) -> Result<TcpStream, DialerError> {
    let proxy_addr = proxy.address();
    let handshake_error = |reason: String| DialerError::Handshake {
        proxy: proxy_addr.clone(),
        reason,
    };

    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;

    let greeting: &[u8] = if proxy.credentials.is_some() {
        &[SOCKS_VERSION, 2, AUTH_NONE, AUTH_USERNAME_PASSWORD]
    } else {
        &[SOCKS_VERSION, 1, AUTH_NONE]
    };
    stream.write_all(greeting).await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != SOCKS_VERSION {
        return Err(handshake_error(format!("unexpected version {}", choice[0])));
    }
    match (choice[1], &proxy.credentials) {
        (AUTH_NONE, _) => {}
        (AUTH_USERNAME_PASSWORD, Some(credentials)) => {
            if !authenticate(&mut stream, credentials).await? {
                return Err(handshake_error("username/password rejected".to_string()));
            }
        }
        (AUTH_NO_ACCEPTABLE, _) => {
            return Err(handshake_error("no acceptable auth method".to_string()));
        }
        (method, _) => {
            return Err(handshake_error(format!("unsupported auth method {method}")));
        }
    }

    let request = connect_request(proxy, host, port).await?;
    stream.write_all(&request).await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS_VERSION {
        return Err(handshake_error(format!("unexpected version {}", reply[0])));
    }
    if reply[1] != 0x00 {
        return Err(handshake_error(reply_message(reply[1]).to_string()));
    }

    // Bound address is unused
    let skip = match reply[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => usize::from(stream.read_u8().await?) + 2,
        other => return Err(handshake_error(format!("unknown address type {other}"))),
    };
    let mut bound = vec![0u8; skip];
    stream.read_exact(&mut bound).await?;

    tracing::trace!(proxy = %proxy_addr, target = %format!("{host}:{port}"), "SOCKS5 tunnel established");
    Ok(stream)
}

/// Returns whether the proxy accepted the credentials.
async fn authenticate(
    stream: &mut TcpStream,
    credentials: &Credentials,
) -> Result<bool, DialerError> {
    let username = credentials.username.as_bytes();
    let password = credentials.password.as_bytes();

    let mut request = Vec::with_capacity(3 + username.len() + password.len());
    request.push(USERPASS_VERSION);
    request.push(username.len() as u8);
    request.extend_from_slice(username);
    request.push(password.len() as u8);
    request.extend_from_slice(password);
    stream.write_all(&request).await?;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await?;
    Ok(status[1] == 0x00)
}

async fn connect_request(
    proxy: &Socks5Proxy,
    host: &str,
    port: u16,
) -> Result<Vec<u8>, DialerError> {
    let address = match host.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) if proxy.remote_dns => None,
        Err(_) => {
            let resolved = tokio::net::lookup_host((host, port))
                .await?
                .next()
                .ok_or_else(|| DialerError::Resolve {
                    host: host.to_string(),
                })?;
            Some(resolved.ip())
        }
    };

    let mut request = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];
    match address {
        Some(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Some(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        None => {
            let domain = host.as_bytes();
            if domain.len() > 255 {
                return Err(DialerError::Resolve {
                    host: host.to_string(),
                });
            }
            request.push(ATYP_DOMAIN);
            request.push(domain.len() as u8);
            request.extend_from_slice(domain);
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    Ok(request)
}

fn reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown SOCKS5 reply",
    }
}
