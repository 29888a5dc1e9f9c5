//! Process-wide outbound HTTP client.
//!
//! Indexer searches and link resolution share one connection pool. When the
//! proxy setting changes the clients are rebuilt and swapped in place, so
//! requests issued afterwards never reuse connections pooled for the old
//! route; the old pool closes once in-flight requests drop their clones.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::redirect::Policy;

use super::dialer::{DialerError, Socks5Proxy};
use crate::config::NetworkConfig;
use crate::settings::ProxySettings;

/// Errors from building HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    InvalidProxy(#[from] DialerError),

    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug)]
struct Clients {
    /// Follows redirects, used for indexer APIs
    api: reqwest::Client,
    /// Never follows redirects, used to inspect indexer download links
    resolver: reqwest::Client,
    proxy_url: Option<String>,
}

/// Shared HTTP clients, rebuilt on proxy changes.
#[derive(Debug)]
pub struct HttpTransport {
    config: NetworkConfig,
    clients: RwLock<Arc<Clients>>,
}

impl HttpTransport {
    /// Builds the transport for the given proxy settings.
    ///
    /// # Errors
    ///
    /// - `TransportError::InvalidProxy` - Proxy enabled with an invalid URL
    /// - `TransportError::Build` - TLS backend or client setup failed
    pub fn new(config: NetworkConfig, proxy: &ProxySettings) -> Result<Self, TransportError> {
        let clients = build_clients(&config, proxy.active_url())?;
        Ok(Self {
            config,
            clients: RwLock::new(Arc::new(clients)),
        })
    }

    /// Rebuilds the clients for new proxy settings.
    ///
    /// On error the current clients stay in place.
    ///
    /// # Errors
    ///
    /// - `TransportError::InvalidProxy` - Proxy enabled with an invalid URL
    /// - `TransportError::Build` - Client setup failed
    pub fn reconfigure(&self, proxy: &ProxySettings) -> Result<(), TransportError> {
        let clients = build_clients(&self.config, proxy.active_url())?;
        tracing::info!(
            proxied = clients.proxy_url.is_some(),
            "HTTP transport rebuilt, previous connection pool retired"
        );
        *self.clients.write() = Arc::new(clients);
        Ok(())
    }

    /// Client for API calls. Follows redirects.
    pub fn client(&self) -> reqwest::Client {
        self.clients.read().api.clone()
    }

    /// Client that never follows redirects.
    pub fn resolver(&self) -> reqwest::Client {
        self.clients.read().resolver.clone()
    }

    /// Proxy URL the current clients route through, if any.
    pub fn proxy_url(&self) -> Option<String> {
        self.clients.read().proxy_url.clone()
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// One-off client routed through `proxy_url`, for checking a proxy before
    /// it is saved. Uses the shorter proxy check timeout.
    ///
    /// # Errors
    ///
    /// - `TransportError::InvalidProxy` - `proxy_url` is not a valid SOCKS5 URL
    /// - `TransportError::Build` - Client setup failed
    pub fn proxy_check_client(&self, proxy_url: &str) -> Result<reqwest::Client, TransportError> {
        Socks5Proxy::from_url(proxy_url)?;
        let client = base_builder(&self.config)
            .timeout(self.config.proxy_check_timeout)
            .proxy(reqwest::Proxy::all(proxy_url.trim())?)
            .build()?;
        Ok(client)
    }
}

fn base_builder(config: &NetworkConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(config.user_agent)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
}

fn build_clients(config: &NetworkConfig, proxy_url: Option<&str>) -> Result<Clients, TransportError> {
    let proxy = match proxy_url {
        Some(url) => {
            // Same acceptance rules as the engine dialer
            Socks5Proxy::from_url(url)?;
            Some(reqwest::Proxy::all(url.trim())?)
        }
        None => None,
    };

    let build = |redirect: Policy| -> Result<reqwest::Client, reqwest::Error> {
        let builder = base_builder(config).redirect(redirect);
        match &proxy {
            Some(proxy) => builder.proxy(proxy.clone()).build(),
            None => builder.no_proxy().build(),
        }
    };

    Ok(Clients {
        api: build(Policy::default())?,
        resolver: build(Policy::none())?,
        proxy_url: proxy_url.map(|url| url.trim().to_string()),
    })
}
