//! User-facing settings: proxy and indexer endpoints.
//!
//! Settings live in memory for the lifetime of the process. Readers take an
//! immutable `Arc<Settings>` snapshot so a session keeps the values it was
//! created with even if the user changes them later.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Complete settings record, serialized with the camelCase keys the API uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enable_proxy: bool,
    pub proxy_url: String,
    pub enable_prowlarr: bool,
    pub prowlarr_host: String,
    pub prowlarr_api_key: String,
    pub enable_jackett: bool,
    pub jackett_host: String,
    pub jackett_api_key: String,
}

/// Proxy section as posted by the settings API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxySettings {
    pub enable_proxy: bool,
    pub proxy_url: String,
}

impl ProxySettings {
    /// Returns the proxy URL when proxying is enabled and a URL is set.
    pub fn active_url(&self) -> Option<&str> {
        let url = self.proxy_url.trim();
        (self.enable_proxy && !url.is_empty()).then_some(url)
    }
}

/// Prowlarr section as posted by the settings API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProwlarrSettings {
    pub enable_prowlarr: bool,
    pub prowlarr_host: String,
    pub prowlarr_api_key: String,
}

/// Jackett section as posted by the settings API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JackettSettings {
    pub enable_jackett: bool,
    pub jackett_host: String,
    pub jackett_api_key: String,
}

/// Host and key of a configured indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerEndpoint {
    /// Base URL without trailing slash
    pub host: String,
    pub api_key: String,
}

impl IndexerEndpoint {
    /// Builds an endpoint, rejecting blank host or key.
    pub fn new(host: &str, api_key: &str) -> Option<Self> {
        let host = host.trim().trim_end_matches('/');
        let api_key = api_key.trim();
        if host.is_empty() || api_key.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl ProwlarrSettings {
    /// Endpoint of the indexer, ignoring the enable flag.
    pub fn endpoint(&self) -> Option<IndexerEndpoint> {
        IndexerEndpoint::new(&self.prowlarr_host, &self.prowlarr_api_key)
    }
}

impl JackettSettings {
    /// Endpoint of the indexer, ignoring the enable flag.
    pub fn endpoint(&self) -> Option<IndexerEndpoint> {
        IndexerEndpoint::new(&self.jackett_host, &self.jackett_api_key)
    }
}

impl Settings {
    /// Initial settings from `REELSTREAM_*` environment variables.
    ///
    /// A non-empty `REELSTREAM_PROXY_URL` enables the proxy; an indexer is
    /// enabled when both its host and API key variables are present.
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).unwrap_or_default().trim().to_string();

        let proxy_url = var("REELSTREAM_PROXY_URL");
        let prowlarr_host = var("REELSTREAM_PROWLARR_HOST");
        let prowlarr_api_key = var("REELSTREAM_PROWLARR_API_KEY");
        let jackett_host = var("REELSTREAM_JACKETT_HOST");
        let jackett_api_key = var("REELSTREAM_JACKETT_API_KEY");

        Self {
            enable_proxy: !proxy_url.is_empty(),
            proxy_url,
            enable_prowlarr: !prowlarr_host.is_empty() && !prowlarr_api_key.is_empty(),
            prowlarr_host,
            prowlarr_api_key,
            enable_jackett: !jackett_host.is_empty() && !jackett_api_key.is_empty(),
            jackett_host,
            jackett_api_key,
        }
    }

    pub fn proxy(&self) -> ProxySettings {
        ProxySettings {
            enable_proxy: self.enable_proxy,
            proxy_url: self.proxy_url.clone(),
        }
    }

    pub fn prowlarr(&self) -> ProwlarrSettings {
        ProwlarrSettings {
            enable_prowlarr: self.enable_prowlarr,
            prowlarr_host: self.prowlarr_host.clone(),
            prowlarr_api_key: self.prowlarr_api_key.clone(),
        }
    }

    pub fn jackett(&self) -> JackettSettings {
        JackettSettings {
            enable_jackett: self.enable_jackett,
            jackett_host: self.jackett_host.clone(),
            jackett_api_key: self.jackett_api_key.clone(),
        }
    }

    /// Prowlarr endpoint when enabled and fully configured.
    pub fn prowlarr_endpoint(&self) -> Option<IndexerEndpoint> {
        self.enable_prowlarr
            .then(|| self.prowlarr().endpoint())
            .flatten()
    }

    /// Jackett endpoint when enabled and fully configured.
    pub fn jackett_endpoint(&self) -> Option<IndexerEndpoint> {
        self.enable_jackett
            .then(|| self.jackett().endpoint())
            .flatten()
    }
}

/// Shared settings behind a single read-mostly lock.
///
/// Writers replace the whole snapshot; readers clone the `Arc`.
#[derive(Debug, Default)]
pub struct SettingsStore {
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Returns the current immutable snapshot.
    pub fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.current.read())
    }

    /// Applies `change` to a copy of the current settings and publishes it.
    pub fn update(&self, change: impl FnOnce(&mut Settings)) -> Arc<Settings> {
        let mut guard = self.current.write();
        let mut next = Settings::clone(&guard);
        change(&mut next);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }

    pub fn set_proxy(&self, proxy: ProxySettings) -> Arc<Settings> {
        self.update(|settings| {
            settings.enable_proxy = proxy.enable_proxy;
            settings.proxy_url = proxy.proxy_url.trim().to_string();
        })
    }

    pub fn set_prowlarr(&self, prowlarr: ProwlarrSettings) -> Arc<Settings> {
        self.update(|settings| {
            settings.enable_prowlarr = prowlarr.enable_prowlarr;
            settings.prowlarr_host = prowlarr.prowlarr_host.trim().to_string();
            settings.prowlarr_api_key = prowlarr.prowlarr_api_key.trim().to_string();
        })
    }

    pub fn set_jackett(&self, jackett: JackettSettings) -> Arc<Settings> {
        self.update(|settings| {
            settings.enable_jackett = jackett.enable_jackett;
            settings.jackett_host = jackett.jackett_host.trim().to_string();
            settings.jackett_api_key = jackett.jackett_api_key.trim().to_string();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_serialize_with_camel_case_keys() {
        let settings = Settings {
            enable_proxy: true,
            proxy_url: "socks5://127.0.0.1:1080".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["enableProxy"], true);
        assert_eq!(json["proxyUrl"], "socks5://127.0.0.1:1080");
        assert_eq!(json["prowlarrApiKey"], "");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let proxy: ProxySettings = serde_json::from_str(r#"{"enableProxy":true}"#).unwrap();
        assert!(proxy.enable_proxy);
        assert!(proxy.proxy_url.is_empty());
        assert_eq!(proxy.active_url(), None);
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_updates() {
        let store = SettingsStore::default();
        let before = store.snapshot();

        store.set_proxy(ProxySettings {
            enable_proxy: true,
            proxy_url: " socks5://proxy:1080 ".to_string(),
        });

        assert!(!before.enable_proxy);
        let after = store.snapshot();
        assert!(after.enable_proxy);
        assert_eq!(after.proxy().active_url(), Some("socks5://proxy:1080"));
    }

    #[test]
    fn test_indexer_endpoint_requires_enable_host_and_key() {
        let store = SettingsStore::default();
        store.set_prowlarr(ProwlarrSettings {
            enable_prowlarr: true,
            prowlarr_host: "http://localhost:9696/".to_string(),
            prowlarr_api_key: String::new(),
        });
        assert!(store.snapshot().prowlarr_endpoint().is_none());

        store.set_prowlarr(ProwlarrSettings {
            enable_prowlarr: true,
            prowlarr_host: "http://localhost:9696/".to_string(),
            prowlarr_api_key: "key".to_string(),
        });
        let endpoint = store.snapshot().prowlarr_endpoint().unwrap();
        assert_eq!(endpoint.host, "http://localhost:9696");

        store.set_prowlarr(ProwlarrSettings {
            enable_prowlarr: false,
            prowlarr_host: "http://localhost:9696".to_string(),
            prowlarr_api_key: "key".to_string(),
        });
        assert!(store.snapshot().prowlarr_endpoint().is_none());
        assert!(store.snapshot().jackett_endpoint().is_none());
    }
}
