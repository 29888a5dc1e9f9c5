//! Typed search results shared by all indexers.

use serde::{Deserialize, Serialize};

/// Supported indexer backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerKind {
    Prowlarr,
    Jackett,
}

impl IndexerKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexerKind::Prowlarr => "Prowlarr",
            IndexerKind::Jackett => "Jackett",
        }
    }
}

impl std::fmt::Display for IndexerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for IndexerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prowlarr" => Ok(IndexerKind::Prowlarr),
            "jackett" => Ok(IndexerKind::Jackett),
            other => Err(format!("unknown indexer '{other}'")),
        }
    }
}

/// One release found by an indexer.
///
/// Carries either a magnet URI (`direct_magnet`) or an indexer download link
/// that the session manager resolves later.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub direct_magnet: bool,
    /// Human-readable size, e.g. `1.50 GB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Fields every indexer release maps onto before filtering.
#[derive(Debug, Default)]
pub(crate) struct RawRelease {
    pub title: Option<String>,
    pub magnet_url: Option<String>,
    pub download_url: Option<String>,
    pub size: Option<f64>,
    pub seeders: Option<f64>,
    pub leechers: Option<f64>,
    pub indexer: Option<String>,
    pub publish_date: Option<String>,
    pub category: Option<String>,
}

impl RawRelease {
    /// Drops releases without a title or without any link, and prefers a
    /// magnet over a download link.
    pub(crate) fn into_result(self) -> Option<SearchResult> {
        let title = non_empty(self.title)?;
        let magnet_url = non_empty(self.magnet_url).filter(|uri| is_magnet(uri));
        let download_url = non_empty(self.download_url);
        if magnet_url.is_none() && download_url.is_none() {
            return None;
        }
        let direct_magnet = magnet_url.is_some();

        Some(SearchResult {
            title,
            download_url: if direct_magnet { None } else { download_url },
            magnet_url,
            direct_magnet,
            size: self.size.map(format_size),
            size_bytes: self.size.filter(|size| *size >= 0.0).map(|size| size as u64),
            seeders: self.seeders.filter(|n| *n >= 0.0).map(|n| n as u64),
            leechers: self.leechers.filter(|n| *n >= 0.0).map(|n| n as u64),
            indexer: self.indexer,
            publish_date: self.publish_date,
            category: self.category,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn is_magnet(uri: &str) -> bool {
    uri.get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"))
}

/// Formats a byte count with binary units and two decimals.
pub fn format_size(bytes: f64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024.0 {
        return format!("{bytes:.0} B");
    }
    let mut value = bytes / 1024.0;
    for unit in &UNITS[..UNITS.len() - 1] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} {}", UNITS[UNITS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0.0), "0 B");
        assert_eq!(format_size(1023.0), "1023 B");
        assert_eq!(format_size(1024.0), "1.00 KB");
        assert_eq!(format_size(1536.0), "1.50 KB");
        assert_eq!(format_size(5.0 * 1024.0 * 1024.0), "5.00 MB");
        assert_eq!(format_size(1.5 * 1024.0 * 1024.0 * 1024.0), "1.50 GB");
        assert_eq!(format_size(3.0 * 1024f64.powi(4)), "3072.00 GB");
    }

    #[test]
    fn test_magnet_preferred_over_download() {
        let result = RawRelease {
            title: Some("Movie".into()),
            magnet_url: Some("magnet:?xt=urn:btih:abc".into()),
            download_url: Some("http://indexer/dl/1".into()),
            ..RawRelease::default()
        }
        .into_result()
        .unwrap();

        assert!(result.direct_magnet);
        assert_eq!(result.magnet_url.as_deref(), Some("magnet:?xt=urn:btih:abc"));
        assert!(result.download_url.is_none());
    }

    #[test]
    fn test_non_magnet_uri_falls_back_to_download() {
        let result = RawRelease {
            title: Some("Movie".into()),
            magnet_url: Some("http://not-a-magnet".into()),
            download_url: Some("http://indexer/dl/1".into()),
            ..RawRelease::default()
        }
        .into_result()
        .unwrap();

        assert!(!result.direct_magnet);
        assert!(result.magnet_url.is_none());
        assert_eq!(result.download_url.as_deref(), Some("http://indexer/dl/1"));
    }

    #[test]
    fn test_releases_without_title_or_link_are_dropped() {
        let no_title = RawRelease {
            title: Some("  ".into()),
            download_url: Some("http://indexer/dl/1".into()),
            ..RawRelease::default()
        };
        let no_link = RawRelease {
            title: Some("Movie".into()),
            ..RawRelease::default()
        };
        assert!(no_title.into_result().is_none());
        assert!(no_link.into_result().is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let result = RawRelease {
            title: Some("Movie".into()),
            download_url: Some("http://indexer/dl/1".into()),
            size: Some(2048.0),
            seeders: Some(12.0),
            ..RawRelease::default()
        }
        .into_result()
        .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["title"], "Movie");
        assert_eq!(json["downloadUrl"], "http://indexer/dl/1");
        assert_eq!(json["directMagnet"], false);
        assert_eq!(json["size"], "2.00 KB");
        assert_eq!(json["seeders"], 12);
        assert!(json.get("magnetUrl").is_none());
        assert!(json.get("leechers").is_none());
    }

    #[test]
    fn test_indexer_kind_parsing() {
        assert_eq!("Prowlarr".parse::<IndexerKind>(), Ok(IndexerKind::Prowlarr));
        assert_eq!("jackett".parse::<IndexerKind>(), Ok(IndexerKind::Jackett));
        assert!("sonarr".parse::<IndexerKind>().is_err());
    }
}
