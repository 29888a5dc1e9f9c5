//! Magnet link parsing and formatting.

use url::Url;

use super::{InfoHash, TorrentError};

/// Parsed `magnet:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

impl MagnetLink {
    pub fn new(info_hash: InfoHash) -> Self {
        Self {
            info_hash,
            display_name: None,
            trackers: Vec::new(),
        }
    }

    /// Parses a magnet URI.
    ///
    /// The first `xt=urn:btih:` topic wins; both the 40 character hex and the
    /// 32 character base32 forms are accepted.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidMagnet` - Not a magnet URI or no btih topic
    /// - `TorrentError::InvalidInfoHash` - The btih value is malformed
    pub fn parse(input: &str) -> Result<Self, TorrentError> {
        let url = Url::parse(input.trim()).map_err(|e| TorrentError::InvalidMagnet {
            reason: e.to_string(),
        })?;
        if url.scheme() != "magnet" {
            return Err(TorrentError::InvalidMagnet {
                reason: format!("unexpected scheme '{}'", url.scheme()),
            });
        }

        let mut info_hash = None;
        let mut display_name = None;
        let mut trackers = Vec::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" if info_hash.is_none() => {
                    if let Some(hash) = strip_prefix_ignore_case(&value, "urn:btih:") {
                        info_hash = Some(parse_btih(hash)?);
                    }
                }
                "dn" if display_name.is_none() && !value.is_empty() => {
                    display_name = Some(value.into_owned());
                }
                "tr" if !value.is_empty() => trackers.push(value.into_owned()),
                _ => {}
            }
        }

        let info_hash = info_hash.ok_or_else(|| TorrentError::InvalidMagnet {
            reason: "missing xt=urn:btih: topic".to_string(),
        })?;

        Ok(Self {
            info_hash,
            display_name,
            trackers,
        })
    }

    /// Formats the link as a magnet URI with a hex info hash.
    pub fn to_uri(&self) -> String {
        let mut uri = format!("magnet:?xt=urn:btih:{}", self.info_hash);
        if let Some(name) = &self.display_name {
            uri.push_str("&dn=");
            uri.push_str(&urlencoding::encode(name));
        }
        for tracker in &self.trackers {
            uri.push_str("&tr=");
            uri.push_str(&urlencoding::encode(tracker));
        }
        uri
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn parse_btih(value: &str) -> Result<InfoHash, TorrentError> {
    match value.len() {
        40 => InfoHash::from_hex(value),
        32 => InfoHash::from_base32(value),
        len => Err(TorrentError::InvalidInfoHash {
            reason: format!("hash has {len} characters, expected 40 (hex) or 32 (base32)"),
        }),
    }
}
