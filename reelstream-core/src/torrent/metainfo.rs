//! `.torrent` (bencode) parsing and conversion to magnet links.

use std::collections::HashMap;
use std::ops::Range;

use sha1::{Digest, Sha1};

use super::{InfoHash, MagnetLink, TorrentError};

type BencodeDict<'a> = HashMap<&'a [u8], bencode_rs::Value<'a>>;
type ParseResult<T> = Result<T, TorrentError>;

/// One file inside a torrent, path components relative to the torrent root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetainfoFile {
    pub path: Vec<String>,
    pub length: u64,
}

/// The parts of a `.torrent` file needed to start a download from a magnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMetainfo {
    pub info_hash: InfoHash,
    pub name: String,
    pub files: Vec<MetainfoFile>,
    pub total_length: u64,
    /// `announce` followed by every `announce-list` tier, without duplicates
    pub trackers: Vec<String>,
}

impl TorrentMetainfo {
    /// Parses bencoded torrent bytes.
    ///
    /// The info hash is the SHA-1 of the raw `info` value exactly as it
    /// appears in the input. Trackerless torrents are accepted.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidTorrentFile` - Malformed bencode or missing fields
    pub fn parse(torrent_bytes: &[u8]) -> ParseResult<Self> {
        let parsed = bencode_rs::Value::parse(torrent_bytes)
            .map_err(|e| invalid(format!("Bencode parsing failed: {e:?}")))?;

        let Some(bencode_rs::Value::Dictionary(root)) = parsed.first() else {
            return Err(invalid("Root element must be dictionary"));
        };

        let Some(bencode_rs::Value::Dictionary(info)) = root.get(b"info".as_slice()) else {
            return Err(invalid("Missing or invalid 'info' dictionary"));
        };

        let span = info_dict_span(torrent_bytes)?;
        let info_hash = sha1_info_hash(&torrent_bytes[span]);

        let name = extract_string(info, b"name")?;
        let (files, total_length) = if let Ok(length) = extract_integer(info, b"length") {
            let length = non_negative(length)?;
            let files = vec![MetainfoFile {
                path: vec![name.clone()],
                length,
            }];
            (files, length)
        } else if let Some(bencode_rs::Value::List(entries)) = info.get(b"files".as_slice()) {
            extract_files(entries)?
        } else {
            return Err(invalid("Missing 'files' or 'length' field"));
        };

        Ok(Self {
            info_hash,
            name,
            files,
            total_length,
            trackers: extract_trackers(root),
        })
    }

    /// Magnet link carrying the hash, display name and trackers.
    pub fn to_magnet(&self) -> MagnetLink {
        MagnetLink {
            info_hash: self.info_hash,
            display_name: (!self.name.is_empty()).then(|| self.name.clone()),
            trackers: self.trackers.clone(),
        }
    }
}

fn sha1_info_hash(info_bytes: &[u8]) -> InfoHash {
    let digest = Sha1::digest(info_bytes);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest);
    InfoHash::new(hash)
}

fn invalid(reason: impl Into<String>) -> TorrentError {
    TorrentError::InvalidTorrentFile {
        reason: reason.into(),
    }
}

fn non_negative(value: i64) -> ParseResult<u64> {
    u64::try_from(value).map_err(|_| invalid(format!("Negative length: {value}")))
}

fn extract_bytes<'a>(dict: &'a BencodeDict<'_>, key: &[u8]) -> Result<&'a [u8], TorrentError> {
    match dict.get(key) {
        Some(bencode_rs::Value::Bytes(bytes)) => Ok(bytes),
        _ => Err(invalid(format!(
            "Missing or invalid field: {:?}",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn extract_string(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<String> {
    let bytes = extract_bytes(dict, key)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        invalid(format!(
            "Invalid UTF-8 in field: {:?}",
            String::from_utf8_lossy(key)
        ))
    })
}

fn extract_integer(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<i64> {
    match dict.get(key) {
        Some(bencode_rs::Value::Integer(value)) => Ok(*value),
        _ => Err(invalid(format!(
            "Missing or invalid integer field: {:?}",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn extract_files(entries: &[bencode_rs::Value<'_>]) -> ParseResult<(Vec<MetainfoFile>, u64)> {
    let mut files = Vec::with_capacity(entries.len());
    let mut total_length = 0u64;

    for entry in entries {
        let bencode_rs::Value::Dictionary(file) = entry else {
            return Err(invalid("Invalid file entry type"));
        };
        let length = non_negative(extract_integer(file, b"length")?)?;

        let Some(bencode_rs::Value::List(components)) = file.get(b"path".as_slice()) else {
            return Err(invalid("Missing or invalid path in file"));
        };
        let mut path = Vec::with_capacity(components.len());
        for component in components {
            let bencode_rs::Value::Bytes(component) = component else {
                return Err(invalid("Invalid path component type"));
            };
            let component = String::from_utf8(component.to_vec())
                .map_err(|_| invalid("Invalid UTF-8 in file path"))?;
            path.push(component);
        }
        if path.is_empty() {
            return Err(invalid("Empty file path"));
        }

        total_length = total_length.saturating_add(length);
        files.push(MetainfoFile { path, length });
    }

    Ok((files, total_length))
}

fn extract_trackers(root: &BencodeDict<'_>) -> Vec<String> {
    let mut trackers: Vec<String> = Vec::new();
    let mut push = |url: String| {
        if !url.is_empty() && !trackers.contains(&url) {
            trackers.push(url);
        }
    };

    if let Ok(announce) = extract_string(root, b"announce") {
        push(announce);
    }
    if let Some(bencode_rs::Value::List(tiers)) = root.get(b"announce-list".as_slice()) {
        for tier in tiers {
            if let bencode_rs::Value::List(urls) = tier {
                for url in urls {
                    if let bencode_rs::Value::Bytes(bytes) = url
                        && let Ok(url) = String::from_utf8(bytes.to_vec())
                    {
                        push(url);
                    }
                }
            }
        }
    }

    trackers
}

/// Byte range of the value stored under the top-level `info` key.
///
/// Walks the root dictionary key by key so an `4:info` byte sequence inside
/// another value is never mistaken for the key.
fn info_dict_span(data: &[u8]) -> ParseResult<Range<usize>> {
    if data.first() != Some(&b'd') {
        return Err(invalid("Root element must be dictionary"));
    }

    let mut pos = 1;
    while data.get(pos) != Some(&b'e') {
        let key_start = pos;
        let key_end = value_end(data, key_start)?;
        let key = string_payload(&data[key_start..key_end])?;
        let value_start = key_end;
        let value_stop = value_end(data, value_start)?;
        if key == b"info" {
            return Ok(value_start..value_stop);
        }
        pos = value_stop;
    }

    Err(invalid("Missing 'info' field"))
}

fn string_payload(encoded: &[u8]) -> ParseResult<&[u8]> {
    let colon = encoded
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| invalid("Dictionary key must be a string"))?;
    Ok(&encoded[colon + 1..])
}

/// Position just past the bencode value starting at `pos`.
fn value_end(data: &[u8], pos: usize) -> ParseResult<usize> {
    match data.get(pos) {
        Some(b'i') => {
            let end = data[pos..]
                .iter()
                .position(|&b| b == b'e')
                .ok_or_else(|| invalid("Unterminated integer"))?;
            Ok(pos + end + 1)
        }
        Some(b'l') | Some(b'd') => {
            let mut cursor = pos + 1;
            while data.get(cursor) != Some(&b'e') {
                if cursor >= data.len() {
                    return Err(invalid("Incomplete bencode container"));
                }
                cursor = value_end(data, cursor)?;
            }
            Ok(cursor + 1)
        }
        Some(b'0'..=b'9') => {
            let colon = data[pos..]
                .iter()
                .position(|&b| b == b':')
                .ok_or_else(|| invalid("Invalid string format"))?;
            let length: usize = std::str::from_utf8(&data[pos..pos + colon])
                .ok()
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| invalid("Invalid string length"))?;
            let end = pos + colon + 1 + length;
            if end > data.len() {
                return Err(invalid("String exceeds input"));
            }
            Ok(end)
        }
        Some(_) => Err(invalid("Invalid bencode character")),
        None => Err(invalid("Unexpected end of bencode data")),
    }
}
