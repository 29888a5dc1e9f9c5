//! Local media library exposed as a set of torrents.

use std::io;
use std::path::{Path, PathBuf};

use reelstream_core::engine::{TorrentFile, TorrentInfo};
use reelstream_core::torrent::{InfoHash, MagnetLink};
use sha1::{Digest, Sha1};

/// One file of a library entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    /// Path inside the torrent, components joined with `/`
    pub name: String,
    pub source: PathBuf,
    pub size: u64,
}

/// A top-level library entry served as one torrent.
///
/// A plain file becomes a single-file torrent; a directory becomes a
/// multi-file torrent with its files in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: String,
    pub info_hash: InfoHash,
    pub files: Vec<LibraryFile>,
}

impl LibraryEntry {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }

    pub fn magnet(&self) -> MagnetLink {
        let mut magnet = MagnetLink::new(self.info_hash);
        magnet.display_name = Some(self.name.clone());
        magnet
    }

    pub fn info(&self) -> TorrentInfo {
        TorrentInfo {
            name: self.name.clone(),
            files: self
                .files
                .iter()
                .enumerate()
                .map(|(index, file)| TorrentFile {
                    index,
                    name: file.name.clone(),
                    size: file.size,
                })
                .collect(),
        }
    }
}

/// Content hash of a library entry: SHA-1 of its name.
pub fn entry_hash(name: &str) -> InfoHash {
    let digest = Sha1::digest(name.as_bytes());
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest);
    InfoHash::new(hash)
}

/// Lists the library, sorted by name. Hidden entries and empty directories
/// are skipped.
///
/// # Errors
///
/// - `std::io::Error` - The library directory or one of its entries cannot be read
pub fn scan_library(dir: &Path) -> io::Result<Vec<LibraryEntry>> {
    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let Some(name) = visible_name(&dir_entry.path()) else {
            continue;
        };
        let file_type = dir_entry.file_type()?;

        let files = if file_type.is_dir() {
            let mut files = Vec::new();
            collect_files(&dir_entry.path(), "", &mut files)?;
            files.sort_by(|a, b| a.name.cmp(&b.name));
            files
        } else if file_type.is_file() {
            vec![LibraryFile {
                name: name.clone(),
                source: dir_entry.path(),
                size: dir_entry.metadata()?.len(),
            }]
        } else {
            continue;
        };

        if files.is_empty() {
            continue;
        }
        entries.push(LibraryEntry {
            info_hash: entry_hash(&name),
            name,
            files,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Finds the entry with the given content hash.
///
/// # Errors
///
/// - `std::io::Error` - The library cannot be scanned
pub fn find_entry(dir: &Path, info_hash: InfoHash) -> io::Result<Option<LibraryEntry>> {
    Ok(scan_library(dir)?
        .into_iter()
        .find(|entry| entry.info_hash == info_hash))
}

fn collect_files(dir: &Path, prefix: &str, files: &mut Vec<LibraryFile>) -> io::Result<()> {
    for dir_entry in std::fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let Some(name) = visible_name(&dir_entry.path()) else {
            continue;
        };
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        let file_type = dir_entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&dir_entry.path(), &relative, files)?;
        } else if file_type.is_file() {
            files.push(LibraryFile {
                name: relative,
                source: dir_entry.path(),
                size: dir_entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

fn visible_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    (!name.starts_with('.')).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Short Film.mp4"), vec![1u8; 300]).unwrap();
        let series = dir.path().join("Series");
        std::fs::create_dir_all(series.join("extras")).unwrap();
        std::fs::write(series.join("episode2.mkv"), vec![2u8; 20]).unwrap();
        std::fs::write(series.join("episode1.mkv"), vec![3u8; 10]).unwrap();
        std::fs::write(series.join("extras/commentary.srt"), b"1\n").unwrap();
        std::fs::create_dir(dir.path().join("Empty")).unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        dir
    }

    #[test]
    fn test_scan_library() {
        let dir = library();
        let entries = scan_library(dir.path()).unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Series", "Short Film.mp4"]);

        let series = &entries[0];
        let files: Vec<&str> = series.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(files, ["episode1.mkv", "episode2.mkv", "extras/commentary.srt"]);
        assert_eq!(series.total_size(), 32);

        let film = &entries[1];
        assert_eq!(film.files.len(), 1);
        assert_eq!(film.files[0].name, "Short Film.mp4");
        assert_eq!(film.files[0].size, 300);
    }

    #[test]
    fn test_entry_hash_is_sha1_of_name() {
        assert_eq!(
            entry_hash("abc").to_string(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_find_entry_and_magnet() {
        let dir = library();
        let hash = entry_hash("Series");
        let entry = find_entry(dir.path(), hash).unwrap().unwrap();
        assert_eq!(entry.magnet().info_hash, hash);
        assert_eq!(entry.info().files[2].index, 2);

        assert!(find_entry(dir.path(), entry_hash("Missing")).unwrap().is_none());
    }

    #[test]
    fn test_missing_library_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_library(&dir.path().join("nope")).is_err());
    }
}
