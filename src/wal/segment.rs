use crate::error::Result;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Identifies one on-disk segment file and whether it is gzip-compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentId(pub u64);

fn plain_name(id: u64) -> String {
    format!("segment_{id}.wal")
}

fn gzip_name(id: u64) -> String {
    format!("segment_{id}.wal.gzip")
}

/// Enumerates, creates and opens segment files under `data_dir`.
pub struct SegmentStorage {
    data_dir: PathBuf,
}

impl SegmentStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(SegmentStorage { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn plain_path(&self, id: u64) -> PathBuf {
        self.data_dir.join(plain_name(id))
    }

    fn gzip_path(&self, id: u64) -> PathBuf {
        self.data_dir.join(gzip_name(id))
    }

    /// Returns `(id, compressed)` pairs sorted ascending by id.
    pub fn list(&self) -> Result<Vec<(u64, bool)>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("segment_") {
                if let Some(id_str) = rest.strip_suffix(".wal.gzip") {
                    if let Ok(id) = id_str.parse::<u64>() {
                        found.push((id, true));
                        continue;
                    }
                }
                if let Some(id_str) = rest.strip_suffix(".wal") {
                    if let Ok(id) = id_str.parse::<u64>() {
                        found.push((id, false));
                    }
                }
            }
        }
        found.sort_by_key(|(id, _)| *id);
        Ok(found)
    }

    pub fn highest_id(&self) -> Result<u64> {
        Ok(self.list()?.last().map(|(id, _)| *id).unwrap_or(0))
    }

    pub fn exists(&self, id: u64) -> bool {
        self.plain_path(id).exists() || self.gzip_path(id).exists()
    }

    pub fn size(&self, id: u64) -> Result<u64> {
        if let Ok(meta) = fs::metadata(self.plain_path(id)) {
            return Ok(meta.len());
        }
        Ok(fs::metadata(self.gzip_path(id))?.len())
    }

    /// Reads the full decoded (decompressed, if necessary) bytes of a
    /// segment by id.
    pub fn read(&self, id: u64) -> Result<(Vec<u8>, bool)> {
        if self.gzip_path(id).exists() {
            let raw = fs::read(self.gzip_path(id))?;
            let mut decoder = flate2::read::GzDecoder::new(&raw[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok((out, true))
        } else {
            Ok((fs::read(self.plain_path(id))?, false))
        }
    }

    /// Appends `bytes` to the plain (uncompressed) segment file for `id`,
    /// creating it if absent.
    pub fn append(&self, id: u64, bytes: &[u8]) -> Result<()> {
        use std::fs::OpenOptions;
        use std::io::Write;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.plain_path(id))?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Writes a replicated segment verbatim, either plain or pre-compressed.
    pub fn write_whole(&self, id: u64, bytes: &[u8], compressed: bool) -> Result<()> {
        let path = if compressed {
            self.gzip_path(id)
        } else {
            self.plain_path(id)
        };
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Compresses the plain segment `id` in place, replacing it with the
    /// `.gzip` form and removing the uncompressed file.
    pub fn compress_in_place(&self, id: u64) -> Result<()> {
        use std::io::Write;
        let raw = fs::read(self.plain_path(id))?;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;
        fs::write(self.gzip_path(id), compressed)?;
        fs::remove_file(self.plain_path(id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn list_is_sorted_and_dense() {
        let dir = TempDir::new().unwrap();
        let storage = SegmentStorage::new(dir.path()).unwrap();
        storage.append(2, b"b").unwrap();
        storage.append(1, b"a").unwrap();
        storage.append(3, b"c").unwrap();
        let ids: Vec<u64> = storage.list().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn compress_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let storage = SegmentStorage::new(dir.path()).unwrap();
        storage.append(1, b"hello wal").unwrap();
        storage.compress_in_place(1).unwrap();
        assert!(!storage.plain_path(1).exists());
        assert!(storage.gzip_path(1).exists());
        let (bytes, compressed) = storage.read(1).unwrap();
        assert!(compressed);
        assert_eq!(bytes, b"hello wal");
    }
}
