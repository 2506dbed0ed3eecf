//! Flat `KEY=VALUE` file backend.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{strip_quotes, SettingsStore, StoreError};

/// Settings kept in a dotenv-style text file.
///
/// Writes rewrite the whole file through a sibling temp file, so a reader
/// never sees a half-written batch. Concurrent writers from different
/// processes can still race.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(parse_entries(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Parse file content, keeping the first-seen order of keys.
///
/// Blank lines, `#` comments and lines without `=` are skipped. A repeated
/// key keeps its position and takes the later value.
pub fn parse_entries(content: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_string();
        let value = strip_quotes(value.trim()).to_string();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }
    entries
}

/// Whether a pair survives a round trip through a `KEY=VALUE` line.
fn storable(key: &str, value: &str) -> Result<(), String> {
    if key.is_empty() || key.contains(['=', '\n', '\r']) || key.trim() != key || key.starts_with('#') {
        return Err("key cannot be stored in a KEY=VALUE file".to_string());
    }
    if value.contains(['\n', '\r']) {
        return Err("line breaks are not supported by the file store".to_string());
    }
    Ok(())
}

fn render_entries(entries: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.read_entries().await?.into_iter().collect())
    }

    async fn write_many(&self, updates: &BTreeMap<String, String>) -> Result<(), StoreError> {
        for (key, value) in updates {
            storable(key, value).map_err(|reason| StoreError::InvalidValue {
                key: key.clone(),
                reason,
            })?;
        }

        let mut entries = self.read_entries().await?;
        for (key, value) in updates {
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => entries.push((key.clone(), value.clone())),
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, render_entries(&entries))
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), keys = updates.len(), "File store written");
        Ok(())
    }

    fn check_storable(&self, key: &str, value: &str) -> Result<(), String> {
        storable(key, value)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let content = "# comment\n\nHOST=127.0.0.1\n  PORT = 9000 \nNAME=\"quoted value\"\nSINGLE='x'\nnoequals\nEMPTY=\nURL=a=b\n";
        let entries = parse_entries(content);
        let map: BTreeMap<_, _> = entries.into_iter().collect();

        assert_eq!(map["HOST"], "127.0.0.1");
        assert_eq!(map["PORT"], "9000");
        assert_eq!(map["NAME"], "quoted value");
        assert_eq!(map["SINGLE"], "x");
        assert_eq!(map["EMPTY"], "");
        assert_eq!(map["URL"], "a=b");
        assert!(!map.contains_key("noequals"));
        assert_eq!(map.len(), 6);
    }

    #[test]
    fn test_parse_duplicate_keeps_last() {
        let entries = parse_entries("A=1\nB=2\nA=3\n");
        assert_eq!(
            entries,
            vec![("A".to_string(), "3".to_string()), ("B".to_string(), "2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(&dir.path().join("absent.env"));
        assert!(store.read_all().await.unwrap().is_empty());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_write_many_merges_and_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# header\nB=1\nA=2\n").unwrap();
        let store = FileStore::new(&path);

        let mut updates = BTreeMap::new();
        updates.insert("A".to_string(), "20".to_string());
        updates.insert("C".to_string(), "30".to_string());
        store.write_many(&updates).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "B=1\nA=20\nC=30\n");

        let values = store.read_all().await.unwrap();
        assert_eq!(values["A"], "20");
        assert_eq!(values["B"], "1");
        assert_eq!(values["C"], "30");
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/conf/.env");
        let store = FileStore::new(&path);

        let updates = BTreeMap::from([("K".to_string(), "v".to_string())]);
        store.write_many(&updates).await.unwrap();
        assert_eq!(store.read_all().await.unwrap()["K"], "v");
    }

    #[tokio::test]
    async fn test_rejects_multiline_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let store = FileStore::new(&path);

        let updates = BTreeMap::from([
            ("OK".to_string(), "fine".to_string()),
            ("BAD".to_string(), "two\nlines".to_string()),
        ]);
        let err = store.write_many(&updates).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { ref key, .. } if key == "BAD"));
        assert!(!path.exists());
    }
}
