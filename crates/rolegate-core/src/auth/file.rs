use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::credentials::{Credential, CredentialStore};

/// Credential file name in cache directory
const CREDENTIAL_FILE: &str = "credential.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    #[serde(flatten)]
    credential: Credential,
    saved_at: DateTime<Utc>,
}

/// Credential persisted as JSON on disk.
///
/// Used where no OS keychain is available.
pub struct FileCredentialStore {
    cache_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn credential_path(&self) -> PathBuf {
        self.cache_dir.join(CREDENTIAL_FILE)
    }

    fn read(&self) -> Result<Option<Credential>> {
        let path = self.credential_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read credential file")?;
        let stored: StoredCredential =
            serde_json::from_str(&contents).context("Failed to parse credential file")?;
        Ok(Some(stored.credential))
    }
}

/// Write `contents` to a fresh file readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, credential: &Credential) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir).context("Failed to create credential directory")?;

        let stored = StoredCredential {
            credential: credential.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;

        // Write-then-rename so a crash never leaves a half-written file behind
        let path = self.credential_path();
        let tmp_path = path.with_extension("tmp");
        write_private(&tmp_path, contents.as_bytes()).context("Failed to write credential file")?;
        std::fs::rename(&tmp_path, &path).context("Failed to commit credential file")?;
        Ok(())
    }

    fn load(&self) -> Option<Credential> {
        match self.read() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable credential file");
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        let path = self.credential_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}
