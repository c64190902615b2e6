use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;
use uuid::Uuid;

/// URL path under which stored uploads are served.
pub const PUBLIC_PREFIX: &str = "uploads";

#[derive(Clone)]
pub struct UploadStore {
    root: PathBuf,
    public_base: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Upload storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid public URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_name: String,
    pub path: PathBuf,
    pub public_url: Url,
}

impl UploadStore {
    pub async fn open(root: impl Into<PathBuf>, public_base: Url) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, public_base })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keeps the last path component and replaces anything outside
    /// `[A-Za-z0-9._-]` with `_`.
    pub fn sanitize_file_name(file_name: &str) -> String {
        let base = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        let cleaned: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if cleaned.chars().all(|c| c == '.') {
            "upload".to_string()
        } else {
            cleaned
        }
    }

    pub fn public_url(&self, stored_name: &str) -> Result<Url, StorageError> {
        Ok(self
            .public_base
            .join(&format!("{}/{}", PUBLIC_PREFIX, stored_name))?)
    }

    /// Writes `content` under a fresh identifier. Never overwrites an existing file.
    pub async fn save(&self, content: &[u8], file_name: &str) -> Result<StoredUpload, StorageError> {
        let stored_name = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            Self::sanitize_file_name(file_name)
        );
        let path = self.root.join(&stored_name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(content).await?;
        file.flush().await?;

        let public_url = self.public_url(&stored_name)?;
        log::debug!("Stored upload {} ({} bytes)", stored_name, content.len());

        Ok(StoredUpload {
            stored_name,
            path,
            public_url,
        })
    }

    /// Deletes stored files whose modification time is at least `max_age` ago.
    pub async fn sweep_expired(&self, max_age: Duration) -> Result<usize, StorageError> {
        let now = SystemTime::now();
        let mut entries = fs::read_dir(&self.root).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::warn!("Skipping {:?} during sweep: {}", entry.path(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove expired upload {:?}: {}", entry.path(), e),
            }
        }

        Ok(removed)
    }

    /// Runs [`Self::sweep_expired`] every `every` for the life of the process.
    pub fn spawn_sweeper(self, max_age: Duration, every: Duration) {
        actix_web::rt::spawn(async move {
            let mut ticker = actix_web::rt::time::interval(every);
            loop {
                ticker.tick().await;
                match self.sweep_expired(max_age).await {
                    Ok(0) => {}
                    Ok(removed) => log::info!("Removed {} expired upload(s)", removed),
                    Err(e) => log::error!("Upload sweep failed: {}", e),
                }
            }
        });
    }
}
