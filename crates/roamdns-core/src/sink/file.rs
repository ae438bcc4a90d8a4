// # File Sink
//
// Append-only JSON lines history of observed address changes.
//
// ## File Format
//
// One object per line:
//
// ```json
// {"name":"alice","address":"203.0.113.7","observed_at":"2025-01-09T12:00:00Z"}
// ```
//
// Lines are written with a single `write_all` under a mutex, so concurrent
// inserts never interleave inside a line.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::ObservedAddress;
use crate::Error;
use crate::config::SinkConfig;
use crate::traits::{AddressSink, AddressSinkFactory};

/// JSON lines file sink
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<fs::File>,
}

impl FileSink {
    /// Open (or create) the history file for appending
    ///
    /// Parent directories are created if needed.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create sink directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::sink(format!("cannot open {}: {}", path.display(), e)))?;

        tracing::debug!("File sink opened at {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every row in the file
    pub async fn read_all(&self) -> Result<Vec<ObservedAddress>, Error> {
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::sink(format!("cannot read {}: {}", self.path.display(), e)))?;

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl AddressSink for FileSink {
    async fn insert_observed_address(&self, name: &str, address: &str) -> Result<(), Error> {
        let mut line = serde_json::to_vec(&ObservedAddress::now(name, address))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|e| Error::sink(format!("write to {} failed: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| Error::sink(format!("flush of {} failed: {}", self.path.display(), e)))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for [`FileSink`]
pub struct FileSinkFactory;

#[async_trait]
impl AddressSinkFactory for FileSinkFactory {
    async fn create(&self, config: &SinkConfig) -> Result<Box<dyn AddressSink>, Error> {
        match config {
            SinkConfig::File { path } => Ok(Box::new(FileSink::open(path).await?)),
            _ => Err(Error::config("Invalid config for file sink")),
        }
    }
}
