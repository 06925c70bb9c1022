//! Discovery records
//!
//! While the listener is bound, a small JSON file advertises where the
//! server can be reached so tools can find it without configuration:
//!
//! ```text
//! {local data dir}/cartremote/remoting/sessions/cartremote-remote.{pid}.json
//! ```
//!
//! Publishing is best effort; the server keeps running if it fails.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, Result};
use crate::protocol::PROTOCOL_VERSION;

const FILE_PREFIX: &str = "cartremote-remote.";
const FILE_SUFFIX: &str = ".json";

/// Contents of a discovery file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRecord {
    pub pid: u32,
    pub host: String,
    pub port: u16,
    /// UTC, RFC 3339 with milliseconds
    pub started_at: String,
    pub remoting_version: String,
}

impl DiscoveryRecord {
    /// Record for this process listening on `port`
    pub fn current(port: u16) -> Self {
        Self {
            pid: std::process::id(),
            host: "127.0.0.1".to_string(),
            port,
            started_at: chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
            remoting_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// A published discovery file; removed again on drop
#[derive(Debug)]
pub struct Discovery {
    path: PathBuf,
    record: DiscoveryRecord,
    removed: bool,
}

impl Discovery {
    /// Platform default directory for discovery files
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("cartremote").join("remoting").join("sessions"))
    }

    /// Write the record for this process into `dir`, creating it if needed
    pub fn publish(dir: &Path, port: u16) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let record = DiscoveryRecord::current(port);
        let path = dir.join(format!("{}{}{}", FILE_PREFIX, record.pid, FILE_SUFFIX));

        let mut json = serde_json::to_string_pretty(&record)
            .map_err(|e| RemoteError::Discovery(e.to_string()))?;
        json.push('\n');
        fs::write(&path, json)?;

        tracing::debug!("Published discovery record at {}", path.display());
        Ok(Self {
            path,
            record,
            removed: false,
        })
    }

    /// Read every discovery record in `dir`, skipping unreadable files
    pub fn list(dir: &Path) -> Result<Vec<DiscoveryRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
                .unwrap_or(false);
            if !is_record {
                continue;
            }

            match fs::read_to_string(&path)
                .ok()
                .and_then(|s| serde_json::from_str::<DiscoveryRecord>(&s).ok())
            {
                Some(record) => records.push(record),
                None => tracing::debug!("Skipping unreadable discovery file {}", path.display()),
            }
        }
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }

    /// Delete the record now, reporting failure instead of logging it
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        fs::remove_file(&self.path)?;
        tracing::debug!("Removed discovery record {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &DiscoveryRecord {
        &self.record
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Failed to remove discovery record {}: {}", self.path.display(), e);
        }
    }
}
