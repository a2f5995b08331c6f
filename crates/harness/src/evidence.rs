//! Screenshot evidence captured at named checkpoints

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::ProbeResult;

/// Manifest file written next to the screenshots
pub const MANIFEST_FILE: &str = "evidence.json";

/// One screenshot tied to a checkpoint label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// 1-based position in capture order
    pub seq: u32,
    pub label: String,
    pub path: PathBuf,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub captured_at: DateTime<Utc>,
}

/// Append-only list of records for one session
#[derive(Debug, Clone)]
pub struct EvidenceLog {
    dir: PathBuf,
    records: Vec<EvidenceRecord>,
}

impl EvidenceLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            records: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    /// Write `png` as the next record under `label`
    pub fn record(&mut self, label: &str, png: &[u8]) -> ProbeResult<EvidenceRecord> {
        std::fs::create_dir_all(&self.dir)?;

        let seq = self.records.len() as u32 + 1;
        let path = self.dir.join(file_name(seq, label));
        std::fs::write(&path, png)?;

        let sha256 = hash_file(&path)?;
        let (width, height) = match image::load_from_memory(png) {
            Ok(img) => (Some(img.width()), Some(img.height())),
            Err(e) => {
                warn!("Could not decode screenshot '{}': {}", label, e);
                (None, None)
            }
        };

        let record = EvidenceRecord {
            seq,
            label: label.to_string(),
            path,
            sha256,
            width,
            height,
            captured_at: Utc::now(),
        };

        debug!("Evidence #{} '{}' -> {}", seq, label, record.path.display());
        self.records.push(record.clone());
        Ok(record)
    }

    /// Write the ordered manifest
    pub fn write_manifest(&self) -> ProbeResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&path, json)?;
        info!("Evidence manifest written to: {}", path.display());
        Ok(path)
    }
}

/// Load a manifest written by [`EvidenceLog::write_manifest`]
pub fn read_manifest(path: &Path) -> ProbeResult<Vec<EvidenceRecord>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// SHA-256 of a file, hex encoded
pub fn hash_file(path: &Path) -> ProbeResult<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// `NN_<label>.png`; label characters outside `[A-Za-z0-9_-]` become `_`
pub fn file_name(seq: u32, label: &str) -> String {
    format!("{:02}_{}.png", seq, sanitize(label))
}

/// Make a string safe to use as a single path component
pub fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}
