use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::models::Fingerprint;

/// Fingerprints of every offer already dispatched, persisted as a JSON array.
///
/// Entries never expire, so the file grows with every new deal.
pub struct SentOffersLedger {
    path: PathBuf,
    fingerprints: HashSet<Fingerprint>,
}

impl SentOffersLedger {
    /// Loads the ledger at `path`. A missing or unreadable file starts empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let fingerprints = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<Vec<Fingerprint>>(&contents) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    warn!("Ignoring corrupt ledger {}: {}", path.display(), e);
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No ledger at {}, starting empty", path.display());
                HashSet::new()
            }
            Err(e) => {
                warn!("Could not read ledger {}: {}", path.display(), e);
                HashSet::new()
            }
        };

        info!("Loaded {} sent-offer fingerprints", fingerprints.len());
        Self { path, fingerprints }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Records a fingerprint. Returns `false` if it was already present.
    pub fn add(&mut self, fingerprint: Fingerprint) -> bool {
        self.fingerprints.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the ledger next to its target and renames it into place, so a
    /// crash mid-write leaves the previous file intact.
    pub async fn save(&self) -> Result<()> {
        let mut entries: Vec<&Fingerprint> = self.fingerprints.iter().collect();
        entries.sort();
        let json = serde_json::to_string_pretty(&entries)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(())
    }
}
