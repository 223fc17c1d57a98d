//! File-backed tally persistence: one JSON document per event.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tally_store::{StoreError, TallyPersistence};
use tally_types::{ContestantTally, EventId};

#[derive(Serialize, Deserialize)]
struct TallyFile {
    event_id: EventId,
    tallies: Vec<ContestantTally>,
}

/// Stores an event's tallies at `<data_dir>/<event_id>.json`.
///
/// Writes go to a sibling temp file that is renamed over the old one, so a
/// crash mid-write leaves the previous save intact.
pub struct JsonFilePersistence {
    event_id: EventId,
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Creates `data_dir` if needed.
    pub fn open(data_dir: impl AsRef<Path>, event_id: &EventId) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(backend)?;
        Ok(Self {
            event_id: event_id.clone(),
            path: data_dir.join(format!("{}.json", event_id)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<Option<TallyFile>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(backend(e)),
        };
        let file: TallyFile = serde_json::from_slice(&bytes).map_err(backend)?;
        if file.event_id != self.event_id {
            return Err(StoreError::Backend(format!(
                "{} holds event {}, expected {}",
                self.path.display(),
                file.event_id,
                self.event_id
            )));
        }
        Ok(Some(file))
    }
}

impl TallyPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Vec<ContestantTally>, StoreError> {
        Ok(self.read_file()?.map(|f| f.tallies).unwrap_or_default())
    }

    fn save(&self, tallies: &[ContestantTally]) -> Result<(), StoreError> {
        if let Some(previous) = self.read_file()? {
            let previous: HashMap<_, _> = previous
                .tallies
                .iter()
                .map(|t| (t.id().clone(), t))
                .collect();
            for tally in tallies {
                if let Some(old) = previous.get(tally.id()) {
                    if tally.free_votes < old.free_votes || tally.paid_votes < old.paid_votes {
                        return Err(StoreError::NonMonotonicRestore {
                            contestant: tally.id().clone(),
                            stored: old.total(),
                            restoring: tally.total(),
                        });
                    }
                }
            }
        }

        let file = TallyFile {
            event_id: self.event_id.clone(),
            tallies: tallies.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(backend)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(backend)?;
        fs::rename(&tmp, &self.path).map_err(backend)?;
        Ok(())
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}
