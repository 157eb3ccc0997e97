//! The duplicate index's two-pass scan spills unknown candidates to a
//! temporary file rather than holding them all in memory (SPEC_FULL.md §5
//! "the duplicate index's buffer file ... scoped to the run and deleted on
//! exit"). One line-delimited-JSON row per candidate, in ingest order, so
//! PASS_B replays them without re-reading the (possibly non-restartable)
//! original stream.

use std::io::{BufRead, BufReader, Write};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use cdb_models::{Error, Result};

#[derive(Serialize, Deserialize)]
struct SpillRow<T> {
    synth_id: Uuid,
    record: T,
}

/// A single run's unknown-candidate buffer. Dropping it deletes the
/// backing file.
pub struct CandidateSpill {
    tmp: tempfile::NamedTempFile,
}

impl CandidateSpill {
    pub fn create() -> Result<Self> {
        let tmp = tempfile::NamedTempFile::new().map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self { tmp })
    }

    pub fn append<T: Serialize>(&mut self, synth_id: Uuid, record: &T) -> Result<()> {
        let line = serde_json::to_string(&SpillRow { synth_id, record })?;
        writeln!(self.tmp, "{line}").map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }

    /// Replays every spilled row in the order it was written.
    pub fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<(Uuid, T)>> {
        let file = self.tmp.reopen().map_err(|e| Error::Connection(e.to_string()))?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| Error::Connection(e.to_string()))?;
            if line.is_empty() {
                continue;
            }
            let row: SpillRow<T> = serde_json::from_str(&line)?;
            out.push((row.synth_id, row.record));
        }
        Ok(out)
    }
}
