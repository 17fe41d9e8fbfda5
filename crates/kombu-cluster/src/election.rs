//! File-persisted leader election.
//!
//! The leader is a single flat JSON record, overwritten wholesale on every
//! election. There is no compare-and-swap and no election term: concurrent
//! electors race and the last write wins. That race is the point — this
//! module demonstrates why naive persisted election is unsafe; it is not a
//! substitute for quorum-based consensus.
//!
//! State machine over the record: no leader → elected → down → elected…

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// The persisted leader descriptor.
///
/// No history, no versioning: the file holds exactly one current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRecord {
    /// Server that won the last election
    pub server_id: String,

    /// Address the leader serves on
    pub address: String,

    /// Election time, unix seconds
    pub elected_at: u64,

    /// False once the leader has been marked down
    pub is_active: bool,
}

/// Election errors.
///
/// Only writes fail loudly; reads degrade to "no leader" (see
/// [`LeaderElection::current_leader`]).
#[derive(Debug, Error)]
pub enum ElectionError {
    /// I/O error reading or writing the leader file.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Record could not be serialized.
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

/// Read/elect/mark-down operations over the persisted leader record.
pub struct LeaderElection {
    /// Path of the leader file
    path: PathBuf,
}

impl LeaderElection {
    /// Create an election handle backed by the given file path.
    ///
    /// The file does not need to exist yet; a missing file means "no
    /// leader".
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the current leader record.
    ///
    /// A missing file or an unparseable record both yield `None` — a
    /// corrupt record is logged and treated as "no leader", never
    /// propagated.
    pub async fn current_leader(&self) -> Option<LeaderRecord> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %err, "failed to read leader file");
                }
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "unparseable leader record");
                None
            }
        }
    }

    /// Elect a new leader, unconditionally overwriting the record.
    ///
    /// Last writer wins: there is no check against the previous record, so
    /// concurrent electors can both "succeed" and the later write sticks.
    pub async fn elect(
        &self,
        server_id: &str,
        address: &str,
    ) -> Result<LeaderRecord, ElectionError> {
        let record = LeaderRecord {
            server_id: server_id.to_string(),
            address: address.to_string(),
            elected_at: unix_now(),
            is_active: true,
        };

        self.write_record(&record).await?;
        tracing::info!(server = server_id, address, "new leader elected");
        Ok(record)
    }

    /// Mark the current leader down, if it is `server_id`.
    ///
    /// Flips `is_active` to false in place when the ids match; a no-op for
    /// any other id (including when there is no leader at all).
    pub async fn mark_down(&self, server_id: &str) -> Result<(), ElectionError> {
        let Some(mut record) = self.current_leader().await else {
            return Ok(());
        };
        if record.server_id != server_id {
            return Ok(());
        }

        record.is_active = false;
        self.write_record(&record).await?;
        tracing::warn!(server = server_id, "leader marked down");
        Ok(())
    }

    /// Check whether `server_id` is the current active leader.
    pub async fn is_leader(&self, server_id: &str) -> bool {
        match self.current_leader().await {
            Some(record) => record.server_id == server_id && record.is_active,
            None => false,
        }
    }

    async fn write_record(&self, record: &LeaderRecord) -> Result<(), ElectionError> {
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn election_in(dir: &TempDir) -> LeaderElection {
        LeaderElection::new(dir.path().join("leader.json"))
    }

    #[tokio::test]
    async fn test_no_leader_before_first_election() {
        let dir = TempDir::new().unwrap();
        let election = election_in(&dir);

        assert!(election.current_leader().await.is_none());
        assert!(!election.is_leader("S1").await);
    }

    #[tokio::test]
    async fn test_elect_then_read_back() {
        let dir = TempDir::new().unwrap();
        let election = election_in(&dir);

        election.elect("S1", "http://localhost:5001").await.unwrap();

        let leader = election.current_leader().await.unwrap();
        assert_eq!(leader.server_id, "S1");
        assert_eq!(leader.address, "http://localhost:5001");
        assert!(leader.is_active);
        assert!(election.is_leader("S1").await);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        let election = election_in(&dir);

        election.elect("S1", "http://localhost:5001").await.unwrap();
        election.elect("S2", "http://localhost:5002").await.unwrap();

        let leader = election.current_leader().await.unwrap();
        assert_eq!(leader.server_id, "S2");
        assert!(!election.is_leader("S1").await);
        assert!(election.is_leader("S2").await);
    }

    #[tokio::test]
    async fn test_mark_down_matching_id() {
        let dir = TempDir::new().unwrap();
        let election = election_in(&dir);

        election.elect("S1", "http://localhost:5001").await.unwrap();
        election.mark_down("S1").await.unwrap();

        let leader = election.current_leader().await.unwrap();
        assert_eq!(leader.server_id, "S1");
        assert!(!leader.is_active);
        assert!(!election.is_leader("S1").await);
    }

    #[tokio::test]
    async fn test_mark_down_other_id_is_noop() {
        let dir = TempDir::new().unwrap();
        let election = election_in(&dir);

        election.elect("S1", "http://localhost:5001").await.unwrap();
        election.mark_down("S2").await.unwrap();

        let leader = election.current_leader().await.unwrap();
        assert!(leader.is_active);
        assert!(election.is_leader("S1").await);
    }

    #[tokio::test]
    async fn test_mark_down_with_no_leader_is_noop() {
        let dir = TempDir::new().unwrap();
        let election = election_in(&dir);

        election.mark_down("S1").await.unwrap();
        assert!(election.current_leader().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_no_leader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leader.json");
        tokio::fs::write(&path, "not json at all").await.unwrap();

        let election = LeaderElection::new(&path);
        assert!(election.current_leader().await.is_none());
    }

    #[tokio::test]
    async fn test_reelection_after_mark_down() {
        let dir = TempDir::new().unwrap();
        let election = election_in(&dir);

        election.elect("S1", "http://localhost:5001").await.unwrap();
        election.mark_down("S1").await.unwrap();
        election.elect("S2", "http://localhost:5002").await.unwrap();

        let leader = election.current_leader().await.unwrap();
        assert_eq!(leader.server_id, "S2");
        assert!(leader.is_active);
    }
}
