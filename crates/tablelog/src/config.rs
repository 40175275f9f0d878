//! sync configuration

use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_MAX_PLAYERS;
use crate::{Error, Result};

/// knobs of the sync orchestrator. unspecified fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// new commands required since the last own snapshot
    pub snapshot_min_commands: usize,
    /// wall clock required since the last own snapshot
    pub snapshot_min_interval_ms: u64,
    /// snapshots retained per authoring actor after gc
    pub snapshots_kept_per_actor: usize,
    pub max_players: usize,
    /// players only; spectators never author snapshots
    pub emit_snapshots: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_min_commands: 200,
            snapshot_min_interval_ms: 60_000,
            snapshots_kept_per_actor: 3,
            max_players: DEFAULT_MAX_PLAYERS,
            emit_snapshots: true,
        }
    }
}

impl SyncConfig {
    /// parse a json document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_players == 0 {
            return Err(Error::InvalidConfig("maxPlayers must be positive".into()));
        }
        if self.snapshots_kept_per_actor == 0 {
            return Err(Error::InvalidConfig(
                "snapshotsKeptPerActor must be positive".into(),
            ));
        }
        Ok(())
    }

    /// whether an emission attempt is due
    pub fn snapshot_due(&self, new_commands: usize, since_last_ms: u64) -> bool {
        self.emit_snapshots
            && new_commands >= self.snapshot_min_commands
            && since_last_ms >= self.snapshot_min_interval_ms
    }
}
