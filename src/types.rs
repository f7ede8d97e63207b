use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier of one submitted batch.
///
/// Identifiers are handed out by the sleeping pool in strictly increasing
/// order, starting at [`TaskId::FIRST`]. Variants that execute batches during
/// submission return [`TaskId::PLACEHOLDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Returned by task systems without an asynchronous scheduler.
    pub const PLACEHOLDER: TaskId = TaskId(0);

    /// First identifier issued by the sleeping pool.
    pub const FIRST: TaskId = TaskId(1);

    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> TaskId {
        TaskId(self.0 + 1)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which task system implementation to construct.
///
/// - `Serial`: every sub-task on the calling thread.
/// - `Spawn`: fresh threads for every `run` call.
/// - `Spinning`: persistent pool, workers busy-poll for work.
/// - `Sleeping`: persistent pool, idle workers sleep; supports dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    Serial,
    Spawn,
    Spinning,
    Sleeping,
}

impl SystemKind {
    pub const ALL: [SystemKind; 4] = [
        SystemKind::Serial,
        SystemKind::Spawn,
        SystemKind::Spinning,
        SystemKind::Sleeping,
    ];
}

impl Default for SystemKind {
    fn default() -> Self {
        SystemKind::Sleeping
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SystemKind::Serial => "serial",
            SystemKind::Spawn => "spawn",
            SystemKind::Spinning => "spinning",
            SystemKind::Sleeping => "sleeping",
        };
        f.write_str(s)
    }
}

impl FromStr for SystemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serial" => Ok(SystemKind::Serial),
            "spawn" => Ok(SystemKind::Spawn),
            "spinning" | "spin" => Ok(SystemKind::Spinning),
            "sleeping" | "sleep" => Ok(SystemKind::Sleeping),
            other => Err(format!(
                "invalid task system: {other} (expected \"serial\", \"spawn\", \"spinning\" or \"sleeping\")"
            )),
        }
    }
}
