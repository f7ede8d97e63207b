// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::fault::TaskFault;
use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum TaskSysError {
    #[error("invalid thread count: {0} (a task system needs at least one thread)")]
    InvalidThreadCount(usize),

    #[error("unknown dependency {id}: no batch with this id was issued (next id is {next})")]
    UnknownTaskId { id: TaskId, next: TaskId },

    #[error("task panicked: {0}")]
    TaskPanicked(TaskFault),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to join worker thread: {0}")]
    WorkerJoin(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in batch graph: {0}")]
    DagCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TaskSysError>;
