// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::SystemKind;

/// Workload file exactly as read from TOML, before validation.
///
/// ```toml
/// [config]
/// system = "sleeping"
/// threads = 8
///
/// [batch.A]
/// kind = "arithmetic"
/// tasks = 64
/// work = 10000
///
/// [batch.B]
/// kind = "noop"
/// tasks = 16
/// after = ["A"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkloadFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All batches from `[batch.<name>]`, keyed by name.
    #[serde(default)]
    pub batch: BTreeMap<String, BatchConfig>,
}

/// A validated workload.
///
/// Can only be obtained through `TryFrom<RawWorkloadFile>`, so every `after`
/// reference is known to exist and the batch graph is acyclic.
#[derive(Debug, Clone)]
pub struct WorkloadFile {
    pub config: ConfigSection,
    pub batch: BTreeMap<String, BatchConfig>,
    /// Batch names ordered so that every batch comes after its dependencies.
    order: Vec<String>,
}

impl WorkloadFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        batch: BTreeMap<String, BatchConfig>,
        order: Vec<String>,
    ) -> Self {
        Self {
            config,
            batch,
            order,
        }
    }

    /// Batches in dependency order.
    pub fn batches_in_order(&self) -> impl Iterator<Item = (&str, &BatchConfig)> {
        self.order
            .iter()
            .filter_map(|name| self.batch.get(name).map(|b| (name.as_str(), b)))
    }

    /// Total number of sub-tasks across all batches.
    pub fn total_sub_tasks(&self) -> usize {
        self.batch.values().map(|b| b.tasks).sum()
    }
}

/// `[config]` section. Every field can be overridden on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub system: SystemKind,

    /// Worker thread budget. Defaults to the available parallelism.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// How many times the whole workload is executed.
    #[serde(default = "default_repeat")]
    pub repeat: usize,
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn default_repeat() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            system: SystemKind::default(),
            threads: default_threads(),
            repeat: default_repeat(),
        }
    }
}

/// Built-in work a batch can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    /// Returns immediately; measures pure scheduling overhead.
    Noop,
    /// `work` iterations of a floating point loop per sub-task.
    Arithmetic,
    /// Naive recursive Fibonacci of `work` per sub-task.
    Fibonacci,
    /// Sleeps `work` microseconds per sub-task.
    Sleep,
}

/// `[batch.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub kind: WorkKind,

    /// Number of sub-tasks in the batch.
    pub tasks: usize,

    /// Size parameter for `kind`; meaning depends on the kind.
    #[serde(default)]
    pub work: u64,

    /// Names of batches that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}
