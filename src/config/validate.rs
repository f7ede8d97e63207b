// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{RawWorkloadFile, WorkloadFile};
use crate::errors::{Result, TaskSysError};

/// Fibonacci grows exponentially; anything above this runs for minutes.
const MAX_FIBONACCI: u64 = 40;

impl TryFrom<RawWorkloadFile> for WorkloadFile {
    type Error = TaskSysError;

    fn try_from(raw: RawWorkloadFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_batches(&raw)?;
        validate_global_config(&raw)?;
        validate_batches(&raw)?;
        let order = dependency_order(&raw)?;
        Ok(WorkloadFile::new_unchecked(raw.config, raw.batch, order))
    }
}

fn ensure_has_batches(cfg: &RawWorkloadFile) -> Result<()> {
    if cfg.batch.is_empty() {
        return Err(TaskSysError::ConfigError(
            "workload must contain at least one [batch.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawWorkloadFile) -> Result<()> {
    if cfg.config.threads == 0 {
        return Err(TaskSysError::ConfigError(
            "[config].threads must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.repeat == 0 {
        return Err(TaskSysError::ConfigError(
            "[config].repeat must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_batches(cfg: &RawWorkloadFile) -> Result<()> {
    for (name, batch) in cfg.batch.iter() {
        if batch.kind == crate::config::WorkKind::Fibonacci && batch.work > MAX_FIBONACCI {
            return Err(TaskSysError::ConfigError(format!(
                "batch '{}' asks for fibonacci({}); the limit is {}",
                name, batch.work, MAX_FIBONACCI
            )));
        }
        for dep in batch.after.iter() {
            if !cfg.batch.contains_key(dep) {
                return Err(TaskSysError::ConfigError(format!(
                    "batch '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(TaskSysError::ConfigError(format!(
                    "batch '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Topologically sort the batches, failing on cycles.
fn dependency_order(cfg: &RawWorkloadFile) -> Result<Vec<String>> {
    // Edge direction: dep -> batch. For `[batch.B] after = ["A"]` we add A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.batch.keys() {
        graph.add_node(name.as_str());
    }

    for (name, batch) in cfg.batch.iter() {
        for dep in batch.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(TaskSysError::DagCycle(format!(
            "cycle detected in batch graph involving batch '{}'",
            cycle.node_id()
        ))),
    }
}
