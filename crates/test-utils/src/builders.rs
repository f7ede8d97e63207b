#![allow(dead_code)]

use std::collections::BTreeMap;
use tasksys::config::{BatchConfig, ConfigSection, RawWorkloadFile, WorkKind, WorkloadFile};
use tasksys::types::SystemKind;

/// Builder for `WorkloadFile` to simplify test setup.
pub struct WorkloadBuilder {
    workload: RawWorkloadFile,
}

impl WorkloadBuilder {
    pub fn new() -> Self {
        Self {
            workload: RawWorkloadFile {
                config: ConfigSection::default(),
                batch: BTreeMap::new(),
            },
        }
    }

    pub fn with_batch(mut self, name: &str, batch: BatchConfig) -> Self {
        self.workload.batch.insert(name.to_string(), batch);
        self
    }

    pub fn system(mut self, system: SystemKind) -> Self {
        self.workload.config.system = system;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.workload.config.threads = threads;
        self
    }

    pub fn raw(self) -> RawWorkloadFile {
        self.workload
    }

    pub fn build(self) -> WorkloadFile {
        WorkloadFile::try_from(self.workload).expect("Failed to build valid workload from builder")
    }
}

impl Default for WorkloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `BatchConfig`.
pub struct BatchBuilder {
    batch: BatchConfig,
}

impl BatchBuilder {
    pub fn new(kind: WorkKind, tasks: usize) -> Self {
        Self {
            batch: BatchConfig {
                kind,
                tasks,
                work: 0,
                after: vec![],
            },
        }
    }

    pub fn noop(tasks: usize) -> Self {
        Self::new(WorkKind::Noop, tasks)
    }

    pub fn work(mut self, work: u64) -> Self {
        self.batch.work = work;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.batch.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> BatchConfig {
        self.batch
    }
}
