//! Test builders shared across crates (`oj-storage`, `oj-daemon`) via the
//! `test-support` feature, so downstream crates don't hand-roll fixture
//! builders per test module.

use crate::role::Role;
use crate::worker::{Worker, WorkerId};
use std::path::PathBuf;

/// Builder for a [`Worker`] fixture, defaulting to a freshly-created `dev`
/// worker in `/tmp/project`.
pub struct WorkerBuilder {
    worker: Worker,
}

impl WorkerBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            worker: Worker::new(WorkerId::new(id), Role::Dev, PathBuf::from("/tmp/project"), "default", 1_000, true, None),
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.worker.role = role;
        self
    }

    pub fn project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.worker.project_path = path.into();
        self
    }

    pub fn town(mut self, town: impl Into<String>) -> Self {
        self.worker.town = town.into();
        self
    }

    pub fn bead_id(mut self, bead: impl Into<String>) -> Self {
        self.worker.bead_id = Some(bead.into());
        self
    }

    pub fn status(mut self, status: crate::worker::WorkerStatus) -> Self {
        self.worker.status = status;
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.worker.pid = Some(pid);
        self
    }

    pub fn crash_count(mut self, n: u32) -> Self {
        self.worker.crash_count = n;
        self
    }

    pub fn build(self) -> Worker {
        self.worker
    }
}
