// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::thread;

/// Settings shared by every simulation started from a [`crate::Simulator`].
///
/// Host layers usually deserialize this from JSON, so every field has a default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulatorConfig {
    /// Seed of the state RNG stream used by measurements and noise channels.
    pub seed: u64,
    /// Upper bound on the worker threads of a gradient batch. `None` uses the available
    /// parallelism of the machine.
    pub parallel_worker: Option<usize>,
}

impl SimulatorConfig {
    pub const DEFAULT: Self = Self {
        seed: 42,
        parallel_worker: None,
    };

    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    #[must_use]
    pub fn with_parallel_worker(self, parallel_worker: usize) -> Self {
        Self {
            parallel_worker: Some(parallel_worker),
            ..self
        }
    }

    /// The effective worker limit, never zero.
    #[must_use]
    pub fn worker_limit(&self) -> usize {
        match self.parallel_worker {
            Some(workers) => workers.max(1),
            None => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
