// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Runtime Context
//!
//! Sets up the process-wide resources a local job needs:
//! 1. **Thread Pool**: a `rayon` pool that runs one export session per task.
//! 2. **Database Client**: the `nzsql` connection factory shared by all tasks.
//! 3. **CPU Scaling**: the pool size follows `parallel`, or a share of cores.
//!
//! Each session still has exactly two threads of its own: the rayon worker
//! driving the record loop and the statement worker it spawns.

use crate::config::AppConfig;
use crate::infrastructure::netezza::nzsql::{NzsqlConnectionFactory, NzsqlSettings};
use crate::ports::connection_port::ConnectionFactory;
use log::info;
use std::sync::Arc;

/// `RuntimeContext` holds shared resources that exist for the entire life of the app.
pub struct RuntimeContext {
    pub connections: Arc<dyn ConnectionFactory>,
}

/// Tasks to run at once: `parallel` if set, else `cpu_percent` of the cores.
pub fn task_parallelism(config: &AppConfig, total_cpus: usize) -> usize {
    let cpu_percent = config.export.cpu_percent.unwrap_or(50);
    let num_threads = config
        .export
        .parallel
        .unwrap_or_else(|| (total_cpus as f64 * (cpu_percent as f64 / 100.0)).ceil() as usize);

    // Always run at least 1 thread.
    std::cmp::max(1, num_threads)
}

impl RuntimeContext {
    /// Initializes the global thread pool and the database client.
    pub fn init(config: &AppConfig) -> Self {
        let num_threads = task_parallelism(config, num_cpus::get());
        info!(
            "Initializing task pool with {} threads (Target CPU: {}%)",
            num_threads,
            config.export.cpu_percent.unwrap_or(50)
        );

        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("nz-task-{}", i))
            .build_global()
            .unwrap_or_else(|e| {
                info!(
                    "Global thread pool already initialized (likely in a test): {}",
                    e
                );
            });

        let settings = NzsqlSettings::from_config(&config.database, config.password());
        info!(
            "Using {} against {}:{}/{}",
            settings.program, settings.host, settings.port, settings.database
        );

        Self {
            connections: Arc::new(NzsqlConnectionFactory::new(settings)),
        }
    }
}
