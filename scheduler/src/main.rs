// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

mod cleanup_manager;
mod memory_backends;
mod node_registry;
mod offer_manager;
mod running_exe_manager;
mod scheduling_loop;

use cleanup_manager::CleanupManager;
use memory_backends::{InMemoryPersistence, LoggingDriver, StaticJobTypes};
use node_registry::NodeRegistry;
use offer_manager::OfferManager;
use running_exe_manager::RunningExecutionManager;
use scheduler_core::config::SchedulingTunables;
use scheduler_core::traits::ResourceBrokerDriver;
use scheduling_loop::{SchedulingLoop, ShutdownHandle};
use std::sync::Arc;
use std::time::Duration;

configure_me::include_config!();

#[tokio::main]
async fn main() {
    env_logger::init();

    let (config, _remaining_args) =
        Config::including_optional_config_files(&["scheduler.toml"]).unwrap_or_exit();

    log::info!("starting scheduler, bind_port={}", config.bind_port);

    let tunables = SchedulingTunables {
        delay: Duration::from_secs(config.delay_secs),
        max_new_job_exes: config.max_new_job_exes,
        schedule_loop_warn_threshold: Duration::from_millis(config.schedule_loop_warn_threshold_ms),
        schedule_query_warn_threshold: Duration::from_millis(
            config.schedule_query_warn_threshold_ms,
        ),
        retry: scheduler_core::config::RetryPolicy {
            max_tries: config.retry_max_tries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        },
    };

    // Composition root: every manager is constructed once here and handed
    // to the loop by reference. No process-wide singletons.
    let node_registry = NodeRegistry::new();
    let offer_manager = OfferManager::new();
    let running_exes = RunningExecutionManager::new();
    let cleanup = Arc::new(CleanupManager::new());

    let sched = SchedulingLoop::new(
        LoggingDriver,
        InMemoryPersistence::new(Vec::new()),
        StaticJobTypes::new(std::iter::empty::<scheduler_core::model::JobTypeId>()),
        node_registry,
        offer_manager,
        running_exes,
        tunables,
    );

    let shutdown = Arc::new(ShutdownHandle::new());
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("received shutdown signal");
        shutdown_signal.shutdown();
    });

    // Cleanup dispatch runs on its own cadence, independent of the
    // scheduling loop's round: it has no offers to wait on, only whatever
    // finished executions have queued behind it.
    let cleanup_shutdown = shutdown.clone();
    tokio::spawn(run_cleanup_dispatch(cleanup, cleanup_shutdown, tunables.delay));

    sched.run(&shutdown).await;
}

async fn run_cleanup_dispatch(
    cleanup: Arc<CleanupManager>,
    shutdown: Arc<ShutdownHandle>,
    delay: Duration,
) {
    let driver = LoggingDriver;
    while shutdown.is_running() {
        for task in cleanup.get_next_tasks() {
            let offer_ids: Vec<String> = Vec::new();
            let tasks = vec![scheduler_core::model::Task {
                task_id: task.task_id,
                agent_id: task.agent_id,
                resources: scheduler_core::resources::Resources::zero(),
                payload: format!("{:?}", task.entries),
            }];
            if let Err(err) = driver.launch_tasks(&offer_ids, &tasks).await {
                log::error!("failed to launch cleanup task: {}", err);
            }
        }
        tokio::time::sleep(delay).await;
    }
}
