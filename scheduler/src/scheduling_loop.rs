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

//! The scheduling loop: one round refreshes node and job-type state, offers
//! running executions their next task and queued executions a node, then
//! hands the accepted batch to persistence and the resource broker driver.

use crate::node_registry::NodeRegistry;
use crate::offer_manager::OfferManager;
use crate::running_exe_manager::RunningExecutionManager;
use scheduler_core::config::SchedulingTunables;
use scheduler_core::model::Task;
use scheduler_core::traits::{JobTypeSnapshotSource, PersistenceLayer, ResourceBrokerDriver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative shutdown flag shared between the loop and whatever owns its
/// task handle. `shutdown()` only requests a stop at the next round boundary
/// and never cancels an in-flight driver call.
pub struct ShutdownHandle(AtomicBool);

impl ShutdownHandle {
    pub fn new() -> Self {
        ShutdownHandle(AtomicBool::new(true))
    }

    pub fn shutdown(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SchedulingLoop<D, P, J> {
    driver: D,
    persistence: P,
    job_type_source: J,
    node_registry: NodeRegistry,
    offer_manager: OfferManager,
    running_exes: RunningExecutionManager,
    tunables: SchedulingTunables,
    is_paused: AtomicBool,
}

impl<D, P, J> SchedulingLoop<D, P, J>
where
    D: ResourceBrokerDriver,
    P: PersistenceLayer,
    J: JobTypeSnapshotSource,
{
    pub fn new(
        driver: D,
        persistence: P,
        job_type_source: J,
        node_registry: NodeRegistry,
        offer_manager: OfferManager,
        running_exes: RunningExecutionManager,
        tunables: SchedulingTunables,
    ) -> Self {
        SchedulingLoop {
            driver,
            persistence,
            job_type_source,
            node_registry,
            offer_manager,
            running_exes,
            tunables,
            is_paused: AtomicBool::new(false),
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.is_paused.store(paused, Ordering::SeqCst);
    }

    pub fn offer_manager(&self) -> &OfferManager {
        &self.offer_manager
    }

    pub fn node_registry(&self) -> &NodeRegistry {
        &self.node_registry
    }

    /// Runs rounds until `shutdown` is flipped. Sleeps `tunables.delay`
    /// between rounds only when a round launched nothing.
    pub async fn run(&self, shutdown: &ShutdownHandle) {
        log::info!("scheduling loop started");
        while shutdown.is_running() {
            let started = Instant::now();
            let num_tasks = self.perform_round().await;
            let elapsed = started.elapsed();

            if elapsed > self.tunables.schedule_loop_warn_threshold {
                log::warn!("scheduling round took {:.3}s", elapsed.as_secs_f64());
            } else {
                log::debug!("scheduling round took {:.3}s", elapsed.as_secs_f64());
            }

            if num_tasks == 0 {
                for node_offers in self.offer_manager.pop_all_offers() {
                    for offer_id in &node_offers.offer_ids {
                        if let Err(err) = self.driver.decline_offer(offer_id).await {
                            log::error!("failed to decline offer {}: {}", offer_id, err);
                        }
                    }
                }
                log::debug!(
                    "scheduling loop pausing for {:?}, nothing to launch this round",
                    self.tunables.delay
                );
                tokio::time::sleep(self.tunables.delay).await;
            }
        }
        log::info!("scheduling loop stopped");
    }

    async fn perform_round(&self) -> usize {
        self.offer_manager.update_nodes(&self.node_registry.get_nodes());
        self.offer_manager.ready_new_offers();
        let job_types = self.job_type_source.snapshot();

        for re in self.running_exes.get_all_job_exes() {
            self.offer_manager.consider_next_task(&re);
        }

        if !self.is_paused.load(Ordering::SeqCst) {
            self.consider_new_job_exes(&job_types).await;
        }

        let num_tasks = self.schedule_accepted().await;
        log::info!("launched {} task(s) this round", num_tasks);
        num_tasks
    }

    async fn consider_new_job_exes(&self, job_types: &scheduler_core::model::JobTypeSnapshot) {
        let queue = match self.persistence.get_queue().await {
            Ok(queue) => queue,
            Err(err) => {
                log::error!("failed to read queue: {}", err);
                return;
            }
        };

        let mut admitted = 0usize;
        for qe in queue {
            match job_types.get(&qe.job_type_id) {
                Some(view) if !view.is_paused => {}
                _ => continue,
            }
            if self.offer_manager.consider_new_job_exe(&qe)
                == crate::offer_manager::Admission::Accepted
            {
                admitted += 1;
                if admitted >= self.tunables.max_new_job_exes {
                    break;
                }
            }
        }
    }

    async fn schedule_accepted(&self) -> usize {
        use std::collections::HashMap;

        let groups = self.offer_manager.pop_offers_with_accepted_job_exes();
        let mut tasks_by_node: HashMap<scheduler_core::model::NodeId, Vec<Task>> = HashMap::new();
        let mut to_schedule = Vec::new();

        for group in &groups {
            let node_tasks = tasks_by_node.entry(group.node.id).or_default();
            for re in &group.accepted_running {
                if let Some(task) = self.running_exes.start_next_task(re.exe_id) {
                    node_tasks.push(task);
                }
            }
            to_schedule.extend(
                group
                    .accepted_new
                    .iter()
                    .cloned()
                    .map(|qe| (group.node.id, group.node.agent_id.clone(), qe)),
            );
        }

        if !to_schedule.is_empty() {
            match self.schedule_with_retry(to_schedule).await {
                Ok(scheduled) => {
                    self.running_exes.add_job_exes(scheduled.clone());
                    for re in scheduled {
                        if let Some(task) = self.running_exes.start_next_task(re.exe_id) {
                            tasks_by_node.entry(re.node_id).or_default().push(task);
                        }
                    }
                }
                Err(err) => {
                    log::error!("failed to schedule queued job executions: {}", err);
                }
            }
        }

        let mut num_tasks = 0;
        for group in &groups {
            let tasks = tasks_by_node.remove(&group.node.id).unwrap_or_default();
            num_tasks += tasks.len();
            if let Err(err) = self.driver.launch_tasks(&group.offer_ids, &tasks).await {
                log::error!("failed to launch tasks on node {}: {}", group.node.id, err);
            }
        }
        num_tasks
    }

    async fn schedule_with_retry(
        &self,
        batch: Vec<(
            scheduler_core::model::NodeId,
            scheduler_core::model::AgentId,
            scheduler_core::model::QueuedJobExe,
        )>,
    ) -> scheduler_core::Result<Vec<scheduler_core::model::RunningJobExe>> {
        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            let result = self.persistence.schedule_job_executions(batch.clone()).await;
            let elapsed = started.elapsed();
            if elapsed > self.tunables.schedule_query_warn_threshold {
                log::warn!(
                    "schedule_job_executions took {:.3}s",
                    elapsed.as_secs_f64()
                );
            }

            match result {
                Ok(scheduled) => return Ok(scheduled),
                Err(err) if err.is_retryable() && attempt < self.tunables.retry.max_tries => {
                    let delay = self.tunables.retry.delay_for_attempt(attempt);
                    log::warn!(
                        "transient persistence error on attempt {}, retrying in {:?}: {}",
                        attempt,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use scheduler_core::model::{
        ExeId, JobTypeSnapshot, JobTypeView, Node, Offer, OfferId, QueuedJobExe, RunningJobExe,
        TaskDescriptor,
    };
    use scheduler_core::resources::Resources;
    use scheduler_core::{Result, SchedulerError};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FakeDriver {
        launched: Mutex<Vec<(Vec<OfferId>, usize)>>,
        declined: Mutex<Vec<OfferId>>,
    }

    impl FakeDriver {
        fn new() -> Self {
            FakeDriver {
                launched: Mutex::new(Vec::new()),
                declined: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ResourceBrokerDriver for FakeDriver {
        async fn launch_tasks(&self, offer_ids: &[OfferId], tasks: &[Task]) -> Result<()> {
            self.launched
                .lock()
                .push((offer_ids.to_vec(), tasks.len()));
            Ok(())
        }

        async fn decline_offer(&self, offer_id: &OfferId) -> Result<()> {
            self.declined.lock().push(offer_id.clone());
            Ok(())
        }
    }

    struct FakePersistence {
        queue: Mutex<Vec<QueuedJobExe>>,
        next_exe_id: Mutex<ExeId>,
        fail_times: Mutex<u32>,
    }

    impl FakePersistence {
        fn new(queue: Vec<QueuedJobExe>) -> Self {
            FakePersistence {
                queue: Mutex::new(queue),
                next_exe_id: Mutex::new(0),
                fail_times: Mutex::new(0),
            }
        }

        fn failing(queue: Vec<QueuedJobExe>, times: u32) -> Self {
            let p = Self::new(queue);
            *p.fail_times.lock() = times;
            p
        }
    }

    #[async_trait]
    impl PersistenceLayer for FakePersistence {
        async fn get_queue(&self) -> Result<Vec<QueuedJobExe>> {
            Ok(self.queue.lock().clone())
        }

        async fn schedule_job_executions(
            &self,
            batch: Vec<(scheduler_core::model::NodeId, scheduler_core::model::AgentId, QueuedJobExe)>,
        ) -> Result<Vec<RunningJobExe>> {
            {
                let mut fail_times = self.fail_times.lock();
                if *fail_times > 0 {
                    *fail_times -= 1;
                    return Err(SchedulerError::TransientPersistence(
                        "db unavailable".to_string(),
                    ));
                }
            }
            let mut next_id = self.next_exe_id.lock();
            let mut result = Vec::with_capacity(batch.len());
            for (node_id, agent_id, qe) in batch {
                *next_id += 1;
                result.push(RunningJobExe::new(
                    *next_id,
                    node_id,
                    agent_id,
                    vec![TaskDescriptor {
                        task_id: format!("task-{}", next_id),
                        resources: qe.required_resources,
                        payload: "{}".to_string(),
                    }],
                ));
            }
            Ok(result)
        }
    }

    struct FakeJobTypes(JobTypeSnapshot);

    impl JobTypeSnapshotSource for FakeJobTypes {
        fn snapshot(&self) -> JobTypeSnapshot {
            self.0.clone()
        }
    }

    fn node(id: scheduler_core::model::NodeId) -> Node {
        Node {
            id,
            agent_id: "agent-1".to_string(),
            hostname: "host-1".to_string(),
            capacity: Resources::new(4.0, 8192.0, 1024.0),
            is_paused: false,
            is_active: true,
        }
    }

    fn default_tunables() -> SchedulingTunables {
        let mut tunables = SchedulingTunables::default();
        tunables.delay = Duration::from_millis(1);
        tunables
    }

    #[tokio::test]
    async fn empty_round_declines_all_offers_and_launches_nothing() {
        let driver = Arc::new(FakeDriver::new());
        let persistence = FakePersistence::new(vec![]);
        let mut job_types = HashMap::new();
        job_types.insert(1, JobTypeView { is_paused: false });

        let node_registry = NodeRegistry::new();
        node_registry.update_from_snapshot(vec![node(1)]);
        let offer_manager = OfferManager::new();
        offer_manager.add_offers(vec![Offer {
            offer_id: "o1".to_string(),
            node_id: 1,
            resources: Resources::new(4.0, 8192.0, 0.0),
        }]);

        let sched = SchedulingLoop::new(
            FakeDriverRef(driver.clone()),
            persistence,
            FakeJobTypes(job_types),
            node_registry,
            offer_manager,
            RunningExecutionManager::new(),
            default_tunables(),
        );

        let num_tasks = sched.perform_round().await;
        assert_eq!(num_tasks, 0);
        assert_eq!(driver.declined.lock().len(), 1);
    }

    #[tokio::test]
    async fn single_queued_exe_is_admitted_scheduled_and_launched() {
        let driver = Arc::new(FakeDriver::new());
        let persistence = FakePersistence::new(vec![QueuedJobExe {
            queue_id: 1,
            job_type_id: 1,
            required_resources: Resources::new(1.0, 1024.0, 0.0),
            configuration_ref: "{}".to_string(),
        }]);
        let mut job_types = HashMap::new();
        job_types.insert(1, JobTypeView { is_paused: false });

        let node_registry = NodeRegistry::new();
        node_registry.update_from_snapshot(vec![node(1)]);
        let offer_manager = OfferManager::new();
        offer_manager.add_offers(vec![Offer {
            offer_id: "o1".to_string(),
            node_id: 1,
            resources: Resources::new(4.0, 8192.0, 0.0),
        }]);

        let sched = SchedulingLoop::new(
            FakeDriverRef(driver.clone()),
            persistence,
            FakeJobTypes(job_types),
            node_registry,
            offer_manager,
            RunningExecutionManager::new(),
            default_tunables(),
        );

        let num_tasks = sched.perform_round().await;
        assert_eq!(num_tasks, 1);
        assert_eq!(driver.launched.lock().len(), 1);
        assert_eq!(sched.running_exes.len(), 1);
    }

    #[tokio::test]
    async fn paused_loop_admits_nothing_new() {
        let driver = Arc::new(FakeDriver::new());
        let persistence = FakePersistence::new(vec![QueuedJobExe {
            queue_id: 1,
            job_type_id: 1,
            required_resources: Resources::new(1.0, 1024.0, 0.0),
            configuration_ref: "{}".to_string(),
        }]);
        let mut job_types = HashMap::new();
        job_types.insert(1, JobTypeView { is_paused: false });

        let node_registry = NodeRegistry::new();
        node_registry.update_from_snapshot(vec![node(1)]);
        let offer_manager = OfferManager::new();
        offer_manager.add_offers(vec![Offer {
            offer_id: "o1".to_string(),
            node_id: 1,
            resources: Resources::new(4.0, 8192.0, 0.0),
        }]);

        let sched = SchedulingLoop::new(
            FakeDriverRef(driver.clone()),
            persistence,
            FakeJobTypes(job_types),
            node_registry,
            offer_manager,
            RunningExecutionManager::new(),
            default_tunables(),
        );
        sched.set_paused(true);

        let num_tasks = sched.perform_round().await;
        assert_eq!(num_tasks, 0);
    }

    #[tokio::test]
    async fn transient_persistence_failure_retries_then_succeeds() {
        let driver = Arc::new(FakeDriver::new());
        let persistence = FakePersistence::failing(
            vec![QueuedJobExe {
                queue_id: 1,
                job_type_id: 1,
                required_resources: Resources::new(1.0, 1024.0, 0.0),
                configuration_ref: "{}".to_string(),
            }],
            2,
        );
        let mut job_types = HashMap::new();
        job_types.insert(1, JobTypeView { is_paused: false });

        let node_registry = NodeRegistry::new();
        node_registry.update_from_snapshot(vec![node(1)]);
        let offer_manager = OfferManager::new();
        offer_manager.add_offers(vec![Offer {
            offer_id: "o1".to_string(),
            node_id: 1,
            resources: Resources::new(4.0, 8192.0, 0.0),
        }]);

        let mut tunables = default_tunables();
        tunables.retry.base_delay = Duration::from_millis(1);
        tunables.retry.max_delay = Duration::from_millis(2);

        let sched = SchedulingLoop::new(
            FakeDriverRef(driver.clone()),
            persistence,
            FakeJobTypes(job_types),
            node_registry,
            offer_manager,
            RunningExecutionManager::new(),
            tunables,
        );

        let num_tasks = sched.perform_round().await;
        assert_eq!(num_tasks, 1, "should succeed on the third attempt");
    }

    /// Cheap `Arc<FakeDriver>` wrapper so the driver can be shared with the
    /// test's assertions after being moved into the loop.
    struct FakeDriverRef(Arc<FakeDriver>);

    #[async_trait]
    impl ResourceBrokerDriver for FakeDriverRef {
        async fn launch_tasks(&self, offer_ids: &[OfferId], tasks: &[Task]) -> Result<()> {
            self.0.launch_tasks(offer_ids, tasks).await
        }

        async fn decline_offer(&self, offer_id: &OfferId) -> Result<()> {
            self.0.decline_offer(offer_id).await
        }
    }
}
