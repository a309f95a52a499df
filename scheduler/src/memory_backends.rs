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

//! Stand-in persistence, driver and job-type collaborators wired up by the
//! composition root when no real broker/database is configured. Useful for
//! local runs and integration tests; a deployment replaces these with
//! implementations of the same traits talking to the real services.

use async_trait::async_trait;
use parking_lot::Mutex;
use scheduler_core::model::{
    AgentId, ExeId, JobTypeId, JobTypeSnapshot, JobTypeView, NodeId, OfferId, QueuedJobExe,
    RunningJobExe, Task, TaskDescriptor,
};
use scheduler_core::traits::{JobTypeSnapshotSource, PersistenceLayer, ResourceBrokerDriver};
use scheduler_core::Result;
use std::collections::HashMap;

/// Logs every launch/decline instead of talking to a real resource broker.
pub struct LoggingDriver;

#[async_trait]
impl ResourceBrokerDriver for LoggingDriver {
    async fn launch_tasks(&self, offer_ids: &[OfferId], tasks: &[Task]) -> Result<()> {
        log::info!(
            "launch_tasks: offers={:?} tasks={:?}",
            offer_ids,
            tasks.iter().map(|t| &t.task_id).collect::<Vec<_>>()
        );
        Ok(())
    }

    async fn decline_offer(&self, offer_id: &OfferId) -> Result<()> {
        log::debug!("decline_offer: {}", offer_id);
        Ok(())
    }
}

struct PersistenceState {
    queue: Vec<QueuedJobExe>,
    next_exe_id: ExeId,
}

/// An in-process queue with no durability; every queued exe is handed a
/// single-task list of its own `configuration_ref` as payload, since task
/// synthesis from a real job definition is outside this crate's scope.
pub struct InMemoryPersistence {
    state: Mutex<PersistenceState>,
}

impl InMemoryPersistence {
    pub fn new(queue: Vec<QueuedJobExe>) -> Self {
        InMemoryPersistence {
            state: Mutex::new(PersistenceState {
                queue,
                next_exe_id: 0,
            }),
        }
    }

    pub fn enqueue(&self, qe: QueuedJobExe) {
        self.state.lock().queue.push(qe);
    }
}

#[async_trait]
impl PersistenceLayer for InMemoryPersistence {
    async fn get_queue(&self) -> Result<Vec<QueuedJobExe>> {
        Ok(self.state.lock().queue.clone())
    }

    async fn schedule_job_executions(
        &self,
        batch: Vec<(NodeId, AgentId, QueuedJobExe)>,
    ) -> Result<Vec<RunningJobExe>> {
        let mut state = self.state.lock();
        let mut result = Vec::with_capacity(batch.len());
        for (node_id, agent_id, qe) in &batch {
            state.queue.retain(|q| q.queue_id != qe.queue_id);
            state.next_exe_id += 1;
            result.push(RunningJobExe::new(
                state.next_exe_id,
                *node_id,
                agent_id.clone(),
                vec![TaskDescriptor {
                    task_id: format!("exe-{}-task-0", state.next_exe_id),
                    resources: qe.required_resources,
                    payload: qe.configuration_ref.clone(),
                }],
            ));
        }
        Ok(result)
    }
}

/// A fixed, never-paused job type view. Real deployments back this with the
/// job type manager's own snapshot.
pub struct StaticJobTypes(HashMap<JobTypeId, JobTypeView>);

impl StaticJobTypes {
    pub fn new(job_type_ids: impl IntoIterator<Item = JobTypeId>) -> Self {
        StaticJobTypes(
            job_type_ids
                .into_iter()
                .map(|id| (id, JobTypeView { is_paused: false }))
                .collect(),
        )
    }
}

impl JobTypeSnapshotSource for StaticJobTypes {
    fn snapshot(&self) -> JobTypeSnapshot {
        self.0.clone()
    }
}
