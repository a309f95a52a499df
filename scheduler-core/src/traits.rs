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

//! Interfaces for the two external collaborators the scheduling loop drives:
//! the resource broker driver and the persistence layer. Neither is
//! implemented for real here; the scheduler only depends on these traits.

use crate::error::Result;
use crate::model::{
    AgentId, JobTypeSnapshot, Node, NodeId, Offer, OfferId, QueuedJobExe, RunningJobExe, Task,
};
use async_trait::async_trait;

/// The resource broker driver: launches/declines offers and is the sink for
/// every task the loop produces. A real implementation talks to the cluster
/// resource broker over whatever wire protocol it exposes; the loop only
/// needs this trait.
#[async_trait]
pub trait ResourceBrokerDriver: Send + Sync {
    /// Launch `tasks` using the offers named by `offer_ids`. Launch is
    /// idempotent by `task_id` on the broker side.
    async fn launch_tasks(&self, offer_ids: &[OfferId], tasks: &[Task]) -> Result<()>;

    /// Decline a single previously-received offer, returning its resources to
    /// the broker's free pool.
    async fn decline_offer(&self, offer_id: &OfferId) -> Result<()>;
}

/// The durable catalog of queued and running job executions.
/// `schedule_job_executions` is the one call that must be atomic.
#[async_trait]
pub trait PersistenceLayer: Send + Sync {
    /// Returns the queue in priority order.
    async fn get_queue(&self) -> Result<Vec<QueuedJobExe>>;

    /// Atomically transitions every item of `batch` from QUEUED to RUNNING on
    /// the node (and its current agent id) it was paired with by the offer
    /// manager. Either every item is returned as a `RunningJobExe` bound to
    /// that same node, or the call fails and no state changes persist.
    /// Transient failures should be surfaced as
    /// `SchedulerError::TransientPersistence` so the scheduling loop retries.
    async fn schedule_job_executions(
        &self,
        batch: Vec<(NodeId, AgentId, QueuedJobExe)>,
    ) -> Result<Vec<RunningJobExe>>;
}

/// The node registry's external input: a point-in-time view of the cluster.
/// Implemented by `NodeRegistry` in the `scheduler` crate; expressed here as a
/// trait so the loop doesn't need to depend on the concrete type.
pub trait NodeSnapshotSource: Send + Sync {
    fn get_nodes(&self) -> Vec<Node>;
}

/// The job type manager's external input.
pub trait JobTypeSnapshotSource: Send + Sync {
    fn snapshot(&self) -> JobTypeSnapshot;
}

/// Newly received offers arrive through this narrow push interface; the
/// driver calls it from its own callback thread.
pub trait OfferSink: Send + Sync {
    fn add_offers(&self, offers: Vec<Offer>);
}
