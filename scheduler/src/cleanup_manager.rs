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

//! Per-node queue of cleanup work left behind by finished job executions:
//! workspace paths to delete and a container to remove. One cleanup task is
//! ever in flight per node; a status update resolves it and either drops the
//! entries (success) or re-queues them at the front (failure).

use parking_lot::Mutex;
use scheduler_core::model::{AgentId, ExeId, Node, NodeId, TaskStatus};
use std::collections::HashMap;

/// Maximum number of finished executions batched into one cleanup task.
const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct CleanupEntry {
    pub exe_id: ExeId,
    pub workspace_paths: Vec<String>,
    pub container_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CleanupTask {
    pub task_id: String,
    pub node_id: NodeId,
    pub agent_id: AgentId,
    pub entries: Vec<CleanupEntry>,
}

struct NodeCleanup {
    node: Node,
    queue: Vec<CleanupEntry>,
    in_flight: Option<CleanupTask>,
}

impl NodeCleanup {
    fn new(node: Node) -> Self {
        NodeCleanup {
            node,
            queue: Vec::new(),
            in_flight: None,
        }
    }

    fn next_task(&mut self) -> Option<CleanupTask> {
        if self.in_flight.is_some() || self.queue.is_empty() {
            return None;
        }
        let take = self.queue.len().min(MAX_BATCH_SIZE);
        let entries: Vec<CleanupEntry> = self.queue.drain(..take).collect();
        let task = CleanupTask {
            task_id: format!("cleanup-{}-{}", self.node.id, entries[0].exe_id),
            node_id: self.node.id,
            agent_id: self.node.agent_id.clone(),
            entries,
        };
        self.in_flight = Some(task.clone());
        self.in_flight.clone()
    }

    fn resolve(&mut self, status: TaskStatus) {
        let task = match self.in_flight.take() {
            Some(t) => t,
            None => return,
        };
        match status {
            TaskStatus::Staging | TaskStatus::Running => {
                // Not terminal; put it back and keep waiting.
                self.in_flight = Some(task);
            }
            TaskStatus::Finished => {
                // Entries are done; nothing to requeue.
            }
            TaskStatus::Failed | TaskStatus::Lost => {
                let mut requeued = task.entries;
                requeued.extend(std::mem::take(&mut self.queue));
                self.queue = requeued;
            }
        }
    }
}

struct State {
    agent_ids: HashMap<AgentId, NodeId>,
    nodes: HashMap<NodeId, NodeCleanup>,
}

pub struct CleanupManager {
    state: Mutex<State>,
}

impl CleanupManager {
    pub fn new() -> Self {
        CleanupManager {
            state: Mutex::new(State {
                agent_ids: HashMap::new(),
                nodes: HashMap::new(),
            }),
        }
    }

    /// Fully recomputes the agent map; preserves existing per-node queues,
    /// gives new nodes an empty one. Never drops a node's queue just because
    /// it momentarily vanished from the snapshot — only `update_nodes` calls
    /// with that node included again matter; a node that truly never comes
    /// back simply accumulates a queue nobody drains, which is surfaced via
    /// `queue_len` for operator visibility rather than auto-pruned here.
    pub fn update_nodes(&self, nodes: &[Node]) {
        let mut state = self.state.lock();
        state.agent_ids.clear();
        for node in nodes {
            state
                .nodes
                .entry(node.id)
                .and_modify(|entry| entry.node = node.clone())
                .or_insert_with(|| NodeCleanup::new(node.clone()));
            state.agent_ids.insert(node.agent_id.clone(), node.id);
        }
    }

    /// Appends `exe`'s cleanup requirements to its node's queue. Silently
    /// dropped if the node is unknown — the node may have disappeared in the
    /// same round this execution finished.
    pub fn add_job_execution(
        &self,
        node_id: NodeId,
        exe_id: ExeId,
        workspace_paths: Vec<String>,
        container_name: Option<String>,
    ) {
        let mut state = self.state.lock();
        if let Some(entry) = state.nodes.get_mut(&node_id) {
            entry.queue.push(CleanupEntry {
                exe_id,
                workspace_paths,
                container_name,
            });
        }
    }

    /// One cleanup task per node that has queued work and nothing already
    /// in flight.
    pub fn get_next_tasks(&self) -> Vec<CleanupTask> {
        let mut state = self.state.lock();
        state
            .nodes
            .values_mut()
            .filter_map(|entry| entry.next_task())
            .collect()
    }

    pub fn handle_task_update(&self, agent_id: &str, status: TaskStatus) {
        let mut state = self.state.lock();
        let node_id = match state.agent_ids.get(agent_id) {
            Some(id) => *id,
            None => return,
        };
        if let Some(entry) = state.nodes.get_mut(&node_id) {
            entry.resolve(status);
        }
    }

    /// A timeout is handled identically to a `Failed` status update.
    pub fn handle_task_timeout(&self, agent_id: &str) {
        self.handle_task_update(agent_id, TaskStatus::Failed);
    }

    pub fn queue_len(&self, node_id: NodeId) -> usize {
        self.state
            .lock()
            .nodes
            .get(&node_id)
            .map(|e| e.queue.len())
            .unwrap_or(0)
    }
}

impl Default for CleanupManager {
    fn default() -> Self {
        Self::new()
    }
}
