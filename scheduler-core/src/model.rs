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

//! Shared data model for the scheduler core: nodes, offers, job executions and
//! tasks, collapsed into plain Rust structs since persistence is an external
//! collaborator here.

use crate::resources::Resources;
use std::collections::HashMap;

pub type NodeId = i64;
pub type AgentId = String;
pub type OfferId = String;
pub type JobTypeId = i64;
pub type QueueId = i64;
pub type ExeId = i64;
pub type TaskId = String;

/// A worker node. `id` is durable; `agent_id` is rewritten every time the
/// worker process underneath re-registers with the resource broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub agent_id: AgentId,
    pub hostname: String,
    pub capacity: Resources,
    pub is_paused: bool,
    pub is_active: bool,
}

impl Node {
    pub fn is_schedulable(&self) -> bool {
        self.is_active && !self.is_paused
    }
}

/// An offer pushed by the resource broker driver. Immutable once received.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub offer_id: OfferId,
    pub node_id: NodeId,
    pub resources: Resources,
}

/// A queued job execution, read-only within a scheduling round.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJobExe {
    pub queue_id: QueueId,
    pub job_type_id: JobTypeId,
    pub required_resources: Resources,
    pub configuration_ref: String,
}

/// Status of an individual task as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Staging,
    Running,
    Finished,
    Failed,
    Lost,
}

impl TaskStatus {
    /// `Lost` is handled identically to `Failed` everywhere in this crate.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Lost)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Failed | TaskStatus::Lost
        )
    }
}

/// A task descriptor, opaque to the scheduler beyond id and resource footprint.
/// `payload` already carries any container parameters (volume mounts, env) the
/// task builder computed ahead of time; the scheduler never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub resources: Resources,
    pub payload: String,
}

/// One position in a running execution's task list (pre/main/post task are the
/// typical three, but the list length is not fixed by this crate).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub resources: Resources,
    pub payload: String,
}

/// A job execution that has been admitted and scheduled onto a node.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningJobExe {
    pub exe_id: ExeId,
    pub node_id: NodeId,
    pub agent_id_at_schedule: AgentId,
    pub task_list: Vec<TaskDescriptor>,
    pub current_task_index: usize,
    pub outstanding: bool,
}

impl RunningJobExe {
    pub fn new(
        exe_id: ExeId,
        node_id: NodeId,
        agent_id_at_schedule: AgentId,
        task_list: Vec<TaskDescriptor>,
    ) -> Self {
        RunningJobExe {
            exe_id,
            node_id,
            agent_id_at_schedule,
            task_list,
            current_task_index: 0,
            outstanding: false,
        }
    }

    /// The next task this execution would run, without consuming it.
    pub fn peek_next_task(&self) -> Option<&TaskDescriptor> {
        if self.outstanding {
            return None;
        }
        self.task_list.get(self.current_task_index)
    }

    /// True once every task in the list has completed.
    pub fn is_complete(&self) -> bool {
        self.current_task_index >= self.task_list.len()
    }

    /// Consumes the next task descriptor, advances the index and marks this
    /// execution as having one outstanding task on the driver. Returns `None`
    /// if the task list is exhausted or a task is already outstanding.
    pub fn start_next_task(&mut self) -> Option<Task> {
        if self.outstanding {
            return None;
        }
        let descriptor = self.task_list.get(self.current_task_index)?.clone();
        self.current_task_index += 1;
        self.outstanding = true;
        Some(Task {
            task_id: descriptor.task_id,
            agent_id: self.agent_id_at_schedule.clone(),
            resources: descriptor.resources,
            payload: descriptor.payload,
        })
    }

    /// Clears the outstanding flag once a task status update/timeout for the
    /// current task has been observed.
    pub fn clear_outstanding(&mut self) {
        self.outstanding = false;
    }
}

/// A read-only view of job type state, rebuilt from an external manager once
/// per loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTypeView {
    pub is_paused: bool,
}

pub type JobTypeSnapshot = HashMap<JobTypeId, JobTypeView>;
