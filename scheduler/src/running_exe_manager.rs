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

//! Minimal registry of job executions in flight. Owns the one authoritative
//! copy of every `RunningJobExe`; `get_all_job_exes` hands out clones for the
//! offer manager to peek at, but mutation (`start_next_task`,
//! `clear_outstanding`) always happens through this manager so the
//! authoritative copy is the one that advances.

use parking_lot::Mutex;
use scheduler_core::model::{ExeId, RunningJobExe, Task};
use std::collections::HashMap;

#[derive(Default)]
pub struct RunningExecutionManager {
    exes: Mutex<HashMap<ExeId, RunningJobExe>>,
}

impl RunningExecutionManager {
    pub fn new() -> Self {
        RunningExecutionManager::default()
    }

    pub fn add_job_exes(&self, job_exes: Vec<RunningJobExe>) {
        let mut exes = self.exes.lock();
        for exe in job_exes {
            exes.insert(exe.exe_id, exe);
        }
    }

    /// A point-in-time clone of every running execution, safe to inspect
    /// without holding the manager's lock.
    pub fn get_all_job_exes(&self) -> Vec<RunningJobExe> {
        self.exes.lock().values().cloned().collect()
    }

    /// Starts the next task of `exe_id` on the authoritative copy, returning
    /// the task to launch. Returns `None` if the execution is unknown, has no
    /// remaining tasks, or already has one outstanding.
    pub fn start_next_task(&self, exe_id: ExeId) -> Option<Task> {
        let mut exes = self.exes.lock();
        exes.get_mut(&exe_id)?.start_next_task()
    }

    pub fn clear_outstanding(&self, exe_id: ExeId) {
        if let Some(exe) = self.exes.lock().get_mut(&exe_id) {
            exe.clear_outstanding();
        }
    }

    /// Removes an execution once it reaches a terminal status. Requeuing is a
    /// persistence concern; this manager never transitions an exe back to
    /// queued.
    pub fn remove(&self, exe_id: ExeId) -> Option<RunningJobExe> {
        self.exes.lock().remove(&exe_id)
    }

    pub fn len(&self) -> usize {
        self.exes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
