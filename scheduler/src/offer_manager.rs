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

//! Accumulates offers per node, answers admission queries for queued and
//! running job executions, and surfaces admitted work grouped by node.

use parking_lot::Mutex;
use scheduler_core::model::{Node, NodeId, Offer, OfferId, QueuedJobExe, RunningJobExe};
use scheduler_core::resources::Resources;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected,
}

/// Per-node aggregation of offers and the admission decisions made against
/// them this round.
#[derive(Debug, Clone)]
pub struct NodeOffers {
    pub node: Node,
    pub offer_ids: Vec<OfferId>,
    pub available: Resources,
    pub accepted_new: Vec<QueuedJobExe>,
    pub accepted_running: Vec<RunningJobExe>,
}

impl NodeOffers {
    fn new(node: Node) -> Self {
        NodeOffers {
            node,
            offer_ids: Vec::new(),
            available: Resources::zero(),
            accepted_new: Vec::new(),
            accepted_running: Vec::new(),
        }
    }

    fn has_accepted_work(&self) -> bool {
        !self.accepted_new.is_empty() || !self.accepted_running.is_empty()
    }

    fn reset(&mut self) {
        self.offer_ids.clear();
        self.available = Resources::zero();
        self.accepted_new.clear();
        self.accepted_running.clear();
    }
}

struct State {
    /// One entry per node the manager has ever seen that still has
    /// something outstanding (capacity, offers, or is in the current
    /// snapshot). Entries for nodes absent from the snapshot and holding no
    /// offers are dropped eagerly.
    by_node: HashMap<NodeId, NodeOffers>,
    /// Offers received via `add_offers` but not yet merged by
    /// `ready_new_offers`.
    pending: Vec<Offer>,
}

pub struct OfferManager {
    state: Mutex<State>,
}

impl OfferManager {
    pub fn new() -> Self {
        OfferManager {
            state: Mutex::new(State {
                by_node: HashMap::new(),
                pending: Vec::new(),
            }),
        }
    }

    /// Synchronizes per-node slots with the node registry. Nodes present in
    /// `nodes` get their cached identity refreshed (capacity, pause/active
    /// flags); their offers and reservations are untouched. Nodes missing
    /// from `nodes` are marked inactive so admission skips them; their
    /// pending offers are kept so they still get declined once drained by
    /// `pop_all_offers`/`pop_offers_with_accepted_job_exes`.
    pub fn update_nodes(&self, nodes: &[Node]) {
        let mut state = self.state.lock();
        let seen: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();

        for node in nodes {
            state
                .by_node
                .entry(node.id)
                .and_modify(|entry| entry.node = node.clone())
                .or_insert_with(|| NodeOffers::new(node.clone()));
        }

        let mut to_drop = Vec::new();
        for (node_id, entry) in state.by_node.iter_mut() {
            if !seen.contains(node_id) {
                entry.node.is_active = false;
                if entry.offer_ids.is_empty() {
                    to_drop.push(*node_id);
                }
            }
        }
        for node_id in to_drop {
            state.by_node.remove(&node_id);
        }
    }

    /// Offers land in a buffer here, invisible to admission until the next
    /// `ready_new_offers` call.
    pub fn add_offers(&self, offers: Vec<Offer>) {
        self.state.lock().pending.extend(offers);
    }

    /// Atomically merges the pending buffer into the per-node active set,
    /// summing resources.
    pub fn ready_new_offers(&self) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        for offer in pending {
            if let Some(entry) = state.by_node.get_mut(&offer.node_id) {
                entry.offer_ids.push(offer.offer_id);
                entry.available = entry.available + offer.resources;
            }
            // An offer for a node the registry no longer knows about is
            // dropped; the driver will learn of the missing node separately.
        }
    }

    /// ACCEPTED iff exactly one node is chosen to host `qe` — the
    /// schedulable node with sufficient `available` resources that leaves the
    /// most slack after reservation (memory, then cpu; node_id breaks ties).
    pub fn consider_new_job_exe(&self, qe: &QueuedJobExe) -> Admission {
        let mut state = self.state.lock();
        let best = state
            .by_node
            .values()
            .filter(|entry| entry.node.is_schedulable())
            .filter(|entry| entry.available.fits(&qe.required_resources))
            .max_by(|a, b| {
                let slack_a = a.available.slack_after(&qe.required_resources);
                let slack_b = b.available.slack_after(&qe.required_resources);
                slack_a
                    .mem_mb
                    .partial_cmp(&slack_b.mem_mb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        slack_a
                            .cpus
                            .partial_cmp(&slack_b.cpus)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .then_with(|| b.node.id.cmp(&a.node.id))
            })
            .map(|entry| entry.node.id);

        match best {
            Some(node_id) => {
                let entry = state.by_node.get_mut(&node_id).expect("just selected");
                entry.available = entry.available - qe.required_resources;
                entry.accepted_new.push(qe.clone());
                Admission::Accepted
            }
            None => Admission::Rejected,
        }
    }

    /// Checks the running exe's next task against its already-bound node; if
    /// it fits, reserves the resources and records the acceptance.
    pub fn consider_next_task(&self, re: &RunningJobExe) -> Admission {
        let task = match re.peek_next_task() {
            Some(t) => t,
            None => return Admission::Rejected,
        };
        let mut state = self.state.lock();
        let entry = match state.by_node.get_mut(&re.node_id) {
            Some(entry) if entry.node.is_schedulable() => entry,
            _ => return Admission::Rejected,
        };
        if !entry.available.fits(&task.resources) {
            return Admission::Rejected;
        }
        entry.available = entry.available - task.resources;
        entry.accepted_running.push(re.clone());
        Admission::Accepted
    }

    /// Returns and clears only node entries with at least one accepted exe
    /// or task.
    pub fn pop_offers_with_accepted_job_exes(&self) -> Vec<NodeOffers> {
        let mut state = self.state.lock();
        let node_ids: Vec<NodeId> = state
            .by_node
            .iter()
            .filter(|(_, entry)| entry.has_accepted_work())
            .map(|(id, _)| *id)
            .collect();

        let mut result = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            let entry = state.by_node.get_mut(&node_id).unwrap();
            result.push(entry.clone());
            entry.reset();
            if !entry.node.is_active {
                state.by_node.remove(&node_id);
            }
        }
        result
    }

    /// Returns and clears everything — used when a round produced no
    /// schedule so the caller can decline every outstanding offer.
    pub fn pop_all_offers(&self) -> Vec<NodeOffers> {
        let mut state = self.state.lock();
        let mut result = Vec::with_capacity(state.by_node.len());
        let mut to_drop = Vec::new();
        for (node_id, entry) in state.by_node.iter_mut() {
            if !entry.offer_ids.is_empty() {
                result.push(entry.clone());
            }
            entry.reset();
            if !entry.node.is_active {
                to_drop.push(*node_id);
            }
        }
        for node_id in to_drop {
            state.by_node.remove(&node_id);
        }
        result
    }
}

impl Default for OfferManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scheduler_core::model::{ExeId, RunningJobExe, TaskDescriptor};

    fn node(id: NodeId) -> Node {
        Node {
            id,
            agent_id: format!("agent-{}", id),
            hostname: format!("host-{}", id),
            capacity: Resources::new(4.0, 8192.0, 1024.0),
            is_paused: false,
            is_active: true,
        }
    }

    fn offer(id: &str, node_id: NodeId, res: Resources) -> Offer {
        Offer {
            offer_id: id.to_string(),
            node_id,
            resources: res,
        }
    }

    fn queued(id: i64, res: Resources) -> QueuedJobExe {
        QueuedJobExe {
            queue_id: id,
            job_type_id: 1,
            required_resources: res,
            configuration_ref: "{}".to_string(),
        }
    }

    fn running(exe_id: ExeId, node_id: NodeId, res: Resources) -> RunningJobExe {
        RunningJobExe::new(
            exe_id,
            node_id,
            format!("agent-{}", node_id),
            vec![TaskDescriptor {
                task_id: format!("task-{}", exe_id),
                resources: res,
                payload: "{}".to_string(),
            }],
        )
    }

    #[test]
    fn single_placement_accepts_and_reserves() {
        let mgr = OfferManager::new();
        mgr.update_nodes(&[node(1)]);
        mgr.add_offers(vec![offer("o1", 1, Resources::new(4.0, 8192.0, 0.0))]);
        mgr.ready_new_offers();

        let qe = queued(1, Resources::new(1.0, 1024.0, 0.0));
        assert_eq!(mgr.consider_new_job_exe(&qe), Admission::Accepted);

        let groups = mgr.pop_offers_with_accepted_job_exes();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].accepted_new.len(), 1);
    }

    #[test]
    fn best_fit_spreads_across_two_nodes() {
        let mgr = OfferManager::new();
        mgr.update_nodes(&[node(1), node(2)]);
        mgr.add_offers(vec![
            offer("o1", 1, Resources::new(4.0, 8192.0, 0.0)),
            offer("o2", 2, Resources::new(4.0, 8192.0, 0.0)),
        ]);
        mgr.ready_new_offers();

        let qe1 = queued(1, Resources::new(3.0, 4096.0, 0.0));
        let qe2 = queued(2, Resources::new(3.0, 4096.0, 0.0));
        assert_eq!(mgr.consider_new_job_exe(&qe1), Admission::Accepted);
        assert_eq!(mgr.consider_new_job_exe(&qe2), Admission::Accepted);

        let groups = mgr.pop_offers_with_accepted_job_exes();
        assert_eq!(groups.len(), 2, "each exe should land on its own node");
        for g in &groups {
            assert_eq!(g.accepted_new.len(), 1);
        }
    }

    #[test]
    fn insufficient_resources_are_rejected() {
        let mgr = OfferManager::new();
        mgr.update_nodes(&[node(1)]);
        mgr.add_offers(vec![offer("o1", 1, Resources::new(1.0, 512.0, 0.0))]);
        mgr.ready_new_offers();

        let qe = queued(1, Resources::new(4.0, 8192.0, 0.0));
        assert_eq!(mgr.consider_new_job_exe(&qe), Admission::Rejected);
    }

    #[test]
    fn paused_node_is_skipped() {
        let mgr = OfferManager::new();
        let mut paused = node(1);
        paused.is_paused = true;
        mgr.update_nodes(&[paused]);
        mgr.add_offers(vec![offer("o1", 1, Resources::new(4.0, 8192.0, 0.0))]);
        mgr.ready_new_offers();

        let qe = queued(1, Resources::new(1.0, 1024.0, 0.0));
        assert_eq!(mgr.consider_new_job_exe(&qe), Admission::Rejected);
    }

    #[test]
    fn consider_next_task_reserves_on_bound_node() {
        let mgr = OfferManager::new();
        mgr.update_nodes(&[node(1)]);
        mgr.add_offers(vec![offer("o1", 1, Resources::new(4.0, 8192.0, 0.0))]);
        mgr.ready_new_offers();

        let re = running(1, 1, Resources::new(1.0, 1024.0, 0.0));
        assert_eq!(mgr.consider_next_task(&re), Admission::Accepted);
        let groups = mgr.pop_offers_with_accepted_job_exes();
        assert_eq!(groups[0].accepted_running.len(), 1);
    }

    #[test]
    fn pop_all_offers_declines_everything_and_clears_state() {
        let mgr = OfferManager::new();
        mgr.update_nodes(&[node(1), node(2)]);
        mgr.add_offers(vec![
            offer("o1", 1, Resources::new(4.0, 8192.0, 0.0)),
            offer("o2", 2, Resources::new(4.0, 8192.0, 0.0)),
        ]);
        mgr.ready_new_offers();

        let all = mgr.pop_all_offers();
        assert_eq!(all.iter().map(|g| g.offer_ids.len()).sum::<usize>(), 2);

        // A second pop must not return the same offers again.
        let again = mgr.pop_all_offers();
        assert!(again.iter().all(|g| g.offer_ids.is_empty()));
    }

    #[test]
    fn node_removed_from_snapshot_still_yields_its_offers_for_decline() {
        let mgr = OfferManager::new();
        mgr.update_nodes(&[node(1)]);
        mgr.add_offers(vec![offer("o1", 1, Resources::new(4.0, 8192.0, 0.0))]);
        mgr.ready_new_offers();

        mgr.update_nodes(&[]); // node 1 disappears

        let qe = queued(1, Resources::new(1.0, 1024.0, 0.0));
        assert_eq!(
            mgr.consider_new_job_exe(&qe),
            Admission::Rejected,
            "inactive node must not accept new work"
        );

        let all = mgr.pop_all_offers();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].offer_ids, vec!["o1".to_string()]);
    }
}
