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

//! The authoritative in-memory mapping of node identity. Rebuilt wholesale
//! from an external snapshot every round; every other manager derives its own
//! `agent_id -> node_id` view from the same snapshot rather than querying
//! this one mid-round, so there's no cross-manager lock interleaving.

use parking_lot::RwLock;
use scheduler_core::model::{AgentId, Node, NodeId};
use std::collections::HashMap;

#[derive(Default)]
struct State {
    nodes: HashMap<NodeId, Node>,
    by_agent: HashMap<AgentId, NodeId>,
}

pub struct NodeRegistry {
    state: RwLock<State>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry {
            state: RwLock::new(State::default()),
        }
    }

    /// Atomically replaces the node set and fully recomputes the
    /// `agent_id -> node_id` map. Nodes absent from `nodes` are evicted.
    pub fn update_from_snapshot(&self, nodes: Vec<Node>) {
        let mut by_agent = HashMap::with_capacity(nodes.len());
        let mut by_id = HashMap::with_capacity(nodes.len());
        for node in nodes {
            by_agent.insert(node.agent_id.clone(), node.id);
            by_id.insert(node.id, node);
        }
        let mut state = self.state.write();
        state.nodes = by_id;
        state.by_agent = by_agent;
    }

    pub fn get_nodes(&self) -> Vec<Node> {
        self.state.read().nodes.values().cloned().collect()
    }

    pub fn lookup_by_agent(&self, agent_id: &str) -> Option<NodeId> {
        self.state.read().by_agent.get(agent_id).copied()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scheduler_core::resources::Resources;

    fn node(id: NodeId, agent_id: &str) -> Node {
        Node {
            id,
            agent_id: agent_id.to_string(),
            hostname: format!("host-{}", id),
            capacity: Resources::new(4.0, 8192.0, 1024.0),
            is_paused: false,
            is_active: true,
        }
    }

    #[test]
    fn agent_map_matches_snapshot_exactly() {
        let registry = NodeRegistry::new();
        registry.update_from_snapshot(vec![node(1, "agent-a"), node(2, "agent-b")]);
        assert_eq!(registry.lookup_by_agent("agent-a"), Some(1));
        assert_eq!(registry.lookup_by_agent("agent-b"), Some(2));
        assert_eq!(registry.get_nodes().len(), 2);
    }

    #[test]
    fn agent_rotation_is_honored_and_old_id_evicted() {
        let registry = NodeRegistry::new();
        registry.update_from_snapshot(vec![node(1, "agent-old")]);
        registry.update_from_snapshot(vec![node(1, "agent-new")]);
        assert_eq!(registry.lookup_by_agent("agent-old"), None);
        assert_eq!(registry.lookup_by_agent("agent-new"), Some(1));
    }

    #[test]
    fn nodes_missing_from_snapshot_are_evicted() {
        let registry = NodeRegistry::new();
        registry.update_from_snapshot(vec![node(1, "agent-a"), node(2, "agent-b")]);
        registry.update_from_snapshot(vec![node(1, "agent-a")]);
        assert_eq!(registry.get_nodes().len(), 1);
        assert_eq!(registry.lookup_by_agent("agent-b"), None);
    }
}
