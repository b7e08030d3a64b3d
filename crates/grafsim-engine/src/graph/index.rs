use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::warn;

use grafsim_core::diagram::{Diagram, GateKind};

/// What a node in the arena is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Step,
    Transition,
    Gate(GateKind),
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Upstream,
    Downstream,
}

/// Arena view of a diagram.
///
/// Steps are registered first, in declaration order, so sorting step node
/// indices yields declaration order.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    ids: Vec<String>,
    kinds: Vec<NodeKind>,
    lookup: HashMap<String, usize>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
}

impl GraphIndex {
    pub fn new(diagram: &Diagram) -> Self {
        let mut index = Self::default();

        for step in &diagram.steps {
            index.register(&step.id, NodeKind::Step);
        }
        for transition in &diagram.transitions {
            index.register(&transition.id, NodeKind::Transition);
        }
        for gate in &diagram.gates {
            index.register(&gate.id, NodeKind::Gate(gate.kind));
        }

        for conn in &diagram.connections {
            match (index.index_of(&conn.source_id), index.index_of(&conn.target_id)) {
                (Some(src), Some(tgt)) => {
                    index.outgoing[src].push(tgt);
                    index.incoming[tgt].push(src);
                }
                _ => {
                    warn!(
                        connection = %conn.id,
                        source = %conn.source_id,
                        target = %conn.target_id,
                        "Connection references an unknown node, ignoring"
                    );
                }
            }
        }

        index
    }

    fn register(&mut self, id: &str, kind: NodeKind) {
        if self.lookup.contains_key(id) {
            warn!(node_id = %id, "Duplicate node id, keeping the first declaration");
            return;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.kinds.push(kind);
        self.incoming.push(Vec::new());
        self.outgoing.push(Vec::new());
        self.lookup.insert(id.to_string(), idx);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub fn kind(&self, idx: usize) -> NodeKind {
        self.kinds[idx]
    }

    pub fn incoming(&self, idx: usize) -> &[usize] {
        &self.incoming[idx]
    }

    pub fn outgoing(&self, idx: usize) -> &[usize] {
        &self.outgoing[idx]
    }

    /// Steps that ultimately feed `node_id`, looking through gates.
    /// Unknown ids and nodes with no step ancestry yield an empty set.
    pub fn upstream_steps(&self, node_id: &str) -> BTreeSet<String> {
        self.index_of(node_id)
            .map(|idx| self.ids_of(&self.upstream_step_nodes(idx)))
            .unwrap_or_default()
    }

    /// Steps ultimately fed by `node_id`, looking through gates.
    pub fn downstream_steps(&self, node_id: &str) -> BTreeSet<String> {
        self.index_of(node_id)
            .map(|idx| self.ids_of(&self.downstream_step_nodes(idx)))
            .unwrap_or_default()
    }

    pub fn upstream_step_nodes(&self, idx: usize) -> BTreeSet<usize> {
        self.walk(idx, Direction::Upstream)
    }

    pub fn downstream_step_nodes(&self, idx: usize) -> BTreeSet<usize> {
        self.walk(idx, Direction::Downstream)
    }

    fn ids_of(&self, nodes: &BTreeSet<usize>) -> BTreeSet<String> {
        nodes.iter().map(|&n| self.ids[n].clone()).collect()
    }

    /// Worklist walk from `start`. Steps are collected and not descended,
    /// gates are passed through, anything else stops the branch.
    fn walk(&self, start: usize, direction: Direction) -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        let mut visited = HashSet::from([start]);
        let mut stack: Vec<usize> = self.neighbours(start, direction).to_vec();

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            match self.kinds[node] {
                NodeKind::Step => {
                    found.insert(node);
                }
                NodeKind::Gate(_) => stack.extend_from_slice(self.neighbours(node, direction)),
                NodeKind::Transition => {}
            }
        }

        found
    }

    fn neighbours(&self, idx: usize, direction: Direction) -> &[usize] {
        match direction {
            Direction::Upstream => &self.incoming[idx],
            Direction::Downstream => &self.outgoing[idx],
        }
    }
}
