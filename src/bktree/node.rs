//! Arena storage for BK-tree nodes.

use std::collections::{BTreeMap, VecDeque};

use crate::metric::Metric;

/// Index of a node inside its [`Arena`].
pub(crate) type NodeId = usize;

/// A tree node: one item plus its children keyed by exact distance.
///
/// A node has at most one child at any given distance.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    pub(crate) item: T,
    pub(crate) children: BTreeMap<u32, NodeId>,
}

impl<T> Node<T> {
    fn new(item: T) -> Self {
        Self {
            item,
            children: BTreeMap::new(),
        }
    }
}

/// Owns every node of a tree. Slot 0 is the root when the arena is non-empty.
///
/// Nodes are never removed, so ids stay valid for the arena's lifetime.
#[derive(Debug, Clone)]
pub(crate) struct Arena<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id]
    }

    /// Append `item` as a child of `parent` under `distance` without
    /// measuring anything. Used when rebuilding from a snapshot.
    pub(crate) fn attach(&mut self, parent: Option<(NodeId, u32)>, item: T) -> NodeId {
        let id = self.nodes.len();
        if let Some((parent, distance)) = parent {
            self.nodes[parent].children.insert(distance, id);
        }
        self.nodes.push(Node::new(item));
        id
    }

    /// Breadth-first iterator over node ids, siblings in ascending distance.
    pub(crate) fn bfs(&self) -> Bfs<'_, T> {
        Bfs {
            arena: self,
            queue: self.root().into_iter().collect(),
        }
    }
}

impl<T: Metric> Arena<T> {
    /// Classic BK-tree insertion: walk down by distance until a free slot
    /// is found. Returns the id of the new node.
    pub(crate) fn insert(&mut self, item: T) -> NodeId {
        let id = self.nodes.len();
        let Some(mut current) = self.root() else {
            self.nodes.push(Node::new(item));
            return id;
        };

        loop {
            let node = &mut self.nodes[current];
            let distance = node.item.distance(&item);
            match node.children.get(&distance).copied() {
                Some(child) => current = child,
                None => {
                    node.children.insert(distance, id);
                    break;
                }
            }
        }

        self.nodes.push(Node::new(item));
        id
    }
}

/// See [`Arena::bfs`].
pub(crate) struct Bfs<'a, T> {
    arena: &'a Arena<T>,
    queue: VecDeque<NodeId>,
}

impl<T> Iterator for Bfs<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.queue.pop_front()?;
        self.queue
            .extend(self.arena.node(id).children.values().copied());
        Some(id)
    }
}
