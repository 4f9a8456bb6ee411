//! BK-tree: a metric tree answering "everything within distance r" queries.
//!
//! Implements the structure from Burkhard & Keller, "Some approaches to
//! best-match file searching" (1973). Children are keyed by their exact
//! distance to the parent, so a range query only needs to descend into
//! children whose key lies within `radius` of the query's distance to the
//! parent.

pub(crate) mod node;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{DepictError, Result};
use crate::metric::Metric;
use crate::persistence::serialization::{NodeRecord, TreeSnapshot};

use node::{Arena, NodeId};

/// A thread-safe BK-tree.
///
/// Insertions take an exclusive lock over the whole root-to-leaf walk;
/// queries share a read lock. All access goes through these methods, nodes
/// are never handed out.
#[derive(Debug)]
pub struct BkTree<T> {
    arena: RwLock<Arena<T>>,
}

impl<T> Default for BkTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BkTree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            arena: RwLock::new(Arena::new()),
        }
    }

    // Nodes are pushed and linked without any fallible step in between, so
    // a panicking holder cannot leave the arena half-written.
    fn read(&self) -> RwLockReadGuard<'_, Arena<T>> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena<T>> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels, 0 for an empty tree.
    pub fn depth(&self) -> usize {
        let arena = self.read();
        let Some(root) = arena.root() else {
            return 0;
        };

        let mut deepest = 0;
        let mut queue = VecDeque::from([(root, 1usize)]);
        while let Some((id, level)) = queue.pop_front() {
            deepest = deepest.max(level);
            queue.extend(
                arena
                    .node(id)
                    .children
                    .values()
                    .map(|&child| (child, level + 1)),
            );
        }
        deepest
    }
}

impl<T: Metric> BkTree<T> {
    /// Insert `item`, creating exactly one new node.
    ///
    /// Names are not checked; see [`insert_if_absent`](Self::insert_if_absent).
    pub fn add(&self, item: T) {
        self.write().insert(item);
    }

    /// Insert `item` unless an item with the same name is already stored.
    ///
    /// The lookup and the insertion happen under one write lock, so
    /// concurrent callers never create duplicate names. Returns whether the
    /// item was inserted.
    pub fn insert_if_absent(&self, item: T) -> bool {
        let mut arena = self.write();
        if find_by_name(&arena, item.name()).is_some() {
            return false;
        }
        arena.insert(item);
        true
    }

    /// Names of all stored items in breadth-first order.
    pub fn names(&self) -> Vec<String> {
        let arena = self.read();
        arena
            .bfs()
            .map(|id| arena.node(id).item.name().to_string())
            .collect()
    }

    /// All-pairs similarity sweep.
    ///
    /// Every node, in breadth-first order, is used as a query with `radius`.
    /// A match is recorded under the querying node's name unless the match's
    /// name is already a key of the result. Because the check is on keys, not
    /// on pairs, the output is order-dependent and asymmetric: with two equal
    /// items only the first one visited gets an entry.
    pub fn search_similars(&self, radius: u32) -> BTreeMap<String, Vec<String>> {
        let arena = self.read();
        let mut results: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for id in arena.bfs() {
            let item = &arena.node(id).item;
            for (matched, _) in search_ids(&arena, item, radius) {
                let matched_name = arena.node(matched).item.name();
                if !results.contains_key(matched_name) {
                    results
                        .entry(item.name().to_string())
                        .or_default()
                        .push(matched_name.to_string());
                }
            }
        }

        results
    }
}

impl<T: Metric + Clone> BkTree<T> {
    /// Every stored item within `radius` of `query`, excluding items named
    /// like the query. Results come in traversal order.
    pub fn search(&self, query: &T, radius: u32) -> Vec<T> {
        let arena = self.read();
        search_ids(&arena, query, radius)
            .into_iter()
            .map(|(id, _)| arena.node(id).item.clone())
            .collect()
    }

    /// Same as [`search`](Self::search), paired with each match's distance.
    pub fn search_with_distance(&self, query: &T, radius: u32) -> Vec<(T, u32)> {
        let arena = self.read();
        search_ids(&arena, query, radius)
            .into_iter()
            .map(|(id, distance)| (arena.node(id).item.clone(), distance))
            .collect()
    }

    /// First item named `name` in breadth-first order.
    pub fn search_by_name(&self, name: &str) -> Option<T> {
        let arena = self.read();
        find_by_name(&arena, name).map(|id| arena.node(id).item.clone())
    }
}

impl<T: Clone> BkTree<T> {
    /// Export the tree as breadth-first node records.
    pub fn to_snapshot(&self) -> TreeSnapshot<T> {
        let arena = self.read();
        let mut nodes = Vec::with_capacity(arena.len());
        let mut queue: VecDeque<(NodeId, Option<usize>, u32)> =
            arena.root().map(|root| (root, None, 0)).into_iter().collect();

        while let Some((id, parent, distance)) = queue.pop_front() {
            let position = nodes.len();
            let node = arena.node(id);
            nodes.push(NodeRecord {
                item: node.item.clone(),
                parent,
                distance,
            });
            queue.extend(
                node.children
                    .iter()
                    .map(|(&key, &child)| (child, Some(position), key)),
            );
        }

        TreeSnapshot {
            hasher: None,
            nodes,
        }
    }
}

impl<T> BkTree<T> {
    /// Rebuild a tree from a snapshot, keeping every child under the
    /// distance key it was saved with.
    ///
    /// Records must come parents first, with exactly one root at position
    /// 0 and no two children under the same key. Distances are trusted, not
    /// recomputed.
    pub fn from_snapshot(snapshot: TreeSnapshot<T>) -> Result<Self> {
        let mut arena = Arena::new();

        for (position, record) in snapshot.nodes.into_iter().enumerate() {
            let parent = match (position, record.parent) {
                (0, None) => None,
                (0, Some(parent)) => {
                    return Err(corrupt(format!("root refers to parent {}", parent)));
                }
                (_, None) => return Err(corrupt(format!("node {} has no parent", position))),
                (_, Some(parent)) if parent >= position => {
                    return Err(corrupt(format!(
                        "node {} refers to parent {} that is not before it",
                        position, parent
                    )));
                }
                (_, Some(parent)) => {
                    if arena.node(parent).children.contains_key(&record.distance) {
                        return Err(corrupt(format!(
                            "node {} reuses key {} under parent {}",
                            position, record.distance, parent
                        )));
                    }
                    Some((parent, record.distance))
                }
            };
            arena.attach(parent, record.item);
        }

        Ok(Self {
            arena: RwLock::new(arena),
        })
    }
}

fn corrupt(reason: String) -> DepictError {
    DepictError::CorruptSnapshot(reason)
}

/// Breadth-first range query returning matching node ids and distances.
fn search_ids<T: Metric>(arena: &Arena<T>, query: &T, radius: u32) -> Vec<(NodeId, u32)> {
    let mut results = Vec::new();
    let Some(root) = arena.root() else {
        return results;
    };

    let mut candidates = VecDeque::from([root]);
    while let Some(id) = candidates.pop_front() {
        let node = arena.node(id);
        let distance = node.item.distance(query);

        if distance <= radius && node.item.name() != query.name() {
            results.push((id, distance));
        }

        // Triangle inequality: a child under key k can only hold matches
        // when |k - distance| <= radius.
        let low = distance.saturating_sub(radius);
        let high = distance.saturating_add(radius);
        candidates.extend(node.children.range(low..=high).map(|(_, &child)| child));
    }

    results
}

fn find_by_name<T: Metric>(arena: &Arena<T>, name: &str) -> Option<NodeId> {
    arena.bfs().find(|&id| arena.node(id).item.name() == name)
}
