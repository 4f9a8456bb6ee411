//! Snapshot shape and codecs: JSON for interoperable snapshots, bincode for compact ones.

use crate::config::HashSettings;
use crate::error::{DepictError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Serializable representation of a whole tree.
///
/// Nodes are stored flat, in breadth-first order. Each record points at its
/// parent by position and carries the distance key it hangs under, so
/// encoding and decoding cost the same stack however deep the tree is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot<T> {
    /// Hash parameters the items were computed with, when known.
    #[serde(rename = "Hasher")]
    pub hasher: Option<HashSettings>,
    #[serde(rename = "Nodes")]
    pub nodes: Vec<NodeRecord<T>>,
}

/// One node of a [`TreeSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord<T> {
    #[serde(rename = "Image")]
    pub item: T,
    /// Position of the parent record; `None` only for the root.
    #[serde(rename = "Parent")]
    pub parent: Option<usize>,
    /// Key under the parent, 0 for the root.
    #[serde(rename = "Distance")]
    pub distance: u32,
}

impl<T> TreeSnapshot<T> {
    pub fn empty() -> Self {
        Self {
            hasher: None,
            nodes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Nested layout, `{"Root": {"Image": .., "Children": {"<distance>": ..}}}`.
///
/// Only read, never written. JSON nesting grows with tree depth, so these
/// files are decoded under serde_json's recursion limit and a tree too deep
/// for it is rejected with an error.
#[derive(Debug, Deserialize)]
pub struct NestedSnapshot<T> {
    #[serde(rename = "Root")]
    pub root: Option<NestedNode<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct NestedNode<T> {
    #[serde(rename = "Image")]
    pub item: T,
    #[serde(rename = "Children", default)]
    pub children: BTreeMap<u32, NestedNode<T>>,
}

impl<T> NestedSnapshot<T> {
    /// Flatten into breadth-first records.
    pub fn into_flat(self) -> TreeSnapshot<T> {
        let mut nodes = Vec::new();
        let mut queue: VecDeque<(Option<usize>, u32, NestedNode<T>)> =
            self.root.map(|root| (None, 0, root)).into_iter().collect();

        while let Some((parent, distance, node)) = queue.pop_front() {
            let position = nodes.len();
            nodes.push(NodeRecord {
                item: node.item,
                parent,
                distance,
            });
            queue.extend(
                node.children
                    .into_iter()
                    .map(|(key, child)| (Some(position), key, child)),
            );
        }

        TreeSnapshot {
            hasher: None,
            nodes,
        }
    }
}

/// On-disk encoding of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// Self-describing JSON.
    #[default]
    Json,
    /// bincode 1.x.
    Bincode,
}

impl SnapshotFormat {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            SnapshotFormat::Json => to_json(value),
            SnapshotFormat::Bincode => to_bincode(value),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            SnapshotFormat::Json => from_json(bytes),
            SnapshotFormat::Bincode => from_bincode(bytes),
        }
    }

    /// Decode a tree snapshot. JSON input may also use the nested layout.
    pub fn decode_tree<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<TreeSnapshot<T>> {
        self.decode(bytes).or_else(|flat_err| match self {
            SnapshotFormat::Json => from_json::<NestedSnapshot<T>>(bytes)
                .map(NestedSnapshot::into_flat)
                .map_err(|_| flat_err),
            SnapshotFormat::Bincode => Err(flat_err),
        })
    }
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DepictError::Serialization(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| DepictError::Serialization(e.to_string()))
}

/// Encode data to JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| DepictError::Serialization(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| DepictError::Serialization(e.to_string()))
}
