//! Prefix-sharing node trees.
//!
//! PACx archives index their contents with tries instead of flat name tables. Names that share a
//! prefix hang off a common node holding that prefix, so `cat.png`, `car.png` and `dog.png` become:
//!
//! ```text
//! (root)
//! ├── ca
//! │   ├── r.png
//! │   └── t.png
//! └── dog.png
//! ```
//!
//! Nodes are stored flat, in depth-first pre-order, which is also the order the on-disk node array
//! uses. Nodes carrying a payload get a dense payload index in the same order.

use std::cmp::Ordering;

use tracing::trace;

use crate::error::{Error, Result};

/// A single node of a [`NodeTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<T> {
    /// Name fragment; the full name is the concatenation of all fragments from the root
    pub name: String,
    /// Payload attached to this node
    pub payload: Option<T>,
    /// Index of the parent node, `None` for the root
    pub parent: Option<usize>,
    /// Indices of the children, in order
    pub children: Vec<usize>,
    /// Position of this node in the payload list, set for every node carrying a payload
    pub payload_index: Option<usize>,
}

impl<T> Node<T> {
    fn new(name: String, payload: Option<T>, parent: Option<usize>) -> Self {
        Self {
            name,
            payload,
            parent,
            children: Vec::new(),
            payload_index: None,
        }
    }
}

/// A trie of named payloads, stored as a flat node arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTree<T> {
    nodes: Vec<Node<T>>,
    data_indices: Vec<usize>,
}

impl<T> Default for NodeTree<T> {
    fn default() -> Self {
        Self {
            nodes: vec![Node::new(String::new(), None, None)],
            data_indices: Vec::new(),
        }
    }
}

impl<T> NodeTree<T> {
    /// Build a minimal trie out of `entries`
    ///
    /// Entries are sorted by name first, so the result does not depend on input order. When `nest` is
    /// set, every payload is stored on an unnamed child of the node carrying its name, which lets a
    /// node have both a payload and named children. Names must be unique.
    pub fn pack(entries: Vec<(String, T)>, nest: bool) -> Self {
        let mut tree = Self::default();
        tree.pack_level(0, entries, nest);
        tree
    }

    /// Rebuild a tree from nodes read from disk
    ///
    /// Node 0 must be the root. Every other node must name an earlier node as its parent and be listed
    /// among that parent's children, and payload indices must be dense.
    pub fn from_nodes(nodes: Vec<Node<T>>) -> Result<Self> {
        match nodes.first() {
            Some(root) if root.parent.is_none() => {}
            Some(_) => return Err(Error::Integrity("root node has a parent".to_owned())),
            None => return Err(Error::Integrity("node tree has no root".to_owned())),
        }

        let mut data_indices = vec![None; nodes.iter().filter(|n| n.payload.is_some()).count()];
        for (index, node) in nodes.iter().enumerate() {
            if index > 0 {
                let parent = match node.parent {
                    Some(parent) if parent < index => parent,
                    other => {
                        return Err(Error::Integrity(format!(
                            "node {index} has parent {other:?} which is not an earlier node"
                        )))
                    }
                };
                if !nodes[parent].children.contains(&index) {
                    return Err(Error::Integrity(format!(
                        "node {index} is not a child of its parent {parent}"
                    )));
                }
            }

            if let Some(&child) = node.children.iter().find(|&&c| c <= index || c >= nodes.len()) {
                return Err(Error::Integrity(format!(
                    "node {index} lists invalid child {child}"
                )));
            }

            match (node.payload.is_some(), node.payload_index) {
                (true, Some(slot)) if slot < data_indices.len() && data_indices[slot].is_none() => {
                    data_indices[slot] = Some(index);
                }
                (false, None) => {}
                _ => {
                    return Err(Error::Integrity(format!(
                        "node {index} has an invalid payload index {:?}",
                        node.payload_index
                    )))
                }
            }
        }

        Ok(Self {
            nodes,
            data_indices: data_indices.into_iter().flatten().collect(),
        })
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    /// Node indices of every payload, ordered by payload index
    pub fn data_indices(&self) -> &[usize] {
        &self.data_indices
    }

    /// Number of nodes, the root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but its root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Full name of a node, built from every fragment between it and the root
    pub fn full_name(&self, index: usize) -> String {
        let mut fragments = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let Some(node) = self.nodes.get(i) else {
                break;
            };
            if !node.name.is_empty() {
                fragments.push(node.name.as_str());
            }
            current = node.parent;
        }
        fragments.reverse();
        fragments.concat()
    }

    /// Payloads with their full names, in payload order
    pub fn entries(&self) -> Vec<(String, &T)> {
        self.data_indices
            .iter()
            .filter_map(|&i| Some((self.full_name(i), self.nodes[i].payload.as_ref()?)))
            .collect()
    }

    /// Consume the tree, returning its payloads with their full names in payload order
    pub fn into_entries(self) -> Vec<(String, T)> {
        let names: Vec<_> = self.data_indices.iter().map(|&i| self.full_name(i)).collect();
        let mut nodes: Vec<_> = self.nodes.into_iter().map(Some).collect();
        self.data_indices
            .iter()
            .zip(names)
            .filter_map(|(&i, name)| Some((name, nodes[i].take()?.payload?)))
            .collect()
    }

    fn push(&mut self, parent: usize, name: String, payload: Option<T>) -> usize {
        let index = self.nodes.len();
        let mut node = Node::new(name, payload, Some(parent));
        if node.payload.is_some() {
            node.payload_index = Some(self.data_indices.len());
            self.data_indices.push(index);
        }
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    fn attach(&mut self, parent: usize, name: String, payload: Option<T>, nest: bool) -> usize {
        trace!("attaching {name:?} under node {parent}");
        if nest {
            let index = self.push(parent, name, None);
            if payload.is_some() {
                self.push(index, String::new(), payload);
            }
            index
        } else {
            self.push(parent, name, payload)
        }
    }

    fn pack_level(&mut self, parent: usize, mut entries: Vec<(String, T)>, nest: bool) {
        entries.sort_by(|a, b| compare_names(&a.0, &b.0));

        if entries.len() <= 1 {
            if let Some((name, payload)) = entries.pop() {
                self.attach(parent, name, Some(payload), nest);
            }
            return;
        }

        // sorted, so any shared first character shows up between neighbours
        let shares_first = entries
            .windows(2)
            .any(|w| first_char(&w[0].0) == first_char(&w[1].0));
        if !shares_first {
            for (name, payload) in entries {
                self.attach(parent, name, Some(payload), nest);
            }
            return;
        }

        let first = first_char(&entries[0].0);
        let split = entries
            .iter()
            .position(|(name, _)| first_char(name) != first)
            .unwrap_or(entries.len());
        let no_matches = entries.split_off(split);
        let mut matches = entries;

        // the common prefix of a sorted run is the one shared by its first and last entry
        let prefix_len = match (matches.first(), matches.last()) {
            (Some((a, _)), Some((b, _))) => common_prefix_len(a, b),
            _ => 0,
        };
        let prefix = matches[0].0[..prefix_len].to_owned();

        let payload = if matches[0].0.len() == prefix_len {
            Some(matches.remove(0).1)
        } else {
            None
        };

        let node = self.attach(parent, prefix, payload, nest);
        let rest = matches
            .into_iter()
            .map(|(name, payload)| (name[prefix_len..].to_owned(), payload))
            .collect();
        self.pack_level(node, rest, nest);
        self.pack_level(parent, no_matches, nest);
    }
}

fn first_char(name: &str) -> Option<char> {
    name.chars().next()
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map_or(a.len().min(b.len()), |((i, _), _)| i)
}
