//! Hierarchical views over flat collections.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::engine::LocalEngine;
use crate::filter::Filter;
use crate::model::{Key, Record};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<R> {
    pub key: Key,
    pub title: String,
    pub item: R,
    pub children: Vec<TreeNode<R>>,
    pub disabled: bool,
}

impl<R> TreeNode<R> {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Result of [`build_tree`]: roots plus the keys of every node with children.
#[derive(Debug, Clone)]
pub struct Tree<R> {
    pub roots: Vec<TreeNode<R>>,
    pub expandable_keys: Vec<Key>,
}

/// Build a forest from `parent_id` back-references.
///
/// Records without an id cannot be addressed and are skipped. A record whose
/// parent is absent from the input becomes a root. Cycles not reachable from a
/// root are dropped.
pub fn build_tree<R: Record>(records: &[R]) -> Tree<R> {
    let present: HashSet<Key> = records.iter().filter_map(Record::id).collect();

    let mut children_of: HashMap<Key, Vec<&R>> = HashMap::new();
    let mut roots: Vec<&R> = Vec::new();
    for record in records.iter().filter(|r| r.id().is_some()) {
        match record.parent_id() {
            Some(parent) if present.contains(&parent) => {
                children_of.entry(parent).or_default().push(record);
            }
            _ => roots.push(record),
        }
    }

    let mut visited = HashSet::new();
    let mut expandable_keys = Vec::new();
    let roots = roots
        .into_iter()
        .filter_map(|r| assemble(r, &children_of, &mut visited, &mut expandable_keys))
        .collect::<Vec<_>>();

    debug!(
        marker = "TREE_BUILT",
        operation_type = "tree",
        records = records.len(),
        roots = roots.len(),
        expandable = expandable_keys.len(),
        "Tree built"
    );

    Tree {
        roots,
        expandable_keys,
    }
}

fn assemble<R: Record>(
    record: &R,
    children_of: &HashMap<Key, Vec<&R>>,
    visited: &mut HashSet<Key>,
    expandable: &mut Vec<Key>,
) -> Option<TreeNode<R>> {
    let key = record.id()?;
    if !visited.insert(key.clone()) {
        return None;
    }

    let children: Vec<TreeNode<R>> = children_of
        .get(&key)
        .map(|kids| {
            kids.iter()
                .filter_map(|kid| assemble(*kid, children_of, visited, expandable))
                .collect()
        })
        .unwrap_or_default();

    if !children.is_empty() {
        expandable.push(key.clone());
    }

    Some(TreeNode {
        title: record.title(),
        disabled: record.disabled(),
        item: record.clone(),
        key,
        children,
    })
}

/// Keep nodes that match, or that have a matching descendant. Surviving
/// nodes keep only their surviving children.
pub fn filter_tree<R: Record>(
    nodes: &[TreeNode<R>],
    filter: &Filter,
    engine: &LocalEngine,
) -> Vec<TreeNode<R>> {
    nodes
        .iter()
        .filter_map(|node| {
            let children = filter_tree(&node.children, filter, engine);
            if children.is_empty() && !engine.matches(&node.item, filter) {
                return None;
            }
            Some(TreeNode {
                key: node.key.clone(),
                title: node.title.clone(),
                item: node.item.clone(),
                disabled: node.disabled,
                children,
            })
        })
        .collect()
}

/// Disable the node with `key` and its whole subtree. Returns whether the key
/// was found.
pub fn set_disabled_node<R>(nodes: &mut [TreeNode<R>], key: &Key) -> bool {
    for node in nodes.iter_mut() {
        if &node.key == key {
            disable_subtree(node);
            return true;
        }
        if set_disabled_node(&mut node.children, key) {
            return true;
        }
    }
    false
}

fn disable_subtree<R>(node: &mut TreeNode<R>) {
    node.disabled = true;
    for child in &mut node.children {
        disable_subtree(child);
    }
}

/// Only leaves stay selectable: any node with children, or whose item says
/// it has children that are not loaded yet, is disabled.
pub fn set_only_select_leaf<R: Record>(nodes: &mut [TreeNode<R>]) {
    for node in nodes.iter_mut() {
        if !node.children.is_empty() || node.item.has_children() {
            node.disabled = true;
        }
        set_only_select_leaf(&mut node.children);
    }
}

pub fn find_node<'a, R>(nodes: &'a [TreeNode<R>], key: &Key) -> Option<&'a TreeNode<R>> {
    nodes.iter().find_map(|node| {
        if &node.key == key {
            Some(node)
        } else {
            find_node(&node.children, key)
        }
    })
}

/// Nodes for each key that exists, in the order of `keys`.
pub fn find_nodes<'a, R>(nodes: &'a [TreeNode<R>], keys: &[Key]) -> Vec<&'a TreeNode<R>> {
    keys.iter().filter_map(|key| find_node(nodes, key)).collect()
}
