#![allow(dead_code)]

use vortex::{HostTree, MemoryTree, NodeId};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fresh tree with one `vx-zone` element under the root.
pub fn tree_with_zone() -> (MemoryTree, NodeId) {
    let mut tree = MemoryTree::new();
    let root = tree.root();
    let zone = tree.append_element(root, "div", &[("vx-zone", "")]);
    (tree, zone)
}

pub fn texts(tree: &MemoryTree, nodes: &[NodeId]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| tree.text(node).unwrap_or_default())
        .collect()
}
