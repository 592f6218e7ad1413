//! Linear prompt assembly from a context's node forest

use std::collections::HashSet;
use taskweave_core::NodeMap;

/// Walk every root (in insertion order) depth-first, children in stored
/// order, and join node contents with newlines.
///
/// Children that no longer exist are skipped. Nodes whose parent is set but
/// missing are not roots and are left out. Each node is emitted at most once,
/// so a malformed child list cannot make the walk loop.
pub fn build_prompt(nodes: &NodeMap) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(nodes.len());
    let mut visited: HashSet<&str> = HashSet::with_capacity(nodes.len());
    let mut stack: Vec<&str> = Vec::new();

    for root in nodes.values().filter(|n| n.is_root()) {
        stack.push(root.id.as_str());
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = nodes.get(id) else {
                continue;
            };
            parts.push(node.content.as_str());
            stack.extend(node.children.iter().rev().map(String::as_str));
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskweave_core::ContextNode;

    fn map(nodes: Vec<ContextNode>) -> NodeMap {
        nodes.into_iter().map(|n| (n.id.clone(), n)).collect()
    }

    fn node(id: &str, parent: Option<&str>, children: &[&str]) -> ContextNode {
        let mut n = ContextNode::new(id, id.to_uppercase());
        n.parent = parent.map(String::from);
        n.children = children.iter().map(|c| c.to_string()).collect();
        n
    }

    #[test]
    fn empty_context_is_empty_prompt() {
        assert_eq!(build_prompt(&NodeMap::new()), "");
    }

    #[test]
    fn depth_first_in_child_order() {
        let nodes = map(vec![
            node("a", None, &["b", "c"]),
            node("b", Some("a"), &["d"]),
            node("c", Some("a"), &[]),
            node("d", Some("b"), &[]),
            node("e", None, &[]),
        ]);
        assert_eq!(build_prompt(&nodes), "A\nB\nD\nC\nE");
    }

    #[test]
    fn roots_follow_insertion_order_not_id_order() {
        let nodes = map(vec![node("z", None, &[]), node("a", None, &[])]);
        assert_eq!(build_prompt(&nodes), "Z\nA");
    }

    #[test]
    fn missing_children_skipped_and_orphans_excluded() {
        let nodes = map(vec![
            node("a", None, &["gone", "b"]),
            node("b", Some("a"), &[]),
            node("orphan", Some("deleted"), &[]),
        ]);
        assert_eq!(build_prompt(&nodes), "A\nB");
    }

    #[test]
    fn cyclic_children_terminate() {
        let nodes = map(vec![node("a", None, &["b"]), node("b", Some("a"), &["a"])]);
        assert_eq!(build_prompt(&nodes), "A\nB");
    }
}
