use crate::tree::{NodeId, Tree};

/// Partitions the subtree under `root` into breadth-first levels.
///
/// Level 0 is `[root]`; level i+1 is the concatenation, in child order, of
/// the children of every node in level i. The walk halts at the first level
/// with no children.
///
/// Pure and deterministic. A tree's shape never changes after construction,
/// so the partition can be computed once and reused across evaluations.
pub fn compute_levels(tree: &Tree, root: NodeId) -> Vec<Vec<NodeId>> {
    let mut levels = vec![vec![root]];
    loop {
        let next: Vec<NodeId> = levels
            .last()
            .expect("BUG: levels always holds at least the root level")
            .iter()
            .flat_map(|&node| tree.children(node).iter().copied())
            .collect();
        if next.is_empty() {
            break;
        }
        levels.push(next);
    }
    levels
}
