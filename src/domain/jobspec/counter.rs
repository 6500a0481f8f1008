use std::collections::BTreeMap;

use crate::domain::jobspec::resource_tree::{ResourceKey, ResourceTree};

/// Totals every resource type across all trees.
///
/// A node contributes `multiplier * count`, where the multiplier is the product of the counts
/// of all its ancestors, so `socket(2) { gpu(4) }` yields eight gpus. Sums commute, hence the
/// result does not depend on sibling order.
pub fn count_resources(tree: &ResourceTree) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();

    for root in tree.roots() {
        accumulate(tree, *root, 1, &mut totals);
    }
    totals
}

fn accumulate(tree: &ResourceTree, key: ResourceKey, multiplier: u64, totals: &mut BTreeMap<String, u64>) {
    let node = tree.node(key);
    let instances = multiplier.saturating_mul(node.count);

    let total = totals.entry(node.typ.clone()).or_insert(0);
    *total = total.saturating_add(instances);

    for child in &node.with {
        accumulate(tree, *child, instances, totals);
    }
}
