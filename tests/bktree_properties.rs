//! Property tests: tree structure and search results against brute force.

use std::collections::{BTreeSet, HashSet};

use depict::persistence::TreeSnapshot;
use depict::{BkTree, Metric};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Hash64 {
    bits: u64,
    name: String,
}

impl Metric for Hash64 {
    fn distance(&self, other: &Self) -> u32 {
        (self.bits ^ other.bits).count_ones()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn items(bits: &[u64]) -> Vec<Hash64> {
    bits.iter()
        .enumerate()
        .map(|(i, &bits)| Hash64 {
            bits,
            name: format!("img{}", i),
        })
        .collect()
}

fn build(items: &[Hash64]) -> BkTree<Hash64> {
    let tree = BkTree::new();
    for item in items {
        tree.add(item.clone());
    }
    tree
}

fn check_placement(snapshot: &TreeSnapshot<Hash64>) {
    let mut keys = HashSet::new();
    for (position, record) in snapshot.nodes.iter().enumerate().skip(1) {
        let parent = record.parent.unwrap();
        assert!(parent < position);
        assert_eq!(snapshot.nodes[parent].item.distance(&record.item), record.distance);
        // one child per key
        assert!(keys.insert((parent, record.distance)));
    }
}

// Few distinct bit patterns so collisions and deep chains are common.
fn small_bits() -> impl Strategy<Value = u64> {
    prop_oneof![0u64..16, any::<u64>()]
}

proptest! {
    #[test]
    fn prop_children_keyed_by_distance(bits in prop::collection::vec(small_bits(), 0..60)) {
        let items = items(&bits);
        let tree = build(&items);
        let snapshot = tree.to_snapshot();
        check_placement(&snapshot);
        // every insertion created exactly one node
        prop_assert_eq!(snapshot.nodes.len(), items.len());
        prop_assert_eq!(tree.len(), items.len());
    }

    #[test]
    fn prop_search_matches_brute_force(
        bits in prop::collection::vec(small_bits(), 0..60),
        query in small_bits(),
        radius in 0u32..40,
    ) {
        let items = items(&bits);
        let tree = build(&items);
        let query = Hash64 { bits: query, name: "query".to_string() };

        let found: BTreeSet<String> = tree
            .search(&query, radius)
            .into_iter()
            .map(|i| i.name)
            .collect();
        let expected: BTreeSet<String> = items
            .iter()
            .filter(|i| i.distance(&query) <= radius)
            .map(|i| i.name.clone())
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_search_never_returns_query_name(
        bits in prop::collection::vec(small_bits(), 1..40),
        pick in any::<prop::sample::Index>(),
        radius in 0u32..65,
    ) {
        let items = items(&bits);
        let tree = build(&items);
        let query = pick.get(&items);

        let found = tree.search(query, radius);
        prop_assert!(found.iter().all(|i| i.name != query.name));
        let expected = items
            .iter()
            .filter(|i| i.name != query.name && i.distance(query) <= radius)
            .count();
        prop_assert_eq!(found.len(), expected);
    }

    #[test]
    fn prop_similars_values_are_real_matches(
        bits in prop::collection::vec(0u64..8, 0..30),
        radius in 0u32..3,
    ) {
        let items = items(&bits);
        let tree = build(&items);
        let similars = tree.search_similars(radius);

        for (key, values) in &similars {
            let source = tree.search_by_name(key).unwrap();
            let unique: HashSet<&String> = values.iter().collect();
            prop_assert_eq!(unique.len(), values.len());
            for value in values {
                prop_assert_ne!(value, key);
                let other = tree.search_by_name(value).unwrap();
                prop_assert!(source.distance(&other) <= radius);
            }
        }
    }
}

#[test]
fn test_reference_scenario() {
    #[derive(Debug, Clone)]
    struct Scalar(u32, &'static str);

    impl Metric for Scalar {
        fn distance(&self, other: &Self) -> u32 {
            self.0.abs_diff(other.0)
        }

        fn name(&self) -> &str {
            self.1
        }
    }

    let tree = BkTree::new();
    tree.add(Scalar(0, "A"));
    tree.add(Scalar(4, "B"));
    tree.add(Scalar(5, "C"));

    let names = |found: Vec<Scalar>| -> BTreeSet<&'static str> { found.into_iter().map(|s| s.1).collect() };
    assert_eq!(names(tree.search(&Scalar(0, "A"), 4)), BTreeSet::from(["B"]));
    assert_eq!(names(tree.search(&Scalar(0, "A"), 5)), BTreeSet::from(["B", "C"]));
    assert!(tree.search_by_name("nonexistent").is_none());
}
