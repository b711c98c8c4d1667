// tests/property/registry_test.rs

//! Property-based tests for channel number allocation
//! Tests that the registry behaves like a "lowest free number" set model

use proptest::prelude::*;
use spinelmq::core::channel::ChannelRegistry;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum Op {
    Allocate,
    Release(u16),
}

fn op_strategy(channel_max: u16) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Allocate),
        2 => (0..=channel_max).prop_map(Op::Release),
    ]
}

/// The lowest number in `[1, bound)` missing from `live`.
fn lowest_free(live: &BTreeSet<u16>, bound: u16) -> Option<u16> {
    (1..bound).find(|n| !live.contains(n))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_registry_matches_set_model(
        (channel_max, ops) in (1u16..=150).prop_flat_map(|max| {
            (Just(max), prop::collection::vec(op_strategy(max), 1..=300))
        })
    ) {
        let mut registry = ChannelRegistry::new(channel_max);
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Op::Allocate => {
                    let expected = lowest_free(&model, channel_max);
                    match (registry.allocate(), expected) {
                        (Ok(got), Some(want)) => {
                            prop_assert_eq!(got, want);
                            model.insert(got);
                        }
                        (Err(_), None) => {}
                        (got, want) => {
                            prop_assert!(false, "allocate returned {:?}, model expected {:?}", got, want);
                        }
                    }
                }
                Op::Release(n) => {
                    prop_assert_eq!(registry.release(n), model.remove(&n));
                }
            }
            prop_assert_eq!(registry.len(), model.len());
        }

        prop_assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            model.into_iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_allocations_are_unique_and_in_range(
        channel_max in 1u16..=300,
        extra in 0usize..=10
    ) {
        let mut registry = ChannelRegistry::new(channel_max);
        let mut seen = BTreeSet::new();
        for _ in 0..(registry.capacity() + extra) {
            if let Ok(n) = registry.allocate() {
                prop_assert!(n >= 1 && n < channel_max);
                prop_assert!(seen.insert(n));
            }
        }
        prop_assert_eq!(seen.len(), registry.capacity());
    }
}
