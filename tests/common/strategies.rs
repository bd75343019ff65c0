use proptest::prelude::*;

use batchops_core::engine::OperationKind;

/// A randomized batch shape: chunk width plus a per-target failure mask.
///
/// Target ids are derived from the mask positions so every generated plan is
/// structurally valid (non-empty, unique ids).
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub chunk_size: usize,
    pub failures: Vec<bool>,
}

impl BatchPlan {
    pub fn target_count(&self) -> usize {
        self.failures.len()
    }

    /// Ids in original order: `acct-000`, `acct-001`, ...
    pub fn target_ids(&self) -> Vec<String> {
        (0..self.failures.len())
            .map(|i| format!("acct-{i:03}"))
            .collect()
    }

    /// Ids the authority will reject, in original order
    pub fn failing_ids(&self) -> Vec<String> {
        self.target_ids()
            .into_iter()
            .zip(self.failures.iter())
            .filter_map(|(id, failed)| failed.then_some(id))
            .collect()
    }

    pub fn expected_chunks(&self) -> usize {
        self.target_count().div_ceil(self.chunk_size)
    }
}

/// Strategy for generating batch plans with 1-40 targets and chunk widths 1-8
pub fn batch_plan_strategy() -> impl Strategy<Value = BatchPlan> {
    (1usize..=8, prop::collection::vec(any::<bool>(), 1..=40)).prop_map(
        |(chunk_size, failures)| BatchPlan {
            chunk_size,
            failures,
        },
    )
}

/// Strategy for operations that need no extra parameters
pub fn operation_strategy() -> impl Strategy<Value = OperationKind> {
    prop_oneof![
        Just(OperationKind::Suspend),
        Just(OperationKind::Reactivate),
        Just(OperationKind::Delete),
    ]
}

/// One snapshot-store operation in a generated script
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// Unconditional write
    Set { key: usize },
    /// Conditional write that should only land when `expected` matches the
    /// live version
    CompareAndSet { key: usize, expected: u64 },
}

pub fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (0usize..4).prop_map(|key| StoreOp::Set { key }),
        (0usize..4, 0u64..6).prop_map(|(key, expected)| StoreOp::CompareAndSet { key, expected }),
    ]
}

/// Strategy for generating scripts of interleaved store writes
pub fn store_script_strategy() -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(store_op_strategy(), 0..32)
}

/// Strategy for target lists guaranteed to contain at least one duplicate
pub fn duplicated_ids_strategy() -> impl Strategy<Value = Vec<String>> {
    (
        prop::collection::vec("[a-z]{1,8}", 1..10),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(mut ids, index)| {
            let dup = ids[index.index(ids.len())].clone();
            ids.push(dup);
            ids
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_batch_plans_are_structurally_valid(plan in batch_plan_strategy()) {
            prop_assert!(plan.target_count() >= 1);
            prop_assert!(plan.target_count() <= 40);
            prop_assert!(plan.chunk_size >= 1);

            // Derived ids are unique and aligned with the mask
            let ids = plan.target_ids();
            let unique: std::collections::HashSet<_> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());
            prop_assert!(plan.failing_ids().len() <= plan.target_count());
        }

        #[test]
        fn test_duplicated_ids_really_contain_a_duplicate(ids in duplicated_ids_strategy()) {
            let unique: std::collections::HashSet<_> = ids.iter().collect();
            prop_assert!(unique.len() < ids.len());
        }
    }

    #[test]
    fn test_expected_chunk_math() {
        let plan = BatchPlan {
            chunk_size: 3,
            failures: vec![false; 7],
        };
        assert_eq!(plan.expected_chunks(), 3);

        let exact = BatchPlan {
            chunk_size: 3,
            failures: vec![false; 6],
        };
        assert_eq!(exact.expected_chunks(), 2);
    }
}
