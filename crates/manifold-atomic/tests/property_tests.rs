//! Property-based tests for counter monotonicity.

use manifold_atomic::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Increment,
    Read,
    ManualResume(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => Just(Op::Increment),
        4 => Just(Op::Read),
        1 => (0..1_000u64).prop_map(Op::ManualResume),
    ]
}

proptest! {
    #[test]
    fn test_counter_increases_by_exactly_one_per_cycle(cycles in 0..5_000u64) {
        let counter = CycleCounter::new(ProfileKind::Pressure);
        for expected in 1..=cycles {
            prop_assert_eq!(counter.increment(), expected);
        }
        prop_assert_eq!(counter.current(), cycles);
    }

    #[test]
    fn test_counter_only_decreases_through_manual_resume(
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let counter = CycleCounter::new(ProfileKind::Fluid);
        let mut last = counter.current();

        for op in ops {
            match op {
                Op::Increment => {
                    let next = counter.increment();
                    prop_assert_eq!(next, last + 1);
                    last = next;
                }
                Op::Read => {
                    prop_assert_eq!(counter.current(), last);
                }
                Op::ManualResume(value) => {
                    counter.force_set(value);
                    last = value;
                }
            }
        }
    }

    #[test]
    fn test_completion_matches_target(current in 0..100u64, target in 0..100u64) {
        let counter = CycleCounter::with_values(ProfileKind::Chamber, current, target);
        prop_assert_eq!(counter.is_complete(), current >= target);
        prop_assert_eq!(counter.snapshot().remaining(), target.saturating_sub(current));
    }
}
