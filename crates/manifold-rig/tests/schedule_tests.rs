//! Step schedule shape.

use manifold_rig::prelude::*;
use manifold_rig::schedule::MAX_BREAKPOINTS;
use manifold_test_helpers::prelude::*;
use proptest::prelude::*;

#[test]
fn test_reference_fluid_schedule() -> TestResult {
    let schedule = calculate_schedule(216.0, 18.0, 0.0, 30.0)?;

    let setpoints: Vec<f64> = schedule.steps.iter().map(|s| s.setpoint).collect();
    insta::assert_snapshot!(
        format!("{setpoints:?}"),
        @"[30.0, 0.0, 30.0, 0.0, 30.0, 0.0, 30.0, 0.0, 30.0, 0.0, 30.0, 0.0, 30.0]"
    );
    let starts: Vec<f64> = schedule.steps.iter().map(|s| s.start).collect();
    insta::assert_snapshot!(
        format!("{starts:?}"),
        @"[0.0, 18.0, 36.0, 54.0, 72.0, 90.0, 108.0, 126.0, 144.0, 162.0, 180.0, 198.0, 216.0]"
    );
    assert_eq!(schedule.setpoint_at(17.9), Some(30.0));
    assert_eq!(schedule.setpoint_at(18.0), Some(0.0));
    assert_eq!(schedule.setpoint_at(234.0), None);
    Ok(())
}

#[test]
fn test_plot_points_close_each_step() -> TestResult {
    let schedule = calculate_schedule(36.0, 18.0, 0.0, 30.0)?;
    assert_eq!(
        schedule.plot_points(),
        vec![
            (0.0, 30.0),
            (18.0, 30.0),
            (18.0, 0.0),
            (36.0, 0.0),
            (36.0, 30.0),
            (54.0, 30.0),
        ]
    );
    Ok(())
}

#[test]
fn test_breakpoint_limit() {
    let err = calculate_schedule(1e12, 1.0, 0.0, 30.0).err();
    assert!(err.is_some_and(|e| e.is_configuration()));
    assert!(MAX_BREAKPOINTS > 100_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_schedule_alternates_from_max(
        periods in 0u32..500,
        period in 0.5f64..100.0,
        min in -50.0f64..50.0,
        span in 0.1f64..50.0,
    ) {
        let max = min + span;
        let total = f64::from(periods) * period;
        let schedule = must(calculate_schedule(total, period, min, max));

        prop_assert!(!schedule.is_empty());
        prop_assert!(schedule.len() <= periods as usize + 2);
        for (k, step) in schedule.steps.iter().enumerate() {
            let expected = if k % 2 == 0 { max } else { min };
            prop_assert!((step.setpoint - expected).abs() < f64::EPSILON);
        }
        for pair in schedule.steps.windows(2) {
            if let [a, b] = pair {
                prop_assert!(((b.start - a.start) - period).abs() < 1e-6);
            }
        }
        prop_assert!(schedule.end >= total);
    }

    #[test]
    fn prop_target_matches_schedule(periods in 1u32..200, period in 1.0f64..48.0) {
        let mut profile = TestProfile::default();
        profile.total_duration = f64::from(periods) * period + period / 2.0;
        profile.fluid = Some(ThermalProfile::new(period, 0.0, 30.0));

        let target = must(profile.target(ProfileKind::Fluid));
        let schedule = must_some(must(profile.schedule(ProfileKind::Fluid)), "fluid enabled");
        prop_assert_eq!(target, u64::from(periods));
        prop_assert_eq!(schedule.len() as u64, target + 1);
    }
}
