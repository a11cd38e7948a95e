//! Property-based tests for stick calibration repair and normalization.

#[cfg(test)]
mod proptest_calibration {
    use proptest::prelude::*;
    use wiimote_calibration::{
        AxisPair, AxisRange, JoystickCalibration, StickAxis, StickRole, normalize_axis,
        normalize_stick, repair_axis, repair_calibration,
    };

    fn role() -> impl Strategy<Value = StickRole> {
        prop_oneof![Just(StickRole::Primary), Just(StickRole::Secondary)]
    }

    fn any_range() -> impl Strategy<Value = AxisRange> {
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(min, center, max)| AxisRange {
            min,
            center,
            max,
        })
    }

    fn valid_range() -> impl Strategy<Value = AxisRange> {
        (0u8..=253)
            .prop_flat_map(|min| (Just(min), (min + 1)..=254))
            .prop_flat_map(|(min, center)| (Just(min), Just(center), (center + 1)..=255))
            .prop_map(|(min, center, max)| AxisRange::new(min, center, max))
    }

    fn any_calibration() -> impl Strategy<Value = JoystickCalibration> {
        (any_range(), any_range()).prop_map(|(x, y)| {
            let mut calib = JoystickCalibration::default();
            calib.set_axis(StickAxis::X, x);
            calib.set_axis(StickAxis::Y, y);
            calib
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        // --- Repair always produces a valid calibration ---

        #[test]
        fn repair_output_is_always_valid(calib in any_calibration(), role in role()) {
            let fixed = repair_calibration(calib, role);
            prop_assert!(fixed.is_valid(), "repaired calibration must be valid: {:?}", fixed);
        }

        // --- Repairing twice equals repairing once ---

        #[test]
        fn repair_is_idempotent(calib in any_calibration(), role in role()) {
            let once = repair_calibration(calib, role);
            let twice = repair_calibration(once, role);
            prop_assert_eq!(once, twice);
        }

        // --- Valid ranges pass through untouched ---

        #[test]
        fn valid_axis_is_unchanged(range in valid_range(), role in role()) {
            prop_assert_eq!(repair_axis(range, role), range);
        }

        // --- Invalid axes always get exactly the role default ---

        #[test]
        fn invalid_axis_gets_role_default(range in any_range(), role in role()) {
            prop_assume!(!range.is_valid());
            let fixed = repair_axis(range, role);
            match role {
                StickRole::Primary => prop_assert_eq!(fixed, AxisRange::new(0, 32, 64)),
                StickRole::Secondary => prop_assert_eq!(fixed, AxisRange::new(0, 16, 32)),
            }
        }

        // --- Normalization stays inside [-1, 1] ---

        #[test]
        fn normalized_axis_is_bounded(range in valid_range(), raw in any::<u8>()) {
            let value = normalize_axis(raw, range);
            prop_assert!(value.is_finite());
            prop_assert!((-1.0..=1.0).contains(&value), "value {} out of range", value);
        }

        // --- Normalization is monotone in the raw value ---

        #[test]
        fn normalized_axis_is_monotone(range in valid_range(), a in any::<u8>(), b in any::<u8>()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(normalize_axis(lo, range) <= normalize_axis(hi, range));
        }

        // --- Stick magnitude never exceeds the corner distance ---

        #[test]
        fn stick_magnitude_is_bounded(calib in any_calibration(), x in any::<u8>(), y in any::<u8>()) {
            let calib = repair_calibration(calib, StickRole::Primary);
            let pos = normalize_stick(&calib, AxisPair::new(x, y));
            prop_assert!(pos.magnitude <= std::f32::consts::SQRT_2 + 1e-4);
            prop_assert!((0.0..=360.0).contains(&pos.angle));
        }
    }
}
