//! Repair of defective stick calibration
//!
//! Some peripherals ship with calibration bytes that describe an empty or
//! inverted range. Each axis is checked on its own; a bad axis is replaced
//! by the fixed fallback for the stick's role and the other axis is kept.

use crate::{AxisRange, JoystickCalibration, StickAxis, StickRole};

/// Returns `range` unchanged when valid, otherwise the role's fallback range.
pub fn repair_axis(range: AxisRange, role: StickRole) -> AxisRange {
    if range.is_valid() {
        range
    } else {
        role.default_range()
    }
}

/// Repairs both axes of a stick calibration.
///
/// Total and silent: the result always satisfies `min < center < max` on
/// each axis.
///
/// # Examples
///
/// ```
/// use wiimote_calibration::{AxisRange, JoystickCalibration, StickRole, repair_calibration};
///
/// let broken = JoystickCalibration::uniform(AxisRange::new(40, 20, 60));
/// let fixed = repair_calibration(broken, StickRole::Secondary);
/// assert_eq!(fixed, JoystickCalibration::uniform(AxisRange::new(0, 16, 32)));
/// ```
pub fn repair_calibration(calib: JoystickCalibration, role: StickRole) -> JoystickCalibration {
    let mut repaired = calib;
    for axis in StickAxis::ALL {
        repaired.set_axis(axis, repair_axis(calib.axis(axis), role));
    }
    repaired
}
