//! Joystick normalization

use crate::{AxisPair, AxisRange, JoystickCalibration, StickAxis};
use serde::{Deserialize, Serialize};

/// Normalized stick position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JoystickPosition {
    /// `-1.0` (full left) to `1.0` (full right).
    pub x: f32,
    /// `-1.0` (full down) to `1.0` (full up).
    pub y: f32,
    /// Degrees clockwise from straight up, `[0.0, 360.0)`.
    pub angle: f32,
    /// Distance from center; up to `sqrt(2)` in the corners.
    pub magnitude: f32,
}

/// Maps a raw axis sample onto `[-1.0, 1.0]`.
///
/// The raw value is clamped to `[min, max]`; `center` maps to `0.0` and each
/// side of the center is scaled on its own, so asymmetric ranges still reach
/// both extremes. An invalid range yields `0.0`.
///
/// # Examples
///
/// ```
/// use wiimote_calibration::{AxisRange, normalize_axis};
///
/// let range = AxisRange::new(0, 32, 64);
/// assert!((normalize_axis(64, range) - 1.0).abs() < f32::EPSILON);
/// assert!((normalize_axis(16, range) + 0.5).abs() < f32::EPSILON);
/// ```
pub fn normalize_axis(raw: u8, range: AxisRange) -> f32 {
    if !range.is_valid() {
        return 0.0;
    }

    let raw = raw.clamp(range.min, range.max);
    let value = f32::from(raw);
    let min = f32::from(range.min);
    let center = f32::from(range.center);
    let max = f32::from(range.max);

    if raw >= range.center {
        (value - center) / (max - center)
    } else {
        (value - min) / (center - min) - 1.0
    }
}

fn is_centered(raw: u8, range: AxisRange) -> bool {
    !range.is_valid() || raw.clamp(range.min, range.max) == range.center
}

/// Normalizes a raw stick sample against its calibration.
pub fn normalize_stick(calib: &JoystickCalibration, raw: AxisPair<u8>) -> JoystickPosition {
    let x = normalize_axis(raw.x, calib.axis(StickAxis::X));
    let y = normalize_axis(raw.y, calib.axis(StickAxis::Y));

    if is_centered(raw.x, calib.axis(StickAxis::X)) && is_centered(raw.y, calib.axis(StickAxis::Y))
    {
        return JoystickPosition {
            x,
            y,
            ..JoystickPosition::default()
        };
    }

    let angle = (90.0 - y.atan2(x).to_degrees()).rem_euclid(360.0);
    JoystickPosition {
        x,
        y,
        angle,
        magnitude: x.hypot(y),
    }
}
