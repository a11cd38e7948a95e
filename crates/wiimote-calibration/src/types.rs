//! Calibration type definitions

use serde::{Deserialize, Serialize};

/// A value per stick axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AxisPair<T> {
    pub x: T,
    pub y: T,
}

impl<T> AxisPair<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Copy> AxisPair<T> {
    /// Same value on both axes.
    pub const fn splat(value: T) -> Self {
        Self { x: value, y: value }
    }

    pub fn get(&self, axis: StickAxis) -> T {
        match axis {
            StickAxis::X => self.x,
            StickAxis::Y => self.y,
        }
    }

    pub fn set(&mut self, axis: StickAxis, value: T) {
        match axis {
            StickAxis::X => self.x = value,
            StickAxis::Y => self.y = value,
        }
    }
}

/// One of the two axes of an analog stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StickAxis {
    X,
    Y,
}

impl StickAxis {
    pub const ALL: [StickAxis; 2] = [StickAxis::X, StickAxis::Y];
}

/// Which stick of a dual-stick peripheral a calibration belongs to.
///
/// The secondary (right) stick of the classic controller reports half the
/// resolution of the primary (left) stick, so its fallback range is halved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StickRole {
    Primary,
    Secondary,
}

impl StickRole {
    /// Fallback range installed when the factory bytes for an axis are unusable.
    pub const fn default_range(self) -> AxisRange {
        match self {
            Self::Primary => AxisRange::new(0, 32, 64),
            Self::Secondary => AxisRange::new(0, 16, 32),
        }
    }
}

/// Calibration of a single stick axis.
///
/// # Examples
///
/// ```
/// use wiimote_calibration::AxisRange;
///
/// assert!(AxisRange::new(4, 32, 60).is_valid());
/// assert!(!AxisRange::new(32, 32, 60).is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: u8,
    pub center: u8,
    pub max: u8,
}

impl AxisRange {
    pub const fn new(min: u8, center: u8, max: u8) -> Self {
        Self { min, center, max }
    }

    /// `min < center < max`.
    pub const fn is_valid(&self) -> bool {
        self.min < self.center && self.center < self.max
    }
}

/// Factory calibration of one analog stick.
///
/// Populated once by the expansion handshake and read-only afterwards until
/// the peripheral is reconnected. Every range reaching
/// [`normalize_stick`](crate::normalize_stick) has been through
/// [`repair_calibration`](crate::repair_calibration) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct JoystickCalibration {
    pub min: AxisPair<u8>,
    pub max: AxisPair<u8>,
    pub center: AxisPair<u8>,
}

impl JoystickCalibration {
    /// Same range on both axes.
    pub const fn uniform(range: AxisRange) -> Self {
        Self {
            min: AxisPair::splat(range.min),
            max: AxisPair::splat(range.max),
            center: AxisPair::splat(range.center),
        }
    }

    pub fn axis(&self, axis: StickAxis) -> AxisRange {
        AxisRange::new(self.min.get(axis), self.center.get(axis), self.max.get(axis))
    }

    pub fn set_axis(&mut self, axis: StickAxis, range: AxisRange) {
        self.min.set(axis, range.min);
        self.center.set(axis, range.center);
        self.max.set(axis, range.max);
    }

    pub fn is_valid(&self) -> bool {
        StickAxis::ALL.iter().all(|&axis| self.axis(axis).is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_accessors_round_trip() {
        let mut calib = JoystickCalibration::default();
        calib.set_axis(StickAxis::Y, AxisRange::new(3, 30, 60));

        assert_eq!(calib.axis(StickAxis::Y), AxisRange::new(3, 30, 60));
        assert_eq!(calib.axis(StickAxis::X), AxisRange::default());
        assert_eq!(calib.min, AxisPair::new(0, 3));
    }

    #[test]
    fn test_uniform_calibration_is_valid() {
        let calib = JoystickCalibration::uniform(AxisRange::new(48, 128, 208));
        assert!(calib.is_valid());
        assert_eq!(calib.center, AxisPair::splat(128));
    }

    #[test]
    fn test_default_ranges_per_role() {
        assert_eq!(StickRole::Primary.default_range(), AxisRange::new(0, 32, 64));
        assert_eq!(StickRole::Secondary.default_range(), AxisRange::new(0, 16, 32));
    }

    #[test]
    fn test_serde_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let calib = JoystickCalibration::uniform(AxisRange::new(1, 2, 3));
        let json = serde_json::to_string(&calib)?;
        let back: JoystickCalibration = serde_json::from_str(&json)?;
        assert_eq!(back, calib);
        Ok(())
    }
}
