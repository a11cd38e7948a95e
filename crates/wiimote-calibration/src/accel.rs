//! Accelerometer calibration

use serde::{Deserialize, Serialize};

/// A value per accelerometer axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Axis3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Axis3<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

/// Factory accelerometer calibration.
///
/// `zero` is the 10-bit reading at rest on each axis; `gravity` is the
/// distance between the 1 g reading and `zero`. A controller without an
/// accelerometer (the Wii U Pro) carries an all-zero calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccelCalibration {
    pub zero: Axis3<u16>,
    pub gravity: Axis3<i16>,
}

impl AccelCalibration {
    pub const fn new(zero: Axis3<u16>, gravity: Axis3<i16>) -> Self {
        Self { zero, gravity }
    }

    /// Converts a raw 10-bit sample to g-force. Axes with a zero gravity
    /// span read as `0.0`.
    pub fn gforce(&self, raw: Axis3<u16>) -> Axis3<f32> {
        Axis3 {
            x: axis_gforce(raw.x, self.zero.x, self.gravity.x),
            y: axis_gforce(raw.y, self.zero.y, self.gravity.y),
            z: axis_gforce(raw.z, self.zero.z, self.gravity.z),
        }
    }
}

fn axis_gforce(raw: u16, zero: u16, gravity: i16) -> f32 {
    if gravity == 0 {
        return 0.0;
    }
    (f32::from(raw) - f32::from(zero)) / f32::from(gravity)
}
