//! Bit-field helpers for the packed calibration and report layouts.

use wiimote_calibration::{AccelCalibration, Axis3};

/// Extracts `width` bits of `byte` starting at bit `lsb`.
pub const fn field(byte: u8, lsb: u32, width: u32) -> u8 {
    (byte >> lsb) & ((1u16 << width).wrapping_sub(1) as u8)
}

/// Assembles a 10-bit sample: eight high bits plus two low bits taken from
/// `trailer` at `shift`.
pub fn ten_bit(high: u8, trailer: u8, shift: u32) -> u16 {
    (u16::from(high) << 2) | u16::from(field(trailer, shift, 2))
}

/// Wii U Pro stick axis: low nibble of `high` above the high nibble of `low`.
pub fn wide_axis(low: u8, high: u8) -> u8 {
    (field(high, 0, 4) << 4) | field(low, 4, 4)
}

fn axis3(bytes: [u8; 4]) -> Axis3<u16> {
    let [x, y, z, trailer] = bytes;
    Axis3::new(ten_bit(x, trailer, 4), ten_bit(y, trailer, 2), ten_bit(z, trailer, 0))
}

fn span(zero: u16, one_g: u16) -> i16 {
    let delta = i32::from(one_g) - i32::from(zero);
    i16::try_from(delta).unwrap_or(0)
}

/// Decodes the eight accelerometer calibration bytes read from `0x16`.
///
/// Bytes 0..4 carry the zero point, bytes 4..8 the 1 g point, each as three
/// high bytes plus a trailer holding the two low bits per axis.
pub fn decode_accel_calibration(data: &[u8]) -> Option<AccelCalibration> {
    let zero: [u8; 4] = data.get(0..4)?.try_into().ok()?;
    let one_g: [u8; 4] = data.get(4..8)?.try_into().ok()?;
    let zero = axis3(zero);
    let one_g = axis3(one_g);
    Some(AccelCalibration::new(
        zero,
        Axis3::new(
            span(zero.x, one_g.x),
            span(zero.y, one_g.y),
            span(zero.z, one_g.z),
        ),
    ))
}
