//! Classic controller, Classic Controller Pro and Wii U Pro support.
//!
//! All three share the classic button word. The original controller and the
//! Pro send the packed 6-byte layout with 6-bit left and 5-bit right sticks;
//! the Wii U Pro sends 12-bit sticks in the wide 10-byte layout, of which
//! the top 8 bits are kept.

use crate::bits::{field, wide_axis};
use crate::buttons::{ButtonState, classic_buttons, classic_pressed_from_wire};
use tracing::debug;
use wiimote_calibration::{
    AxisPair, AxisRange, JoystickCalibration, JoystickPosition, StickAxis, StickRole,
    normalize_stick, repair_calibration,
};

/// Number of calibration bytes consumed from the handshake block.
pub const CALIBRATION_BYTES: usize = 12;
/// Where the duplicate calibration starts when the first copy is blank.
pub const STALE_BLOCK_OFFSET: usize = 16;
/// Non-zero for the original controller with analog triggers.
pub const FORMAT_FLAG_OFFSET: usize = 218;
pub const WIIU_PRO_SIGNATURE_OFFSET: usize = 223;
pub const WIIU_PRO_SIGNATURE: u8 = 0x20;

/// Hard-coded stick range of the Wii U Pro; its block carries no
/// calibration.
pub const WIIU_PRO_STICK_RANGE: AxisRange = AxisRange::new(48, 128, 208);

/// Full-scale analog shoulder value.
pub const SHOULDER_MAX: u8 = 0x1F;

const PACKED_REPORT_LEN: usize = 6;
const WIDE_REPORT_LEN: usize = 10;

/// Which classic-family controller is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassicFormat {
    /// Original controller with analog shoulders.
    Original,
    /// Classic Controller Pro; digital shoulders, packed layout.
    #[default]
    Pro,
    /// Wii U Pro controller; wide layout.
    WiiUPro,
}

/// Byte layout of the expansion payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireLayout {
    Packed,
    Wide,
}

impl ClassicFormat {
    pub fn layout(self) -> WireLayout {
        match self {
            Self::Original | Self::Pro => WireLayout::Packed,
            Self::WiiUPro => WireLayout::Wide,
        }
    }

    pub fn has_analog_shoulders(self) -> bool {
        matches!(self, Self::Original)
    }
}

/// One decoded classic sample, before calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassicSample {
    pub left: AxisPair<u8>,
    pub right: AxisPair<u8>,
    pub left_shoulder: u8,
    pub right_shoulder: u8,
    /// Active-high, masked with the valid button set.
    pub pressed: u16,
}

fn wire_buttons(hi: u8, lo: u8) -> u16 {
    classic_pressed_from_wire(u16::from_be_bytes([hi, lo]))
}

/// Decodes the packed 6-byte layout.
///
/// | byte | bits 7..6 | bit 5 | bits 4..0 |
/// |---|---|---|---|
/// | 0 | rx\[4:3\] | lx | lx |
/// | 1 | rx\[2:1\] | ly | ly |
/// | 2 | rx\[0\] (bit 7), l\[4:3\] (bits 6..5) | | ry |
/// | 3 | l\[2:0\] (bits 7..5) | | r |
/// | 4..6 | button word, big-endian, active-low | | |
pub fn decode_packed(payload: &[u8]) -> Option<ClassicSample> {
    let bytes: [u8; PACKED_REPORT_LEN] = payload.get(..PACKED_REPORT_LEN)?.try_into().ok()?;
    let [b0, b1, b2, b3, b4, b5] = bytes;

    let rx = (field(b0, 6, 2) << 3) | (field(b1, 6, 2) << 1) | field(b2, 7, 1);
    Some(ClassicSample {
        left: AxisPair::new(field(b0, 0, 6), field(b1, 0, 6)),
        right: AxisPair::new(rx, field(b2, 0, 5)),
        left_shoulder: (field(b2, 5, 2) << 3) | field(b3, 5, 3),
        right_shoulder: field(b3, 0, 5),
        pressed: wire_buttons(b4, b5),
    })
}

/// Decodes the wide 10-byte Wii U Pro layout.
///
/// Axes are 12-bit little-endian in byte pairs (lx 0..2, rx 2..4, ly 4..6,
/// ry 6..8); buttons are big-endian at 8..10. Shoulders are digital and
/// reported as full scale while the matching full-press bit is down.
pub fn decode_wide(payload: &[u8]) -> Option<ClassicSample> {
    let bytes: [u8; WIDE_REPORT_LEN] = payload.get(..WIDE_REPORT_LEN)?.try_into().ok()?;
    let [lx0, lx1, rx0, rx1, ly0, ly1, ry0, ry1, b8, b9] = bytes;

    let pressed = wire_buttons(b8, b9);
    let digital = |mask: u16| if pressed & mask != 0 { SHOULDER_MAX } else { 0 };
    Some(ClassicSample {
        left: AxisPair::new(wide_axis(lx0, lx1), wide_axis(ly0, ly1)),
        right: AxisPair::new(wide_axis(rx0, rx1), wide_axis(ry0, ry1)),
        left_shoulder: digital(classic_buttons::FULL_L),
        right_shoulder: digital(classic_buttons::FULL_R),
        pressed,
    })
}

/// Builds a packed report from a sample; used by simulators and tests.
/// Values wider than their fields are truncated.
pub fn encode_packed(sample: &ClassicSample) -> [u8; PACKED_REPORT_LEN] {
    let rx = sample.right.x;
    let l = sample.left_shoulder;
    let [hi, lo] = (!sample.pressed).to_be_bytes();
    [
        (field(rx, 3, 2) << 6) | field(sample.left.x, 0, 6),
        (field(rx, 1, 2) << 6) | field(sample.left.y, 0, 6),
        (field(rx, 0, 1) << 7) | (field(l, 3, 2) << 5) | field(sample.right.y, 0, 5),
        (field(l, 0, 3) << 5) | field(sample.right_shoulder, 0, 5),
        hi,
        lo,
    ]
}

/// Builds a wide report from a sample. Axes are placed in the top 8 bits of
/// each 12-bit field.
pub fn encode_wide(sample: &ClassicSample) -> [u8; WIDE_REPORT_LEN] {
    let split = |v: u8| [field(v, 0, 4) << 4, field(v, 4, 4)];
    let [lx0, lx1] = split(sample.left.x);
    let [rx0, rx1] = split(sample.right.x);
    let [ly0, ly1] = split(sample.left.y);
    let [ry0, ry1] = split(sample.right.y);
    let [hi, lo] = (!sample.pressed).to_be_bytes();
    [lx0, lx1, rx0, rx1, ly0, ly1, ry0, ry1, hi, lo]
}

pub fn shoulder_float(raw: u8) -> f32 {
    f32::from(raw) / f32::from(SHOULDER_MAX)
}

/// Live classic controller state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassicControllerState {
    pub format: ClassicFormat,
    pub left_calibration: JoystickCalibration,
    pub right_calibration: JoystickCalibration,
    pub buttons: ButtonState,
    pub left_stick: JoystickPosition,
    pub right_stick: JoystickPosition,
    pub left_shoulder: f32,
    pub right_shoulder: f32,
    pub raw_left_shoulder: u8,
    pub raw_right_shoulder: u8,
}

impl ClassicControllerState {
    pub fn new(
        format: ClassicFormat,
        left_calibration: JoystickCalibration,
        right_calibration: JoystickCalibration,
    ) -> Self {
        Self {
            format,
            left_calibration,
            right_calibration,
            ..Self::default()
        }
    }

    /// Applies one expansion payload. Returns `false` and leaves the state
    /// untouched when the payload is too short for the layout.
    pub fn apply_report(&mut self, payload: &[u8]) -> bool {
        let sample = match self.format.layout() {
            WireLayout::Packed => decode_packed(payload),
            WireLayout::Wide => decode_wide(payload),
        };
        let Some(sample) = sample else {
            return false;
        };

        self.buttons.update(sample.pressed);
        self.raw_left_shoulder = sample.left_shoulder;
        self.raw_right_shoulder = sample.right_shoulder;
        self.left_shoulder = shoulder_float(sample.left_shoulder);
        self.right_shoulder = shoulder_float(sample.right_shoulder);
        self.left_stick = normalize_stick(&self.left_calibration, sample.left);
        self.right_stick = normalize_stick(&self.right_calibration, sample.right);
        true
    }
}

/// Result of parsing a classic handshake block.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassicHandshake {
    Ready(ClassicControllerState),
    /// The block was read before the controller settled; read it again.
    Reread,
}

/// Byte 223 carries the Wii U Pro signature.
pub fn has_wiiu_pro_signature(block: &[u8]) -> bool {
    block.get(WIIU_PRO_SIGNATURE_OFFSET) == Some(&WIIU_PRO_SIGNATURE)
}

/// `byte / divisor`, with zero replaced by `fallback`.
fn scaled(byte: u8, divisor: u8, fallback: u8) -> u8 {
    match byte.checked_div(divisor) {
        Some(0) | None => fallback,
        Some(value) => value,
    }
}

fn stick_calibration(bytes: &[u8; 6], role: StickRole) -> JoystickCalibration {
    let divisor = match role {
        StickRole::Primary => 4,
        StickRole::Secondary => 8,
    };
    let default = role.default_range();
    let [max_x, min_x, center_x, max_y, min_y, center_y] = *bytes;
    let range = |max: u8, min: u8, center: u8| {
        AxisRange::new(
            min.checked_div(divisor).unwrap_or(0),
            scaled(center, divisor, default.center),
            scaled(max, divisor, default.max),
        )
    };

    let mut calib = JoystickCalibration::default();
    calib.set_axis(StickAxis::X, range(max_x, min_x, center_x));
    calib.set_axis(StickAxis::Y, range(max_y, min_y, center_y));
    repair_calibration(calib, role)
}

/// Parses the 224-byte expansion block of a classic-family controller.
///
/// `wiiu_pro` is set when the device handshake already identified a Wii U
/// Pro. A blank first copy of the calibration falls back to the duplicate
/// 16 bytes further in; when that is blank or missing too, the block is
/// requested again.
pub fn parse_handshake(block: &[u8], wiiu_pro: bool) -> ClassicHandshake {
    if wiiu_pro || has_wiiu_pro_signature(block) {
        debug!("classic handshake: Wii U Pro signature, using fixed stick range");
        let calib = JoystickCalibration::uniform(WIIU_PRO_STICK_RANGE);
        return ClassicHandshake::Ready(ClassicControllerState::new(
            ClassicFormat::WiiUPro,
            calib,
            calib,
        ));
    }

    let mut offset = 0;
    if block.first() == Some(&0xFF) || block.len() < CALIBRATION_BYTES {
        let duplicate_ok = block.len() >= STALE_BLOCK_OFFSET + CALIBRATION_BYTES
            && block.get(STALE_BLOCK_OFFSET) != Some(&0xFF);
        if !duplicate_ok {
            debug!(
                len = block.len(),
                "classic handshake block looks invalid, requesting it again"
            );
            return ClassicHandshake::Reread;
        }
        offset = STALE_BLOCK_OFFSET;
    }

    let Some(bytes) = block.get(offset..offset + CALIBRATION_BYTES) else {
        return ClassicHandshake::Reread;
    };
    let (Some(left), Some(right)) = (
        bytes.get(..6).and_then(|b| <&[u8; 6]>::try_from(b).ok()),
        bytes.get(6..).and_then(|b| <&[u8; 6]>::try_from(b).ok()),
    ) else {
        return ClassicHandshake::Reread;
    };

    let format = match block.get(FORMAT_FLAG_OFFSET) {
        Some(&flag) if flag != 0 => ClassicFormat::Original,
        _ => ClassicFormat::Pro,
    };

    ClassicHandshake::Ready(ClassicControllerState::new(
        format,
        stick_calibration(left, StickRole::Primary),
        stick_calibration(right, StickRole::Secondary),
    ))
}
