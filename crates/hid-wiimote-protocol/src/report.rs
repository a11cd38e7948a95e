//! Wii Remote HID report layouts, output encoders and input report views.

#![deny(static_mut_refs)]

use crate::buttons::CORE_BUTTON_ALL;
use wiimote_hid_common::{ReportBuilder, ReportReader};

/// Wii Remote HID report IDs.
pub mod report_ids {
    // Output reports (host -> remote)
    pub const LEDS: u8 = 0x11;
    pub const REPORT_TYPE: u8 = 0x12;
    pub const STATUS_REQUEST: u8 = 0x15;
    pub const WRITE_MEMORY: u8 = 0x16;
    pub const READ_MEMORY: u8 = 0x17;

    // Input reports (remote -> host)
    pub const STATUS: u8 = 0x20;
    pub const READ_REPLY: u8 = 0x21;
    pub const ACK: u8 = 0x22;
    /// Core buttons only.
    pub const BUTTONS: u8 = 0x30;
    pub const BUTTONS_ACCEL: u8 = 0x31;
    pub const BUTTONS_EXP8: u8 = 0x32;
    pub const BUTTONS_ACCEL_IR: u8 = 0x33;
    pub const BUTTONS_EXP19: u8 = 0x34;
    pub const BUTTONS_ACCEL_EXP: u8 = 0x35;
    pub const BUTTONS_IR_EXP: u8 = 0x36;
    pub const BUTTONS_ACCEL_IR_EXP: u8 = 0x37;
    pub const EXP21: u8 = 0x3D;
    pub const INTERLEAVED_A: u8 = 0x3E;
    pub const INTERLEAVED_B: u8 = 0x3F;
}

/// Addresses in the remote's EEPROM and register space.
///
/// The top byte selects the address space: `0x04` is the register space
/// where expansion registers live, `0x00` is EEPROM.
pub mod memory {
    pub const ACCEL_CALIBRATION: u32 = 0x0000_0016;
    pub const ACCEL_CALIBRATION_LEN: u16 = 8;

    pub const EXP_DISABLE_ENCRYPTION_1: u32 = 0x04A4_00F0;
    pub const EXP_DISABLE_ENCRYPTION_1_VALUE: u8 = 0x55;
    pub const EXP_DISABLE_ENCRYPTION_2: u32 = 0x04A4_00FB;
    pub const EXP_DISABLE_ENCRYPTION_2_VALUE: u8 = 0x00;

    /// Start of the expansion calibration and identification block.
    pub const EXP_CALIBRATION: u32 = 0x04A4_0020;
    pub const EXP_HANDSHAKE_LEN: u16 = 224;
    /// Offset of the big-endian ID code inside the calibration block.
    pub const EXP_BLOCK_ID_OFFSET: usize = 220;

    pub const EXP_ID: u32 = 0x04A4_00FA;
    pub const EXP_ID_LEN: u16 = 6;

    pub const REGISTER_SPACE: u8 = 0x04;
}

/// Flag bits in byte 3 of a status report.
pub mod status_flags {
    pub const BATTERY_LOW: u8 = 0x01;
    pub const EXPANSION: u8 = 0x02;
    pub const SPEAKER: u8 = 0x04;
    pub const IR: u8 = 0x08;
    pub const LEDS: u8 = 0xF0;
}

/// LED bits for the `0x11` output report.
pub mod leds {
    pub const NONE: u8 = 0x00;
    pub const LED_1: u8 = 0x10;
    pub const LED_2: u8 = 0x20;
    pub const LED_3: u8 = 0x40;
    pub const LED_4: u8 = 0x80;
}

/// Largest payload a single write request carries.
pub const MAX_WRITE_CHUNK: usize = 16;
/// Largest payload a single read reply carries.
pub const MAX_READ_CHUNK: usize = 16;
/// Battery level reported by a full set of cells.
pub const MAX_BATTERY_CODE: u8 = 0xC8;

const RUMBLE_BIT: u8 = 0x01;
const CONTINUOUS_BIT: u8 = 0x04;

fn rumble_flag(rumble: bool) -> u8 {
    if rumble { RUMBLE_BIT } else { 0 }
}

fn space_flag(address: u32) -> u8 {
    let [space, ..] = address.to_be_bytes();
    space & memory::REGISTER_SPACE
}

/// `[0x17, space|rumble, addr(3, BE), len(2, BE)]`
pub fn encode_read_request(address: u32, len: u16, rumble: bool) -> Vec<u8> {
    let mut builder = ReportBuilder::default();
    builder
        .write_u8(report_ids::READ_MEMORY)
        .write_u8(space_flag(address) | rumble_flag(rumble))
        .write_u24_be(address)
        .write_u16_be(len);
    builder.into_inner()
}

/// `[0x16, space|rumble, addr(3, BE), len, data padded to 16]`
///
/// Returns `None` when `data` is empty or longer than [`MAX_WRITE_CHUNK`].
pub fn encode_write_request(address: u32, data: &[u8], rumble: bool) -> Option<Vec<u8>> {
    if data.is_empty() || data.len() > MAX_WRITE_CHUNK {
        return None;
    }
    let len = u8::try_from(data.len()).ok()?;

    let mut builder = ReportBuilder::default();
    builder
        .write_u8(report_ids::WRITE_MEMORY)
        .write_u8(space_flag(address) | rumble_flag(rumble))
        .write_u24_be(address)
        .write_u8(len)
        .write_bytes(data)
        .pad_to(6 + MAX_WRITE_CHUNK);
    Some(builder.into_inner())
}

pub fn encode_status_request(rumble: bool) -> Vec<u8> {
    vec![report_ids::STATUS_REQUEST, rumble_flag(rumble)]
}

/// `leds` uses the bits in [`leds`]; the low nibble is ignored.
pub fn encode_leds(led_bits: u8, rumble: bool) -> Vec<u8> {
    vec![report_ids::LEDS, (led_bits & 0xF0) | rumble_flag(rumble)]
}

pub fn encode_report_type(mode: u8, continuous: bool, rumble: bool) -> Vec<u8> {
    let flags = if continuous { CONTINUOUS_BIT } else { 0 } | rumble_flag(rumble);
    vec![report_ids::REPORT_TYPE, flags, mode]
}

/// Picks the data report mode carrying everything currently enabled.
///
/// The IR camera and the accelerometer share report `0x33`, so enabling IR
/// alone still selects it.
pub fn select_report_mode(accelerometer: bool, ir: bool, expansion: bool) -> u8 {
    match (accelerometer, ir, expansion) {
        (true, true, true) => report_ids::BUTTONS_ACCEL_IR_EXP,
        (true, false, true) => report_ids::BUTTONS_ACCEL_EXP,
        (true, true, false) => report_ids::BUTTONS_ACCEL_IR,
        (false, true, true) => report_ids::BUTTONS_IR_EXP,
        (false, true, false) => report_ids::BUTTONS_ACCEL_IR,
        (false, false, true) => report_ids::BUTTONS_EXP19,
        (true, false, false) => report_ids::BUTTONS_ACCEL,
        (false, false, false) => report_ids::BUTTONS,
    }
}

/// Core button word in bytes 1..3 of most input reports.
fn core_buttons(report: &[u8]) -> Option<u16> {
    let mut reader = ReportReader::new(report);
    reader.skip(1);
    reader.read_u16_be().ok().map(|raw| raw & CORE_BUTTON_ALL)
}

/// Decoded `0x20` status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub buttons: u16,
    pub flags: u8,
    pub battery: u8,
}

impl StatusReport {
    /// Parses a report including its ID byte.
    pub fn parse(report: &[u8]) -> Option<Self> {
        let mut reader = ReportReader::new(report);
        if reader.read_u8().ok()? != report_ids::STATUS {
            return None;
        }
        let buttons = reader.read_u16_be().ok()? & CORE_BUTTON_ALL;
        let flags = reader.read_u8().ok()?;
        reader.skip(2);
        let battery = reader.read_u8().ok()?;
        Some(Self {
            buttons,
            flags,
            battery,
        })
    }

    pub fn expansion_attached(&self) -> bool {
        self.flags & status_flags::EXPANSION != 0
    }

    pub fn battery_low(&self) -> bool {
        self.flags & status_flags::BATTERY_LOW != 0
    }

    pub fn speaker_enabled(&self) -> bool {
        self.flags & status_flags::SPEAKER != 0
    }

    pub fn ir_enabled(&self) -> bool {
        self.flags & status_flags::IR != 0
    }

    pub fn leds(&self) -> u8 {
        self.flags & status_flags::LEDS
    }

    /// Battery level in `[0.0, 1.0]`.
    pub fn battery_level(&self) -> f32 {
        (f32::from(self.battery) / f32::from(MAX_BATTERY_CODE)).min(1.0)
    }
}

/// Decoded `0x21` read reply; one chunk of at most 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReply<'a> {
    pub buttons: u16,
    /// Non-zero when the read was rejected (`0x07` for a missing peripheral,
    /// `0x08` for a write-only address).
    pub error: u8,
    /// Low 16 bits of the address of the first byte in `data`.
    pub offset: u16,
    pub data: &'a [u8],
}

impl<'a> ReadReply<'a> {
    pub fn parse(report: &'a [u8]) -> Option<Self> {
        let mut reader = ReportReader::new(report);
        if reader.read_u8().ok()? != report_ids::READ_REPLY {
            return None;
        }
        let buttons = reader.read_u16_be().ok()? & CORE_BUTTON_ALL;
        let size_error = reader.read_u8().ok()?;
        let offset = reader.read_u16_be().ok()?;
        let size = usize::from(size_error >> 4).saturating_add(1);
        let error = size_error & 0x0F;
        let available = reader.rest();
        let data = if error == 0 {
            available.get(..size.min(available.len())).unwrap_or_default()
        } else {
            &[]
        };
        Some(Self {
            buttons,
            error,
            offset,
            data,
        })
    }
}

/// Decoded `0x22` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub buttons: u16,
    /// ID of the output report being acknowledged.
    pub report_id: u8,
    pub error: u8,
}

impl Ack {
    pub fn parse(report: &[u8]) -> Option<Self> {
        let mut reader = ReportReader::new(report);
        if reader.read_u8().ok()? != report_ids::ACK {
            return None;
        }
        let buttons = reader.read_u16_be().ok()? & CORE_BUTTON_ALL;
        let report_id = reader.read_u8().ok()?;
        let error = reader.read_u8().ok()?;
        Some(Self {
            buttons,
            report_id,
            error,
        })
    }
}

/// Byte range of the expansion payload inside each data report.
fn expansion_span(report_id: u8) -> Option<(usize, usize)> {
    match report_id {
        report_ids::BUTTONS_EXP8 => Some((3, 11)),
        report_ids::BUTTONS_EXP19 => Some((3, 22)),
        report_ids::BUTTONS_ACCEL_EXP => Some((6, 22)),
        report_ids::BUTTONS_IR_EXP => Some((13, 22)),
        report_ids::BUTTONS_ACCEL_IR_EXP => Some((16, 22)),
        report_ids::EXP21 => Some((1, 22)),
        _ => None,
    }
}

/// Expansion bytes carried by a data report, truncated to what arrived.
pub fn expansion_payload(report: &[u8]) -> Option<&[u8]> {
    let (&report_id, _) = report.split_first()?;
    let (start, end) = expansion_span(report_id)?;
    let rest = report.get(start..)?;
    rest.get(..end.saturating_sub(start).min(rest.len()))
}

/// One received input report, classified by ID.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputReport<'a> {
    Status(StatusReport),
    ReadReply(ReadReply<'a>),
    Ack(Ack),
    Data {
        report_id: u8,
        /// Absent for `0x3D`, which carries no core buttons.
        core_buttons: Option<u16>,
        expansion: Option<&'a [u8]>,
    },
    Unknown(u8),
}

/// Classifies a report. Returns `None` for an empty or truncated report.
pub fn classify(report: &[u8]) -> Option<InputReport<'_>> {
    let &report_id = report.first()?;
    let classified = match report_id {
        report_ids::STATUS => InputReport::Status(StatusReport::parse(report)?),
        report_ids::READ_REPLY => InputReport::ReadReply(ReadReply::parse(report)?),
        report_ids::ACK => InputReport::Ack(Ack::parse(report)?),
        report_ids::EXP21 => InputReport::Data {
            report_id,
            core_buttons: None,
            expansion: expansion_payload(report),
        },
        report_ids::BUTTONS..=report_ids::BUTTONS_ACCEL_IR_EXP
        | report_ids::INTERLEAVED_A
        | report_ids::INTERLEAVED_B => InputReport::Data {
            report_id,
            core_buttons: Some(core_buttons(report)?),
            expansion: expansion_payload(report),
        },
        other => InputReport::Unknown(other),
    };
    Some(classified)
}

/// Progress of a multi-chunk memory read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadProgress {
    Pending,
    Complete(Vec<u8>),
    Failed { code: u8 },
}

/// Reassembles the `0x21` chunks answering one read request.
#[derive(Debug, Clone)]
pub struct ReadAssembler {
    address: u32,
    expected: usize,
    buffer: Vec<u8>,
}

impl ReadAssembler {
    pub fn new(address: u32, len: u16) -> Self {
        Self {
            address,
            expected: usize::from(len),
            buffer: Vec::with_capacity(usize::from(len)),
        }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn expected_len(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    /// Low 16 bits of the address the next chunk must start at.
    fn next_offset(&self) -> u16 {
        let consumed = u32::try_from(self.buffer.len()).unwrap_or(u32::MAX);
        let [.., hi, lo] = self.address.wrapping_add(consumed).to_be_bytes();
        u16::from_be_bytes([hi, lo])
    }

    /// Whether `reply` answers this read at the offset it expects next.
    pub fn accepts(&self, reply: &ReadReply<'_>) -> bool {
        reply.offset == self.next_offset()
    }

    /// Feeds one reply. Chunks for any other offset are ignored.
    pub fn push(&mut self, reply: &ReadReply<'_>) -> ReadProgress {
        if reply.error != 0 {
            return ReadProgress::Failed { code: reply.error };
        }
        if reply.offset != self.next_offset() {
            return ReadProgress::Pending;
        }

        let wanted = self.expected.saturating_sub(self.buffer.len());
        let take = reply.data.len().min(wanted);
        self.buffer
            .extend_from_slice(reply.data.get(..take).unwrap_or_default());

        if self.buffer.len() >= self.expected {
            ReadProgress::Complete(std::mem::take(&mut self.buffer))
        } else {
            ReadProgress::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_reply(offset: u16, data: &[u8], error: u8) -> Vec<u8> {
        let size = u8::try_from(data.len().saturating_sub(1)).unwrap_or(0x0F);
        let [hi, lo] = offset.to_be_bytes();
        let mut report = vec![report_ids::READ_REPLY, 0x00, 0x00, (size << 4) | error, hi, lo];
        report.extend_from_slice(data);
        report.resize(22, 0);
        report
    }

    #[test]
    fn test_encode_read_request_register_space() {
        assert_eq!(
            encode_read_request(memory::EXP_CALIBRATION, memory::EXP_HANDSHAKE_LEN, false),
            vec![0x17, 0x04, 0xA4, 0x00, 0x20, 0x00, 0xE0]
        );
    }

    #[test]
    fn test_encode_read_request_eeprom_with_rumble() {
        assert_eq!(
            encode_read_request(memory::ACCEL_CALIBRATION, 8, true),
            vec![0x17, 0x01, 0x00, 0x00, 0x16, 0x00, 0x08]
        );
    }

    #[test]
    fn test_encode_write_request() -> Result<(), Box<dyn std::error::Error>> {
        let report = encode_write_request(memory::EXP_DISABLE_ENCRYPTION_1, &[0x55], false)
            .ok_or("write request rejected")?;
        assert_eq!(report.len(), 22);
        assert_eq!(report.get(..7), Some(&[0x16, 0x04, 0xA4, 0x00, 0xF0, 0x01, 0x55][..]));
        assert!(report.get(7..).is_some_and(|pad| pad.iter().all(|&b| b == 0)));
        Ok(())
    }

    #[test]
    fn test_encode_write_request_rejects_oversize() {
        assert!(encode_write_request(0x04A4_0000, &[0; 17], false).is_none());
        assert!(encode_write_request(0x04A4_0000, &[], false).is_none());
    }

    #[test]
    fn test_encode_small_commands() {
        assert_eq!(encode_status_request(false), vec![0x15, 0x00]);
        assert_eq!(encode_leds(leds::LED_1 | leds::LED_4, false), vec![0x11, 0x90]);
        assert_eq!(encode_report_type(0x37, true, false), vec![0x12, 0x04, 0x37]);
        assert_eq!(encode_report_type(0x30, false, true), vec![0x12, 0x01, 0x30]);
    }

    #[test]
    fn test_select_report_mode_table() {
        assert_eq!(select_report_mode(true, true, true), 0x37);
        assert_eq!(select_report_mode(true, false, true), 0x35);
        assert_eq!(select_report_mode(true, true, false), 0x33);
        assert_eq!(select_report_mode(false, true, true), 0x36);
        assert_eq!(select_report_mode(false, true, false), 0x33);
        assert_eq!(select_report_mode(false, false, true), 0x34);
        assert_eq!(select_report_mode(true, false, false), 0x31);
        assert_eq!(select_report_mode(false, false, false), 0x30);
    }

    #[test]
    fn test_status_report_parse() -> Result<(), Box<dyn std::error::Error>> {
        let report = [0x20, 0x00, 0x08, 0x12, 0x00, 0x00, 0x64];
        let status = StatusReport::parse(&report).ok_or("status not parsed")?;
        assert_eq!(status.buttons, 0x0008);
        assert!(status.expansion_attached());
        assert!(!status.battery_low());
        assert_eq!(status.leds(), 0x10);
        assert!((status.battery_level() - 0.5).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn test_status_report_truncated() {
        assert!(StatusReport::parse(&[0x20, 0x00, 0x00, 0x02]).is_none());
        assert!(StatusReport::parse(&[]).is_none());
    }

    #[test]
    fn test_read_reply_parse() -> Result<(), Box<dyn std::error::Error>> {
        let report = read_reply(0x00FA, &[0x00, 0x00, 0xA4, 0x20, 0x01, 0x01], 0);
        let reply = ReadReply::parse(&report).ok_or("reply not parsed")?;
        assert_eq!(reply.error, 0);
        assert_eq!(reply.offset, 0x00FA);
        assert_eq!(reply.data, &[0x00, 0x00, 0xA4, 0x20, 0x01, 0x01]);
        Ok(())
    }

    #[test]
    fn test_read_reply_error_has_no_data() -> Result<(), Box<dyn std::error::Error>> {
        let report = read_reply(0x0020, &[0xFF; 16], 0x07);
        let reply = ReadReply::parse(&report).ok_or("reply not parsed")?;
        assert_eq!(reply.error, 0x07);
        assert!(reply.data.is_empty());
        Ok(())
    }

    #[test]
    fn test_ack_parse() -> Result<(), Box<dyn std::error::Error>> {
        let ack = Ack::parse(&[0x22, 0x00, 0x00, 0x16, 0x00]).ok_or("ack not parsed")?;
        assert_eq!(ack.report_id, report_ids::WRITE_MEMORY);
        assert_eq!(ack.error, 0);
        Ok(())
    }

    #[test]
    fn test_expansion_payload_offsets() {
        let mut report = [0u8; 22];
        for (i, byte) in report.iter_mut().enumerate() {
            *byte = u8::try_from(i).unwrap_or(0);
        }
        let cases = [
            (0x32u8, 3usize, 8usize),
            (0x34, 3, 19),
            (0x35, 6, 16),
            (0x36, 13, 9),
            (0x37, 16, 6),
            (0x3D, 1, 21),
        ];
        for (id, start, len) in cases {
            if let Some(first) = report.first_mut() {
                *first = id;
            }
            let payload = expansion_payload(&report);
            assert_eq!(payload.map(<[u8]>::len), Some(len), "report {id:#04x}");
            assert_eq!(payload.and_then(|p| p.first()).copied(), u8::try_from(start).ok());
        }
        assert!(expansion_payload(&[0x30, 0x00, 0x00, 0x01]).is_none());
    }

    #[test]
    fn test_expansion_payload_truncated_report() {
        let report = [0x34, 0x00, 0x00, 0xAA, 0xBB];
        assert_eq!(expansion_payload(&report), Some(&[0xAA, 0xBB][..]));
        assert!(expansion_payload(&[0x37, 0x00]).is_none());
    }

    #[test]
    fn test_classify_data_report() {
        let report = [0x30, 0x1F, 0xFF];
        assert_eq!(
            classify(&report),
            Some(InputReport::Data {
                report_id: 0x30,
                core_buttons: Some(0x1F9F),
                expansion: None,
            })
        );
        assert_eq!(classify(&[0x5A]), Some(InputReport::Unknown(0x5A)));
        assert_eq!(classify(&[]), None);
        assert_eq!(classify(&[0x31]), None);
    }

    #[test]
    fn test_read_assembler_multi_chunk() -> Result<(), Box<dyn std::error::Error>> {
        let mut assembler = ReadAssembler::new(memory::EXP_CALIBRATION, 20);
        let first = read_reply(0x0020, &[0xAB; 16], 0);
        let second = read_reply(0x0030, &[0xCD; 16], 0);

        let first = ReadReply::parse(&first);
        let second = ReadReply::parse(&second);
        assert_eq!(first.map(|r| assembler.push(&r)), Some(ReadProgress::Pending));
        assert_eq!(assembler.received(), 16);

        let Some(ReadProgress::Complete(data)) = second.map(|r| assembler.push(&r)) else {
            return Err("read should be complete".into());
        };
        assert_eq!(data.len(), 20);
        assert_eq!(data.get(15..17), Some(&[0xAB, 0xCD][..]));
        Ok(())
    }

    #[test]
    fn test_read_assembler_ignores_stale_offset() {
        let mut assembler = ReadAssembler::new(memory::ACCEL_CALIBRATION, 8);
        let stale = read_reply(0x00FA, &[0x11; 6], 0);
        let fresh = read_reply(0x0016, &[0x22; 8], 0);

        let stale = ReadReply::parse(&stale);
        assert_eq!(stale.as_ref().map(|r| assembler.accepts(r)), Some(false));
        assert_eq!(stale.map(|r| assembler.push(&r)), Some(ReadProgress::Pending));
        assert_eq!(assembler.received(), 0);

        let fresh = ReadReply::parse(&fresh);
        assert_eq!(fresh.as_ref().map(|r| assembler.accepts(r)), Some(true));
        assert_eq!(
            fresh.map(|r| assembler.push(&r)),
            Some(ReadProgress::Complete(vec![0x22; 8]))
        );
    }

    #[test]
    fn test_read_assembler_reports_error_code() {
        let mut assembler = ReadAssembler::new(memory::EXP_CALIBRATION, 224);
        let failed = read_reply(0x0020, &[0; 16], 0x07);
        let failed = ReadReply::parse(&failed);
        assert_eq!(
            failed.map(|r| assembler.push(&r)),
            Some(ReadProgress::Failed { code: 0x07 })
        );
    }
}
