//! Device handshake state machine.
//!
//! ```text
//! Idle ──begin──▶ AwaitStatus ──attachment──▶ AwaitExpansionId ──Wii U Pro──▶ Complete
//!                      │                            │
//!                      └──────no attachment───▶ AwaitAccelCalibration ──────▶ Complete
//! ```
//!
//! Each step is advanced by exactly one completed exchange. A response the
//! step cannot use leaves it where it is.

use crate::bits::decode_accel_calibration;
use crate::ids::expansion_ids;
use crate::report::{leds, memory};
use crate::types::Response;
use tracing::{debug, info, warn};
use wiimote_calibration::AccelCalibration;

/// Position of the device handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandshakeStep {
    #[default]
    Idle,
    /// LEDs cleared and a status report requested.
    AwaitStatus,
    /// Reading the 6-byte expansion ID to spot a Wii U Pro.
    AwaitExpansionId,
    /// Reading the accelerometer calibration.
    AwaitAccelCalibration,
    Complete,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEffect {
    SetLeds(u8),
    RequestStatus,
    ReadMemory { address: u32, len: u16 },
    WiiUProDetected,
    InstallAccelCalibration(AccelCalibration),
    /// Handshake finished; the device is usable.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeTransition {
    pub next: HandshakeStep,
    pub effects: Vec<HandshakeEffect>,
}

impl HandshakeTransition {
    fn stay(step: HandshakeStep) -> Self {
        Self {
            next: step,
            effects: Vec::new(),
        }
    }

    fn to(next: HandshakeStep, effects: Vec<HandshakeEffect>) -> Self {
        Self { next, effects }
    }
}

fn read_accel_calibration() -> HandshakeTransition {
    HandshakeTransition::to(
        HandshakeStep::AwaitAccelCalibration,
        vec![HandshakeEffect::ReadMemory {
            address: memory::ACCEL_CALIBRATION,
            len: memory::ACCEL_CALIBRATION_LEN,
        }],
    )
}

/// ID code in bytes 2..6 of the expansion ID block.
fn expansion_id(block: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = block.get(2..6)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

impl HandshakeStep {
    pub fn is_in_progress(self) -> bool {
        !matches!(self, Self::Idle | Self::Complete)
    }

    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }

    /// Starts the handshake. Only `Idle` moves.
    pub fn begin(self) -> HandshakeTransition {
        if self != Self::Idle {
            debug!(step = ?self, "handshake already started");
            return HandshakeTransition::stay(self);
        }
        debug!("handshake: clearing LEDs and requesting status");
        HandshakeTransition::to(
            Self::AwaitStatus,
            vec![HandshakeEffect::SetLeds(leds::NONE), HandshakeEffect::RequestStatus],
        )
    }

    /// Consumes the response to the exchange this step is waiting on.
    pub fn advance(self, response: &Response<'_>) -> HandshakeTransition {
        match (self, response) {
            (Self::AwaitStatus, Response::Status(status)) => {
                if status.expansion_attached() {
                    debug!("handshake: attachment present, reading expansion ID");
                    HandshakeTransition::to(
                        Self::AwaitExpansionId,
                        vec![HandshakeEffect::ReadMemory {
                            address: memory::EXP_ID,
                            len: memory::EXP_ID_LEN,
                        }],
                    )
                } else {
                    debug!("handshake: no attachment, reading accelerometer calibration");
                    read_accel_calibration()
                }
            }

            (Self::AwaitExpansionId, Response::Data(block)) => match expansion_id(block) {
                Some(expansion_ids::WIIU_PRO) => {
                    info!("Wii U Pro controller detected");
                    HandshakeTransition::to(
                        Self::Complete,
                        vec![
                            HandshakeEffect::WiiUProDetected,
                            HandshakeEffect::InstallAccelCalibration(AccelCalibration::default()),
                            HandshakeEffect::Completed,
                        ],
                    )
                }
                Some(id) => {
                    debug!(id = format_args!("{id:#010x}"), "handshake: expansion ID read");
                    read_accel_calibration()
                }
                None => {
                    debug!(len = block.len(), "handshake: short expansion ID block ignored");
                    HandshakeTransition::stay(self)
                }
            },

            // Nothing answers at the ID address; carry on as a plain remote.
            (Self::AwaitExpansionId, Response::Rejected { code }) => {
                debug!(code, "handshake: expansion ID read rejected");
                read_accel_calibration()
            }

            (Self::AwaitAccelCalibration, Response::Data(block)) => {
                match decode_accel_calibration(block) {
                    Some(calibration) => {
                        info!(
                            zero = ?calibration.zero,
                            gravity = ?calibration.gravity,
                            "handshake complete"
                        );
                        HandshakeTransition::to(
                            Self::Complete,
                            vec![
                                HandshakeEffect::InstallAccelCalibration(calibration),
                                HandshakeEffect::Completed,
                            ],
                        )
                    }
                    None => {
                        debug!(len = block.len(), "handshake: short calibration block ignored");
                        HandshakeTransition::stay(self)
                    }
                }
            }

            (step, response) => {
                warn!(?step, ?response, "handshake: unexpected response ignored");
                HandshakeTransition::stay(step)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::StatusReport;

    fn status(flags: u8) -> Response<'static> {
        Response::Status(StatusReport {
            buttons: 0,
            flags,
            battery: 0xC0,
        })
    }

    #[test]
    fn test_begin_from_idle() {
        let t = HandshakeStep::Idle.begin();
        assert_eq!(t.next, HandshakeStep::AwaitStatus);
        assert_eq!(
            t.effects,
            vec![HandshakeEffect::SetLeds(0), HandshakeEffect::RequestStatus]
        );
    }

    #[test]
    fn test_begin_is_noop_mid_handshake() {
        let t = HandshakeStep::AwaitExpansionId.begin();
        assert_eq!(t.next, HandshakeStep::AwaitExpansionId);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_status_without_attachment_reads_calibration() {
        let t = HandshakeStep::AwaitStatus.advance(&status(0x10));
        assert_eq!(t.next, HandshakeStep::AwaitAccelCalibration);
        assert_eq!(
            t.effects,
            vec![HandshakeEffect::ReadMemory { address: 0x16, len: 8 }]
        );
    }

    #[test]
    fn test_status_with_attachment_reads_expansion_id() {
        let t = HandshakeStep::AwaitStatus.advance(&status(0x02));
        assert_eq!(t.next, HandshakeStep::AwaitExpansionId);
        assert_eq!(
            t.effects,
            vec![HandshakeEffect::ReadMemory { address: 0x04A4_00FA, len: 6 }]
        );
    }

    #[test]
    fn test_wiiu_pro_id_short_circuits() {
        let block = [0x00, 0x00, 0xA4, 0x20, 0x01, 0x20];
        let t = HandshakeStep::AwaitExpansionId.advance(&Response::Data(&block));
        assert_eq!(t.next, HandshakeStep::Complete);
        assert_eq!(
            t.effects,
            vec![
                HandshakeEffect::WiiUProDetected,
                HandshakeEffect::InstallAccelCalibration(AccelCalibration::default()),
                HandshakeEffect::Completed,
            ]
        );
    }

    #[test]
    fn test_other_id_reads_calibration() {
        let block = [0x00, 0x00, 0xA4, 0x20, 0x01, 0x01];
        let t = HandshakeStep::AwaitExpansionId.advance(&Response::Data(&block));
        assert_eq!(t.next, HandshakeStep::AwaitAccelCalibration);
    }

    #[test]
    fn test_calibration_completes() -> Result<(), Box<dyn std::error::Error>> {
        let block = [0x80, 0x80, 0x80, 0x00, 0x86, 0x86, 0x86, 0x00];
        let t = HandshakeStep::AwaitAccelCalibration.advance(&Response::Data(&block));
        assert_eq!(t.next, HandshakeStep::Complete);
        let Some(HandshakeEffect::InstallAccelCalibration(calib)) = t.effects.first().copied() else {
            return Err("calibration not installed".into());
        };
        assert_eq!(calib.zero.x, 0x200);
        assert_eq!(calib.gravity.z, 0x18);
        assert_eq!(t.effects.last(), Some(&HandshakeEffect::Completed));
        Ok(())
    }

    #[test]
    fn test_malformed_responses_leave_step_unchanged() {
        let cases = [
            (HandshakeStep::AwaitStatus, Response::Data(&[0x00; 8])),
            (HandshakeStep::AwaitExpansionId, Response::Data(&[])),
            (HandshakeStep::AwaitExpansionId, Response::Data(&[0x00, 0x00, 0xA4])),
            (HandshakeStep::AwaitAccelCalibration, Response::Data(&[])),
            (HandshakeStep::AwaitAccelCalibration, Response::Data(&[0x80; 7])),
            (HandshakeStep::AwaitAccelCalibration, Response::Ack { code: 0 }),
            (HandshakeStep::Idle, Response::Data(&[0x80; 8])),
            (HandshakeStep::Complete, status(0x02)),
        ];
        for (step, response) in cases {
            let t = step.advance(&response);
            assert_eq!(t.next, step, "{step:?} moved on {response:?}");
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn test_flags() {
        assert!(!HandshakeStep::Idle.is_in_progress());
        assert!(HandshakeStep::AwaitStatus.is_in_progress());
        assert!(HandshakeStep::Complete.is_complete());
        assert!(!HandshakeStep::Complete.is_in_progress());
    }
}
