//! Expansion handshake sub-machine.
//!
//! | step | action | advances on |
//! |---|---|---|
//! | 0 `DisableEncryption1` | write `0x55` to `0x04A400F0` | ack |
//! | 1 `DisableEncryption2` | write `0x00` to `0x04A400FB` | ack |
//! | 2 `RequestCalibration` | read 224 bytes at `0x04A40020` | any read completion |
//! | 3 `Identify` | dispatch the block through the registry | installed peripheral |
//!
//! The step names the exchange currently in flight. `Identify` waits for
//! the calibration block to be (re)delivered when it arrived empty or the
//! peripheral parser asked for a fresh read.

use crate::peripheral::{
    ExpansionState, HandshakeContext, PeripheralOutcome, PeripheralRegistry,
};
use crate::report::memory;
use crate::types::Response;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpansionStep {
    DisableEncryption1,
    DisableEncryption2,
    RequestCalibration,
    Identify,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionEffect {
    WriteMemory { address: u32, value: u8 },
    ReadMemory { address: u32, len: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionTransition {
    Continue {
        next: ExpansionStep,
        effects: Vec<ExpansionEffect>,
    },
    Installed(ExpansionState),
    /// The remote rejected the calibration read.
    Failed { code: u8 },
}

impl ExpansionTransition {
    fn stay(step: ExpansionStep) -> Self {
        Self::Continue {
            next: step,
            effects: Vec::new(),
        }
    }
}

fn read_block() -> ExpansionEffect {
    ExpansionEffect::ReadMemory {
        address: memory::EXP_CALIBRATION,
        len: memory::EXP_HANDSHAKE_LEN,
    }
}

/// ID code at offset 220 of the calibration block.
pub fn block_id(block: &[u8]) -> Option<u32> {
    let end = memory::EXP_BLOCK_ID_OFFSET.checked_add(4)?;
    let bytes: [u8; 4] = block.get(memory::EXP_BLOCK_ID_OFFSET..end)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

impl ExpansionStep {
    /// Position in the 0..=3 sequence.
    pub const fn index(self) -> u8 {
        match self {
            Self::DisableEncryption1 => 0,
            Self::DisableEncryption2 => 1,
            Self::RequestCalibration => 2,
            Self::Identify => 3,
        }
    }

    /// First step and its write.
    pub fn start() -> (Self, Vec<ExpansionEffect>) {
        debug!("expansion handshake: disabling encryption");
        (
            Self::DisableEncryption1,
            vec![ExpansionEffect::WriteMemory {
                address: memory::EXP_DISABLE_ENCRYPTION_1,
                value: memory::EXP_DISABLE_ENCRYPTION_1_VALUE,
            }],
        )
    }

    pub fn advance(
        self,
        response: &Response<'_>,
        registry: &PeripheralRegistry,
        wiiu_pro: bool,
    ) -> ExpansionTransition {
        match (self, response) {
            (Self::DisableEncryption1, Response::Ack { code }) => {
                if *code != 0 {
                    warn!(code, "expansion handshake: first enable write reported an error");
                }
                ExpansionTransition::Continue {
                    next: Self::DisableEncryption2,
                    effects: vec![ExpansionEffect::WriteMemory {
                        address: memory::EXP_DISABLE_ENCRYPTION_2,
                        value: memory::EXP_DISABLE_ENCRYPTION_2_VALUE,
                    }],
                }
            }

            (Self::DisableEncryption2, Response::Ack { code }) => {
                if *code != 0 {
                    warn!(code, "expansion handshake: second enable write reported an error");
                }
                debug!("expansion handshake: reading calibration block");
                ExpansionTransition::Continue {
                    next: Self::RequestCalibration,
                    effects: vec![read_block()],
                }
            }

            (Self::RequestCalibration | Self::Identify, Response::Rejected { code }) => {
                warn!(code, "expansion handshake: calibration read rejected");
                ExpansionTransition::Failed { code: *code }
            }

            (Self::RequestCalibration | Self::Identify, Response::Data(block)) => {
                Self::identify(block, registry, wiiu_pro)
            }

            (step, response) => {
                debug!(?step, ?response, "expansion handshake: response ignored");
                ExpansionTransition::stay(step)
            }
        }
    }

    fn identify(block: &[u8], registry: &PeripheralRegistry, wiiu_pro: bool) -> ExpansionTransition {
        if block.is_empty() {
            debug!("expansion handshake: empty block, waiting for redelivery");
            return ExpansionTransition::stay(Self::Identify);
        }

        let id = block_id(block);
        let parser = registry.resolve(id);
        debug!(
            id = ?id.map(|id| format!("{id:#010x}")),
            parser = parser.name(),
            "expansion handshake: dispatching calibration block"
        );

        match parser.handshake(block, &HandshakeContext { id, wiiu_pro }) {
            PeripheralOutcome::Installed(state) => {
                info!(kind = ?state.kind(), "expansion handshake complete");
                ExpansionTransition::Installed(state)
            }
            PeripheralOutcome::Reread => ExpansionTransition::Continue {
                next: Self::Identify,
                effects: vec![read_block()],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classic::ClassicFormat;
    use crate::peripheral::ExpansionKind;

    fn classic_block(id: u32) -> Vec<u8> {
        let mut block = vec![0u8; 224];
        let calibration = [0xFC, 0x04, 0x7E, 0xFC, 0x04, 0x7E, 0xF8, 0x08, 0x80, 0xF8, 0x08, 0x80];
        for (dst, src) in block.iter_mut().zip(calibration) {
            *dst = src;
        }
        for (dst, src) in block.iter_mut().skip(220).zip(id.to_be_bytes()) {
            *dst = src;
        }
        block
    }

    #[test]
    fn test_start_writes_first_enable_register() {
        let (step, effects) = ExpansionStep::start();
        assert_eq!(step.index(), 0);
        assert_eq!(
            effects,
            vec![ExpansionEffect::WriteMemory { address: 0x04A4_00F0, value: 0x55 }]
        );
    }

    #[test]
    fn test_acks_walk_to_calibration_read() {
        let registry = PeripheralRegistry::standard();
        let ack = Response::Ack { code: 0 };

        let t = ExpansionStep::DisableEncryption1.advance(&ack, &registry, false);
        assert_eq!(
            t,
            ExpansionTransition::Continue {
                next: ExpansionStep::DisableEncryption2,
                effects: vec![ExpansionEffect::WriteMemory { address: 0x04A4_00FB, value: 0x00 }],
            }
        );

        let t = ExpansionStep::DisableEncryption2.advance(&ack, &registry, false);
        assert_eq!(
            t,
            ExpansionTransition::Continue {
                next: ExpansionStep::RequestCalibration,
                effects: vec![ExpansionEffect::ReadMemory { address: 0x04A4_0020, len: 224 }],
            }
        );
    }

    #[test]
    fn test_classic_block_installs() -> Result<(), Box<dyn std::error::Error>> {
        let registry = PeripheralRegistry::standard();
        let block = classic_block(0xA420_0101);
        let t = ExpansionStep::RequestCalibration.advance(&Response::Data(&block), &registry, false);
        let ExpansionTransition::Installed(state) = t else {
            return Err("classic controller should install".into());
        };
        assert_eq!(state.kind(), ExpansionKind::ClassicControllerPro);
        assert_eq!(state.as_classic().map(|c| c.format), Some(ClassicFormat::Pro));
        Ok(())
    }

    #[test]
    fn test_unknown_id_uses_classic_fallback() {
        let registry = PeripheralRegistry::standard();
        let block = classic_block(0x1234_5678);
        let t = ExpansionStep::RequestCalibration.advance(&Response::Data(&block), &registry, false);
        assert!(matches!(t, ExpansionTransition::Installed(ExpansionState::Classic(_))));
    }

    #[test]
    fn test_empty_block_waits_in_identify() {
        let registry = PeripheralRegistry::standard();
        let t = ExpansionStep::RequestCalibration.advance(&Response::Data(&[]), &registry, false);
        assert_eq!(t, ExpansionTransition::stay(ExpansionStep::Identify));
    }

    #[test]
    fn test_blank_classic_block_rereads() {
        let registry = PeripheralRegistry::standard();
        let block = [0xFFu8; 224];
        let t = ExpansionStep::Identify.advance(&Response::Data(&block), &registry, false);
        assert_eq!(
            t,
            ExpansionTransition::Continue {
                next: ExpansionStep::Identify,
                effects: vec![ExpansionEffect::ReadMemory { address: 0x04A4_0020, len: 224 }],
            }
        );
    }

    #[test]
    fn test_rejected_read_fails() {
        let registry = PeripheralRegistry::standard();
        let t = ExpansionStep::RequestCalibration.advance(
            &Response::Rejected { code: 7 },
            &registry,
            false,
        );
        assert_eq!(t, ExpansionTransition::Failed { code: 7 });
    }

    #[test]
    fn test_unexpected_responses_are_ignored() {
        let registry = PeripheralRegistry::standard();
        let t = ExpansionStep::DisableEncryption1.advance(&Response::Data(&[1, 2, 3]), &registry, false);
        assert_eq!(t, ExpansionTransition::stay(ExpansionStep::DisableEncryption1));

        let t = ExpansionStep::RequestCalibration.advance(&Response::Ack { code: 0 }, &registry, false);
        assert_eq!(t, ExpansionTransition::stay(ExpansionStep::RequestCalibration));
    }

    #[test]
    fn test_block_id() {
        assert_eq!(block_id(&classic_block(0xA420_0120)), Some(0xA420_0120));
        assert_eq!(block_id(&[0u8; 223]), None);
    }
}
