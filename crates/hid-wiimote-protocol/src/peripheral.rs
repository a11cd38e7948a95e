//! Expansion peripherals and the ID → handshake parser registry.

use crate::classic::{self, ClassicControllerState, ClassicFormat, ClassicHandshake};
use crate::ids::expansion_ids;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Kind of peripheral plugged into the expansion port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpansionKind {
    #[default]
    None,
    ClassicController,
    ClassicControllerPro,
    Nunchuk,
    GuitarHero,
    BalanceBoard,
    MotionPlus,
}

impl From<ClassicFormat> for ExpansionKind {
    fn from(format: ClassicFormat) -> Self {
        match format {
            ClassicFormat::Original => Self::ClassicController,
            ClassicFormat::Pro | ClassicFormat::WiiUPro => Self::ClassicControllerPro,
        }
    }
}

/// Calibration block and latest payload of a peripheral without a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPeripheralState {
    pub kind: ExpansionKind,
    pub id: Option<u32>,
    pub calibration: Vec<u8>,
    pub last_payload: Vec<u8>,
}

impl RawPeripheralState {
    fn record(&mut self, payload: &[u8]) {
        self.last_payload.clear();
        self.last_payload.extend_from_slice(payload);
    }
}

/// State of the attached peripheral.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionState {
    Classic(ClassicControllerState),
    Raw(RawPeripheralState),
}

impl ExpansionState {
    pub fn kind(&self) -> ExpansionKind {
        match self {
            Self::Classic(state) => state.format.into(),
            Self::Raw(state) => state.kind,
        }
    }

    pub fn as_classic(&self) -> Option<&ClassicControllerState> {
        match self {
            Self::Classic(state) => Some(state),
            Self::Raw(_) => None,
        }
    }

    /// Feeds an expansion payload from a data report.
    pub fn apply_report(&mut self, payload: &[u8]) -> bool {
        match self {
            Self::Classic(state) => state.apply_report(payload),
            Self::Raw(state) => {
                state.record(payload);
                true
            }
        }
    }
}

/// Inputs to a peripheral handshake besides the block itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeContext {
    /// ID code found at the end of the block, if it was long enough.
    pub id: Option<u32>,
    /// The device handshake identified a Wii U Pro.
    pub wiiu_pro: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeripheralOutcome {
    Installed(ExpansionState),
    /// The block is unusable; read it again.
    Reread,
}

/// Turns a calibration block into live peripheral state.
pub trait PeripheralHandshake: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn handshake(&self, block: &[u8], ctx: &HandshakeContext) -> PeripheralOutcome;
}

/// Classic controller family parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicControllerHandshake;

impl PeripheralHandshake for ClassicControllerHandshake {
    fn name(&self) -> &'static str {
        "classic controller"
    }

    fn handshake(&self, block: &[u8], ctx: &HandshakeContext) -> PeripheralOutcome {
        match classic::parse_handshake(block, ctx.wiiu_pro) {
            ClassicHandshake::Ready(state) => {
                PeripheralOutcome::Installed(ExpansionState::Classic(state))
            }
            ClassicHandshake::Reread => PeripheralOutcome::Reread,
        }
    }
}

/// Keeps the block as-is for peripherals decoded elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct RawBlockHandshake {
    kind: ExpansionKind,
}

impl RawBlockHandshake {
    pub const fn new(kind: ExpansionKind) -> Self {
        Self { kind }
    }
}

impl PeripheralHandshake for RawBlockHandshake {
    fn name(&self) -> &'static str {
        match self.kind {
            ExpansionKind::Nunchuk => "nunchuk",
            ExpansionKind::GuitarHero => "guitar",
            ExpansionKind::BalanceBoard => "balance board",
            ExpansionKind::MotionPlus => "motion plus",
            _ => "raw peripheral",
        }
    }

    fn handshake(&self, block: &[u8], ctx: &HandshakeContext) -> PeripheralOutcome {
        if block.is_empty() {
            return PeripheralOutcome::Reread;
        }
        PeripheralOutcome::Installed(ExpansionState::Raw(RawPeripheralState {
            kind: self.kind,
            id: ctx.id,
            calibration: block.to_vec(),
            last_payload: Vec::new(),
        }))
    }
}

/// Maps expansion ID codes to handshake parsers.
///
/// Codes without an entry resolve to the default parser.
#[derive(Debug, Clone)]
pub struct PeripheralRegistry {
    entries: HashMap<u32, Arc<dyn PeripheralHandshake>>,
    default: Arc<dyn PeripheralHandshake>,
}

impl PeripheralRegistry {
    /// Empty registry resolving everything to `default`.
    pub fn with_default(default: Arc<dyn PeripheralHandshake>) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    /// Every known code, with the classic parser as the default.
    pub fn standard() -> Self {
        let classic: Arc<dyn PeripheralHandshake> = Arc::new(ClassicControllerHandshake);
        let mut registry = Self::with_default(Arc::clone(&classic));
        for id in expansion_ids::CLASSIC_FAMILY {
            registry.register(id, Arc::clone(&classic));
        }

        let raw = [
            (expansion_ids::NUNCHUK, ExpansionKind::Nunchuk),
            (expansion_ids::GUITAR, ExpansionKind::GuitarHero),
            (expansion_ids::BALANCE_BOARD, ExpansionKind::BalanceBoard),
            (expansion_ids::MOTION_PLUS, ExpansionKind::MotionPlus),
            (expansion_ids::MOTION_PLUS_NUNCHUK, ExpansionKind::MotionPlus),
            (expansion_ids::MOTION_PLUS_CLASSIC, ExpansionKind::MotionPlus),
        ];
        for (id, kind) in raw {
            registry.register(id, Arc::new(RawBlockHandshake::new(kind)));
        }
        registry
    }

    /// Adds or replaces the parser for `id`.
    pub fn register(&mut self, id: u32, parser: Arc<dyn PeripheralHandshake>) {
        self.entries.insert(id, parser);
    }

    pub fn is_registered(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn resolve(&self, id: Option<u32>) -> &dyn PeripheralHandshake {
        match id.and_then(|id| self.entries.get(&id)) {
            Some(parser) => parser.as_ref(),
            None => self.default.as_ref(),
        }
    }
}

impl Default for PeripheralRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
