//! Wii Remote HID protocol: handshake state machines, expansion decoding and
//! command encoding.
//!
//! This crate performs no I/O. The [`DeviceRecord`] turns completions into
//! [`Outbox`]es of requests and events; the driver crate owns the transport
//! and decides whether the exchanges run from callbacks or block in place.

#![deny(static_mut_refs)]

pub mod bits;
pub mod buttons;
pub mod classic;
pub mod device;
pub mod expansion;
pub mod handshake;
pub mod ids;
pub mod peripheral;
pub mod report;
pub mod types;

pub use buttons::{
    ButtonEdges, ButtonState, CLASSIC_BUTTON_ALL, CORE_BUTTON_ALL, classic_buttons, core_buttons,
    track_edges,
};
pub use classic::{
    ClassicControllerState, ClassicFormat, ClassicHandshake, ClassicSample, WireLayout,
    decode_packed, decode_wide, encode_packed, encode_wide, parse_handshake,
};
pub use device::{ConnectionState, DeviceRecord, ExpansionSlot};
pub use expansion::{ExpansionEffect, ExpansionStep, ExpansionTransition};
pub use handshake::{HandshakeEffect, HandshakeStep, HandshakeTransition};
pub use ids::{expansion_ids, is_classic_family};
pub use peripheral::{
    ClassicControllerHandshake, ExpansionKind, ExpansionState, HandshakeContext,
    PeripheralHandshake, PeripheralOutcome, PeripheralRegistry, RawBlockHandshake,
    RawPeripheralState,
};
pub use report::{
    Ack, InputReport, ReadAssembler, ReadProgress, ReadReply, StatusReport, classify,
    expansion_payload, memory, report_ids, select_report_mode,
};
pub use types::{
    Capabilities, DeviceFlags, IssuedRequest, Outbox, Request, Response, Target, Ticket,
    WiimoteEvent,
};
