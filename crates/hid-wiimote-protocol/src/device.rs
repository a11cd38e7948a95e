//! Per-device record: connection, handshake cursors, expansion slot and the
//! latest decoded input.
//!
//! Every operation returns an [`Outbox`] describing the requests to send and
//! the events to publish. Requests carry a [`Ticket`]; completions handed
//! back through [`DeviceRecord::complete`] are dropped unless the ticket
//! still matches, so a disconnect or re-handshake cancels everything in
//! flight.

use crate::buttons::ButtonState;
use crate::expansion::{ExpansionEffect, ExpansionStep, ExpansionTransition};
use crate::handshake::{HandshakeEffect, HandshakeStep};
use crate::peripheral::{ExpansionKind, ExpansionState, PeripheralRegistry};
use crate::report::{InputReport, StatusReport, classify, select_report_mode};
use crate::types::{
    Capabilities, DeviceFlags, Outbox, Request, Response, Target, Ticket, WiimoteEvent,
};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use wiimote_calibration::AccelCalibration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// What occupies the expansion port.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExpansionSlot {
    #[default]
    Empty,
    Handshaking(ExpansionStep),
    Present(ExpansionState),
    /// The last handshake was rejected; cleared when the peripheral is
    /// unplugged.
    Failed,
}

#[derive(Debug, Clone)]
pub struct DeviceRecord {
    registry: Arc<PeripheralRegistry>,
    generation: u32,
    epoch: u32,
    connection: ConnectionState,
    handshake: HandshakeStep,
    expansion: ExpansionSlot,
    capabilities: Capabilities,
    wiiu_pro: bool,
    accel_calibration: AccelCalibration,
    buttons: ButtonState,
    last_status: Option<StatusReport>,
}

impl Default for DeviceRecord {
    fn default() -> Self {
        Self::new(Arc::new(PeripheralRegistry::standard()))
    }
}

impl DeviceRecord {
    pub fn new(registry: Arc<PeripheralRegistry>) -> Self {
        Self {
            registry,
            generation: 0,
            epoch: 0,
            connection: ConnectionState::Disconnected,
            handshake: HandshakeStep::Idle,
            expansion: ExpansionSlot::Empty,
            capabilities: Capabilities::default(),
            wiiu_pro: false,
            accel_calibration: AccelCalibration::default(),
            buttons: ButtonState::default(),
            last_status: None,
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn handshake_step(&self) -> HandshakeStep {
        self.handshake
    }

    pub fn expansion_slot(&self) -> &ExpansionSlot {
        &self.expansion
    }

    pub fn expansion(&self) -> Option<&ExpansionState> {
        match &self.expansion {
            ExpansionSlot::Present(state) => Some(state),
            _ => None,
        }
    }

    pub fn expansion_kind(&self) -> ExpansionKind {
        self.expansion().map_or(ExpansionKind::None, ExpansionState::kind)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_wiiu_pro(&self) -> bool {
        self.wiiu_pro
    }

    pub fn accel_calibration(&self) -> AccelCalibration {
        self.accel_calibration
    }

    pub fn buttons(&self) -> ButtonState {
        self.buttons
    }

    pub fn last_status(&self) -> Option<StatusReport> {
        self.last_status
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn flags(&self) -> DeviceFlags {
        DeviceFlags {
            connected: self.is_connected(),
            handshake_in_progress: self.handshake.is_in_progress(),
            handshake_complete: self.handshake.is_complete(),
            expansion_present: matches!(self.expansion, ExpansionSlot::Present(_)),
            expansion_handshake_in_progress: matches!(
                self.expansion,
                ExpansionSlot::Handshaking(_)
            ),
            expansion_handshake_failed: matches!(self.expansion, ExpansionSlot::Failed),
            accelerometer_enabled: self.capabilities.accelerometer,
            ir_enabled: self.capabilities.ir,
        }
    }

    /// Data report mode for the current capabilities and expansion.
    pub fn report_mode(&self) -> u8 {
        select_report_mode(
            self.capabilities.accelerometer,
            self.capabilities.ir,
            self.expansion().is_some(),
        )
    }

    /// Request switching the remote to [`report_mode`](Self::report_mode).
    pub fn report_mode_request(&self) -> Request {
        Request::SetReportMode {
            mode: self.report_mode(),
        }
    }

    fn ticket(&self, target: Target) -> Ticket {
        Ticket {
            generation: self.generation,
            epoch: self.epoch,
            target,
        }
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Marks the transport open and starts the handshake.
    pub fn connect(&mut self) -> Outbox {
        if self.is_connected() {
            debug!("connect on an already connected device ignored");
            return Outbox::default();
        }
        self.connection = ConnectionState::Connected;
        self.bump_generation();
        self.begin_handshake()
    }

    /// Marks the transport open without issuing any handshake request.
    ///
    /// Used by callers that run the exchange themselves. The handshake counts
    /// as in progress until [`finish_handshake`](Self::finish_handshake) or
    /// [`cancel_handshake`](Self::cancel_handshake).
    pub fn attach(&mut self) {
        if !self.is_connected() {
            self.connection = ConnectionState::Connected;
            self.bump_generation();
            self.reset_device_state();
        }
        if self.handshake == HandshakeStep::Idle {
            self.handshake = HandshakeStep::AwaitAccelCalibration;
        }
    }

    /// Drops an unfinished handshake back to idle. Its tickets become stale.
    pub fn cancel_handshake(&mut self) {
        if !self.handshake.is_in_progress() {
            return;
        }
        debug!(step = ?self.handshake, "handshake cancelled");
        self.bump_generation();
        self.handshake = HandshakeStep::Idle;
    }

    /// Completes the handshake with an externally obtained calibration.
    ///
    /// `None` keeps the default calibration. Status handling, and with it the
    /// expansion handshake, is live afterwards.
    pub fn finish_handshake(&mut self, calibration: Option<AccelCalibration>) -> Outbox {
        let mut out = Outbox::default();
        if !self.is_connected() || self.handshake.is_complete() {
            return out;
        }
        if let Some(calibration) = calibration {
            self.accel_calibration = calibration;
        }
        self.handshake = HandshakeStep::Complete;
        info!("handshake complete");
        out.events.push(WiimoteEvent::Connected);
        out
    }

    /// Restarts the handshake from scratch, cancelling anything in flight.
    pub fn rehandshake(&mut self) -> Outbox {
        if !self.is_connected() {
            return Outbox::default();
        }
        info!("restarting handshake");
        self.bump_generation();
        self.bump_epoch();
        self.reset_device_state();
        self.begin_handshake()
    }

    /// Drops back to idle. In-flight completions become stale.
    pub fn disconnect(&mut self) -> Outbox {
        let mut out = Outbox::default();
        if !self.is_connected() {
            return out;
        }
        info!(generation = self.generation, "device disconnected");
        self.bump_generation();
        self.bump_epoch();
        self.connection = ConnectionState::Disconnected;
        self.reset_device_state();
        out.events.push(WiimoteEvent::Disconnected);
        out
    }

    fn reset_device_state(&mut self) {
        self.handshake = HandshakeStep::Idle;
        self.expansion = ExpansionSlot::Empty;
        self.wiiu_pro = false;
        self.accel_calibration = AccelCalibration::default();
        self.buttons.clear();
        self.last_status = None;
    }

    fn begin_handshake(&mut self) -> Outbox {
        let transition = self.handshake.begin();
        self.handshake = transition.next;
        let mut out = Outbox::default();
        self.apply_handshake_effects(transition.effects, &mut out);
        out
    }

    /// Switches application features; the report mode follows.
    pub fn set_capabilities(&mut self, capabilities: Capabilities) -> Outbox {
        let mut out = Outbox::default();
        if capabilities != self.capabilities {
            self.capabilities = capabilities;
            out.rederive_report_mode = true;
        }
        out
    }

    /// Whether a completion for `ticket` would still be applied.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        if !self.is_connected() || ticket.generation != self.generation {
            return false;
        }
        match ticket.target {
            Target::Handshake(step) => step == self.handshake,
            Target::Expansion(step) => {
                ticket.epoch == self.epoch && self.expansion == ExpansionSlot::Handshaking(step)
            }
            Target::Status | Target::Detached => true,
        }
    }

    /// Applies the completion of a request issued with `ticket`.
    pub fn complete(&mut self, ticket: Ticket, response: Response<'_>) -> Outbox {
        let mut out = Outbox::default();
        if !self.is_current(&ticket) {
            debug!(
                ?ticket,
                generation = self.generation,
                "stale completion discarded"
            );
            return out;
        }

        match ticket.target {
            Target::Handshake(step) => {
                if let Response::Status(status) = response {
                    self.last_status = Some(status);
                    out.events.push(WiimoteEvent::Status(status));
                }
                let transition = step.advance(&response);
                self.handshake = transition.next;
                self.apply_handshake_effects(transition.effects, &mut out);
            }
            Target::Expansion(step) => {
                let transition = step.advance(&response, &self.registry, self.wiiu_pro);
                self.apply_expansion_transition(transition, &mut out);
            }
            Target::Status => {
                if let Response::Status(status) = response {
                    out.merge(self.handle_status(status));
                }
            }
            Target::Detached => trace!(?response, "detached completion"),
        }
        out
    }

    /// Gives up on the exchange issued with `ticket` after its reply never
    /// came.
    ///
    /// An expansion exchange fails the expansion handshake the same way a
    /// rejected read does. A device handshake exchange drops the handshake
    /// back to idle.
    pub fn abandon(&mut self, ticket: Ticket) -> Outbox {
        let mut out = Outbox::default();
        if !self.is_current(&ticket) {
            debug!(?ticket, "abandoning a stale exchange");
            return out;
        }
        match ticket.target {
            Target::Expansion(step) => {
                warn!(?step, "expansion exchange abandoned");
                self.fail_expansion(&mut out);
            }
            Target::Handshake(step) => {
                warn!(?step, "handshake exchange abandoned");
                self.cancel_handshake();
            }
            Target::Status | Target::Detached => {
                debug!(target = ?ticket.target, "exchange abandoned");
            }
        }
        out
    }

    fn fail_expansion(&mut self, out: &mut Outbox) {
        self.expansion = ExpansionSlot::Failed;
        out.events
            .push(WiimoteEvent::ExpansionRemoved(ExpansionKind::None));
        out.push(self.ticket(Target::Status), Request::RequestStatus);
    }

    fn apply_handshake_effects(&mut self, effects: Vec<HandshakeEffect>, out: &mut Outbox) {
        let target = Target::Handshake(self.handshake);
        for effect in effects {
            match effect {
                HandshakeEffect::SetLeds(bits) => {
                    out.push(self.ticket(Target::Detached), Request::SetLeds(bits));
                }
                HandshakeEffect::RequestStatus => {
                    out.push(self.ticket(target), Request::RequestStatus);
                }
                HandshakeEffect::ReadMemory { address, len } => {
                    out.push(self.ticket(target), Request::ReadMemory { address, len });
                }
                HandshakeEffect::WiiUProDetected => self.wiiu_pro = true,
                HandshakeEffect::InstallAccelCalibration(calibration) => {
                    self.accel_calibration = calibration;
                }
                HandshakeEffect::Completed => {
                    out.events.push(WiimoteEvent::Connected);
                    out.push(self.ticket(Target::Status), Request::RequestStatus);
                }
            }
        }
    }

    fn apply_expansion_transition(&mut self, transition: ExpansionTransition, out: &mut Outbox) {
        match transition {
            ExpansionTransition::Continue { next, effects } => {
                self.expansion = ExpansionSlot::Handshaking(next);
                let ticket = self.ticket(Target::Expansion(next));
                for effect in effects {
                    let request = match effect {
                        ExpansionEffect::WriteMemory { address, value } => Request::WriteMemory {
                            address,
                            data: vec![value],
                        },
                        ExpansionEffect::ReadMemory { address, len } => {
                            Request::ReadMemory { address, len }
                        }
                    };
                    out.push(ticket, request);
                }
            }
            ExpansionTransition::Installed(state) => {
                let kind = state.kind();
                self.expansion = ExpansionSlot::Present(state);
                out.events.push(WiimoteEvent::ExpansionInserted(kind));
                out.rederive_report_mode = true;
                out.push(self.ticket(Target::Status), Request::RequestStatus);
            }
            ExpansionTransition::Failed { code } => {
                warn!(code, "expansion handshake failed");
                self.fail_expansion(out);
            }
        }
    }

    fn start_expansion_handshake(&mut self, out: &mut Outbox) {
        let (step, effects) = ExpansionStep::start();
        self.apply_expansion_transition(ExpansionTransition::Continue { next: step, effects }, out);
    }

    /// Handles a status report outside the handshake: attachment changes
    /// start or tear down the expansion.
    pub fn handle_status(&mut self, status: StatusReport) -> Outbox {
        let mut out = Outbox::default();
        if !self.is_connected() {
            return out;
        }
        self.last_status = Some(status);
        out.events.push(WiimoteEvent::Status(status));

        if !self.handshake.is_complete() {
            return out;
        }

        let attached = status.expansion_attached();
        match (&self.expansion, attached) {
            (ExpansionSlot::Empty, true) => {
                info!("expansion attached");
                self.start_expansion_handshake(&mut out);
            }
            (ExpansionSlot::Present(state), false) => {
                let kind = state.kind();
                info!(?kind, "expansion removed");
                self.bump_epoch();
                self.expansion = ExpansionSlot::Empty;
                out.events.push(WiimoteEvent::ExpansionRemoved(kind));
                out.rederive_report_mode = true;
                out.push(self.ticket(Target::Status), Request::RequestStatus);
            }
            (ExpansionSlot::Handshaking(step), false) => {
                debug!(?step, "expansion unplugged mid-handshake");
                self.bump_epoch();
                self.expansion = ExpansionSlot::Empty;
            }
            (ExpansionSlot::Failed, false) => {
                self.expansion = ExpansionSlot::Empty;
            }
            _ => {}
        }
        out
    }

    /// Decodes a data report into the core buttons and the expansion.
    ///
    /// Returns `false` when the report was not a usable data report.
    pub fn handle_input(&mut self, report: &[u8]) -> bool {
        if !self.is_connected() {
            return false;
        }
        let Some(InputReport::Data {
            core_buttons,
            expansion,
            ..
        }) = classify(report)
        else {
            return false;
        };

        if let Some(pressed) = core_buttons {
            self.buttons.update(pressed);
        }
        if let (ExpansionSlot::Present(state), Some(payload)) = (&mut self.expansion, expansion) {
            state.apply_report(payload);
        }
        true
    }
}
