//! Button masks and press/hold/release edge tracking.

/// Core Wii Remote buttons (bytes 1..3 of most input reports, active-high).
pub mod core_buttons {
    pub const TWO: u16 = 0x0001;
    pub const ONE: u16 = 0x0002;
    pub const B: u16 = 0x0004;
    pub const A: u16 = 0x0008;
    pub const MINUS: u16 = 0x0010;
    pub const HOME: u16 = 0x0080;
    pub const LEFT: u16 = 0x0100;
    pub const RIGHT: u16 = 0x0200;
    pub const DOWN: u16 = 0x0400;
    pub const UP: u16 = 0x0800;
    pub const PLUS: u16 = 0x1000;
}

/// Mask of real buttons in the core word; the other bits carry accelerometer
/// LSBs.
pub const CORE_BUTTON_ALL: u16 = 0x1F9F;

/// Classic controller and Wii U Pro buttons, after inversion from the
/// active-low wire format.
pub mod classic_buttons {
    pub const UP: u16 = 0x0001;
    pub const LEFT: u16 = 0x0002;
    pub const ZR: u16 = 0x0004;
    pub const X: u16 = 0x0008;
    pub const A: u16 = 0x0010;
    pub const Y: u16 = 0x0020;
    pub const B: u16 = 0x0040;
    pub const ZL: u16 = 0x0080;
    pub const FULL_R: u16 = 0x0200;
    pub const PLUS: u16 = 0x0400;
    pub const HOME: u16 = 0x0800;
    pub const MINUS: u16 = 0x1000;
    pub const FULL_L: u16 = 0x2000;
    pub const DOWN: u16 = 0x4000;
    pub const RIGHT: u16 = 0x8000;
}

pub const CLASSIC_BUTTON_ALL: u16 = 0xFEFF;

/// Converts the active-low classic button word to pressed bits.
pub const fn classic_pressed_from_wire(raw: u16) -> u16 {
    !raw & CLASSIC_BUTTON_ALL
}

/// Held and released masks derived from two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonEdges {
    pub held: u16,
    pub released: u16,
}

/// Computes the edges for a new sample.
///
/// A button is held when it is pressed in both samples, and released when it
/// was pressed or held before and is up now.
pub const fn track_edges(previous_pressed: u16, previous_held: u16, now_pressed: u16) -> ButtonEdges {
    ButtonEdges {
        held: now_pressed & previous_pressed,
        released: (previous_pressed | previous_held) & !now_pressed,
    }
}

/// Button state of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub pressed: u16,
    pub held: u16,
    pub released: u16,
}

impl ButtonState {
    pub fn update(&mut self, now_pressed: u16) {
        let edges = track_edges(self.pressed, self.held, now_pressed);
        self.held = edges.held;
        self.released = edges.released;
        self.pressed = now_pressed;
    }

    pub fn is_pressed(&self, mask: u16) -> bool {
        self.pressed & mask == mask
    }

    /// Pressed in this sample but not the previous one.
    pub fn just_pressed(&self, mask: u16) -> bool {
        self.is_pressed(mask) && self.held & mask != mask
    }

    pub fn is_held(&self, mask: u16) -> bool {
        self.held & mask == mask
    }

    pub fn is_released(&self, mask: u16) -> bool {
        self.released & mask == mask
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
