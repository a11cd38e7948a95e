//! Expansion peripheral identification codes.
//!
//! The code is the big-endian `u32` stored at the end of the expansion
//! identification block (bytes 220..224 of the 224-byte handshake block read
//! from `0x04A40020`, or bytes 2..6 of the 6-byte block at `0x04A400FA`).
//!
//! Third-party classic controllers (Nyko Wing and unbranded clones) report
//! non-standard codes; they speak the classic controller wire format.

/// Known expansion ID codes.
pub mod expansion_ids {
    pub const NUNCHUK: u32 = 0xA420_0000;
    pub const CLASSIC_CONTROLLER: u32 = 0xA420_0101;
    pub const GUITAR: u32 = 0xA420_0103;
    pub const WIIU_PRO: u32 = 0xA420_0120;
    pub const BALANCE_BOARD: u32 = 0xA420_0402;
    pub const MOTION_PLUS: u32 = 0xA420_0405;
    pub const MOTION_PLUS_NUNCHUK: u32 = 0xA420_0505;
    pub const MOTION_PLUS_CLASSIC: u32 = 0xA420_0705;

    pub const CLASSIC_CONTROLLER_NYKOWING: u32 = 0x9090_8F00;
    pub const CLASSIC_CONTROLLER_NYKOWING2: u32 = 0x9E9F_9C00;
    pub const CLASSIC_CONTROLLER_NYKOWING3: u32 = 0x908F_8F00;
    pub const CLASSIC_CONTROLLER_GENERIC: u32 = 0xA5A2_A300;
    pub const CLASSIC_CONTROLLER_GENERIC2: u32 = 0x9899_9900;
    pub const CLASSIC_CONTROLLER_GENERIC3: u32 = 0xA0A1_A000;
    pub const CLASSIC_CONTROLLER_GENERIC4: u32 = 0x8D8D_8E00;
    pub const CLASSIC_CONTROLLER_GENERIC5: u32 = 0x9394_9400;

    /// Every code handled by the classic controller parser.
    pub const CLASSIC_FAMILY: [u32; 10] = [
        CLASSIC_CONTROLLER,
        CLASSIC_CONTROLLER_NYKOWING,
        CLASSIC_CONTROLLER_NYKOWING2,
        CLASSIC_CONTROLLER_NYKOWING3,
        CLASSIC_CONTROLLER_GENERIC,
        CLASSIC_CONTROLLER_GENERIC2,
        CLASSIC_CONTROLLER_GENERIC3,
        CLASSIC_CONTROLLER_GENERIC4,
        CLASSIC_CONTROLLER_GENERIC5,
        WIIU_PRO,
    ];
}

/// Returns `true` for codes spoken by the classic controller parser.
pub fn is_classic_family(id: u32) -> bool {
    expansion_ids::CLASSIC_FAMILY.contains(&id)
}
