//! Register layout of the CV1800 USB PHY.
//!
//! Offsets are in bytes from the start of the `phy-reg` block, except for
//! [PIN_REG], which lives in the separately mapped `pin-reg` window.

/// UTMI override control.
pub const REG14: usize = 0x14;
/// Take the UTMI signals from this register instead of the controller.
pub const REG14_UTMI_OVERRIDE: u32 = 1 << 0;
/// UTMI operation mode.
pub const REG14_OPMODE_MASK: u32 = 0x3 << REG14_OPMODE_SHIFT;
/// Position of [REG14_OPMODE_MASK].
pub const REG14_OPMODE_SHIFT: u32 = 1;
/// UTMI transceiver select.
pub const REG14_XCVRSEL_MASK: u32 = 0x3 << REG14_XCVRSEL_SHIFT;
/// Position of [REG14_XCVRSEL_MASK].
pub const REG14_XCVRSEL_SHIFT: u32 = 3;
/// UTMI termination select.
pub const REG14_TERMSEL: u32 = 1 << 5;
/// D+ pull-down.
pub const REG14_DPPULLDOWN: u32 = 1 << 6;
/// D- pull-down.
pub const REG14_DMPULLDOWN: u32 = 1 << 7;
/// UTMI reset.
pub const REG14_UTMI_RESET: u32 = 1 << 8;

/// Battery-charger detection.
pub const REG20: usize = 0x20;
/// Battery-charger detection enable.
pub const REG20_BC_EN: u32 = 1 << 0;
/// Data contact detection enable.
pub const REG20_DCD_EN: u32 = 1 << 1;
/// D+ comparator enable.
pub const REG20_DP_CMP_EN: u32 = 1 << 2;
/// D- comparator enable.
pub const REG20_DM_CMP_EN: u32 = 1 << 3;
/// D+ voltage source enable.
pub const REG20_VDP_SRC_EN: u32 = 1 << 4;
/// D- voltage source enable.
pub const REG20_VDM_SRC_EN: u32 = 1 << 5;
/// A charging port was detected.
pub const REG20_CHG_DET: u32 = 1 << 16;
/// Data pin contact was detected.
pub const REG20_DP_DET: u32 = 1 << 17;

/// The role override register.
pub const PIN_REG: usize = 0;
/// Use [pin_id_overwrite_value] instead of the ID pin.
pub const PIN_ID_OVERWRITE_EN: u32 = 1 << 6;

/// The ID value forced by [PIN_ID_OVERWRITE_EN].
pub const fn pin_id_overwrite_value(role: u32) -> u32 {
    role << 7
}
