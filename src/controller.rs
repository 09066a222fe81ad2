// SPDX-License-Identifier: Apache-2.0
//! Parameter state and bounds arithmetic, kept free of any bus dependency.
//!
//! [`ControllerState`] owns everything the driver knows about the sensor's
//! current configuration: which mode is active, the current vertical total,
//! and the powered/streaming flags. All of the range derivations live here as
//! pure functions of that state, so the arithmetic, including the coupling
//! between vertical blanking and the exposure ceiling, can be tested without
//! a bus or mock hardware.

use core::ops::RangeInclusive;

use crate::error::LibraryError;
use crate::mode::{Mode, LINK_FREQUENCIES, SUPPORTED_MODES, VTS_MAX};

/// The shortest exposure the sensor accepts, in rows.
pub const EXPOSURE_MIN: u32 = 8;

/// Rows the shutter must trail the frame length by.
pub const EXPOSURE_MARGIN: u32 = 4;

/// The frame must be at least this many rows taller than the readout.
/// (VMAX >= height + 46.)
pub const MIN_VERTICAL_MARGIN: u32 = 46;

pub const GAIN_MIN: u16 = 0x00;
pub const GAIN_MAX: u16 = 0xF0;

/// A single parameter update, validated and encoded per variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Control {
    /// Exposure time in rows. Bounded by the current vertical total, not
    /// just the mode default.
    Exposure(u32),

    /// Analog gain in 0.3 dB steps.
    AnalogGain(u16),

    /// Rows of vertical blanking appended to the readout.
    VerticalBlank(u32),

    /// Mirror the readout horizontally.
    HorizontalFlip(bool),

    /// Flip the readout vertically.
    VerticalFlip(bool),
}

/// The sensor configuration the driver believes is in effect.
#[derive(Clone, Debug)]
pub struct ControllerState {
    /// The active mode. Swapped wholesale on format changes, never mutated.
    mode: &'static Mode,

    /// Current vertical total in rows. Starts at the mode default and is
    /// re-derived whenever vertical blanking changes.
    vertical_total: u32,

    streaming: bool,
    powered: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::with_mode(&SUPPORTED_MODES[0])
    }

    pub fn with_mode(mode: &'static Mode) -> Self {
        Self {
            mode,
            vertical_total: mode.vts_def,
            streaming: false,
            powered: false,
        }
    }

    pub fn mode(&self) -> &'static Mode {
        self.mode
    }

    /// Rows per frame, including blanking.
    pub fn vertical_total(&self) -> u32 {
        self.vertical_total
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    pub(crate) fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    pub(crate) fn set_powered(&mut self, powered: bool) {
        self.powered = powered;
    }

    /// Swap the active mode and reset the vertical total to its default.
    ///
    /// Every derived bound (horizontal blank, vertical blank, exposure)
    /// changes with it.
    pub fn select_mode(&mut self, mode: &'static Mode) {
        self.mode = mode;
        self.vertical_total = mode.vts_def;
    }

    /// The legal exposure values for the current vertical total.
    ///
    /// Raising the vertical blanking widens this range immediately; lowering
    /// it tightens the range without clamping any previously applied
    /// exposure. A later exposure update that no longer fits is rejected
    /// until the caller picks a value inside the new bound.
    pub fn exposure_range(&self) -> RangeInclusive<u32> {
        EXPOSURE_MIN..=self.vertical_total - EXPOSURE_MARGIN
    }

    /// The legal vertical blanking values for the current mode.
    pub fn vblank_range(&self) -> RangeInclusive<u32> {
        MIN_VERTICAL_MARGIN..=VTS_MAX - self.mode.height
    }

    /// The default vertical blanking for the current mode.
    pub fn vblank_default(&self) -> u32 {
        self.mode.vts_def - self.mode.height
    }

    /// Horizontal blanking is fixed by the mode's horizontal total.
    pub fn horizontal_blank(&self) -> u32 {
        self.mode.hts_def - self.mode.width
    }

    pub fn gain_range(&self) -> RangeInclusive<u16> {
        GAIN_MIN..=GAIN_MAX
    }

    /// Validate a vertical blanking value and derive the new vertical total
    /// from it.
    pub(crate) fn apply_vertical_blank(&mut self, vblank: u32) -> Result<u32, LibraryError> {
        let range = self.vblank_range();
        if !range.contains(&vblank) {
            return Err(LibraryError::OutOfRange {
                value: vblank,
                min: *range.start(),
                max: *range.end(),
            });
        }
        self.vertical_total = vblank + self.mode.height;
        Ok(self.vertical_total)
    }

    /// Validate an exposure value and convert it to the shutter register
    /// encoding.
    ///
    /// The sensor wants rows-from-readout (SHR0), not an absolute row count,
    /// so the register value is the distance from the frame length.
    pub(crate) fn shutter_from_exposure(&self, exposure: u32) -> Result<u32, LibraryError> {
        let range = self.exposure_range();
        if !range.contains(&exposure) {
            return Err(LibraryError::OutOfRange {
                value: exposure,
                min: *range.start(),
                max: *range.end(),
            });
        }
        Ok(self.vertical_total - exposure)
    }

    pub(crate) fn validate_gain(&self, gain: u16) -> Result<u16, LibraryError> {
        let range = self.gain_range();
        if !range.contains(&gain) {
            return Err(LibraryError::OutOfRange {
                value: gain as u32,
                min: *range.start() as u32,
                max: *range.end() as u32,
            });
        }
        Ok(gain)
    }

    /// pixel rate = link_freq * 2 * nr_of_lanes / bits_per_sample
    pub fn pixel_rate(&self, lanes: u8) -> u64 {
        LINK_FREQUENCIES[self.mode.link_freq_index] * 2 * lanes as u64 / self.mode.bpp as u64
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_track_the_first_mode() {
        let state = ControllerState::new();
        assert_eq!(state.vertical_total(), state.mode().vts_def);
        assert!(!state.streaming());
        assert!(!state.powered());
    }

    #[test]
    fn vblank_updates_vertical_total() {
        let mut state = ControllerState::new();
        let height = state.mode().height;
        for vblank in [46, 108, 1000, VTS_MAX - height] {
            let vts = state.apply_vertical_blank(vblank).unwrap();
            assert_eq!(vts, vblank + height);
            assert_eq!(state.vertical_total(), vblank + height);
        }
    }

    #[test]
    fn vblank_outside_bounds_is_rejected() {
        let mut state = ControllerState::new();
        let height = state.mode().height;
        let before = state.vertical_total();
        assert!(matches!(
            state.apply_vertical_blank(45),
            Err(LibraryError::OutOfRange { min: 46, .. })
        ));
        assert!(state.apply_vertical_blank(VTS_MAX - height + 1).is_err());
        // Rejected updates must not move the vertical total.
        assert_eq!(state.vertical_total(), before);
    }

    #[test]
    fn exposure_encodes_as_rows_from_readout() {
        let state = ControllerState::new();
        let vts = state.vertical_total();
        for exposure in [EXPOSURE_MIN, 0x100, vts - EXPOSURE_MARGIN] {
            assert_eq!(state.shutter_from_exposure(exposure).unwrap(), vts - exposure);
        }
    }

    #[test]
    fn exposure_bound_follows_vertical_total() {
        let mut state = ControllerState::new();
        let height = state.mode().height;
        let default_max = *state.exposure_range().end();

        // Raising the blanking widens the ceiling without any exposure write.
        state.apply_vertical_blank(state.vblank_default() + 500).unwrap();
        assert_eq!(*state.exposure_range().end(), default_max + 500);

        // And lowering it tightens the ceiling again.
        state.apply_vertical_blank(46).unwrap();
        assert_eq!(
            *state.exposure_range().end(),
            height + 46 - EXPOSURE_MARGIN
        );
    }

    #[test]
    fn stale_exposure_is_rejected_not_clamped() {
        let mut state = ControllerState::new();
        let exposure = *state.exposure_range().end();
        assert!(state.shutter_from_exposure(exposure).is_ok());
        // Shrink the frame; the same exposure value must now fail validation
        // instead of being silently clamped.
        state.apply_vertical_blank(46).unwrap();
        assert!(matches!(
            state.shutter_from_exposure(exposure),
            Err(LibraryError::OutOfRange { .. })
        ));
    }

    #[test]
    fn gain_bounds() {
        let state = ControllerState::new();
        assert_eq!(state.validate_gain(0xF0).unwrap(), 0xF0);
        assert_eq!(state.validate_gain(0x00).unwrap(), 0x00);
        assert!(matches!(
            state.validate_gain(0xF1),
            Err(LibraryError::OutOfRange { value: 0xF1, .. })
        ));
    }

    #[test]
    fn horizontal_blank_is_mode_derived() {
        let state = ControllerState::new();
        let mode = state.mode();
        assert_eq!(state.horizontal_blank(), mode.hts_def - mode.width);
    }

    #[test]
    fn pixel_rate_truncates() {
        let state = ControllerState::new();
        // 891 MHz * 2 * 4 lanes / 10 bpp
        assert_eq!(state.pixel_rate(4), 712_800_000);
        assert_eq!(state.pixel_rate(2), 356_400_000);
    }
}
