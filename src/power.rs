// SPDX-License-Identifier: Apache-2.0
//! Power sequencing types and the platform resource seam.
//!
//! The driver does not know how the sensor's clock, supply rails, or reset
//! line are wired; it only asks for them through [`SensorResources`]. The
//! sequencing itself (which resource comes up when, and what happens when
//! one fails) lives in [`crate::driver`].

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Discrete states of the power/streaming sequencer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerState {
    /// Unpowered. The only state a detached device can be in.
    Off,

    /// Clock, rails, and reset are being brought up.
    Powering,

    /// Powered and chip identification has passed; no mode program uploaded
    /// yet.
    Identified,

    /// Mode program uploaded, sensor parked in software standby.
    Standby,

    /// Actively producing frames.
    Streaming,

    /// An unrecoverable bus failure happened mid-sequence. The register
    /// state of the device is indeterminate; the only way out is
    /// [`power_off`](crate::Imx415::power_off).
    Fault,
}

/// Failures raised by the platform resource collaborator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerError {
    /// The external clock could not be enabled.
    Clock,

    /// One or more supply rails failed to come up.
    Regulators,
}

/// The platform resources backing one attached sensor.
///
/// Enabling the regulators is all-or-nothing: either every rail comes up or
/// the implementation reports [`PowerError::Regulators`] with all rails back
/// off. The disable and reset operations have no failure path the driver
/// could observe, so they are infallible here.
pub trait SensorResources {
    fn enable_clock(&mut self) -> Result<(), PowerError>;

    fn disable_clock(&mut self);

    fn enable_regulators(&mut self) -> Result<(), PowerError>;

    fn disable_regulators(&mut self);

    fn assert_reset(&mut self);

    fn deassert_reset(&mut self);
}

/// MIPI data-lane configurations the sensor supports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DataLanes {
    Two = 2,
    Four = 4,
}

impl DataLanes {
    /// The value latched into the lane-mode register.
    pub(crate) fn register_value(self) -> u8 {
        match self {
            Self::Two => 0x01,
            Self::Four => 0x03,
        }
    }
}

/// External clock rates the sensor accepts.
pub const SUPPORTED_XCLK_HZ: [u32; 2] = [37_125_000, 74_250_000];

/// Static platform description, validated when the driver is created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Number of CSI-2 data lanes wired up; 2 or 4.
    pub data_lanes: u8,

    /// External clock rate in Hz; must be one of [`SUPPORTED_XCLK_HZ`].
    pub xclk_hz: u32,
}
