// SPDX-License-Identifier: Apache-2.0
//! A pure-Rust control driver for the Sony IMX415 CMOS image sensor.
//!
//! The IMX415 is configured over a two-wire bus: a 16-bit register space of
//! 8-bit values, with the wider logical quantities (exposure, gain, frame
//! length) split across several registers each with their own layout. This
//! crate maps a small set of abstract imaging parameters (format, exposure
//! time, analog gain, blanking, mirror/flip) onto the exact register
//! sequences the sensor wants, and sequences power-up, chip identification,
//! mode programming, and the standby/streaming toggle.
//!
//! The bus is consumed through the [`embedded-hal`][embedded-hal] blocking
//! I²C traits, so the driver runs anywhere an implementation of those traits
//! exists, and the crate is `no_std` compatible. The platform side (clock
//! source, supply rails, reset line) is injected through the
//! [`SensorResources`] trait; how those are wired to hardware is the
//! caller's business.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/i2c/index.html
//!
//! # Bringing a sensor up
//! ```no_run
//! use imx415::{Config, Control, Imx415};
//! # use imx415::{PowerError, SensorResources};
//! use linux_embedded_hal::{Delay, I2cdev};
//! # struct BoardResources;
//! # impl SensorResources for BoardResources {
//! #     fn enable_clock(&mut self) -> Result<(), PowerError> { Ok(()) }
//! #     fn disable_clock(&mut self) {}
//! #     fn enable_regulators(&mut self) -> Result<(), PowerError> { Ok(()) }
//! #     fn disable_regulators(&mut self) {}
//! #     fn assert_reset(&mut self) {}
//! #     fn deassert_reset(&mut self) {}
//! # }
//! # let board_resources = BoardResources;
//!
//! let bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! let config = Config { data_lanes: 4, xclk_hz: 37_125_000 };
//! // 0x1A is the usual address for this sensor.
//! let mut sensor = Imx415::new(bus, 0x1A, config, board_resources, Delay)?;
//! sensor.power_on()?;
//! sensor.start_streaming()?;
//! sensor.apply(Control::Exposure(0x400))?;
//! # Ok::<(), imx415::Error<I2cdev>>(())
//! ```
//! Power-on enables the clock and the supply rails, releases reset, latches
//! the lane count, and verifies the chip ID; a sensor that doesn't answer
//! with the right ID is powered back off. The first streaming start uploads
//! the mode's register program; stopping and restarting afterwards only
//! toggles standby.
//!
//! # Parameters and bounds
//! Parameter updates go through [`Imx415::apply`] (or the `set_*`
//! conveniences wrapping it). Each value is validated against the bound
//! derived from the active mode *and* the current frame length before
//! anything touches the bus. The bounds are coupled: raising vertical
//! blanking lengthens the frame and immediately widens the legal exposure
//! range, while shrinking it tightens the range without rewriting a
//! previously applied exposure; a stale value simply fails validation on
//! its next update.
//!
//! Updates that should land on the same frame boundary can be wrapped in
//! [`Imx415::with_group_hold`], which holds the sensor's register latch for
//! the duration of the closure and always releases it, even on failure.
//!
//! # Modes
//! Supported sensor modes live in a static catalog ([`SUPPORTED_MODES`]);
//! format negotiation picks the entry closest to the requested geometry
//! among those matching the requested media-bus code, falling back to the
//! first entry when nothing matches. See [`mode`] for the catalog and
//! [`register`] for the low-level register map and value codec.

#![no_std]

pub mod controller;
pub mod driver;
pub mod error;
pub mod mode;
pub mod power;
pub mod register;
#[cfg(test)]
mod test;

pub use controller::{Control, ControllerState};
pub use driver::Imx415;
pub use error::{Error, LibraryError};
pub use mode::{
    find_best_fit, modes, FormatRequest, Fraction, FrameFormat, MbusCode, Mode, SUPPORTED_MODES,
};
pub use power::{Config, DataLanes, PowerError, PowerState, SensorResources};
