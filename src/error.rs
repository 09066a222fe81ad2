// SPDX-License-Identifier: Apache-2.0
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use embedded_hal::blocking::i2c;

use crate::power::PowerError;

/// Errors that don't involve the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryError {
    /// A control value fell outside the currently valid bound.
    ///
    /// The bound is recomputed whenever the active mode or the vertical total
    /// changes, so a value that was accepted earlier can be rejected later.
    OutOfRange { value: u32, min: u32, max: u32 },

    /// The chip identification register did not contain the expected value.
    IdentityMismatch { expected: u8, found: u8 },

    /// The codec was asked to encode or decode an unsupported byte width.
    InvalidLength(usize),

    /// A configuration value the sensor cannot support.
    UnsupportedConfiguration(&'static str),

    /// The platform failed to bring up a power resource.
    PowerSequence(PowerError),
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::OutOfRange { value, min, max } => {
                write!(f, "value {} outside the valid range {}..={}", value, min, max)
            }
            LibraryError::IdentityMismatch { expected, found } => {
                write!(f, "chip id mismatch: {:#04X} != {:#04X}", found, expected)
            }
            LibraryError::InvalidLength(len) => {
                write!(f, "{} is not a valid register value width", len)
            }
            LibraryError::UnsupportedConfiguration(msg) => write!(f, "{}", msg),
            LibraryError::PowerSequence(err) => write!(f, "power sequencing failed: {:?}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LibraryError {}

impl From<PowerError> for LibraryError {
    fn from(err: PowerError) -> Self {
        Self::PowerSequence(err)
    }
}

pub enum Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    /// A plain write transaction failed.
    I2cWriteError(<I2C as i2c::Write>::Error),

    /// A combined write-read transaction failed.
    I2cWriteReadError(<I2C as i2c::WriteRead>::Error),

    /// Errors originating from within this library.
    LibraryError(LibraryError),
}

// Custom Debug implementation so that I2C doesn't need to implement Debug (like the one from
// linux-embedded-hal).
impl<I2C> fmt::Debug for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteError(i2c_error) => f
                .debug_tuple("Error::I2cWriteError")
                .field(i2c_error)
                .finish(),
            Error::I2cWriteReadError(i2c_error) => f
                .debug_tuple("Error::I2cWriteReadError")
                .field(i2c_error)
                .finish(),
            Error::LibraryError(err) => f.debug_tuple("Error::LibraryError").field(err).finish(),
        }
    }
}

impl<I2C> fmt::Display for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteError(i2c_error) => write!(f, "I2C Write Error: {:?}", i2c_error),
            Error::I2cWriteReadError(i2c_error) => {
                write!(f, "I2C WriteRead Error: {:?}", i2c_error)
            }
            Error::LibraryError(err) => write!(f, "Library Error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<I2C> std::error::Error for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: std::error::Error + 'static,
    <I2C as i2c::Write>::Error: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::I2cWriteError(i2c_error) => Some(i2c_error),
            Error::I2cWriteReadError(i2c_error) => Some(i2c_error),
            Error::LibraryError(lib_err) => Some(lib_err),
        }
    }
}

impl<I2C> From<LibraryError> for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    fn from(lib_err: LibraryError) -> Self {
        Self::LibraryError(lib_err)
    }
}

impl<I2C> From<PowerError> for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    fn from(err: PowerError) -> Self {
        Self::LibraryError(LibraryError::PowerSequence(err))
    }
}
