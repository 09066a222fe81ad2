// SPDX-License-Identifier: Apache-2.0
//! The IMX415 register map and the value codec.
//!
//! The sensor exposes a 16-bit register address space holding 8-bit values.
//! Logical quantities wider than a byte (exposure, gain, frame length) are
//! split over two or three one-byte registers, and each quantity has its own
//! fixed layout; there is no single rule covering all of them. The split
//! functions in this module encode those layouts, and [`encode`]/[`decode`]
//! cover the plain big-endian case used for values living at consecutive
//! addresses.
//!
//! Nothing in this module touches the bus. Everything is a pure
//! transformation, so the arithmetic can be tested without hardware.

use core::fmt;

use arrayvec::ArrayVec;

use crate::error::LibraryError;

/// Marker newtype for addresses in the sensor's register space.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct Address(u16);

impl Address {
    /// Wrap the given address in an `Address`.
    ///
    /// This function is intended to be used in const contexts, in other cases
    /// the [`From`][core::convert::From] implementations are probably easier
    /// to use.
    pub const fn new(address: u16) -> Self {
        Self(address)
    }

    /// The address as it is sent on the wire, most significant byte first.
    pub(crate) fn as_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#X})", self.0)
    }
}

impl From<u16> for Address {
    fn from(raw_address: u16) -> Self {
        Self::new(raw_address)
    }
}

impl From<Address> for u16 {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// One entry of a register program.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegVal {
    pub addr: Address,
    pub val: u8,
}

impl RegVal {
    pub const fn new(addr: u16, val: u8) -> Self {
        Self {
            addr: Address::new(addr),
            val,
        }
    }
}

/// Sentinel address terminating a register program.
pub const REG_NULL: Address = Address::new(0xFFFF);

/// Chip identification register. Reads back [`CHIP_ID_VALUE`] on a live
/// sensor.
pub const CHIP_ID: Address = Address::new(0x311A);
pub const CHIP_ID_VALUE: u8 = 0xE0;

/// Standby control. `1` parks the sensor in software standby, `0` starts
/// streaming.
pub const STANDBY: Address = Address::new(0x3000);
pub const STANDBY_ON: u8 = 0x01;
pub const STANDBY_OFF: u8 = 0x00;

/// Register-hold latch. Writes performed while the latch is held take effect
/// together on the next frame boundary.
pub const GROUP_HOLD: Address = Address::new(0x3001);
pub const GROUP_HOLD_START: u8 = 0x01;
pub const GROUP_HOLD_END: u8 = 0x00;

/// Master-mode start/stop.
pub const XMSTA: Address = Address::new(0x3002);
pub const XMSTA_START: u8 = 0x00;
pub const XMSTA_STOP: u8 = 0x01;

/// MIPI lane configuration, verified by read-back after power-on.
pub const LANE_MODE: Address = Address::new(0x4001);

/// Long-frame analog gain, 11 bits split low byte / high three bits.
pub const GAIN_LOW: Address = Address::new(0x3090);
pub const GAIN_HIGH: Address = Address::new(0x3091);

/// Long-frame shutter (SHR0), 20 bits over three registers.
pub const EXPOSURE_LOW: Address = Address::new(0x3050);
pub const EXPOSURE_MID: Address = Address::new(0x3051);
pub const EXPOSURE_HIGH: Address = Address::new(0x3052);

// Second-exposure registers for the sensor's HDR readout. Linear modes leave
// them at their reset values.
pub const SF1_GAIN_LOW: Address = Address::new(0x3092);
pub const SF1_GAIN_HIGH: Address = Address::new(0x3093);
pub const SF1_EXPOSURE_LOW: Address = Address::new(0x3054);
pub const SF1_EXPOSURE_MID: Address = Address::new(0x3055);
pub const SF1_EXPOSURE_HIGH: Address = Address::new(0x3056);
pub const RHS1_LOW: Address = Address::new(0x3060);
pub const RHS1_MID: Address = Address::new(0x3061);
pub const RHS1_HIGH: Address = Address::new(0x3062);
pub const RHS1_DEFAULT: u32 = 0x004D;

/// Vertical total (VMAX): rows per frame including blanking.
pub const VTS_LOW: Address = Address::new(0x3024);
pub const VTS_MID: Address = Address::new(0x3025);
pub const VTS_HIGH: Address = Address::new(0x3026);

/// Horizontal total (HMAX).
pub const HTS_LOW: Address = Address::new(0x3028);
pub const HTS_HIGH: Address = Address::new(0x3029);

/// Readout direction register: bit 0 mirrors horizontally, bit 1 flips
/// vertically. Updated read-modify-write, never written blind.
pub const FLIP_MIRROR: Address = Address::new(0x3030);
pub const MIRROR_MASK: u8 = 1 << 0;
pub const FLIP_MASK: u8 = 1 << 1;

/// The widest value a single transaction can carry.
pub(crate) const MAX_VALUE_BYTES: usize = 4;

/// Split a logical value into the bytes written to `len` consecutive
/// registers, most significant byte first.
///
/// Fails with [`LibraryError::InvalidLength`] when `len` is zero or wider
/// than [the transaction limit](MAX_VALUE_BYTES).
pub fn encode(value: u32, len: usize) -> Result<ArrayVec<u8, MAX_VALUE_BYTES>, LibraryError> {
    if len == 0 || len > MAX_VALUE_BYTES {
        return Err(LibraryError::InvalidLength(len));
    }
    let be = value.to_be_bytes();
    let mut bytes = ArrayVec::new();
    bytes.extend(be[MAX_VALUE_BYTES - len..].iter().copied());
    Ok(bytes)
}

/// Reassemble a big-endian-interpreted unsigned value from up to four bytes
/// read off consecutive registers. The inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> Result<u32, LibraryError> {
    if bytes.is_empty() || bytes.len() > MAX_VALUE_BYTES {
        return Err(LibraryError::InvalidLength(bytes.len()));
    }
    let mut be = [0u8; MAX_VALUE_BYTES];
    be[MAX_VALUE_BYTES - bytes.len()..].copy_from_slice(bytes);
    Ok(u32::from_be_bytes(be))
}

/// The three writes programming a shutter (SHR0) value.
///
/// Low and middle bytes are full bytes; the topmost register only latches a
/// nibble.
pub fn shutter_writes(shr0: u32) -> [RegVal; 3] {
    [
        RegVal {
            addr: EXPOSURE_LOW,
            val: (shr0 & 0xFF) as u8,
        },
        RegVal {
            addr: EXPOSURE_MID,
            val: ((shr0 >> 8) & 0xFF) as u8,
        },
        RegVal {
            addr: EXPOSURE_HIGH,
            val: ((shr0 >> 16) & 0x0F) as u8,
        },
    ]
}

/// The three writes programming a vertical total (VMAX), same nibble-masked
/// high byte as the shutter.
pub fn vertical_total_writes(vts: u32) -> [RegVal; 3] {
    [
        RegVal {
            addr: VTS_LOW,
            val: (vts & 0xFF) as u8,
        },
        RegVal {
            addr: VTS_MID,
            val: ((vts >> 8) & 0xFF) as u8,
        },
        RegVal {
            addr: VTS_HIGH,
            val: ((vts >> 16) & 0x0F) as u8,
        },
    ]
}

/// The two writes programming the long-frame analog gain: three high bits,
/// then a full low byte.
pub fn gain_writes(gain: u16) -> [RegVal; 2] {
    [
        RegVal {
            addr: GAIN_HIGH,
            val: ((gain >> 8) & 0x07) as u8,
        },
        RegVal {
            addr: GAIN_LOW,
            val: (gain & 0xFF) as u8,
        },
    ]
}
