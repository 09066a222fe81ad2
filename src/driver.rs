// SPDX-License-Identifier: Apache-2.0

use core::convert::TryFrom;
use core::ops::RangeInclusive;

use arrayvec::ArrayVec;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c;
use log::{debug, error, warn};
use paste::paste;

use crate::controller::{Control, ControllerState};
use crate::error::{Error, LibraryError};
use crate::mode::{
    find_best_fit, FormatRequest, Fraction, FrameFormat, Rect, COMMON_REGS, LINK_FREQUENCIES,
    NATIVE_SIZE, PIXEL_ARRAY,
};
use crate::power::{Config, DataLanes, PowerState, SensorResources, SUPPORTED_XCLK_HZ};
use crate::register::{self, Address, RegVal, MAX_VALUE_BYTES, REG_NULL};

/// Settle time between the rails coming up and releasing reset.
const REGULATOR_SETTLE_US: u32 = 2;

/// Reset release to first transaction.
const RESET_SETTLE_US: u32 = 30_000;

/// DRY macro for the set_* conveniences wrapping [`Imx415::apply`].
macro_rules! control_setter {
    { $field:ident, $variant:ident, $typ:ty, $doc:literal } => {
        paste! {
            #[doc = $doc]
            pub fn [< set_ $field >](&mut self, value: $typ) -> Result<(), Error<I2C>> {
                self.apply(Control::$variant(value))
            }
        }
    };
}

/// Control driver for the Sony IMX415 CMOS image sensor.
///
/// The driver translates the abstract imaging parameters (format, exposure,
/// gain, blanking, flips) into the sensor's register programming, and
/// sequences power, identification, and the standby/streaming toggle. The
/// bus and the platform resources are injected; nothing here knows how they
/// are wired.
///
/// Every operation takes `&mut self`, so one driver value is one exclusive
/// claim on the sensor: writes belonging to one logical operation are never
/// interleaved with another's.
pub struct Imx415<I2C, R, D> {
    /// The I²C bus the sensor is accessible on.
    bus: I2C,

    /// The I²C address the sensor is accessible at.
    address: u8,

    /// Platform clock, supply-rail, and reset plumbing.
    resources: R,

    /// Delay provider for the fixed power-on settle times.
    delay: D,

    /// Number of CSI-2 data lanes wired to the receiver.
    lanes: DataLanes,

    /// Parameter state and bounds arithmetic.
    state: ControllerState,

    /// Where the power/streaming sequencer currently is.
    power_state: PowerState,
}

impl<I2C, R, D> Imx415<I2C, R, D>
where
    I2C: i2c::WriteRead + i2c::Write,
    R: SensorResources,
    D: DelayUs<u32>,
{
    /// Create a driver for the sensor at the given I²C address.
    ///
    /// The platform [`Config`] is validated here: unsupported lane counts and
    /// external clock rates are rejected with
    /// [`UnsupportedConfiguration`][LibraryError::UnsupportedConfiguration]
    /// before any hardware is touched.
    pub fn new(
        bus: I2C,
        address: u8,
        config: Config,
        resources: R,
        delay: D,
    ) -> Result<Self, Error<I2C>> {
        let lanes = DataLanes::try_from(config.data_lanes).map_err(|_| {
            LibraryError::UnsupportedConfiguration("data lane count must be 2 or 4")
        })?;
        if !SUPPORTED_XCLK_HZ.contains(&config.xclk_hz) {
            return Err(LibraryError::UnsupportedConfiguration(
                "external clock must be 37.125 MHz or 74.25 MHz",
            )
            .into());
        }
        Ok(Self {
            bus,
            address,
            resources,
            delay,
            lanes,
            state: ControllerState::new(),
            power_state: PowerState::Off,
        })
    }

    /// The current position of the power/streaming sequencer.
    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    /// Read access to the parameter state and its derived bounds.
    pub fn controller(&self) -> &ControllerState {
        &self.state
    }

    /// Bring the sensor up and verify its identity.
    ///
    /// The sequence is clock, supply rails (all-or-nothing; a failed rail
    /// takes the clock back down), reset release after the fixed settle
    /// times, lane configuration, then the chip-ID check. A wrong chip ID
    /// powers the device back off and fails with
    /// [`IdentityMismatch`][LibraryError::IdentityMismatch]; no mode-program
    /// registers are ever written on that path. Calling this while powered is
    /// a no-op.
    pub fn power_on(&mut self) -> Result<(), Error<I2C>> {
        if self.state.powered() {
            return Ok(());
        }
        self.power_state = PowerState::Powering;
        if let Err(err) = self.resources.enable_clock() {
            self.power_state = PowerState::Off;
            return Err(err.into());
        }
        if let Err(err) = self.resources.enable_regulators() {
            self.resources.disable_clock();
            self.power_state = PowerState::Off;
            return Err(err.into());
        }
        self.delay.delay_us(REGULATOR_SETTLE_US);
        self.resources.deassert_reset();
        self.delay.delay_us(RESET_SETTLE_US);
        self.state.set_powered(true);
        debug!("power on");

        if let Err(err) = self.configure_data_lanes() {
            self.power_off();
            return Err(err);
        }
        if let Err(err) = self.identify() {
            self.power_off();
            return Err(err);
        }
        self.power_state = PowerState::Identified;
        Ok(())
    }

    /// Power the sensor down.
    ///
    /// Reset is asserted, then the rails and the clock are dropped. Safe to
    /// call from any state, including [`Fault`][PowerState::Fault], and
    /// always succeeds at the software level.
    pub fn power_off(&mut self) {
        self.resources.assert_reset();
        self.resources.disable_regulators();
        self.resources.disable_clock();
        self.state.set_streaming(false);
        self.state.set_powered(false);
        self.power_state = PowerState::Off;
        debug!("power off");
    }

    /// Latch the lane count and verify it by read-back.
    ///
    /// A read-back mismatch is logged but not fatal; only a failed
    /// transaction aborts power-on.
    fn configure_data_lanes(&mut self) -> Result<(), Error<I2C>> {
        let value = self.lanes.register_value();
        write_reg(&mut self.bus, self.address, register::LANE_MODE, 1, value as u32)?;
        let readback = read_reg(&mut self.bus, self.address, register::LANE_MODE, 1)?;
        if readback != value as u32 {
            warn!(
                "lane mode read back {:#04x}, expected {:#04x}",
                readback, value
            );
        } else {
            debug!("lane mode set to {:#04x}", value);
        }
        Ok(())
    }

    /// Verify the chip identification register.
    fn identify(&mut self) -> Result<(), Error<I2C>> {
        let found = read_reg(&mut self.bus, self.address, register::CHIP_ID, 1)? as u8;
        if found != register::CHIP_ID_VALUE {
            error!(
                "chip id mismatch: {:#04x} != {:#04x}",
                found,
                register::CHIP_ID_VALUE
            );
            return Err(LibraryError::IdentityMismatch {
                expected: register::CHIP_ID_VALUE,
                found,
            }
            .into());
        }
        debug!("chip id match: {:#04x}", found);
        Ok(())
    }

    /// Start producing frames.
    ///
    /// Powers the sensor on first if needed, uploads the common and per-mode
    /// register programs when they haven't been uploaded yet, then releases
    /// standby. Calling this while already streaming returns success without
    /// touching the bus. A transaction failure mid-upload aborts immediately
    /// and leaves the already-written registers in place; the sequencer
    /// parks in [`Fault`][PowerState::Fault] until the device is power
    /// cycled.
    pub fn start_streaming(&mut self) -> Result<(), Error<I2C>> {
        if self.state.streaming() {
            return Ok(());
        }
        if !self.state.powered() {
            self.power_on()?;
        }
        if self.power_state == PowerState::Identified {
            self.upload_mode_program()?;
        }
        match write_reg(
            &mut self.bus,
            self.address,
            register::STANDBY,
            1,
            register::STANDBY_OFF as u32,
        ) {
            Ok(()) => {
                self.state.set_streaming(true);
                self.power_state = PowerState::Streaming;
                let mode = self.state.mode();
                debug!(
                    "streaming {}x{}, bpp: {}",
                    mode.width, mode.height, mode.bpp
                );
                Ok(())
            }
            Err(err) => {
                self.power_state = PowerState::Fault;
                Err(err)
            }
        }
    }

    /// Park the sensor in software standby.
    ///
    /// A no-op (returning success) when the sensor isn't streaming.
    pub fn stop_streaming(&mut self) -> Result<(), Error<I2C>> {
        if !self.state.streaming() {
            return Ok(());
        }
        match write_reg(
            &mut self.bus,
            self.address,
            register::STANDBY,
            1,
            register::STANDBY_ON as u32,
        ) {
            Ok(()) => {
                self.state.set_streaming(false);
                self.power_state = PowerState::Standby;
                Ok(())
            }
            Err(err) => {
                self.power_state = PowerState::Fault;
                Err(err)
            }
        }
    }

    /// Upload the common program and the active mode's program, then enter
    /// standby.
    fn upload_mode_program(&mut self) -> Result<(), Error<I2C>> {
        let mode = self.state.mode();
        debug!("uploading mode program: {}x{}", mode.width, mode.height);
        let result = (|| {
            write_array(&mut self.bus, self.address, COMMON_REGS)?;
            write_array(&mut self.bus, self.address, mode.reg_list)?;
            write_reg(
                &mut self.bus,
                self.address,
                register::STANDBY,
                1,
                register::STANDBY_ON as u32,
            )
        })();
        match result {
            Ok(()) => {
                self.power_state = PowerState::Standby;
                Ok(())
            }
            Err(err) => {
                // Registers written before the failure stay written; the
                // device holds a partial program until it is power cycled.
                self.power_state = PowerState::Fault;
                Err(err)
            }
        }
    }

    /// Validate and apply a single parameter update.
    ///
    /// Validation and bound propagation always run; the register writes are
    /// only issued while the sensor is powered. An
    /// [`OutOfRange`][LibraryError::OutOfRange] value is rejected before any
    /// bus access, so a failed update never leaves a partial write behind.
    pub fn apply(&mut self, control: Control) -> Result<(), Error<I2C>> {
        match control {
            Control::VerticalBlank(vblank) => {
                // The new vertical total moves the exposure ceiling even
                // when the device is off.
                let vts = self.state.apply_vertical_blank(vblank)?;
                if !self.state.powered() {
                    return Ok(());
                }
                debug!("set vblank {} (vertical total {})", vblank, vts);
                self.write_values(&register::vertical_total_writes(vts))
            }
            Control::Exposure(exposure) => {
                let shr0 = self.state.shutter_from_exposure(exposure)?;
                if !self.state.powered() {
                    return Ok(());
                }
                debug!("set exposure {} (shr0 {})", exposure, shr0);
                self.write_values(&register::shutter_writes(shr0))
            }
            Control::AnalogGain(gain) => {
                let gain = self.state.validate_gain(gain)?;
                if !self.state.powered() {
                    return Ok(());
                }
                debug!("set analog gain {:#x}", gain);
                self.write_values(&register::gain_writes(gain))
            }
            Control::HorizontalFlip(enable) => {
                self.update_flip_bits(register::MIRROR_MASK, enable)
            }
            Control::VerticalFlip(enable) => self.update_flip_bits(register::FLIP_MASK, enable),
        }
    }

    control_setter! { exposure, Exposure, u32, "Set the exposure time in rows." }
    control_setter! { analog_gain, AnalogGain, u16, "Set the analog gain." }
    control_setter! { vertical_blank, VerticalBlank, u32, "Set the vertical blanking in rows." }
    control_setter! { horizontal_flip, HorizontalFlip, bool, "Mirror the readout horizontally." }
    control_setter! { vertical_flip, VerticalFlip, bool, "Flip the readout vertically." }

    /// Read-modify-write of one bit in the flip/mirror register.
    ///
    /// The exclusive borrow on the driver is what keeps the two bus
    /// transactions atomic. When the read fails the register is left
    /// unmodified.
    fn update_flip_bits(&mut self, mask: u8, enable: bool) -> Result<(), Error<I2C>> {
        if !self.state.powered() {
            return Ok(());
        }
        let current = read_reg(&mut self.bus, self.address, register::FLIP_MIRROR, 1)? as u8;
        let updated = if enable {
            current | mask
        } else {
            current & !mask
        };
        write_reg(
            &mut self.bus,
            self.address,
            register::FLIP_MIRROR,
            1,
            updated as u32,
        )
    }

    /// Run a sequence of updates under the sensor's register-hold latch, so
    /// they take effect on the same frame boundary.
    ///
    /// The latch is released even when the inner sequence fails; the inner
    /// error wins over a failed release.
    pub fn with_group_hold<T, F>(&mut self, f: F) -> Result<T, Error<I2C>>
    where
        F: FnOnce(&mut Self) -> Result<T, Error<I2C>>,
    {
        write_reg(
            &mut self.bus,
            self.address,
            register::GROUP_HOLD,
            1,
            register::GROUP_HOLD_START as u32,
        )?;
        let result = f(self);
        let release = write_reg(
            &mut self.bus,
            self.address,
            register::GROUP_HOLD,
            1,
            register::GROUP_HOLD_END as u32,
        );
        match (result, release) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
        }
    }

    /// Negotiate the closest supported mode for the requested format and
    /// make it active.
    ///
    /// The answer is the format actually selected; when no mode matches the
    /// requested media-bus code, the first catalog entry is used, so callers
    /// must re-check the returned code. Activating a mode resets the
    /// vertical total (and with it every derived bound) to the mode's
    /// defaults.
    pub fn set_format(&mut self, request: &FormatRequest) -> FrameFormat {
        let mode = find_best_fit(request);
        self.state.select_mode(mode);
        debug!("set fmt: {}x{}", mode.width, mode.height);
        mode.frame_format()
    }

    /// The currently active format.
    pub fn format(&self) -> FrameFormat {
        self.state.mode().frame_format()
    }

    /// The frame interval at the active mode's maximum frame rate.
    pub fn frame_interval(&self) -> Fraction {
        self.state.mode().max_fps
    }

    /// The link frequency driven in the active mode. One legal value per
    /// build.
    pub fn link_frequency(&self) -> u64 {
        LINK_FREQUENCIES[self.state.mode().link_freq_index]
    }

    /// Pixels per second on the link, derived from the link frequency, lane
    /// count, and sample depth.
    pub fn pixel_rate(&self) -> u64 {
        self.state.pixel_rate(u8::from(self.lanes))
    }

    pub fn exposure_range(&self) -> RangeInclusive<u32> {
        self.state.exposure_range()
    }

    pub fn vblank_range(&self) -> RangeInclusive<u32> {
        self.state.vblank_range()
    }

    pub fn horizontal_blank(&self) -> u32 {
        self.state.horizontal_blank()
    }

    pub fn gain_range(&self) -> RangeInclusive<u16> {
        self.state.gain_range()
    }

    /// The full readable sensor area.
    pub fn native_size(&self) -> Rect {
        NATIVE_SIZE
    }

    /// The active pixel array, for crop bounds queries.
    pub fn pixel_array(&self) -> Rect {
        PIXEL_ARRAY
    }

    /// Detach from the sensor, forcing streaming off and power down, and
    /// hand back the injected collaborators.
    pub fn shutdown(mut self) -> (I2C, R, D) {
        let _ = self.stop_streaming();
        self.power_off();
        (self.bus, self.resources, self.delay)
    }

    fn write_values(&mut self, values: &[RegVal]) -> Result<(), Error<I2C>> {
        write_values(&mut self.bus, self.address, values)
    }
}

/// Read a logical value up to 4 bytes wide starting at the given register,
/// reassembled big-endian.
fn read_reg<I2C>(
    bus: &mut I2C,
    i2c_address: u8,
    reg: Address,
    len: usize,
) -> Result<u32, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    if len == 0 || len > MAX_VALUE_BYTES {
        return Err(LibraryError::InvalidLength(len).into());
    }
    let mut bytes = [0u8; MAX_VALUE_BYTES];
    bus.write_read(i2c_address, &reg.as_bytes(), &mut bytes[..len])
        .map_err(Error::I2cWriteReadError)?;
    Ok(register::decode(&bytes[..len])?)
}

/// Write a logical value up to 4 bytes wide starting at the given register,
/// most significant byte first.
fn write_reg<I2C>(
    bus: &mut I2C,
    i2c_address: u8,
    reg: Address,
    len: usize,
    value: u32,
) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let value_bytes = register::encode(value, len)?;
    let mut combined: ArrayVec<u8, { 2 + MAX_VALUE_BYTES }> = ArrayVec::new();
    combined.extend(reg.as_bytes().iter().copied());
    combined.extend(value_bytes.iter().copied());
    bus.write(i2c_address, &combined).map_err(Error::I2cWriteError)
}

/// Issue a fixed list of one-byte writes in order.
fn write_values<I2C>(bus: &mut I2C, i2c_address: u8, values: &[RegVal]) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    for regval in values {
        write_reg(bus, i2c_address, regval.addr, 1, regval.val as u32)?;
    }
    Ok(())
}

/// Upload a register program, stopping at the sentinel terminator or the
/// first failed write.
fn write_array<I2C>(bus: &mut I2C, i2c_address: u8, program: &[RegVal]) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    for regval in program {
        if regval.addr == REG_NULL {
            break;
        }
        write_reg(bus, i2c_address, regval.addr, 1, regval.val as u32)?;
    }
    Ok(())
}
