// SPDX-License-Identifier: Apache-2.0
extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c;

use crate::power::{PowerError, SensorResources};
use crate::register;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum MockError {
    /// An unknown I2C address was given.
    UnknownI2cAddress(u8),

    /// The transaction shape was wrong (missing register address bytes, or a
    /// zero-length read).
    IllegalOperation,

    /// A fault requested by the test.
    InjectedFault,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BusOperation {
    Write { address: u16, length: usize },
    Read { address: u16, length: usize },
}

/// A register-map simulation of the sensor's bus interface.
///
/// Cloning shares the underlying state, so tests can keep a handle while the
/// driver owns its copy. Registers default to zero except the chip
/// identification register, which reads back the expected ID so power-on
/// passes unless a test says otherwise.
#[derive(Clone, Debug)]
pub(crate) struct MockSensorBus {
    i2c_address: u8,
    registers: Rc<RefCell<BTreeMap<u16, u8>>>,
    /// Registers whose stored value survives writes, to model read-backs
    /// disagreeing with what was written.
    pinned: Rc<RefCell<BTreeMap<u16, u8>>>,
    operations: Rc<RefCell<Vec<BusOperation>>>,
    fail_reads: Rc<RefCell<bool>>,
    fail_writes: Rc<RefCell<bool>>,
    fail_writes_to: Rc<RefCell<Option<u16>>>,
}

impl MockSensorBus {
    pub(crate) fn new(i2c_address: u8) -> Self {
        let mut registers = BTreeMap::new();
        registers.insert(
            u16::from(register::CHIP_ID),
            register::CHIP_ID_VALUE,
        );
        Self {
            i2c_address,
            registers: Rc::new(RefCell::new(registers)),
            pinned: Rc::new(RefCell::new(BTreeMap::new())),
            operations: Rc::new(RefCell::new(Vec::new())),
            fail_reads: Rc::new(RefCell::new(false)),
            fail_writes: Rc::new(RefCell::new(false)),
            fail_writes_to: Rc::new(RefCell::new(None)),
        }
    }

    pub(crate) fn register(&self, address: u16) -> u8 {
        let pinned = self.pinned.borrow();
        if let Some(value) = pinned.get(&address) {
            return *value;
        }
        *self.registers.borrow().get(&address).unwrap_or(&0)
    }

    pub(crate) fn set_register(&self, address: u16, value: u8) {
        self.registers.borrow_mut().insert(address, value);
    }

    /// Pin a register to a fixed value: writes are journaled but the stored
    /// value never changes.
    pub(crate) fn pin_register(&self, address: u16, value: u8) {
        self.pinned.borrow_mut().insert(address, value);
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        *self.fail_reads.borrow_mut() = fail;
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        *self.fail_writes.borrow_mut() = fail;
    }

    /// Fail only writes addressed to the given register.
    pub(crate) fn fail_writes_to(&self, address: u16) {
        *self.fail_writes_to.borrow_mut() = Some(address);
    }

    pub(crate) fn operations(&self) -> Vec<BusOperation> {
        self.operations.borrow().clone()
    }

    pub(crate) fn clear_operations(&self) {
        self.operations.borrow_mut().clear();
    }

    fn extract_address(bytes: &[u8]) -> Result<u16, MockError> {
        if bytes.len() < 2 {
            return Err(MockError::IllegalOperation);
        }
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

impl i2c::Write for MockSensorBus {
    type Error = MockError;

    fn write(&mut self, i2c_address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        let address = Self::extract_address(bytes)?;
        let payload = &bytes[2..];
        if payload.is_empty() {
            return Err(MockError::IllegalOperation);
        }
        if *self.fail_writes.borrow() || *self.fail_writes_to.borrow() == Some(address) {
            return Err(MockError::InjectedFault);
        }
        self.operations.borrow_mut().push(BusOperation::Write {
            address,
            length: payload.len(),
        });
        let pinned = self.pinned.borrow();
        let mut registers = self.registers.borrow_mut();
        for (offset, value) in payload.iter().enumerate() {
            let target = address + offset as u16;
            if pinned.contains_key(&target) {
                continue;
            }
            registers.insert(target, *value);
        }
        Ok(())
    }
}

impl i2c::WriteRead for MockSensorBus {
    type Error = MockError;

    fn write_read(
        &mut self,
        i2c_address: u8,
        write_buffer: &[u8],
        out_buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        // Write-reads should only carry the register address.
        if write_buffer.len() != 2 || out_buffer.is_empty() {
            return Err(MockError::IllegalOperation);
        }
        if *self.fail_reads.borrow() {
            return Err(MockError::InjectedFault);
        }
        let address = Self::extract_address(write_buffer)?;
        self.operations.borrow_mut().push(BusOperation::Read {
            address,
            length: out_buffer.len(),
        });
        for (offset, slot) in out_buffer.iter_mut().enumerate() {
            *slot = self.register(address + offset as u16);
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ResourceEvent {
    ClockEnabled,
    ClockDisabled,
    RegulatorsEnabled,
    RegulatorsDisabled,
    ResetAsserted,
    ResetDeasserted,
}

/// Journaling stand-in for the platform clock/regulator/reset plumbing.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockResources {
    events: Rc<RefCell<Vec<ResourceEvent>>>,
    fail_clock: Rc<RefCell<bool>>,
    fail_regulators: Rc<RefCell<bool>>,
}

impl MockResources {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<ResourceEvent> {
        self.events.borrow().clone()
    }

    pub(crate) fn fail_clock(&self, fail: bool) {
        *self.fail_clock.borrow_mut() = fail;
    }

    pub(crate) fn fail_regulators(&self, fail: bool) {
        *self.fail_regulators.borrow_mut() = fail;
    }
}

impl SensorResources for MockResources {
    fn enable_clock(&mut self) -> Result<(), PowerError> {
        if *self.fail_clock.borrow() {
            return Err(PowerError::Clock);
        }
        self.events.borrow_mut().push(ResourceEvent::ClockEnabled);
        Ok(())
    }

    fn disable_clock(&mut self) {
        self.events.borrow_mut().push(ResourceEvent::ClockDisabled);
    }

    fn enable_regulators(&mut self) -> Result<(), PowerError> {
        if *self.fail_regulators.borrow() {
            return Err(PowerError::Regulators);
        }
        self.events
            .borrow_mut()
            .push(ResourceEvent::RegulatorsEnabled);
        Ok(())
    }

    fn disable_regulators(&mut self) {
        self.events
            .borrow_mut()
            .push(ResourceEvent::RegulatorsDisabled);
    }

    fn assert_reset(&mut self) {
        self.events.borrow_mut().push(ResourceEvent::ResetAsserted);
    }

    fn deassert_reset(&mut self) {
        self.events
            .borrow_mut()
            .push(ResourceEvent::ResetDeasserted);
    }
}

/// Delay provider that doesn't wait; the settle times are not observable in
/// unit tests.
pub(crate) struct NoopDelay;

impl DelayUs<u32> for NoopDelay {
    fn delay_us(&mut self, _us: u32) {}
}
