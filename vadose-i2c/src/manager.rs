//! Bus manager
//!
//! Owns everything process-wide: one slot per controller (register block
//! handle plus its lock), the fault latch shared with the error
//! interrupt, and the monotonic clock behind the wait deadlines. Sensor
//! drivers never see any of that state directly; they go through the
//! byte-oriented operations here or through a [`ManagedBus`] handle.
//!
//! Locking discipline follows the surrounding drivers: callers bracket a
//! group of transfers in [`acquire`](I2cBusManager::acquire) and
//! [`release`](I2cBusManager::release); the transfer operations
//! themselves do not lock. [`ManagedBus`] does the bracketing per call
//! for code that wants a self-contained handle.

use vadose_hal::i2c::I2cBus;
use vadose_hal::time::TimeSource;

use crate::error::{BusFault, I2cError};
use crate::latch::FaultLatch;
use crate::lock::BusLock;
use crate::periph::I2cPeriph;
use crate::timing::{self, SpeedClass};
use crate::transfer::Transfer;

struct BusSlot<P> {
    periph: P,
    lock: BusLock,
}

/// Process-wide I2C state: `N` bus instances behind one manager.
///
/// Constructed once at system init with the board's controller handles
/// and clock; embedded targets keep it alive until reset.
pub struct I2cBusManager<P: I2cPeriph, C: TimeSource, const N: usize> {
    slots: [BusSlot<P>; N],
    latch: FaultLatch,
    clock: C,
}

impl<P: I2cPeriph, C: TimeSource, const N: usize> I2cBusManager<P, C, N> {
    pub fn new(periphs: [P; N], clock: C) -> Self {
        I2cBusManager {
            slots: periphs.map(|periph| BusSlot {
                periph,
                lock: BusLock::new(),
            }),
            latch: FaultLatch::new(),
            clock,
        }
    }

    /// Number of configured buses.
    pub const fn bus_count(&self) -> usize {
        N
    }

    fn slot(&self, bus: usize) -> Result<&BusSlot<P>, I2cError> {
        self.slots.get(bus).ok_or(I2cError::InvalidBus)
    }

    fn transfer<'a>(&'a self, slot: &'a BusSlot<P>) -> Transfer<'a, P, C> {
        Transfer::new(&slot.periph, &self.clock, &self.latch)
    }

    /// Configure `bus` as a master running at `speed`.
    ///
    /// Computes the timing for the controller's input clock, then powers
    /// the controller and runs its init sequence. Safe to call again at
    /// any time; the timing is recomputed and rewritten from scratch. If
    /// no timing solution exists the controller is left untouched and
    /// must not be used.
    pub fn init_master(&self, bus: usize, speed: SpeedClass) -> Result<(), I2cError> {
        let slot = self.slot(bus)?;
        let timing = timing::compute(slot.periph.input_clock_hz(), speed)?;
        slot.periph.power_on();
        slot.periph.apply_timing(timing);
        Ok(())
    }

    /// Block until `bus` is exclusively owned by the caller.
    ///
    /// Not reentrant: acquiring a bus this context already owns
    /// deadlocks.
    pub fn acquire(&self, bus: usize) -> Result<(), I2cError> {
        self.slot(bus)?.lock.acquire();
        Ok(())
    }

    /// Give up ownership of `bus`, letting one waiter in.
    pub fn release(&self, bus: usize) -> Result<(), I2cError> {
        self.slot(bus)?.lock.release();
        Ok(())
    }

    /// Receive `buf.len()` bytes from the device at `address`.
    /// The caller must hold the bus.
    pub fn read_bytes(&self, bus: usize, address: u8, buf: &mut [u8]) -> Result<usize, I2cError> {
        let slot = self.slot(bus)?;
        self.transfer(slot).read(address, buf)
    }

    /// Receive one byte from the device at `address`.
    pub fn read_byte(&self, bus: usize, address: u8) -> Result<u8, I2cError> {
        let mut buf = [0u8; 1];
        self.read_bytes(bus, address, &mut buf)?;
        Ok(buf[0])
    }

    /// Read `buf.len()` bytes out of device register `register`.
    ///
    /// Two physical transactions: the register pointer goes out as its
    /// own stopped write, then the bus restarts as a plain read. The
    /// caller must hold the bus across both.
    pub fn read_regs(
        &self,
        bus: usize,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<usize, I2cError> {
        let slot = self.slot(bus)?;
        let transfer = self.transfer(slot);
        transfer.write(address, &[register])?;
        transfer.read(address, buf)
    }

    /// Read one byte out of device register `register`.
    pub fn read_reg(&self, bus: usize, address: u8, register: u8) -> Result<u8, I2cError> {
        let mut buf = [0u8; 1];
        self.read_regs(bus, address, register, &mut buf)?;
        Ok(buf[0])
    }

    /// Transmit `data` to the device at `address`. An empty slice probes
    /// the address and nothing else. The caller must hold the bus.
    pub fn write_bytes(&self, bus: usize, address: u8, data: &[u8]) -> Result<usize, I2cError> {
        let slot = self.slot(bus)?;
        self.transfer(slot).write(address, data)
    }

    /// Transmit one byte to the device at `address`.
    pub fn write_byte(&self, bus: usize, address: u8, data: u8) -> Result<usize, I2cError> {
        self.write_bytes(bus, address, &[data])
    }

    /// Write `data` into device register `register`, register pointer and
    /// payload inside a single held transaction.
    pub fn write_regs(
        &self,
        bus: usize,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<usize, I2cError> {
        let slot = self.slot(bus)?;
        self.transfer(slot).write_to_register(address, register, data)
    }

    /// Write one byte into device register `register`.
    pub fn write_reg(
        &self,
        bus: usize,
        address: u8,
        register: u8,
        data: u8,
    ) -> Result<usize, I2cError> {
        self.write_regs(bus, address, register, &[data])
    }

    /// Ungate the controller clock of `bus`. Out-of-range indexes are
    /// ignored.
    pub fn poweron(&self, bus: usize) {
        if let Ok(slot) = self.slot(bus) {
            slot.periph.power_on();
        }
    }

    /// Gate the controller clock of `bus` once the bus goes idle.
    /// Out-of-range indexes are ignored. The idle wait is unbounded: a
    /// transaction in flight finishes in bounded time, and gating the
    /// clock under it would wedge the bus harder than waiting ever can.
    pub fn poweroff(&self, bus: usize) {
        if let Ok(slot) = self.slot(bus) {
            while slot.periph.bus_busy() {}
            slot.periph.power_off();
        }
    }

    /// Probe every assignable 7-bit address on `bus` with a zero-length
    /// write and collect the ones that acknowledge. The caller must hold
    /// the bus. Absent devices cost a fault or deadline round each, so a
    /// full sweep of an empty bus takes a while; this is a commissioning
    /// tool, not a runtime one.
    pub fn scan(&self, bus: usize) -> Result<heapless::Vec<u8, 112>, I2cError> {
        let slot = self.slot(bus)?;
        let transfer = self.transfer(slot);

        let mut found = heapless::Vec::new();
        for address in 0x08..0x78 {
            if transfer.write(address, &[]).is_ok() {
                // Capacity covers the whole probe range, push cannot fail.
                let _ = found.push(address);
            }
        }
        Ok(found)
    }

    /// Entry point for the controller's error interrupt.
    ///
    /// Samples and clears the error status bits and latches the resulting
    /// fault kind for the thread currently waiting on an acknowledge. Not
    /// meant to be called from application code.
    pub fn on_error_interrupt(&self, bus: usize) {
        if let Ok(slot) = self.slot(bus) {
            if let Some(fault) = slot.periph.take_fault_flags().fault() {
                self.latch.raise(fault);
            }
        }
    }

    /// Fault currently latched from the error interrupt, if any. Purely
    /// diagnostic; the next address phase clears it.
    pub fn latched_fault(&self) -> Option<BusFault> {
        self.latch.current()
    }

    /// Self-contained handle for one device's traffic on `bus`.
    pub fn bus(&self, bus: usize) -> Result<ManagedBus<'_, P, C, N>, I2cError> {
        self.slot(bus)?;
        Ok(ManagedBus { manager: self, bus })
    }
}

/// Byte-oriented bus handle that brackets every call in acquire/release.
///
/// This is the handle sensor drivers hold. It also speaks
/// [`embedded_hal::i2c::I2c`], with each operation of a transaction
/// issued as its own stopped transaction.
pub struct ManagedBus<'a, P: I2cPeriph, C: TimeSource, const N: usize> {
    manager: &'a I2cBusManager<P, C, N>,
    bus: usize,
}

impl<P: I2cPeriph, C: TimeSource, const N: usize> ManagedBus<'_, P, C, N> {
    fn locked<R>(&self, op: impl FnOnce() -> Result<R, I2cError>) -> Result<R, I2cError> {
        self.manager.acquire(self.bus)?;
        let result = op();
        self.manager.release(self.bus)?;
        result
    }
}

impl<P: I2cPeriph, C: TimeSource, const N: usize> I2cBus for ManagedBus<'_, P, C, N> {
    type Error = I2cError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.locked(|| self.manager.write_bytes(self.bus, address, data))
            .map(|_| ())
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.locked(|| self.manager.read_bytes(self.bus, address, buf))
            .map(|_| ())
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.locked(|| {
            self.manager.write_bytes(self.bus, address, write_data)?;
            self.manager.read_bytes(self.bus, address, read_buf)
        })
        .map(|_| ())
    }
}

impl<P: I2cPeriph, C: TimeSource, const N: usize> embedded_hal::i2c::ErrorType
    for ManagedBus<'_, P, C, N>
{
    type Error = I2cError;
}

impl<P: I2cPeriph, C: TimeSource, const N: usize> embedded_hal::i2c::I2c
    for ManagedBus<'_, P, C, N>
{
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        use embedded_hal::i2c::Operation;

        self.locked(|| {
            for operation in operations.iter_mut() {
                match operation {
                    Operation::Read(buf) => {
                        self.manager.read_bytes(self.bus, address, buf)?;
                    }
                    Operation::Write(data) => {
                        self.manager.write_bytes(self.bus, address, data)?;
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPeriph, Op};
    use crate::periph::FaultFlags;
    use vadose_hal::time::MockTime;

    fn manager_with_buses<const N: usize>() -> I2cBusManager<MockPeriph<'static>, MockTime, N> {
        let periphs = core::array::from_fn(|_| MockPeriph::new(32_000_000));
        I2cBusManager::new(periphs, MockTime::new())
    }

    fn mock<'a>(manager: &'a I2cBusManager<MockPeriph<'static>, MockTime, 2>, bus: usize) -> &'a MockPeriph<'static> {
        &manager.slots[bus].periph
    }

    #[test]
    fn init_master_programs_computed_timing() {
        let manager = manager_with_buses::<2>();
        manager.init_master(0, SpeedClass::Fast).unwrap();

        let expected = timing::compute(32_000_000, SpeedClass::Fast).unwrap();
        assert_eq!(
            mock(&manager, 0).ops(),
            &[Op::PowerOn, Op::ApplyTiming(expected.raw())]
        );
        // The other bus is untouched.
        assert!(mock(&manager, 1).ops().is_empty());
    }

    #[test]
    fn init_master_argument_errors_precede_hardware_access() {
        let manager = manager_with_buses::<2>();
        assert_eq!(
            manager.init_master(2, SpeedClass::Normal),
            Err(I2cError::InvalidBus)
        );
        assert_eq!(
            manager.init_master(0, SpeedClass::High),
            Err(I2cError::InvalidSpeed)
        );
        assert!(mock(&manager, 0).ops().is_empty());
    }

    #[test]
    fn init_master_without_timing_solution_leaves_registers_alone() {
        let periphs = core::array::from_fn(|_| MockPeriph::new(100_000));
        let manager: I2cBusManager<MockPeriph, MockTime, 1> =
            I2cBusManager::new(periphs, MockTime::new());

        assert_eq!(
            manager.init_master(0, SpeedClass::Normal),
            Err(I2cError::NoTimingSolution)
        );
        assert!(manager.slots[0].periph.ops().is_empty());
    }

    #[test]
    fn acquire_release_bounds_check_first() {
        let manager = manager_with_buses::<2>();
        assert_eq!(manager.acquire(2), Err(I2cError::InvalidBus));
        assert_eq!(manager.release(7), Err(I2cError::InvalidBus));

        manager.acquire(0).unwrap();
        manager.release(0).unwrap();
        assert_eq!(manager.bus_count(), 2);
    }

    #[test]
    fn register_write_then_read_roundtrips() {
        let manager = manager_with_buses::<2>();
        manager.init_master(0, SpeedClass::Normal).unwrap();

        manager.acquire(0).unwrap();
        assert_eq!(manager.write_regs(0, 0x50, 0x10, &[1, 2, 3, 4]), Ok(4));

        let mut buf = [0u8; 4];
        assert_eq!(manager.read_regs(0, 0x50, 0x10, &mut buf), Ok(4));
        manager.release(0).unwrap();

        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(mock(&manager, 0).register(0x10), 1);
        assert_eq!(mock(&manager, 0).register(0x13), 4);
    }

    #[test]
    fn register_read_issues_two_stopped_transactions() {
        let manager = manager_with_buses::<2>();
        manager.init_master(0, SpeedClass::Normal).unwrap();
        mock(&manager, 0).fill_registers_with_identity();
        mock(&manager, 0).clear_ops();

        let mut buf = [0u8; 2];
        manager.acquire(0).unwrap();
        assert_eq!(manager.read_regs(0, 0x2A, 0x20, &mut buf), Ok(2));
        manager.release(0).unwrap();
        assert_eq!(buf, [0x20, 0x21]);

        assert_eq!(
            mock(&manager, 0).ops(),
            &[
                // Register pointer write, stopped.
                Op::Start,
                Op::WriteAddress(0x54),
                Op::ClearAddr,
                Op::Write(0x20),
                Op::StopTx,
                // Fresh start for the data phase.
                Op::Start,
                Op::WriteAddress(0x55),
                Op::Pos(true),
                Op::Ack(true),
                Op::ClearAddr,
                Op::Ack(false),
                Op::StopRx,
                Op::Read(0x20),
                Op::Read(0x21),
                Op::Pos(false),
                Op::Ack(true),
            ]
        );
    }

    #[test]
    fn long_read_streams_sequential_registers() {
        let manager = manager_with_buses::<2>();
        manager.init_master(0, SpeedClass::Normal).unwrap();
        mock(&manager, 0).fill_registers_with_identity();

        let mut buf = [0u8; 32];
        manager.acquire(0).unwrap();
        assert_eq!(manager.read_regs(0, 0x2A, 0x00, &mut buf), Ok(32));
        manager.release(0).unwrap();

        for (i, byte) in buf.iter().enumerate() {
            assert_eq!(*byte, i as u8);
        }
    }

    #[test]
    fn error_interrupt_latches_collapsed_fault() {
        let manager = manager_with_buses::<2>();
        mock(&manager, 0).set_fault_flags(FaultFlags {
            overrun: true,
            not_acknowledged: true,
            ..Default::default()
        });

        manager.on_error_interrupt(0);
        assert_eq!(manager.latched_fault(), Some(BusFault::NotAcknowledged));

        // Flags were consumed; a second sampling latches nothing new.
        manager.on_error_interrupt(0);
        assert_eq!(manager.latched_fault(), Some(BusFault::NotAcknowledged));

        // Out of range is ignored.
        manager.on_error_interrupt(9);
    }

    #[test]
    fn poweroff_waits_for_idle() {
        let manager = manager_with_buses::<2>();
        mock(&manager, 1).set_busy_polls(3);
        manager.poweroff(1);
        assert_eq!(mock(&manager, 1).ops(), &[Op::PowerOff]);

        manager.poweron(1);
        assert_eq!(mock(&manager, 1).ops(), &[Op::PowerOff, Op::PowerOn]);

        // Silently ignored, matching the clock-gating call convention.
        manager.poweron(5);
        manager.poweroff(5);
    }

    #[test]
    fn scan_probes_the_assignable_range() {
        let manager = manager_with_buses::<2>();
        manager.init_master(0, SpeedClass::Normal).unwrap();

        manager.acquire(0).unwrap();
        let found = manager.scan(0).unwrap();
        manager.release(0).unwrap();

        // The mock acknowledges everything, so the whole range shows up.
        assert_eq!(found.len(), 112);
        assert_eq!(found[0], 0x08);
        assert_eq!(found[found.len() - 1], 0x77);
        assert_eq!(manager.scan(4), Err(I2cError::InvalidBus));
    }

    #[test]
    fn managed_bus_brackets_in_locking() {
        let manager = manager_with_buses::<2>();
        manager.init_master(0, SpeedClass::Fast).unwrap();
        mock(&manager, 0).fill_registers_with_identity();

        let mut handle = manager.bus(0).unwrap();
        assert!(manager.bus(3).is_err());

        let mut buf = [0u8; 2];
        handle.write_read(0x30, &[0x40], &mut buf).unwrap();
        assert_eq!(buf, [0x40, 0x41]);

        // The lock was released again: a direct acquire goes through.
        manager.acquire(0).unwrap();
        manager.release(0).unwrap();
    }

    #[test]
    fn managed_bus_speaks_embedded_hal() {
        fn probe<I: embedded_hal::i2c::I2c>(i2c: &mut I) -> Result<[u8; 2], I::Error> {
            let mut buf = [0u8; 2];
            i2c.write_read(0x48, &[0x05], &mut buf)?;
            Ok(buf)
        }

        let manager = manager_with_buses::<2>();
        manager.init_master(0, SpeedClass::Normal).unwrap();
        mock(&manager, 0).fill_registers_with_identity();

        let mut handle = manager.bus(0).unwrap();
        assert_eq!(probe(&mut handle).unwrap(), [0x05, 0x06]);
    }
}
