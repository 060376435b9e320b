//! Transaction engine
//!
//! Drives one transaction over an [`I2cPeriph`]: busy wait, start,
//! address phase, data phase, stop. Receives of one, two, and three or
//! more bytes need three different acknowledge/stop choreographies; the
//! controller only suppresses the acknowledge of the final bytes
//! correctly when stop is queued at the exact point each variant encodes.
//! The critical sections keep the error interrupt from sliding a register
//! access between a flag clear and the control write that must follow it
//! on the next bus clock edge.
//!
//! Every flag wait is bounded by a shared 100 ms deadline and reports a
//! timeout fault after recovering the bus. The one exception is the
//! initial busy wait, which never fails the caller: it resets the
//! controller once per elapsed window and keeps waiting.

use vadose_hal::time::TimeSource;

use crate::error::{BusFault, I2cError};
use crate::latch::FaultLatch;
use crate::periph::{Direction, I2cPeriph};

/// Window after which a busy bus is assumed wedged and reset.
const BUSY_RESET_WINDOW_US: u64 = 100_000;

/// Deadline for every other hardware flag.
const FLAG_DEADLINE_US: u64 = 100_000;

/// One in-flight transaction's view of a bus. Exists only on the stack of
/// a public bus operation; the caller holds the bus lock for its whole
/// lifetime.
pub(crate) struct Transfer<'a, P: I2cPeriph, C: TimeSource> {
    periph: &'a P,
    clock: &'a C,
    latch: &'a FaultLatch,
}

impl<'a, P: I2cPeriph, C: TimeSource> Transfer<'a, P, C> {
    pub(crate) fn new(periph: &'a P, clock: &'a C, latch: &'a FaultLatch) -> Self {
        Transfer {
            periph,
            clock,
            latch,
        }
    }

    /// Reset the controller out of a wedged state: capture the programmed
    /// timing, pulse the software reset, reinitialize with the captured
    /// timing. Uses no status flag itself, so it is safe from inside any
    /// wait loop.
    fn recover(&self) {
        let timing = self.periph.current_timing();
        self.periph.software_reset();
        self.periph.apply_timing(timing);
    }

    /// Wait for the bus to go idle. Never fails; a bus stuck busy past
    /// the window is reset and the wait starts over, invisibly to the
    /// caller.
    fn wait_not_busy(&self) {
        let mut window_start = self.clock.now_us();
        while self.periph.bus_busy() {
            if self.clock.elapsed_since(window_start) > BUSY_RESET_WINDOW_US {
                self.recover();
                window_start = self.clock.now_us();
            }
        }
    }

    /// Poll `ready` until it holds or the deadline passes. On deadline the
    /// bus is recovered and the caller gets a timeout fault.
    fn wait_flag(&self, ready: impl Fn() -> bool) -> Result<(), I2cError> {
        let began = self.clock.now_us();
        while !ready() {
            if self.clock.elapsed_since(began) > FLAG_DEADLINE_US {
                self.recover();
                return Err(I2cError::Fault(BusFault::Timeout));
            }
        }
        Ok(())
    }

    /// Start condition plus address phase.
    ///
    /// Clears the fault latch before the address goes out, then polls the
    /// acknowledge flag and the latch together; a fault raised by the
    /// error interrupt aborts the wait, resets the bus and surfaces the
    /// latched kind.
    fn start(&self, address: u8, direction: Direction) -> Result<(), I2cError> {
        self.wait_not_busy();

        self.periph.send_start();
        self.wait_flag(|| self.periph.start_sent())?;

        self.latch.clear();
        self.periph.write_address(direction.header(address));

        let began = self.clock.now_us();
        while !self.periph.address_acked() {
            if let Some(fault) = self.latch.current() {
                self.recover();
                return Err(I2cError::Fault(fault));
            }
            if self.clock.elapsed_since(began) > FLAG_DEADLINE_US {
                self.recover();
                return Err(I2cError::Fault(BusFault::Timeout));
            }
        }
        Ok(())
    }

    /// Receive `buf.len()` bytes from `address`.
    pub(crate) fn read(&self, address: u8, buf: &mut [u8]) -> Result<usize, I2cError> {
        match buf.len() {
            0 => Ok(0),
            1 => self.read_one(address, buf),
            2 => self.read_two(address, buf),
            _ => self.read_many(address, buf),
        }
    }

    /// Single byte: the acknowledge must already be off and stop must be
    /// queued in the same masked section that clears the address flag,
    /// before the re-armed shift register sees the next clock edge.
    fn read_one(&self, address: u8, buf: &mut [u8]) -> Result<usize, I2cError> {
        self.start(address, Direction::Read)?;

        self.periph.set_ack(false);
        critical_section::with(|_| {
            self.periph.clear_address_flag();
            self.periph.send_stop_rx();
        });

        self.wait_flag(|| self.periph.rx_ready())?;
        buf[0] = self.periph.read_data();

        self.wait_flag(|| !self.periph.stop_pending())?;
        self.periph.set_ack(true);
        Ok(1)
    }

    /// Two bytes: acknowledge control shifts to the next byte before the
    /// address flag is cleared, the acknowledge is dropped in the same
    /// masked section as the clear, and stop goes out together with the
    /// first data read once both bytes sit in the shift/data registers.
    fn read_two(&self, address: u8, buf: &mut [u8]) -> Result<usize, I2cError> {
        self.start(address, Direction::Read)?;

        self.periph.set_position_next(true);
        self.periph.set_ack(true);
        critical_section::with(|_| {
            self.periph.clear_address_flag();
            self.periph.set_ack(false);
        });

        self.wait_flag(|| self.periph.byte_transfer_finished())?;

        critical_section::with(|_| {
            self.periph.send_stop_rx();
            buf[0] = self.periph.read_data();
        });
        buf[1] = self.periph.read_data();

        self.wait_flag(|| !self.periph.stop_pending())?;
        self.periph.set_position_next(false);
        self.periph.set_ack(true);
        Ok(2)
    }

    /// Three or more bytes: stream until three remain, then let the shift
    /// register fill, drop the acknowledge, and pair stop with the read of
    /// the third-from-last byte so the last two go out unacknowledged.
    fn read_many(&self, address: u8, buf: &mut [u8]) -> Result<usize, I2cError> {
        let total = buf.len();

        self.start(address, Direction::Read)?;
        self.periph.clear_address_flag();

        let mut i = 0;
        while i < total - 3 {
            self.wait_flag(|| self.periph.rx_ready())?;
            buf[i] = self.periph.read_data();
            i += 1;
        }

        self.wait_flag(|| self.periph.byte_transfer_finished())?;
        self.periph.set_ack(false);

        critical_section::with(|_| {
            buf[i] = self.periph.read_data();
            self.periph.send_stop_rx();
        });
        i += 1;
        buf[i] = self.periph.read_data();
        i += 1;

        self.wait_flag(|| self.periph.rx_ready())?;
        buf[i] = self.periph.read_data();

        self.wait_flag(|| !self.periph.stop_pending())?;
        self.periph.set_position_next(false);
        self.periph.set_ack(true);
        Ok(total)
    }

    /// Transmit `data` to `address` as one stopped transaction. An empty
    /// slice degenerates to an address-only probe, which is what bus
    /// scanners rely on.
    pub(crate) fn write(&self, address: u8, data: &[u8]) -> Result<usize, I2cError> {
        self.start(address, Direction::Write)?;
        self.periph.clear_address_flag();
        self.write_payload(data)?;
        self.stop_tx()?;
        Ok(data.len())
    }

    /// Transmit a register pointer followed by `data`, all inside one
    /// held transaction.
    pub(crate) fn write_to_register(
        &self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<usize, I2cError> {
        self.start(address, Direction::Write)?;
        self.periph.clear_address_flag();
        self.write_payload(&[register])?;
        self.write_payload(data)?;
        self.stop_tx()?;
        Ok(data.len())
    }

    fn write_payload(&self, data: &[u8]) -> Result<(), I2cError> {
        for &byte in data {
            self.periph.write_data(byte);
            self.wait_flag(|| self.periph.tx_empty())?;
        }
        Ok(())
    }

    fn stop_tx(&self) -> Result<(), I2cError> {
        self.wait_flag(|| self.periph.transfer_complete())?;
        self.periph.send_stop_tx();
        Ok(())
    }
}
