//! Controller register interface
//!
//! The transaction engine drives the hardware exclusively through this
//! trait, so the same engine runs against the STM32L1 register block on
//! the node and against a scripted mock on the host. Methods map one to
//! one onto single register accesses; anything that needs ordering across
//! several of them is the engine's job.

use crate::error::BusFault;
use crate::timing::BusTiming;

/// Data direction encoded in bit 0 of the address header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// Address header byte: 7-bit address shifted left, direction in bit 0.
    pub fn header(self, address: u8) -> u8 {
        match self {
            Direction::Write => address << 1,
            Direction::Read => (address << 1) | 1,
        }
    }
}

/// Error status bits sampled (and cleared) by the error interrupt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultFlags {
    pub overrun: bool,
    pub not_acknowledged: bool,
    pub arbitration_lost: bool,
    pub bus_error: bool,
    pub pec: bool,
    pub timeout: bool,
    pub alert: bool,
}

impl FaultFlags {
    /// Collapse the status bits to the single latched kind.
    ///
    /// Flags are inspected in a fixed order and a later set flag replaces
    /// an earlier one, so with several bits set the alert-most kind wins.
    pub fn fault(&self) -> Option<BusFault> {
        let mut fault = None;
        if self.overrun {
            fault = Some(BusFault::Overrun);
        }
        if self.not_acknowledged {
            fault = Some(BusFault::NotAcknowledged);
        }
        if self.arbitration_lost {
            fault = Some(BusFault::ArbitrationLost);
        }
        if self.bus_error {
            fault = Some(BusFault::BusError);
        }
        if self.pec {
            fault = Some(BusFault::Pec);
        }
        if self.timeout {
            fault = Some(BusFault::Timeout);
        }
        if self.alert {
            fault = Some(BusFault::Alert);
        }
        fault
    }
}

/// One I2C controller's register block.
///
/// All methods take `&self`: the underlying accesses are volatile register
/// reads and writes, and exclusivity is enforced above this trait by the
/// per-bus lock. Implementations must keep every method a plain register
/// access with no waiting.
pub trait I2cPeriph {
    /// Peripheral input clock feeding the timing prescaler, in Hz.
    fn input_clock_hz(&self) -> u32;

    /// Ungate the controller's clock.
    fn power_on(&self);

    /// Gate the controller's clock. Callers wait for bus idle first.
    fn power_off(&self);

    /// Run the controller init sequence: disable, program `timing` and the
    /// fixed configuration (filters, clock stretching, 7-bit addressing),
    /// then re-enable.
    fn apply_timing(&self, timing: BusTiming);

    /// Timing currently programmed, as [`apply_timing`](Self::apply_timing)
    /// left it.
    fn current_timing(&self) -> BusTiming;

    /// Pulse the software-reset control bit, set then immediately cleared.
    /// Clears a wedged bus state machine without touching configuration
    /// registers; [`apply_timing`](Self::apply_timing) must follow.
    fn software_reset(&self);

    /// Bus busy status flag.
    fn bus_busy(&self) -> bool;

    /// Assert a start condition.
    fn send_start(&self);

    /// Start condition has been put on the wire.
    fn start_sent(&self) -> bool;

    /// Write the address header into the data register.
    fn write_address(&self, header: u8);

    /// Address phase acknowledged by the device.
    fn address_acked(&self) -> bool;

    /// Clear the address-acknowledge flag, re-arming the shift register.
    fn clear_address_flag(&self);

    /// Enable or disable automatic acknowledge of received bytes.
    fn set_ack(&self, enable: bool);

    /// Select whether the acknowledge control applies to the next byte
    /// rather than the current one (two-byte receive mode).
    fn set_position_next(&self, enable: bool);

    /// Assert a stop condition on the receive path.
    fn send_stop_rx(&self);

    /// Stop condition still pending transmission.
    fn stop_pending(&self) -> bool;

    /// A received byte is waiting in the data register.
    fn rx_ready(&self) -> bool;

    /// Read one byte out of the data register.
    fn read_data(&self) -> u8;

    /// Write one byte into the data register.
    fn write_data(&self, byte: u8);

    /// The transmit data register can take another byte.
    fn tx_empty(&self) -> bool;

    /// Shift register has finished the byte in flight (receive pacing).
    fn byte_transfer_finished(&self) -> bool;

    /// All queued bytes have left the wire (transmit path).
    fn transfer_complete(&self) -> bool;

    /// Assert a stop condition on the transmit path. Some controllers
    /// route this through a different control register than the receive
    /// path; the engine does not care which.
    fn send_stop_tx(&self);

    /// Sample and clear the error status bits. Interrupt context only.
    fn take_fault_flags(&self) -> FaultFlags;
}
