//! Error types for the bus controller
//!
//! Argument and configuration problems are caught before any hardware
//! access; transient bus faults come out of the error interrupt and carry
//! the kind the hardware latched.

/// Transient bus fault, as signalled by the controller's error interrupt.
///
/// The codes mirror the controller's error status bits one to one. The
/// latch stores them as negative sentinels with zero meaning "no fault".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// Receive or transmit overrun
    Overrun,
    /// Address or data byte not acknowledged
    NotAcknowledged,
    /// Multi-master arbitration lost
    ArbitrationLost,
    /// Misplaced start or stop condition
    BusError,
    /// Packet error check failed
    Pec,
    /// Clock stretched or flag held beyond the allowed window
    Timeout,
    /// SMBus alert signalled
    Alert,
}

impl BusFault {
    /// Sentinel code stored in the fault latch.
    pub(crate) fn code(self) -> i8 {
        match self {
            BusFault::Overrun => -1,
            BusFault::NotAcknowledged => -2,
            BusFault::ArbitrationLost => -3,
            BusFault::BusError => -4,
            BusFault::Pec => -5,
            BusFault::Timeout => -6,
            BusFault::Alert => -7,
        }
    }

    pub(crate) fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(BusFault::Overrun),
            -2 => Some(BusFault::NotAcknowledged),
            -3 => Some(BusFault::ArbitrationLost),
            -4 => Some(BusFault::BusError),
            -5 => Some(BusFault::Pec),
            -6 => Some(BusFault::Timeout),
            -7 => Some(BusFault::Alert),
            _ => None,
        }
    }
}

/// Error returned by the public bus operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// Bus index is outside the configured bus count
    InvalidBus,
    /// Speed class has no timing table on this controller
    InvalidSpeed,
    /// No prescaler satisfies the timing register field widths
    NoTimingSolution,
    /// Transaction aborted by a bus fault; the bus has been reset
    Fault(BusFault),
}

impl embedded_hal::i2c::Error for I2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            I2cError::Fault(BusFault::NotAcknowledged) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            I2cError::Fault(BusFault::ArbitrationLost) => ErrorKind::ArbitrationLoss,
            I2cError::Fault(BusFault::BusError) => ErrorKind::Bus,
            I2cError::Fault(BusFault::Overrun) => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}
