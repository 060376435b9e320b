//! Bus timing calculation
//!
//! Derives the controller's packed timing register value from the input
//! peripheral clock and the requested speed class. The search walks the
//! prescaler upwards from 1 and takes the first divisor whose derived
//! counts all fit their register fields.

use crate::error::I2cError;

const NSEC_PER_SEC: u32 = 1_000_000_000;

/// Largest prescaler the timing register can encode, plus one.
const PRESC_LIMIT: u32 = 16;

/// Bus speed classes.
///
/// Only [`Normal`](SpeedClass::Normal) and [`Fast`](SpeedClass::Fast) have
/// timing tables on this controller; the other classes exist so callers
/// can request them and get a well-defined error back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeedClass {
    /// 10 kbit/s
    Low,
    /// 100 kbit/s, the default
    Normal,
    /// 400 kbit/s
    Fast,
    /// 1 Mbit/s
    FastPlus,
    /// 3.4 Mbit/s
    High,
}

/// Minimum signal times for a speed class, in nanoseconds.
struct SignalMinimums {
    scl_high_ns: u32,
    scl_low_ns: u32,
    data_hold_ns: u32,
    data_setup_ns: u32,
}

impl SpeedClass {
    fn minimums(self) -> Option<SignalMinimums> {
        match self {
            SpeedClass::Normal => Some(SignalMinimums {
                scl_high_ns: 4000,
                scl_low_ns: 4700,
                data_hold_ns: 500,
                data_setup_ns: 1250,
            }),
            SpeedClass::Fast => Some(SignalMinimums {
                scl_high_ns: 600,
                scl_low_ns: 1300,
                data_hold_ns: 375,
                data_setup_ns: 500,
            }),
            _ => None,
        }
    }
}

/// Packed timing register value.
///
/// Layout, high to low: prescaler-1 in [31:28], data-setup-1 in [23:20],
/// data-hold in [19:16], SCL-high-1 in [15:8], SCL-low-1 in [7:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusTiming(u32);

impl BusTiming {
    fn pack(presc: u32, setup: u32, hold: u32, high: u32, low: u32) -> Self {
        BusTiming(
            ((presc - 1) << 28) | ((setup - 1) << 20) | (hold << 16) | ((high - 1) << 8) | (low - 1),
        )
    }

    /// Raw register value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Reconstruct from a raw register value, as read back from hardware.
    pub fn from_raw(raw: u32) -> Self {
        BusTiming(raw)
    }

    /// Clock prescaler, 1..=16.
    pub fn prescaler(self) -> u32 {
        (self.0 >> 28) + 1
    }

    /// SCL high phase, in prescaled ticks.
    pub fn scl_high(self) -> u32 {
        ((self.0 >> 8) & 0xFF) + 1
    }

    /// SCL low phase, in prescaled ticks.
    pub fn scl_low(self) -> u32 {
        (self.0 & 0xFF) + 1
    }

    /// Data hold window, in prescaled ticks. May be zero.
    pub fn data_hold(self) -> u32 {
        (self.0 >> 16) & 0xF
    }

    /// Data setup window, in prescaled ticks.
    pub fn data_setup(self) -> u32 {
        ((self.0 >> 20) & 0xF) + 1
    }
}

/// True when `count` cycles can be programmed into a field holding
/// `count - 1` in `max + 1` steps. A count of zero cannot be programmed
/// at all and must fail the candidate rather than wrap.
fn fits(count: u32, max: u32) -> bool {
    match count.checked_sub(1) {
        Some(stored) => stored <= max,
        None => false,
    }
}

/// Compute the packed timing value for `speed` from the input clock.
///
/// Walks the prescaler from 1 upwards and returns the first divisor whose
/// SCL high/low counts fit 8-bit fields and whose hold/setup counts fit
/// 4-bit fields (the hold count is stored as-is and may be zero). Fails
/// with [`I2cError::NoTimingSolution`] once a divisor of 16 is reached
/// without a match, and with [`I2cError::InvalidSpeed`] for classes this
/// controller has no table for.
pub fn compute(input_clock_hz: u32, speed: SpeedClass) -> Result<BusTiming, I2cError> {
    let mins = speed.minimums().ok_or(I2cError::InvalidSpeed)?;

    let mut presc = 1;
    while presc < PRESC_LIMIT {
        let scaled_hz = input_clock_hz / presc;
        if scaled_hz == 0 {
            presc += 1;
            continue;
        }
        let tick_ns = NSEC_PER_SEC / scaled_hz;
        if tick_ns == 0 {
            // Input clock above 1 GHz; a longer tick is needed before the
            // nanosecond division below means anything.
            presc += 1;
            continue;
        }

        let high = mins.scl_high_ns / tick_ns;
        let low = mins.scl_low_ns / tick_ns;
        let hold = mins.data_hold_ns / tick_ns;
        let setup = mins.data_setup_ns / tick_ns;

        if fits(high, 255) && fits(low, 255) && hold <= 15 && fits(setup, 15) {
            return Ok(BusTiming::pack(presc, setup, hold, high, low));
        }
        presc += 1;
    }

    Err(I2cError::NoTimingSolution)
}
