//! I2C controller register block
//!
//! Implements [`I2cPeriph`] for the two on-chip controllers by direct
//! volatile access to their register blocks. Control register 1 carries
//! the transfer control bits, status registers 1 and 2 carry the event
//! and error flags, and the packed value produced by the timing
//! calculator goes into the dedicated timing register.

use vadose_i2c::periph::{FaultFlags, I2cPeriph};
use vadose_i2c::timing::BusTiming;

/// APB1 clock feeding both controllers, in Hz.
const APB1_CLOCK_HZ: u32 = 32_000_000;

const I2C1_BASE: usize = 0x4000_5400;
const I2C2_BASE: usize = 0x4000_5800;

/// RCC APB1 peripheral clock enable register.
const RCC_APB1ENR: *mut u32 = 0x4002_3824 as *mut u32;

// Register offsets within a controller block
const CR1: usize = 0x00;
const CR2: usize = 0x04;
const OAR1: usize = 0x08;
const DR: usize = 0x10;
const SR1: usize = 0x14;
const SR2: usize = 0x18;
const TIMINGR: usize = 0x1C;

// CR1 bits
const CR1_PE: u32 = 1 << 0;
const CR1_NOSTRETCH: u32 = 1 << 7;
const CR1_START: u32 = 1 << 8;
const CR1_STOP: u32 = 1 << 9;
const CR1_ACK: u32 = 1 << 10;
const CR1_POS: u32 = 1 << 11;
const CR1_SWRST: u32 = 1 << 15;

// CR2 bits
const CR2_FREQ_MASK: u32 = 0x3F;
const CR2_ITERREN: u32 = 1 << 8;

// SR1 bits
const SR1_SB: u32 = 1 << 0;
const SR1_ADDR: u32 = 1 << 1;
const SR1_BTF: u32 = 1 << 2;
const SR1_RXNE: u32 = 1 << 6;
const SR1_TXE: u32 = 1 << 7;
const SR1_BERR: u32 = 1 << 8;
const SR1_ARLO: u32 = 1 << 9;
const SR1_AF: u32 = 1 << 10;
const SR1_OVR: u32 = 1 << 11;
const SR1_PECERR: u32 = 1 << 12;
const SR1_TIMEOUT: u32 = 1 << 14;
const SR1_SMBALERT: u32 = 1 << 15;

const SR1_ERROR_MASK: u32 =
    SR1_BERR | SR1_ARLO | SR1_AF | SR1_OVR | SR1_PECERR | SR1_TIMEOUT | SR1_SMBALERT;

// SR2 bits
const SR2_BUSY: u32 = 1 << 1;

/// One on-chip I2C controller.
pub struct I2cBlock {
    base: usize,
    clk_enable: u32,
}

/// First controller, on the sensor header.
pub const I2C1: I2cBlock = I2cBlock {
    base: I2C1_BASE,
    clk_enable: 1 << 21,
};

/// Second controller, routed to the expansion pads.
pub const I2C2: I2cBlock = I2cBlock {
    base: I2C2_BASE,
    clk_enable: 1 << 22,
};

impl I2cBlock {
    fn reg(&self, offset: usize) -> *mut u32 {
        (self.base + offset) as *mut u32
    }

    fn read(&self, offset: usize) -> u32 {
        unsafe { self.reg(offset).read_volatile() }
    }

    fn write(&self, offset: usize, value: u32) {
        unsafe { self.reg(offset).write_volatile(value) }
    }

    fn modify(&self, offset: usize, f: impl FnOnce(u32) -> u32) {
        self.write(offset, f(self.read(offset)));
    }
}

impl I2cPeriph for I2cBlock {
    fn input_clock_hz(&self) -> u32 {
        APB1_CLOCK_HZ
    }

    fn power_on(&self) {
        unsafe {
            let enr = RCC_APB1ENR.read_volatile();
            RCC_APB1ENR.write_volatile(enr | self.clk_enable);
        }
    }

    fn power_off(&self) {
        unsafe {
            let enr = RCC_APB1ENR.read_volatile();
            RCC_APB1ENR.write_volatile(enr & !self.clk_enable);
        }
    }

    fn apply_timing(&self, timing: BusTiming) {
        // Configuring a running controller raises a bus error.
        self.modify(CR1, |cr1| cr1 & !CR1_PE);

        self.write(TIMINGR, timing.raw());
        self.write(
            CR2,
            ((APB1_CLOCK_HZ / 1_000_000) & CR2_FREQ_MASK) | CR2_ITERREN,
        );
        // Clock stretching stays enabled, 7-bit own address
        self.modify(CR1, |cr1| cr1 & !CR1_NOSTRETCH);
        self.write(OAR1, 0);

        self.modify(CR1, |cr1| cr1 | CR1_PE);
    }

    fn current_timing(&self) -> BusTiming {
        BusTiming::from_raw(self.read(TIMINGR))
    }

    fn software_reset(&self) {
        self.modify(CR1, |cr1| cr1 | CR1_SWRST);
        self.modify(CR1, |cr1| cr1 & !CR1_SWRST);
    }

    fn bus_busy(&self) -> bool {
        self.read(SR2) & SR2_BUSY != 0
    }

    fn send_start(&self) {
        self.modify(CR1, |cr1| cr1 | CR1_START);
    }

    fn start_sent(&self) -> bool {
        self.read(SR1) & SR1_SB != 0
    }

    fn write_address(&self, header: u8) {
        self.write(DR, u32::from(header));
    }

    fn address_acked(&self) -> bool {
        self.read(SR1) & SR1_ADDR != 0
    }

    fn clear_address_flag(&self) {
        // Cleared by reading SR1 then SR2
        self.read(SR1);
        self.read(SR2);
    }

    fn set_ack(&self, enable: bool) {
        self.modify(CR1, |cr1| {
            if enable {
                cr1 | CR1_ACK
            } else {
                cr1 & !CR1_ACK
            }
        });
    }

    fn set_position_next(&self, enable: bool) {
        self.modify(CR1, |cr1| {
            if enable {
                cr1 | CR1_POS
            } else {
                cr1 & !CR1_POS
            }
        });
    }

    fn send_stop_rx(&self) {
        self.modify(CR1, |cr1| cr1 | CR1_STOP);
    }

    fn stop_pending(&self) -> bool {
        self.read(CR1) & CR1_STOP != 0
    }

    fn rx_ready(&self) -> bool {
        self.read(SR1) & SR1_RXNE != 0
    }

    fn read_data(&self) -> u8 {
        self.read(DR) as u8
    }

    fn write_data(&self, byte: u8) {
        self.write(DR, u32::from(byte));
    }

    fn tx_empty(&self) -> bool {
        self.read(SR1) & SR1_TXE != 0
    }

    fn byte_transfer_finished(&self) -> bool {
        self.read(SR1) & SR1_BTF != 0
    }

    fn transfer_complete(&self) -> bool {
        self.read(SR1) & SR1_BTF != 0
    }

    fn send_stop_tx(&self) {
        // This controller asserts stop through the same control bit for
        // both directions.
        self.modify(CR1, |cr1| cr1 | CR1_STOP);
    }

    fn take_fault_flags(&self) -> FaultFlags {
        let sr1 = self.read(SR1);
        // Error flags are rc_w0: write the bits back as zero to clear.
        self.write(SR1, sr1 & !SR1_ERROR_MASK);

        FaultFlags {
            overrun: sr1 & SR1_OVR != 0,
            not_acknowledged: sr1 & SR1_AF != 0,
            arbitration_lost: sr1 & SR1_ARLO != 0,
            bus_error: sr1 & SR1_BERR != 0,
            pec: sr1 & SR1_PECERR != 0,
            timeout: sr1 & SR1_TIMEOUT != 0,
            alert: sr1 & SR1_SMBALERT != 0,
        }
    }
}
