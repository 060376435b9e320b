//! LIS2HH12 three-axis accelerometer
//!
//! The node uses the accelerometer to detect tampering and to level-check
//! the probe mast after installation. Axis data is converted to milli-g
//! using the full-scale sensitivity; anything fancier happens upstream.

use vadose_hal::i2c::I2cBus;

/// Default device address (SA0 pulled high on the node).
pub const DEFAULT_ADDRESS: u8 = 0x1E;

const REG_TEMP_L: u8 = 0x0B;
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL1: u8 = 0x20;
const REG_CTRL2: u8 = 0x21;
const REG_CTRL3: u8 = 0x22;
const REG_CTRL4: u8 = 0x23;
const REG_OUT_X_L: u8 = 0x28;
const REG_OUT_Y_L: u8 = 0x2A;
const REG_OUT_Z_L: u8 = 0x2C;

const WHO_AM_I_VALUE: u8 = 0x41;

/// Block data update: output registers hold until both halves are read.
const CTRL1_BDU: u8 = 0x08;
/// X, Y and Z axis enable.
const CTRL1_XYZ_EN: u8 = 0x07;

/// Output data rate, CTRL1[6:4].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputRate {
    PowerDown,
    Hz10,
    Hz50,
    Hz100,
    Hz200,
    Hz400,
    Hz800,
}

impl OutputRate {
    fn bits(self) -> u8 {
        let value: u8 = match self {
            OutputRate::PowerDown => 0,
            OutputRate::Hz10 => 1,
            OutputRate::Hz50 => 2,
            OutputRate::Hz100 => 3,
            OutputRate::Hz200 => 4,
            OutputRate::Hz400 => 5,
            OutputRate::Hz800 => 6,
        };
        value << 4
    }
}

/// Full-scale range, CTRL4[5:4].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scale {
    G2,
    G4,
    G8,
}

impl Scale {
    fn bits(self) -> u8 {
        match self {
            Scale::G2 => 0b00 << 4,
            Scale::G4 => 0b10 << 4,
            Scale::G8 => 0b11 << 4,
        }
    }

    /// Sensitivity in micro-g per least significant bit.
    fn sensitivity_ug(self) -> i32 {
        match self {
            Scale::G2 => 61,
            Scale::G4 => 122,
            Scale::G8 => 244,
        }
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Copy)]
pub struct Lis2hh12Config {
    pub rate: OutputRate,
    pub scale: Scale,
}

impl Default for Lis2hh12Config {
    fn default() -> Self {
        Self {
            rate: OutputRate::Hz50,
            scale: Scale::G2,
        }
    }
}

/// One acceleration sample, in milli-g per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccelSample {
    pub x_mg: i16,
    pub y_mg: i16,
    pub z_mg: i16,
}

/// Driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lis2hh12Error<E> {
    /// Bus transfer failed
    Bus(E),
    /// WHO_AM_I came back with an unexpected value
    WrongDevice(u8),
}

impl<E> From<E> for Lis2hh12Error<E> {
    fn from(err: E) -> Self {
        Lis2hh12Error::Bus(err)
    }
}

/// LIS2HH12 accelerometer driver
pub struct Lis2hh12<I2C> {
    bus: I2C,
    address: u8,
    config: Lis2hh12Config,
}

impl<I2C: I2cBus> Lis2hh12<I2C> {
    /// Create a driver for the device at `address`. No bus traffic until
    /// [`init`](Self::init).
    pub fn new(bus: I2C, address: u8, config: Lis2hh12Config) -> Self {
        Self {
            bus,
            address,
            config,
        }
    }

    /// Check the device identity and configure rate, scale and filters.
    pub fn init(&mut self) -> Result<(), Lis2hh12Error<I2C::Error>> {
        let id = self.read_reg(REG_WHO_AM_I)?;
        if id != WHO_AM_I_VALUE {
            return Err(Lis2hh12Error::WrongDevice(id));
        }

        self.write_reg(REG_CTRL1, CTRL1_BDU | CTRL1_XYZ_EN | self.config.rate.bits())?;
        // High-pass filter off, INT1 sources off
        self.write_reg(REG_CTRL2, 0x00)?;
        self.write_reg(REG_CTRL3, 0x00)?;
        self.write_reg(REG_CTRL4, self.config.scale.bits())?;
        Ok(())
    }

    /// Read all three axes and convert to milli-g.
    pub fn read_xyz(&mut self) -> Result<AccelSample, Lis2hh12Error<I2C::Error>> {
        let x = self.read_axis(REG_OUT_X_L)?;
        let y = self.read_axis(REG_OUT_Y_L)?;
        let z = self.read_axis(REG_OUT_Z_L)?;

        let sensitivity = self.config.scale.sensitivity_ug();
        Ok(AccelSample {
            x_mg: (i32::from(x) * sensitivity / 1000) as i16,
            y_mg: (i32::from(y) * sensitivity / 1000) as i16,
            z_mg: (i32::from(z) * sensitivity / 1000) as i16,
        })
    }

    /// Raw reading of the internal temperature sensor.
    pub fn read_temp(&mut self) -> Result<i16, Lis2hh12Error<I2C::Error>> {
        Ok(self.read_axis(REG_TEMP_L)?)
    }

    /// Resume sampling at the configured output data rate.
    pub fn poweron(&mut self) -> Result<(), Lis2hh12Error<I2C::Error>> {
        self.write_reg(REG_CTRL1, CTRL1_BDU | CTRL1_XYZ_EN | self.config.rate.bits())?;
        Ok(())
    }

    /// Put the device into power-down mode.
    pub fn poweroff(&mut self) -> Result<(), Lis2hh12Error<I2C::Error>> {
        self.write_reg(REG_CTRL1, OutputRate::PowerDown.bits())?;
        Ok(())
    }

    /// Release the bus handle.
    pub fn free(self) -> I2C {
        self.bus
    }

    fn read_axis(&mut self, reg_low: u8) -> Result<i16, I2C::Error> {
        let mut raw = [0u8; 2];
        self.bus.write_read(self.address, &[reg_low], &mut raw)?;
        Ok(i16::from_le_bytes(raw))
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut value = [0u8; 1];
        self.bus.write_read(self.address, &[reg], &mut value)?;
        Ok(value[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.bus.write(self.address, &[reg, value])
    }
}
