//! I2C bus abstractions
//!
//! Provides the byte-oriented master interface that sensor drivers are
//! written against. The bus controller core implements this on top of its
//! transaction engine; tests implement it with mocks.

/// I2C bus master
///
/// All operations are synchronous and blocking and address devices with
/// 7-bit addresses. Register-oriented devices are driven with
/// [`write_read`](Self::write_read): write the register pointer, then read
/// back the requested number of bytes.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read from the same device
    ///
    /// This is commonly used to write a register address then read data.
    /// Implementations are free to realize it as two stopped transactions;
    /// the controller core does exactly that.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `write_data` - Bytes to write (typically register address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error>;
}
