/*
 *  display/factory.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Transport factory - picks and initializes the panel from configuration
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use crate::config::{DisplayConfig, DriverKind, BusConfig};
use crate::display::drivers::virtual_lcd::VirtualLcd;
use crate::display::error::DisplayFactoryError;
use crate::display::traits::{BoxedTransport, LcdTransport};
use log::info;

#[cfg(feature = "driver-hd44780")]
use crate::display::drivers::hd44780::Hd44780Driver;

/// Factory for creating display transports from configuration
pub struct DisplayDriverFactory;

impl DisplayDriverFactory {
    /// Create and initialize a transport.
    ///
    /// The driver defaults to `hd44780`; a missing bus section means the
    /// usual backpack at `/dev/i2c-1`, address 0x27.
    pub fn create_from_config(config: &DisplayConfig) -> Result<BoxedTransport, DisplayFactoryError> {
        let mut transport = Self::build(config)?;
        transport.init()?;
        let (rows, columns) = transport.dimensions();
        info!("{:?} transport ready, {}x{}", config.driver.unwrap_or(DriverKind::Hd44780), rows, columns);
        Ok(transport)
    }

    /// An initialized in-memory panel; keep a clone to look at it.
    pub fn create_virtual(config: &DisplayConfig) -> Result<VirtualLcd, DisplayFactoryError> {
        let mut lcd = VirtualLcd::new(config.rows(), config.columns());
        lcd.init()?;
        Ok(lcd)
    }

    fn build(config: &DisplayConfig) -> Result<BoxedTransport, DisplayFactoryError> {
        let (rows, columns) = (config.rows(), config.columns());
        match config.driver.unwrap_or(DriverKind::Hd44780) {
            DriverKind::Virtual => Ok(Box::new(VirtualLcd::new(rows, columns))),
            DriverKind::Hd44780 => Self::build_hd44780(config),
        }
    }

    #[cfg(feature = "driver-hd44780")]
    fn build_hd44780(config: &DisplayConfig) -> Result<BoxedTransport, DisplayFactoryError> {
        use crate::config::{DEFAULT_I2C_ADDRESS, DEFAULT_I2C_BUS};
        let (bus, address) = match config.bus.as_ref() {
            Some(BusConfig::I2c { bus, address }) => (bus.as_str(), *address),
            None => (DEFAULT_I2C_BUS, DEFAULT_I2C_ADDRESS),
        };
        info!("opening HD44780 on {} at 0x{:02X}", bus, address);
        let driver = Hd44780Driver::new_i2c(bus, address, config.rows(), config.columns())?;
        Ok(Box::new(driver))
    }

    #[cfg(not(feature = "driver-hd44780"))]
    fn build_hd44780(config: &DisplayConfig) -> Result<BoxedTransport, DisplayFactoryError> {
        if config.bus.is_none() {
            return Err(DisplayFactoryError::NoBusConfiguration);
        }
        Err(DisplayFactoryError::DriverNotEnabled("driver-hd44780"))
    }
}
