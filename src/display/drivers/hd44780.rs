/*
 *  display/drivers/hd44780.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  HD44780 character LCD driven through a PCF8574 I2C backpack
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

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use linux_embedded_hal::{Delay, I2cdev};
use log::info;

use crate::display::error::DisplayError;
use crate::display::traits::{LcdTransport, LcdCapabilities};

// commands
const LCD_CLEARDISPLAY: u8 = 0b0000_0001;
const LCD_ENTRYMODESET: u8 = 0b0000_0100;
const LCD_DISPLAYCONTROL: u8 = 0b0000_1000;
const LCD_FUNCTIONSET: u8 = 0b0010_0000;
const LCD_SETDDRAMADDR: u8 = 0b1000_0000;

// flags
const LCD_ENTRYLEFT: u8 = 0b0000_0010;
const LCD_DISPLAYON: u8 = 0b0000_0100;
const LCD_2LINE: u8 = 0b0000_1000;

// PCF8574 pin mapping: D7..D4 | BL | EN | RW | RS
const RS_DATA: u8 = 0b0000_0001;
const EN: u8 = 0b0000_0100;
const BL_ON: u8 = 0b0000_1000;

const DEFAULT_CMD_DELAY_US: u32 = 40;
const CLEAR_DELAY_US: u32 = 2_000;

/// HD44780 display driver over a PCF8574 expander
pub struct Hd44780Driver<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    backlight_bit: u8,
    capabilities: LcdCapabilities,
}

impl Hd44780Driver<I2cdev, Delay> {
    /// Open a Linux I2C bus (e.g. "/dev/i2c-1") and bind the panel at `address`.
    pub fn new_i2c(bus: &str, address: u8, rows: usize, columns: usize) -> Result<Self, DisplayError> {
        let i2c = I2cdev::new(bus)
            .map_err(|e| DisplayError::I2cError(format!("Failed to open {}: {}", bus, e)))?;
        info!("HD44780 on {} at 0x{:02X} ({}x{})", bus, address, rows, columns);
        Self::new(i2c, Delay, address, rows, columns)
    }
}

impl<I2C, D> Hd44780Driver<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, address: u8, rows: usize, columns: usize) -> Result<Self, DisplayError> {
        if rows == 0 || rows > 4 || columns == 0 || columns > 40 {
            return Err(DisplayError::InvalidConfiguration(format!(
                "HD44780 supports 1-4 rows of 1-40 columns, got {}x{}", rows, columns
            )));
        }
        Ok(Self {
            i2c,
            delay,
            address,
            backlight_bit: BL_ON,
            capabilities: LcdCapabilities {
                rows,
                columns,
                supports_backlight: true,
            },
        })
    }

    /// Release the bus and delay provider
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn expander_write(&mut self, byte: u8) -> Result<(), DisplayError> {
        let address = self.address;
        self.i2c
            .write(address, &[byte | self.backlight_bit])
            .map_err(|e| DisplayError::I2cError(format!("{:?}", e)))
    }

    // latch the upper nibble of `bits` with an enable pulse
    fn send_nibble(&mut self, bits: u8) -> Result<(), DisplayError> {
        self.expander_write(bits | EN)?;
        self.delay.delay_us(1);
        self.expander_write(bits & !EN)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8, mode: u8, settle_us: u32) -> Result<(), DisplayError> {
        self.send_nibble((byte & 0xF0) | mode)?;
        self.send_nibble(((byte << 4) & 0xF0) | mode)?;
        self.delay.delay_us(settle_us);
        Ok(())
    }

    fn command(&mut self, cmd: u8) -> Result<(), DisplayError> {
        self.write_byte(cmd, 0, DEFAULT_CMD_DELAY_US)
    }

    /// DDRAM address of the first cell of a 1-based row.
    fn row_offset(&self, row: usize) -> u8 {
        let columns = self.capabilities.columns as u8;
        match row {
            1 => 0x00,
            2 => 0x40,
            3 => columns,
            _ => 0x40 + columns,
        }
    }
}

/// Map a char onto the A00 character ROM.
///
/// ASCII passes through; the German letters have ROM slots (uppercase umlauts
/// fall back to the lowercase glyph). Anything else becomes '?'.
pub fn rom_code(glyph: char) -> u8 {
    match glyph {
        'ä' | 'Ä' => 225,
        'ß' => 226,
        'ö' | 'Ö' => 239,
        'ü' | 'Ü' => 245,
        '°' => 223,
        c if c.is_ascii() && !c.is_ascii_control() => c as u8,
        _ => b'?',
    }
}

impl<I2C, D> LcdTransport for Hd44780Driver<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn capabilities(&self) -> &LcdCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        // power-on: wait, then force 8-bit mode three times before dropping to 4-bit
        self.delay.delay_ms(50);
        self.send_nibble(0x30)?;
        self.delay.delay_us(4_100);
        self.send_nibble(0x30)?;
        self.delay.delay_us(100);
        self.send_nibble(0x30)?;
        self.send_nibble(0x20)?;

        let lines = if self.capabilities.rows > 1 { LCD_2LINE } else { 0 };
        self.command(LCD_FUNCTIONSET | lines)?;
        self.command(LCD_DISPLAYCONTROL)?;
        self.clear()?;
        self.command(LCD_ENTRYMODESET | LCD_ENTRYLEFT)?;
        self.command(LCD_DISPLAYCONTROL | LCD_DISPLAYON)
            .map_err(|e| DisplayError::InitializationFailed(e.to_string()))
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DisplayError> {
        self.backlight_bit = if on { BL_ON } else { 0 };
        // the bit rides along with every expander write; push it out now
        self.expander_write(0)
    }

    fn set_cursor(&mut self, row: usize, column: usize) -> Result<(), DisplayError> {
        let pos = self.row_offset(row).wrapping_add(column as u8);
        self.command(LCD_SETDDRAMADDR | pos)
    }

    fn write_glyph(&mut self, glyph: char) -> Result<(), DisplayError> {
        self.write_byte(rom_code(glyph), RS_DATA, DEFAULT_CMD_DELAY_US)
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.write_byte(LCD_CLEARDISPLAY, 0, CLEAR_DELAY_US)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorType, Operation};
    use std::convert::Infallible;

    /// Records every byte pushed to the expander
    #[derive(Default)]
    struct RecordingBus {
        writes: Vec<(u8, u8)>,
    }

    impl ErrorType for RecordingBus {
        type Error = Infallible;
    }

    impl I2c for RecordingBus {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
            for op in operations.iter() {
                if let Operation::Write(bytes) = op {
                    for b in bytes.iter() {
                        self.writes.push((address, *b));
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    // reassemble the bytes latched on falling enable edges
    fn latched(writes: &[(u8, u8)]) -> Vec<(u8, bool)> {
        let nibbles: Vec<u8> = writes
            .windows(2)
            .filter(|w| w[0].1 & EN != 0 && w[1].1 & EN == 0)
            .map(|w| w[1].1)
            .collect();
        nibbles
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| ((c[0] & 0xF0) | (c[1] >> 4), c[0] & RS_DATA != 0))
            .collect()
    }

    #[test]
    fn test_rom_code_mapping() {
        assert_eq!(rom_code('A'), b'A');
        assert_eq!(rom_code('ä'), 225);
        assert_eq!(rom_code('Ü'), 245);
        assert_eq!(rom_code('ß'), 226);
        assert_eq!(rom_code('€'), b'?');
    }

    #[test]
    fn test_set_cursor_row_offsets() {
        let mut lcd = Hd44780Driver::new(RecordingBus::default(), NoDelay, 0x27, 4, 20).unwrap();
        lcd.set_cursor(1, 0).unwrap();
        lcd.set_cursor(2, 1).unwrap();
        lcd.set_cursor(3, 0).unwrap();
        lcd.set_cursor(4, 2).unwrap();

        let (bus, _) = lcd.release();
        let bytes: Vec<u8> = latched(&bus.writes).into_iter().map(|(b, _)| b).collect();
        assert_eq!(bytes, vec![0x80, 0x80 | 0x41, 0x80 | 0x14, 0x80 | 0x56]);
        assert!(bus.writes.iter().all(|(addr, _)| *addr == 0x27));
    }

    #[test]
    fn test_write_glyph_sets_rs() {
        let mut lcd = Hd44780Driver::new(RecordingBus::default(), NoDelay, 0x3F, 2, 16).unwrap();
        lcd.write_glyph('ö').unwrap();

        let (bus, _) = lcd.release();
        assert_eq!(latched(&bus.writes), vec![(239, true)]);
    }

    #[test]
    fn test_backlight_bit() {
        let mut lcd = Hd44780Driver::new(RecordingBus::default(), NoDelay, 0x27, 2, 16).unwrap();
        lcd.set_backlight(false).unwrap();
        lcd.set_backlight(true).unwrap();

        let (bus, _) = lcd.release();
        assert_eq!(bus.writes, vec![(0x27, 0), (0x27, BL_ON)]);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(Hd44780Driver::new(RecordingBus::default(), NoDelay, 0x27, 5, 20).is_err());
        assert!(Hd44780Driver::new(RecordingBus::default(), NoDelay, 0x27, 2, 0).is_err());
    }
}
