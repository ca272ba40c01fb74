/*
 *  display/drivers/virtual_lcd.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  In-memory character display for emulated runs and tests
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

use std::sync::{Arc, Mutex};

use crate::display::error::DisplayError;
use crate::display::traits::{LcdTransport, LcdCapabilities};

/// Most recent transport calls kept in `VirtualLcdState::ops`
pub const OP_LOG_CAPACITY: usize = 4096;

/// One transport call, as recorded by the virtual panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Init,
    Backlight(bool),
    SetCursor(usize, usize),
    Write(char),
    Clear,
}

/// Virtual character display
///
/// Keeps a glyph grid in memory instead of talking to a bus. Useful for:
/// - `--emulated` runs on a desktop
/// - Unit and integration tests
///
/// Clones share the same state, so a test can hand one clone to the surface
/// and keep another to inspect what was written.
#[derive(Debug, Clone)]
pub struct VirtualLcd {
    capabilities: LcdCapabilities,
    state: Arc<Mutex<VirtualLcdState>>,
}

/// Internal state for the virtual panel (shared for inspection)
#[derive(Debug)]
pub struct VirtualLcdState {
    /// Glyph grid, `grid[row - 1][column]`
    pub grid: Vec<Vec<char>>,

    /// Controller address counter (1-based row)
    pub cursor: (usize, usize),

    pub backlight: bool,

    /// Calls in order, at most the last `OP_LOG_CAPACITY`
    pub ops: Vec<TransportOp>,

    pub init_count: usize,
    pub clear_count: usize,
    pub cursor_commands: usize,
    pub glyph_writes: usize,

    /// Simulate bus failures (for error testing)
    pub simulate_failure: bool,
}

impl VirtualLcdState {
    fn blank(rows: usize, columns: usize) -> Self {
        Self {
            grid: vec![vec![' '; columns]; rows],
            cursor: (1, 0),
            backlight: false,
            ops: Vec::new(),
            init_count: 0,
            clear_count: 0,
            cursor_commands: 0,
            glyph_writes: 0,
            simulate_failure: false,
        }
    }

    /// Text of a 1-based row, or an empty string for rows that don't exist
    pub fn row_text(&self, row: usize) -> String {
        row.checked_sub(1)
            .and_then(|idx| self.grid.get(idx))
            .map(|cells| cells.iter().collect())
            .unwrap_or_default()
    }

    /// Glyph writes recorded since the last `reset_counters`
    pub fn writes(&self) -> Vec<char> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                TransportOp::Write(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    pub fn reset_counters(&mut self) {
        self.ops.clear();
        self.cursor_commands = 0;
        self.glyph_writes = 0;
        self.clear_count = 0;
    }

    fn record(&mut self, op: TransportOp) {
        if self.ops.len() >= OP_LOG_CAPACITY {
            self.ops.drain(..OP_LOG_CAPACITY / 2);
        }
        self.ops.push(op);
    }

    fn check(&self) -> Result<(), DisplayError> {
        if self.simulate_failure {
            return Err(DisplayError::I2cError("Simulated bus failure".to_string()));
        }
        Ok(())
    }
}

impl VirtualLcd {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            capabilities: LcdCapabilities {
                rows,
                columns,
                supports_backlight: true,
            },
            state: Arc::new(Mutex::new(VirtualLcdState::blank(rows, columns))),
        }
    }

    /// Get reference to state for inspection
    pub fn state(&self) -> Arc<Mutex<VirtualLcdState>> {
        Arc::clone(&self.state)
    }

    /// Snapshot of every row, top to bottom
    pub fn snapshot(&self) -> Vec<String> {
        match self.state.lock() {
            Ok(state) => (1..=self.capabilities.rows).map(|r| state.row_text(r)).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut VirtualLcdState) -> Result<T, DisplayError>,
    ) -> Result<T, DisplayError> {
        let mut state = self.state.lock().map_err(|_| DisplayError::LockPoisoned)?;
        state.check()?;
        f(&mut state)
    }
}

impl LcdTransport for VirtualLcd {
    fn capabilities(&self) -> &LcdCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        self.with_state(|s| {
            s.init_count += 1;
            s.record(TransportOp::Init);
            Ok(())
        })
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), DisplayError> {
        self.with_state(|s| {
            s.backlight = on;
            s.record(TransportOp::Backlight(on));
            Ok(())
        })
    }

    fn set_cursor(&mut self, row: usize, column: usize) -> Result<(), DisplayError> {
        self.with_state(|s| {
            s.cursor = (row, column);
            s.cursor_commands += 1;
            s.record(TransportOp::SetCursor(row, column));
            Ok(())
        })
    }

    fn write_glyph(&mut self, glyph: char) -> Result<(), DisplayError> {
        self.with_state(|s| {
            let (row, column) = s.cursor;
            // writes past the row end are dropped, the counter still moves
            if let Some(cell) = row.checked_sub(1)
                .and_then(|idx| s.grid.get_mut(idx))
                .and_then(|cells| cells.get_mut(column))
            {
                *cell = glyph;
            }
            s.cursor = (row, column + 1);
            s.glyph_writes += 1;
            s.record(TransportOp::Write(glyph));
            Ok(())
        })
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.with_state(|s| {
            for cells in s.grid.iter_mut() {
                cells.iter_mut().for_each(|c| *c = ' ');
            }
            s.cursor = (1, 0);
            s.clear_count += 1;
            s.record(TransportOp::Clear);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_lcd_creation() {
        let lcd = VirtualLcd::new(4, 20);
        assert_eq!(lcd.dimensions(), (4, 20));
        assert_eq!(lcd.snapshot(), vec![" ".repeat(20); 4]);
    }

    #[test]
    fn test_virtual_lcd_write_advances() {
        let mut lcd = VirtualLcd::new(2, 16);
        lcd.set_cursor(2, 14).unwrap();
        lcd.write_glyph('o').unwrap();
        lcd.write_glyph('k').unwrap();
        lcd.write_glyph('!').unwrap(); // off the end

        let state = lcd.state();
        let state = state.lock().unwrap();
        assert_eq!(state.row_text(2), format!("{}ok", " ".repeat(14)));
        assert_eq!(state.glyph_writes, 3);
        assert_eq!(state.writes(), vec!['o', 'k', '!']);
    }

    #[test]
    fn test_virtual_lcd_clear() {
        let mut lcd = VirtualLcd::new(2, 8);
        lcd.set_cursor(1, 0).unwrap();
        lcd.write_glyph('#').unwrap();
        lcd.clear().unwrap();

        assert_eq!(lcd.snapshot(), vec![" ".repeat(8); 2]);
        assert_eq!(lcd.state().lock().unwrap().clear_count, 1);
    }

    #[test]
    fn test_op_log_is_bounded() {
        let mut lcd = VirtualLcd::new(1, 8);
        for _ in 0..(OP_LOG_CAPACITY * 3) {
            lcd.set_cursor(1, 0).unwrap();
            lcd.write_glyph('z').unwrap();
        }
        let state = lcd.state();
        let state = state.lock().unwrap();
        assert!(state.ops.len() <= OP_LOG_CAPACITY);
        assert_eq!(state.ops.last(), Some(&TransportOp::Write('z')));
        assert_eq!(state.glyph_writes, OP_LOG_CAPACITY * 3);
        assert_eq!(state.cursor_commands, OP_LOG_CAPACITY * 3);
    }

    #[test]
    fn test_virtual_lcd_simulated_failure() {
        let mut lcd = VirtualLcd::new(2, 8);
        lcd.state().lock().unwrap().simulate_failure = true;
        assert!(lcd.write_glyph('x').is_err());

        lcd.state().lock().unwrap().simulate_failure = false;
        assert!(lcd.write_glyph('x').is_ok());
    }
}
