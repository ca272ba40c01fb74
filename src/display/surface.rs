/*
 *  display/surface.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared, lock-protected access to the physical display
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

use std::sync::{Mutex, MutexGuard};
use log::debug;

use crate::display::error::DisplayError;
use crate::display::traits::BoxedTransport;

struct SurfaceState {
    transport: BoxedTransport,
    // last position actually written, None after a clear
    cursor: Option<(usize, usize)>,
    backlight_on: bool,
}

/// The one physical display, shared by every line.
///
/// All mutation goes through a single mutex. It is a plain std mutex: no
/// operation here awaits, so it is never held across a suspension point.
pub struct DisplaySurface {
    rows: usize,
    columns: usize,
    state: Mutex<SurfaceState>,
}

impl DisplaySurface {
    /// Wrap an initialized transport. Geometry is taken from its capabilities.
    pub fn new(transport: BoxedTransport) -> Self {
        let (rows, columns) = transport.dimensions();
        Self {
            rows,
            columns,
            state: Mutex::new(SurfaceState {
                transport,
                cursor: None,
                backlight_on: false,
            }),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Last position written, or None when unknown (startup, after a clear).
    pub fn cursor(&self) -> Result<Option<(usize, usize)>, DisplayError> {
        Ok(self.lock()?.cursor)
    }

    pub fn backlight_on(&self) -> Result<bool, DisplayError> {
        Ok(self.lock()?.backlight_on)
    }

    pub fn set_backlight(&self, on: bool) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        state.transport.set_backlight(on)?;
        state.backlight_on = on;
        debug!("backlight {}", if on { "on" } else { "off" });
        Ok(())
    }

    pub fn set_position(&self, row: usize, column: usize) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        self.set_position_locked(&mut state, row, column)
    }

    /// Write one glyph at (row, column), moving the cursor only if needed.
    pub fn write_glyph_at(&self, row: usize, column: usize, glyph: char) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        if state.cursor != Some((row, column)) {
            self.set_position_locked(&mut state, row, column)?;
        }
        state.transport.write_glyph(glyph)?;
        state.cursor = Some((row, column + 1));
        Ok(())
    }

    pub fn clear_and_blank(&self) -> Result<(), DisplayError> {
        let mut state = self.lock()?;
        state.transport.clear()?;
        state.cursor = None;
        Ok(())
    }

    // Caller already holds the lock; never re-acquires.
    fn set_position_locked(
        &self,
        state: &mut SurfaceState,
        row: usize,
        column: usize,
    ) -> Result<(), DisplayError> {
        if row < 1 || row > self.rows || column >= self.columns {
            return Err(DisplayError::InvalidPosition {
                row,
                column,
                rows: self.rows,
                columns: self.columns,
            });
        }
        state.transport.set_cursor(row, column)?;
        state.cursor = Some((row, column));
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SurfaceState>, DisplayError> {
        self.state.lock().map_err(|_| DisplayError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::virtual_lcd::{VirtualLcd, TransportOp};

    fn surface() -> (DisplaySurface, VirtualLcd) {
        let lcd = VirtualLcd::new(4, 20);
        (DisplaySurface::new(Box::new(lcd.clone())), lcd)
    }

    #[test]
    fn test_sequential_writes_skip_position_commands() {
        let (surface, lcd) = surface();

        surface.write_glyph_at(2, 0, 'a').unwrap();
        surface.write_glyph_at(2, 1, 'b').unwrap();
        surface.write_glyph_at(2, 2, 'c').unwrap();

        let state = lcd.state();
        let state = state.lock().unwrap();
        assert_eq!(state.cursor_commands, 1);
        assert_eq!(state.glyph_writes, 3);
        assert_eq!(state.row_text(2), "abc                 ");
        drop(state);
        assert_eq!(surface.cursor().unwrap(), Some((2, 3)));
    }

    #[test]
    fn test_gap_forces_reposition() {
        let (surface, lcd) = surface();

        surface.write_glyph_at(1, 0, 'x').unwrap();
        surface.write_glyph_at(1, 5, 'y').unwrap();

        let ops = lcd.state().lock().unwrap().ops.clone();
        assert_eq!(ops, vec![
            TransportOp::SetCursor(1, 0),
            TransportOp::Write('x'),
            TransportOp::SetCursor(1, 5),
            TransportOp::Write('y'),
        ]);
    }

    #[test]
    fn test_invalid_positions_rejected() {
        let (surface, _lcd) = surface();

        assert!(matches!(surface.set_position(0, 0), Err(DisplayError::InvalidPosition { .. })));
        assert!(matches!(surface.set_position(5, 0), Err(DisplayError::InvalidPosition { .. })));
        assert!(matches!(surface.write_glyph_at(1, 20, 'z'), Err(DisplayError::InvalidPosition { .. })));
        assert!(surface.set_position(4, 19).is_ok());
    }

    #[test]
    fn test_clear_forgets_cursor() {
        let (surface, lcd) = surface();

        surface.write_glyph_at(3, 0, 'q').unwrap();
        surface.clear_and_blank().unwrap();
        assert_eq!(surface.cursor().unwrap(), None);

        // same spot again must re-issue the position
        surface.write_glyph_at(3, 1, 'r').unwrap();
        assert_eq!(lcd.state().lock().unwrap().cursor_commands, 2);
    }

    #[test]
    fn test_backlight_tracks_state() {
        let (surface, lcd) = surface();

        surface.set_backlight(true).unwrap();
        assert!(surface.backlight_on().unwrap());
        surface.set_backlight(false).unwrap();
        assert!(!surface.backlight_on().unwrap());
        assert!(!lcd.state().lock().unwrap().backlight);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let (surface, lcd) = surface();
        lcd.state().lock().unwrap().simulate_failure = true;

        assert!(matches!(surface.write_glyph_at(1, 0, 'a'), Err(DisplayError::I2cError(_))));
        // failed write leaves the cursor untouched
        assert_eq!(surface.cursor().unwrap(), None);
    }
}
