/*
 *  display/traits.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Transport abstraction for character displays
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

use crate::display::error::DisplayError;

/// Character display geometry and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdCapabilities {
    /// Number of text rows
    pub rows: usize,

    /// Characters per row
    pub columns: usize,

    /// Whether the backlight can be switched
    pub supports_backlight: bool,
}

/// Minimal hardware abstraction - every character display transport implements this.
///
/// Rows are 1-based, columns 0-based, matching the way lines are registered.
/// The surface serializes all calls; implementations need no locking of their own.
pub trait LcdTransport: Send {
    /// Returns the capabilities of this display
    fn capabilities(&self) -> &LcdCapabilities;

    /// Returns the display dimensions as (rows, columns)
    fn dimensions(&self) -> (usize, usize) {
        let caps = self.capabilities();
        (caps.rows, caps.columns)
    }

    /// Initialize the controller (bus mode, entry mode, display on, cursor off).
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Switch the backlight on or off
    fn set_backlight(&mut self, on: bool) -> Result<(), DisplayError>;

    /// Move the controller's address counter to (row, column).
    fn set_cursor(&mut self, row: usize, column: usize) -> Result<(), DisplayError>;

    /// Write one glyph at the current address; the controller auto-increments.
    fn write_glyph(&mut self, glyph: char) -> Result<(), DisplayError>;

    /// Clear the whole display and home the cursor
    fn clear(&mut self) -> Result<(), DisplayError>;
}

/// Type alias for boxed transport trait objects
pub type BoxedTransport = Box<dyn LcdTransport>;
