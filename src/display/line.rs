/*
 *  display/line.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-line text state, marquee window and diffed rendering
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

use std::sync::Arc;
use std::time::Instant;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::display::error::{DisplayError, LineError};
use crate::display::marquee::{Marquee, MarqueeTiming};
use crate::display::surface::DisplaySurface;

/// Horizontal alignment for text that fits the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Pad `text` to `columns` according to `align`.
///
/// Text at least `columns` wide comes back untouched; the caller scrolls it.
/// Center puts floor(pad/2) spaces before and ceil(pad/2) after.
pub fn format_text(text: &str, columns: usize, align: Align) -> String {
    let len = text.chars().count();
    if len >= columns {
        return text.to_string();
    }
    let pad = columns - len;
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(pad)),
        Align::Right => format!("{}{}", " ".repeat(pad), text),
        Align::Center => {
            let before = pad / 2;
            format!("{}{}{}", " ".repeat(before), text, " ".repeat(pad - before))
        }
    }
}

/// Renders one logical line onto its row of the shared surface.
///
/// Only glyphs that differ from the last rendered window are written.
pub struct LineRenderer {
    surface: Arc<DisplaySurface>,
    row: usize,
    columns: usize,
    text: String,
    marquee: Marquee,
    last_rendered: Vec<char>,
}

impl LineRenderer {
    pub fn new(surface: Arc<DisplaySurface>, row: usize, timing: MarqueeTiming) -> Self {
        let columns = surface.columns();
        Self {
            surface,
            row,
            columns,
            text: String::new(),
            marquee: Marquee::new(timing),
            last_rendered: vec![' '; columns],
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Current logical text (padded when it fits, raw when it scrolls)
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn marquee(&self) -> &Marquee {
        &self.marquee
    }

    /// What was last written to the row
    pub fn last_rendered(&self) -> String {
        self.last_rendered.iter().collect()
    }

    pub fn format_text(&self, text: &str, align: Align) -> String {
        format_text(text, self.columns, align)
    }

    /// Replace the text, restart the marquee and render straight away.
    pub fn set_text(&mut self, text: &str, align: Align, now: Instant) -> Result<(), LineError> {
        let len = text.chars().count();
        self.text = if len > self.columns {
            text.to_string()
        } else {
            self.format_text(text, align)
        };
        self.marquee.reset(self.text.chars().count(), self.columns, now);
        if self.marquee.is_active() {
            debug!("row {} marquee on, {} chars", self.row, len);
        }
        self.render()?;
        Ok(())
    }

    /// `set_text` only if the formatted text differs from what is shown.
    pub fn update_text(&mut self, text: &str, align: Align, now: Instant) -> Result<bool, LineError> {
        if self.format_text(text, align) == self.text {
            return Ok(false);
        }
        self.set_text(text, align, now)?;
        Ok(true)
    }

    /// Keep the left part of the current text, right-justify `fragment` after it.
    pub fn set_text_right(&mut self, fragment: &str) -> Result<(), LineError> {
        let kept = self.text.trim_end_matches(' ').to_string();
        let gap = self.gap_for(&kept, fragment)?;
        self.text = format!("{}{}{}", kept, " ".repeat(gap), fragment);
        self.marquee.clear();
        Ok(())
    }

    /// Keep the right part of the current text, left-justify `fragment` before it.
    pub fn set_text_left(&mut self, fragment: &str) -> Result<(), LineError> {
        let kept = self.text.trim_start_matches(' ').to_string();
        let gap = self.gap_for(&kept, fragment)?;
        self.text = format!("{}{}{}", fragment, " ".repeat(gap), kept);
        self.marquee.clear();
        Ok(())
    }

    fn gap_for(&self, kept: &str, fragment: &str) -> Result<usize, LineError> {
        let length = kept.chars().count() + fragment.chars().count();
        if length > self.columns {
            return Err(LineError::LineTooLong { columns: self.columns, length });
        }
        Ok(self.columns - length)
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
        self.marquee.clear();
    }

    /// One evaluation of the marquee rule
    pub fn advance_marquee(&mut self, now: Instant) -> bool {
        self.marquee.advance(now)
    }

    /// The `columns` wide slice of the text at the current offset
    pub fn visible_window(&self) -> Vec<char> {
        let mut window: Vec<char> = self
            .text
            .chars()
            .skip(self.marquee.offset())
            .take(self.columns)
            .collect();
        window.resize(self.columns, ' ');
        window
    }

    /// Write the glyphs that changed since the last render.
    /// Returns how many glyphs went out.
    pub fn render(&mut self) -> Result<usize, DisplayError> {
        let window = self.visible_window();
        let mut written = 0;
        for (column, glyph) in window.iter().enumerate() {
            if self.last_rendered[column] != *glyph {
                self.surface.write_glyph_at(self.row, column, *glyph)?;
                self.last_rendered[column] = *glyph;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Fill the row with spaces, no diffing.
    pub fn blank(&mut self) -> Result<(), DisplayError> {
        for column in 0..self.columns {
            self.surface.write_glyph_at(self.row, column, ' ')?;
        }
        self.last_rendered = vec![' '; self.columns];
        Ok(())
    }

    /// Drop render continuity after the panel was cleared behind our back.
    pub fn reset_continuity(&mut self) {
        self.last_rendered = vec![' '; self.columns];
        self.clear_text();
    }
}
