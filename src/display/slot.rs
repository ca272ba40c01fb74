/*
 *  display/slot.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Line state behind its lock, and the handle callers keep
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

use log::warn;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::display::error::LineError;
use crate::display::line::{Align, LineRenderer};
use crate::sources::{Content, LineSource};

/// Everything one line owns. Whoever holds the lock may touch its row.
pub struct LineState {
    name: String,
    pub(crate) renderer: LineRenderer,
    source: LineSource,
    align: Align,
    pub(crate) retired: bool,
}

pub type SharedLine = Arc<Mutex<LineState>>;

impl LineState {
    pub fn new(name: &str, renderer: LineRenderer, source: LineSource, align: Align) -> Self {
        Self {
            name: name.to_string(),
            renderer,
            source,
            align,
            retired: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn renderer(&self) -> &LineRenderer {
        &self.renderer
    }

    /// One scheduler tick: pull content, step the marquee, draw the diff.
    /// Only transport failures come back as errors.
    pub async fn tick(&mut self, now: Instant) -> Result<(), LineError> {
        if let Some(content) = self.source.refresh(now).await {
            if let Err(e) = self.apply(content, now) {
                match e {
                    LineError::Transport(_) => return Err(e),
                    other => warn!("line '{}': {}", self.name, other),
                }
            }
        }
        self.renderer.advance_marquee(now);
        self.renderer.render()?;
        Ok(())
    }

    fn apply(&mut self, content: Content, now: Instant) -> Result<(), LineError> {
        match content {
            Content::Text(text) => {
                self.renderer.update_text(&text, self.align, now)?;
            }
            Content::Split { left, right } => {
                self.renderer.clear_text();
                self.renderer.set_text_left(&left)?;
                self.renderer.set_text_right(&right)?;
            }
        }
        Ok(())
    }

    /// Panel was cleared while suspended: forget what is on it and start
    /// the source over.
    pub fn resume(&mut self, now: Instant) {
        self.renderer.reset_continuity();
        self.source.resume(now);
    }
}

/// Caller side reference to a registered line
#[derive(Clone)]
pub struct LineHandle {
    name: String,
    row: usize,
    shared: SharedLine,
}

impl LineHandle {
    pub(crate) fn new(name: &str, row: usize, shared: SharedLine) -> Self {
        Self { name: name.to_string(), row, shared }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub async fn is_retired(&self) -> bool {
        self.shared.lock().await.retired
    }

    /// Logical text of the line
    pub async fn text(&self) -> Result<String, LineError> {
        let line = self.shared.lock().await;
        if line.retired {
            return Err(LineError::Retired(self.name.clone()));
        }
        Ok(line.renderer.text().to_string())
    }

    /// The row as it should currently look
    pub async fn visible_window(&self) -> Result<String, LineError> {
        let line = self.shared.lock().await;
        if line.retired {
            return Err(LineError::Retired(self.name.clone()));
        }
        Ok(line.renderer.visible_window().into_iter().collect())
    }

    /// Replace the text now. Waits while the display is in standby.
    pub async fn set_text(&self, text: &str, align: Align) -> Result<(), LineError> {
        let mut line = self.shared.lock().await;
        if line.retired {
            return Err(LineError::Retired(self.name.clone()));
        }
        line.renderer.set_text(text, align, Instant::now())
    }
}
