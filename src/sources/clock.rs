/*
 *  sources/clock.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Wall clock on the left, time since start on the right
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

use chrono::{Local, NaiveTime, Timelike};
use std::time::{Duration, Instant};

use super::Content;

/// Clock line content. Recomputed every tick, no query gating.
#[derive(Debug, Clone)]
pub struct ClockSource {
    started: Instant,
}

impl ClockSource {
    pub fn new(now: Instant) -> Self {
        Self { started: now }
    }

    pub fn refresh(&mut self, now: Instant) -> Content {
        let elapsed = now.saturating_duration_since(self.started);
        let (left, right) = compose(Local::now().time(), elapsed);
        Content::Split { left, right }
    }

    /// Elapsed time counts from here on
    pub fn restart(&mut self, now: Instant) {
        self.started = now;
    }
}

/// (`HH:MM:SS` wall time, `HH:MM:SS` elapsed). Elapsed hours wrap at 24.
pub fn compose(wall: NaiveTime, elapsed: Duration) -> (String, String) {
    let left = format!("{:02}:{:02}:{:02}", wall.hour(), wall.minute(), wall.second());
    let secs = elapsed.as_secs();
    let right = format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs % 3600) / 60,
        secs % 60
    );
    (left, right)
}
