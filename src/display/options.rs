/*
 *  display/options.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-line timing and alignment options
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

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::display::line::Align;
use crate::display::marquee::MarqueeTiming;

/// Options every line accepts. All durations are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineOptions {
    /// Tick period of the line's scheduler
    pub refresh_interval: f64,
    /// Marquee step period
    pub step_interval: f64,
    /// Marquee dwell at offset 0
    pub start_duration: f64,
    /// Marquee dwell at the last offset
    pub end_duration: f64,
    /// Minimum time between source queries; the source picks a default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_interval: Option<f64>,
    pub align: Align,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            refresh_interval: 0.5,
            step_interval: 0.5,
            start_duration: 3.0,
            end_duration: 5.0,
            query_interval: None,
            align: Align::Left,
        }
    }
}

fn secs(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value)
        .or_else(|_| Duration::try_from_secs_f64(fallback))
        .unwrap_or_default()
}

/// Like `secs`, but a period never comes out as zero.
fn period(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .or_else(|| Duration::try_from_secs_f64(fallback).ok())
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_millis(500))
}

impl LineOptions {
    pub fn with_align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn with_refresh(mut self, refresh_interval: f64) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        period(self.refresh_interval, 0.5)
    }

    pub fn query_interval_or(&self, default_secs: f64) -> Duration {
        period(self.query_interval.unwrap_or(default_secs), default_secs)
    }

    pub fn timing(&self) -> MarqueeTiming {
        MarqueeTiming {
            step_interval: period(self.step_interval, 0.5),
            start_duration: secs(self.start_duration, 3.0),
            end_duration: secs(self.end_duration, 5.0),
        }
    }

    /// Every interval finite and at least a nanosecond; durations finite
    /// and not negative.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("refresh_interval", Some(self.refresh_interval)),
            ("step_interval", Some(self.step_interval)),
            ("query_interval", self.query_interval),
        ];
        for (name, value) in positive {
            if let Some(v) = value {
                let nonzero = Duration::try_from_secs_f64(v).is_ok_and(|d| !d.is_zero());
                if !nonzero {
                    return Err(format!("{} must be a positive number of seconds, got {}", name, v));
                }
            }
        }
        for (name, v) in [("start_duration", self.start_duration), ("end_duration", self.end_duration)] {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{} must not be negative, got {}", name, v));
            }
        }
        Ok(())
    }
}
