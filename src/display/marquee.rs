/*
 *  display/marquee.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Variable speed marquee: long dwell at both ends, even steps between
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

use std::time::{Duration, Instant};

/// Marquee timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarqueeTiming {
    /// Time between steps while scrolling
    pub step_interval: Duration,
    /// Dwell on offset 0 before the first step
    pub start_duration: Duration,
    /// Dwell on the last offset before wrapping
    pub end_duration: Duration,
}

impl Default for MarqueeTiming {
    fn default() -> Self {
        Self {
            step_interval: Duration::from_millis(500),
            start_duration: Duration::from_secs(3),
            end_duration: Duration::from_secs(5),
        }
    }
}

/// Where the marquee is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarqueePhase {
    /// Text fits, nothing moves
    Idle,
    HoldStart,
    Scrolling,
    HoldEnd,
}

/// Scroll state for one line
#[derive(Debug, Clone)]
pub struct Marquee {
    timing: MarqueeTiming,
    offset: usize,
    max_offset: usize,
    last_step: Option<Instant>,
}

impl Marquee {
    pub fn new(timing: MarqueeTiming) -> Self {
        Self {
            timing,
            offset: 0,
            max_offset: 0,
            last_step: None,
        }
    }

    /// Restart the cycle for text of `text_len` chars on a `columns` wide row.
    pub fn reset(&mut self, text_len: usize, columns: usize, now: Instant) {
        self.offset = 0;
        self.max_offset = text_len.saturating_sub(columns);
        self.last_step = Some(now);
    }

    /// Forget everything; the next `reset` starts a fresh cycle.
    pub fn clear(&mut self) {
        self.offset = 0;
        self.max_offset = 0;
        self.last_step = None;
    }

    pub fn is_active(&self) -> bool {
        self.max_offset > 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn max_offset(&self) -> usize {
        self.max_offset
    }

    pub fn timing(&self) -> MarqueeTiming {
        self.timing
    }

    pub fn phase(&self) -> MarqueePhase {
        if !self.is_active() {
            MarqueePhase::Idle
        } else if self.offset == 0 {
            MarqueePhase::HoldStart
        } else if self.offset == self.max_offset {
            MarqueePhase::HoldEnd
        } else {
            MarqueePhase::Scrolling
        }
    }

    /// Evaluate the transition rule once. Returns true if the offset moved.
    pub fn advance(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_step else {
            return false;
        };
        if !self.is_active() {
            return false;
        }

        let elapsed = now.saturating_duration_since(last);
        let due = match self.phase() {
            MarqueePhase::HoldStart => elapsed >= self.timing.start_duration,
            MarqueePhase::HoldEnd => elapsed >= self.timing.end_duration,
            MarqueePhase::Scrolling => elapsed >= self.timing.step_interval,
            MarqueePhase::Idle => false,
        };
        if due {
            self.step(now);
        }
        due
    }

    fn step(&mut self, now: Instant) {
        self.offset += 1;
        if self.offset > self.max_offset {
            self.offset = 0;
        }
        self.last_step = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> MarqueeTiming {
        MarqueeTiming {
            step_interval: Duration::from_millis(500),
            start_duration: Duration::from_secs(3),
            end_duration: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_short_text_is_idle() {
        let t0 = Instant::now();
        let mut m = Marquee::new(timing());
        m.reset(12, 20, t0);
        assert_eq!(m.phase(), MarqueePhase::Idle);
        assert!(!m.advance(t0 + Duration::from_secs(60)));
        assert_eq!(m.offset(), 0);
    }

    #[test]
    fn test_no_step_before_reset() {
        let mut m = Marquee::new(timing());
        assert!(!m.advance(Instant::now()));
    }

    #[test]
    fn test_one_char_overflow_cycle() {
        // 21 chars on 20 columns: offsets 0 and 1 only
        let t0 = Instant::now();
        let mut m = Marquee::new(timing());
        m.reset(21, 20, t0);
        assert_eq!(m.max_offset(), 1);

        assert!(!m.advance(t0 + Duration::from_millis(2_999)));
        assert!(m.advance(t0 + Duration::from_secs(3)));
        assert_eq!(m.offset(), 1);
        assert_eq!(m.phase(), MarqueePhase::HoldEnd);

        let t1 = t0 + Duration::from_secs(3);
        // a step interval is not enough at the end
        assert!(!m.advance(t1 + Duration::from_millis(500)));
        assert!(!m.advance(t1 + Duration::from_millis(4_999)));
        assert!(m.advance(t1 + Duration::from_secs(5)));
        assert_eq!(m.offset(), 0);
        assert_eq!(m.phase(), MarqueePhase::HoldStart);
    }

    #[test]
    fn test_full_cycle_visits_each_offset_once() {
        let t0 = Instant::now();
        let timing = timing();
        let mut m = Marquee::new(timing);
        m.reset(25, 20, t0);

        let mut now = t0 + timing.start_duration;
        let mut visited = vec![m.offset()];
        assert!(m.advance(now));
        visited.push(m.offset());

        while m.offset() != m.max_offset() {
            // never early
            assert!(!m.advance(now + timing.step_interval - Duration::from_millis(1)));
            now += timing.step_interval;
            assert!(m.advance(now));
            visited.push(m.offset());
        }
        assert_eq!(visited, vec![0, 1, 2, 3, 4, 5]);

        assert!(!m.advance(now + timing.step_interval));
        now += timing.end_duration;
        assert!(m.advance(now));
        assert_eq!(m.offset(), 0);

        // and the start hold applies again
        assert!(!m.advance(now + timing.step_interval));
        assert!(m.advance(now + timing.start_duration));
        assert_eq!(m.offset(), 1);
    }

    #[test]
    fn test_clear_stops_stepping() {
        let t0 = Instant::now();
        let mut m = Marquee::new(timing());
        m.reset(30, 20, t0);
        m.clear();
        assert_eq!(m.phase(), MarqueePhase::Idle);
        assert!(!m.advance(t0 + Duration::from_secs(10)));
    }
}
