/*
 *  sources/mod.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Content sources: what each line should show right now
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

pub mod clock;
pub mod fetch;
pub mod lms;
pub mod mpd;
pub mod now_playing;

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::SourceConfig;
use crate::display::options::LineOptions;

pub use clock::ClockSource;
pub use fetch::{FetchSource, TextEncoding};
pub use lms::LmsClient;
pub use mpd::MpdClient;
pub use now_playing::{NowPlayingClient, NowPlayingSource};

/// Shown when a source has never produced anything usable
pub const NO_DATA: &str = "NO DATA";

const DEFAULT_QUERY_SECS: f64 = 5.0;
const DEFAULT_FETCH_SECS: f64 = 60.0;

/// Failures inside a content source. Never leave the source: they are
/// logged and replaced with the last good text.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Fresh content for a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Whole-line text, aligned by the line's own alignment
    Text(String),
    /// Left and right justified halves of one row
    Split { left: String, right: String },
}

/// Rate limit for sources that are expensive to ask.
#[derive(Debug, Clone)]
pub struct QueryGate {
    interval: Duration,
    last: Option<Instant>,
}

impl QueryGate {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Always due before the first query.
    pub fn due(&self, now: Instant) -> bool {
        self.last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Fixed text, emitted once and again after every resume
#[derive(Debug, Clone)]
pub struct StaticSource {
    text: String,
    pending: bool,
}

impl StaticSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), pending: true }
    }

    fn refresh(&mut self) -> Option<Content> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(Content::Text(self.text.clone()))
    }
}

/// The closed set of things a line can show
pub enum LineSource {
    Clock(ClockSource),
    Static(StaticSource),
    NowPlaying(NowPlayingSource),
    Fetch(FetchSource),
}

impl LineSource {
    /// Build a source from configuration. Must run inside the tokio runtime
    /// (fetch sources spawn their background task here).
    pub fn from_config(
        config: &SourceConfig,
        options: &LineOptions,
        now: Instant,
    ) -> Result<Self, SourceError> {
        let source = match config {
            SourceConfig::Clock => LineSource::Clock(ClockSource::new(now)),
            SourceConfig::Text { text } => LineSource::Static(StaticSource::new(text.clone())),
            SourceConfig::Mpd { host, port, tag } => {
                let client = MpdClient::new(
                    host.as_deref().unwrap_or(mpd::DEFAULT_HOST),
                    port.unwrap_or(mpd::DEFAULT_PORT),
                );
                LineSource::NowPlaying(NowPlayingSource::new(
                    NowPlayingClient::Mpd(client),
                    tag,
                    options.query_interval_or(DEFAULT_QUERY_SECS),
                ))
            }
            SourceConfig::Lms { host, port, player, tag } => {
                let client = LmsClient::new(host, port.unwrap_or(lms::DEFAULT_PORT), player)?;
                LineSource::NowPlaying(NowPlayingSource::new(
                    NowPlayingClient::Lms(client),
                    tag,
                    options.query_interval_or(DEFAULT_QUERY_SECS),
                ))
            }
            SourceConfig::Fetch { url, encoding } => LineSource::Fetch(FetchSource::spawn(
                url,
                encoding.unwrap_or_default(),
                options.query_interval_or(DEFAULT_FETCH_SECS),
            )?),
        };
        Ok(source)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LineSource::Clock(_) => "clock",
            LineSource::Static(_) => "text",
            LineSource::NowPlaying(np) => np.client_kind(),
            LineSource::Fetch(_) => "fetch",
        }
    }

    /// New content if there is any to apply this tick.
    pub async fn refresh(&mut self, now: Instant) -> Option<Content> {
        match self {
            LineSource::Clock(clock) => Some(clock.refresh(now)),
            LineSource::Static(fixed) => fixed.refresh(),
            LineSource::NowPlaying(np) => np.refresh(now).await,
            LineSource::Fetch(fetch) => fetch.refresh(now),
        }
    }

    /// Forget gating state so the next refresh starts a fresh cycle.
    pub fn resume(&mut self, now: Instant) {
        match self {
            LineSource::Clock(clock) => clock.restart(now),
            LineSource::Static(fixed) => fixed.pending = true,
            LineSource::NowPlaying(np) => np.reset(),
            LineSource::Fetch(fetch) => fetch.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_gate() {
        let t0 = Instant::now();
        let mut gate = QueryGate::new(Duration::from_secs(5));
        assert!(gate.due(t0));
        gate.mark(t0);
        assert!(!gate.due(t0 + Duration::from_millis(4_999)));
        assert!(gate.due(t0 + Duration::from_secs(5)));
        gate.reset();
        assert!(gate.due(t0));
    }

    #[tokio::test]
    async fn test_static_source_emits_once_per_cycle() {
        let now = Instant::now();
        let mut source = LineSource::Static(StaticSource::new("hello"));
        assert_eq!(source.refresh(now).await, Some(Content::Text("hello".to_string())));
        assert_eq!(source.refresh(now).await, None);

        source.resume(now);
        assert_eq!(source.refresh(now).await, Some(Content::Text("hello".to_string())));
        assert_eq!(source.kind(), "text");
    }
}
