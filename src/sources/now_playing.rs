/*
 *  sources/now_playing.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Now playing tag from a music server, rate limited
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
use std::time::{Duration, Instant};

use super::{Content, LmsClient, MpdClient, QueryGate, SourceError, NO_DATA};

pub enum NowPlayingClient {
    Mpd(MpdClient),
    Lms(LmsClient),
}

impl NowPlayingClient {
    async fn current_tag(&self, tag: &str) -> Result<Option<String>, SourceError> {
        match self {
            NowPlayingClient::Mpd(mpd) => mpd.current_tag(tag).await,
            NowPlayingClient::Lms(lms) => lms.current_tag(tag).await,
        }
    }
}

pub struct NowPlayingSource {
    client: NowPlayingClient,
    tag: String,
    gate: QueryGate,
    last_good: Option<String>,
}

impl NowPlayingSource {
    pub fn new(client: NowPlayingClient, tag: &str, query_interval: Duration) -> Self {
        Self {
            client,
            tag: tag.to_string(),
            gate: QueryGate::new(query_interval),
            last_good: None,
        }
    }

    pub fn client_kind(&self) -> &'static str {
        match self.client {
            NowPlayingClient::Mpd(_) => "mpd",
            NowPlayingClient::Lms(_) => "lms",
        }
    }

    /// Query when the gate allows. A failed query keeps the last good text,
    /// or shows the no data marker if there never was one.
    pub async fn refresh(&mut self, now: Instant) -> Option<Content> {
        if !self.gate.due(now) {
            return None;
        }
        self.gate.mark(now);

        match self.client.current_tag(&self.tag).await {
            Ok(value) => {
                let text = value.unwrap_or_default();
                self.last_good = Some(text.clone());
                Some(Content::Text(text))
            }
            Err(e) => {
                warn!("{} query for '{}' failed: {}", self.client_kind(), self.tag, e);
                let text = self.last_good.clone().unwrap_or_else(|| NO_DATA.to_string());
                Some(Content::Text(text))
            }
        }
    }

    pub fn reset(&mut self) {
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers `replies` connections in order, then stops listening.
    async fn fake_mpd(replies: Vec<&'static str>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                socket.write_all(b"OK MPD 0.23.5\n").await.unwrap();
                let mut buf = [0u8; 64];
                let _ = socket.read(&mut buf).await;
                socket.write_all(reply.as_bytes()).await.unwrap();
            }
        });
        port
    }

    #[tokio::test]
    async fn test_gated_queries() {
        let port = fake_mpd(vec!["Title: First\nOK\n", "Title: Second\nOK\n"]).await;
        let client = NowPlayingClient::Mpd(MpdClient::new("127.0.0.1", port));
        let mut source = NowPlayingSource::new(client, "title", Duration::from_secs(5));
        let t0 = Instant::now();

        assert_eq!(source.refresh(t0).await, Some(Content::Text("First".into())));
        assert_eq!(source.refresh(t0 + Duration::from_secs(1)).await, None);
        assert_eq!(
            source.refresh(t0 + Duration::from_secs(5)).await,
            Some(Content::Text("Second".into()))
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good() {
        let port = fake_mpd(vec!["Title: Only\nOK\n", "ACK [50@0] {currentsong} boom\n"]).await;
        let client = NowPlayingClient::Mpd(MpdClient::new("127.0.0.1", port));
        let mut source = NowPlayingSource::new(client, "title", Duration::from_secs(5));
        let t0 = Instant::now();

        assert_eq!(source.refresh(t0).await, Some(Content::Text("Only".into())));
        source.reset();
        assert_eq!(source.refresh(t0).await, Some(Content::Text("Only".into())));
    }

    #[tokio::test]
    async fn test_never_reached_shows_no_data() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = NowPlayingClient::Mpd(MpdClient::new("127.0.0.1", port));
        let mut source = NowPlayingSource::new(client, "name", Duration::from_secs(5));
        assert_eq!(
            source.refresh(Instant::now()).await,
            Some(Content::Text(NO_DATA.into()))
        );
        assert_eq!(source.client_kind(), "mpd");
    }
}
