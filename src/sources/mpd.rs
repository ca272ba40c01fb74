/*
 *  sources/mpd.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Minimal MPD text protocol client: currentsong only
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

use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::SourceError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6600;
const TIMEOUT: Duration = Duration::from_secs(10);

/// One connection per query. MPD drops idle clients, so nothing is kept open.
#[derive(Debug, Clone)]
pub struct MpdClient {
    addr: String,
    timeout: Duration,
}

impl MpdClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            timeout: TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `currentsong` as a map with lower-cased keys.
    pub async fn current_song(&self) -> Result<HashMap<String, String>, SourceError> {
        tokio::time::timeout(self.timeout, self.query("currentsong"))
            .await
            .map_err(|_| SourceError::Timeout(self.timeout))?
    }

    /// One tag of the current song; None when MPD does not report it.
    pub async fn current_tag(&self, tag: &str) -> Result<Option<String>, SourceError> {
        let mut song = self.current_song().await?;
        Ok(song.remove(&tag.to_lowercase()))
    }

    async fn query(&self, command: &str) -> Result<HashMap<String, String>, SourceError> {
        let stream = TcpStream::connect(&self.addr).await?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let greeting = lines
            .next_line()
            .await?
            .ok_or_else(|| SourceError::Protocol("connection closed before greeting".into()))?;
        if !greeting.starts_with("OK MPD ") {
            return Err(SourceError::Protocol(format!("unexpected greeting '{}'", greeting)));
        }
        debug!("mpd {} says {}", self.addr, greeting);

        writer.write_all(format!("{}\n", command).as_bytes()).await?;
        writer.flush().await?;

        let mut fields = HashMap::new();
        loop {
            let line = lines
                .next_line()
                .await?
                .ok_or_else(|| SourceError::Protocol("connection closed mid response".into()))?;
            if line == "OK" {
                break;
            }
            if line.starts_with("ACK") {
                return Err(SourceError::Protocol(line));
            }
            if let Some((key, value)) = line.split_once(": ") {
                fields.insert(key.to_lowercase(), value.to_string());
            }
        }

        // polite, and MPD logs less noise
        let _ = writer.write_all(b"close\n").await;
        Ok(fields)
    }
}
