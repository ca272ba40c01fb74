/*
 *  sources/lms.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Lyrion Music Server JSON-RPC client for now playing tags
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
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::SourceError;

pub const DEFAULT_PORT: u16 = 9000;

/// Status tags asked for: artist, album, title, remote title
const STATUS_TAGS: &str = "tags:alNt";

#[derive(Debug, Serialize)]
struct SlimRequest {
    id: u32,
    method: &'static str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    id: Option<u32>,
    result: Option<Value>,
    error: Option<RpcError>,
}

/// Asks one LMS player what it is playing.
#[derive(Debug)]
pub struct LmsClient {
    url: String,
    player: String,
    next_id: AtomicU32,
    client: Client,
}

impl LmsClient {
    pub fn new(host: &str, port: u16, player: &str) -> Result<Self, SourceError> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Content-Type", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .http1_only()
            .connect_timeout(Duration::from_secs(2))
            .default_headers(headers)
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            url: format!("http://{}:{}/jsonrpc.js", host, port),
            player: player.to_string(),
            next_id: AtomicU32::new(1),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw `status` result for the player.
    pub async fn status(&self) -> Result<Value, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = SlimRequest {
            id,
            method: "slim.request",
            params: vec![
                Value::String(self.player.clone()),
                json!(["status", "-", "1", STATUS_TAGS]),
            ],
        };

        let response = self
            .client
            .post(&self.url)
            .body(serde_json::to_string(&request)?)
            .send()
            .await?;
        response.error_for_status_ref()?;
        let text = response.text().await?;
        let rpc: JsonRpcResponse = serde_json::from_str(&text)?;

        if rpc.id != Some(id) {
            return Err(SourceError::Protocol(format!(
                "id mismatch: expected {}, received {:?}",
                id, rpc.id
            )));
        }
        if let Some(error) = rpc.error {
            return Err(SourceError::Protocol(format!(
                "server error {}: {}",
                error.code, error.message
            )));
        }
        rpc.result
            .ok_or_else(|| SourceError::Protocol("response missing 'result'".into()))
    }

    /// One tag of the playing track, looked up in the playlist entry first.
    pub async fn current_tag(&self, tag: &str) -> Result<Option<String>, SourceError> {
        let status = self.status().await?;
        let value = extract_tag(&status, tag);
        debug!("lms {} {} = {:?}", self.player, tag, value);
        Ok(value)
    }
}

/// Find `tag` in `playlist_loop[0]`, then at the top level of a status result.
pub fn extract_tag(status: &Value, tag: &str) -> Option<String> {
    let track = status
        .get("playlist_loop")
        .and_then(|list| list.get(0))
        .and_then(|entry| entry.get(tag));
    match track.or_else(|| status.get(tag))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
