/*
 *  sources/fetch.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Text fetched over HTTP in the background
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

use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{Content, QueryGate, SourceError, NO_DATA};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// How response bodies are turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Latin1,
    Utf8,
}

impl TextEncoding {
    /// Decode and fold all whitespace (line breaks included) to single spaces.
    pub fn decode(&self, body: &[u8]) -> String {
        let raw = match self {
            TextEncoding::Latin1 => body.iter().map(|&b| b as char).collect::<String>(),
            TextEncoding::Utf8 => String::from_utf8_lossy(body).into_owned(),
        };
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// GET `url` once and decode the body.
pub async fn fetch_text(client: &Client, url: &str, encoding: TextEncoding) -> Result<String, SourceError> {
    let response = client.get(url).send().await?;
    response.error_for_status_ref()?;
    let body = response.bytes().await?;
    Ok(encoding.decode(&body))
}

/// Shows the cached text and asks the background task for a fresh copy
/// each time the gate opens. The fetch never runs on the line's tick.
pub struct FetchSource {
    url: String,
    cached: watch::Receiver<String>,
    trigger: mpsc::Sender<()>,
    gate: QueryGate,
    task: JoinHandle<()>,
}

impl FetchSource {
    /// Start the fetch task and request the first copy right away.
    pub fn spawn(url: &str, encoding: TextEncoding, interval: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(FETCH_TIMEOUT).build()?;
        let (text_tx, text_rx) = watch::channel(NO_DATA.to_string());
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);

        let task_url = url.to_string();
        let task = tokio::spawn(async move {
            while trigger_rx.recv().await.is_some() {
                match fetch_text(&client, &task_url, encoding).await {
                    Ok(text) => {
                        debug!("fetched {} chars from {}", text.chars().count(), task_url);
                        text_tx.send_replace(text);
                    }
                    Err(e) => warn!("fetch {} failed: {}", task_url, e),
                }
            }
            debug!("fetch task for {} stopped", task_url);
        });

        let _ = trigger_tx.try_send(());
        info!("fetch source for {} every {:?}", url, interval);

        Ok(Self {
            url: url.to_string(),
            cached: text_rx,
            trigger: trigger_tx,
            gate: QueryGate::new(interval),
            task,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Latest fetched text, or the no data marker
    pub fn cached(&self) -> String {
        self.cached.borrow().clone()
    }

    pub fn refresh(&mut self, now: Instant) -> Option<Content> {
        if !self.gate.due(now) {
            return None;
        }
        self.gate.mark(now);
        // full channel means a fetch is already queued
        let _ = self.trigger.try_send(());
        Some(Content::Text(self.cached()))
    }

    pub fn reset(&mut self) {
        self.gate.reset();
    }
}

impl Drop for FetchSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}
