/*
 *  display/scheduler.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  One periodic task per line
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

use log::{debug, error};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::display::error::LineError;
use crate::display::slot::SharedLine;

/// Drives one line: every `refresh` it takes the line lock and ticks it.
///
/// While the display is in standby the lock is held elsewhere and the task
/// simply waits on it, so a suspended line does no work at all.
pub struct LineScheduler {
    name: String,
    stop_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<Result<(), LineError>>>,
}

impl LineScheduler {
    pub fn spawn(name: &str, line: SharedLine, refresh: Duration) -> Self {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => {
                        debug!("line '{}' scheduler stopping", task_name);
                        return Ok(());
                    }
                    _ = ticker.tick() => {
                        let mut state = line.lock().await;
                        if state.retired {
                            return Ok(());
                        }
                        if let Err(e) = state.tick(Instant::now()).await {
                            error!("line '{}' stopped: {}", task_name, e);
                            return Err(e);
                        }
                    }
                }
            }
        });

        debug!("line '{}' scheduled every {:?}", name, refresh);
        Self {
            name: name.to_string(),
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the task and wait until it has let go of the line.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(_) => debug!("line '{}' scheduler joined", self.name),
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("line '{}' scheduler panicked: {}", self.name, e),
            }
        }
    }
}

impl Drop for LineScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
