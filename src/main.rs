/*
 *  main.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
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

use anyhow::Context;
use env_logger::Env;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use lcdlines::config::{self, LineConfig};
use lcdlines::display::drivers::virtual_lcd::VirtualLcd;
use lcdlines::display::{BoxedTransport, DisplayDriverFactory, DisplaySurface, LcdDisplay};
use lcdlines::sources::LineSource;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Log the emulated panel whenever it changes.
fn spawn_panel_logger(lcd: VirtualLcd) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut last: Vec<String> = Vec::new();
        loop {
            ticker.tick().await;
            let snapshot = lcd.snapshot();
            if snapshot != last {
                for (row, text) in snapshot.iter().enumerate() {
                    info!("{} |{}|", row + 1, text);
                }
                last = snapshot;
            }
        }
    })
}

async fn register_lines(display: &LcdDisplay, lines: &[LineConfig]) -> anyhow::Result<()> {
    for line in lines {
        let source = match LineSource::from_config(&line.source, &line.options, Instant::now()) {
            Ok(source) => source,
            Err(e) => {
                warn!("line '{}' skipped: {}", line.name, e);
                continue;
            }
        };
        display
            .register_line(&line.name, line.row, source, &line.options)
            .await
            .with_context(|| format!("registering line '{}'", line.name))?;
    }
    Ok(())
}

/// Runs until a terminating signal. USR1/USR2 toggle standby.
async fn signal_loop(display: &LcdDisplay) -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("SIGINT received. Initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received. Initiating graceful shutdown.");
                break;
            }
            _ = sighup.recv() => {
                info!("SIGHUP received. Initiating graceful shutdown.");
                break;
            }
            _ = sigusr1.recv() => {
                info!("SIGUSR1 received, standby");
                if let Err(e) = display.standby().await {
                    error!("standby failed: {}", e);
                }
            }
            _ = sigusr2.recv() => {
                info!("SIGUSR2 received, resume");
                if let Err(e) = display.resume().await {
                    error!("resume failed: {}", e);
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("loading configuration")?;

    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("{} - many lines, one panel", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let display_cfg = cfg.display.clone().unwrap_or_default();
    let emulated = cfg.emulated.unwrap_or(false);

    let mut panel_logger = None;
    let transport: BoxedTransport = if emulated {
        info!("Emulation mode enabled - using the in-memory panel");
        let lcd = DisplayDriverFactory::create_virtual(&display_cfg)?;
        panel_logger = Some(spawn_panel_logger(lcd.clone()));
        Box::new(lcd)
    } else {
        DisplayDriverFactory::create_from_config(&display_cfg)?
    };

    let surface = Arc::new(DisplaySurface::new(transport));
    surface.clear_and_blank()?;
    let display = LcdDisplay::new(surface)?;

    let lines = cfg.lines.clone().unwrap_or_else(config::default_lines);
    register_lines(&display, &lines).await?;
    info!("{} lines running", display.line_names().await.len());

    let outcome = signal_loop(&display).await;

    info!("Main application exiting. Clearing display.");
    display.shutdown().await?;
    if let Some(logger) = panel_logger {
        logger.abort();
    }
    outcome
}
