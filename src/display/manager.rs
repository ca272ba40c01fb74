/*
 *  display/manager.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Line registry: row ownership, lifecycle, standby and resume
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
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::display::error::{DisplayError, LineError};
use crate::display::line::LineRenderer;
use crate::display::options::LineOptions;
use crate::display::scheduler::LineScheduler;
use crate::display::slot::{LineHandle, LineState, SharedLine};
use crate::display::surface::DisplaySurface;
use crate::sources::LineSource;

struct LineSlot {
    row: usize,
    line: SharedLine,
    scheduler: LineScheduler,
}

#[derive(Default)]
struct Registry {
    slots: BTreeMap<String, LineSlot>,
    /// Some while in standby: every line's lock, held by the display
    held: Option<HashMap<String, OwnedMutexGuard<LineState>>>,
}

/// A character panel shared by named lines, one line per row.
pub struct LcdDisplay {
    surface: Arc<DisplaySurface>,
    registry: Mutex<Registry>,
}

impl LcdDisplay {
    /// Take over the surface and switch the backlight on.
    pub fn new(surface: Arc<DisplaySurface>) -> Result<Self, DisplayError> {
        surface.set_backlight(true)?;
        info!("display {}x{} ready", surface.rows(), surface.columns());
        Ok(Self {
            surface,
            registry: Mutex::new(Registry::default()),
        })
    }

    pub fn surface(&self) -> &Arc<DisplaySurface> {
        &self.surface
    }

    pub fn rows(&self) -> usize {
        self.surface.rows()
    }

    pub fn columns(&self) -> usize {
        self.surface.columns()
    }

    /// Bind `source` to `row` under `name` and start its scheduler.
    ///
    /// Fails without side effects if the options don't validate, the row is
    /// out of range or taken, or the name is already registered. A line
    /// registered during standby starts suspended.
    pub async fn register_line(
        &self,
        name: &str,
        row: usize,
        source: LineSource,
        options: &LineOptions,
    ) -> Result<LineHandle, LineError> {
        options.validate().map_err(|reason| LineError::InvalidOptions {
            name: name.to_string(),
            reason,
        })?;

        let mut registry = self.registry.lock().await;

        let rows = self.surface.rows();
        if row < 1 || row > rows {
            return Err(LineError::InvalidRow { row, rows });
        }
        if let Some((owner, _)) = registry.slots.iter().find(|(_, slot)| slot.row == row) {
            return Err(LineError::RowInUse { row, name: owner.clone() });
        }
        if registry.slots.contains_key(name) {
            return Err(LineError::DuplicateName(name.to_string()));
        }

        let kind = source.kind();
        let renderer = LineRenderer::new(Arc::clone(&self.surface), row, options.timing());
        let line: SharedLine = Arc::new(Mutex::new(LineState::new(name, renderer, source, options.align)));

        if let Some(held) = registry.held.as_mut() {
            held.insert(name.to_string(), Arc::clone(&line).lock_owned().await);
            debug!("line '{}' registered suspended", name);
        }

        let scheduler = LineScheduler::spawn(name, Arc::clone(&line), options.refresh_interval());
        registry.slots.insert(
            name.to_string(),
            LineSlot { row, line: Arc::clone(&line), scheduler },
        );
        info!("line '{}' ({}) on row {}", name, kind, row);
        Ok(LineHandle::new(name, row, line))
    }

    /// Stop the line's scheduler, then blank its row and free it.
    ///
    /// In standby the row is already blank; nothing is written.
    pub async fn unregister_line(&self, name: &str) -> Result<(), LineError> {
        let mut registry = self.registry.lock().await;
        let mut slot = registry
            .slots
            .remove(name)
            .ok_or_else(|| LineError::UnknownLine(name.to_string()))?;

        let held = registry.held.as_mut().and_then(|held| held.remove(name));
        match held {
            Some(mut guard) => {
                guard.retired = true;
                drop(guard);
                slot.scheduler.stop().await;
            }
            None => {
                slot.scheduler.stop().await;
                let mut line = slot.line.lock().await;
                line.retired = true;
                line.renderer.blank()?;
            }
        }
        info!("line '{}' released row {}", name, slot.row);
        Ok(())
    }

    /// Freeze every line, clear the panel and switch the backlight off.
    /// A second call does nothing.
    pub async fn standby(&self) -> Result<(), LineError> {
        let mut registry = self.registry.lock().await;
        if registry.held.is_some() {
            debug!("already in standby");
            return Ok(());
        }

        let mut held = HashMap::with_capacity(registry.slots.len());
        for (name, slot) in registry.slots.iter() {
            held.insert(name.clone(), Arc::clone(&slot.line).lock_owned().await);
        }
        let count = held.len();
        registry.held = Some(held);

        self.surface.clear_and_blank()?;
        self.surface.set_backlight(false)?;
        info!("standby, {} lines suspended", count);
        Ok(())
    }

    /// Reset every line, release them and switch the backlight on.
    /// Does nothing unless in standby.
    pub async fn resume(&self) -> Result<(), LineError> {
        let mut registry = self.registry.lock().await;
        let Some(held) = registry.held.take() else {
            debug!("not in standby");
            return Ok(());
        };

        let now = Instant::now();
        let count = held.len();
        for (_, mut guard) in held {
            guard.resume(now);
        }
        self.surface.set_backlight(true)?;
        info!("resumed {} lines", count);
        Ok(())
    }

    pub async fn is_suspended(&self) -> bool {
        self.registry.lock().await.held.is_some()
    }

    pub async fn line(&self, name: &str) -> Option<LineHandle> {
        let registry = self.registry.lock().await;
        registry
            .slots
            .get(name)
            .map(|slot| LineHandle::new(name, slot.row, Arc::clone(&slot.line)))
    }

    pub async fn line_names(&self) -> Vec<String> {
        self.registry.lock().await.slots.keys().cloned().collect()
    }

    /// Unregister everything, clear the panel, backlight off.
    ///
    /// Every line is stopped even if some fail; the first error is returned
    /// once the panel has been cleared.
    pub async fn shutdown(&self) -> Result<(), LineError> {
        let mut first_error = None;
        for name in self.line_names().await {
            if let Err(e) = self.unregister_line(&name).await {
                warn!("line '{}' did not shut down cleanly: {}", name, e);
                first_error.get_or_insert(e);
            }
        }
        self.registry.lock().await.held = None;

        let cleared = self
            .surface
            .clear_and_blank()
            .and_then(|_| self.surface.set_backlight(false));
        if let Err(e) = cleared {
            first_error.get_or_insert(LineError::Transport(e));
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("display shut down");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::display::drivers::virtual_lcd::{TransportOp, VirtualLcd};
    use crate::display::line::Align;
    use crate::sources::StaticSource;

    fn display() -> (LcdDisplay, VirtualLcd) {
        let lcd = VirtualLcd::new(4, 20);
        let surface = Arc::new(DisplaySurface::new(Box::new(lcd.clone())));
        (LcdDisplay::new(surface).unwrap(), lcd)
    }

    fn fixed(text: &str) -> LineSource {
        LineSource::Static(StaticSource::new(text))
    }

    fn fast() -> LineOptions {
        LineOptions::default().with_refresh(0.02)
    }

    #[tokio::test]
    async fn test_new_turns_backlight_on() {
        let (_display, lcd) = display();
        assert!(lcd.state().lock().unwrap().backlight);
    }

    #[tokio::test]
    async fn test_row_rules() {
        let (display, _lcd) = display();
        display.register_line("a", 1, fixed("a"), &fast()).await.unwrap();

        assert!(matches!(
            display.register_line("b", 1, fixed("b"), &fast()).await,
            Err(LineError::RowInUse { row: 1, .. })
        ));
        assert!(matches!(
            display.register_line("b", 0, fixed("b"), &fast()).await,
            Err(LineError::InvalidRow { row: 0, rows: 4 })
        ));
        assert!(matches!(
            display.register_line("b", 5, fixed("b"), &fast()).await,
            Err(LineError::InvalidRow { row: 5, rows: 4 })
        ));
        assert!(matches!(
            display.register_line("a", 2, fixed("b"), &fast()).await,
            Err(LineError::DuplicateName(_))
        ));
        assert_eq!(display.line_names().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_options_rejected() {
        let (display, lcd) = display();
        let result = display
            .register_line("zero", 1, fixed("never"), &LineOptions::default().with_refresh(0.0))
            .await;
        assert!(matches!(result, Err(LineError::InvalidOptions { .. })));

        let tiny = LineOptions::default().with_refresh(1e-10);
        assert!(matches!(
            display.register_line("tiny", 1, fixed("never"), &tiny).await,
            Err(LineError::InvalidOptions { .. })
        ));
        assert!(display.line_names().await.is_empty());

        // the row is still free
        display.register_line("ok", 1, fixed("fine"), &fast()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(lcd.snapshot()[0], "fine                ");
    }

    #[tokio::test]
    async fn test_unregister_frees_row() {
        let (display, lcd) = display();
        let handle = display
            .register_line("a", 2, fixed("hello"), &fast().with_align(Align::Center))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(lcd.snapshot()[1], "       hello        ");

        display.unregister_line("a").await.unwrap();
        assert_eq!(lcd.snapshot()[1], " ".repeat(20));
        assert!(matches!(handle.text().await, Err(LineError::Retired(_))));
        assert!(matches!(
            display.unregister_line("a").await,
            Err(LineError::UnknownLine(_))
        ));

        display.register_line("b", 2, fixed("again"), &fast()).await.unwrap();
    }

    #[tokio::test]
    async fn test_standby_and_resume_are_idempotent() {
        let (display, lcd) = display();
        display.register_line("a", 1, fixed("hello"), &fast()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        display.standby().await.unwrap();
        display.standby().await.unwrap();
        {
            let state = lcd.state();
            let state = state.lock().unwrap();
            assert_eq!(state.clear_count, 1);
            assert!(!state.backlight);
        }
        assert!(display.is_suspended().await);

        lcd.state().lock().unwrap().reset_counters();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(lcd.state().lock().unwrap().ops.is_empty());

        display.resume().await.unwrap();
        display.resume().await.unwrap();
        let ops = lcd.state().lock().unwrap().ops.clone();
        let backlight_on = ops.iter().filter(|op| **op == TransportOp::Backlight(true)).count();
        assert_eq!(backlight_on, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(lcd.snapshot()[0], "hello               ");
    }

    #[tokio::test]
    async fn test_unregister_during_standby_writes_nothing() {
        let (display, lcd) = display();
        display.register_line("a", 3, fixed("hello"), &fast()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        display.standby().await.unwrap();

        lcd.state().lock().unwrap().reset_counters();
        display.unregister_line("a").await.unwrap();
        assert!(lcd.state().lock().unwrap().ops.is_empty());

        display.resume().await.unwrap();
        assert!(display.line_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_during_standby_starts_suspended() {
        let (display, lcd) = display();
        display.standby().await.unwrap();
        display.register_line("late", 4, fixed("late"), &fast()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(lcd.state().lock().unwrap().glyph_writes, 0);

        display.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(lcd.snapshot()[3], "late                ");
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let (display, lcd) = display();
        display.register_line("a", 1, fixed("one"), &fast()).await.unwrap();
        display.register_line("b", 2, fixed("two"), &fast()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        display.standby().await.unwrap();

        display.shutdown().await.unwrap();
        assert!(display.line_names().await.is_empty());
        assert!(!display.is_suspended().await);
        let state = lcd.state();
        let state = state.lock().unwrap();
        assert!(!state.backlight);
        assert!(state.grid.iter().all(|row| row.iter().all(|c| *c == ' ')));
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_line_on_error() {
        let (display, lcd) = display();
        let a = display.register_line("a", 1, fixed("one"), &fast()).await.unwrap();
        let b = display.register_line("b", 2, fixed("two"), &fast()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        lcd.state().lock().unwrap().simulate_failure = true;
        assert!(matches!(display.shutdown().await, Err(LineError::Transport(_))));

        assert!(display.line_names().await.is_empty());
        assert!(a.is_retired().await);
        assert!(b.is_retired().await);

        // once the bus is back, nothing writes to the panel any more
        {
            let state = lcd.state();
            let mut state = state.lock().unwrap();
            state.simulate_failure = false;
            state.reset_counters();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(lcd.state().lock().unwrap().glyph_writes, 0);
    }
}
