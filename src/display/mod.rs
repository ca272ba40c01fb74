/*
 *  display/mod.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - shared surface, per-line renderers and scheduling
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod factory;
pub mod surface;

// Display drivers
pub mod drivers;

// Lines
pub mod marquee;
pub mod line;
pub mod options;
pub mod slot;
pub mod scheduler;

// Line registry and standby
pub mod manager;

// Re-exports for convenience
pub use traits::{LcdTransport, LcdCapabilities, BoxedTransport};
pub use error::{DisplayError, DisplayFactoryError, LineError};
pub use factory::DisplayDriverFactory;
pub use surface::DisplaySurface;
pub use marquee::{Marquee, MarqueePhase, MarqueeTiming};
pub use line::{Align, LineRenderer, format_text};
pub use options::LineOptions;
pub use slot::{LineHandle, LineState};
pub use scheduler::LineScheduler;
pub use manager::LcdDisplay;
