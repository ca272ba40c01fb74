/*
 *  display/error.rs
 *
 *  lcdlines - many lines, one panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for the display subsystem
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

use std::fmt;
use std::error::Error;
use thiserror::Error as ThisError;

/// Errors raised by the surface and its transport.
///
/// Any of these coming out of a render tick is treated as fatal for the
/// panel: the shared bus state can no longer be reasoned about per line.
#[derive(Debug)]
pub enum DisplayError {
    /// Hardware initialization failed
    InitializationFailed(String),

    /// I2C communication error
    I2cError(String),

    /// Row/column outside the panel geometry
    InvalidPosition { row: usize, column: usize, rows: usize, columns: usize },

    /// Invalid configuration
    InvalidConfiguration(String),

    /// A writer panicked while holding the surface lock
    LockPoisoned,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InitializationFailed(msg) =>
                write!(f, "Display initialization failed: {}", msg),
            DisplayError::I2cError(msg) =>
                write!(f, "I2C communication error: {}", msg),
            DisplayError::InvalidPosition { row, column, rows, columns } =>
                write!(f, "Invalid position row {} column {} (panel is {}x{})", row, column, rows, columns),
            DisplayError::InvalidConfiguration(msg) =>
                write!(f, "Invalid configuration: {}", msg),
            DisplayError::LockPoisoned =>
                write!(f, "Display surface lock poisoned"),
        }
    }
}

impl Error for DisplayError {}

// Conversion from Linux I2C errors
impl From<linux_embedded_hal::I2CError> for DisplayError {
    fn from(err: linux_embedded_hal::I2CError) -> Self {
        DisplayError::I2cError(format!("{:?}", err))
    }
}

/// Errors while building a transport from configuration
#[derive(Debug)]
pub enum DisplayFactoryError {
    /// No bus configuration specified
    NoBusConfiguration,

    /// Driver not compiled in
    DriverNotEnabled(&'static str),

    /// Display driver initialization failed
    DriverInitFailed(DisplayError),

    /// Configuration validation error
    ConfigError(String),
}

impl fmt::Display for DisplayFactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayFactoryError::NoBusConfiguration =>
                write!(f, "No bus configuration specified"),
            DisplayFactoryError::DriverNotEnabled(feature) =>
                write!(f, "Driver not enabled. Rebuild with --features {}", feature),
            DisplayFactoryError::DriverInitFailed(err) =>
                write!(f, "Driver initialization failed: {}", err),
            DisplayFactoryError::ConfigError(msg) =>
                write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for DisplayFactoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DisplayFactoryError::DriverInitFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DisplayError> for DisplayFactoryError {
    fn from(err: DisplayError) -> Self {
        DisplayFactoryError::DriverInitFailed(err)
    }
}

/// Errors raised by line registration and line text composition.
#[derive(Debug, ThisError)]
pub enum LineError {
    #[error("row {row} is not a valid row (panel has {rows} rows)")]
    InvalidRow { row: usize, rows: usize },

    #[error("row {row} is already used by line '{name}'")]
    RowInUse { row: usize, name: String },

    #[error("a line named '{0}' is already registered")]
    DuplicateName(String),

    #[error("line '{name}' has bad options: {reason}")]
    InvalidOptions { name: String, reason: String },

    #[error("no line named '{0}'")]
    UnknownLine(String),

    #[error("line '{0}' has been unregistered")]
    Retired(String),

    #[error("text too long: {length} characters, only {columns} fit")]
    LineTooLong { columns: usize, length: usize },

    #[error(transparent)]
    Transport(#[from] DisplayError),
}
