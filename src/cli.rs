/*
 * This file is part of aorus-control.
 *
 * Copyright (C) 2025 aorus-control contributors
 *
 * aorus-control is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * aorus-control is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with aorus-control. If not, see <https://www.gnu.org/licenses/>.
 */

//! Command Line Interface
//!
//! Read and change firmware settings from the terminal.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "aorus-control")]
#[command(version)]
#[command(about = "aorus-control - Fan, charging and performance control for AORUS laptops")]
#[command(long_about = "aorus-control - Fan, charging and performance control for AORUS laptops

Talks to the aorus_laptop platform driver, either directly through sysfs or
through the privileged aorus-helper.

EXAMPLES:
    aorus-control status                      Show every setting and telemetry
    aorus-control get fan_mode                Read one setting
    aorus-control set fan_mode gaming         Change the fan mode
    aorus-control set fan_custom_speed 47 --round
    aorus-control set charge_limit 80         Requires charge mode Custom
    aorus-control curve show                  Show the 15-point fan curve
    aorus-control curve set 14 50 128         Set curve point 14
    aorus-control monitor --count 5           Poll telemetry five times
    aorus-control --simulate status           Use the simulated platform

ENVIRONMENT VARIABLES:
    AORUS_LOG=debug             Log level (trace, debug, info, warn, error)
    AORUS_CONTROL_CONFIG=PATH   Configuration file location

FILES:
    ~/.config/aorus-control/config.json   Driver and polling configuration")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Use the simulated platform instead of real hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Configuration file (overrides AORUS_CONTROL_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every setting, its sync status and telemetry
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read one setting from the hardware
    Get {
        /// Attribute name, e.g. fan_mode or fan_curve_point[3]
        attribute: String,
    },

    /// Validate and write one setting
    Set(SetArgs),

    /// Fan curve table
    #[command(subcommand, about = "Show and edit the firmware fan curve")]
    Curve(CurveCommands),

    /// Poll telemetry at a fixed interval
    Monitor {
        /// Poll period in milliseconds (defaults to the configured interval)
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Stop after this many polls
        #[arg(long, value_name = "N")]
        count: Option<u64>,
    },

    /// Check whether hardware controls are usable
    Probe,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Attribute name
    pub attribute: String,

    /// New value; fan and charge modes accept names or numbers
    #[arg(allow_hyphen_values = true)]
    pub value: String,

    /// Round a custom fan speed to the nearest multiple of 5
    #[arg(long)]
    pub round: bool,
}

// ============================================================================
// Curve Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum CurveCommands {
    /// Show all 15 points and ordering warnings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set one point
    Set {
        /// Point index (0-14)
        index: usize,
        /// Temperature in °C (0-100)
        #[arg(allow_hyphen_values = true)]
        temperature: i64,
        /// Raw fan duty (0-255)
        #[arg(allow_hyphen_values = true)]
        speed: i64,
    },
}
