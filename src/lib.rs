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

//! aorus-control - Fan, charging and performance control for AORUS laptops
//!
//! This library provides the command line front end over `ac-core`: argument
//! parsing, logging setup and the command implementations.

pub mod cli;
pub mod commands;
pub mod logger;
