/*
 *  lib.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Status display renderer: now playing, weather and clock screens
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

pub mod animation;
pub mod bitmap;
pub mod cache;
pub mod config;
pub mod constants;
pub mod display;
pub mod ingest;
pub mod input;
pub mod media;
pub mod metrics;
pub mod pacer;
pub mod persist;
pub mod pipeline;
pub mod rate;
pub mod runtime;
pub mod scroll;
pub mod shutdown;
