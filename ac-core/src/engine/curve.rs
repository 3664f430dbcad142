//! Firmware fan curve table
//!
//! The firmware holds exactly 15 index-addressed points. This module only
//! models the cached table; points are written one at a time through the
//! synchronizer.
//!
//! # Ordering
//!
//! Temperature and speed are expected to be non-decreasing with the index, but
//! the firmware accepts any table. Violations are surfaced as
//! [`CurveWarning`]s and never block a write.

use std::fmt;

use crate::constants::curve as curve_const;
use crate::data::CurvePoint;

/// Which component of a point breaks the ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveAxis {
    Temperature,
    Speed,
}

/// Advisory ordering violation between two known points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveWarning {
    /// Index of the point that decreases
    pub index: usize,
    /// Index of the nearest known point before it
    pub previous_index: usize,
    pub axis: CurveAxis,
    pub previous: u8,
    pub current: u8,
}

impl fmt::Display for CurveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = match self.axis {
            CurveAxis::Temperature => "temperature",
            CurveAxis::Speed => "speed",
        };
        write!(
            f,
            "point {} {} {} is lower than point {} ({})",
            self.index, axis, self.current, self.previous_index, self.previous
        )
    }
}

/// Cached view of the 15-point fan curve
///
/// Points that were never read successfully are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanCurve {
    points: [Option<CurvePoint>; curve_const::POINT_COUNT],
}

impl FanCurve {
    pub fn new(points: [Option<CurvePoint>; curve_const::POINT_COUNT]) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<CurvePoint> {
        self.points.get(index).copied().flatten()
    }

    pub fn set(&mut self, index: usize, point: CurvePoint) {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = Some(point);
        }
    }

    pub fn points(&self) -> &[Option<CurvePoint>] {
        &self.points
    }

    /// Whether every point has a known value
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(Option::is_some)
    }

    /// Ordering violations between consecutive known points
    ///
    /// Unknown points are skipped; each known point is compared with the
    /// nearest known point before it.
    pub fn check_monotonic(&self) -> Vec<CurveWarning> {
        let mut warnings = Vec::new();
        let mut previous: Option<(usize, CurvePoint)> = None;

        for (index, point) in self.points.iter().enumerate() {
            let Some(point) = point else { continue };
            if let Some((previous_index, prev)) = previous {
                if point.temperature < prev.temperature {
                    warnings.push(CurveWarning {
                        index,
                        previous_index,
                        axis: CurveAxis::Temperature,
                        previous: prev.temperature,
                        current: point.temperature,
                    });
                }
                if point.speed < prev.speed {
                    warnings.push(CurveWarning {
                        index,
                        previous_index,
                        axis: CurveAxis::Speed,
                        previous: prev.speed,
                        current: point.speed,
                    });
                }
            }
            previous = Some((index, *point));
        }

        warnings
    }

    /// Estimated raw duty the table yields at a temperature
    ///
    /// Linear interpolation between the known points, clamped to the first and
    /// last point. Returns `None` when no point is known. Assumes ascending
    /// temperatures; an unordered table gives a rough figure only.
    pub fn estimate_speed(&self, temperature: i32) -> Option<u8> {
        let known: Vec<CurvePoint> = self.points.iter().flatten().copied().collect();
        let first = known.first()?;
        let last = known.last()?;

        if temperature <= first.temperature as i32 {
            return Some(first.speed);
        }
        if temperature >= last.temperature as i32 {
            return Some(last.speed);
        }

        for pair in known.windows(2) {
            let (low, high) = (pair[0], pair[1]);
            let (t0, t1) = (low.temperature as i32, high.temperature as i32);
            if temperature >= t0 && temperature <= t1 {
                if t1 == t0 {
                    return Some(high.speed);
                }
                let ratio = (temperature - t0) as f32 / (t1 - t0) as f32;
                let speed = low.speed as f32 + ratio * (high.speed as f32 - low.speed as f32);
                return Some(speed.round().clamp(0.0, curve_const::MAX_SPEED as f32) as u8);
            }
        }

        Some(last.speed)
    }
}
