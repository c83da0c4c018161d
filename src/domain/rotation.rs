//! Page rotation requests.

use crate::error::{ToolkitError, ToolkitResult};
use serde_json::Value;
use std::collections::BTreeMap;

/// A canonical rotation: one of 0, 90, 180 or 270 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rotation(u16);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);

    /// Normalises any multiple of 90 (negative included) into `0..360`.
    pub fn from_degrees(angle: i64) -> ToolkitResult<Self> {
        if angle % 90 != 0 {
            return Err(ToolkitError::UnsupportedAngle { angle });
        }
        Ok(Self(angle.rem_euclid(360) as u16))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Adds `delta` to this rotation, wrapping at 360.
    pub fn add(self, delta: Rotation) -> Rotation {
        Rotation((self.0 + delta.0) % 360)
    }
}

/// One-based page number to rotation delta.
///
/// Pages absent from the map are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationMap {
    entries: BTreeMap<u64, Rotation>,
}

impl RotationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: u64, rotation: Rotation) {
        self.entries.insert(page, rotation);
    }

    /// Parses a JSON object such as `{"1": 90, "3": "180"}`.
    ///
    /// Keys are one-based page numbers; values are integers or numeric
    /// strings that must be multiples of 90.
    pub fn from_json(json: &str) -> ToolkitResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ToolkitError::invalid_format(json, e.to_string()))?;
        let object = value.as_object().ok_or_else(|| {
            ToolkitError::invalid_format(json, "expected an object mapping pages to angles")
        })?;

        let mut map = Self::new();
        for (key, angle) in object {
            let page = key.trim().parse::<u64>().map_err(|_| {
                ToolkitError::invalid_format(key, "rotation key must be a page number")
            })?;
            let degrees = match angle {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| {
                ToolkitError::invalid_format(&angle.to_string(), "rotation angle must be an integer")
            })?;
            map.insert(page, Rotation::from_degrees(degrees)?);
        }

        Ok(map)
    }

    pub fn get(&self, page: u64) -> Option<Rotation> {
        self.entries.get(&page).copied()
    }

    /// Entries in ascending page order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Rotation)> + '_ {
        self.entries.iter().map(|(page, rotation)| (*page, *rotation))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
