// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Phase-tracking directions, as given by a user.

use std::{f64::consts::FRAC_PI_2, str::FromStr};

use crate::{
    error::GeometryResolutionError,
    sexagesimal::{sexagesimal_dms_string_to_degrees, sexagesimal_hms_string_to_degrees},
    AzEl, RADec,
};

/// A sky direction in one of the supported reference frames.
///
/// The textual form is `"m0,m1,FRAME"`, where each angle is one of `1.2rad`,
/// `68.7deg`, `4h35m0s`, `16d30m0s` or a bare number of radians, and `FRAME`
/// is `J2000` or `AZEL` (case insensitive).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Direction {
    /// Equatorial coordinates in the J2000 frame. They are precessed to the
    /// epoch of each timestamp before projecting.
    J2000(RADec),

    /// Horizon coordinates, fixed relative to the station.
    AzEl(AzEl),
}

impl Direction {
    /// Check the direction is finite and the latitude-like angle is in range.
    pub fn validate(self) -> Result<Self, GeometryResolutionError> {
        match self {
            Direction::J2000(RADec { ra, dec }) => {
                if !(ra.is_finite() && dec.is_finite()) {
                    return Err(GeometryResolutionError::NonFiniteDirection);
                }
                if dec.abs() > FRAC_PI_2 {
                    return Err(GeometryResolutionError::DeclinationOutOfRange(dec));
                }
            }
            Direction::AzEl(AzEl { az, el }) => {
                if !(az.is_finite() && el.is_finite()) {
                    return Err(GeometryResolutionError::NonFiniteDirection);
                }
                if el.abs() > FRAC_PI_2 {
                    return Err(GeometryResolutionError::ElevationOutOfRange(el));
                }
            }
        }
        Ok(self)
    }

    pub fn frame_name(self) -> &'static str {
        match self {
            Direction::J2000(_) => "J2000",
            Direction::AzEl(_) => "AZEL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Direction::J2000(radec) => write!(f, "{radec} J2000"),
            Direction::AzEl(azel) => write!(f, "{azel} AZEL"),
        }
    }
}

/// Parse one angle into radians.
fn parse_angle(angle: &str, input: &str) -> Result<f64, GeometryResolutionError> {
    let bad = |reason: String| GeometryResolutionError::BadDirection {
        input: input.to_string(),
        reason,
    };
    let angle = angle.trim();
    let number = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| bad(format!("'{angle}' is not a number")))
    };

    if let Some(rad) = angle.strip_suffix("rad") {
        number(rad)
    } else if let Some(deg) = angle.strip_suffix("deg") {
        Ok(number(deg)?.to_radians())
    } else if angle.contains('h') {
        sexagesimal_hms_string_to_degrees(angle)
            .map(f64::to_radians)
            .map_err(|e| bad(e.to_string()))
    } else if angle.contains('d') {
        sexagesimal_dms_string_to_degrees(angle)
            .map(f64::to_radians)
            .map_err(|e| bad(e.to_string()))
    } else {
        number(angle)
    }
}

impl FromStr for Direction {
    type Err = GeometryResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').collect();
        let [m0, m1, frame] = fields.as_slice() else {
            return Err(GeometryResolutionError::BadDirection {
                input: s.to_string(),
                reason: format!("expected 3 comma-separated fields, got {}", fields.len()),
            });
        };
        let m0 = parse_angle(m0, s)?;
        let m1 = parse_angle(m1, s)?;
        let direction = match frame.trim().to_uppercase().as_str() {
            "J2000" => Direction::J2000(RADec::from_radians(m0, m1)),
            "AZEL" => Direction::AzEl(AzEl::from_radians(m0, m1)),
            other => return Err(GeometryResolutionError::UnknownFrame(other.to_string())),
        };
        direction.validate()
    }
}
