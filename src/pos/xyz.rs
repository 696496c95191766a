// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handle geocentric (ITRF) Cartesian coordinates.
//!
//! Station positions are given as a geocentric reference point plus
//! per-antenna offsets, all in the same Earth-fixed frame. Baselines are formed
//! directly from these and projected with a Greenwich hour angle.

use rayon::prelude::*;

use super::{hadec::HADec, uvw::UVW};
use crate::math::{baseline_to_ants, cross_correlation_baseline_to_ants};

/// The geocentric (x,y,z) coordinates of an antenna, or an offset between two
/// of them. x points to the intersection of the equator and the Greenwich
/// meridian, z to the north pole. All units are in metres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XyzGeocentric {
    /// x-coordinate \[meters\]
    pub x: f64,
    /// y-coordinate \[meters\]
    pub y: f64,
    /// z-coordinate \[meters\]
    pub z: f64,
}

impl XyzGeocentric {
    /// Make a new [`XyzGeocentric`] from an `[x, y, z]` array.
    pub fn from_array([x, y, z]: [f64; 3]) -> XyzGeocentric {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// The length of this vector \[metres\].
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add<XyzGeocentric> for XyzGeocentric {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        XyzGeocentric {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl std::ops::Sub<XyzGeocentric> for XyzGeocentric {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        XyzGeocentric {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

/// Project every position once. The sines and cosines of the phase centre
/// are only computed here.
fn project_all(xyzs: &[XyzGeocentric], phase_centre: HADec) -> Vec<UVW> {
    let (s_ha, c_ha) = phase_centre.ha.sin_cos();
    let (s_dec, c_dec) = phase_centre.dec.sin_cos();
    xyzs.iter()
        .map(|&xyz| UVW::from_xyz_inner(xyz, s_ha, c_ha, s_dec, c_dec))
        .collect()
}

/// Convert [`XyzGeocentric`] antenna positions to [`UVW`] baseline coordinates
/// without having to form baselines first. `phase_centre` must carry a
/// Greenwich hour angle.
///
/// Baselines are ordered `(0,0), (0,1), ..., (1,1), ...` and each is
/// `uvw(j) - uvw(i)`, i.e. it points from the first antenna to the second.
pub fn xyzs_to_uvws(xyzs: &[XyzGeocentric], phase_centre: HADec) -> Vec<UVW> {
    let ant_uvws = project_all(xyzs, phase_centre);
    let num_ants = xyzs.len();
    let mut bl_uvws = Vec::with_capacity((num_ants * (num_ants + 1)) / 2);
    for i in 0..num_ants {
        for j in i..num_ants {
            bl_uvws.push(ant_uvws[j] - ant_uvws[i]);
        }
    }
    bl_uvws
}

/// As [`xyzs_to_uvws`], but the baseline differences are taken in parallel.
pub fn xyzs_to_uvws_parallel(xyzs: &[XyzGeocentric], phase_centre: HADec) -> Vec<UVW> {
    let ant_uvws = project_all(xyzs, phase_centre);
    let num_ants = xyzs.len();
    let num_baselines = (num_ants * (num_ants + 1)) / 2;
    (0..num_baselines)
        .into_par_iter()
        .map(|i_bl| {
            let (i, j) = baseline_to_ants(num_ants, i_bl);
            ant_uvws[j] - ant_uvws[i]
        })
        .collect()
}

/// As [`xyzs_to_uvws`], cross-correlation baselines only.
pub fn xyzs_to_cross_uvws(xyzs: &[XyzGeocentric], phase_centre: HADec) -> Vec<UVW> {
    let ant_uvws = project_all(xyzs, phase_centre);
    let num_ants = xyzs.len();
    let num_baselines = (num_ants * num_ants.saturating_sub(1)) / 2;
    (0..num_baselines)
        .map(|i_bl| {
            let (i, j) = cross_correlation_baseline_to_ants(num_ants, i_bl);
            ant_uvws[j] - ant_uvws[i]
        })
        .collect()
}

#[cfg(any(test, feature = "approx"))]
impl approx::AbsDiffEq for XyzGeocentric {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        f64::abs_diff_eq(&self.x, &other.x, epsilon)
            && f64::abs_diff_eq(&self.y, &other.y, epsilon)
            && f64::abs_diff_eq(&self.z, &other.z, epsilon)
    }
}
