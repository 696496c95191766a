// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handle (hour angle, declination) coordinates.

use std::f64::consts::TAU;

use erfa::aliases::{eraHd2ae, eraSeps};

use crate::{AzEl, RADec};

/// A struct containing an Hour Angle and Declination. All units are in radians.
///
/// Whether the hour angle is local or relative to Greenwich depends on the
/// sidereal time it was made with; the geometry engine uses Greenwich hour
/// angles, because antenna positions are geocentric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub struct HADec {
    /// Hour angle \[radians\]
    pub ha: f64,
    /// Declination \[radians\]
    pub dec: f64,
}

impl HADec {
    /// Make a new [`HADec`] struct from values in radians.
    pub fn from_radians(ha: f64, dec: f64) -> HADec {
        Self { ha, dec }
    }

    /// Make a new [`HADec`] struct from values in degrees.
    pub fn from_degrees(ha: f64, dec: f64) -> HADec {
        Self {
            ha: ha.to_radians(),
            dec: dec.to_radians(),
        }
    }

    /// Given a sidereal time, make a new [`RADec`] struct from a [`HADec`].
    pub fn to_radec(self, lst_rad: f64) -> RADec {
        RADec {
            ra: (lst_rad - self.ha).rem_euclid(TAU),
            dec: self.dec,
        }
    }

    /// Given a sidereal time, make a new [`HADec`] struct from a [`RADec`].
    pub fn from_radec(radec: RADec, lst_rad: f64) -> HADec {
        Self {
            ha: lst_rad - radec.ra,
            dec: radec.dec,
        }
    }

    /// Convert the equatorial coordinates to horizon coordinates (azimuth and
    /// elevation), given the local latitude on Earth. The hour angle must be
    /// local.
    ///
    /// Uses ERFA.
    pub fn to_azel(self, latitude_rad: f64) -> AzEl {
        let (az, el) = eraHd2ae(self.ha, self.dec, latitude_rad);
        AzEl::from_radians(az, el)
    }

    /// Calculate the distance between two sets of coordinates.
    ///
    /// Uses ERFA.
    pub fn separation(self, b: Self) -> f64 {
        eraSeps(self.ha, self.dec, b.ha, b.dec)
    }
}

impl std::fmt::Display for HADec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({}°, {}°)", self.ha.to_degrees(), self.dec.to_degrees())
    }
}

#[cfg(any(test, feature = "approx"))]
impl approx::AbsDiffEq for HADec {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        f64::abs_diff_eq(&self.ha, &other.ha, epsilon)
            && f64::abs_diff_eq(&self.dec, &other.dec, epsilon)
    }
}
