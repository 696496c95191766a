// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handle UVW coordinates.

use super::{hadec::HADec, xyz::XyzGeocentric};

/// The (u,v,w) coordinates of a baseline, in metres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::upper_case_acronyms)]
pub struct UVW {
    /// u coordinate \[meters\]
    pub u: f64,
    /// v coordinate \[meters\]
    pub v: f64,
    /// w coordinate \[meters\]
    pub w: f64,
}

impl UVW {
    /// Convert a geocentric vector to [`UVW`], given the phase centre as a
    /// Greenwich hour angle and declination.
    ///
    /// This is Equation 4.1 of: Interferometry and Synthesis in Radio
    /// Astronomy, Third Edition, Section 4: Geometrical Relationships,
    /// Polarimetry, and the Measurement Equation.
    pub fn from_xyz(xyz: XyzGeocentric, phase_centre: HADec) -> Self {
        let (s_ha, c_ha) = phase_centre.ha.sin_cos();
        let (s_dec, c_dec) = phase_centre.dec.sin_cos();
        Self::from_xyz_inner(xyz, s_ha, c_ha, s_dec, c_dec)
    }

    /// As [`UVW::from_xyz`], with the sines and cosines of the phase centre
    /// precomputed for tight loops.
    pub fn from_xyz_inner(
        xyz: XyzGeocentric,
        s_ha: f64,
        c_ha: f64,
        s_dec: f64,
        c_dec: f64,
    ) -> Self {
        Self {
            u: s_ha * xyz.x + c_ha * xyz.y,
            v: -s_dec * c_ha * xyz.x + s_dec * s_ha * xyz.y + c_dec * xyz.z,
            w: c_dec * c_ha * xyz.x - c_dec * s_ha * xyz.y + s_dec * xyz.z,
        }
    }

    /// The length of the baseline \[metres\].
    pub fn norm(self) -> f64 {
        (self.u * self.u + self.v * self.v + self.w * self.w).sqrt()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.u, self.v, self.w]
    }
}

impl std::ops::Sub<UVW> for UVW {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        UVW {
            u: self.u - rhs.u,
            v: self.v - rhs.v,
            w: self.w - rhs.w,
        }
    }
}

impl std::ops::Neg for UVW {
    type Output = Self;

    fn neg(self) -> Self {
        UVW {
            u: -self.u,
            v: -self.v,
            w: -self.w,
        }
    }
}

impl std::ops::Mul<f64> for UVW {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        UVW {
            u: self.u * rhs,
            v: self.v * rhs,
            w: self.w * rhs,
        }
    }
}

impl std::ops::Div<f64> for UVW {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        UVW {
            u: self.u / rhs,
            v: self.v / rhs,
            w: self.w / rhs,
        }
    }
}

#[cfg(any(test, feature = "approx"))]
impl approx::AbsDiffEq for UVW {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        f64::abs_diff_eq(&self.u, &other.u, epsilon)
            && f64::abs_diff_eq(&self.v, &other.v, epsilon)
            && f64::abs_diff_eq(&self.w, &other.w, epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;

    #[test]
    fn test_w_points_at_the_source() {
        // A source on the equator at Greenwich hour angle 0 lies along +x.
        let hadec = HADec::from_radians(0.0, 0.0);
        let uvw = UVW::from_xyz(XyzGeocentric { x: 5.0, y: 0.0, z: 0.0 }, hadec);
        assert_abs_diff_eq!(uvw, UVW { u: 0.0, v: 0.0, w: 5.0 }, epsilon = 1e-12);

        // The pole is along +z.
        let hadec = HADec::from_degrees(37.0, 90.0);
        let uvw = UVW::from_xyz(XyzGeocentric { x: 0.0, y: 0.0, z: 2.0 }, hadec);
        assert_abs_diff_eq!(uvw.w, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_preserves_length() {
        let xyz = XyzGeocentric { x: 12.0, y: -4.0, z: 7.5 };
        let uvw = UVW::from_xyz(xyz, HADec::from_degrees(-71.0, -23.0));
        assert_abs_diff_eq!(uvw.norm(), xyz.norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_uvw_mul_div_neg() {
        let uvw = UVW {
            u: 1.0,
            v: 2.0,
            w: 3.0,
        } * 3.0;
        assert_abs_diff_eq!(uvw.u, 3.0);
        assert_abs_diff_eq!(uvw.v, 6.0);
        assert_abs_diff_eq!(uvw.w, 9.0);
        let uvw = -(uvw / 3.0);
        assert_eq!(uvw.to_array(), [-1.0, -2.0, -3.0]);
    }
}
