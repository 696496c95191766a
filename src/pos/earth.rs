// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handling of Earth Coordinates (Latitude/Longitude/Height)

use std::fmt::Display;

use erfa::{aliases::eraGc2gde, Ellipsoid};

use crate::{error::GeometryResolutionError, XyzGeocentric};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
/// An earth position: Latitude, Longitude and Height [radians, meters]
pub struct LatLngHeight {
    /// Longitude \[radians\]
    pub longitude_rad: f64,
    /// Latitude \[radians\]
    pub latitude_rad: f64,
    /// Height above ellipsoid \[meters\]
    pub height_metres: f64,
}

impl LatLngHeight {
    /// Convert a geocentric (ITRF) position to WGS84 geodetic coordinates via
    /// [`erfa::transform::geocentric_to_geodetic_inner`].
    ///
    /// Station reference positions are supplied geocentrically, but the
    /// latitude is needed for horizon coordinates.
    pub fn from_geocentric_wgs84(xyz: XyzGeocentric) -> Result<LatLngHeight, GeometryResolutionError> {
        let XyzGeocentric { x, y, z } = xyz;
        let bad_position = || GeometryResolutionError::BadArrayPosition { x, y, z };
        // The geocentre and its neighbourhood have no meaningful latitude.
        if !xyz.is_finite() || xyz.norm() < 1.0 {
            return Err(bad_position());
        }

        let (a, f) = Ellipsoid::WGS84.get_params();
        let [longitude_rad, latitude_rad, height_metres] =
            eraGc2gde(a, f, xyz.to_array()).map_err(|_| bad_position())?;
        Ok(LatLngHeight {
            longitude_rad,
            latitude_rad,
            height_metres,
        })
    }

    /// Convert to [`XyzGeocentric`] via
    /// [`erfa::transform::geodetic_to_geocentric`] with the specified
    /// [`Ellipsoid`]
    pub fn to_geocentric(self, ellipsoid: Ellipsoid) -> Result<XyzGeocentric, GeometryResolutionError> {
        let geocentric_vector = erfa::transform::geodetic_to_geocentric(
            ellipsoid,
            self.longitude_rad,
            self.latitude_rad,
            self.height_metres,
        )
        .map_err(|_| GeometryResolutionError::BadArrayPosition {
            x: self.longitude_rad,
            y: self.latitude_rad,
            z: self.height_metres,
        })?;
        Ok(XyzGeocentric {
            x: geocentric_vector[0],
            y: geocentric_vector[1],
            z: geocentric_vector[2],
        })
    }

    /// Convert to geocentric via the default [`Ellipsoid::WGS84`].
    pub fn to_geocentric_wgs84(self) -> Result<XyzGeocentric, GeometryResolutionError> {
        self.to_geocentric(Ellipsoid::WGS84)
    }
}

impl Display for LatLngHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ longitude: {:.4}°, latitude: {:.4}°, height: {}m }}",
            self.longitude_rad.to_degrees(),
            self.latitude_rad.to_degrees(),
            self.height_metres
        )
    }
}

#[cfg(any(test, feature = "approx"))]
impl approx::AbsDiffEq for LatLngHeight {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        f64::abs_diff_eq(&self.longitude_rad, &other.longitude_rad, epsilon)
            && f64::abs_diff_eq(&self.latitude_rad, &other.latitude_rad, epsilon)
            && f64::abs_diff_eq(&self.height_metres, &other.height_metres, epsilon)
    }
}
