// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Baseline geometry: projecting geocentric antenna positions onto a
//! phase-tracking direction.
//!
//! Antenna positions are Earth-fixed. At each instant they are rotated into
//! the J2000 frame (precession and nutation included), so UVWs are reported
//! in the same frame as J2000 phase centres.

use erfa::aliases::eraRxp;
use hifitime::{Duration, Epoch};
use log::trace;

use crate::{
    error::GeometryResolutionError,
    layout::AntennaLayout,
    pos::{
        direction::Direction,
        precession::{greenwich_hadec_to_j2000, precess_time},
        xyz::{xyzs_to_cross_uvws, xyzs_to_uvws_parallel},
    },
    AzEl, HADec, LatLngHeight, RADec, XyzGeocentric, UVW,
};

/// How geocentric vectors are projected onto (u, v, w) for one direction at
/// one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionBasis {
    /// Rotates geocentric (ITRF) vectors into the frame `phase_centre` is
    /// expressed in.
    pub frame: [[f64; 3]; 3],

    /// The direction the basis was made for, as a Greenwich hour angle and
    /// declination in `frame`.
    pub phase_centre: HADec,
}

impl ProjectionBasis {
    /// A basis in the J2000 frame for a J2000 phase centre.
    pub fn from_j2000(phase_centre: RADec, time: Epoch, dut1: Duration) -> ProjectionBasis {
        let precession = precess_time(phase_centre, time, dut1);
        ProjectionBasis {
            frame: precession.frame_matrix(),
            phase_centre: precession.hadec_j2000,
        }
    }

    /// Rotate a geocentric vector into this basis's frame.
    pub fn to_frame(&self, xyz: XyzGeocentric) -> XyzGeocentric {
        XyzGeocentric::from_array(eraRxp(self.frame, xyz.to_array()))
    }

    pub fn project(&self, xyz: XyzGeocentric) -> UVW {
        UVW::from_xyz(self.to_frame(xyz), self.phase_centre)
    }

    /// The unit vectors of the (u, v, w) axes, in the geocentric frame.
    pub fn axes(&self) -> [[f64; 3]; 3] {
        let (s_ha, c_ha) = self.phase_centre.ha.sin_cos();
        let (s_dec, c_dec) = self.phase_centre.dec.sin_cos();
        let in_frame = [
            [s_ha, c_ha, 0.0],
            [-s_dec * c_ha, s_dec * s_ha, c_dec],
            [c_dec * c_ha, -c_dec * s_ha, s_dec],
        ];
        // The frame is a rotation, so its transpose takes us back.
        in_frame.map(|axis| {
            let mut back = [0.0; 3];
            for (k, b) in back.iter_mut().enumerate() {
                *b = (0..3).map(|i| self.frame[i][k] * axis[i]).sum();
            }
            back
        })
    }
}

/// The coordinate-transform capability the geometry engine depends on.
pub trait CoordinateTransform: Sync {
    /// The (u, v, w) axes for `direction` at `time`, seen from `array_pos`.
    fn projection_basis(
        &self,
        direction: &Direction,
        time: Epoch,
        array_pos: LatLngHeight,
    ) -> Result<ProjectionBasis, GeometryResolutionError>;

    /// The J2000 equatorial coordinates of `direction` at `time`.
    fn to_radec(
        &self,
        direction: &Direction,
        time: Epoch,
        array_pos: LatLngHeight,
    ) -> Result<RADec, GeometryResolutionError>;
}

/// A [`CoordinateTransform`] using ERFA's IAU 2006/2000A precession-nutation
/// and apparent sidereal time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ErfaTransform {
    /// UT1 - UTC.
    pub dut1: Duration,
}

impl ErfaTransform {
    pub fn new(dut1: Duration) -> ErfaTransform {
        Self { dut1 }
    }

    fn check_time(&self, time: Epoch) -> Result<(), GeometryResolutionError> {
        let mjd = (time + self.dut1).to_mjd_utc_days();
        if !mjd.is_finite() {
            return Err(GeometryResolutionError::BadTime(mjd));
        }
        Ok(())
    }
}

impl CoordinateTransform for ErfaTransform {
    fn projection_basis(
        &self,
        direction: &Direction,
        time: Epoch,
        array_pos: LatLngHeight,
    ) -> Result<ProjectionBasis, GeometryResolutionError> {
        let radec = self.to_radec(direction, time, array_pos)?;
        let basis = ProjectionBasis::from_j2000(radec, time, self.dut1);
        trace!(
            "J2000 frame HADec of {direction} at {time}: {}",
            basis.phase_centre
        );
        Ok(basis)
    }

    fn to_radec(
        &self,
        direction: &Direction,
        time: Epoch,
        array_pos: LatLngHeight,
    ) -> Result<RADec, GeometryResolutionError> {
        let direction = direction.validate()?;
        self.check_time(time)?;
        let radec = match direction {
            Direction::J2000(radec) => radec,
            Direction::AzEl(azel) => {
                let local = azel.to_hadec(array_pos.latitude_rad);
                let greenwich = HADec::from_radians(local.ha - array_pos.longitude_rad, local.dec);
                greenwich_hadec_to_j2000(greenwich, time, self.dut1)
            }
        };
        Ok(radec)
    }
}

/// Every antenna projected once for one instant. Baselines are differences of
/// these, so a lookup serves all polarisations and channels at that instant.
#[derive(Clone, Debug, PartialEq)]
pub struct UvwLookup {
    timestamp: Epoch,
    ant_uvws: Vec<UVW>,
}

impl UvwLookup {
    pub fn new<T: CoordinateTransform + ?Sized>(
        layout: &AntennaLayout,
        direction: &Direction,
        timestamp: Epoch,
        transform: &T,
    ) -> Result<UvwLookup, GeometryResolutionError> {
        let array_pos = layout.array_position()?;
        let basis = transform.projection_basis(direction, timestamp, array_pos)?;
        // Offsets from the reference give the same baselines with less
        // cancellation than absolute positions.
        let ant_uvws = layout
            .antennas
            .iter()
            .map(|a| basis.project(a.offset))
            .collect();
        Ok(Self {
            timestamp,
            ant_uvws,
        })
    }

    pub fn timestamp(&self) -> Epoch {
        self.timestamp
    }

    pub fn num_antennas(&self) -> usize {
        self.ant_uvws.len()
    }

    /// The UVW of the baseline from antenna `i` to antenna `j`.
    pub fn get(&self, i: usize, j: usize) -> UVW {
        self.ant_uvws[j] - self.ant_uvws[i]
    }
}

/// The UVW of one baseline (`pos(j) - pos(i)`) at one instant.
pub fn baseline_uvw<T: CoordinateTransform + ?Sized>(
    i: usize,
    j: usize,
    timestamp: Epoch,
    direction: &Direction,
    layout: &AntennaLayout,
    transform: &T,
) -> Result<UVW, GeometryResolutionError> {
    let array_pos = layout.array_position()?;
    let basis = transform.projection_basis(direction, timestamp, array_pos)?;
    Ok(basis.project(layout.antennas[j].offset - layout.antennas[i].offset))
}

/// The UVWs of every baseline at one instant, ordered `(0,0), (0,1), ...`
/// (or `(0,1), (0,2), ...` without auto-correlations).
pub fn baseline_uvws<T: CoordinateTransform + ?Sized>(
    timestamp: Epoch,
    direction: &Direction,
    layout: &AntennaLayout,
    transform: &T,
    include_autos: bool,
) -> Result<Vec<UVW>, GeometryResolutionError> {
    let array_pos = layout.array_position()?;
    let basis = transform.projection_basis(direction, timestamp, array_pos)?;
    let offsets: Vec<XyzGeocentric> = layout
        .antennas
        .iter()
        .map(|a| basis.to_frame(a.offset))
        .collect();
    Ok(if include_autos {
        xyzs_to_uvws_parallel(&offsets, basis.phase_centre)
    } else {
        xyzs_to_cross_uvws(&offsets, basis.phase_centre)
    })
}

/// Settle the phase-tracking direction for a run. Without a requested
/// direction, the zenith at `first_timestamp` is used, frozen to RA/Dec so
/// that it tracks the sky afterwards.
pub fn resolve_phase_centre<T: CoordinateTransform + ?Sized>(
    direction: Option<Direction>,
    first_timestamp: Epoch,
    layout: &AntennaLayout,
    transform: &T,
) -> Result<Direction, GeometryResolutionError> {
    match direction {
        Some(d) => d.validate(),
        None => {
            let array_pos = layout.array_position()?;
            let zenith = Direction::AzEl(AzEl::zenith());
            let radec = transform.to_radec(&zenith, first_timestamp, array_pos)?;
            Ok(Direction::J2000(radec))
        }
    }
}
