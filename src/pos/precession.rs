// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to handle precession (including nutation).
//!
//! Station positions are Earth-fixed, but phase centres are given in J2000.
//! Rather than precessing every direction to the epoch of date, the antenna
//! positions are rotated into the J2000 frame, so that UVWs come out in the
//! same frame as the phase centre.
//!
//! This is a really good resource:
//! <https://lweb.cfa.harvard.edu/~jzhao/times.html>

use erfa::{
    aliases::{eraAnp, eraC2s, eraGst06a, eraPnm06a, eraRxp, eraS2c},
    constants::ERFA_DJM0,
};
use hifitime::{Duration, Epoch};

use crate::{HADec, RADec, XyzGeocentric};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrecessionInfo {
    /// Bias-precession-nutation rotation matrix, from the true equator and
    /// equinox of date to J2000.
    pub rotation_matrix: [[f64; 3]; 3],

    /// The phase centre at the epoch of date.
    pub radec_of_date: RADec,

    /// The precessed phase centre as a Greenwich hour angle in the J2000
    /// frame.
    pub hadec_j2000: HADec,

    /// Greenwich apparent sidereal time of the current epoch.
    pub gast: f64,

    /// The precessed Greenwich sidereal time in the J2000 frame.
    pub gast_j2000: f64,
}

impl PrecessionInfo {
    /// Rotate one geocentric vector into the J2000 frame.
    pub fn precess(&self, xyz: XyzGeocentric) -> XyzGeocentric {
        let (sep, cep) = self.gast.sin_cos();
        let (s2000, c2000) = self.gast_j2000.sin_cos();

        // rotate to the celestial frame of date
        let of_date = [cep * xyz.x - sep * xyz.y, sep * xyz.x + cep * xyz.y, xyz.z];
        let [x, y, z] = eraRxp(self.rotation_matrix, of_date);

        // rotate back to frame with x pointing out at gast_j2000
        XyzGeocentric {
            x: c2000 * x + s2000 * y,
            y: -s2000 * x + c2000 * y,
            z,
        }
    }

    pub fn precess_xyz(&self, xyzs: &[XyzGeocentric]) -> Vec<XyzGeocentric> {
        xyzs.iter().map(|&xyz| self.precess(xyz)).collect()
    }

    /// The combined rotation applied by [`PrecessionInfo::precess`].
    pub fn frame_matrix(&self) -> [[f64; 3]; 3] {
        let columns = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
            .map(|e| self.precess(XyzGeocentric::from_array(e)).to_array());
        let mut m = [[0.0; 3]; 3];
        for (j, column) in columns.iter().enumerate() {
            for (i, row) in m.iter_mut().enumerate() {
                row[j] = column[i];
            }
        }
        m
    }
}

/// Greenwich apparent sidereal time and the J2000-to-date bias-precession-
/// nutation matrix at `time`.
fn sidereal_and_bpn(time: Epoch, dut1: Duration) -> (f64, [[f64; 3]; 3]) {
    let ut1 = (time + dut1).to_mjd_utc_days();
    let tt = time.to_mjd_tt_days();
    let gast = eraGst06a(ERFA_DJM0, ut1, ERFA_DJM0, tt);
    (gast, eraPnm06a(ERFA_DJM0, tt))
}

fn transpose(m: [[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut t = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            t[j][i] = *v;
        }
    }
    t
}

fn rotate_radec(rotation_matrix: [[f64; 3]; 3], ra: f64, dec: f64) -> (f64, f64) {
    let v = eraRxp(rotation_matrix, eraS2c(ra, dec));
    let (ra2, dec2) = eraC2s(v);
    (eraAnp(ra2), dec2)
}

/// Obtain precessed coordinate information. `time` should be in the UTC frame,
/// and `dut1` (i.e. UT1 - UTC) provides a better estimate of the sidereal
/// time. If DUT1 isn't known, then a [`Duration`] of 0 seconds can be used;
/// the results are wrong by up to 0.9 seconds.
pub fn precess_time(phase_centre: RADec, time: Epoch, dut1: Duration) -> PrecessionInfo {
    let (gast, to_date) = sidereal_and_bpn(time, dut1);
    let rotation_matrix = transpose(to_date);

    let (ra, dec) = rotate_radec(to_date, phase_centre.ra, phase_centre.dec);
    let (gast_j2000, _) = rotate_radec(rotation_matrix, gast, 0.0);

    PrecessionInfo {
        rotation_matrix,
        radec_of_date: RADec::from_radians(ra, dec),
        hadec_j2000: HADec::from_radians(eraAnp(gast_j2000 - phase_centre.ra), phase_centre.dec),
        gast,
        gast_j2000,
    }
}

/// Convert a Greenwich hour angle and declination of date to J2000 RA/Dec.
pub fn greenwich_hadec_to_j2000(hadec: HADec, time: Epoch, dut1: Duration) -> RADec {
    let (gast, to_date) = sidereal_and_bpn(time, dut1);
    let (ra, dec) = rotate_radec(transpose(to_date), gast - hadec.ha, hadec.dec);
    RADec::from_radians(ra, dec)
}
