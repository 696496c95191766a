// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turning calibrated correlation matrices into baseline-ordered visibility
//! rows, and the dataset handed to writers.

use std::cmp::Ordering;

use hifitime::{Duration, Epoch};

use crate::{
    c64,
    capture::{CaptureFormat, IntegrationRecord},
    constants::NUM_POLS,
    error::StructuralMismatchError,
    freq::{RcuMode, SubbandFrequency},
    geometry::UvwLookup,
    layout::Pol,
    LatLngHeight, RADec, XyzGeocentric, UVW,
};

/// A pair of dipole polarisations, first antenna first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolPair {
    XX,
    XY,
    YX,
    YY,
}

impl PolPair {
    pub const ALL: [PolPair; 4] = [PolPair::XX, PolPair::XY, PolPair::YX, PolPair::YY];

    pub fn from_pols(p: Pol, q: Pol) -> PolPair {
        match (p, q) {
            (Pol::X, Pol::X) => PolPair::XX,
            (Pol::X, Pol::Y) => PolPair::XY,
            (Pol::Y, Pol::X) => PolPair::YX,
            (Pol::Y, Pol::Y) => PolPair::YY,
        }
    }

    pub fn pols(self) -> (Pol, Pol) {
        match self {
            PolPair::XX => (Pol::X, Pol::X),
            PolPair::XY => (Pol::X, Pol::Y),
            PolPair::YX => (Pol::Y, Pol::X),
            PolPair::YY => (Pol::Y, Pol::Y),
        }
    }
}

impl std::fmt::Display for PolPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (p, q) = self.pols();
        write!(f, "{p}{q}")
    }
}

/// One visibility: a baseline, polarisation pair, frequency and instant.
#[derive(Clone, Debug, PartialEq)]
pub struct VisRow {
    pub timestamp: Epoch,
    pub subband: usize,
    pub chan: usize,
    /// Always `<= ant2`.
    pub ant1: usize,
    pub ant2: usize,
    pub pol: PolPair,
    /// \[metres\]
    pub uvw: UVW,
    /// \[Hz\]
    pub freq_hz: f64,
    pub vis: c64,
    pub flag: bool,
    pub weight: f32,
}

impl VisRow {
    /// Order rows by timestamp, subband, channel, first antenna, second
    /// antenna, then polarisation pair.
    pub fn cmp_order(&self, other: &Self) -> Ordering {
        self.timestamp
            .to_gpst_seconds()
            .total_cmp(&other.timestamp.to_gpst_seconds())
            .then(self.subband.cmp(&other.subband))
            .then(self.chan.cmp(&other.chan))
            .then(self.ant1.cmp(&other.ant1))
            .then(self.ant2.cmp(&other.ant2))
            .then(self.pol.cmp(&other.pol))
    }
}

/// Make the rows for one calibrated record. Only baselines with
/// `ant1 <= ant2` are emitted; `ant1 == ant2` only with `include_autos`.
pub fn assemble(
    record: &IntegrationRecord,
    uvws: &UvwLookup,
    frequency: SubbandFrequency,
    include_autos: bool,
) -> Result<Vec<VisRow>, StructuralMismatchError> {
    let (rows, cols, p1, p2) = record.data.dim();
    if rows != cols {
        return Err(StructuralMismatchError::NotSquare { rows, cols });
    }
    if p1 != NUM_POLS || p2 != NUM_POLS {
        return Err(StructuralMismatchError::PolCount {
            expected: NUM_POLS,
            got: p1.max(p2),
        });
    }
    if rows != uvws.num_antennas() {
        return Err(StructuralMismatchError::AntennaCount {
            expected: uvws.num_antennas(),
            got: rows,
        });
    }

    let n = rows;
    let mut out = Vec::with_capacity(crate::math::num_baselines(n, include_autos) * PolPair::ALL.len());
    for ant1 in 0..n {
        let first = if include_autos { ant1 } else { ant1 + 1 };
        for ant2 in first..n {
            let uvw = uvws.get(ant1, ant2);
            for pol in PolPair::ALL {
                let (p, q) = pol.pols();
                let vis = record.data[[ant1, ant2, p.index(), q.index()]];
                let flag = record.flagged || !vis.is_finite();
                out.push(VisRow {
                    timestamp: record.timestamp,
                    subband: record.subband,
                    chan: record.chan,
                    ant1,
                    ant2,
                    pol,
                    uvw,
                    freq_hz: frequency.centre_hz,
                    vis,
                    flag,
                    weight: if flag { 0.0 } else { 1.0 },
                });
            }
        }
    }
    Ok(out)
}

#[derive(Clone, Debug, PartialEq)]
pub struct AntennaInfo {
    pub index: usize,
    pub name: String,
    /// Absolute geocentric (ITRF) position \[metres\].
    pub position: XyzGeocentric,
}

/// The channels of one subband that appear in a dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralWindow {
    pub subband: usize,
    /// \[Hz\]
    pub centre_hz: f64,
    /// \[Hz\]
    pub bandwidth_hz: f64,
    /// \[Hz\]
    pub chan_freqs_hz: Vec<f64>,
    /// \[Hz\]
    pub chan_width_hz: f64,
}

/// Run-level information for the writer's side tables.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetMetadata {
    pub antennas: Vec<AntennaInfo>,
    pub array_position: LatLngHeight,
    /// Ordered by subband.
    pub spectral_windows: Vec<SpectralWindow>,
    pub phase_centre: RADec,
    pub start_time: Epoch,
    pub integration: Duration,
    pub rcu_mode: RcuMode,
    pub format: CaptureFormat,
    pub station_name: String,
    /// The name and version of the software that made the dataset.
    pub software: String,
}

/// The output of a conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct VisDataset {
    /// Sorted with [`VisRow::cmp_order`].
    pub rows: Vec<VisRow>,
    pub metadata: DatasetMetadata,
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use hifitime::Unit;
    use ndarray::Array4;

    use super::*;
    use crate::{
        capture::test_utils::hermitian_matrix,
        constants::CS002_LBA_ITRF,
        geometry::ErfaTransform,
        layout::AntennaLayout,
        pos::direction::Direction,
        AzEl,
    };

    fn record(n: usize) -> IntegrationRecord {
        IntegrationRecord {
            timestamp: Epoch::from_gregorian_utc_hms(2022, 9, 1, 3, 0, 0),
            integration: Duration::from_f64(1.0, Unit::Second),
            subband: 150,
            chan: 0,
            num_chans: 1,
            data: hermitian_matrix(n, 0.0),
            flagged: false,
        }
    }

    fn lookup(n: usize) -> UvwLookup {
        let offsets: Vec<_> = (0..n)
            .map(|i| XyzGeocentric::from_array([i as f64 * 5.0, 0.0, -(i as f64)]))
            .collect();
        let layout =
            AntennaLayout::from_offsets("test", XyzGeocentric::from_array(CS002_LBA_ITRF), &offsets).unwrap();
        UvwLookup::new(
            &layout,
            &Direction::AzEl(AzEl::zenith()),
            record(n).timestamp,
            &ErfaTransform::default(),
        )
        .unwrap()
    }

    fn freq() -> SubbandFrequency {
        SubbandFrequency {
            centre_hz: 29.296875e6,
            bandwidth_hz: 195312.5,
        }
    }

    #[test]
    fn test_row_counts_and_order() {
        let rows = assemble(&record(4), &lookup(4), freq(), true).unwrap();
        assert_eq!(rows.len(), 10 * 4);
        assert!(rows.windows(2).all(|w| w[0].cmp_order(&w[1]) == Ordering::Less));
        assert!(rows.iter().all(|r| r.ant1 <= r.ant2));

        let rows = assemble(&record(4), &lookup(4), freq(), false).unwrap();
        assert_eq!(rows.len(), 6 * 4);
        assert!(rows.iter().all(|r| r.ant1 < r.ant2));
    }

    #[test]
    fn test_values_come_from_the_upper_triangle() {
        let r = record(3);
        let uvws = lookup(3);
        let rows = assemble(&r, &uvws, freq(), true).unwrap();
        for row in &rows {
            let (p, q) = row.pol.pols();
            assert_eq!(row.vis, r.data[[row.ant1, row.ant2, p.index(), q.index()]]);
            assert_abs_diff_eq!(row.uvw, uvws.get(row.ant1, row.ant2), epsilon = 1e-12);
            assert_eq!(row.freq_hz, freq().centre_hz);
            assert!(!row.flag);
            assert_eq!(row.weight, 1.0);
        }
    }

    #[test]
    fn test_flags() {
        let mut r = record(2);
        r.data[[0, 1, 1, 0]] = c64::new(f64::NAN, 0.0);
        let rows = assemble(&r, &lookup(2), freq(), true).unwrap();
        let flagged: Vec<_> = rows.iter().filter(|row| row.flag).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!((flagged[0].ant1, flagged[0].ant2, flagged[0].pol), (0, 1, PolPair::YX));
        assert_eq!(flagged[0].weight, 0.0);

        r.flagged = true;
        let rows = assemble(&r, &lookup(2), freq(), true).unwrap();
        assert!(rows.iter().all(|row| row.flag && row.weight == 0.0));
    }

    #[test]
    fn test_structural_mismatches() {
        assert_eq!(
            assemble(&record(3), &lookup(4), freq(), true),
            Err(StructuralMismatchError::AntennaCount {
                expected: 4,
                got: 3
            })
        );
        let mut r = record(2);
        r.data = Array4::zeros((2, 3, 2, 2));
        assert_eq!(
            assemble(&r, &lookup(2), freq(), true),
            Err(StructuralMismatchError::NotSquare { rows: 2, cols: 3 })
        );
        r.data = Array4::zeros((2, 2, 1, 1));
        assert_eq!(
            assemble(&r, &lookup(2), freq(), true),
            Err(StructuralMismatchError::PolCount {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_pol_pair_display() {
        assert_eq!(PolPair::YX.to_string(), "YX");
        assert_eq!(PolPair::from_pols(Pol::X, Pol::Y), PolPair::XY);
    }
}
