// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-antenna, per-polarisation complex gains, and their application to
//! correlation matrices.
//!
//! A correlation `V[i][j][p][q]` is corrected to
//! `V[i][j][p][q] * g(i, p) * conj(g(j, q))`. A gain that is needed but
//! missing stops the run; it is never assumed to be unity.

use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use ndarray::{Array2, Zip};
use num_traits::One;
use thiserror::Error;

use crate::{
    c64,
    capture::IntegrationRecord,
    constants::{NUM_POLS, NUM_SUBBANDS},
    error::MissingCalibrationError,
    freq::RcuMode,
    layout::Pol,
    math::rcu_to_ant_pol,
};

const HEADER_START: &str = "HeaderStart";
const HEADER_STOP: &str = "HeaderStop";
const MODE_KEY: &str = "CalTableHeader.Observation.Mode";
const STATION_KEY: &str = "CalTableHeader.Observation.Station";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct GainKey {
    antenna: usize,
    pol: Pol,
    subband: Option<usize>,
}

/// A table of complex gains. An entry can apply to one subband or to all of
/// them; subband-specific entries take precedence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationTable {
    gains: HashMap<GainKey, c64>,

    /// Key-value pairs from the file header, if the table was read from one.
    pub metadata: BTreeMap<String, String>,
}

impl CalibrationTable {
    pub fn new() -> CalibrationTable {
        Self::default()
    }

    /// A table with a unity gain for every polarisation of every antenna.
    pub fn unity(num_antennas: usize) -> CalibrationTable {
        let mut table = Self::new();
        for antenna in 0..num_antennas {
            for pol in Pol::ALL {
                table.insert(antenna, pol, None, c64::one());
            }
        }
        table
    }

    /// Add or replace a gain. `subband` of `None` applies to every subband
    /// without a specific entry.
    pub fn insert(&mut self, antenna: usize, pol: Pol, subband: Option<usize>, gain: c64) {
        self.gains.insert(
            GainKey {
                antenna,
                pol,
                subband,
            },
            gain,
        );
    }

    pub fn gain(
        &self,
        antenna: usize,
        pol: Pol,
        subband: usize,
    ) -> Result<c64, MissingCalibrationError> {
        let key = GainKey {
            antenna,
            pol,
            subband: Some(subband),
        };
        self.gains
            .get(&key)
            .or_else(|| self.gains.get(&GainKey { subband: None, ..key }))
            .copied()
            .ok_or(MissingCalibrationError {
                antenna,
                pol,
                subband,
            })
    }

    /// One more than the highest antenna index with any gain.
    pub fn num_antennas(&self) -> usize {
        self.gains
            .keys()
            .map(|k| k.antenna + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    /// The gains a record with `num_antennas` antennas in `subband` needs,
    /// shaped `[antenna][pol]`.
    pub fn gains_for(
        &self,
        num_antennas: usize,
        subband: usize,
    ) -> Result<Array2<c64>, MissingCalibrationError> {
        let mut gains = Array2::zeros((num_antennas, NUM_POLS));
        for antenna in 0..num_antennas {
            for pol in Pol::ALL {
                gains[[antenna, pol.index()]] = self.gain(antenna, pol, subband)?;
            }
        }
        Ok(gains)
    }

    /// Read a LOFAR station calibration table (`CalTable-*.dat`).
    ///
    /// These have an optional ASCII header between `HeaderStart` and
    /// `HeaderStop` lines, followed by complex128 gains shaped
    /// `[subband][rcu]`. If `mode` is given and the header names a different
    /// mode, a warning is logged.
    pub fn from_caltable_reader<R: Read>(
        mut reader: R,
        mode: Option<RcuMode>,
    ) -> Result<CalibrationTable, CalibrationReadError> {
        let mut contents = vec![];
        reader.read_to_end(&mut contents)?;

        let (metadata, body) = split_header(&contents)?;
        let row_bytes = 16 * NUM_SUBBANDS;
        if body.is_empty() || body.len() % row_bytes != 0 {
            return Err(CalibrationReadError::BadSize {
                bytes: body.len(),
                subbands: NUM_SUBBANDS,
            });
        }
        let nrcu = body.len() / row_bytes;

        if let (Some(mode), Some(file_mode)) = (mode, metadata.get(MODE_KEY)) {
            if file_mode.trim() != mode.number().to_string() {
                warn!("Calibration table is for RCU mode {file_mode}, but the data were taken in mode {mode}");
            }
        }
        if let Some(station) = metadata.get(STATION_KEY) {
            debug!("Calibration table for station {station}");
        }

        let mut floats = vec![0.0; 2 * nrcu * NUM_SUBBANDS];
        let mut body = body;
        body.read_f64_into::<LittleEndian>(&mut floats)?;

        let mut table = CalibrationTable {
            gains: HashMap::with_capacity(nrcu * NUM_SUBBANDS),
            metadata,
        };
        for (i, pair) in floats.chunks_exact(2).enumerate() {
            let subband = i / nrcu;
            let (antenna, pol) = rcu_to_ant_pol(i % nrcu);
            table.insert(antenna, Pol::from_index(pol), Some(subband), c64::new(pair[0], pair[1]));
        }
        debug!("Read calibration gains for {nrcu} RCUs");
        Ok(table)
    }

    pub fn from_caltable_file<P: AsRef<Path>>(
        path: P,
        mode: Option<RcuMode>,
    ) -> Result<CalibrationTable, CalibrationReadError> {
        let file = File::open(path)?;
        Self::from_caltable_reader(BufReader::new(file), mode)
    }
}

/// Separate the ASCII header (if any) from the binary gains.
fn split_header(contents: &[u8]) -> Result<(BTreeMap<String, String>, &[u8]), CalibrationReadError> {
    let mut metadata = BTreeMap::new();
    if !contents.starts_with(HEADER_START.as_bytes()) {
        return Ok((metadata, contents));
    }
    let stop = contents
        .windows(HEADER_STOP.len())
        .position(|w| w == HEADER_STOP.as_bytes())
        .ok_or(CalibrationReadError::UnterminatedHeader)?;
    let header = String::from_utf8_lossy(&contents[HEADER_START.len()..stop]);
    for line in header.lines() {
        if let Some((key, value)) = line.split_once('=') {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let mut body_start = stop + HEADER_STOP.len();
    if contents.get(body_start) == Some(&b'\r') {
        body_start += 1;
    }
    if contents.get(body_start) == Some(&b'\n') {
        body_start += 1;
    }
    Ok((metadata, &contents[body_start..]))
}

/// Apply gains to a record. Without a table this is the identity.
pub fn apply(
    mut record: IntegrationRecord,
    table: Option<&CalibrationTable>,
) -> Result<IntegrationRecord, MissingCalibrationError> {
    let Some(table) = table else {
        return Ok(record);
    };
    let gains = table.gains_for(record.num_antennas(), record.subband)?;
    Zip::indexed(&mut record.data).for_each(|(i, j, p, q), v| {
        *v *= gains[[i, p]] * gains[[j, q]].conj();
    });
    Ok(record)
}

#[derive(Error, Debug)]
pub enum CalibrationReadError {
    #[error("Calibration table has {bytes} bytes of gains, which is not a whole number of complex128 values for {subbands} subbands")]
    BadSize { bytes: usize, subbands: usize },

    #[error("Calibration table header has no HeaderStop line")]
    UnterminatedHeader,

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
