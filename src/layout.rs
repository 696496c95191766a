// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Antenna positions for a station (or an array of stations).
//!
//! Positions are geocentric: a reference position plus per-antenna offsets.
//! The layout can be built in code or read from a LOFAR `AntennaField.conf`
//! file, which looks like:
//!
//! ```text
//! LBA
//! 3 [ 3826923.546 460915.441 5064643.489 ]
//! 96 x 2 x 3 [
//!   -6.5 -0.9 5.1    -6.5 -0.9 5.1
//!   ...
//! ]
//! NORMAL_VECTOR LBA
//! 3 [ 0.598753 0.072099 0.797682 ]
//! ```

use std::{
    fs::File,
    io::{BufReader, Read},
    ops::Range,
    path::Path,
};

use log::{debug, warn};
use thiserror::Error;

use crate::{
    error::{GeometryResolutionError, InvalidParameterError},
    freq::AntennaField,
    LatLngHeight, XyzGeocentric,
};

/// A dipole polarisation. `X` dipoles are on even RCUs, `Y` on odd RCUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pol {
    X,
    Y,
}

impl Pol {
    pub const ALL: [Pol; 2] = [Pol::X, Pol::Y];

    pub fn index(self) -> usize {
        match self {
            Pol::X => 0,
            Pol::Y => 1,
        }
    }

    /// # Panics
    ///
    /// Panics if `index` is not 0 or 1.
    pub fn from_index(index: usize) -> Pol {
        Pol::ALL[index]
    }
}

impl std::fmt::Display for Pol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Pol::X => "X",
                Pol::Y => "Y",
            }
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Antenna {
    /// The index of this antenna in the correlation matrix.
    pub index: usize,
    pub name: String,
    /// The offset from the layout's reference position \[metres\].
    pub offset: XyzGeocentric,
    pub pols: [Pol; 2],
}

/// The antennas of one run, in correlator order.
#[derive(Clone, Debug, PartialEq)]
pub struct AntennaLayout {
    pub name: String,
    /// The array reference position (ITRF) \[metres\].
    pub reference: XyzGeocentric,
    pub antennas: Vec<Antenna>,
}

impl AntennaLayout {
    pub fn new(
        name: impl Into<String>,
        reference: XyzGeocentric,
        antennas: Vec<Antenna>,
    ) -> Result<AntennaLayout, InvalidParameterError> {
        if antennas.is_empty() {
            return Err(InvalidParameterError::NoAntennas);
        }
        Ok(Self {
            name: name.into(),
            reference,
            antennas,
        })
    }

    /// Build a layout from bare offsets; antennas are named after their index.
    pub fn from_offsets(
        name: impl Into<String>,
        reference: XyzGeocentric,
        offsets: &[XyzGeocentric],
    ) -> Result<AntennaLayout, InvalidParameterError> {
        let name = name.into();
        let antennas = offsets
            .iter()
            .enumerate()
            .map(|(index, &offset)| Antenna {
                index,
                name: format!("{name}_{index:03}"),
                offset,
                pols: Pol::ALL,
            })
            .collect();
        Self::new(name, reference, antennas)
    }

    pub fn num_antennas(&self) -> usize {
        self.antennas.len()
    }

    /// Absolute geocentric positions of all antennas, in index order.
    pub fn positions(&self) -> Vec<XyzGeocentric> {
        self.antennas
            .iter()
            .map(|a| self.reference + a.offset)
            .collect()
    }

    /// Keep only the antennas in `range`, renumbered from 0 in correlator
    /// order. Names are kept.
    fn select(self, range: Range<usize>) -> AntennaLayout {
        let antennas = self.antennas[range]
            .iter()
            .enumerate()
            .map(|(index, a)| Antenna {
                index,
                ..a.clone()
            })
            .collect();
        AntennaLayout { antennas, ..self }
    }

    /// The geodetic position of the reference point.
    pub fn array_position(&self) -> Result<LatLngHeight, GeometryResolutionError> {
        LatLngHeight::from_geocentric_wgs84(self.reference)
    }

    /// Read one antenna field (`LBA`, `HBA`, `HBA0`, ...) from a LOFAR
    /// `AntennaField.conf` file.
    pub fn from_antenna_field_file<P: AsRef<Path>>(
        path: P,
        station: &str,
        section: &str,
    ) -> Result<AntennaLayout, LayoutReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LayoutReadError::IO {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_antenna_field_reader(BufReader::new(file), station, section)
    }

    /// As [`AntennaLayout::from_antenna_field_file`], choosing the section
    /// for an antenna field. On Dutch stations only the antennas wired to
    /// that field are kept.
    pub fn from_antenna_field_file_for<P: AsRef<Path>>(
        path: P,
        station: &str,
        field: AntennaField,
    ) -> Result<AntennaLayout, LayoutReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LayoutReadError::IO {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_antenna_field_reader_for(BufReader::new(file), station, field)
    }

    pub fn from_antenna_field_reader_for<R: Read>(
        reader: R,
        station: &str,
        field: AntennaField,
    ) -> Result<AntennaLayout, LayoutReadError> {
        let section = field.section_name();
        let layout = Self::from_antenna_field_reader(reader, station, section)?;
        match field.dutch_antennas() {
            Some(range) if is_dutch_station(station) => {
                if layout.num_antennas() < range.end {
                    return Err(LayoutReadError::BadArray {
                        section: section.to_string(),
                        reason: format!(
                            "{field:?} needs antennas {range:?}, but only {} are listed",
                            layout.num_antennas()
                        ),
                    });
                }
                debug!("Keeping {section} antennas {range:?} of {station} for {field:?}");
                Ok(layout.select(range))
            }
            _ => Ok(layout),
        }
    }

    pub fn from_antenna_field_reader<R: Read>(
        mut reader: R,
        station: &str,
        section: &str,
    ) -> Result<AntennaLayout, LayoutReadError> {
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .map_err(|e| LayoutReadError::IO {
                path: "<reader>".to_string(),
                source: e,
            })?;
        let blocks = parse_blocks(&contents)?;

        let mut arrays = blocks
            .iter()
            .filter(|b| b.keywords.len() == 1 && b.keywords[0] == section);
        let centre = arrays
            .next()
            .ok_or_else(|| LayoutReadError::MissingSection(section.to_string()))?;
        let dipoles = arrays
            .next()
            .ok_or_else(|| LayoutReadError::BadArray {
                section: section.to_string(),
                reason: "no per-antenna offsets follow the centre".to_string(),
            })?;

        if centre.dims != [3] {
            return Err(LayoutReadError::BadArray {
                section: section.to_string(),
                reason: format!("expected the centre to have shape 3, got {:?}", centre.dims),
            });
        }
        let reference = XyzGeocentric::from_array([centre.values[0], centre.values[1], centre.values[2]]);

        let num_ants = match dipoles.dims.as_slice() {
            [n, 2, 3] => *n,
            other => {
                return Err(LayoutReadError::BadArray {
                    section: section.to_string(),
                    reason: format!("expected offsets shaped N x 2 x 3, got {other:?}"),
                })
            }
        };
        let antennas = dipoles
            .values
            .chunks_exact(6)
            .take(num_ants)
            .enumerate()
            .map(|(index, d)| {
                let x_pos = XyzGeocentric::from_array([d[0], d[1], d[2]]);
                let y_pos = XyzGeocentric::from_array([d[3], d[4], d[5]]);
                let separation = (x_pos - y_pos).norm();
                if separation > 1e-3 {
                    warn!(
                        "{section} antenna {index}: X and Y dipoles are {separation:.3} m apart; using the X position"
                    );
                }
                Antenna {
                    index,
                    name: format!("{station}{section}{index:03}"),
                    offset: x_pos,
                    pols: Pol::ALL,
                }
            })
            .collect::<Vec<_>>();
        debug!(
            "Read {} antennas for {station} {section}, reference {:?}",
            antennas.len(),
            reference.to_array()
        );

        AntennaLayout::new(format!("{station}{section}"), reference, antennas)
            .map_err(|_| LayoutReadError::MissingSection(section.to_string()))
    }
}

/// Core (CS) and remote (RS) stations are Dutch; their LBA fields are split
/// between receiver modes.
fn is_dutch_station(station: &str) -> bool {
    let prefix = station.get(..2).unwrap_or_default();
    prefix.eq_ignore_ascii_case("CS") || prefix.eq_ignore_ascii_case("RS")
}

/// One bracketed array in an antenna-field file, with the keywords that
/// precede it.
#[derive(Debug)]
struct FieldBlock {
    keywords: Vec<String>,
    dims: Vec<usize>,
    values: Vec<f64>,
}

fn parse_blocks(contents: &str) -> Result<Vec<FieldBlock>, LayoutReadError> {
    let tokens: Vec<String> = contents
        .lines()
        .map(|l| l.split('#').next().unwrap_or_default())
        .flat_map(|l| {
            l.replace('[', " [ ")
                .replace(']', " ] ")
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    let mut blocks = vec![];
    let mut keywords: Vec<String> = vec![];
    let mut last_keywords: Vec<String> = vec![];
    let mut tokens = tokens.iter();
    while let Some(token) = tokens.next() {
        if let Ok(first_dim) = token.parse::<usize>() {
            // A shape like "96 x 2 x 3 [".
            let mut dims = vec![first_dim];
            for t in tokens.by_ref() {
                match t.as_str() {
                    "x" => (),
                    "[" => break,
                    t => dims.push(t.parse().map_err(|_| LayoutReadError::Parse(t.to_string()))?),
                }
            }
            let mut values = vec![];
            for t in tokens.by_ref() {
                if t == "]" {
                    break;
                }
                values.push(t.parse().map_err(|_| LayoutReadError::Parse(t.to_string()))?);
            }
            let Some(expected) = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) else {
                return Err(LayoutReadError::BadArray {
                    section: last_keywords.join(" "),
                    reason: format!("shape {dims:?} is too large"),
                });
            };
            if values.len() != expected {
                return Err(LayoutReadError::BadArray {
                    section: last_keywords.join(" "),
                    reason: format!("shape {dims:?} needs {expected} values, got {}", values.len()),
                });
            }
            if !keywords.is_empty() {
                last_keywords = std::mem::take(&mut keywords);
            }
            blocks.push(FieldBlock {
                keywords: last_keywords.clone(),
                dims,
                values,
            });
        } else {
            keywords.push(token.clone());
        }
    }
    Ok(blocks)
}

#[derive(Error, Debug)]
pub enum LayoutReadError {
    #[error("Antenna field section '{0}' was not found")]
    MissingSection(String),

    #[error("Antenna field section '{section}' is malformed: {reason}")]
    BadArray { section: String, reason: String },

    #[error("Could not parse '{0}' as a number in the antenna field file")]
    Parse(String),

    #[error("Error reading antenna field file {path}: {source}")]
    IO {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
