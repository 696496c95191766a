// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The error taxonomy of a conversion. Every error here is fatal to the run
//! that raised it; nothing is retried.

use thiserror::Error;

use crate::{capture::CaptureFormat, layout::Pol};

/// A bad mode, subband or other caller-supplied value. The run never starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidParameterError {
    #[error("RCU mode {0} is not valid; valid modes are 1 to 7")]
    UnknownRcuMode(u8),

    #[error("Subband {subband} is out of range; RCU mode {mode} has {max} subbands")]
    SubbandOutOfRange { subband: usize, mode: u8, max: usize },

    #[error("Channel {chan} is out of range for a subband split into {num_chans} channels")]
    ChannelOutOfRange { chan: usize, num_chans: usize },

    #[error("{format} captures need a start time, but none was given")]
    MissingStartTime { format: CaptureFormat },

    #[error("{format} captures need an explicit subband, but none was given")]
    MissingSubband { format: CaptureFormat },

    #[error("The integration time must be positive and finite, got {0} s")]
    BadIntegrationTime(f64),

    #[error("The number of output channels must be at least 1, got {0}")]
    BadChannelCount(usize),

    #[error("A capture needs at least one antenna")]
    NoAntennas,

    #[error("'{0}' is not a known AARTFAAC array; expected A6 or A12")]
    UnknownArray(String),

    #[error("Could not parse '{0}' as a start time; expected YYYYMMDD_HHMMSS")]
    BadStartTime(String),
}

/// Malformed binary input. `offset` is the byte offset of the record that
/// could not be decoded.
#[derive(Error, Debug)]
pub enum CorruptCaptureError {
    #[error("Capture truncated at byte {offset}: expected {expected} bytes for a record, got {got}")]
    Truncated {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("Record at byte {offset} declares a payload larger than {max} bytes")]
    RecordTooLarge { offset: u64, max: u64 },

    #[error("Bad magic at byte {offset}: expected {expected:#010x}, got {got:#010x}")]
    BadMagic { offset: u64, expected: u32, got: u32 },

    #[error("Record at byte {offset} declares {got} antennas, but {expected} were expected")]
    AntennaCount {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("Record at byte {offset} has {got} channels, which is incompatible with {expected}")]
    ChannelCount {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("Record at byte {offset} is for subband {subband}, but only {max} subbands exist")]
    SubbandOutOfRange {
        offset: u64,
        subband: usize,
        max: usize,
    },

    #[error("Record at byte {offset} has a timestamp that cannot be represented ({seconds} s)")]
    BadTimestamp { offset: u64, seconds: f64 },

    #[error("I/O error reading the capture at byte {offset}: {source}")]
    IO {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
}

/// A gain that was needed but is not in the calibration table. Never replaced
/// with unity.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("No calibration gain for antenna {antenna}, polarisation {pol}, subband {subband}")]
pub struct MissingCalibrationError {
    pub antenna: usize,
    pub pol: Pol,
    pub subband: usize,
}

/// The phase-tracking direction or a timestamp could not be resolved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryResolutionError {
    #[error("Could not parse direction '{input}': {reason}")]
    BadDirection { input: String, reason: String },

    #[error("Unknown direction reference frame '{0}'; expected J2000 or AZEL")]
    UnknownFrame(String),

    #[error("Declination {0} rad is outside [-pi/2, pi/2]")]
    DeclinationOutOfRange(f64),

    #[error("Elevation {0} rad is outside [-pi/2, pi/2]")]
    ElevationOutOfRange(f64),

    #[error("The direction has non-finite coordinates")]
    NonFiniteDirection,

    #[error("Cannot compute sidereal time for MJD {0}")]
    BadTime(f64),

    #[error("The array reference position ({x}, {y}, {z}) m is not on the Earth")]
    BadArrayPosition { x: f64, y: f64, z: f64 },
}

/// Decoded data does not have the shape the run's configuration implies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralMismatchError {
    #[error("Record has {got} antennas, but the antenna layout has {expected}")]
    AntennaCount { expected: usize, got: usize },

    #[error("Record has {got} polarisations per antenna, but {expected} are required")]
    PolCount { expected: usize, got: usize },

    #[error("Record correlation matrix is not square: {rows} x {cols} antennas")]
    NotSquare { rows: usize, cols: usize },

    #[error("Calibration table has gains for {got} antennas, but the antenna layout has {expected}")]
    CalibrationAntennas { expected: usize, got: usize },
}

/// Everything that can stop a conversion.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),

    #[error(transparent)]
    CorruptCapture(#[from] CorruptCaptureError),

    #[error(transparent)]
    MissingCalibration(#[from] MissingCalibrationError),

    #[error(transparent)]
    GeometryResolution(#[from] GeometryResolutionError),

    #[error(transparent)]
    StructuralMismatch(#[from] StructuralMismatchError),

    #[error("The {0} capture held no integrations")]
    EmptyCapture(CaptureFormat),

    #[error(transparent)]
    Write(#[from] crate::io::IOError),
}
