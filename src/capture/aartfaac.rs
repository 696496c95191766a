// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! AARTFAAC correlator output.
//!
//! Each record is a 512-byte header followed by the lower triangle of the
//! correlation matrix:
//!
//! | offset | type  | field                                 |
//! |--------|-------|---------------------------------------|
//! | 0      | `u32` | magic (raw or calibrated)             |
//! | 4      | `u32` | subband (calibrated files only)       |
//! | 8      | `f64` | integration start (Unix seconds)      |
//! | 16     | `f64` | integration end (Unix seconds)        |
//! | 24     | `u32` | number of antennas                    |
//! | 28     | `u32` | number of channels                    |
//! | 32     | `u32` | flags; non-zero marks a bad record    |
//!
//! The payload holds, for `a1` in `0..N` and `a2` in `0..=a1`, `channels`
//! groups of four complex64 values (XX, XY, YX, YY).

use std::{io::Read, str::FromStr};

use byteorder::{ByteOrder, LittleEndian};
use hifitime::{Duration, Unit};
use log::{debug, warn};
use ndarray::{Array3, Array4, Axis};

use super::{
    epoch_from_unix_seconds,
    read::{c64s_from_le_f32, payload_bytes, CaptureReader},
    IntegrationRecord, TimeAnchor,
};
use crate::{
    averaging::average_axis,
    c64,
    constants::{
        AARTFAAC_A12_ANTENNAS, AARTFAAC_A6_ANTENNAS, AARTFAAC_CAL_MAGIC, AARTFAAC_HEADER_BYTES,
        AARTFAAC_RAW_MAGIC, NUM_POLS,
    },
    error::{CorruptCaptureError, InvalidParameterError},
    math::{lower_triangle_index, num_baselines},
};

/// The AARTFAAC array configurations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AartfaacArray {
    /// Six core stations.
    A6,
    /// Twelve core stations.
    A12,
}

impl AartfaacArray {
    pub fn num_antennas(self) -> usize {
        match self {
            AartfaacArray::A6 => AARTFAAC_A6_ANTENNAS,
            AartfaacArray::A12 => AARTFAAC_A12_ANTENNAS,
        }
    }
}

impl FromStr for AartfaacArray {
    type Err = InvalidParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A6" => Ok(AartfaacArray::A6),
            "A12" => Ok(AartfaacArray::A12),
            _ => Err(InvalidParameterError::UnknownArray(s.to_string())),
        }
    }
}

/// Whether a file came straight from the correlator, or has been through the
/// AARTFAAC calibration pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AartfaacFlavour {
    Raw,
    Calibrated,
}

impl AartfaacFlavour {
    pub fn magic(self) -> u32 {
        match self {
            AartfaacFlavour::Raw => AARTFAAC_RAW_MAGIC,
            AartfaacFlavour::Calibrated => AARTFAAC_CAL_MAGIC,
        }
    }
}

struct Header {
    magic: u32,
    subband: usize,
    start: f64,
    end: f64,
    num_antennas: usize,
    num_chans: usize,
    flags: u32,
}

impl Header {
    fn parse(buf: &[u8]) -> Header {
        Header {
            magic: LittleEndian::read_u32(&buf[0..4]),
            subband: LittleEndian::read_u32(&buf[4..8]) as usize,
            start: LittleEndian::read_f64(&buf[8..16]),
            end: LittleEndian::read_f64(&buf[16..24]),
            num_antennas: LittleEndian::read_u32(&buf[24..28]) as usize,
            num_chans: LittleEndian::read_u32(&buf[28..32]) as usize,
            flags: LittleEndian::read_u32(&buf[32..36]),
        }
    }
}

pub struct AartfaacDecoder<R: Read> {
    reader: CaptureReader<R>,
    num_antennas: usize,
    flavour: AartfaacFlavour,
    subband: Option<usize>,
    anchor: TimeAnchor,
    num_subbands: usize,
    header_buf: Vec<u8>,
    payload_buf: Vec<u8>,
    warned_subband: bool,
    done: bool,
}

impl<R: Read> AartfaacDecoder<R> {
    /// For raw files `subband` must be given. For calibrated files the
    /// subband in each header is used.
    pub fn new(
        reader: R,
        num_antennas: usize,
        flavour: AartfaacFlavour,
        subband: Option<usize>,
        start_override: Option<hifitime::Epoch>,
        num_subbands: usize,
    ) -> Self {
        Self {
            reader: CaptureReader::new(reader),
            num_antennas,
            flavour,
            subband,
            anchor: TimeAnchor::new(start_override),
            num_subbands,
            header_buf: vec![0; AARTFAAC_HEADER_BYTES],
            payload_buf: vec![],
            warned_subband: false,
            done: false,
        }
    }

    fn decode_record(&mut self) -> Option<Result<IntegrationRecord, CorruptCaptureError>> {
        let offset = self.reader.offset();
        match self.reader.read_block(&mut self.header_buf) {
            Ok(true) => (),
            Ok(false) => return None,
            Err(e) => return Some(Err(e)),
        }
        let header = Header::parse(&self.header_buf);

        if header.magic != self.flavour.magic() {
            return Some(Err(CorruptCaptureError::BadMagic {
                offset,
                expected: self.flavour.magic(),
                got: header.magic,
            }));
        }
        if header.num_antennas != self.num_antennas {
            return Some(Err(CorruptCaptureError::AntennaCount {
                offset,
                expected: self.num_antennas,
                got: header.num_antennas,
            }));
        }
        if header.num_chans == 0 {
            return Some(Err(CorruptCaptureError::ChannelCount {
                offset,
                expected: 1,
                got: 0,
            }));
        }

        let subband = match (self.flavour, self.subband) {
            (AartfaacFlavour::Calibrated, Some(requested)) if requested != header.subband => {
                if !self.warned_subband {
                    warn!(
                        "AARTFAAC header says subband {}, but subband {requested} was requested; using the header",
                        header.subband
                    );
                    self.warned_subband = true;
                }
                header.subband
            }
            (AartfaacFlavour::Calibrated, _) => header.subband,
            (AartfaacFlavour::Raw, Some(requested)) => requested,
            (AartfaacFlavour::Raw, None) => header.subband,
        };
        if subband >= self.num_subbands {
            return Some(Err(CorruptCaptureError::SubbandOutOfRange {
                offset,
                subband,
                max: self.num_subbands,
            }));
        }

        if !(header.end >= header.start) {
            return Some(Err(CorruptCaptureError::BadTimestamp {
                offset,
                seconds: header.end,
            }));
        }
        let timestamp = match epoch_from_unix_seconds(0.5 * (header.start + header.end), offset) {
            Ok(t) => self.anchor.apply(t),
            Err(e) => return Some(Err(e)),
        };

        let num_bls = num_baselines(self.num_antennas, true);
        let payload_len = match payload_bytes(
            offset,
            &[num_bls, header.num_chans, NUM_POLS * NUM_POLS, 8],
        ) {
            Ok(n) => n,
            Err(e) => return Some(Err(e)),
        };
        match self.reader.read_payload(&mut self.payload_buf, payload_len) {
            Ok(true) => (),
            // A header without a payload.
            Ok(false) => {
                return Some(Err(CorruptCaptureError::Truncated {
                    offset,
                    expected: AARTFAAC_HEADER_BYTES + payload_len,
                    got: AARTFAAC_HEADER_BYTES,
                }))
            }
            Err(e) => return Some(Err(e)),
        }

        let values = c64s_from_le_f32(&self.payload_buf);
        let channel_count_error = || CorruptCaptureError::ChannelCount {
            offset,
            expected: 1,
            got: header.num_chans,
        };
        let blob = match Array3::from_shape_vec((num_bls, header.num_chans, 4), values) {
            Ok(b) => b,
            Err(_) => return Some(Err(channel_count_error())),
        };
        let averaged = match average_axis(blob.view(), Axis(1), header.num_chans) {
            Ok(a) => a,
            Err(_) => return Some(Err(channel_count_error())),
        };

        let n = self.num_antennas;
        let mut data = Array4::<c64>::zeros((n, n, NUM_POLS, NUM_POLS));
        for a1 in 0..n {
            for a2 in 0..=a1 {
                let bl = lower_triangle_index(a1, a2);
                for (k, &v) in averaged.slice(ndarray::s![bl, 0, ..]).iter().enumerate() {
                    let (p, q) = (k / NUM_POLS, k % NUM_POLS);
                    data[[a1, a2, p, q]] = v;
                    if a1 != a2 {
                        data[[a2, a1, q, p]] = v.conj();
                    }
                }
            }
        }

        debug!(
            "AARTFAAC record at byte {offset}: subband {subband}, {} channels, flags {:#x}",
            header.num_chans, header.flags
        );
        Some(Ok(IntegrationRecord {
            timestamp,
            integration: Duration::from_f64(header.end - header.start, Unit::Second),
            subband,
            chan: 0,
            num_chans: 1,
            data,
            flagged: header.flags != 0,
        }))
    }
}

impl<R: Read> Iterator for AartfaacDecoder<R> {
    type Item = Result<IntegrationRecord, CorruptCaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.decode_record();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use approx::assert_abs_diff_eq;
    use hifitime::Epoch;

    use super::*;
    use crate::capture::test_utils::{aartfaac_record, hermitian_matrix, AartfaacHeaderFields};

    fn fields(n: usize) -> AartfaacHeaderFields {
        AartfaacHeaderFields {
            magic: AARTFAAC_RAW_MAGIC,
            subband: 0,
            start: 1_500_000_000.0,
            end: 1_500_000_001.0,
            num_antennas: n as u32,
            num_chans: 1,
            flags: 0,
        }
    }

    #[test]
    fn test_decode_raw() {
        let m = hermitian_matrix(3, 0.5);
        let mut bytes = aartfaac_record(&fields(3), &m);
        bytes.extend(aartfaac_record(
            &AartfaacHeaderFields {
                start: 1_500_000_001.0,
                end: 1_500_000_002.0,
                flags: 1,
                ..fields(3)
            },
            &m,
        ));
        let records: Vec<_> =
            AartfaacDecoder::new(Cursor::new(bytes), 3, AartfaacFlavour::Raw, Some(296), None, 512)
                .collect::<Result<_, _>>()
                .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subband, 296);
        assert_abs_diff_eq!(records[0].data, m, epsilon = 1e-6);
        assert_eq!(records[0].timestamp, Epoch::from_unix_seconds(1_500_000_000.5));
        assert!(!records[0].flagged);
        assert!(records[1].flagged);
        assert_abs_diff_eq!(records[1].integration.to_seconds(), 1.0);
    }

    #[test]
    fn test_channels_are_averaged() {
        let m = hermitian_matrix(2, 1.0);
        let header = AartfaacHeaderFields {
            num_chans: 4,
            ..fields(2)
        };
        // Every channel holds the same matrix, so the average is the matrix.
        let bytes = aartfaac_record(&header, &m);
        let record = AartfaacDecoder::new(Cursor::new(bytes), 2, AartfaacFlavour::Raw, Some(1), None, 512)
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(record.num_chans, 1);
        assert_abs_diff_eq!(record.data, m, epsilon = 1e-5);
    }

    #[test]
    fn test_calibrated_header_subband_wins() {
        let m = hermitian_matrix(2, 0.0);
        let header = AartfaacHeaderFields {
            magic: AARTFAAC_CAL_MAGIC,
            subband: 310,
            ..fields(2)
        };
        let bytes = aartfaac_record(&header, &m);
        let record = AartfaacDecoder::new(
            Cursor::new(bytes),
            2,
            AartfaacFlavour::Calibrated,
            Some(300),
            None,
            512,
        )
        .next()
        .unwrap()
        .unwrap();
        assert_eq!(record.subband, 310);
    }

    #[test]
    fn test_bad_magic_and_antenna_count() {
        let m = hermitian_matrix(2, 0.0);
        let bytes = aartfaac_record(&fields(2), &m);
        let mut decoder = AartfaacDecoder::new(
            Cursor::new(bytes.clone()),
            2,
            AartfaacFlavour::Calibrated,
            None,
            None,
            512,
        );
        assert!(matches!(
            decoder.next(),
            Some(Err(CorruptCaptureError::BadMagic {
                offset: 0,
                expected: AARTFAAC_CAL_MAGIC,
                got: AARTFAAC_RAW_MAGIC
            }))
        ));
        assert!(decoder.next().is_none());

        let mut decoder =
            AartfaacDecoder::new(Cursor::new(bytes), 3, AartfaacFlavour::Raw, Some(0), None, 512);
        assert!(matches!(
            decoder.next(),
            Some(Err(CorruptCaptureError::AntennaCount {
                expected: 3,
                got: 2,
                ..
            }))
        ));
    }

    #[test]
    fn test_start_override() {
        let m = hermitian_matrix(1, 0.0);
        let mut bytes = aartfaac_record(&fields(1), &m);
        bytes.extend(aartfaac_record(
            &AartfaacHeaderFields {
                start: 1_500_000_010.0,
                end: 1_500_000_011.0,
                ..fields(1)
            },
            &m,
        ));
        let start = Epoch::from_gregorian_utc_hms(2020, 1, 1, 0, 0, 0);
        let records: Vec<_> =
            AartfaacDecoder::new(Cursor::new(bytes), 1, AartfaacFlavour::Raw, Some(0), Some(start), 512)
                .collect::<Result<_, _>>()
                .unwrap();
        assert_eq!(records[0].timestamp, start);
        assert_eq!(records[1].timestamp, start + Duration::from_f64(10.0, Unit::Second));
    }

    #[test]
    fn test_array_names() {
        assert_eq!("a6".parse::<AartfaacArray>(), Ok(AartfaacArray::A6));
        assert_eq!(AartfaacArray::A12.num_antennas(), 576);
        assert_eq!(
            "A24".parse::<AartfaacArray>(),
            Err(InvalidParameterError::UnknownArray("A24".to_string()))
        );
    }

    #[test]
    fn test_huge_channel_count_is_corrupt() {
        let m = hermitian_matrix(3, 0.0);
        let mut bytes = aartfaac_record(&fields(3), &m);
        bytes[28..32].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut decoder =
            AartfaacDecoder::new(Cursor::new(bytes), 3, AartfaacFlavour::Raw, Some(0), None, 512);
        assert!(matches!(
            decoder.next(),
            Some(Err(CorruptCaptureError::RecordTooLarge { offset: 0, .. }))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_channel_count_beyond_the_file_is_truncation() {
        let m = hermitian_matrix(3, 0.0);
        let mut bytes = aartfaac_record(&fields(3), &m);
        let payload = bytes.len() - AARTFAAC_HEADER_BYTES;
        bytes[28..32].copy_from_slice(&1_000_000u32.to_le_bytes());
        let mut decoder =
            AartfaacDecoder::new(Cursor::new(bytes), 3, AartfaacFlavour::Raw, Some(0), None, 512);
        match decoder.next() {
            Some(Err(CorruptCaptureError::Truncated {
                offset,
                expected,
                got,
            })) => {
                assert_eq!(offset, AARTFAAC_HEADER_BYTES as u64);
                assert_eq!(expected, 6 * 1_000_000 * 4 * 8);
                assert_eq!(got, payload);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }
}
