// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Array correlation cubes (ACC).
//!
//! An ACC file has no header. It is a sequence of `nrcu × nrcu` complex128
//! blocks, one per subband, starting at subband 0; the station integrates
//! each subband for one second before moving on to the next.

use std::io::Read;

use hifitime::{Duration, Epoch, Unit};
use log::{debug, trace};

use super::{
    read::{rcu_block_c128_to_matrix, CaptureReader},
    IntegrationRecord,
};
use crate::{
    constants::{ACC_INTEGRATION_SECONDS, NUM_POLS},
    error::CorruptCaptureError,
};

pub struct AccDecoder<R: Read> {
    reader: CaptureReader<R>,
    nrcu: usize,
    start: Epoch,
    selection: Option<usize>,
    num_subbands: usize,
    next_subband: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read> AccDecoder<R> {
    /// `selection`, if given, is the only subband emitted; the others are
    /// still read so that a malformed file is noticed.
    pub fn new(
        reader: R,
        num_antennas: usize,
        start: Epoch,
        selection: Option<usize>,
        num_subbands: usize,
    ) -> Self {
        let nrcu = NUM_POLS * num_antennas;
        Self {
            reader: CaptureReader::new(reader),
            nrcu,
            start,
            selection,
            num_subbands,
            next_subband: 0,
            buf: vec![0; nrcu * nrcu * 16],
            done: false,
        }
    }
}

impl<R: Read> Iterator for AccDecoder<R> {
    type Item = Result<IntegrationRecord, CorruptCaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let offset = self.reader.offset();
            match self.reader.read_block(&mut self.buf) {
                Ok(true) => (),
                Ok(false) => {
                    debug!("ACC capture held {} subbands", self.next_subband);
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }

            let subband = self.next_subband;
            if subband >= self.num_subbands {
                self.done = true;
                return Some(Err(CorruptCaptureError::SubbandOutOfRange {
                    offset,
                    subband,
                    max: self.num_subbands,
                }));
            }
            self.next_subband += 1;
            if matches!(self.selection, Some(s) if s != subband) {
                trace!("Skipping ACC subband {subband}");
                continue;
            }

            let integration = Duration::from_f64(ACC_INTEGRATION_SECONDS, Unit::Second);
            let elapsed = Duration::from_f64(subband as f64 * ACC_INTEGRATION_SECONDS, Unit::Second);
            return Some(Ok(IntegrationRecord {
                timestamp: self.start + elapsed,
                integration,
                subband,
                chan: 0,
                num_chans: 1,
                data: rcu_block_c128_to_matrix(&self.buf, self.nrcu),
                flagged: false,
            }));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::capture::test_utils::{hermitian_matrix, rcu_block_c128};

    fn start() -> Epoch {
        Epoch::from_gregorian_utc_hms(2021, 3, 4, 10, 0, 0)
    }

    #[test]
    fn test_decode_all_subbands() {
        let matrices: Vec<_> = (0..3).map(|sb| hermitian_matrix(2, sb as f64)).collect();
        let bytes: Vec<u8> = matrices.iter().flat_map(rcu_block_c128).collect();

        let records: Vec<_> = AccDecoder::new(Cursor::new(bytes), 2, start(), None, 512)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        for (sb, (record, matrix)) in records.iter().zip(matrices.iter()).enumerate() {
            assert_eq!(record.subband, sb);
            assert_eq!(&record.data, matrix);
            assert_eq!(
                record.timestamp,
                start() + Duration::from_f64(sb as f64, Unit::Second)
            );
            assert!(!record.flagged);
        }
    }

    #[test]
    fn test_subband_selection() {
        let matrices: Vec<_> = (0..4).map(|sb| hermitian_matrix(3, sb as f64)).collect();
        let bytes: Vec<u8> = matrices.iter().flat_map(rcu_block_c128).collect();

        let records: Vec<_> = AccDecoder::new(Cursor::new(bytes), 3, start(), Some(2), 512)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subband, 2);
        assert_eq!(records[0].data, matrices[2]);
    }

    #[test]
    fn test_too_many_subbands() {
        let bytes: Vec<u8> = (0..3)
            .flat_map(|sb| rcu_block_c128(&hermitian_matrix(1, sb as f64)))
            .collect();
        let mut decoder = AccDecoder::new(Cursor::new(bytes), 1, start(), None, 2);
        assert!(decoder.next().unwrap().is_ok());
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(
            decoder.next(),
            Some(Err(CorruptCaptureError::SubbandOutOfRange {
                offset: 128,
                subband: 2,
                max: 2
            }))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_truncated() {
        let mut bytes = rcu_block_c128(&hermitian_matrix(2, 0.0));
        bytes.truncate(bytes.len() - 3);
        let mut decoder = AccDecoder::new(Cursor::new(bytes), 2, start(), None, 512);
        assert!(matches!(
            decoder.next(),
            Some(Err(CorruptCaptureError::Truncated { offset: 0, .. }))
        ));
        assert!(decoder.next().is_none());
    }
}
