// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cross-correlation statistics (XST).
//!
//! Same block layout as ACC, but every block is a successive integration of
//! one subband.

use std::io::Read;

use hifitime::{Duration, Epoch, Unit};
use log::debug;

use super::{
    read::{rcu_block_c128_to_matrix, CaptureReader},
    IntegrationRecord,
};
use crate::{constants::NUM_POLS, error::CorruptCaptureError};

pub struct XstDecoder<R: Read> {
    reader: CaptureReader<R>,
    nrcu: usize,
    start: Epoch,
    integration: Duration,
    subband: usize,
    num_records: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read> XstDecoder<R> {
    pub fn new(
        reader: R,
        num_antennas: usize,
        start: Epoch,
        integration: Duration,
        subband: usize,
    ) -> Self {
        let nrcu = NUM_POLS * num_antennas;
        Self {
            reader: CaptureReader::new(reader),
            nrcu,
            start,
            integration,
            subband,
            num_records: 0,
            buf: vec![0; nrcu * nrcu * 16],
            done: false,
        }
    }
}

impl<R: Read> Iterator for XstDecoder<R> {
    type Item = Result<IntegrationRecord, CorruptCaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_block(&mut self.buf) {
            Ok(true) => (),
            Ok(false) => {
                debug!(
                    "XST capture held {} integrations of subband {}",
                    self.num_records, self.subband
                );
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        }

        let elapsed = Duration::from_f64(
            self.num_records as f64 * self.integration.to_seconds(),
            Unit::Second,
        );
        self.num_records += 1;
        Some(Ok(IntegrationRecord {
            timestamp: self.start + elapsed,
            integration: self.integration,
            subband: self.subband,
            chan: 0,
            num_chans: 1,
            data: rcu_block_c128_to_matrix(&self.buf, self.nrcu),
            flagged: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::capture::test_utils::{hermitian_matrix, rcu_block_c128};

    #[test]
    fn test_decode_time_series() {
        let start = Epoch::from_gregorian_utc_hms(2019, 11, 20, 6, 30, 0);
        let integration = Duration::from_f64(2.0, Unit::Second);
        let matrices: Vec<_> = (0..5).map(|i| hermitian_matrix(2, i as f64)).collect();
        let bytes: Vec<u8> = matrices.iter().flat_map(rcu_block_c128).collect();

        let records: Vec<_> = XstDecoder::new(Cursor::new(bytes), 2, start, integration, 300)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.subband, 300);
            assert_eq!(record.integration, integration);
            assert_eq!(
                record.timestamp,
                start + Duration::from_f64(2.0 * i as f64, Unit::Second)
            );
            assert_eq!(record.data, matrices[i]);
        }
    }

    #[test]
    fn test_truncated_second_record() {
        let mut bytes: Vec<u8> = (0..2)
            .flat_map(|i| rcu_block_c128(&hermitian_matrix(1, i as f64)))
            .collect();
        bytes.pop();
        let mut decoder = XstDecoder::new(
            Cursor::new(bytes),
            1,
            Epoch::from_unix_seconds(0.0),
            Duration::from_f64(1.0, Unit::Second),
            0,
        );
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(
            decoder.next(),
            Some(Err(CorruptCaptureError::Truncated {
                offset: 64,
                expected: 64,
                got: 63
            }))
        ));
        assert!(decoder.next().is_none());
    }
}
