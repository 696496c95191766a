// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Transient buffer board cross-correlations (TBB XC).
//!
//! Each record is a 32-byte header followed by `samples` RCU-major
//! `nrcu × nrcu` complex64 matrices:
//!
//! | offset | type      | field                                  |
//! |--------|-----------|----------------------------------------|
//! | 0      | `[u8; 4]` | `b"TBXC"`                              |
//! | 4      | `u32`     | subband                                |
//! | 8      | `f64`     | integration centre (Unix seconds)      |
//! | 16     | `u32`     | number of samples                      |
//! | 20     | `u32`     | number of antennas                     |
//! | 24     | `u32`     | flags; non-zero marks a bad record     |
//! | 28     | `u32`     | reserved                               |
//!
//! The samples are reduced to the requested number of channels by averaging
//! consecutive groups, and every channel becomes its own record.

use std::{collections::VecDeque, io::Read};

use byteorder::{ByteOrder, LittleEndian};
use hifitime::{Duration, Epoch};
use log::debug;
use ndarray::{Array3, Array4, Axis};

use super::{
    epoch_from_unix_seconds,
    read::{c64s_from_le_f32, payload_bytes, CaptureReader},
    IntegrationRecord, TimeAnchor,
};
use crate::{
    averaging::average_axis,
    constants::{NUM_POLS, TBBXC_HEADER_BYTES, TBBXC_MAGIC},
    error::CorruptCaptureError,
};

pub struct TbbxcDecoder<R: Read> {
    reader: CaptureReader<R>,
    num_antennas: usize,
    num_chans: usize,
    integration: Duration,
    anchor: TimeAnchor,
    num_subbands: usize,
    header_buf: Vec<u8>,
    payload_buf: Vec<u8>,
    pending: VecDeque<IntegrationRecord>,
    done: bool,
}

impl<R: Read> TbbxcDecoder<R> {
    pub fn new(
        reader: R,
        num_antennas: usize,
        num_chans: usize,
        integration: Duration,
        start_override: Option<Epoch>,
        num_subbands: usize,
    ) -> Self {
        Self {
            reader: CaptureReader::new(reader),
            num_antennas,
            num_chans,
            integration,
            anchor: TimeAnchor::new(start_override),
            num_subbands,
            header_buf: vec![0; TBBXC_HEADER_BYTES],
            payload_buf: vec![],
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Read one raw record and queue its reduced channels.
    fn decode_record(&mut self) -> Result<bool, CorruptCaptureError> {
        let offset = self.reader.offset();
        if !self.reader.read_block(&mut self.header_buf)? {
            return Ok(false);
        }
        let buf = &self.header_buf;
        let magic = LittleEndian::read_u32(&buf[0..4]);
        let expected_magic = u32::from_le_bytes(TBBXC_MAGIC);
        if magic != expected_magic {
            return Err(CorruptCaptureError::BadMagic {
                offset,
                expected: expected_magic,
                got: magic,
            });
        }
        let subband = LittleEndian::read_u32(&buf[4..8]) as usize;
        let time = LittleEndian::read_f64(&buf[8..16]);
        let num_samples = LittleEndian::read_u32(&buf[16..20]) as usize;
        let num_antennas = LittleEndian::read_u32(&buf[20..24]) as usize;
        let flags = LittleEndian::read_u32(&buf[24..28]);

        if num_antennas != self.num_antennas {
            return Err(CorruptCaptureError::AntennaCount {
                offset,
                expected: self.num_antennas,
                got: num_antennas,
            });
        }
        if num_samples == 0 || num_samples % self.num_chans != 0 {
            return Err(CorruptCaptureError::ChannelCount {
                offset,
                expected: self.num_chans,
                got: num_samples,
            });
        }
        if subband >= self.num_subbands {
            return Err(CorruptCaptureError::SubbandOutOfRange {
                offset,
                subband,
                max: self.num_subbands,
            });
        }
        let timestamp = self.anchor.apply(epoch_from_unix_seconds(time, offset)?);

        let nrcu = NUM_POLS * num_antennas;
        let payload_len = payload_bytes(offset, &[num_samples, nrcu, nrcu, 8])?;
        if !self.reader.read_payload(&mut self.payload_buf, payload_len)? {
            return Err(CorruptCaptureError::Truncated {
                offset,
                expected: TBBXC_HEADER_BYTES + payload_len,
                got: TBBXC_HEADER_BYTES,
            });
        }

        let channel_count_error = || CorruptCaptureError::ChannelCount {
            offset,
            expected: self.num_chans,
            got: num_samples,
        };
        let samples = Array3::from_shape_vec(
            (num_samples, nrcu, nrcu),
            c64s_from_le_f32(&self.payload_buf),
        )
        .map_err(|_| channel_count_error())?;
        let reduced = average_axis(samples.view(), Axis(0), num_samples / self.num_chans)
            .map_err(|_| channel_count_error())?;

        debug!(
            "TBB XC record at byte {offset}: subband {subband}, {num_samples} samples into {} channels",
            self.num_chans
        );
        for (chan, channel) in reduced.axis_iter(Axis(0)).enumerate() {
            let data = Array4::from_shape_fn(
                (num_antennas, num_antennas, NUM_POLS, NUM_POLS),
                |(a1, a2, p1, p2)| channel[[NUM_POLS * a1 + p1, NUM_POLS * a2 + p2]],
            );
            self.pending.push_back(IntegrationRecord {
                timestamp,
                integration: self.integration,
                subband,
                chan,
                num_chans: self.num_chans,
                data,
                flagged: flags != 0,
            });
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for TbbxcDecoder<R> {
    type Item = Result<IntegrationRecord, CorruptCaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.pending.pop_front() {
            return Some(Ok(record));
        }
        if self.done {
            return None;
        }
        match self.decode_record() {
            Ok(true) => self.pending.pop_front().map(Ok),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
