// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Low-level reading shared by the capture decoders.

use std::io::{ErrorKind, Read};

use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use ndarray::Array4;

use crate::{
    c64,
    constants::{MAX_RECORD_PAYLOAD_BYTES, NUM_POLS},
    error::CorruptCaptureError,
    math::rcu_to_ant_pol,
};

/// A forward-only reader that tracks its byte offset.
pub(crate) struct CaptureReader<R: Read> {
    reader: R,
    offset: u64,
}

impl<R: Read> CaptureReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    /// The offset of the next unread byte.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Fill `buf` completely. Returns `Ok(false)` if the stream ended cleanly
    /// before the first byte, and [`CorruptCaptureError::Truncated`] if it
    /// ended part-way through.
    pub(crate) fn read_block(&mut self, buf: &mut [u8]) -> Result<bool, CorruptCaptureError> {
        let start = self.offset;
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(CorruptCaptureError::IO {
                        offset: start + filled as u64,
                        source: e,
                    })
                }
            }
        }
        self.offset += filled as u64;

        if filled == 0 && !buf.is_empty() {
            trace!("End of capture at byte {start}");
            return Ok(false);
        }
        if filled < buf.len() {
            return Err(CorruptCaptureError::Truncated {
                offset: start,
                expected: buf.len(),
                got: filled,
            });
        }
        trace!("Read {} bytes at byte {start}", buf.len());
        Ok(true)
    }

    /// As [`CaptureReader::read_block`], but `buf` only grows as bytes
    /// arrive, so a header declaring a huge payload cannot exhaust memory on
    /// a short file.
    pub(crate) fn read_payload(
        &mut self,
        buf: &mut Vec<u8>,
        len: usize,
    ) -> Result<bool, CorruptCaptureError> {
        let start = self.offset;
        buf.clear();
        let result = (&mut self.reader).take(len as u64).read_to_end(buf);
        let filled = buf.len();
        self.offset += filled as u64;
        if let Err(e) = result {
            return Err(CorruptCaptureError::IO {
                offset: start + filled as u64,
                source: e,
            });
        }

        if filled == 0 && len != 0 {
            trace!("End of capture at byte {start}");
            return Ok(false);
        }
        if filled < len {
            return Err(CorruptCaptureError::Truncated {
                offset: start,
                expected: len,
                got: filled,
            });
        }
        trace!("Read {len} bytes at byte {start}");
        Ok(true)
    }
}

/// The payload size declared by a record header, as the product of `dims`.
/// Overflowing or implausibly large sizes mean the header is corrupt.
pub(crate) fn payload_bytes(offset: u64, dims: &[usize]) -> Result<usize, CorruptCaptureError> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n as u64 <= MAX_RECORD_PAYLOAD_BYTES)
        .ok_or(CorruptCaptureError::RecordTooLarge {
            offset,
            max: MAX_RECORD_PAYLOAD_BYTES,
        })
}

/// Reorder an RCU-major `nrcu × nrcu` matrix of complex values (given as
/// interleaved real/imaginary floats) into the canonical
/// `[ant1][ant2][pol1][pol2]` layout.
fn rcu_floats_to_matrix(floats: &[f64], nrcu: usize) -> Array4<c64> {
    let num_ants = nrcu / NUM_POLS;
    let mut matrix = Array4::zeros((num_ants, num_ants, NUM_POLS, NUM_POLS));
    for rcu1 in 0..nrcu {
        let (a1, p1) = rcu_to_ant_pol(rcu1);
        for rcu2 in 0..nrcu {
            let (a2, p2) = rcu_to_ant_pol(rcu2);
            let i = 2 * (rcu1 * nrcu + rcu2);
            matrix[[a1, a2, p1, p2]] = c64::new(floats[i], floats[i + 1]);
        }
    }
    matrix
}

/// Decode `nrcu × nrcu` little-endian complex128 values.
pub(crate) fn rcu_block_c128_to_matrix(bytes: &[u8], nrcu: usize) -> Array4<c64> {
    let mut floats = vec![0.0; 2 * nrcu * nrcu];
    LittleEndian::read_f64_into(bytes, &mut floats);
    rcu_floats_to_matrix(&floats, nrcu)
}

/// Decode `nrcu × nrcu` little-endian complex64 values.
pub(crate) fn rcu_block_c64_to_matrix(bytes: &[u8], nrcu: usize) -> Array4<c64> {
    let mut floats = vec![0.0f32; 2 * nrcu * nrcu];
    LittleEndian::read_f32_into(bytes, &mut floats);
    let floats: Vec<f64> = floats.into_iter().map(f64::from).collect();
    rcu_floats_to_matrix(&floats, nrcu)
}

/// Decode little-endian complex64 values.
pub(crate) fn c64s_from_le_f32(bytes: &[u8]) -> Vec<c64> {
    let mut floats = vec![0.0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut floats);
    floats
        .chunks_exact(2)
        .map(|c| c64::new(c[0] as f64, c[1] as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_read_block_eof_and_truncation() {
        let mut reader = CaptureReader::new(Cursor::new(vec![1u8; 10]));
        let mut buf = [0u8; 4];
        assert!(reader.read_block(&mut buf).unwrap());
        assert!(reader.read_block(&mut buf).unwrap());
        assert_eq!(reader.offset(), 8);
        match reader.read_block(&mut buf) {
            Err(CorruptCaptureError::Truncated {
                offset,
                expected,
                got,
            }) => {
                assert_eq!(offset, 8);
                assert_eq!(expected, 4);
                assert_eq!(got, 2);
            }
            other => panic!("expected truncation, got {other:?}"),
        }

        let mut reader = CaptureReader::new(Cursor::new(vec![]));
        assert!(!reader.read_block(&mut buf).unwrap());
    }

    #[test]
    fn test_read_payload_grows_with_the_data() {
        let mut reader = CaptureReader::new(Cursor::new(vec![3u8; 10]));
        let mut buf = vec![];
        assert!(reader.read_payload(&mut buf, 6).unwrap());
        assert_eq!(buf, vec![3u8; 6]);
        // A declared length far beyond the file only reads what is there.
        match reader.read_payload(&mut buf, 1 << 30) {
            Err(CorruptCaptureError::Truncated {
                offset,
                expected,
                got,
            }) => {
                assert_eq!(offset, 6);
                assert_eq!(expected, 1 << 30);
                assert_eq!(got, 4);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(buf.capacity() < 1 << 20);
        assert!(!reader.read_payload(&mut buf, 6).unwrap());
    }

    #[test]
    fn test_payload_bytes_limits() {
        assert_eq!(payload_bytes(0, &[6, 1, 4, 8]).unwrap(), 192);
        assert!(matches!(
            payload_bytes(512, &[usize::MAX, 2]),
            Err(CorruptCaptureError::RecordTooLarge { offset: 512, .. })
        ));
        assert!(matches!(
            payload_bytes(0, &[MAX_RECORD_PAYLOAD_BYTES as usize, 2]),
            Err(CorruptCaptureError::RecordTooLarge { .. })
        ));
        assert_eq!(
            payload_bytes(0, &[MAX_RECORD_PAYLOAD_BYTES as usize]).unwrap() as u64,
            MAX_RECORD_PAYLOAD_BYTES
        );
    }

    #[test]
    fn test_rcu_reordering() {
        // 2 antennas, 4 RCUs; value encodes (rcu1, rcu2).
        let nrcu = 4;
        let mut bytes = vec![];
        for rcu1 in 0..nrcu {
            for rcu2 in 0..nrcu {
                bytes.extend_from_slice(&(rcu1 as f64).to_le_bytes());
                bytes.extend_from_slice(&(rcu2 as f64).to_le_bytes());
            }
        }
        let m = rcu_block_c128_to_matrix(&bytes, nrcu);
        assert_eq!(m.dim(), (2, 2, 2, 2));
        // antenna 1 Y is RCU 3, antenna 0 X is RCU 0
        assert_eq!(m[[1, 0, 1, 0]], c64::new(3.0, 0.0));
        assert_eq!(m[[0, 1, 1, 0]], c64::new(1.0, 2.0));
    }
}
