// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Writers for synthetic captures.

use ndarray::Array4;

use crate::{
    c64,
    constants::{AARTFAAC_HEADER_BYTES, NUM_POLS, TBBXC_MAGIC},
    math::lower_triangle_index,
};

/// A Hermitian `[ant1][ant2][pol1][pol2]` matrix whose entries all differ.
/// Values are exactly representable as `f32` for small `num_antennas` when
/// `seed` is a multiple of 0.25.
pub(crate) fn hermitian_matrix(num_antennas: usize, seed: f64) -> Array4<c64> {
    Array4::from_shape_fn(
        (num_antennas, num_antennas, NUM_POLS, NUM_POLS),
        |(a1, a2, p1, p2)| {
            let r1 = (NUM_POLS * a1 + p1) as f64;
            let r2 = (NUM_POLS * a2 + p2) as f64;
            if r1 == r2 {
                c64::new(r1 + 1.0 + seed, 0.0)
            } else if r1 < r2 {
                c64::new(r1 + 0.25 * r2 + seed, 0.5 * (r2 - r1))
            } else {
                c64::new(r2 + 0.25 * r1 + seed, -0.5 * (r1 - r2))
            }
        },
    )
}

/// The flat RCU-major values of a matrix.
fn rcu_major(matrix: &Array4<c64>) -> Vec<c64> {
    let n = matrix.dim().0;
    let nrcu = NUM_POLS * n;
    let mut out = Vec::with_capacity(nrcu * nrcu);
    for rcu1 in 0..nrcu {
        for rcu2 in 0..nrcu {
            out.push(matrix[[rcu1 / 2, rcu2 / 2, rcu1 % 2, rcu2 % 2]]);
        }
    }
    out
}

/// An ACC/XST block.
pub(crate) fn rcu_block_c128(matrix: &Array4<c64>) -> Vec<u8> {
    rcu_major(matrix)
        .into_iter()
        .flat_map(|v| [v.re.to_le_bytes(), v.im.to_le_bytes()])
        .flatten()
        .collect()
}

fn push_c64(bytes: &mut Vec<u8>, v: c64) {
    bytes.extend_from_slice(&(v.re as f32).to_le_bytes());
    bytes.extend_from_slice(&(v.im as f32).to_le_bytes());
}

pub(crate) struct AartfaacHeaderFields {
    pub(crate) magic: u32,
    pub(crate) subband: u32,
    pub(crate) start: f64,
    pub(crate) end: f64,
    pub(crate) num_antennas: u32,
    pub(crate) num_chans: u32,
    pub(crate) flags: u32,
}

/// An AARTFAAC record; every channel holds `matrix`.
pub(crate) fn aartfaac_record(header: &AartfaacHeaderFields, matrix: &Array4<c64>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(AARTFAAC_HEADER_BYTES);
    bytes.extend_from_slice(&header.magic.to_le_bytes());
    bytes.extend_from_slice(&header.subband.to_le_bytes());
    bytes.extend_from_slice(&header.start.to_le_bytes());
    bytes.extend_from_slice(&header.end.to_le_bytes());
    bytes.extend_from_slice(&header.num_antennas.to_le_bytes());
    bytes.extend_from_slice(&header.num_chans.to_le_bytes());
    bytes.extend_from_slice(&header.flags.to_le_bytes());
    bytes.resize(AARTFAAC_HEADER_BYTES, 0);

    let n = matrix.dim().0;
    let mut bl = 0;
    for a1 in 0..n {
        for a2 in 0..=a1 {
            assert_eq!(lower_triangle_index(a1, a2), bl);
            bl += 1;
            for _ in 0..header.num_chans {
                for (p, q) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                    push_c64(&mut bytes, matrix[[a1, a2, p, q]]);
                }
            }
        }
    }
    bytes
}

/// A TBB XC record with one RCU-major complex64 block per sample.
pub(crate) fn tbbxc_record(subband: u32, time: f64, samples: &[Array4<c64>], flags: u32) -> Vec<u8> {
    let num_antennas = samples.first().map(|m| m.dim().0).unwrap_or(0) as u32;
    let mut bytes = vec![];
    bytes.extend_from_slice(&TBBXC_MAGIC);
    bytes.extend_from_slice(&subband.to_le_bytes());
    bytes.extend_from_slice(&time.to_le_bytes());
    bytes.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&num_antennas.to_le_bytes());
    bytes.extend_from_slice(&flags.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    for sample in samples {
        for v in rcu_major(sample) {
            push_c64(&mut bytes, v);
        }
    }
    bytes
}
