// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Averaging of correlation samples along one axis.
//!
//! Used to collapse the channels of an AARTFAAC blob into one value, and to
//! reduce transient-buffer samples into a coarser set of output channels.

use ndarray::{Array, ArrayView, Axis, Dimension, RemoveAxis, Zip};
use thiserror::Error;

use crate::c64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AveragingError {
    #[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
    BadArrayShape {
        argument: String,
        function: String,
        expected: String,
        received: String,
    },

    #[error("cannot average an axis of length {axis_len} in groups of {factor}")]
    IndivisibleAxis { axis_len: usize, factor: usize },
}

/// Average `array` along `axis` in consecutive groups of `factor`. The length
/// of `axis` must be a non-zero multiple of `factor`; the result has
/// `axis_len / factor` entries along `axis`.
///
/// Every sample carries the same weight. Non-finite samples propagate into
/// their group, so that the assembler can flag the result.
pub fn average_axis<D>(
    array: ArrayView<c64, D>,
    axis: Axis,
    factor: usize,
) -> Result<Array<c64, D>, AveragingError>
where
    D: Dimension + RemoveAxis,
{
    if axis.index() >= array.ndim() {
        return Err(AveragingError::BadArrayShape {
            argument: "axis".to_string(),
            function: "average_axis".to_string(),
            expected: format!("< {}", array.ndim()),
            received: format!("{}", axis.index()),
        });
    }
    let axis_len = array.len_of(axis);
    if factor == 0 || axis_len == 0 || axis_len % factor != 0 {
        return Err(AveragingError::IndivisibleAxis { axis_len, factor });
    }

    let mut out_dim = array.raw_dim();
    out_dim[axis.index()] = axis_len / factor;
    let mut out = Array::zeros(out_dim);
    let scale = 1.0 / factor as f64;

    for (mut out_lane, chunk) in out
        .axis_iter_mut(axis)
        .zip(array.axis_chunks_iter(axis, factor))
    {
        for sample in chunk.axis_iter(axis) {
            Zip::from(&mut out_lane)
                .and(&sample)
                .for_each(|o, &s| *o += s);
        }
        out_lane.mapv_inplace(|v| v * scale);
    }
    Ok(out)
}
