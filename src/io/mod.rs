// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The seam between a finished [`VisDataset`] and whatever writes it to disk.

use std::cmp::Ordering;

use thiserror::Error;

use crate::assemble::{DatasetMetadata, VisDataset, VisRow};

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// All the errors that can occur while handing a dataset to a writer.
pub enum IOError {
    #[error("Visibility row {row} is out of order or duplicated")]
    RowOrder { row: usize },

    #[error(transparent)]
    /// An IO error.
    IO(#[from] std::io::Error),
}

/// The container can accept a dataset's metadata, then its rows in chunks.
pub trait VisWrite {
    /// Called once, before any rows.
    fn write_metadata(&mut self, metadata: &DatasetMetadata) -> Result<(), IOError>;

    /// Write a chunk of rows. Chunks arrive in order, and rows within a chunk
    /// are sorted as described by [`VisRow::cmp_order`].
    fn write_rows(&mut self, rows: &[VisRow]) -> Result<(), IOError>;

    /// When all rows have been given to this [`VisWrite`] implementor,
    /// calling this function will perform any remaining tasks before the writer
    /// can be dropped.
    fn finalise(&mut self) -> Result<(), IOError>;
}

/// The number of rows given to [`VisWrite::write_rows`] at once.
const WRITE_CHUNK_ROWS: usize = 4096;

/// Hand a whole dataset to `writer`. Row order is checked first; nothing is
/// written if any row is out of order or duplicated.
pub fn write_dataset<W: VisWrite + ?Sized>(
    dataset: &VisDataset,
    writer: &mut W,
) -> Result<(), IOError> {
    if let Some(i) = dataset
        .rows
        .windows(2)
        .position(|w| w[0].cmp_order(&w[1]) != Ordering::Less)
    {
        return Err(IOError::RowOrder { row: i + 1 });
    }

    writer.write_metadata(&dataset.metadata)?;
    for chunk in dataset.rows.chunks(WRITE_CHUNK_ROWS) {
        writer.write_rows(chunk)?;
    }
    writer.finalise()
}
