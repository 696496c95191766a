// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The conversion pipeline: decode, calibrate, register and assemble.
//!
//! The decoder runs on its own thread and feeds a bounded queue, so at most
//! [`RECORD_QUEUE_DEPTH`] records wait in memory. Records are taken off the
//! queue in batches of [`RECORD_BATCH_SIZE`] and each batch is calibrated and
//! assembled in parallel.


use std::{collections::BTreeMap, io::Read, panic, thread};

use crossbeam_channel::{bounded, Receiver};
use hifitime::{Duration, Epoch};
use itertools::Itertools;
use log::{debug, info, trace};
use rayon::prelude::*;

use crate::{
    assemble::{assemble, AntennaInfo, DatasetMetadata, SpectralWindow, VisDataset, VisRow},
    calibration,
    capture::{CaptureFormat, Decoder, IntegrationRecord},
    constants::{RECORD_BATCH_SIZE, RECORD_QUEUE_DEPTH},
    context::RunContext,
    error::{ConvertError, CorruptCaptureError, StructuralMismatchError},
    geometry::{resolve_phase_centre, CoordinateTransform, ErfaTransform, UvwLookup},
    pos::direction::Direction,
};

/// Convert a whole capture into a [`VisDataset`], using ERFA sidereal time
/// with the context's DUT1.
pub fn convert<R: Read + Send>(
    ctx: &RunContext,
    decoder: Decoder<R>,
) -> Result<VisDataset, ConvertError> {
    convert_with_transform(ctx, decoder, &ErfaTransform::new(ctx.dut1))
}

/// Convert a whole capture into a [`VisDataset`].
///
/// The first error from any stage stops the run and is returned; no partial
/// dataset is produced.
pub fn convert_with_transform<R, T>(
    ctx: &RunContext,
    decoder: Decoder<R>,
    transform: &T,
) -> Result<VisDataset, ConvertError>
where
    R: Read + Send,
    T: CoordinateTransform + ?Sized,
{
    ctx.validate()?;
    let format = decoder.capture_format();
    info!(
        "Converting a {format} capture from {} ({} antennas, RCU mode {})",
        ctx.station_name(),
        ctx.layout.num_antennas(),
        ctx.plan.mode
    );

    let (tx, rx) = bounded(RECORD_QUEUE_DEPTH);
    let (decoded, assembled) = thread::scope(|scope| {
        let decode_handle = scope.spawn(move || -> Result<usize, CorruptCaptureError> {
            let mut num_records = 0;
            for record in decoder {
                let record = record?;
                trace!(
                    "Decoded subband {} channel {} at {}",
                    record.subband,
                    record.chan,
                    record.timestamp
                );
                // If we can't send the record, the consumer has stopped
                // because of an error and will report it.
                if tx.send(record).is_err() {
                    break;
                }
                num_records += 1;
            }
            drop(tx);
            debug!("Finished decoding");
            Ok(num_records)
        });

        // `consume` owns the receiver; returning early from it closes the
        // channel and stops the decoder.
        let assembled = consume(ctx, format, rx, transform);
        let decoded = decode_handle
            .join()
            .unwrap_or_else(|payload| panic::resume_unwind(payload));
        (decoded, assembled)
    });

    // A decoder error leaves the consumer with a clean but short stream, so
    // a consumer error is always the first thing that went wrong.
    let assembled = assembled?;
    let num_records = decoded?;
    let Some(assembled) = assembled else {
        return Err(ConvertError::EmptyCapture(format));
    };
    info!(
        "Assembled {} rows from {num_records} records",
        assembled.rows.len()
    );
    assembled.into_dataset(ctx, format, transform)
}

/// What the consumer has built so far.
struct Assembly {
    direction: Direction,
    first_timestamp: Epoch,
    start_time: Epoch,
    integration: Duration,
    /// Subband to its channel count.
    subbands: BTreeMap<usize, usize>,
    /// Reused while consecutive records share a timestamp.
    last_lookup: Option<UvwLookup>,
    rows: Vec<VisRow>,
}

fn consume<T: CoordinateTransform + ?Sized>(
    ctx: &RunContext,
    format: CaptureFormat,
    rx: Receiver<IntegrationRecord>,
    transform: &T,
) -> Result<Option<Assembly>, ConvertError> {
    let include_autos = format.has_autos();
    let mut assembly: Option<Assembly> = None;

    for chunk in &rx.iter().chunks(RECORD_BATCH_SIZE) {
        let batch: Vec<IntegrationRecord> = chunk.collect();
        if assembly.is_none() {
            // Chunks are never empty.
            let first = &batch[0];
            let direction =
                resolve_phase_centre(ctx.direction, first.timestamp, &ctx.layout, transform)?;
            info!("Phase centre: {direction}");
            assembly = Some(Assembly {
                direction,
                first_timestamp: first.timestamp,
                start_time: first.timestamp,
                integration: first.integration,
                subbands: BTreeMap::new(),
                last_lookup: None,
                rows: vec![],
            });
        }
        if let Some(state) = assembly.as_mut() {
            state.process_batch(ctx, batch, transform, include_autos)?;
        }
    }

    Ok(assembly)
}

impl Assembly {
    fn process_batch<T: CoordinateTransform + ?Sized>(
        &mut self,
        ctx: &RunContext,
        batch: Vec<IntegrationRecord>,
        transform: &T,
        include_autos: bool,
    ) -> Result<(), ConvertError> {
        let num_antennas = ctx.layout.num_antennas();

        // Each distinct timestamp in the batch is projected once.
        let mut timestamps: Vec<Epoch> = vec![];
        let mut lookup_indices = Vec::with_capacity(batch.len());
        for record in &batch {
            if record.num_antennas() != num_antennas {
                return Err(StructuralMismatchError::AntennaCount {
                    expected: num_antennas,
                    got: record.num_antennas(),
                }
                .into());
            }
            let i = match timestamps.iter().position(|t| *t == record.timestamp) {
                Some(i) => i,
                None => {
                    timestamps.push(record.timestamp);
                    timestamps.len() - 1
                }
            };
            lookup_indices.push(i);

            self.subbands
                .entry(record.subband)
                .or_insert(record.num_chans);
            if record.timestamp.to_gpst_seconds() < self.start_time.to_gpst_seconds() {
                self.start_time = record.timestamp;
            }
        }

        let direction = self.direction;
        let cached = self.last_lookup.take();
        let lookups: Vec<UvwLookup> = timestamps
            .par_iter()
            .map(|&t| match &cached {
                Some(lookup) if lookup.timestamp() == t => Ok(lookup.clone()),
                _ => UvwLookup::new(&ctx.layout, &direction, t, transform),
            })
            .collect::<Result<_, _>>()?;
        debug!(
            "Batch of {} records spans {} timestamps",
            batch.len(),
            lookups.len()
        );

        let rows: Vec<Vec<VisRow>> = batch
            .into_par_iter()
            .zip(lookup_indices.par_iter())
            .map(|(record, &i)| -> Result<Vec<VisRow>, ConvertError> {
                let frequency =
                    ctx.plan
                        .resolve_channel(record.subband, record.chan, record.num_chans)?;
                let record = calibration::apply(record, ctx.calibration.as_ref())?;
                Ok(assemble(&record, &lookups[i], frequency, include_autos)?)
            })
            .collect::<Result<_, _>>()?;
        for r in rows {
            self.rows.extend(r);
        }

        if let Some(&i) = lookup_indices.last() {
            self.last_lookup = lookups.into_iter().nth(i);
        }
        Ok(())
    }

    fn into_dataset<T: CoordinateTransform + ?Sized>(
        mut self,
        ctx: &RunContext,
        format: CaptureFormat,
        transform: &T,
    ) -> Result<VisDataset, ConvertError> {
        self.rows.par_sort_unstable_by(|a, b| a.cmp_order(b));

        let array_position = ctx.layout.array_position()?;
        let phase_centre = transform.to_radec(&self.direction, self.first_timestamp, array_position)?;
        let antennas: Vec<AntennaInfo> = ctx
            .layout
            .antennas
            .iter()
            .zip(ctx.layout.positions())
            .map(|(a, position)| AntennaInfo {
                index: a.index,
                name: a.name.clone(),
                position,
            })
            .collect();
        let spectral_windows: Vec<SpectralWindow> = self
            .subbands
            .iter()
            .map(|(&subband, &num_chans)| -> Result<SpectralWindow, ConvertError> {
                let sb = ctx.plan.resolve(subband)?;
                let chan_freqs_hz: Vec<f64> = (0..num_chans)
                    .map(|c| {
                        ctx.plan
                            .resolve_channel(subband, c, num_chans)
                            .map(|f| f.centre_hz)
                    })
                    .collect::<Result<_, _>>()?;
                Ok(SpectralWindow {
                    subband,
                    centre_hz: sb.centre_hz,
                    bandwidth_hz: sb.bandwidth_hz,
                    chan_freqs_hz,
                    chan_width_hz: sb.bandwidth_hz / num_chans as f64,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(VisDataset {
            rows: self.rows,
            metadata: DatasetMetadata {
                antennas,
                array_position,
                spectral_windows,
                phase_centre,
                start_time: self.start_time,
                integration: self.integration,
                rcu_mode: ctx.plan.mode,
                format,
                station_name: ctx.station_name().to_string(),
                software: format!(
                    "{} {}",
                    crate::built_info::PKG_NAME,
                    crate::built_info::PKG_VERSION
                ),
            },
        })
    }
}
