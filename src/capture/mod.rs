// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Decoders for station correlator captures.
//!
//! Every format is decoded into the same stream of [`IntegrationRecord`]s,
//! each holding an `[ant1][ant2][pol1][pol2]` correlation matrix. The
//! [`Decoder`] enum selects the format-specific decoder from a
//! [`CaptureFormat`] tag.

mod aartfaac;
mod acc;
mod read;
mod tbbxc;
mod xst;

#[cfg(test)]
pub(crate) mod test_utils;

pub use aartfaac::{AartfaacArray, AartfaacDecoder, AartfaacFlavour};
pub use acc::AccDecoder;
pub use tbbxc::TbbxcDecoder;
pub use xst::XstDecoder;

use std::io::Read;

use hifitime::{Duration, Epoch, Unit};
use ndarray::Array4;

use crate::{
    c64,
    error::{CorruptCaptureError, InvalidParameterError},
    freq::FrequencyPlan,
};

/// One correlation matrix for one instant, subband and channel.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegrationRecord {
    /// The instant this integration is registered at.
    pub timestamp: Epoch,

    /// The length of the integration.
    pub integration: Duration,

    pub subband: usize,

    /// The channel within the subband; 0 for unchannelised captures.
    pub chan: usize,

    /// The number of channels the subband was divided into.
    pub num_chans: usize,

    /// Correlations with shape `[ant1][ant2][pol1][pol2]`, Hermitian under
    /// `(ant1, pol1) <-> (ant2, pol2)` with conjugation.
    pub data: Array4<c64>,

    /// Set when the capture marked this integration as defective.
    pub flagged: bool,
}

impl IntegrationRecord {
    pub fn num_antennas(&self) -> usize {
        self.data.len_of(ndarray::Axis(0))
    }
}

/// The supported capture formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaptureFormat {
    /// Array correlation cube: every subband, integrated once.
    Acc,
    /// Cross-correlation statistics: one subband, many integrations.
    Xst,
    /// AARTFAAC correlator output.
    Aartfaac,
    /// Transient buffer board cross-correlations.
    Tbbxc,
}

impl CaptureFormat {
    /// Whether auto-correlations in this format are physically meaningful
    /// and should be kept.
    pub fn has_autos(self) -> bool {
        match self {
            CaptureFormat::Acc | CaptureFormat::Xst | CaptureFormat::Aartfaac => true,
            CaptureFormat::Tbbxc => false,
        }
    }
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CaptureFormat::Acc => "ACC",
                CaptureFormat::Xst => "XST",
                CaptureFormat::Aartfaac => "AARTFAAC",
                CaptureFormat::Tbbxc => "TBB XC",
            }
        )
    }
}

/// The knobs a decoder needs beyond the byte stream.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureParams {
    pub format: CaptureFormat,

    /// The number of antennas (not RCUs) in each matrix.
    pub num_antennas: usize,

    /// For ACC, only emit this subband. For XST and raw AARTFAAC, the subband
    /// the capture was taken in.
    pub subband: Option<usize>,

    /// For ACC and XST, the start of the capture. For the other formats, if
    /// set, the first record is moved to this instant and the rest keep their
    /// relative spacing.
    pub start_time: Option<Epoch>,

    /// The integration length of XST and TBB XC records.
    pub integration: Duration,

    /// The number of channels TBB XC samples are reduced to.
    pub num_chans: usize,

    pub aartfaac_flavour: AartfaacFlavour,
}

impl CaptureParams {
    pub fn new(format: CaptureFormat, num_antennas: usize) -> CaptureParams {
        Self {
            format,
            num_antennas,
            subband: None,
            start_time: None,
            integration: Duration::from_f64(1.0, Unit::Second),
            num_chans: 1,
            aartfaac_flavour: AartfaacFlavour::Raw,
        }
    }

    pub fn aartfaac(array: AartfaacArray, flavour: AartfaacFlavour) -> CaptureParams {
        Self {
            aartfaac_flavour: flavour,
            ..Self::new(CaptureFormat::Aartfaac, array.num_antennas())
        }
    }

    pub fn with_subband(self, subband: usize) -> Self {
        Self {
            subband: Some(subband),
            ..self
        }
    }

    pub fn with_start_time(self, start_time: Epoch) -> Self {
        Self {
            start_time: Some(start_time),
            ..self
        }
    }

    pub fn with_integration(self, integration: Duration) -> Self {
        Self {
            integration,
            ..self
        }
    }

    pub fn with_num_chans(self, num_chans: usize) -> Self {
        Self { num_chans, ..self }
    }

    /// Check the parameters make sense for the format and frequency plan.
    pub fn validate(&self, plan: &FrequencyPlan) -> Result<(), InvalidParameterError> {
        if self.num_antennas == 0 {
            return Err(InvalidParameterError::NoAntennas);
        }
        let integration_s = self.integration.to_seconds();
        if !integration_s.is_finite() || integration_s <= 0.0 {
            return Err(InvalidParameterError::BadIntegrationTime(integration_s));
        }
        if self.num_chans == 0 {
            return Err(InvalidParameterError::BadChannelCount(self.num_chans));
        }
        if let Some(subband) = self.subband {
            plan.resolve(subband)?;
        }

        match self.format {
            CaptureFormat::Acc | CaptureFormat::Xst if self.start_time.is_none() => {
                return Err(InvalidParameterError::MissingStartTime {
                    format: self.format,
                })
            }
            _ => (),
        }
        let needs_subband = match self.format {
            CaptureFormat::Xst => true,
            CaptureFormat::Aartfaac => self.aartfaac_flavour == AartfaacFlavour::Raw,
            CaptureFormat::Acc | CaptureFormat::Tbbxc => false,
        };
        if needs_subband && self.subband.is_none() {
            return Err(InvalidParameterError::MissingSubband {
                format: self.format,
            });
        }
        Ok(())
    }
}

/// A capture decoder for any supported format. Yields records in the order
/// they appear in the byte stream; after the first error, yields nothing.
pub enum Decoder<R: Read> {
    Acc(AccDecoder<R>),
    Xst(XstDecoder<R>),
    Aartfaac(AartfaacDecoder<R>),
    Tbbxc(TbbxcDecoder<R>),
}

impl<R: Read> Decoder<R> {
    pub fn new(
        reader: R,
        params: &CaptureParams,
        plan: &FrequencyPlan,
    ) -> Result<Decoder<R>, InvalidParameterError> {
        params.validate(plan)?;
        let num_subbands = plan.num_subbands();
        let missing_start = || InvalidParameterError::MissingStartTime {
            format: params.format,
        };
        let missing_subband = || InvalidParameterError::MissingSubband {
            format: params.format,
        };

        let decoder = match params.format {
            CaptureFormat::Acc => Decoder::Acc(AccDecoder::new(
                reader,
                params.num_antennas,
                params.start_time.ok_or_else(missing_start)?,
                params.subband,
                num_subbands,
            )),
            CaptureFormat::Xst => Decoder::Xst(XstDecoder::new(
                reader,
                params.num_antennas,
                params.start_time.ok_or_else(missing_start)?,
                params.integration,
                params.subband.ok_or_else(missing_subband)?,
            )),
            CaptureFormat::Aartfaac => Decoder::Aartfaac(AartfaacDecoder::new(
                reader,
                params.num_antennas,
                params.aartfaac_flavour,
                params.subband,
                params.start_time,
                num_subbands,
            )),
            CaptureFormat::Tbbxc => Decoder::Tbbxc(TbbxcDecoder::new(
                reader,
                params.num_antennas,
                params.num_chans,
                params.integration,
                params.start_time,
                num_subbands,
            )),
        };
        Ok(decoder)
    }

    /// The format this decoder reads.
    pub fn capture_format(&self) -> CaptureFormat {
        match self {
            Decoder::Acc(_) => CaptureFormat::Acc,
            Decoder::Xst(_) => CaptureFormat::Xst,
            Decoder::Aartfaac(_) => CaptureFormat::Aartfaac,
            Decoder::Tbbxc(_) => CaptureFormat::Tbbxc,
        }
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = Result<IntegrationRecord, CorruptCaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Decoder::Acc(d) => d.next(),
            Decoder::Xst(d) => d.next(),
            Decoder::Aartfaac(d) => d.next(),
            Decoder::Tbbxc(d) => d.next(),
        }
    }
}

/// Convert a Unix time read from a capture header.
pub(crate) fn epoch_from_unix_seconds(
    seconds: f64,
    offset: u64,
) -> Result<Epoch, CorruptCaptureError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(CorruptCaptureError::BadTimestamp { offset, seconds });
    }
    Ok(Epoch::from_unix_seconds(seconds))
}

/// Moves header timestamps so the first record lands on a requested start
/// time.
#[derive(Debug, Default)]
pub(crate) struct TimeAnchor {
    start_override: Option<Epoch>,
    first: Option<Epoch>,
}

impl TimeAnchor {
    pub(crate) fn new(start_override: Option<Epoch>) -> Self {
        Self {
            start_override,
            first: None,
        }
    }

    pub(crate) fn apply(&mut self, timestamp: Epoch) -> Epoch {
        match self.start_override {
            None => timestamp,
            Some(start) => {
                let first = *self.first.get_or_insert(timestamp);
                start + (timestamp - first)
            }
        }
    }
}
