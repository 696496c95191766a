// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Map RCU (receiver unit) modes and subband indices to sky frequencies.
//!
//! A LOFAR station samples its antennas with a 200 or 160 MHz clock and
//! channelises each Nyquist zone into 512 subbands. Which zone and clock are
//! used is set by the RCU mode.

use std::{fmt::Display, ops::Range};

use crate::{
    constants::{CLOCK_160_HZ, CLOCK_200_HZ, DUTCH_LBA_HALF_FIELD, NUM_SUBBANDS},
    error::InvalidParameterError,
};

/// The antenna field a receiver mode is wired to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AntennaField {
    /// The outer ring of low-band antennas.
    LbaOuter,
    /// The inner low-band antennas.
    LbaInner,
    /// High-band antenna tiles.
    Hba,
}

impl AntennaField {
    /// The section name used for this field in antenna-field files.
    pub fn section_name(self) -> &'static str {
        match self {
            AntennaField::LbaOuter | AntennaField::LbaInner => "LBA",
            AntennaField::Hba => "HBA",
        }
    }

    /// The antennas of this field's section that a Dutch (core or remote)
    /// station connects. `None` means all of them.
    pub fn dutch_antennas(self) -> Option<Range<usize>> {
        match self {
            AntennaField::LbaInner => Some(0..DUTCH_LBA_HALF_FIELD),
            AntennaField::LbaOuter => Some(DUTCH_LBA_HALF_FIELD..2 * DUTCH_LBA_HALF_FIELD),
            AntennaField::Hba => None,
        }
    }
}

/// A valid RCU mode. Only the modes listed here can be converted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RcuMode {
    /// LBA outer, 10-90 MHz.
    Mode1,
    /// LBA outer, 30-90 MHz.
    Mode2,
    /// LBA inner, 10-90 MHz.
    Mode3,
    /// LBA inner, 30-90 MHz.
    Mode4,
    /// HBA, 110-190 MHz.
    Mode5,
    /// HBA, 170-230 MHz.
    Mode6,
    /// HBA, 210-250 MHz.
    Mode7,
}

impl RcuMode {
    /// All of the valid modes, in order.
    pub const ALL: [RcuMode; 7] = [
        RcuMode::Mode1,
        RcuMode::Mode2,
        RcuMode::Mode3,
        RcuMode::Mode4,
        RcuMode::Mode5,
        RcuMode::Mode6,
        RcuMode::Mode7,
    ];

    pub fn number(self) -> u8 {
        match self {
            RcuMode::Mode1 => 1,
            RcuMode::Mode2 => 2,
            RcuMode::Mode3 => 3,
            RcuMode::Mode4 => 4,
            RcuMode::Mode5 => 5,
            RcuMode::Mode6 => 6,
            RcuMode::Mode7 => 7,
        }
    }

    /// The sample clock of this mode \[Hz\].
    pub fn clock_hz(self) -> f64 {
        match self {
            RcuMode::Mode6 => CLOCK_160_HZ,
            _ => CLOCK_200_HZ,
        }
    }

    /// The Nyquist zone sampled in this mode (1-indexed).
    pub fn nyquist_zone(self) -> u8 {
        match self {
            RcuMode::Mode1 | RcuMode::Mode2 | RcuMode::Mode3 | RcuMode::Mode4 => 1,
            RcuMode::Mode5 => 2,
            RcuMode::Mode6 | RcuMode::Mode7 => 3,
        }
    }

    pub fn antenna_field(self) -> AntennaField {
        match self {
            RcuMode::Mode1 | RcuMode::Mode2 => AntennaField::LbaOuter,
            RcuMode::Mode3 | RcuMode::Mode4 => AntennaField::LbaInner,
            RcuMode::Mode5 | RcuMode::Mode6 | RcuMode::Mode7 => AntennaField::Hba,
        }
    }
}

impl TryFrom<u8> for RcuMode {
    type Error = InvalidParameterError;

    fn try_from(mode: u8) -> Result<Self, Self::Error> {
        RcuMode::ALL
            .into_iter()
            .find(|m| m.number() == mode)
            .ok_or(InvalidParameterError::UnknownRcuMode(mode))
    }
}

impl Display for RcuMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// The centre frequency and width of a subband (or of a channel within one).
/// All units are Hz.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubbandFrequency {
    /// Centre frequency \[Hz\]
    pub centre_hz: f64,
    /// Bandwidth \[Hz\]
    pub bandwidth_hz: f64,
}

/// The frequency plan of a run: a mode's Nyquist zone and sample clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyPlan {
    pub mode: RcuMode,
    pub nyquist_zone: u8,
    pub clock_hz: f64,
}

impl FrequencyPlan {
    pub fn new(mode: RcuMode) -> FrequencyPlan {
        FrequencyPlan {
            mode,
            nyquist_zone: mode.nyquist_zone(),
            clock_hz: mode.clock_hz(),
        }
    }

    /// Make a plan from a raw mode number, validating it.
    pub fn from_mode_number(mode: u8) -> Result<FrequencyPlan, InvalidParameterError> {
        RcuMode::try_from(mode).map(Self::new)
    }

    /// The number of subbands in this plan.
    pub fn num_subbands(&self) -> usize {
        NUM_SUBBANDS
    }

    /// The width of every subband \[Hz\].
    pub fn subband_bandwidth_hz(&self) -> f64 {
        self.clock_hz / (2 * NUM_SUBBANDS) as f64
    }

    /// Resolve a subband index to its centre frequency and bandwidth.
    pub fn resolve(&self, subband: usize) -> Result<SubbandFrequency, InvalidParameterError> {
        if subband >= NUM_SUBBANDS {
            return Err(InvalidParameterError::SubbandOutOfRange {
                subband,
                mode: self.mode.number(),
                max: NUM_SUBBANDS,
            });
        }
        let zone_offset = f64::from(self.nyquist_zone - 1);
        Ok(SubbandFrequency {
            centre_hz: (zone_offset + subband as f64 / NUM_SUBBANDS as f64) * self.clock_hz / 2.0,
            bandwidth_hz: self.subband_bandwidth_hz(),
        })
    }

    /// Resolve channel `chan` of a subband that has been split into
    /// `num_chans` equal channels. With one channel, this is the same as
    /// [`FrequencyPlan::resolve`].
    pub fn resolve_channel(
        &self,
        subband: usize,
        chan: usize,
        num_chans: usize,
    ) -> Result<SubbandFrequency, InvalidParameterError> {
        if num_chans == 0 {
            return Err(InvalidParameterError::BadChannelCount(num_chans));
        }
        if chan >= num_chans {
            return Err(InvalidParameterError::ChannelOutOfRange { chan, num_chans });
        }
        let sb = self.resolve(subband)?;
        let width = sb.bandwidth_hz / num_chans as f64;
        Ok(SubbandFrequency {
            centre_hz: sb.centre_hz - sb.bandwidth_hz / 2.0 + (chan as f64 + 0.5) * width,
            bandwidth_hz: width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mode_numbers_round_trip() {
        for mode in RcuMode::ALL {
            assert_eq!(RcuMode::try_from(mode.number()).unwrap(), mode);
        }
        assert_eq!(
            RcuMode::try_from(0),
            Err(InvalidParameterError::UnknownRcuMode(0))
        );
        assert_eq!(
            RcuMode::try_from(8),
            Err(InvalidParameterError::UnknownRcuMode(8))
        );
    }

    #[test]
    fn test_lba_subband_frequencies() {
        let plan = FrequencyPlan::from_mode_number(3).unwrap();
        let sb = plan.resolve(0).unwrap();
        assert_abs_diff_eq!(sb.centre_hz, 0.0);
        assert_abs_diff_eq!(sb.bandwidth_hz, 195312.5);

        let sb = plan.resolve(256).unwrap();
        assert_abs_diff_eq!(sb.centre_hz, 50e6);
    }

    #[test]
    fn test_hba_subband_frequencies() {
        let plan = FrequencyPlan::new(RcuMode::Mode5);
        assert_abs_diff_eq!(plan.resolve(0).unwrap().centre_hz, 100e6);
        assert_abs_diff_eq!(plan.resolve(256).unwrap().centre_hz, 150e6);

        let plan = FrequencyPlan::new(RcuMode::Mode6);
        let sb = plan.resolve(256).unwrap();
        assert_abs_diff_eq!(sb.centre_hz, 200e6);
        assert_abs_diff_eq!(sb.bandwidth_hz, 156250.0);

        let plan = FrequencyPlan::new(RcuMode::Mode7);
        assert_abs_diff_eq!(plan.resolve(100).unwrap().centre_hz, 200e6 + 100.0 * 195312.5);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        for mode in RcuMode::ALL {
            let plan = FrequencyPlan::new(mode);
            for subband in 0..plan.num_subbands() {
                assert_eq!(plan.resolve(subband), plan.resolve(subband));
            }
        }
    }

    #[test]
    fn test_subband_out_of_range() {
        let plan = FrequencyPlan::new(RcuMode::Mode1);
        assert_eq!(
            plan.resolve(512),
            Err(InvalidParameterError::SubbandOutOfRange {
                subband: 512,
                mode: 1,
                max: 512
            })
        );
    }

    #[test]
    fn test_channels_tile_the_subband() {
        let plan = FrequencyPlan::new(RcuMode::Mode5);
        let sb = plan.resolve(300).unwrap();
        let chans: Vec<SubbandFrequency> = (0..4)
            .map(|c| plan.resolve_channel(300, c, 4).unwrap())
            .collect();
        assert_abs_diff_eq!(
            chans[0].centre_hz - chans[0].bandwidth_hz / 2.0,
            sb.centre_hz - sb.bandwidth_hz / 2.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            chans[3].centre_hz + chans[3].bandwidth_hz / 2.0,
            sb.centre_hz + sb.bandwidth_hz / 2.0,
            epsilon = 1e-6
        );
        let mean = chans.iter().map(|c| c.centre_hz).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(mean, sb.centre_hz, epsilon = 1e-6);

        // A single channel is the subband itself.
        assert_eq!(plan.resolve_channel(300, 0, 1).unwrap(), sb);
        assert!(plan.resolve_channel(300, 4, 4).is_err());
        assert!(plan.resolve_channel(300, 0, 0).is_err());
    }

    #[test]
    fn test_antenna_fields() {
        let expected = [
            (RcuMode::Mode1, AntennaField::LbaOuter),
            (RcuMode::Mode2, AntennaField::LbaOuter),
            (RcuMode::Mode3, AntennaField::LbaInner),
            (RcuMode::Mode4, AntennaField::LbaInner),
            (RcuMode::Mode5, AntennaField::Hba),
            (RcuMode::Mode6, AntennaField::Hba),
            (RcuMode::Mode7, AntennaField::Hba),
        ];
        for (mode, field) in expected {
            assert_eq!(mode.antenna_field(), field, "mode {mode}");
        }
        assert_eq!(AntennaField::LbaOuter.section_name(), "LBA");
        assert_eq!(AntennaField::LbaInner.section_name(), "LBA");
        assert_eq!(AntennaField::Hba.section_name(), "HBA");
        assert_eq!(AntennaField::LbaInner.dutch_antennas(), Some(0..48));
        assert_eq!(AntennaField::LbaOuter.dutch_antennas(), Some(48..96));
        assert_eq!(AntennaField::Hba.dutch_antennas(), None);
    }
}
