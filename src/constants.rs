// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.

/// Speed of light \[metres/second\]
pub const VEL_C: f64 = 299_792_458.0;

/// Seconds per day (86400)
pub const DAYSEC: f64 = erfa::constants::ERFA_DAYSEC;

/// The number of subbands produced by a LOFAR station's polyphase filterbank.
pub const NUM_SUBBANDS: usize = 512;

/// The number of polarisations per antenna (X and Y dipoles).
pub const NUM_POLS: usize = 2;

/// The sample clock used by most RCU modes \[Hz\]
pub const CLOCK_200_HZ: f64 = 200e6;
/// The sample clock used by RCU mode 6 \[Hz\]
pub const CLOCK_160_HZ: f64 = 160e6;

/// Dutch stations wire half of their LBA dipoles to the receivers at a time.
/// Their LBA sections list this many inner antennas, then as many outer ones.
pub const DUTCH_LBA_HALF_FIELD: usize = 48;

/// The integration time of each subband in an ACC capture \[seconds\]
pub const ACC_INTEGRATION_SECONDS: f64 = 1.0;

/// The size of an AARTFAAC record header \[bytes\]
pub const AARTFAAC_HEADER_BYTES: usize = 512;
/// Magic number of an AARTFAAC raw correlator record.
pub const AARTFAAC_RAW_MAGIC: u32 = 0x3B98_F002;
/// Magic number of an AARTFAAC calibrated visibility record.
pub const AARTFAAC_CAL_MAGIC: u32 = 0x4992_B5D9;
/// Dual-polarisation antennas in the 6-station AARTFAAC array.
pub const AARTFAAC_A6_ANTENNAS: usize = 288;
/// Dual-polarisation antennas in the 12-station AARTFAAC array.
pub const AARTFAAC_A12_ANTENNAS: usize = 576;

/// The size of a TBB cross-correlation record header \[bytes\]
pub const TBBXC_HEADER_BYTES: usize = 32;
/// The magic bytes starting every TBB cross-correlation record.
pub const TBBXC_MAGIC: [u8; 4] = *b"TBXC";

/// The largest record payload a decoder will accept \[bytes\]. Headers
/// declaring more are treated as corrupt.
pub const MAX_RECORD_PAYLOAD_BYTES: u64 = 1 << 32;

/// How many integration records may wait between the decoder and the
/// downstream stages.
pub const RECORD_QUEUE_DEPTH: usize = 8;
/// How many integration records are calibrated and assembled in parallel.
pub const RECORD_BATCH_SIZE: usize = 16;

/// The reference position of LOFAR station CS002's LBA field (ITRF)
/// \[metres\]. Handy as a realistic array position in tests and benchmarks.
pub const CS002_LBA_ITRF: [f64; 3] = [3_826_923.546, 460_915.441, 5_064_643.489];
