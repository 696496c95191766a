// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Start times and capture formats from station file names.
//!
//! Station software names captures like `20170720_095816_acc_512x192x192.dat`
//! or `20170720_095816_xst.dat`. ACC files are stamped when the dump
//! finished, XST files when the capture began.

use std::path::Path;

use hifitime::{Duration, Epoch, Unit};
use log::{debug, info};
use regex::{Regex, RegexBuilder};

use crate::{
    capture::CaptureFormat,
    constants::{ACC_INTEGRATION_SECONDS, NUM_SUBBANDS},
    error::InvalidParameterError,
};

lazy_static::lazy_static! {
    static ref RE_START_TIME: Regex =
        Regex::new(r"^(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})$").unwrap();

    static ref RE_ACC: Regex =
        RegexBuilder::new(r"^\d{8}_\d{6}_acc_512x192x192\.dat$")
            .case_insensitive(false).build().unwrap();

    static ref RE_STAMPED: Regex =
        RegexBuilder::new(r"^(\d{8}_\d{6})_(acc|xst)")
            .case_insensitive(false).build().unwrap();
}

/// Parse a `YYYYMMDD_HHMMSS` UTC time.
pub fn parse_start_time(s: &str) -> Result<Epoch, InvalidParameterError> {
    let bad = || InvalidParameterError::BadStartTime(s.to_string());
    let caps = RE_START_TIME.captures(s.trim()).ok_or_else(bad)?;
    // The regex only matches digits, so these parse.
    let field = |i: usize| caps[i].parse::<u32>().map_err(|_| bad());
    let year = caps[1].parse::<i32>().map_err(|_| bad())?;
    Epoch::maybe_from_gregorian_utc(
        year,
        field(2)? as u8,
        field(3)? as u8,
        field(4)? as u8,
        field(5)? as u8,
        field(6)? as u8,
        0,
    )
    .map_err(|_| bad())
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|f| f.to_str())
}

/// Guess the capture format from a file name. Only the standard ACC name is
/// recognised; anything else is assumed to be XST.
pub fn guess_format<P: AsRef<Path>>(path: P) -> CaptureFormat {
    match file_name(path.as_ref()) {
        Some(name) if RE_ACC.is_match(name) => {
            info!("Assuming data is ACC based on the file name");
            CaptureFormat::Acc
        }
        _ => {
            info!("Capture format not specified; assuming XST");
            CaptureFormat::Xst
        }
    }
}

/// The start of a capture, from a station-stamped file name. ACC dumps are
/// stamped at their end, so one integration per subband is taken off.
///
/// Returns `None` if the name carries no stamp.
pub fn start_time_from_file_name<P: AsRef<Path>>(path: P) -> Option<Epoch> {
    let name = file_name(path.as_ref())?;
    let caps = RE_STAMPED.captures(name)?;
    let stamp = parse_start_time(&caps[1]).ok()?;
    let start = match &caps[2] {
        "acc" => {
            stamp
                - Duration::from_f64(
                    NUM_SUBBANDS as f64 * ACC_INTEGRATION_SECONDS,
                    Unit::Second,
                )
        }
        _ => stamp,
    };
    debug!("Start time {start} from file name {name}");
    Some(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_time() {
        assert_eq!(
            parse_start_time("20170720_095816").unwrap(),
            Epoch::from_gregorian_utc_hms(2017, 7, 20, 9, 58, 16)
        );
        for bad in ["2017072_095816", "20171320_095816", "20170720-095816", "tomorrow", ""] {
            assert_eq!(
                parse_start_time(bad),
                Err(InvalidParameterError::BadStartTime(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_guess_format() {
        assert_eq!(
            guess_format("/data/20170720_095816_acc_512x192x192.dat"),
            CaptureFormat::Acc
        );
        assert_eq!(
            guess_format("20170720_095816_acc_512x96x96.dat"),
            CaptureFormat::Xst
        );
        assert_eq!(guess_format("20170720_095816_xst.dat"), CaptureFormat::Xst);
        assert_eq!(guess_format("capture.bin"), CaptureFormat::Xst);
    }

    #[test]
    fn test_start_time_from_file_name() {
        let stamp = Epoch::from_gregorian_utc_hms(2017, 7, 20, 9, 58, 16);
        assert_eq!(
            start_time_from_file_name("dir/20170720_095816_xst.dat"),
            Some(stamp)
        );
        assert_eq!(
            start_time_from_file_name("20170720_095816_acc_512x192x192.dat"),
            Some(Epoch::from_gregorian_utc_hms(2017, 7, 20, 9, 49, 44))
        );
        assert_eq!(start_time_from_file_name("sb300.dat"), None);
    }
}
