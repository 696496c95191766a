// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Code for handling conversion to and from sexagesimal.
 */

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SexagesimalError {
    #[error("Expected '{0}' to have an 'h' or 'd' separator")]
    MissingHourOrDegree(String),

    #[error("Expected '{0}' to have an 'm' separator")]
    MissingM(String),

    #[error("Expected '{0}' to end with 's'")]
    MissingS(String),

    #[error("Could not parse '{0}' as a number")]
    ParseFloat(String),
}

fn parse_field(field: &str, whole: &str) -> Result<f64, SexagesimalError> {
    field
        .trim()
        .parse()
        .map_err(|_| SexagesimalError::ParseFloat(whole.to_string()))
}

/// Combine a sign-carrying leading field with minutes and seconds. A leading
/// "-0" keeps its sign.
fn combine(lead: &str, m: f64, s: f64, whole: &str) -> Result<f64, SexagesimalError> {
    let lead_trimmed = lead.trim();
    let negative = lead_trimmed.starts_with('-');
    let lead_abs = parse_field(lead_trimmed.trim_start_matches(['-', '+']), whole)?;
    let num = lead_abs + m / 60.0 + s / 3600.0;
    Ok(if negative { -num } else { num })
}

/// Split a string like "19h23m23s" into its leading, minute and second fields,
/// using `sep` as the leading separator.
fn split_fields<'a>(s: &'a str, sep: char) -> Result<(&'a str, &'a str, &'a str), SexagesimalError> {
    let (lead, rest) = s
        .split_once(sep)
        .ok_or_else(|| SexagesimalError::MissingHourOrDegree(s.to_string()))?;
    let (m, rest) = rest
        .split_once('m')
        .ok_or_else(|| SexagesimalError::MissingM(s.to_string()))?;
    let secs = rest
        .strip_suffix('s')
        .ok_or_else(|| SexagesimalError::MissingS(s.to_string()))?;
    Ok((lead, m, secs))
}

/// Convert a sexagesimal-formatted string in "hours minutes seconds" to a
/// float \[degrees\].
///
/// # Examples
///
/// ```
/// # use stationcorr::sexagesimal::*;
/// # use approx::*;
/// # fn main() -> Result<(), SexagesimalError> {
/// let f = sexagesimal_hms_string_to_degrees("19h23m23s")?;
/// assert_abs_diff_eq!(f, 290.845833, epsilon = 1e-6);
/// # Ok(())
/// # }
/// ```
pub fn sexagesimal_hms_string_to_degrees(hms: &str) -> Result<f64, SexagesimalError> {
    let (h, m, s) = split_fields(hms, 'h')?;
    let m = parse_field(m, hms)?;
    let s = parse_field(s, hms)?;
    Ok(combine(h, m, s, hms)? * 15.0)
}

/// Convert a sexagesimal-formatted string in "degrees minutes seconds" to a
/// float \[degrees\].
///
/// # Examples
///
/// ```
/// # use stationcorr::sexagesimal::*;
/// # use approx::*;
/// # fn main() -> Result<(), SexagesimalError> {
/// let f = sexagesimal_dms_string_to_degrees("-11d49m01.062s")?;
/// assert_abs_diff_eq!(f, -11.81696167, epsilon = 1e-6);
/// # Ok(())
/// # }
/// ```
pub fn sexagesimal_dms_string_to_degrees(dms: &str) -> Result<f64, SexagesimalError> {
    let (d, m, s) = split_fields(dms, 'd')?;
    let m = parse_field(m, dms)?;
    let s = parse_field(s, dms)?;
    combine(d, m, s, dms)
}

/// Split an absolute value into whole units, minutes and hundredths of
/// seconds, rounding first so that "60.00" seconds never appears.
fn split_centiseconds(value: f64) -> (u64, u64, f64) {
    let cs = (value.abs() * 360_000.0).round() as u64;
    let whole = cs / 360_000;
    let m = (cs % 360_000) / 6000;
    let s = (cs % 6000) as f64 / 100.0;
    (whole, m, s)
}

/// Format degrees as "XhYmZs".
pub fn degrees_to_sexagesimal_hms(degrees: f64) -> String {
    let (h, m, s) = split_centiseconds(degrees / 15.0);
    let sign = if degrees < 0.0 { "-" } else { "" };
    format!("{sign}{h}h{m:02}m{s:05.2}s")
}

/// Format degrees as "XdYmZs".
pub fn degrees_to_sexagesimal_dms(degrees: f64) -> String {
    let (d, m, s) = split_centiseconds(degrees);
    let sign = if degrees < 0.0 { "-" } else { "" };
    format!("{sign}{d}d{m:02}m{s:05.2}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_hms() {
        assert_abs_diff_eq!(
            sexagesimal_hms_string_to_degrees("19h23m23s").unwrap(),
            290.8458333333333,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            sexagesimal_hms_string_to_degrees("0h30m0.0s").unwrap(),
            7.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_dms() {
        assert_abs_diff_eq!(
            sexagesimal_dms_string_to_degrees("30d42m32s").unwrap(),
            30.708888888888888,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            sexagesimal_dms_string_to_degrees("-0d30m0s").unwrap(),
            -0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            sexagesimal_dms_string_to_degrees("30d42"),
            Err(SexagesimalError::MissingM("30d42".to_string()))
        );
        assert_eq!(
            sexagesimal_hms_string_to_degrees("19h23m23"),
            Err(SexagesimalError::MissingS("19h23m23".to_string()))
        );
        assert_eq!(
            sexagesimal_hms_string_to_degrees("19x23m23s"),
            Err(SexagesimalError::MissingHourOrDegree("19x23m23s".to_string()))
        );
        assert!(matches!(
            sexagesimal_dms_string_to_degrees("ad42m1s"),
            Err(SexagesimalError::ParseFloat(_))
        ));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(degrees_to_sexagesimal_dms(30.7), "30d42m00.00s");
        assert_eq!(degrees_to_sexagesimal_hms(290.9), "19h23m36.00s");
        assert_eq!(degrees_to_sexagesimal_dms(-0.5), "-0d30m00.00s");
    }
}
