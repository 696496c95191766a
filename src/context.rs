// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The configuration of one conversion.

use hifitime::{Duration, Epoch, Unit};

use crate::{
    calibration::CalibrationTable,
    capture::{CaptureFormat, CaptureParams},
    error::StructuralMismatchError,
    freq::FrequencyPlan,
    layout::AntennaLayout,
    pos::direction::Direction,
};

/// Everything a conversion reads but never changes: the antennas, their
/// gains, the frequency plan and where to point.
///
/// Built once with [`RunContext::new`] and the `with_*` methods, then passed
/// by reference to every stage.
#[derive(Clone, Debug, PartialEq)]
pub struct RunContext {
    pub layout: AntennaLayout,

    /// Gains to apply. Without a table, visibilities are left as recorded.
    pub calibration: Option<CalibrationTable>,

    pub plan: FrequencyPlan,

    /// The phase-tracking direction. Without one, the zenith at the first
    /// timestamp is used.
    pub direction: Option<Direction>,

    /// Overrides the start time of the capture.
    pub start_time: Option<Epoch>,

    /// UT1 - UTC, used for sidereal time.
    pub dut1: Duration,

    /// The name recorded in the output; defaults to the layout's name.
    pub station_name: Option<String>,
}

impl RunContext {
    pub fn new(layout: AntennaLayout, plan: FrequencyPlan) -> RunContext {
        Self {
            layout,
            calibration: None,
            plan,
            direction: None,
            start_time: None,
            dut1: Duration::from_f64(0.0, Unit::Second),
            station_name: None,
        }
    }

    pub fn with_calibration(self, calibration: CalibrationTable) -> Self {
        Self {
            calibration: Some(calibration),
            ..self
        }
    }

    pub fn with_direction(self, direction: Direction) -> Self {
        Self {
            direction: Some(direction),
            ..self
        }
    }

    pub fn with_start_time(self, start_time: Epoch) -> Self {
        Self {
            start_time: Some(start_time),
            ..self
        }
    }

    pub fn with_dut1(self, dut1: Duration) -> Self {
        Self { dut1, ..self }
    }

    pub fn with_station_name(self, name: impl Into<String>) -> Self {
        Self {
            station_name: Some(name.into()),
            ..self
        }
    }

    pub fn station_name(&self) -> &str {
        self.station_name.as_deref().unwrap_or(&self.layout.name)
    }

    /// Default capture parameters for `format`, sized to this layout.
    pub fn capture_params(&self, format: CaptureFormat) -> CaptureParams {
        let params = CaptureParams::new(format, self.layout.num_antennas());
        match self.start_time {
            Some(start) => params.with_start_time(start),
            None => params,
        }
    }

    /// Check the pieces of the context agree with each other. A calibration
    /// table may cover fewer antennas than the layout (the missing gains are
    /// reported when they are needed), but not more.
    pub fn validate(&self) -> Result<(), StructuralMismatchError> {
        if let Some(cal) = &self.calibration {
            let cal_ants = cal.num_antennas();
            if cal_ants > self.layout.num_antennas() {
                return Err(StructuralMismatchError::CalibrationAntennas {
                    expected: self.layout.num_antennas(),
                    got: cal_ants,
                });
            }
        }
        Ok(())
    }
}
