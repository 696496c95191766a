// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Decode, calibrate and geometrically register LOFAR station correlator
//! captures as interferometric visibilities.
//!
//! A conversion reads one capture (ACC, XST, AARTFAAC or TBB XC) through a
//! [`capture::Decoder`], applies station gains, projects every baseline onto
//! a phase-tracking direction and assembles a [`assemble::VisDataset`] that
//! any [`io::VisWrite`] implementor can store.
//!
//! ```no_run
//! use std::fs::File;
//!
//! use stationcorr::{
//!     capture::{CaptureFormat, Decoder},
//!     context::RunContext,
//!     filenames::start_time_from_file_name,
//!     freq::{FrequencyPlan, RcuMode},
//!     layout::AntennaLayout,
//!     pipeline::convert,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let path = "20170720_095816_acc_512x192x192.dat";
//! let mode = RcuMode::Mode3;
//! let layout =
//!     AntennaLayout::from_antenna_field_file_for("CS002-AntennaField.conf", "CS002", mode.antenna_field())?;
//! let mut ctx = RunContext::new(layout, FrequencyPlan::new(mode));
//! if let Some(start) = start_time_from_file_name(path) {
//!     ctx = ctx.with_start_time(start);
//! }
//! let params = ctx.capture_params(CaptureFormat::Acc);
//! let decoder = Decoder::new(File::open(path)?, &params, &ctx.plan)?;
//! let dataset = convert(&ctx, decoder)?;
//! println!("{} rows", dataset.rows.len());
//! # Ok(())
//! # }
//! ```

#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex<f64>;

pub mod assemble;
pub mod averaging;
pub mod calibration;
pub mod capture;
pub mod constants;
pub mod context;
pub mod error;
pub mod filenames;
pub mod freq;
pub mod geometry;
pub mod io;
pub mod layout;
pub mod math;
pub mod pipeline;
pub mod pos;
pub mod sexagesimal;

// Re-exports.
pub use assemble::{VisDataset, VisRow};
pub use context::RunContext;
pub use error::ConvertError;
pub use pos::{
    azel::AzEl,
    direction::Direction,
    earth::LatLngHeight,
    hadec::HADec,
    radec::RADec,
    uvw::UVW,
    xyz::XyzGeocentric,
};

pub use erfa::Ellipsoid;
pub use hifitime;
pub use ndarray;
pub use num_complex;
pub use num_complex::Complex;
pub use num_traits;
pub use rayon;

/// Information about how this crate was built.
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
