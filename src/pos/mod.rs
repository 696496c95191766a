// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Super module for all positional code.

pub mod azel;
pub mod direction;
pub mod earth;
pub mod hadec;
pub mod precession;
pub mod radec;
pub mod uvw;
pub mod xyz;
