// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// The polarisation basis of visibilities and images.
#[derive(
    Debug,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
pub enum PolarisationFrame {
    #[strum(serialize = "stokesI")]
    #[serde(rename = "stokesI")]
    StokesI,

    #[strum(serialize = "stokesIQUV")]
    #[serde(rename = "stokesIQUV")]
    StokesIQUV,

    #[strum(serialize = "linear")]
    #[serde(rename = "linear")]
    Linear,

    #[strum(serialize = "circular")]
    #[serde(rename = "circular")]
    Circular,
}

lazy_static::lazy_static! {
    pub static ref POLARISATION_FRAMES: String = PolarisationFrame::iter().join(", ");
}

impl PolarisationFrame {
    /// The length of the polarisation axis for data in this frame.
    pub fn npol(self) -> usize {
        match self {
            PolarisationFrame::StokesI => 1,
            PolarisationFrame::StokesIQUV
            | PolarisationFrame::Linear
            | PolarisationFrame::Circular => 4,
        }
    }
}
