// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use super::Visibilities;

/// Imaging parameters recommended for an observation. These are hints; how
/// they were derived is up to whoever produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideFieldAdvice {
    /// Recommended number of time or w slices.
    pub vis_slices: usize,

    /// Recommended number of pixels along each image axis.
    pub npixels: usize,

    /// Recommended cell size \[radians\].
    pub cellsize: f64,

    /// Fraction of the image to treat as a guard band.
    pub guard_band_image: f64,

    /// Tolerated amplitude decorrelation.
    pub decorrelation_tolerance: f64,

    /// Recommended number of w-projection planes.
    pub wprojection_planes: usize,

    /// Recommended spacing of w-projection planes \[wavelengths\].
    #[serde(default)]
    pub w_step: Option<f64>,
}

/// Something that can recommend imaging parameters for a set of visibilities.
pub trait WideFieldAdvisor {
    fn advise(&self, vis: &Visibilities) -> WideFieldAdvice;
}

/// Fixed advice, e.g. read from a file.
impl WideFieldAdvisor for WideFieldAdvice {
    fn advise(&self, _vis: &Visibilities) -> WideFieldAdvice {
        self.clone()
    }
}
