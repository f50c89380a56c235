// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Imaging weights.

use itertools::Itertools;
use log::debug;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::{placements, GriddingError};
use crate::data::{Image, Visibilities};

#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum Weighting {
    /// Imaging weights are the natural weights.
    #[strum(serialize = "natural")]
    #[serde(rename = "natural")]
    Natural,

    /// Natural weights divided by the total weight landing in the same grid
    /// cell.
    #[strum(serialize = "uniform")]
    #[serde(rename = "uniform")]
    Uniform,
}

lazy_static::lazy_static! {
    pub static ref WEIGHTINGS: String = Weighting::iter().join(", ");
}

/// Return a copy of `vis` with imaging weights set according to `weighting`.
/// Uniform weights use the grid of `image` to find the weight density.
pub fn weight_visibility(
    vis: &Visibilities,
    image: &Image,
    weighting: Weighting,
) -> Result<Visibilities, GriddingError> {
    let mut out = vis.clone();
    match weighting {
        Weighting::Natural => {
            out.imaging_weight.assign(&vis.weight);
        }

        Weighting::Uniform => {
            let npol = vis.npol();
            if npol != image.npol() {
                return Err(GriddingError::PolMismatch {
                    vis: npol,
                    grid: image.npol(),
                });
            }
            let (nchan, ny, nx) = (image.nchan(), image.ny(), image.nx());
            let placements = placements(vis, &image.wcs, (nchan, ny, nx), None)?;

            let mut density = Array4::<f64>::zeros((npol, nchan, ny, nx));
            for (i, p) in placements.iter().enumerate() {
                for pol in 0..npol {
                    density[(pol, p.chan, p.y as usize, p.x as usize)] += vis.weight[(i, pol)];
                }
            }
            let occupied = density.iter().filter(|&&d| d > 0.0).count();
            debug!("Uniform weighting: {occupied} occupied grid cells for {} visibilities", vis.len());

            out.imaging_weight = Array2::from_shape_fn((vis.len(), npol), |(i, pol)| {
                let p = &placements[i];
                let d = density[(pol, p.chan, p.y as usize, p.x as usize)];
                if d > 0.0 {
                    vis.weight[(i, pol)] / d
                } else {
                    0.0
                }
            });
        }
    }
    Ok(out)
}
