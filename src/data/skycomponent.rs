// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::debug;
use marlu::RADec;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use vec1::Vec1;

use super::{DataError, Image, PolarisationFrame};

/// A point source.
#[derive(Debug, Clone)]
pub struct SkyComponent {
    pub direction: RADec,

    /// The frequencies at which the flux densities are specified \[Hz\].
    pub frequency: Vec1<f64>,

    /// Flux densities with shape (nchan, npol) \[Jy\].
    pub flux: Array2<f64>,

    pub polarisation_frame: PolarisationFrame,
}

impl SkyComponent {
    pub fn new(
        direction: RADec,
        frequency: Vec1<f64>,
        flux: Array2<f64>,
        polarisation_frame: PolarisationFrame,
    ) -> Result<Self, DataError> {
        if flux.len_of(Axis(0)) != frequency.len() {
            return Err(DataError::ImageShape {
                what: "component frequency axis",
                expected: frequency.len(),
                got: flux.len_of(Axis(0)),
            });
        }
        if flux.len_of(Axis(1)) != polarisation_frame.npol() {
            return Err(DataError::ImageShape {
                what: "component polarisation axis",
                expected: polarisation_frame.npol(),
                got: flux.len_of(Axis(1)),
            });
        }
        Ok(Self {
            direction,
            frequency,
            flux,
            polarisation_frame,
        })
    }

    /// The flux densities of the specified frequency closest to `freq`.
    pub fn flux_at(&self, freq: f64) -> ArrayView1<'_, f64> {
        let mut best = 0;
        for (i, f) in self.frequency.iter().enumerate() {
            if (f - freq).abs() < (self.frequency[best] - freq).abs() {
                best = i;
            }
        }
        self.flux.row(best)
    }
}

/// How a component's flux is put onto pixels.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertMethod {
    /// All flux on the nearest pixel.
    #[strum(serialize = "nearest")]
    #[serde(rename = "nearest")]
    Nearest,

    /// Flux shared between the four surrounding pixels, conserving the total.
    #[strum(serialize = "bilinear")]
    #[serde(rename = "bilinear")]
    Bilinear,
}

/// Add sky components to an image. Components that don't land on the image
/// are skipped.
pub fn insert_skycomponent(
    image: &mut Image,
    comps: &[SkyComponent],
    method: InsertMethod,
) -> Result<(), DataError> {
    let (nx, ny) = (image.nx() as isize, image.ny() as isize);
    for comp in comps {
        if comp.polarisation_frame.npol() != image.npol() {
            return Err(DataError::ImageShape {
                what: "component polarisation axis",
                expected: image.npol(),
                got: comp.polarisation_frame.npol(),
            });
        }

        let (x, y) = match image.wcs.direction_to_pixel(comp.direction) {
            Ok(p) => p,
            Err(e) => {
                debug!("Not inserting component: {e}");
                continue;
            }
        };

        let taps: Vec<(isize, isize, f64)> = match method {
            InsertMethod::Nearest => vec![(x.round() as isize, y.round() as isize, 1.0)],
            InsertMethod::Bilinear => {
                let (x0, y0) = (x.floor(), y.floor());
                let (fx, fy) = (x - x0, y - y0);
                let (x0, y0) = (x0 as isize, y0 as isize);
                vec![
                    (x0, y0, (1.0 - fx) * (1.0 - fy)),
                    (x0 + 1, y0, fx * (1.0 - fy)),
                    (x0, y0 + 1, (1.0 - fx) * fy),
                    (x0 + 1, y0 + 1, fx * fy),
                ]
            }
        };
        if taps
            .iter()
            .all(|&(px, py, _)| px < 0 || py < 0 || px >= nx || py >= ny)
        {
            debug!(
                "Component at pixel ({x:.2}, {y:.2}) is off the {nx}x{ny} image; skipping"
            );
            continue;
        }

        for chan in 0..image.nchan() {
            let flux = comp.flux_at(image.wcs.channel_frequency(chan));
            for &(px, py, frac) in &taps {
                if px < 0 || py < 0 || px >= nx || py >= ny || frac == 0.0 {
                    continue;
                }
                let mut pixels = image
                    .data
                    .slice_mut(s![.., chan, py as usize, px as usize]);
                pixels.scaled_add(frac, &flux);
            }
        }
    }
    Ok(())
}
