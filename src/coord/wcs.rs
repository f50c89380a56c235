// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The world-coordinate system attached to images.

use marlu::{RADec, LMN};

use super::WcsError;

/// An orthographic (SIN) world-coordinate system for a (pol, chan, y, x) image
/// cube.
///
/// Pixel `(x, y)` has direction cosines
/// `l = (x - reference_pixel[0]) * cell[0]` and
/// `m = (y - reference_pixel[1]) * cell[1]`, relative to
/// `reference_direction`, which is also the phase centre of any visibilities
/// imaged onto it. By convention `cell[0]` is negative (RA increases to the
/// left).
#[derive(Debug, Clone, Copy)]
pub struct WorldCoordinates {
    /// The (x, y) pixel at the reference direction. Zero indexed.
    pub reference_pixel: [f64; 2],

    /// The sky direction of the reference pixel.
    pub reference_direction: RADec,

    /// The signed (x, y) pixel increments \[radians\].
    pub cell: [f64; 2],

    /// The frequency of the first channel \[Hz\].
    pub reference_frequency: f64,

    /// The frequency increment between channels \[Hz\]. Zero for a single
    /// (multi-frequency synthesis) channel.
    pub channel_width: f64,
}

impl WorldCoordinates {
    /// Create a coordinate system for an `nx` by `ny` image with square pixels
    /// of `cellsize` radians, centred on `phase_centre`. The reference pixel is
    /// `(nx / 2, ny / 2)`.
    pub fn new(
        nx: usize,
        ny: usize,
        cellsize: f64,
        phase_centre: RADec,
        reference_frequency: f64,
        channel_width: f64,
    ) -> Result<Self, WcsError> {
        if !cellsize.is_finite() || cellsize <= 0.0 {
            return Err(WcsError::InvalidCell {
                x: -cellsize,
                y: cellsize,
            });
        }
        if !reference_frequency.is_finite() || reference_frequency <= 0.0 {
            return Err(WcsError::InvalidReferenceFrequency(reference_frequency));
        }

        Ok(Self {
            reference_pixel: [(nx / 2) as f64, (ny / 2) as f64],
            reference_direction: phase_centre,
            cell: [-cellsize, cellsize],
            reference_frequency,
            channel_width: if channel_width.is_finite() {
                channel_width
            } else {
                0.0
            },
        })
    }

    /// The absolute size of a pixel \[radians\]. The larger of the two axes is
    /// returned if they differ.
    pub fn cellsize(&self) -> f64 {
        self.cell[0].abs().max(self.cell[1].abs())
    }

    /// Fail if the cell sizes are unusable.
    pub fn check_cell(&self) -> Result<(), WcsError> {
        let [x, y] = self.cell;
        if !x.is_finite() || !y.is_finite() || x == 0.0 || y == 0.0 {
            return Err(WcsError::InvalidCell { x, y });
        }
        Ok(())
    }

    pub fn pixel_to_lm(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.reference_pixel[0]) * self.cell[0],
            (y - self.reference_pixel[1]) * self.cell[1],
        )
    }

    pub fn lm_to_pixel(&self, l: f64, m: f64) -> (f64, f64) {
        (
            l / self.cell[0] + self.reference_pixel[0],
            m / self.cell[1] + self.reference_pixel[1],
        )
    }

    /// The direction cosines of a pixel, or `None` if the pixel is outside the
    /// celestial sphere.
    pub fn pixel_to_lmn(&self, x: f64, y: f64) -> Option<LMN> {
        let (l, m) = self.pixel_to_lm(x, y);
        let r2 = l * l + m * m;
        if r2 >= 1.0 {
            None
        } else {
            Some(LMN {
                l,
                m,
                n: (1.0 - r2).sqrt(),
            })
        }
    }

    /// The sky direction of a (fractional) pixel.
    pub fn pixel_to_direction(&self, x: f64, y: f64) -> Result<RADec, WcsError> {
        let LMN { l, m, n } = self.pixel_to_lmn(x, y).ok_or_else(|| {
            let (l, m) = self.pixel_to_lm(x, y);
            WcsError::FieldOfView { l, m }
        })?;
        let (s0, c0) = self.reference_direction.dec.sin_cos();
        let dec = (m * c0 + n * s0).asin();
        let ra = self.reference_direction.ra + l.atan2(n * c0 - m * s0);
        Ok(RADec::from_radians(ra, dec))
    }

    /// The (fractional) pixel of a sky direction. Directions more than 90° from
    /// the reference direction have no orthographic projection.
    pub fn direction_to_pixel(&self, radec: RADec) -> Result<(f64, f64), WcsError> {
        let LMN { l, m, n } = radec.to_lmn(self.reference_direction);
        if n < 0.0 {
            return Err(WcsError::BelowHorizon {
                ra: radec.ra.to_degrees(),
                dec: radec.dec.to_degrees(),
            });
        }
        Ok(self.lm_to_pixel(l, m))
    }

    /// The (x, y) extent of an `nx` by `ny` image \[radians\].
    pub fn field_of_view(&self, nx: usize, ny: usize) -> (f64, f64) {
        (
            nx as f64 * self.cell[0].abs(),
            ny as f64 * self.cell[1].abs(),
        )
    }

    /// Fail if any corner of an `nx` by `ny` image falls off the celestial
    /// sphere.
    pub fn check_field_of_view(&self, nx: usize, ny: usize) -> Result<(), WcsError> {
        for (x, y) in [
            (0.0, 0.0),
            (nx as f64 - 1.0, 0.0),
            (0.0, ny as f64 - 1.0),
            (nx as f64 - 1.0, ny as f64 - 1.0),
        ] {
            if self.pixel_to_lmn(x, y).is_none() {
                let (l, m) = self.pixel_to_lm(x, y);
                return Err(WcsError::FieldOfView { l, m });
            }
        }
        Ok(())
    }

    /// The coordinate system of a sub-image whose pixel (0, 0) is this
    /// system's pixel `(x0, y0)`. Both systems map a given sky position to the
    /// same direction cosines.
    pub fn shifted(&self, x0: usize, y0: usize) -> Self {
        Self {
            reference_pixel: [
                self.reference_pixel[0] - x0 as f64,
                self.reference_pixel[1] - y0 as f64,
            ],
            ..*self
        }
    }

    /// The same system with the reference pixel at the middle of an `nx` by
    /// `ny` image, keeping the reference direction.
    pub fn recentred(&self, nx: usize, ny: usize) -> Self {
        Self {
            reference_pixel: [(nx / 2) as f64, (ny / 2) as f64],
            ..*self
        }
    }

    pub fn channel_frequency(&self, chan: usize) -> f64 {
        self.reference_frequency + chan as f64 * self.channel_width
    }

    /// The image channel that a frequency falls into. A single-channel image
    /// accepts every frequency; otherwise the frequency must be within half a
    /// channel of a channel's centre.
    pub fn nearest_channel(&self, freq: f64, nchan: usize) -> Option<usize> {
        match nchan {
            0 => None,
            1 => Some(0),
            _ => {
                if self.channel_width == 0.0 {
                    return None;
                }
                let i = ((freq - self.reference_frequency) / self.channel_width).round();
                if i < 0.0 || i >= nchan as f64 {
                    return None;
                }
                let i = i as usize;
                let diff = (freq - self.channel_frequency(i)).abs();
                if diff <= 0.5 * self.channel_width.abs() * (1.0 + 1e-9) {
                    Some(i)
                } else {
                    None
                }
            }
        }
    }
}
