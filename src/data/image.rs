// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::debug;
use ndarray::prelude::*;
use serde::Serialize;

use super::{DataError, PolarisationFrame, Visibilities};
use crate::coord::WorldCoordinates;

/// A real-valued image cube with shape (pol, chan, y, x).
#[derive(Debug, Clone)]
pub struct Image {
    pub data: Array4<f64>,
    pub wcs: WorldCoordinates,
    pub polarisation_frame: PolarisationFrame,
}

/// Summary statistics of an image.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImageQa {
    pub max: f64,
    pub min: f64,
    pub rms: f64,
    pub sum: f64,
    pub medianabs: f64,
    pub median: f64,
}

impl Image {
    pub fn new(
        data: Array4<f64>,
        wcs: WorldCoordinates,
        polarisation_frame: PolarisationFrame,
    ) -> Result<Self, DataError> {
        let npol = polarisation_frame.npol();
        if data.len_of(Axis(0)) != npol {
            return Err(DataError::ImageShape {
                what: "polarisation axis",
                expected: npol,
                got: data.len_of(Axis(0)),
            });
        }
        if data.is_empty() {
            return Err(DataError::ZeroPixels);
        }
        wcs.check_cell()?;
        Ok(Self {
            data,
            wcs,
            polarisation_frame,
        })
    }

    /// An image of zeros.
    pub fn zeros(
        nchan: usize,
        ny: usize,
        nx: usize,
        wcs: WorldCoordinates,
        polarisation_frame: PolarisationFrame,
    ) -> Result<Self, DataError> {
        Self::new(
            Array4::zeros((polarisation_frame.npol(), nchan, ny, nx)),
            wcs,
            polarisation_frame,
        )
    }

    /// An image of zeros with the same shape and coordinates as this one.
    pub fn empty_like(&self) -> Self {
        Self {
            data: Array4::zeros(self.data.dim()),
            wcs: self.wcs,
            polarisation_frame: self.polarisation_frame,
        }
    }

    pub fn npol(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn nchan(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn ny(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn nx(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    fn check_region(&self, x0: usize, y0: usize, nx: usize, ny: usize) -> Result<(), DataError> {
        if nx == 0 || ny == 0 || x0 + nx > self.nx() || y0 + ny > self.ny() {
            return Err(DataError::RegionOutOfBounds {
                x0,
                y0,
                nx,
                ny,
                image_nx: self.nx(),
                image_ny: self.ny(),
            });
        }
        Ok(())
    }

    /// Copy out an `nx` by `ny` region whose first pixel is `(x0, y0)`. The
    /// region's coordinate system is shifted so its pixels keep their sky
    /// directions.
    pub fn slice_region(&self, x0: usize, y0: usize, nx: usize, ny: usize) -> Result<Self, DataError> {
        self.check_region(x0, y0, nx, ny)?;
        Ok(Self {
            data: self
                .data
                .slice(s![.., .., y0..y0 + ny, x0..x0 + nx])
                .to_owned(),
            wcs: self.wcs.shifted(x0, y0),
            polarisation_frame: self.polarisation_frame,
        })
    }

    /// Add `region` into the region starting at `(x0, y0)`.
    pub fn add_region(&mut self, region: &Image, x0: usize, y0: usize) -> Result<(), DataError> {
        if region.npol() != self.npol() || region.nchan() != self.nchan() {
            return Err(DataError::ImagesDiffer);
        }
        self.check_region(x0, y0, region.nx(), region.ny())?;
        let mut view = self
            .data
            .slice_mut(s![.., .., y0..y0 + region.ny(), x0..x0 + region.nx()]);
        view += &region.data;
        Ok(())
    }

    /// Add another image of the same shape to this one.
    pub fn add(&mut self, other: &Image) -> Result<(), DataError> {
        if self.data.dim() != other.data.dim()
            || self.polarisation_frame != other.polarisation_frame
        {
            return Err(DataError::ImagesDiffer);
        }
        self.data += &other.data;
        Ok(())
    }

    /// Summary statistics over every pixel of every plane.
    pub fn qa(&self) -> ImageQa {
        let n = self.data.len() as f64;
        let mut sorted: Vec<f64> = self.data.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));
        let mut sorted_abs: Vec<f64> = sorted.iter().map(|v| v.abs()).collect();
        sorted_abs.sort_unstable_by(|a, b| a.total_cmp(b));

        ImageQa {
            max: sorted.last().copied().unwrap_or(0.0),
            min: sorted.first().copied().unwrap_or(0.0),
            rms: (self.data.iter().map(|v| v * v).sum::<f64>() / n).sqrt(),
            sum: self.data.sum(),
            medianabs: median(&sorted_abs),
            median: median(&sorted),
        }
    }
}

fn median(sorted: &[f64]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2],
        n => 0.5 * (sorted[n / 2 - 1] + sorted[n / 2]),
    }
}

/// Create an empty image suitable for imaging `vis`. If `cellsize` isn't
/// given, half of the critical (Nyquist) cell size of the longest baseline is
/// used. With `mfs`, all frequencies go into a single channel; otherwise there
/// is one channel per unique visibility frequency.
pub fn create_image_from_visibility(
    vis: &Visibilities,
    npixel: usize,
    cellsize: Option<f64>,
    mfs: bool,
) -> Result<Image, DataError> {
    if npixel == 0 {
        return Err(DataError::ZeroPixels);
    }
    let mut freqs = vis.frequency.clone();
    freqs.sort_unstable_by(|a, b| a.total_cmp(b));
    freqs.dedup();
    if freqs.is_empty() {
        return Err(DataError::NoFrequencies);
    }

    let uv_max = vis.uv_max();
    let critical = if uv_max > 0.0 {
        1.0 / (2.0 * uv_max)
    } else {
        f64::INFINITY
    };
    let cellsize = match cellsize {
        Some(c) if c > critical => {
            return Err(DataError::CellTooLarge {
                cellsize: c,
                critical,
            })
        }
        Some(c) => c,
        None => 0.5 * critical,
    };
    debug!("Creating a {npixel}x{npixel} image with cell size {cellsize} rad (critical {critical} rad)");

    let (nchan, reference_frequency, channel_width) = if mfs || freqs.len() == 1 {
        (1, freqs.iter().sum::<f64>() / freqs.len() as f64, 0.0)
    } else {
        (freqs.len(), freqs[0], freqs[1] - freqs[0])
    };
    let wcs = WorldCoordinates::new(
        npixel,
        npixel,
        cellsize,
        vis.phase_centre,
        reference_frequency,
        channel_width,
    )?;
    Image::zeros(nchan, npixel, npixel, wcs, vis.polarisation_frame)
}
