// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::coord::WcsError;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Image {what} has length {got}, but {expected} was expected")]
    ImageShape {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Visibility {what} has length {got}, but {expected} was expected")]
    VisShape {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Region x0={x0}, y0={y0}, nx={nx}, ny={ny} doesn't fit inside a {image_nx}x{image_ny} image")]
    RegionOutOfBounds {
        x0: usize,
        y0: usize,
        nx: usize,
        ny: usize,
        image_nx: usize,
        image_ny: usize,
    },

    #[error("Images have different shapes or polarisation frames")]
    ImagesDiffer,

    #[error("The array configuration has fewer than two antennas; there are no baselines")]
    NoBaselines,

    #[error("No frequencies were supplied")]
    NoFrequencies,

    #[error("Cell size {cellsize} rad is larger than the critical cell size {critical} rad of the longest baseline")]
    CellTooLarge { cellsize: f64, critical: f64 },

    #[error("Images must have a non-zero number of pixels")]
    ZeroPixels,

    #[error(transparent)]
    Wcs(#[from] WcsError),
}
