// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GriddingError {
    #[error("Visibility {index} at (u, v) = ({u:.1}, {v:.1}) wavelengths doesn't fit on the grid with its kernel; use a smaller cell size or more pixels")]
    OutOfGrid { index: usize, u: f64, v: f64 },

    #[error("Visibility {index} has frequency {freq} Hz, which isn't in any image channel")]
    NoChannel { index: usize, freq: f64 },

    #[error("Visibility {index} has w = {w:.1} wavelengths, outside the convolution function's w range [{min:.1}, {max:.1}]")]
    WOutOfRange {
        index: usize,
        w: f64,
        min: f64,
        max: f64,
    },

    #[error("Visibilities have {vis} polarisations, but the grid has {grid}")]
    PolMismatch { vis: usize, grid: usize },

    #[error("The convolution function has {kernel} polarisations; expected 1 or {grid}")]
    KernelPols { kernel: usize, grid: usize },

    #[error("The convolution function has {kernel} a-terms; expected 1 or one per image channel ({nchan})")]
    KernelATerms { kernel: usize, nchan: usize },

    #[error("The convolution function was made for a {kernel:?} (y, x) image, but the grid is {grid:?}")]
    KernelGeometry {
        kernel: [usize; 2],
        grid: [usize; 2],
    },
}
