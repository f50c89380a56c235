// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use super::IMAGING_CONTEXTS;
use crate::gridding::GriddingError;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Unsupported imaging context '{0}'; supported contexts: {}", *IMAGING_CONTEXTS)]
    Unsupported(String),

    #[error("The 'wprojection' context requires a convolution function, but none was supplied")]
    MissingKernel,

    #[error("The number of facets per axis must be at least 1")]
    ZeroFacets,

    #[error("The number of visibility slices must be at least 1")]
    ZeroSlices,

    #[error("{facets} facets per axis don't evenly divide a {nx}x{ny} image")]
    FacetsDontDivide { facets: usize, nx: usize, ny: usize },

    #[error("Asked for {slices} slices, but there are only {available} {what}")]
    TooManySlices {
        slices: usize,
        available: usize,
        what: &'static str,
    },

    #[error("Visibilities have |w| up to {max_w:.1} wavelengths, but the convolution function only covers [{min:.1}, {max:.1}]")]
    WNotCovered { max_w: f64, min: f64, max: f64 },

    #[error("The convolution function was made for cells of {kernel:?} radians, but the image has {image:?}")]
    KernelCell { kernel: [f64; 2], image: [f64; 2] },

    #[error(transparent)]
    Gridding(#[from] GriddingError),
}
