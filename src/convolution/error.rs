// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::coord::WcsError;

#[derive(Error, Debug)]
pub enum ConvolutionError {
    #[error("The number of w planes must be at least 1")]
    NoWPlanes,

    #[error("More than one w plane was requested, but no w step was given")]
    NoWStep,

    #[error("The w step must be finite and positive; got {0} wavelengths")]
    BadWStep(f64),

    #[error("The oversampling factor must be at least 1")]
    ZeroOversampling,

    #[error("The kernel support must be at least 1 grid cell")]
    ZeroSupport,

    #[error("A kernel of support {support} (width {}) doesn't fit on a {npixel}-pixel grid", 2 * support)]
    SupportTooLarge { support: usize, npixel: usize },

    #[error("Got {got} a-term images; expected 1 or one per image channel ({nchan})")]
    BadATermCount { got: usize, nchan: usize },

    #[error("a-term image has shape {got:?} (pol, y, x); expected {expected:?}")]
    ATermShape {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },

    #[error(transparent)]
    Wcs(#[from] WcsError),
}

#[derive(Error, Debug)]
pub enum ClippingError {
    #[error("The clipping level must be finite and non-negative; got {0}")]
    BadLevel(f64),

    #[error("Clipping level {level} would remove every tap of kernel slice (pol {pol}, w {w}, a {a})")]
    TooAggressive {
        level: f64,
        pol: usize,
        w: usize,
        a: usize,
    },

    #[error("Kernel slice (pol {pol}, w {w}, a {a}) is entirely zero; it can't be clipped")]
    ZeroPeak { pol: usize, w: usize, a: usize },
}
