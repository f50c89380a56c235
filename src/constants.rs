// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision.
 */

pub use marlu::constants::VEL_C;
pub use std::f64::consts::{PI, TAU};

/// The default number of oversampled phases per grid cell of a convolution
/// function.
pub const DEFAULT_OVERSAMPLING: usize = 8;

/// The default half-width of a convolution function \[grid cells\].
pub const DEFAULT_SUPPORT: usize = 3;

/// The half-width of the prolate spheroidal anti-aliasing function \[grid
/// cells\]. Kernels with a larger support are zero beyond it.
pub const PSWF_SUPPORT: usize = 3;

/// By default, convolution functions are not clipped.
pub const DEFAULT_CLIP_LEVEL: f64 = 0.0;

/// The default number of image pixels along each axis when nothing else
/// suggests a size.
pub const DEFAULT_NPIXEL: usize = 512;

/// Grid-correction values are set to zero where the gridding function's
/// transform falls below this, rather than dividing by (almost) zero.
pub const GCF_FLOOR: f64 = 1e-8;

/// The smallest number of far-field samples used when computing a
/// w-projection kernel.
pub const MIN_FAR_FIELD_SIZE: usize = 16;
