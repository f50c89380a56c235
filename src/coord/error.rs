// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WcsError {
    #[error("Cell sizes must be finite and non-zero; got x={x}, y={y} [radians]")]
    InvalidCell { x: f64, y: f64 },

    #[error("The reference frequency must be finite and positive; got {0} Hz")]
    InvalidReferenceFrequency(f64),

    #[error("Direction cosines (l={l}, m={m}) are outside the unit circle; the image's field of view is too large for its cell size")]
    FieldOfView { l: f64, m: f64 },

    #[error("Direction (RA {ra}°, Dec {dec}°) is more than 90° from the image's reference direction")]
    BelowHorizon { ra: f64, dec: f64 },
}
