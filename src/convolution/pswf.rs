// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Prolate spheroidal wave functions.

/// Numerator coefficients of the rational approximation, for nu < 0.75 and
/// 0.75 <= nu <= 1 respectively.
const P: [[f64; 5]; 2] = [
    [8.203343e-2, -3.644705e-1, 6.278660e-1, -5.335581e-1, 2.312756e-1],
    [4.028559e-3, -3.697768e-2, 1.021332e-1, -1.201436e-1, 6.412774e-2],
];

/// Denominator coefficients.
const Q: [[f64; 3]; 2] = [[1.0, 8.212018e-1, 2.078043e-1], [1.0, 9.599102e-1, 2.918724e-1]];

/// Schwab's rational approximation to the m = 6, alpha = 1 prolate spheroidal
/// wave function.
///
/// `nu` is the offset from the centre in units of the function's half-width.
/// Returns `(grid_correction, gridding)`: the grid-correction function, and the
/// gridding function `(1 - nu^2) * grid_correction`. Both are zero for
/// |nu| > 1; the grid-correction function is 1 at nu = 0.
pub fn grdsf(nu: f64) -> (f64, f64) {
    let nu = nu.abs();
    if nu > 1.0 {
        return (0.0, 0.0);
    }

    let (part, nuend) = if nu < 0.75 { (0, 0.75) } else { (1, 1.0) };
    let delnusq = nu * nu - nuend * nuend;
    let top = P[part]
        .iter()
        .rev()
        .fold(0.0, |acc: f64, &p| acc * delnusq + p);
    let bot = Q[part]
        .iter()
        .rev()
        .fold(0.0, |acc: f64, &q| acc * delnusq + q);

    let grdsf = if bot > 0.0 { top / bot } else { 0.0 };
    (grdsf, (1.0 - nu * nu) * grdsf)
}
