// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions for tests.

use marlu::{RADec, XyzGeodetic};
use ndarray::prelude::*;
use vec1::{vec1, Vec1};

use crate::data::{
    create_image_from_visibility, create_visibility, ArrayConfiguration, Image,
    ObservationConfig, PolarisationFrame, SkyComponent, Visibilities,
};

pub(crate) const TEST_LATITUDE_DEG: f64 = -27.0;
pub(crate) const TEST_FREQ: f64 = 1e8;
pub(crate) const TEST_CELLSIZE: f64 = 0.001;

/// A 30-antenna, three-armed spiral, up to ~490 m from the centre, laid out on
/// flat ground at [`TEST_LATITUDE_DEG`].
pub(crate) fn test_array() -> ArrayConfiguration {
    let (sin_lat, cos_lat) = TEST_LATITUDE_DEG.to_radians().sin_cos();
    let mut antennas = Vec::with_capacity(30);
    for arm in 0..3 {
        for i in 0..10 {
            let r = 40.0 + 50.0 * i as f64;
            let theta = arm as f64 * std::f64::consts::TAU / 3.0 + i as f64 * 0.35;
            let (e, n) = (r * theta.cos(), r * theta.sin());
            antennas.push(XyzGeodetic {
                x: -n * sin_lat,
                y: e,
                z: n * cos_lat,
            });
        }
    }
    ArrayConfiguration {
        name: "spiral".to_string(),
        antennas,
    }
}

/// An observation of the zenith (at hour angle 0) of [`test_array`].
pub(crate) fn test_observation(hour_angles: Vec1<f64>, frequencies: Vec1<f64>) -> ObservationConfig {
    let channel_bandwidths = Vec1::try_from_vec(vec![1e6; frequencies.len()]).unwrap();
    ObservationConfig {
        phase_centre: RADec::from_degrees(0.0, TEST_LATITUDE_DEG),
        hour_angles,
        frequencies,
        channel_bandwidths,
        integration_time: 10.0,
        polarisation_frame: PolarisationFrame::StokesI,
        weight: 1.0,
    }
}

/// Coplanar (w = 0) visibilities at a single time and frequency.
pub(crate) fn test_vis_coplanar() -> Visibilities {
    create_visibility(
        &test_array(),
        &test_observation(vec1![0.0], vec1![TEST_FREQ]),
    )
    .unwrap()
}

/// Visibilities spanning a little hour angle, so w is small but not zero.
pub(crate) fn test_vis_snapshot() -> Visibilities {
    create_visibility(
        &test_array(),
        &test_observation(vec1![-0.02, -0.01, 0.0, 0.01, 0.02], vec1![TEST_FREQ]),
    )
    .unwrap()
}

pub(crate) fn test_image(vis: &Visibilities, npixel: usize) -> Image {
    create_image_from_visibility(vis, npixel, Some(TEST_CELLSIZE), true).unwrap()
}

/// A Stokes I point source at the centre of pixel `(x, y)` of `image`.
pub(crate) fn component_at_pixel(image: &Image, x: f64, y: f64, flux: f64) -> SkyComponent {
    SkyComponent::new(
        image.wcs.pixel_to_direction(x, y).unwrap(),
        vec1![image.wcs.reference_frequency],
        array![[flux]],
        PolarisationFrame::StokesI,
    )
    .unwrap()
}

/// The (y, x) position and value of the largest pixel.
pub(crate) fn peak(plane: ArrayView2<f64>) -> (usize, usize, f64) {
    let mut best = (0, 0, f64::NEG_INFINITY);
    for ((y, x), &v) in plane.indexed_iter() {
        if v > best.2 {
            best = (y, x, v);
        }
    }
    best
}
