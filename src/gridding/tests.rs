// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use approx::assert_abs_diff_eq;
use marlu::c64;
use ndarray::prelude::*;
use vec1::vec1;

use super::{fft::*, *};
use crate::{
    convolution::{anti_aliasing_function, create_convolution_function, KernelParams},
    data::{create_image_from_visibility, create_visibility, Image, PolarisationFrame},
    tests::{test_array, test_image, test_observation, test_vis_coplanar, TEST_FREQ},
};

/// Deterministic, messy values.
fn scrambled(i: usize, j: usize) -> c64 {
    let (i, j) = (i as f64, j as f64);
    c64::new((0.37 * i + 0.11 * j).sin(), (0.23 * j - 0.05 * i * i).cos())
}

fn grid_for(image: &Image) -> (Array4<c64>, Array2<f64>) {
    (
        Array4::zeros((image.npol(), image.nchan(), image.ny(), image.nx())),
        Array2::zeros((image.npol(), image.nchan())),
    )
}

#[test]
fn test_fft_delta() {
    let mut a = Array2::<c64>::zeros((16, 16));
    a[(8, 8)] = c64::new(1.0, 0.0);
    fft2(a.view_mut());
    for v in a.iter() {
        assert_abs_diff_eq!(v.re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-12);
    }

    // An offset delta becomes a phase ramp with negative exponent.
    let mut a = Array2::<c64>::zeros((16, 16));
    a[(8, 9)] = c64::new(1.0, 0.0);
    fft2(a.view_mut());
    let expected = c64::cis(-std::f64::consts::TAU * 3.0 / 16.0);
    assert_abs_diff_eq!(a[(0, 11)].re, expected.re, epsilon = 1e-12);
    assert_abs_diff_eq!(a[(0, 11)].im, expected.im, epsilon = 1e-12);
}

#[test]
fn test_fft_round_trip() {
    let orig = Array2::from_shape_fn((12, 8), |(y, x)| scrambled(y, x));
    let mut a = orig.clone();
    fft2(a.view_mut());
    ifft2(a.view_mut());
    a /= c64::new(96.0, 0.0);
    for (a, b) in a.iter().zip(orig.iter()) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
    }
}

#[test]
fn test_pad_and_extract() {
    let a = Array2::from_shape_fn((4, 4), |(y, x)| c64::new((y * 4 + x) as f64, 0.0));
    let padded = pad_mid(a.view(), 8, 8);
    // The centre pixel stays at the centre.
    assert_eq!(padded[(4, 4)], a[(2, 2)]);
    assert_eq!(padded[(0, 0)], c64::default());
    assert_eq!(extract_mid(padded.view(), 4, 4), a);
}

#[test]
fn test_constant_grid_degrids_to_one() {
    let vis = test_vis_coplanar();
    let image = test_image(&vis, 64);
    let (kernel, _) = anti_aliasing_function(&image, 8, 3).unwrap();
    let grid = Array4::from_elem((1, 1, 64, 64), c64::new(1.0, 0.0));
    let out = degrid_visibilities(grid.view(), &vis, &kernel, &image.wcs).unwrap();
    assert_eq!(out.dim(), (vis.len(), 1));
    for v in out.iter() {
        assert_abs_diff_eq!(v.re, 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-10);
    }
}

#[test]
fn test_grid_degrid_are_adjoint() {
    let mut vis = test_vis_coplanar();
    for (i, v) in vis.vis.iter_mut().enumerate() {
        *v = scrambled(i, 7);
    }
    let image = test_image(&vis, 64);

    for kernel in [
        anti_aliasing_function(&image, 8, 3).unwrap().0,
        create_convolution_function(
            &image,
            &KernelParams {
                w_planes: 3,
                w_step: Some(50.0),
                oversampling: 4,
                support: 4,
                use_anti_aliasing: true,
            },
            None,
        )
        .unwrap()
        .0,
    ] {
        let model = Array4::from_shape_fn((1, 1, 64, 64), |(_, _, y, x)| scrambled(y, x));
        let degridded = degrid_visibilities(model.view(), &vis, &kernel, &image.wcs).unwrap();
        let lhs: c64 = vis
            .vis
            .iter()
            .zip(degridded.iter())
            .map(|(v, d)| v.conj() * d)
            .sum();

        let (mut grid, mut sumwt) = grid_for(&image);
        grid_visibilities(grid.view_mut(), sumwt.view_mut(), &vis, &kernel, &image.wcs, false)
            .unwrap();
        let rhs: c64 = grid
            .iter()
            .zip(model.iter())
            .map(|(g, m)| g.conj() * m)
            .sum();

        assert_abs_diff_eq!(lhs.re, rhs.re, epsilon = 1e-8 * lhs.norm());
        assert_abs_diff_eq!(lhs.im, rhs.im, epsilon = 1e-8 * lhs.norm());
        assert_abs_diff_eq!(sumwt[(0, 0)], vis.len() as f64);
    }
}

#[test]
fn test_psf_grid() {
    let mut vis = test_vis_coplanar();
    vis.vis.fill(c64::new(3.0, -2.0));
    let image = test_image(&vis, 64);
    let (kernel, _) = anti_aliasing_function(&image, 8, 3).unwrap();

    let (mut psf, mut psf_wt) = grid_for(&image);
    grid_visibilities(psf.view_mut(), psf_wt.view_mut(), &vis, &kernel, &image.wcs, true).unwrap();
    let ones = vis.with_vis(Array2::from_elem(vis.vis.dim(), c64::new(1.0, 0.0))).unwrap();
    let (mut grid, mut sumwt) = grid_for(&image);
    grid_visibilities(grid.view_mut(), sumwt.view_mut(), &ones, &kernel, &image.wcs, false)
        .unwrap();

    assert_eq!(psf, grid);
    assert_eq!(psf_wt, sumwt);
    // Every phase of the kernel sums to 1, so the grid holds the total weight.
    assert_abs_diff_eq!(psf.sum().re, vis.len() as f64, epsilon = 1e-8);
}

#[test]
fn test_box_grid() {
    let mut vis = test_vis_coplanar().select(&[0]);
    vis.uvw[0].u = -50.0;
    vis.uvw[0].v = 20.0;
    vis.uvw[0].w = 0.0;
    vis.vis[(0, 0)] = c64::new(2.0, 1.0);
    vis.imaging_weight[(0, 0)] = 0.5;
    let image = test_image(&vis, 64);

    let (mut grid, mut sumwt) = grid_for(&image);
    box_grid(grid.view_mut(), sumwt.view_mut(), &vis, &image.wcs, false).unwrap();
    // x = 32 + 0.05 * 64, y = 32 + 0.02 * 64.
    assert_eq!(grid[(0, 0, 33, 35)], c64::new(1.0, 0.5));
    assert_abs_diff_eq!(grid.sum().re, 1.0);
    assert_abs_diff_eq!(sumwt[(0, 0)], 0.5);

    vis.uvw[0].u = 1e5;
    assert!(matches!(
        box_grid(grid.view_mut(), sumwt.view_mut(), &vis, &image.wcs, false),
        Err(GriddingError::OutOfGrid { index: 0, .. })
    ));
}

#[test]
fn test_gridding_errors() {
    let mut vis = test_vis_coplanar();
    let image = test_image(&vis, 64);
    let (kernel, _) = anti_aliasing_function(&image, 8, 3).unwrap();
    let (mut grid, mut sumwt) = grid_for(&image);

    // Too far out in u.
    vis.uvw[3].u = 1e4;
    assert!(matches!(
        grid_visibilities(grid.view_mut(), sumwt.view_mut(), &vis, &kernel, &image.wcs, false),
        Err(GriddingError::OutOfGrid { index: 3, .. })
    ));
    assert!(matches!(
        check_coverage(&vis, &image.wcs, (1, 64, 64), Some(&kernel)),
        Err(GriddingError::OutOfGrid { index: 3, .. })
    ));
    vis.uvw[3].u = 0.0;
    check_coverage(&vis, &image.wcs, (1, 64, 64), Some(&kernel)).unwrap();
    check_coverage(&vis, &image.wcs, (1, 64, 64), None).unwrap();

    // w beyond the planes.
    let wkernel = create_convolution_function(
        &image,
        &KernelParams {
            w_planes: 3,
            w_step: Some(1.0),
            ..Default::default()
        },
        None,
    )
    .unwrap()
    .0;
    vis.uvw[5].w = 100.0;
    assert!(matches!(
        degrid_visibilities(grid.view(), &vis, &wkernel, &image.wcs),
        Err(GriddingError::WOutOfRange { index: 5, .. })
    ));
    // Kernels without a w axis don't care.
    degrid_visibilities(grid.view(), &vis, &kernel, &image.wcs).unwrap();

    // A kernel for another image size.
    let small = test_image(&vis, 32);
    let (small_kernel, _) = anti_aliasing_function(&small, 8, 3).unwrap();
    assert!(matches!(
        degrid_visibilities(grid.view(), &vis, &small_kernel, &image.wcs),
        Err(GriddingError::KernelGeometry {
            kernel: [32, 32],
            grid: [64, 64]
        })
    ));

    // Too many a-terms for the grid's channels.
    let mut bad = kernel.clone();
    bad.num_a_terms = 2;
    assert!(matches!(
        degrid_visibilities(grid.view(), &vis, &bad, &image.wcs),
        Err(GriddingError::KernelATerms { kernel: 2, nchan: 1 })
    ));

    // Four-polarisation grid, one-polarisation visibilities.
    let grid4 = Array4::<c64>::zeros((4, 1, 64, 64));
    assert!(matches!(
        degrid_visibilities(grid4.view(), &vis, &kernel, &image.wcs),
        Err(GriddingError::PolMismatch { vis: 1, grid: 4 })
    ));
}

#[test]
fn test_channels() {
    let vis = create_visibility(
        &test_array(),
        &test_observation(vec1![0.0], vec1![TEST_FREQ, TEST_FREQ + 1e6]),
    )
    .unwrap();
    let image = create_image_from_visibility(&vis, 64, Some(0.001), false).unwrap();
    assert_eq!(image.nchan(), 2);
    let (kernel, _) = anti_aliasing_function(&image, 8, 3).unwrap();

    let (mut grid, mut sumwt) = grid_for(&image);
    grid_visibilities(grid.view_mut(), sumwt.view_mut(), &vis, &kernel, &image.wcs, true).unwrap();
    // Half of the visibilities went into each channel.
    assert_abs_diff_eq!(sumwt[(0, 0)], vis.len() as f64 / 2.0);
    assert_abs_diff_eq!(sumwt[(0, 1)], vis.len() as f64 / 2.0);

    let mut off = vis.select(&[0, 1]);
    off.frequency[1] = TEST_FREQ + 5e6;
    assert!(matches!(
        grid_visibilities(grid.view_mut(), sumwt.view_mut(), &off, &kernel, &image.wcs, true),
        Err(GriddingError::NoChannel { index: 1, .. })
    ));
}

#[test]
fn test_weighting() {
    assert_eq!(Weighting::from_str("uniform").unwrap(), Weighting::Uniform);
    assert!(Weighting::from_str("robust").is_err());
    assert!(WEIGHTINGS.contains("natural"));

    let mut vis = test_vis_coplanar().select(&[0, 0, 434]);
    vis.weight.fill(2.0);
    vis.imaging_weight.fill(0.0);
    let image = test_image(&vis, 64);

    let natural = weight_visibility(&vis, &image, Weighting::Natural).unwrap();
    assert_eq!(natural.imaging_weight, vis.weight);

    let uniform = weight_visibility(&vis, &image, Weighting::Uniform).unwrap();
    assert_abs_diff_eq!(uniform.imaging_weight, array![[0.5], [0.5], [1.0]]);
    // Only the imaging weights change.
    assert_eq!(uniform.weight, vis.weight);
    assert_eq!(uniform.vis, vis.vis);

    let image4 = Image::zeros(1, 64, 64, image.wcs, PolarisationFrame::Linear).unwrap();
    assert!(matches!(
        weight_visibility(&vis, &image4, Weighting::Uniform),
        Err(GriddingError::PolMismatch { .. })
    ));
}
