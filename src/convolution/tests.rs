// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::{c64, RADec};
use ndarray::prelude::*;

use super::*;
use crate::coord::WorldCoordinates;

fn image(npixel: usize, cellsize: f64) -> Image {
    let wcs = WorldCoordinates::new(
        npixel,
        npixel,
        cellsize,
        RADec::from_degrees(0.0, -27.0),
        1e8,
        0.0,
    )
    .unwrap();
    Image::zeros(1, npixel, npixel, wcs, PolarisationFrame::StokesI).unwrap()
}

fn wproj_params(w_planes: usize, w_step: f64, support: usize) -> KernelParams {
    KernelParams {
        w_planes,
        w_step: Some(w_step),
        oversampling: 4,
        support,
        use_anti_aliasing: true,
    }
}

#[test]
fn test_grdsf() {
    let (gcf, grid) = grdsf(0.0);
    assert_abs_diff_eq!(gcf, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(grid, 1.0, epsilon = 1e-6);

    // Symmetric.
    assert_abs_diff_eq!(grdsf(-0.3).0, grdsf(0.3).0);

    // The two parts of the approximation meet at 0.75.
    assert_abs_diff_eq!(grdsf(0.749_999_9).0, grdsf(0.75).0, epsilon = 1e-4);

    // The gridding function vanishes at the edge and beyond.
    assert_abs_diff_eq!(grdsf(1.0).1, 0.0);
    assert_eq!(grdsf(1.5), (0.0, 0.0));

    // Monotonically decreasing.
    let mut last = f64::INFINITY;
    for i in 0..=20 {
        let g = grdsf(i as f64 / 20.0).1;
        assert!(g <= last);
        last = g;
    }
}

#[test]
fn test_anti_aliasing_kernel_is_normalised() {
    let image = image(64, 0.001);
    for support in 2..=6 {
        let (kernel, gcf) = anti_aliasing_function(&image, 8, support).unwrap();
        assert_eq!(kernel.shape(), (1, 1, 1, 8, 8, 2 * support, 2 * support));
        let slice = kernel.slice(0, 0, 0);
        assert_eq!(slice.centre, [support - 1, support - 1]);

        // Every phase sums to 1, including zero offset.
        for yf in 0..8 {
            for xf in 0..8 {
                let sum = slice.data.slice(s![yf, xf, .., ..]).sum();
                assert_abs_diff_eq!(sum.re, 1.0, epsilon = 1e-12);
                assert_abs_diff_eq!(sum.im, 0.0);
            }
        }

        // The grid correction is 1 at the centre and grows towards the edges.
        assert_eq!(gcf.data.dim(), (1, 1, 64, 64));
        assert_abs_diff_eq!(gcf.data[(0, 0, 32, 32)], 1.0, epsilon = 1e-10);
        assert!(gcf.data[(0, 0, 32, 0)] > gcf.data[(0, 0, 32, 16)]);
        assert!(gcf.data[(0, 0, 32, 16)] > 1.0);
        assert_abs_diff_eq!(gcf.data[(0, 0, 10, 20)], gcf.data[(0, 0, 20, 10)], epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.grid_correction(), gcf.data.slice(s![0, 0, .., ..]));
    }
}

#[test]
fn test_wide_anti_aliasing_kernel_pads_with_zeros() {
    let image = image(64, 0.001);
    let (narrow, _) = anti_aliasing_function(&image, 8, PSWF_SUPPORT).unwrap();
    let (wide, _) = anti_aliasing_function(&image, 8, 8).unwrap();
    assert_abs_diff_eq!(narrow.grid_correction(), wide.grid_correction(), epsilon = 1e-12);

    let (narrow, wide) = (narrow.slice(0, 0, 0), wide.slice(0, 0, 0));
    let offset = wide.centre[0] - narrow.centre[0];
    assert_eq!(offset, 5);
    let (ty, tx) = narrow.taps();
    let inner = wide
        .data
        .slice(s![.., .., offset..offset + ty, offset..offset + tx]);
    let diff = ndarray::Zip::from(&inner)
        .and(&narrow.data)
        .fold(0.0_f64, |acc, a, b| acc.max((a - b).norm()));
    assert_abs_diff_eq!(diff, 0.0, epsilon = 1e-12);
    // Nothing lies outside the narrow kernel's taps.
    let outer = wide.data.iter().map(|k| k.norm()).sum::<f64>()
        - inner.iter().map(|k| k.norm()).sum::<f64>();
    assert_abs_diff_eq!(outer, 0.0, epsilon = 1e-12);
}

#[test]
fn test_box_function() {
    let image = image(32, 0.001);
    let (kernel, gcf) = create_convolution_function(
        &image,
        &KernelParams {
            use_anti_aliasing: false,
            ..Default::default()
        },
        None,
    )
    .unwrap();
    assert_eq!(kernel.shape(), (1, 1, 1, 1, 1, 1, 1));
    assert_eq!(kernel.slice(0, 0, 0).data[(0, 0, 0, 0)], c64::new(1.0, 0.0));
    assert_abs_diff_eq!(gcf.data[(0, 0, 16, 16)], 1.0);
    // 1 / sinc(pi / 2) at the edge.
    assert_abs_diff_eq!(
        gcf.data[(0, 0, 16, 0)],
        std::f64::consts::FRAC_PI_2,
        epsilon = 1e-12
    );
}

#[test]
fn test_w_beam() {
    let screen = w_beam(16, (0.1, 0.1), 0.0);
    assert!(screen.iter().all(|v| (*v - c64::new(1.0, 0.0)).norm() < 1e-12));

    let screen = w_beam(16, (0.1, 0.1), 100.0);
    // No phase at the centre, unit amplitude everywhere.
    assert_abs_diff_eq!(screen[(8, 8)].re, 1.0);
    assert!(screen.iter().all(|v| (v.norm() - 1.0).abs() < 1e-12));
    // Phase -2 pi w (n - 1) at a corner.
    let (l, m) = (-0.05, -0.05);
    let n: f64 = (1.0_f64 - l * l - m * m).sqrt();
    let expected = c64::cis(-std::f64::consts::TAU * 100.0 * (n - 1.0));
    assert_abs_diff_eq!(screen[(0, 0)].re, expected.re, epsilon = 1e-10);
    assert_abs_diff_eq!(screen[(0, 0)].im, expected.im, epsilon = 1e-10);

    // Beyond the celestial sphere.
    let screen = w_beam(8, (4.0, 4.0), 1.0);
    assert_eq!(screen[(0, 0)], c64::default());
}

#[test]
fn test_wprojection_kernel() {
    let image = image(64, 0.001);
    let (kernel, gcf) = create_convolution_function(&image, &wproj_params(5, 200.0, 6), None).unwrap();
    assert_eq!(kernel.shape(), (1, 5, 1, 4, 4, 12, 12));
    assert_eq!(kernel.w_planes(), &[-400.0, -200.0, 0.0, 200.0, 400.0]);
    assert_eq!(kernel.w_step(), Some(200.0));
    assert_eq!(kernel.image_shape(), [64, 64]);
    assert_abs_diff_eq!(kernel.cell()[1], 0.001);
    assert_eq!(gcf.data.dim(), (1, 1, 64, 64));

    // Each slice is normalised at zero offset.
    for w in 0..5 {
        let sum = kernel.slice(0, w, 0).data.slice(s![0, 0, .., ..]).sum();
        assert_abs_diff_eq!(sum.norm(), 1.0, epsilon = 1e-10);
    }
    // The zero-w kernel is (almost) real.
    let sum = kernel.slice(0, 2, 0).data.slice(s![0, 0, .., ..]).sum();
    assert_abs_diff_eq!(sum.re, 1.0, epsilon = 1e-3);

    // Large w spreads the kernel out, lowering its peak.
    let peak = |w: usize| {
        kernel
            .slice(0, w, 0)
            .data
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.norm()))
    };
    assert!(peak(4) < peak(2));
    assert!(peak(0) < peak(2));

    // Nearest-plane lookups.
    assert_eq!(kernel.nearest_w_plane(0.0), Some(2));
    assert_eq!(kernel.nearest_w_plane(280.0), Some(3));
    assert_eq!(kernel.nearest_w_plane(-499.0), Some(0));
    assert_eq!(kernel.nearest_w_plane(510.0), None);
    assert_eq!(kernel.w_range(), (-500.0, 500.0));

    // The grid correction is 1-ish at the centre.
    assert_abs_diff_eq!(gcf.data[(0, 0, 32, 32)], 1.0, epsilon = 0.05);
}

#[test]
fn test_a_terms() {
    let image = image(32, 0.001);
    let params = wproj_params(3, 10.0, 3);
    let (plain, _) = create_convolution_function(&image, &params, None).unwrap();

    // A flat beam only changes the normalisation, which is undone.
    let mut beam = image.empty_like();
    beam.data.fill(2.0);
    let (flat, _) = create_convolution_function(&image, &params, Some(std::slice::from_ref(&beam))).unwrap();
    assert_eq!(flat.num_a_terms(), 1);
    for w in 0..3 {
        for (a, b) in plain
            .slice(0, w, 0)
            .data
            .iter()
            .zip(flat.slice(0, w, 0).data.iter())
        {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    // One a-term for a single-plane kernel still goes through the full
    // builder, and accepts any w.
    let single = KernelParams {
        w_planes: 1,
        w_step: None,
        ..params
    };
    let (k, _) = create_convolution_function(&image, &single, Some(std::slice::from_ref(&beam))).unwrap();
    assert_eq!(k.shape(), (1, 1, 1, 4, 4, 6, 6));
    assert_eq!(k.nearest_w_plane(1e6), Some(0));

    // Two a-terms for a one-channel image.
    assert!(matches!(
        create_convolution_function(&image, &params, Some(&[beam.clone(), beam.clone()][..])),
        Err(ConvolutionError::BadATermCount { got: 2, nchan: 1 })
    ));
    // Wrong shape.
    let small = beam.slice_region(0, 0, 16, 16).unwrap();
    assert!(matches!(
        create_convolution_function(&image, &params, Some(&[small][..])),
        Err(ConvolutionError::ATermShape { .. })
    ));
}

#[test]
fn test_bad_kernel_params() {
    let image = image(64, 0.001);
    let check = |params: KernelParams| create_convolution_function(&image, &params, None);

    assert!(matches!(
        check(KernelParams {
            w_planes: 0,
            ..Default::default()
        }),
        Err(ConvolutionError::NoWPlanes)
    ));
    assert!(matches!(
        check(KernelParams {
            w_planes: 3,
            w_step: None,
            ..Default::default()
        }),
        Err(ConvolutionError::NoWStep)
    ));
    assert!(matches!(
        check(wproj_params(3, -5.0, 3)),
        Err(ConvolutionError::BadWStep(_))
    ));
    assert!(matches!(
        check(wproj_params(3, 0.0, 3)),
        Err(ConvolutionError::BadWStep(_))
    ));
    assert!(matches!(
        check(KernelParams {
            oversampling: 0,
            ..Default::default()
        }),
        Err(ConvolutionError::ZeroOversampling)
    ));
    assert!(matches!(
        check(KernelParams {
            support: 0,
            ..Default::default()
        }),
        Err(ConvolutionError::ZeroSupport)
    ));
    assert!(matches!(
        check(KernelParams {
            support: 32,
            ..Default::default()
        }),
        Err(ConvolutionError::SupportTooLarge { .. })
    ));

    // A field of view that doesn't fit on the sky.
    let huge = self::image(64, 0.05);
    assert!(matches!(
        create_convolution_function(&huge, &KernelParams::default(), None),
        Err(ConvolutionError::Wcs(_))
    ));
}

#[test]
fn test_clip_zero_is_identity() {
    let image = image(64, 0.001);
    let (kernel, _) = create_convolution_function(&image, &wproj_params(3, 100.0, 4), None).unwrap();
    let clipped = clip_convolution_function(&kernel, 0.0).unwrap();
    assert_eq!(clipped.shape(), kernel.shape());
    for (a, b) in kernel.slices.iter().zip(clipped.slices.iter()) {
        assert_eq!(a.centre, b.centre);
        assert_eq!(a.data, b.data);
    }
}

#[test]
fn test_clip_is_monotonic() {
    let image = image(64, 0.001);
    let (kernel, _) = anti_aliasing_function(&image, 8, 3).unwrap();

    let clipped = clip_convolution_function(&kernel, 0.2).unwrap();
    let slice = clipped.slice(0, 0, 0);
    assert_eq!(slice.taps(), (4, 4));
    assert_eq!(slice.centre, [1, 1]);
    // The input is untouched.
    assert_eq!(kernel.slice(0, 0, 0).taps(), (6, 6));

    let (kernel, _) = create_convolution_function(&image, &wproj_params(3, 300.0, 6), None).unwrap();
    let levels = [0.0, 0.01, 0.05, 0.1, 0.3, 0.6, 0.9, 1.0];
    let clipped: Vec<ConvolutionFunction> = levels
        .iter()
        .map(|&l| clip_convolution_function(&kernel, l).unwrap())
        .collect();
    for pair in clipped.windows(2) {
        for (loose, tight) in pair[0].slices.iter().zip(pair[1].slices.iter()) {
            let (ly, lx) = loose.taps();
            let (ty, tx) = tight.taps();
            assert!(ty <= ly && tx <= lx);
            // The tight box sits inside the loose one.
            let trim_y = (ly - ty) / 2;
            let trim_x = (lx - tx) / 2;
            assert_eq!(tight.centre, [loose.centre[0] - trim_y, loose.centre[1] - trim_x]);
            assert_eq!(
                tight.data,
                loose
                    .data
                    .slice(s![.., .., trim_y..ly - trim_y, trim_x..lx - trim_x])
            );
        }
    }
    // Every slice keeps at least its peak.
    for slice in &clipped.last().unwrap().slices {
        let (ty, tx) = slice.taps();
        assert!(ty >= 1 && tx >= 1);
    }
}

#[test]
fn test_clip_errors() {
    let image = image(64, 0.001);
    let (kernel, _) = anti_aliasing_function(&image, 4, 3).unwrap();
    assert!(matches!(
        clip_convolution_function(&kernel, 1.5),
        Err(ClippingError::TooAggressive { .. })
    ));
    assert!(matches!(
        clip_convolution_function(&kernel, -0.1),
        Err(ClippingError::BadLevel(_))
    ));
    assert!(matches!(
        clip_convolution_function(&kernel, f64::NAN),
        Err(ClippingError::BadLevel(_))
    ));

    let mut zero = kernel.clone();
    zero.slices[0].data.fill(c64::default());
    assert!(matches!(
        clip_convolution_function(&zero, 0.1),
        Err(ClippingError::ZeroPeak { pol: 0, w: 0, a: 0 })
    ));
}
