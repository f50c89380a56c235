// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use approx::assert_abs_diff_eq;

use super::*;
use crate::{
    convolution::{create_convolution_function, KernelParams},
    tests::{test_image, test_vis_coplanar, test_vis_snapshot},
};

#[test]
fn test_parse_contexts() {
    assert_eq!(ImagingContext::parse("2d").unwrap(), ImagingContext::TwoD);
    assert_eq!(
        ImagingContext::parse("wprojection").unwrap(),
        ImagingContext::WProjection
    );
    assert_eq!(ImagingContext::WStack.to_string(), "wstack");
    assert_eq!(
        ImagingContext::parse("facets_wstack").unwrap(),
        ImagingContext::FacetsWStack
    );
    let e = ImagingContext::parse("bogus").unwrap_err();
    assert!(matches!(&e, ContextError::Unsupported(tag) if tag == "bogus"));
    assert!(e.to_string().contains("timeslice"));
}

#[test]
fn test_new_decomposition() {
    assert!(matches!(
        Decomposition::new(ImagingContext::Facets, 0, 1, None),
        Err(ContextError::ZeroFacets)
    ));
    assert!(matches!(
        Decomposition::new(ImagingContext::Timeslice, 1, 0, None),
        Err(ContextError::ZeroSlices)
    ));
    assert!(matches!(
        Decomposition::new(ImagingContext::WStack, 1, 0, None),
        Err(ContextError::ZeroSlices)
    ));
    assert!(matches!(
        Decomposition::new(ImagingContext::FacetsWStack, 0, 2, None),
        Err(ContextError::ZeroFacets)
    ));
    assert!(matches!(
        Decomposition::new(ImagingContext::FacetsWStack, 2, 0, None),
        Err(ContextError::ZeroSlices)
    ));
    assert!(matches!(
        Decomposition::new(ImagingContext::WProjection, 1, 1, None),
        Err(ContextError::MissingKernel)
    ));
    // w-stacking doesn't need a kernel.
    let d = Decomposition::new(ImagingContext::WStack, 1, 2, None).unwrap();
    assert!(d.kernel().is_none());
    // Unused parameters don't matter.
    let d = Decomposition::new(ImagingContext::TwoD, 0, 0, None).unwrap();
    assert_eq!(d.context(), ImagingContext::TwoD);
    assert!(d.kernel().is_none());
}

#[test]
fn test_facet_units() {
    let vis = test_vis_coplanar();
    let image = test_image(&vis, 64);
    let units = Decomposition::Facets { facets: 4 }.units(&vis, &image).unwrap();
    assert_eq!(units.len(), 16);
    for (i, unit) in units.iter().enumerate() {
        assert_eq!(unit.index, i);
        assert!(unit.vis_indices.is_none());
        assert_eq!(unit.num_vis(&vis), vis.len());
    }
    assert_eq!(
        units[6].kind,
        UnitKind::Facet {
            x0: 32,
            y0: 16,
            nx: 16,
            ny: 16
        }
    );
    assert_eq!(units[6].to_string(), "facet 6 (16x16 at x=32, y=16)");

    assert!(matches!(
        Decomposition::Facets { facets: 3 }.units(&vis, &image),
        Err(ContextError::FacetsDontDivide {
            facets: 3,
            nx: 64,
            ny: 64
        })
    ));
}

#[test]
fn test_time_slices() {
    let vis = test_vis_snapshot();
    let image = test_image(&vis, 64);
    let units = Decomposition::Timeslice { vis_slices: 2 }
        .units(&vis, &image)
        .unwrap();
    assert_eq!(units.len(), 2);
    let nbl = vis.len() / 5;
    // Five times split three and two.
    assert_eq!(units[0].num_vis(&vis), 3 * nbl);
    assert_eq!(units[1].num_vis(&vis), 2 * nbl);
    let times = vis.unique_times();
    assert_eq!(
        units[1].kind,
        UnitKind::TimeSlice {
            start: times[3],
            end: times[4]
        }
    );
    let slice = units[1].visibilities(&vis);
    assert!(slice.time.iter().all(|&t| t >= times[3]));

    // One slice per time is fine, more isn't.
    assert_eq!(
        Decomposition::Timeslice { vis_slices: 5 }
            .units(&vis, &image)
            .unwrap()
            .len(),
        5
    );
    assert!(matches!(
        Decomposition::Timeslice { vis_slices: 6 }.units(&vis, &image),
        Err(ContextError::TooManySlices {
            slices: 6,
            available: 5,
            ..
        })
    ));
}

#[test]
fn test_w_slices() {
    let vis = test_vis_snapshot();
    let image = test_image(&vis, 64);
    let units = Decomposition::WStack {
        vis_slices: 4,
        kernel: None,
    }
    .units(&vis, &image)
    .unwrap();
    assert!(!units.is_empty() && units.len() <= 4);

    // Every visibility is in exactly one unit.
    let mut seen = vec![0; vis.len()];
    for (i, unit) in units.iter().enumerate() {
        assert_eq!(unit.index, i);
        let indices = unit.vis_indices.as_ref().unwrap();
        for &j in indices {
            seen[j] += 1;
        }
        match unit.kind {
            UnitKind::WSlice {
                w_min,
                w_max,
                w_mean,
            } => {
                assert!(w_min <= w_mean && w_mean <= w_max);
                for &j in indices {
                    assert!(vis.uvw[j].w >= w_min - 1e-9 && vis.uvw[j].w <= w_max + 1e-9);
                }
            }
            _ => panic!("expected a w slice"),
        }
    }
    assert!(seen.iter().all(|&n| n == 1));
}

#[test]
fn test_empty_w_slices_are_dropped() {
    let mut vis = test_vis_coplanar().select(&[0, 1, 2]);
    vis.uvw[0].w = 0.0;
    vis.uvw[1].w = 0.0;
    vis.uvw[2].w = 9.0;
    let image = test_image(&vis, 64);
    let units = Decomposition::WStack {
        vis_slices: 3,
        kernel: None,
    }
    .units(&vis, &image)
    .unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].vis_indices, Some(vec![0, 1]));
    assert_eq!(units[1].vis_indices, Some(vec![2]));
    assert_eq!(units[1].index, 1);
    match units[1].kind {
        UnitKind::WSlice { w_min, w_max, w_mean } => {
            assert_abs_diff_eq!(w_min, 6.0);
            assert_abs_diff_eq!(w_max, 9.0);
            assert_abs_diff_eq!(w_mean, 9.0);
        }
        _ => panic!("expected a w slice"),
    }

    // All the same w.
    vis.uvw[2].w = 0.0;
    let units = Decomposition::WStack {
        vis_slices: 3,
        kernel: None,
    }
    .units(&vis, &image)
    .unwrap();
    assert_eq!(units.len(), 1);

    assert!(matches!(
        Decomposition::WStack {
            vis_slices: 4,
            kernel: None,
        }
        .units(&vis, &image),
        Err(ContextError::TooManySlices { available: 3, .. })
    ));
}

#[test]
fn test_wprojection_units() {
    let mut vis = test_vis_coplanar();
    let image = test_image(&vis, 64);
    let params = KernelParams {
        w_planes: 5,
        w_step: Some(4.0),
        oversampling: 4,
        support: 3,
        use_anti_aliasing: true,
    };
    let (kernel, _) = create_convolution_function(&image, &params, None).unwrap();
    let d = Decomposition::new(ImagingContext::WProjection, 1, 1, Some(Arc::new(kernel))).unwrap();
    assert_eq!(d.kernel().unwrap().w_planes().len(), 5);
    let units = d.units(&vis, &image).unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].kind, UnitKind::Whole);

    // Beyond the kernel's w planes.
    vis.uvw[10].w = -12.0;
    assert!(matches!(
        d.units(&vis, &image),
        Err(ContextError::WNotCovered { .. })
    ));
    vis.uvw[10].w = 0.0;

    // A kernel for another cell size.
    let other = crate::data::create_image_from_visibility(&vis, 64, Some(0.0005), true).unwrap();
    assert!(matches!(
        d.units(&vis, &other),
        Err(ContextError::KernelCell { .. })
    ));

    // A kernel for another image size.
    let other = test_image(&vis, 128);
    assert!(matches!(
        d.units(&vis, &other),
        Err(ContextError::Gridding(_))
    ));
}

#[test]
fn test_facet_w_slice_units() {
    let vis = test_vis_snapshot();
    let image = test_image(&vis, 64);
    let w_units = Decomposition::WStack {
        vis_slices: 3,
        kernel: None,
    }
    .units(&vis, &image)
    .unwrap();
    let units = Decomposition::FacetsWStack {
        facets: 2,
        vis_slices: 3,
    }
    .units(&vis, &image)
    .unwrap();
    assert_eq!(units.len(), 4 * w_units.len());

    // Facets vary slowest; each facet gets every w slice.
    for (i, unit) in units.iter().enumerate() {
        assert_eq!(unit.index, i);
        let slice = &w_units[i % w_units.len()];
        assert_eq!(unit.vis_indices, slice.vis_indices);
        assert_eq!(unit.kind.w_mean(), slice.kind.w_mean());
    }
    assert_eq!(units[0].kind.region(), Some((0, 0, 32, 32)));
    assert_eq!(
        units[w_units.len()].kind.region(),
        Some((32, 0, 32, 32))
    );
    assert_eq!(units.last().unwrap().kind.region(), Some((32, 32, 32, 32)));
    assert!(units[0].to_string().starts_with("facet w slice 0 (32x32 at x=0, y=0, w "));

    assert!(matches!(
        Decomposition::FacetsWStack {
            facets: 3,
            vis_slices: 3
        }
        .units(&vis, &image),
        Err(ContextError::FacetsDontDivide { facets: 3, .. })
    ));
}

#[test]
fn test_w_stack_kernel_covers_residual_w() {
    let vis = test_vis_snapshot();
    let image = test_image(&vis, 64);
    let max_w = vis.max_abs_w();
    assert!(max_w > 1.0);

    // A kernel spanning a quarter of the full w range can only cover the w
    // left over within each of several slices.
    let w_step = max_w / 8.0;
    let params = KernelParams {
        w_planes: 5,
        w_step: Some(w_step),
        oversampling: 4,
        support: 3,
        use_anti_aliasing: true,
    };
    let (kernel, _) = create_convolution_function(&image, &params, None).unwrap();
    let kernel = Arc::new(kernel);

    let d = Decomposition::new(ImagingContext::WStack, 1, 8, Some(kernel.clone())).unwrap();
    assert_eq!(d.kernel().unwrap().w_planes().len(), 5);
    let units = d.units(&vis, &image).unwrap();
    for unit in &units {
        let w_mean = unit.kind.w_mean().unwrap();
        let residual = unit.visibilities(&vis).w_relative_to(w_mean);
        assert!(residual.max_abs_w() <= 2.0 * w_step + 1e-9);
    }

    // One slice leaves all of w to the kernel.
    let d = Decomposition::new(ImagingContext::WStack, 1, 1, Some(kernel)).unwrap();
    assert!(matches!(
        d.units(&vis, &image),
        Err(ContextError::WNotCovered { .. })
    ));
}
