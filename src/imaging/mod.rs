// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The predict and invert engines.

Both engines split their work with a [`Decomposition`], run every unit on a
[`Scheduler`] and then reduce the units' results in unit order. Everything
that can be checked about a request is checked before any unit is dispatched.
 */

mod base;
mod timeslice;

use std::{collections::BTreeMap, time::Instant};

use log::{debug, trace};
use marlu::c64;
use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_OVERSAMPLING, DEFAULT_SUPPORT},
    context::{Decomposition, DecompositionUnit},
    convolution::{create_convolution_function, ConvolutionFunction, KernelParams},
    data::{DataError, Image, SkyComponent, Visibilities},
    gridding::{check_coverage, GriddingError},
    scheduler::{Scheduler, TaskGraph},
    ImagingError,
};
use base::{invert_2d_unit, predict_2d_unit};

/// How to build the single-plane kernel used by every context other than
/// w-projection, which carries its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GriddingOptions {
    pub oversampling: usize,
    pub support: usize,
    pub use_anti_aliasing: bool,
}

impl Default for GriddingOptions {
    fn default() -> Self {
        Self {
            oversampling: DEFAULT_OVERSAMPLING,
            support: DEFAULT_SUPPORT,
            use_anti_aliasing: true,
        }
    }
}

impl GriddingOptions {
    fn kernel_params(&self) -> KernelParams {
        KernelParams {
            w_planes: 1,
            w_step: None,
            oversampling: self.oversampling,
            support: self.support,
            use_anti_aliasing: self.use_anti_aliasing,
        }
    }
}

fn check_pols(vis: &Visibilities, image: &Image) -> Result<(), ImagingError> {
    if vis.npol() != image.npol() {
        return Err(GriddingError::PolMismatch {
            vis: vis.npol(),
            grid: image.npol(),
        }
        .into());
    }
    Ok(())
}

/// The (ny, nx) of the images the units work on.
fn unit_shape(units: &[DecompositionUnit], image: &Image) -> (usize, usize) {
    units
        .iter()
        .find_map(|u| u.kind.region().map(|(_, _, nx, ny)| (ny, nx)))
        .unwrap_or((image.ny(), image.nx()))
}

/// The kernel shared by every unit. Unless the decomposition brings its own,
/// it is built for a unit-sized image centred on the phase centre, and every
/// visibility is checked to land on the grid with it.
fn unit_kernel<'a>(
    decomposition: &'a Decomposition,
    vis: &Visibilities,
    image: &Image,
    (ny, nx): (usize, usize),
    options: &GriddingOptions,
    built: &'a mut Option<ConvolutionFunction>,
) -> Result<&'a ConvolutionFunction, ImagingError> {
    if let Some(kernel) = decomposition.kernel() {
        return Ok(kernel);
    }
    let unit_image = Image::zeros(
        image.nchan(),
        ny,
        nx,
        image.wcs.recentred(nx, ny),
        image.polarisation_frame,
    )?;
    let (kernel, _) = create_convolution_function(&unit_image, &options.kernel_params(), None)?;
    check_coverage(vis, &unit_image.wcs, (image.nchan(), ny, nx), Some(&kernel))?;
    Ok(built.insert(kernel))
}

/// Predict visibilities for the geometry of `vis` from `model`. The returned
/// set is a copy of `vis` with only its values replaced.
pub fn predict(
    scheduler: &Scheduler,
    decomposition: &Decomposition,
    vis: &Visibilities,
    model: &Image,
    options: &GriddingOptions,
) -> Result<Visibilities, ImagingError> {
    vis.check()?;
    check_pols(vis, model)?;
    let units = decomposition.units(vis, model)?;
    let mut built = None;
    let kernel = unit_kernel(
        decomposition,
        vis,
        model,
        unit_shape(&units, model),
        options,
        &mut built,
    )?;
    debug!(
        "Predicting {} visibilities from a {}x{} model with {} unit(s)",
        vis.len(),
        model.nx(),
        model.ny(),
        units.len()
    );

    let start = Instant::now();
    let shared_vis = scheduler.scatter(vis);
    let shared_model = scheduler.scatter(model);
    let shared_kernel = scheduler.scatter(kernel);
    let mut graph = TaskGraph::new();
    for unit in &units {
        let (vis, model, kernel) = (
            shared_vis.clone(),
            shared_model.clone(),
            shared_kernel.clone(),
        );
        graph.submit(unit.to_string(), move || {
            let unit_vis = unit.visibilities(&vis);
            if unit_vis.is_empty() {
                return Ok(None);
            }
            match unit.kind.region() {
                Some((x0, y0, nx, ny)) => {
                    let region = model.slice_region(x0, y0, nx, ny)?;
                    predict_2d_unit(&unit_vis, &region, &kernel, &unit.kind)
                }
                None => predict_2d_unit(&unit_vis, &model, &kernel, &unit.kind),
            }
        });
    }
    let results = scheduler.await_all(graph)?;

    // Facets all predict every visibility and are summed; slices are
    // scattered back to their rows.
    let mut predicted = Array2::<c64>::zeros(vis.vis.dim());
    for (unit, values) in units.iter().zip(results) {
        let Some(values) = values else { continue };
        match &unit.vis_indices {
            None => predicted += &values,
            Some(indices) => {
                for (row, &i) in values.outer_iter().zip(indices) {
                    let mut out = predicted.row_mut(i);
                    out += &row;
                }
            }
        }
    }
    trace!("Predict took {:?}", start.elapsed());
    Ok(vis.with_vis(predicted)?)
}

/// Make the dirty image (or, with `dopsf`, the point-spread function) of `vis`
/// on the pixels of `template`, along with the sum of imaging weights of each
/// (pol, chan) plane. With `normalize`, each plane is divided by its sum of
/// weights (when that is positive).
pub fn invert(
    scheduler: &Scheduler,
    decomposition: &Decomposition,
    vis: &Visibilities,
    template: &Image,
    options: &GriddingOptions,
    dopsf: bool,
    normalize: bool,
) -> Result<(Image, Array2<f64>), ImagingError> {
    vis.check()?;
    check_pols(vis, template)?;
    let units = decomposition.units(vis, template)?;
    let mut built = None;
    let kernel = unit_kernel(
        decomposition,
        vis,
        template,
        unit_shape(&units, template),
        options,
        &mut built,
    )?;
    debug!(
        "Inverting {} visibilities onto a {}x{} image with {} unit(s){}",
        vis.len(),
        template.nx(),
        template.ny(),
        units.len(),
        if dopsf { " (PSF)" } else { "" }
    );

    let start = Instant::now();
    let shared_vis = scheduler.scatter(vis);
    let shared_template = scheduler.scatter(template);
    let shared_kernel = scheduler.scatter(kernel);
    let mut graph = TaskGraph::new();
    for unit in &units {
        let (vis, template, kernel) = (
            shared_vis.clone(),
            shared_template.clone(),
            shared_kernel.clone(),
        );
        graph.submit(unit.to_string(), move || {
            let unit_vis = unit.visibilities(&vis);
            if unit_vis.is_empty() {
                return Ok(None);
            }
            match unit.kind.region() {
                Some((x0, y0, nx, ny)) => {
                    let region = template.slice_region(x0, y0, nx, ny)?;
                    invert_2d_unit(&unit_vis, &region, &kernel, &unit.kind, dopsf)
                }
                None => invert_2d_unit(&unit_vis, &template, &kernel, &unit.kind, dopsf),
            }
        });
    }
    let results = scheduler.await_all(graph)?;

    let mut image = template.empty_like();
    let mut sumwt = Array2::<f64>::zeros((template.npol(), template.nchan()));
    // Every facet sees every visibility, so the weights of a facet's units
    // are summed and the facets' totals aren't.
    let mut facet_sumwt: BTreeMap<(usize, usize), Array2<f64>> = BTreeMap::new();
    for (unit, result) in units.iter().zip(results) {
        let Some((unit_image, unit_sumwt)) = result else { continue };
        match unit.kind.region() {
            Some((x0, y0, ..)) => {
                image.add_region(&unit_image, x0, y0)?;
                *facet_sumwt
                    .entry((x0, y0))
                    .or_insert_with(|| Array2::zeros(unit_sumwt.dim())) += &unit_sumwt;
            }
            None => {
                image.add(&unit_image)?;
                sumwt += &unit_sumwt;
            }
        }
    }
    for facet in facet_sumwt.values() {
        sumwt.zip_mut_with(facet, |s, &f| *s = s.max(f));
    }

    if normalize {
        normalize_by_sumwt(&mut image, sumwt.view());
    }
    trace!("Invert took {:?}", start.elapsed());
    Ok((image, sumwt))
}

fn normalize_by_sumwt(image: &mut Image, sumwt: ArrayView2<f64>) {
    for ((pol, chan), &wt) in sumwt.indexed_iter() {
        if wt > 0.0 {
            image
                .data
                .slice_mut(s![pol, chan, .., ..])
                .mapv_inplace(|v| v / wt);
        }
    }
}

/// Predict visibilities from point sources by direct evaluation of the
/// measurement equation. No gridding is involved, so this is exact.
pub fn predict_skycomponent(
    vis: &Visibilities,
    comps: &[SkyComponent],
) -> Result<Visibilities, ImagingError> {
    vis.check()?;
    for comp in comps {
        if comp.polarisation_frame.npol() != vis.npol() {
            return Err(DataError::VisShape {
                what: "component polarisation axis",
                expected: vis.npol(),
                got: comp.polarisation_frame.npol(),
            }
            .into());
        }
    }

    let lmns: Vec<_> = comps
        .iter()
        .map(|comp| comp.direction.to_lmn(vis.phase_centre).prepare_for_rime())
        .collect();
    let mut values = Array2::<c64>::zeros(vis.vis.dim());
    values
        .outer_iter_mut()
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let uvw = vis.uvw[i];
            let freq = vis.frequency[i];
            for (comp, lmn) in comps.iter().zip(&lmns) {
                let phase = c64::cis(-(uvw.u * lmn.l + uvw.v * lmn.m + uvw.w * lmn.n));
                row.iter_mut()
                    .zip(comp.flux_at(freq))
                    .for_each(|(v, &flux)| *v += phase * flux);
            }
        });
    debug!(
        "Predicted {} components onto {} visibilities",
        comps.len(),
        vis.len()
    );
    Ok(vis.with_vis(values)?)
}

/// `vis` with the values of `model_vis` subtracted.
pub fn subtract_visibility(
    vis: &Visibilities,
    model_vis: &Visibilities,
) -> Result<Visibilities, ImagingError> {
    if model_vis.vis.dim() != vis.vis.dim() {
        return Err(DataError::VisShape {
            what: "model vis",
            expected: vis.vis.len(),
            got: model_vis.vis.len(),
        }
        .into());
    }
    Ok(vis.with_vis(&vis.vis - &model_vis.vis)?)
}

/// Predict `model`, subtract it from `vis` and invert the result onto the
/// model's pixels. Returns the residual visibilities, the normalised residual
/// image and its sum of weights.
pub fn residual(
    scheduler: &Scheduler,
    decomposition: &Decomposition,
    vis: &Visibilities,
    model: &Image,
    options: &GriddingOptions,
) -> Result<(Visibilities, Image, Array2<f64>), ImagingError> {
    let model_vis = predict(scheduler, decomposition, vis, model, options)?;
    let residual_vis = subtract_visibility(vis, &model_vis)?;
    let (image, sumwt) = invert(
        scheduler,
        decomposition,
        &residual_vis,
        model,
        options,
        false,
        true,
    )?;
    Ok((residual_vis, image, sumwt))
}
