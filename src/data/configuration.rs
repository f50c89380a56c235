// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Simulated observations from an array configuration.

use log::debug;
use marlu::{c64, pos::xyz::xyzs_to_cross_uvws, RADec, XyzGeodetic};
use ndarray::prelude::*;
use serde::Serialize;
use vec1::Vec1;

use super::{DataError, PolarisationFrame, Visibilities};
use crate::constants::{TAU, VEL_C};

/// Seconds per radian of hour angle (ignoring the sidereal/solar difference).
const SECONDS_PER_RADIAN: f64 = 86400.0 / TAU;

/// The antenna positions of an interferometer.
#[derive(Debug, Clone)]
pub struct ArrayConfiguration {
    pub name: String,

    /// Geodetic XYZ positions \[metres\].
    pub antennas: Vec<XyzGeodetic>,
}

impl ArrayConfiguration {
    pub fn num_antennas(&self) -> usize {
        self.antennas.len()
    }

    pub fn num_baselines(&self) -> usize {
        let n = self.antennas.len();
        n * n.saturating_sub(1) / 2
    }

    /// The longest baseline \[metres\].
    pub fn max_baseline(&self) -> f64 {
        let mut rmax: f64 = 0.0;
        for (i, a) in self.antennas.iter().enumerate() {
            for b in &self.antennas[i + 1..] {
                let (dx, dy, dz) = (a.x - b.x, a.y - b.y, a.z - b.z);
                rmax = rmax.max((dx * dx + dy * dy + dz * dz).sqrt());
            }
        }
        rmax
    }
}

/// What to observe with an [`ArrayConfiguration`].
#[derive(Debug, Clone)]
pub struct ObservationConfig {
    pub phase_centre: RADec,

    /// Hour angles of the phase centre at each time sample \[radians\].
    pub hour_angles: Vec1<f64>,

    /// \[Hz\]
    pub frequencies: Vec1<f64>,

    /// One per frequency \[Hz\].
    pub channel_bandwidths: Vec1<f64>,

    /// \[seconds\]
    pub integration_time: f64,

    pub polarisation_frame: PolarisationFrame,

    /// The natural weight given to every visibility.
    pub weight: f64,
}

/// The metadata of a simulated observation.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationDescriptor {
    pub name: String,
    pub phase_centre_ra_deg: f64,
    pub phase_centre_dec_deg: f64,
    pub times: Vec<f64>,
    pub frequencies: Vec<f64>,
    pub channel_bandwidths: Vec<f64>,
    pub num_antennas: usize,
    pub num_baselines: usize,
    pub num_pols: usize,
    pub num_receptors: usize,
    /// \[metres\]
    pub max_baseline: f64,
    pub polarisation_frame: String,
}

impl ObservationConfig {
    pub fn describe(&self, config: &ArrayConfiguration) -> ConfigurationDescriptor {
        let npol = self.polarisation_frame.npol();
        ConfigurationDescriptor {
            name: config.name.clone(),
            phase_centre_ra_deg: self.phase_centre.ra.to_degrees(),
            phase_centre_dec_deg: self.phase_centre.dec.to_degrees(),
            times: self
                .hour_angles
                .iter()
                .map(|ha| ha * SECONDS_PER_RADIAN)
                .collect(),
            frequencies: self.frequencies.to_vec(),
            channel_bandwidths: self.channel_bandwidths.to_vec(),
            num_antennas: config.num_antennas(),
            num_baselines: config.num_baselines(),
            num_pols: npol,
            num_receptors: if npol == 1 { 1 } else { 2 },
            max_baseline: config.max_baseline(),
            polarisation_frame: self.polarisation_frame.to_string(),
        }
    }
}

/// Create zero-valued visibilities for every cross-correlation baseline of
/// `config`, at every hour angle and frequency of `obs`. Records are ordered by
/// time, then baseline, then frequency.
pub fn create_visibility(
    config: &ArrayConfiguration,
    obs: &ObservationConfig,
) -> Result<Visibilities, DataError> {
    if config.antennas.len() < 2 {
        return Err(DataError::NoBaselines);
    }
    if obs.channel_bandwidths.len() != obs.frequencies.len() {
        return Err(DataError::VisShape {
            what: "channel_bandwidths",
            expected: obs.frequencies.len(),
            got: obs.channel_bandwidths.len(),
        });
    }

    let nbl = config.num_baselines();
    let nfreq = obs.frequencies.len();
    let nrows = obs.hour_angles.len() * nbl * nfreq;
    let npol = obs.polarisation_frame.npol();
    debug!(
        "Creating {nrows} visibilities for '{}' ({} antennas, {nbl} baselines, {} times, {nfreq} frequencies)",
        config.name,
        config.antennas.len(),
        obs.hour_angles.len()
    );

    let baselines: Vec<(usize, usize)> = (0..config.antennas.len())
        .flat_map(|i| (i + 1..config.antennas.len()).map(move |j| (i, j)))
        .collect();

    let mut uvw = Vec::with_capacity(nrows);
    let mut time = Vec::with_capacity(nrows);
    let mut frequency = Vec::with_capacity(nrows);
    let mut channel_bandwidth = Vec::with_capacity(nrows);
    let mut antenna1 = Vec::with_capacity(nrows);
    let mut antenna2 = Vec::with_capacity(nrows);
    for &ha in obs.hour_angles.iter() {
        let lst = obs.phase_centre.ra + ha;
        let uvws_m = xyzs_to_cross_uvws(&config.antennas, obs.phase_centre.to_hadec(lst));
        for (&uvw_m, &(a1, a2)) in uvws_m.iter().zip(baselines.iter()) {
            for (&freq, &bw) in obs.frequencies.iter().zip(obs.channel_bandwidths.iter()) {
                uvw.push(uvw_m * freq / VEL_C);
                time.push(ha * SECONDS_PER_RADIAN);
                frequency.push(freq);
                channel_bandwidth.push(bw);
                antenna1.push(a1);
                antenna2.push(a2);
            }
        }
    }

    Ok(Visibilities {
        uvw,
        time,
        frequency,
        channel_bandwidth,
        integration_time: vec![obs.integration_time; nrows],
        antenna1,
        antenna2,
        vis: Array2::from_elem((nrows, npol), c64::default()),
        weight: Array2::from_elem((nrows, npol), obs.weight),
        imaging_weight: Array2::from_elem((nrows, npol), obs.weight),
        phase_centre: obs.phase_centre,
        polarisation_frame: obs.polarisation_frame,
    })
}
