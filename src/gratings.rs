//! Diffraction of a GSM beam through one or two gratings
//!
//! Closed-form Gaussian-Schell-model propagation after McMorran & Cronin
//! (2008). Each propagator sums over pairs (one grating) or quadruples (two
//! gratings) of diffraction orders, drops terms whose coefficient falls
//! below `intensity_cutoff`, and accumulates the survivors into a
//! caller-owned intensity profile.

use log::{debug, warn};
use ndarray::{Array1, Array2, Zip};
use num_complex::Complex64;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use crate::beam::{beam_width, GsmBeam};
use crate::error::{GratingError, Result};
use crate::fourier::{sinc, FourierCoefficients, Grating, IdealSlit, TransmissionModel};
use crate::params::SimulationParameters;

/// Term counts and timing for one propagator call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PropagationStats {
    /// Order combinations visited.
    pub terms_evaluated: usize,
    /// Combinations that survived the cutoff and were accumulated.
    pub terms_included: usize,
    pub elapsed: Duration,
}

impl PropagationStats {
    pub fn terms_pruned(&self) -> usize {
        self.terms_evaluated - self.terms_included
    }
}

/// Surviving single-grating term for an order pair `(n1, n2)`.
struct FringeTerm {
    coefficient: f64,
    /// Transverse centre `n̄ λ z12 / d`.
    shift: f64,
    /// Fringe wavenumber `2π Δn / d · (1 - z12/r2)`.
    frequency: f64,
}

/// Surviving double-grating term for orders `(m1, m2, n1, n2)`.
struct MoireTerm {
    coefficient: Complex64,
    shift: f64,
    /// Slope of `argument_f` in x.
    frequency: f64,
    /// `argument_p`.
    phase: f64,
    /// y-axis part of `argument_d`.
    y_decay: f64,
    /// `exp(argument_v)`.
    coherence: f64,
}

/// Intensity propagators for an interferometer of up to two gratings.
///
/// Grating transmission follows the ideal-slit closed form unless gravity
/// or van der Waals corrections are enabled, in which case amplitudes are
/// drawn from the supplied [`TransmissionModel`].
pub struct Interferometer<'a> {
    params: &'a SimulationParameters,
    transmission: Option<&'a dyn TransmissionModel>,
}

impl<'a> Interferometer<'a> {
    pub fn new(params: &'a SimulationParameters) -> Self {
        Self {
            params,
            transmission: None,
        }
    }

    /// Attach a transmission model.
    ///
    /// The model is sampled at both grating positions and must return
    /// tables of exactly `number_of_rows_fourier_coefficient_array` entries.
    pub fn with_transmission(
        params: &'a SimulationParameters,
        transmission: &'a dyn TransmissionModel,
    ) -> Result<Self> {
        let expected = params.number_of_rows_fourier_coefficient_array;
        for (grating, z) in [
            (Grating::First, params.z_position_1st_grating),
            (Grating::Second, params.z_position_2nd_grating),
        ] {
            let actual = transmission.coefficients(params, grating, z).len();
            if actual != expected {
                return Err(GratingError::TableLength { expected, actual });
            }
        }
        Ok(Self {
            params,
            transmission: Some(transmission),
        })
    }

    pub fn params(&self) -> &SimulationParameters {
        self.params
    }

    /// Coefficient table for `grating`, or `None` on the ideal-slit path.
    fn table(&self, grating: Grating, z: f64) -> Option<FourierCoefficients> {
        if !self.params.uses_grating_corrections() {
            return None;
        }
        let expected = self.params.number_of_rows_fourier_coefficient_array;
        let table = match self.transmission {
            Some(model) => {
                let table = model.coefficients(self.params, grating, z);
                if table.len() == expected {
                    table
                } else {
                    warn!(
                        "{:?} grating table at z = {:.4} m has {} entries, expected {}; using ideal slits",
                        grating,
                        z,
                        table.len(),
                        expected
                    );
                    IdealSlit.coefficients(self.params, grating, z)
                }
            }
            None => {
                warn!("grating corrections enabled without a transmission model, using ideal slits");
                IdealSlit.coefficients(self.params, grating, z)
            }
        };
        Some(table)
    }

    fn check_lengths(&self, positions: &Array1<f64>, intensity: &Array1<f64>) {
        assert_eq!(positions.len(), self.params.resolution);
        assert_eq!(intensity.len(), self.params.resolution);
    }

    /// Source beam propagated to grating 1.
    pub fn beam_at_first_grating(&self) -> GsmBeam {
        self.params
            .initial_beam
            .propagate(self.params.z_position_1st_grating, self.params.wavelength)
    }

    /// Unperturbed beam profile `exp(-π (x/w(z))²)` at distance `z` from
    /// the source. Overwrites `intensity`.
    pub fn initial_intensity(
        &self,
        z: f64,
        positions: &Array1<f64>,
        intensity: &mut Array1<f64>,
    ) -> PropagationStats {
        let start = Instant::now();
        self.check_lengths(positions, intensity);

        let beam = &self.params.initial_beam;
        let w1 = beam_width(
            z,
            self.params.wavelength,
            beam.curvature_radius,
            beam.coherence_width,
            beam.width,
            beam.width,
        );

        Zip::from(intensity)
            .and(positions)
            .par_for_each(|out, &x| *out = (-PI * (x / w1).powi(2)).exp());

        let stats = PropagationStats {
            terms_evaluated: 1,
            terms_included: 1,
            elapsed: start.elapsed(),
        };
        debug!("initial intensity at z = {:.4} m in {:.3?}", z, stats.elapsed);
        stats
    }

    /// Profile at `z` downstream of grating 1 only.
    ///
    /// `beam` is the GSM state arriving at grating 1. Contributions are
    /// added to `intensity`, which the caller zeroes beforehand.
    pub fn intensity_after_first_grating(
        &self,
        z: f64,
        beam: &GsmBeam,
        positions: &Array1<f64>,
        intensity: &mut Array1<f64>,
    ) -> PropagationStats {
        let start = Instant::now();
        self.check_lengths(positions, intensity);

        let p = self.params;
        let lambda = p.wavelength;
        let d = p.grating_period;
        let f = p.grating1_open_fraction;
        let z12 = z - p.z_position_1st_grating;

        let downstream = beam.propagate(z12, lambda);
        let w2 = downstream.width;
        let r2 = downstream.curvature_radius;
        let el2 = downstream.coherence_width;

        let table = self.table(Grating::First, z);
        let window = p.order_window();

        let mut terms = Vec::new();
        let mut evaluated = 0;
        for n1 in window.orders() {
            for n2 in window.orders() {
                evaluated += 1;
                let dn = (n1 - n2) as f64;
                let average_n = (n1 + n2) as f64 / 2.0;

                let mut coefficient = match &table {
                    None => sinc(f * PI * n1 as f64) * sinc(f * PI * n2 as f64) * f * f,
                    Some(table) => table.pair(n1, n2).re,
                };
                coefficient *= (-PI * ((dn * lambda * z12) / (d * el2)).powi(2)).exp();

                if !coefficient.is_finite() || coefficient < p.intensity_cutoff {
                    continue;
                }
                terms.push(FringeTerm {
                    coefficient,
                    shift: average_n * lambda * z12 / d,
                    frequency: 2.0 * PI * (dn / d) * (1.0 - z12 / r2),
                });
            }
        }

        Zip::from(intensity).and(positions).par_for_each(|out, &x| {
            for term in &terms {
                let u = x - term.shift;
                *out += term.coefficient * (-PI * (u / w2).powi(2)).exp() * (term.frequency * u).cos();
            }
        });

        let stats = PropagationStats {
            terms_evaluated: evaluated,
            terms_included: terms.len(),
            elapsed: start.elapsed(),
        };
        debug!(
            "after grating 1 at z = {:.4} m: {}/{} order pairs kept in {:.3?}",
            z, stats.terms_included, stats.terms_evaluated, stats.elapsed
        );
        stats
    }

    /// Profile at `z` downstream of grating 2.
    ///
    /// `beam` is the GSM state arriving at grating 1; the y-axis beam is
    /// taken equal to the x-axis one and the profile is the `y = 0` slice.
    pub fn intensity_after_second_grating(
        &self,
        z: f64,
        beam: &GsmBeam,
        positions: &Array1<f64>,
        intensity: &mut Array1<f64>,
    ) -> PropagationStats {
        let start = Instant::now();
        self.check_lengths(positions, intensity);

        let p = self.params;
        let lambda = p.wavelength;
        let d1 = p.grating_period;
        let d2 = p.grating_period;
        let f1 = p.grating1_open_fraction;
        let f2 = p.grating2_open_fraction;
        let theta = p.theta_radians();
        let (sin_t, cos_t) = theta.sin_cos();

        let z12 = p.z_position_2nd_grating - p.z_position_1st_grating;
        let z23 = z - p.z_position_2nd_grating;
        let z13 = z12 + z23;

        let beam_x = beam.propagate(z13, lambda);
        // y-axis beam starts identical to x
        let beam_y = beam_x;
        let (w3x, el3x, v3x) = (beam_x.width, beam_x.coherence_width, beam_x.curvature_radius);
        let (w3y, el3y, v3y) = (beam_y.width, beam_y.coherence_width, beam_y.curvature_radius);

        let tables = self
            .table(Grating::First, z)
            .zip(self.table(Grating::Second, z));
        let window = p.order_window();

        // Curvature factors shared by every term.
        let flat_13 = 1.0 - z13 / v3x;
        let flat_23 = 1.0 - z23 / v3x;
        let curvature_x = cos_t * cos_t / v3x;
        let curvature_y = sin_t * sin_t / v3y;

        let mut terms = Vec::new();
        let mut evaluated = 0;
        for m1 in window.orders() {
            for m2 in window.orders() {
                let dm = (m1 - m2) as f64;
                let average_m = (m1 + m2) as f64 / 2.0;
                let first = match &tables {
                    None => Complex64::new(slit_pair(f1, m1, m2), 0.0),
                    Some((g1, _)) => g1.pair(m1, m2),
                };

                for n1 in window.orders() {
                    for n2 in window.orders() {
                        evaluated += 1;
                        let second = match &tables {
                            None => Complex64::new(slit_pair(f2, n1, n2), 0.0),
                            Some((_, g2)) => g2.pair(n1, n2),
                        };
                        let coefficient = second * first;

                        if !(coefficient.re >= p.intensity_cutoff || coefficient.im >= p.intensity_cutoff) {
                            continue;
                        }

                        let dn = (n1 - n2) as f64;
                        let average_n = (n1 + n2) as f64 / 2.0;

                        // Eq. 18b, centre of the x Gaussian and its y = 0 part.
                        let shift = lambda * (z23 * average_n * cos_t / d2 + z13 * average_m / d1);
                        let y_decay = -PI * (average_n * sin_t * lambda * z23 / (d2 * w3y)).powi(2);
                        // Eq. 18c, linear in x.
                        let frequency = -2.0 * PI * ((dn * cos_t / d2) * flat_23 + (dm / d1) * flat_13);
                        // Eq. 18d
                        let phase = (2.0 * PI * lambda * z13 * dm / d1)
                            * (average_n * cos_t / d2 + average_m / d1)
                            * flat_13
                            + (2.0 * PI * lambda * z23 * dn / d2)
                                * ((average_m * cos_t / d1) * flat_13
                                    - (average_n * z23 / d2) * curvature_x
                                    + curvature_y);
                        // Eq. 18e
                        let argument_v = -PI
                            * (lambda * (z23 * dn * cos_t / d2 + z13 * dm / d1) / el3x).powi(2)
                            - PI * (dn * sin_t * lambda * z23 / (d2 * el3y)).powi(2);

                        terms.push(MoireTerm {
                            coefficient,
                            shift,
                            frequency,
                            phase,
                            y_decay,
                            coherence: argument_v.exp(),
                        });
                    }
                }
            }
        }

        Zip::from(intensity).and(positions).par_for_each(|out, &x| {
            for term in &terms {
                let argument_d = -PI * ((x - term.shift) / w3x).powi(2) + term.y_decay;
                let argument_f_p = term.frequency * x + term.phase;
                let (sin_fp, cos_fp) = argument_f_p.sin_cos();
                *out += (term.coefficient.re * cos_fp - term.coefficient.im * sin_fp)
                    * argument_d.exp()
                    * term.coherence;
            }
        });

        let stats = PropagationStats {
            terms_evaluated: evaluated,
            terms_included: terms.len(),
            elapsed: start.elapsed(),
        };
        debug!(
            "after grating 2 at z = {:.4} m: {}/{} order quadruples kept in {:.3?}",
            z, stats.terms_included, stats.terms_evaluated, stats.elapsed
        );
        stats
    }

    /// Profile at `z`, choosing the propagator from the grating positions.
    pub fn intensity_at(&self, z: f64, positions: &Array1<f64>) -> (Array1<f64>, PropagationStats) {
        let mut intensity = Array1::zeros(positions.len());
        let p = self.params;
        let stats = if z <= p.z_position_1st_grating {
            self.initial_intensity(z, positions, &mut intensity)
        } else {
            let beam = self.beam_at_first_grating();
            if z <= p.z_position_2nd_grating {
                self.intensity_after_first_grating(z, &beam, positions, &mut intensity)
            } else {
                self.intensity_after_second_grating(z, &beam, positions, &mut intensity)
            }
        };
        (intensity, stats)
    }

    /// Intensity map with one row per entry of `z_positions`.
    pub fn scan(&self, z_positions: &[f64], positions: &Array1<f64>) -> Array2<f64> {
        let mut map = Array2::zeros((z_positions.len(), positions.len()));
        for (row, &z) in z_positions.iter().enumerate() {
            let (intensity, _) = self.intensity_at(z, positions);
            map.row_mut(row).assign(&intensity);
        }
        map
    }
}

/// Ideal-slit mutual amplitude `f² sinc(π f a) sinc(π f b)`.
#[inline]
fn slit_pair(open_fraction: f64, a: i32, b: i32) -> f64 {
    sinc(open_fraction * PI * a as f64) * sinc(open_fraction * PI * b as f64) * open_fraction * open_fraction
}
