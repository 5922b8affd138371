//! Simulation parameters

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::beam::GsmBeam;
use crate::error::{GratingError, Result};
use crate::fourier::{Grating, OrderIndex};

/// Immutable description of one interferometer run.
///
/// Lengths are in metres, angles as noted per field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    pub z_position_1st_grating: f64,
    pub z_position_2nd_grating: f64,
    pub grating_period: f64,
    pub grating1_open_fraction: f64,
    pub grating2_open_fraction: f64,
    pub wavelength: f64,
    /// Number of transverse samples per observation plane.
    pub resolution: usize,
    /// Beam tilt about the x-axis, in units of π.
    pub tilt: f64,
    /// Grating wedge angle in degrees.
    pub wedgeangle: f64,
    /// Detector tilt about the optical axis in degrees.
    pub theta: f64,
    pub intensity_cutoff: f64,
    pub account_gravity: bool,
    pub account_van_der_waals: bool,
    /// Half-width of the summed diffraction-order window.
    pub diffraction_orders: usize,
    pub number_of_rows_fourier_coefficient_array: usize,
    #[serde(rename = "G2_x")]
    pub g2_x: f64,
    /// Beam at the source plane, `z = 0`.
    pub initial_beam: GsmBeam,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            z_position_1st_grating: 0.3,
            z_position_2nd_grating: 1.3,
            grating_period: 100e-9,
            grating1_open_fraction: 0.5,
            grating2_open_fraction: 0.5,
            // 10 keV electrons
            wavelength: 1.22e-11,
            resolution: 501,
            tilt: 0.0,
            wedgeangle: 0.0,
            theta: 0.0,
            intensity_cutoff: 1e-3,
            account_gravity: false,
            account_van_der_waals: false,
            diffraction_orders: 5,
            number_of_rows_fourier_coefficient_array: 41,
            g2_x: 0.0,
            initial_beam: GsmBeam::collimated(1.0e-5, 1.0e-6),
        }
    }
}

impl SimulationParameters {
    /// True when grating transmission must come from coefficient tables
    /// rather than the ideal-slit closed form.
    pub fn uses_grating_corrections(&self) -> bool {
        self.account_gravity || self.account_van_der_waals
    }

    pub fn open_fraction(&self, grating: Grating) -> f64 {
        match grating {
            Grating::First => self.grating1_open_fraction,
            Grating::Second => self.grating2_open_fraction,
        }
    }

    /// Window of diffraction orders summed by the propagators.
    pub fn order_window(&self) -> OrderIndex {
        OrderIndex::new(self.diffraction_orders)
    }

    /// Largest order stored in a coefficient table.
    pub fn half_width_of_table(&self) -> usize {
        OrderIndex::for_len(self.number_of_rows_fourier_coefficient_array).half_width
    }

    /// Detector tilt in radians.
    pub fn theta_radians(&self) -> f64 {
        self.theta.to_radians()
    }

    /// `resolution` evenly spaced samples on `[-half_width, half_width]`.
    ///
    /// Built from integer offsets so that `x[i] == -x[n-1-i]` exactly.
    pub fn sample_positions(&self, half_width: f64) -> Array1<f64> {
        let n = self.resolution;
        if n < 2 {
            return Array1::zeros(n);
        }
        let last = (n - 1) as f64;
        Array1::from_shape_fn(n, |i| half_width * (2.0 * i as f64 - last) / last)
    }

    /// Check physical ranges and table/window consistency.
    pub fn validate(&self) -> Result<()> {
        positive("wavelength", self.wavelength)?;
        positive("grating_period", self.grating_period)?;
        positive("initial_beam.width", self.initial_beam.width)?;
        positive("initial_beam.coherence_width", self.initial_beam.coherence_width)?;

        for (name, f) in [
            ("grating1_open_fraction", self.grating1_open_fraction),
            ("grating2_open_fraction", self.grating2_open_fraction),
        ] {
            if !(f > 0.0 && f <= 1.0) {
                return Err(GratingError::invalid(name, format!("{} not in (0, 1]", f)));
            }
        }

        if self.initial_beam.curvature_radius == 0.0 || self.initial_beam.curvature_radius.is_nan() {
            return Err(GratingError::invalid(
                "initial_beam.curvature_radius",
                "must be non-zero (use null for a plane wavefront)",
            ));
        }
        if !(self.z_position_2nd_grating > self.z_position_1st_grating) {
            return Err(GratingError::invalid(
                "z_position_2nd_grating",
                format!(
                    "{} is not downstream of grating 1 at {}",
                    self.z_position_2nd_grating, self.z_position_1st_grating
                ),
            ));
        }
        if self.resolution == 0 {
            return Err(GratingError::invalid("resolution", "must be at least 1"));
        }
        if !self.intensity_cutoff.is_finite() {
            return Err(GratingError::invalid("intensity_cutoff", "must be finite"));
        }

        let rows = self.number_of_rows_fourier_coefficient_array;
        if rows % 2 == 0 {
            return Err(GratingError::invalid(
                "number_of_rows_fourier_coefficient_array",
                format!("{} is even; orders must be symmetric about zero", rows),
            ));
        }
        if self.diffraction_orders > self.half_width_of_table() {
            return Err(GratingError::invalid(
                "diffraction_orders",
                format!(
                    "window ±{} exceeds coefficient table ±{}",
                    self.diffraction_orders,
                    self.half_width_of_table()
                ),
            ));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Save parameters to file.
    pub fn save(&self, filepath: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(filepath, json)?;
        Ok(())
    }

    /// Load and validate parameters from file.
    pub fn load(filepath: &str) -> Result<Self> {
        let json = fs::read_to_string(filepath)?;
        Self::from_json(&json)
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GratingError::invalid(name, format!("{} must be positive", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let params = SimulationParameters::default();
        params.validate().unwrap();
        assert_eq!(params.half_width_of_table(), 20);
        assert_eq!(params.order_window().span(), 11);
    }

    #[test]
    fn test_params_save_load() {
        let mut params = SimulationParameters::default();
        params.account_van_der_waals = true;
        params.initial_beam.curvature_radius = -4.0;

        let path = std::env::temp_dir().join("gratingsim_params.json");
        let path = path.to_str().unwrap();
        params.save(path).unwrap();
        let loaded = SimulationParameters::load(path).unwrap();

        assert_eq!(loaded.resolution, params.resolution);
        assert!(loaded.account_van_der_waals);
        assert_eq!(loaded.initial_beam.curvature_radius, -4.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params =
            SimulationParameters::from_json(r#"{"resolution": 64, "G2_x": 1e-6}"#).unwrap();
        assert_eq!(params.resolution, 64);
        assert_eq!(params.g2_x, 1e-6);
        assert_eq!(params.diffraction_orders, 5);
        assert!(params.initial_beam.curvature_radius.is_infinite());
    }

    #[test]
    fn test_rejects_window_wider_than_table() {
        let params = SimulationParameters {
            diffraction_orders: 21,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            GratingError::InvalidParameter { name: "diffraction_orders", .. }
        ));
    }

    #[test]
    fn test_rejects_bad_physics() {
        let mut params = SimulationParameters::default();
        params.grating_period = 0.0;
        assert!(params.validate().is_err());

        let mut params = SimulationParameters::default();
        params.grating1_open_fraction = 1.5;
        assert!(params.validate().is_err());

        let mut params = SimulationParameters::default();
        params.z_position_2nd_grating = params.z_position_1st_grating;
        assert!(params.validate().is_err());

        let mut params = SimulationParameters::default();
        params.number_of_rows_fourier_coefficient_array = 40;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_sample_positions_symmetric() {
        let params = SimulationParameters {
            resolution: 7,
            ..Default::default()
        };
        let x = params.sample_positions(3.0e-4);
        assert_eq!(x.len(), 7);
        for i in 0..7 {
            assert_eq!(x[i], -x[6 - i]);
        }
        assert_eq!(x[3], 0.0);
    }
}
