//! Gaussian-Schell-Model (GSM) beam propagation
//!
//! Free-space evolution of a partially coherent beam described by its
//! width `w`, coherence width `ℓ` and wavefront curvature radius `R`.
//! Widths use the `exp(-π x²/w²)` convention, so the far-field divergence
//! of each width is `λ/w` rather than `λ/(π w)`.

use serde::{Deserialize, Serialize};

/// GSM beam state at one plane along the optical axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GsmBeam {
    pub width: f64,
    pub coherence_width: f64,
    /// Radius of wavefront curvature. `f64::INFINITY` is a plane wavefront.
    #[serde(with = "radius_serde", default = "plane_wavefront")]
    pub curvature_radius: f64,
}

fn plane_wavefront() -> f64 {
    f64::INFINITY
}

impl GsmBeam {
    pub fn new(width: f64, coherence_width: f64, curvature_radius: f64) -> Self {
        Self {
            width,
            coherence_width,
            curvature_radius,
        }
    }

    /// Beam with a flat wavefront.
    pub fn collimated(width: f64, coherence_width: f64) -> Self {
        Self::new(width, coherence_width, f64::INFINITY)
    }

    /// Propagate this beam a distance `z` downstream.
    pub fn propagate(&self, z: f64, wavelength: f64) -> GsmBeam {
        let r = self.curvature_radius;
        let el = self.coherence_width;
        let w = self.width;
        GsmBeam {
            width: beam_width(z, wavelength, r, el, w, w),
            coherence_width: beam_width(z, wavelength, r, el, w, el),
            curvature_radius: wavefront_radius(z, wavelength, r, el, w),
        }
    }
}

/// Growth factor `w(z)/w(0)` shared by the beam and coherence widths.
#[inline]
fn expansion(z: f64, wavelength: f64, curvature_in: f64, coherence_in: f64, width_in: f64) -> f64 {
    let focus = 1.0 + z / curvature_in;
    let divergence = wavelength * z / width_in;
    let spread = 1.0 / coherence_in.powi(2) + 1.0 / width_in.powi(2);
    (focus * focus + divergence * divergence * spread).sqrt()
}

/// Width after propagating a distance `z`.
///
/// `other_in` selects which transverse scale is returned: pass the beam
/// width to get `w(z)`, or the coherence width to get `ℓ(z)`. Both grow by
/// the same factor.
pub fn beam_width(
    z: f64,
    wavelength: f64,
    curvature_in: f64,
    coherence_in: f64,
    width_in: f64,
    other_in: f64,
) -> f64 {
    other_in * expansion(z, wavelength, curvature_in, coherence_in, width_in)
}

/// Radius of wavefront curvature after propagating a distance `z`.
pub fn wavefront_radius(
    z: f64,
    wavelength: f64,
    curvature_in: f64,
    coherence_in: f64,
    width_in: f64,
) -> f64 {
    let inverse_r = 1.0 / curvature_in;
    let w_z = beam_width(z, wavelength, curvature_in, coherence_in, width_in, width_in);
    let spread = 1.0 / coherence_in.powi(2) + 1.0 / width_in.powi(2);
    let slope = width_in.powi(2) * (1.0 + z * inverse_r) * inverse_r + wavelength.powi(2) * z * spread;
    w_z * w_z / slope
}

/// Infinite radii round-trip through JSON as `null`.
mod radius_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(radius: &f64, s: S) -> Result<S::Ok, S::Error> {
        if radius.is_finite() {
            s.serialize_some(radius)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LAMBDA: f64 = 1.0e-11;

    #[test]
    fn test_zero_distance_is_identity() {
        let beam = GsmBeam::new(2.0e-5, 1.0e-6, 3.0);
        let out = beam.propagate(0.0, LAMBDA);

        assert_relative_eq!(out.width, beam.width, max_relative = 1e-12);
        assert_relative_eq!(out.coherence_width, beam.coherence_width, max_relative = 1e-12);
        assert_relative_eq!(out.curvature_radius, 3.0, max_relative = 1e-12);
    }

    #[test]
    fn test_plane_wave_stays_flat_at_origin() {
        let beam = GsmBeam::collimated(1.0, 0.5);
        let out = beam.propagate(0.0, LAMBDA);
        assert!(out.curvature_radius.is_infinite());
        assert_relative_eq!(out.width, 1.0);
    }

    #[test]
    fn test_far_field_divergence() {
        let w0 = 1.0e-5;
        let el0 = 1.0e-6;
        let z = 1.0e3;
        let beam = GsmBeam::collimated(w0, el0).propagate(z, LAMBDA);

        let expected = LAMBDA * z * (1.0 / (el0 * el0) + 1.0 / (w0 * w0)).sqrt();
        assert_relative_eq!(beam.width, expected, max_relative = 1e-5);
        // Far from the waist the wavefront radius approaches the distance.
        assert_relative_eq!(beam.curvature_radius, z, max_relative = 1e-5);
    }

    #[test]
    fn test_coherence_ratio_preserved() {
        let beam = GsmBeam::new(2.0e-5, 1.0e-6, -4.0);
        let out = beam.propagate(1.3, LAMBDA);
        assert_relative_eq!(
            out.coherence_width / out.width,
            beam.coherence_width / beam.width,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_infinite_radius_serializes_as_null() {
        let beam = GsmBeam::collimated(1.0e-5, 1.0e-6);
        let json = serde_json::to_string(&beam).unwrap();
        assert!(json.contains("\"curvature_radius\":null"));

        let back: GsmBeam = serde_json::from_str(&json).unwrap();
        assert!(back.curvature_radius.is_infinite());

        let bare: GsmBeam = serde_json::from_str(r#"{"width": 1.0, "coherence_width": 0.5}"#).unwrap();
        assert!(bare.curvature_radius.is_infinite());
    }
}
