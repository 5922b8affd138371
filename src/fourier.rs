//! Grating Fourier coefficients
//!
//! A periodic grating with transmission `t(x)` is expanded as
//! `t(x) = Σ c(n) e^(2πi n x / d)`. The propagators only ever need the
//! complex amplitudes `c(n)` over a finite, symmetric window of orders.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;

use crate::error::{GratingError, Result};
use crate::params::SimulationParameters;

/// Unnormalized sinc, `sin(x)/x` with `sinc(0) = 1`.
#[inline]
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Maps a signed diffraction order onto a contiguous slot.
///
/// Order `n` lives at slot `n + half_width`; orders with
/// `|n| > half_width` have no slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderIndex {
    pub half_width: usize,
}

impl OrderIndex {
    pub fn new(half_width: usize) -> Self {
        Self { half_width }
    }

    /// Index for a table of `len` entries (`len` odd).
    pub fn for_len(len: usize) -> Self {
        Self::new(len.saturating_sub(1) / 2)
    }

    /// Number of orders covered, `2 · half_width + 1`.
    pub fn span(&self) -> usize {
        2 * self.half_width + 1
    }

    #[inline]
    pub fn slot(&self, order: i32) -> Option<usize> {
        let slot = order as i64 + self.half_width as i64;
        if slot >= 0 && (slot as usize) < self.span() {
            Some(slot as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn order(&self, slot: usize) -> i32 {
        slot as i32 - self.half_width as i32
    }

    /// All orders `-half_width..=half_width`.
    pub fn orders(&self) -> impl Iterator<Item = i32> + Clone {
        let h = self.half_width as i32;
        -h..=h
    }
}

/// Complex transmission amplitudes indexed by diffraction order.
#[derive(Clone, Debug, PartialEq)]
pub struct FourierCoefficients {
    index: OrderIndex,
    values: Vec<Complex64>,
}

impl FourierCoefficients {
    /// Build from a slot-ordered vector of odd length.
    pub fn new(values: Vec<Complex64>) -> Result<Self> {
        if values.len() % 2 == 0 {
            return Err(GratingError::TableLength {
                expected: values.len() + 1,
                actual: values.len(),
            });
        }
        Ok(Self {
            index: OrderIndex::for_len(values.len()),
            values,
        })
    }

    /// Build from parallel real and imaginary tables.
    pub fn from_parts(real: &[f64], imaginary: &[f64]) -> Result<Self> {
        if real.len() != imaginary.len() {
            return Err(GratingError::TableLength {
                expected: real.len(),
                actual: imaginary.len(),
            });
        }
        let values = real
            .iter()
            .zip(imaginary.iter())
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect();
        Self::new(values)
    }

    /// Evaluate `amplitude(n)` for every order of a `len`-entry table.
    pub fn from_fn(len: usize, mut amplitude: impl FnMut(i32) -> Complex64) -> Result<Self> {
        let index = OrderIndex::for_len(len);
        let values = (0..len).map(|slot| amplitude(index.order(slot))).collect();
        Self::new(values)
    }

    pub fn index(&self) -> OrderIndex {
        self.index
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Coefficient of order `n`.
    ///
    /// Panics if `|n|` exceeds the table half-width. Callers keep their
    /// truncation window inside the table, which
    /// [`SimulationParameters::validate`] enforces.
    #[inline]
    pub fn get(&self, order: i32) -> Complex64 {
        match self.index.slot(order) {
            Some(slot) => self.values[slot],
            None => panic!(
                "diffraction order {} outside table half-width {}",
                order, self.index.half_width
            ),
        }
    }

    pub fn try_get(&self, order: i32) -> Result<Complex64> {
        self.index
            .slot(order)
            .map(|slot| self.values[slot])
            .ok_or(GratingError::OrderOutOfRange {
                order,
                half_width: self.index.half_width,
            })
    }

    /// `c(a) · conj(c(b))`, the mutual amplitude of a pair of orders.
    #[inline]
    pub fn pair(&self, a: i32, b: i32) -> Complex64 {
        self.get(a) * self.get(b).conj()
    }

    pub fn real_parts(&self) -> Vec<f64> {
        self.values.iter().map(|c| c.re).collect()
    }

    pub fn imaginary_parts(&self) -> Vec<f64> {
        self.values.iter().map(|c| c.im).collect()
    }
}

/// Which grating of the interferometer a table describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grating {
    First,
    Second,
}

/// Source of per-order grating transmission amplitudes.
///
/// Implementations may depend on `z` (near-field phase effects), so the
/// propagators request a fresh table on every call.
pub trait TransmissionModel: Sync {
    fn coefficients(
        &self,
        params: &SimulationParameters,
        grating: Grating,
        z: f64,
    ) -> FourierCoefficients;
}

/// Amplitude grating of fully open slits with no phase shifts.
///
/// `c(n) = f · sinc(π f n)` where `f` is the open fraction.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdealSlit;

impl IdealSlit {
    #[inline]
    pub fn amplitude(open_fraction: f64, order: i32) -> f64 {
        open_fraction * sinc(PI * open_fraction * order as f64)
    }
}

impl TransmissionModel for IdealSlit {
    fn coefficients(
        &self,
        params: &SimulationParameters,
        grating: Grating,
        _z: f64,
    ) -> FourierCoefficients {
        let f = params.open_fraction(grating);
        let index = OrderIndex::for_len(params.number_of_rows_fourier_coefficient_array);
        FourierCoefficients {
            index,
            values: index
                .orders()
                .map(|n| Complex64::new(Self::amplitude(f, n), 0.0))
                .collect(),
        }
    }
}

/// Fixed coefficient tables supplied from outside, e.g. computed by a
/// separate van der Waals or image-charge model.
///
/// Serialized as [`TransmissionTables`]; deserializing validates the tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransmissionTables", into = "TransmissionTables")]
pub struct TabulatedTransmission {
    first: FourierCoefficients,
    second: FourierCoefficients,
}

/// On-disk layout of [`TabulatedTransmission`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransmissionTables {
    pub first_real: Vec<f64>,
    pub first_imaginary: Vec<f64>,
    /// Tables for grating 2. When absent, grating 2 reuses grating 1's.
    #[serde(default)]
    pub second_real: Option<Vec<f64>>,
    #[serde(default)]
    pub second_imaginary: Option<Vec<f64>>,
}

impl TryFrom<TransmissionTables> for TabulatedTransmission {
    type Error = GratingError;

    fn try_from(raw: TransmissionTables) -> Result<Self> {
        let first = FourierCoefficients::from_parts(&raw.first_real, &raw.first_imaginary)?;
        let second = match (&raw.second_real, &raw.second_imaginary) {
            (Some(re), Some(im)) => FourierCoefficients::from_parts(re, im)?,
            (None, None) => first.clone(),
            _ => {
                return Err(GratingError::invalid(
                    "second_imaginary",
                    "grating 2 needs both real and imaginary tables",
                ))
            }
        };
        Self::new(first).with_second(second)
    }
}

impl From<TabulatedTransmission> for TransmissionTables {
    fn from(model: TabulatedTransmission) -> Self {
        let shared = model.first == model.second;
        Self {
            first_real: model.first.real_parts(),
            first_imaginary: model.first.imaginary_parts(),
            second_real: (!shared).then(|| model.second.real_parts()),
            second_imaginary: (!shared).then(|| model.second.imaginary_parts()),
        }
    }
}

impl TabulatedTransmission {
    /// Same table for both gratings.
    pub fn new(coefficients: FourierCoefficients) -> Self {
        Self {
            second: coefficients.clone(),
            first: coefficients,
        }
    }

    /// Replace grating 2's table. Both tables must cover the same orders.
    pub fn with_second(mut self, second: FourierCoefficients) -> Result<Self> {
        if second.len() != self.first.len() {
            return Err(GratingError::TableLength {
                expected: self.first.len(),
                actual: second.len(),
            });
        }
        self.second = second;
        Ok(self)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: TransmissionTables = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn load(filepath: &str) -> Result<Self> {
        let json = fs::read_to_string(filepath)?;
        Self::from_json(&json)
    }

    pub fn save(&self, filepath: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(filepath, json)?;
        Ok(())
    }

    pub fn table(&self, grating: Grating) -> &FourierCoefficients {
        match grating {
            Grating::First => &self.first,
            Grating::Second => &self.second,
        }
    }
}

impl TransmissionModel for TabulatedTransmission {
    fn coefficients(
        &self,
        _params: &SimulationParameters,
        grating: Grating,
        _z: f64,
    ) -> FourierCoefficients {
        self.table(grating).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sinc() {
        assert_eq!(sinc(0.0), 1.0);
        assert_abs_diff_eq!(sinc(PI), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(sinc(PI / 2.0), 2.0 / PI, epsilon = 1e-15);
        assert_abs_diff_eq!(sinc(-1.3), sinc(1.3), epsilon = 1e-15);
    }

    #[test]
    fn test_order_index_bounds() {
        let idx = OrderIndex::for_len(41);
        assert_eq!(idx.half_width, 20);
        assert_eq!(idx.slot(-20), Some(0));
        assert_eq!(idx.slot(0), Some(20));
        assert_eq!(idx.slot(20), Some(40));
        assert_eq!(idx.slot(21), None);
        assert_eq!(idx.slot(-21), None);
        assert_eq!(idx.order(7), -13);
        assert_eq!(idx.orders().count(), 41);
    }

    #[test]
    fn test_from_parts_rejects_mismatch() {
        let err = FourierCoefficients::from_parts(&[0.0; 41], &[0.0; 39]).unwrap_err();
        assert!(matches!(err, GratingError::TableLength { expected: 41, actual: 39 }));

        let err = FourierCoefficients::from_parts(&[0.0; 40], &[0.0; 40]).unwrap_err();
        assert!(matches!(err, GratingError::TableLength { .. }));
    }

    #[test]
    fn test_table_layout() {
        let table = FourierCoefficients::from_fn(5, |n| Complex64::new(n as f64, -(n as f64))).unwrap();
        assert_eq!(table.real_parts(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(table.get(-2), Complex64::new(-2.0, 2.0));
        assert!(table.try_get(3).is_err());
    }

    #[test]
    #[should_panic(expected = "outside table half-width")]
    fn test_get_outside_window_panics() {
        let table = FourierCoefficients::from_fn(3, |_| Complex64::new(1.0, 0.0)).unwrap();
        table.get(2);
    }

    #[test]
    fn test_pair_is_product_with_conjugate() {
        let table = FourierCoefficients::from_fn(3, |n| Complex64::new(1.0, n as f64)).unwrap();
        let pair = table.pair(1, -1);
        // (1 + i)(1 + i) = 2i
        assert_abs_diff_eq!(pair.re, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(pair.im, 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_ideal_slit_amplitudes() {
        let params = SimulationParameters::default();
        let table = IdealSlit.coefficients(&params, Grating::First, 0.0);
        let f = params.grating1_open_fraction;

        assert_eq!(table.len(), params.number_of_rows_fourier_coefficient_array);
        assert_abs_diff_eq!(table.get(0).re, f, epsilon = 1e-15);
        for n in table.index().orders() {
            assert_eq!(table.get(n).im, 0.0);
            assert_abs_diff_eq!(table.get(n).re, table.get(-n).re, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_tabulated_json_round_trip() {
        let first = FourierCoefficients::from_fn(41, |n| Complex64::new(0.25 * n as f64, 0.125)).unwrap();
        let second = FourierCoefficients::from_fn(41, |n| Complex64::new(0.0, n as f64)).unwrap();
        let model = TabulatedTransmission::new(first.clone())
            .with_second(second.clone())
            .unwrap();

        let path = std::env::temp_dir().join("gratingsim_tabulated.json");
        let path = path.to_str().unwrap();
        model.save(path).unwrap();
        let loaded = TabulatedTransmission::load(path).unwrap();

        let params = SimulationParameters::default();
        assert_eq!(loaded.coefficients(&params, Grating::First, 1.0), first);
        assert_eq!(loaded.coefficients(&params, Grating::Second, 1.0), second);
    }

    #[test]
    fn test_tabulated_rejects_half_second_table() {
        let json = r#"{"first_real":[0,1,0],"first_imaginary":[0,0,0],"second_real":[0,1,0]}"#;
        assert!(TabulatedTransmission::from_json(json).is_err());
    }

    #[test]
    fn test_tabulated_deserialize_builds_tables() {
        let json = r#"{"first_real":[0.5,1.0,0.5],"first_imaginary":[0.0,0.25,0.0]}"#;
        let model: TabulatedTransmission = serde_json::from_str(json).unwrap();
        assert_eq!(model.table(Grating::First).get(0), Complex64::new(1.0, 0.25));
        assert_eq!(model.table(Grating::Second), model.table(Grating::First));

        let ragged = r#"{"first_real":[0.5,1.0,0.5],"first_imaginary":[0.0,0.25]}"#;
        assert!(serde_json::from_str::<TabulatedTransmission>(ragged).is_err());

        let mismatched = r#"{"first_real":[0,1,0],"first_imaginary":[0,0,0],
            "second_real":[0],"second_imaginary":[0]}"#;
        assert!(serde_json::from_str::<TabulatedTransmission>(mismatched).is_err());
    }

    #[test]
    fn test_with_second_rejects_other_length() {
        let first = FourierCoefficients::from_fn(5, |_| Complex64::new(1.0, 0.0)).unwrap();
        let second = FourierCoefficients::from_fn(3, |_| Complex64::new(1.0, 0.0)).unwrap();
        let err = TabulatedTransmission::new(first).with_second(second).unwrap_err();
        assert!(matches!(err, GratingError::TableLength { expected: 5, actual: 3 }));
    }
}
