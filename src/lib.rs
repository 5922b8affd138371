//! GSM matter-wave grating interferometry
//!
//! Predicted transverse intensity profiles of a partially coherent electron
//! beam diffracted by one or two periodic gratings, using the closed-form
//! Gaussian-Schell-model expressions of McMorran & Cronin (2008).

pub mod beam;
pub mod error;
pub mod fourier;
pub mod gratings;
pub mod params;

pub use beam::GsmBeam;
pub use error::{GratingError, Result};
pub use fourier::{
    FourierCoefficients, Grating, IdealSlit, TabulatedTransmission, TransmissionModel, TransmissionTables,
};
pub use gratings::{Interferometer, PropagationStats};
pub use params::SimulationParameters;
