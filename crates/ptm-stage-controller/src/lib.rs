//! # PTM Stage Controller
//!
//! Pure functions computing, from a transaction's current stage and the
//! result of the most recent external interaction, the next stage.

mod controller;

pub use controller::StageController;
