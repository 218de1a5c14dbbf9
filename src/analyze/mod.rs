// src/analyze/mod.rs
//! Scoring models: the empirical factor model, the hybrid physics model,
//! the Monte-Carlo uncertainty ensemble and the fusion step that combines them.
//!
//! Every model is a pure function of a validated [`crate::weather::WeatherSample`]
//! and its config section; none of them keep state between calls.

pub mod ensemble;
pub mod factors;
pub mod fusion;
pub mod physics;

pub use ensemble::{DayWindows, Dimensions, EnsembleOutput, UncertaintyEnsemble};
pub use factors::{FactorOutput, RiskFactorModel};
pub use fusion::{ModelOutputs, ScoreFusion};
pub use physics::{HybridPhysicsModel, PhysicsOutput};
