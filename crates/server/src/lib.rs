//! Diagnosis server - HTTP front end for the inference engine

pub mod api;
pub mod config;
