//! AOI land-cover change monitoring
//!
//! This library provides the scheduling and dispatch core of aoi-watch: a
//! periodic scheduler that checks every active Area of Interest against a
//! remote change detector, a single-flight dispatcher that keeps at most one
//! check per AOI in flight, and the pipeline that records significant changes
//! and alerts the owner.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod monitor;
pub mod routes;
pub mod services;
