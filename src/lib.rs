//! startwork - pick an issue assigned to you and start a branch for it
//!
//! The flow is built on a small step-wizard engine (`wizard`). Flows yield
//! prompt steps and the host (terminal picker or a scripted host) answers
//! them. Integrations supply the issues, `branch` creates the branch.

pub mod access;
pub mod api;
pub mod branch;
pub mod config;
pub mod git;
pub mod integrations;
pub mod logging;
pub mod repositories;
pub mod start_work;
pub mod telemetry;
pub mod text;
pub mod ui;
pub mod wizard;
