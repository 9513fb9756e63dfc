//! ATS backend core: service wiring over the workflow crate.
//!
//! The heavy lifting (SLA evaluation, sweeps, approval chains) lives in
//! `ats-workflow`; this package supplies the tenant settings facade, the
//! in-process notification center, the requisition service, and the
//! sweeper daemon.

pub mod config;
pub mod services;
