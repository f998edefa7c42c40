//! Infrastructure adapters and runtime bootstrap.

pub mod cache;
pub mod error;
pub mod latexml;
pub(crate) mod lock;
pub mod pages;
pub mod telemetry;
