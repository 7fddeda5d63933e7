//! Observability subsystem.
//!
//! Structured logging goes straight through `tracing` at call sites, with
//! the request id as a field on every pipeline event; this module only
//! centralizes metric names. Exporter wiring belongs to the host
//! application, not the library.

pub mod metrics;
