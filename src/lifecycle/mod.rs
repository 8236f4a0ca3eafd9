//! Process lifecycle.
//!
//! Startup order lives in `main`; this module owns the shutdown
//! coordinator that stops the listener and both background loops as a
//! unit, with no further mutation afterwards.

pub mod shutdown;

pub use shutdown::Shutdown;
