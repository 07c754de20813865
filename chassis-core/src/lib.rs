//! Drive-train subsystem for a four-motor differential chassis on no-std
//! embedded platforms.
//!
//! For a runnable host simulation, see `chassis-app/sim-host`.
#![no_std]

pub mod utils;

#[doc(hidden)]
pub use static_cell;
