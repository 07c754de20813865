//! Math utilities for the chassis.
//!
//! This module provides the differential-drive mixing used by the drive train.

pub mod drive;
