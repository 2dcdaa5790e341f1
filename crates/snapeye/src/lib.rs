//! Pixel-exact visual regression checks.
//!
//! [`compare`] decides whether two same-sized screenshots differ and where;
//! [`report`] turns a difference into a side-by-side PNG; [`verify`] wraps
//! both in a capture-and-retry loop backed by the baseline [`store`].

pub mod capture;
pub mod compare;
pub mod config;
pub mod report;
pub mod store;
pub mod verify;

pub use crate::compare::{ComparisonResult, DiffOptions, compare};
pub use crate::report::{ReportComposer, ReportLayout};
pub use crate::verify::{FailMode, Verdict, Verifier, VerifyError, VerifyOptions};
