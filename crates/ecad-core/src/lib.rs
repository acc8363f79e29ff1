//! Shared building blocks for the ecad translation pipelines.
//!
//! This crate holds the small vocabulary that both the schematic parser and
//! the CADSTAR board importer speak: stable identifiers ([`Kiid`],
//! [`LibId`]), internal-unit conversion, the diagnostic sink and the
//! progress/cancellation interface. Nothing here touches a file format.

mod diag;
mod kiid;
mod libid;
mod progress;
mod units;

pub use diag::{Diagnostic, Diagnostics, Location, Severity};
pub use kiid::{Kiid, KiidPath};
pub use libid::{LibId, LibIdError};
pub use progress::{NullProgress, ProgressReporter};
pub use units::{UnitScale, PCB_IU_PER_MM, SCH_IU_PER_MM};
