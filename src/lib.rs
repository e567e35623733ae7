//! Batch visual stamping of PDF invoices: a seal image and a company name
//! are drawn onto one page of every PDF in a folder, and the signed copies
//! are written to an output folder.

pub mod batch;
pub mod config;
pub mod error;
pub mod files;
pub mod overlay;
pub mod stamp;

pub use batch::{BatchHalt, BatchReport, JobOutcome, StampJob, process_batch, run_batch};
pub use config::Settings;
pub use error::{Result, SealError};
pub use overlay::{StampGeometry, create_overlay};
pub use stamp::apply_stamp;
