//! Employment to non-employment to employment spells from monthly
//! longitudinal survey panels.
//!
//! [`pipeline::process_panel`] turns the raw person-month records of one
//! panel-year into an augmented table: labor force status, contiguous
//! observation spells, three nested notions of non-employment spell and the
//! occupations held just before and just after each spell.

pub mod codes;
pub mod config;
pub mod continuity;
pub mod demographics;
pub mod error;
pub mod filter;
pub mod identity;
pub mod io;
pub mod occupation;
pub mod pipeline;
pub mod record;
pub mod spells;
pub mod status;
pub mod summary;
pub mod weights;
pub mod window;

pub use config::{PipelineConfig, RunConfig};
pub use error::PanelError;
pub use pipeline::{process_panel, PanelOutput};
pub use record::{PersonMonth, RawRecord};
