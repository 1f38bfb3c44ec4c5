//! Errors raised by the panel pipeline.
//!
//! Data conditions that are expected in survey panels (an unresolvable main
//! job, a spell without an observed source occupation) are modelled as
//! missing values and never surface here. Only violations of the input
//! contract abort a panel.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("panel {panel_year}: invalid calendar month {year}-{month} for subject {subject_key}")]
    InvalidCalendarMonth {
        panel_year: i32,
        subject_key: u64,
        year: i32,
        month: u32,
    },

    #[error("panel {panel_year}: individual {individual_key} has more than one row for {month}")]
    DuplicateMonth {
        panel_year: i32,
        individual_key: u64,
        month: NaiveDate,
    },

    #[error("panel {panel_year}: individual key overflows for subject {subject_key}")]
    KeyOverflow { panel_year: i32, subject_key: u64 },

    #[error("panel {panel_year}: spell ids overflow with offset {spell_id_offset}")]
    SpellIdOverflow { panel_year: i32, spell_id_offset: u64 },
}

pub type Result<T> = std::result::Result<T, PanelError>;
