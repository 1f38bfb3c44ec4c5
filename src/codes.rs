//! Survey code values the classifier matches against.
//!
//! Grouped by the raw variable they apply to. Codes outside these sets fall
//! through to the "no match" branch of every rule.

/// Interview status (`eppintvw`).
pub mod interview {
    /// Completed interview codes: self-response and proxy.
    pub const COMPLETED: [i32; 2] = [1, 2];
}

/// Monthly labor force recode (`rmesr`).
pub mod monthly {
    /// With a job for at least part of the month.
    pub const EMPLOYED: [i32; 5] = [1, 2, 3, 4, 5];
    /// With a job the entire month (worked, absent without pay, or on layoff).
    pub const EMPLOYED_ALL_MONTH: [i32; 3] = [1, 2, 3];
    /// No job, some or all weeks looking or on layoff.
    pub const UNEMPLOYED: [i32; 2] = [6, 7];
    /// No job, no time looking or on layoff.
    pub const OUT_OF_LABOR_FORCE: i32 = 8;
}

/// Weekly labor force recode (`rwkesr1`..`rwkesr5`).
pub mod weekly {
    /// With job or business that week.
    pub const WITH_JOB: [i32; 3] = [1, 2, 3];
    /// No job, looking for work or on layoff.
    pub const LOOKING: i32 = 4;
    /// No job, not looking and not on layoff.
    pub const NOT_LOOKING: i32 = 5;
}

/// Main reason for not working (`ersnowrk`).
pub mod not_working_reason {
    pub const RETIRED: i32 = 4;
}

/// Main reason a job ended (`ersend1`, `ersend2`).
pub mod job_end_reason {
    pub const RETIRED: i32 = 2;
}

/// Class of worker (`eclwrk1`, `eclwrk2`): federal, state and local government.
pub mod class_of_worker {
    pub const GOVERNMENT: [i32; 3] = [3, 4, 5];
}

/// Ever served in the armed forces (`eafever`).
pub mod armed_forces {
    pub const NOT_IN_UNIVERSE: i32 = -1;
    pub const YES: i32 = 1;
    pub const NO: i32 = 2;
}

/// Occupation allocation flag (`ajbocc1`, `ajbocc2`).
pub mod occupation_allocation {
    /// Occupation reported directly, not imputed.
    pub const NOT_ALLOCATED: i32 = 0;
}

/// Sentinel used by the survey for "not in universe".
pub const NOT_IN_UNIVERSE: i64 = -1;
