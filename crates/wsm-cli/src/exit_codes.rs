//! Process exit codes

/// Operation completed without errors
pub const SUCCESS: i32 = 0;

/// Any failure
pub const ERROR: i32 = 1;
