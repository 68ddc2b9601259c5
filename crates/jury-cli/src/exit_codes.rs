//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
pub const NO_DATA: i32 = 1; // Nothing was judged, so no verdict exists
pub const CONFIG_ERROR: i32 = 2; // Bad config, unreadable inputs, missing API key
pub const CANCELLED: i32 = 130; // Ctrl-C; a partial artifact may still be written
