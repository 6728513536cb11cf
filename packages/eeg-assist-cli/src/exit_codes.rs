pub const SUCCESS: i32 = 0;
/// Bad arguments, unreadable recording or configuration
pub const INPUT_ERROR: i32 = 1;
pub const EXECUTION_ERROR: i32 = 2;
pub const MODEL_NOT_FOUND: i32 = 3;
/// Batch finished with some files failed
pub const PARTIAL_FAILURE: i32 = 4;
