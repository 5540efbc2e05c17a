/// Error code registry for osworkflow
///
/// Error codes are organized by category:
/// - 1000-1999: Parse errors (OSW documents, steps, results)
/// - 3000-3999: Storage errors
/// - 4000-4999: Measure errors
/// - 5000-5999: Workflow errors
/// - 7000-7999: Validation errors
pub struct ErrorCode;

impl ErrorCode {
    // Parse errors (1000-1999)
    pub const PARSE_GENERIC: u16 = 1000;
    pub const PARSE_INVALID_JSON: u16 = 1001;
    pub const PARSE_NOT_AN_OBJECT: u16 = 1002;
    pub const PARSE_INVALID_STEP: u16 = 1003;
    pub const PARSE_INVALID_RESULT: u16 = 1004;
    pub const PARSE_INVALID_RUN_OPTIONS: u16 = 1005;
    pub const PARSE_INVALID_TIMESTAMP: u16 = 1006;
    pub const PARSE_INVALID_VALUE: u16 = 1007;
    pub const PARSE_INVALID_CONFIG: u16 = 1008;

    // Storage errors (3000-3999)
    pub const STORAGE_GENERIC: u16 = 3000;
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_PERMISSION_DENIED: u16 = 3002;
    pub const STORAGE_NOT_FOUND: u16 = 3004;
    pub const STORAGE_ALREADY_EXISTS: u16 = 3005;
    pub const STORAGE_NO_PATH: u16 = 3013;
    pub const STORAGE_COPY_FAILED: u16 = 3014;

    // Measure errors (4000-4999)
    pub const MEASURE_NOT_FOUND: u16 = 4001;
    pub const MEASURE_UNLOADABLE: u16 = 4002;
    pub const MEASURE_TYPE_MISMATCH: u16 = 4003;
    pub const MEASURE_NO_MEASURE_PATH: u16 = 4004;

    // Workflow errors (5000-5999)
    pub const WORKFLOW_HALTED: u16 = 5001;
    pub const WORKFLOW_STEP_IN_PROGRESS: u16 = 5002;
    pub const WORKFLOW_NO_STEP_IN_PROGRESS: u16 = 5003;
    pub const WORKFLOW_NO_CURRENT_STEP: u16 = 5004;

    // Validation errors (7000-7999)
    pub const VALIDATION_GENERIC: u16 = 7000;
    pub const VALIDATION_MISSING_ARGUMENT: u16 = 7001;
    pub const VALIDATION_INVALID_TYPE: u16 = 7002;
    pub const VALIDATION_OUT_OF_RANGE: u16 = 7003;
    pub const VALIDATION_VARIANT_MISMATCH: u16 = 7004;
    pub const VALIDATION_INVALID_INPUT: u16 = 7008;
    pub const VALIDATION_INVALID_DATA: u16 = 7009;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        // Parse errors
        1000 => "Generic parse error",
        1001 => "Invalid JSON syntax",
        1002 => "JSON value is not an object",
        1003 => "Invalid workflow step",
        1004 => "Invalid workflow step result",
        1005 => "Invalid run options",
        1006 => "Invalid timestamp",
        1007 => "Invalid argument value",
        1008 => "Invalid configuration file",

        // Storage errors
        3000 => "Generic storage error",
        3001 => "Storage I/O error",
        3002 => "Storage permission denied",
        3004 => "Storage item not found",
        3005 => "Storage item already exists",
        3013 => "Workflow is not bound to a file",
        3014 => "Failed to copy directory",

        // Measure errors
        4001 => "Measure not found",
        4002 => "Measure could not be loaded",
        4003 => "Measure type mismatch",
        4004 => "No measure path available",

        // Workflow errors
        5001 => "Workflow has been halted",
        5002 => "A step is already in progress",
        5003 => "No step is in progress",
        5004 => "Workflow has no current step",

        // Validation errors
        7000 => "Generic validation error",
        7001 => "Required argument is missing",
        7002 => "Invalid argument type",
        7003 => "Value out of allowed range",
        7004 => "Variant accessed with the wrong type",
        7008 => "Invalid input",
        7009 => "Invalid data",

        _ => "Unknown error code",
    }
}
