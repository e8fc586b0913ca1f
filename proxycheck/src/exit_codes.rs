#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more scenarios failed (or the run stopped early under --exit-on-fail).
    ScenariosFailed = 1,

    /// Invalid CLI/config/options (bad flags, unreadable or malformed config, invalid base URL).
    InvalidInput = 2,

    /// Internal/runtime error (report IO, output encoding).
    RuntimeError = 3,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_outcome(all_passed: bool) -> Self {
        if all_passed {
            Self::Success
        } else {
            Self::ScenariosFailed
        }
    }
}
