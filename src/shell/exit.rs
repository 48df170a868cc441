use std::fmt;

/// Exit status of a command, stage or input line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const GENERAL_ERROR: ExitCode = ExitCode(1);
    /// Bad arguments or usage.
    pub const MISUSE: ExitCode = ExitCode(2);
    /// Aggregate failure reported by meta-commands such as `xargs`.
    pub const CMD_EXEC_FAIL: ExitCode = ExitCode(123);
    pub const CMD_NOT_FOUND: ExitCode = ExitCode(126);
    /// The program exists but cannot be run.
    pub const CMD_NOT_EXECUTABLE: ExitCode = ExitCode(127);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_values() {
        assert_eq!(ExitCode::SUCCESS.code(), 0);
        assert_eq!(ExitCode::GENERAL_ERROR.code(), 1);
        assert_eq!(ExitCode::MISUSE.code(), 2);
        assert_eq!(ExitCode::CMD_EXEC_FAIL.code(), 123);
        assert_eq!(ExitCode::CMD_NOT_FOUND.code(), 126);
        assert_eq!(ExitCode::CMD_NOT_EXECUTABLE.code(), 127);
    }

    #[test]
    fn renders_as_number() {
        assert_eq!(ExitCode::MISUSE.to_string(), "2");
        assert!(ExitCode::default().is_success());
    }
}
