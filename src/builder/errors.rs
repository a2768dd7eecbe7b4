//! Build error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A required API that no package in the build provides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnsatisfiedApi {
    /// Package declaring the requirement
    pub package: String,
    /// The API name
    pub api: String,
}

impl fmt::Display for UnsatisfiedApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` requires API \"{}\"", self.package, self.api)
    }
}

/// Error that aborts a build.
///
/// Every variant is fatal; API name collisions are the only non-fatal
/// condition and are reported as warnings instead.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or unresolvable BSP, compiler, target or dependency, or a
    /// malformed manifest.
    #[error("{message}")]
    Configuration { message: String },

    /// Required APIs left unsatisfied after full resolution.
    #[error("unsatisfied API requirements:{}", format_unsatisfied(.unsatisfied))]
    UnsatisfiedApi { unsatisfied: Vec<UnsatisfiedApi> },

    /// A filesystem operation failed.
    #[error("failed to {operation} `{}`", .path.display())]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The toolchain failed while compiling or archiving a package.
    #[error("failed to build package `{package}`")]
    Compile {
        package: String,
        #[source]
        source: anyhow::Error,
    },

    /// The toolchain failed while linking.
    #[error("failed to link `{}`", .output.display())]
    Link {
        output: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The test executable exited unsuccessfully.
    #[error("Test failure ({package}):\n{output}")]
    TestFailure { package: String, output: String },
}

impl BuildError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        BuildError::Configuration {
            message: message.into(),
        }
    }

    /// Create a configuration error from an `anyhow` chain.
    pub fn config_from(err: anyhow::Error) -> Self {
        BuildError::Configuration {
            message: format!("{:#}", err),
        }
    }

    /// Create a filesystem error.
    pub fn filesystem(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Filesystem {
            operation,
            path: path.into(),
            source,
        }
    }
}

fn format_unsatisfied(unsatisfied: &[UnsatisfiedApi]) -> String {
    let mut out = String::new();
    for entry in unsatisfied {
        out.push_str("\n    ");
        out.push_str(&entry.to_string());
    }
    out
}

/// Result alias for builder operations.
pub type BuildResult<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsatisfied_lists_every_pair() {
        let err = BuildError::UnsatisfiedApi {
            unsatisfied: vec![
                UnsatisfiedApi {
                    package: "apps/blinky".into(),
                    api: "net".into(),
                },
                UnsatisfiedApi {
                    package: "libs/os".into(),
                    api: "console".into(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("`apps/blinky` requires API \"net\""));
        assert!(msg.contains("`libs/os` requires API \"console\""));
    }

    #[test]
    fn test_compile_error_keeps_cause() {
        let err = BuildError::Compile {
            package: "libs/os".into(),
            source: anyhow::anyhow!("cc exited with status 1"),
        };
        let chained = format!("{:#}", anyhow::Error::from(err));
        assert!(chained.contains("libs/os"));
        assert!(chained.contains("cc exited with status 1"));
    }

    #[test]
    fn test_test_failure_message() {
        let err = BuildError::TestFailure {
            package: "libs/os".into(),
            output: "assertion failed".into(),
        };
        assert_eq!(err.to_string(), "Test failure (libs/os):\nassertion failed");
    }
}
