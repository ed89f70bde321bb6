use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// Kernels validate every configuration argument here so that the frame loop
/// never discovers a bad `m` or window length through a divide-by-zero deep
/// in the estimator math.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, KernelLifecycle};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct WindowsPerFrame {
        m: usize,
    }

    impl KernelLifecycle for WindowsPerFrame {
        type Config = usize;

        fn try_new(m: Self::Config) -> Result<Self, ConfigError> {
            if m < 2 {
                return Err(ConfigError::InvalidArgument {
                    arg: "m",
                    reason: "at least two windows per frame are required",
                });
            }
            Ok(Self { m })
        }
    }

    #[test]
    fn lifecycle_constructor_accepts_valid_config() {
        let kernel = WindowsPerFrame::try_new(4).expect("valid config");
        assert_eq!(kernel.m, 4);
    }

    #[test]
    fn lifecycle_constructor_rejects_invalid_config() {
        let err = WindowsPerFrame::try_new(1).expect_err("invalid config");
        assert_eq!(
            err,
            ConfigError::InvalidArgument {
                arg: "m",
                reason: "at least two windows per frame are required",
            }
        );
    }
}
