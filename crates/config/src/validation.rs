// 配置验证

use crate::{ConfigError, ConfigResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// Fail with a validation error naming `field` unless `condition` holds.
pub(crate) fn ensure(condition: bool, field: &str, message: &str) -> ConfigResult<()> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{field}: {message}")))
    }
}
