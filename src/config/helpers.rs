//! Environment lookup helpers shared by the config resolvers.

use std::str::FromStr;

use crate::error::ConfigError;

/// Read an environment variable, treating unset and empty as `None`.
///
/// Fails only when the value is present but not valid unicode.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid unicode".to_string(),
        }),
    }
}

/// Parse an optional environment variable, falling back to `default`.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key)? {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(default),
    }
}

/// Serializes env-mutating tests across modules.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_env() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("LOCALSTACK_TEST_HELPER_NUM", " 42 ");
            std::env::set_var("LOCALSTACK_TEST_HELPER_BAD", "forty-two");
            std::env::set_var("LOCALSTACK_TEST_HELPER_EMPTY", "");
        }

        assert_eq!(parse_optional_env("LOCALSTACK_TEST_HELPER_NUM", 0u32), Ok(42));
        assert!(parse_optional_env("LOCALSTACK_TEST_HELPER_BAD", 0u32).is_err());
        assert_eq!(parse_optional_env("LOCALSTACK_TEST_HELPER_EMPTY", 7u32), Ok(7));
        assert_eq!(parse_optional_env("LOCALSTACK_TEST_HELPER_UNSET", 7u32), Ok(7));
        assert_eq!(optional_env("LOCALSTACK_TEST_HELPER_EMPTY"), Ok(None));

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::remove_var("LOCALSTACK_TEST_HELPER_NUM");
            std::env::remove_var("LOCALSTACK_TEST_HELPER_BAD");
            std::env::remove_var("LOCALSTACK_TEST_HELPER_EMPTY");
        }
    }
}
