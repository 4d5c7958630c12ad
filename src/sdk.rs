//! SDK client configuration pointing at the emulator.
//!
//! LocalStack checks that credentials are present but never validates them,
//! so a fixed placeholder triple is used.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::config::helpers::optional_env;
use crate::endpoint::{Endpoint, EndpointResolver};
use crate::error::{ConfigError, EndpointNotFound};

pub const PLACEHOLDER_ACCESS_KEY_ID: &str = "a";
pub const PLACEHOLDER_SECRET_ACCESS_KEY: &str = "b";
pub const PLACEHOLDER_SESSION_TOKEN: &str = "c";

/// Region used when neither `AWS_REGION` nor `AWS_DEFAULT_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Static credentials handed to SDK clients.
#[derive(Clone)]
pub struct StaticCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl StaticCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: session_token.map(SecretString::from),
        }
    }

    /// The `a` / `b` / `c` triple accepted by the emulator.
    pub fn placeholder() -> Self {
        Self::new(
            PLACEHOLDER_ACCESS_KEY_ID,
            PLACEHOLDER_SECRET_ACCESS_KEY,
            Some(PLACEHOLDER_SESSION_TOKEN.to_string()),
        )
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(|t| t.expose_secret())
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Configuration for SDK clients talking to the emulator.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    region: String,
    credentials: StaticCredentials,
    resolver: EndpointResolver,
}

impl SdkConfig {
    /// Load the region from the environment and attach placeholder
    /// credentials and `resolver`.
    pub fn load(resolver: EndpointResolver) -> Result<Self, ConfigError> {
        let (key, region) = match optional_env("AWS_REGION")? {
            Some(region) => ("AWS_REGION", Some(region)),
            None => ("AWS_DEFAULT_REGION", optional_env("AWS_DEFAULT_REGION")?),
        };
        Self::with_region(resolver, region.as_deref().unwrap_or(DEFAULT_REGION)).map_err(
            |message| ConfigError::InvalidValue {
                key: key.to_string(),
                message,
            },
        )
    }

    fn with_region(resolver: EndpointResolver, region: &str) -> Result<Self, String> {
        let region = region.trim();
        validate_region(region)?;
        Ok(Self {
            region: region.to_string(),
            credentials: StaticCredentials::placeholder(),
            resolver,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn credentials(&self) -> &StaticCredentials {
        &self.credentials
    }

    pub fn endpoint_resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Consulted per call by SDK clients.
    pub fn resolve_endpoint(&self, service_id: &str) -> Result<Endpoint, EndpointNotFound> {
        self.resolver.resolve(service_id)
    }
}

fn validate_region(region: &str) -> Result<(), String> {
    if region.is_empty() {
        return Err("region must not be empty".to_string());
    }
    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "'{region}' is not a valid region (expected e.g. 'us-east-1')"
        ));
    }
    Ok(())
}
