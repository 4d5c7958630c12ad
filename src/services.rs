//! Service descriptors and the ordered registry handed to the emulator.
//!
//! The registry renders itself into the `SERVICES` variable the LocalStack
//! image reads at startup, e.g. `SERVICES=dynamodb,kinesis`.

use std::fmt;

use crate::error::ServiceError;

/// Delimiter between service names in the startup variable.
pub const SERVICES_DELIMITER: char = ',';

/// Name of the environment variable carrying the requested services.
pub const SERVICES_ENV: &str = "SERVICES";

/// A single emulated API requested from the container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceDescriptor {
    name: String,
}

impl ServiceDescriptor {
    /// Create a descriptor, rejecting names that would corrupt the
    /// delimited startup variable.
    pub fn new(name: impl Into<String>) -> Result<Self, ServiceError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ServiceError::Empty);
        }
        if name.contains(SERVICES_DELIMITER) {
            return Err(ServiceError::InvalidName {
                name,
                reason: format!("must not contain '{SERVICES_DELIMITER}'"),
            });
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ServiceError::InvalidName {
                name,
                reason: "must not contain whitespace".to_string(),
            });
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Ordered collection of service descriptors.
///
/// Duplicate names are kept as given; callers own deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from names, failing on the first invalid one.
    pub fn from_names<I, S>(names: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(ServiceDescriptor::new)
            .collect::<Result<Vec<_>, _>>()
            .map(|services| Self { services })
    }

    /// Parse a delimited list such as `"dynamodb, kinesis"`.
    ///
    /// Segments are trimmed and empty segments skipped, so an empty string
    /// yields an empty registry.
    pub fn parse(list: &str) -> Result<Self, ServiceError> {
        Self::from_names(
            list.split(SERVICES_DELIMITER)
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    /// Append a descriptor.
    pub fn push(&mut self, service: ServiceDescriptor) {
        self.services.push(service);
    }

    /// Builder-style [`push`](Self::push) taking a raw name.
    pub fn with(mut self, name: impl Into<String>) -> Result<Self, ServiceError> {
        self.push(ServiceDescriptor::new(name)?);
        Ok(self)
    }

    /// Case-sensitive exact membership test.
    pub fn contains(&self, name: &str) -> bool {
        self.services.iter().any(|s| s.name == name)
    }

    /// Join all names with [`SERVICES_DELIMITER`], preserving order.
    pub fn render_startup_variable(&self) -> String {
        let mut rendered = String::new();
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                rendered.push(SERVICES_DELIMITER);
            }
            rendered.push_str(name);
        }
        rendered
    }

    /// The full `SERVICES=...` environment entry.
    pub fn startup_env(&self) -> String {
        format!("{}={}", SERVICES_ENV, self.render_startup_variable())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(ServiceDescriptor::name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl FromIterator<ServiceDescriptor> for ServiceRegistry {
    fn from_iter<T: IntoIterator<Item = ServiceDescriptor>>(iter: T) -> Self {
        Self {
            services: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ServiceRegistry {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.services.iter()
    }
}
