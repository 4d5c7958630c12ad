//! Routing SDK service identifiers to the container's published ports.
//!
//! Each supported service listens on a fixed internal port inside the
//! LocalStack image. [`SERVICE_ROUTES`] is that table; adding a service is a
//! new row, not a new branch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::EndpointNotFound;
use crate::runtime::ContainerDetails;
use crate::services::ServiceRegistry;

/// Host used for bindings on all interfaces.
pub const DEFAULT_ENDPOINT_HOST: &str = "127.0.0.1";

/// One row of the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRoute {
    /// Identifier the SDK passes when resolving an endpoint.
    pub service_id: &'static str,
    /// Name used in the `SERVICES` variable; the route is enabled when the
    /// registry contains it.
    pub name: &'static str,
    /// Port the service listens on inside the container.
    pub port: u16,
}

impl ServiceRoute {
    pub fn is_enabled(&self, services: &ServiceRegistry) -> bool {
        services.contains(self.name)
    }
}

const fn route(service_id: &'static str, name: &'static str, port: u16) -> ServiceRoute {
    ServiceRoute {
        service_id,
        name,
        port,
    }
}

/// Per-service ports of the LocalStack image (pre-edge layout).
pub static SERVICE_ROUTES: &[ServiceRoute] = &[
    route("API Gateway", "apigateway", 4567),
    route("Kinesis", "kinesis", 4568),
    route("DynamoDB", "dynamodb", 4569),
    route("DynamoDB Streams", "dynamodbstreams", 4570),
    route("Elasticsearch Service", "es", 4571),
    route("S3", "s3", 4572),
    route("Firehose", "firehose", 4573),
    route("Lambda", "lambda", 4574),
    route("SNS", "sns", 4575),
    route("SQS", "sqs", 4576),
    route("Redshift", "redshift", 4577),
    route("SES", "ses", 4579),
    route("Route 53", "route53", 4580),
    route("CloudFormation", "cloudformation", 4581),
    route("CloudWatch", "cloudwatch", 4582),
    route("SSM", "ssm", 4583),
    route("Secrets Manager", "secretsmanager", 4584),
    route("SFN", "stepfunctions", 4585),
    route("CloudWatch Logs", "logs", 4586),
    route("STS", "sts", 4592),
    route("IAM", "iam", 4593),
];

/// A resolved service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Resolves service identifiers to `http://host:port` on the container.
///
/// Immutable once built; clone it freely into SDK clients.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    routes: &'static [ServiceRoute],
    services: Arc<ServiceRegistry>,
    /// Internal port → `host:port` authority.
    authorities: Arc<HashMap<u16, String>>,
}

impl EndpointResolver {
    /// Build a resolver over the container's published ports.
    ///
    /// Bindings on a wildcard address are reached through `endpoint_host`.
    pub fn new(
        routes: &'static [ServiceRoute],
        services: Arc<ServiceRegistry>,
        container: &ContainerDetails,
        endpoint_host: &str,
    ) -> Self {
        let authorities = container
            .ports
            .iter()
            .map(|(internal, published)| {
                let host = match published.host_ip.as_deref() {
                    None | Some("" | "0.0.0.0" | "::") => endpoint_host,
                    Some(ip) => ip,
                };
                let authority = if host.contains(':') {
                    format!("[{}]:{}", host, published.host_port)
                } else {
                    format!("{}:{}", host, published.host_port)
                };
                (*internal, authority)
            })
            .collect();

        Self {
            routes,
            services,
            authorities: Arc::new(authorities),
        }
    }

    /// Resolve the endpoint for an SDK service identifier.
    ///
    /// Returns [`EndpointNotFound`] when the service has no route, is not in
    /// the registry, or its port is not published; the SDK should then use
    /// its default resolution.
    pub fn resolve(&self, service_id: &str) -> Result<Endpoint, EndpointNotFound> {
        let not_found = || EndpointNotFound {
            service_id: service_id.to_string(),
        };

        let route = self
            .routes
            .iter()
            .find(|r| r.service_id == service_id && r.is_enabled(&self.services))
            .ok_or_else(not_found)?;

        self.endpoint_for(route).ok_or_else(not_found)
    }

    /// Every enabled route with its resolved endpoint, in table order.
    pub fn endpoints(&self) -> Vec<(ServiceRoute, Endpoint)> {
        self.routes
            .iter()
            .filter(|r| r.is_enabled(&self.services))
            .filter_map(|r| self.endpoint_for(r).map(|e| (*r, e)))
            .collect()
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    fn endpoint_for(&self, route: &ServiceRoute) -> Option<Endpoint> {
        let Some(authority) = self.authorities.get(&route.port) else {
            tracing::warn!(
                "Port {} for service '{}' is not published by the container",
                route.port,
                route.name
            );
            return None;
        };
        match Url::parse(&format!("http://{authority}")) {
            Ok(url) => Some(Endpoint { url }),
            Err(e) => {
                tracing::warn!(
                    "Invalid endpoint '{}' for service '{}': {}",
                    authority,
                    route.name,
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::PublishedPort;

    fn container(ports: &[(u16, Option<&str>, u16)]) -> ContainerDetails {
        ContainerDetails {
            id: "c1".to_string(),
            ports: ports
                .iter()
                .map(|(internal, ip, host)| {
                    (
                        *internal,
                        PublishedPort {
                            host_ip: ip.map(str::to_string),
                            host_port: *host,
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    fn resolver(names: &[&str], ports: &[(u16, Option<&str>, u16)]) -> EndpointResolver {
        let services = ServiceRegistry::from_names(names.iter().copied()).unwrap();
        EndpointResolver::new(
            SERVICE_ROUTES,
            Arc::new(services),
            &container(ports),
            DEFAULT_ENDPOINT_HOST,
        )
    }

    #[test]
    fn test_routes_are_unique() {
        for (i, a) in SERVICE_ROUTES.iter().enumerate() {
            for b in &SERVICE_ROUTES[i + 1..] {
                assert_ne!(a.service_id, b.service_id);
                assert_ne!(a.name, b.name);
                assert_ne!(a.port, b.port);
            }
        }
    }

    #[test]
    fn test_resolve_registered_service() {
        let r = resolver(
            &["dynamodb", "kinesis"],
            &[(4569, Some("0.0.0.0"), 32771), (4568, None, 32772)],
        );

        let endpoint = r.resolve("DynamoDB").unwrap();
        assert_eq!(endpoint.url.port(), Some(32771));
        assert_eq!(endpoint.url.host_str(), Some("127.0.0.1"));
        assert_eq!(endpoint.to_string(), "http://127.0.0.1:32771/");

        assert_eq!(r.resolve("Kinesis").unwrap().url.port(), Some(32772));
    }

    #[test]
    fn test_resolve_unregistered_service_falls_back() {
        let r = resolver(&["dynamodb"], &[(4569, None, 1), (4572, None, 2)]);

        // Port published but S3 was never requested.
        assert_eq!(
            r.resolve("S3"),
            Err(EndpointNotFound {
                service_id: "S3".to_string()
            })
        );
        assert!(r.resolve("Unknown Service").is_err());
        assert!(r.resolve("dynamodb").is_err());
    }

    #[test]
    fn test_resolve_unpublished_port() {
        let r = resolver(&["sqs"], &[]);
        assert!(r.resolve("SQS").is_err());
    }

    #[test]
    fn test_empty_host_ip_is_wildcard() {
        let r = resolver(&["s3"], &[(4572, Some(""), 40000)]);
        assert_eq!(
            r.resolve("S3").unwrap().url.as_str(),
            "http://127.0.0.1:40000/"
        );
    }

    #[test]
    fn test_ipv6_wildcard_uses_endpoint_host() {
        let r = resolver(&["sqs"], &[(4576, Some("::"), 40001)]);
        assert_eq!(
            r.resolve("SQS").unwrap().url.as_str(),
            "http://127.0.0.1:40001/"
        );
    }

    #[test]
    fn test_specific_host_ip_is_kept() {
        let r = resolver(&["sns"], &[(4575, Some("192.168.1.20"), 4000)]);
        assert_eq!(
            r.resolve("SNS").unwrap().url.as_str(),
            "http://192.168.1.20:4000/"
        );
    }

    #[test]
    fn test_endpoints_lists_enabled_routes() {
        let r = resolver(
            &["s3", "dynamodb"],
            &[(4569, None, 10), (4572, None, 11), (4576, None, 12)],
        );
        let names: Vec<_> = r.endpoints().into_iter().map(|(route, _)| route.name).collect();
        assert_eq!(names, ["dynamodb", "s3"]);
    }

    #[test]
    fn test_resolver_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<EndpointResolver>();
    }
}
