// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::middleware::Middleware;
use crate::Error;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Resolve the default region from the environment.
///
/// Reads `AWS_DEFAULT_REGION` through the context so tests can mock it.
pub fn default_region(ctx: &awsreq_core::Context) -> Option<String> {
    ctx.env_var("AWS_DEFAULT_REGION")
}

/// The wire dialect a service speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    /// AWS JSON RPC, with its x-amz-json version ("1.0" or "1.1").
    Json(&'static str),
    /// REST with JSON bodies.
    RestJson,
    /// REST with XML bodies.
    RestXml,
    /// The form-encoded query protocol with XML responses.
    Query,
    /// The EC2 variant of the query protocol.
    Ec2,
}

impl Protocol {
    /// Whether request bodies are JSON documents.
    pub fn is_json(&self) -> bool {
        matches!(self, Protocol::Json(_) | Protocol::RestJson)
    }

    /// Whether the dialect encodes the request as a form body.
    pub fn is_form(&self) -> bool {
        matches!(self, Protocol::Query | Protocol::Ec2)
    }
}

/// The AWS partition a region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Partition {
    /// The standard commercial partition.
    #[default]
    Aws,
    /// China regions.
    AwsCn,
    /// GovCloud regions.
    AwsUsGov,
}

impl Partition {
    /// The DNS suffix endpoints in this partition are synthesized with.
    pub fn dns_suffix(&self) -> &'static str {
        match self {
            Partition::Aws | Partition::AwsUsGov => "amazonaws.com",
            Partition::AwsCn => "amazonaws.com.cn",
        }
    }
}

/// Static description of one AWS service as seen by the client runtime.
///
/// Built once per service and shared by every operation: region, dialect,
/// endpoint overrides, timeout, middlewares, and the service-specific error
/// codes the decoder should recognize.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    region: String,
    partition: Partition,
    service_name: String,
    signing_name: Option<String>,
    protocol: Protocol,
    api_version: String,
    endpoint: Option<String>,
    service_endpoints: HashMap<String, String>,
    partition_endpoint: Option<String>,
    timeout: Duration,
    middlewares: Vec<Arc<dyn Middleware>>,
    possible_error_codes: Vec<String>,
    amz_target_prefix: Option<String>,
    xml_namespace: Option<String>,
}

impl ServiceConfig {
    /// Start building a config for `service_name` in `region`.
    pub fn builder(
        service_name: &str,
        region: &str,
        protocol: Protocol,
        api_version: &str,
    ) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            region: region.to_string(),
            partition: Partition::default(),
            service_name: service_name.to_string(),
            signing_name: None,
            protocol,
            api_version: api_version.to_string(),
            endpoint: None,
            service_endpoints: HashMap::new(),
            partition_endpoint: None,
            timeout: Duration::from_secs(20),
            middlewares: Vec::new(),
            possible_error_codes: Vec::new(),
            amz_target_prefix: None,
            xml_namespace: None,
        }
    }

    /// The region requests are signed for.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The service's endpoint prefix, e.g. `s3` or `dynamodb`.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The name used in the credential scope.
    ///
    /// Defaults to the service name unless overridden.
    pub fn signing_name(&self) -> &str {
        self.signing_name.as_deref().unwrap_or(&self.service_name)
    }

    /// The wire dialect.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// The service API version, sent with query-dialect requests.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Per-attempt request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The configured middleware chain, in configuration order.
    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    /// Service-specific error codes the decoder should classify as such.
    pub fn possible_error_codes(&self) -> &[String] {
        &self.possible_error_codes
    }

    /// The `X-Amz-Target` prefix for JSON RPC services, when required.
    pub fn amz_target_prefix(&self) -> Option<&str> {
        self.amz_target_prefix.as_deref()
    }

    /// The XML namespace stamped onto rest_xml request bodies.
    pub fn xml_namespace(&self) -> Option<&str> {
        self.xml_namespace.as_deref()
    }

    /// Resolve the endpoint URL for this service.
    ///
    /// Resolution order: explicit endpoint, then the per-region endpoint
    /// table, then the partition-wide endpoint, then the synthesized
    /// `https://<service>.<region>.<dns-suffix>`.
    pub fn endpoint_url(&self) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.clone();
        }
        if let Some(host) = self.service_endpoints.get(&self.region) {
            return Self::as_url(host);
        }
        if let Some(host) = &self.partition_endpoint {
            return Self::as_url(host);
        }
        format!(
            "https://{}.{}.{}",
            self.service_name,
            self.region,
            self.partition.dns_suffix()
        )
    }

    fn as_url(host: &str) -> String {
        if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    region: String,
    partition: Partition,
    service_name: String,
    signing_name: Option<String>,
    protocol: Protocol,
    api_version: String,
    endpoint: Option<String>,
    service_endpoints: HashMap<String, String>,
    partition_endpoint: Option<String>,
    timeout: Duration,
    middlewares: Vec<Arc<dyn Middleware>>,
    possible_error_codes: Vec<String>,
    amz_target_prefix: Option<String>,
    xml_namespace: Option<String>,
}

impl ServiceConfigBuilder {
    /// Set the partition. Defaults to the commercial partition.
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    /// Override the name used in the credential scope.
    pub fn with_signing_name(mut self, signing_name: impl Into<String>) -> Self {
        self.signing_name = Some(signing_name.into());
        self
    }

    /// Point the service at an explicit endpoint, e.g. a local test server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a per-region endpoint override from the endpoints manifest.
    pub fn with_service_endpoint(
        mut self,
        region: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        self.service_endpoints.insert(region.into(), host.into());
        self
    }

    /// Set the partition-wide endpoint used when the region has no entry.
    pub fn with_partition_endpoint(mut self, host: impl Into<String>) -> Self {
        self.partition_endpoint = Some(host.into());
        self
    }

    /// Set the per-attempt request timeout. Defaults to 20 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append a middleware to the chain.
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Declare the service-specific error codes the decoder may construct.
    pub fn with_possible_error_codes(
        mut self,
        codes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.possible_error_codes
            .extend(codes.into_iter().map(Into::into));
        self
    }

    /// Set the `X-Amz-Target` prefix for JSON RPC services.
    pub fn with_amz_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.amz_target_prefix = Some(prefix.into());
        self
    }

    /// Set the XML namespace for rest_xml request bodies.
    pub fn with_xml_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.xml_namespace = Some(namespace.into());
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<ServiceConfig, Error> {
        if self.region.is_empty() {
            return Err(Error::config("region must not be empty"));
        }
        if self.service_name.is_empty() {
            return Err(Error::config("service name must not be empty"));
        }
        if let Some(endpoint) = &self.endpoint {
            if endpoint.parse::<http::Uri>().is_err() {
                return Err(Error::config(format!("invalid endpoint url: {endpoint}")));
            }
        }

        Ok(ServiceConfig {
            region: self.region,
            partition: self.partition,
            service_name: self.service_name,
            signing_name: self.signing_name,
            protocol: self.protocol,
            api_version: self.api_version,
            endpoint: self.endpoint,
            service_endpoints: self.service_endpoints,
            partition_endpoint: self.partition_endpoint,
            timeout: self.timeout,
            middlewares: self.middlewares,
            possible_error_codes: self.possible_error_codes,
            amz_target_prefix: self.amz_target_prefix,
            xml_namespace: self.xml_namespace,
        })
    }
}
