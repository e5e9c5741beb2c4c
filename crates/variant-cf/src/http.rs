//! reqwest-backed Cloud Foundry client
//!
//! Talks to the CF v3 API for apps, processes, routes, spaces, and orgs, and
//! to the CF-Networking external policies API for policy reads and writes.
//! Authentication is a UAA password grant; the token endpoint is discovered
//! from the API root. The session lives behind a mutex and is refreshed by
//! the accessor when expired.

use crate::client::CloudController;
use crate::session::Session;
use crate::{App, CfError, CfResult, Metadata, Organization, Process, ProcessScale, Route, Space};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;
use variant_core::{Policy, PortRange, Protocol};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: &str = "100";

/// HTTP client for the Cloud Foundry control plane
pub struct CfApiClient {
    http: reqwest::Client,
    api_endpoint: String,
    username: String,
    password: String,
    session: Mutex<Option<Session>>,
}

impl CfApiClient {
    /// Create a client for the given API endpoint and credentials. No
    /// network traffic happens until the first call.
    pub fn new(
        api_endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> CfResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            session: Mutex::new(None),
        })
    }

    /// Current bearer token, refreshing the session when expired. A failed
    /// refresh marks the cached session expired so the next call retries.
    async fn token(&self) -> CfResult<String> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if !session.is_expired() {
                return Ok(session.token.clone());
            }
        }
        match self.request_token().await {
            Ok(token) => {
                let session = Session::new(token);
                let value = session.token.clone();
                *guard = Some(session);
                Ok(value)
            }
            Err(err) => {
                if let Some(session) = guard.as_mut() {
                    session.expire_now();
                }
                Err(err)
            }
        }
    }

    /// Password-grant token request against the login endpoint advertised by
    /// the API root.
    async fn request_token(&self) -> CfResult<String> {
        #[derive(Deserialize)]
        struct Link {
            href: String,
        }
        #[derive(Deserialize)]
        struct RootLinks {
            login: Link,
        }
        #[derive(Deserialize)]
        struct RootInfo {
            links: RootLinks,
        }
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let root: RootInfo = {
            let resp = self.http.get(format!("{}/", self.api_endpoint)).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(CfError::auth(format!(
                    "API root returned status {}",
                    status.as_u16()
                )));
            }
            resp.json().await?
        };

        let token_url = format!("{}/oauth/token", root.links.login.href.trim_end_matches('/'));
        let resp = self
            .http
            .post(&token_url)
            .basic_auth("cf", Some(""))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CfError::auth(format!(
                "token request returned status {}: {}",
                status.as_u16(),
                body
            )));
        }
        let token: TokenResponse = resp.json().await?;
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CfResult<T> {
        let token = self.token().await?;
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CfError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> CfResult<()> {
        let token = self.token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CfError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Fetch every page of a v3 list endpoint.
    async fn get_all_pages<T: DeserializeOwned>(&self, first_url: String) -> CfResult<Vec<T>> {
        let mut resources = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            resources.extend(page.resources);
            next = page.pagination.next.map(|link| link.href);
        }
        Ok(resources)
    }

    fn v3_url(&self, path: &str, params: &[(&str, &str)]) -> CfResult<String> {
        let base = format!("{}{}", self.api_endpoint, path);
        if params.is_empty() {
            return Ok(base);
        }
        Url::parse_with_params(&base, params)
            .map(|u| u.to_string())
            .map_err(|e| CfError::decode(e.to_string()))
    }
}

// v3 wire envelopes

#[derive(Deserialize)]
struct Page<T> {
    pagination: Pagination,
    resources: Vec<T>,
}

#[derive(Deserialize)]
struct Pagination {
    next: Option<PageLink>,
}

#[derive(Deserialize)]
struct PageLink {
    href: String,
}

#[derive(Deserialize)]
struct Relationship {
    data: RelationshipData,
}

#[derive(Deserialize)]
struct RelationshipData {
    guid: String,
}

#[derive(Deserialize)]
struct AppResource {
    guid: String,
    name: String,
    relationships: AppRelationships,
}

#[derive(Deserialize)]
struct AppRelationships {
    space: Relationship,
}

#[derive(Deserialize)]
struct AppDetail {
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct ProcessResource {
    guid: String,
    #[serde(rename = "type")]
    process_type: String,
    #[serde(default)]
    instances: Option<u32>,
    #[serde(default)]
    memory_in_mb: Option<u64>,
    #[serde(default)]
    disk_in_mb: Option<u64>,
}

#[derive(Deserialize)]
struct RouteResource {
    host: String,
    relationships: RouteRelationships,
}

#[derive(Deserialize)]
struct RouteRelationships {
    domain: Relationship,
}

#[derive(Deserialize)]
struct SpaceResource {
    guid: String,
    name: String,
    relationships: SpaceRelationships,
}

#[derive(Deserialize)]
struct SpaceRelationships {
    organization: Relationship,
}

#[derive(Deserialize)]
struct OrganizationResource {
    guid: String,
    name: String,
}

// CF-Networking policies wire mapping

#[derive(Serialize, Deserialize)]
struct PolicyEnvelope {
    policies: Vec<PolicyWire>,
}

#[derive(Serialize, Deserialize)]
struct PolicyWire {
    source: PolicySource,
    destination: PolicyDestination,
}

#[derive(Serialize, Deserialize)]
struct PolicySource {
    id: String,
}

#[derive(Serialize, Deserialize)]
struct PolicyDestination {
    id: String,
    protocol: Protocol,
    ports: PortsWire,
}

#[derive(Serialize, Deserialize)]
struct PortsWire {
    start: u16,
    end: u16,
}

impl From<PolicyWire> for Policy {
    fn from(wire: PolicyWire) -> Self {
        Policy {
            source: wire.source.id,
            destination: wire.destination.id,
            protocol: wire.destination.protocol,
            ports: PortRange {
                start: wire.destination.ports.start,
                end: wire.destination.ports.end,
            },
        }
    }
}

impl From<&Policy> for PolicyWire {
    fn from(policy: &Policy) -> Self {
        PolicyWire {
            source: PolicySource {
                id: policy.source.clone(),
            },
            destination: PolicyDestination {
                id: policy.destination.clone(),
                protocol: policy.protocol,
                ports: PortsWire {
                    start: policy.ports.start,
                    end: policy.ports.end,
                },
            },
        }
    }
}

#[async_trait]
impl CloudController for CfApiClient {
    async fn apps_by_label_selector(&self, selector: &str) -> CfResult<Vec<App>> {
        debug!(selector, "listing apps by label selector");
        let url = self.v3_url(
            "/v3/apps",
            &[("label_selector", selector), ("per_page", PAGE_SIZE)],
        )?;
        let resources: Vec<AppResource> = self.get_all_pages(url).await?;
        Ok(resources
            .into_iter()
            .map(|app| App {
                guid: app.guid,
                name: app.name,
                space_guid: app.relationships.space.data.guid,
            })
            .collect())
    }

    async fn app_processes(&self, guid: &str) -> CfResult<Vec<Process>> {
        let url = self.v3_url(
            &format!("/v3/apps/{}/processes", guid),
            &[("per_page", PAGE_SIZE)],
        )?;
        let resources: Vec<ProcessResource> = self.get_all_pages(url).await?;
        Ok(resources
            .into_iter()
            .map(|p| Process {
                guid: p.guid,
                process_type: p.process_type,
                instances: p.instances,
                memory_in_mb: p.memory_in_mb,
                disk_in_mb: p.disk_in_mb,
            })
            .collect())
    }

    async fn app_routes(&self, guid: &str) -> CfResult<Vec<Route>> {
        let url = self.v3_url(
            &format!("/v3/apps/{}/routes", guid),
            &[("per_page", PAGE_SIZE)],
        )?;
        let resources: Vec<RouteResource> = self.get_all_pages(url).await?;
        Ok(resources
            .into_iter()
            .map(|r| Route {
                host: r.host,
                domain_guid: r.relationships.domain.data.guid,
            })
            .collect())
    }

    async fn app_metadata(&self, guid: &str) -> CfResult<Metadata> {
        let url = format!("{}/v3/apps/{}", self.api_endpoint, guid);
        match self.get_json::<AppDetail>(&url).await {
            Ok(detail) => Ok(detail.metadata.unwrap_or_default()),
            // A workload that disappeared between listing and metadata fetch
            // reads as empty metadata, not an error.
            Err(CfError::Api { status: 404, .. }) => Ok(Metadata::default()),
            Err(err) => Err(err),
        }
    }

    async fn space(&self, guid: &str) -> CfResult<Space> {
        let url = format!("{}/v3/spaces/{}", self.api_endpoint, guid);
        let resource: SpaceResource = self.get_json(&url).await?;
        Ok(Space {
            guid: resource.guid,
            name: resource.name,
            organization_guid: resource.relationships.organization.data.guid,
        })
    }

    async fn organization(&self, guid: &str) -> CfResult<Organization> {
        let url = format!("{}/v3/organizations/{}", self.api_endpoint, guid);
        let resource: OrganizationResource = self.get_json(&url).await?;
        Ok(Organization {
            guid: resource.guid,
            name: resource.name,
        })
    }

    async fn policies(&self, source: &str) -> CfResult<Vec<Policy>> {
        let url = self.v3_url("/networking/v1/external/policies", &[("id", source)])?;
        let envelope: PolicyEnvelope = self.get_json(&url).await?;
        Ok(envelope
            .policies
            .into_iter()
            .map(Policy::from)
            .filter(|p| p.source == source)
            .collect())
    }

    async fn create_policy(&self, policy: &Policy) -> CfResult<()> {
        let url = format!("{}/networking/v1/external/policies", self.api_endpoint);
        let envelope = PolicyEnvelope {
            policies: vec![PolicyWire::from(policy)],
        };
        self.post_json(&url, &envelope).await
    }

    async fn remove_policy(&self, policy: &Policy) -> CfResult<()> {
        let url = format!(
            "{}/networking/v1/external/policies/delete",
            self.api_endpoint
        );
        let envelope = PolicyEnvelope {
            policies: vec![PolicyWire::from(policy)],
        };
        self.post_json(&url, &envelope).await
    }

    async fn scale_web_process(&self, guid: &str, scale: &ProcessScale) -> CfResult<()> {
        let url = format!(
            "{}/v3/apps/{}/processes/web/actions/scale",
            self.api_endpoint, guid
        );
        self.post_json(&url, scale).await
    }
}
