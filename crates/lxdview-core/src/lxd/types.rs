//! Wire and display types for the LXD REST API.
//!
//! The response envelope mirrors what the daemon sends; the resource records
//! keep only the fields the displays use and ignore everything else.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::LxdError;

/// Envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Sync,
    Async,
    Error,
}

/// Every daemon response is wrapped in this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LxdResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
}

impl LxdResponse {
    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Decode `metadata` into `T`. `uri` is only used for the error.
    pub fn decode_metadata<T: DeserializeOwned>(self, uri: &str) -> Result<T, LxdError> {
        serde_json::from_value(self.metadata).map_err(|source| LxdError::Decode {
            uri: uri.to_string(),
            source,
        })
    }
}

/// A container or virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub status: String,
}

/// An image in the local image store, identified by its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePool {
    pub name: String,
}

/// The four resource kinds the service keeps track of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Instances,
    Images,
    Networks,
    StoragePools,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Instances,
        ResourceKind::Images,
        ResourceKind::Networks,
        ResourceKind::StoragePools,
    ];

    /// Collection segment of the REST path (`/1.0/<segment>`).
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Instances => "instances",
            ResourceKind::Images => "images",
            ResourceKind::Networks => "networks",
            ResourceKind::StoragePools => "storage-pools",
        }
    }

    /// Collection endpoint, e.g. `/1.0/storage-pools`.
    pub fn collection_path(self) -> String {
        format!("/1.0/{}", self.as_str())
    }

    /// Human-readable title.
    pub fn title(self) -> &'static str {
        match self {
            ResourceKind::Instances => "Instances",
            ResourceKind::Images => "Images",
            ResourceKind::Networks => "Networks",
            ResourceKind::StoragePools => "Storage Pools",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource shown as one row of a table, by the CLI and the TUI alike.
pub trait ResourceRow: Clone {
    const KIND: ResourceKind;
    /// Column titles, one per entry of [`cells`](Self::cells).
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

impl ResourceRow for Instance {
    const KIND: ResourceKind = ResourceKind::Instances;
    const HEADERS: &'static [&'static str] = &["NAME", "STATUS"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.status.clone()]
    }
}

impl ResourceRow for Image {
    const KIND: ResourceKind = ResourceKind::Images;
    const HEADERS: &'static [&'static str] = &["FINGERPRINT"];

    fn cells(&self) -> Vec<String> {
        vec![self.fingerprint.clone()]
    }
}

impl ResourceRow for Network {
    const KIND: ResourceKind = ResourceKind::Networks;
    const HEADERS: &'static [&'static str] = &["NAME"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

impl ResourceRow for StoragePool {
    const KIND: ResourceKind = ResourceKind::StoragePools;
    const HEADERS: &'static [&'static str] = &["NAME"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

/// Query options for the collection endpoints.
///
/// Only the options that are set end up in the query string, under the
/// daemon's parameter names `all-projects`, `project` and `filter`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub all_projects: Option<bool>,
    pub project: Option<String>,
    pub filter: Option<String>,
}

impl ListOptions {
    pub fn all_projects() -> Self {
        Self {
            all_projects: Some(true),
            ..Self::default()
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// The present options as `(name, value)` pairs, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(all) = self.all_projects {
            pairs.push(("all-projects", all.to_string()));
        }
        if let Some(project) = &self.project {
            pairs.push(("project", project.clone()));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.clone()));
        }
        pairs
    }

    /// URL-encoded query string, or `None` when no option is set.
    pub fn to_query(&self) -> Option<String> {
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return None;
        }
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &pairs {
            serializer.append_pair(name, value);
        }
        Some(serializer.finish())
    }

    /// `path` with the query string appended when there is one.
    pub fn apply_to(&self, path: &str) -> String {
        match self.to_query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }
}
