//! Instance identifiers derived from resource URIs.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::client::BASE_URL;
use super::error::LxdError;

/// Path prefix every instance resource URI starts with.
pub const INSTANCES_PREFIX: &str = "/1.0/instances/";

/// Name plus optional project, as encoded in `/1.0/instances/<name>?project=<p>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceIdentifier {
    pub name: String,
    pub project: Option<String>,
}

impl InstanceIdentifier {
    pub fn new(name: impl Into<String>, project: Option<String>) -> Self {
        Self {
            name: name.into(),
            project,
        }
    }

    /// Parse a resource URI as returned by `GET /1.0/instances`.
    ///
    /// Anything that is not `/1.0/instances/<name>` is rejected with
    /// [`LxdError::InvalidResourceUri`].
    pub fn from_resource_uri(uri: &str) -> Result<Self, LxdError> {
        let invalid = || LxdError::InvalidResourceUri {
            uri: uri.to_string(),
            expected: INSTANCES_PREFIX,
        };

        if !uri.starts_with(INSTANCES_PREFIX) {
            return Err(invalid());
        }

        let parsed = Url::parse(BASE_URL)
            .and_then(|base| base.join(uri))
            .map_err(|_| invalid())?;

        let name = parsed
            .path()
            .strip_prefix(INSTANCES_PREFIX)
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .ok_or_else(invalid)?
            .to_string();

        let project = parsed
            .query_pairs()
            .find(|(key, _)| key == "project")
            .map(|(_, value)| value.into_owned());

        Ok(Self { name, project })
    }

    /// Inverse of [`from_resource_uri`](Self::from_resource_uri).
    pub fn to_resource_uri(&self) -> String {
        match &self.project {
            Some(project) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("project", project)
                    .finish();
                format!("{INSTANCES_PREFIX}{}?{query}", self.name)
            }
            None => format!("{INSTANCES_PREFIX}{}", self.name),
        }
    }
}

impl fmt::Display for InstanceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{project}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_with_project() {
        let id = InstanceIdentifier::from_resource_uri("/1.0/instances/web?project=dev").unwrap();
        assert_eq!(
            id,
            InstanceIdentifier::new("web", Some("dev".to_string()))
        );
    }

    #[test]
    fn test_parse_without_project() {
        let id = InstanceIdentifier::from_resource_uri("/1.0/instances/db").unwrap();
        assert_eq!(id, InstanceIdentifier::new("db", None));
        assert_eq!(id.to_string(), "db");
    }

    #[test]
    fn test_round_trip() {
        let uri = "/1.0/instances/builder-01?project=ci";
        let id = InstanceIdentifier::from_resource_uri(uri).unwrap();
        assert_eq!(id.to_resource_uri(), uri);
        assert_eq!(id.to_string(), "ci:builder-01");
    }

    #[test]
    fn test_other_query_parameters_ignored() {
        let id =
            InstanceIdentifier::from_resource_uri("/1.0/instances/web?recursion=1&project=p1")
                .unwrap();
        assert_eq!(id.project.as_deref(), Some("p1"));
    }

    #[test]
    fn test_rejects_wrong_prefix() {
        for uri in [
            "/1.0/images/abc",
            "/1.0/instances",
            "/1.0/instances/",
            "1.0/instances/web",
            "/1.0/instances/web/snapshots/snap0",
            "http://evil/1.0/instances/web",
        ] {
            let result = InstanceIdentifier::from_resource_uri(uri);
            assert!(
                matches!(result, Err(LxdError::InvalidResourceUri { .. })),
                "{uri} should be rejected"
            );
        }
    }
}
