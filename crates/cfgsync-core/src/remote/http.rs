//! REST client for the configuration service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Map, Value};

use super::{RemoteClient, RemoteError};
use crate::config::TenantContext;
use crate::model::{ConfigObject, ObjectType};

const PAGE_SIZE: u32 = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for `{base_url}/{type_plural}[/{id}]` endpoints with bearer auth.
pub struct HttpRemote {
    tenant: TenantContext,
    client: Client,
}

impl HttpRemote {
    pub fn new(tenant: TenantContext) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("cfgsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Unreachable {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { tenant, client })
    }

    fn collection_url(&self, object_type: ObjectType) -> String {
        format!("{}/{}", self.tenant.base_url, object_type.plural())
    }

    fn object_url(&self, object_type: ObjectType, id: u64) -> String {
        format!("{}/{}/{}", self.tenant.base_url, object_type.plural(), id)
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Value, RemoteError> {
        let request = match self.tenant.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &body, resource));
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode {
            message: format!("{resource}: {e}"),
        })
    }

    fn into_object(object_type: ObjectType, value: Value) -> Result<ConfigObject, RemoteError> {
        let Value::Object(content) = value else {
            return Err(RemoteError::Decode {
                message: format!("expected a {object_type} object"),
            });
        };
        ConfigObject::from_content(object_type, content).map_err(|e| RemoteError::Decode {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RemoteClient for HttpRemote {
    fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    async fn list(&self, object_type: ObjectType) -> Result<Vec<ConfigObject>, RemoteError> {
        let mut objects = Vec::new();
        let mut next = Some(format!(
            "{}?page_size={}",
            self.collection_url(object_type),
            PAGE_SIZE
        ));

        while let Some(url) = next.take() {
            let page = self.send(self.client.get(&url), object_type.plural()).await?;
            let (results, following) = split_page(page);
            for value in results {
                objects.push(Self::into_object(object_type, value)?);
            }
            next = following;
        }

        tracing::debug!(object_type = %object_type, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn get(&self, object_type: ObjectType, id: u64) -> Result<ConfigObject, RemoteError> {
        let url = self.object_url(object_type, id);
        let resource = format!("{}/{}", object_type.plural(), id);
        let value = self.send(self.client.get(&url), &resource).await?;
        Self::into_object(object_type, value)
    }

    async fn create(
        &self,
        object_type: ObjectType,
        content: &Map<String, Value>,
    ) -> Result<ConfigObject, RemoteError> {
        let request = self.client.post(self.collection_url(object_type)).json(content);
        let value = self.send(request, object_type.plural()).await?;
        Self::into_object(object_type, value)
    }

    async fn update(
        &self,
        object_type: ObjectType,
        id: u64,
        content: &Map<String, Value>,
    ) -> Result<ConfigObject, RemoteError> {
        let resource = format!("{}/{}", object_type.plural(), id);
        let request = self.client.put(self.object_url(object_type, id)).json(content);
        let value = self.send(request, &resource).await?;
        Self::into_object(object_type, value)
    }
}

/// Results and next-page URL of a paginated response.
///
/// A bare array is accepted as a single page.
fn split_page(page: Value) -> (Vec<Value>, Option<String>) {
    match page {
        Value::Array(items) => (items, None),
        Value::Object(mut map) => {
            let next = map
                .get("pagination")
                .and_then(|p| p.get("next"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let results = match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            (results, next)
        }
        _ => (Vec::new(), None),
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_connect() {
        RemoteError::Unreachable {
            message: error.to_string(),
        }
    } else if error.is_timeout() {
        RemoteError::Timeout {
            millis: CONNECT_TIMEOUT.as_millis() as u64,
        }
    } else {
        RemoteError::Transient {
            message: error.to_string(),
        }
    }
}

fn status_error(status: StatusCode, body: &str, resource: &str) -> RemoteError {
    match status.as_u16() {
        404 => RemoteError::NotFound {
            resource: resource.to_string(),
        },
        400 | 422 => {
            let (field, message) = first_validation_error(body);
            RemoteError::Validation { field, message }
        }
        401 | 403 => RemoteError::Unauthorized {
            message: format!("{status} on {resource}"),
        },
        429 | 500..=599 => RemoteError::Transient {
            message: format!("{status} on {resource}"),
        },
        code => RemoteError::Rejected {
            status: code,
            message: truncate(body),
        },
    }
}

/// First offending field of a validation body such as
/// `{"schema": ["Invalid hyperlink - Object does not exist."]}`.
fn first_validation_error(body: &str) -> (String, String) {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return (String::new(), truncate(body));
    };
    map.into_iter()
        .next()
        .map(|(field, value)| {
            let message = match value {
                Value::Array(items) => items
                    .first()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_default(),
                Value::String(s) => s,
                other => other.to_string(),
            };
            (field, message)
        })
        .unwrap_or_default()
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let mut short: String = body.chars().take(LIMIT).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(404, "NotFound")]
    #[case(400, "Validation")]
    #[case(422, "Validation")]
    #[case(401, "Unauthorized")]
    #[case(403, "Unauthorized")]
    #[case(429, "Transient")]
    #[case(502, "Transient")]
    #[case(409, "Rejected")]
    fn status_codes_map_to_taxonomy(#[case] code: u16, #[case] expected: &str) {
        let status = StatusCode::from_u16(code).unwrap();
        let error = status_error(status, "{}", "queues/1");
        assert!(format!("{error:?}").starts_with(expected), "{code} -> {error:?}");
    }

    #[test]
    fn validation_body_yields_first_field() {
        let body = r#"{"schema": ["Invalid hyperlink - Object does not exist."]}"#;
        assert_eq!(
            first_validation_error(body),
            (
                "schema".to_string(),
                "Invalid hyperlink - Object does not exist.".to_string()
            )
        );
        assert_eq!(first_validation_error("oops").1, "oops");
    }

    #[test]
    fn pages_follow_next_link() {
        let (results, next) = split_page(json!({
            "results": [{"id": 1}],
            "pagination": {"next": "https://x/api/v1/queues?page=2"}
        }));
        assert_eq!(results.len(), 1);
        assert_eq!(next.as_deref(), Some("https://x/api/v1/queues?page=2"));

        let (results, next) = split_page(json!([{"id": 1}, {"id": 2}]));
        assert_eq!(results.len(), 2);
        assert!(next.is_none());

        let (_, next) = split_page(json!({"results": [], "pagination": {"next": null}}));
        assert!(next.is_none());
    }
}
