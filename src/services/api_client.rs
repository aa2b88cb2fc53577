// ============================================================================
// API CLIENT - backend mutations only (stateless)
// ============================================================================
// Talks to the hosted relational backend through its REST surface:
//   create -> POST   /rest/v1/{collection}
//   update -> PATCH  /rest/v1/{collection}?id=eq.{id}
//   delete -> DELETE /rest/v1/{collection}?id=eq.{id}
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;

use crate::error::MutationError;
use crate::models::pending_action::{record_id, ActionKind, Collection};

/// Backend mutation collaborator.
#[async_trait(?Send)]
pub trait MutationBackend {
    async fn apply(
        &self,
        collection: Collection,
        kind: ActionKind,
        payload: &Value,
    ) -> Result<Value, MutationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Patch,
    Delete,
}

/// Fully resolved HTTP call for one mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
}

pub fn build_mutation_request(
    base_url: &str,
    collection: Collection,
    kind: ActionKind,
    payload: &Value,
) -> Result<MutationRequest, MutationError> {
    let table_url = format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), collection);

    let by_id = |kind: ActionKind| -> Result<String, MutationError> {
        let id = record_id(payload).ok_or(MutationError::MissingRecordId(kind))?;
        Ok(format!("{}?id=eq.{}", table_url, encode_query_value(&id)))
    };

    Ok(match kind {
        ActionKind::Create => MutationRequest {
            method: HttpMethod::Post,
            url: table_url.clone(),
            body: Some(payload.clone()),
        },
        ActionKind::Update => MutationRequest {
            method: HttpMethod::Patch,
            url: by_id(kind)?,
            body: Some(without_id(payload)),
        },
        ActionKind::Delete => MutationRequest {
            method: HttpMethod::Delete,
            url: by_id(kind)?,
            body: None,
        },
    })
}

/// The id travels in the filter, not in the patch body.
fn without_id(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("id");
            Value::Object(map)
        }
        other => other.clone(),
    }
}

/// RFC 3986 unreserved characters pass through, every other byte is percent-encoded.
pub(crate) fn encode_query_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(target_arch = "wasm32")]
pub use http::ApiClient;

#[cfg(target_arch = "wasm32")]
mod http {
    use async_trait::async_trait;
    use futures::future::{select, Either};
    use gloo_net::http::{Request, RequestBuilder};
    use gloo_timers::future::TimeoutFuture;
    use serde_json::Value;

    use super::{build_mutation_request, HttpMethod, MutationBackend};
    use crate::config::CONFIG;
    use crate::error::MutationError;
    use crate::models::pending_action::{ActionKind, Collection};

    #[derive(Clone)]
    pub struct ApiClient {
        base_url: String,
        api_key: Option<String>,
        timeout_seconds: u32,
    }

    impl ApiClient {
        pub fn new() -> Self {
            Self {
                base_url: CONFIG.backend_url.clone(),
                api_key: CONFIG.backend_api_key.clone(),
                timeout_seconds: CONFIG.network_timeout_seconds,
            }
        }

        fn builder(&self, method: HttpMethod, url: &str) -> RequestBuilder {
            let builder = match method {
                HttpMethod::Post => Request::post(url),
                HttpMethod::Patch => Request::patch(url),
                HttpMethod::Delete => Request::delete(url),
            };
            let builder = builder.header("Prefer", "return=representation");
            match &self.api_key {
                Some(key) => builder
                    .header("apikey", key)
                    .header("Authorization", &format!("Bearer {}", key)),
                None => builder,
            }
        }
    }

    impl Default for ApiClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait(?Send)]
    impl MutationBackend for ApiClient {
        async fn apply(
            &self,
            collection: Collection,
            kind: ActionKind,
            payload: &Value,
        ) -> Result<Value, MutationError> {
            let call = build_mutation_request(&self.base_url, collection, kind, payload)?;
            let builder = self.builder(call.method, &call.url);

            let request = match &call.body {
                Some(body) => builder
                    .json(body)
                    .map_err(|e| MutationError::Network(format!("Request build error: {}", e)))?,
                None => builder
                    .build()
                    .map_err(|e| MutationError::Network(format!("Request build error: {}", e)))?,
            };

            let send = Box::pin(request.send());
            let timeout = TimeoutFuture::new(self.timeout_seconds.saturating_mul(1000));
            let response = match select(send, timeout).await {
                Either::Left((result, _)) => result.map_err(|e| MutationError::Network(e.to_string()))?,
                Either::Right(_) => return Err(MutationError::Timeout(self.timeout_seconds)),
            };

            if !response.ok() {
                let status = response.status();
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| response.status_text());
                return Err(MutationError::Rejected { status, message });
            }

            let text = response
                .text()
                .await
                .map_err(|e| MutationError::InvalidResponse(e.to_string()))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| MutationError::InvalidResponse(e.to_string()))
        }
    }
}
