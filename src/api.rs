use crate::dashboard::model::Dashboard;
use crate::datasource::{DatasourceSetting, Series};
use crate::error::ApiError;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const FALLBACK_MESSAGE: &str = "Request failed";

/// Encode a JSON object as a query string.
///
/// Arrays become repeated keys (`a=1&a=2`), nulls are skipped and every
/// other scalar is rendered without quotes.
pub fn encode_params(params: &Value) -> String {
    let Some(map) = params.as_object() else {
        return String::new();
    };
    let scalar = |v: &Value| match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    };
    let mut pairs = Vec::new();
    for (key, value) in map {
        let values: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        };
        for v in values {
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&v)
            ));
        }
    }
    pairs.join("&")
}

/// Map a non-success response to an error.
///
/// The message is the body's `message` field, then the raw body text, then
/// a generic fallback.
pub fn error_from_response(status: u16, body: &str) -> ApiError {
    if status == 403 {
        return ApiError::Unauthenticated;
    }
    let from_json = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
    let message = match from_json {
        Some(m) if !m.is_empty() => m,
        _ if !body.trim().is_empty() && !body.trim_start().starts_with('{') => {
            body.trim().to_string()
        }
        _ => FALLBACK_MESSAGE.to_string(),
    };
    ApiError::Status { status, message }
}

/// Blocking client for the dashboard backend. Requests are never retried.
pub struct ApiClient {
    client: Client,
    base: String,
}

impl ApiClient {
    /// `base` is the full prefix, e.g. `http://localhost:8080/api/v1`.
    pub fn new(base: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent("gridscope")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str, params: Option<&Value>) -> String {
        let mut url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        if let Some(query) = params.map(encode_params).filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let err = error_from_response(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), "api request failed: {err}");
            return Err(err);
        }
        let body = if body.trim().is_empty() { "null" } else { &body };
        Ok(serde_json::from_str(body)?)
    }

    fn request(&self, method: Method, path: &str, params: Option<&Value>) -> RequestBuilder {
        let url = self.url(path, params);
        tracing::debug!(%method, %url, "api request");
        self.client.request(method, url)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str, params: Option<&Value>) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, path, params))
    }

    pub fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<&Value>,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::DELETE, path, params))
    }

    pub fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, path, None).json(body))
    }

    pub fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::PUT, path, None).json(body))
    }

    /// Initial payload: current user, server settings and the like.
    pub fn boot(&self) -> Result<Value, ApiError> {
        self.get("boot", None)
    }

    pub fn datasources(&self) -> Result<Vec<DatasourceSetting>, ApiError> {
        self.get("datasources", None)
    }

    pub fn dashboard(&self, uid: &str) -> Result<Dashboard, ApiError> {
        self.get(&format!("dashboards/{}", urlencoding::encode(uid)), None)
    }

    pub fn save_dashboard(&self, dashboard: &Dashboard) -> Result<(), ApiError> {
        let _: Value = self.put(
            &format!("dashboards/{}", urlencoding::encode(&dashboard.uid)),
            dashboard,
        )?;
        Ok(())
    }

    /// Server-side query execution for datasources proxied by the backend.
    pub fn query_data(&self, datasource_uid: &str, request: &Value) -> Result<Vec<Series>, ApiError> {
        self.post(
            &format!("datasources/{}/query", urlencoding::encode(datasource_uid)),
            request,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arrays_become_repeated_keys() {
        let q = encode_params(&json!({"host": ["a", "b c"], "limit": 5, "skip": null, "on": true}));
        assert_eq!(q, "host=a&host=b%20c&limit=5&on=true");
        assert_eq!(encode_params(&json!([1, 2])), "");
    }

    #[test]
    fn forbidden_means_unauthenticated() {
        assert!(matches!(
            error_from_response(403, r#"{"message":"nope"}"#),
            ApiError::Unauthenticated
        ));
    }

    #[test]
    fn message_comes_from_body_or_fallback() {
        let msg = |status, body| match error_from_response(status, body) {
            ApiError::Status { message, .. } => message,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(msg(500, r#"{"message":"db down"}"#), "db down");
        assert_eq!(msg(502, "bad gateway"), "bad gateway");
        assert_eq!(msg(500, r#"{"code":1}"#), "Request failed");
        assert_eq!(msg(404, ""), "Request failed");
        assert_eq!(error_from_response(404, "").status(), Some(404));
    }

    #[test]
    fn url_joins_base_path_and_query() {
        let api = ApiClient::new("http://localhost:8080/api/v1/").unwrap();
        assert_eq!(
            api.url("/dashboards", Some(&json!({"tag": ["x", "y"]}))),
            "http://localhost:8080/api/v1/dashboards?tag=x&tag=y"
        );
        assert_eq!(api.url("boot", Some(&json!({}))), "http://localhost:8080/api/v1/boot");
    }

    #[test]
    fn json_bodies_carry_content_type() {
        let api = ApiClient::new("http://localhost:8080/api/v1").unwrap();
        let request = api
            .request(Method::POST, "dashboards", None)
            .json(&json!({"uid": "home"}))
            .build()
            .unwrap();
        assert_eq!(
            request.headers()[reqwest::header::CONTENT_TYPE],
            "application/json"
        );
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(body).unwrap(), json!({"uid": "home"}));
    }
}
