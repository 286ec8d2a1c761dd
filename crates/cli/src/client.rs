//! API client for communicating with the diagnosis server

use anyhow::{Context, Result};
use diagnosis_lib::{
    ArtifactInfo, ErrorDescriptor, HealthResponse, InferenceRequest, InferenceResponse,
};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the diagnosis server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (status, body) = self.get_raw(path).await?;
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        serde_json::from_str(&body).context("Failed to parse response")
    }

    async fn get_raw(&self, path: &str) -> Result<(StatusCode, String)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;
        Ok((status, body))
    }

    /// Submit an inference request.
    ///
    /// Rejected inputs and model failures still come back as an
    /// [`InferenceResponse`] carrying an error descriptor.
    pub async fn predict(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let url = self.base_url.join("api/v1/predict").context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;
        match serde_json::from_str::<InferenceResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => {
                match serde_json::from_str::<RejectedRequest>(&body) {
                    Ok(rejected) => {
                        anyhow::bail!("Request rejected ({}): {}", status, rejected.error.message)
                    }
                    Err(_) => anyhow::bail!("API error ({}): {}", status, body),
                }
            }
            Err(e) => Err(e).context("Failed to parse response"),
        }
    }

    pub async fn conditions(&self) -> Result<Vec<ConditionSpec>> {
        self.get("api/v1/conditions").await
    }

    pub async fn condition(&self, name: &str) -> Result<ConditionSpec> {
        self.get(&format!("api/v1/conditions/{}", name)).await
    }

    pub async fn models(&self) -> Result<Vec<ArtifactInfo>> {
        self.get("api/v1/models").await
    }

    /// Health is reported on 503 as well, so the body is read either way
    pub async fn health(&self) -> Result<HealthResponse> {
        let (status, body) = self.get_raw("healthz").await?;
        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse health response ({})", status))
    }
}

// API response types

/// Body the server sends when a request cannot be decoded at all
#[derive(Debug, Clone, Deserialize)]
pub struct RejectedRequest {
    pub error: ErrorDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub condition: String,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub kind: FieldKindView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum FieldKindView {
    Numeric,
    Categorical(Vec<(String, i64)>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagnosis_lib::{Condition, ErrorKind};
    use std::collections::BTreeMap;

    fn request() -> InferenceRequest {
        InferenceRequest {
            condition: Condition::Diabetes,
            fields: BTreeMap::from([("Glucose".to_string(), "abc".to_string())]),
            trace: None,
        }
    }

    #[tokio::test]
    async fn test_predict_parses_error_responses() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/predict")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"condition":"diabetes","error":{"kind":"invalid_input",
                "message":"Please enter valid numerical values for all fields","fields":["Glucose"]}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client.predict(&request()).await.unwrap();

        mock.assert_async().await;
        assert!(response.diagnosis.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert_eq!(error.fields, vec!["Glucose"]);
    }

    #[tokio::test]
    async fn test_predict_surfaces_non_json_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/predict")
            .with_status(422)
            .with_body("Failed to deserialize the JSON body")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.predict(&request()).await.unwrap_err();
        assert!(err.to_string().contains("422"));
    }

    #[tokio::test]
    async fn test_predict_reports_rejected_requests() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/predict")
            .with_status(422)
            .with_body(
                r#"{"error":{"kind":"invalid_input",
                "message":"Please enter valid numerical values for all fields"}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.predict(&request()).await.unwrap_err();
        assert!(err.to_string().contains("Please enter valid numerical values"));
    }

    #[tokio::test]
    async fn test_conditions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/conditions/heart")
            .with_status(200)
            .with_body(
                r#"{"condition":"heart","fields":[
                    {"name":"age","label":"Age","kind":{"type":"numeric"}},
                    {"name":"sex","label":"Sex","kind":{"type":"categorical","options":[["Male",1],["Female",0]]}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let spec = client.condition("heart").await.unwrap();
        assert_eq!(spec.fields.len(), 2);
        match &spec.fields[1].kind {
            FieldKindView::Categorical(options) => {
                assert_eq!(options[1], ("Female".to_string(), 0))
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/conditions/kidney")
            .with_status(404)
            .with_body(r#"{"error":"unknown condition 'kidney'"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.condition("kidney").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_health_reads_unavailable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(
                r#"{"status":"unhealthy","components":{"artifact_store":
                {"status":"unhealthy","message":"missing","last_check_timestamp":0}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, diagnosis_lib::ComponentStatus::Unhealthy);
    }
}
