//! HTTP client for the remote signing service.
//!
//! Implements [`SigningBackend`] on top of reqwest: a multipart POST for the
//! submission and, for the qualified flow, an authenticated GET that retrieves
//! the signed artifact once the second factor has been confirmed.

pub mod error;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};

use pdfsign_core::models::{SigningRequest, SourceFile, UploadResult};
use pdfsign_core::{PdfSignError, SigningBackend, SigningConfig};

pub use error::ClientError;

/// Client for the signing endpoint and the qualified flow's artifact endpoint.
#[derive(Clone, Debug)]
pub struct SigningClient {
    client: Client,
    file_source_url: String,
    artifact_url: Option<String>,
}

impl SigningClient {
    pub fn new(config: &SigningConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        // No timeout unless configured: a hung request stalls the queue.
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ClientError::Build)?;

        Ok(Self::with_client(
            client,
            config.file_source_url.clone(),
            config.artifact_url.clone(),
        ))
    }

    pub fn with_client(
        client: Client,
        file_source_url: String,
        artifact_url: Option<String>,
    ) -> Self {
        Self {
            client,
            file_source_url,
            artifact_url: artifact_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn file_source_url(&self) -> &str {
        &self.file_source_url
    }

    /// URL of the second step for a session, without the query string.
    ///
    /// The session id is appended as exactly one percent-encoded path segment.
    pub fn artifact_url(&self, session_id: &str) -> Result<Url, ClientError> {
        let base = self
            .artifact_url
            .as_deref()
            .ok_or(ClientError::MissingArtifactUrl)?;
        let mut url =
            Url::parse(base).map_err(|e| ClientError::InvalidArtifactUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidArtifactUrl(base.to_string()))?
            .pop_if_empty()
            .push(session_id);
        Ok(url)
    }

    fn apply_auth(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", token))
    }

    /// Text fields of the multipart body, in wire order: placement (manual
    /// only), profile, then user_text (only with annotations).
    pub fn text_fields(request: &SigningRequest) -> Result<Vec<(&'static str, String)>, ClientError> {
        let mut fields = Vec::new();

        if let Some(placement) = &request.placement {
            fields.extend(placement.form_fields());
        }

        fields.push(("profile", request.profile.clone()));

        if !request.user_text.is_empty() {
            let json = serde_json::to_string(&request.user_text).map_err(|e| ClientError::Form {
                field: "user_text",
                message: e.to_string(),
            })?;
            fields.push(("user_text", json));
        }

        Ok(fields)
    }

    fn build_form(request: &SigningRequest) -> Result<Form, ClientError> {
        let file = &request.file;
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| ClientError::Form {
                field: "file",
                message: e.to_string(),
            })?;

        let form = Self::text_fields(request)?
            .into_iter()
            .fold(Form::new().part("file", part), |form, (name, value)| {
                form.text(name, value)
            });
        Ok(form)
    }

    /// Turn any HTTP response into an [`UploadResult`]. Non-JSON bodies are kept as text.
    async fn read_result(response: Response, file: SourceFile) -> UploadResult {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let json = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };

        UploadResult { status, file, json }
    }
}

#[async_trait]
impl SigningBackend for SigningClient {
    #[tracing::instrument(skip(self, request, token), fields(file_name = %request.file.name))]
    async fn submit(
        &self,
        request: SigningRequest,
        token: &str,
    ) -> Result<UploadResult, PdfSignError> {
        let form = Self::build_form(&request)?;
        let file = request.file;

        tracing::debug!(
            url = %self.file_source_url,
            file_name = %file.name,
            size = file.size(),
            "Submitting document for signing"
        );

        let response = self
            .apply_auth(self.client.post(&self.file_source_url), token)
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::Request)?;

        Ok(Self::read_result(response, file).await)
    }

    #[tracing::instrument(skip(self, file, token), fields(file_name = %file.name))]
    async fn fetch_artifact(
        &self,
        session_id: &str,
        file: &SourceFile,
        token: &str,
    ) -> Result<UploadResult, PdfSignError> {
        let url = self.artifact_url(session_id)?;

        tracing::debug!(url = %url, file_name = %file.name, "Fetching signed document");

        let response = self
            .apply_auth(self.client.get(url), token)
            .query(&[("fileName", file.name.as_str())])
            .send()
            .await
            .map_err(ClientError::Request)?;

        Ok(Self::read_result(response, file.clone()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use pdfsign_core::models::{UserText, WirePlacement};
    use pdfsign_core::FlowKind;

    fn file() -> SourceFile {
        SourceFile::pdf("contract.pdf", b"%PDF-1.7 test".to_vec())
    }

    fn client(server: &mockito::Server) -> SigningClient {
        let mut config = SigningConfig::new(FlowKind::Qualified, format!("{}/sign", server.url()));
        config.artifact_url = Some(format!("{}/artifacts/", server.url()));
        SigningClient::new(&config).unwrap()
    }

    fn field(name: &str, value: &str) -> Matcher {
        Matcher::Regex(format!(
            "name=\"{}\"\r\n\r\n{}\r\n",
            regex::escape(name),
            regex::escape(value)
        ))
    }

    #[tokio::test]
    async fn submit_sends_manual_placement_and_user_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sign")
            .match_header("authorization", "Bearer token-1")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("name=\"file\"; filename=\"contract.pdf\"".to_string()),
                field("y", "761"),
                field("x", "11"),
                field("r", "0"),
                field("w", "50"),
                field("p", "1"),
                field("profile", "default"),
                field(
                    "user_text",
                    r#"[{"description":"Intended use","value":"Travel"}]"#,
                ),
            ]))
            .with_status(201)
            .with_header("content-type", "application/ld+json")
            .with_body(r#"{"@type":"QualifiedSigningRequest","identifier":"r1","url":"https://auth.example/1"}"#)
            .create_async()
            .await;

        let request = SigningRequest {
            file: file(),
            placement: Some(WirePlacement {
                x: 11,
                y: 761,
                r: 0,
                w: 50,
                p: 1,
            }),
            profile: "default".to_string(),
            user_text: vec![UserText {
                description: "Intended use".to_string(),
                value: "Travel".to_string(),
            }],
        };

        let result = client(&server).submit(request, "token-1").await.unwrap();
        mock.assert_async().await;
        assert_eq!(result.status, 201);
        assert_eq!(result.json_type(), Some("QualifiedSigningRequest"));
        assert_eq!(result.file.name, "contract.pdf");
    }

    #[tokio::test]
    async fn auto_placement_sends_no_position_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sign")
            .match_body(field("profile", "official"))
            .with_status(201)
            .with_body(r#"{"@type":"OfficiallySignedDocument"}"#)
            .create_async()
            .await;

        let request = SigningRequest {
            file: file(),
            placement: None,
            profile: "official".to_string(),
            user_text: Vec::new(),
        };
        let result = client(&server).submit(request, "t").await.unwrap();
        mock.assert_async().await;
        assert!(result.is_success());
    }

    #[test]
    fn auto_placement_fields() {
        let request = SigningRequest {
            file: file(),
            placement: None,
            profile: "official".to_string(),
            user_text: Vec::new(),
        };
        let fields = SigningClient::text_fields(&request).unwrap();
        assert_eq!(fields, vec![("profile", "official".to_string())]);
    }

    #[test]
    fn manual_placement_fields_in_wire_order() {
        let request = SigningRequest {
            file: file(),
            placement: Some(WirePlacement {
                x: 1,
                y: 2,
                r: 90,
                w: 100,
                p: 3,
            }),
            profile: "default".to_string(),
            user_text: vec![UserText {
                description: "Aktenzeichen".to_string(),
                value: "AZ 1".to_string(),
            }],
        };
        let names: Vec<_> = SigningClient::text_fields(&request)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["y", "x", "r", "w", "p", "profile", "user_text"]);
    }

    #[tokio::test]
    async fn error_status_is_a_result_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sign")
            .with_status(422)
            .with_body(r#"{"hydra:description":"Document is encrypted"}"#)
            .create_async()
            .await;

        let request = SigningRequest {
            file: file(),
            placement: None,
            profile: "official".to_string(),
            user_text: Vec::new(),
        };
        let result = client(&server).submit(request, "t").await.unwrap();
        assert_eq!(result.status, 422);
        assert_eq!(result.description(), "Document is encrypted");
    }

    #[tokio::test]
    async fn non_json_body_is_kept_as_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sign")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let request = SigningRequest {
            file: file(),
            placement: None,
            profile: "official".to_string(),
            user_text: Vec::new(),
        };
        let result = client(&server).submit(request, "t").await.unwrap();
        assert_eq!(result.description(), "Bad Gateway");
    }

    #[tokio::test]
    async fn fetch_artifact_uses_session_and_file_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/artifacts/session-0123456789")
            .match_query(Matcher::UrlEncoded(
                "fileName".to_string(),
                "contract.pdf".to_string(),
            ))
            .match_header("authorization", "Bearer t")
            .with_status(200)
            .with_body(r#"{"@type":"QualifiedlySignedDocument","name":"contract-sig.pdf","contentUrl":"data:application/pdf;base64,JVBERi0xLjc="}"#)
            .create_async()
            .await;

        let result = client(&server)
            .fetch_artifact("session-0123456789", &file(), "t")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(result.json_type(), Some("QualifiedlySignedDocument"));
    }

    #[test]
    fn session_id_is_a_single_path_segment() {
        let client = SigningClient::with_client(
            Client::new(),
            "http://localhost/sign".to_string(),
            Some("http://localhost/artifacts/".to_string()),
        );
        assert_eq!(
            client.artifact_url("session-0123456789").unwrap().as_str(),
            "http://localhost/artifacts/session-0123456789"
        );
        assert_eq!(
            client
                .artifact_url("../admin/export?all=1#xxxxxxxxxx")
                .unwrap()
                .as_str(),
            "http://localhost/artifacts/..%2Fadmin%2Fexport%3Fall=1%23xxxxxxxxxx"
        );
    }

    #[tokio::test]
    async fn fetch_artifact_keeps_hostile_session_id_inside_artifact_path() {
        let mut server = mockito::Server::new_async().await;
        let outside = server
            .mock("GET", Matcher::Regex("^/admin".to_string()))
            .with_status(200)
            .expect(0)
            .create_async()
            .await;
        let inside = server
            .mock("GET", Matcher::Regex("^/artifacts/[^/]+$".to_string()))
            .match_query(Matcher::UrlEncoded(
                "fileName".to_string(),
                "contract.pdf".to_string(),
            ))
            .match_header("authorization", "Bearer secret")
            .with_status(404)
            .with_body(r#"{"detail":"Unknown session"}"#)
            .create_async()
            .await;

        let result = client(&server)
            .fetch_artifact("../admin/export?all=1#xxxxxxxxxx", &file(), "secret")
            .await
            .unwrap();
        inside.assert_async().await;
        outside.assert_async().await;
        assert_eq!(result.status, 404);
    }

    #[tokio::test]
    async fn fetch_without_artifact_url_is_a_config_error() {
        let config = SigningConfig::new(FlowKind::Official, "http://127.0.0.1:9/sign");
        let client = SigningClient::new(&config).unwrap();
        let err = client.fetch_artifact("x", &file(), "t").await.unwrap_err();
        assert!(matches!(err, PdfSignError::Config(_)));
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let config = SigningConfig::new(FlowKind::Official, "http://127.0.0.1:9/sign");
        let client = SigningClient::new(&config).unwrap();
        let request = SigningRequest {
            file: file(),
            placement: None,
            profile: "official".to_string(),
            user_text: Vec::new(),
        };
        let err = client.submit(request, "t").await.unwrap_err();
        assert!(matches!(err, PdfSignError::Transport(_)));
    }
}
