use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::common::{ChatMessage, SessionDescriptor};
use crate::error::{ChatError, Result};

use super::ChatApi;
use super::envelope::ApiResponse;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Chat endpoints of the storefront REST backend.
pub struct RestChatApi {
    http: Client,
    base_url: Url,
}

impl RestChatApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ChatError::Config(format!("invalid api_base_url `{base_url}`: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ChatError::Config(format!(
                "api_base_url `{base_url}` cannot hold a path"
            )));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base_url })
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await?;
        let status_error = response.error_for_status_ref().err();
        let body = response.bytes().await?;

        match serde_json::from_slice::<ApiResponse<T>>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(err) => match status_error {
                Some(status_error) => Err(status_error.into()),
                None => Err(err.into()),
            },
        }
    }
}

#[async_trait]
impl ChatApi for RestChatApi {
    async fn bootstrap(&self, token: &str) -> Result<SessionDescriptor> {
        let request = self.http.get(self.url(&["chat", "init"])).bearer_auth(token);
        self.call(request)
            .await?
            .ok_or_else(|| ChatError::Protocol("bootstrap returned no session".into()))
    }

    async fn room_messages(&self, token: &str, room_id: &str) -> Result<Vec<ChatMessage>> {
        let request = self
            .http
            .get(self.url(&["chat", "rooms", room_id, "messages"]))
            .bearer_auth(token);
        Ok(self.call(request).await?.unwrap_or_default())
    }

    async fn mark_read(&self, token: &str, room_id: &str) -> Result<()> {
        let request = self
            .http
            .put(self.url(&["chat", "rooms", room_id, "read"]))
            .bearer_auth(token);
        self.call::<serde_json::Value>(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::common::Role;

    #[tokio::test]
    async fn bootstrap_sends_bearer_and_decodes_customer_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat/init"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1000,
                "result": {
                    "role": "CUSTOMER",
                    "roomId": "R1",
                    "messages": [{
                        "id": 1,
                        "roomId": "R1",
                        "senderRole": "EMPLOYEE",
                        "senderDisplayName": "Support",
                        "senderEmail": "support@example.com",
                        "content": "How can we help?",
                        "createdAt": "2024-05-01T09:00:00",
                        "isRead": true
                    }]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = RestChatApi::new(&format!("{}/api/", server.uri())).unwrap();
        let session = api.bootstrap("tok-1").await.unwrap();

        assert_eq!(session.role, Role::Customer);
        assert_eq!(session.room_id.as_deref(), Some("R1"));
        assert_eq!(session.messages.len(), 1);
    }

    #[tokio::test]
    async fn logical_failure_code_wins_over_http_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/init"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 1006, "message": "Unauthenticated"})),
            )
            .mount(&server)
            .await;

        let api = RestChatApi::new(&server.uri()).unwrap();
        match api.bootstrap("stale").await {
            Err(ChatError::Api { code, message }) => {
                assert_eq!(code, 1006);
                assert_eq!(message, "Unauthenticated");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_with_envelope_reports_api_code() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/chat/rooms/R9/read"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": 4004, "message": "Room not found"})),
            )
            .mount(&server)
            .await;

        let api = RestChatApi::new(&server.uri()).unwrap();
        assert!(matches!(
            api.mark_read("tok", "R9").await,
            Err(ChatError::Api { code: 4004, .. })
        ));
    }

    #[tokio::test]
    async fn error_status_without_envelope_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/rooms/R1/messages"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let api = RestChatApi::new(&server.uri()).unwrap();
        assert!(matches!(
            api.room_messages("tok", "R1").await,
            Err(ChatError::Http(_))
        ));
    }

    #[tokio::test]
    async fn room_messages_without_result_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/rooms/R1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 1000})))
            .mount(&server)
            .await;

        let api = RestChatApi::new(&server.uri()).unwrap();
        assert!(api.room_messages("tok", "R1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_read_succeeds_on_success_code() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/chat/rooms/R1/read"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 1000})))
            .expect(1)
            .mount(&server)
            .await;

        let api = RestChatApi::new(&server.uri()).unwrap();
        api.mark_read("tok", "R1").await.unwrap();
    }

    #[tokio::test]
    async fn room_id_is_one_encoded_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/chat/rooms/a%2F..%2Fadmin%3Fx/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 1000})))
            .expect(1)
            .mount(&server)
            .await;

        let api = RestChatApi::new(&format!("{}/api", server.uri())).unwrap();
        api.mark_read("tok", "a/../admin?x").await.unwrap();
    }

    #[test]
    fn unparseable_base_url_is_config_error() {
        assert!(matches!(
            RestChatApi::new("not a url"),
            Err(ChatError::Config(_))
        ));
    }
}
