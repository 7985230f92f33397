use async_trait::async_trait;
use report_spec::{FormSchema, MultipartPayload, PartBody, Session};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};
use url::Url;

use crate::backend::{FormBackend, SubmitResponse};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// `FormBackend` speaking the portal's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    /// Builds a client; requests carry the session's bearer token if any.
    pub fn new(config: &ClientConfig, session: Option<&Session>) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = session.and_then(Session::bearer_token) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ClientError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url()?,
        })
    }

    fn form_url(&self, form_id: &str, tail: Option<&str>) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::OpaqueBaseUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("form").push(form_id);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        Ok(url)
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}

fn to_form(payload: MultipartPayload) -> Result<Form, ClientError> {
    let mut form = Form::new();
    for part in payload.into_parts() {
        form = match part.body {
            PartBody::Text(text) => form.text(part.name, text),
            PartBody::File(file) => {
                let mut file_part = Part::bytes(file.bytes).file_name(file.name);
                if let Some(content_type) = &file.content_type {
                    file_part = file_part.mime_str(content_type)?;
                }
                form.part(part.name, file_part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl FormBackend for HttpBackend {
    async fn fetch_schema(&self, form_id: &str) -> Result<FormSchema, ClientError> {
        let url = self.form_url(form_id, None)?;
        debug!(%url, "fetching form schema");
        let response = self.client.get(url).send().await?;
        let body = read_success_body(response).await?;
        Ok(FormSchema::from_json_str(&body)?)
    }

    async fn submit_response(
        &self,
        form_id: &str,
        payload: MultipartPayload,
    ) -> Result<SubmitResponse, ClientError> {
        let url = self.form_url(form_id, Some("responses"))?;
        debug!(%url, parts = payload.len(), "posting form response");
        let form = to_form(payload)?;
        let response = self.client.post(url).multipart(form).send().await?;
        let body = read_success_body(response).await.inspect_err(|err| {
            warn!(form_id, error = %err, "backend rejected form response");
        })?;
        Ok(SubmitResponse::from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> HttpBackend {
        let config = ClientConfig {
            base_url: base_url.into(),
            ..ClientConfig::default()
        };
        HttpBackend::new(&config, None).expect("backend")
    }

    #[test]
    fn form_urls_keep_base_path_and_encode_ids() {
        let backend = backend("https://lgu.example/api");
        assert_eq!(
            backend.form_url("incident", None).unwrap().as_str(),
            "https://lgu.example/api/form/incident"
        );
        assert_eq!(
            backend
                .form_url("road works", Some("responses"))
                .unwrap()
                .as_str(),
            "https://lgu.example/api/form/road%20works/responses"
        );
    }

    #[test]
    fn control_characters_in_token_are_rejected() {
        let session = Session {
            user_id: "u".into(),
            display_name: None,
            token: Some("bad\ntoken".into()),
        };
        let err = HttpBackend::new(&ClientConfig::default(), Some(&session)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidToken));
    }
}
