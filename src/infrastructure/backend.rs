//! Backend port for stage submissions and its HTTP implementation.

use crate::domain::{
    qualification_records, stage_body, ApplicationId, ApplicationRecord, Attachment, FieldRecord, PersonalDetails,
    Stage, StagePayloads, SubmitError, SubmitResult,
};
use crate::infrastructure::config::ConfigError;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::time::Duration;

/// Response to the first stage-1 commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stage1Receipt {
    pub id: ApplicationId,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default)]
    message: String,
}

/// Remote collaborator that stores application stages.
///
/// Every stage write overwrites the server-side copy of that stage.
pub trait StageBackend: Send + Sync {
    fn create_stage1(&self, personal: &PersonalDetails) -> SubmitResult<Stage1Receipt>;

    fn update_stage1(&self, id: &ApplicationId, personal: &PersonalDetails) -> SubmitResult<String>;

    /// Stores stages 2 to 7.
    fn submit_stage(&self, stage: Stage, id: &ApplicationId, payloads: &StagePayloads) -> SubmitResult<String>;

    fn finalize_stage8(&self, id: &ApplicationId) -> SubmitResult<String>;

    fn fetch_application(&self, id: &ApplicationId) -> SubmitResult<ApplicationRecord>;

    /// Absolute URL for a media path returned by the server.
    fn media_url(&self, path: &str) -> String;
}

pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized)
            .map_err(|e| ConfigError::Invalid(format!("api_base_url {base_url:?} is not a URL: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client could not be built: {e}")))?;
        Ok(Self { client, base })
    }

    /// Route below the base URL. Each segment is percent-encoded, so an id
    /// holding `/`, `?` or `#` stays a single segment.
    fn endpoint(&self, segments: &[&str]) -> SubmitResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| SubmitError::Network(format!("base URL {} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn personal_form(personal: &PersonalDetails) -> SubmitResult<Form> {
        let mut form = Form::new();
        for name in PersonalDetails::FIELDS {
            let value = personal.field(name).unwrap_or_default().trim().to_string();
            form = form.text(*name, value);
        }
        for (field, attachment) in [("photo", &personal.photo), ("signature", &personal.signature)] {
            if let Some(part) = file_part(attachment.as_ref())? {
                form = form.part(field, part);
            }
        }
        Ok(form)
    }

    fn qualifications_request(&self, request: RequestBuilder, payloads: &StagePayloads) -> SubmitResult<RequestBuilder> {
        let has_files = payloads
            .qualifications
            .iter()
            .any(|row| row.certificate.as_ref().and_then(Attachment::handle).is_some());
        if !has_files {
            return Ok(request.json(&stage_body(Stage::Qualifications, payloads)));
        }
        let rows = serde_json::to_string(&qualification_records(payloads))
            .map_err(|e| SubmitError::Attachment(e.to_string()))?;
        let mut form = Form::new().text("qualifications", rows);
        for (index, row) in payloads.qualifications.iter().enumerate() {
            if let Some(part) = file_part(row.certificate.as_ref())? {
                form = form.part(format!("certificate_{index}"), part);
            }
        }
        Ok(request.multipart(form))
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, id_hint: &str) -> SubmitResult<T> {
        let response = request.send().map_err(|e| SubmitError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| SubmitError::Network(format!("response could not be read: {e}")))?;
        if status.is_success() {
            // Some acknowledgements come back as 204 with no body.
            let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
            return serde_json::from_str(text).map_err(|e| SubmitError::Network(format!("unreadable response: {e}")));
        }
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let message = server_message(&body).unwrap_or_else(|| status.to_string());
        tracing::debug!(%status, %message, "backend rejected request");
        Err(match status {
            StatusCode::NOT_FOUND => SubmitError::NotFound(id_hint.to_string()),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                SubmitError::ServerValidation(message)
            }
            _ => SubmitError::Network(format!("server returned {status}: {message}")),
        })
    }
}

/// Multipart part for an attachment holding a live file. Committed and
/// detached attachments are never re-uploaded.
fn file_part(attachment: Option<&Attachment>) -> SubmitResult<Option<Part>> {
    let Some(Attachment::Pending {
        handle, display_name, ..
    }) = attachment
    else {
        return Ok(None);
    };
    let bytes = fs::read(&handle.path)
        .map_err(|e| SubmitError::Attachment(format!("{}: {e}", handle.path.display())))?;
    let part = Part::bytes(bytes)
        .file_name(display_name.clone())
        .mime_str(&handle.mime)
        .map_err(|e| SubmitError::Attachment(format!("{display_name}: {e}")))?;
    Ok(Some(part))
}

/// Pulls a human readable message out of an error body: `message`, then
/// `detail`, then the first field error of a `{field: [errors]}` map.
fn server_message(body: &Value) -> Option<String> {
    for key in ["message", "detail", "error"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    let (field, errors) = body.as_object()?.iter().next()?;
    let first = match errors {
        Value::Array(items) => items.first()?.as_str()?.to_string(),
        Value::String(text) => text.clone(),
        _ => return None,
    };
    Some(format!("{field}: {first}"))
}

impl StageBackend for HttpBackend {
    fn create_stage1(&self, personal: &PersonalDetails) -> SubmitResult<Stage1Receipt> {
        let url = self.endpoint(&["applications", "stage1"])?;
        let form = Self::personal_form(personal)?;
        self.send(self.client.post(url).multipart(form), "")
    }

    fn update_stage1(&self, id: &ApplicationId, personal: &PersonalDetails) -> SubmitResult<String> {
        let url = self.endpoint(&["applications", id.as_str(), "stage", "1"])?;
        let form = Self::personal_form(personal)?;
        let ack: Ack = self.send(self.client.put(url).multipart(form), id.as_str())?;
        Ok(ack.message)
    }

    fn submit_stage(&self, stage: Stage, id: &ApplicationId, payloads: &StagePayloads) -> SubmitResult<String> {
        let number = stage.number().to_string();
        let url = self.endpoint(&["applications", id.as_str(), "stage", &number])?;
        let request = self.client.put(url);
        let request = match stage {
            Stage::Qualifications => self.qualifications_request(request, payloads)?,
            _ => request.json(&stage_body(stage, payloads)),
        };
        let ack: Ack = self.send(request, id.as_str())?;
        Ok(ack.message)
    }

    fn finalize_stage8(&self, id: &ApplicationId) -> SubmitResult<String> {
        let url = self.endpoint(&["applications", id.as_str(), "acknowledge"])?;
        let ack: Ack = self.send(self.client.post(url), id.as_str())?;
        Ok(ack.message)
    }

    fn fetch_application(&self, id: &ApplicationId) -> SubmitResult<ApplicationRecord> {
        let url = self.endpoint(&["applications", id.as_str()])?;
        self.send(self.client.get(url), id.as_str())
    }

    fn media_url(&self, path: &str) -> String {
        self.base
            .join(path)
            .map(String::from)
            .unwrap_or_else(|_| path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> HttpBackend {
        HttpBackend::new("https://portal.example/api", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_media_url_resolution() {
        let backend = backend();
        assert_eq!(backend.media_url("media/a.png"), "https://portal.example/api/media/a.png");
        assert_eq!(backend.media_url("/media/a.png"), "https://portal.example/media/a.png");
        assert_eq!(
            backend.media_url("https://cdn.example/a.png"),
            "https://cdn.example/a.png"
        );
    }

    #[test]
    fn test_endpoint_encodes_each_segment() {
        let backend = backend();
        assert_eq!(
            backend.endpoint(&["applications", "A1", "stage", "2"]).unwrap().as_str(),
            "https://portal.example/api/applications/A1/stage/2"
        );
        assert_eq!(
            backend.endpoint(&["applications", "A/1?x#y"]).unwrap().as_str(),
            "https://portal.example/api/applications/A%2F1%3Fx%23y"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpBackend::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(server_message(&json!({"message": "Email taken"})), Some("Email taken".to_string()));
        assert_eq!(server_message(&json!({"detail": "Not allowed"})), Some("Not allowed".to_string()));
        assert_eq!(
            server_message(&json!({"email": ["Enter a valid email address."]})),
            Some("email: Enter a valid email address.".to_string())
        );
        assert_eq!(server_message(&Value::Null), None);
    }

    #[test]
    fn test_file_part_skips_remote_attachments() {
        assert!(file_part(Some(&Attachment::committed("https://x/a.png"))).unwrap().is_none());
        assert!(file_part(None).unwrap().is_none());
    }

    #[test]
    fn test_file_part_reports_unreadable_file() {
        let attachment = Attachment::pending(
            crate::domain::FileHandle::new("/definitely/missing/photo.png", "image/png", 1),
            None,
        );
        assert!(matches!(file_part(Some(&attachment)), Err(SubmitError::Attachment(_))));
    }
}
