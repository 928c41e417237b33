//! Multipart HTTP upload of exported notices.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use notice_compose::{ImageDescriptor, UploadError, UploadSink, UPLOAD_FIELD_NAME};
use serde::Deserialize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload endpoint settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    /// Absolute URL receiving the `multipart/form-data` POST.
    pub endpoint: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl UploadConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`UploadSink`] posting the PNG as multipart field `image`.
#[derive(Clone, Debug)]
pub struct HttpUploader {
    cfg: UploadConfig,
}

impl HttpUploader {
    pub fn new(cfg: UploadConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.cfg
    }
}

impl UploadSink for HttpUploader {
    fn upload(&self, file_name: &str, png: &[u8]) -> Result<ImageDescriptor, UploadError> {
        let form = MultipartForm::single_file(UPLOAD_FIELD_NAME, file_name, "image/png", png);
        log::debug!(
            "uploading {file_name} ({} bytes) to {}",
            png.len(),
            self.cfg.endpoint
        );
        let result = ureq::post(&self.cfg.endpoint)
            .set("Content-Type", &form.content_type())
            .set("Accept", "application/json")
            .timeout(self.cfg.timeout)
            .send_bytes(&form.body);

        match result {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .map_err(|err| UploadError::Transport(err.to_string()))?;
                if !(200..300).contains(&status) {
                    return Err(UploadError::Status {
                        status,
                        message: error_message(&body, status),
                    });
                }
                parse_descriptor(&body)
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(UploadError::Status {
                    status,
                    message: error_message(&body, status),
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(UploadError::Transport(transport.to_string()))
            }
        }
    }
}

/// Parse a 2xx response body into a descriptor.
pub fn parse_descriptor(body: &str) -> Result<ImageDescriptor, UploadError> {
    serde_json::from_str(body).map_err(|err| UploadError::MalformedResponse(err.to_string()))
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `error` field of a JSON error body, or a generic status message.
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| format!("upload rejected with status {status}"))
}

/// Single-part `multipart/form-data` body.
#[derive(Clone, Debug)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn single_file(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        let boundary = pick_boundary(data);
        let mut body = Vec::with_capacity(data.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{}\"\r\n",
                file_name.replace('"', "%22")
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Self { boundary, body }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// Boundary that does not occur in `data`.
fn pick_boundary(data: &[u8]) -> String {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut attempt = 0u32;
    loop {
        let boundary = format!("notice-compose-{seed:x}-{attempt}");
        let needle = boundary.as_bytes();
        if !data.windows(needle.len()).any(|window| window == needle) {
            return boundary;
        }
        attempt += 1;
    }
}
