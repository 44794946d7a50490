//! REST client for the Midjourney proxy submit endpoints.
//!
//! Every submit call returns the same envelope ([`SubmitResponse`]); the
//! proxy signals acceptance through its `code` field rather than the HTTP
//! status, so [`SubmitResponse::into_submission`] does the real triage.

use serde::{Deserialize, Serialize};

use mjrelay_core::types::JobId;

/// Proxy code for a job accepted into the queue.
pub const CODE_QUEUED: i64 = 1;

/// Proxy code for a request answered from an earlier, identical job.
pub const CODE_ALREADY_COMPLETE: i64 = 21;

/// HTTP client for a single Midjourney proxy instance.
pub struct MjApi {
    client: reqwest::Client,
    api_url: String,
}

/// Image layout requested from a blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlendDimensions {
    Portrait,
    Square,
    Landscape,
}

/// Follow-up actions on a finished image grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    Upscale,
    Variation,
    Reroll,
}

/// One job submission. Images are passed as `data:` URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRequest {
    Imagine {
        prompt: String,
        base64: Option<String>,
    },
    Describe {
        base64: String,
    },
    Blend {
        base64_array: Vec<String>,
        dimensions: BlendDimensions,
    },
    Change {
        action: ChangeAction,
        /// Grid cell (1-4); not used by REROLL.
        index: Option<u8>,
        task_id: JobId,
    },
    /// Shorthand change such as `"1320585 U1"`.
    SimpleChange {
        content: String,
    },
}

impl SubmitRequest {
    /// Path below `/mj/submit/` served by the proxy.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Imagine { .. } => "imagine",
            Self::Describe { .. } => "describe",
            Self::Blend { .. } => "blend",
            Self::Change { .. } => "change",
            Self::SimpleChange { .. } => "simple-change",
        }
    }

    /// JSON request body in the proxy's camelCase field naming.
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Imagine { prompt, base64 } => serde_json::json!({
                "prompt": prompt,
                "base64": base64,
            }),
            Self::Describe { base64 } => serde_json::json!({ "base64": base64 }),
            Self::Blend {
                base64_array,
                dimensions,
            } => serde_json::json!({
                "base64Array": base64_array,
                "dimensions": dimensions,
            }),
            Self::Change {
                action,
                index,
                task_id,
            } => {
                let mut body = serde_json::json!({
                    "action": action,
                    "taskId": task_id,
                });
                if let Some(index) = index {
                    body["index"] = serde_json::json!(index);
                }
                body
            }
            Self::SimpleChange { content } => serde_json::json!({ "content": content }),
        }
    }
}

/// Envelope returned by every `/mj/submit/*` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub code: i64,
    /// The job id when the proxy accepted the request.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
}

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Queued; status will arrive through the notify receiver.
    Queued { job_id: JobId },
    /// Already answered; nothing to poll for.
    AlreadyComplete {
        job_id: Option<JobId>,
        image_url: Option<String>,
    },
}

/// Errors from the proxy REST layer.
#[derive(Debug, thiserror::Error)]
pub enum MjApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The proxy returned a non-2xx status code.
    #[error("Midjourney proxy error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

/// A submission that did not produce a job to follow.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Api(#[from] MjApiError),

    #[error("submission rejected with code {code}: {description}")]
    Rejected {
        code: i64,
        job_id: Option<JobId>,
        description: String,
    },
}

impl SubmitError {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Rejected { job_id, .. } => job_id.as_deref(),
            Self::Api(_) => None,
        }
    }

    /// Text shown to the user after `"... failed: "`.
    pub fn reason(&self) -> String {
        match self {
            Self::Rejected { description, .. } => description.clone(),
            Self::Api(e) => e.to_string(),
        }
    }
}

impl SubmitResponse {
    /// Job id from `result`, which the proxy sends as a string or a number.
    pub fn job_id(&self) -> Option<JobId> {
        match self.result.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Classify the proxy's answer.
    pub fn into_submission(self) -> Result<Submission, SubmitError> {
        let job_id = self.job_id();
        match (self.code, job_id) {
            (CODE_QUEUED, Some(job_id)) => Ok(Submission::Queued { job_id }),
            (CODE_ALREADY_COMPLETE, job_id) => {
                let image_url = self
                    .properties
                    .as_ref()
                    .and_then(|p| p.get("imageUrl"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                Ok(Submission::AlreadyComplete { job_id, image_url })
            }
            (code, job_id) => Err(SubmitError::Rejected {
                code,
                job_id,
                description: self
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| format!("unexpected proxy code {code}")),
            }),
        }
    }
}

impl MjApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8080`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send one submission and return the proxy's envelope.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, MjApiError> {
        let url = format!("{}/mj/submit/{}", self.api_url, request.endpoint());
        tracing::debug!(%url, "Submitting Midjourney job");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request.body())
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json::<SubmitResponse>().await?)
    }

    pub async fn submit_imagine(
        &self,
        prompt: impl Into<String>,
        base64: Option<String>,
    ) -> Result<SubmitResponse, MjApiError> {
        self.submit(&SubmitRequest::Imagine {
            prompt: prompt.into(),
            base64,
        })
        .await
    }

    pub async fn submit_describe(&self, base64: impl Into<String>) -> Result<SubmitResponse, MjApiError> {
        self.submit(&SubmitRequest::Describe {
            base64: base64.into(),
        })
        .await
    }

    pub async fn submit_blend(
        &self,
        base64_array: Vec<String>,
        dimensions: BlendDimensions,
    ) -> Result<SubmitResponse, MjApiError> {
        self.submit(&SubmitRequest::Blend {
            base64_array,
            dimensions,
        })
        .await
    }

    pub async fn submit_change(
        &self,
        action: ChangeAction,
        index: Option<u8>,
        task_id: impl Into<JobId>,
    ) -> Result<SubmitResponse, MjApiError> {
        self.submit(&SubmitRequest::Change {
            action,
            index,
            task_id: task_id.into(),
        })
        .await
    }

    pub async fn submit_simple_change(
        &self,
        content: impl Into<String>,
    ) -> Result<SubmitResponse, MjApiError> {
        self.submit(&SubmitRequest::SimpleChange {
            content: content.into(),
        })
        .await
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, MjApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(MjApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn response(json: serde_json::Value) -> SubmitResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn code_one_is_queued() {
        let r = response(serde_json::json!({
            "code": 1, "result": "1320585", "description": "Submitted"
        }));
        assert_eq!(
            r.into_submission().unwrap(),
            Submission::Queued { job_id: "1320585".into() }
        );
    }

    #[test]
    fn numeric_result_is_accepted() {
        let r = response(serde_json::json!({ "code": 1, "result": 42 }));
        assert_matches!(r.into_submission(), Ok(Submission::Queued { job_id }) if job_id == "42");
    }

    #[test]
    fn code_twenty_one_reads_image_from_properties() {
        let r = response(serde_json::json!({
            "code": 21,
            "result": "99",
            "description": "Existed",
            "properties": { "imageUrl": "http://x/done.png" }
        }));
        assert_eq!(
            r.into_submission().unwrap(),
            Submission::AlreadyComplete {
                job_id: Some("99".into()),
                image_url: Some("http://x/done.png".into()),
            }
        );
    }

    #[test]
    fn other_codes_are_rejected_with_description() {
        let r = response(serde_json::json!({
            "code": 23, "result": "7", "description": "queue is full"
        }));
        let err = r.into_submission().unwrap_err();
        assert_eq!(err.job_id(), Some("7"));
        assert_eq!(err.reason(), "queue is full");
    }

    #[test]
    fn queued_without_id_is_rejected() {
        let r = response(serde_json::json!({ "code": 1, "result": null }));
        assert_matches!(r.into_submission(), Err(SubmitError::Rejected { code: 1, job_id: None, .. }));
    }

    #[test]
    fn change_body_omits_index_for_reroll() {
        let body = SubmitRequest::Change {
            action: ChangeAction::Reroll,
            index: None,
            task_id: "55".into(),
        }
        .body();
        assert_eq!(body, serde_json::json!({ "action": "REROLL", "taskId": "55" }));
    }

    #[test]
    fn blend_body_uses_camel_case() {
        let request = SubmitRequest::Blend {
            base64_array: vec!["data:image/png;base64,AAAA".into()],
            dimensions: BlendDimensions::Square,
        };
        assert_eq!(request.endpoint(), "blend");
        assert_eq!(request.body()["dimensions"], "SQUARE");
        assert_eq!(request.body()["base64Array"][0], "data:image/png;base64,AAAA");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(MjApi::new("http://mj:8080/").api_url(), "http://mj:8080");
    }
}
