//! Build dispatch: one build-creation request per approved project.
//!
//! Every request is independent. A failure for one project is logged with
//! the request it belonged to and recorded in the [`DispatchReport`]; it never
//! stops the remaining requests and is never retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::metrics::{Counter, Metrics};
use crate::obs::{emit_build_created, emit_build_rejected, emit_dispatch_failed};

/// Tag attached to builds created in response to a pushed commit.
pub const COMMIT_TAG: &str = "commit";

/// Declarative build-creation request.
///
/// `ensure_only` asks the boundary to create at most one build per
/// `(project, sha)`; repeated delivery returns the existing build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub sha: String,
    pub project: String,
    pub tag: String,
    pub ensure_only: bool,
}

impl BuildRequest {
    pub fn for_commit(project: &str, sha: &str) -> Self {
        Self {
            sha: sha.to_string(),
            project: project.to_string(),
            tag: COMMIT_TAG.to_string(),
            ensure_only: true,
        }
    }
}

/// Structured reply from the build-creation boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl BuildResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The build-creation boundary.
#[async_trait]
pub trait BuildCreator: Send + Sync {
    async fn create_build(&self, request: &BuildRequest) -> Result<BuildResponse, DispatchError>;
}

/// Creates builds through the HTTP API (`POST` form to the builds endpoint).
#[derive(Debug, Clone)]
pub struct HttpBuildCreator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBuildCreator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BuildCreator for HttpBuildCreator {
    async fn create_build(&self, request: &BuildRequest) -> Result<BuildResponse, DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(request)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));

        Ok(BuildResponse { status, body })
    }
}

/// What happened to one project's request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchStatus {
    Created { status: u16 },
    Rejected { status: u16, body: serde_json::Value },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub project: String,
    pub status: DispatchStatus,
}

impl DispatchOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self.status, DispatchStatus::Created { .. })
    }
}

/// Per-project outcomes of one dispatch round, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub sha: String,
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn created(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_created())
            .map(|o| o.project.as_str())
    }

    pub fn created_count(&self) -> usize {
        self.created().count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.created_count()
    }
}

/// Sends build requests through a [`BuildCreator`], isolating failures.
pub struct BuildDispatcher {
    creator: Arc<dyn BuildCreator>,
    metrics: Arc<Metrics>,
}

impl BuildDispatcher {
    pub fn new(creator: Arc<dyn BuildCreator>, metrics: Arc<Metrics>) -> Self {
        Self { creator, metrics }
    }

    /// Request a build of `sha` for each project slug.
    ///
    /// Requests run concurrently; each outcome stays attached to its project.
    pub async fn dispatch(&self, sha: &str, projects: &[String]) -> DispatchReport {
        let requests = projects.iter().map(|project| self.dispatch_one(project, sha));
        let outcomes = join_all(requests).await;
        DispatchReport {
            sha: sha.to_string(),
            outcomes,
        }
    }

    async fn dispatch_one(&self, project: &str, sha: &str) -> DispatchOutcome {
        let request = BuildRequest::for_commit(project, sha);
        let status = match self.creator.create_build(&request).await {
            Ok(response) if response.is_success() => {
                emit_build_created(project, sha, response.status);
                self.metrics.increment(Counter::BuildDispatched);
                DispatchStatus::Created {
                    status: response.status,
                }
            }
            Ok(response) => {
                emit_build_rejected(project, sha, response.status, &response.body.to_string());
                self.metrics.increment(Counter::DispatchFailure);
                DispatchStatus::Rejected {
                    status: response.status,
                    body: response.body,
                }
            }
            Err(e) => {
                emit_dispatch_failed(project, sha, &e.to_string());
                self.metrics.increment(Counter::DispatchFailure);
                DispatchStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        DispatchOutcome {
            project: project.to_string(),
            status,
        }
    }
}
