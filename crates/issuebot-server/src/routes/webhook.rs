use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use issuebot_core::action::Action;
use issuebot_core::classifier::{classify_new_issue, route_labeled_issue};
use issuebot_core::dispatch::AuditRecord;
use issuebot_core::event::{IssueCommentEvent, IssuesEvent};
use issuebot_core::staleness::on_comment_created;
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::{verify_signature, SIGNATURE_HEADER};
use crate::error::AppError;
use crate::state::AppState;

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub handled: bool,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub actions: usize,
    pub failed: usize,
}

impl WebhookResponse {
    fn ignored(event: &str, action: Option<String>) -> Self {
        Self {
            handled: false,
            event: event.to_string(),
            action,
            actions: 0,
            failed: 0,
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("invalid payload: {e}")))
}

/// POST /webhook: GitHub event delivery.
///
/// Responds 200 whenever the event was processed, whether or not the
/// resulting actions succeeded; failures show up in `failed` and the logs.
pub async fn receive(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    if let Some(secret) = &app.webhook_secret {
        if !verify_signature(secret, &body, header(&headers, SIGNATURE_HEADER)) {
            return Err(AppError::unauthorized("invalid webhook signature"));
        }
    }

    let event = header(&headers, EVENT_HEADER)
        .ok_or_else(|| AppError::bad_request("missing X-GitHub-Event header"))?
        .to_string();
    let delivery = header(&headers, DELIVERY_HEADER).unwrap_or("-").to_string();
    debug!(%event, %delivery, "webhook received");

    let (action, actions) = match event.as_str() {
        "issues" => {
            let payload: IssuesEvent = parse(&body)?;
            let org = payload.repository.org().to_string();
            let repo = payload.repository.name.clone();
            let actions = match payload.action.as_str() {
                "opened" => {
                    let classification = classify_new_issue(
                        &app.config,
                        app.reader.as_ref(),
                        &org,
                        &repo,
                        &payload.issue,
                        payload.is_transferred(),
                    )
                    .await;
                    Some(classification.into_actions())
                }
                "labeled" => payload
                    .label
                    .as_ref()
                    .map(|label| route_labeled_issue(&app.config, &org, &repo, &payload.issue, &label.name)),
                _ => None,
            };
            (payload.action, actions)
        }
        "issue_comment" => {
            let payload: IssueCommentEvent = parse(&body)?;
            let actions = (payload.action == "created").then(|| {
                on_comment_created(
                    &app.config,
                    payload.repository.org(),
                    &payload.repository.name,
                    &payload.issue,
                    &payload.comment,
                )
            });
            (payload.action, actions)
        }
        _ => return Ok(Json(WebhookResponse::ignored(&event, None))),
    };

    let Some(actions) = actions else {
        return Ok(Json(WebhookResponse::ignored(&event, Some(action))));
    };

    let records = dispatch(&app, actions).await;
    let failed = records.iter().filter(|r| r.outcome.is_failure()).count();
    info!(%event, %action, %delivery, actions = records.len(), failed, "webhook handled");

    Ok(Json(WebhookResponse {
        handled: true,
        event,
        action: Some(action),
        actions: records.len(),
        failed,
    }))
}

async fn dispatch(app: &AppState, actions: Vec<Action>) -> Vec<AuditRecord> {
    let records = app.dispatcher.dispatch_all(actions).await;
    app.record(&records);
    records
}
