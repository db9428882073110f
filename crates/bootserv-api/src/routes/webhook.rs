//! CI webhook receiver.

use axum::body::Bytes;
use axum::extract::State;
use bootserv_core::WebhookOutcome;

use crate::auth::WebhookCredentials;
use crate::error::AppError;
use crate::state::AppState;

/// `POST /`: hand the delivery to the webhook coordinator.
pub async fn receive(
    State(state): State<AppState>,
    credentials: WebhookCredentials,
    body: Bytes,
) -> Result<String, AppError> {
    let outcome = state
        .webhook
        .handle(
            credentials.token.as_deref(),
            credentials.event.as_deref(),
            &body,
        )
        .await;
    outcome_response(outcome)
}

fn outcome_response(outcome: WebhookOutcome) -> Result<String, AppError> {
    match outcome {
        WebhookOutcome::Unauthorized => Err(AppError::Forbidden),
        WebhookOutcome::UnknownEvent => Err(AppError::NotFound("unknown event".into())),
        WebhookOutcome::MalformedPayload(reason) => {
            Err(AppError::BadRequest(format!("malformed payload: {reason}")))
        }
        WebhookOutcome::NoNewBuild => Ok("no new build".into()),
        WebhookOutcome::Refreshed { build_id } => Ok(format!("refreshed from build {build_id}")),
        WebhookOutcome::RefreshFailed(reason) => Err(AppError::Internal(reason)),
    }
}
