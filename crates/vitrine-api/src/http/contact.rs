//! Contact relay handler.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use tracing::error;
use vitrine_events::Event;
use vitrine_relay::{CONFIRMATION, ContactRequest, MailError, RelayError};

use crate::http::auth::AuthContext;
use crate::http::errors::ApiError;
use crate::models::{ContactResponse, ProblemInvalidParam};
use crate::state::ApiState;

pub(crate) async fn contact_user(
    State(state): State<Arc<ApiState>>,
    Extension(context): Extension<AuthContext>,
    Json(request): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    match state.relay.submit(&context.account, request).await {
        Ok(receipt) => {
            state.telemetry.inc_contact_message("accepted");
            state.publish_event(Event::MessageSubmitted {
                message_id: receipt.message_id,
                recipient: receipt.recipient,
            });
            Ok(Json(ContactResponse {
                message: CONFIRMATION.to_string(),
            }))
        }
        Err(err) => {
            state.telemetry.inc_contact_message(outcome_label(&err));
            if let RelayError::Delivery { recipient, source } = &err {
                // The record is already persisted; surface the transport
                // failure and let downstream consumers react to the event.
                let detail = delivery_detail(source);
                state.publish_event(Event::MailDeliveryFailed {
                    recipient: *recipient,
                    detail: detail.clone(),
                });
                return Err(ApiError::delivery_failed(detail));
            }
            Err(map_relay_error(&err))
        }
    }
}

fn outcome_label(err: &RelayError) -> &'static str {
    match err {
        RelayError::Delivery { .. } => "delivery_failed",
        RelayError::Persist { .. } | RelayError::Directory { .. } => "failed",
        _ => "rejected",
    }
}

fn delivery_detail(source: &MailError) -> String {
    match source {
        MailError::Rejected { status } => {
            format!("mail gateway rejected the message (status {status})")
        }
        MailError::Request { source } => format!("mail gateway request failed: {source}"),
    }
}

fn map_relay_error(err: &RelayError) -> ApiError {
    match err {
        RelayError::MissingFields { fields } => {
            let params = fields
                .iter()
                .map(|field| ProblemInvalidParam {
                    pointer: format!("/{field}"),
                    message: format!("{field} is required"),
                })
                .collect();
            ApiError::validation_failed(format!(
                "Missing required contact fields: {}.",
                fields.join(", ")
            ))
            .with_invalid_params(params)
        }
        RelayError::UnknownRecipient { recipient } => ApiError::validation_failed(format!(
            "Recipient ({recipient}) does not exist. Please provide a valid recipient account id."
        )),
        RelayError::RecipientOptedOut { .. } => ApiError::validation_failed(
            "The provided recipient has disabled the option to be contacted.",
        ),
        other => {
            error!(error = %other, "contact relay failed");
            ApiError::internal("failed to relay the contact message")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::constants::{PROBLEM_DELIVERY_FAILED, PROBLEM_VALIDATION_FAILED};
    use crate::test_support::{sender_account, state_with, state_with_failing_mailer, stub_settings_with_accounts};
    use axum::http::StatusCode;

    fn contact_request(recipient: &str) -> ContactRequest {
        ContactRequest {
            recipient: Some(recipient.to_string()),
            subject: Some("Hi".to_string()),
            message: Some("Hello".to_string()),
            copy: None,
        }
    }

    #[tokio::test]
    async fn accepted_submission_returns_the_confirmation() {
        let state = state_with(stub_settings_with_accounts(vec![(42, true)]));
        let context = AuthContext {
            account: sender_account(),
        };

        let Json(body) = contact_user(State(state), Extension(context), Json(contact_request("42")))
            .await
            .expect("submission should succeed");
        assert_eq!(body.message, CONFIRMATION);
    }

    #[tokio::test]
    async fn missing_fields_surface_as_validation_problems() {
        let state = state_with(stub_settings_with_accounts(vec![(42, true)]));
        let context = AuthContext {
            account: sender_account(),
        };
        let request = ContactRequest {
            recipient: Some("42".to_string()),
            subject: None,
            message: Some("Hello".to_string()),
            copy: None,
        };

        let err = contact_user(State(state), Extension(context), Json(request))
            .await
            .expect_err("missing subject must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, PROBLEM_VALIDATION_FAILED);
        let params = err.invalid_params.expect("pointers should be attached");
        assert_eq!(params[0].pointer, "/subject");
    }

    #[tokio::test]
    async fn opted_out_recipient_is_a_validation_problem() {
        let state = state_with(stub_settings_with_accounts(vec![(42, false)]));
        let context = AuthContext {
            account: sender_account(),
        };

        let err = contact_user(State(state), Extension(context), Json(contact_request("42")))
            .await
            .expect_err("opted-out recipient must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, PROBLEM_VALIDATION_FAILED);
    }

    #[tokio::test]
    async fn delivery_failure_is_a_server_problem_with_the_cause() {
        let state = state_with_failing_mailer(stub_settings_with_accounts(vec![(42, true)]));
        let context = AuthContext {
            account: sender_account(),
        };

        let err = contact_user(State(state), Extension(context), Json(contact_request("42")))
            .await
            .expect_err("gateway rejection must surface");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind, PROBLEM_DELIVERY_FAILED);
    }
}
