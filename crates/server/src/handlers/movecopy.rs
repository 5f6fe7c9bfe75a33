//! POST: rename, move and copy.

use crate::error::ApiError;
use crate::handlers::{content_length, RequestContext};
use crate::notify::{dispatch, NotifyEvent};
use crate::response;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use sluice_auth::AuthAction;
use sluice_transfer::{transfer, ConflictPolicy, TransferKind, TransferOptions, TransferOutcome};

/// There is no reason for a move/copy body to approach this.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MoveCopyBody {
    action: Option<String>,
    path: Option<String>,
    rename: Option<String>,
    conflict: Option<String>,
    resource: Option<String>,
    provider: Option<String>,
}

pub async fn post(ctx: &RequestContext, request: Request) -> Result<Response, ApiError> {
    let Some(length) = content_length(request.headers()) else {
        return Err(ApiError::invalid_parameters_with_status(
            StatusCode::LENGTH_REQUIRED,
            "Content-Length is required",
        ));
    };
    if length > MAX_BODY_BYTES {
        return Err(ApiError::invalid_parameters_with_status(
            StatusCode::PAYLOAD_TOO_LARGE,
            "request body must be under 1 MiB",
        ));
    }
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES as usize)
        .await
        .map_err(|_| ApiError::invalid_parameters("request body could not be read"))?;
    let body: MoveCopyBody =
        serde_json::from_slice(&bytes).map_err(|_| ApiError::invalid_parameters("invalid json body"))?;

    match body.action.as_deref() {
        Some("rename") => rename(ctx, body).await,
        Some("move") => move_or_copy(ctx, body, TransferKind::Move).await,
        Some("copy") => move_or_copy(ctx, body, TransferKind::Copy).await,
        other => Err(ApiError::invalid_parameters(format!(
            "action must be copy, move or rename, not '{}'",
            other.unwrap_or("null")
        ))),
    }
}

/// Rename is a move into the entity's own parent under a new name.
async fn rename(ctx: &RequestContext, body: MoveCopyBody) -> Result<Response, ApiError> {
    let Some(new_name) = body.rename else {
        return Err(ApiError::invalid_parameters("rename is required for renaming"));
    };
    let (bundle, provider) = ctx.bundle_and_provider(AuthAction::Write).await?;
    let path = provider.validate_v1_path(&ctx.raw_path).await?;
    if path.is_root() {
        return Err(ApiError::invalid_parameters("cannot rename the root"));
    }

    let options = TransferOptions {
        rename: Some(new_name),
        conflict: parse_conflict(body.conflict.as_deref())?,
        inactivity_timeout: ctx.transfer_timeout(),
    };
    let outcome = transfer(TransferKind::Move, &provider, &path, &provider, &path.parent(), options).await?;
    // A rename is 200 regardless: nothing the caller didn't already know
    // about came into existence.
    respond(ctx, "move", &ctx.resource, &ctx.provider_name, outcome, bundle.identity, StatusCode::OK)
}

async fn move_or_copy(ctx: &RequestContext, body: MoveCopyBody, kind: TransferKind) -> Result<Response, ApiError> {
    let Some(dest_raw) = body.path.as_deref() else {
        return Err(ApiError::invalid_parameters("path is required for moves or copies"));
    };

    // A move mutates the source; a copy only reads it.
    let source_action = match kind {
        TransferKind::Move => AuthAction::Write,
        TransferKind::Copy => AuthAction::CopyFrom,
    };
    let (bundle, src_provider) = ctx.bundle_and_provider(source_action).await?;
    let src_path = src_provider.validate_v1_path(&ctx.raw_path).await?;

    let dest_resource = body.resource.clone().unwrap_or_else(|| ctx.resource.clone());
    let dest_provider_name = body.provider.clone().unwrap_or_else(|| ctx.provider_name.clone());
    let dest_bundle = ctx
        .state
        .auth
        .fetch(&dest_resource, &dest_provider_name, AuthAction::CopyTo, &ctx.credentials)
        .await?;
    let dest_provider = ctx.state.registry.make(&dest_provider_name, &dest_bundle)?;
    let dest_folder = dest_provider.validate_path(dest_raw).await?;

    let options = TransferOptions {
        rename: body.rename,
        conflict: parse_conflict(body.conflict.as_deref())?,
        inactivity_timeout: ctx.transfer_timeout(),
    };
    let outcome = transfer(kind, &src_provider, &src_path, &dest_provider, &dest_folder, options).await?;

    let action = match kind {
        TransferKind::Move => "move",
        TransferKind::Copy => "copy",
    };
    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    respond(ctx, action, &dest_resource, &dest_provider_name, outcome, bundle.identity, status)
}

fn respond(
    ctx: &RequestContext,
    action: &'static str,
    dest_resource: &str,
    dest_provider: &str,
    outcome: TransferOutcome,
    identity: serde_json::Value,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let mut document = response::json_api_document(&outcome.metadata, dest_resource, ctx.domain());
    if let Some(warning) = &outcome.warning {
        document["warning"] = serde_json::Value::from(warning.clone());
    }

    dispatch(
        &ctx.state.notifier,
        NotifyEvent {
            action,
            resource: dest_resource.to_string(),
            provider: dest_provider.to_string(),
            path: outcome.metadata.path().to_string(),
            metadata: Some(document.clone()),
            identity,
        },
    );

    Ok((status, Json(document)).into_response())
}

fn parse_conflict(raw: Option<&str>) -> Result<ConflictPolicy, ApiError> {
    match raw {
        None => Ok(ConflictPolicy::default()),
        Some(value) => value.parse().map_err(|message: String| ApiError::invalid_parameters(message)),
    }
}
