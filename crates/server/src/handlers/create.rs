//! PUT: file uploads, file updates and folder creation.

use crate::error::ApiError;
use crate::handlers::{content_length, RequestContext};
use crate::notify::{dispatch, NotifyEvent};
use crate::response;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::TryStreamExt;
use sluice_auth::AuthAction;
use sluice_streams::ByteStream;

pub async fn put(ctx: &RequestContext, request: Request) -> Result<Response, ApiError> {
    // Everything checkable without touching the backend happens before the
    // auth call: a bad request should not spend provider API quota.
    let kind = ctx.param("kind").unwrap_or("file");
    if !matches!(kind, "file" | "folder") {
        return Err(ApiError::invalid_parameters(format!(
            "kind must be file, folder or unspecified (interpreted as file), not '{kind}'"
        )));
    }
    let length = content_length(request.headers());
    if kind == "file" && length.is_none() {
        return Err(ApiError::invalid_parameters_with_status(
            StatusCode::LENGTH_REQUIRED,
            "Content-Length is required for file uploads",
        ));
    }
    if kind == "folder" && length.unwrap_or(0) > 0 {
        return Err(ApiError::invalid_parameters_with_status(
            StatusCode::PAYLOAD_TOO_LARGE,
            "folder creation requests may not have a body",
        ));
    }

    let (bundle, provider) = ctx.bundle_and_provider(AuthAction::Write).await?;
    let path = provider.validate_v1_path(&ctx.raw_path).await?;

    // The URL names either the containing folder (create, `name` required)
    // or the file itself (update, `name` forbidden).
    let target = if path.is_folder() {
        let Some(name) = ctx.param("name") else {
            return Err(ApiError::invalid_parameters("missing required parameter 'name'"));
        };
        path.child(name, None, kind == "folder")?
    } else {
        if ctx.param("name").is_some() {
            return Err(ApiError::invalid_parameters("'name' does not apply to actions on files"));
        }
        if kind == "folder" {
            return Err(ApiError::invalid_parameters_with_status(
                StatusCode::CONFLICT,
                "path must be a folder (and end with a slash) to create a subfolder",
            ));
        }
        path.clone()
    };

    if target.is_folder() {
        let folder = provider.create_folder(&target).await?;
        let metadata = sluice_provider::Metadata::Folder(folder);
        let document = response::json_api_document(&metadata, &ctx.resource, ctx.domain());
        dispatch(
            &ctx.state.notifier,
            NotifyEvent {
                action: "create_folder",
                resource: ctx.resource.clone(),
                provider: ctx.provider_name.clone(),
                path: metadata.path().to_string(),
                metadata: Some(document.clone()),
                identity: bundle.identity,
            },
        );
        return Ok((StatusCode::CREATED, Json(document)).into_response());
    }

    let stream = body_stream(request, length);
    let (file, created) = provider.upload(stream, &target).await?;
    let metadata = sluice_provider::Metadata::File(file);
    let document = response::json_api_document(&metadata, &ctx.resource, ctx.domain());
    dispatch(
        &ctx.state.notifier,
        NotifyEvent {
            action: if created { "create" } else { "update" },
            resource: ctx.resource.clone(),
            provider: ctx.provider_name.clone(),
            path: metadata.path().to_string(),
            metadata: Some(document.clone()),
            identity: bundle.identity,
        },
    );
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(document)).into_response())
}

/// Adapt the request body into a sized byte stream; the provider verifies
/// the declared length against what actually arrives.
fn body_stream(request: Request, size: Option<u64>) -> ByteStream {
    let stream = request.into_body().into_data_stream().map_err(std::io::Error::other);
    ByteStream::new(stream, size)
}
