//! GET and HEAD: downloads, listings, metadata, revisions, zip.

use crate::error::ApiError;
use crate::handlers::RequestContext;
use crate::response;
use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sluice_auth::AuthAction;
use sluice_provider::{zip_folder, ByteRange, Download, EntryPath, Metadata, ProviderHandle};

pub async fn get(ctx: &RequestContext, headers: &HeaderMap) -> Result<Response, ApiError> {
    let (_bundle, provider) = ctx.bundle_and_provider(AuthAction::Read).await?;
    let path = provider.validate_v1_path(&ctx.raw_path).await?;

    if path.is_folder() {
        if ctx.flag("zip") {
            return zip_response(ctx, &provider, &path).await;
        }
        let children = provider.children(&path).await?;
        return Ok(Json(response::json_api_listing(&children, &ctx.resource, ctx.domain())).into_response());
    }

    // `meta` beats `revisions`, which beat a plain download.
    if ctx.flag("meta") {
        let metadata = provider.metadata(&path, ctx.version_param()).await?;
        return Ok(Json(response::json_api_document(&metadata, &ctx.resource, ctx.domain())).into_response());
    }
    if ctx.flag("revisions") || ctx.flag("versions") {
        let revisions = provider.revisions(&path).await?;
        return Ok(Json(response::json_api_revisions(&revisions)).into_response());
    }

    download(ctx, &provider, &path, headers).await
}

/// HEAD on a file answers with metadata as headers and no body; folders
/// have no meaningful header form.
pub async fn head(ctx: &RequestContext) -> Result<Response, ApiError> {
    let (_bundle, provider) = ctx.bundle_and_provider(AuthAction::Read).await?;
    let path = provider.validate_v1_path(&ctx.raw_path).await?;
    if path.is_folder() {
        return Err(ApiError::new(
            StatusCode::NOT_IMPLEMENTED,
            "NotImplemented",
            "metadata headers are not available for folders",
        ));
    }

    let metadata = provider.metadata(&path, ctx.version_param()).await?;
    let document = response::json_api_document(&metadata, &ctx.resource, ctx.domain());
    let mut builder = Response::builder().status(StatusCode::OK);
    if let Metadata::File(file) = &metadata {
        if let Some(size) = file.size {
            builder = builder.header(header::CONTENT_LENGTH, size);
        }
        if let Some(modified) = file.modified {
            builder = builder.header(header::LAST_MODIFIED, response::http_date(modified));
        }
        builder = builder.header(
            header::CONTENT_TYPE,
            file.content_type.as_deref().unwrap_or("application/octet-stream"),
        );
    }
    builder = builder.header("X-Sluice-Metadata", document.to_string());
    builder.body(Body::empty()).map_err(|_| ApiError::invalid_parameters("unrepresentable response headers"))
}

async fn download(
    ctx: &RequestContext,
    provider: &ProviderHandle,
    path: &EntryPath,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let version = ctx.version_param();
    let range = parse_range(headers);

    let metadata = provider.metadata(path, version).await?;
    let (size, content_type) = match &metadata {
        Metadata::File(file) => (file.size, file.content_type.clone()),
        Metadata::Folder(_) => return Err(ApiError::invalid_parameters("cannot download a folder directly")),
    };

    // An unsatisfiable start offset is 416, not an empty stream.
    if let (Some(range), Some(size)) = (&range, size) {
        if range.start >= size {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{size}"))
                .body(Body::empty())
                .map_err(|_| ApiError::invalid_parameters("unrepresentable response headers"));
        }
    }

    let accept_redirect = !ctx.flag("direct");
    let stream = match provider.download(path, version, range, accept_redirect).await? {
        Download::Redirect(url) => {
            return Response::builder()
                .status(StatusCode::FOUND)
                .header(header::LOCATION, url)
                .body(Body::empty())
                .map_err(|_| ApiError::invalid_parameters("unrepresentable redirect"));
        },
        Download::Stream(stream) => stream,
    };

    let name = ctx
        .param("displayName")
        .map(String::from)
        .or_else(|| stream.name().map(String::from))
        .unwrap_or_else(|| path.name().to_string());

    let mut status = StatusCode::OK;
    let mut builder = Response::builder();
    if let (Some(range), Some(size)) = (&range, size) {
        let end = range.end.map(|end| end.min(size - 1)).unwrap_or(size - 1);
        // Only answer 206 when the client asked for less than everything;
        // some media players refuse 206 for a full-range request.
        if !(range.start == 0 && end == size - 1) {
            status = StatusCode::PARTIAL_CONTENT;
            builder = builder.header(header::CONTENT_RANGE, format!("bytes {}-{end}/{size}", range.start));
        }
    }
    if let Some(length) = stream.size() {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }
    builder = builder
        .status(status)
        .header(header::CONTENT_TYPE, content_type.as_deref().unwrap_or("application/octet-stream"))
        .header(header::CONTENT_DISPOSITION, response::make_disposition(&name));
    builder.body(Body::from_stream(stream)).map_err(|_| ApiError::invalid_parameters("unrepresentable response"))
}

async fn zip_response(
    ctx: &RequestContext,
    provider: &ProviderHandle,
    path: &EntryPath,
) -> Result<Response, ApiError> {
    let archive_name = if path.is_root() {
        format!("{}-archive.zip", provider.name())
    } else {
        format!("{}.zip", path.name())
    };
    let stream = zip_folder(provider, path).await?;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, response::make_disposition(&archive_name))
        .body(Body::from_stream(stream))
        .map_err(|_| ApiError::invalid_parameters("unrepresentable response"))
}

/// A single `bytes=a-b` range. Anything else (suffix ranges, multiple
/// ranges, malformed values) is treated as if the header were absent.
fn parse_range(headers: &HeaderMap) -> Option<ByteRange> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end = match end {
        "" => None,
        bounded => Some(bounded.parse::<u64>().ok()?),
    };
    if end.is_some_and(|end| end < start) {
        return None;
    }
    Some(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_parse_range_variants() {
        assert_eq!(parse_range(&range_headers("bytes=0-4")), Some(ByteRange { start: 0, end: Some(4) }));
        assert_eq!(parse_range(&range_headers("bytes=7-")), Some(ByteRange { start: 7, end: None }));
        // Invalid ranges are ignored, not rejected.
        assert_eq!(parse_range(&range_headers("bytes=-5")), None);
        assert_eq!(parse_range(&range_headers("bytes=9-2")), None);
        assert_eq!(parse_range(&range_headers("items=0-4")), None);
        assert_eq!(parse_range(&HeaderMap::new()), None);
    }
}
