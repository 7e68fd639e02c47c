//! The request pipeline
//!
//! Two routes lead to the transport. A request made while the client is not
//! yet authorized against a gated provider first waits for authentication,
//! with its upload held in a [`StreamBuffer`]. Every other request is
//! dispatched straight away. Both routes end in [`dispatch`], which runs the
//! hooks, resolves the URI, sends, and classifies the response.

use crate::client::ClientInner;
use crate::error::Result;
use crate::hooks::apply_hooks;
use crate::observability::{self, RequestMetadata, RequestTimer, ResponseMetadata};
use crate::request::RequestDescriptor;
use crate::response::{classify, classify_streaming};
use crate::stream::{DownloadSlot, Reply, StreamBuffer};
use nimbus_transport::{BodyStream, HttpRequest, RequestBody};
use std::sync::Arc;

/// Run a request that was held behind the auth gate.
pub(crate) async fn run_gated(
    inner: Arc<ClientInner>,
    mut descriptor: RequestDescriptor,
    buffer: StreamBuffer,
    download: DownloadSlot,
) -> Result<Reply> {
    inner.ensure_authorized().await?;

    let body = if descriptor.upload {
        let state = buffer.state();
        if state.ended {
            descriptor = descriptor.header("content-length", state.size.to_string());
        } else {
            descriptor = descriptor.header("transfer-encoding", "chunked");
        }

        let stream = buffer.body_stream();
        let source = buffer.clone();
        buffer.on_ready(move || source.connect());
        Some(stream)
    } else {
        None
    };

    tracing::debug!(
        provider = %inner.state.profile().name(),
        upload = descriptor.upload,
        "auth gate released"
    );
    dispatch(&inner, descriptor, body, &download).await
}

/// Hooks, URI, send, classify.
pub(crate) async fn dispatch(
    inner: &ClientInner,
    descriptor: RequestDescriptor,
    upload: Option<BodyStream>,
    download: &DownloadSlot,
) -> Result<Reply> {
    let state = &inner.state;
    let profile = state.profile();

    let descriptor = apply_hooks(&state.hook_snapshot(), state, descriptor);

    let mut url = profile.url(descriptor.path.segments())?;
    if let Some(query) = descriptor.encoded_query() {
        url.set_query(Some(&query));
    }

    let body = match (upload, descriptor.body) {
        (Some(stream), _) => RequestBody::Stream(stream),
        (None, Some(bytes)) => RequestBody::Bytes(bytes),
        (None, None) => RequestBody::Empty,
    };
    let metadata = RequestMetadata::new(profile.name(), descriptor.method.as_str(), url.as_str())
        .with_body_size(body.known_len())
        .streamed(body.is_stream());

    let request = HttpRequest {
        method: descriptor.method.to_string(),
        url: url.into(),
        headers: descriptor.headers,
        body,
    };

    metadata.log_request();
    let timer = RequestTimer::start();

    let outcome = if descriptor.download {
        match inner.transport.send_streaming(request).await {
            Ok(response) => {
                classify_streaming(profile.name(), profile.fail_codes(), response, download).await
            }
            Err(e) => {
                observability::log_transport_error(&metadata, timer.elapsed(), &e.to_string());
                return Err(e.into());
            }
        }
    } else {
        match inner.transport.send_http(request).await {
            Ok(response) => classify(profile.name(), profile.fail_codes(), response),
            Err(e) => {
                observability::log_transport_error(&metadata, timer.elapsed(), &e.to_string());
                return Err(e.into());
            }
        }
    };

    match &outcome {
        Ok(reply) => ResponseMetadata::new(reply.response.status, timer.elapsed())
            .with_body_size(reply.body.len())
            .log_success(&metadata),
        Err(e) => ResponseMetadata::new(e.status_code().unwrap_or_default(), timer.elapsed())
            .log_error(&metadata, &e.to_string()),
    }
    outcome
}
