//! Response classification
//!
//! A status code listed in the provider's [`FailCodeTable`] is an error;
//! anything else, including other 4xx/5xx codes, is delivered as a
//! successful [`Reply`].

use crate::error::{Error, Result};
use crate::fail_codes::FailCodeTable;
use crate::stream::{DownloadSlot, Reply, ResponseHead};
use bytes::Bytes;
use futures::StreamExt;
use nimbus_transport::{HttpResponse, StreamingResponse};
use serde_json::Value;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;

fn head(status: u16, headers: HashMap<String, String>) -> ResponseHead {
    ResponseHead {
        status,
        headers: headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect(),
    }
}

/// Build the provider error for a fail-coded response.
///
/// An empty body yields `Value::Null`; a body that is not JSON yields
/// [`Error::MalformedErrorBody`].
pub fn provider_error(provider: &str, status: u16, reason: &str, body: &[u8]) -> Error {
    let code = status.to_string();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Error::Provider {
            provider: provider.to_string(),
            code,
            reason: reason.to_string(),
            result: Value::Null,
        };
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(result) => Error::Provider {
            provider: provider.to_string(),
            code,
            reason: reason.to_string(),
            result,
        },
        Err(source) => Error::MalformedErrorBody {
            provider: provider.to_string(),
            code,
            reason: reason.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
            source,
        },
    }
}

/// Classify a buffered response.
pub fn classify(provider: &str, fail_codes: &FailCodeTable, response: HttpResponse) -> Result<Reply> {
    if let Some(reason) = fail_codes.reason(&response.status.to_string()) {
        return Err(provider_error(provider, response.status, reason, &response.body));
    }

    Ok(Reply {
        body: response.body,
        response: head(response.status, response.headers),
    })
}

/// Classify a streamed response, piping the body to the registered
/// download destination when there is one.
///
/// Waits for the destination to be settled before reading a successful
/// body. Fail-coded responses are always collected so the error carries
/// the body.
pub(crate) async fn classify_streaming(
    provider: &str,
    fail_codes: &FailCodeTable,
    response: StreamingResponse,
    download: &DownloadSlot,
) -> Result<Reply> {
    if fail_codes.contains(&response.status.to_string()) {
        return classify(provider, fail_codes, response.collect().await?);
    }

    download.settled().await;
    let Some(mut target) = download.take() else {
        return classify(provider, fail_codes, response.collect().await?);
    };

    let StreamingResponse {
        status,
        headers,
        mut body,
    } = response;
    let mut written = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        written += chunk.len();
        target.write_all(&chunk).await?;
    }
    target.flush().await?;
    tracing::debug!(status, written, "download piped to destination");

    Ok(Reply {
        body: Bytes::new(),
        response: head(status, headers),
    })
}
