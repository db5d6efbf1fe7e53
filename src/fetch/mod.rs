//! Transport: one GET against the Bizkaibus stop-passage endpoint.

mod client;

pub use client::{BasicClient, HttpClient};

use std::time::Duration;

use reqwest::{Method, Request, StatusCode, Url};
use tracing::debug;

use crate::arrival::StopRoute;
use crate::error::FetchError;

/// Fixed resource serving upcoming passages for a stop/route pair.
pub const RESOURCE_URL: &str =
    "http://apli.bizkaia.net/APPS/DANOK/TQWS/TQ.ASMX/GetPasoParadaMobile_JSON";

/// Deadline for the whole round trip, body included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters identifying the stop and route, in wire order.
pub fn query_params(stop_route: &StopRoute) -> [(&'static str, &str); 3] {
    [
        ("callback", ""),
        ("strLinea", stop_route.route()),
        ("strParada", stop_route.stop()),
    ]
}

/// Builds the full request URL for `stop_route` against `endpoint`.
pub fn request_url(endpoint: &str, stop_route: &StopRoute) -> Result<Url, FetchError> {
    Url::parse_with_params(endpoint, query_params(stop_route)).map_err(|e| {
        FetchError::InvalidUrl {
            url: endpoint.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Issues a single GET and returns the raw reply body, unparsed.
///
/// # Errors
///
/// Returns [`FetchError::Timeout`] if the reply is not fully read within
/// `timeout`, [`FetchError::Status`] for anything other than `200 OK`, and
/// [`FetchError::Request`] for connection or body errors. There are no
/// retries.
#[tracing::instrument(skip(client, stop_route), fields(stop = %stop_route.stop(), route = %stop_route.route()))]
pub async fn connect<C: HttpClient>(
    client: &C,
    endpoint: &str,
    stop_route: &StopRoute,
    timeout: Duration,
) -> Result<String, FetchError> {
    let url = request_url(endpoint, stop_route)?;
    let req = Request::new(Method::GET, url);

    let body = tokio::time::timeout(timeout, fetch_text(client, req))
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;

    debug!(chars = body.chars().count(), "Reply received");
    Ok(body)
}

async fn fetch_text<C: HttpClient>(client: &C, req: Request) -> Result<String, FetchError> {
    let resp = client.execute(req).await?;

    let status = resp.status();
    if status != StatusCode::OK {
        return Err(FetchError::Status(status));
    }

    Ok(resp.text().await?)
}
