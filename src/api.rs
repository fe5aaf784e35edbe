use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::stream::aggregate_sse;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    stream: bool,
}

#[derive(Serialize)]
struct UsageReport<'a> {
    wallet_address: &'a str,
    agent_id: &'a str,
    request_text: &'a str,
    response_text: &'a str,
    request_metadata: Value,
}

/// Fetch hashes of coin-transfer transactions seen on the feed in the last
/// five minutes.
///
/// A transport error or non-2xx status is returned to the caller (who
/// rotates the proxy); a 2xx response that is not the expected JSON shape
/// counts as zero transactions.
pub async fn fetch_recent_transfers(client: &Client, feed_url: &str) -> Result<Vec<String>> {
    let resp = client
        .get(feed_url)
        .query(&[("transaction_types", "coin_transfer"), ("age", "5m")])
        .header("accept", "*/*")
        .header("user-agent", USER_AGENT)
        .send()
        .await
        .context("transaction feed request failed")?
        .error_for_status()
        .context("transaction feed rejected")?;

    let body: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => {
            warn!("transaction feed returned non-JSON body: {e}");
            return Ok(Vec::new());
        }
    };
    let hashes = body
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("hash").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(hashes)
}

/// Submit a question to an agent deployment as a streaming chat request and
/// aggregate the streamed answer. `sink` receives each content fragment as
/// it arrives, for live display.
pub async fn send_chat_query<F>(
    client: &Client,
    endpoint_url: &str,
    message: &str,
    sink: F,
) -> Result<String>
where
    F: FnMut(&str),
{
    let resp = client
        .post(endpoint_url)
        .header("accept", "text/event-stream")
        .header("user-agent", USER_AGENT)
        .json(&ChatRequest {
            message,
            stream: true,
        })
        .send()
        .await
        .context("chat request failed")?
        .error_for_status()
        .context("chat request rejected")?;

    let answer = aggregate_sse(resp.bytes_stream(), sink)
        .await
        .context("chat stream aborted")?;
    Ok(answer)
}

/// Report one question/answer pair to the usage-tracking service.
///
/// `Ok(true)` means the service accepted the report with HTTP 200 and points
/// may be credited. `Ok(false)` is any other status; `Err` is a transport
/// failure (the caller rotates the proxy for those).
pub async fn report_usage(
    client: &Client,
    usage_url: &str,
    wallet_address: &str,
    agent_id: &str,
    question: &str,
    answer: &str,
) -> Result<bool> {
    let resp = client
        .post(usage_url)
        .header("user-agent", USER_AGENT)
        .json(&UsageReport {
            wallet_address,
            agent_id,
            request_text: question,
            response_text: answer,
            request_metadata: Value::Object(Default::default()),
        })
        .send()
        .await
        .context("usage report request failed")?;
    Ok(resp.status() == StatusCode::OK)
}
