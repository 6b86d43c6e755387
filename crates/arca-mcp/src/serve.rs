use anyhow::Context;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::dispatcher::McpDispatcher;
use crate::protocol::{jsonrpc_error_frame, jsonrpc_result_frame, parse_request_frame};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Public struct `McpServeReport` used across Arca components.
pub struct McpServeReport {
    pub processed_frames: u64,
    pub error_count: u64,
}

/// Serves newline-delimited JSON-RPC frames from `input` until EOF, writing
/// replies to `output`. A frame without an identifier is a notification: it is
/// still dispatched, but the single reply write below is skipped for it, even
/// when the dispatch fails.
pub async fn serve_ndjson<R, W>(
    dispatcher: &McpDispatcher,
    mut input: R,
    mut output: W,
) -> anyhow::Result<McpServeReport>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    let mut report = McpServeReport::default();

    loop {
        line.clear();
        let read = input
            .read_line(&mut line)
            .await
            .context("failed to read request line")?;
        if read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        report.processed_frames = report.processed_frames.saturating_add(1);

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(error) => {
                report.error_count = report.error_count.saturating_add(1);
                warn!("skipping undecodable request line: {error}");
                continue;
            }
        };

        let (reply_id, outcome) = match parse_request_frame(&value) {
            Ok(frame) => {
                let outcome = dispatcher
                    .dispatch(&frame)
                    .await
                    .map_err(|error| (error.code, error.message));
                (frame.id, outcome)
            }
            Err(error) => (error.id, Err((error.code, error.message))),
        };
        if outcome.is_err() {
            report.error_count = report.error_count.saturating_add(1);
        }

        match (reply_id, outcome) {
            (Some(id), Ok(result)) => {
                write_frame(&mut output, &jsonrpc_result_frame(&id, result)).await?;
            }
            (Some(id), Err((code, message))) => {
                write_frame(&mut output, &jsonrpc_error_frame(&id, code, &message)).await?;
            }
            (None, Ok(_)) => {}
            (None, Err((_, message))) => {
                warn!("notification failed: {message}");
            }
        }
    }

    Ok(report)
}

async fn write_frame<W>(output: &mut W, frame: &Value) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = serde_json::to_vec(frame).context("failed to encode response frame")?;
    encoded.push(b'\n');
    output
        .write_all(&encoded)
        .await
        .context("failed to write response frame")?;
    output
        .flush()
        .await
        .context("failed to flush response frame")?;
    Ok(())
}
