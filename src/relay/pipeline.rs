use futures_util::StreamExt;
use salvo::http::body::BodySender;
use tracing::{debug, error};

use crate::models::CompletionChunk;
use crate::relay::filter::FragmentFilter;
use crate::relay::sse::{DONE_SENTINEL, SseEvent, SseParser};

/// Decision for one parsed SSE event.
enum RelayStep {
    Forward(String),
    Skip,
    Done,
    Fail(String),
}

enum RelayOutcome {
    Continue,
    Stop,
}

/// Pumps the upstream SSE body into the downstream plain-byte channel.
///
/// Terminates on the `[DONE]` sentinel, on upstream EOF (graceful, never
/// hangs waiting for a sentinel that will not arrive), on a decode or parse
/// failure (errored close, already-sent bytes stand), or when the downstream
/// reader goes away. Dropping the upstream response on return releases the
/// HTTP connection, so no work continues for a disconnected client.
pub async fn relay_completion_stream(
    upstream_response: reqwest::Response,
    mut sender: BodySender,
    request_id: String,
) {
    let mut parser = SseParser::new();
    let mut filter = FragmentFilter::new();
    let mut upstream_stream = upstream_response.bytes_stream();

    while let Some(chunk_result) = upstream_stream.next().await {
        let chunk = match chunk_result {
            Ok(value) => value,
            Err(error) => {
                log_stream_read_error(&error, &request_id);
                return;
            }
        };

        let events = match parser.feed(&chunk) {
            Ok(value) => value,
            Err(error) => {
                error!(phase = "relay_decode_error", request_id = %request_id, "{error}");
                return;
            }
        };

        if let RelayOutcome::Stop =
            forward_events(events, &mut filter, &mut sender, &request_id).await
        {
            return;
        }
    }

    // Upstream closed without the sentinel. Flush whatever record is still
    // pending, then close cleanly.
    match parser.finish() {
        Ok(Some(event)) => {
            let _ = forward_events(vec![event], &mut filter, &mut sender, &request_id).await;
        }
        Ok(None) => {}
        Err(error) => {
            error!(phase = "relay_decode_error", request_id = %request_id, "{error}");
            return;
        }
    }

    debug!(
        phase = "relay_upstream_eof",
        request_id = %request_id,
        "Upstream closed without the done sentinel"
    );
}

async fn forward_events(
    events: Vec<SseEvent>,
    filter: &mut FragmentFilter,
    sender: &mut BodySender,
    request_id: &str,
) -> RelayOutcome {
    for event in events {
        match next_step(event, filter) {
            RelayStep::Forward(text) => {
                if sender.send_data(text).await.is_err() {
                    debug!(
                        phase = "relay_client_gone",
                        request_id = %request_id,
                        "Downstream reader disconnected, releasing the upstream stream"
                    );
                    return RelayOutcome::Stop;
                }
            }
            RelayStep::Skip => {}
            RelayStep::Done => {
                debug!(
                    phase = "relay_done",
                    request_id = %request_id,
                    "Upstream sent the done sentinel"
                );
                return RelayOutcome::Stop;
            }
            RelayStep::Fail(message) => {
                error!(phase = "relay_chunk_error", request_id = %request_id, "{message}");
                return RelayOutcome::Stop;
            }
        }
    }

    RelayOutcome::Continue
}

fn next_step(event: SseEvent, filter: &mut FragmentFilter) -> RelayStep {
    let SseEvent::Event { data } = event else {
        return RelayStep::Skip;
    };

    if data == DONE_SENTINEL {
        return RelayStep::Done;
    }

    let chunk = match serde_json::from_str::<CompletionChunk>(&data) {
        Ok(value) => value,
        Err(error) => {
            return RelayStep::Fail(format!(
                "malformed completion payload in upstream stream: {error}"
            ));
        }
    };

    let text = chunk.first_text();
    if filter.admit(text) {
        RelayStep::Forward(text.to_string())
    } else {
        RelayStep::Skip
    }
}

fn log_stream_read_error(error: &reqwest::Error, request_id: &str) {
    if error.is_timeout() {
        error!(
            phase = "relay_upstream_timeout",
            request_id = %request_id,
            "Streaming interrupted by upstream read timeout"
        );
        return;
    }

    error!(
        phase = "relay_upstream_error",
        request_id = %request_id,
        "Streaming interrupted while reading upstream body: {error}"
    );
}

#[cfg(test)]
mod tests {
    use super::{RelayStep, next_step};
    use crate::relay::filter::FragmentFilter;
    use crate::relay::sse::{SseEvent, SseParser};

    #[derive(Debug, PartialEq, Eq)]
    enum Close {
        Sentinel,
        UpstreamEof,
        Error,
    }

    /// Drives the parse/classify/filter stages over raw upstream chunks the
    /// same way the async pipeline does, minus the I/O.
    fn run_relay(chunks: &[&[u8]]) -> (Vec<String>, Close) {
        let mut parser = SseParser::new();
        let mut filter = FragmentFilter::new();
        let mut forwarded = Vec::new();

        for chunk in chunks {
            let events = match parser.feed(chunk) {
                Ok(value) => value,
                Err(_) => return (forwarded, Close::Error),
            };
            for event in events {
                match next_step(event, &mut filter) {
                    RelayStep::Forward(text) => forwarded.push(text),
                    RelayStep::Skip => {}
                    RelayStep::Done => return (forwarded, Close::Sentinel),
                    RelayStep::Fail(_) => return (forwarded, Close::Error),
                }
            }
        }

        if let Ok(Some(event)) = parser.finish() {
            match next_step(event, &mut filter) {
                RelayStep::Forward(text) => forwarded.push(text),
                RelayStep::Skip | RelayStep::Fail(_) => {}
                RelayStep::Done => return (forwarded, Close::Sentinel),
            }
        }

        (forwarded, Close::UpstreamEof)
    }

    fn text_record(text: &str) -> Vec<u8> {
        let payload = serde_json::json!({
            "choices": [{ "text": text, "index": 0, "logprobs": null, "finish_reason": null }]
        });
        format!("data: {payload}\n\n").into_bytes()
    }

    #[test]
    fn forwards_text_and_closes_on_sentinel() {
        let record = text_record("Hello");
        let (forwarded, close) = run_relay(&[&record, b"data: [DONE]\n\n"]);
        assert_eq!(forwarded, vec!["Hello"]);
        assert_eq!(close, Close::Sentinel);
    }

    #[test]
    fn drops_leading_newline_fragments_without_counting_them() {
        let records: Vec<Vec<u8>> = ["\n\n", "\n\n", "\n\n", "Hello", " world\n", " world"]
            .iter()
            .map(|text| text_record(text))
            .collect();
        let chunks: Vec<&[u8]> = records.iter().map(|record| record.as_slice()).collect();

        let (forwarded, close) = run_relay(&chunks);
        // "Hello" is only the first forwarded fragment, so " world\n" still
        // hits the leading filter; the newline-free resend passes
        assert_eq!(forwarded, vec!["Hello", " world"]);
        assert_eq!(close, Close::UpstreamEof);
    }

    #[test]
    fn newline_fragments_pass_once_two_fragments_forwarded() {
        let records: Vec<Vec<u8>> = ["Step", " 1", "\n\nStep 2"]
            .iter()
            .map(|text| text_record(text))
            .collect();
        let mut chunks: Vec<&[u8]> = records.iter().map(|record| record.as_slice()).collect();
        chunks.push(b"data: [DONE]\n\n");

        let (forwarded, close) = run_relay(&chunks);
        assert_eq!(forwarded, vec!["Step", " 1", "\n\nStep 2"]);
        assert_eq!(close, Close::Sentinel);
    }

    #[test]
    fn malformed_payload_errors_and_stops_forwarding() {
        let record = text_record("kept");
        let (forwarded, close) = run_relay(&[
            &record,
            b"data: {not json}\n\n",
            b"data: {\"choices\":[{\"text\":\"never sent\"}]}\n\n",
        ]);
        assert_eq!(forwarded, vec!["kept"]);
        assert_eq!(close, Close::Error);
    }

    #[test]
    fn upstream_eof_without_sentinel_closes_cleanly() {
        let record = text_record("partial recipe");
        let (forwarded, close) = run_relay(&[&record]);
        assert_eq!(forwarded, vec!["partial recipe"]);
        assert_eq!(close, Close::UpstreamEof);
    }

    #[test]
    fn handles_records_split_across_chunks() {
        let record = text_record("Tacos al pastor");
        let (first, second) = record.split_at(7);
        let (forwarded, close) = run_relay(&[first, second, b"data: [DON", b"E]\n\n"]);
        assert_eq!(forwarded, vec!["Tacos al pastor"]);
        assert_eq!(close, Close::Sentinel);
    }

    #[test]
    fn preserves_fragment_order() {
        let texts = ["Preheat", " the", " oven", " to", " 180C"];
        let records: Vec<Vec<u8>> = texts.iter().map(|text| text_record(text)).collect();
        let mut chunks: Vec<&[u8]> = records.iter().map(|record| record.as_slice()).collect();
        chunks.push(b"data: [DONE]\n\n");

        let (forwarded, _) = run_relay(&chunks);
        assert_eq!(forwarded.concat(), "Preheat the oven to 180C");
    }

    #[test]
    fn reconnect_interval_records_are_skipped() {
        let record = text_record("ok");
        let (forwarded, close) = run_relay(&[b"retry: 1500\n\n", &record, b"data: [DONE]\n\n"]);
        assert_eq!(forwarded, vec!["ok"]);
        assert_eq!(close, Close::Sentinel);
    }

    #[test]
    fn missing_text_field_counts_as_empty_fragment() {
        let (forwarded, close) = run_relay(&[
            b"data: {\"choices\":[{\"index\":0}]}\n\n",
            b"data: [DONE]\n\n",
        ]);
        assert_eq!(forwarded, vec![""]);
        assert_eq!(close, Close::Sentinel);
    }

    #[test]
    fn sentinel_in_unterminated_final_record_still_closes() {
        let (forwarded, close) = run_relay(&[b"data: [DONE]"]);
        assert!(forwarded.is_empty());
        assert_eq!(close, Close::Sentinel);
    }
}
