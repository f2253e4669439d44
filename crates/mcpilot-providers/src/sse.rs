//! Server-Sent Events decoding for OpenAI-style streaming chat completions.
//!
//! Bytes arrive in arbitrary TCP-sized chunks. [`SseDecoder`] keeps the
//! trailing partial line between chunks and turns each complete `data:` line
//! into [`StreamEvent`]s. OpenAI identifies tool-call deltas by `index` and
//! only sends the call `id` on the first delta, so the decoder remembers the
//! index → id mapping and stamps every delta with its id.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::trace;

use crate::traits::{EventStream, ProviderError, StreamEvent};

type DecodedEvent = Result<StreamEvent, ProviderError>;

/// Incremental SSE → [`StreamEvent`] decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    call_ids: HashMap<u64, String>,
    finish_reason: Option<String>,
    completed: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns events for every complete line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(nl) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=nl).collect();
            let line = String::from_utf8_lossy(&line);
            self.decode_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        events
    }

    /// The byte stream ended; flush the last line and close the turn if the
    /// server reported a finish reason but never sent `[DONE]`.
    pub fn finish(&mut self) -> Vec<DecodedEvent> {
        let mut events = Vec::new();
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest);
            self.decode_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        if !self.completed && self.finish_reason.is_some() {
            self.completed = true;
            events.push(Ok(StreamEvent::TurnComplete {
                finish_reason: self.finish_reason.take(),
            }));
        }
        events
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<DecodedEvent>) {
        if self.completed {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            // Blank separators, comments, `event:` lines.
            return;
        };
        let data = data.trim();
        if data.is_empty() {
            return;
        }
        if data == "[DONE]" {
            self.completed = true;
            events.push(Ok(StreamEvent::TurnComplete {
                finish_reason: self.finish_reason.take(),
            }));
            return;
        }

        let chunk: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                events.push(Err(ProviderError::Protocol(format!(
                    "undecodable SSE payload: {e}"
                ))));
                return;
            }
        };
        trace!(chunk = %data, "SSE chunk");

        if let Some(err) = chunk.get("error").filter(|e| !e.is_null()) {
            let message = err["message"].as_str().unwrap_or("unknown error");
            events.push(Err(ProviderError::Unavailable(message.to_string())));
            return;
        }

        let Some(choice) = chunk["choices"].get(0) else {
            // Usage-only chunks carry no choices.
            return;
        };

        let delta = &choice["delta"];
        if let Some(text) = delta["content"].as_str() {
            if !text.is_empty() {
                events.push(Ok(StreamEvent::TextDelta(text.to_string())));
            }
        }

        if let Some(calls) = delta["tool_calls"].as_array() {
            for call in calls {
                events.push(self.decode_tool_call(call));
            }
        }

        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(reason.to_string());
        }
    }

    fn decode_tool_call(&mut self, call: &Value) -> DecodedEvent {
        let index = call["index"].as_u64().unwrap_or(0);
        let id = match call["id"].as_str().filter(|s| !s.is_empty()) {
            Some(id) => {
                self.call_ids.insert(index, id.to_string());
                id.to_string()
            }
            None => self.call_ids.get(&index).cloned().ok_or_else(|| {
                ProviderError::Protocol(format!("tool call delta for unknown index {index}"))
            })?,
        };
        let name = call["function"]["name"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from);
        let arguments = call["function"]["arguments"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(StreamEvent::ToolCallDelta { id, name, arguments })
    }
}

/// Wrap a byte stream into an [`EventStream`].
///
/// A read error on the underlying stream ends the event stream with
/// [`ProviderError::Unavailable`].
pub fn decode_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    struct State<S> {
        inner: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<DecodedEvent>,
        finished: bool,
    }

    let state = State {
        inner: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let events = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(ev) = st.pending.pop_front() {
                return Some((ev, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    let decoded = st.decoder.push(chunk.as_ref());
                    st.pending.extend(decoded);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.pending
                        .push_back(Err(ProviderError::Unavailable(format!("stream read failed: {e}"))));
                }
                None => {
                    st.finished = true;
                    let decoded = st.decoder.finish();
                    st.pending.extend(decoded);
                }
            }
        }
    });

    Box::pin(events)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_events(events: Vec<DecodedEvent>) -> Vec<StreamEvent> {
        events.into_iter().map(|e| e.unwrap()).collect()
    }

    #[test]
    fn decodes_text_delta() {
        let mut dec = SseDecoder::new();
        let events = ok_events(dec.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        ));
        assert_eq!(events, vec![StreamEvent::TextDelta("Hello".into())]);
    }

    #[test]
    fn keeps_partial_line_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"data: {\"choices\":[{\"delta\":{\"con").is_empty());
        let events = ok_events(dec.push(b"tent\":\"lo\"}}]}\n"));
        assert_eq!(events, vec![StreamEvent::TextDelta("lo".into())]);
    }

    #[test]
    fn handles_split_multibyte_character() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"52°F\"}}]}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC2).unwrap() + 1;
        let mut dec = SseDecoder::new();
        assert!(dec.push(&line[..split]).is_empty());
        let events = ok_events(dec.push(&line[split..]));
        assert_eq!(events, vec![StreamEvent::TextDelta("52°F".into())]);
    }

    #[test]
    fn maps_tool_call_index_to_id() {
        let mut dec = SseDecoder::new();
        let first = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_forecast","arguments":""}}]}}]}"#;
        let second = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"lat\":47.6"}}]}}]}"#;
        let mut events = ok_events(dec.push(format!("{first}\n{second}\n").as_bytes()));

        assert_eq!(events.len(), 2);
        assert_eq!(
            events.remove(0),
            StreamEvent::ToolCallDelta {
                id: "call_1".into(),
                name: Some("get_forecast".into()),
                arguments: String::new(),
            }
        );
        assert_eq!(
            events.remove(0),
            StreamEvent::ToolCallDelta {
                id: "call_1".into(),
                name: None,
                arguments: "{\"lat\":47.6".into(),
            }
        );
    }

    #[test]
    fn unknown_index_is_protocol_error() {
        let mut dec = SseDecoder::new();
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":3,"function":{"arguments":"{}"}}]}}]}"#;
        let events = dec.push(format!("{line}\n").as_bytes());
        assert!(matches!(events[0], Err(ProviderError::Protocol(_))));
    }

    #[test]
    fn done_carries_finish_reason() {
        let mut dec = SseDecoder::new();
        let body = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\ndata: [DONE]\n\n";
        let events = ok_events(dec.push(body.as_bytes()));
        assert_eq!(
            events,
            vec![StreamEvent::TurnComplete {
                finish_reason: Some("tool_calls".into())
            }]
        );
        // Nothing after DONE.
        assert!(dec.finish().is_empty());
    }

    #[test]
    fn finish_without_done_completes_when_reason_seen() {
        let mut dec = SseDecoder::new();
        let _ = dec.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"},\"finish_reason\":\"stop\"}]}");
        let events = ok_events(dec.finish());
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("hi".into()),
                StreamEvent::TurnComplete {
                    finish_reason: Some("stop".into())
                }
            ]
        );
    }

    #[test]
    fn truncated_stream_has_no_turn_complete() {
        let mut dec = SseDecoder::new();
        let _ = dec.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n");
        assert!(dec.finish().is_empty());
    }

    #[test]
    fn ignores_comments_and_usage_chunks() {
        let mut dec = SseDecoder::new();
        let body = ": keep-alive\n\ndata: {\"choices\":[],\"usage\":{\"prompt_tokens\":3}}\n";
        assert!(dec.push(body.as_bytes()).is_empty());
    }

    #[test]
    fn invalid_json_is_protocol_error() {
        let mut dec = SseDecoder::new();
        let events = dec.push(b"data: {not json\n");
        assert!(matches!(events[0], Err(ProviderError::Protocol(_))));
    }

    #[tokio::test]
    async fn decode_stream_reports_read_errors() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n".to_vec()),
            Err("connection reset".into()),
        ];
        let mut stream = decode_stream(futures::stream::iter(chunks));

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            StreamEvent::TextDelta("par".into())
        );
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(ProviderError::Unavailable(_))
        ));
        assert!(stream.next().await.is_none());
    }
}
