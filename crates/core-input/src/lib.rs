//! Raw-byte terminal input: a resumable VT tokenizer, a token-to-event
//! mapper, and an `InputReader` that glues the two together across
//! however the bytes happen to arrive from the terminal.

pub mod ui_input;
pub mod vt;

pub use ui_input::{InputEvent, KeyCode, KeyModifiers, MouseAction, map_token};
pub use vt::{CsiParams, VtParser, VtToken};

#[inline]
pub fn log_paste_chunk_flush(chunk: &str) {
    tracing::trace!(target: "input.paste", chunk_len = chunk.len(), "chunk_flush");
}

/// Feeds raw terminal bytes through a `VtParser`, buffering whatever a
/// `parse_next` call couldn't yet consume so the next `feed` picks up
/// exactly where the last one left off.
pub struct InputReader {
    parser: VtParser,
    buf: Vec<u8>,
}

impl Default for InputReader {
    fn default() -> Self {
        Self::new()
    }
}

impl InputReader {
    pub fn new() -> Self {
        Self { parser: VtParser::new(), buf: Vec::new() }
    }

    /// Append `bytes` to the pending buffer and drain as many complete
    /// tokens as possible, appending their mapped events to `out`.
    /// Tokens with no editor-level meaning (unmapped CSI/OSC/DCS) are
    /// silently dropped, matching `ui_input::map_token`'s contract.
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<InputEvent>) {
        self.buf.extend_from_slice(bytes);
        let mut consumed_total = 0usize;
        loop {
            let (token, consumed) = self.parser.parse_next(&self.buf[consumed_total..]);
            match token {
                Some(tok) => {
                    if let Some(ev) = map_token(&tok) {
                        if let InputEvent::Text(text) = &ev {
                            log_paste_chunk_flush(text);
                        }
                        out.push(ev);
                    }
                    consumed_total += consumed;
                }
                None => {
                    consumed_total += consumed;
                    break;
                }
            }
        }
        self.buf.drain(0..consumed_total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::Subscriber;
    use tracing::dispatcher::Dispatch;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::Context;
    use tracing_subscriber::layer::Layer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::registry::Registry;

    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedEvent {
        target: String,
        fields: Vec<(String, String)>,
    }

    #[derive(Default)]
    struct FieldCollector {
        fields: Vec<(String, String)>,
    }

    impl Visit for FieldCollector {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.fields.push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S> Layer<S> for Capture
    where
        S: Subscriber,
    {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut collector = FieldCollector::default();
            event.record(&mut collector);
            let meta = event.metadata();
            self.events
                .lock()
                .unwrap()
                .push(CapturedEvent { target: meta.target().to_string(), fields: collector.fields });
        }
    }

    #[test]
    fn chunk_flush_log_redacts_content() {
        let capture = Capture::default();
        let events = capture.events.clone();
        let subscriber = Registry::default().with(capture);
        let dispatch = Dispatch::new(subscriber);

        tracing::dispatcher::with_default(&dispatch, || {
            let secret = "secret paste payload";
            super::log_paste_chunk_flush(secret);
        });

        let events = events.lock().unwrap();
        let event = events.iter().find(|e| e.target == "input.paste").expect("missing input.paste event");
        assert!(event.fields.iter().any(|(name, _)| name == "chunk_len"));
        for (_, value) in &event.fields {
            assert!(!value.contains("secret paste payload"), "event leaked raw paste content: {value}");
        }
    }

    #[test]
    fn feed_handles_bytes_split_mid_escape_sequence() {
        let mut reader = InputReader::new();
        let mut out = Vec::new();
        reader.feed(b"hi\x1b[1", &mut out);
        assert_eq!(out, vec![InputEvent::Text("hi".to_string())]);
        reader.feed(b";5H", &mut out);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], InputEvent::Key { code: KeyCode::Home, .. }));
    }

    #[test]
    fn feed_drops_unmapped_tokens() {
        let mut reader = InputReader::new();
        let mut out = Vec::new();
        reader.feed(b"\x1b]0;title\x07x", &mut out);
        assert_eq!(out, vec![InputEvent::Text("x".to_string())]);
    }
}
