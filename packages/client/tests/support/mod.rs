//! Shared test support: a scripted in-memory transport and an event recorder.

// not every test binary exercises every helper
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use fytch_client::{
    BodySink, Exchange, ExchangeParts, RequestEvent, Transport, TransportError,
};

/// One scripted exchange, driven by the test: set the status, add headers,
/// push body bytes through the captured sink, mark completion.
pub struct ExchangeState {
    pub parts: ExchangeParts,
    sink: BodySink,
    status: AtomicU16,
    complete: AtomicBool,
    closed: AtomicBool,
    headers: Mutex<Vec<(String, String)>>,
}

impl ExchangeState {
    pub fn set_status(&self, code: u16) {
        self.status.store(code, Ordering::SeqCst);
    }

    pub fn set_header(&self, name: &str, value: &str) {
        self.headers
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
    }

    /// Stream body bytes into the engine, as the real transport would.
    pub fn deliver(&self, bytes: &[u8]) -> usize {
        self.sink.write(bytes)
    }

    pub fn finish(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockExchange {
    state: Arc<ExchangeState>,
}

impl Exchange for MockExchange {
    fn status(&self) -> Option<u16> {
        let code = self.state.status.load(Ordering::SeqCst);
        (code != 0).then_some(code)
    }

    fn header(&self, name: &str) -> Option<String> {
        self.state
            .headers
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    fn visit_headers(&self, visitor: &mut dyn FnMut(&str, &str) -> bool) {
        for (name, value) in self.state.headers.lock().unwrap().iter() {
            if !visitor(name, value) {
                break;
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.state.complete.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// Transport whose exchanges are driven by the test instead of a network.
#[derive(Default)]
pub struct MockTransport {
    exchanges: Mutex<Vec<Arc<ExchangeState>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The most recently started exchange.
    pub fn last(&self) -> Arc<ExchangeState> {
        self.exchanges
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no exchange started")
    }
}

impl Transport for MockTransport {
    fn exchange(
        &self,
        parts: ExchangeParts,
        sink: BodySink,
    ) -> Result<Box<dyn Exchange>, TransportError> {
        let state = Arc::new(ExchangeState {
            parts,
            sink,
            status: AtomicU16::new(0),
            complete: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            headers: Mutex::new(Vec::new()),
        });
        self.exchanges.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(MockExchange { state }))
    }
}

/// Transport that refuses every submission.
pub struct RejectingTransport;

impl Transport for RejectingTransport {
    fn exchange(
        &self,
        _parts: ExchangeParts,
        _sink: BodySink,
    ) -> Result<Box<dyn Exchange>, TransportError> {
        Err(TransportError::rejected("scripted refusal"))
    }
}

/// Collects compact one-line descriptions of every event fired.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> Box<dyn fytch_client::EventSink> {
        let log = Arc::clone(&self.log);
        Box::new(move |event: RequestEvent<'_>| {
            log.lock().unwrap().push(describe(&event));
        })
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn describe(event: &RequestEvent<'_>) -> String {
    match event {
        RequestEvent::Started { .. } => "started".to_string(),
        RequestEvent::StatusChanged { status, .. } => format!("status:{status}"),
        RequestEvent::HeadersReady { headers, .. } => {
            // prove the accessor is live at delivery time
            match headers.get("content-type") {
                Some(mime) => format!("headers[content-type={mime}]"),
                None => "headers".to_string(),
            }
        }
        RequestEvent::LengthKnown { content_length, .. } => format!("length:{content_length}"),
        RequestEvent::MimeKnown { mime, .. } => format!("mime:{mime}"),
        RequestEvent::BodyRead { bytes_read, .. } => format!("read:{bytes_read}"),
        RequestEvent::Completed { status, body, .. } => {
            format!("complete:{status}:{}", body.len())
        }
    }
}
