//! Shared fixtures for the cross-module tests.

use async_trait::async_trait;
use markup5ever_rcdom::Handle;
use reqwest::Url;
use serde_json::Value;
use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use tracing_subscriber::EnvFilter;

use crate::actions::{ActionContext, ActionResult};
use crate::config::EngineConfig;
use crate::engine::Hyperions;
use crate::error::{HyperionsError, Result};
use crate::events::{EngineEvent, EventKind};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Log output for failing tests, `RUST_LOG=hyperions=debug cargo test`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory transport answering by URL path, 404 for unknown paths
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Rc<RefCell<Vec<(String, HttpResponse)>>>,
    requests: Rc<RefCell<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn respond(&self, path: &str, status: u16, body: &str) -> &Self {
        self.routes.borrow_mut().push((
            path.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        ));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request.clone());
        let url = Url::parse(&request.url).map_err(|e| HyperionsError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let response = self
            .routes
            .borrow()
            .iter()
            .find(|(path, _)| path == url.path())
            .map(|(_, response)| response.clone());
        Ok(response.unwrap_or(HttpResponse {
            status: 404,
            body: String::new(),
        }))
    }
}

/// Engine over `html` with every trigger set up and a mock transport
pub fn engine(html: &str) -> (Hyperions, MockTransport) {
    init_tracing();
    let engine = Hyperions::setup(html, EngineConfig::default()).unwrap();
    let transport = MockTransport::default();
    engine.set_transport(transport.clone());
    (engine, transport)
}

/// Answer a single HTTP/1.1 request on a local port with a JSON `body`.
///
/// Returns the base URL to request and a handle yielding the request line.
pub fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                break;
            }
        }
        let mut stream = reader.into_inner();
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .unwrap();
        stream.flush().unwrap();
        request_line.trim_end().to_string()
    });
    (base_url, server)
}

pub fn query(engine: &Hyperions, selector: &str) -> Handle {
    engine.locate(None, selector).unwrap()
}

/// Register `run:<name>` recording the data it receives
pub fn recorder(engine: &Hyperions, name: &str) -> Rc<RefCell<Vec<Value>>> {
    let seen: Rc<RefCell<Vec<Value>>> = Rc::default();
    let sink = seen.clone();
    engine.add_action_fn(&format!("run:{}", name), move |ctx: ActionContext| {
        let sink = sink.clone();
        async move {
            sink.borrow_mut().push(ctx.data);
            Ok(ActionResult::empty())
        }
    });
    seen
}

/// Collect every event of `kind`
pub fn events(engine: &Hyperions, kind: EventKind) -> Rc<RefCell<Vec<EngineEvent>>> {
    let seen: Rc<RefCell<Vec<EngineEvent>>> = Rc::default();
    let sink = seen.clone();
    engine.on(kind, move |event| sink.borrow_mut().push(event.clone()));
    seen
}
