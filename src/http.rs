//! Backend transport for the diff flow.
//!
//! Requests are performed on short-lived worker threads. Results come back
//! over a channel as [`Completion`]s that the UI loop drains and hands to
//! [`crate::graph::TrialGraph::on_backend_response`], so graph state is only
//! ever touched from the UI thread.

use crossbeam_channel::{Receiver, Sender};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::diff_flow::BackendRequest;
use crate::error::FetchError;

/// Identifies a request: the graph instance that issued it and the flow's
/// sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub graph_id: String,
    pub seq: u64,
}

#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub result: Result<Value, FetchError>,
}

/// Sends backend requests on behalf of a graph.
pub trait Transport {
    /// Start `request`. Its outcome arrives later as a [`Completion`]; an
    /// error here means the request was never started.
    fn send(&self, ticket: Ticket, request: &BackendRequest) -> Result<(), FetchError>;
}

/// Transport that fails every request. Used until the host wires a real one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, ticket: Ticket, request: &BackendRequest) -> Result<(), FetchError> {
        warn!(seq = ticket.seq, path = %request.path(), "no transport configured");
        Err(FetchError::Network("no transport configured".into()))
    }
}

/// HTTP transport resolving request paths against a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: Url,
    client: Client,
    tx: Sender<Completion>,
}

impl HttpTransport {
    /// Create a transport and the receiving end of its completion channel.
    pub fn new(base: &str) -> Result<(Self, Receiver<Completion>), FetchError> {
        let base = Url::parse(base).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let (tx, rx) = crossbeam_channel::unbounded();
        Ok((
            Self {
                base,
                client: Client::new(),
                tx,
            },
            rx,
        ))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a request path (absolute or relative) against the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", path, e)))
    }
}

/// Perform a JSON GET request.
pub fn fetch_json(client: &Client, url: Url) -> Result<Value, FetchError> {
    let response = client
        .get(url)
        .header(CONTENT_TYPE, "application/json")
        .send()
        .map_err(|e| FetchError::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }
    response.json::<Value>().map_err(|e| FetchError::Body(e.to_string()))
}

impl Transport for HttpTransport {
    fn send(&self, ticket: Ticket, request: &BackendRequest) -> Result<(), FetchError> {
        let url = self.resolve(&request.path())?;
        let client = self.client.clone();
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            debug!(seq = ticket.seq, %url, "GET");
            let result = fetch_json(&client, url);
            if let Err(err) = &result {
                warn!(seq = ticket.seq, error = %err, "backend request failed");
            }
            // The receiver is gone once the view is closed; nothing to do then.
            let _ = tx.send(Completion { ticket, result });
        });
        Ok(())
    }
}
