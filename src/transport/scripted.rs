//! In-memory scripted transport.
//!
//! Replies are matched to requests by a path substring. A rule can be held, in which case
//! `receive` keeps reporting `WouldBlock` until it is released, which is how a long-poll
//! subscribe is kept outstanding in tests.

use super::{HttpRequest, HttpResponse, IoStatus, Transport, TransportFactory};
use crate::context::ContextSettings;
use crate::error::TransportError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Scripted outcome of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Respond(HttpResponse),
    Fail(TransportError),
}

/// A request as seen by the scripted transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub transport_id: u64,
    pub origin: String,
    pub request: HttpRequest,
}

impl RecordedRequest {
    pub fn path(&self) -> String {
        self.request.path()
    }
}

#[derive(Debug)]
struct Rule {
    path_contains: String,
    replies: VecDeque<ScriptedReply>,
    fallback: Option<ScriptedReply>,
    held: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    rules: Vec<Rule>,
    log: Vec<RecordedRequest>,
    connects: usize,
    cancels: usize,
    closes: usize,
}

impl ScriptState {
    fn rule_mut(&mut self, path_contains: &str) -> &mut Rule {
        if let Some(pos) = self
            .rules
            .iter()
            .position(|r| r.path_contains == path_contains)
        {
            return &mut self.rules[pos];
        }
        self.rules.push(Rule {
            path_contains: path_contains.to_string(),
            replies: VecDeque::new(),
            fallback: None,
            held: false,
        });
        let last = self.rules.len() - 1;
        &mut self.rules[last]
    }

    fn matching_rule(&mut self, path: &str) -> Option<&mut Rule> {
        self.rules
            .iter_mut()
            .find(|r| path.contains(r.path_contains.as_str()))
    }
}

/// Factory sharing one script between all transports it creates
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransportFactory {
    state: Arc<Mutex<ScriptState>>,
    next_id: Arc<AtomicU64>,
}

impl ScriptedTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot reply for requests whose path contains `path_contains`
    pub fn reply(&self, path_contains: &str, status: u16, body: &str) -> &Self {
        self.state
            .lock()
            .rule_mut(path_contains)
            .replies
            .push_back(ScriptedReply::Respond(HttpResponse::new(status, body)));
        self
    }

    /// Reply used whenever no one-shot reply is queued
    pub fn always(&self, path_contains: &str, status: u16, body: &str) -> &Self {
        self.state.lock().rule_mut(path_contains).fallback =
            Some(ScriptedReply::Respond(HttpResponse::new(status, body)));
        self
    }

    /// Queue a one-shot transport failure
    pub fn fail(&self, path_contains: &str, error: TransportError) -> &Self {
        self.state
            .lock()
            .rule_mut(path_contains)
            .replies
            .push_back(ScriptedReply::Fail(error));
        self
    }

    /// Keep matching requests outstanding until [`release`](Self::release)
    pub fn hold(&self, path_contains: &str) -> &Self {
        self.state.lock().rule_mut(path_contains).held = true;
        self
    }

    pub fn release(&self, path_contains: &str) -> &Self {
        self.state.lock().rule_mut(path_contains).held = false;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().log.clone()
    }

    pub fn requests_matching(&self, path_contains: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.path().contains(path_contains))
            .cloned()
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    pub fn cancel_count(&self) -> usize {
        self.state.lock().cancels
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }
}

impl TransportFactory for ScriptedTransportFactory {
    fn create(&self, _settings: &ContextSettings) -> Box<dyn Transport> {
        Box::new(ScriptedTransport {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            state: Arc::clone(&self.state),
            origin: String::new(),
            in_flight: None,
        })
    }
}

/// Transport replaying the factory's script
#[derive(Debug)]
pub struct ScriptedTransport {
    id: u64,
    state: Arc<Mutex<ScriptState>>,
    origin: String,
    in_flight: Option<String>,
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, settings: &ContextSettings) -> IoStatus<()> {
        self.origin = settings.origin.clone();
        self.state.lock().connects += 1;
        IoStatus::Ready(())
    }

    fn send(&mut self, request: &HttpRequest) -> IoStatus<()> {
        self.state.lock().log.push(RecordedRequest {
            transport_id: self.id,
            origin: self.origin.clone(),
            request: request.clone(),
        });
        self.in_flight = Some(request.path());
        IoStatus::Ready(())
    }

    fn receive(&mut self) -> IoStatus<HttpResponse> {
        let Some(path) = self.in_flight.clone() else {
            return IoStatus::Failed(TransportError::Closed);
        };
        let mut state = self.state.lock();
        let Some(rule) = state.matching_rule(&path) else {
            return IoStatus::Failed(TransportError::Io(format!(
                "no scripted reply for {}",
                path
            )));
        };
        if rule.held {
            return IoStatus::WouldBlock;
        }
        let reply = match rule.replies.pop_front() {
            Some(reply) => reply,
            None => match &rule.fallback {
                Some(reply) => reply.clone(),
                None => return IoStatus::WouldBlock,
            },
        };
        drop(state);
        self.in_flight = None;
        match reply {
            ScriptedReply::Respond(response) => IoStatus::Ready(response),
            ScriptedReply::Fail(error) => IoStatus::Failed(error),
        }
    }

    fn cancel(&mut self) {
        self.in_flight = None;
        self.state.lock().cancels += 1;
    }

    fn close(&mut self) {
        self.state.lock().closes += 1;
    }
}
