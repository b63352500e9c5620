//! HTTP(S) transport over a blocking `reqwest` client.
//!
//! `send` hands the request to a short-lived worker thread and `receive` polls for its
//! reply, which keeps the transport non-blocking for the state machine and lets `cancel`
//! abandon a long-poll without waiting for the server.

use super::{HttpRequest, HttpResponse, IoStatus, Transport, TransportFactory};
use crate::context::{ContextSettings, KeepAlive, ProxyConfig};
use crate::error::TransportError;
use crate::types::Method;
use reqwest::blocking::Client;
use reqwest::Url;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;
use tracing::{debug, trace};

type PendingReply = Receiver<Result<HttpResponse, TransportError>>;

/// Settings a built client depends on; a change forces a rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClientKey {
    keep_alive: KeepAlive,
    proxy: Option<ProxyConfig>,
}

impl ClientKey {
    fn from_settings(settings: &ContextSettings) -> Self {
        Self {
            keep_alive: settings.keep_alive.clone(),
            proxy: settings.proxy.clone(),
        }
    }
}

/// Transport that talks HTTP to the configured origin
pub struct HttpTransport {
    client: Option<(ClientKey, Client)>,
    base_url: Option<Url>,
    pending: Option<PendingReply>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: None,
            base_url: None,
            pending: None,
        }
    }

    fn build_client(key: &ClientKey) -> Result<Client, TransportError> {
        let mut builder = Client::builder().timeout(None::<Duration>);
        builder = if key.keep_alive.enabled {
            builder
                .pool_max_idle_per_host(key.keep_alive.max.max(1) as usize)
                .pool_idle_timeout(Duration::from_secs(key.keep_alive.timeout_sec))
        } else {
            builder.pool_max_idle_per_host(0)
        };
        if let Some(proxy) = &key.proxy {
            let mut reqwest_proxy = reqwest::Proxy::all(&proxy.url)
                .map_err(|e| TransportError::InvalidUrl(format!("proxy {}: {}", proxy.url, e)))?;
            if let Some(username) = &proxy.username {
                reqwest_proxy =
                    reqwest_proxy.basic_auth(username, proxy.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(reqwest_proxy);
        }
        builder
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))
    }

    fn request_url(&self, request: &HttpRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone().ok_or(TransportError::Closed)?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl("origin cannot carry a path".to_string()))?
            .clear()
            .extend(request.segments.iter());
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl Transport for HttpTransport {
    fn resolve(&mut self, settings: &ContextSettings) -> IoStatus<()> {
        let scheme = if settings.use_tls { "https" } else { "http" };
        match Url::parse(&format!("{}://{}/", scheme, settings.origin)) {
            Ok(url) => {
                self.base_url = Some(url);
                IoStatus::Ready(())
            }
            Err(e) => IoStatus::Failed(TransportError::Resolve(format!(
                "{}: {}",
                settings.origin, e
            ))),
        }
    }

    fn connect(&mut self, settings: &ContextSettings) -> IoStatus<()> {
        let key = ClientKey::from_settings(settings);
        let stale = match &self.client {
            Some((existing, _)) => *existing != key,
            None => true,
        };
        if stale {
            match Self::build_client(&key) {
                Ok(client) => {
                    debug!(origin = %settings.origin, "Built HTTP client");
                    self.client = Some((key, client));
                }
                Err(e) => return IoStatus::Failed(e),
            }
        }
        IoStatus::Ready(())
    }

    fn send(&mut self, request: &HttpRequest) -> IoStatus<()> {
        let client = match &self.client {
            Some((_, client)) => client.clone(),
            None => return IoStatus::Failed(TransportError::Closed),
        };
        let url = match self.request_url(request) {
            Ok(url) => url,
            Err(e) => return IoStatus::Failed(e),
        };
        let method = reqwest_method(request.method);
        let body = request.body.clone();
        let (tx, rx) = mpsc::channel();

        trace!(method = request.method.as_str(), url = %url, "Dispatching request");
        let spawned = std::thread::Builder::new()
            .name("pubsub-http".to_string())
            .spawn(move || {
                let mut builder = client.request(method, url);
                if let Some(body) = body {
                    builder = builder
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(body);
                }
                let reply = builder
                    .send()
                    .and_then(|response| {
                        let status = response.status().as_u16();
                        response.text().map(|body| HttpResponse { status, body })
                    })
                    .map_err(TransportError::from);
                if tx.send(reply).is_err() {
                    debug!("Reply arrived after the transaction was abandoned");
                }
            });
        match spawned {
            Ok(_) => {
                self.pending = Some(rx);
                IoStatus::Ready(())
            }
            Err(e) => IoStatus::Failed(TransportError::from(e)),
        }
    }

    fn receive(&mut self) -> IoStatus<HttpResponse> {
        let Some(pending) = &self.pending else {
            return IoStatus::Failed(TransportError::Closed);
        };
        match pending.try_recv() {
            Ok(reply) => {
                self.pending = None;
                match reply {
                    Ok(response) => IoStatus::Ready(response),
                    Err(e) => IoStatus::Failed(e),
                }
            }
            Err(TryRecvError::Empty) => IoStatus::WouldBlock,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                IoStatus::Failed(TransportError::Closed)
            }
        }
    }

    fn cancel(&mut self) {
        self.pending = None;
    }

    fn close(&mut self) {
        self.pending = None;
        self.client = None;
    }
}

/// Factory producing [`HttpTransport`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransportFactory;

impl HttpTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self, _settings: &ContextSettings) -> Box<dyn Transport> {
        Box::new(HttpTransport::new())
    }
}
