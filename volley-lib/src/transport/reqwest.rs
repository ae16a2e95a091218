use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::redirect;

use super::Transport;
use crate::{ErrorKind, Request, Response, Result, TransportStatus, config::TransportConfig};

/// Client settings which cannot be changed per request in `reqwest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClientKey {
    connect_timeout: Duration,
    /// `None` disables redirects
    redirects: Option<usize>,
}

/// [`Transport`] backed by [`reqwest`].
///
/// `reqwest` fixes the connect timeout and the redirect policy when a client
/// is built, so one client is kept per distinct combination. Clients share
/// nothing but their settings; each has its own connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    config: TransportConfig,
    clients: Arc<DashMap<ClientKey, reqwest::Client>>,
}

impl ReqwestTransport {
    /// Create a transport with the given settings.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the default client cannot be built, for example
    /// because no TLS backend is available.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let transport = Self {
            config,
            clients: Arc::new(DashMap::new()),
        };
        let key = ClientKey {
            connect_timeout: transport.config.connect_timeout,
            redirects: None,
        };
        transport.client(key)?;
        Ok(transport)
    }

    /// The settings of this transport
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn client_key(&self, request: &Request) -> ClientKey {
        let options = request.options();
        ClientKey {
            connect_timeout: options
                .connect_timeout
                .unwrap_or(self.config.connect_timeout),
            redirects: options
                .follow_location
                .then(|| options.max_redirects.unwrap_or(self.config.max_redirects)),
        }
    }

    /// Get the client for the given settings, building it on first use
    fn client(&self, key: ClientKey) -> Result<reqwest::Client> {
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = self
            .clients
            .entry(key)
            .or_try_insert_with(|| self.build_client(key))?;
        Ok(client.clone())
    }

    fn build_client(&self, key: ClientKey) -> Result<reqwest::Client> {
        log::debug!("Building HTTP client for {key:?}");
        let policy = match key.redirects {
            Some(max) => redirect::Policy::limited(max),
            None => redirect::Policy::none(),
        };

        reqwest::ClientBuilder::new()
            .gzip(true)
            .user_agent(self.config.user_agent.as_str())
            .connect_timeout(key.connect_timeout)
            .tcp_keepalive(self.config.tcp_keepalive)
            .redirect(policy)
            .build()
            .map_err(ErrorKind::BuildClient)
    }

    async fn send(&self, client: reqwest::Client, request: &Request) -> Response {
        let options = request.options();
        let mut builder = client
            .request(options.method.clone(), request.url().clone())
            .headers(options.headers.clone());

        if let Some(timeout) = options.timeout.or(self.config.timeout) {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Transport error for {request}: {e}");
                return Response::transport_failure(TransportStatus::from(&e))
                    .with_elapsed(start.elapsed());
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let response = match response.text().await {
            Ok(body) => Response::new(status, body),
            Err(e) => Response {
                status: Some(status),
                ..Response::transport_failure(TransportStatus::from(&e))
            },
        };
        response.with_headers(headers).with_elapsed(start.elapsed())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &Request) -> Response {
        match self.client(self.client_key(request)) {
            Ok(client) => self.send(client, request).await,
            Err(e) => {
                log::warn!("{e}");
                Response::transport_failure(TransportStatus::Failed(e.to_string()))
            }
        }
    }
}
