//! The provider-agnostic client

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::Method;
use nimbus_transport::{HttpTransport, HttpTransportConfig, Transport};
use serde::Serialize;
use tokio::sync::{Mutex, oneshot};

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    hooks::{BeforeHook, DefaultHeaders, HookChain, UserAgent},
    pipeline,
    profile::ProviderProfile,
    providers,
    request::{RequestDescriptor, RequestOptions, RequestPath},
    stream::{DownloadSlot, LiveBody, RequestHandle, RequestStream, RequestWriter, StreamBuffer},
};

/// State visible to hooks.
///
/// Configuration and profile are fixed at construction; the authorized flag
/// and the hook list change over the client's life.
pub struct ClientState {
    config: ClientConfig,
    profile: ProviderProfile,
    authorized: AtomicBool,
    hooks: HookChain,
}

impl ClientState {
    /// State for a client built from `config` and `profile`.
    pub fn new(config: ClientConfig, profile: ProviderProfile) -> Self {
        Self {
            config,
            profile,
            authorized: AtomicBool::new(false),
            hooks: HookChain::new(),
        }
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The provider profile.
    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    /// Whether authentication has completed.
    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Acquire)
    }

    pub(crate) fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::Release);
    }

    /// Provider hooks followed by client hooks, as of now.
    pub(crate) fn hook_snapshot(&self) -> Vec<Arc<dyn BeforeHook>> {
        let mut hooks = self.profile.hooks.clone();
        hooks.extend(self.hooks.snapshot());
        hooks
    }
}

/// Client for a single cloud provider.
///
/// Cheap to clone; clones share authentication state, hooks and the
/// connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use nimbus::{Client, ClientConfig, providers::Provider};
///
/// # async fn example() -> nimbus::Result<()> {
/// let client = Client::from_config(
///     ClientConfig::new(Provider::Rackspace, "alice").api_key("0123abcd"),
/// )?;
///
/// let reply = client.get(["servers", "detail"]).outcome().await?;
/// println!("{}", reply.text()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) state: ClientState,
    pub(crate) transport: Arc<dyn Transport>,
    auth_lock: Mutex<()>,
}

impl ClientInner {
    /// Authenticate unless already authorized.
    ///
    /// Concurrent callers share one round trip.
    pub(crate) async fn ensure_authorized(&self) -> Result<()> {
        if self.state.is_authorized() {
            return Ok(());
        }

        let _guard = self.auth_lock.lock().await;
        if self.state.is_authorized() {
            return Ok(());
        }
        self.run_auth().await
    }

    /// Authenticate even when already authorized.
    ///
    /// Serialized with [`ensure_authorized`](Self::ensure_authorized), so
    /// each caller gets its own round trip.
    pub(crate) async fn reauthenticate(&self) -> Result<()> {
        let _guard = self.auth_lock.lock().await;
        self.state.set_authorized(false);
        self.run_auth().await
    }

    async fn run_auth(&self) -> Result<()> {
        let provider = self.state.profile.name();
        tracing::debug!(provider = %provider, "authenticating");
        match self.state.profile.auth.authenticate(self.transport.as_ref()).await {
            Ok(()) => {
                self.state.set_authorized(true);
                tracing::info!(provider = %provider, "authenticated");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "authentication failed");
                Err(match e {
                    Error::Auth(_) => e,
                    other => Error::Auth(other.to_string()),
                })
            }
        }
    }
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client from a configuration object.
    ///
    /// The provider profile comes from `config.provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the HTTP
    /// transport cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a client from `NIMBUS_*` environment variables.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        Self::from_config(ClientConfig::from_env()?)
    }

    /// Start a request.
    ///
    /// Returns at once. The exchange runs on a spawned task; the handle
    /// accepts upload data and reports the outcome. While the client is not
    /// authorized against a gated provider, the request first waits for
    /// authentication and upload data is buffered meanwhile.
    ///
    /// Must be called within a Tokio runtime.
    pub fn request(&self, options: impl Into<RequestOptions>) -> RequestHandle {
        let descriptor = options.into().normalize();
        let download = DownloadSlot::default();
        let (tx, rx) = oneshot::channel();

        let gated = self.inner.state.profile.auth_gated() && !self.is_authorized();
        let body = if gated {
            let buffer = StreamBuffer::new();
            let inner = self.inner.clone();
            let (task_buffer, task_download) = (buffer.clone(), download.clone());
            tokio::spawn(async move {
                let outcome =
                    pipeline::run_gated(inner, descriptor, task_buffer.clone(), task_download)
                        .await;
                task_buffer.mark_responded();
                let _ = tx.send(outcome);
            });
            RequestStream::Buffered(buffer)
        } else {
            let (live, upload) = if descriptor.upload {
                let buffer = StreamBuffer::new();
                let stream = buffer.body_stream();
                buffer.connect();
                (LiveBody::new(Some(buffer)), Some(stream))
            } else {
                (LiveBody::new(None), None)
            };
            let inner = self.inner.clone();
            let task_download = download.clone();
            tokio::spawn(async move {
                let outcome =
                    pipeline::dispatch(&inner, descriptor, upload, &task_download).await;
                let _ = tx.send(outcome);
            });
            RequestStream::Live(live)
        };

        RequestHandle::new(RequestWriter::new(body, download), rx)
    }

    /// `GET` a path.
    pub fn get(&self, path: impl Into<RequestPath>) -> RequestHandle {
        self.request((Method::GET, path.into()))
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        path: impl Into<RequestPath>,
        body: &T,
    ) -> Result<RequestHandle> {
        let descriptor = RequestDescriptor::new(Method::POST, path).with_json(body)?;
        Ok(self.request(descriptor))
    }

    /// `PUT` with a streamed body written through the handle.
    pub fn upload(&self, path: impl Into<RequestPath>) -> RequestHandle {
        self.request(RequestDescriptor::new(Method::PUT, path).upload())
    }

    /// `PUT` a body that is already in memory.
    pub fn put_bytes(&self, path: impl Into<RequestPath>, body: impl Into<Bytes>) -> RequestHandle {
        self.request(RequestDescriptor::new(Method::PUT, path).body(body))
    }

    /// `GET` with the response streamed to the handle's download target.
    pub fn download(&self, path: impl Into<RequestPath>) -> RequestHandle {
        self.request(RequestDescriptor::new(Method::GET, path).download())
    }

    /// Authenticate now.
    ///
    /// Always runs a fresh round trip, one per call. Gated requests that
    /// start meanwhile wait for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the provider rejects the credentials.
    pub async fn authenticate(&self) -> Result<()> {
        self.inner.reauthenticate().await
    }

    /// Forget the current token; the next gated request re-authenticates.
    pub fn invalidate_auth(&self) {
        self.inner.state.set_authorized(false);
        if let Some(store) = self.inner.state.profile.tokens() {
            store.clear();
        }
    }

    /// Register a hook that runs before every later request.
    ///
    /// Client hooks run after the provider's own hooks, in registration
    /// order.
    pub fn register_hook(&self, hook: impl BeforeHook + 'static) {
        self.inner.state.hooks.push(Arc::new(hook));
    }

    /// Whether authentication has completed.
    pub fn is_authorized(&self) -> bool {
        self.inner.state.is_authorized()
    }

    /// State shared with hooks.
    pub fn state(&self) -> &ClientState {
        &self.inner.state
    }

    /// The provider profile.
    pub fn profile(&self) -> &ProviderProfile {
        self.inner.state.profile()
    }
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("profile", &self.profile)
            .field("authorized", &self.is_authorized())
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("provider", &self.inner.state.profile.name())
            .field("authorized", &self.is_authorized())
            .finish_non_exhaustive()
    }
}

/// Builder for creating a configured [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    profile: Option<ProviderProfile>,
    transport: Option<Arc<dyn Transport>>,
    hooks: Vec<Arc<dyn BeforeHook>>,
}

impl ClientBuilder {
    /// Use `config`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom provider profile instead of deriving one from the config.
    pub fn profile(mut self, profile: ProviderProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Use a custom transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register a client hook; runs after the provider's hooks.
    pub fn hook(mut self, hook: impl BeforeHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set the User-Agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client with the configured options.
    ///
    /// # Errors
    ///
    /// Returns an error if no profile was given and the configuration cannot
    /// produce one, or if the HTTP transport cannot be built.
    pub fn build(self) -> Result<Client> {
        let config = self.config;
        let mut profile = match self.profile {
            Some(profile) => profile,
            None => providers::profile_for(&config)?,
        };
        if let Some(gated) = config.auth_gate {
            profile.auth_gated = gated;
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::with_config(HttpTransportConfig {
                timeout: config.timeout,
                connect_timeout: config.connect_timeout,
                user_agent: config.user_agent.clone(),
                ..Default::default()
            })?),
        };

        let state = ClientState::new(config, profile);
        if !state.config.default_headers.is_empty() {
            state.hooks.push(Arc::new(DefaultHeaders::new(
                state.config.default_headers.clone(),
            )));
        }
        let user_agent = state
            .config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("nimbus/{}", crate::VERSION));
        state.hooks.push(Arc::new(UserAgent(user_agent)));
        for hook in self.hooks {
            state.hooks.push(hook);
        }

        Ok(Client {
            inner: Arc::new(ClientInner {
                state,
                transport,
                auth_lock: Mutex::new(()),
            }),
        })
    }
}
