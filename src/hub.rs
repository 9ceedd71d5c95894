//! Client groups & the hub owning them.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use anyhow::Context as _;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::config::HubConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::{Error, Result};
use crate::gateway::{ConnectionState, GatewayClient};
use crate::http::{build_http_client, RestClient};
use crate::intents::Intents;

/// Name of the group created by [`ClientHub::connect`].
pub const DEFAULT_GROUP: &str = "default";

/// The clients of one bot: a REST client, a gateway client & the dispatcher the gateway
/// hands its events to.
#[derive(Clone, Debug)]
pub struct ClientGroup {
    name: Arc<str>,
    rest_client: RestClient,
    gateway: GatewayClient,
}

impl ClientGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &RestClient {
        &self.rest_client
    }

    pub fn gateway(&self) -> &GatewayClient {
        &self.gateway
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        self.gateway.dispatcher()
    }

    pub fn state(&self) -> ConnectionState {
        self.gateway.state()
    }

    /// Runs the gateway session of the group, see [`GatewayClient::connect`].
    pub fn connect(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        self.gateway.connect()
    }

    pub async fn close(&self) {
        self.gateway.close().await
    }
}

type Registry = RwLock<BTreeMap<String, ClientGroup>>;

/// Handle to the groups of a [`ClientHub`]. Clones see the same groups.
#[derive(Clone, Default)]
pub struct ClientGroups {
    inner: Arc<Registry>,
}

/// A [`ClientGroups`] handle which does not keep the groups alive.
#[derive(Clone)]
pub struct WeakClientGroups {
    inner: Weak<Registry>,
}

impl WeakClientGroups {
    pub fn upgrade(&self) -> Option<ClientGroups> {
        self.inner.upgrade().map(|inner| ClientGroups { inner })
    }
}

impl std::fmt::Debug for ClientGroups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ClientGroups {
    pub fn get(&self, name: &str) -> Option<ClientGroup> {
        self.inner.read().get(name).cloned()
    }

    /// Names of every group, sorted.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Every group, sorted by name.
    pub fn groups(&self) -> Vec<ClientGroup> {
        self.inner.read().values().cloned().collect()
    }

    pub fn downgrade(&self) -> WeakClientGroups {
        WeakClientGroups {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Overrides for a single group, see [`ClientHub::create_client_group_with`].
#[derive(Debug, Default, Clone)]
pub struct GroupOptions {
    /// Dispatcher with handlers registered up front. A fresh one is created when `None`.
    ///
    /// A dispatcher belongs to one group, its contexts are built with the clients of the
    /// group it was last handed to.
    pub dispatcher: Option<EventDispatcher>,

    /// Intents sent instead of the ones in the hub configuration.
    pub intents: Option<Intents>,
}

impl GroupOptions {
    pub fn dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn intents(mut self, intents: Intents) -> Self {
        self.intents = Some(intents);
        self
    }
}

/// Owns any number of named [`ClientGroup`]s which share one http client.
///
/// Cloning gives another handle to the same groups.
#[derive(Clone, Debug)]
pub struct ClientHub {
    http: reqwest::Client,
    config: HubConfig,
    groups: ClientGroups,
}

impl ClientHub {
    /// Creates a hub with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(&config.rest)?,
            config,
            groups: ClientGroups::default(),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn client_groups(&self) -> ClientGroups {
        self.groups.clone()
    }

    pub fn group(&self, name: &str) -> Option<ClientGroup> {
        self.groups.get(name)
    }

    /// Creates a group for the bot authenticated by `token` & registers it under `name`.
    ///
    /// Fails with [`Error::DuplicateGroup`] when `name` is taken.
    pub fn create_client_group(&self, name: &str, token: &str) -> Result<ClientGroup> {
        self.create_client_group_with(name, token, GroupOptions::default())
    }

    pub fn create_client_group_with(
        &self,
        name: &str,
        token: &str,
        options: GroupOptions,
    ) -> Result<ClientGroup> {
        let mut groups = self.groups.inner.write();
        if groups.contains_key(name) {
            return Err(Error::DuplicateGroup(name.to_string()));
        }

        let rest_client =
            RestClient::with_http_client(self.http.clone(), token, &self.config.rest)?;

        let mut gateway_config = self.config.gateway.clone();
        if let Some(intents) = options.intents {
            gateway_config.set_intents(intents);
        }
        if gateway_config.intents().is_privileged() {
            info!(
                group = name,
                "Privileged intents requested, they have to be enabled for the bot"
            );
        }

        let dispatcher = options.dispatcher.unwrap_or_default();
        let gateway = GatewayClient::new(name, token, gateway_config, dispatcher.clone());
        dispatcher.bind(rest_client.clone(), gateway.downgrade(), self.groups.downgrade());

        let group = ClientGroup {
            name: Arc::from(name),
            rest_client,
            gateway,
        };
        groups.insert(name.to_string(), group.clone());

        info!(group = name, "Created client group");
        Ok(group)
    }

    /// Runs every group until all of them closed, one failed or ctrl-c was recieved.
    ///
    /// The groups are picked up when this is called, a [`stop`][Self::stop] issued before the
    /// returned future is polled still closes them. A failing group closes every other group
    /// before this returns, a group which is already running elsewhere is left alone.
    pub fn start(&self) -> impl Future<Output = anyhow::Result<()>> + '_ {
        let sessions: Vec<_> = self
            .groups
            .groups()
            .into_iter()
            .map(move |group| {
                let session = group.connect();
                async move {
                    let result = session.await;
                    if let Err(err) = &result {
                        if !matches!(err, Error::AlreadyStarted) {
                            // One failed group takes the others down with it.
                            self.stop().await;
                        }
                    }
                    result.with_context(|| format!("client group {} failed", group.name()))
                }
            })
            .collect();

        async move {
            if sessions.is_empty() {
                warn!("Starting a client hub without any client groups");
                return Ok(());
            }
            info!(groups = sessions.len(), "Starting client hub");

            let sessions = join_all(sessions);
            tokio::pin!(sessions);

            let results = tokio::select! {
                results = &mut sessions => results,
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            info!("Recieved ctrl-c, stopping client hub");
                            let (_, results) = tokio::join!(self.stop(), &mut sessions);
                            results
                        }
                        Err(err) => {
                            warn!(error = %err, "Unable to listen for ctrl-c");
                            (&mut sessions).await
                        }
                    }
                }
            };

            results.into_iter().collect::<anyhow::Result<Vec<()>>>().map(|_| ())
        }
    }

    /// Closes every group.
    pub async fn stop(&self) {
        let groups = self.groups.groups();
        join_all(groups.iter().map(ClientGroup::close)).await;
    }

    /// Runs `scope` with a new hub & stops the hub once it returns, whether it succeeded or not.
    pub async fn scoped<F, Fut, T>(config: HubConfig, scope: F) -> anyhow::Result<T>
    where
        F: FnOnce(ClientHub) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let hub = Self::with_config(config)?;
        let result = scope(hub.clone()).await;
        hub.stop().await;
        result
    }

    /// Runs a single bot: creates the [`DEFAULT_GROUP`], lets `setup` register handlers on it
    /// and starts the hub. The session is closed once this returns.
    pub async fn connect<F, Fut>(token: &str, setup: F) -> anyhow::Result<()>
    where
        F: FnOnce(ClientGroup) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        Self::connect_with_config(HubConfig::default(), token, setup).await
    }

    pub async fn connect_with_config<F, Fut>(
        config: HubConfig,
        token: &str,
        setup: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(ClientGroup) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        Self::scoped(config, |hub| async move {
            let group = hub.create_client_group(DEFAULT_GROUP, token)?;
            if let Err(err) = setup(group).await {
                error!(error = ?err, "Setting up the default client group failed");
                return Err(err.context("setup of the default client group failed"));
            }
            hub.start().await
        })
        .await
    }
}
