//! Routing of gateway events to user handlers.
//!
//! Handlers are registered per [`EventType`] and awaited one after another in the order they
//! were added. Every handler gets the event together with a [`Context`], which carries the
//! clients of the group the event was recieved on and the values added with
//! [`EventDispatcher::add_argument`].

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{error, trace, warn};

use crate::error::{Error, Result};
use crate::events::{Event, EventType, GatewayEvent};
use crate::gateway::{GatewayClient, WeakGatewayClient};
use crate::http::RestClient;
use crate::hub::{ClientGroups, WeakClientGroups};

/// Discord drops interactions which were not answered within this window.
const INTERACTION_RESPONSE_WINDOW: Duration = Duration::from_secs(3);

type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;
type BoxedHandler = Arc<dyn Fn(Arc<GatewayEvent>, Context) -> HandlerFuture + Send + Sync>;
type Argument = Arc<dyn Any + Send + Sync>;

/// An event together with the moment the gateway recieved it.
pub(crate) type RecievedEvent = (GatewayEvent, Instant);

/// Everything a handler is given besides the event.
///
/// The clients of the group are only missing when the dispatcher is used on its own, or when
/// the hub was dropped before the session started.
#[derive(Clone)]
pub struct Context {
    clients: GroupClients,
    arguments: Arc<HashMap<String, Argument>>,
}

impl Context {
    /// REST client of the group the event was recieved on.
    pub fn client(&self) -> Result<&RestClient> {
        bound(self.clients.client.as_ref(), "client")
    }

    /// Gateway client the event was recieved on.
    pub fn gateway(&self) -> Result<&GatewayClient> {
        bound(self.clients.gateway.as_ref(), "gateway")
    }

    /// Every group of the hub.
    pub fn client_groups(&self) -> Result<&ClientGroups> {
        bound(self.clients.client_groups.as_ref(), "client_groups")
    }

    /// Reads a value added with [`EventDispatcher::add_argument`].
    ///
    /// Fails when nothing was added under `name` or the value is not a `T`.
    pub fn argument<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let value = self
            .arguments
            .get(name)
            .ok_or_else(|| Error::MissingArgument(name.to_string()))?;

        value.clone().downcast::<T>().map_err(|_| Error::ArgumentType {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }
}

fn bound<'a, T>(entry: Option<&'a T>, name: &str) -> Result<&'a T> {
    entry.ok_or_else(|| Error::MissingArgument(name.to_string()))
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("client", &self.clients.client)
            .field("gateway", &self.clients.gateway)
            .field("client_groups", &self.clients.client_groups)
            .field("arguments", &self.arguments.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The group entries of a [`Context`].
#[derive(Clone, Default)]
pub(crate) struct GroupClients {
    pub(crate) client: Option<RestClient>,
    pub(crate) gateway: Option<GatewayClient>,
    pub(crate) client_groups: Option<ClientGroups>,
}

/// Set when the hub creates the group. Only the REST client is held strongly, the gateway
/// & the registry own the dispatcher.
struct Bindings {
    client: RestClient,
    gateway: WeakGatewayClient,
    client_groups: WeakClientGroups,
}

#[derive(Default)]
struct DispatcherInner {
    handlers: RwLock<HashMap<EventType, Vec<BoxedHandler>>>,

    // Replaced as a whole on every insert, contexts keep the snapshot they were built with.
    arguments: RwLock<Arc<HashMap<String, Argument>>>,
    bindings: RwLock<Option<Bindings>>,
}

/// Routes events to the handlers registered for their type.
///
/// Cloning gives another handle to the same handlers & arguments.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.handlers.read();
        let counts: HashMap<&'static str, usize> = handlers
            .iter()
            .map(|(event_type, handlers)| (event_type.name(), handlers.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for the event type of its first parameter.
    ///
    /// ```no_run
    /// # use hubcord::{EventDispatcher, Context, events::MessageCreateEvent};
    /// let dispatcher = EventDispatcher::new();
    /// dispatcher.add_handler(|message: MessageCreateEvent, ctx: Context| async move {
    ///     println!("{} said {}", message.author.username, message.content);
    ///     Ok(())
    /// });
    /// ```
    pub fn add_handler<E, F, Fut>(&self, handler: F)
    where
        E: Event,
        F: Fn(E, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(
            E::EVENT_TYPE,
            Arc::new(move |event: Arc<GatewayEvent>, context: Context| -> HandlerFuture {
                match E::from_gateway(&event) {
                    Some(event) => Box::pin(handler(event.clone(), context)),
                    None => Box::pin(async { Ok(()) }),
                }
            }),
        );
    }

    /// Registers a handler recieving the whole [`GatewayEvent`] of every event of `event_type`.
    pub fn add_raw_handler<F, Fut>(&self, event_type: EventType, handler: F)
    where
        F: Fn(GatewayEvent, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(
            event_type,
            Arc::new(move |event: Arc<GatewayEvent>, context: Context| -> HandlerFuture {
                Box::pin(handler(GatewayEvent::clone(&event), context))
            }),
        );
    }

    /// Registers a raw handler under a gateway event name such as `MESSAGE_CREATE`.
    pub fn add_handler_by_name<F, Fut>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(GatewayEvent, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let event_type =
            EventType::from_name(name).ok_or_else(|| Error::UnknownEvent(name.to_string()))?;
        self.add_raw_handler(event_type, handler);
        Ok(())
    }

    fn register(&self, event_type: EventType, handler: BoxedHandler) {
        trace!(event = event_type.name(), "Registering event handler");
        self.inner.handlers.write().entry(event_type).or_default().push(handler);
    }

    /// Adds a value every handler dispatched afterwards can read with [`Context::argument`].
    /// A value already stored under `name` is replaced.
    pub fn add_argument<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        let mut arguments = self.inner.arguments.write();
        Arc::make_mut(&mut *arguments).insert(name.into(), Arc::new(value));
    }

    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.inner.handlers.read().get(&event_type).map_or(0, Vec::len)
    }

    pub fn has_handlers(&self, event_type: EventType) -> bool {
        self.handler_count(event_type) > 0
    }

    /// Sets the clients every [`Context`] is built with.
    pub(crate) fn bind(
        &self,
        client: RestClient,
        gateway: WeakGatewayClient,
        client_groups: WeakClientGroups,
    ) {
        *self.inner.bindings.write() = Some(Bindings {
            client,
            gateway,
            client_groups,
        });
    }

    /// The bound clients which are still alive.
    pub(crate) fn bound_clients(&self) -> GroupClients {
        match self.inner.bindings.read().as_ref() {
            Some(bindings) => GroupClients {
                client: Some(bindings.client.clone()),
                gateway: bindings.gateway.upgrade(),
                client_groups: bindings.client_groups.upgrade(),
            },
            None => GroupClients::default(),
        }
    }

    fn handlers_for(&self, event_type: EventType) -> Vec<BoxedHandler> {
        self.inner
            .handlers
            .read()
            .get(&event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Awaits every handler registered for the type of `event`, in registration order.
    ///
    /// Errors returned by handlers are logged and do not stop the remaining handlers.
    pub async fn dispatch(&self, event: GatewayEvent) {
        let clients = self.bound_clients();
        self.dispatch_recieved(event, &clients, Instant::now()).await
    }

    /// Dispatches the events of `events` one after another until the sender is dropped.
    pub(crate) async fn process_recieved_events(
        self,
        clients: GroupClients,
        mut events: UnboundedReceiver<RecievedEvent>,
    ) {
        while let Some((event, recieved)) = events.recv().await {
            self.dispatch_recieved(event, &clients, recieved).await;
        }
        trace!("Event queue closed");
    }

    async fn dispatch_recieved(
        &self,
        event: GatewayEvent,
        clients: &GroupClients,
        recieved: Instant,
    ) {
        let event_type = event.event_type();

        let handlers = self.handlers_for(event_type);
        if handlers.is_empty() {
            trace!(event = event_type.name(), "No handlers for event");
            return;
        }

        let context = Context {
            clients: clients.clone(),
            arguments: self.inner.arguments.read().clone(),
        };

        let event = Arc::new(event);
        let mut late = false;
        for (index, handler) in handlers.iter().enumerate() {
            if let Err(err) = handler(event.clone(), context.clone()).await {
                error!(
                    event = event_type.name(),
                    handler = index,
                    error = ?err,
                    "Event handler failed"
                );
            }

            // Counted from receipt, the handlers of one interaction share the window.
            let elapsed = recieved.elapsed();
            if event_type == EventType::InteractionCreate
                && !late
                && elapsed > INTERACTION_RESPONSE_WINDOW
            {
                late = true;
                warn!(
                    handler = index,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Interaction handlers ran longer than Discord waits for a response"
                );
            }
        }
    }
}
