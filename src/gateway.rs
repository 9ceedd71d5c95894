//! The realtime connection to Discords gateway.
//!
//! A [`GatewayClient`] owns one session: it connects, identifies (or resumes), heartbeats and
//! hands every dispatched event to its [`EventDispatcher`]. Events are queued for a single
//! dispatch task, so handlers see them in the order they were recieved while the connection
//! keeps reading. Lost connections are resumed with an exponential backoff until
//! [`GatewayClient::close`] is called or the gateway closes the connection with a code that
//! can not be recovered from.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Sender as GatewaySinkSender, UnboundedSender};
use tokio::sync::{oneshot, watch, Notify};
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use url::Url;

use crate::backoff::Backoff;
use crate::config::GatewayConfig;
use crate::dispatcher::{EventDispatcher, RecievedEvent};
use crate::error::{Error, Result};
use crate::events::GatewayEvent;
use crate::gateway_structs::*;
use crate::intents::Intents;
use crate::websocket::{
    self, frame_close_code, process_gateway_send_commands, DeserializeRecievePayload, Outbound,
    ReadSplitStream,
};

/// How long the writer gets to flush the close frame once a connection ends.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of commands which can be queued for the writer of a connection.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of a [`GatewayClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` was never called.
    Unconnected,
    /// Opening a connection, also entered again on every reconnect.
    Connecting,
    /// READY or RESUMED was recieved.
    Connected,
    /// `close` was called, the connection is being shut down.
    Closing,
    /// The connection loop exited. The client may be connected again.
    Closed,
}

#[derive(Debug, Clone)]
/// Commands which can be sent through the gateway.
pub enum GatewayCommand {
    /// Carries the last sequence number recieved.
    Heartbeat(Option<u64>),
    Identify(Identify),
    Resume(Resume),
    PresenceUpdate(PresenceUpdate),
}

impl GatewayCommand {
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Heartbeat(_) => opcode::HEARTBEAT,
            Self::Identify(_) => opcode::IDENTIFY,
            Self::Resume(_) => opcode::RESUME,
            Self::PresenceUpdate(_) => opcode::PRESENCE_UPDATE,
        }
    }

    /// Wraps the command into its payload & serializes it.
    pub fn to_message(&self) -> Result<Message> {
        let opcode = self.opcode();
        match self {
            Self::Heartbeat(sequence) => Payload::new(opcode, sequence).to_message(),
            Self::Identify(identify) => Payload::new(opcode, identify).to_message(),
            Self::Resume(resume) => Payload::new(opcode, resume).to_message(),
            Self::PresenceUpdate(presence) => Payload::new(opcode, presence).to_message(),
        }
    }
}

/// What to do once a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// `close` was called.
    Closed,
    /// Reconnect & resume the session.
    Resume,
    /// Reconnect with a fresh session.
    Reconnect,
}

/// The data needed to resume a session, handed out in READY.
#[derive(Debug, Clone)]
struct SessionData {
    session_id: String,
    resume_url: String,
}

struct GatewayInner {
    /// Name of the group this client belongs to, used in logs.
    name: String,
    token: Arc<str>,
    config: GatewayConfig,
    dispatcher: EventDispatcher,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Option<SessionData>>,

    /// Number which is the last sequence number recieved from discords Gateway, 0 when none was.
    sequence_identifier: Arc<AtomicU64>,

    /// Sender into the writer of the current connection.
    commands: Mutex<Option<GatewaySinkSender<Outbound>>>,

    /// Queue of the dispatch task of the running session.
    events: Mutex<Option<UnboundedSender<RecievedEvent>>>,

    /// Bumped by every `close`, lets a session which was not polled yet see it was closed.
    close_requests: AtomicU64,

    /// Presence sent with every IDENTIFY.
    presence: Mutex<Option<PresenceUpdate>>,
    shutdown: watch::Sender<bool>,
    reconnect: Notify,
}

/// Client for one session on the gateway. Cloning gives another handle to the same session.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayInner>,
}

/// A [`GatewayClient`] handle which does not keep the client alive.
#[derive(Clone)]
pub struct WeakGatewayClient {
    inner: Weak<GatewayInner>,
}

impl WeakGatewayClient {
    pub fn upgrade(&self) -> Option<GatewayClient> {
        self.inner.upgrade().map(|inner| GatewayClient { inner })
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Creates a client which dispatches its events to `dispatcher`. Nothing connects until
    /// [`connect`][Self::connect] is called.
    pub fn new(
        name: impl Into<String>,
        token: &str,
        config: GatewayConfig,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                name: name.into(),
                token: Arc::from(token),
                config,
                dispatcher,
                state: watch::channel(ConnectionState::Unconnected).0,
                session: Mutex::new(None),
                sequence_identifier: Arc::new(AtomicU64::new(0)),
                commands: Mutex::new(None),
                events: Mutex::new(None),
                close_requests: AtomicU64::new(0),
                presence: Mutex::new(None),
                shutdown: watch::channel(false).0,
                reconnect: Notify::new(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakGatewayClient {
        WeakGatewayClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn intents(&self) -> Intents {
        self.inner.config.intents()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Recieves every state change of the client.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Id of the current session, `None` before READY.
    pub fn session_id(&self) -> Option<String> {
        self.inner.session.lock().as_ref().map(|session| session.session_id.clone())
    }

    /// The last sequence number recieved.
    pub fn sequence(&self) -> Option<u64> {
        load_sequence(&self.inner.sequence_identifier)
    }

    /// Runs the session until [`close`][Self::close] is called or it fails fatally.
    ///
    /// Connection losses are resumed internally and do not end the session. A `close` issued
    /// after this was called ends the session, even when the returned future was not polled yet.
    pub fn connect(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let client = self.clone();
        let close_requests = self.inner.close_requests.load(Ordering::Acquire);
        async move { client.run_until_closed(close_requests).await }
    }

    async fn run_until_closed(&self, close_requests: u64) -> Result<()> {
        let started = self.inner.state.send_if_modified(|state| {
            if matches!(state, ConnectionState::Unconnected | ConnectionState::Closed) {
                self.inner.shutdown.send_replace(false);
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::AlreadyStarted);
        }
        let _session = SessionGuard(self);

        if self.inner.close_requests.load(Ordering::Acquire) != close_requests {
            debug!(group = %self.inner.name, "Closed before the session started");
            return Ok(());
        }

        let mut clients = self.inner.dispatcher.bound_clients();
        clients.gateway = Some(self.clone());
        if clients.client_groups.is_none() {
            debug!(group = %self.inner.name, "Handlers of this session run without client groups");
        }

        // Ends once the queue is dropped & every queued event was handled.
        let (events, queue) = mpsc::unbounded_channel();
        *self.inner.events.lock() = Some(events);
        tokio::spawn(
            self.inner
                .dispatcher
                .clone()
                .process_recieved_events(clients, queue)
                .instrument(info_span!("dispatch", group = %self.inner.name)),
        );

        let result = self
            .run()
            .instrument(info_span!("gateway", group = %self.inner.name))
            .await;

        match &result {
            Ok(()) => info!(group = %self.inner.name, "Gateway connection closed"),
            Err(err) => error!(group = %self.inner.name, error = %err, "Gateway connection failed"),
        }
        result
    }

    /// Closes the connection & waits for [`connect`][Self::connect] to return.
    pub async fn close(&self) {
        let mut state = self.inner.state.subscribe();
        self.inner.close_requests.fetch_add(1, Ordering::AcqRel);
        self.inner.state.send_if_modified(|state| {
            self.inner.shutdown.send_replace(true);
            if matches!(state, ConnectionState::Connecting | ConnectionState::Connected) {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });

        let _ = state
            .wait_for(|state| {
                matches!(state, ConnectionState::Unconnected | ConnectionState::Closed)
            })
            .await;
    }

    /// Sends a command through the current connection.
    pub async fn send_command(&self, command: GatewayCommand) -> Result<()> {
        let sender = self.inner.commands.lock().clone().ok_or(Error::NotConnected)?;
        sender
            .send(Outbound::Command(command))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Changes the presence of the bot.
    ///
    /// The presence is kept & sent again on every IDENTIFY, so it can be set before connecting.
    pub async fn update_presence(&self, presence: PresenceUpdate) -> Result<()> {
        *self.inner.presence.lock() = Some(presence.clone());

        if self.inner.commands.lock().is_none() {
            return Ok(());
        }
        self.send_command(GatewayCommand::PresenceUpdate(presence)).await
    }

    /// Drops the current connection & resumes the session on a new one.
    pub fn reconnect(&self) -> Result<()> {
        if self.inner.commands.lock().is_none() {
            return Err(Error::NotConnected);
        }
        self.inner.reconnect.notify_one();
        Ok(())
    }

    /// Moves to `state` unless the client is closing.
    fn set_state(&self, new_state: ConnectionState) {
        self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Closing || *state == new_state {
                false
            } else {
                *state = new_state;
                true
            }
        });
    }

    fn clear_session(&self) {
        *self.inner.session.lock() = None;
        self.inner.sequence_identifier.store(0, Ordering::Release);
    }

    async fn run(&self) -> Result<()> {
        let mut backoff = Backoff::new(&self.inner.config.reconnect);
        let mut shutdown = self.inner.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                return Ok(());
            }
            self.set_state(ConnectionState::Connecting);

            match self.run_session(&mut shutdown, &mut backoff).await {
                Ok(SessionEnd::Closed) => return Ok(()),
                Ok(SessionEnd::Resume) => debug!("Resuming session on a new connection"),
                Ok(SessionEnd::Reconnect) => {
                    debug!("Session invalidated, identifying on a new connection");
                    self.clear_session();
                }
                Err(err) if err.is_recoverable() => warn!(error = %err, "Gateway connection lost"),
                Err(err) => return Err(err),
            }

            if backoff.attempt() >= self.inner.config.reconnect.max_attempts {
                return Err(Error::MaxReconnectAttempts(backoff.attempt()));
            }

            let delay = backoff.next_delay();
            debug!(
                delay_ms = delay.as_millis() as u64,
                attempt = backoff.attempt(),
                "Waiting before reconnecting"
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
            }
        }
    }

    /// The url to connect to, the resume url when there is a session to resume.
    fn connect_url(&self) -> String {
        match self.inner.session.lock().as_ref() {
            Some(session) => resume_url(&session.resume_url, &self.inner.config.url),
            None => self.inner.config.url.clone(),
        }
    }

    fn identify_or_resume(&self) -> GatewayCommand {
        match (self.session_id(), self.sequence()) {
            (Some(session_id), Some(seq)) => GatewayCommand::Resume(Resume {
                token: self.inner.token.clone(),
                session_id,
                seq,
            }),
            _ => GatewayCommand::Identify(Identify {
                token: self.inner.token.clone(),
                connection_properties: IdentifyConnectionProperties::default(),
                intents: self.inner.config.intents,
                large_threshold: self.inner.config.large_threshold,
                presence: self.inner.presence.lock().clone(),
            }),
        }
    }

    /// Runs a single connection from HELLO until it ends.
    async fn run_session(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut Backoff,
    ) -> Result<SessionEnd> {
        let url = self.connect_url();
        info!(%url, "Connecting to the gateway");

        let (sink, mut stream) = websocket::connect(&url).await?;

        let hello: Payload<Hello> = timeout(
            self.inner.config.hello_timeout(),
            stream.read_deserialize_next_payload(),
        )
        .await
        .map_err(|_| Error::HelloTimeout)??;
        if hello.opcode != opcode::HELLO {
            return Err(Error::Protocol(format!("expected HELLO, got opcode {}", hello.opcode)));
        }
        let heartbeat_interval = Duration::from_millis(hello.data.heartbeat_interval);
        debug!(heartbeat_interval_ms = hello.data.heartbeat_interval, "Recieved HELLO");

        let (sender, reciever) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let writer = tokio::spawn(process_gateway_send_commands(reciever, sink));

        let acked = Arc::new(AtomicBool::new(true));
        let (zombie_sender, zombie_reciever) = oneshot::channel();
        let heartbeat = tokio::spawn(heartbeat(
            sender.clone(),
            heartbeat_interval,
            self.inner.sequence_identifier.clone(),
            acked.clone(),
            zombie_sender,
        ));

        let handshake = self.identify_or_resume();
        debug!(opcode = handshake.opcode(), "Sending handshake");
        let end = match sender.send(Outbound::Command(handshake)).await {
            Ok(()) => {
                *self.inner.commands.lock() = Some(sender.clone());
                self.recieve_gateway_events(
                    &mut stream,
                    &sender,
                    &acked,
                    zombie_reciever,
                    shutdown,
                    backoff,
                )
                .await
            }
            Err(_) => Err(Error::Protocol("gateway writer stopped before the handshake".into())),
        };

        heartbeat.abort();
        *self.inner.commands.lock() = None;

        // Anything but 1000 keeps the session resumable.
        let code = match end {
            Ok(SessionEnd::Closed | SessionEnd::Reconnect) => close_code::NORMAL,
            _ => close_code::UNKNOWN_ERROR,
        };
        let _ = sender.send(Outbound::Close(code)).await;
        drop(sender);
        if timeout(WRITER_FLUSH_TIMEOUT, writer).await.is_err() {
            warn!("Gateway writer did not finish in time");
        }

        end
    }

    async fn recieve_gateway_events(
        &self,
        stream: &mut ReadSplitStream,
        sender: &GatewaySinkSender<Outbound>,
        acked: &AtomicBool,
        mut zombie: oneshot::Receiver<()>,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut Backoff,
    ) -> Result<SessionEnd> {
        loop {
            let next = tokio::select! {
                _ = wait_for_shutdown(shutdown) => return Ok(SessionEnd::Closed),
                _ = &mut zombie => {
                    warn!("No heartbeat ack recieved, reconnecting");
                    return Ok(SessionEnd::Resume);
                }
                _ = self.inner.reconnect.notified() => {
                    info!("Reconnect requested");
                    return Ok(SessionEnd::Resume);
                }
                next = stream.next() => next,
            };

            let message = match next {
                Some(message) => message?,
                None => return Err(Error::Protocol("gateway stream ended".into())),
            };

            match message {
                Message::Text(text) => {
                    let payload: RawPayload = match serde_json::from_str(&text) {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!(error = %err, "Skipping malformed gateway payload");
                            continue;
                        }
                    };
                    if let Some(end) = self.handle_payload(payload, sender, acked, backoff).await {
                        return Ok(end);
                    }
                }
                Message::Close(frame) => {
                    let code = frame_close_code(frame.as_ref());
                    if close_code::is_fatal(code) {
                        return Err(Error::GatewayClosed(code));
                    }
                    warn!(code, "Gateway closed the connection");
                    if close_code::invalidates_session(code) {
                        return Ok(SessionEnd::Reconnect);
                    }
                    return Ok(SessionEnd::Resume);
                }
                other => trace!(?other, "Skipping non text gateway message"),
            }
        }
    }

    /// Handles one payload, returns how the connection ends if it should.
    async fn handle_payload(
        &self,
        payload: RawPayload,
        sender: &GatewaySinkSender<Outbound>,
        acked: &AtomicBool,
        backoff: &mut Backoff,
    ) -> Option<SessionEnd> {
        match payload.opcode {
            opcode::DISPATCH => {
                let recieved = Instant::now();
                if let Some(sequence) = payload.sequence_number {
                    self.inner.sequence_identifier.fetch_max(sequence, Ordering::AcqRel);
                }

                let Some(name) = payload.event_name else {
                    warn!("Recieved a dispatch without an event name");
                    return None;
                };
                trace!(event = %name, sequence = ?payload.sequence_number, "Recieved dispatch");

                let event = match GatewayEvent::from_dispatch(&name, payload.data) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(event = %name, error = %err, "Failed to decode event");
                        return None;
                    }
                };

                match &event {
                    GatewayEvent::Ready(ready) => {
                        *self.inner.session.lock() = Some(SessionData {
                            session_id: ready.session_id.clone(),
                            resume_url: ready.resume_gateway_url.clone(),
                        });
                        info!(
                            user = %ready.user.username,
                            guilds = ready.guilds.len(),
                            "Session established"
                        );
                        backoff.reset();
                        self.set_state(ConnectionState::Connected);
                    }
                    GatewayEvent::Resumed(_) => {
                        info!("Session resumed");
                        backoff.reset();
                        self.set_state(ConnectionState::Connected);
                    }
                    _ => {}
                }

                let queued = match self.inner.events.lock().as_ref() {
                    Some(events) => events.send((event, recieved)).is_ok(),
                    None => false,
                };
                if !queued {
                    debug!(event = %name, "Dispatch task stopped, dropping event");
                }
            }
            opcode::HEARTBEAT => {
                let heartbeat = GatewayCommand::Heartbeat(self.sequence());
                if sender.send(Outbound::Command(heartbeat)).await.is_err() {
                    debug!("Could not answer heartbeat request, writer stopped");
                }
            }
            opcode::RECONNECT => {
                info!("Gateway asked to reconnect");
                return Some(SessionEnd::Resume);
            }
            opcode::INVALID_SESSION => {
                let resumable = payload.data.as_bool().unwrap_or(false);
                warn!(resumable, "Session invalidated");
                return Some(if resumable { SessionEnd::Resume } else { SessionEnd::Reconnect });
            }
            opcode::HEARTBEAT_ACK => {
                trace!("Heartbeat acknowledged");
                acked.store(true, Ordering::Release);
            }
            other => debug!(opcode = other, "Ignoring gateway payload"),
        }

        None
    }
}

/// Resets the client once a session ended, also when its future was dropped.
struct SessionGuard<'a>(&'a GatewayClient);

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.0.inner;
        *inner.events.lock() = None;
        *inner.commands.lock() = None;
        inner.state.send_replace(ConnectionState::Closed);
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

fn load_sequence(sequence_identifier: &AtomicU64) -> Option<u64> {
    match sequence_identifier.load(Ordering::Acquire) {
        0 => None,
        sequence => Some(sequence),
    }
}

/// Builds the url to resume on, with the query (version & encoding) of the configured url.
fn resume_url(resume_gateway_url: &str, configured_url: &str) -> String {
    let query = Url::parse(configured_url)
        .ok()
        .and_then(|url| url.query().map(str::to_owned));

    match query {
        Some(query) => format!("{}/?{query}", resume_gateway_url.trim_end_matches('/')),
        None => resume_gateway_url.to_string(),
    }
}

/// Send heartbeats through the connection to keep it alive.
///
/// Signals `zombie` when a heartbeat is due while the previous one was never acknowledged.
async fn heartbeat(
    sender: GatewaySinkSender<Outbound>,
    heartbeat_interval: Duration,
    sequence_identifier: Arc<AtomicU64>,
    acked: Arc<AtomicBool>,
    zombie: oneshot::Sender<()>,
) {
    // First heartbeat happens after heartbeat_interval * jitter
    // Jitter is a random value between 0 and 1.
    let jitter = rand::random::<f32>();

    // Sleep for the first heartbeat
    sleep(heartbeat_interval.mul_f32(jitter)).await;

    loop {
        if !acked.swap(false, Ordering::AcqRel) {
            let _ = zombie.send(());
            return;
        }

        let heartbeat = GatewayCommand::Heartbeat(load_sequence(&sequence_identifier));
        if sender.send(Outbound::Command(heartbeat)).await.is_err() {
            return;
        }

        // Wait for next heartbeat
        sleep(heartbeat_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn client() -> GatewayClient {
        GatewayClient::new("test", "token", GatewayConfig::default(), EventDispatcher::new())
    }

    fn message_json(command: &GatewayCommand) -> Value {
        let Message::Text(text) = command.to_message().unwrap() else {
            panic!("commands are sent as text");
        };
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn heartbeat_carries_sequence() {
        assert_eq!(
            message_json(&GatewayCommand::Heartbeat(Some(7))),
            serde_json::json!({ "op": 1, "d": 7 })
        );
        assert_eq!(
            message_json(&GatewayCommand::Heartbeat(None)),
            serde_json::json!({ "op": 1, "d": null })
        );
    }

    #[test]
    fn resume_payload_shape() {
        let command = GatewayCommand::Resume(Resume {
            token: Arc::from("token"),
            session_id: "abc".into(),
            seq: 12,
        });
        let value = message_json(&command);
        assert_eq!(value["op"], 6);
        assert_eq!(value["d"]["session_id"], "abc");
        assert_eq!(value["d"]["seq"], 12);
    }

    #[test]
    fn resume_url_keeps_query() {
        assert_eq!(
            resume_url("wss://gateway-us-east1-b.discord.gg", crate::GATEWAY_URL),
            "wss://gateway-us-east1-b.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(
            resume_url("ws://127.0.0.1:9000/", "ws://127.0.0.1:9000"),
            "ws://127.0.0.1:9000/"
        );
    }

    #[test]
    fn handshake_is_identify_without_session() {
        let client = client();
        let GatewayCommand::Identify(identify) = client.identify_or_resume() else {
            panic!("expected IDENTIFY");
        };
        assert_eq!(identify.intents, crate::DEFAULT_INTENTS.bits());
    }

    #[test]
    fn handshake_is_resume_with_session() {
        let client = client();
        *client.inner.session.lock() = Some(SessionData {
            session_id: "abc".into(),
            resume_url: "wss://resume.discord.gg".into(),
        });
        client.inner.sequence_identifier.store(5, Ordering::Release);

        let GatewayCommand::Resume(resume) = client.identify_or_resume() else {
            panic!("expected RESUME");
        };
        assert_eq!(resume.session_id, "abc");
        assert_eq!(resume.seq, 5);
        assert_eq!(client.connect_url(), "wss://resume.discord.gg/?v=10&encoding=json");

        client.clear_session();
        assert!(matches!(client.identify_or_resume(), GatewayCommand::Identify(_)));
        assert_eq!(client.connect_url(), crate::GATEWAY_URL);
    }

    #[tokio::test]
    async fn commands_need_a_connection() {
        let client = client();
        assert_eq!(client.state(), ConnectionState::Unconnected);
        assert!(matches!(
            client.send_command(GatewayCommand::Heartbeat(None)).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(client.reconnect(), Err(Error::NotConnected)));

        // Stored for the next IDENTIFY.
        client.update_presence(PresenceUpdate::default()).await.unwrap();
        let GatewayCommand::Identify(identify) = client.identify_or_resume() else {
            panic!("expected IDENTIFY");
        };
        assert!(identify.presence.is_some());
    }

    #[tokio::test]
    async fn close_before_the_session_is_polled() {
        let client = client();
        let session = client.connect();
        client.close().await;

        session.await.unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(client.inner.events.lock().is_none());
    }

    #[tokio::test]
    async fn close_without_connection_returns() {
        let client = client();
        client.close().await;
        assert_eq!(client.state(), ConnectionState::Unconnected);
    }

    #[test]
    fn weak_handle_does_not_keep_client_alive() {
        let client = client();
        let weak = client.downgrade();
        assert!(weak.upgrade().is_some());
        drop(client);
        assert!(weak.upgrade().is_none());
    }
}
