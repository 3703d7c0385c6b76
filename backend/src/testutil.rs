//! Fakes and fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huddle_protocol::QuotaSnapshot;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::authorization::AuthorizationService;
use crate::application::connections::{CloseReason, ConnectionTracker};
use crate::application::guest::commands::request_join::{self, RequestJoinCommand};
use crate::application::host::commands::create_session::{self, CreateSessionCommand};
use crate::application::join_feed::JoinStatusFeed;
use crate::application::ports::clock::ManualClock;
use crate::application::ports::{
    ClassifierError, MediaDefaults, RealtimeUpstream, Room, RoomError, RoomProvider, TextClassifier, UpstreamError,
    UpstreamFrame, UpstreamLink,
};
use crate::application::relay::{self, Admission, ClientFrame, RelayContext, RelayParams, ServerFrame};
use crate::application::scope_guard::ScopeGuard;
use crate::application::services::{SessionPolicy, Services};
use crate::domain::{
    CapabilityRole, JoinRequestId, RequestedRole, RoomGrant, SessionId, SessionKind, HOST_SUBJECT,
};
use crate::infrastructure::driven::persistence::SessionRegistry;

pub const TEST_SECRET: &[u8] = b"test-signing-secret";
pub const TEST_SCOPE: &str = "Should we adopt policy X";

pub struct TestServices {
    pub clock: Arc<ManualClock>,
    pub services: Arc<Services>,
}

impl TestServices {
    pub fn new() -> Self {
        Self::build(None, SessionPolicy::default())
    }

    pub fn with_rooms(rooms: Arc<dyn RoomProvider>) -> Self {
        Self::build(Some(rooms), SessionPolicy::default())
    }

    pub fn with_usage_limit(usage_limit: u32) -> Self {
        Self::build(
            None,
            SessionPolicy {
                usage_limit,
                ..SessionPolicy::default()
            },
        )
    }

    fn build(rooms: Option<Arc<dyn RoomProvider>>, policy: SessionPolicy) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let services = Services {
            registry: Arc::new(SessionRegistry::new(clock.clone())),
            authz: Arc::new(AuthorizationService::new(TEST_SECRET, clock.clone())),
            rooms,
            tracker: Arc::new(ConnectionTracker::new()),
            join_feed: Arc::new(JoinStatusFeed::new()),
            clock: clock.clone(),
            policy,
        };
        Self {
            clock,
            services: Arc::new(services),
        }
    }

    /// A moderated session scoped to [`TEST_SCOPE`] and its host capability.
    pub async fn moderated_session(&self) -> (SessionId, String) {
        let created = create_session::execute(
            &self.services,
            CreateSessionCommand {
                kind: SessionKind::Moderated,
                scope: Some(TEST_SCOPE.to_string()),
                context: None,
            },
        )
        .await
        .unwrap();
        (created.id, created.host_capability)
    }

    pub async fn join(&self, session: &SessionId, role: RequestedRole) -> JoinRequestId {
        request_join::execute(&self.services, session, RequestJoinCommand { role })
            .await
            .unwrap()
            .request_id
    }

    /// Marks a request admitted with a placeholder room.
    pub async fn admit_without_room(&self, session: &SessionId, request: &JoinRequestId) {
        let now = self.services.now();
        self.services
            .registry
            .update(session, |s| {
                let request = s.join_request_mut(request).unwrap();
                let role = request.requested_role;
                request
                    .admit(
                        RoomGrant {
                            room_url: "https://rooms.example/test".to_string(),
                            room_token: "room-token".to_string(),
                            final_role: role,
                        },
                        now,
                    )
                    .unwrap();
            })
            .await
            .unwrap();
    }
}

type Answer = Box<dyn Fn(&str) -> String + Send + Sync>;
type Delay = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// Classifier answering from a closure over the user prompt.
pub struct ScriptedClassifier {
    answer: Answer,
    delay: Option<Delay>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn answering(answer: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            answer: Box::new(answer),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers YES when the candidate message mentions "policy".
    pub fn policy_topic() -> Self {
        Self::answering(|prompt| {
            if candidate(prompt).contains("policy") {
                "YES".to_string()
            } else {
                "NO".to_string()
            }
        })
    }

    pub fn with_delay(mut self, delay: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

/// The candidate message embedded in a scope-check prompt.
pub fn candidate(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("User message: "))
        .unwrap_or("")
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    async fn classify(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, ClassifierError> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(user_prompt)).await;
        }
        Ok((self.answer)(user_prompt))
    }
}

/// Room service that accepts rooms but never answers a delete.
pub struct StalledRooms;

#[async_trait]
impl RoomProvider for StalledRooms {
    async fn ensure_room(&self, name: &str, _expires_at: DateTime<Utc>) -> Result<Room, RoomError> {
        Ok(Room {
            name: name.to_string(),
            url: format!("https://rooms.test/{}", name),
        })
    }

    async fn issue_room_token(
        &self,
        _name: &str,
        _expires_at: DateTime<Utc>,
        _is_owner: bool,
        _media: MediaDefaults,
    ) -> Result<String, RoomError> {
        Ok("room-token".to_string())
    }

    async fn delete_room(&self, _name: &str) -> Result<(), RoomError> {
        std::future::pending().await
    }
}

/// Test side of one fake upstream connection.
pub struct UpstreamPeer {
    pub received: mpsc::Receiver<UpstreamFrame>,
    pub sender: mpsc::Sender<UpstreamFrame>,
}

impl UpstreamPeer {
    pub async fn next_text(&mut self) -> String {
        match self.received.recv().await {
            Some(UpstreamFrame::Text(text)) => text,
            other => panic!("expected a text frame upstream, got {:?}", other),
        }
    }

    pub async fn next_json(&mut self) -> Value {
        serde_json::from_str(&self.next_text().await).unwrap()
    }
}

pub enum UpstreamMode {
    Open,
    Gated(Arc<Notify>),
    Failing,
}

/// In-memory upstream that hands its peer ends to the test.
pub struct FakeUpstream {
    mode: UpstreamMode,
    peers: mpsc::UnboundedSender<UpstreamPeer>,
}

impl FakeUpstream {
    pub fn new(mode: UpstreamMode) -> (Self, mpsc::UnboundedReceiver<UpstreamPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { mode, peers }, rx)
    }
}

#[async_trait]
impl RealtimeUpstream for FakeUpstream {
    async fn connect(&self, _shutdown: CancellationToken) -> Result<UpstreamLink, UpstreamError> {
        match &self.mode {
            UpstreamMode::Failing => return Err(UpstreamError::Connect("handshake refused".to_string())),
            UpstreamMode::Gated(gate) => gate.notified().await,
            UpstreamMode::Open => {}
        }
        let (to_peer, received) = mpsc::channel(64);
        let (sender, from_peer) = mpsc::channel(64);
        let _ = self.peers.send(UpstreamPeer { received, sender });
        Ok(UpstreamLink {
            sender: to_peer,
            receiver: from_peer,
        })
    }
}

/// Relay wiring over [`TestServices`] with a fake upstream.
pub struct RelayHarness {
    pub t: TestServices,
    pub ctx: RelayContext,
    pub peers: mpsc::UnboundedReceiver<UpstreamPeer>,
}

impl RelayHarness {
    pub fn new(t: TestServices) -> Self {
        Self::with_parts(t, Arc::new(ScriptedClassifier::policy_topic()), UpstreamMode::Open)
    }

    pub fn with_parts(t: TestServices, classifier: Arc<dyn TextClassifier>, mode: UpstreamMode) -> Self {
        let (upstream, peers) = FakeUpstream::new(mode);
        let ctx = RelayContext {
            services: t.services.clone(),
            guard: Arc::new(ScopeGuard::new(Some(classifier), Duration::from_secs(6))),
            upstream: Some(Arc::new(upstream)),
            pending_limit: relay::DEFAULT_PENDING_LIMIT,
        };
        Self { t, ctx, peers }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.t.services
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.t.clock
    }

    /// A fresh moderated session and a host AI capability for it.
    pub async fn host_ai_capability(&self) -> (SessionId, String) {
        let (session, _host) = self.t.moderated_session().await;
        let expires_at = self.services().registry.get(&session).await.unwrap().expires_at;
        let token = self
            .services()
            .authz
            .issue_ai_capability(&session, CapabilityRole::Host, HOST_SUBJECT, expires_at)
            .unwrap();
        (session, token)
    }

    /// Admits `token` as host on `session` and starts bridging.
    pub async fn open(&self, session: &SessionId, token: &str) -> RelayClient {
        let params = RelayParams {
            role: Some("host".to_string()),
            token: Some(token.to_string()),
        };
        let admission = relay::authorize(&self.ctx, session, &params).await.unwrap();
        self.open_admitted(admission)
    }

    pub fn open_admitted(&self, admission: Admission) -> RelayClient {
        let (to_relay, client_rx) = mpsc::channel(64);
        let (client_tx, from_relay) = mpsc::channel(64);
        let ctx = Arc::new(self.ctx.clone());
        let task = tokio::spawn(relay::bridge::run(ctx, admission, client_rx, client_tx));
        RelayClient {
            to_relay: Some(to_relay),
            from_relay,
            task,
        }
    }

    pub async fn next_peer(&mut self) -> UpstreamPeer {
        self.peers.recv().await.unwrap()
    }
}

/// Test side of a relay client socket.
pub struct RelayClient {
    pub to_relay: Option<mpsc::Sender<ClientFrame>>,
    pub from_relay: mpsc::Receiver<ServerFrame>,
    pub task: JoinHandle<()>,
}

impl RelayClient {
    pub async fn send(&self, message: Value) {
        self.to_relay
            .as_ref()
            .unwrap()
            .send(ClientFrame::Text(message.to_string()))
            .await
            .unwrap();
    }

    pub async fn say(&self, text: &str) {
        self.send(user_message(text)).await;
    }

    pub async fn next_frame(&mut self) -> ServerFrame {
        self.from_relay.recv().await.unwrap()
    }

    pub async fn next_event(&mut self) -> Value {
        match self.next_frame().await {
            ServerFrame::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    /// Consumes the ready and quota events sent when bridging starts.
    pub async fn ready(&mut self) -> QuotaSnapshot {
        assert_eq!(self.next_event().await["type"], "relay.upstream_ready");
        let quota = self.next_event().await;
        assert_eq!(quota["type"], "relay.quota");
        serde_json::from_value(quota).unwrap()
    }

    pub async fn closed_with(&mut self) -> CloseReason {
        loop {
            match self.next_frame().await {
                ServerFrame::Close(reason) => return reason,
                _ => continue,
            }
        }
    }

    pub fn hang_up(&mut self) {
        self.to_relay = None;
    }
}

pub fn user_message(text: &str) -> Value {
    json!({
        "type": "conversation.item.create",
        "item": {
            "type": "message",
            "role": "user",
            "content": [{"type": "input_text", "text": text}]
        }
    })
}
