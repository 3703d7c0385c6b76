// Infrastructure layer - adapters around the application core
// Driven adapters implement the ports; driving adapters expose the commands.

use std::sync::Arc;
use tracing::{info, warn};

use crate::application::authorization::AuthorizationService;
use crate::application::connections::ConnectionTracker;
use crate::application::join_feed::JoinStatusFeed;
use crate::application::ports::{Clock, RealtimeUpstream, RoomProvider, TextClassifier};
use crate::application::relay::RelayContext;
use crate::application::scope_guard::ScopeGuard;
use crate::application::services::Services;
use crate::config::Settings;

pub mod driven;    // Output adapters (registry, external services)
pub mod driving;   // Input adapters (HTTP, WebSocket)

use driven::persistence::SessionRegistry;
use driven::{ChatCompletionsClassifier, HttpRoomProvider, WebSocketUpstream};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub relay: Arc<RelayContext>,
}

impl AppState {
    /// Wires every component from settings. Collaborators without an API
    /// key are left out and the features depending on them refuse requests.
    pub fn from_settings(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Self, config::ConfigError> {
        let secret = settings
            .secret()
            .ok_or_else(|| config::ConfigError::Message("auth.secret must be set".to_string()))?;

        let rooms: Option<Arc<dyn RoomProvider>> = match settings.rooms_key() {
            Some(key) => Some(Arc::new(HttpRoomProvider::new(settings.rooms.base_url.as_str(), key))),
            None => {
                warn!("rooms.api_key is not set, room access is disabled");
                None
            }
        };
        let classifier: Option<Arc<dyn TextClassifier>> = match settings.classifier_key() {
            Some(key) => Some(Arc::new(ChatCompletionsClassifier::new(
                settings.classifier.base_url.as_str(),
                key,
                settings.classifier.model.as_str(),
            ))),
            None => {
                warn!("classifier.api_key is not set, every AI message will be refused");
                None
            }
        };
        let upstream: Option<Arc<dyn RealtimeUpstream>> = match settings.realtime_key() {
            Some(key) => {
                let upstream = WebSocketUpstream::new(&settings.realtime.url, key, &settings.realtime.model)
                    .map_err(|e| config::ConfigError::Message(format!("realtime.url: {}", e)))?;
                Some(Arc::new(upstream))
            }
            None => {
                warn!("realtime.api_key is not set, the AI relay is disabled");
                None
            }
        };

        let services = Arc::new(Services {
            registry: Arc::new(SessionRegistry::new(clock.clone())),
            authz: Arc::new(AuthorizationService::new(secret.as_bytes(), clock.clone())),
            rooms,
            tracker: Arc::new(ConnectionTracker::new()),
            join_feed: Arc::new(JoinStatusFeed::new()),
            clock,
            policy: settings.session_policy(),
        });
        let relay = Arc::new(RelayContext {
            services: services.clone(),
            guard: Arc::new(ScopeGuard::new(classifier, settings.classifier_timeout())),
            upstream,
            pending_limit: settings.relay.pending_limit,
        });

        info!(
            "session policy: ttl {}s, usage limit {}",
            settings.session.ttl_secs, settings.session.usage_limit
        );
        Ok(Self { services, relay })
    }
}
