//! Fixtures shared by handler tests.

use std::sync::Arc;

use axum::response::Response;
use spacehub_env::{EnvConfig, EnvConfigManager};
use spacehub_events::BroadcastPublisher;
use spacehub_lifecycle::{LifecycleConfig, OrgPermissions, Role, SpaceAppLifecycle};
use spacehub_logs::{LogRelay, LogRelayConfig};
use spacehub_state::{
    AppStatus, Identity, Space, SpaceApp, SpaceAppIndex, StateStore, Visibility,
};
use spacehub_vault::MemoryVault;

use crate::ApiState;

pub(crate) struct TestApi {
    pub state: ApiState,
    pub publisher: Arc<BroadcastPublisher>,
    pub vault: Arc<MemoryVault>,
}

impl TestApi {
    /// Fixture where `bob` writes to and `carol` reads the `acme` organization.
    pub fn new() -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let publisher = Arc::new(BroadcastPublisher::default());
        let vault = Arc::new(MemoryVault::new());
        let mut permissions = OrgPermissions::default();
        permissions.grant("acme", "bob", Role::Write);
        permissions.grant("acme", "carol", Role::Read);
        let permissions = Arc::new(permissions);

        let lifecycle = Arc::new(SpaceAppLifecycle::new(
            store.clone(),
            publisher.clone(),
            permissions.clone(),
            LifecycleConfig::default(),
        ));
        let env = EnvConfigManager::new(
            store.clone(),
            vault.clone(),
            publisher.clone(),
            permissions,
            lifecycle.clone(),
            EnvConfig::default(),
        )
        .unwrap();
        let relay = LogRelay::new(LogRelayConfig::default()).unwrap();

        Self {
            state: ApiState {
                store,
                lifecycle,
                env: Arc::new(env),
                relay: Arc::new(relay),
            },
            publisher,
            vault,
        }
    }

    pub fn space(&self, owner: &str, created_by: &str) -> Identity {
        let mut space = Space {
            id: 0,
            owner: owner.to_string(),
            created_by: created_by.to_string(),
            name: "demo".to_string(),
            sdk: "gradio".to_string(),
            hardware: "cpu-basic".to_string(),
            description: String::new(),
            visibility: Visibility::Private,
            commit_id: "c1".to_string(),
            version: 0,
            created_at: 1000,
            updated_at: 1000,
        };
        self.state.store.insert(&mut space).unwrap();
        space.id
    }

    /// Put the space's app directly into `status`.
    pub fn app_at(&self, space_id: Identity, status: AppStatus) -> SpaceApp {
        let store = &self.state.store;
        let mut app = SpaceApp::new(SpaceAppIndex::new(space_id, "c1"));
        store.replace_space_app(&mut app).unwrap();
        app.status = status;
        if status == AppStatus::Serving {
            app.app_url = Some("http://app.local".to_string());
        }
        store.save(&mut app).unwrap();
        app
    }
}

pub(crate) async fn read_json(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
