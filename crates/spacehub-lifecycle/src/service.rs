//! SpaceAppLifecycle: persisted transitions of space apps.
//!
//! Notifier operations are keyed by [`SpaceAppIndex`] and are not
//! deduplicated: a notification delivered twice fails the second time with
//! `UnmatchedStatus`, which webhook callers treat as "already applied".
//! `ConcurrentUpdate` is passed through untouched so the notifier retries.
//!
//! User operations resolve the space first and check permission; a denial
//! is reported as `NotFound`.

use std::sync::Arc;

use serde::Serialize;
use spacehub_events::{AppEvent, Event, EventPublisher};
use spacehub_state::{
    AppStatus, Identity, Space, SpaceApp, SpaceAppIndex, StateStore, epoch_secs,
};
use tracing::{debug, info, warn};

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::machine;
use crate::permission::{Action, PermissionChecker};

/// Public view of a space app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppView {
    pub id: Identity,
    pub space_id: Identity,
    pub commit_id: String,
    pub status: AppStatus,
    pub app_url: Option<String>,
    pub restarted_at: u64,
}

impl From<&SpaceApp> for AppView {
    fn from(app: &SpaceApp) -> Self {
        Self {
            id: app.id,
            space_id: app.space_id(),
            commit_id: app.index.commit_id.clone(),
            status: app.status,
            app_url: app.app_url.clone(),
            restarted_at: app.restarted_at,
        }
    }
}

pub struct SpaceAppLifecycle {
    store: StateStore,
    publisher: Arc<dyn EventPublisher>,
    permissions: Arc<dyn PermissionChecker>,
    config: LifecycleConfig,
}

impl SpaceAppLifecycle {
    pub fn new(
        store: StateStore,
        publisher: Arc<dyn EventPublisher>,
        permissions: Arc<dyn PermissionChecker>,
        mut config: LifecycleConfig,
    ) -> Self {
        config.set_default();
        Self {
            store,
            publisher,
            permissions,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // ── Notifier operations ───────────────────────────────────────

    /// Create the app for a new build, retiring the space's previous app.
    ///
    /// Refused while the current app is paused or resuming.
    pub async fn create(&self, index: SpaceAppIndex) -> LifecycleResult<SpaceApp> {
        self.store.get::<Space>(index.space_id)?;

        let mut app = SpaceApp::new(index);
        let retired = self.store.replace_space_app_checked(&mut app, |current| {
            match current {
                Some(old) if machine::blocks_recreate(old.status) => {
                    Err(LifecycleError::UnmatchedStatus {
                        operation: "create",
                        status: old.status,
                    })
                }
                _ => Ok(()),
            }
        })?;

        info!(
            space_id = app.space_id(),
            commit_id = %app.index.commit_id,
            retired = ?retired.as_ref().map(|a| &a.index.commit_id),
            "space app created"
        );
        self.publisher
            .publish(&Event::SpaceAppCreated(app_event(&app)))
            .await?;
        Ok(app)
    }

    pub fn build_started(&self, index: &SpaceAppIndex, log_url: &str) -> LifecycleResult<SpaceApp> {
        self.transition(index, |app| {
            app.status = machine::start_building(app.status)?;
            app.build_log_url = Some(log_url.to_string());
            Ok(())
        })
    }

    /// Record the build outcome together with the final build log.
    pub fn build_done(
        &self,
        index: &SpaceAppIndex,
        success: bool,
        logs: &str,
    ) -> LifecycleResult<SpaceApp> {
        self.transition(index, |app| {
            app.status = machine::finish_build(app.status, success)?;
            app.all_build_log = logs.to_string();
            Ok(())
        })
    }

    /// The deploy step finished. Without an app URL the service failed to start.
    pub fn service_started(
        &self,
        index: &SpaceAppIndex,
        app_url: Option<&str>,
        log_url: Option<&str>,
    ) -> LifecycleResult<SpaceApp> {
        self.transition(index, |app| {
            app.status = machine::start_service(app.status, app_url.is_some())?;
            if let Some(url) = app_url {
                app.app_url = Some(url.to_string());
                app.app_log_url = log_url.map(str::to_string);
            }
            Ok(())
        })
    }

    pub fn restart_failed(&self, index: &SpaceAppIndex) -> LifecycleResult<SpaceApp> {
        self.transition(index, |app| {
            app.status = machine::fail_restart(app.status)?;
            Ok(())
        })
    }

    pub fn resume_failed(&self, space_id: Identity) -> LifecycleResult<SpaceApp> {
        self.store.get::<Space>(space_id)?;
        let mut app = self.store.find_app_by_space(space_id)?;
        app.status = machine::fail_resume(app.status)?;
        self.store.save(&mut app)?;
        info!(space_id, status = %app.status, "space app resume failed");
        Ok(app)
    }

    /// Flag the space's app for restart after its environment changed.
    ///
    /// Returns whether an app was flagged. A space without an app, or an
    /// app that is paused or resuming, is left as is.
    pub fn set_app_restarting(&self, space_id: Identity) -> LifecycleResult<bool> {
        let mut app = match self.store.find_app_by_space(space_id) {
            Ok(app) => app,
            Err(spacehub_state::StateError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let Some(next) = machine::restart_on_env_change(app.status) else {
            debug!(space_id, status = %app.status, "app not flagged for restart");
            return Ok(false);
        };
        app.status = next;
        self.store.save(&mut app)?;
        info!(space_id, commit_id = %app.index.commit_id, "space app flagged for restart");
        Ok(true)
    }

    // ── User operations ───────────────────────────────────────────

    pub async fn restart(&self, user: &str, space_id: Identity) -> LifecycleResult<SpaceApp> {
        self.authorize(user, space_id, Action::Update)?;
        let mut app = self.store.find_app_by_space(space_id)?;
        let now = epoch_secs();
        app.status = machine::restart(
            app.status,
            app.restarted_at,
            now,
            self.config.restart_over_time_secs,
        )?;
        app.restarted_at = now;
        self.store.save(&mut app)?;

        info!(space_id, %user, commit_id = %app.index.commit_id, "space app restarted");
        self.publisher
            .publish(&Event::SpaceAppRestarted(app_event(&app)))
            .await?;
        Ok(app)
    }

    pub async fn pause(&self, user: &str, space_id: Identity) -> LifecycleResult<SpaceApp> {
        self.authorize(user, space_id, Action::Update)?;
        let mut app = self.store.find_app_by_space(space_id)?;
        app.status = machine::pause(app.status)?;
        self.store.save(&mut app)?;

        info!(space_id, %user, commit_id = %app.index.commit_id, "space app paused");
        self.publisher
            .publish(&Event::SpaceAppPaused(app_event(&app)))
            .await?;
        Ok(app)
    }

    pub async fn resume(&self, user: &str, space_id: Identity) -> LifecycleResult<SpaceApp> {
        self.authorize(user, space_id, Action::Update)?;
        let mut app = self.store.find_app_by_space(space_id)?;
        let now = epoch_secs();
        app.status = machine::resume(
            app.status,
            app.resumed_at,
            now,
            self.config.resume_over_time_secs,
        )?;
        app.resumed_at = now;
        self.store.save(&mut app)?;

        info!(space_id, %user, commit_id = %app.index.commit_id, "space app resuming");
        self.publisher
            .publish(&Event::SpaceAppResumed(app_event(&app)))
            .await?;
        Ok(app)
    }

    // ── Queries ───────────────────────────────────────────────────

    /// The space's app, if `user` may read the space.
    pub fn app(&self, user: &str, space_id: Identity) -> LifecycleResult<SpaceApp> {
        self.authorize(user, space_id, Action::Read)?;
        Ok(self.store.find_app_by_space(space_id)?)
    }

    pub fn get(&self, user: &str, space_id: Identity) -> LifecycleResult<AppView> {
        self.app(user, space_id).map(|app| AppView::from(&app))
    }

    /// Final build output captured by `build_done`.
    pub fn build_log(&self, user: &str, space_id: Identity) -> LifecycleResult<String> {
        self.app(user, space_id).map(|app| app.all_build_log)
    }

    // ── Internals ─────────────────────────────────────────────────

    fn authorize(&self, user: &str, space_id: Identity, action: Action) -> LifecycleResult<Space> {
        let space = self.store.get::<Space>(space_id)?;
        if !self.permissions.check(user, &space, action) {
            warn!(space_id, %user, ?action, "permission denied");
            return Err(LifecycleError::NotFound(format!("space {space_id}")));
        }
        Ok(space)
    }

    fn transition(
        &self,
        index: &SpaceAppIndex,
        apply: impl FnOnce(&mut SpaceApp) -> LifecycleResult<()>,
    ) -> LifecycleResult<SpaceApp> {
        let mut app = self.store.find_app(index)?;
        let from = app.status;
        apply(&mut app)?;
        self.store.save(&mut app)?;
        info!(
            space_id = index.space_id,
            commit_id = %index.commit_id,
            from = %from,
            to = %app.status,
            "space app transition"
        );
        Ok(app)
    }
}

fn app_event(app: &SpaceApp) -> AppEvent {
    AppEvent {
        space_id: app.space_id(),
        commit_id: app.index.commit_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use spacehub_events::{BroadcastPublisher, PublishError, PublishResult};
    use spacehub_state::Visibility;

    use crate::permission::OrgPermissions;

    struct Harness {
        lifecycle: SpaceAppLifecycle,
        store: StateStore,
        publisher: Arc<BroadcastPublisher>,
        space_id: Identity,
    }

    fn harness() -> Harness {
        let store = StateStore::open_in_memory().unwrap();
        let mut space = Space {
            id: 0,
            owner: "alice".to_string(),
            created_by: "alice".to_string(),
            name: "S1".to_string(),
            sdk: "gradio".to_string(),
            hardware: "cpu-basic".to_string(),
            description: String::new(),
            visibility: Visibility::Private,
            commit_id: "commitA".to_string(),
            version: 0,
            created_at: 0,
            updated_at: 0,
        };
        store.insert(&mut space).unwrap();

        let publisher = Arc::new(BroadcastPublisher::default());
        let lifecycle = SpaceAppLifecycle::new(
            store.clone(),
            publisher.clone(),
            Arc::new(OrgPermissions::default()),
            LifecycleConfig::default(),
        );
        Harness {
            lifecycle,
            store,
            publisher,
            space_id: space.id,
        }
    }

    async fn serving(h: &Harness) -> SpaceAppIndex {
        let index = SpaceAppIndex::new(h.space_id, "commitA");
        h.lifecycle.create(index.clone()).await.unwrap();
        h.lifecycle.build_started(&index, "https://logs/build").unwrap();
        h.lifecycle.build_done(&index, true, "ok").unwrap();
        h.lifecycle
            .service_started(&index, Some("https://x"), Some("https://logs/app"))
            .unwrap();
        index
    }

    #[tokio::test]
    async fn build_and_serve_scenario() {
        let h = harness();
        let mut events = h.publisher.subscribe();
        let index = serving(&h).await;

        let app = h.store.find_app(&index).unwrap();
        assert_eq!(app.status, AppStatus::Serving);
        assert_eq!(app.app_url.as_deref(), Some("https://x"));
        assert_eq!(app.app_log_url.as_deref(), Some("https://logs/app"));
        assert_eq!(app.build_log_url.as_deref(), Some("https://logs/build"));
        // Insert plus three transitions.
        assert_eq!(app.version, 4);

        let created = events.recv().await.unwrap();
        assert_eq!(created.topic, "space_app_created");
        assert_eq!(created.payload["commit_id"], "commitA");
    }

    #[tokio::test]
    async fn duplicate_notification_is_unmatched_and_harmless() {
        let h = harness();
        let index = SpaceAppIndex::new(h.space_id, "commitA");
        h.lifecycle.create(index.clone()).await.unwrap();
        h.lifecycle.build_started(&index, "u").unwrap();
        let before = h.lifecycle.build_done(&index, true, "log").unwrap();

        let err = h.lifecycle.build_done(&index, true, "log").unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::UnmatchedStatus {
                status: AppStatus::BuildSuccessful,
                ..
            }
        ));
        assert_eq!(h.store.find_app(&index).unwrap(), before);
    }

    #[tokio::test]
    async fn failed_build_and_failed_start() {
        let h = harness();
        let index = SpaceAppIndex::new(h.space_id, "commitA");
        h.lifecycle.create(index.clone()).await.unwrap();
        h.lifecycle.build_started(&index, "u").unwrap();
        let app = h.lifecycle.build_done(&index, false, "error: boom").unwrap();
        assert_eq!(app.status, AppStatus::BuildFailed);
        assert!(h.lifecycle.service_started(&index, Some("https://x"), None).is_err());
        assert_eq!(h.lifecycle.build_log("alice", h.space_id).unwrap(), "error: boom");

        let next = SpaceAppIndex::new(h.space_id, "commitB");
        h.lifecycle.create(next.clone()).await.unwrap();
        h.lifecycle.build_started(&next, "u").unwrap();
        h.lifecycle.build_done(&next, true, "").unwrap();
        let app = h.lifecycle.service_started(&next, None, None).unwrap();
        assert_eq!(app.status, AppStatus::StartFailed);
        assert_eq!(app.app_url, None);
    }

    #[tokio::test]
    async fn unknown_index_is_not_found() {
        let h = harness();
        let index = SpaceAppIndex::new(h.space_id, "commitA");
        assert!(matches!(
            h.lifecycle.build_started(&index, "u"),
            Err(LifecycleError::NotFound(_))
        ));

        h.lifecycle.create(index).await.unwrap();
        let stale = SpaceAppIndex::new(h.space_id, "other");
        assert!(matches!(
            h.lifecycle.build_started(&stale, "u"),
            Err(LifecycleError::NotFound(_))
        ));

        let missing_space = SpaceAppIndex::new(999, "commitA");
        assert!(matches!(
            h.lifecycle.create(missing_space).await,
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_retires_previous_app_unless_paused() {
        let h = harness();
        serving(&h).await;

        let next = SpaceAppIndex::new(h.space_id, "commitB");
        let app = h.lifecycle.create(next).await.unwrap();
        assert_eq!(app.status, AppStatus::Init);
        assert_eq!(h.store.list_in_space::<SpaceApp>(h.space_id).unwrap().len(), 1);

        let h = harness();
        serving(&h).await;
        h.lifecycle.pause("alice", h.space_id).await.unwrap();
        let err = h
            .lifecycle
            .create(SpaceAppIndex::new(h.space_id, "commitB"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::UnmatchedStatus {
                status: AppStatus::Paused,
                ..
            }
        ));
        assert_eq!(
            h.store.find_app_by_space(h.space_id).unwrap().index.commit_id,
            "commitA"
        );
    }

    #[tokio::test]
    async fn restart_is_throttled_and_announced() {
        let h = harness();
        serving(&h).await;
        let mut events = h.publisher.subscribe();

        let app = h.lifecycle.restart("alice", h.space_id).await.unwrap();
        assert_eq!(app.status, AppStatus::Restarted);
        assert!(app.restarted_at > 0);
        assert_eq!(events.recv().await.unwrap().topic, "space_app_restarted");

        let err = h.lifecycle.restart("alice", h.space_id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::RestartTooSoon { .. }));

        let index = SpaceAppIndex::new(h.space_id, "commitA");
        let app = h.lifecycle.restart_failed(&index).unwrap();
        assert_eq!(app.status, AppStatus::RestartFailed);
        let app = h.lifecycle.restart("alice", h.space_id).await.unwrap();
        assert_eq!(app.status, AppStatus::Restarted);
        let app = h
            .lifecycle
            .service_started(&index, Some("https://y"), None)
            .unwrap();
        assert_eq!(app.status, AppStatus::Serving);
    }

    #[tokio::test]
    async fn pause_and_resume() {
        let h = harness();
        serving(&h).await;
        let mut events = h.publisher.subscribe();

        let app = h.lifecycle.pause("alice", h.space_id).await.unwrap();
        assert_eq!(app.status, AppStatus::Paused);
        assert!(h.lifecycle.pause("alice", h.space_id).await.is_err());

        let app = h.lifecycle.resume("alice", h.space_id).await.unwrap();
        assert_eq!(app.status, AppStatus::Resuming);
        let app = h.lifecycle.resume_failed(h.space_id).unwrap();
        assert_eq!(app.status, AppStatus::ResumeFailed);
        let app = h.lifecycle.resume("alice", h.space_id).await.unwrap();
        assert_eq!(app.status, AppStatus::Resuming);

        let topics: Vec<_> = [
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
            events.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|e| e.topic)
        .collect();
        assert_eq!(
            topics,
            ["space_app_paused", "space_app_resumed", "space_app_resumed"]
        );
    }

    #[tokio::test]
    async fn strangers_see_not_found() {
        let h = harness();
        serving(&h).await;

        for result in [
            h.lifecycle.restart("mallory", h.space_id).await,
            h.lifecycle.pause("mallory", h.space_id).await,
            h.lifecycle.resume("mallory", h.space_id).await,
        ] {
            assert!(matches!(result, Err(LifecycleError::NotFound(_))));
        }
        assert!(matches!(
            h.lifecycle.get("mallory", h.space_id),
            Err(LifecycleError::NotFound(_))
        ));
        assert_eq!(
            h.store.find_app_by_space(h.space_id).unwrap().status,
            AppStatus::Serving
        );
    }

    #[tokio::test]
    async fn env_change_flags_running_app() {
        let h = harness();
        assert!(!h.lifecycle.set_app_restarting(h.space_id).unwrap());

        serving(&h).await;
        assert!(h.lifecycle.set_app_restarting(h.space_id).unwrap());
        assert_eq!(
            h.lifecycle.get("alice", h.space_id).unwrap().status,
            AppStatus::Restarted
        );

        h.lifecycle.pause("alice", h.space_id).await.unwrap();
        assert!(!h.lifecycle.set_app_restarting(h.space_id).unwrap());
        assert_eq!(
            h.store.find_app_by_space(h.space_id).unwrap().status,
            AppStatus::Paused
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_notifications_have_one_winner() {
        let h = harness();
        let index = SpaceAppIndex::new(h.space_id, "commitA");
        h.lifecycle.create(index.clone()).await.unwrap();
        h.lifecycle.build_started(&index, "u").unwrap();
        let lifecycle = Arc::new(h.lifecycle);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let lifecycle = lifecycle.clone();
                let index = index.clone();
                tokio::spawn(async move { lifecycle.build_done(&index, i % 2 == 0, "") })
            })
            .collect();

        let mut wins = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => wins += 1,
                Err(LifecycleError::ConcurrentUpdate(_))
                | Err(LifecycleError::UnmatchedStatus { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(wins, 1);
        // Insert, build_started and exactly one build_done.
        assert_eq!(h.store.find_app(&index).unwrap().version, 3);
    }

    struct DownPublisher;

    #[async_trait]
    impl EventPublisher for DownPublisher {
        async fn publish(&self, event: &Event) -> PublishResult<()> {
            Err(PublishError::Transport {
                topic: event.topic().to_string(),
                message: "broker down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn publish_failure_keeps_committed_app() {
        let h = harness();
        let lifecycle = SpaceAppLifecycle::new(
            h.store.clone(),
            Arc::new(DownPublisher),
            Arc::new(OrgPermissions::default()),
            LifecycleConfig::default(),
        );
        let index = SpaceAppIndex::new(h.space_id, "commitA");

        let err = lifecycle.create(index.clone()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Publish(_)));
        assert_eq!(h.store.find_app(&index).unwrap().status, AppStatus::Init);
    }
}
