//! Client-side view of one project's messages and logs.
//!
//! A [`ProjectSync`] is built once and handed to whatever renders the project.
//! [`observe`](ProjectSync::observe) points it at a project: it fetches the
//! current messages and logs through a [`ResourceCache`], then listens on the
//! [`NotificationBus`] and refetches whenever a row for that project is
//! created. Every change of the message list re-runs the [`FollowUpPolicy`].
//!
//! Dropping the `ProjectSync`, or observing another project, cancels the
//! listener and any follow-up that has not started sending yet.

mod cache;
mod follow_up;

pub use cache::{CacheKey, CachedValue, Resource, ResourceCache};
pub use follow_up::{FollowUpDecision, FollowUpPolicy, Quiet};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::{ClientError, ProjectApi};
use crate::config::SyncConfig;
use crate::models::{
    CreateLogInput, CreateMessageInput, LogEntry, Message, MessageMetadata, Notification,
    NotificationKind, Sender,
};
use crate::notify::{Delivery, NotificationBus, Subscription};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to send: {0}")]
    SendFailure(#[source] ClientError),

    #[error("failed to load project data: {0}")]
    FetchFailure(#[source] ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient user-facing message, e.g. a toast.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Snapshot of the observed project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectView {
    pub project_id: Option<i64>,
    pub messages: Vec<Message>,
    pub logs: Vec<LogEntry>,
    pub loading: bool,
    /// Content of the latest assistant `task_status` message seen live.
    pub active_task_message: Option<String>,
}

struct ScheduledFollowUp {
    question_id: i64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    project_id: Option<i64>,
    loading: bool,
    active_task_message: Option<String>,
    listener: Option<JoinHandle<()>>,
    pending_follow_up: Option<ScheduledFollowUp>,
    /// Questions a follow-up was already scheduled for.
    followed_up: HashSet<i64>,
}

impl State {
    fn cancel_tasks(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.cancel_follow_up();
    }

    fn cancel_follow_up(&mut self) {
        if let Some(pending) = self.pending_follow_up.take() {
            pending.handle.abort();
        }
    }
}

struct Inner {
    api: Arc<dyn ProjectApi>,
    bus: NotificationBus,
    config: SyncConfig,
    policy: FollowUpPolicy,
    cache: ResourceCache,
    state: Mutex<State>,
    view: watch::Sender<ProjectView>,
    notices: broadcast::Sender<Notice>,
}

pub struct ProjectSync {
    inner: Arc<Inner>,
}

impl ProjectSync {
    pub fn new(api: Arc<dyn ProjectApi>, bus: NotificationBus, config: SyncConfig) -> Self {
        let (view, _) = watch::channel(ProjectView::default());
        let (notices, _) = broadcast::channel(32);
        let policy = FollowUpPolicy::new(config.stale_after);
        Self {
            inner: Arc::new(Inner {
                api,
                bus,
                config,
                policy,
                cache: ResourceCache::new(),
                state: Mutex::new(State::default()),
                view,
                notices,
            }),
        }
    }

    /// Start tracking `project_id`, replacing whatever was observed before.
    ///
    /// `None` detaches: the view empties and every operation becomes a no-op.
    /// If the initial fetch fails the listener is still started, so the next
    /// notification retries, and the error is returned.
    pub async fn observe(&self, project_id: Option<i64>) -> Result<ProjectView, SyncError> {
        let inner = &self.inner;
        {
            let mut state = inner.lock_state();
            state.cancel_tasks();
            *state = State {
                project_id,
                loading: project_id.is_some(),
                ..State::default()
            };
        }
        inner.cache.clear();
        inner.publish_view();

        let Some(project_id) = project_id else {
            tracing::debug!("sync detached");
            return Ok(self.view());
        };

        tracing::info!(project_id, "observing project");

        // Subscribe before fetching so nothing created in between is missed.
        let subscription = inner.bus.subscribe_project(project_id);
        let listener = tokio::spawn(run_listener(Arc::clone(inner), project_id, subscription));
        {
            let mut state = inner.lock_state();
            if state.project_id == Some(project_id) {
                state.listener = Some(listener);
            } else {
                listener.abort();
            }
        }

        let result = tokio::try_join!(
            inner.fetch_messages(project_id),
            inner.fetch_logs(project_id)
        );

        {
            let mut state = inner.lock_state();
            if state.project_id == Some(project_id) {
                state.loading = false;
            }
        }
        inner.publish_view();

        match result {
            Ok((messages, _)) => {
                inner.evaluate_follow_up(project_id, &messages);
                Ok(self.view())
            }
            Err(e) => {
                tracing::warn!(project_id, error = %e, "initial fetch failed");
                inner.notify(Notice::error(format!("Could not load project: {}", e)));
                Err(SyncError::FetchFailure(e))
            }
        }
    }

    pub fn project_id(&self) -> Option<i64> {
        self.inner.lock_state().project_id
    }

    /// Current snapshot.
    pub fn view(&self) -> ProjectView {
        self.inner.view.borrow().clone()
    }

    /// Receiver that sees every new snapshot.
    pub fn watch(&self) -> watch::Receiver<ProjectView> {
        self.inner.view.subscribe()
    }

    /// Transient user-facing notices (send and load failures).
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Dispatch a notification to the matching handler.
    pub async fn handle_notification(&self, notification: &Notification) {
        self.inner.handle_notification(notification).await;
    }

    /// A message was created somewhere; refetch if it belongs to the observed project.
    pub async fn on_remote_message_created(&self, message: &Message) {
        self.inner.on_remote_message_created(message).await;
    }

    /// A log was created somewhere; refetch if it belongs to the observed project.
    pub async fn on_remote_log_created(&self, log: &LogEntry) {
        self.inner.on_remote_log_created(log).await;
    }

    /// Drop cached data for the observed project and load it again.
    pub async fn refresh(&self) {
        if let Some(project_id) = self.project_id() {
            self.inner.cache.invalidate_project(project_id);
            self.inner.refresh_messages(project_id).await;
            self.inner.refresh_logs(project_id).await;
        }
    }

    /// Post a message as the end user. `Ok(None)` when no project is observed.
    pub async fn add_user_message(
        &self,
        content: impl Into<String>,
    ) -> Result<Option<Message>, SyncError> {
        self.inner
            .send_message(CreateMessageInput::user(content))
            .await
    }

    /// Post a message as the assistant persona.
    pub async fn add_assistant_message(
        &self,
        content: impl Into<String>,
        metadata: Option<MessageMetadata>,
    ) -> Result<Option<Message>, SyncError> {
        self.inner
            .send_message(CreateMessageInput::assistant(content, metadata))
            .await
    }

    /// Append an `execution` log entry.
    pub async fn add_execution_log(
        &self,
        title: impl Into<String>,
        details: Option<String>,
    ) -> Result<Option<LogEntry>, SyncError> {
        let Some(project_id) = self.project_id() else {
            return Ok(None);
        };
        let input = CreateLogInput::execution(title, details);
        match self.inner.api.create_log(project_id, &input).await {
            Ok(log) => {
                self.inner.cache.invalidate((project_id, Resource::Logs));
                self.inner.refresh_logs(project_id).await;
                Ok(Some(log))
            }
            Err(e) => {
                tracing::warn!(project_id, error = %e, "failed to add log");
                self.inner
                    .notify(Notice::error(format!("Could not save log: {}", e)));
                Err(SyncError::SendFailure(e))
            }
        }
    }
}

impl Drop for ProjectSync {
    fn drop(&mut self) {
        self.inner.lock_state().cancel_tasks();
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_observing(&self, project_id: i64) -> bool {
        self.lock_state().project_id == Some(project_id)
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    fn publish_view(&self) {
        let (project_id, loading, active_task_message) = {
            let state = self.lock_state();
            (
                state.project_id,
                state.loading,
                state.active_task_message.clone(),
            )
        };

        let view = match project_id {
            Some(id) => ProjectView {
                project_id,
                messages: self
                    .cache
                    .peek((id, Resource::Messages))
                    .map(CachedValue::into_messages)
                    .unwrap_or_default(),
                logs: self
                    .cache
                    .peek((id, Resource::Logs))
                    .map(CachedValue::into_logs)
                    .unwrap_or_default(),
                loading,
                active_task_message,
            },
            None => ProjectView::default(),
        };

        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    async fn fetch_messages(&self, project_id: i64) -> Result<Vec<Message>, ClientError> {
        let value = self
            .cache
            .get_or_fetch((project_id, Resource::Messages), || async {
                self.api
                    .list_messages(project_id)
                    .await
                    .map(CachedValue::Messages)
            })
            .await?;
        Ok(value.into_messages())
    }

    async fn fetch_logs(&self, project_id: i64) -> Result<Vec<LogEntry>, ClientError> {
        let value = self
            .cache
            .get_or_fetch((project_id, Resource::Logs), || async {
                self.api.list_logs(project_id).await.map(CachedValue::Logs)
            })
            .await?;
        Ok(value.into_logs())
    }

    async fn refresh_messages(&self, project_id: i64) {
        match self.fetch_messages(project_id).await {
            Ok(messages) => {
                if !self.is_observing(project_id) {
                    return;
                }
                self.publish_view();
                self.evaluate_follow_up(project_id, &messages);
            }
            Err(e) => {
                tracing::warn!(project_id, error = %e, "failed to refetch messages");
                self.notify(Notice::error(format!("Could not refresh messages: {}", e)));
            }
        }
    }

    async fn refresh_logs(&self, project_id: i64) {
        match self.fetch_logs(project_id).await {
            Ok(_) => {
                if self.is_observing(project_id) {
                    self.publish_view();
                }
            }
            Err(e) => {
                tracing::warn!(project_id, error = %e, "failed to refetch logs");
                self.notify(Notice::error(format!("Could not refresh logs: {}", e)));
            }
        }
    }

    async fn handle_notification(&self, notification: &Notification) {
        match &notification.kind {
            NotificationKind::MessageCreated { message } => {
                self.on_remote_message_created(message).await
            }
            NotificationKind::LogCreated { log } => self.on_remote_log_created(log).await,
            NotificationKind::ProjectCreated { project } => {
                tracing::trace!(project_id = project.id, "ignoring project_created");
            }
        }
    }

    async fn on_remote_message_created(&self, message: &Message) {
        let project_id = message.project_id;
        {
            let mut state = self.lock_state();
            if state.project_id != Some(project_id) {
                return;
            }
            let is_task_status = message.sender == Sender::Assistant
                && message
                    .metadata
                    .as_ref()
                    .is_some_and(MessageMetadata::is_task_status);
            if is_task_status {
                state.active_task_message = Some(message.content.clone());
            }
        }

        self.cache.invalidate((project_id, Resource::Messages));
        self.refresh_messages(project_id).await;
    }

    async fn on_remote_log_created(&self, log: &LogEntry) {
        let project_id = log.project_id;
        if !self.is_observing(project_id) {
            return;
        }
        self.cache.invalidate((project_id, Resource::Logs));
        self.refresh_logs(project_id).await;
    }

    async fn send_message(&self, input: CreateMessageInput) -> Result<Option<Message>, SyncError> {
        let project_id = self.lock_state().project_id;
        let Some(project_id) = project_id else {
            return Ok(None);
        };

        match self.api.create_message(project_id, &input).await {
            Ok(message) => {
                self.cache.invalidate((project_id, Resource::Messages));
                self.refresh_messages(project_id).await;
                Ok(Some(message))
            }
            Err(e) => {
                tracing::warn!(project_id, error = %e, "failed to send message");
                self.notify(Notice::error(format!("Could not send message: {}", e)));
                Err(SyncError::SendFailure(e))
            }
        }
    }

    fn evaluate_follow_up(&self, project_id: i64, messages: &[Message]) {
        let decision = self.policy.evaluate(messages, Utc::now());
        let mut state = self.lock_state();
        if state.project_id != Some(project_id) {
            return;
        }

        let question_id = match decision {
            FollowUpDecision::Due { question_id } => question_id,
            FollowUpDecision::Quiet(reason) => {
                // The thread moved on before the follow-up went out.
                if state.pending_follow_up.is_some() {
                    tracing::debug!(project_id, ?reason, "cancelling pending follow-up");
                    state.cancel_follow_up();
                }
                return;
            }
        };

        if !state.followed_up.insert(question_id) {
            return;
        }
        state.cancel_follow_up();

        tracing::info!(
            project_id,
            question_id,
            "assistant question unanswered, scheduling follow-up"
        );

        let api = Arc::clone(&self.api);
        let delay = self.config.follow_up_delay;
        let text = self.config.follow_up_text.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Once started, the send is not cancelled with the view.
            tokio::spawn(send_follow_up(api, project_id, text));
        });
        state.pending_follow_up = Some(ScheduledFollowUp {
            question_id,
            handle,
        });
    }
}

async fn send_follow_up(api: Arc<dyn ProjectApi>, project_id: i64, text: String) {
    let input = CreateMessageInput::assistant(text, None);
    match api.create_message(project_id, &input).await {
        Ok(message) => {
            tracing::info!(project_id, message_id = message.id, "follow-up sent");
        }
        Err(e) => {
            tracing::warn!(project_id, error = %e, "failed to send follow-up");
        }
    }
}

async fn run_listener(inner: Arc<Inner>, project_id: i64, mut subscription: Subscription) {
    let period = inner.config.recheck_interval.max(Duration::from_millis(10));
    let mut recheck = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            delivery = subscription.recv() => match delivery {
                Some(Delivery::Notification(notification)) => {
                    inner.handle_notification(&notification).await;
                }
                Some(Delivery::Lagged(missed)) => {
                    tracing::warn!(project_id, missed, "notification subscriber lagged, reloading");
                    inner.cache.invalidate_project(project_id);
                    inner.refresh_messages(project_id).await;
                    inner.refresh_logs(project_id).await;
                }
                None => {
                    tracing::debug!(project_id, "notification bus closed");
                    break;
                }
            },
            _ = recheck.tick() => {
                inner.cache.invalidate((project_id, Resource::Messages));
                inner.refresh_messages(project_id).await;
            }
        }
    }
}
