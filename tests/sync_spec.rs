use speculate2::speculate;

speculate! {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    use projectdesk::client::{ClientError, ClientResult, LocalApi, ProjectApi};
    use projectdesk::config::{SyncConfig, FOLLOW_UP_TEXT};
    use projectdesk::db::Database;
    use projectdesk::models::*;
    use projectdesk::notify::NotificationBus;
    use projectdesk::sync::{NoticeLevel, ProjectSync, ProjectView, SyncError};

    fn test_config() -> SyncConfig {
        SyncConfig {
            follow_up_delay: Duration::ZERO,
            ..SyncConfig::default()
        }
    }

    /// Database with one project, plus a LocalApi sharing its bus.
    fn setup() -> (LocalApi, i64) {
        let db = Database::open_memory().expect("Failed to create test database");
        db.migrate().expect("Failed to migrate");
        let user = db
            .create_user(CreateUserInput {
                email: "ada@example.com".into(),
                display_name: "Ada".into(),
            })
            .unwrap();
        let project = db
            .create_project(CreateProjectInput {
                name: "Launch".into(),
                prompt: "Sell the ebook".into(),
                user_id: user.id,
            })
            .unwrap();
        (LocalApi::new(db, NotificationBus::new()), project.id)
    }

    fn sync_for(api: &LocalApi, config: SyncConfig) -> ProjectSync {
        ProjectSync::new(Arc::new(api.clone()), api.bus().clone(), config)
    }

    fn insert_aged(api: &LocalApi, project_id: i64, input: CreateMessageInput, age: ChronoDuration) -> Message {
        api.db()
            .create_message_at(project_id, input, Utc::now() - age)
            .unwrap()
    }

    fn follow_up_count(messages: &[Message]) -> usize {
        messages.iter().filter(|m| m.content == FOLLOW_UP_TEXT).count()
    }

    /// Poll the view until `done` holds, up to two seconds.
    async fn wait_for(sync: &ProjectSync, done: impl Fn(&ProjectView) -> bool) -> ProjectView {
        for _ in 0..200 {
            let view = sync.view();
            if done(&view) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sync.view()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    /// Reads succeed with empty lists; every write fails.
    struct OfflineApi;

    #[async_trait]
    impl ProjectApi for OfflineApi {
        async fn list_projects(&self) -> ClientResult<Vec<Project>> {
            Ok(Vec::new())
        }

        async fn create_project(&self, _input: &CreateProjectInput) -> ClientResult<Project> {
            Err(ClientError::Server { status: 503, message: "offline".into() })
        }

        async fn list_messages(&self, _project_id: i64) -> ClientResult<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn create_message(&self, _project_id: i64, _input: &CreateMessageInput) -> ClientResult<Message> {
            Err(ClientError::Server { status: 503, message: "offline".into() })
        }

        async fn list_logs(&self, _project_id: i64) -> ClientResult<Vec<LogEntry>> {
            Ok(Vec::new())
        }

        async fn create_log(&self, _project_id: i64, _input: &CreateLogInput) -> ClientResult<LogEntry> {
            Err(ClientError::Server { status: 503, message: "offline".into() })
        }

        async fn get_credentials(&self, _project_id: i64) -> ClientResult<CredentialSet> {
            Ok(CredentialSet::new())
        }

        async fn save_credentials(&self, _project_id: i64, _credentials: &CredentialSet) -> ClientResult<()> {
            Err(ClientError::Server { status: 503, message: "offline".into() })
        }
    }

    /// Delegates to a LocalApi, but message reads take `delay`.
    struct SlowApi {
        inner: LocalApi,
        delay: Duration,
    }

    #[async_trait]
    impl ProjectApi for SlowApi {
        async fn list_projects(&self) -> ClientResult<Vec<Project>> {
            self.inner.list_projects().await
        }

        async fn create_project(&self, input: &CreateProjectInput) -> ClientResult<Project> {
            self.inner.create_project(input).await
        }

        async fn list_messages(&self, project_id: i64) -> ClientResult<Vec<Message>> {
            tokio::time::sleep(self.delay).await;
            self.inner.list_messages(project_id).await
        }

        async fn create_message(&self, project_id: i64, input: &CreateMessageInput) -> ClientResult<Message> {
            self.inner.create_message(project_id, input).await
        }

        async fn list_logs(&self, project_id: i64) -> ClientResult<Vec<LogEntry>> {
            self.inner.list_logs(project_id).await
        }

        async fn create_log(&self, project_id: i64, input: &CreateLogInput) -> ClientResult<LogEntry> {
            self.inner.create_log(project_id, input).await
        }

        async fn get_credentials(&self, project_id: i64) -> ClientResult<CredentialSet> {
            self.inner.get_credentials(project_id).await
        }

        async fn save_credentials(&self, project_id: i64, credentials: &CredentialSet) -> ClientResult<()> {
            self.inner.save_credentials(project_id, credentials).await
        }
    }

    describe "stale questions" {
        it "sends exactly one follow-up for a question unanswered for three hours" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                insert_aged(
                    &api,
                    project_id,
                    CreateMessageInput::assistant("Should I proceed with plan A?", None),
                    ChronoDuration::hours(3),
                );
                let sync = sync_for(&api, test_config());

                sync.observe(Some(project_id)).await.unwrap();
                let view = wait_for(&sync, |v| follow_up_count(&v.messages) == 1).await;

                assert_eq!(view.messages.len(), 2);
                let last = view.messages.last().unwrap();
                assert_eq!(last.sender, Sender::Assistant);
                assert_eq!(last.content, FOLLOW_UP_TEXT);

                // Later refetches must not schedule another one.
                sync.refresh().await;
                settle().await;
                let stored = api.list_messages(project_id).await.unwrap();
                assert_eq!(follow_up_count(&stored), 1);
                assert_eq!(stored.len(), 2);
            });
        }

        it "leaves a one hour old question alone" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                insert_aged(
                    &api,
                    project_id,
                    CreateMessageInput::assistant("Should I proceed with plan A?", None),
                    ChronoDuration::hours(1),
                );
                let sync = sync_for(&api, test_config());

                sync.observe(Some(project_id)).await.unwrap();
                settle().await;

                assert_eq!(api.list_messages(project_id).await.unwrap().len(), 1);
            });
        }

        it "does nothing when the user spoke last" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                insert_aged(
                    &api,
                    project_id,
                    CreateMessageInput::assistant("Should I proceed?", None),
                    ChronoDuration::hours(5),
                );
                insert_aged(&api, project_id, CreateMessageInput::user("Yes"), ChronoDuration::hours(4));
                let sync = sync_for(&api, test_config());

                sync.observe(Some(project_id)).await.unwrap();
                settle().await;

                assert_eq!(follow_up_count(&api.list_messages(project_id).await.unwrap()), 0);
            });
        }

        it "cancels a pending follow-up when the user answers first" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                insert_aged(
                    &api,
                    project_id,
                    CreateMessageInput::assistant("Which title do you prefer?", None),
                    ChronoDuration::hours(3),
                );
                let sync = sync_for(
                    &api,
                    SyncConfig {
                        follow_up_delay: Duration::from_millis(300),
                        ..SyncConfig::default()
                    },
                );

                sync.observe(Some(project_id)).await.unwrap();
                sync.add_user_message("The second one").await.unwrap();
                tokio::time::sleep(Duration::from_millis(500)).await;

                let stored = api.list_messages(project_id).await.unwrap();
                assert_eq!(follow_up_count(&stored), 0);
                assert_eq!(stored.len(), 2);
            });
        }

        it "deduplicates refetches inside the follow-up delay" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                insert_aged(
                    &api,
                    project_id,
                    CreateMessageInput::assistant("Should I publish today?", None),
                    ChronoDuration::hours(3),
                );
                let sync = sync_for(
                    &api,
                    SyncConfig {
                        follow_up_delay: Duration::from_millis(300),
                        ..SyncConfig::default()
                    },
                );

                sync.observe(Some(project_id)).await.unwrap();
                for _ in 0..3 {
                    sync.refresh().await;
                }
                assert_eq!(api.list_messages(project_id).await.unwrap().len(), 1);

                tokio::time::sleep(Duration::from_millis(600)).await;

                let stored = api.list_messages(project_id).await.unwrap();
                assert_eq!(follow_up_count(&stored), 1);
                assert_eq!(stored.len(), 2);
            });
        }

        it "notices a question going stale without any new event" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                api.db()
                    .create_message(project_id, CreateMessageInput::assistant("Ready to launch?", None))
                    .unwrap();
                let sync = sync_for(
                    &api,
                    SyncConfig {
                        stale_after: Duration::from_millis(300),
                        follow_up_delay: Duration::ZERO,
                        recheck_interval: Duration::from_millis(100),
                        ..SyncConfig::default()
                    },
                );

                sync.observe(Some(project_id)).await.unwrap();
                assert_eq!(follow_up_count(&sync.view().messages), 0);

                let view = wait_for(&sync, |v| follow_up_count(&v.messages) == 1).await;
                assert_eq!(follow_up_count(&view.messages), 1);

                // Further ticks see the follow-up as the last message.
                tokio::time::sleep(Duration::from_millis(400)).await;
                let stored = api.list_messages(project_id).await.unwrap();
                assert_eq!(follow_up_count(&stored), 1);
                assert_eq!(stored.len(), 2);
            });
        }

        it "does not send after the view is dropped" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                insert_aged(
                    &api,
                    project_id,
                    CreateMessageInput::assistant("Proceed?", None),
                    ChronoDuration::hours(3),
                );
                let sync = sync_for(
                    &api,
                    SyncConfig {
                        follow_up_delay: Duration::from_millis(200),
                        ..SyncConfig::default()
                    },
                );

                sync.observe(Some(project_id)).await.unwrap();
                drop(sync);
                tokio::time::sleep(Duration::from_millis(400)).await;

                assert_eq!(api.list_messages(project_id).await.unwrap().len(), 1);
            });
        }
    }

    describe "live updates" {
        it "picks up messages created elsewhere" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                let sync = sync_for(&api, test_config());
                sync.observe(Some(project_id)).await.unwrap();

                api.create_message(project_id, &CreateMessageInput::user("Hello from another tab"))
                    .await
                    .unwrap();

                let view = wait_for(&sync, |v| v.messages.len() == 1).await;
                assert_eq!(view.messages[0].content, "Hello from another tab");
            });
        }

        it "tracks the latest task status message" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                let sync = sync_for(&api, test_config());
                sync.observe(Some(project_id)).await.unwrap();

                api.create_message(
                    project_id,
                    &CreateMessageInput::assistant(
                        "Drafting the launch email",
                        Some(MessageMetadata::TaskStatus { status: "running".into() }),
                    ),
                )
                .await
                .unwrap();

                let view = wait_for(&sync, |v| v.active_task_message.is_some()).await;
                assert_eq!(view.active_task_message.as_deref(), Some("Drafting the launch email"));
                assert_eq!(view.messages.len(), 1);
            });
        }

        it "refetches logs when a log is created" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                let sync = sync_for(&api, test_config());
                sync.observe(Some(project_id)).await.unwrap();

                api.create_log(project_id, &CreateLogInput::execution("Published tweet", None))
                    .await
                    .unwrap();

                let view = wait_for(&sync, |v| v.logs.len() == 1).await;
                assert_eq!(view.logs[0].log_type, "execution");
            });
        }

        it "reloads everything after falling behind the bus" {
            tokio_test::block_on(async {
                let (seeded, project_id) = setup();
                let api = LocalApi::new(seeded.db().clone(), NotificationBus::with_capacity(1, 16));
                let sync = sync_for(&api, test_config());
                sync.observe(Some(project_id)).await.unwrap();
                settle().await;

                // Rows written without notifications are only found by a reload.
                api.db()
                    .create_message(project_id, CreateMessageInput::user("Written offline"))
                    .unwrap();
                api.db()
                    .create_log(project_id, CreateLogInput::execution("Imported", None))
                    .unwrap();
                let project = api.db().get_project(project_id).unwrap().unwrap();
                for _ in 0..2 {
                    api.bus().publish(Notification::project_created(project.clone())).await;
                }

                let view = wait_for(&sync, |v| v.messages.len() == 1 && v.logs.len() == 1).await;
                assert_eq!(view.messages[0].content, "Written offline");
                assert_eq!(view.logs[0].title, "Imported");
            });
        }

        it "ignores other projects" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                let other = api
                    .db()
                    .create_project(CreateProjectInput {
                        name: "Other".into(),
                        prompt: String::new(),
                        user_id: 1,
                    })
                    .unwrap();
                let sync = sync_for(&api, test_config());
                sync.observe(Some(project_id)).await.unwrap();

                api.create_message(other.id, &CreateMessageInput::user("Not for you"))
                    .await
                    .unwrap();
                settle().await;

                assert!(sync.view().messages.is_empty());
            });
        }
    }

    describe "writes" {
        it "adds user and assistant messages and execution logs" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                let sync = sync_for(&api, test_config());
                sync.observe(Some(project_id)).await.unwrap();

                let message = sync.add_user_message("Ship it").await.unwrap().unwrap();
                assert_eq!(message.sender, Sender::User);
                sync.add_assistant_message("Shipping now", None).await.unwrap();
                let log = sync
                    .add_execution_log("Deploy", Some("v1.2".into()))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(log.details.as_deref(), Some("v1.2"));

                let view = sync.view();
                assert_eq!(view.messages.len(), 2);
                assert_eq!(view.logs.len(), 1);
            });
        }

        it "keeps existing messages visible while a write overlaps its echo" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                insert_aged(&api, project_id, CreateMessageInput::user("First"), ChronoDuration::minutes(5));
                let slow = SlowApi { inner: api.clone(), delay: Duration::from_millis(50) };
                let sync = ProjectSync::new(Arc::new(slow), api.bus().clone(), test_config());
                sync.observe(Some(project_id)).await.unwrap();
                assert_eq!(sync.view().messages.len(), 1);

                let fewest = Arc::new(AtomicUsize::new(usize::MAX));
                let mut views = sync.watch();
                let watcher = {
                    let fewest = Arc::clone(&fewest);
                    tokio::spawn(async move {
                        while views.changed().await.is_ok() {
                            let count = views.borrow_and_update().messages.len();
                            fewest.fetch_min(count, Ordering::SeqCst);
                        }
                    })
                };

                sync.add_user_message("New one").await.unwrap();
                assert_eq!(sync.view().messages.len(), 2);
                assert!(!sync.view().loading);

                settle().await;
                watcher.abort();
                assert_eq!(sync.view().messages.len(), 2);
                assert!(fewest.load(Ordering::SeqCst) >= 1);
            });
        }

        it "is a no-op without an observed project" {
            tokio_test::block_on(async {
                let (api, project_id) = setup();
                let sync = sync_for(&api, test_config());
                sync.observe(None).await.unwrap();

                assert!(sync.add_user_message("Hello?").await.unwrap().is_none());
                assert!(sync.add_execution_log("Nothing", None).await.unwrap().is_none());
                assert!(api.list_messages(project_id).await.unwrap().is_empty());
                assert_eq!(sync.view(), ProjectView::default());
            });
        }

        it "reports send failures without retrying" {
            tokio_test::block_on(async {
                let sync = ProjectSync::new(Arc::new(OfflineApi), NotificationBus::new(), test_config());
                let mut notices = sync.notices();
                sync.observe(Some(7)).await.unwrap();

                let result = sync.add_user_message("Anyone there?").await;
                assert!(matches!(result, Err(SyncError::SendFailure(_))));

                let notice = notices.recv().await.unwrap();
                assert_eq!(notice.level, NoticeLevel::Error);
                assert!(sync.view().messages.is_empty());
            });
        }
    }
}
