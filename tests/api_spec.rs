use speculate2::speculate;

speculate! {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use projectdesk::api::{create_router, AppState};
    use projectdesk::db::Database;
    use projectdesk::models::*;
    use projectdesk::notify::NotificationBus;

    fn setup() -> (TestServer, AppState) {
        let db = Database::open_memory().expect("Failed to create test database");
        db.migrate().expect("Failed to migrate");
        let state = AppState::new(db, NotificationBus::new());
        let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
        (server, state)
    }

    async fn create_project(server: &TestServer) -> Project {
        let user: User = server
            .post("/api/v1/users")
            .json(&json!({ "email": "ada@example.com", "display_name": "Ada" }))
            .await
            .json();
        server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Launch", "prompt": "Sell the ebook", "user_id": user.id }))
            .await
            .json()
    }

    describe "health" {
        it "responds ok" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let response = server.get("/health").await;
                response.assert_status_ok();
                response.assert_text("ok");
            });
        }
    }

    describe "projects" {
        it "creates and fetches a project" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;
                assert!(project.active);

                let fetched: Project = server
                    .get(&format!("/api/v1/projects/{}", project.id))
                    .await
                    .json();
                assert_eq!(fetched.name, "Launch");
            });
        }

        it "returns 404 for a missing project" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let response = server.get("/api/v1/projects/999").await;
                response.assert_status(StatusCode::NOT_FOUND);
                let body: Value = response.json();
                assert!(body["error"].as_str().unwrap().contains("not found"));
            });
        }

        it "rejects a project for an unknown user" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let response = server
                    .post("/api/v1/projects")
                    .json(&json!({ "name": "Orphan", "user_id": 42 }))
                    .await;
                response.assert_status(StatusCode::NOT_FOUND);
            });
        }

        it "rejects a blank name" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let response = server
                    .post("/api/v1/users")
                    .json(&json!({ "email": " ", "display_name": "Ada" }))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
            });
        }

        it "deactivates a project" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;

                let updated: Project = server
                    .patch(&format!("/api/v1/projects/{}", project.id))
                    .json(&json!({ "active": false }))
                    .await
                    .json();
                assert!(!updated.active);
            });
        }
    }

    describe "messages" {
        it "stores messages in creation order" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;
                let path = format!("/api/v1/projects/{}/messages", project.id);

                server
                    .post(&path)
                    .json(&json!({ "content": "Hi", "sender": "user" }))
                    .await
                    .assert_status(StatusCode::CREATED);
                server
                    .post(&path)
                    .json(&json!({
                        "content": "Here is the layout",
                        "sender": "assistant",
                        "metadata": { "type": "code_block", "language": "html", "code": "<p>hi</p>" }
                    }))
                    .await
                    .assert_status(StatusCode::CREATED);

                let messages: Vec<Message> = server.get(&path).await.json();
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].sender, Sender::User);
                assert_eq!(
                    messages[1].metadata,
                    Some(MessageMetadata::CodeBlock {
                        language: "html".into(),
                        filename: None,
                        code: "<p>hi</p>".into(),
                    })
                );
            });
        }

        it "publishes a notification for each new message" {
            tokio_test::block_on(async {
                let (server, state) = setup();
                let project = create_project(&server).await;
                let mut subscription = state.bus().subscribe_project(project.id);

                server
                    .post(&format!("/api/v1/projects/{}/messages", project.id))
                    .json(&json!({ "content": "Ready?", "sender": "assistant" }))
                    .await;

                let notification = subscription.try_recv().expect("no notification published");
                assert_eq!(notification.kind.as_str(), "message_created");
                assert!(subscription.try_recv().is_none());
            });
        }

        it "rejects messages for a missing project" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let response = server
                    .post("/api/v1/projects/7/messages")
                    .json(&json!({ "content": "Hello", "sender": "user" }))
                    .await;
                response.assert_status(StatusCode::NOT_FOUND);
            });
        }

        it "rejects empty content" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;
                let response = server
                    .post(&format!("/api/v1/projects/{}/messages", project.id))
                    .json(&json!({ "content": "", "sender": "user" }))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
            });
        }
    }

    describe "logs" {
        it "creates execution logs using the type field" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;
                let path = format!("/api/v1/projects/{}/logs", project.id);

                server
                    .post(&path)
                    .json(&json!({ "type": "execution", "title": "Published post", "details": "id=12" }))
                    .await
                    .assert_status(StatusCode::CREATED);

                let logs: Vec<Value> = server.get(&path).await.json();
                assert_eq!(logs.len(), 1);
                assert_eq!(logs[0]["type"], "execution");
                assert_eq!(logs[0]["title"], "Published post");
            });
        }
    }

    describe "plans" {
        it "builds a feature, milestone and goal tree" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;

                let feature: Feature = server
                    .post(&format!("/api/v1/projects/{}/features", project.id))
                    .json(&json!({ "title": "Newsletter" }))
                    .await
                    .json();
                assert_eq!(feature.status, PlanStatus::Planned);

                let milestone: Milestone = server
                    .post(&format!("/api/v1/features/{}/milestones", feature.id))
                    .json(&json!({ "title": "First issue", "due_date": "2026-12-01" }))
                    .await
                    .json();
                let goal: Goal = server
                    .post(&format!("/api/v1/milestones/{}/goals", milestone.id))
                    .json(&json!({ "title": "100 subscribers" }))
                    .await
                    .json();

                server
                    .patch(&format!("/api/v1/goals/{}", goal.id))
                    .json(&json!({ "status": "done" }))
                    .await
                    .assert_status(StatusCode::NO_CONTENT);

                let goals: Vec<Goal> = server
                    .get(&format!("/api/v1/milestones/{}/goals", milestone.id))
                    .await
                    .json();
                assert_eq!(goals[0].status, PlanStatus::Done);
            });
        }

        it "returns 404 under a missing parent" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                server
                    .post("/api/v1/features/5/milestones")
                    .json(&json!({ "title": "Orphan" }))
                    .await
                    .assert_status(StatusCode::NOT_FOUND);
                server
                    .patch("/api/v1/goals/5")
                    .json(&json!({ "status": "done" }))
                    .await
                    .assert_status(StatusCode::NOT_FOUND);
            });
        }
    }

    describe "tasks and sales" {
        it "queues and advances a generation task" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;

                let task: GenerationTask = server
                    .post(&format!("/api/v1/projects/{}/tasks", project.id))
                    .json(&json!({ "platform": "twitter", "prompt": "Announce launch" }))
                    .await
                    .json();
                assert_eq!(task.status, TaskStatus::Queued);

                let task: GenerationTask = server
                    .patch(&format!("/api/v1/tasks/{}", task.id))
                    .json(&json!({ "status": "running" }))
                    .await
                    .json();
                assert_eq!(task.status, TaskStatus::Running);
            });
        }

        it "rejects a negative sale" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;
                server
                    .post(&format!("/api/v1/projects/{}/sales", project.id))
                    .json(&json!({ "amount_cents": -5, "currency": "usd" }))
                    .await
                    .assert_status(StatusCode::BAD_REQUEST);
            });
        }
    }

    describe "credentials" {
        it "replaces the whole credential set" {
            tokio_test::block_on(async {
                let (server, _) = setup();
                let project = create_project(&server).await;
                let path = format!("/api/v1/projects/{}/credentials", project.id);

                server
                    .put(&path)
                    .json(&json!({ "github": { "token": "ghp_1" }, "openai": { "api_key": "sk-1" } }))
                    .await
                    .assert_status(StatusCode::NO_CONTENT);
                server
                    .put(&path)
                    .json(&json!({ "openai": { "api_key": "sk-2", "model": "gpt-4o" } }))
                    .await
                    .assert_status(StatusCode::NO_CONTENT);

                let set: CredentialSet = server.get(&path).await.json();
                assert_eq!(set.len(), 1);
                assert_eq!(set["openai"]["api_key"], "sk-2");
            });
        }
    }
}
