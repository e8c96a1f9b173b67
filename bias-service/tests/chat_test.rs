mod common;

use bias_service::models::{ChatSession, Role};
use bias_service::services::providers::ProviderError;
use chrono::Utc;
use common::{reply_with_report, TestApp};
use serde_json::json;

const GENDER_REPORT: &str =
    r#"{"bias_detected": true, "reasons": ["gender imbalance"], "fixes": ["balance sampling"]}"#;

#[tokio::test]
async fn biased_turn_returns_preface_and_persists_report() {
    let app = TestApp::new();
    let token = app.token_for("alice");
    app.provider.push_reply(reply_with_report(
        "Yes, the dataset is skewed: 80% of the rows are men.",
        GENDER_REPORT,
    ));

    let response = app
        .chat(&token, "chat-1", "Is this dataset biased toward men?")
        .await;

    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(
        body["reply"],
        "Yes, the dataset is skewed: 80% of the rows are men."
    );
    assert_eq!(
        body["report"],
        json!({
            "bias_detected": true,
            "reasons": ["gender imbalance"],
            "fixes": ["balance sampling"]
        })
    );

    let reports = app.store.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].chat_id, "chat-1");
    assert_eq!(reports[0].user_id, "alice");
    assert_eq!(reports[0].reasons, vec!["gender imbalance"]);
    assert_eq!(body["reportId"], reports[0].id.as_str());
}

#[tokio::test]
async fn unbiased_turn_stores_no_report() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    let response = app.chat(&token, "chat-1", "Hello").await;

    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(body["reply"], "Nothing stands out.");
    assert_eq!(body["report"]["bias_detected"], false);
    assert!(body.get("reportId").is_none());
    assert!(app.store.reports().is_empty());
}

#[tokio::test]
async fn turn_appends_user_then_assistant_with_shared_timestamp() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    app.chat(&token, "chat-1", "first").await;
    let response = app.chat(&token, "chat-1", "second").await;

    let body = response.json();
    let messages = body["updatedChat"]["messages"].as_array().unwrap();
    assert_eq!(body["updatedChat"]["id"], "chat-1");
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"], "second");
    assert_eq!(messages[3]["role"], "assistant");
    assert_eq!(messages[2]["timestamp"], messages[3]["timestamp"]);

    let stored = app.store.chat("chat-1").unwrap();
    assert_eq!(stored.messages.len(), 4);
    assert_eq!(stored.messages[0].role, Role::User);
    assert_eq!(stored.messages[1].role, Role::Assistant);
    assert_eq!(stored.last_message.as_deref(), Some("second"));
    assert_eq!(stored.user_id, "alice");
}

#[tokio::test]
async fn chat_is_written_before_report() {
    let app = TestApp::new();
    let token = app.token_for("alice");
    app.provider
        .push_reply(reply_with_report("Skewed.", GENDER_REPORT));

    app.chat(&token, "chat-1", "check").await;

    assert_eq!(
        app.store.ops(),
        vec!["save_chat:chat-1".to_string(), "insert_report:chat-1".to_string()]
    );
}

#[tokio::test]
async fn malformed_report_block_keeps_raw_reply() {
    let app = TestApp::new();
    let token = app.token_for("alice");
    let raw = reply_with_report("Answer.", r#"{"bias_detected": true"#);
    app.provider.push_reply(raw.clone());

    let response = app.chat(&token, "chat-1", "check").await;

    let body = response.json();
    assert_eq!(body["reply"], raw.as_str());
    assert_eq!(body["report"]["bias_detected"], false);
    assert!(app.store.reports().is_empty());
}

#[tokio::test]
async fn model_failure_degrades_to_fallback_reply_and_still_persists() {
    let app = TestApp::new();
    let token = app.token_for("alice");
    app.provider.push_failure(ProviderError::RateLimited);

    let response = app.chat(&token, "chat-1", "hello").await;

    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(
        body["reply"],
        "I encountered an error while processing your request."
    );
    assert_eq!(
        body["report"],
        json!({ "bias_detected": false, "reasons": [], "fixes": [] })
    );

    let stored = app.store.chat("chat-1").unwrap();
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(
        stored.messages[1].content,
        "I encountered an error while processing your request."
    );
    assert!(app.store.reports().is_empty());
}

#[tokio::test]
async fn attached_file_text_is_sent_to_the_model() {
    let app = TestApp::new();
    let token = app.token_for("alice");
    let url = app.storage.put("alice/data.csv", b"name,gender\nbob,m\n");

    let response = app
        .post_json(
            "/api/chat",
            Some(&token),
            json!({ "chatId": "chat-1", "message": "Check this", "fileUrl": url }),
        )
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(
        app.provider.prompts(),
        vec!["Check this\n\nFile content:\nname,gender\nbob,m\n".to_string()]
    );
}

#[tokio::test]
async fn unreadable_file_sends_placeholder_text() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    for url in [
        "http://files.test/public/alice/missing.csv",
        "https://elsewhere.example/file.csv",
    ] {
        let response = app
            .post_json(
                "/api/chat",
                Some(&token),
                json!({ "chatId": "chat-1", "message": "Check this", "fileUrl": url }),
            )
            .await;
        assert_eq!(response.status, 200);
    }

    for prompt in app.provider.prompts() {
        assert_eq!(prompt, "Check this\n\nFile content:\nError reading file content");
    }
}

#[tokio::test]
async fn turn_on_foreign_chat_is_forbidden_without_writes() {
    let app = TestApp::new();
    app.store
        .put_chat(ChatSession::new("chat-1".into(), "bob".into(), Utc::now()));
    let token = app.token_for("alice");

    let response = app.chat(&token, "chat-1", "hijack").await;

    assert_eq!(response.status, 403);
    assert!(app.store.ops().is_empty());
    assert!(app.provider.prompts().is_empty());
    assert!(app.store.chat("chat-1").unwrap().messages.is_empty());
}

#[tokio::test]
async fn concurrent_turns_on_one_chat_keep_all_messages() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    let turns = (0..8).map(|i| {
        let app = &app;
        let token = token.clone();
        async move { app.chat(&token, "chat-1", &format!("message {}", i)).await }
    });
    let responses = futures::future::join_all(turns).await;

    assert!(responses.iter().all(|r| r.status == 200));
    assert_eq!(app.store.chat("chat-1").unwrap().messages.len(), 16);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    let response = app.chat(&token, "chat-1", "").await;

    assert_eq!(response.status, 400);
    assert!(app.provider.prompts().is_empty());
}

#[tokio::test]
async fn chat_requires_a_bearer_token() {
    let app = TestApp::new();

    let response = app
        .post_json("/api/chat", None, json!({ "chatId": "c", "message": "m" }))
        .await;

    assert_eq!(response.status, 401);
    assert!(app.provider.prompts().is_empty());
}

#[tokio::test]
async fn owner_can_fetch_full_chat() {
    let app = TestApp::new();
    let token = app.token_for("alice");
    app.chat(&token, "chat-1", "hello").await;

    let response = app.get("/api/chat/chat-1", Some(&token)).await;

    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(body["id"], "chat-1");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["lastMessage"], "hello");

    let other = app.token_for("bob");
    assert_eq!(app.get("/api/chat/chat-1", Some(&other)).await.status, 403);
    assert_eq!(app.get("/api/chat/nope", Some(&token)).await.status, 404);
}
