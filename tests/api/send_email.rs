use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use natecon_mailer::domain::EmailType;
use natecon_mailer::rate_limit::SendLog;
use natecon_mailer::rate_limit::SendRecord;
use serde_json::json;
use serde_json::Value;
use uuid::Uuid;
use wiremock::matchers::any;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::assert_cors;
use crate::helpers::mint_token;
use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with_send_log;
use crate::helpers::TestApp;
use crate::helpers::JWT_SECRET;

/// Provider accepts everything, `n` times exactly
async fn provider_accepts(
    app: &TestApp,
    n: u64,
) {
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "re_123"})))
        .expect(n)
        .mount(&app.email_server)
        .await;
}

async fn provider_never_called(app: &TestApp) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;
}

async fn error_of(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn welcome_is_sent_and_recorded() {
    let app = spawn_app().await;
    provider_accepts(&app, 1).await;
    let user = Uuid::new_v4();

    let resp = app
        .post_send_email(
            Some(&app.token_for(user)),
            &json!({"type": "welcome", "to": "jo@foo.com", "data": {"name": "Jo"}}),
        )
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    assert_cors(&resp);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"success": true, "data": {"id": "re_123"}}));

    assert_eq!(app.sent_count(user, EmailType::Welcome).await, 1);
}

#[tokio::test]
async fn provider_receives_rendered_email() {
    let app = spawn_app().await;
    provider_accepts(&app, 1).await;

    app.post_send_email(
        Some(&app.token_for(Uuid::new_v4())),
        &json!({
            "type": "talk_accepted",
            "to": "jo@foo.com",
            "data": {"name": "O'Brien & Co", "talkTitle": "<script>alert(1)</script>"},
        }),
    )
    .await;

    let reqs = app.email_server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&reqs[0].body).unwrap();
    assert_eq!(sent["to"], json!(["jo@foo.com"]));
    assert_eq!(
        sent["subject"],
        "🎉 Your NateCon 2026 Talk Proposal Was Accepted!"
    );
    assert!(sent.get("reply_to").is_none());

    let html = sent["html"].as_str().unwrap();
    assert!(html.contains("O&#039;Brien &amp; Co"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!html.contains("<script>"));
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let app = spawn_app().await;
    provider_never_called(&app).await;
    let user = Uuid::new_v4();
    let body = json!({"type": "welcome", "to": "jo@foo.com"});

    let expired = mint_token(user, JWT_SECRET, Utc::now().timestamp() - 3600);
    let forged = mint_token(user, "not-the-secret-not-the-secret-not-the-secret", Utc::now().timestamp() + 3600);

    for (token, msg) in [
        (None, "no token"),
        (Some("garbage"), "malformed token"),
        (Some(expired.as_str()), "expired token"),
        (Some(forged.as_str()), "wrong signature"),
    ] {
        let resp = app.post_send_email(token, &body).await;
        assert_eq!(resp.status().as_u16(), 401, "{msg}");
        assert_cors(&resp);
        assert!(error_of(resp).await.starts_with("Unauthorized"), "{msg}");
    }

    assert_eq!(app.sent_count(user, EmailType::Welcome).await, 0);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = spawn_app().await;
    provider_never_called(&app).await;
    let token = app.token_for(Uuid::new_v4());

    for (body, expected) in [
        (
            json!({"to": "jo@foo.com"}),
            "Missing required fields: type and to",
        ),
        (
            json!({"type": "welcome"}),
            "Missing required fields: type and to",
        ),
        (
            json!({"type": "", "to": "jo@foo.com"}),
            "Missing required fields: type and to",
        ),
        (
            json!({"type": "newsletter", "to": "jo@foo.com"}),
            "Unknown email type: newsletter",
        ),
    ] {
        let resp = app.post_send_email(Some(&token), &body).await;
        assert_eq!(resp.status().as_u16(), 400, "{body}");
        assert_cors(&resp);
        assert_eq!(error_of(resp).await, expected);
    }

    let resp = app
        .post_send_email(Some(&token), &json!({"type": "welcome", "to": "not-an-email"}))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn malformed_json_gets_envelope() {
    let app = spawn_app().await;
    provider_never_called(&app).await;

    let resp = app
        .api_client
        .post(format!("{}/send-email", app.addr))
        .bearer_auth(app.token_for(Uuid::new_v4()))
        .header("Content-Type", "application/json")
        .body("{\"type\": \"welcome\",")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    assert_cors(&resp);
    error_of(resp).await;
}

#[tokio::test]
async fn third_welcome_within_an_hour_is_rate_limited() {
    let app = spawn_app().await;
    provider_accepts(&app, 4).await;
    let user = Uuid::new_v4();
    let token = app.token_for(user);
    let body = json!({"type": "welcome", "to": "jo@foo.com"});

    for _ in 0..2 {
        let resp = app.post_send_email(Some(&token), &body).await;
        assert_eq!(resp.status().as_u16(), 200);
    }

    for _ in 0..3 {
        let resp = app.post_send_email(Some(&token), &body).await;
        assert_eq!(resp.status().as_u16(), 429);
        assert_cors(&resp);
        assert_eq!(
            error_of(resp).await,
            "Rate limit exceeded: Maximum 2 welcome emails per hour"
        );
    }

    assert_eq!(app.sent_count(user, EmailType::Welcome).await, 2);

    // other users and other types are unaffected
    let resp = app
        .post_send_email(Some(&app.token_for(Uuid::new_v4())), &body)
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app
        .post_send_email(
            Some(&token),
            &json!({"type": "registration_open", "to": "jo@foo.com"}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(app.sent_count(user, EmailType::RegistrationOpen).await, 1);
}

#[tokio::test]
async fn other_types_have_their_own_budget() {
    let app = spawn_app().await;
    provider_accepts(&app, 3).await;
    let user = Uuid::new_v4();
    let token = app.token_for(user);

    for _ in 0..2 {
        app.post_send_email(Some(&token), &json!({"type": "welcome", "to": "jo@foo.com"}))
            .await;
    }
    let resp = app
        .post_send_email(
            Some(&token),
            &json!({"type": "team_joined", "to": "jo@foo.com", "data": {"teamName": "Crabs"}}),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(app.sent_count(user, EmailType::TeamJoined).await, 1);
}

#[tokio::test]
async fn failed_delivery_is_not_counted() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Invalid `to` field"})),
        )
        .expect(1)
        .mount(&app.email_server)
        .await;
    let user = Uuid::new_v4();

    let resp = app
        .post_send_email(
            Some(&app.token_for(user)),
            &json!({"type": "welcome", "to": "jo@foo.com"}),
        )
        .await;

    assert_eq!(resp.status().as_u16(), 500);
    assert_cors(&resp);
    assert_eq!(error_of(resp).await, "Invalid `to` field");
    assert_eq!(app.sent_count(user, EmailType::Welcome).await, 0);
}

#[tokio::test]
async fn preflight_needs_no_token() {
    let app = spawn_app().await;
    provider_never_called(&app).await;

    let resp = app.preflight("/send-email").await;

    assert_eq!(resp.status().as_u16(), 200);
    assert_cors(&resp);
    assert_eq!(resp.text().await.unwrap(), "");
}

/// Every query fails
struct UnreachableSendLog;

#[async_trait::async_trait]
impl SendLog for UnreachableSendLog {
    async fn count_since(
        &self,
        _user_id: Uuid,
        _email_type: EmailType,
        _since: DateTime<Utc>,
    ) -> Result<i64, anyhow::Error> {
        Err(anyhow::anyhow!("connection refused"))
    }

    async fn insert(
        &self,
        _record: &SendRecord,
    ) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

#[tokio::test]
async fn send_log_outage_does_not_block_email() {
    let app = spawn_app_with_send_log(Arc::new(UnreachableSendLog)).await;
    provider_accepts(&app, 3).await;
    let token = app.token_for(Uuid::new_v4());

    // above the hourly ceiling, but nothing can be counted
    for _ in 0..3 {
        let resp = app
            .post_send_email(Some(&token), &json!({"type": "welcome", "to": "jo@foo.com"}))
            .await;
        assert_eq!(resp.status().as_u16(), 200);
    }
}
