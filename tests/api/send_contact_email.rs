use serde_json::json;
use serde_json::Value;
use wiremock::matchers::any;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::assert_cors;
use crate::helpers::spawn_app;
use crate::helpers::CONTACT_EMAIL;

#[tokio::test]
async fn contact_message_is_relayed_to_organisers() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "re_456"})))
        .expect(1)
        .mount(&app.email_server)
        .await;

    // no bearer token
    let resp = app
        .post_contact(&json!({
            "name": "Jo <b>",
            "email": "jo@foo.com",
            "message": "Is there parking?",
        }))
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    assert_cors(&resp);

    let reqs = app.email_server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&reqs[0].body).unwrap();
    assert_eq!(sent["to"], json!([CONTACT_EMAIL]));
    assert_eq!(sent["reply_to"], "jo@foo.com");
    assert_eq!(sent["subject"], "NateCon Contact Form: Message from Jo &lt;b&gt;");
    assert!(sent["html"].as_str().unwrap().contains("Is there parking?"));
}

#[tokio::test]
async fn incomplete_contact_form_is_rejected() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for body in [
        json!({"email": "jo@foo.com", "message": "hi"}),
        json!({"name": "Jo", "message": "hi"}),
        json!({"name": "Jo", "email": "jo@foo.com", "message": "   "}),
    ] {
        let resp = app.post_contact(&body).await;
        assert_eq!(resp.status().as_u16(), 400, "{body}");
        let resp: Value = resp.json().await.unwrap();
        assert_eq!(
            resp["error"],
            "Missing required fields: name, email, and message"
        );
    }

    let resp = app
        .post_contact(&json!({"name": "Jo", "email": "jo-at-foo", "message": "hi"}))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn contact_preflight() {
    let app = spawn_app().await;
    let resp = app.preflight("/send-contact-email").await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_cors(&resp);
}
