use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use devai_core::ChatError;
use devai_core::answer::AnswerService;
use devai_interaction::WebhookAnswerService;
use serde_json::{Value, json};
use std::time::Duration;

/// Serves `app` on an ephemeral port and returns its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn echoes_question_from_output_field() {
    let app = Router::new().route(
        "/hook",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "output": format!("you asked: {}", body["question"].as_str().unwrap_or("")),
                "chat": body["chatId"],
            }))
        }),
    );
    let base = serve(app).await;

    let service = WebhookAnswerService::new(format!("{base}/hook"));
    let answer = service.ask("  where is gudang A?  ", Some("s-1")).await.unwrap();
    assert_eq!(answer, "you asked: where is gudang A?");
}

#[tokio::test]
async fn plain_text_body_is_returned_verbatim() {
    let app = Router::new().route("/hook", post(|| async { "1. Foo\n2. Bar" }));
    let base = serve(app).await;

    let answer = WebhookAnswerService::new(format!("{base}/hook"))
        .ask("list", None)
        .await
        .unwrap();
    assert_eq!(answer, "1. Foo\n2. Bar");
}

#[tokio::test]
async fn non_success_status_is_upstream_error() {
    let app = Router::new().route(
        "/hook",
        post(|| async { (StatusCode::BAD_GATEWAY, "workflow crashed") }),
    );
    let base = serve(app).await;

    let err = WebhookAnswerService::new(format!("{base}/hook"))
        .ask("anything", None)
        .await
        .unwrap_err();
    match err {
        ChatError::Upstream { status, message } => {
            assert_eq!(status, Some(502));
            assert!(message.contains("workflow crashed"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_question_never_reaches_the_network() {
    let service = WebhookAnswerService::new("http://127.0.0.1:9/unreachable");
    let err = service.ask("   ", None).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn unreachable_webhook_is_upstream_error() {
    let service = WebhookAnswerService::new("http://127.0.0.1:9/hook")
        .with_timeout(Some(Duration::from_secs(2)));
    let err = service.ask("hello", None).await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.is_user_visible());
}
