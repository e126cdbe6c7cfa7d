use futures::StreamExt;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use crate::state::test_helpers::{spawn_app, student, t0, test_app_state};

async fn next_text<S>(stream: &mut S) -> String
where
    S: futures::Stream<Item = Result<tokio_tungstenite::tungstenite::Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let msg = timeout(Duration::from_millis(500), stream.next())
        .await
        .expect("feed receive timed out")
        .expect("feed closed unexpectedly")
        .expect("feed error");
    msg.to_text().expect("text frame").to_owned()
}

async fn login(addr: std::net::SocketAddr) -> String {
    let body: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/staff/login"))
        .json(&serde_json::json!({ "password": "Bootstrap#2026" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["token"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn feed_forwards_store_events() {
    let state = test_app_state();
    let addr = spawn_app(state.clone()).await;
    let token = login(addr).await;

    let mut request = format!("ws://{addr}/api/staff/feed").into_client_request().unwrap();
    request.headers_mut().insert("authorization", format!("Bearer {token}").parse().unwrap());
    let (mut stream, _) = connect_async(request).await.unwrap();

    assert_eq!(next_text(&mut stream).await, r#"{"event":"connected"}"#);

    state.store.upsert_student(&student("A1", "Ada", t0())).await.unwrap();
    assert_eq!(next_text(&mut stream).await, r#"{"event":"students_changed"}"#);

    state.store.clear_attendance().await.unwrap();
    assert_eq!(next_text(&mut stream).await, r#"{"event":"attendance_changed"}"#);
}

#[tokio::test]
async fn feed_requires_a_session() {
    let addr = spawn_app(test_app_state()).await;
    let err = connect_async(format!("ws://{addr}/api/staff/feed")).await.unwrap_err();
    let tokio_tungstenite::tungstenite::Error::Http(response) = err else {
        panic!("expected http rejection, got {err}");
    };
    assert_eq!(response.status(), 401);
}
