use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use audiopoll_core::{Catalog, FeedbackDraft, ListeningProgress, SubmitMode, UserInfo};
use audiopoll_engine::FeedbackContext;
use audiopoll_relay::{
    build_fields, FeedbackRelay, FeedbackSubmitter, FieldOptions, HttpRelay, RelayError,
};

type Received = Arc<Mutex<Vec<HashMap<String, String>>>>;

#[derive(Clone)]
struct TestRelayState {
    received: Received,
    status: StatusCode,
}

async fn accept(
    State(state): State<TestRelayState>,
    Form(fields): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let next = fields.get("_next").cloned().unwrap_or_default();
    state.received.lock().unwrap().push(fields);
    (state.status, [(header::LOCATION, next)])
}

/// Starts a relay stand-in on an ephemeral port and returns its URL.
async fn start_relay(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/submit", post(accept))
        .with_state(TestRelayState {
            received: received.clone(),
            status,
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/submit"), received)
}

fn fields_for_jean(rating: u8) -> audiopoll_relay::FieldSet {
    let ctx = FeedbackContext {
        user: UserInfo {
            first_name: "Jean".to_string(),
            last_name: "Dupont".to_string(),
            email: "jean@x.com".to_string(),
        },
        course: Catalog::builtin().get("TC4").unwrap(),
        progress: ListeningProgress {
            cumulative_seconds: 240.0,
            required_seconds: 233,
            threshold_reached: true,
        },
        total_duration_seconds: 932.0,
    };
    let feedback = FeedbackDraft {
        rating,
        comments: "Très clair, merci".to_string(),
        willing_to_pay: None,
        amount: None,
    }
    .validate()
    .unwrap();
    let opts = FieldOptions {
        confirmation_url: "http://localhost/merci".to_string(),
        captcha: false,
    };
    build_fields(&ctx, &feedback, &opts, chrono::Utc::now())
}

#[tokio::test]
async fn posts_form_fields_and_accepts_redirect() {
    let (endpoint, received) = start_relay(StatusCode::FOUND).await;
    let relay = HttpRelay::new(&endpoint, Duration::from_secs(5)).unwrap();

    relay.deliver(&fields_for_jean(5)).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let form = &received[0];
    assert_eq!(form.get("prénom").map(String::as_str), Some("Jean"));
    assert_eq!(form.get("nom").map(String::as_str), Some("Dupont"));
    assert_eq!(form.get("email").map(String::as_str), Some("jean@x.com"));
    assert_eq!(form.get("cours_selectionne").map(String::as_str), Some("TC4"));
    assert_eq!(form.get("note_satisfaction").map(String::as_str), Some("5"));
    assert_eq!(form.get("temps_ecoute").map(String::as_str), Some("04:00"));
}

#[tokio::test]
async fn await_ack_navigates_after_delivery() {
    let (endpoint, received) = start_relay(StatusCode::OK).await;
    let relay = Arc::new(HttpRelay::new(&endpoint, Duration::from_secs(5)).unwrap());
    let mut submitter = FeedbackSubmitter::new(
        relay,
        SubmitMode::AwaitAck,
        "http://localhost/merci".to_string(),
    );

    let redirect = submitter.submit(fields_for_jean(3)).await.unwrap();
    assert_eq!(redirect.destination, "http://localhost/merci");
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn await_ack_keeps_user_on_form_when_relay_fails() {
    let (endpoint, received) = start_relay(StatusCode::INTERNAL_SERVER_ERROR).await;
    let relay = Arc::new(HttpRelay::new(&endpoint, Duration::from_secs(5)).unwrap());
    let mut submitter = FeedbackSubmitter::new(
        relay,
        SubmitMode::AwaitAck,
        "http://localhost/merci".to_string(),
    );

    let err = submitter.submit(fields_for_jean(2)).await.unwrap_err();
    assert!(matches!(err, RelayError::Status(500)));

    // resubmission goes through the same path
    let err = submitter.submit(fields_for_jean(2)).await.unwrap_err();
    assert!(matches!(err, RelayError::Status(500)));
    assert_eq!(received.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_relay_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let relay = HttpRelay::new(&format!("http://{addr}/"), Duration::from_secs(2)).unwrap();
    let err = relay.deliver(&fields_for_jean(4)).await.unwrap_err();
    assert!(matches!(err, RelayError::Request(_)));
}

#[tokio::test]
async fn fire_and_forget_delivery_completes_when_drained() {
    let (endpoint, received) = start_relay(StatusCode::FOUND).await;
    let relay = Arc::new(HttpRelay::new(&endpoint, Duration::from_secs(5)).unwrap());
    let mut submitter = FeedbackSubmitter::new(
        relay,
        SubmitMode::FireAndForget,
        "http://localhost/merci".to_string(),
    );

    let redirect = submitter.submit(fields_for_jean(4)).await.unwrap();
    assert_eq!(redirect.destination, "http://localhost/merci");

    // what the binary does right before exiting
    assert_eq!(submitter.drain(Duration::from_secs(5)).await, 0);
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].get("note_satisfaction").map(String::as_str),
        Some("4")
    );
}
