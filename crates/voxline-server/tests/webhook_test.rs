use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use futures_util::stream;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use voxline_chat::{ChatError, ChatService, EventStream, StreamEvent};
use voxline_server::config::{apply_overrides, Config};
use voxline_server::middleware::{SignatureVerifier, SIGNATURE_HEADER};
use voxline_server::{app, AppState};
use voxline_types::{ChatReply, ChatRequest, ChatTarget, GatherPolicy, ModelId, TextFragment};

const APOLOGY: &str = "Sorry, I could not come up with an answer just now. Please try again.";

/// Answers every message with the same text and records what it was sent.
struct FixedReply {
    text: &'static str,
    seen: Mutex<Vec<ChatRequest>>,
}

impl FixedReply {
    fn new(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatService for FixedReply {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(ChatReply::new(self.text))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream, ChatError> {
        self.seen.lock().unwrap().push(request.clone());
        let (head, tail) = self.text.split_at(self.text.len() / 2);
        let events = vec![
            Ok(StreamEvent::Fragment(TextFragment(head.to_string()))),
            Ok(StreamEvent::Fragment(TextFragment(tail.to_string()))),
            Ok(StreamEvent::End),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// Fails every request the way an unreachable service would.
struct Unavailable;

#[async_trait]
impl ChatService for Unavailable {
    async fn chat(&self, _: &ChatRequest) -> Result<ChatReply, ChatError> {
        Err(ChatError::Status {
            status: 503,
            body: "upstream unavailable".to_string(),
        })
    }

    async fn chat_stream(&self, _: &ChatRequest) -> Result<EventStream, ChatError> {
        let events = vec![Ok(StreamEvent::Fragment(TextFragment("par".to_string())))];
        Ok(Box::pin(stream::iter(events)))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    apply_overrides(&mut config, |key| {
        let value = match key {
            "COHERE_API_KEY" => "co-key",
            "TWILIO_ACCOUNT_SID" => "AC123",
            "TWILIO_AUTH_TOKEN" => "tw-token",
            "TWILIO_PHONE_NUMBER" => "+15550001111",
            "COMPANY_NAME" => "Acme",
            _ => return None,
        };
        Some(value.to_string())
    });
    config.check_server().unwrap();
    config
}

fn setup_app(config: &Config, chat: Arc<dyn ChatService>) -> axum::Router {
    app(AppState::new(config, chat, ChatTarget::ServiceDefault))
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn spoken(xml: &str) -> Vec<String> {
    xml.split("<Say")
        .skip(1)
        .filter_map(|chunk| {
            let start = chunk.find('>')? + 1;
            let end = chunk.find("</Say>")?;
            Some(chunk[start..end].to_string())
        })
        .collect()
}

#[tokio::test]
async fn test_answer_without_body_greets_and_gathers() {
    let app = setup_app(&test_config(), FixedReply::new("4"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/answer")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
    let xml = body_text(response).await;
    assert!(spoken(&xml)[0].starts_with("Welcome to Acme!"), "{}", xml);
    assert!(xml.contains("action=\"/handle-user-input\""), "{}", xml);
    assert!(xml.contains("input=\"speech\""));
    assert!(xml.contains("speechTimeout=\"1\""));
}

#[tokio::test]
async fn test_incoming_call_accepts_provider_fields() {
    let app = setup_app(&test_config(), FixedReply::new("4"));
    let response = app
        .oneshot(form_post(
            "/incoming-call",
            "CallSid=CA123&From=%2B15551234567&To=%2B15550001111&CallStatus=ringing",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_user_input_speaks_exact_reply() {
    let chat = FixedReply::new("4");
    let app = setup_app(&test_config(), chat.clone());

    let response = app
        .oneshot(form_post("/handle-user-input", "transcript=What+is+2%2B2%3F"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_text(response).await;
    assert_eq!(spoken(&xml), vec!["4"]);
    assert!(xml.contains("<Gather"), "speak-and-gather is the default: {}", xml);

    let seen = chat.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].message, "What is 2+2?");
    assert_eq!(seen[0].model, None);
}

#[tokio::test]
async fn test_user_input_reads_speech_result_field() {
    let app = setup_app(&test_config(), FixedReply::new("Paris"));
    let response = app
        .oneshot(form_post(
            "/handle-user-input",
            "CallSid=CA123&SpeechResult=Capital+of+France&Confidence=0.92",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(spoken(&body_text(response).await), vec!["Paris"]);
}

#[tokio::test]
async fn test_missing_transcript_is_bad_request() {
    for body in ["", "CallSid=CA123", "SpeechResult=+++"] {
        let app = setup_app(&test_config(), FixedReply::new("4"));
        let response = app
            .oneshot(form_post("/handle-user-input", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"], "missing field: SpeechResult");
    }
}

#[tokio::test]
async fn test_chat_failure_apologizes_with_ok() {
    let app = setup_app(&test_config(), Arc::new(Unavailable));
    let response = app
        .oneshot(form_post("/handle-user-input", "SpeechResult=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(spoken(&body_text(response).await), vec![APOLOGY]);
}

#[tokio::test]
async fn test_unbuildable_document_is_json_server_error() {
    let mut config = test_config();
    config.call.language = "en US".to_string();
    let app = setup_app(&config, FixedReply::new("4"));

    let response = app.oneshot(form_post("/answer", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(!body.contains("<Response"));
    let json: Value = serde_json::from_str(&body).unwrap();
    let message = json["error"].as_str().unwrap();
    assert!(
        message.starts_with("internal server error: voice document:"),
        "got {:?}",
        message
    );
    assert!(message.contains("en US"), "got {:?}", message);
}

#[tokio::test]
async fn test_truncated_stream_apologizes() {
    let mut config = test_config();
    config.chat.streaming = true;
    let app = setup_app(&config, Arc::new(Unavailable));

    let response = app
        .oneshot(form_post("/handle-user-input", "SpeechResult=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(spoken(&body_text(response).await), vec![APOLOGY]);
}

#[tokio::test]
async fn test_streaming_mode_speaks_whole_reply() {
    let mut config = test_config();
    config.chat.streaming = true;
    let chat = FixedReply::new("The answer is 4.");
    let app = setup_app(&config, chat.clone());

    let response = app
        .oneshot(form_post("/handle-user-input", "SpeechResult=What+is+2%2B2%3F"))
        .await
        .unwrap();

    assert_eq!(spoken(&body_text(response).await), vec!["The answer is 4."]);
    assert!(chat.seen.lock().unwrap()[0].stream);
}

#[tokio::test]
async fn test_speak_only_mode_does_not_gather() {
    let mut config = test_config();
    config.call.gather = GatherPolicy::SpeakOnly;
    let app = setup_app(&config, FixedReply::new("4"));

    let xml = body_text(
        app.oneshot(form_post("/handle-user-input", "SpeechResult=hi"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(spoken(&xml), vec!["4"]);
    assert!(!xml.contains("<Gather"), "{}", xml);
}

#[tokio::test]
async fn test_seed_and_target_model_reach_the_chat_service() {
    let mut config = test_config();
    config.chat.seed_message = Some("You answer questions for Acme. ".to_string());
    let chat = FixedReply::new("ok");
    let target = ChatTarget::FineTuned(ModelId::new("ft-7").unwrap());
    let app = app(AppState::new(&config, chat.clone(), target));

    app.oneshot(form_post("/handle-user-input", "SpeechResult=Opening+hours%3F"))
        .await
        .unwrap();

    let seen = chat.seen.lock().unwrap();
    assert_eq!(seen[0].message, "You answer questions for Acme. Opening hours?");
    assert_eq!(seen[0].model, Some(ModelId::new("ft-7").unwrap()));
}

#[tokio::test]
async fn test_reply_text_is_escaped() {
    let app = setup_app(&test_config(), FixedReply::new("1 < 2 & 3 > 2"));
    let xml = body_text(
        app.oneshot(form_post("/handle-user-input", "SpeechResult=compare"))
            .await
            .unwrap(),
    )
    .await;
    assert!(xml.contains("1 &lt; 2 &amp; 3 &gt; 2"), "{}", xml);
}

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = setup_app(&test_config(), FixedReply::new("4"));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

// --- signature enforcement ---

fn signed_config() -> Config {
    let mut config = test_config();
    config.telephony.validate_signatures = true;
    config.telephony.public_url = "https://voice.example.com".to_string();
    config
}

fn signed_post(uri: &str, params: &[(&str, &str)], signature: Option<String>) -> Request<Body> {
    let body = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v.replace(' ', "+")))
        .collect::<Vec<_>>()
        .join("&");
    let mut request = form_post(uri, &body);
    if let Some(signature) = signature {
        request
            .headers_mut()
            .insert(SIGNATURE_HEADER, signature.parse().unwrap());
    }
    request
}

fn owned(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_valid_signature_is_accepted() {
    let verifier = SignatureVerifier::new("tw-token", "https://voice.example.com");
    let params = [("CallSid", "CA123"), ("SpeechResult", "hello there")];
    let signature = verifier.sign(
        "https://voice.example.com/handle-user-input",
        &owned(&params),
    )
    .unwrap();

    let app = setup_app(&signed_config(), FixedReply::new("hi"));
    let response = app
        .oneshot(signed_post("/handle-user-input", &params, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(spoken(&body_text(response).await), vec!["hi"]);
}

#[tokio::test]
async fn test_missing_or_wrong_signature_is_forbidden() {
    let verifier = SignatureVerifier::new("wrong-token", "https://voice.example.com");
    let params = [("SpeechResult", "hello")];
    let forged = verifier.sign(
        "https://voice.example.com/handle-user-input",
        &owned(&params),
    )
    .unwrap();

    for signature in [None, Some(forged)] {
        let app = setup_app(&signed_config(), FixedReply::new("hi"));
        let response = app
            .oneshot(signed_post("/handle-user-input", &params, signature))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_health_is_not_signed() {
    let app = setup_app(&signed_config(), FixedReply::new("hi"));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
