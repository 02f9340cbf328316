//! Upstream client contract tests against fake HTTP services

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use maitre::db::RestStore;
use maitre::services::{
    BreakerConfig, BreakerState, Completer, DeepgramSynthesizer, DeepgramTranscriber,
    GroqCompleter, Synthesizer, Transcriber,
};
use maitre::{ConversationRecord, ConversationStore, Error, Service};

mod common;
use common::{DEEPGRAM_KEY, GROQ_KEY, Upstreams, deepgram_key, groq_key, sample_wav};

#[tokio::test]
async fn transcriber_posts_wav_with_token_auth() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .and(query_param("model", "nova-2"))
        .and(query_param("punctuate", "true"))
        .and(header("authorization", format!("Token {DEEPGRAM_KEY}").as_str()))
        .and(header("content-type", "audio/wav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": { "channels": [{ "alternatives": [{ "transcript": " Menu please. " }] }] }
        })))
        .expect(1)
        .mount(&upstreams.deepgram)
        .await;

    let transcriber = DeepgramTranscriber::new(&upstreams.services_config(), deepgram_key()).unwrap();
    let wav = sample_wav();
    let transcript = transcriber.transcribe(&wav).await.unwrap();

    assert_eq!(transcript, "Menu please.");
    let requests = upstreams.deepgram.received_requests().await.unwrap();
    assert_eq!(requests[0].body, wav);
}

#[tokio::test]
async fn transcriber_reports_missing_transcript_as_empty() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": { "channels": [] } })))
        .mount(&upstreams.deepgram)
        .await;

    let transcriber = DeepgramTranscriber::new(&upstreams.services_config(), deepgram_key()).unwrap();
    let err = transcriber.transcribe(&sample_wav()).await.unwrap_err();

    assert!(matches!(err, Error::EmptyResult(Service::Transcription)));
    assert_eq!(transcriber.breaker_state(), BreakerState::Closed);
}

#[tokio::test]
async fn completer_sends_system_and_user_messages() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", format!("Bearer {GROQ_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "We open at five." } }]
        })))
        .expect(1)
        .mount(&upstreams.groq)
        .await;

    let completer = GroqCompleter::new(&upstreams.services_config(), groq_key()).unwrap();
    let reply = completer.complete("When do you open?").await.unwrap();
    assert_eq!(reply, "We open at five.");

    let requests = upstreams.groq.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "gemma2-9b-it");
    assert_eq!(body["max_tokens"], 150);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(
        body["messages"][0]["content"],
        maitre::config::DEFAULT_SYSTEM_PROMPT
    );
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "When do you open?");
}

#[tokio::test]
async fn completer_without_content_is_empty_result() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant" } }]
        })))
        .mount(&upstreams.groq)
        .await;

    let completer = GroqCompleter::new(&upstreams.services_config(), groq_key()).unwrap();
    let err = completer.complete("Hello").await.unwrap_err();

    assert!(matches!(err, Error::EmptyResult(Service::Completion)));
}

#[tokio::test]
async fn completion_without_content_never_reaches_synthesis() {
    let upstreams = Upstreams::start().await;
    upstreams.transcript("Book a table for two").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&upstreams.groq)
        .await;
    upstreams.speech(512).await;
    let (orchestrator, repo) = common::orchestrator_with_repo(&upstreams);

    let err = orchestrator
        .process(&maitre::VoiceRequest::from_audio(&sample_wav()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyResult(Service::Completion)));
    let speak_calls = upstreams
        .deepgram
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/v1/speak")
        .count();
    assert_eq!(speak_calls, 0);
    assert_eq!(repo.count().unwrap(), 0);
}

#[tokio::test]
async fn synthesizer_requests_configured_voice() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/speak"))
        .and(query_param("model", "aura-helios-en"))
        .and(header("authorization", format!("Token {DEEPGRAM_KEY}").as_str()))
        .and(body_json(json!({ "text": "Sure, what time?" })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8; 32]))
        .expect(1)
        .mount(&upstreams.deepgram)
        .await;

    let synthesizer = DeepgramSynthesizer::new(&upstreams.services_config(), deepgram_key()).unwrap();
    let audio = synthesizer.synthesize("Sure, what time?").await.unwrap();

    assert_eq!(audio, vec![1_u8; 32]);
}

#[tokio::test]
async fn synthesizer_empty_body_is_empty_result() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/speak"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstreams.deepgram)
        .await;

    let synthesizer = DeepgramSynthesizer::new(&upstreams.services_config(), deepgram_key()).unwrap();
    let err = synthesizer.synthesize("Hi").await.unwrap_err();

    assert!(matches!(err, Error::EmptyResult(Service::Synthesis)));
}

#[tokio::test]
async fn breaker_opens_after_repeated_failures_and_fails_fast() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstreams.deepgram)
        .await;

    let mut config = upstreams.services_config();
    config.breaker = BreakerConfig {
        failure_threshold: 2,
        cooldown: Duration::from_secs(60),
    };
    let transcriber = DeepgramTranscriber::new(&config, deepgram_key()).unwrap();
    let wav = sample_wav();

    for _ in 0..2 {
        let err = transcriber.transcribe(&wav).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { service: Service::Transcription, .. }));
    }
    assert_eq!(transcriber.breaker_state(), BreakerState::Open);

    let err = transcriber.transcribe(&wav).await.unwrap_err();
    assert!(matches!(err, Error::CircuitOpen(Service::Transcription)));

    // The open breaker made no third request
    assert_eq!(upstreams.deepgram.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn cancelled_trial_call_does_not_wedge_the_breaker() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&upstreams.deepgram)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/listen"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({
                    "results": { "channels": [{ "alternatives": [{ "transcript": "Menu please." }] }] }
                })),
        )
        .mount(&upstreams.deepgram)
        .await;

    let mut config = upstreams.services_config();
    config.breaker = BreakerConfig {
        failure_threshold: 1,
        cooldown: Duration::from_millis(50),
    };
    let transcriber = DeepgramTranscriber::new(&config, deepgram_key()).unwrap();
    let wav = sample_wav();

    assert!(transcriber.transcribe(&wav).await.is_err());
    assert_eq!(transcriber.breaker_state(), BreakerState::Open);

    // The trial call is abandoned mid-flight
    tokio::time::sleep(Duration::from_millis(100)).await;
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), transcriber.transcribe(&wav)).await;
    assert!(abandoned.is_err());

    // The next caller becomes the trial and closes the breaker
    let transcript = transcriber.transcribe(&wav).await.unwrap();
    assert_eq!(transcript, "Menu please.");
    assert_eq!(transcriber.breaker_state(), BreakerState::Closed);
}

#[tokio::test]
async fn upstream_error_body_is_not_exposed() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key gq-test-key"))
        .mount(&upstreams.groq)
        .await;

    let completer = GroqCompleter::new(&upstreams.services_config(), groq_key()).unwrap();
    let err = completer.complete("Hello").await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("401"), "{message}");
    assert!(!message.contains("invalid api key"), "{message}");
}

#[tokio::test]
async fn rest_store_inserts_with_service_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/conversations"))
        .and(header("apikey", "service-role"))
        .and(header("authorization", "Bearer service-role"))
        .and(header("prefer", "return=minimal"))
        .and(body_json(json!([
            { "user_input": "Book a table for two", "ai_response": "Sure, what time?" }
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let url = url::Url::parse(&server.uri()).unwrap();
    let store = RestStore::new(
        &url,
        secrecy::SecretString::from("service-role".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    store
        .append(&ConversationRecord {
            user_input: "Book a table for two".to_string(),
            ai_response: "Sure, what time?".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(store.backend(), "rest");
}

#[tokio::test]
async fn rest_store_rejection_is_persistence_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let url = url::Url::parse(&server.uri()).unwrap();
    let store = RestStore::new(
        &url,
        secrecy::SecretString::from("wrong".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let err = store
        .append(&ConversationRecord {
            user_input: "Hi".to_string(),
            ai_response: "Hello!".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
    assert!(matches!(store.probe().await, Err(Error::Persistence(_))));
}
