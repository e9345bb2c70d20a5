use futures::StreamExt;

use threadline_llm::{
    Fragment, OpenAIConfig, OpenAIProducer, ProducerContext, ProducerError, ResponseProducer,
};
use threadline_types::{Message, TokenUsage};

fn context() -> ProducerContext {
    ProducerContext::new(
        "t1",
        "u1",
        "gpt-4o-mini",
        vec![Message::user("t1", "u1", "Say hi")],
    )
}

fn producer(server: &mockito::ServerGuard) -> OpenAIProducer {
    OpenAIProducer::new(OpenAIConfig::new("sk-test").with_base_url(format!("{}/", server.url())))
        .unwrap()
}

#[tokio::test]
async fn test_generate_reads_content_and_usage() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
            }"#,
        )
        .create_async()
        .await;

    let output = producer(&server).generate(context()).await.unwrap();

    assert_eq!(output.content, "Hi!");
    assert_eq!(output.usage, Some(TokenUsage::new(9, 2)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_becomes_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("rate limited")
        .create_async()
        .await;

    let err = producer(&server).generate(context()).await.unwrap_err();

    match err {
        ProducerError::Api { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "rate limited");
        }
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_yields_content_then_usage() {
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2,\"total_tokens\":11}}\n\n",
        "data: [DONE]\n\n",
    );

    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"stream": true, "stream_options": {"include_usage": true}}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let producer = producer(&server);
    assert!(producer.supports_streaming());

    let fragments: Vec<Fragment> = producer
        .generate_stream(context())
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec![
            Fragment::Content("Hel".into()),
            Fragment::Content("lo".into()),
            Fragment::Usage(TokenUsage::new(9, 2)),
        ]
    );
}

#[tokio::test]
async fn test_streaming_disabled_is_declared_up_front() {
    let producer =
        OpenAIProducer::new(OpenAIConfig::new("sk-test").with_streaming(false)).unwrap();

    assert!(!producer.supports_streaming());
    assert!(matches!(
        producer.generate_stream(context()).await,
        Err(ProducerError::StreamingUnsupported)
    ));
}
