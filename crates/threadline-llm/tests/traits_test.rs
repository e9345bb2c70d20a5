use async_trait::async_trait;
use futures::StreamExt;
use threadline_llm::{
    Fragment, FragmentStream, ProducerContext, ProducerError, ProducerOutput, ResponseProducer,
};
use threadline_types::{Message, TokenUsage};

struct BatchOnly;

#[async_trait]
impl ResponseProducer for BatchOnly {
    async fn generate(&self, context: ProducerContext) -> Result<ProducerOutput, ProducerError> {
        Ok(ProducerOutput::text(format!("{} messages", context.messages.len())))
    }
}

struct Scripted(Vec<Fragment>);

#[async_trait]
impl ResponseProducer for Scripted {
    fn supports_streaming(&self) -> bool {
        true
    }

    async fn generate(&self, _context: ProducerContext) -> Result<ProducerOutput, ProducerError> {
        Ok(ProducerOutput::default())
    }

    async fn generate_stream(
        &self,
        _context: ProducerContext,
    ) -> Result<FragmentStream, ProducerError> {
        let fragments: Vec<Result<Fragment, ProducerError>> =
            self.0.clone().into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

fn context() -> ProducerContext {
    ProducerContext::new("t1", "u1", "gpt-4", vec![Message::user("t1", "u1", "Hi")])
}

#[tokio::test]
async fn test_batch_producer_declares_no_streaming() {
    let producer = BatchOnly;
    assert!(!producer.supports_streaming());

    let output = producer.generate(context()).await.unwrap();
    assert_eq!(output.content, "1 messages");

    match producer.generate_stream(context()).await {
        Err(ProducerError::StreamingUnsupported) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("batch producer must not stream"),
    }
}

#[tokio::test]
async fn test_streaming_producer_through_trait_object() {
    let producer: Box<dyn ResponseProducer> = Box::new(Scripted(vec![
        Fragment::Status("thinking".into()),
        Fragment::Content("Hel".into()),
        Fragment::Content("lo".into()),
        Fragment::Usage(TokenUsage::new(9, 2)),
    ]));
    assert!(producer.supports_streaming());

    let fragments: Vec<Fragment> = producer
        .generate_stream(context())
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;

    let text: String = fragments
        .iter()
        .filter_map(|f| match f {
            Fragment::Content(c) => Some(c.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello");
    assert_eq!(fragments.last(), Some(&Fragment::Usage(TokenUsage::new(9, 2))));
}

#[test]
fn test_producer_output_builders() {
    let output = ProducerOutput::text("answer")
        .with_usage(TokenUsage::new(10, 5))
        .with_followup_questions(vec!["Why?".into()])
        .with_memory_update("user asked a question");

    assert_eq!(output.usage.unwrap().total_tokens, 15);
    assert_eq!(output.followup_questions, vec!["Why?".to_string()]);
    assert_eq!(output.memory_update.as_deref(), Some("user asked a question"));
}

#[test]
fn test_context_completion_limit() {
    let ctx = context().with_max_completion_tokens(Some(256));
    assert_eq!(ctx.max_completion_tokens, Some(256));
    assert_eq!(ctx.model, "gpt-4");
}
