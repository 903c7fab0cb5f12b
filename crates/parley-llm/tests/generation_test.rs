use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use parley_llm::{ChatProvider, ChatRequest, GenerationClient, TextStream, TurnRole};
use parley_types::{FragmentKind, Message, StreamFragment};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum Script {
    Chunks(Vec<Result<String, String>>),
    StartError(String),
}

/// Provider that replays a fixed script and records what it was asked
struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedProvider {
    fn chunks(chunks: Vec<Result<&str, &str>>) -> Arc<Self> {
        let chunks = chunks
            .into_iter()
            .map(|c| c.map(str::to_string).map_err(str::to_string))
            .collect();
        Arc::new(Self {
            script: Script::Chunks(chunks),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::StartError(detail.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);

        match &self.script {
            Script::StartError(detail) => anyhow::bail!("{}", detail),
            Script::Chunks(chunks) => {
                let items: Vec<Result<String>> = chunks
                    .iter()
                    .map(|c| c.clone().map_err(|e| anyhow::anyhow!(e)))
                    .collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

async fn collect(client: &GenerationClient, message: &str, history: &[Message]) -> Vec<StreamFragment> {
    client
        .stream_reply(message, history, "t1", "s1")
        .collect()
        .await
}

#[tokio::test]
async fn test_code_reply_flags_every_fragment() {
    let provider = ScriptedProvider::chunks(vec![
        Ok("```python\n"),
        Ok("def add(a,b): return a+b\n"),
        Ok("```"),
    ]);
    let client = GenerationClient::new(provider);

    let fragments = collect(&client, "Write a function that adds two numbers", &[]).await;

    assert_eq!(fragments.len(), 4);
    for delta in &fragments[..3] {
        assert_eq!(delta.kind, FragmentKind::Delta);
        assert!(delta.has_artifact);
    }
    // The middle chunk has no fence but matches the def signature
    assert_eq!(fragments[1].content, "def add(a,b): return a+b\n");
    assert_eq!(fragments[3].kind, FragmentKind::Completion);
    assert!(fragments[3].has_artifact);
    assert_eq!(fragments[3].content, "");
}

#[tokio::test]
async fn test_plain_reply() {
    let provider = ScriptedProvider::chunks(vec![Ok("Hello"), Ok(""), Ok(" there")]);
    let client = GenerationClient::new(provider);

    let fragments = collect(&client, "hi", &[]).await;

    let texts: Vec<&str> = fragments.iter().filter_map(|f| f.text()).collect();
    assert_eq!(texts, vec!["Hello", " there"]);
    assert_eq!(fragments.len(), 3);
    assert!(!fragments[2].has_artifact);
    assert!(fragments.iter().all(|f| f.thread_id == "t1" && f.session_id == "s1"));
}

#[tokio::test]
async fn test_start_failure_is_single_error() {
    let client = GenerationClient::new(ScriptedProvider::failing("quota exceeded"));

    let fragments = collect(&client, "hi", &[]).await;

    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].kind, FragmentKind::Error);
    assert_eq!(fragments[0].error_message.as_deref(), Some("quota exceeded"));
    assert!(!fragments[0].has_artifact);
}

#[tokio::test]
async fn test_mid_stream_failure_ends_with_error() {
    let provider = ScriptedProvider::chunks(vec![Ok("part"), Err("connection reset"), Ok("never")]);
    let client = GenerationClient::new(provider);

    let fragments = collect(&client, "hi", &[]).await;

    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0].text(), Some("part"));
    assert_eq!(fragments[1].kind, FragmentKind::Error);
    assert_eq!(fragments.iter().filter(|f| f.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_history_and_persona_reach_provider() {
    let provider = ScriptedProvider::chunks(vec![Ok("ok")]);
    let client = GenerationClient::new(provider.clone()).with_system_instruction("be terse");
    let history = vec![
        Message::user("first"),
        Message::assistant("reply"),
        Message::system("internal note"),
    ];

    collect(&client, "second", &history).await;

    let request = provider.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.message, "second");
    assert_eq!(request.system_instruction.as_deref(), Some("be terse"));
    assert_eq!(request.history.len(), 2);
    assert_eq!(request.history[1].role, TurnRole::Model);
    assert_eq!(request.options.top_k, 40);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let provider = ScriptedProvider::chunks(vec![Ok("x")]);
    let client = GenerationClient::new(provider.clone());

    let mut stream = client.stream_reply("hi", &[], "t1", "s1");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

    let first = stream.next().await.unwrap();
    assert_eq!(first.text(), Some("x"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_reply_completes() {
    let client = GenerationClient::new(ScriptedProvider::chunks(vec![]));

    let fragments = collect(&client, "hi", &[]).await;

    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].kind, FragmentKind::Completion);
}
