//! Test suites and utilites.

mod chat;
mod ingest;

use super::{
    document::store::FsDocumentStore,
    state::{
        AppProviderState, AppState, DocumentStoreProvider, EmbeddingProvider, LlmProvider,
        VectorDbProvider,
    },
    vector::memory::MemoryVectorDb,
};
use crate::{
    core::{
        chunk::ChunkConfig,
        document::store::DocumentStore,
        embedder::Embedder,
        llm::{GenerationParams, Llm, Message},
        prompt::PromptTemplate,
        provider::ProviderFactory,
        service::RagSettings,
        vector::VectorDb,
    },
    error::MedragError,
    upstream_err,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use testcontainers::{ContainerAsync, GenericImage};

pub type AsyncContainer = ContainerAsync<GenericImage>;

/// Vector size of the [FakeEmbedder] model.
pub const FAKE_EMBEDDING_SIZE: usize = 16;

/// Answer returned by every [FakeLlm] completion.
pub const FAKE_ANSWER: &str = "Acne is a common skin condition.";

/// Holds the downstream providers of medrag services. [TestState::app] creates an
/// [AppState] on top of them, so every test gets an ingestion executor running on its
/// own runtime while sharing the same index.
#[derive(Clone)]
pub struct TestState {
    pub providers: AppProviderState,

    /// Records every conversation sent for completion.
    pub llm: Arc<FakeLlm>,

    pub settings: RagSettings,

    /// Directory of the `fs` document store.
    pub path: String,
}

impl TestState {
    /// Create the document directory at `path` and set up in memory providers.
    pub async fn init(path: &str) -> Self {
        let _ = tokio::fs::remove_dir_all(path).await;
        tokio::fs::create_dir_all(path).await.unwrap();

        let mut vector = VectorDbProvider::default();
        let memory = Arc::new(MemoryVectorDb::new());
        vector.register(memory.id(), memory);

        let mut embedding = EmbeddingProvider::default();
        let embedder = Arc::new(FakeEmbedder);
        embedding.register(embedder.id(), embedder);

        let mut llm_provider = LlmProvider::default();
        let llm = Arc::new(FakeLlm::default());
        llm_provider.register(llm.id(), llm.clone());

        let mut document = DocumentStoreProvider::default();
        let store = Arc::new(FsDocumentStore::new(path));
        document.register(store.id(), store);

        let providers = AppProviderState {
            vector: Arc::new(vector),
            embedding: Arc::new(embedding),
            llm: Arc::new(llm_provider),
            document: Arc::new(document),
        };

        Self {
            providers,
            llm,
            settings: test_settings(),
            path: path.to_string(),
        }
    }

    pub fn app(&self) -> AppState {
        AppState::new_test(
            self.providers.clone(),
            self.settings.clone(),
            PromptTemplate::default(),
        )
    }

    /// Write a document to the store directory.
    pub async fn write_document(&self, name: &str, content: &str) {
        tokio::fs::write(format!("{}/{name}", self.path), content)
            .await
            .unwrap();
    }
}

pub fn test_settings() -> RagSettings {
    RagSettings {
        collection: "medical-chatbot".to_string(),
        vector_provider: "memory".to_string(),
        embedding_provider: FakeEmbedder::ID.to_string(),
        embedding_model: FakeEmbedder::MODEL.to_string(),
        llm_provider: "openai".to_string(),
        document_provider: "fs".to_string(),
        top_k: 3,
        embed_batch_size: 2,
        chunker: ChunkConfig::recursive(120, 10).unwrap(),
        generation: GenerationParams::default(),
    }
}

/// Deterministic bag of words embedder. Texts sharing words point in similar directions
/// and identical texts have a similarity of 1.
#[derive(Debug, Clone, Copy)]
pub struct FakeEmbedder;

impl FakeEmbedder {
    pub const ID: &'static str = "fake";
    pub const MODEL: &'static str = "bag-of-words";

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; FAKE_EMBEDDING_SIZE];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7_usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % FAKE_EMBEDDING_SIZE] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        } else {
            vector[0] = 1.0;
        }

        vector
    }
}

#[async_trait::async_trait]
impl Embedder for FakeEmbedder {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn default_model(&self) -> (String, usize) {
        (Self::MODEL.to_string(), FAKE_EMBEDDING_SIZE)
    }

    async fn list_embedding_models(&self) -> Result<Vec<(String, usize)>, MedragError> {
        Ok(vec![
            (Self::MODEL.to_string(), FAKE_EMBEDDING_SIZE),
            ("bag-of-words-small".to_string(), FAKE_EMBEDDING_SIZE / 2),
        ])
    }

    async fn embed(&self, content: &[&str], model: &str) -> Result<Vec<Vec<f32>>, MedragError> {
        let vectors = content.iter().map(|text| Self::vector(text));

        if model == Self::MODEL {
            return Ok(vectors.collect());
        }

        Ok(vectors
            .map(|mut v| {
                v.truncate(FAKE_EMBEDDING_SIZE / 2);
                v
            })
            .collect())
    }
}

/// [FakeEmbedder] whose `fail_on`th call to `embed` fails, counting from 1.
#[derive(Debug)]
pub struct FlakyEmbedder {
    calls: AtomicUsize,
    fail_on: usize,
}

impl FlakyEmbedder {
    pub const ID: &'static str = "flaky";

    pub fn new(fail_on: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for FlakyEmbedder {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn default_model(&self) -> (String, usize) {
        FakeEmbedder.default_model()
    }

    async fn list_embedding_models(&self) -> Result<Vec<(String, usize)>, MedragError> {
        FakeEmbedder.list_embedding_models().await
    }

    async fn embed(&self, content: &[&str], model: &str) -> Result<Vec<Vec<f32>>, MedragError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return upstream_err!("embedder", 503, "unavailable".to_string());
        }
        FakeEmbedder.embed(content, model).await
    }
}

/// Answers everything with [FAKE_ANSWER]. Registered under the id of the real
/// chat completions client.
#[derive(Debug, Default)]
pub struct FakeLlm {
    pub conversations: Mutex<Vec<Vec<Message>>>,
}

impl FakeLlm {
    pub fn last_conversation(&self) -> Option<Vec<Message>> {
        self.conversations.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl Llm for FakeLlm {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        "fake-llm"
    }

    async fn generate(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<String, MedragError> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        Ok(FAKE_ANSWER.to_string())
    }
}

/// Setup a qdrant test container and connect to it using QdrantDb.
/// When using suitest's [before_all][suitest::before_all], make sure you return this, othwerise the
/// container will get dropped and cleaned up.
#[cfg(all(feature = "qdrant", feature = "integration"))]
pub async fn init_qdrant() -> (super::vector::qdrant::QdrantDb, AsyncContainer) {
    use testcontainers::{
        core::{IntoContainerPort, WaitFor},
        runners::AsyncRunner,
    };

    let qd_image = GenericImage::new("qdrant/qdrant", "v1.11.3")
        .with_exposed_port(6334.tcp())
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening on"))
        .start()
        .await
        .expect("qdrant container error");

    let qd_host = qd_image.get_host().await.unwrap();
    let qd_port = qd_image.get_host_port_ipv4(6334).await.unwrap();
    let qd_url = format!("http://{qd_host}:{qd_port}");
    (super::vector::qdrant::init(&qd_url), qd_image)
}

mod tests {
    use super::*;
    use crate::app::vector::memory::cosine_similarity;

    #[test]
    fn fake_embeddings_are_deterministic_and_normalized() {
        let a = FakeEmbedder::vector("Iron deficiency anemia");
        let b = FakeEmbedder::vector("iron DEFICIENCY anemia");

        assert_eq!(a, b);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);

        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
