use super::{
    batch::{IngestExecutor, IngestExecutorHandle},
    document::store::FsDocumentStore,
    vector::memory::MemoryVectorDb,
};
use crate::{
    config::StartArgs,
    core::{
        chunk::ChunkConfig,
        document::store::DocumentStore,
        embedder::Embedder,
        llm::{GenerationParams, Llm},
        prompt::PromptTemplate,
        provider::{ProviderFactory, ProviderState},
        service::{chat::ChatService, ingest::IngestService, RagSettings},
        vector::VectorDb,
    },
    err,
    error::MedragError,
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    /// Medrag services.
    pub services: ServiceState,

    /// Handle for submitting ingestion jobs.
    pub ingest_executor: IngestExecutorHandle,

    /// Downstream service providers for medrag services.
    /// Used for displaying some metadata and in tests.
    pub providers: AppProviderState,

    /// Active retrieval configuration.
    pub settings: Arc<RagSettings>,
}

impl AppState {
    /// Load the application state using the provided configuration.
    /// Panics if a required provider cannot be initialised.
    pub async fn new(args: &StartArgs) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(args.log()))
            .try_init();

        let vector_provider = Self::init_vector_providers(args);
        let embedding_provider = Self::init_embedding_providers(args);
        let llm_provider = Self::init_llm_providers(args);
        let document_provider = Self::init_document_providers(args);

        let providers = AppProviderState {
            vector: vector_provider,
            embedding: embedding_provider,
            llm: llm_provider,
            document: document_provider,
        };

        let settings = Arc::new(Self::init_settings(args, &providers));
        let prompt = Arc::new(Self::init_prompt(args));

        info!(
            "Using vector provider '{}', embedder '{}' ({}), collection '{}'",
            settings.vector_provider,
            settings.embedding_provider,
            settings.embedding_model,
            settings.collection
        );

        let services = ServiceState::new(providers.clone(), settings.clone(), prompt);

        if let Err(e) = services.ingest.ensure_collection().await {
            e.print();
            warn!("Unable to prepare collection, will retry on ingestion");
        }

        let ingest_executor = Self::spawn_ingest_executor(services.clone());

        Self {
            services,
            ingest_executor,
            providers,
            settings,
        }
    }

    fn init_vector_providers(args: &StartArgs) -> Arc<VectorDbProvider> {
        let mut provider = VectorDbProvider::default();

        let memory = Arc::new(MemoryVectorDb::new());
        provider.register(memory.id(), memory);

        #[cfg(feature = "qdrant")]
        {
            let qdrant = crate::app::vector::qdrant::init(&args.qdrant_url());
            provider.register(qdrant.id(), qdrant);
        }

        #[cfg(feature = "pinecone")]
        {
            match args.pinecone_api_key() {
                Some(key) => {
                    let pinecone = Arc::new(crate::app::vector::pinecone::PineconeDb::new(
                        &key,
                        &args.pinecone_cloud(),
                        &args.pinecone_region(),
                    ));
                    provider.register(pinecone.id(), pinecone);
                }
                None => info!("PINECONE_API_KEY not set, pinecone disabled"),
            }
        }

        Arc::new(provider)
    }

    fn init_embedding_providers(args: &StartArgs) -> Arc<EmbeddingProvider> {
        #[cfg(not(any(feature = "fe-local", feature = "openai")))]
        compile_error!("one of `fe-local` or `openai` features must be enabled");

        let mut provider = EmbeddingProvider::default();

        #[cfg(feature = "fe-local")]
        {
            // Loading a model is expensive, only do it when it will be used.
            if args.embedding_provider() == "fastembed" {
                let model = args
                    .embedding_model()
                    .unwrap_or_else(|| crate::config::DEFAULT_EMBEDDING_MODEL.to_string());

                let fastembed = match crate::app::embedder::fastembed::FastEmbedder::new(&model) {
                    Ok(fastembed) => Arc::new(fastembed),
                    Err(e) => panic!("unable to load fastembed model '{model}': {e}"),
                };

                provider.register(fastembed.id(), fastembed);
            }
        }

        #[cfg(feature = "openai")]
        {
            match args.open_ai_key() {
                Some(key) => {
                    let openai = Arc::new(
                        crate::app::embedder::openai::OpenAiEmbeddings::with_endpoint(
                            &args.openai_endpoint(),
                            &key,
                        ),
                    );
                    provider.register(openai.id(), openai);
                }
                None => info!("OPENAI_KEY not set, openai embeddings disabled"),
            }
        }

        Arc::new(provider)
    }

    fn init_llm_providers(args: &StartArgs) -> Arc<LlmProvider> {
        let mut provider = LlmProvider::default();

        match args.llm_api_key() {
            Some(key) => {
                let llm = Arc::new(crate::app::llm::openai::OpenAiChat::new(
                    &args.llm_endpoint(),
                    &key,
                    &args.llm_model(),
                ));
                info!("Using chat model '{}' at {}", llm.model(), llm.endpoint());
                provider.register(llm.id(), llm);
            }
            None => warn!("Neither LLM_API_KEY nor GROQ_API_KEY is set, chat is disabled"),
        }

        Arc::new(provider)
    }

    fn init_document_providers(args: &StartArgs) -> Arc<DocumentStoreProvider> {
        let mut provider = DocumentStoreProvider::default();

        let fs_store = Arc::new(FsDocumentStore::new(&args.data_path()));
        provider.register(fs_store.id(), fs_store);

        Arc::new(provider)
    }

    fn init_settings(args: &StartArgs, providers: &AppProviderState) -> RagSettings {
        let vector_provider = args.vector_provider();
        let embedding_provider = args.embedding_provider();

        if let Err(e) = providers.vector.get_provider(&vector_provider) {
            panic!(
                "{e}; available vector providers: {:?}",
                providers.vector.list_provider_ids()
            );
        }

        let embedder = match providers.embedding.get_provider(&embedding_provider) {
            Ok(embedder) => embedder,
            Err(e) => panic!(
                "{e}; available embedding providers: {:?}",
                providers.embedding.list_provider_ids()
            ),
        };

        let embedding_model = args
            .embedding_model()
            .unwrap_or_else(|| embedder.default_model().0);

        let chunker = match ChunkConfig::recursive(args.chunk_size(), args.chunk_overlap()) {
            Ok(chunker) => chunker,
            Err(e) => panic!("invalid chunking configuration: {e}"),
        };

        RagSettings {
            collection: args.collection_name(),
            vector_provider,
            embedding_provider,
            embedding_model,
            llm_provider: "openai".to_string(),
            document_provider: "fs".to_string(),
            top_k: args.top_k(),
            embed_batch_size: args.embed_batch_size(),
            chunker,
            generation: GenerationParams {
                temperature: args.llm_temperature(),
                max_tokens: args.llm_max_tokens(),
            },
        }
    }

    fn init_prompt(args: &StartArgs) -> PromptTemplate {
        let Some(path) = args.prompt_path() else {
            return PromptTemplate::default();
        };

        let template = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("unable to read prompt template {path}: {e}"));

        match PromptTemplate::new(template) {
            Ok(prompt) => {
                info!("Loaded system prompt from {path}");
                prompt
            }
            Err(e) => panic!("{e}"),
        }
    }

    fn spawn_ingest_executor(state: ServiceState) -> IngestExecutorHandle {
        let (tx, rx) = tokio::sync::mpsc::channel(128);
        IngestExecutor::new(rx, state).start();
        tx
    }

    /// Used for metadata display.
    pub async fn get_configuration(&self) -> Result<AppConfig, MedragError> {
        let mut embedding_providers = HashMap::new();

        for provider in self.providers.embedding.list_provider_ids() {
            let embedder = self.providers.embedding.get_provider(provider)?;

            let models = embedder
                .list_embedding_models()
                .await?
                .into_iter()
                .collect();

            embedding_providers.insert(provider.to_string(), models);
        }

        let ids = |mut ids: Vec<&'static str>| {
            ids.sort_unstable();
            ids.into_iter().map(String::from).collect::<Vec<_>>()
        };

        Ok(AppConfig {
            vector_providers: ids(self.providers.vector.list_provider_ids()),
            embedding_providers,
            llm_providers: ids(self.providers.llm.list_provider_ids()),
            document_providers: ids(self.providers.document.list_provider_ids()),
            llm_model: self.llm_model(),
            settings: (*self.settings).clone(),
        })
    }

    fn llm_model(&self) -> Option<String> {
        self.providers
            .llm
            .get_provider(&self.settings.llm_provider)
            .ok()
            .map(|llm| llm.model().to_string())
    }

    #[cfg(test)]
    pub fn new_test(
        providers: AppProviderState,
        settings: RagSettings,
        prompt: PromptTemplate,
    ) -> Self {
        let settings = Arc::new(settings);
        let services = ServiceState::new(providers.clone(), settings.clone(), Arc::new(prompt));
        Self {
            services: services.clone(),
            providers,
            ingest_executor: Self::spawn_ingest_executor(services),
            settings,
        }
    }
}

/// Concrete version of [ProviderState].
#[derive(Clone)]
pub struct AppProviderState {
    pub vector: Arc<VectorDbProvider>,
    pub embedding: Arc<EmbeddingProvider>,
    pub llm: Arc<LlmProvider>,
    pub document: Arc<DocumentStoreProvider>,
}

impl From<AppProviderState> for ProviderState {
    fn from(value: AppProviderState) -> ProviderState {
        ProviderState {
            vector: value.vector,
            embedding: value.embedding,
            llm: value.llm,
            document: value.document,
        }
    }
}

#[derive(Clone)]
pub struct ServiceState {
    pub ingest: IngestService,
    pub chat: ChatService,
}

impl ServiceState {
    pub fn new(
        providers: AppProviderState,
        settings: Arc<RagSettings>,
        prompt: Arc<PromptTemplate>,
    ) -> Self {
        let providers: ProviderState = providers.into();
        Self {
            ingest: IngestService::new(providers.clone(), settings.clone()),
            chat: ChatService::new(providers, settings, prompt),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// A list of available vector providers.
    pub vector_providers: Vec<String>,

    /// A map of available embedding providers, their models and their respective model sizes.
    pub embedding_providers: HashMap<String, HashMap<String, usize>>,

    /// A list of available text generation providers.
    pub llm_providers: Vec<String>,

    /// A list of available document storage providers.
    pub document_providers: Vec<String>,

    /// Model answering questions, if a text generation provider is configured.
    pub llm_model: Option<String>,

    /// Active retrieval configuration.
    pub settings: RagSettings,
}

/// Creates and implements functions for `$target` to easily get an instance of whatever
/// the provider is for, i.e. `$provider_out`.
macro_rules! provider {
    (
        $( $target:ident -> $provider_out:ident ),+
    ) => {
        $(
            #[derive(Clone, Default)]
            pub struct $target {
                providers: HashMap<&'static str, Arc<dyn $provider_out + Send + Sync>>,
            }

            impl ProviderFactory<Arc<dyn $provider_out + Send + Sync>> for $target {
                /// AUTO-GENERATED BY THE `provider!` MACRO.
                /// SEE [crate::app::state] FOR MORE DETAILS.
                /// Obtain the provider registered under `input`.
                fn get_provider(
                    &self,
                    input: &str,
                ) -> Result<Arc<dyn $provider_out + Send + Sync>, MedragError> {
                    match self.providers.get(input).cloned() {
                        Some(e) => Ok(e),
                        None => err!(InvalidProvider, "{input}"),
                    }
                }

                /// AUTO-GENERATED BY THE `provider!` MACRO.
                /// SEE [crate::app::state] FOR MORE DETAILS.
                /// A list of available providers for a given functionality.
                fn list_provider_ids(&self) -> Vec<&'static str> {
                    self.providers.keys().cloned().collect()
                }

                /// AUTO-GENERATED BY THE `provider!` MACRO.
                /// SEE [crate::app::state] FOR MORE DETAILS.
                /// Register a new provider in this factory.
                fn register(
                    &mut self,
                    id: &'static str,
                    provider: Arc<dyn $provider_out + Send + Sync>,
                ) {
                    self.providers.insert(id, provider);
                }
            }
        )+
    };
}

provider! {
    VectorDbProvider -> VectorDb,
    EmbeddingProvider -> Embedder,
    LlmProvider -> Llm,
    DocumentStoreProvider -> DocumentStore
}
