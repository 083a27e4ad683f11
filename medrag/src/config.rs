use clap::Parser;

/// The name of the collection used for indexing and retrieval.
pub const DEFAULT_COLLECTION_NAME: &str = "medical-chatbot";
/// The embedding provider used when none is configured.
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "fastembed";
/// The embedding model used with the `fastembed` provider when none is configured.
pub const DEFAULT_EMBEDDING_MODEL: &str = "Qdrant/all-MiniLM-L6-v2-onnx";
/// The vector provider used when none is configured.
pub const DEFAULT_VECTOR_PROVIDER: &str = "qdrant";
/// Default chat completions endpoint, without the `/v1/chat/completions` suffix.
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.groq.com/openai";
/// Default chat model.
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
/// The default path for the `fs` document storage provider.
const DEFAULT_DATA_PATH: &str = "data";
/// The default port to listen on if neither `ADDRESS` nor `PORT` are set.
const DEFAULT_PORT: &str = "8080";
/// Default Qdrant gRPC URL.
#[cfg(feature = "qdrant")]
const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

#[derive(Debug, Default, clap::Args)]
pub struct StartArgs {
    /// RUST_LOG string to use as the env filter.
    #[arg(short, long)]
    log: Option<String>,

    /// Address to listen on.
    #[arg(short, long)]
    address: Option<String>,

    /// Sets the directory of the `fs` document store.
    #[arg(long)]
    data_path: Option<String>,

    /// CORS allowed origins.
    #[arg(long)]
    cors_allowed_origins: Option<String>,

    /// Vector database to index into and retrieve from.
    #[arg(long)]
    vector_provider: Option<String>,

    /// Qdrant URL.
    #[cfg(feature = "qdrant")]
    #[arg(long)]
    qdrant_url: Option<String>,

    /// Pinecone serverless cloud.
    #[cfg(feature = "pinecone")]
    #[arg(long)]
    pinecone_cloud: Option<String>,

    /// Pinecone serverless region.
    #[cfg(feature = "pinecone")]
    #[arg(long)]
    pinecone_region: Option<String>,

    /// Embedding provider to use.
    #[arg(long)]
    embedding_provider: Option<String>,

    /// Embedding model to use. Defaults to the provider's default model.
    #[arg(long)]
    embedding_model: Option<String>,

    /// If using the OpenAI embedding module, set its endpoint.
    #[cfg(feature = "openai")]
    #[arg(long)]
    openai_endpoint: Option<String>,

    /// OpenAI compatible chat completions endpoint.
    #[arg(long)]
    llm_endpoint: Option<String>,

    /// Chat model.
    #[arg(long)]
    llm_model: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    llm_temperature: Option<f32>,

    /// Maximum amount of generated tokens.
    #[arg(long)]
    llm_max_tokens: Option<u32>,

    /// Vector collection name.
    #[arg(long)]
    collection_name: Option<String>,

    /// Amount of chunks to retrieve per question.
    #[arg(long)]
    top_k: Option<u32>,

    /// Chunk size in characters.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Chunk overlap in characters.
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Amount of chunks sent to the embedder at once.
    #[arg(long)]
    embed_batch_size: Option<usize>,

    /// Path to a system prompt template containing `{context}`.
    #[arg(long)]
    prompt_path: Option<String>,
}

/// Arguments for the server binary.
#[derive(Debug, Parser)]
#[command(name = "medrag", author, version, about = "Medical question answering over indexed documents", long_about = None)]
pub struct ServerArgs {
    #[command(flatten)]
    pub start: StartArgs,
}

/// Implement a getter method on [StartArgs], using the `$var` environment variable as a fallback
/// and either panic or default if neither the argument nor the environment variable is set.
macro_rules! arg {
    ($id:ident, $var:literal, panic $msg:literal) => {
        impl StartArgs {
            pub fn $id(&self) -> String {
                match &self.$id {
                    Some(val) => val.to_string(),
                    None => match std::env::var($var) {
                        Ok(val) => val,
                        Err(_) => panic!($msg),
                    },
                }
            }
        }
    };
    ($id:ident, $var:literal, default $value:expr) => {
        impl StartArgs {
            pub fn $id(&self) -> String {
                match &self.$id {
                    Some(val) => val.to_string(),
                    None => match std::env::var($var) {
                        Ok(val) => val,
                        Err(_) => $value,
                    },
                }
            }
        }
    };
    ($id:ident, $var:literal, optional) => {
        impl StartArgs {
            pub fn $id(&self) -> Option<String> {
                match &self.$id {
                    Some(val) => Some(val.to_string()),
                    None => std::env::var($var).ok().filter(|v| !v.is_empty()),
                }
            }
        }
    };
    ($id:ident, $var:literal, parse $ty:ty, default $value:expr) => {
        impl StartArgs {
            pub fn $id(&self) -> $ty {
                match self.$id {
                    Some(val) => val,
                    None => match std::env::var($var) {
                        Ok(val) => val.parse::<$ty>().unwrap_or_else(|e| {
                            panic!("Invalid {} '{val}': {e}", $var)
                        }),
                        Err(_) => $value,
                    },
                }
            }
        }
    };
    ($id:ident, $var:literal, parse $ty:ty, optional) => {
        impl StartArgs {
            pub fn $id(&self) -> Option<$ty> {
                match self.$id {
                    Some(val) => Some(val),
                    None => std::env::var($var).ok().map(|val| {
                        val.parse::<$ty>()
                            .unwrap_or_else(|e| panic!("Invalid {} '{val}': {e}", $var))
                    }),
                }
            }
        }
    };
}

impl StartArgs {
    /// `ADDRESS` if set, otherwise all interfaces on `PORT`.
    pub fn address(&self) -> String {
        if let Some(address) = &self.address {
            return address.clone();
        }
        if let Ok(address) = std::env::var("ADDRESS") {
            return address;
        }
        let port = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
        format!("0.0.0.0:{port}")
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        let origins = match &self.cors_allowed_origins {
            Some(origins) => origins.clone(),
            None => std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
        };
        parse_list(&origins)
    }

    /// Key for the chat completions endpoint. Falls back to `GROQ_API_KEY`.
    pub fn llm_api_key(&self) -> Option<String> {
        std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("GROQ_API_KEY"))
            .ok()
            .filter(|key| !key.is_empty())
    }

    #[cfg(feature = "openai")]
    pub fn open_ai_key(&self) -> Option<String> {
        std::env::var("OPENAI_KEY").ok().filter(|key| !key.is_empty())
    }

    #[cfg(feature = "pinecone")]
    pub fn pinecone_api_key(&self) -> Option<String> {
        std::env::var("PINECONE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
    }
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter_map(|o| (!o.is_empty()).then_some(String::from(o)))
        .collect()
}

arg!(log,                "RUST_LOG",           default "info".to_string());
arg!(data_path,          "DATA_PATH",          default DEFAULT_DATA_PATH.to_string());
arg!(vector_provider,    "VECTOR_PROVIDER",    default DEFAULT_VECTOR_PROVIDER.to_string());
arg!(embedding_provider, "EMBEDDING_PROVIDER", default DEFAULT_EMBEDDING_PROVIDER.to_string());
arg!(embedding_model,    "EMBEDDING_MODEL",    optional);
arg!(llm_endpoint,       "LLM_ENDPOINT",       default DEFAULT_LLM_ENDPOINT.to_string());
arg!(llm_model,          "LLM_MODEL",          default DEFAULT_LLM_MODEL.to_string());
arg!(llm_temperature,    "LLM_TEMPERATURE",    parse f32, default 0.0);
arg!(llm_max_tokens,     "LLM_MAX_TOKENS",     parse u32, optional);
arg!(collection_name,    "COLLECTION_NAME",    default DEFAULT_COLLECTION_NAME.to_string());
arg!(top_k,              "TOP_K",              parse u32, default 3);
arg!(chunk_size,         "CHUNK_SIZE",         parse usize, default 500);
arg!(chunk_overlap,      "CHUNK_OVERLAP",      parse usize, default 20);
arg!(embed_batch_size,   "EMBED_BATCH_SIZE",   parse usize, default 64);
arg!(prompt_path,        "PROMPT_PATH",        optional);

#[cfg(feature = "qdrant")]
arg!(qdrant_url,         "QDRANT_URL",         default DEFAULT_QDRANT_URL.to_string());

#[cfg(feature = "pinecone")]
arg!(pinecone_cloud,     "PINECONE_CLOUD",     default "aws".to_string());
#[cfg(feature = "pinecone")]
arg!(pinecone_region,    "PINECONE_REGION",    default "us-east-1".to_string());

#[cfg(feature = "openai")]
arg!(openai_endpoint,    "OPENAI_ENDPOINT",    default medrag_embedders::openai::DEFAULT_OPENAI_ENDPOINT.to_string());
