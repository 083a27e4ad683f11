use clap::{Args, Parser, Subcommand};
use medrag::{
    app::{
        batch::{IngestJob, JobResult},
        state::AppState,
    },
    config::StartArgs,
    core::{
        document::parser::ParseConfig,
        service::{
            chat::dto::{ChatPayload, SearchPayload},
            ingest::dto::ChunkPreviewPayload,
        },
    },
    error::MedragError,
};

#[derive(Debug, Parser)]
#[command(name = "medrag-cli", author, version, about = "Index documents and query them from the terminal", long_about = None)]
struct Cli {
    #[command(flatten)]
    start: StartArgs,

    #[command(subcommand)]
    command: Execute,
}

#[derive(Debug, Subcommand)]
enum Execute {
    /// Index the documents of the document store.
    Ingest(IngestArg),

    /// Answer a question using the indexed documents.
    Ask(AskArg),

    /// Print the chunks most similar to a query.
    Search(SearchArg),

    /// Preview the chunks of a document without indexing it.
    Chunks(ChunksArg),

    /// List documents available for ingestion.
    Sources,
}

#[derive(Debug, Args)]
struct IngestArg {
    /// Re-index documents whose content did not change.
    #[arg(long, short, action)]
    force: bool,

    /// Only ingest the given documents.
    #[arg(long, short)]
    name: Vec<String>,
}

#[derive(Debug, Args)]
struct AskArg {
    question: String,

    /// Amount of chunks to use as context.
    #[arg(long, short)]
    top_k: Option<u32>,
}

#[derive(Debug, Args)]
struct SearchArg {
    query: String,

    #[arg(long, short)]
    limit: Option<u32>,
}

#[derive(Debug, Args)]
struct ChunksArg {
    /// Document name.
    #[arg(long, short)]
    name: String,

    /// Skip the first `start` pages.
    #[arg(long, short, default_value = "0")]
    start: usize,

    /// Omit the last `end` pages.
    #[arg(long, short, default_value = "0")]
    end: usize,

    /// Treat start and end as an inclusive page range.
    #[arg(long, short, action)]
    range: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let Cli { start, command } = Cli::parse();
    let state = AppState::new(&start).await;

    if let Err(e) = run(command, state).await {
        e.print();
        std::process::exit(1);
    }
}

/// Print the reports of an ingestion job and return the amount of failed documents.
async fn print_reports(rx: &mut tokio::sync::mpsc::Receiver<JobResult>) -> usize {
    let mut failed = 0;

    while let Some(result) = rx.recv().await {
        match result {
            JobResult::Ok(report) => {
                let status = if report.skipped { "unchanged" } else { "indexed" };
                println!(
                    "{status:>9} | {} | {} chunks | {}",
                    report.source, report.total_chunks, report.hash
                );
            }
            JobResult::Err(e) => {
                failed += 1;
                eprintln!("   failed | {e}");
            }
        }
    }

    failed
}

async fn run(command: Execute, state: AppState) -> Result<(), MedragError> {
    let services = &state.services;

    match command {
        Execute::Ingest(IngestArg { force, name }) => {
            let sources = (!name.is_empty()).then_some(name);
            let (tx, mut rx) = tokio::sync::mpsc::channel(128);

            if state
                .ingest_executor
                .send(IngestJob::new(force, sources, tx))
                .await
                .is_err()
            {
                return medrag::err!(Batch);
            }

            let failed = print_reports(&mut rx).await;

            if failed > 0 {
                eprintln!("{failed} document(s) failed");
                std::process::exit(1);
            }
        }
        Execute::Ask(AskArg { question, top_k }) => {
            let mut payload = ChatPayload::new(question);
            payload.top_k = top_k;

            let response = services.chat.answer(payload).await?;

            println!("{}", response.answer);
            println!();
            for source in response.sources {
                let page = source
                    .chunk
                    .page
                    .map(|p| format!(" p.{p}"))
                    .unwrap_or_default();
                println!("  [{:.3}] {}{page}", source.score, source.chunk.source);
            }
        }
        Execute::Search(SearchArg { query, limit }) => {
            let results = services.chat.search(SearchPayload::new(query, limit)).await?;
            for (i, result) in results.iter().enumerate() {
                println!(
                    "#{i} [{:.3}] {} (chunk {}) {:=>40}",
                    result.score, result.chunk.source, result.chunk.index, "v"
                );
                println!("{}", result.chunk.content);
                println!();
            }
        }
        Execute::Chunks(ChunksArg {
            name,
            start,
            end,
            range,
        }) => {
            let mut parser = ParseConfig::new(start, end);
            if range {
                parser = parser.use_range();
            }

            let chunks = services
                .ingest
                .chunk_preview(ChunkPreviewPayload {
                    name,
                    parser: Some(parser),
                    chunker: None,
                })
                .await?;

            for chunk in chunks.iter() {
                let page = chunk.page.map(|p| format!(" (page {p})")).unwrap_or_default();
                println!("Chunk {}{page} {:=>60}", chunk.index, "v");
                println!();
                println!("{}", chunk.content);
                println!();
            }

            println!("Total chunks: {}", chunks.len());
        }
        Execute::Sources => {
            for source in services.ingest.list_sources().await? {
                println!("{:<6} {:>10}  {}", source.ty, source.size, source.name);
            }
        }
    }

    Ok(())
}
