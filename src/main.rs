use std::io::Write;

use tracing_subscriber::EnvFilter;

use localrag::types::config::RagConfig;
use localrag::{
    DirectoryReader, LanguageModel, LlamaEmbedder, LlamaEngine, Result, SentenceSplitter,
    VectorStoreIndex,
};

const SIMPLE_QUESTION: &str = "Hello! Can you tell me a poem about cats and dogs?";
const STREAMING_QUESTION: &str = "Can you write me a poem about fast cars?";
const QUERY_QUESTION: &str = "What did the author do growing up?";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries only the demo transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("localrag=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = RagConfig::default();
    config.validate();

    let llm = LlamaEngine::from_config(&config.llm).await?;
    println!("\n# Loaded model\n");

    println!("\n## Simple Q&A\n");
    println!("Question: {SIMPLE_QUESTION}");
    let response = llm.complete(SIMPLE_QUESTION)?;
    println!("Response: {}", response.text);

    println!("\n## Streaming Q&A\n");
    println!("Question: {STREAMING_QUESTION}");
    let mut stdout = std::io::stdout();
    print!("Answer: ");
    stdout.flush()?;
    for delta in llm.stream_complete(STREAMING_QUESTION)? {
        print!("{}", delta?.delta);
        stdout.flush()?;
    }

    let embedder = LlamaEmbedder::from_config(&config.embedding).await?;
    println!("\n# Loaded embedding model\n");

    let splitter = SentenceSplitter::from_config(&config.index)?;
    println!("\n# Created service context\n");

    let documents = DirectoryReader::new(&config.index.data_dir).load_data().await?;
    println!("\n# Loaded documents\n");

    let index = VectorStoreIndex::from_documents(documents, embedder, &splitter)?;
    println!("\n# Created index\n");

    let query_engine = index.as_query_engine(&llm, config.index.similarity_top_k);
    println!("\n# Created query engine\n");

    println!("Question: {QUERY_QUESTION}");
    let response = query_engine.query(QUERY_QUESTION)?;
    println!("Response: {response}");

    Ok(())
}
