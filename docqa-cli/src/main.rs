//! `docqa`: ask questions about a folder of PDF documents.

mod cli;
mod telemetry;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use docqa_rag::openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
use docqa_rag::{
    Answer, DirectoryIndexStore, IndexStore, PdfDirectoryLoader, RagConfig, RagPipeline,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::cli::{Cli, Command, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let config = cli.settings.to_config().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Command::Ingest => ingest(&cli.settings, config).await,
        Command::Ask { question, json } => ask(&cli.settings, config, &question.join(" "), json).await,
        Command::Chat => chat(&cli.settings, config).await,
        Command::Status => status(&config).await,
    }
}

fn build_pipeline(settings: &Settings, config: RagConfig) -> Result<RagPipeline> {
    let Some(api_key) = settings.api_key.as_deref() else {
        bail!("OPENAI_API_KEY is not set (use --api-key, the environment, or a .env file)");
    };

    let mut embedder =
        OpenAIEmbeddingProvider::new(api_key)?.with_model(config.embedding_model.clone());
    let mut chat_model = OpenAIChatModel::new(api_key)?.with_model(config.chat_model.clone());
    if let Some(base_url) = &settings.base_url {
        embedder = embedder.with_base_url(base_url.clone());
        chat_model = chat_model.with_base_url(base_url.clone());
    }

    let pipeline = RagPipeline::builder()
        .loader(Arc::new(PdfDirectoryLoader::new(config.docs_dir.clone())))
        .embedding_provider(Arc::new(embedder))
        .language_model(Arc::new(chat_model))
        .config(config)
        .build()?;
    Ok(pipeline)
}

async fn ingest(settings: &Settings, config: RagConfig) -> Result<()> {
    let docs_dir = config.docs_dir.display().to_string();
    let pipeline = build_pipeline(settings, config)?;
    let report = pipeline
        .reingest()
        .await
        .with_context(|| format!("failed to ingest documents from {docs_dir}"))?;

    println!(
        "Indexed {} chunks from {} pages into {}",
        report.chunks,
        report.documents,
        pipeline.index_store().location()
    );
    Ok(())
}

async fn ask(settings: &Settings, config: RagConfig, question: &str, json: bool) -> Result<()> {
    let pipeline = build_pipeline(settings, config)?;
    println!("{}", answer_question(&pipeline, question, json).await?);
    Ok(())
}

async fn answer_question(pipeline: &RagPipeline, question: &str, json: bool) -> Result<String> {
    let answer = pipeline.answer(question).await.context("answer unavailable")?;
    if json {
        let value = serde_json::json!({
            "answer": answer.text,
            "found_context": !answer.is_no_context(),
            "citations": answer.citations,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    Ok(render_answer(&answer))
}

async fn chat(settings: &Settings, config: RagConfig) -> Result<()> {
    let pipeline = build_pipeline(settings, config)?;
    pipeline.ensure_ready().await.context("failed to prepare the document index")?;
    tracing::info!(status = ?pipeline.status(), "chat session started");

    let mut editor = DefaultEditor::new()?;
    println!("Ask about your documents. Ctrl-D to quit.");

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(question);

                match pipeline.answer(question).await {
                    Ok(answer) => println!("{}", render_answer(&answer)),
                    Err(e) => eprintln!("Answer unavailable: {e}"),
                }
                std::io::stdout().flush().ok();
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn status(config: &RagConfig) -> Result<()> {
    let store = DirectoryIndexStore::new(config.store_dir.clone(), config.embedding_model.clone());

    println!("Documents:       {}", config.docs_dir.display());
    println!("Store:           {}", store.location());
    println!("Embedding model: {}", config.embedding_model);
    println!("Chat model:      {}", config.chat_model);

    if !store.exists().await {
        println!("Index:           not built (run `docqa ingest`)");
        return Ok(());
    }
    match store.manifest().await {
        Ok(manifest) => {
            println!(
                "Index:           {} chunks, {} dimensions, built {} with {}",
                manifest.entry_count,
                manifest.dimensions,
                manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC"),
                manifest.embedding_model
            );
            if manifest.embedding_model != config.embedding_model {
                println!("                 stale: will be rebuilt for {}", config.embedding_model);
            }
        }
        Err(e) => println!("Index:           unreadable ({e}), will be rebuilt"),
    }
    Ok(())
}

fn render_answer(answer: &Answer) -> String {
    let mut out = answer.text.clone();
    if answer.is_no_context() {
        return out;
    }
    out.push_str("\n\nSources:");
    for citation in &answer.citations {
        let page = citation.page_number.map(|p| format!(", page {p}")).unwrap_or_default();
        out.push_str(&format!(
            "\n  {} {}{page} (score {:.3})",
            citation.marker, citation.source_name, citation.score
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_rag::mock::{KeywordEmbeddingProvider, MockLanguageModel, StaticDocumentLoader};
    use docqa_rag::{Document, InMemoryIndexStore};

    fn pipeline(model: MockLanguageModel) -> RagPipeline {
        RagPipeline::builder()
            .config(RagConfig::builder().chunk_size(40).chunk_overlap(10).build().unwrap())
            .embedding_provider(Arc::new(KeywordEmbeddingProvider::new(["leave", "days"])))
            .language_model(Arc::new(model))
            .loader(Arc::new(StaticDocumentLoader::new(vec![
                Document::new("hr.pdf", "Leave policy allows 20 days annually.").with_page(1),
            ])))
            .index_store(Arc::new(InMemoryIndexStore::new("keyword")))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn failed_answer_is_returned_as_an_error() {
        let pipeline = pipeline(MockLanguageModel::failing("rate limited"));
        let err = answer_question(&pipeline, "How many leave days?", false).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("answer unavailable"));
        assert!(message.contains("rate limited"));
    }

    #[tokio::test]
    async fn answer_lists_its_sources() {
        let pipeline = pipeline(MockLanguageModel::with_reply("20 days [S1]."));
        let text = answer_question(&pipeline, "How many leave days?", false).await.unwrap();
        assert!(text.starts_with("20 days [S1].\n\nSources:\n  [S1] hr.pdf, page 1 (score "));
    }

    #[tokio::test]
    async fn json_answer_reports_found_context() {
        let pipeline = pipeline(MockLanguageModel::with_reply("20 days [S1]."));
        let text = answer_question(&pipeline, "How many leave days?", true).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["answer"], "20 days [S1].");
        assert_eq!(value["found_context"], true);
        assert_eq!(value["citations"][0]["marker"], "[S1]");
    }
}
