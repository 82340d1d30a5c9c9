//! Command-line arguments and their mapping onto [`RagConfig`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docqa_rag::RagConfig;
use docqa_rag::config::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};

/// Ask questions about a folder of PDF documents.
#[derive(Parser, Debug)]
#[command(name = "docqa", author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "DOCQA_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the vector store from the documents directory
    Ingest,
    /// Answer a single question
    Ask {
        /// The question to answer
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
        /// Print the answer and its citations as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer questions interactively
    Chat,
    /// Show the state of the vector store
    Status,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Pipeline settings. Flags override environment variables, which override
/// `.env`.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Directory holding the PDF corpus
    #[arg(long, global = true, env = "DOCQA_DOCS_DIR", default_value = "docs")]
    pub docs_dir: PathBuf,

    /// Directory holding the persisted vector store
    #[arg(long, global = true, env = "DOCQA_STORE_DIR", default_value = "vector_store")]
    pub store_dir: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, global = true, env = "DOCQA_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long, global = true, env = "DOCQA_CHUNK_OVERLAP")]
    pub chunk_overlap: Option<usize>,

    /// Number of chunks retrieved per question
    #[arg(long, global = true, env = "DOCQA_TOP_K")]
    pub top_k: Option<usize>,

    /// Characters of each chunk placed in the prompt
    #[arg(long, global = true, env = "DOCQA_MAX_CHARS_PER_CHUNK")]
    pub max_chars_per_chunk: Option<usize>,

    /// Drop retrieved chunks scoring below this similarity
    #[arg(long, global = true, env = "DOCQA_SIMILARITY_THRESHOLD")]
    pub similarity_threshold: Option<f32>,

    /// Chat model identifier
    #[arg(long, global = true, env = "OPENAI_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// Embedding model identifier
    #[arg(long, global = true, env = "OPENAI_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// API key for the embedding and chat services
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Settings {
    /// Build a validated [`RagConfig`], keeping library defaults for unset values.
    pub fn to_config(&self) -> docqa_rag::Result<RagConfig> {
        let defaults = RagConfig::default();
        let mut builder = RagConfig::builder()
            .docs_dir(&self.docs_dir)
            .store_dir(&self.store_dir)
            .chunk_size(self.chunk_size.unwrap_or(defaults.chunk_size))
            .chunk_overlap(self.chunk_overlap.unwrap_or(defaults.chunk_overlap))
            .top_k(self.top_k.unwrap_or(defaults.top_k))
            .max_chars_per_chunk(self.max_chars_per_chunk.unwrap_or(defaults.max_chars_per_chunk))
            .chat_model(&self.chat_model)
            .embedding_model(&self.embedding_model);
        if let Some(threshold) = self.similarity_threshold {
            builder = builder.similarity_threshold(threshold);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("docqa").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn ask_collects_the_whole_question() {
        let cli = parse(&["ask", "How", "many", "leave", "days?"]);
        match cli.command {
            Command::Ask { question, json } => {
                assert_eq!(question.join(" "), "How many leave days?");
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&["status", "--chunk-size", "500", "--chunk-overlap", "50", "--top-k", "2"]);
        let config = cli.settings.to_config().unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.max_chars_per_chunk, 750);
    }

    #[test]
    fn inconsistent_chunking_is_rejected_at_startup() {
        let cli = parse(&["ingest", "--chunk-size", "100", "--chunk-overlap", "100"]);
        assert!(cli.settings.to_config().is_err());
    }

    #[test]
    fn zero_top_k_is_rejected_at_startup() {
        let cli = parse(&["chat", "--top-k", "0"]);
        assert!(cli.settings.to_config().is_err());
    }
}
