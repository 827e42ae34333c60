use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;

use docqa_core::{collect_text, Backend, ChatTurn, DEFAULT_TEMPERATURE};
use docqa_rag::{build_context, MultiKeywordRetriever, PassageFeeder, DEFAULT_BUDGET};
use docqa_responder::{
    connect_client, connect_store, ContextualResponder, FailureMode, KeywordExtractor,
    PromptTemplate, ResponderConfig,
};

#[derive(Parser)]
#[command(name = "docqa")]
#[command(
    version,
    about = "Answer questions over an indexed document collection",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Args)]
struct BackendArgs {
    /// Evidence collection to search
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Language-model backend (ollama or openai)
    #[arg(long, global = true)]
    service: Option<Backend>,

    /// Model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    /// Answer with "Error: ..." text instead of failing when the model call fails
    #[arg(long, global = true)]
    inband_errors: bool,

    /// Use the in-process store instead of Qdrant
    #[arg(long, global = true)]
    local_store: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the indexed documents
    Ask {
        query: String,

        /// Number of passages to retrieve
        #[arg(long, default_value_t = DEFAULT_BUDGET)]
        num_chunks: usize,

        /// Print the full prompt sent to the model
        #[arg(long)]
        display_context: bool,
    },

    /// Extract search keywords from a query
    Keywords { query: String },

    /// Retrieve passages for comma-separated keywords
    Chunks {
        keywords: String,

        #[arg(long, default_value_t = 3)]
        num_chunks: usize,
    },

    /// Send a single prompt to the model
    Chat {
        prompt: String,

        /// System instruction
        #[arg(long)]
        system: Option<String>,

        #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,

        /// Wait for the full reply instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Split a text file into passages and index them
    Feed {
        file: PathBuf,

        #[arg(long, default_value_t = PassageFeeder::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        #[arg(long, default_value_t = PassageFeeder::DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,
    },
}

impl BackendArgs {
    /// Environment configuration with command-line overrides applied
    fn config(&self) -> Result<ResponderConfig> {
        let mut config = ResponderConfig::from_env().context("Invalid configuration")?;
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
        if let Some(service) = self.service {
            config.backend = service;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if self.inband_errors {
            config.failure_mode = FailureMode::InBand;
        }
        config.local_store = self.local_store;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout only carries answers
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "❌ Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.backend.config()?;
    tracing::debug!(
        backend = %config.backend,
        collection = %config.collection,
        failure_mode = %config.failure_mode,
        "Configuration resolved"
    );

    match cli.command {
        Commands::Ask {
            query,
            num_chunks,
            display_context,
        } => ask(config, &query, num_chunks, display_context).await,
        Commands::Keywords { query } => keywords(config, &query).await,
        Commands::Chunks {
            keywords,
            num_chunks,
        } => chunks(config, &keywords, num_chunks).await,
        Commands::Chat {
            prompt,
            system,
            temperature,
            no_stream,
        } => chat(config, prompt, system, temperature, !no_stream).await,
        Commands::Feed {
            file,
            chunk_size,
            chunk_overlap,
        } => feed(config, &file, chunk_size, chunk_overlap).await,
    }
}

async fn ask(config: ResponderConfig, query: &str, budget: usize, display_context: bool) -> Result<()> {
    let responder = ContextualResponder::connect(config)
        .await
        .context("Failed to initialize responder")?;

    let response = responder.get_response(query, budget, display_context).await?;

    if let Some(prompt) = &response.full_prompt {
        println!("{}", "📄 Full prompt:".cyan().bold());
        println!("{}", prompt.dimmed());
        println!();
    }

    if response.direct {
        println!("{}", "💡 No relevant passages found, answering directly".yellow());
    }
    println!("{}", response.answer);
    Ok(())
}

async fn keywords(config: ResponderConfig, query: &str) -> Result<()> {
    let client = connect_client(&config)?;
    let template = PromptTemplate::load(&config.keyword_prompt_path, PromptTemplate::KEYWORD_FALLBACK);
    let extractor = KeywordExtractor::new(
        client,
        config.effective_model(),
        template,
        config.failure_mode,
    )?;

    let keywords = extractor.extract(query).await?;
    if keywords.is_empty() {
        println!("{}", "No keywords extracted".yellow());
    }
    for keyword in keywords {
        println!("{}", keyword);
    }
    Ok(())
}

async fn chunks(config: ResponderConfig, keywords: &str, budget: usize) -> Result<()> {
    let store = connect_store(&config)
        .await
        .context("Failed to connect to evidence store")?;
    let retriever = MultiKeywordRetriever::new(store);

    let keywords: Vec<String> = keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    let passages = retriever.retrieve(&keywords, budget).await;
    if passages.is_empty() {
        println!("{}", "No passages found".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("🔍 {} passage(s) from '{}'", passages.len(), config.collection).cyan()
    );
    println!("{}", build_context(&passages));
    Ok(())
}

async fn chat(
    config: ResponderConfig,
    prompt: String,
    system: Option<String>,
    temperature: f32,
    stream: bool,
) -> Result<()> {
    let client = connect_client(&config)?;

    let mut turn = ChatTurn::user(prompt)
        .with_temperature(temperature)
        .with_stream(stream);
    if let Some(system) = system {
        turn = turn.with_system(system);
    }

    let model = config.effective_model();
    let reply = match client.chat(model, &turn).await {
        Ok(fragments) => {
            let mut stdout = io::stdout();
            collect_text(fragments, |fragment| {
                if let Err(e) = write_fragment(&mut stdout, fragment) {
                    tracing::warn!(error = %e, "Failed to write reply fragment to stdout");
                }
            })
            .await
        }
        Err(e) => Err(e),
    };

    match reply {
        Ok(_) => println!(),
        Err(e) => println!("{}", config.failure_mode.settle(Err(e))?),
    }
    Ok(())
}

/// Write one streamed fragment and flush so it shows up immediately
fn write_fragment<W: Write>(out: &mut W, fragment: &str) -> io::Result<()> {
    out.write_all(fragment.as_bytes())?;
    out.flush()
}

async fn feed(
    config: ResponderConfig,
    file: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<()> {
    let store = connect_store(&config)
        .await
        .context("Failed to connect to evidence store")?;
    let feeder = PassageFeeder::new(Arc::clone(&store)).with_chunking(chunk_size, chunk_overlap)?;

    let count = feeder
        .feed_file(file)
        .await
        .with_context(|| format!("Failed to index {}", file.display()))?;

    println!(
        "{}",
        format!("✅ Indexed {} passage(s) into '{}'", count, store.collection()).green()
    );
    Ok(())
}
