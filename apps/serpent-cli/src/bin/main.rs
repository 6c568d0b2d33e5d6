use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serpent_core::config::{Config, Settings};
use serpent_core::documents::DocumentLoader;
use serpent_memory::{ConversationMemory, InMemoryConversationStore};
use serpent_rag::{ChatRequest, ChatService, OllamaGenerator, QueryRequest, RagService};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: serpent <ingest [data_dir] | query <question> | chat | stats | self-test>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

async fn build_service(settings: Settings) -> anyhow::Result<Arc<RagService>> {
    let base_dir = env::current_dir()?;
    let generator = Arc::new(OllamaGenerator::new(&settings.generation)?);
    Ok(Arc::new(RagService::from_settings(settings, &base_dir, generator).await?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let data_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                let dir: String = config.get("data.species_dir").unwrap_or_else(|_| "data/species".to_string());
                PathBuf::from(dir)
            });
            info!(dir = %data_dir.display(), "ingesting species documents");
            let documents = DocumentLoader::new().load_directory(&data_dir)?;
            let service = build_service(settings).await?;
            let stats = service.ingest(&documents).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        "query" => {
            let question = args.join(" ");
            if question.trim().is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
            let service = build_service(settings).await?;
            service.load_existing_index().await?;
            match service.query(&QueryRequest::text(question)).await {
                Ok(response) => {
                    println!("{}\n", response.answer);
                    for (i, (text, score)) in response.context.iter().zip(&response.scores).enumerate() {
                        println!("[{}] {:.3} {}", i + 1, score, text);
                    }
                    println!("\n{}", serde_json::to_string_pretty(&response.rerank_info)?);
                }
                Err(e) => {
                    eprintln!("{}", serde_json::to_string_pretty(&e.report())?);
                    std::process::exit(2);
                }
            }
        }
        "chat" => {
            let memory_settings = settings.memory.clone();
            let service = build_service(settings).await?;
            service.load_existing_index().await?;
            let memory = Arc::new(ConversationMemory::new(
                Arc::new(InMemoryConversationStore::new()),
                service.generator(),
                memory_settings,
            ));
            let chat = ChatService::new(service, memory, None);
            let mut conversation_id = None;
            let stdin = io::stdin();
            print!("> ");
            io::stdout().flush()?;
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim() == "/quit" { break; }
                let request = ChatRequest { owner_id: "cli".into(), conversation_id, message: Some(line), image: None };
                match chat.send_message(request).await {
                    Ok(reply) => {
                        conversation_id = Some(reply.conversation_id);
                        println!("{}\n", reply.message);
                    }
                    Err(e) => eprintln!("{}", serde_json::to_string(&e.report())?),
                }
                print!("> ");
                io::stdout().flush()?;
            }
        }
        "stats" => {
            let service = build_service(settings).await?;
            service.load_existing_index().await?;
            println!("{}", serde_json::to_string_pretty(&service.stats().await?)?);
        }
        "self-test" => {
            let service = build_service(settings).await?;
            let report = service.self_test().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.all_passed() { std::process::exit(1); }
        }
        _ => { eprintln!("{USAGE}"); std::process::exit(1); }
    }
    Ok(())
}
