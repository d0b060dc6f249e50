use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

use coincub::core::config::CoincubConfig;
use coincub::core::types::{ChatId, ReplyHandle, RequestUnit, Transport};
use coincub::dispatch::Dispatcher;
use coincub::memory::MemoryStore;
use coincub::news::GoogleNewsProvider;
use coincub::query::GeminiBackend;

#[derive(Debug, StructOpt)]
#[structopt(name = "coincub-bot", about = "CoinCub crypto analyst, local REPL front-end")]
struct Opt {
    /// Chat id this session's history is attributed to
    #[structopt(long, default_value = "0")]
    chat_id: i64,

    /// Overrides COINCUB_MEMORY_DIR
    #[structopt(long, parse(from_os_str))]
    memory_dir: Option<PathBuf>,
}

struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_message(&self, _reply: &ReplyHandle, text: &str) -> Result<()> {
        println!("{}", text.green());
        Ok(())
    }

    async fn send_typing(&self, reply: &ReplyHandle) -> Result<()> {
        log::info!("chat {}: typing...", reply.chat);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let opt = Opt::from_args();
    let mut config = CoincubConfig::from_env()?;
    if let Some(dir) = opt.memory_dir {
        config.memory_dir = dir;
    }

    let memory = Arc::new(MemoryStore::new(&config.memory_dir)?);
    let news = Arc::new(GoogleNewsProvider::new());
    let backend = Arc::new(GeminiBackend::new(&config));
    let dispatcher = Dispatcher::new(Arc::new(ConsoleTransport), news, backend, memory);

    let chat = ChatId(opt.chat_id);
    let mut rl = DefaultEditor::new()?;
    println!("CoinCub is listening. Enter 'quit' to exit.");
    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let input = line.trim();
                if input.eq_ignore_ascii_case("quit") {
                    break;
                }
                if input.is_empty() {
                    continue;
                }
                rl.add_history_entry(input)?;
                dispatcher.handle_message(RequestUnit::new(chat, input));
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }
    println!("Goodbye!");

    Ok(())
}
