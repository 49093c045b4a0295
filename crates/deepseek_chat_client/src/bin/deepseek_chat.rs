//! deepseek-chat: terminal front end for the DeepSeek chat session.
//! Reads config and API key, then either answers a single question given on
//! the command line or reads one message per stdin line until EOF, printing
//! the streamed transcript to stdout.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use deepseek_chat_client::terminal::TerminalView;
use deepseek_chat_client::{config, logging, ChatHandle, ChatLoop, HttpTransport, SubmitStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "deepseek-chat", about = "Chat with DeepSeek from the terminal")]
struct Args {
    /// Config file (defaults to $DEEPSEEK_CHAT_CONFIG, then ~/.deepseek-chat/config.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ask this single question and exit instead of reading stdin.
    question: Vec<String>,
}

fn main() {
    logging::init();
    let args = Args::parse();

    let startup = match config::load_startup(args.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("startup failed: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let transport = Arc::new(HttpTransport::from_startup(&startup));
    tracing::info!(endpoint = %transport.endpoint(), model = transport.model(), "ready");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    let question = args.question.join(" ");
    let one_shot = !args.question.is_empty();

    let session = rt.block_on(async {
        let (input_tx, input_rx) = watch::channel(false);
        let view = TerminalView::new(io::stdout(), io::stdout().is_terminal(), input_tx);
        let chat = ChatLoop::new(transport, view);
        let handle = chat.handle();
        let running = tokio::spawn(chat.run());

        if one_shot {
            ask_once(&handle, question).await;
        } else {
            read_stdin(&handle, input_rx).await;
        }
        handle.shutdown();

        running.await.unwrap_or_else(|e| {
            eprintln!("Error: chat loop crashed: {}", e);
            process::exit(1);
        })
    });

    if one_shot && session.failed_turns() > 0 {
        eprintln!("Error: the reply could not be completed");
        process::exit(1);
    }
}

async fn ask_once(handle: &ChatHandle, question: String) {
    match handle.submit(question).await {
        Ok(SubmitStatus::Started) => {}
        Ok(_) => {
            eprintln!("Error: no question provided");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Take a line only while input is enabled; stop at EOF.
async fn read_stdin(handle: &ChatHandle, mut input: watch::Receiver<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if input.wait_for(|enabled| *enabled).await.is_err() {
            break;
        }
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stdin read failed: {}", e);
                break;
            }
        };
        if handle.submit(line).await.is_err() {
            break;
        }
    }
}
