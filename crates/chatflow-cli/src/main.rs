//! chatflow - terminal client for chatflow chatbots

mod commands;
mod config;
mod utils;

use anyhow::Context;
use chatflow_api::{CompletionsTranslator, HttpBackend, Language, SocketIoConnector};
use chatflow_widget::{
    ChatWidget, FileStorage, Message, Role, SubmitOutcome, WidgetConfig, WidgetDeps, WidgetEvent,
};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::commands::{CommandResult, history};

/// How long to wait for a streamed answer to start
const STREAM_START_TIMEOUT: Duration = Duration::from_secs(60);
/// Silence after which a streamed answer is considered complete
const STREAM_QUIET_PERIOD: Duration = Duration::from_secs(3);

/// chatflow - talk to a chatflow from the terminal
#[derive(Parser, Debug)]
#[command(name = "chatflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chatflow id
    #[arg(short = 'f', long)]
    chatflow_id: Option<String>,

    /// Backend base URL (default: http://localhost:3000)
    #[arg(long)]
    api_host: Option<String>,

    /// Welcome message shown at the start of a conversation
    #[arg(long)]
    welcome: Option<String>,

    /// Language the chatflow understands (english, korean)
    #[arg(long)]
    backend_language: Option<String>,

    /// Directory holding persisted sessions
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Run in non-interactive mode with a single question
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Start a new conversation instead of resuming the saved one
    #[arg(long)]
    new: bool,

    /// Do not translate input
    #[arg(long)]
    no_translate: bool,

    /// Do not open the realtime channel
    #[arg(long)]
    no_stream: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter("chatflow=debug,chatflow_api=debug,chatflow_widget=debug")
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let Some(chatflow_id) = args.chatflow_id.or(cfg.chatflow_id.clone()) else {
        eprintln!("Error: No chatflow id given");
        eprintln!();
        eprintln!("Pass one with: chatflow --chatflow-id <id>");
        eprintln!("Or add it to config file: chatflow --init-config");
        std::process::exit(1);
    };

    let mut widget_config = WidgetConfig::new(chatflow_id);
    if let Some(host) = args.api_host.or(cfg.api_host.clone()) {
        widget_config = widget_config.with_api_host(host);
    }
    if let Some(welcome) = args.welcome.or(cfg.welcome_message.clone()) {
        widget_config = widget_config.with_welcome_message(welcome);
    }
    if let Some(overrides) = cfg.override_config_json() {
        widget_config = widget_config.with_chatflow_config(overrides);
    }
    widget_config.backend_language = match args.backend_language {
        Some(ref lang) => lang
            .parse::<Language>()
            .with_context(|| format!("Invalid --backend-language '{}'", lang))?,
        None => cfg.backend_language(),
    };

    let flags = Flags {
        translate: !args.no_translate,
        stream: !args.no_stream,
    };
    let deps = build_deps(&flags, &cfg, &widget_config, args.storage_dir)?;
    let widget = ChatWidget::bootstrap(widget_config, deps).await;

    if args.new {
        widget.clear();
    }

    let result = match args.command {
        Some(command) => run_command(&widget, &command).await,
        None => run_interactive(&widget).await,
    };

    widget.shutdown();
    result
}

/// Switches that turn collaborators off
struct Flags {
    translate: bool,
    stream: bool,
}

fn build_deps(
    flags: &Flags,
    cfg: &config::Config,
    widget_config: &WidgetConfig,
    storage_dir: Option<PathBuf>,
) -> anyhow::Result<WidgetDeps> {
    let mut backend = HttpBackend::new(&widget_config.api_host);
    if let Some(key) = cfg.chatflow_api_key() {
        backend = backend.with_api_key(key);
    }
    if let Some(secs) = cfg.timeout_secs {
        backend = backend
            .with_timeout(Duration::from_secs(secs))
            .context("Failed to build HTTP client")?;
    }

    let storage_dir = storage_dir
        .or_else(|| cfg.storage_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(FileStorage::default_dir);
    tracing::debug!("Sessions stored in {}", storage_dir.display());

    let mut deps = WidgetDeps::new(Arc::new(backend), Arc::new(FileStorage::new(storage_dir)));

    if flags.translate && cfg.translate.unwrap_or(true) {
        match cfg.translation_api_key() {
            Some(key) => {
                let mut translator = CompletionsTranslator::new(key);
                if let Some(ref url) = cfg.translation_url {
                    translator = translator.with_url(url);
                }
                deps = deps.with_translator(Arc::new(translator));
            }
            None => tracing::debug!("No translation key configured; input is sent as typed"),
        }
    }

    if flags.stream {
        deps = deps.with_connector(Arc::new(SocketIoConnector::new(&widget_config.api_host)));
    }

    Ok(deps)
}

async fn run_command(widget: &ChatWidget, command: &str) -> anyhow::Result<()> {
    println!("> {}", command);
    println!();

    let mut receiver = widget.subscribe();
    ask(widget, &mut receiver, command).await;
    Ok(())
}

async fn run_interactive(widget: &ChatWidget) -> anyhow::Result<()> {
    let mut receiver = widget.subscribe();

    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        let id = widget.conversation_id();
        eprintln!(
            "chatflow ({}) session: {}",
            widget.config().chatflow_id,
            utils::truncate_chars(&id, 8)
        );
        eprintln!();
    }

    println!("{}", history::format_history(&widget.messages()));
    if widget.shows_starter_prompts() {
        if let Some(CommandResult::Message(list)) = commands::execute_command("/prompts", widget) {
            println!("\n{}", list);
        }
    }
    println!();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let question = match commands::execute_command(input, widget) {
            None => input.to_string(),
            Some(CommandResult::Submit(prompt)) => {
                println!("> {}", prompt);
                prompt
            }
            Some(CommandResult::Clear) => {
                widget.clear();
                println!("Started a new conversation.\n");
                println!("{}\n", widget.config().welcome_text());
                continue;
            }
            Some(CommandResult::Exit) => break,
            Some(CommandResult::Message(msg)) => {
                println!("{}\n", msg);
                continue;
            }
            Some(CommandResult::Unknown(cmd)) => {
                println!("Unknown command: /{}", cmd);
                println!("Type /help for available commands.\n");
                continue;
            }
        };

        println!();
        ask(widget, &mut receiver, &question).await;
        println!();
    }

    Ok(())
}

/// Submit a question and print the answer, following the stream if there is one
async fn ask(widget: &ChatWidget, receiver: &mut broadcast::Receiver<WidgetEvent>, question: &str) {
    // Drop events left over from earlier exchanges
    while receiver.try_recv().is_ok() {}

    let answered_from = widget.messages().len();
    match widget.submit(question).await {
        SubmitOutcome::Answered | SubmitOutcome::Failed => {
            if let Some(message) = widget.messages().last() {
                print_message(message);
            }
        }
        SubmitOutcome::Streaming => follow_stream(widget, receiver, answered_from).await,
        SubmitOutcome::Busy => println!("Still waiting for the previous answer."),
        SubmitOutcome::Discarded => println!("Conversation was reset; answer dropped."),
        SubmitOutcome::Ignored => {}
    }
}

fn print_message(message: &Message) {
    println!("{}", message.text);
    print!("{}", history::format_sources(message));
}

/// Tracks how much of a streamed message has been printed
#[derive(Default)]
struct StreamPrinter {
    current: Option<(usize, usize)>,
}

impl StreamPrinter {
    fn print(&mut self, index: usize, text: &str) {
        let printed = match self.current {
            Some((current, printed)) if current == index => printed,
            Some(_) => {
                println!();
                0
            }
            None => 0,
        };
        let delta: String = text.chars().skip(printed).collect();
        if !delta.is_empty() {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
        self.current = Some((index, printed + delta.chars().count()));
    }
}

/// Print streamed assistant messages until the stream goes quiet
async fn follow_stream(
    widget: &ChatWidget,
    receiver: &mut broadcast::Receiver<WidgetEvent>,
    first_index: usize,
) {
    let mut printer = StreamPrinter::default();

    // Tokens may have arrived before the request returned
    for (index, message) in widget.messages().iter().enumerate().skip(first_index) {
        if message.role == Role::Assistant {
            printer.print(index, &message.text);
        }
    }

    loop {
        let wait = if printer.current.is_some() {
            STREAM_QUIET_PERIOD
        } else {
            STREAM_START_TIMEOUT
        };
        let event = match tokio::time::timeout(wait, receiver.recv()).await {
            Err(_) => break,
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                tracing::debug!("Skipped {} widget events", skipped);
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => break,
            Ok(Ok(event)) => event,
        };
        match event {
            WidgetEvent::MessageAppended { index, message }
            | WidgetEvent::MessageUpdated { index, message }
                if message.role == Role::Assistant && index >= first_index =>
            {
                printer.print(index, &message.text);
            }
            WidgetEvent::ChannelChanged { client_id: None } => {
                tracing::debug!("Channel closed while streaming");
                break;
            }
            WidgetEvent::ConversationReset { .. } => break,
            _ => {}
        }
    }

    match printer.current {
        Some((index, _)) => {
            let messages = widget.messages();
            if let Some(message) = messages.get(index) {
                printer.print(index, &message.text);
                println!();
                print!("{}", history::format_sources(message));
            } else {
                println!();
            }
        }
        None => println!("No answer arrived."),
    }
}
