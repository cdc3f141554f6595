use std::sync::Arc;

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use polyglot_chat::cli::{parse_command, Args, Command, HELP};
use polyglot_chat::config::ChatConfig;
use polyglot_chat::languages::{find_language, SUPPORTED_LANGUAGES};
use polyglot_chat::state::SessionState;
use polyglot_chat::{ChannelHub, ChatError, JoinRequest, MessageKind, SessionController, TranslationGateway};

// ---------------------------------------------------------------------------
// Tab task
// ---------------------------------------------------------------------------

/// Requests the REPL sends to a tab's task.
enum TabRequest {
    Join(JoinRequest, oneshot::Sender<Result<(), ChatError>>),
    Say(String, oneshot::Sender<Result<(), ChatError>>),
    Lang(String, oneshot::Sender<Result<(), ChatError>>),
    Show(oneshot::Sender<Option<SessionState>>),
    Dismiss,
    Leave,
}

/// Drive one tab: REPL requests and inbound room traffic, multiplexed.
async fn run_tab(mut controller: SessionController, mut requests: mpsc::UnboundedReceiver<TabRequest>) {
    loop {
        let joined = controller.is_joined();
        tokio::select! {
            req = requests.recv() => {
                match req {
                    Some(TabRequest::Join(r, reply)) => { let _ = reply.send(controller.join(r)); }
                    Some(TabRequest::Say(text, reply)) => { let _ = reply.send(controller.send_message(&text)); }
                    Some(TabRequest::Lang(lang, reply)) => {
                        // The batch applies itself when done; the tab keeps serving meanwhile.
                        let _ = reply.send(controller.change_language(&lang).map(|_| ()));
                    }
                    Some(TabRequest::Show(reply)) => { let _ = reply.send(controller.snapshot()); }
                    Some(TabRequest::Dismiss) => controller.dismiss_error(),
                    Some(TabRequest::Leave) => controller.leave(),
                    None => break,
                }
            }
            env = controller.next_inbound(), if joined => {
                if let Some(env) = env {
                    controller.handle_inbound(env);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn print_state(tab: usize, state: &SessionState) {
    println!(
        "{} {} as {} (room id {}) -> {}",
        format!("[tab {}]", tab).bright_cyan(),
        state.room_name.bold(),
        state.local_name.bright_green(),
        state.room_identifier.as_str().dimmed(),
        state.target_language.bright_yellow()
    );
    println!("  participants: {}", state.participant_labels().join(", "));
    for msg in state.transcript.messages() {
        match msg.kind {
            MessageKind::System => println!("  {}", msg.original_text.italic().dimmed()),
            MessageKind::User => println!(
                "  {} {} {} {}",
                format!("{}:", msg.sender_name.as_deref().unwrap_or("?")).bright_blue(),
                msg.translated_text.as_deref().unwrap_or(""),
                format!("({})", msg.original_text).dimmed(),
                format!("[{}]", msg.detected_language.as_deref().unwrap_or("")).magenta()
            ),
        }
    }
    if let Some(err) = &state.last_error {
        println!("  {}", err.bright_red());
    }
}

fn print_error(msg: impl std::fmt::Display) {
    eprintln!("{} {}", "error:".bright_red(), msg);
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

fn tab_sender(tabs: &[mpsc::UnboundedSender<TabRequest>], tab: usize) -> Result<mpsc::UnboundedSender<TabRequest>, String> {
    tabs.get(tab).cloned().ok_or_else(|| format!("no tab {}, use /open", tab))
}

/// Send a request that expects a `Result` reply and wait for it.
async fn request<F>(tx: mpsc::UnboundedSender<TabRequest>, make: F) -> Result<(), String>
where
    F: FnOnce(oneshot::Sender<Result<(), ChatError>>) -> TabRequest,
{
    let (reply, done) = oneshot::channel();
    tx.send(make(reply)).map_err(|_| "tab is gone".to_string())?;
    done.await.map_err(|e| e.to_string())?.map_err(|e| e.to_string())
}

/// Run one REPL command. `Ok(false)` means quit.
async fn execute(
    command: Command,
    tabs: &mut Vec<mpsc::UnboundedSender<TabRequest>>,
    hub: &ChannelHub,
    gateway: &Arc<dyn TranslationGateway>,
    config: &ChatConfig,
) -> Result<bool, String> {
    match command {
        Command::Open => {
            let (tx, rx) = mpsc::unbounded_channel();
            let controller = SessionController::new(hub.clone(), Arc::clone(gateway))
                .with_default_language(config.default_language.clone());
            tokio::spawn(run_tab(controller, rx));
            tabs.push(tx);
            println!("opened tab {}", tabs.len() - 1);
        }
        Command::Join { tab, name, room, password } => {
            let mut join = JoinRequest::new(name, room);
            if let Some(p) = password {
                join = join.with_password(p);
            }
            request(tab_sender(tabs, tab)?, |reply| TabRequest::Join(join, reply)).await?;
        }
        Command::Say { tab, text } => {
            request(tab_sender(tabs, tab)?, |reply| TabRequest::Say(text, reply)).await?;
        }
        Command::Lang { tab, language } => {
            let lang = find_language(&language).ok_or_else(|| format!("unsupported language '{}'", language))?;
            request(tab_sender(tabs, tab)?, |reply| TabRequest::Lang(lang.name.to_string(), reply)).await?;
        }
        Command::Show { tab } => {
            let (reply, done) = oneshot::channel();
            tab_sender(tabs, tab)?
                .send(TabRequest::Show(reply))
                .map_err(|_| "tab is gone".to_string())?;
            match done.await.map_err(|e| e.to_string())? {
                Some(state) => print_state(tab, &state),
                None => println!("[tab {}] not joined", tab),
            }
        }
        Command::Dismiss { tab } => {
            let _ = tab_sender(tabs, tab)?.send(TabRequest::Dismiss);
        }
        Command::Leave { tab } => {
            let _ = tab_sender(tabs, tab)?.send(TabRequest::Leave);
        }
        Command::Langs => {
            for l in SUPPORTED_LANGUAGES {
                println!("  {:<4} {}", l.code, l.name);
            }
        }
        Command::Tabs => println!("{} tab(s) open", tabs.len()),
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("polyglot_chat=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.apply(ChatConfig::load(args.config.as_deref())?);
    let gateway: Arc<dyn TranslationGateway> = Arc::new(config.gateway()?);
    let hub = ChannelHub::with_capacity(config.channel_capacity);

    println!("{}", "Polyglot Chat".bold().bright_cyan());
    println!("provider={} model={}, /help for commands", config.provider, config.model());

    let mut tabs: Vec<mpsc::UnboundedSender<TabRequest>> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(c) => c,
            Err(e) => {
                print_error(e);
                continue;
            }
        };

        match execute(command, &mut tabs, &hub, &gateway, &config).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => print_error(e),
        }
    }

    // Dropping the senders ends every tab task, which leaves its room.
    drop(tabs);
    tokio::task::yield_now().await;
    Ok(())
}
