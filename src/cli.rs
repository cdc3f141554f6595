use std::path::PathBuf;

use clap::Parser;

use crate::config::ChatConfig;
use crate::providers::Provider;

#[derive(Parser)]
#[command(name = "polyglot-chat")]
#[command(version)]
#[command(about = "Multi-participant chat rooms with live per-reader translation")]
pub struct Args {
    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Translation provider: openai, anthropic or gemini
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Model name (defaults per provider)
    #[arg(long)]
    pub model: Option<String>,

    /// Target language new tabs start with
    #[arg(long)]
    pub language: Option<String>,

    /// Override the provider API base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

impl Args {
    /// Apply command-line overrides on top of a loaded config.
    pub fn apply(&self, mut config: ChatConfig) -> ChatConfig {
        if let Some(p) = self.provider {
            if p != config.provider {
                // A model picked for another provider would not resolve.
                config.model = None;
            }
            config.provider = p;
        }
        if let Some(m) = &self.model {
            config.model = Some(m.clone());
        }
        if let Some(l) = &self.language {
            config.default_language = l.clone();
        }
        if let Some(u) = &self.base_url {
            config.base_url = Some(u.clone());
        }
        config
    }
}

// ---------------------------------------------------------------------------
// REPL commands
// ---------------------------------------------------------------------------

/// One line of REPL input. Tabs are addressed by the index `/open` printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open,
    Join { tab: usize, name: String, room: String, password: Option<String> },
    Say { tab: usize, text: String },
    Lang { tab: usize, language: String },
    Show { tab: usize },
    Leave { tab: usize },
    Dismiss { tab: usize },
    Langs,
    Tabs,
    Help,
    Quit,
}

pub const HELP: &str = "\
/open                                 open a new tab
/join <tab> <name> <room> [password]  join a room from a tab (quote values with spaces)
/say <tab> <text>                     send a message
/lang <tab> <language>                change a tab's target language
/show <tab>                           print a tab's participants and transcript
/dismiss <tab>                        clear a tab's error notice
/leave <tab>                          leave the room
/tabs                                 list tabs
/langs                                list supported languages
/quit                                 exit";

const JOIN_USAGE: &str = "usage: /join <tab> <name> <room> [password]";

/// Split on whitespace, keeping `"double quoted"` runs together.
fn split_quoted(input: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    parts.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if quoted {
        return Err("unterminated quote".to_string());
    }
    if in_token {
        parts.push(current);
    }
    Ok(parts)
}

fn parse_tab(token: Option<&str>) -> Result<usize, String> {
    let t = token.ok_or("missing tab index")?;
    t.parse::<usize>().map_err(|_| format!("invalid tab index '{}'", t))
}

/// Parse one REPL line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();

    match head {
        "/open" => Ok(Command::Open),
        "/langs" => Ok(Command::Langs),
        "/tabs" => Ok(Command::Tabs),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        "/join" => {
            let mut parts = split_quoted(rest)?.into_iter();
            let tab = parse_tab(parts.next().as_deref())?;
            let name = parts.next().ok_or(JOIN_USAGE)?;
            let room = parts.next().ok_or(JOIN_USAGE)?;
            let password = parts.next();
            if parts.next().is_some() {
                return Err(format!("{}; quote arguments that contain spaces", JOIN_USAGE));
            }
            Ok(Command::Join { tab, name, room, password })
        }
        "/say" | "/lang" => {
            let (tab_tok, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let tab = parse_tab(Some(tab_tok).filter(|t| !t.is_empty()))?;
            let arg = arg.trim().to_string();
            if arg.is_empty() {
                return Err(format!("usage: {} <tab> <{}>", head, if head == "/say" { "text" } else { "language" }));
            }
            if head == "/say" {
                Ok(Command::Say { tab, text: arg })
            } else {
                Ok(Command::Lang { tab, language: arg })
            }
        }
        "/show" => Ok(Command::Show { tab: parse_tab(rest.split_whitespace().next())? }),
        "/leave" => Ok(Command::Leave { tab: parse_tab(rest.split_whitespace().next())? }),
        "/dismiss" => Ok(Command::Dismiss { tab: parse_tab(rest.split_whitespace().next())? }),
        other => Err(format!("unknown command '{}', try /help", other)),
    }
}
