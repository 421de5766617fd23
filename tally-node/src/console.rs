//! Line-oriented console over a running session.
//!
//! ```text
//! poll Lunch | Pizza, Tacos
//! vote Pizza
//! invite
//! join https://hub.example/invite#pzp%3A%2F%2F...
//! name Alice
//! show
//! quit
//! ```

use std::sync::Arc;

use tally_common::PollState;
use tally_core::{CommandOutcome, NewPoll, Session, SessionEvent};
use tally_peer::PeerNode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Poll(NewPoll),
    Vote(String),
    Invite,
    Join(String),
    Name(String),
    Show,
    Quit,
}

const USAGE: &str = "commands: poll <title> | <a>, <b>... | vote <option> | invite | join <uri> | name <name> | show | quit";

fn required(rest: &str, what: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("missing {what}"))
    } else {
        Ok(rest.to_string())
    }
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match word {
            "poll" => {
                let (title, options) = rest
                    .split_once('|')
                    .ok_or_else(|| "expected: poll <title> | <a>, <b>".to_string())?;
                Ok(ConsoleCommand::Poll(NewPoll::new(title.trim(), options.split(',').map(str::trim))))
            }
            "vote" => required(rest, "option").map(ConsoleCommand::Vote),
            "invite" => Ok(ConsoleCommand::Invite),
            "join" => required(rest, "invite").map(ConsoleCommand::Join),
            "name" => required(rest, "name").map(ConsoleCommand::Name),
            "show" => Ok(ConsoleCommand::Show),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            "" => Err(USAGE.to_string()),
            other => Err(format!("unknown command '{other}'; {USAGE}")),
        }
    }
}

pub fn render_poll(state: &PollState) -> String {
    if state.is_empty() {
        return "no poll yet".to_string();
    }
    let mut out = format!("📊 {} ({} votes)", state.title, state.total_votes());
    for result in state.results() {
        out.push_str(&format!("\n  {:<20} {:>4} {:>3}%", result.option, result.count, result.percentage));
    }
    out
}

/// Prints push notifications until the session goes away.
pub fn spawn_event_printer<P: PeerNode>(session: &Session<P>) -> JoinHandle<()> {
    let mut events = session.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::PollUpdate(update)) => {
                    println!("📣 poll: {} [{}]", update.title, update.options.join(", "));
                }
                Ok(SessionEvent::VoteUpdate(update)) => {
                    println!("🗳️ {} voted {} {:?}", update.voter, update.option, update.votes);
                }
                Ok(SessionEvent::Connections(list)) => {
                    let labels: Vec<String> = list.iter().filter(|c| c.is_connected()).map(|c| c.label()).collect();
                    println!("🌐 connected: {}", if labels.is_empty() { "-".to_string() } else { labels.join(", ") });
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "console missed events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Runs one command. Returns false on `quit`.
pub async fn execute<P: PeerNode>(session: &Session<P>, command: ConsoleCommand) -> bool {
    let outcome = match command {
        ConsoleCommand::Quit => return false,
        ConsoleCommand::Show => {
            println!("{}", render_poll(&session.poll_snapshot()));
            Ok(())
        }
        ConsoleCommand::Poll(poll) => session.create_poll(poll).await.map(|_| ()),
        ConsoleCommand::Vote(option) => session.cast_vote(&option).await.map(|_| ()),
        ConsoleCommand::Name(name) => session.set_profile_name(&name).await,
        ConsoleCommand::Invite => session.create_invite().await.map(|url| println!("🔗 {url}")),
        ConsoleCommand::Join(uri) => session.consume_invite(&uri).await.map(|report| {
            for outcome in &report.outcomes {
                match outcome {
                    CommandOutcome::Joined { multiaddr } => println!("joined {multiaddr}"),
                    CommandOutcome::JoinFailed { multiaddr, reason } => println!("could not join {multiaddr}: {reason}"),
                    CommandOutcome::Followed { id } => println!("following {id}"),
                    CommandOutcome::ClaimPending { issuer_pubkey } => {
                        println!("promise from {issuer_pubkey} will be claimed on connect")
                    }
                    CommandOutcome::Rejected(e) => println!("skipped: {e}"),
                    CommandOutcome::Skipped { kind } => println!("skipped unknown '{kind}'"),
                }
            }
            if report.outcomes.is_empty() {
                println!("not a usable invite");
            }
        }),
    };
    if let Err(e) = outcome {
        error!("Command failed: {}", e);
        println!("❌ {e}");
    }
    true
}

/// Reads commands from `input` until `quit` or end of input.
pub async fn run_console<P, R>(session: Arc<Session<P>>, input: R) -> std::io::Result<()>
where
    P: PeerNode,
    R: AsyncBufRead + Unpin,
{
    let printer = spawn_event_printer(&session);
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match ConsoleCommand::parse(&line) {
            Ok(command) => {
                if !execute(&session, command).await {
                    break;
                }
            }
            Err(msg) => println!("{msg}"),
        }
    }

    printer.abort();
    Ok(())
}
