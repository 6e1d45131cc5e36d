use std::io::Write;

use anyhow::Result;
use play8_core::models::{StreamManagerEvent, TurnStatus};
use play8_core::services::PersistOutcome;
use play8_core::{Navigator, SwitchOutcome, TurnOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::debug;

use crate::App;
use crate::render;

const HELP: &str = "\
Commands:
  /new                 start a new conversation
  /list                list saved conversations
  /open <n|id>         open a conversation
  /delete <n|id>       delete a conversation
  /cards               show the cards of this conversation
  /toggle <card> <step>  check or uncheck a card step
  /add <card>          add a card to the training plan
  /plan                show the training plan
  /studio              suggest catalog cards for this conversation
  /quit                exit
Anything else is sent to the coach.";

/// The terminal has a single view; navigation only reports where we are.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn show_conversation(&self, id: &str) {
        debug!(conv_id = %id, "Now showing conversation");
    }

    fn show_new_conversation(&self) {
        println!("-- new conversation --");
    }
}

fn print_event(event: StreamManagerEvent) {
    match event {
        StreamManagerEvent::TurnStarted { .. } => print!("coach> "),
        StreamManagerEvent::TextChunk { text, .. } => print!("{text}"),
        StreamManagerEvent::TurnEnded { status, .. } => {
            println!();
            if let TurnStatus::Failed(reason) = status {
                debug!(reason = %reason, "Turn failed");
            }
        }
        _ => {}
    }
    let _ = std::io::stdout().flush();
}

/// Send one message and stream the reply to stdout as it arrives.
pub async fn send_and_print(app: &App, text: &str) -> Result<TurnOutcome> {
    let mut events = app.chat.subscribe();
    let cards_before = app.chat.cards().len();

    let send = app.chat.send_message(text);
    tokio::pin!(send);
    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome?,
            event = events.recv() => match event {
                Ok(event) => print_event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event printer fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => {}
            },
        }
    };
    while let Ok(event) = events.try_recv() {
        print_event(event);
    }

    match outcome {
        TurnOutcome::Failed => {
            if let Some(reply) = app.chat.messages().last() {
                println!("coach> {}", reply.content());
            }
        }
        TurnOutcome::LoginRequired => {
            println!("Sign in at {} and restart with --cookie", app.auth.login_url());
        }
        TurnOutcome::Completed | TurnOutcome::Superseded => {}
    }

    let new_cards = app.chat.cards().len().saturating_sub(cards_before);
    if new_cards > 0 {
        println!("({new_cards} new card(s), /cards to view)");
    }
    Ok(outcome)
}

/// Resolve `/open 2` or `/open <id>` against the loaded conversation list.
fn conversation_ref(app: &App, arg: &str) -> Option<String> {
    let conversations = app.chat.conversations();
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 && n <= conversations.len() => Some(conversations[n - 1].id.clone()),
        _ if !arg.is_empty() => Some(arg.to_string()),
        _ => None,
    }
}

fn one_based(arg: Option<&str>) -> Option<usize> {
    arg.and_then(|value| value.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
}

pub async fn run(app: &App) -> Result<()> {
    app.chat.load_conversations().await;
    if app.chat.messages().is_empty() {
        println!("play8 coach. Ask about your game, or /help for commands.");
    } else {
        render::print_transcript(&app.chat.messages());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        match parts.next().unwrap_or_default() {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/new" => app.chat.new_conversation(),
            "/list" => {
                app.chat.load_conversations().await;
                render::print_conversations(&app.chat.conversations());
            }
            "/open" => {
                let Some(id) = parts.next().and_then(|arg| conversation_ref(app, arg)) else {
                    println!("Usage: /open <n|id>");
                    continue;
                };
                match app.chat.switch_conversation(&id).await {
                    SwitchOutcome::Loaded => render::print_transcript(&app.chat.messages()),
                    SwitchOutcome::AlreadyLoaded => println!("Already open."),
                    SwitchOutcome::Missing => println!("Conversation {id} could not be loaded."),
                    SwitchOutcome::Superseded => {}
                }
            }
            "/delete" => {
                let Some(id) = parts.next().and_then(|arg| conversation_ref(app, arg)) else {
                    println!("Usage: /delete <n|id>");
                    continue;
                };
                app.chat.delete_conversation(&id).await;
                println!("Deleted {id}.");
            }
            "/cards" => render::print_cards(&app.chat.cards()),
            "/toggle" => {
                let cards = app.chat.cards();
                let card = one_based(parts.next()).and_then(|n| cards.get(n));
                let (Some(card), Some(step)) = (card, one_based(parts.next())) else {
                    println!("Usage: /toggle <card> <step>");
                    continue;
                };
                match app.chat.toggle_card_step(card.id, step).await {
                    Ok(Some(PersistOutcome::Saved)) | Ok(None) => {}
                    Ok(Some(_)) => println!("Progress could not be saved; kept locally."),
                    Err(e) => println!("{e}"),
                }
                render::print_cards(&app.chat.cards());
            }
            "/add" => {
                let cards = app.chat.cards();
                let Some(card) = one_based(parts.next()).and_then(|n| cards.get(n)) else {
                    println!("Usage: /add <card>");
                    continue;
                };
                match app.plan.add_card(card.content.clone()).await {
                    Ok(item) => println!("Added \"{}\" to your plan.", item.content.title),
                    Err(e) => println!("Could not add to plan: {e}"),
                }
            }
            "/plan" => {
                if app.plan.load().await {
                    render::print_board(&app.plan.board());
                } else {
                    println!("Could not load the training plan.");
                }
            }
            "/studio" => {
                let text = app.chat.conversation_text();
                let matches = app.studio.contextual_matches(&text);
                if matches.is_empty() {
                    println!("No related catalog cards yet.");
                } else {
                    render::print_suggestions(&matches);
                }
            }
            command if command.starts_with('/') => {
                println!("Unknown command {command}. Try /help.");
            }
            _ => {
                if let Err(e) = send_and_print(app, line).await {
                    println!("{e}");
                }
            }
        }
    }
    Ok(())
}
