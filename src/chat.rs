//! Interactive chat and session commands.
//!
//! The REPL reads one line at a time: slash-commands manage the session,
//! anything else is a question for the corpus. A failed question never
//! exits the loop; the error is printed and recorded in the session log.
//! The prompt is only printed when stdin is a TTY, so piped input stays
//! clean.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use carrel_core::backend::Backend;
use carrel_core::citations;
use carrel_core::session::{ChatFilters, Message, Role};

use crate::client::Client;

pub async fn run_ask<B: Backend>(
    client: &mut Client<B>,
    question: &str,
    top_k: Option<u32>,
) -> Result<()> {
    let message = client.ask(question, top_k).await?;
    print_answer(client.base_url(), &message);
    Ok(())
}

pub async fn run_chat<B: Backend>(client: &mut Client<B>) -> Result<()> {
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!("carrel chat. Type a question, /help for commands, /quit to leave.");
        if !client.messages().is_empty() {
            println!(
                "Restored {} messages from the previous session.",
                client.messages().len()
            );
        }
        if !client.filters().is_empty() {
            print_filters(client.filters());
        }
    }

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            if !handle_slash(client, command)? {
                break;
            }
            continue;
        }

        match client.ask(input, None).await {
            Ok(message) => print_answer(client.base_url(), &message),
            Err(err) => eprintln!("Error: {}", err),
        }
    }

    Ok(())
}

/// Handle one slash-command. Returns false when the REPL should exit.
fn handle_slash<B: Backend>(client: &mut Client<B>, command: &str) -> Result<bool> {
    let mut tokens = command.split_whitespace();
    match tokens.next() {
        Some("quit") | Some("exit") => return Ok(false),
        Some("help") => print_help(),
        Some("history") => print_history(client.messages()),
        Some("clear") => {
            client.clear_messages();
            println!("Messages cleared.");
        }
        Some("filters") => {
            let rest: Vec<&str> = tokens.collect();
            if rest.is_empty() {
                print_filters(client.filters());
            } else {
                apply_filter_tokens(client, &rest);
                print_filters(client.filters());
            }
        }
        Some(other) => println!("Unknown command /{}; try /help.", other),
        None => print_help(),
    }
    Ok(true)
}

/// Parse `/filters` arguments: `reset`, `year-min N`, `year-max N`,
/// `author NAME` (repeatable).
fn apply_filter_tokens<B: Backend>(client: &mut Client<B>, tokens: &[&str]) {
    let mut update = ChatFilters::default();
    let mut authors: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "reset" => {
                client.clear_filters();
                i += 1;
            }
            "year-min" | "year-max" => {
                let field = tokens[i];
                match tokens.get(i + 1).and_then(|v| v.parse::<i32>().ok()) {
                    Some(year) => {
                        if field == "year-min" {
                            update.year_min = Some(year);
                        } else {
                            update.year_max = Some(year);
                        }
                        i += 2;
                    }
                    None => {
                        println!("{} needs a numeric year.", field);
                        i += 1;
                    }
                }
            }
            "author" => match tokens.get(i + 1) {
                Some(name) => {
                    authors.push((*name).to_string());
                    i += 2;
                }
                None => {
                    println!("author needs a name.");
                    i += 1;
                }
            },
            other => {
                println!("Unknown filter argument '{}'.", other);
                i += 1;
            }
        }
    }
    if !authors.is_empty() {
        update.authors = Some(authors);
    }
    if !(update.year_min.is_none() && update.year_max.is_none() && update.authors.is_none()) {
        client.merge_filters(update);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /filters [year-min N] [year-max N] [author NAME] [reset]");
    println!("  /history      show the conversation so far");
    println!("  /clear        drop all messages (filters stay)");
    println!("  /quit         leave the chat");
    println!("Anything else is sent to the corpus as a question.");
}

fn print_answer(base_url: &str, message: &Message) {
    println!("{}", message.content);
    if !message.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in message.sources.iter().enumerate() {
            let cited = citations::resolve(base_url, source);
            let year = source
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "n.d.".to_string());
            println!(
                "  [{}] {} ({}) [{}] {}",
                i + 1,
                source.title,
                year,
                cited.tier,
                cited.href
            );
        }
    }
    if let Some(ms) = message.latency_ms {
        println!("  ({} ms)", ms);
    }
}

fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages yet.");
        return;
    }
    for message in messages {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "carrel",
        };
        println!(
            "[{}] {:>6}: {}",
            message.timestamp.format("%Y-%m-%d %H:%M"),
            who,
            message.content
        );
        if !message.sources.is_empty() {
            println!("{:>25}({} sources)", "", message.sources.len());
        }
    }
}

fn print_filters(filters: &ChatFilters) {
    if filters.is_empty() {
        println!("Filters: none");
        return;
    }
    let mut parts: Vec<String> = Vec::new();
    if let Some(year) = filters.year_min {
        parts.push(format!("year >= {}", year));
    }
    if let Some(year) = filters.year_max {
        parts.push(format!("year <= {}", year));
    }
    if let Some(authors) = &filters.authors {
        parts.push(format!("authors: {}", authors.join(", ")));
    }
    println!("Filters: {}", parts.join(", "));
}

// === session subcommands ===

pub fn run_session_show<B: Backend>(client: &Client<B>, path: &Path) {
    println!("Session file: {}", path.display());
    print_filters(client.filters());
    println!();
    print_history(client.messages());
}

pub fn run_session_clear<B: Backend>(
    client: &mut Client<B>,
    messages_only: bool,
    filters_only: bool,
) -> Result<()> {
    match (messages_only, filters_only) {
        (true, true) => anyhow::bail!("--messages-only and --filters-only are mutually exclusive"),
        (true, false) => {
            client.clear_messages();
            println!("Messages cleared.");
        }
        (false, true) => {
            client.clear_filters();
            println!("Filters cleared.");
        }
        (false, false) => {
            client.clear_messages();
            client.clear_filters();
            println!("Session cleared.");
        }
    }
    Ok(())
}

pub fn run_session_filters<B: Backend>(
    client: &mut Client<B>,
    year_min: Option<i32>,
    year_max: Option<i32>,
    authors: Vec<String>,
    reset: bool,
) {
    if reset {
        client.clear_filters();
    }
    let update = ChatFilters {
        year_min,
        year_max,
        authors: if authors.is_empty() {
            None
        } else {
            Some(authors)
        },
    };
    if !update.is_empty() {
        client.merge_filters(update);
    }
    print_filters(client.filters());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use carrel_core::backend::memory::InMemoryBackend;

    fn test_client() -> Client<InMemoryBackend> {
        Client::without_persistence(InMemoryBackend::new(), &Config::default())
    }

    #[test]
    fn filter_tokens_merge_and_reset() {
        let mut client = test_client();
        apply_filter_tokens(&mut client, &["year-min", "1990", "author", "Curie"]);
        assert_eq!(client.filters().year_min, Some(1990));
        assert_eq!(
            client.filters().authors.as_deref(),
            Some(&["Curie".to_string()][..])
        );

        apply_filter_tokens(&mut client, &["year-max", "2000"]);
        assert_eq!(client.filters().year_min, Some(1990));
        assert_eq!(client.filters().year_max, Some(2000));

        apply_filter_tokens(&mut client, &["reset"]);
        assert!(client.filters().is_empty());
    }

    #[test]
    fn reset_then_set_in_one_command() {
        let mut client = test_client();
        apply_filter_tokens(&mut client, &["year-min", "1980"]);
        apply_filter_tokens(&mut client, &["reset", "year-min", "2005"]);
        assert_eq!(client.filters().year_min, Some(2005));
        assert_eq!(client.filters().year_max, None);
    }

    #[test]
    fn bad_year_is_ignored() {
        let mut client = test_client();
        apply_filter_tokens(&mut client, &["year-min", "soon"]);
        assert!(client.filters().is_empty());
    }
}
