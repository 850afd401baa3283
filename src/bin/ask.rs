//! GameOverlay.Ask - Command-line question client
//!
//! Usage: game_overlay_ask <question...> [--game NAME | --document NAME]
//!
//! Without --game or --document the backend is asked which game is running.

use anyhow::{bail, Context, Result};
use game_overlay::backend::{AskRequest, BackendClient};
use game_overlay::config;
use tracing::info;

#[derive(Debug, PartialEq)]
enum Scope {
    Detect,
    Game(String),
    Document(String),
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(String, Scope)> {
    let mut words = Vec::new();
    let mut scope = Scope::Detect;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--game" => scope = Scope::Game(args.next().context("--game needs a name")?),
            "--document" => {
                scope = Scope::Document(args.next().context("--document needs a name")?)
            }
            _ => words.push(arg),
        }
    }

    if words.is_empty() {
        bail!("usage: game_overlay_ask <question...> [--game NAME | --document NAME]");
    }
    Ok((words.join(" "), scope))
}

fn main() -> Result<()> {
    // stdout carries only the answer
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let (question, scope) = parse_args(std::env::args().skip(1))?;
    let config = config::load_config();
    let client = BackendClient::from_config(&config)?;

    let request = match scope {
        Scope::Document(document) => AskRequest::about_document(&question, &document)?,
        Scope::Game(game) => AskRequest::about_game(&question, &game)?,
        Scope::Detect => {
            let game = client
                .detect_game()
                .context("Error detecting game")?
                .context("No game detected. Pass --game to name one.")?;
            info!("Asking about {}", game);
            AskRequest::about_game(&question, &game)?
        }
    };

    let answer = client.ask(&request)?;
    println!("{}", answer.response);
    Ok(())
}
