//! `assetlens ask` and the interactive `assetlens chat`.

use std::path::Path;

use anyhow::Result;
use assetlens_pipeline::AnalysisPipeline;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::analyze_cmd;
use crate::render::{note_error, note_info, print_notification};

pub async fn ask(pipeline: &AnalysisPipeline, text: &str, voice: bool) -> Result<()> {
    let mut rx = pipeline.subscribe();
    let result = pipeline.submit_text(text, voice).await;
    match result {
        Ok(reply) => {
            println!("{reply}");
            if voice {
                pipeline.finish_speaking().await;
            }
        }
        Err(e) => note_error(&e.user_message()),
    }
    while let Ok(notification) = rx.try_recv() {
        if matches!(notification, assetlens_core::Notification::SpeechFailed { .. }) {
            print_notification(&notification);
        }
    }
    Ok(())
}

enum ChatCommand<'a> {
    Quit,
    Image(&'a str),
    Machine(Option<&'a str>),
    History,
    Ask(&'a str),
    Empty,
}

fn parse_line(line: &str) -> ChatCommand<'_> {
    let line = line.trim();
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit" | "/exit", _) => ChatCommand::Quit,
        ("/image", path) if !path.trim().is_empty() => ChatCommand::Image(path.trim()),
        ("/machine", id) => ChatCommand::Machine(Some(id.trim()).filter(|s| !s.is_empty())),
        ("/history", _) => ChatCommand::History,
        _ if line.is_empty() => ChatCommand::Empty,
        _ => ChatCommand::Ask(line),
    }
}

/// Line-oriented chat on stdin. Slash commands: `/image <path>`, `/machine [id]`, `/history`, `/quit`.
pub async fn chat(pipeline: &AnalysisPipeline, voice: bool) -> Result<()> {
    note_info("Ask about the equipment. /image <path> analyzes a photo, /quit leaves.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Empty => {}
            ChatCommand::Image(path) => {
                if let Err(e) = analyze_cmd::run(pipeline, Path::new(path)).await {
                    note_error(&e.to_string());
                }
            }
            ChatCommand::Machine(id) => {
                pipeline.set_machine_id(id.map(str::to_string));
                note_info(&format!("Machine set to {}", id.unwrap_or("(none)")));
            }
            ChatCommand::History => {
                for turn in pipeline.history() {
                    println!("[{:?}] {}", turn.role, turn.text);
                }
            }
            ChatCommand::Ask(text) => ask(pipeline, text, voice).await?,
        }
    }
    Ok(())
}
