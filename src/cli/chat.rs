use std::io::Write;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::chat::{ChatSession, NoticeLevel, Role, SessionEvent, SqliteChatStore};
use crate::core::{AppConfig, db::connect_and_initialize, init_tracing};

/// Turns session events into terminal output, writing each reply
/// delta as it arrives.
#[derive(Default)]
struct ReplyPrinter {
    streaming: bool,
    shown: usize,
}

impl ReplyPrinter {
    fn render(&mut self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::Loading { active: true } => {
                self.streaming = true;
                self.shown = 0;
                None
            }
            SessionEvent::Loading { active: false } => {
                self.streaming = false;
                Some("\n".to_string())
            }
            SessionEvent::Messages { messages } if self.streaming => {
                let last = messages.last().filter(|m| m.role == Role::Assistant)?;
                let delta = last.content.get(self.shown..)?.to_string();
                self.shown = last.content.len();
                (!delta.is_empty()).then_some(delta)
            }
            SessionEvent::Notice { notice } => {
                let prefix = match notice.level {
                    NoticeLevel::Success => "*",
                    NoticeLevel::Error => "!",
                };
                Some(format!("{} {}\n", prefix, notice.message))
            }
            _ => None,
        }
    }
}

fn print_transcript(session: &ChatSession) {
    for msg in session.messages() {
        let speaker = match msg.role {
            Role::User => "you",
            Role::Assistant => "floatmind",
        };
        println!("{}> {}", speaker, msg.content);
    }
}

pub async fn run(config: AppConfig, conversation_id: Option<String>) -> Result<()> {
    init_tracing(&format!("{}=info", env!("CARGO_CRATE_NAME")));

    let db = connect_and_initialize(&config.db_path).await?;
    let store = std::sync::Arc::new(SqliteChatStore::new(&db));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = ChatSession::from_config(&config)
        .store(store)
        .events(tx)
        .build();

    match &conversation_id {
        Some(id) => session.load(id).await?,
        None => {
            session.new_chat().await?;
        }
    }
    // Setup events were already shown by the transcript
    while rx.try_recv().is_ok() {}
    print_transcript(&session);

    let mut rl = DefaultEditor::new()?;
    let mut printer = ReplyPrinter::default();

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) if line.trim() == "/new" => {
                let started = session.new_chat().await.is_ok();
                while let Ok(event) = rx.try_recv() {
                    if let Some(out) = printer.render(&event) {
                        print!("{}", out);
                    }
                }
                if started {
                    print_transcript(&session);
                }
            }
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let mut send = std::pin::pin!(session.send(&line));
                let mut stdout = std::io::stdout();

                // Print while the reply streams in
                let result = loop {
                    tokio::select! {
                        result = &mut send => break result,
                        Some(event) = rx.recv() => {
                            if let Some(out) = printer.render(&event) {
                                print!("{}", out);
                                stdout.flush()?;
                            }
                        }
                    }
                };
                while let Ok(event) = rx.try_recv() {
                    if let Some(out) = printer.render(&event) {
                        print!("{}", out);
                    }
                }
                stdout.flush()?;

                // The error was already shown as a notice
                if let Err(e) = result {
                    tracing::debug!("Send failed: {:?}", e);
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
