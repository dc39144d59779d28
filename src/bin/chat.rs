//! Terminal chat with MindBot. Replies arrive after a short typing delay and
//! you can keep typing meanwhile. `/log` prints the session, `/quit` exits.

use std::sync::Arc;

use anyhow::Context;
use mindcare_triage::random::ThreadRandom;
use mindcare_triage::scheduler::TokioScheduler;
use mindcare_triage::{
    telemetry, Message, Sender, SessionRegistry, Timeline, TriageConfig, TriageEngine,
    TriageError,
};
use tokio::io::{AsyncBufReadExt, BufReader};

fn render(m: &Message) -> String {
    let who = match m.sender {
        Sender::User => "you",
        Sender::Bot => "MindBot",
    };
    let stamp = m.created_at.format("%H:%M:%S");
    if m.is_crisis() && m.sender == Sender::Bot {
        format!("[{stamp}] !! {who} (crisis support): {}", m.body)
    } else {
        format!("[{stamp}] {who}: {}", m.body)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cfg = TriageConfig::from_env();
    telemetry::init_tracing(cfg.log_json);

    let policy = cfg.load_policy().context("loading response policy")?;
    let engine = Arc::new(TriageEngine::new(policy, Arc::new(ThreadRandom)));
    let timeline = Timeline::new(engine, Arc::new(TokioScheduler), cfg.typing);

    let registry = SessionRegistry::new();
    let user = std::env::var("USER").ok();
    let session = timeline.open_session(&registry, user.as_deref());
    for m in session.messages() {
        println!("{}", render(&m));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/log" => {
                for m in session.messages() {
                    println!("{}", render(&m));
                }
                continue;
            }
            _ => {}
        }

        match timeline.submit(&session, &line) {
            Ok(sub) => {
                println!("MindBot is typing...");
                tokio::spawn(async move {
                    match sub.pending.resolve().await {
                        Ok(bot) => println!("{}", render(&bot)),
                        Err(e) => eprintln!("reply failed: {e}"),
                    }
                });
            }
            Err(TriageError::InvalidInput(_)) => continue,
            Err(e) => eprintln!("error: {e}"),
        }
    }

    println!("Take care.");
    Ok(())
}
