//! One-shot query mode
//!
//! Routes a single query through the director and prints the event stream
//! as it arrives.

use director_core::{Director, Event, Query};
use futures::StreamExt;
use nu_ansi_term::Color;
use std::io::Write;

/// Stream one query to stdout. Fails when the task ends in `Failed`.
pub async fn run_query(
    director: &Director,
    text: String,
    session: Option<String>,
    token: Option<String>,
) -> anyhow::Result<()> {
    let session_id = session.unwrap_or_else(|| "cli".to_string());
    let mut query = Query::new(text, session_id);
    if let Some(token) = token {
        query = query.with_credential(token);
    }

    let mut events = director.stream(query);
    let mut stdout = std::io::stdout();
    let mut failure = None;

    while let Some(event) = events.next().await {
        write!(stdout, "{}", render(&event))?;
        stdout.flush()?;
        if let Event::Failed { reason, .. } = &event {
            failure = Some(*reason);
        }
    }

    match failure {
        Some(reason) => anyhow::bail!("query failed: {}", reason),
        None => Ok(()),
    }
}

/// Terminal rendering of one event
fn render(event: &Event) -> String {
    match event {
        Event::Working { message } => {
            format!("{}\n", Color::DarkGray.paint(format!("… {}", message)))
        }
        Event::ContentChunk { text, .. } => text.clone(),
        Event::Completed { message } => {
            format!("\n{}\n", Color::Green.bold().paint(format!("✓ {}", message)))
        }
        Event::Failed { reason, detail } => format!(
            "\n{}\n",
            Color::Red.bold().paint(format!("✗ {}: {}", reason, detail))
        ),
    }
}
