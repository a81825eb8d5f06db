//! `centralgate chat`: interactive REPL on the restored session.
//!
//! Each line is one turn. Files queued with `/attach` ride along with the
//! next message. Failure notices are shown and kept in the visible
//! conversation but never replayed upstream.

use std::path::Path;

use cg_domain::chat::{Attachment, ConversationTurn, Role};
use cg_domain::identity::Identity;
use cg_sessions::lifecycle::format_remaining;
use cg_sessions::AuthOutcome;

use super::login::require_session;
use super::read_attachment;
use crate::bootstrap;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the interactive chat REPL.
pub async fn chat(state: AppState) -> anyhow::Result<()> {
    let identity = require_session(&state).await?;

    // Long-lived: keep the stores fresh while the REPL is open.
    bootstrap::spawn_background_tasks(&state);

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".centralgate")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    let mut repl = Repl {
        state: &state,
        identity,
        visible: Vec::new(),
        pending: Vec::new(),
    };
    repl.visible = match state.turns.history(&repl.identity.id).await {
        Ok(turns) => turns,
        Err(e) => {
            eprintln!("\x1B[33mhistory unavailable: {e}\x1B[0m");
            Vec::new()
        }
    };

    let persona = state.settings.resolve_for(&repl.identity);
    eprintln!("{} | {}", persona.assistant_name, repl.identity.display_name);
    eprintln!("Type /help for commands, Ctrl+D to exit");
    eprintln!();
    if repl.visible.is_empty() {
        println!("{}", persona.greeting(&repl.identity.display_name));
    } else {
        eprintln!("({} earlier messages, /history to show)", repl.visible.len());
    }

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if repl.handle_slash_command(trimmed) {
                        break;
                    }
                    continue;
                }

                if let Err(e) = repl.send(trimmed).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REPL state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Repl<'a> {
    state: &'a AppState,
    identity: Identity,
    /// Everything shown so far, failure notices included.
    visible: Vec<ConversationTurn>,
    /// Attachments queued for the next message.
    pending: Vec<Attachment>,
}

impl Repl<'_> {
    async fn send(&mut self, text: &str) -> anyhow::Result<()> {
        // Re-checked per turn: an expired key never reaches upstream, and
        // override edits made by an operator apply to the next turn.
        match self.state.access.validate(&self.identity.secret) {
            AuthOutcome::Granted(fresh) => self.identity = fresh,
            AuthOutcome::Denied(reason) => {
                anyhow::bail!("{reason} (run `centralgate login`)")
            }
        }

        let attachments = std::mem::take(&mut self.pending);
        let outcome = self
            .state
            .turns
            .submit_turn(&self.identity, &self.visible, text, &attachments)
            .await?;

        self.visible
            .push(ConversationTurn::user(text).with_attachments(attachments));
        let turn = outcome.to_turn();
        if turn.is_error {
            println!("\x1B[33m{}\x1B[0m", turn.content);
        } else {
            println!("{}", turn.content);
        }
        self.visible.push(turn);
        Ok(())
    }

    /// Process a slash command. Returns `true` if the REPL should exit.
    fn handle_slash_command(&mut self, input: &str) -> bool {
        let (cmd, arg) = match input.split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (input, ""),
        };

        match cmd {
            "/exit" | "/quit" => return true,
            "/help" => print_help(),
            "/history" => {
                for turn in &self.visible {
                    println!("{}", render_turn(turn));
                }
            }
            "/attach" => {
                if arg.is_empty() {
                    eprintln!("Usage: /attach <path>");
                } else {
                    match read_attachment(Path::new(arg)) {
                        Ok(att) => {
                            eprintln!(
                                "Attached {} ({}, {} bytes)",
                                arg,
                                att.mime_type,
                                att.data.len()
                            );
                            self.pending.push(att);
                        }
                        Err(e) => eprintln!("\x1B[31m{e}\x1B[0m"),
                    }
                }
            }
            "/clear-attachments" => {
                self.pending.clear();
                eprintln!("Attachments cleared");
            }
            "/whoami" => match self.state.access.remaining_ttl(&self.identity) {
                Some(left) => eprintln!(
                    "{} ({}), expires in {}",
                    self.identity.display_name,
                    self.identity.class,
                    format_remaining(left)
                ),
                None => eprintln!("{} ({})", self.identity.display_name, self.identity.class),
            },
            other => eprintln!("Unknown command: {other} (try /help)"),
        }
        false
    }
}

fn print_help() {
    eprintln!("Commands:");
    eprintln!("  /attach <path>       Attach a file to the next message");
    eprintln!("  /clear-attachments   Drop queued attachments");
    eprintln!("  /history             Show the conversation so far");
    eprintln!("  /whoami              Show the session and time left");
    eprintln!("  /exit                Leave the chat");
}

fn render_turn(turn: &ConversationTurn) -> String {
    let who = match turn.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut line = format!("{who}> {}", turn.content);
    if !turn.attachments.is_empty() {
        line.push_str(&format!(" [+{} attachment(s)]", turn.attachments.len()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_roles_and_attachments() {
        let turn = ConversationTurn::user("look")
            .with_attachments(vec![Attachment::new("image/png", vec![1, 2])]);
        assert_eq!(render_turn(&turn), "you> look [+1 attachment(s)]");
        assert_eq!(
            render_turn(&ConversationTurn::assistant("hi")),
            "assistant> hi"
        );
    }
}
