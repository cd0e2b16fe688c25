use std::io;
use std::io::Write;

use anyhow::bail;
use anyhow::Result;
use futures_util::StreamExt;
use parley_core::Action;
use parley_core::Event;
use parley_core::MessageStatus;
use parley_core::NotificationLevel;
use parley_core::SessionController;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::codec::FramedRead;
use tokio_util::codec::LinesCodec;

use crate::backend::Backend;
use crate::input::help_text;
use crate::input::parse_line;
use crate::input::Input;
use crate::render::Renderer;

fn write_out(text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Line-mode chat: stdin lines become actions, controller events are printed.
pub async fn run_chat(backend: &Backend) -> Result<()> {
    let (action_tx, action_rx) = mpsc::unbounded_channel::<Action>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let controller = SessionController::new(backend.controller_props(), event_tx);

    let mut background_futures = task::JoinSet::new();
    background_futures.spawn(controller.run(action_rx));

    let mut renderer = Renderer::default();
    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    let mut streaming = false;

    write_out(&format!("{}\n\n", help_text()))?;

    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else {
                    break;
                };
                match parse_line(&line?, renderer.sessions()) {
                    Input::Action(action) => {
                        if action == Action::RefreshSessions {
                            renderer.show_sessions_next();
                        }
                        action_tx.send(action)?;
                    }
                    Input::Help => write_out(&format!("{}\n", help_text()))?,
                    Input::Quit => break,
                    Input::Invalid(message) => write_out(&format!("{message}\n"))?,
                    Input::Empty => {}
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                match &event {
                    Event::MessageAppended(message) if message.is_in_flight() => streaming = true,
                    Event::StreamFinished { .. } => streaming = false,
                    _ => {}
                }
                write_out(&renderer.render(&event))?;
            }
            _ = tokio::signal::ctrl_c() => {
                if !streaming {
                    break;
                }
                streaming = false;
                action_tx.send(Action::Stop)?;
            }
            res = background_futures.join_next() => {
                if let Some(res) = res {
                    res??;
                }
                break;
            }
        }
    }

    drop(action_tx);
    background_futures.shutdown().await;

    Ok(())
}

/// Sends `text` as the first message of a new chat and prints the reply.
pub async fn send_once(backend: &Backend, text: &str) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let mut controller = SessionController::new(backend.controller_props(), event_tx);
    let mut renderer = Renderer::reply_only();
    let mut failed = false;

    controller
        .handle_action(Action::SendMessage(text.to_string()))
        .await?;

    loop {
        while let Ok(event) = event_rx.try_recv() {
            if let Event::Notification(notification) = &event {
                failed |= notification.level == NotificationLevel::Error;
            }
            write_out(&renderer.render(&event))?;
        }

        if !controller.conversation().is_streaming() {
            break;
        }
        controller.process_next().await?;
    }

    let reply_failed = controller
        .conversation()
        .messages()
        .last()
        .is_some_and(|message| message.status == MessageStatus::Failed);
    if failed || reply_failed {
        bail!("The message could not be completed");
    }

    Ok(())
}
