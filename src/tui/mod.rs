pub mod app;
pub mod markdown;
pub mod render;

use crate::actions::{AppEvent, Dispatcher};
use crate::client::TaskClient;
use crate::config::Config;
use crate::poller::Poller;
use anyhow::Result;
use crossterm::event::{Event, EventStream};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures_util::{Stream, StreamExt};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::{Terminal, TerminalOptions, Viewport};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;

pub async fn run_tui(config: &Config) -> Result<()> {
    let client = TaskClient::new(&config.base_url())?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (thought_tx, thought_rx) = watch::channel(String::new());

    let dispatcher = Dispatcher::new(client.clone(), events_tx.clone());
    let mut poller = Poller::new(client, config.poll.interval(), thought_rx, events_tx);
    let mut app = app::App::new(dispatcher, thought_tx);
    app.dispatcher.load_history();
    info!("tui started against {}", config.base_url());

    let mut terminal = setup_terminal()?;
    let mut event_stream = EventStream::new();
    let result = event_loop(
        &mut terminal,
        &mut event_stream,
        &mut app,
        &mut poller,
        &mut events_rx,
    )
    .await;
    // Leave raw mode whether the loop quit or failed.
    poller.stop();
    restore_terminal(terminal)?;
    result
}

async fn event_loop<B, S>(
    terminal: &mut Terminal<B>,
    input: &mut S,
    app: &mut app::App,
    poller: &mut Poller,
    events_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()>
where
    B: Backend,
    S: Stream<Item = io::Result<Event>> + Unpin,
{
    let tick_rate = Duration::from_millis(50);

    loop {
        app.settle();
        poller.sync(app.should_poll());

        terminal.draw(|f| app.render(f))?;

        // Wait for a key, a finished request, or the redraw tick.
        tokio::select! {
            maybe_event = input.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_event {
                    if app.handle_key(key)? {
                        return Ok(());
                    }
                }
            }
            Some(event) = events_rx.recv() => {
                app.handle_event(event);
            }
            _ = tokio::time::sleep(tick_rate) => {}
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let (_, rows) = crossterm::terminal::size()?;
    let terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(rows),
        },
    )?;
    Ok(terminal)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UiSnapshot;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;

    fn quit_after(delay: Duration) -> impl Stream<Item = io::Result<Event>> + Unpin {
        Box::pin(futures_util::stream::once(async move {
            tokio::time::sleep(delay).await;
            Ok(Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)))
        }))
    }

    #[tokio::test]
    async fn loop_applies_flow_events_until_quit() {
        let mut h = app::test_support::app("http://127.0.0.1:1");
        let client = h.app.dispatcher.client().clone();
        let mut poller = Poller::new(
            client,
            Duration::from_secs(60),
            h.last_thought.clone(),
            h.sender.clone(),
        );
        h.sender
            .send(AppEvent::Polled(Ok(UiSnapshot {
                current_task_name: Some("Report".into()),
                ..Default::default()
            })))
            .unwrap();

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        let mut input = quit_after(Duration::from_millis(100));
        event_loop(&mut terminal, &mut input, &mut h.app, &mut poller, &mut h.events)
            .await
            .unwrap();

        assert_eq!(h.app.store.state().current_task_name, "Report");
        assert!(!poller.is_polling());
    }
}
