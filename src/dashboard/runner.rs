use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::time::Duration;

use super::app::App;
use super::events::{handle_key_event, handle_mouse_event};
use super::ui;
use crate::composer::DashboardComposer;
use crate::config::Config;
use crate::models::WidgetCatalog;
use crate::Backend as StoreBackend;

pub async fn run_dashboard(config: &Config, backend: StoreBackend, simulate: bool) -> Result<()> {
    let tz = config.timezone()?;
    let catalog = WidgetCatalog::default();
    let orders = crate::build_order_store(config, &catalog, backend.client.clone());

    // Read the stored order and mount every widget before taking over the terminal
    let composer = DashboardComposer::mount(catalog, orders, backend.client.clone(), tz).await;
    let mut app = App::new(composer, backend.client.name().to_string());

    let traffic = match (&backend.demo, simulate) {
        (Some(demo), true) => Some(demo.spawn_traffic(Duration::from_secs(3))),
        (None, true) => {
            tracing::warn!("--simulate only applies to the offline demo store");
            None
        }
        _ => None,
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;

    let res = run_app(&mut terminal, &mut app, Duration::from_secs_f64(config.dashboard.refresh)).await;

    app.shutdown();
    if let Some(traffic) = traffic {
        traffic.abort();
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        tracing::error!(error = %err, "dashboard loop failed");
    }
    res.map_err(Into::into)
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, tick_rate: Duration) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Waiting for input blocks, so keep it off the async workers
        let ready = tokio::task::block_in_place(|| event::poll(tick_rate))?;
        if !ready {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                    return Ok(());
                }
                _ => handle_key_event(key, app),
            },
            Event::Mouse(mouse) => handle_mouse_event(mouse, app),
            _ => {}
        }
    }
}
