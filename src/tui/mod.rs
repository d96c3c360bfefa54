//! Terminal dashboard for agensight
//!
//! Features:
//! - Versions view: browse, commit and sync configuration versions
//! - Traces view: recorded traces with latency and metadata
//! - Timeline view: Gantt chart of a trace's agent spans and tool calls
//!
//! Structured as TEA: [`msg`] describes what happened, [`update`] is the pure
//! state transition, [`ui`] draws. Network calls run on a [`worker`] thread so
//! the UI stays responsive.

pub mod msg; // TEA message types (what happened)
pub mod ui;
pub mod update; // TEA update function (state transitions)
pub mod views;
pub mod worker;

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{poll, read, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::info;

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::Result;
use msg::{key_to_msg, Msg};
use update::{update, Cmd, Model};
use worker::Worker;

/// Run the dashboard until the user quits
pub fn run(config: &Config, client: ApiClient) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app, ensuring cleanup happens even on error
    let result = run_app_inner(&mut terminal, config, client);

    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();

    result
}

fn run_app_inner<B: Backend>(
    terminal: &mut Terminal<B>,
    config: &Config,
    client: ApiClient,
) -> Result<()> {
    info!(backend = client.base_url(), "dashboard started");
    let worker = Worker::spawn(client)?;
    let (model, cmd) = Model::init(config.timeline_builder());
    dispatch(&worker, cmd);
    run_event_loop(terminal, model, &worker)
}

fn dispatch(worker: &Worker, cmd: Cmd) {
    for request in cmd.requests() {
        worker.send(request);
    }
}

fn run_event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    mut model: Model,
    worker: &Worker,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, &model))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if poll(timeout)? {
            if let Event::Key(key) = read()? {
                if key.kind == KeyEventKind::Press {
                    let msg = key_to_msg(key.code, key.modifiers, model.view, model.dialog.is_visible());
                    let (next, cmd) = update(msg, model);
                    model = next;
                    if cmd.is_quit() {
                        info!("dashboard closed");
                        return Ok(());
                    }
                    dispatch(worker, cmd);
                }
            }
        }

        // Worker replies (non-blocking)
        while let Some(reply) = worker.try_recv() {
            let (next, cmd) = update(reply, model);
            model = next;
            dispatch(worker, cmd);
        }

        if last_tick.elapsed() >= tick_rate {
            model = update(Msg::Tick, model).0;
            last_tick = Instant::now();
        }
    }
}
