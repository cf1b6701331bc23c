use std::{
    error::Error,
    fs::File,
    io::{self, Stdout},
    sync::Mutex,
};

use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{prelude::CrosstermBackend, Terminal};
use task_board::{
    config::Config,
    gateway::HttpGateway,
    sync::{execute as perform, Completion, Intent, Request, Synchronizer},
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ui::{Action, Screen};

mod ui;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    init_logging(&config)?;

    let gateway = HttpGateway::new(&config.base_url, config.request_timeout())?;
    let screen = Screen::new(config.show_loading_indicator());

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, gateway, screen).await;
    restore_terminal(&mut terminal)?;
    result
}

fn init_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let Some(path) = &config.log_file else {
        return Ok(());
    };
    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_board=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    tracing::info!(base_url = %config.base_url, "starting task-board");
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, Box<dyn Error>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    Ok(terminal.show_cursor()?)
}

/// Spawns the gateway call on the runtime; its completion comes back through
/// `completions` and is applied by the event loop.
fn submit(gateway: &HttpGateway, completions: &UnboundedSender<Completion>, request: Option<Request>) {
    let Some(request) = request else {
        return;
    };
    let gateway = gateway.clone();
    let completions = completions.clone();
    tokio::spawn(async move {
        let completion = perform(&gateway, request).await;
        completions.send(completion).ok();
    });
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    gateway: HttpGateway,
    mut screen: Screen,
) -> Result<(), Box<dyn Error>> {
    let mut sync = Synchronizer::new();
    let mut revisions = sync.subscribe();
    let (completions_tx, mut completions) = mpsc::unbounded_channel();
    let mut events = EventStream::new();

    submit(&gateway, &completions_tx, sync.handle(Intent::LoadUsers));

    let mut dirty = true;
    loop {
        if dirty || revisions.has_changed().unwrap_or(false) {
            revisions.mark_unchanged();
            screen.sync_with(&sync.view());
            terminal.draw(|frame| ui::draw(frame, &sync.view(), &mut screen))?;
            dirty = false;
        }

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    dirty = true;
                    let action = screen.on_key(key, &sync.view());
                    match action {
                        Action::Quit => break,
                        Action::Intent(intent) => {
                            submit(&gateway, &completions_tx, sync.handle(intent))
                        }
                        Action::None => {}
                    }
                }
                Some(Ok(Event::Resize(_, _))) => dirty = true,
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error.into()),
                None => break,
            },
            Some(completion) = completions.recv() => sync.apply(completion),
        }
    }
    Ok(())
}
