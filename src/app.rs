//! The event loop. All view state lives here, on one thread. Input and
//! fetch results arrive as [Event]s over a channel.

use crate::{
    config::Config,
    display,
    http::UreqTransport,
    lookup::{FetchOutcome, Lookup},
    state::ViewState,
};
use anyhow::Context;
use log::{error, info};
use std::{
    io::{self, BufRead, Write},
    mem,
    sync::{
        mpsc::{self, Sender},
        Arc,
    },
    thread,
};

#[derive(Debug)]
pub enum Event {
    /// A line of input. Sets the city, then asks for its weather
    Input(String),
    Fetched(FetchOutcome),
    Quit,
}

pub struct App {
    state: ViewState,
    lookup: Arc<Lookup>,
    /// Handed to fetch threads so they can report back
    events: Sender<Event>,
}

impl App {
    const QUIT_COMMANDS: &'static [&'static str] = &[":q", ":quit"];

    pub fn new(lookup: Lookup, events: Sender<Event>) -> Self {
        Self {
            state: ViewState::default(),
            lookup: Arc::new(lookup),
            events,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Handle a single event. Return `false` if the app should exit
    pub fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Input(line) => {
                if Self::QUIT_COMMANDS.contains(&line.as_str()) {
                    return false;
                }
                self.state.set_city(line);
                if let Some(city) = self.state.trigger() {
                    self.spawn_fetch(city);
                }
            }
            Event::Fetched(outcome) => self.state.complete(outcome),
            Event::Quit => return false,
        }
        true
    }

    /// Run a lookup in the background. The result comes back as an
    /// [Event::Fetched]
    fn spawn_fetch(&self, city: String) {
        let lookup = Arc::clone(&self.lookup);
        let events = self.events.clone();
        thread::spawn(move || {
            info!("Looking up weather for {city}");
            let outcome = lookup.run(&city);
            // Receiver is gone if we're shutting down, nothing to do
            let _ = events.send(Event::Fetched(outcome));
        });
    }
}

/// Run the app until the user quits
pub fn run(config: Config) -> anyhow::Result<()> {
    let (sender, receiver) = mpsc::channel();

    let ctrlc_sender = sender.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_sender.send(Event::Quit);
    })
    .context("Error setting Ctrl-C handler")?;
    spawn_input(sender.clone());

    let transport = Arc::new(UreqTransport::new(config.request_timeout));
    let mut app = App::new(Lookup::new(&config, transport), sender);

    let mut stdout = io::stdout();
    draw(&mut stdout, app.state())?;
    for event in receiver {
        if !app.handle(event) {
            break;
        }
        if app.state.take_dirty() {
            draw(&mut stdout, app.state())?;
        }
    }

    info!("Exiting");
    Ok(())
}

/// Read stdin line by line on a separate thread
fn spawn_input(events: Sender<Event>) {
    thread::spawn(move || {
        read_input(io::stdin().lock(), &events);
        let _ = events.send(Event::Quit);
    });
}

/// Forward each input line as an [Event::Input], until EOF or a read error.
/// Lines that aren't UTF-8 are logged and skipped.
fn read_input(mut reader: impl BufRead, events: &Sender<Event>) {
    let mut buffer = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => return, // EOF
            Ok(_) => {}
            Err(err) => {
                error!("Error reading input: {err}");
                return;
            }
        }

        // Strip the line terminator, nothing else
        if buffer.ends_with(b"\n") {
            buffer.pop();
            if buffer.ends_with(b"\r") {
                buffer.pop();
            }
        }
        let line = match String::from_utf8(mem::take(&mut buffer)) {
            Ok(line) => line,
            Err(err) => {
                error!("Ignoring input that isn't valid UTF-8: {err}");
                continue;
            }
        };
        if events.send(Event::Input(line)).is_err() {
            return;
        }
    }
}

fn draw(output: &mut impl Write, state: &ViewState) -> anyhow::Result<()> {
    writeln!(output, "\n{}", display::render(state))?;
    write!(output, "> ")?;
    output.flush().context("Error writing to stdout")
}
