// relaycard/src/main.rs
//
// Command-line front end. Single commands talk to the card directly;
// `button` and `interactive` run the request pipeline.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};

use relaycard_lib::io::channel_index;
use relaycard_lib::settings::{default_settings_path, load_settings};
use relaycard_lib::{
    connect_client, tlog, AppSettings, Logger, RelayError, RelayFlags, RelayPipeline, Result,
    Subscriber,
};

/// Waiting for a confirmation longer than this means it was dropped.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "relaycard", about = "Drive an 8-channel relay card over its serial port")]
struct Args {
    /// Settings file (defaults to ./relay_config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port, overrides the settings file
    #[arg(long)]
    port: Option<String>,

    /// Card address, overrides the settings file
    #[arg(long)]
    card: Option<u8>,

    /// Also log to a timestamped file in this directory (overrides "log_dir")
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log discarded chunks and idle polls
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current relay state
    State,
    /// Set all relays from 8 bits, channel 1 first (e.g. 10100000)
    Set { bits: String },
    /// Switch one channel (1-8) on
    On { channel: u8 },
    /// Switch one channel (1-8) off
    Off { channel: u8 },
    /// Invert one channel (1-8)
    Toggle { channel: u8 },
    /// Switch every relay on
    AllOn,
    /// Switch every relay off
    AllOff,
    /// Pulse channels 6-8 for 500 ms
    Pulse,
    /// Run a configured button through the request pipeline
    Button { label: String },
    /// Read commands from stdin and run them through the pipeline
    Interactive,
}

fn main() {
    let args = Args::parse();
    let log = Logger::new();
    log.set_verbose(args.verbose);

    if let Err(e) = run(args, &log) {
        tlog!(log, "[relaycard] {}", e);
        log.stop_file_logging();
        std::process::exit(1);
    }
    log.stop_file_logging();
}

fn run(args: Args, log: &Logger) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => default_settings_path()?,
    };
    let mut settings = load_settings(&config_path, true)?;
    if let Some(card) = args.card {
        settings.card_id = card;
    }
    if let Some(dir) = args.log_dir {
        settings.log_dir = Some(dir);
    }
    if let Some(reports) = settings.reports_dir() {
        log.start_file_logging(&reports)?;
    }

    let port = args
        .port
        .or_else(|| settings.port.clone())
        .ok_or_else(|| RelayError::configuration("no serial port given (--port or \"port\" in settings)"))?;

    let card = settings.card_id;
    let mut client = connect_client(&settings, &port, log)?;

    let state = match args.command {
        Command::State => client.query_state(card),
        Command::Set { bits } => parse_bits(&bits).and_then(|flags| client.set_all_relays(card, flags)),
        Command::On { channel } => channel_index(channel).and_then(|i| client.enable_relay(card, i)),
        Command::Off { channel } => channel_index(channel).and_then(|i| client.disable_relay(card, i)),
        Command::Toggle { channel } => channel_index(channel).and_then(|i| client.toggle_relay(card, i)),
        Command::AllOn => client.enable_all_relays(card),
        Command::AllOff => client.disable_all_relays(card),
        Command::Pulse => client.pulse(card),
        Command::Button { label } => return run_button(client, &settings, &label, log),
        Command::Interactive => return run_interactive(client, &settings, log),
    };

    let result = state.map(|flags| print_state(&settings, flags));
    client.shutdown();
    result
}

/// Parse `10100000` (channel 1 first) into a state vector.
fn parse_bits(bits: &str) -> Result<RelayFlags> {
    let flags = bits
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .map(|c| match c {
            '1' => Ok(true),
            '0' => Ok(false),
            other => Err(RelayError::range(format!("'{}' is not a bit", other))),
        })
        .collect::<Result<Vec<bool>>>()?;
    RelayFlags::try_from(flags.as_slice())
}

fn print_state(settings: &AppSettings, flags: RelayFlags) {
    let line: Vec<String> = flags
        .iter()
        .enumerate()
        .map(|(i, on)| format!("{}:{}", settings.channel_label(i), if on { "on" } else { "off" }))
        .collect();
    println!("{}", line.join(" "));
}

/// Subscriber that prints every confirmation and forwards it to `tx`.
fn printing_subscriber(settings: &AppSettings, tx: std_mpsc::Sender<RelayFlags>) -> Subscriber {
    let settings = settings.clone();
    let tx = Mutex::new(tx);
    Box::new(move |flags| {
        print_state(&settings, flags);
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(flags);
        }
    })
}

fn run_button(
    client: relaycard_lib::RelayCardClient,
    settings: &AppSettings,
    label: &str,
    log: &Logger,
) -> Result<()> {
    let button = settings
        .button(label)
        .cloned()
        .ok_or_else(|| RelayError::configuration(format!("no button labelled '{}'", label)))?;

    let (tx, rx) = std_mpsc::channel();
    let pipeline = RelayPipeline::start(
        client,
        settings.pipeline_config(),
        vec![printing_subscriber(settings, tx)],
        log.clone(),
    )?;

    // initial state
    let _ = rx.recv_timeout(CONFIRM_TIMEOUT);

    let queued = pipeline.apply(&button)?;
    let hold = Duration::from_millis(button.duration.unwrap_or(0));
    let mut confirmed = 0;
    while confirmed < queued {
        if rx.recv_timeout(CONFIRM_TIMEOUT + hold).is_err() {
            tlog!(log, "[relaycard] {} of {} requests confirmed", confirmed, queued);
            break;
        }
        confirmed += 1;
    }

    pipeline.stop();
    Ok(())
}

fn run_interactive(
    client: relaycard_lib::RelayCardClient,
    settings: &AppSettings,
    log: &Logger,
) -> Result<()> {
    let (tx, rx) = std_mpsc::channel();
    let pipeline = RelayPipeline::start(
        client,
        settings.pipeline_config(),
        vec![printing_subscriber(settings, tx)],
        log.clone(),
    )?;
    // confirmations are printed by the subscriber
    drop(rx);

    println!("commands: toggle N | set BITS | button LABEL | state | buttons | quit");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let outcome = match word {
            "" => Ok(()),
            "quit" | "exit" => break,
            "state" => {
                print_state(settings, pipeline.current_state());
                Ok(())
            }
            "buttons" => {
                for b in &settings.buttons {
                    println!("{:?} {:?} {:?}", b.label, b.action, b.targets);
                }
                Ok(())
            }
            "toggle" => rest
                .parse::<u8>()
                .map_err(|_| RelayError::range(format!("'{}' is not a channel", rest)))
                .and_then(channel_index)
                .and_then(|i| pipeline.toggle(i)),
            "set" => parse_bits(rest).and_then(|flags| pipeline.set_all(flags)),
            "button" => match settings.button(rest) {
                Some(button) => pipeline.apply(button).map(|_| ()),
                None => Err(RelayError::configuration(format!("no button labelled '{}'", rest))),
            },
            other => Err(RelayError::configuration(format!("unknown command '{}'", other))),
        };

        if let Err(e) = outcome {
            tlog!(log, "[relaycard] {}", e);
        }
    }

    pipeline.stop();
    Ok(())
}
