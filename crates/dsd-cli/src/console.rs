//! Console – line-driven cab simulator for the interactive shell.
//!
//! Commands:
//!   load <vendor> <name> | load <Vendor.Name>  – load a vehicle
//!   unload                                     – unload the vehicle
//!   reverser <v>                               – move the reverser
//!   set <channel> <v>                          – move any control
//!   press | release                            – operate the foot pedal
//!   advance <secs>                             – run the simulated clock
//!   status [--json]                            – show the session
//!   help                                       – show this list
//!   quit | exit                                – leave the console

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dsd_hal::{SimHost, SimPedal};
use dsd_middleware::TopicReceiver;
use dsd_runtime::{SessionStatus, Supervisor};
use dsd_types::{EventPayload, VehicleId, VigilanceState, channels};

/// Largest clock step `advance` accepts: one day.
const MAX_ADVANCE_SECS: i64 = 86_400;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load(VehicleId),
    Unload,
    Set { channel: String, value: f32 },
    Press,
    Release,
    Advance(i64),
    Status { json: bool },
    Help,
    Quit,
}

/// Parse one console line. Blank lines are `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("load", [key]) => Command::Load(
            VehicleId::parse(key).ok_or_else(|| format!("'{key}' is not Vendor.Name"))?,
        ),
        ("load", [vendor, name @ ..]) if !name.is_empty() => {
            Command::Load(VehicleId::new(*vendor, name.join(" ")))
        }
        ("unload", []) => Command::Unload,
        ("reverser", [value]) => Command::Set {
            channel: channels::REVERSER.to_string(),
            value: parse_value(value)?,
        },
        ("set", [channel, value]) => Command::Set {
            channel: channel.to_string(),
            value: parse_value(value)?,
        },
        ("press", []) => Command::Press,
        ("release", []) => Command::Release,
        ("advance", [secs]) => Command::Advance(
            secs.parse::<i64>()
                .ok()
                .filter(|s| (-MAX_ADVANCE_SECS..=MAX_ADVANCE_SECS).contains(s))
                .ok_or_else(|| {
                    format!("'{secs}' is not a whole number of seconds within ±{MAX_ADVANCE_SECS}")
                })?,
        ),
        ("advance", []) => Command::Advance(1),
        ("status", []) => Command::Status { json: false },
        ("status", ["--json"]) => Command::Status { json: true },
        ("help", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(format!("unknown command '{}'", line.trim())),
    };
    Ok(Some(command))
}

fn parse_value(raw: &str) -> Result<f32, String> {
    raw.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{raw}' is not a number"))
}

/// The simulated cab the console drives.
pub struct Console {
    pub host: Arc<SimHost>,
    pub pedal: Arc<SimPedal>,
    pub supervisor: Arc<Supervisor>,
}

impl Console {
    /// Apply one command. Returns `false` when the console should exit.
    pub fn execute(&self, command: Command) -> bool {
        match command {
            Command::Load(vehicle) => {
                println!("  Loading {}", vehicle.to_string().bold());
                self.host.load_vehicle(Some(vehicle));
            }
            Command::Unload => {
                println!("  Vehicle unloaded");
                self.host.load_vehicle(None);
            }
            Command::Set { channel, value } => {
                self.host.move_control(&channel, value);
                println!("  {} = {}", channel.bold(), value);
            }
            Command::Press => {
                self.pedal.press();
                println!("  Pedal {}", "down".green());
            }
            Command::Release => {
                self.pedal.lift();
                println!("  Pedal {}", "up".yellow());
            }
            Command::Advance(secs) => {
                let now = self.host.advance(secs);
                println!("  Clock {}", now.format("%H:%M:%S").to_string().bold());
            }
            Command::Status { json } => self.print_status(json),
            Command::Help => print_help(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                return false;
            }
        }
        true
    }

    fn print_status(&self, json: bool) {
        let Some(status) = self.supervisor.status() else {
            println!("  {}", "No session running.".dimmed());
            return;
        };
        if json {
            match serde_json::to_string_pretty(&status) {
                Ok(s) => println!("{s}"),
                Err(e) => println!("{}: {}", "Error".red(), e),
            }
            return;
        }
        print_status(&status, &self.host);
    }
}

fn print_status(status: &SessionStatus, host: &SimHost) {
    let vehicle = status
        .vehicle
        .as_ref()
        .map_or_else(|| "none".dimmed().to_string(), |v| v.to_string().bold().to_string());
    println!("{}", "Session".bold().underline());
    println!("  Vehicle  : {vehicle}");
    println!(
        "  Profile  : {}",
        status.profile.as_deref().unwrap_or("-").yellow()
    );
    println!("  State    : {}", styled_state(status.state));
    println!(
        "  Deadline : {}",
        status
            .deadline
            .map_or_else(|| "-".to_string(), |d| d.format("%H:%M:%S").to_string())
    );
    println!("  Clock    : {}", host.time().format("%H:%M:%S"));
    if status.needs_restart {
        println!("  {}", "Restart pending for new vehicle".yellow());
    }
}

fn styled_state(state: VigilanceState) -> colored::ColoredString {
    match state {
        VigilanceState::Inactive => state.to_string().dimmed(),
        VigilanceState::NeedsAck => state.to_string().red().bold(),
        VigilanceState::Confirmed => state.to_string().green(),
    }
}

fn print_help() {
    println!();
    println!("{}", "Console Commands".bold().underline());
    println!("  {}  – load a vehicle", "load <vendor> <name>".bold().cyan());
    println!("  {}                – unload the vehicle", "unload".bold().cyan());
    println!("  {}           – move the reverser", "reverser <v>".bold().cyan());
    println!("  {}      – move any control", "set <channel> <v>".bold().cyan());
    println!("  {}       – operate the pedal", "press  release".bold().cyan());
    println!("  {}        – run the clock", "advance <secs>".bold().cyan());
    println!("  {}      – show the session", "status [--json]".bold().cyan());
    println!("  {}            – exit", "quit  exit".bold().cyan());
    println!();
}

/// Read commands from stdin until `quit`, EOF or `shutdown`.
pub fn run(console: &Console, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "dsd>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match parse(&line) {
            Ok(None) => {}
            Ok(Some(command)) => {
                if !console.execute(command) {
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e.yellow(),
                "help".bold()
            ),
        }
    }
}

/// Print safety-relevant bus traffic as it happens.
pub async fn report_events(mut events: TopicReceiver) {
    while let Some(event) = events.recv().await {
        match event.payload {
            EventPayload::StateChanged { from, to } if from != to => {
                println!("\n  ▶ {} → {}", styled_state(from), styled_state(to));
            }
            EventPayload::EmergencyStop { channel } => {
                println!(
                    "\n  {} {}",
                    "⚠  EMERGENCY STOP".red().bold(),
                    format!("({channel})").dimmed()
                );
            }
            EventPayload::SessionStarted { vehicle, profile } => {
                println!(
                    "\n  {} {} using profile {}",
                    "✓".green().bold(),
                    vehicle.to_string().bold(),
                    profile.yellow()
                );
            }
            EventPayload::Fault { component, message } => {
                println!("\n  {} {}: {}", "Fault".red(), component.bold(), message);
            }
            _ => {}
        }
    }
}
