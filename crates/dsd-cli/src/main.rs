//! `dsd-cli` – driver's safety device console
//!
//! This binary runs the vigilance watchdog against a simulated cab. It:
//!
//! 1. Loads `~/.dsd/config.toml`, writing the defaults on first run.
//! 2. Starts a [`Supervisor`] that keeps one session bound to whatever
//!    vehicle is loaded, rebuilding it after every vehicle change.
//! 3. Drops the user into an interactive console that moves controls,
//!    operates the pedal and runs the simulated clock.
//! 4. Intercepts **Ctrl-C** to close the session (silencing the alert and
//!    releasing the pedal) before exiting.

mod config;
mod console;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use dsd_hal::{SimHost, SimPedal, TracingAlert};
use dsd_kernel::ProfileResolver;
use dsd_middleware::EventBus;
use dsd_runtime::{Session, Supervisor};
use dsd_types::channels;

fn main() {
    // Logs go to stderr; the console owns stdout.
    let _telemetry = dsd_runtime::init_tracing("dsd");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – closing session …".yellow().bold());
        println!("  Press Enter to leave the console.");
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = load_config();
    let resolver = match cfg.resolver() {
        Ok(resolver) => resolver,
        Err(e) => {
            println!("{}: {}", "Vehicle table error".red(), e);
            println!("  Using the built-in vehicle table.");
            ProfileResolver::builtin()
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            std::process::exit(1);
        }
    };

    // ── Simulated cab ─────────────────────────────────────────────────────
    let host = SimHost::builder()
        .with_standard_panel()
        .with_channel(channels::EMERGENCY_STOP, 0.0)
        .with_channel(channels::THROTTLE_AND_BRAKE, 0.0)
        .build();
    let pedal = SimPedal::new();
    let bus = EventBus::default();

    let builder = Session::builder(host.clone(), pedal.clone(), Arc::new(TracingAlert::new()))
        .with_resolver(resolver)
        .with_settings(cfg.settings())
        .with_bus(bus.clone());
    let supervisor = Supervisor::new(builder);

    runtime.spawn(console::report_events(bus.subscribe()));
    let supervising = runtime.spawn(
        supervisor
            .clone()
            .run(shutdown.clone(), cfg.poll_interval()),
    );

    println!(
        "  No vehicle loaded. Try {} then {}.",
        "load RSC GEML".bold().cyan(),
        "help".bold().cyan()
    );
    println!();

    let console = console::Console {
        host,
        pedal,
        supervisor,
    };
    console::run(&console, shutdown.clone());

    shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = runtime.block_on(supervising) {
        warn!(error = %e, "supervisor ended abnormally");
    }
}

fn load_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ____  _____ ____ "#.bold().cyan());
    println!("{}", r#"   / __ \/ ___// __ \"#.bold().cyan());
    println!("{}", r#"  / / / /\__ \/ / / /"#.bold().cyan());
    println!("{}", r#" / /_/ /___/ / /_/ / "#.bold().cyan());
    println!("{}", r#"/_____//____/_____/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "DSD".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Driver's safety device");
    println!();
}
