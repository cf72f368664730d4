//! Wearable device application
//!
//! Serves one host over the TCP stand-in link, sends a camera frame on each
//! trigger, and plays the host's audio replies.
//!
//! Usage: `device [config.toml]`
//!
//! Console commands: `send` (or the configured trigger command), `press`,
//! `release`, `status`, `devices`, `quit`.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::io::BufRead;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glimpse_glass::{
    audio::{list_output_devices, CpalSink, PlaybackQueue, PlaybackWorker},
    capture::{FrameSource, ImageSender, PooledCamera},
    config::AppConfig,
    link::{spawn_listener, LoggedKeepAwake, TcpAdvertiser},
    session::{LinkEvent, Readiness, Session, SessionOptions},
    trigger::{parse_command, SharedButton},
};

/// What the console thread asks of the main loop
enum Console {
    Status,
    Devices,
    Quit,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Glimpse device");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;
    config.validate()?;

    // Playback side
    let readiness = Readiness::new();
    let (queue, consumer) = PlaybackQueue::new(config.audio.queue_capacity, config.audio.push_timeout());
    let audio_config = config.audio.clone();
    let worker = PlaybackWorker::spawn(consumer, readiness.clone(), move || CpalSink::new(&audio_config))?;

    // Capture side
    let source = match &config.capture.image_dir {
        Some(dir) => FrameSource::Directory(dir.clone()),
        None => FrameSource::Pattern,
    };
    let camera = PooledCamera::new(source, config.capture.frame_pool_size)?;
    let keep_awake = Arc::new(LoggedKeepAwake::new());
    let sender = ImageSender::new(Box::new(camera), keep_awake.clone(), config.capture.keep_awake_delay());

    // Link
    let listener = TcpListener::bind(&config.link.listen_addr)
        .with_context(|| format!("Failed to bind {}", config.link.listen_addr))?;
    let advertiser = TcpAdvertiser::new();
    let (event_tx, event_rx) = unbounded::<LinkEvent>();
    let _listener_handle = spawn_listener(listener, config.link.mtu, advertiser.clone(), event_tx.clone())?;
    tracing::info!(
        "{} advertising on {} (PSM {}, MTU {})",
        config.link.device_name,
        config.link.listen_addr,
        config.link.psm,
        config.link.mtu
    );

    let mut session = Session::new(
        SessionOptions::from(&config),
        queue,
        readiness,
        keep_awake,
        Box::new(advertiser),
        sender,
    );

    // Console
    let button = SharedButton::new();
    let (console_tx, console_rx) = unbounded::<Console>();
    spawn_console(config.trigger.command.clone(), button.clone(), event_tx, console_tx)?;

    tracing::info!("Ready. Type '{}' to capture, 'quit' to exit", config.trigger.command);

    let poll_interval = config.trigger.poll_interval();

    loop {
        match event_rx.recv_timeout(poll_interval) {
            Ok(event) => session.handle(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        session.poll_button(&button);
        session.tick(Instant::now());

        match console_rx.try_recv() {
            Ok(Console::Status) => {
                let stats = session.stats();
                println!("State:      {:?}", session.state());
                println!("Ready:      {}", session.readiness().is_ready());
                println!("Awaiting:   {}", session.is_awaiting_reply());
                println!("Reassembly: {:?}", stats.reassembly);
                println!("Queue:      {:?}", stats.queue);
                println!("Send:       {:?}", stats.send);
                println!("Playback:   {:?}", worker.stats());
            }
            Ok(Console::Devices) => print_output_devices(),
            Ok(Console::Quit) => break,
            Err(_) => {}
        }
    }

    tracing::info!("Shutting down");
    session.on_disconnect();
    drop(session);
    worker.join();
    Ok(())
}

fn spawn_console(
    command: String,
    button: SharedButton,
    events: Sender<LinkEvent>,
    console: Sender<Console>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("console".to_string()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };

            if let Some(source) = parse_command(&line, &command) {
                if events.send(LinkEvent::Trigger(source)).is_err() {
                    break;
                }
                continue;
            }

            let request = match line.trim().to_ascii_lowercase().as_str() {
                "" => continue,
                "press" => {
                    button.press();
                    continue;
                }
                "release" => {
                    button.release();
                    continue;
                }
                "status" => Console::Status,
                "devices" => Console::Devices,
                "quit" | "exit" => Console::Quit,
                other => {
                    println!("Unknown command: {}", other);
                    continue;
                }
            };
            if console.send(request).is_err() {
                break;
            }
        }
    })
}

fn print_output_devices() {
    println!("\n=== Available Output Devices ===");
    for device in list_output_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", device.name, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}
