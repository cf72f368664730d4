//! TCP stand-in for the wireless link
//!
//! One accepted TCP connection plays the role of the L2CAP channel: reads
//! of at most one MTU become chunk events, EOF becomes a disconnect, and
//! "advertising" means the listener accepts a new client. Only one client
//! is served at a time; connections arriving while one is open are closed
//! immediately.

use crossbeam_channel::Sender;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::LinkError;
use crate::link::{Advertiser, DataChannel};
use crate::session::LinkEvent;

/// Outbound half of an accepted connection
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl DataChannel for TcpChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError> {
        self.stream
            .write_all(bytes)
            .and_then(|_| self.stream.flush())
            .map_err(|e| LinkError::WriteFailure(e.to_string()))?;
        Ok(bytes.len())
    }
}

/// Advertising flag shared with the listener thread
#[derive(Debug, Clone)]
pub struct TcpAdvertiser {
    advertising: Arc<AtomicBool>,
}

impl TcpAdvertiser {
    pub fn new() -> Self {
        Self {
            advertising: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::Acquire)
    }

    /// Claim the advertising slot for an incoming client.
    /// Fails if a client is already being served.
    fn claim(&self) -> bool {
        self.advertising
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for TcpAdvertiser {
    fn default() -> Self {
        Self::new()
    }
}

impl Advertiser for TcpAdvertiser {
    fn start_advertising(&mut self) {
        self.advertising.store(true, Ordering::Release);
        tracing::info!("Advertising, waiting for connection...");
    }

    fn stop_advertising(&mut self) {
        self.advertising.store(false, Ordering::Release);
        tracing::debug!("Advertising stopped");
    }
}

/// Accept clients on `listener` and feed their traffic to `events`.
///
/// The listener runs for the life of the process; readers stop once the
/// event receiver is dropped.
pub fn spawn_listener(
    listener: TcpListener,
    mtu: u16,
    advertiser: TcpAdvertiser,
    events: Sender<LinkEvent>,
) -> std::io::Result<JoinHandle<()>> {
    let mtu = mtu.max(1);

    thread::Builder::new()
        .name("link-listener".to_string())
        .spawn(move || {
            for incoming in listener.incoming() {
                let stream = match incoming {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                };

                if !advertiser.claim() {
                    tracing::warn!("Rejecting second client; a channel is already open");
                    let _ = stream.shutdown(Shutdown::Both);
                    continue;
                }

                if let Err(e) = serve(stream, mtu, &events) {
                    tracing::warn!("Client setup failed: {}", e);
                    advertiser.advertising.store(true, Ordering::Release);
                }
            }
        })
}

fn serve(stream: TcpStream, mtu: u16, events: &Sender<LinkEvent>) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    stream.set_nodelay(true)?;
    let writer = stream.try_clone()?;

    tracing::info!("Channel established with {} (MTU {})", peer, mtu);
    if events
        .send(LinkEvent::Connected {
            channel: Box::new(TcpChannel::new(writer)),
            mtu,
        })
        .is_err()
    {
        return Ok(());
    }

    let reader_events = events.clone();
    start_reader(events, move || {
        thread::Builder::new()
            .name("link-reader".to_string())
            .spawn(move || read_chunks(stream, mtu as usize, reader_events))
    })
}

/// Run `spawn` for the reader of an announced channel. If it fails, close
/// the channel again so the session does not keep a dead connection.
fn start_reader<F>(events: &Sender<LinkEvent>, spawn: F) -> std::io::Result<()>
where
    F: FnOnce() -> std::io::Result<JoinHandle<()>>,
{
    if let Err(e) = spawn() {
        let _ = events.send(LinkEvent::Disconnected);
        return Err(e);
    }
    Ok(())
}

fn read_chunks(mut stream: TcpStream, mtu: usize, events: Sender<LinkEvent>) {
    let mut buf = vec![0u8; mtu];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if events.send(LinkEvent::ChunkReceived(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Read failed: {}", e);
                break;
            }
        }
    }
    let _ = events.send(LinkEvent::Disconnected);
}
