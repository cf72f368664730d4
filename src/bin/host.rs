//! Host peer application
//!
//! Connects to the device, saves every image it sends, and answers each one
//! with an audio clip written in MTU-sized chunks.
//!
//! Usage: `host [device-addr] [reply.pcm] [config.toml]`
//!
//! The reply file is raw s16le PCM at the device's sample rate. Without one,
//! a short tone is generated.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glimpse_glass::{
    config::AppConfig,
    protocol::{encode_frame, FrameReassembler, Ingest},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Glimpse host");

    let mut args = std::env::args().skip(1);
    let target = args.next();
    let reply_path = args.next().map(PathBuf::from);
    let config_path = args.next().map(PathBuf::from);

    let config = AppConfig::load_or_default(config_path.as_deref())?;
    let target = target.unwrap_or_else(|| config.link.listen_addr.clone());

    let reply = match &reply_path {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read reply audio {}", path.display()))?,
        None => tone(config.audio.sample_rate, config.audio.channels, 440.0, 0.5),
    };
    let reply_frame = encode_frame(&reply)?;
    tracing::info!("Reply clip: {} bytes of PCM", reply.len());

    let out_dir = PathBuf::from("received");
    tokio::fs::create_dir_all(&out_dir).await?;

    let mut stream = TcpStream::connect(&target)
        .await
        .with_context(|| format!("Failed to connect to {}", target))?;
    stream.set_nodelay(true)?;
    tracing::info!("Connected to {}", target);

    let mtu = config.link.mtu.max(1) as usize;
    let mut reassembler = FrameReassembler::new(config.transfer.max_payload_bytes);
    let mut buf = vec![0u8; mtu];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            tracing::info!("Device closed the connection");
            break;
        }

        match reassembler.ingest(&buf[..n]) {
            Ok(Ingest::Incomplete) => {}
            Ok(Ingest::Completed(image)) => {
                let path = save_image(&out_dir, &image.data).await?;
                tracing::info!("Saved image #{} ({} bytes) to {}", image.sequence, image.data.len(), path.display());

                for chunk in reply_frame.chunks(mtu) {
                    stream.write_all(chunk).await?;
                }
                stream.flush().await?;
                tracing::info!("Sent reply ({} bytes in {} chunks)", reply_frame.len(), reply_frame.len().div_ceil(mtu));
            }
            Err(e) => tracing::warn!("Dropped inbound transfer: {}", e),
        }
    }

    let stats = reassembler.stats();
    tracing::info!(
        "Received {} images ({} aborted, {} bytes)",
        stats.transfers_completed,
        stats.transfers_aborted,
        stats.bytes_received
    );
    Ok(())
}

async fn save_image(dir: &Path, data: &[u8]) -> Result<PathBuf> {
    let name = format!("image-{}.jpg", chrono::Local::now().format("%Y%m%d-%H%M%S%.3f"));
    let path = dir.join(name);
    tokio::fs::write(&path, data).await?;
    Ok(path)
}

/// Interleaved s16le sine tone
fn tone(sample_rate: u32, channels: u16, freq: f32, seconds: f32) -> Vec<u8> {
    let frames = (sample_rate as f32 * seconds) as usize;
    let mut pcm = Vec::with_capacity(frames * channels as usize * 2);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = ((t * freq * std::f32::consts::TAU).sin() * 0.3 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
    }
    pcm
}
