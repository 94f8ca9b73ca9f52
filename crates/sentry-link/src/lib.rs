use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LinkError {
    /// The link never opened (or the mock peer went away); callers treat
    /// this as "hardware absent", not a fault.
    #[error("serial link unavailable")]
    Unavailable,
    #[error("serial I/O: {0}")]
    Io(#[from] std::io::Error),
}

enum Transport {
    Serial(SerialStream),
    Mem(DuplexStream),
    Disabled,
}

struct Inner {
    transport: Transport,
    rx: Vec<u8>,
}

/// Line-framed access to the actuator MCU.
///
/// A single lock covers both directions, so a keep-alive write can never
/// interleave with a telemetry read mid-frame.
pub struct SerialLink {
    inner: Mutex<Inner>,
}

impl SerialLink {
    /// Opens the device, or logs the failure and degrades to a disabled
    /// link that swallows all traffic. There is no reconnect: a link that
    /// fails here stays down until the process restarts.
    pub fn open(dev: &str, baud: u32) -> Self {
        match tokio_serial::new(dev, baud).open_native_async() {
            Ok(stream) => {
                debug!("serial: opened {} @ {}", dev, baud);
                Self::with_transport(Transport::Serial(stream))
            }
            Err(e) => {
                warn!("serial: open {} failed ({}); link disabled", dev, e);
                Self::with_transport(Transport::Disabled)
            }
        }
    }

    pub fn disabled() -> Self {
        Self::with_transport(Transport::Disabled)
    }

    /// In-memory link for mock mode and tests. The returned stream is the
    /// "hardware" end: what the turret writes can be read from it, and
    /// bytes written to it surface as telemetry lines.
    pub fn in_memory() -> (Self, DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(4096);
        (Self::with_transport(Transport::Mem(ours)), theirs)
    }

    fn with_transport(transport: Transport) -> Self {
        Self { inner: Mutex::new(Inner { transport, rx: Vec::new() }) }
    }

    pub async fn is_connected(&self) -> bool {
        !matches!(self.inner.lock().await.transport, Transport::Disabled)
    }

    /// Writes one newline-terminated line to the wire.
    pub async fn write_line(&self, line: &str) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().await;
        let mut framed = Vec::with_capacity(line.len() + 1);
        framed.extend_from_slice(line.as_bytes());
        framed.push(b'\n');
        match &mut inner.transport {
            Transport::Serial(s) => {
                s.write_all(&framed).await?;
                s.flush().await?;
            }
            Transport::Mem(s) => s.write_all(&framed).await?,
            Transport::Disabled => return Err(LinkError::Unavailable),
        }
        Ok(())
    }

    /// Non-blocking read: drains whatever bytes the port has ready and
    /// returns the first complete line, if any. Partial lines stay buffered
    /// for the next poll.
    pub async fn try_read_line(&self) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let mut chunk = [0u8; 256];
        loop {
            let read = match &mut inner.transport {
                Transport::Serial(s) => read_now(s, &mut chunk).await,
                Transport::Mem(s) => read_now(s, &mut chunk).await,
                Transport::Disabled => return None,
            };
            match read {
                Some(Ok(0)) => break, // peer closed
                Some(Ok(n)) => inner.rx.extend_from_slice(&chunk[..n]),
                Some(Err(e)) => {
                    warn!("serial: read error: {}", e);
                    break;
                }
                None => break, // nothing buffered right now
            }
        }
        take_line(&mut inner.rx)
    }
}

/// Polls a single read without waiting for data: the short timeout resolves
/// immediately when the descriptor has nothing buffered.
async fn read_now<R: AsyncRead + Unpin>(
    r: &mut R,
    buf: &mut [u8],
) -> Option<std::io::Result<usize>> {
    tokio::time::timeout(Duration::from_millis(1), r.read(buf)).await.ok()
}

fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buf.drain(..=pos).collect();
    let s = String::from_utf8_lossy(&line);
    Some(s.trim_end_matches(['\r', '\n']).to_string())
}
