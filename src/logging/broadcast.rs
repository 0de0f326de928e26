use super::state::LOG_BROADCAST_TX;
use std::io::{self, Write};
use tokio::sync::broadcast;
use tracing_subscriber::fmt::writer::MakeWriter;

/// Capacity of the live log channel; slow SSE clients skip lines beyond it
const LOG_CHANNEL_CAPACITY: usize = 512;

#[derive(Clone)]
pub struct BroadcastMakeWriter {
    pub(crate) tx: broadcast::Sender<String>,
}

/// Buffers one formatted event and publishes it as a single line on drop
pub struct BroadcastWriter {
    tx: broadcast::Sender<String>,
    buffer: Vec<u8>,
}

impl<'a> MakeWriter<'a> for BroadcastMakeWriter {
    type Writer = BroadcastWriter;
    fn make_writer(&'a self) -> Self::Writer {
        BroadcastWriter {
            tx: self.tx.clone(),
            buffer: Vec::with_capacity(256),
        }
    }
}

impl Write for BroadcastWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BroadcastWriter {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end_matches(['\n', '\r']);
        // No subscribers is the normal case when nobody watches the stream
        let _ = self.tx.send(line.to_string());
    }
}

pub fn get_or_init_log_tx() -> broadcast::Sender<String> {
    LOG_BROADCAST_TX
        .get_or_init(|| broadcast::channel::<String>(LOG_CHANNEL_CAPACITY).0)
        .clone()
}

/// Subscribe to a stream of formatted log lines
pub fn subscribe_log_lines() -> broadcast::Receiver<String> {
    get_or_init_log_tx().subscribe()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_publishes_trimmed_line_on_drop() {
        let (tx, mut rx) = broadcast::channel::<String>(4);
        let make = BroadcastMakeWriter { tx };
        {
            let mut w = make.make_writer();
            w.write_all(b"INFO pump started\r\n").unwrap();
        }
        assert_eq!(rx.try_recv().unwrap(), "INFO pump started");
    }

    #[test]
    fn empty_writer_sends_nothing() {
        let (tx, mut rx) = broadcast::channel::<String>(4);
        let make = BroadcastMakeWriter { tx };
        drop(make.make_writer());
        assert!(rx.try_recv().is_err());
    }
}
