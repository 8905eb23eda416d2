//! In-process clamd stand-in for tests.
//!
//! Speaks just enough INSTREAM to exercise the pool: reads the command line
//! and frames, then answers with a reply chosen from the streamed payload.
//! Connections that close before sending a command (pool probes) are not
//! counted as sessions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use glamscan_core::DaemonConfig;

/// Reply sent for payloads containing [`EICAR_MARKER`] by default.
pub const FOUND_REPLY: &str = "stream: Eicar-Test-Signature FOUND\n";
/// Reply sent for everything else by default.
pub const OK_REPLY: &str = "stream: OK\n";
/// Reply for a daemon-side failure.
pub const ERROR_REPLY: &str = "INSTREAM size limit exceeded. ERROR\n";
/// Payload substring the default responder treats as infected.
pub const EICAR_MARKER: &[u8] = b"EICAR-STANDARD-ANTIVIRUS-TEST-FILE";

type Responder = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// How the mock daemon answers.
#[derive(Clone)]
pub struct MockBehavior {
    responder: Responder,
    delay: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            responder: Arc::new(|payload: &[u8]| {
                if contains(payload, EICAR_MARKER) {
                    FOUND_REPLY.to_string()
                } else if contains(payload, b"TRIGGER-ERROR") {
                    ERROR_REPLY.to_string()
                } else {
                    OK_REPLY.to_string()
                }
            }),
            delay: Duration::ZERO,
        }
    }
}

impl MockBehavior {
    /// Hold each session this long before replying.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Choose the reply from the streamed payload.
    pub fn respond_with(mut self, f: impl Fn(&[u8]) -> String + Send + Sync + 'static) -> Self {
        self.responder = Arc::new(f);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    sessions: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    frames: Mutex<Vec<Vec<usize>>>,
}

/// A listening mock daemon. Stops accepting when dropped.
pub struct MockDaemon {
    addr: SocketAddr,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl MockDaemon {
    /// Bind to an ephemeral localhost port and start serving.
    pub async fn spawn(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock daemon");
        let addr = listener.local_addr().expect("mock daemon address");
        let counters = Arc::new(Counters::default());

        let task = {
            let counters = Arc::clone(&counters);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let counters = Arc::clone(&counters);
                    let behavior = behavior.clone();
                    tokio::spawn(async move {
                        let _ = serve(stream, &behavior, &counters).await;
                    });
                }
            })
        };

        Self {
            addr,
            counters,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A TCP pool config pointing at this daemon.
    pub fn config(&self, workers: usize) -> DaemonConfig {
        DaemonConfig {
            workers,
            timeout: Duration::from_secs(5),
            ..DaemonConfig::tcp(self.addr().ip().to_string(), self.addr().port())
        }
    }

    /// Number of INSTREAM sessions started.
    pub fn sessions(&self) -> usize {
        self.counters.sessions.load(Ordering::SeqCst)
    }

    /// Highest number of sessions in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Data frame lengths of every completed session, in completion order.
    pub fn frame_lengths(&self) -> Vec<Vec<usize>> {
        self.counters
            .frames
            .lock()
            .map(|frames| frames.clone())
            .unwrap_or_default()
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    stream: TcpStream,
    behavior: &MockBehavior,
    counters: &Counters,
) -> std::io::Result<()> {
    let mut stream = BufReader::new(stream);

    let mut command = Vec::new();
    if stream.read_until(b'\n', &mut command).await? == 0 {
        return Ok(());
    }

    counters.sessions.fetch_add(1, Ordering::SeqCst);
    let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
    counters.peak.fetch_max(active, Ordering::SeqCst);

    let result = async {
        let mut payload = Vec::new();
        let mut lengths = Vec::new();
        loop {
            let len = stream.read_u32().await? as usize;
            if len == 0 {
                break;
            }
            let start = payload.len();
            payload.resize(start + len, 0);
            stream.read_exact(&mut payload[start..]).await?;
            lengths.push(len);
        }

        if !behavior.delay.is_zero() {
            tokio::time::sleep(behavior.delay).await;
        }

        let reply = (behavior.responder)(&payload);
        if let Ok(mut frames) = counters.frames.lock() {
            frames.push(lengths);
        }
        stream.get_mut().write_all(reply.as_bytes()).await?;
        stream.get_mut().shutdown().await
    }
    .await;

    counters.active.fetch_sub(1, Ordering::SeqCst);
    result
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
