use std::sync::{mpsc as std_mpsc, Arc};
use std::time::{Duration, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::summary::Summary;

use super::{dotted, per_second, Reporter, WriteError, WriteResult, Writer};

/// First wait after a failed send.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Sends metrics to Carbon daemons using the plaintext protocol.
///
/// Every destination gets its own worker task with its own queue and its own
/// connection, opened lazily. A failed send drops the connection and retries
/// the same data with exponential backoff, forever, without affecting the
/// other destinations.
///
/// Closing a cycle's writer blocks until every destination has taken the
/// data, so it must not run on a tokio worker thread.
#[derive(Clone, Debug)]
pub struct Carbon {
    inner: Arc<CarbonInner>,
}

#[derive(Debug)]
struct CarbonInner {
    prefix: String,
    destinations: Vec<Destination>,
}

#[derive(Debug)]
struct Destination {
    url: String,
    feed: mpsc::UnboundedSender<Job>,
}

#[derive(Debug)]
struct Job {
    data: Arc<[u8]>,
    done: std_mpsc::Sender<()>,
}

impl Carbon {
    /// Start workers for `urls` on the current tokio runtime.
    ///
    /// Addresses look like `tcp://host:2003`. The prefix, when not empty,
    /// is prepended to every metric name followed by a `.`.
    ///
    /// # Errors
    ///
    /// Fails if an address is malformed or if there are destinations but
    /// no runtime is running.
    pub fn new<I, S>(urls: I, prefix: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses = parse_all(urls)?;
        if addresses.is_empty() {
            return Ok(Self::spawn(addresses, prefix, None));
        }
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::spawn(addresses, prefix, Some(&handle)))
    }

    /// Start workers for `urls` on the given runtime.
    pub fn with_handle<I, S>(urls: I, prefix: &str, handle: &Handle) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses = parse_all(urls)?;
        Ok(Self::spawn(addresses, prefix, Some(handle)))
    }

    fn spawn(addresses: Vec<(String, String)>, prefix: &str, handle: Option<&Handle>) -> Self {
        let destinations = addresses
            .into_iter()
            .filter_map(|(url, address)| {
                let handle = handle?;
                let (feed, rx) = mpsc::unbounded_channel();
                handle.spawn(run(url.clone(), address, rx));
                Some(Destination { url, feed })
            })
            .collect();

        Self {
            inner: Arc::new(CarbonInner {
                prefix: dotted(prefix),
                destinations,
            }),
        }
    }

    /// Configured destination addresses.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.inner.destinations.iter().map(|d| d.url.as_str())
    }
}

fn parse_all<I, S>(urls: I) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    urls.into_iter().map(|url| parse(url.as_ref())).collect()
}

/// Validate a destination and return it with its `host:port`.
pub(crate) fn parse(raw: &str) -> Result<(String, String)> {
    let invalid = |reason: &str| Error::InvalidDestination {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "tcp" {
        return Err(Error::UnsupportedScheme {
            url: raw.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let port = url.port().ok_or_else(|| invalid("missing port"))?;

    Ok((raw.to_string(), format!("{}:{}", host, port)))
}

impl Reporter for Carbon {
    fn new_writer(&self, summary: &Summary) -> Box<dyn Writer> {
        let time = summary
            .time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Box::new(CarbonWriter {
            inner: self.inner.clone(),
            buffer: String::new(),
            time,
            step: summary.step(),
        })
    }
}

struct CarbonWriter {
    inner: Arc<CarbonInner>,
    buffer: String,
    time: u64,
    step: Duration,
}

impl CarbonWriter {
    fn line(&mut self, name: &str, value: f64) {
        self.buffer.push_str(&format!(
            "{}{} {:.6} {}\n",
            self.inner.prefix, name, value, self.time
        ));
    }
}

impl Writer for CarbonWriter {
    fn write(&mut self, name: &str, value: f64) -> WriteResult {
        self.line(name, value);
        Ok(())
    }

    fn write_scaled(&mut self, name: &str, value: f64) -> WriteResult {
        self.line(name, per_second(value, self.step));
        Ok(())
    }

    fn write_string(&mut self, _name: &str, _text: &str) -> WriteResult {
        Err(WriteError::Ignored)
    }

    fn close(self: Box<Self>) {
        if self.buffer.is_empty() || self.inner.destinations.is_empty() {
            return;
        }

        let data: Arc<[u8]> = self.buffer.into_bytes().into();
        let (done, acks) = std_mpsc::channel();

        let mut pending = 0;
        for destination in &self.inner.destinations {
            let job = Job {
                data: data.clone(),
                done: done.clone(),
            };
            match destination.feed.send(job) {
                Ok(()) => pending += 1,
                Err(_) => warn!("carbon: worker for {} is gone", destination.url),
            }
        }
        drop(done);

        for _ in 0..pending {
            if acks.recv().is_err() {
                break;
            }
        }
    }
}

async fn run(url: String, address: String, mut feed: mpsc::UnboundedReceiver<Job>) {
    let mut conn = None;
    while let Some(job) = feed.recv().await {
        send(&mut conn, &url, &address, &job.data).await;
        let _ = job.done.send(());
    }
    debug!("carbon: worker for {} stopped", url);
}

async fn send(conn: &mut Option<TcpStream>, url: &str, address: &str, data: &[u8]) {
    let mut retry = 0;
    let mut sleep = INITIAL_BACKOFF;

    loop {
        if retry != 0 {
            info!("carbon: connect attempt {} to {}", retry, url);
        }

        match write(conn, url, address, data).await {
            Ok(()) => return,
            Err(err) => warn!("carbon: {}: {}", url, err),
        }

        tokio::time::sleep(sleep).await;
        sleep = (sleep * 2).min(MAX_BACKOFF);
        retry += 1;
    }
}

async fn write(
    conn: &mut Option<TcpStream>,
    url: &str,
    address: &str,
    data: &[u8],
) -> std::io::Result<()> {
    // A stream that fails a write is not put back, so the next attempt redials.
    let mut stream = match conn.take() {
        Some(stream) if is_open(&stream) => stream,
        _ => {
            let stream = TcpStream::connect(address).await?;
            info!("carbon: connected to {}", url);
            stream
        }
    };

    stream.write_all(data).await?;
    stream.flush().await?;
    debug!("carbon: sent {} bytes to {}", data.len(), url);
    *conn = Some(stream);
    Ok(())
}

/// Whether the daemon still holds its end of the connection.
///
/// Carbon never talks back, so readable data can only be the end of stream.
/// Writing to a half-closed socket may succeed and lose the data.
fn is_open(stream: &TcpStream) -> bool {
    let mut buf = [0u8; 1];
    match stream.try_read(&mut buf) {
        Ok(0) => {
            debug!("carbon: connection closed by peer");
            false
        }
        Ok(_) => true,
        Err(err) => err.kind() == std::io::ErrorKind::WouldBlock,
    }
}
