//! Control and data connection handling

use crate::protocol::{line_text, parse_line_header, Reply};
use ftpsync_types::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Run `operation` with a deadline, mapping expiry to a network error
pub(crate) async fn with_timeout<T, F>(limit: Duration, what: &str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| Error::network(format!("{} timed out after {:?}", what, limit)))?
}

/// Size of the buffer data transfers are copied through
pub(crate) const TRANSFER_BUFFER_SIZE: usize = 8192;

/// Copy `reader` into `writer` until end of stream.
///
/// `idle_limit` bounds each read and each write on its own, so a slow
/// transfer that keeps making progress never times out.
pub(crate) async fn copy_with_idle_timeout<R, W>(
    reader: &mut R,
    writer: &mut W,
    idle_limit: Duration,
    what: &str,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; TRANSFER_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = with_timeout(idle_limit, what, async {
            reader
                .read(&mut buffer)
                .await
                .map_err(|e| Error::network(format!("{} failed: {}", what, e)))
        })
        .await?;
        if read == 0 {
            return Ok(total);
        }

        with_timeout(idle_limit, what, async {
            writer
                .write_all(&buffer[..read])
                .await
                .map_err(|e| Error::network(format!("{} failed: {}", what, e)))
        })
        .await?;
        total += read as u64;
    }
}

/// Open a TCP connection with a deadline
pub(crate) async fn open_stream(addr: &str, limit: Duration) -> Result<TcpStream> {
    with_timeout(limit, "Connect", async {
        TcpStream::connect(addr)
            .await
            .map_err(|e| Error::network(format!("Failed to connect to '{}': {}", addr, e)))
    })
    .await
}

/// The command channel of an FTP session
#[derive(Debug)]
pub struct ControlConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    io_timeout: Duration,
}

impl ControlConnection {
    /// Wrap an established stream
    pub fn new(stream: TcpStream, io_timeout: Duration) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map_err(|e| Error::network(format!("Control connection has no peer: {}", e)))?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            io_timeout,
        })
    }

    /// Address of the server end of the control connection
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Send one command line
    pub async fn send(&mut self, command: &str) -> Result<()> {
        if command.starts_with("PASS ") {
            trace!("> PASS ****");
        } else {
            trace!("> {}", command);
        }

        let line = format!("{}\r\n", command);
        let writer = &mut self.writer;
        with_timeout(self.io_timeout, "Command write", async move {
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| Error::network(format!("Failed to send command: {}", e)))
        })
        .await
    }

    /// Read one complete reply, following multi-line continuations
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let reader = &mut self.reader;
        let reply = with_timeout(self.io_timeout, "Reply", async move {
            let first = read_line(reader).await?;
            let header = parse_line_header(&first)
                .ok_or_else(|| Error::protocol(format!("Unexpected reply line: {}", first)))?;

            let mut lines = vec![line_text(&first).to_string()];
            let mut last = header.last;
            while !last {
                let line = read_line(reader).await?;
                match parse_line_header(&line) {
                    Some(next) if next.code == header.code && next.last => {
                        lines.push(line_text(&line).to_string());
                        last = true;
                    }
                    _ => lines.push(line_text(&line).to_string()),
                }
            }

            Ok(Reply::new(header.code, lines))
        })
        .await?;

        trace!("< {}", reply);
        Ok(reply)
    }

    /// Send a command and read its reply
    pub async fn command(&mut self, command: &str) -> Result<Reply> {
        self.send(command).await?;
        self.read_reply().await
    }

    /// Send a command and require one of the `expected` reply codes
    pub async fn command_expect(&mut self, command: &str, expected: &[u16]) -> Result<Reply> {
        self.command(command).await?.expect(expected)
    }

    /// Close the write half
    pub async fn shutdown(&mut self) -> Result<()> {
        debug!("Closing control connection to {}", self.peer);
        self.writer
            .shutdown()
            .await
            .map_err(|e| Error::network(format!("Failed to close control connection: {}", e)))
    }
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| Error::network(format!("Failed to read reply: {}", e)))?;
    if read == 0 {
        return Err(Error::network("Control connection closed by server"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
