//! FTP client over tokio sockets

use crate::client::{RemoteClient, RemoteEntry};
use crate::connection::{copy_with_idle_timeout, open_stream, with_timeout, ControlConnection};
use crate::protocol::{parse_epsv_port, parse_mlsd_listing, parse_pasv_addr, Reply};
use async_trait::async_trait;
use ftpsync_config::RemoteConfig;
use ftpsync_types::{Error, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// FTP session speaking binary mode and passive data connections
#[derive(Debug)]
pub struct FtpClient {
    config: RemoteConfig,
    control: Option<ControlConnection>,
    epsv_unsupported: bool,
}

impl FtpClient {
    /// Create an unconnected client for the given endpoint
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            control: None,
            epsv_unsupported: false,
        }
    }

    /// Whether the control connection is open
    pub fn is_connected(&self) -> bool {
        self.control.is_some()
    }

    fn control(&mut self) -> Result<&mut ControlConnection> {
        self.control
            .as_mut()
            .ok_or_else(|| Error::protocol("Not connected"))
    }

    /// Negotiate a passive data connection, preferring EPSV
    async fn open_data(&mut self) -> Result<TcpStream> {
        let connect_timeout = self.config.connect_timeout();
        let epsv_unsupported = self.epsv_unsupported;
        let control = self.control()?;
        let peer = control.peer();

        let mut target = None;
        if !epsv_unsupported {
            let reply = control.command("EPSV").await?;
            if reply.code == 229 {
                let port = parse_epsv_port(&reply.text())?;
                target = Some(SocketAddr::new(peer.ip(), port));
            } else if reply.code >= 500 {
                debug!("EPSV refused ({}), falling back to PASV", reply.code);
            } else {
                return Err(reply.into_error());
            }
        }

        let target = match target {
            Some(target) => target,
            None => {
                self.epsv_unsupported = true;
                let reply = self.control()?.command_expect("PASV", &[227]).await?;
                let advertised = parse_pasv_addr(&reply.text())?;
                // Servers behind NAT advertise private addresses; the port is what counts
                SocketAddr::new(peer.ip(), advertised.port())
            }
        };

        open_stream(&target.to_string(), connect_timeout).await
    }

    /// Open a data connection and issue a transfer command on it
    async fn start_transfer(&mut self, command: &str) -> Result<TcpStream> {
        let data = self.open_data().await?;
        let reply = self.control()?.command(command).await?;
        if reply.is_preliminary() {
            Ok(data)
        } else {
            Err(reply.into_error())
        }
    }

    /// Read the completion reply that follows a data transfer
    async fn finish_transfer(&mut self) -> Result<Reply> {
        self.control()?.read_reply().await?.expect(&[226, 250])
    }
}

#[async_trait]
impl RemoteClient for FtpClient {
    async fn connect(&mut self) -> Result<String> {
        let address = self.config.address();
        info!("Connecting to {}", address);

        let stream = open_stream(&address, self.config.connect_timeout()).await?;
        let mut control = ControlConnection::new(stream, self.config.io_timeout())?;

        let mut greeting = control.read_reply().await?;
        if greeting.code == 120 {
            greeting = control.read_reply().await?;
        }
        let greeting = greeting.expect(&[220])?;

        self.control = Some(control);
        Ok(greeting.text())
    }

    async fn login(&mut self) -> Result<String> {
        let user = format!("USER {}", self.config.username);
        let pass = format!("PASS {}", self.config.password);
        let control = self.control()?;

        let mut reply = control.command_expect(&user, &[230, 331]).await?;
        if reply.is_intermediate() {
            reply = control.command_expect(&pass, &[230, 202]).await?;
        }
        control.command_expect("TYPE I", &[200]).await?;

        info!("Logged in as {}", self.config.username);
        Ok(reply.text())
    }

    async fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        let io_timeout = self.config.io_timeout();
        let mut data = self.start_transfer(&format!("MLSD {}", path)).await?;

        let mut listing = Vec::new();
        let what = format!("Listing of {}", path);
        copy_with_idle_timeout(&mut data, &mut listing, io_timeout, &what).await?;
        drop(data);
        self.finish_transfer().await?;

        Ok(parse_mlsd_listing(&listing))
    }

    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64> {
        let io_timeout = self.config.io_timeout();
        let mut data = self.start_transfer(&format!("RETR {}", path)).await?;

        let what = format!("Download of {}", path);
        let received = copy_with_idle_timeout(&mut data, sink, io_timeout, &what).await?;
        with_timeout(io_timeout, &what, async {
            sink.flush()
                .await
                .map_err(|e| Error::network(format!("Failed to flush download of {}: {}", path, e)))
        })
        .await?;
        drop(data);
        self.finish_transfer().await?;

        debug!("Retrieved {} ({} bytes)", path, received);
        Ok(received)
    }

    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64> {
        let io_timeout = self.config.io_timeout();
        let mut data = self.start_transfer(&format!("STOR {}", path)).await?;

        let what = format!("Upload of {}", path);
        let sent = copy_with_idle_timeout(source, &mut data, io_timeout, &what).await?;
        with_timeout(io_timeout, &what, async {
            data.shutdown()
                .await
                .map_err(|e| Error::network(format!("Failed to close upload of {}: {}", path, e)))
        })
        .await?;
        drop(data);
        self.finish_transfer().await?;

        debug!("Stored {} ({} bytes)", path, sent);
        Ok(sent)
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        self.control()?
            .command_expect(&format!("DELE {}", path), &[250])
            .await?;
        Ok(())
    }

    async fn make_directory(&mut self, path: &str) -> Result<()> {
        self.control()?
            .command_expect(&format!("MKD {}", path), &[257, 250])
            .await?;
        Ok(())
    }

    async fn remove_directory(&mut self, path: &str) -> Result<()> {
        self.control()?
            .command_expect(&format!("RMD {}", path), &[250])
            .await?;
        Ok(())
    }

    async fn quit(&mut self) -> Result<String> {
        let Some(mut control) = self.control.take() else {
            return Ok(String::new());
        };

        let reply = control.command("QUIT").await?;
        if let Err(e) = control.shutdown().await {
            warn!("{}", e);
        }
        Ok(reply.text())
    }
}
