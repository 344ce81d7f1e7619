//! Line-oriented TCP provider
//!
//! One session task per connection. The task owns the socket, writes queued
//! subscribe/unsubscribe commands and reads ticks in feed order. When the
//! upstream drops the connection the task reports `on_dis_connect(false)`,
//! waits `reconnect_delay` and dials again, resubscribing every instrument.

use async_trait::async_trait;
use common::RateStatus;
use config::PlatformConfig;
use observability::PipelineMetrics;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::TickDispatcher;
use crate::error::{ProviderError, ProviderResult};
use crate::markers::SentMarkers;
use crate::traits::{ConnectParams, Provider, ProviderListener};
use crate::wire::{parse_tcp_line, subscribe_command, unsubscribe_command, UpstreamLine};

/// `type` of a TCP platform entry
pub const KIND: &str = "tcp";

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

struct Connection {
    token: CancellationToken,
    commands: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

pub struct TcpProvider {
    dispatcher: Arc<TickDispatcher>,
    host: Option<String>,
    port: Option<u16>,
    auto_reconnect: bool,
    reconnect_delay: Duration,
    connection: Mutex<Option<Connection>>,
}

impl TcpProvider {
    pub fn new(platform: impl Into<String>, listener: Arc<dyn ProviderListener>) -> Self {
        let markers = Arc::new(SentMarkers::new());
        Self {
            dispatcher: Arc::new(TickDispatcher::new(platform, listener, markers)),
            host: None,
            port: None,
            auto_reconnect: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connection: Mutex::new(None),
        }
    }

    pub fn from_config(config: &PlatformConfig, listener: Arc<dyn ProviderListener>) -> Self {
        let mut provider = Self::new(&config.name, listener)
            .with_reconnect(config.auto_reconnect, Duration::from_millis(config.reconnect_delay_ms));
        provider.host = config.host.clone();
        provider.port = config.port;
        provider
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_reconnect(mut self, auto_reconnect: bool, delay: Duration) -> Self {
        self.auto_reconnect = auto_reconnect;
        self.reconnect_delay = delay;
        self
    }

    /// True while a session task is running (connected or reconnecting)
    pub fn is_running(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|c| !c.task.is_finished())
    }

    fn address(&self, params: &ConnectParams) -> ProviderResult<String> {
        let platform = self.dispatcher.platform();
        let host = params
            .get("host")
            .cloned()
            .or_else(|| self.host.clone())
            .ok_or_else(|| ProviderError::MissingSetting {
                platform: platform.to_string(),
                setting: "host",
            })?;

        let port = match params.get("port") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ProviderError::InvalidSetting {
                platform: platform.to_string(),
                setting: "port",
                message: e.to_string(),
            })?,
            None => self.port.ok_or_else(|| ProviderError::MissingSetting {
                platform: platform.to_string(),
                setting: "port",
            })?,
        };

        Ok(format!("{}:{}", host, port))
    }

    /// Queue a command for the live session. Dropped when not connected;
    /// the session resubscribes everything on (re)connect.
    fn send_command(&self, command: String) {
        if let Some(connection) = self.connection.lock().as_ref() {
            let _ = connection.commands.send(command);
        }
    }
}

#[async_trait]
impl Provider for TcpProvider {
    fn platform(&self) -> &str {
        self.dispatcher.platform()
    }

    async fn connect(&self, platform_name: &str, params: &ConnectParams) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;
        let addr = self.address(params)?;

        let mut connection = self.connection.lock();
        if connection.as_ref().is_some_and(|c| !c.task.is_finished()) {
            warn!(platform = %platform_name, "Already connected, ignoring connect");
            return Ok(());
        }

        let token = CancellationToken::new();
        let (commands, receiver) = mpsc::unbounded_channel();
        let session = Session {
            dispatcher: self.dispatcher.clone(),
            addr: addr.clone(),
            auto_reconnect: self.auto_reconnect,
            reconnect_delay: self.reconnect_delay,
            token: token.clone(),
            commands: receiver,
        };
        let task = tokio::spawn(session.run());
        *connection = Some(Connection {
            token,
            commands,
            task,
        });

        info!(platform = %platform_name, %addr, "TCP provider started");
        Ok(())
    }

    async fn dis_connect(&self, platform_name: &str, _params: &ConnectParams) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;

        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            connection.token.cancel();
            if let Err(e) = connection.task.await {
                warn!(platform = %platform_name, error = %e, "Session task ended abnormally");
            }
        }

        self.dispatcher.markers().clear_sent();
        self.dispatcher
            .listener()
            .on_dis_connect(platform_name, true)
            .await;
        info!(platform = %platform_name, "TCP provider disconnected");
        Ok(())
    }

    async fn subscribe(&self, platform_name: &str, rate_name: &str) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;
        if !self.dispatcher.markers().subscribe(rate_name) {
            debug!(platform = %platform_name, rate = %rate_name, "Already subscribed");
            return Ok(());
        }
        self.send_command(subscribe_command(rate_name));
        info!(platform = %platform_name, rate = %rate_name, "Subscribed");
        Ok(())
    }

    async fn un_subscribe(&self, platform_name: &str, rate_name: &str) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;
        if !self.dispatcher.markers().unsubscribe(rate_name) {
            debug!(platform = %platform_name, rate = %rate_name, "Not subscribed");
            return Ok(());
        }
        self.send_command(unsubscribe_command(rate_name));
        self.dispatcher
            .listener()
            .on_rate_status(platform_name, rate_name, RateStatus::INACTIVE)
            .await;
        info!(platform = %platform_name, rate = %rate_name, "Unsubscribed");
        Ok(())
    }
}

enum SessionEnd {
    Cancelled,
    Closed,
}

struct Session {
    dispatcher: Arc<TickDispatcher>,
    addr: String,
    auto_reconnect: bool,
    reconnect_delay: Duration,
    token: CancellationToken,
    commands: mpsc::UnboundedReceiver<String>,
}

impl Session {
    async fn run(mut self) {
        let platform = self.dispatcher.platform().to_string();

        loop {
            let dialed = tokio::select! {
                _ = self.token.cancelled() => break,
                result = TcpStream::connect(&self.addr) => result,
            };

            match dialed {
                Ok(stream) => {
                    info!(platform = %platform, addr = %self.addr, "Connected to upstream");
                    self.dispatcher.listener().on_connect(&platform, true).await;

                    match self.serve(stream).await {
                        Ok(SessionEnd::Cancelled) => break,
                        Ok(SessionEnd::Closed) => {
                            warn!(platform = %platform, "Upstream closed the connection")
                        }
                        Err(e) => warn!(platform = %platform, error = %e, "Connection lost"),
                    }

                    self.dispatcher
                        .listener()
                        .on_dis_connect(&platform, false)
                        .await;
                }
                Err(e) => {
                    warn!(platform = %platform, addr = %self.addr, error = %e, "Connect failed")
                }
            }

            if !self.auto_reconnect {
                info!(platform = %platform, "Auto-reconnect disabled, session stopped");
                break;
            }

            PipelineMetrics::provider_reconnect(&platform);
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
            debug!(platform = %platform, addr = %self.addr, "Reconnecting");
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> io::Result<SessionEnd> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        // commands queued while disconnected are covered by the resubscribe below
        while self.commands.try_recv().is_ok() {}
        for rate_name in self.dispatcher.markers().subscriptions() {
            writer.write_all(subscribe_command(&rate_name).as_bytes()).await?;
        }

        loop {
            tokio::select! {
                _ = self.token.cancelled() => return Ok(SessionEnd::Cancelled),
                command = self.commands.recv() => match command {
                    Some(command) => writer.write_all(command.as_bytes()).await?,
                    None => return Ok(SessionEnd::Cancelled),
                },
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await,
                    None => return Ok(SessionEnd::Closed),
                },
            }
        }
    }

    async fn handle_line(&self, line: &str) {
        let platform = self.dispatcher.platform();
        match parse_tcp_line(line) {
            Ok(UpstreamLine::Tick(tick)) => self.dispatcher.dispatch(tick).await,
            Ok(UpstreamLine::Control(message)) => {
                debug!(platform = %platform, message = %message, "Control message")
            }
            Err(e) => {
                warn!(platform = %platform, line = %line, error = %e, "Malformed record, dropping");
                PipelineMetrics::tick_dropped(platform, "malformed");
            }
        }
    }
}
