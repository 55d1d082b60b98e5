//! Server wiring for the three channel handlers.
//!
//! Binds the upload, echo, and download sockets, builds the shared
//! validator from the configured reference packet, and runs the handlers
//! as independent tasks. A stall in one channel (a download burst's paced
//! sleeps, say) never affects the other two.

use crate::channels::download::{BurstPlan, DownloadHandler};
use crate::channels::echo::EchoHandler;
use crate::channels::upload::{UploadCounters, UploadHandler};
use crate::config::Config;
use crate::packet::ReferencePacket;
use crate::shutdown::ShutdownFlag;
use crate::validator::Validator;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::info;

/// The three channel handlers plus their shutdown handle.
pub struct Server {
    upload: UploadHandler,
    echo: EchoHandler,
    download: DownloadHandler,
    shutdown: ShutdownFlag,
    upload_addr: SocketAddr,
    echo_addr: SocketAddr,
    download_addr: SocketAddr,
}

impl Server {
    /// Generate the reference packet and bind all three channel sockets.
    ///
    /// A bind failure (port in use, permission denied) is fatal: startup
    /// aborts rather than running with a dead channel.
    pub async fn bind(config: &Config) -> io::Result<Self> {
        let reference = ReferencePacket::generate(config.packet_length, config.seed);
        info!(
            length = reference.len(),
            seed = config.seed,
            "Generated reference packet"
        );

        let validator = Validator::new(reference);
        let shutdown = ShutdownFlag::new();
        let backoff = Duration::from_millis(config.poll_backoff_ms);

        let upload_socket =
            UdpSocket::bind((config.host.as_str(), config.upload_port)).await?;
        let upload_addr = upload_socket.local_addr()?;
        info!(addr = %upload_addr, "Upload channel listening");

        let echo_socket = UdpSocket::bind((config.host.as_str(), config.echo_port)).await?;
        let echo_addr = echo_socket.local_addr()?;
        info!(addr = %echo_addr, "Echo channel listening");

        let download_socket =
            UdpSocket::bind((config.host.as_str(), config.download_port)).await?;
        let download_addr = download_socket.local_addr()?;
        info!(addr = %download_addr, "Download channel listening");

        let burst = BurstPlan {
            rounds: config.burst_rounds,
            packets_per_round: config.burst_size,
            pause: Duration::from_millis(config.burst_pause_ms),
        };

        Ok(Server {
            upload: UploadHandler::new(
                upload_socket,
                validator.clone(),
                shutdown.clone(),
                backoff,
            ),
            echo: EchoHandler::new(echo_socket, validator.clone(), shutdown.clone(), backoff),
            download: DownloadHandler::new(
                download_socket,
                validator,
                shutdown.clone(),
                backoff,
                burst,
            ),
            shutdown,
            upload_addr,
            echo_addr,
            download_addr,
        })
    }

    /// Handle for requesting shutdown from outside the handler tasks.
    pub fn shutdown_handle(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Upload channel tallies, observable while the handlers run.
    pub fn upload_counters(&self) -> Arc<UploadCounters> {
        self.upload.counters()
    }

    pub fn upload_addr(&self) -> SocketAddr {
        self.upload_addr
    }

    pub fn echo_addr(&self) -> SocketAddr {
        self.echo_addr
    }

    pub fn download_addr(&self) -> SocketAddr {
        self.download_addr
    }

    /// Run the three channel handlers to completion.
    ///
    /// Returns once all three have observed the shutdown flag, at most
    /// one backoff interval (plus any in-flight burst) after it is set.
    pub async fn run(self) {
        let upload = tokio::spawn(self.upload.run());
        let echo = tokio::spawn(self.echo.run());
        let download = tokio::spawn(self.download.run());

        let _ = tokio::join!(upload, echo, download);
        info!("All channels stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    /// Ephemeral ports and a fast, small burst so tests stay quick.
    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            upload_port: 0,
            echo_port: 0,
            download_port: 0,
            packet_length: 1024,
            seed: 1234,
            poll_backoff_ms: 10,
            burst_rounds: 4,
            burst_size: 3,
            burst_pause_ms: 20,
            log_level: "info".to_string(),
        }
    }

    async fn client_socket() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn test_echo_round_trips_reference_packet() {
        let config = test_config();
        let server = Server::bind(&config).await.unwrap();
        let echo_addr = server.echo_addr();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let reference = ReferencePacket::generate(1024, 1234);
        let client = client_socket().await;
        client
            .send_to(reference.as_bytes(), echo_addr)
            .await
            .unwrap();

        let mut buf = vec![0u8; 2048];
        let (len, from) = time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("no echo within timeout")
            .unwrap();
        assert_eq!(from, echo_addr);
        assert_eq!(&buf[..len], reference.as_bytes());

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_echo_drops_wrong_length_packet() {
        let config = test_config();
        let server = Server::bind(&config).await.unwrap();
        let echo_addr = server.echo_addr();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let client = client_socket().await;
        client.send_to(&[0u8; 500], echo_addr).await.unwrap();

        let mut buf = vec![0u8; 2048];
        let reply = time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
        assert!(reply.is_err(), "invalid packet must not be echoed");

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_tallies_without_replying() {
        let config = test_config();
        let server = Server::bind(&config).await.unwrap();
        let upload_addr = server.upload_addr();
        let counters = server.upload_counters();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let client = client_socket().await;

        // Wrong content, right length
        client.send_to(&[0u8; 1024], upload_addr).await.unwrap();
        wait_for(|| counters.invalid() == 1).await;
        assert_eq!(counters.valid(), 0);

        let reference = ReferencePacket::generate(1024, 1234);
        client
            .send_to(reference.as_bytes(), upload_addr)
            .await
            .unwrap();
        wait_for(|| counters.valid() == 1).await;
        assert_eq!(counters.invalid(), 1);

        // The upload channel never sends anything back
        let mut buf = vec![0u8; 2048];
        let reply = time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
        assert!(reply.is_err(), "upload channel must not reply");

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_download_trigger_streams_full_burst() {
        let config = test_config();
        let server = Server::bind(&config).await.unwrap();
        let download_addr = server.download_addr();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let reference = ReferencePacket::generate(1024, 1234);
        let client = client_socket().await;
        client
            .send_to(reference.as_bytes(), download_addr)
            .await
            .unwrap();

        // 4 rounds of 3 packets configured above
        let expected = (config.burst_rounds * config.burst_size) as usize;
        let mut buf = vec![0u8; 2048];
        for i in 0..expected {
            let (len, from) = time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
                .await
                .unwrap_or_else(|_| panic!("burst packet {i} never arrived"))
                .unwrap();
            assert_eq!(from, download_addr);
            assert_eq!(&buf[..len], reference.as_bytes());
        }

        // The stream stops after the configured burst
        let extra = time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
        assert!(extra.is_err(), "burst must stop at rounds * size packets");

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_trigger_starts_no_burst() {
        let config = test_config();
        let server = Server::bind(&config).await.unwrap();
        let download_addr = server.download_addr();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let client = client_socket().await;
        client.send_to(&[7u8; 1024], download_addr).await.unwrap();

        let mut buf = vec![0u8; 2048];
        let reply = time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
        assert!(reply.is_err(), "invalid trigger must not start a burst");

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_aborts_startup() {
        let taken = client_socket().await;
        let mut config = test_config();
        config.upload_port = taken.local_addr().unwrap().port();

        assert!(Server::bind(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_channels() {
        let config = test_config();
        let server = Server::bind(&config).await.unwrap();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        shutdown.shutdown();
        time::timeout(Duration::from_secs(1), task)
            .await
            .expect("channels did not stop after shutdown")
            .unwrap();
    }

    /// Poll `cond` until it holds or two seconds elapse.
    async fn wait_for(cond: impl Fn() -> bool) {
        let deadline = time::Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(
                time::Instant::now() < deadline,
                "condition not reached within timeout"
            );
            time::sleep(Duration::from_millis(10)).await;
        }
    }
}
