//! SSH channel against an in-process russh server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gridrender_remote::{RemoteCommandChannel, SshChannel, SshTarget, PROXY_INIT_COMMAND};
use russh::server::{self, Auth, Msg, Server as _, Session};
use russh::{Channel, ChannelId, CryptoVec};
use russh_keys::key::KeyPair;

/// Answers every command with `ran: <command>` and exit status 0.
#[derive(Clone)]
struct EchoServer;

impl server::Server for EchoServer {
    type Handler = EchoSession;

    fn new_client(&mut self, _peer_addr: Option<SocketAddr>) -> EchoSession {
        EchoSession
    }
}

struct EchoSession;

#[async_trait]
impl server::Handler for EchoSession {
    type Error = russh::Error;

    async fn auth_password(&mut self, _user: &str, _password: &str) -> Result<Auth, Self::Error> {
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let reply = format!("ran: {}\n", String::from_utf8_lossy(data));
        session.data(channel, CryptoVec::from_slice(reply.as_bytes()));
        session.exit_status_request(channel, 0);
        session.eof(channel);
        session.close(channel);
        Ok(())
    }
}

/// Start the server on a free loopback port with no server-side idle limit.
async fn spawn_server() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let config = Arc::new(server::Config {
        inactivity_timeout: None,
        keys: vec![KeyPair::generate_ed25519().unwrap()],
        ..Default::default()
    });
    tokio::spawn(async move {
        let mut server = EchoServer;
        server.run_on_address(config, ("127.0.0.1", port)).await
    });
    port
}

/// Connect, retrying while the spawned server is still binding.
async fn connect(port: u16) -> SshChannel {
    let target = SshTarget::new("127.0.0.1", port, "plgjdoe", "secret");
    for _ in 0..50 {
        match SshChannel::connect(&target).await {
            Ok(channel) => return channel,
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("SSH server on port {} never accepted a connection", port);
}

#[tokio::test]
async fn test_execute_collects_stdout_and_exit_status() {
    let port = spawn_server().await;
    let channel = connect(port).await;

    let output = channel.execute("grid-proxy-info").await.unwrap();
    assert_eq!(output.exit_status, Some(0));
    assert_eq!(output.stdout, "ran: grid-proxy-info\n");
    assert!(output.is_success());

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_session_survives_long_idle_stretch() {
    let port = spawn_server().await;
    let channel = connect(port).await;

    let first = channel.execute("echo ok").await.unwrap();
    assert!(first.is_success());

    // Longer than any single polling stretch between credential refreshes.
    tokio::time::sleep(Duration::from_secs(305)).await;

    let output = channel.execute_checked(PROXY_INIT_COMMAND).await.unwrap();
    assert_eq!(output.stdout, format!("ran: {}\n", PROXY_INIT_COMMAND));

    channel.close().await.unwrap();
}
