//! Full-quality manifest lookup through a device agent
//!
//! The agent listens on TCP. A request is one length byte followed by the
//! track ID; the reply is a single line holding a master playlist URL.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::{CatalogConfig, M3u8Mode};
use crate::error::{Error, Result};
use crate::types::TrackInfo;

const AGENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the device manifest agent
#[derive(Clone, Debug)]
pub struct DeviceManifestAgent {
    address: String,
    mode: M3u8Mode,
}

impl DeviceManifestAgent {
    /// Agent at `address` consulted for tracks matching `mode`
    pub fn new(address: impl Into<String>, mode: M3u8Mode) -> Self {
        Self {
            address: address.into(),
            mode,
        }
    }

    /// Agent described by the catalog settings, if enabled
    pub fn from_config(config: &CatalogConfig) -> Option<Self> {
        config
            .get_m3u8_from_device
            .then(|| Self::new(config.get_m3u8_port.clone(), config.get_m3u8_mode))
    }

    /// Whether this track should be looked up on the agent
    pub fn applies_to(&self, track: &TrackInfo) -> bool {
        match self.mode {
            M3u8Mode::All => true,
            M3u8Mode::Hires => track.hires,
            M3u8Mode::None => false,
        }
    }

    /// Ask the agent for the master playlist of `track_id`
    ///
    /// Returns `Ok(None)` when the agent answers with something other than a
    /// playlist URL.
    pub async fn master_playlist_url(&self, track_id: &str) -> Result<Option<String>> {
        let id = track_id.as_bytes();
        let length = u8::try_from(id.len())
            .map_err(|_| Error::Other(format!("track ID too long for device agent: {track_id}")))?;

        let exchange = async {
            let mut stream = TcpStream::connect(&self.address).await?;
            stream.write_all(&[length]).await?;
            stream.write_all(id).await?;
            stream.flush().await?;

            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).await?;
            Ok::<_, std::io::Error>(line)
        };
        let line = tokio::time::timeout(AGENT_TIMEOUT, exchange)
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("device agent at {} did not answer", self.address),
                ))
            })??;

        let url = line.trim();
        if url.ends_with(".m3u8") {
            tracing::debug!(track_id, url, "device agent returned manifest");
            Ok(Some(url.to_string()))
        } else {
            tracing::warn!(track_id, reply = url, "device agent reply is not a playlist URL");
            Ok(None)
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn agent_replying(reply: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let length = socket.read_u8().await.unwrap();
            let mut id = vec![0; usize::from(length)];
            socket.read_exact(&mut id).await.unwrap();
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8(id).unwrap()
        });
        (address, handle)
    }

    #[tokio::test]
    async fn sends_length_prefixed_id_and_reads_url() {
        let (address, handle) = agent_replying("https://hls.test/full.m3u8\n").await;
        let agent = DeviceManifestAgent::new(address, M3u8Mode::All);

        let url = agent.master_playlist_url("1440932437").await.unwrap();
        assert_eq!(url.as_deref(), Some("https://hls.test/full.m3u8"));
        assert_eq!(handle.await.unwrap(), "1440932437");
    }

    #[tokio::test]
    async fn non_playlist_reply_is_ignored() {
        let (address, _handle) = agent_replying("error\n").await;
        let agent = DeviceManifestAgent::new(address, M3u8Mode::All);
        assert!(agent.master_playlist_url("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_agent_is_an_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let agent = DeviceManifestAgent::new(address, M3u8Mode::All);
        let err = agent.master_playlist_url("1").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {err:?}");
    }

    #[test]
    fn mode_selects_tracks() {
        let hires = TrackInfo {
            hires: true,
            ..TrackInfo::default()
        };
        let plain = TrackInfo::default();

        let agent = DeviceManifestAgent::new("x", M3u8Mode::Hires);
        assert!(agent.applies_to(&hires));
        assert!(!agent.applies_to(&plain));
        assert!(DeviceManifestAgent::new("x", M3u8Mode::All).applies_to(&plain));
        assert!(!DeviceManifestAgent::new("x", M3u8Mode::None).applies_to(&hires));

        let disabled = CatalogConfig::default();
        assert!(DeviceManifestAgent::from_config(&disabled).is_none());
    }
}
