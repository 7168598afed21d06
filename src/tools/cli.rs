//! Collaborators backed by external binaries

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

use super::traits::{
    Decryptor, DecryptorCapabilities, FetchRequest, StreamKind, TagSet, Tagger,
};
use crate::error::TrackError;

/// Decryptor that shells out to a `catalog-decrypt` compatible binary
///
/// The binary is invoked as
/// `<binary> --kind <enhanced|legacy|music-video> --id <track> --url <stream> --output <file>`
/// with the catalog tokens passed through the environment. A failure whose
/// stderr mentions "Unavailable" means the service refused the stream.
///
/// # Examples
///
/// ```no_run
/// use catalog_dl::tools::CliDecryptor;
/// use std::path::PathBuf;
///
/// let decryptor = CliDecryptor::new(PathBuf::from("/usr/local/bin/catalog-decrypt"))
///     .with_mp4decrypt(Some(PathBuf::from("/usr/local/bin/mp4decrypt")));
/// ```
pub struct CliDecryptor {
    binary_path: PathBuf,
    mp4decrypt_path: Option<PathBuf>,
    authorization_token: Option<String>,
    media_user_token: Option<String>,
}

impl CliDecryptor {
    /// Create a decryptor with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            mp4decrypt_path: None,
            authorization_token: None,
            media_user_token: None,
        }
    }

    /// Attempt to find `catalog-decrypt` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("catalog-decrypt").ok().map(Self::new)
    }

    /// mp4decrypt binary, required for music videos
    pub fn with_mp4decrypt(mut self, path: Option<PathBuf>) -> Self {
        self.mp4decrypt_path = path;
        self
    }

    /// Catalog tokens forwarded to the binary
    pub fn with_tokens(
        mut self,
        authorization_token: Option<String>,
        media_user_token: Option<String>,
    ) -> Self {
        self.authorization_token = authorization_token;
        self.media_user_token = media_user_token;
        self
    }
}

#[async_trait]
impl Decryptor for CliDecryptor {
    async fn fetch(&self, request: &FetchRequest) -> crate::Result<()> {
        if request.kind == StreamKind::MusicVideo && self.mp4decrypt_path.is_none() {
            return Err(crate::Error::NotSupported(
                "music videos require the mp4decrypt binary".into(),
            ));
        }

        let mut command = Command::new(&self.binary_path);
        command
            .arg("--kind")
            .arg(request.kind.as_arg())
            .arg("--id")
            .arg(&request.track_id)
            .arg("--url")
            .arg(&request.stream_url)
            .arg("--output")
            .arg(&request.destination)
            .kill_on_drop(true);
        if let Some(token) = &self.authorization_token {
            command.env("CATALOG_AUTHORIZATION_TOKEN", token);
        }
        if let Some(token) = &self.media_user_token {
            command.env("CATALOG_MEDIA_USER_TOKEN", token);
        }
        if let Some(path) = &self.mp4decrypt_path {
            command.env("MP4DECRYPT_PATH", path);
        }

        tracing::debug!(
            track_id = %request.track_id,
            kind = request.kind.as_arg(),
            destination = %request.destination.display(),
            "running decryptor"
        );
        let output = command.output().await.map_err(|e| {
            crate::Error::ExternalTool(format!("Failed to execute decryptor: {}", e))
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(classify_decryptor_failure(&request.track_id, &output))
        }
    }

    fn capabilities(&self) -> DecryptorCapabilities {
        DecryptorCapabilities {
            audio: true,
            music_video: self.mp4decrypt_path.is_some(),
        }
    }

    fn name(&self) -> &'static str {
        "cli-decryptor"
    }
}

fn classify_decryptor_failure(track_id: &str, output: &Output) -> crate::Error {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.contains("Unavailable") {
        return TrackError::VariantUnavailable {
            track_id: track_id.to_string(),
            reason: stderr,
        }
        .into();
    }
    crate::Error::ExternalTool(format!("decryptor exited with {}: {}", output.status, stderr))
}

/// Tagger that shells out to MP4Box
pub struct Mp4BoxTagger {
    binary_path: PathBuf,
}

impl Mp4BoxTagger {
    /// Create a tagger with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find MP4Box in PATH
    pub fn from_path() -> Option<Self> {
        which::which("MP4Box").ok().map(Self::new)
    }

    async fn run(&self, command: &mut Command) -> crate::Result<()> {
        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute MP4Box: {}", e)))?;
        if output.status.success() {
            return Ok(());
        }
        Err(crate::Error::ExternalTool(format!(
            "MP4Box exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[async_trait]
impl Tagger for Mp4BoxTagger {
    async fn embed_tags(&self, path: &Path, tags: &TagSet) -> crate::Result<()> {
        self.run(
            Command::new(&self.binary_path)
                .arg("-itags")
                .arg(tags.to_itags())
                .arg(path),
        )
        .await
    }

    async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        tags: &TagSet,
        output: &Path,
    ) -> crate::Result<()> {
        self.run(
            Command::new(&self.binary_path)
                .arg("-itags")
                .arg(tags.to_itags())
                .arg("-quiet")
                .arg("-add")
                .arg(video)
                .arg("-add")
                .arg(audio)
                .arg("-keep-utc")
                .arg("-new")
                .arg(output),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "mp4box"
    }
}
