//! Recording stand-ins for the external tools

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use catalog_dl::tools::{
    DecryptorCapabilities, FetchRequest, NoOpConverter, TagSet,
};
use catalog_dl::{Decryptor, Error, Result, Tagger, ToolSet};

/// Writes the stream URL into the destination file and records the request
#[derive(Default)]
pub struct RecordingDecryptor {
    requests: Mutex<Vec<FetchRequest>>,
    failures: Mutex<HashMap<String, usize>>,
}

impl RecordingDecryptor {
    /// Fail the next `times` fetches of `track_id`
    pub fn fail(&self, track_id: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(track_id.to_string(), times);
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Decryptor for RecordingDecryptor {
    async fn fetch(&self, request: &FetchRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&request.track_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::ExternalTool("decryptor exited with status 1".into()));
            }
        }
        tokio::fs::write(&request.destination, request.stream_url.as_bytes()).await?;
        Ok(())
    }

    fn capabilities(&self) -> DecryptorCapabilities {
        DecryptorCapabilities {
            audio: true,
            music_video: true,
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Records every tag set; muxing writes the output file
#[derive(Default)]
pub struct RecordingTagger {
    tagged: Mutex<Vec<(PathBuf, TagSet)>>,
}

impl RecordingTagger {
    /// Tag sets embedded into the file named `file_name`, in call order
    pub fn tags_for(&self, file_name: &str) -> Vec<TagSet> {
        self.tagged
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.file_name().is_some_and(|n| n == file_name))
            .map(|(_, tags)| tags.clone())
            .collect()
    }
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn embed_tags(&self, path: &Path, tags: &TagSet) -> Result<()> {
        self.tagged
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone()));
        Ok(())
    }

    async fn mux(&self, _video: &Path, _audio: &Path, tags: &TagSet, output: &Path) -> Result<()> {
        self.tagged
            .lock()
            .unwrap()
            .push((output.to_path_buf(), tags.clone()));
        tokio::fs::write(output, b"muxed").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Tool set over shared recording doubles, conversion disabled
pub fn recording_tools(decryptor: &Arc<RecordingDecryptor>, tagger: &Arc<RecordingTagger>) -> ToolSet {
    ToolSet {
        decryptor: decryptor.clone(),
        tagger: tagger.clone(),
        converter: Arc::new(NoOpConverter),
    }
}
