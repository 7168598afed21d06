//! In-memory doubles for the catalog and the external tools.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::catalog::CatalogClient;
use crate::config::{Config, MIN_MEDIA_USER_TOKEN_LEN};
use crate::error::{Error, Result, TrackError};
use crate::orchestrator::{Orchestrator, RunOptions, SelectAll, Services};
use crate::tools::{
    Converter, Decryptor, DecryptorCapabilities, FetchRequest, StreamKind, TagSet, Tagger, ToolSet,
};
use crate::types::{
    AlbumInfo, ArtistInfo, ArtistRelation, PlaylistInfo, ReleaseItem, StationInfo, StationStream,
    TrackInfo,
};

/// Master playlist offering ALAC 44.1/16 and AAC 256
pub(crate) const STEREO_MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-alac-stereo-44100-16\",NAME=\"ALAC\",DEFAULT=YES,AUTOSELECT=YES
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-stereo-256\",NAME=\"AAC\",DEFAULT=NO,AUTOSELECT=YES
#EXT-X-STREAM-INF:BANDWIDTH=1500000,AVERAGE-BANDWIDTH=1400000,CODECS=\"alac\",AUDIO=\"audio-alac-stereo-44100-16\"
alac/prog_index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=270000,AVERAGE-BANDWIDTH=256000,CODECS=\"mp4a.40.2\",AUDIO=\"audio-stereo-256\"
aac/prog_index.m3u8
";

/// Music video master playlist with one 1080p stream and a stereo audio group
pub(crate) const VIDEO_MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-stereo-256\",NAME=\"Stereo\",DEFAULT=YES,AUTOSELECT=YES,URI=\"audio/stereo_gr256_256.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=9000000,AVERAGE-BANDWIDTH=8000000,CODECS=\"avc1.640028,mp4a.40.2\",AUDIO=\"audio-stereo-256\"
video/mv_1920x1080_avc.m3u8
";

pub(crate) const COVER_TEMPLATE: &str =
    "https://art.test/image/thumb/Music/cover.jpg/{w}x{h}bb.jpg";

/// Catalog backed by maps, counting every metadata call
#[derive(Default)]
pub(crate) struct MockCatalog {
    albums: Mutex<HashMap<String, AlbumInfo>>,
    playlists: Mutex<HashMap<String, PlaylistInfo>>,
    stations: Mutex<HashMap<String, StationInfo>>,
    songs: Mutex<HashMap<String, TrackInfo>>,
    music_videos: Mutex<HashMap<String, TrackInfo>>,
    artists: Mutex<HashMap<String, ArtistInfo>>,
    releases: Mutex<HashMap<(String, ArtistRelation), Vec<ReleaseItem>>>,
    texts: Mutex<HashMap<String, String>>,
    bytes: Mutex<HashMap<String, Vec<u8>>>,
    playback: Mutex<HashMap<String, String>>,
    streams: Mutex<HashMap<String, StationStream>>,
    reject_auth: Mutex<bool>,
    metadata_calls: AtomicUsize,
}

impl MockCatalog {
    pub(crate) fn add_album(&self, album: AlbumInfo) {
        self.albums.lock().unwrap().insert(album.id.clone(), album);
    }

    pub(crate) fn add_playlist(&self, playlist: PlaylistInfo) {
        self.playlists
            .lock()
            .unwrap()
            .insert(playlist.id.clone(), playlist);
    }

    pub(crate) fn add_station(&self, station: StationInfo) {
        self.stations
            .lock()
            .unwrap()
            .insert(station.id.clone(), station);
    }

    pub(crate) fn add_song(&self, song: TrackInfo) {
        self.songs.lock().unwrap().insert(song.id.clone(), song);
    }

    pub(crate) fn add_music_video(&self, video: TrackInfo) {
        self.music_videos
            .lock()
            .unwrap()
            .insert(video.id.clone(), video);
    }

    pub(crate) fn add_artist(&self, artist: ArtistInfo) {
        self.artists
            .lock()
            .unwrap()
            .insert(artist.id.clone(), artist);
    }

    pub(crate) fn add_releases(&self, artist_id: &str, relation: ArtistRelation, items: Vec<ReleaseItem>) {
        self.releases
            .lock()
            .unwrap()
            .insert((artist_id.to_string(), relation), items);
    }

    pub(crate) fn add_text(&self, url: &str, text: &str) {
        self.texts
            .lock()
            .unwrap()
            .insert(url.to_string(), text.to_string());
    }

    pub(crate) fn add_bytes(&self, url: &str, bytes: &[u8]) {
        self.bytes
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub(crate) fn add_playback(&self, id: &str, url: &str) {
        self.playback
            .lock()
            .unwrap()
            .insert(id.to_string(), url.to_string());
    }

    pub(crate) fn add_station_stream(&self, id: &str, assets_url: &str) {
        self.streams.lock().unwrap().insert(
            id.to_string(),
            StationStream {
                assets_url: assets_url.to_string(),
            },
        );
    }

    /// Make every later metadata call fail with an authorization error
    pub(crate) fn reject_auth(&self) {
        *self.reject_auth.lock().unwrap() = true;
    }

    /// Number of entity metadata lookups so far
    pub(crate) fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    fn lookup<T: Clone>(
        &self,
        map: &Mutex<HashMap<String, T>>,
        kind: &str,
        id: &str,
    ) -> Result<T> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if *self.reject_auth.lock().unwrap() {
            return Err(Error::Auth("HTTP 401".into()));
        }
        map.lock().unwrap().get(id).cloned().ok_or_else(|| {
            Error::metadata(
                kind,
                id,
                Error::CatalogStatus {
                    status: 404,
                    url: format!("mock://{kind}/{id}"),
                },
            )
        })
    }
}

fn not_found(url: &str) -> Error {
    Error::CatalogStatus {
        status: 404,
        url: url.to_string(),
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn album(&self, _storefront: &str, id: &str) -> Result<AlbumInfo> {
        self.lookup(&self.albums, "albums", id)
    }

    async fn playlist(&self, _storefront: &str, id: &str) -> Result<PlaylistInfo> {
        self.lookup(&self.playlists, "playlists", id)
    }

    async fn station(&self, _storefront: &str, id: &str) -> Result<StationInfo> {
        self.lookup(&self.stations, "stations", id)
    }

    async fn song(&self, _storefront: &str, id: &str) -> Result<TrackInfo> {
        self.lookup(&self.songs, "songs", id)
    }

    async fn music_video(&self, _storefront: &str, id: &str) -> Result<TrackInfo> {
        self.lookup(&self.music_videos, "music-videos", id)
    }

    async fn artist(&self, _storefront: &str, id: &str) -> Result<ArtistInfo> {
        self.lookup(&self.artists, "artists", id)
    }

    async fn artist_releases(
        &self,
        _storefront: &str,
        id: &str,
        relation: ArtistRelation,
    ) -> Result<Vec<ReleaseItem>> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .releases
            .lock()
            .unwrap()
            .get(&(id.to_string(), relation))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.texts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.bytes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| not_found(url))
    }

    async fn webplayback(&self, id: &str) -> Result<String> {
        self.playback
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no playback asset for {id}")))
    }

    async fn station_stream(&self, _storefront: &str, id: &str) -> Result<StationStream> {
        self.streams
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no stream for station {id}")))
    }
}

/// Decryptor that writes a small file per request and records it
///
/// Track IDs can be scripted to fail a number of times or to be unavailable.
#[derive(Default)]
pub(crate) struct MockDecryptor {
    requests: Mutex<Vec<FetchRequest>>,
    failures: Mutex<HashMap<String, usize>>,
    unavailable: Mutex<HashSet<String>>,
    failing_suffix: Mutex<Option<String>>,
    without_music_video: bool,
}

impl MockDecryptor {
    pub(crate) fn without_music_video() -> Self {
        Self {
            without_music_video: true,
            ..Self::default()
        }
    }

    /// Fail the next `times` fetches of `track_id`
    pub(crate) fn fail(&self, track_id: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(track_id.to_string(), times);
    }

    /// Fail every fetch whose destination file name ends with `suffix`
    pub(crate) fn fail_destinations_ending_with(&self, suffix: &str) {
        *self.failing_suffix.lock().unwrap() = Some(suffix.to_string());
    }

    pub(crate) fn mark_unavailable(&self, track_id: &str) {
        self.unavailable
            .lock()
            .unwrap()
            .insert(track_id.to_string());
    }

    pub(crate) fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn fetched_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .requests()
            .into_iter()
            .filter(|r| r.kind != StreamKind::MusicVideo)
            .map(|r| r.track_id)
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Decryptor for MockDecryptor {
    async fn fetch(&self, request: &FetchRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.unavailable.lock().unwrap().contains(&request.track_id) {
            return Err(TrackError::VariantUnavailable {
                track_id: request.track_id.clone(),
                reason: "stream refused".into(),
            }
            .into());
        }
        if let Some(suffix) = self.failing_suffix.lock().unwrap().as_deref() {
            if request.destination.to_string_lossy().ends_with(suffix) {
                return Err(Error::ExternalTool("decryptor exited with status 1".into()));
            }
        }
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&request.track_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::ExternalTool("connection reset".into()));
                }
            }
        }
        tokio::fs::write(&request.destination, request.stream_url.as_bytes()).await?;
        Ok(())
    }

    fn capabilities(&self) -> DecryptorCapabilities {
        DecryptorCapabilities {
            audio: true,
            music_video: !self.without_music_video,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Tagger that records every call; muxing writes the output file
#[derive(Default)]
pub(crate) struct MockTagger {
    embedded: Mutex<Vec<(PathBuf, TagSet)>>,
    muxed: Mutex<Vec<(PathBuf, TagSet)>>,
    failing: Mutex<bool>,
}

impl MockTagger {
    pub(crate) fn failing() -> Self {
        Self {
            failing: Mutex::new(true),
            ..Self::default()
        }
    }

    pub(crate) fn embedded(&self) -> Vec<(PathBuf, TagSet)> {
        self.embedded.lock().unwrap().clone()
    }

    /// Tags of the last embed call on a file with this name
    pub(crate) fn tags_for(&self, file_name: &str) -> Option<TagSet> {
        self.embedded()
            .into_iter()
            .rev()
            .find(|(path, _)| path.file_name().is_some_and(|n| n == file_name))
            .map(|(_, tags)| tags)
    }

    pub(crate) fn muxed(&self) -> Vec<(PathBuf, TagSet)> {
        self.muxed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tagger for MockTagger {
    async fn embed_tags(&self, path: &Path, tags: &TagSet) -> Result<()> {
        self.embedded
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone()));
        if *self.failing.lock().unwrap() {
            return Err(Error::ExternalTool("MP4Box exited with 1".into()));
        }
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, tags: &TagSet, output: &Path) -> Result<()> {
        assert!(video.exists() && audio.exists(), "mux inputs must exist");
        self.muxed
            .lock()
            .unwrap()
            .push((output.to_path_buf(), tags.clone()));
        tokio::fs::write(output, b"muxed").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Converter that copies the input to the new extension
#[derive(Default)]
pub(crate) struct MockConverter {
    converted: Mutex<Vec<PathBuf>>,
}

impl MockConverter {
    pub(crate) fn converted(&self) -> Vec<PathBuf> {
        self.converted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Converter for MockConverter {
    async fn convert(&self, input: &Path, format: &str, _extra_args: &str) -> Result<PathBuf> {
        let output = input.with_extension(format);
        tokio::fs::copy(input, &output).await?;
        self.converted.lock().unwrap().push(output.clone());
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// The doubles wired into an orchestrator, kept for assertions
pub(crate) struct Harness {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) catalog: Arc<MockCatalog>,
    pub(crate) decryptor: Arc<MockDecryptor>,
    pub(crate) tagger: Arc<MockTagger>,
    pub(crate) converter: Arc<MockConverter>,
    pub(crate) root: PathBuf,
    _dir: tempfile::TempDir,
}

/// Config writing under `root` with a usable media user token
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.output_folder = root.to_path_buf();
    config.download.concurrency = 2;
    config.catalog.media_user_token = Some("m".repeat(MIN_MEDIA_USER_TOKEN_LEN));
    config.artwork.cover_size = "600x600".into();
    config
}

pub(crate) struct HarnessBuilder {
    config: Config,
    options: RunOptions,
    catalog: MockCatalog,
    decryptor: MockDecryptor,
    tagger: MockTagger,
    dir: tempfile::TempDir,
}

impl HarnessBuilder {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        Self {
            config,
            options: RunOptions::default(),
            catalog: MockCatalog::default(),
            decryptor: MockDecryptor::default(),
            tagger: MockTagger::default(),
            dir,
        }
    }

    pub(crate) fn config(mut self, update: impl FnOnce(&mut Config)) -> Self {
        update(&mut self.config);
        self
    }

    pub(crate) fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn catalog(mut self, catalog: MockCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub(crate) fn decryptor(mut self, decryptor: MockDecryptor) -> Self {
        self.decryptor = decryptor;
        self
    }

    pub(crate) fn tagger(mut self, tagger: MockTagger) -> Self {
        self.tagger = tagger;
        self
    }

    pub(crate) fn build(self) -> Harness {
        let catalog = Arc::new(self.catalog);
        let decryptor = Arc::new(self.decryptor);
        let tagger = Arc::new(self.tagger);
        let converter = Arc::new(MockConverter::default());
        let services = Services {
            catalog: catalog.clone(),
            tools: ToolSet {
                decryptor: decryptor.clone(),
                tagger: tagger.clone(),
                converter: converter.clone(),
            },
            selector: Arc::new(SelectAll),
            device: None,
        };
        let root = self.config.download.output_folder.clone();
        Harness {
            orchestrator: Orchestrator::new(self.config, services, self.options),
            catalog,
            decryptor,
            tagger,
            converter,
            root,
            _dir: self.dir,
        }
    }
}

/// Song with an enhanced manifest registered on `catalog`
pub(crate) fn song(catalog: &MockCatalog, id: &str, name: &str, number: u32) -> TrackInfo {
    let hls = format!("https://hls.test/{id}/master.m3u8");
    catalog.add_text(&hls, STEREO_MASTER);
    TrackInfo {
        id: id.into(),
        name: name.into(),
        artist_name: "Test Artist".into(),
        album_name: "Test Album".into(),
        album_id: Some("100".into()),
        disc_number: 1,
        track_number: number,
        release_date: "2020-02-02".into(),
        isrc: format!("ISRC{id}"),
        genre: "Rock".into(),
        artwork_url: COVER_TEMPLATE.into(),
        enhanced_hls: Some(hls),
        ..TrackInfo::default()
    }
}

/// Album `100` by "Test Artist" with the given tracks and a downloadable cover
pub(crate) fn album(catalog: &MockCatalog, tracks: Vec<TrackInfo>) -> AlbumInfo {
    catalog.add_bytes(
        "https://art.test/image/thumb/Music/cover.jpg/600x600bb.jpg",
        b"cover",
    );
    AlbumInfo {
        id: "100".into(),
        name: "Test Album".into(),
        artist_name: "Test Artist".into(),
        artist_id: Some("7".into()),
        release_date: "2020-02-02".into(),
        upc: "0001".into(),
        copyright: "(P) 2020".into(),
        artwork_url: COVER_TEMPLATE.into(),
        tracks,
        ..AlbumInfo::default()
    }
}

/// Album with four songs, registered on `catalog`
pub(crate) fn four_track_album(catalog: &MockCatalog) -> AlbumInfo {
    let tracks = (1..=4)
        .map(|n| song(catalog, &format!("10{n}"), &format!("Song {n}"), n))
        .collect();
    let album = album(catalog, tracks);
    catalog.add_album(album.clone());
    album
}
