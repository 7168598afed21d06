//! Catalog fixtures served by a wiremock server

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use catalog_dl::config::RetryConfig;
use catalog_dl::{Config, HttpCatalogClient, SelectAll, Services, ToolSet};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ALBUM_ID: &str = "1440932150";

/// Master playlist with ALAC 44.1/16 and AAC 256 variants
pub const STEREO_MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-alac-stereo-44100-16\",NAME=\"ALAC\",DEFAULT=YES,AUTOSELECT=YES
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-stereo-256\",NAME=\"AAC\",DEFAULT=NO,AUTOSELECT=YES
#EXT-X-STREAM-INF:BANDWIDTH=1500000,AVERAGE-BANDWIDTH=1400000,CODECS=\"alac\",AUDIO=\"audio-alac-stereo-44100-16\"
alac/prog_index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=270000,AVERAGE-BANDWIDTH=256000,CODECS=\"mp4a.40.2\",AUDIO=\"audio-stereo-256\"
aac/prog_index.m3u8
";

/// Config pointing every catalog endpoint at `server` and writing under `root`
pub fn config_for(server: &MockServer, root: &Path) -> Config {
    let mut config = Config::default();
    config.catalog.api_base_url = server.uri();
    config.catalog.webplayback_url = format!("{}/play", server.uri());
    config.catalog.authorization_token = Some("Bearer test-token".into());
    config.catalog.media_user_token = Some("m".repeat(64));
    config.download.output_folder = root.to_path_buf();
    config.download.concurrency = 2;
    config.artwork.cover_size = "600x600".into();
    config.retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        backoff_multiplier: 1.0,
        jitter: false,
    };
    config
}

/// HTTP catalog client with the given tools
pub fn services_for(config: &Config, tools: ToolSet) -> Services {
    Services {
        catalog: Arc::new(HttpCatalogClient::new(config).unwrap()),
        tools,
        selector: Arc::new(SelectAll),
        device: None,
    }
}

fn song_json(server: &MockServer, id: &str, name: &str, number: u32) -> Value {
    json!({
        "id": id,
        "type": "songs",
        "attributes": {
            "name": name,
            "artistName": "Joni Mitchell",
            "albumName": "Blue",
            "discNumber": 1,
            "trackNumber": number,
            "releaseDate": "1971-06-22",
            "isrc": format!("USRE1{id}"),
            "genreNames": ["Folk", "Music"],
            "artwork": {"url": format!("{}/art/{{w}}x{{h}}bb.jpg", server.uri())},
            "extendedAssetUrls": {"enhancedHls": format!("{}/hls/{id}/master.m3u8", server.uri())}
        }
    })
}

/// Serve a three-track album, its cover and one master playlist per track
pub async fn mount_album(server: &MockServer) {
    let tracks: Vec<Value> = [("1", "All I Want"), ("2", "My Old Man"), ("3", "Little Green")]
        .iter()
        .zip(1..)
        .map(|((id, name), number)| song_json(server, id, name, number))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/v1/catalog/us/albums/{ALBUM_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": ALBUM_ID,
                "attributes": {
                    "name": "Blue",
                    "artistName": "Joni Mitchell",
                    "releaseDate": "1971-06-22",
                    "upc": "075992716626",
                    "copyright": "(P) 1971 Reprise Records",
                    "artwork": {"url": format!("{}/art/{{w}}x{{h}}bb.jpg", server.uri())}
                },
                "relationships": {
                    "tracks": {"data": tracks},
                    "artists": {"data": [{"id": "4486", "attributes": {}}]}
                }
            }]
        })))
        .mount(server)
        .await;

    for id in ["1", "2", "3"] {
        Mock::given(method("GET"))
            .and(path(format!("/hls/{id}/master.m3u8")))
            .respond_with(ResponseTemplate::new(200).set_body_string(STEREO_MASTER))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/art/600x600bb.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .mount(server)
        .await;
}

pub fn album_url() -> String {
    format!("https://music.apple.com/us/album/blue/{ALBUM_ID}")
}
