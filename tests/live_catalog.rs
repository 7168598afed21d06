//! Tests against the real catalog API
//!
//! Requires a configuration file with a valid authorization token, given by
//! `CATALOG_DL_CONFIG`.
//!
//! ```bash
//! CATALOG_DL_CONFIG=config.toml cargo test --features live-tests --test live_catalog
//! ```

#![cfg(feature = "live-tests")]

use std::path::PathBuf;

use catalog_dl::types::ArtistRelation;
use catalog_dl::{CatalogClient, Config, HttpCatalogClient, parse_catalog_url};

fn live_client() -> HttpCatalogClient {
    let path = std::env::var("CATALOG_DL_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = Config::from_file(&PathBuf::from(path)).unwrap();
    HttpCatalogClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_live_album_has_tracks_with_enhanced_manifests() {
    let entity = parse_catalog_url("https://music.apple.com/us/album/blue/1440932150").unwrap();
    let album = live_client()
        .album(&entity.storefront, &entity.id)
        .await
        .unwrap();

    assert_eq!(album.name, "Blue");
    assert_eq!(album.tracks.len(), 10);
    assert!(album.tracks.iter().all(|t| t.enhanced_hls.is_some()));
}

#[tokio::test]
async fn test_live_artist_releases_are_sorted_by_date() {
    let releases = live_client()
        .artist_releases("us", "4486", ArtistRelation::Albums)
        .await
        .unwrap();

    assert!(!releases.is_empty());
    let dates: Vec<_> = releases.iter().map(|r| r.release_date.as_str()).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
}
