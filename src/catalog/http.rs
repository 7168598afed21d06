//! HTTP implementation of [`CatalogClient`]

use async_trait::async_trait;
use reqwest::header::{COOKIE, ORIGIN};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    AlbumResource, ArtistResource, Document, PlaylistResource, ReleaseResource, StationAssets,
    StationResource, TrackResource, WebPlayback,
};
use super::{CatalogClient, sort_releases};
use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{
    AlbumInfo, ArtistInfo, ArtistRelation, PlaylistInfo, ReleaseItem, StationInfo, StationStream,
    TrackInfo,
};

const WEB_ORIGIN: &str = "https://music.apple.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const RELEASE_PAGE_SIZE: usize = 100;

/// Catalog client over HTTPS
///
/// Every request is retried on transient failures according to
/// [`RetryConfig`]. HTTP 401 and 403 map to [`Error::Auth`].
pub struct HttpCatalogClient {
    http: reqwest::Client,
    api_base_url: String,
    webplayback_url: String,
    language: String,
    authorization_token: Option<String>,
    media_user_token: Option<String>,
    retry: RetryConfig,
}

impl HttpCatalogClient {
    /// Create a client from the catalog and retry settings
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.catalog.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base_url: config.catalog.api_base_url.trim_end_matches('/').to_string(),
            webplayback_url: config.catalog.webplayback_url.clone(),
            language: config.catalog.language.clone(),
            authorization_token: config.catalog.bearer_token(),
            media_user_token: config.catalog.media_user_token().map(str::to_string),
            retry: config.retry.clone(),
        })
    }

    fn catalog_url(&self, storefront: &str, path: &str) -> String {
        format!("{}/v1/catalog/{}/{}", self.api_base_url, storefront, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder.header(ORIGIN, WEB_ORIGIN);
        if let Some(token) = &self.authorization_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(token) = &self.media_user_token {
            builder = builder.header("Media-User-Token", token);
        }
        builder
    }

    /// Query parameters shared by catalog calls, plus `extra`
    fn query(&self, extra: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
        let mut query: Vec<(&'static str, String)> = extra
            .iter()
            .map(|(key, value)| (*key, (*value).to_string()))
            .collect();
        if !self.language.is_empty() {
            query.push(("l", self.language.clone()));
        }
        query
    }

    fn require_media_user_token(&self, what: &str) -> Result<&str> {
        self.media_user_token.as_deref().ok_or_else(|| {
            Error::NotSupported(format!("{what} requires a media user token"))
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        with_retry(&self.retry, move || async move {
            let response = self
                .authorized(self.http.get(url))
                .query(query)
                .send()
                .await?;
            Ok(check_status(response)?.json::<T>().await?)
        })
        .await
    }

    async fn get_plain(&self, url: &str) -> Result<Response> {
        with_retry(&self.retry, move || async move {
            let response = self.http.get(url).send().await?;
            check_status(response)
        })
        .await
    }

    /// Follow `next` links of a track relationship
    async fn remaining_tracks(&self, mut next: Option<String>) -> Result<Vec<TrackInfo>> {
        let mut tracks = Vec::new();
        let query = self.query(&[("extend", "extendedAssetUrls")]);
        while let Some(path) = next.take() {
            let url = format!("{}{}", self.api_base_url, path);
            let page: Document<TrackResource> = self.get_json(&url, &query).await?;
            tracks.extend(page.data.into_iter().map(TrackInfo::from));
            next = page.next;
        }
        Ok(tracks)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Auth(format!(
            "catalog returned HTTP {} for {}",
            status.as_u16(),
            url
        )));
    }
    Err(Error::CatalogStatus {
        status: status.as_u16(),
        url,
    })
}

fn first<T>(data: Vec<T>, kind: &str, id: &str) -> Result<T> {
    data.into_iter().next().ok_or_else(|| Error::MetadataFetch {
        kind: kind.to_string(),
        id: id.to_string(),
        reason: "empty response".into(),
    })
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn album(&self, storefront: &str, id: &str) -> Result<AlbumInfo> {
        let fetch = async {
            let url = self.catalog_url(storefront, &format!("albums/{id}"));
            let query = self.query(&[("include", "tracks,artists"), ("extend", "extendedAssetUrls")]);
            let doc: Document<AlbumResource> = self.get_json(&url, &query).await?;
            let mut resource = first(doc.data, "albums", id)?;
            let next = resource.take_tracks_next();
            let mut album = AlbumInfo::from(resource);
            album.tracks.extend(self.remaining_tracks(next).await?);
            Ok::<_, Error>(album)
        };
        let album = fetch.await.map_err(|e| Error::metadata("albums", id, e))?;
        tracing::debug!(album_id = %id, tracks = album.tracks.len(), "album metadata fetched");
        Ok(album)
    }

    async fn playlist(&self, storefront: &str, id: &str) -> Result<PlaylistInfo> {
        let fetch = async {
            let url = self.catalog_url(storefront, &format!("playlists/{id}"));
            let query = self.query(&[("include", "tracks"), ("extend", "extendedAssetUrls")]);
            let doc: Document<PlaylistResource> = self.get_json(&url, &query).await?;
            let mut resource = first(doc.data, "playlists", id)?;
            let next = resource.take_tracks_next();
            let mut playlist = PlaylistInfo::from(resource);
            playlist.tracks.extend(self.remaining_tracks(next).await?);
            Ok::<_, Error>(playlist)
        };
        let playlist = fetch.await.map_err(|e| Error::metadata("playlists", id, e))?;
        tracing::debug!(playlist_id = %id, tracks = playlist.tracks.len(), "playlist metadata fetched");
        Ok(playlist)
    }

    async fn station(&self, storefront: &str, id: &str) -> Result<StationInfo> {
        let fetch = async {
            let url = self.catalog_url(storefront, &format!("stations/{id}"));
            let doc: Document<StationResource> = self.get_json(&url, &self.query(&[])).await?;
            let resource = first(doc.data, "stations", id)?;
            if resource.attributes.is_live {
                return Ok(resource.into_info(Vec::new()));
            }

            self.require_media_user_token("station tracks")?;
            let tracks_url = format!("{}/v1/me/stations/next-tracks/{}", self.api_base_url, id);
            let query = self.query(&[("extend", "extendedAssetUrls")]);
            let tracks = with_retry(&self.retry, || {
                let request = self.authorized(self.http.post(&tracks_url)).query(&query);
                async move {
                    let response = check_status(request.send().await?)?;
                    Ok::<_, Error>(response.json::<Document<TrackResource>>().await?)
                }
            })
            .await?;
            let tracks = tracks.data.into_iter().map(TrackInfo::from).collect();
            Ok::<_, Error>(resource.into_info(tracks))
        };
        fetch.await.map_err(|e| Error::metadata("stations", id, e))
    }

    async fn song(&self, storefront: &str, id: &str) -> Result<TrackInfo> {
        let fetch = async {
            let url = self.catalog_url(storefront, &format!("songs/{id}"));
            let query = self.query(&[("include", "albums,artists"), ("extend", "extendedAssetUrls")]);
            let doc: Document<TrackResource> = self.get_json(&url, &query).await?;
            Ok::<_, Error>(TrackInfo::from(first(doc.data, "songs", id)?))
        };
        fetch.await.map_err(|e| Error::metadata("songs", id, e))
    }

    async fn music_video(&self, storefront: &str, id: &str) -> Result<TrackInfo> {
        let fetch = async {
            let url = self.catalog_url(storefront, &format!("music-videos/{id}"));
            let query = self.query(&[("include", "albums,artists")]);
            let doc: Document<TrackResource> = self.get_json(&url, &query).await?;
            Ok::<_, Error>(TrackInfo::from(first(doc.data, "music-videos", id)?))
        };
        fetch
            .await
            .map_err(|e| Error::metadata("music-videos", id, e))
    }

    async fn artist(&self, storefront: &str, id: &str) -> Result<ArtistInfo> {
        let fetch = async {
            let url = self.catalog_url(storefront, &format!("artists/{id}"));
            let doc: Document<ArtistResource> = self.get_json(&url, &self.query(&[])).await?;
            Ok::<_, Error>(ArtistInfo::from(first(doc.data, "artists", id)?))
        };
        fetch.await.map_err(|e| Error::metadata("artists", id, e))
    }

    async fn artist_releases(
        &self,
        storefront: &str,
        id: &str,
        relation: ArtistRelation,
    ) -> Result<Vec<ReleaseItem>> {
        let url = self.catalog_url(
            storefront,
            &format!("artists/{id}/{}", relation.catalog_path()),
        );
        let limit = RELEASE_PAGE_SIZE.to_string();
        let mut releases = Vec::new();
        let mut offset = 0;
        loop {
            let offset_value = offset.to_string();
            let query = self.query(&[("limit", limit.as_str()), ("offset", offset_value.as_str())]);
            let page: Document<ReleaseResource> = self
                .get_json(&url, &query)
                .await
                .map_err(|e| Error::metadata(relation.catalog_path(), id, e))?;
            releases.extend(page.data.into_iter().map(ReleaseItem::from));
            if page.next.is_none() {
                break;
            }
            offset += RELEASE_PAGE_SIZE;
        }
        sort_releases(&mut releases);
        tracing::debug!(
            artist_id = %id,
            relation = relation.catalog_path(),
            count = releases.len(),
            "artist releases fetched"
        );
        Ok(releases)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(self.get_plain(url).await?.text().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.get_plain(url).await?.bytes().await?.to_vec())
    }

    async fn webplayback(&self, id: &str) -> Result<String> {
        let token = self.require_media_user_token("the playback endpoint")?;
        let body = serde_json::json!({ "salableAdamId": id });
        let playback: WebPlayback = with_retry(&self.retry, || {
            let request = self
                .authorized(self.http.post(&self.webplayback_url))
                .header(COOKIE, format!("media-user-token={token}"))
                .json(&body);
            async move {
                let response = check_status(request.send().await?)?;
                Ok::<_, Error>(response.json::<WebPlayback>().await?)
            }
        })
        .await?;

        playback
            .song_list
            .into_iter()
            .find_map(|song| song.hls_playlist_url.filter(|url| !url.is_empty()))
            .ok_or_else(|| {
                Error::Other(format!(
                    "playback endpoint returned no stream for {id}; the media user token may be wrong or expired"
                ))
            })
    }

    async fn station_stream(&self, _storefront: &str, id: &str) -> Result<StationStream> {
        self.require_media_user_token("station streams")?;
        let url = format!("{}/v1/play/assets", self.api_base_url);
        let query = vec![
            ("id", id.to_string()),
            ("kind", "radioStation".to_string()),
            ("keyFormat", "web".to_string()),
        ];
        let assets: StationAssets = self.get_json(&url, &query).await?;
        let asset = assets.results.assets.into_iter().next().ok_or_else(|| {
            Error::MetadataFetch {
                kind: "stations".into(),
                id: id.to_string(),
                reason: "no stream assets".into(),
            }
        })?;
        Ok(StationStream {
            assets_url: asset.url,
        })
    }
}
