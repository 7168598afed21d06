//! Folder and file naming from templates
//!
//! Templates contain `{Placeholder}` tokens. Unknown tokens are left as written.
//! Rendered names are sanitized so they are valid single path segments.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::config::NamingConfig;
use crate::types::{AlbumInfo, ContentRating, TrackInfo};

#[allow(clippy::expect_used)]
static FORBIDDEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\<>:"|?*]"#).expect("valid regex"));

/// Substitute `{Key}` tokens in one left-to-right pass
///
/// Substituted values are never re-scanned, so a value containing a token
/// is written literally.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let replaced = candidate.find('}').and_then(|end| {
            let key = &candidate[1..end];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end + 1))
        });
        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Replace characters that are invalid in file names with `_`
pub fn sanitize(name: &str) -> String {
    FORBIDDEN_RE.replace_all(name, "_").into_owned()
}

/// Turn a rendered folder template into a path segment
///
/// A name ending in "." loses all its dots; surrounding whitespace is trimmed.
pub fn folder_segment(rendered: &str) -> String {
    let name = if rendered.ends_with('.') {
        rendered.replace('.', "")
    } else {
        rendered.to_string()
    };
    sanitize(name.trim())
}

/// Keep at most `max` characters
pub fn limit(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

/// `{Tag}` text: configured master, explicit and clean labels joined by spaces
pub fn tag_string(naming: &NamingConfig, is_master: bool, rating: ContentRating) -> String {
    let mut parts = Vec::new();
    if is_master && !naming.apple_master_choice.is_empty() {
        parts.push(naming.apple_master_choice.as_str());
    }
    match rating {
        ContentRating::Explicit if !naming.explicit_choice.is_empty() => {
            parts.push(naming.explicit_choice.as_str());
        }
        ContentRating::Clean if !naming.clean_choice.is_empty() => {
            parts.push(naming.clean_choice.as_str());
        }
        _ => {}
    }
    parts.join(" ")
}

/// Values for the artist folder template
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtistNames {
    /// `{ArtistName}`
    pub artist_name: String,
    /// `{UrlArtistName}`: the artist a whole-artist run was started from
    pub url_artist_name: String,
    /// `{ArtistId}`
    pub artist_id: String,
}

impl ArtistNames {
    /// Same name for `{ArtistName}` and `{UrlArtistName}`
    pub fn single(name: &str, id: &str) -> Self {
        Self {
            artist_name: name.to_string(),
            url_artist_name: name.to_string(),
            artist_id: id.to_string(),
        }
    }
}

/// Artist level folder under `root`; `root` itself when the template is empty
pub fn artist_folder(root: &Path, naming: &NamingConfig, names: &ArtistNames) -> PathBuf {
    if naming.artist_folder_format.is_empty() {
        return root.to_path_buf();
    }
    let artist = limit(&names.artist_name, naming.limit_max);
    let url_artist = limit(&names.url_artist_name, naming.limit_max);
    let rendered = render(
        &naming.artist_folder_format,
        &[
            ("ArtistName", artist.as_str()),
            ("UrlArtistName", url_artist.as_str()),
            ("ArtistId", names.artist_id.as_str()),
        ],
    );
    let segment = folder_segment(&rendered);
    if segment.is_empty() {
        return root.to_path_buf();
    }
    root.join(segment)
}

/// Album folder segment
pub fn album_folder(
    naming: &NamingConfig,
    album: &AlbumInfo,
    quality: &str,
    codec: &str,
    tag: &str,
) -> String {
    let name = limit(&album.name, naming.limit_max);
    let artist = limit(&album.artist_name, naming.limit_max);
    let rendered = render(
        &naming.album_folder_format,
        &[
            ("ReleaseDate", album.release_date.as_str()),
            ("ReleaseYear", album.release_year()),
            ("ArtistName", artist.as_str()),
            ("AlbumName", name.as_str()),
            ("UPC", album.upc.as_str()),
            ("RecordLabel", album.record_label.as_str()),
            ("Copyright", album.copyright.as_str()),
            ("AlbumId", album.id.as_str()),
            ("Quality", quality),
            ("Codec", codec),
            ("Tag", tag),
        ],
    );
    folder_segment(&rendered)
}

/// Playlist or station folder segment
pub fn playlist_folder(
    naming: &NamingConfig,
    id: &str,
    name: &str,
    artist_name: &str,
    quality: &str,
    codec: &str,
    tag: &str,
) -> String {
    let name = limit(name, naming.limit_max);
    let rendered = render(
        &naming.playlist_folder_format,
        &[
            ("ArtistName", artist_name),
            ("PlaylistName", name.as_str()),
            ("PlaylistId", id),
            ("Quality", quality),
            ("Codec", codec),
            ("Tag", tag),
        ],
    );
    folder_segment(&rendered)
}

/// Track file name without extension
///
/// `sequence` is the job's place in its batch and fills `{SongNumer}`.
pub fn song_file_stem(
    naming: &NamingConfig,
    track: &TrackInfo,
    sequence: usize,
    quality: &str,
    codec: &str,
    tag: &str,
) -> String {
    let number = format!("{sequence:02}");
    let name = limit(&track.name, naming.limit_max);
    let disc = track.disc_number.to_string();
    let track_no = track.track_number.to_string();
    let rendered = render(
        &naming.song_file_format,
        &[
            ("SongId", track.id.as_str()),
            ("SongNumer", number.as_str()),
            ("SongName", name.as_str()),
            ("DiscNumber", disc.as_str()),
            ("TrackNumber", track_no.as_str()),
            ("Quality", quality),
            ("Tag", tag),
            ("Codec", codec),
        ],
    );
    sanitize(&rendered)
}
