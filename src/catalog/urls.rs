//! Catalog URL recognition

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::types::{EntityKind, EntityRef};

struct UrlPattern {
    kind: EntityKind,
    regex: Regex,
}

fn pattern(kind: EntityKind, hosts: &str, segment: &str, id: &str) -> UrlPattern {
    let source = format!(
        r"^https://(?:{hosts})\.apple\.com/(\w{{2}})(?:/{segment}|/{segment}/.+)/(?:id)?({id})(?:$|\?)"
    );
    #[allow(clippy::expect_used)]
    let regex = Regex::new(&source).expect("valid catalog URL pattern");
    UrlPattern { kind, regex }
}

static PATTERNS: LazyLock<Vec<UrlPattern>> = LazyLock::new(|| {
    const ALL_HOSTS: &str = r"beta\.music|music|classical\.music";
    const MAIN_HOSTS: &str = r"beta\.music|music";
    const NUMERIC: &str = r"\d+";
    vec![
        pattern(EntityKind::Album, ALL_HOSTS, "album", NUMERIC),
        pattern(EntityKind::MusicVideo, MAIN_HOSTS, "music-video", NUMERIC),
        pattern(EntityKind::Song, ALL_HOSTS, "song", NUMERIC),
        pattern(EntityKind::Playlist, ALL_HOSTS, "playlist", r"pl\.[\w-]+"),
        pattern(EntityKind::Station, MAIN_HOSTS, "station", r"ra\.[\w-]+"),
        pattern(EntityKind::Artist, ALL_HOSTS, "artist", NUMERIC),
    ]
});

/// Recognize a public catalog URL
///
/// Album URLs may carry `?i=<song id>`, which is returned as `song_id`.
pub fn parse_catalog_url(input: &str) -> Result<EntityRef> {
    let input = input.trim();
    for pattern in PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(input) else {
            continue;
        };
        let song_id = match pattern.kind {
            EntityKind::Album => url::Url::parse(input).ok().and_then(|url| {
                url.query_pairs()
                    .find(|(key, _)| key == "i")
                    .map(|(_, value)| value.into_owned())
                    .filter(|value| !value.is_empty())
            }),
            _ => None,
        };
        return Ok(EntityRef {
            kind: pattern.kind,
            storefront: caps[1].to_string(),
            id: caps[2].to_string(),
            song_id,
        });
    }
    Err(Error::InvalidUrl(input.to_string()))
}
