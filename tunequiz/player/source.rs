use crate::config::Settings;
use crate::error::App;
use log::{info, warn};
use reqwest::header::{ACCEPT, RANGE, USER_AGENT};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;

const YOUTUBE_HOSTS: [&str; 8] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
    "youtubeeducation.com",
    "www.youtubeeducation.com",
];

const VIDEO_ID_LEN: usize = 11;
const BROWSER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:131.0) Gecko/20100101 Firefox/131.0";

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAudio {
    pub stream_url: String,
    pub title: Option<String>,
    pub duration: Option<f64>,
}

#[derive(Deserialize)]
struct ResolverInfo {
    url: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Whether the URL has one of the shapes an embedded YouTube player accepts.
pub fn can_play(input: &str) -> bool {
    let input = input.trim();
    let parsed = if input.contains("://") {
        Url::parse(input)
    } else {
        Url::parse(&format!("https://{input}"))
    };
    let Ok(url) = parsed else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return false;
    };

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if host == "youtu.be" || host == "www.youtu.be" {
        return segments.first().is_some_and(|id| is_video_id(id));
    }
    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return false;
    }

    match segments.as_slice() {
        ["watch"] => url
            .query_pairs()
            .any(|(key, value)| key == "v" && is_video_id(&value)),
        ["embed" | "v" | "shorts" | "live" | "watch", id, ..] => is_video_id(id),
        ["playlist"] => url
            .query_pairs()
            .any(|(key, value)| key == "list" && !value.is_empty()),
        ["user", _, ..] => true,
        _ => false,
    }
}

/// Parses the first JSON document the resolver printed.
pub fn parse_resolver_output(stdout: &str) -> Result<ResolvedAudio, App> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| App::Resolve("Resolver printed nothing".to_string()))?;
    let info: ResolverInfo = serde_json::from_str(line)?;
    let stream_url = info
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| App::Resolve("No playable audio stream found".to_string()))?;
    Ok(ResolvedAudio {
        stream_url,
        title: info.title,
        duration: info.duration.filter(|d| d.is_finite() && *d > 0.0),
    })
}

/// Asks the resolver for a direct audio stream of `url`.
pub async fn resolve(settings: &Settings, url: &str) -> Result<ResolvedAudio, App> {
    info!("Resolving audio stream with {}", settings.resolver);
    let child = Command::new(&settings.resolver)
        .args(["-f", &settings.audio_format])
        .args(["--no-playlist", "--playlist-items", "1", "-j"])
        .arg(url)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = timeout(settings.resolve_timeout(), child)
        .await
        .map_err(|_| {
            App::Resolve(format!(
                "Resolver timed out after {}s",
                settings.resolve_timeout_secs
            ))
        })??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(App::Resolve(format!(
            "Resolver exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    parse_resolver_output(&String::from_utf8_lossy(&output.stdout))
}

pub async fn verify(client: &Client, stream_url: &str) -> Result<bool, App> {
    let response = client
        .get(stream_url)
        .header(USER_AGENT, BROWSER_AGENT)
        .header(ACCEPT, "*/*")
        .header(RANGE, "bytes=0-1024")
        .send()
        .await?;

    let ok = response.status().is_success();
    if !ok {
        warn!("Stream verification returned {}", response.status());
    }
    Ok(ok)
}

pub async fn tool_available(resolver: &str) -> bool {
    Command::new(resolver)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|status| status.success())
}

pub fn user_agent() -> &'static str {
    BROWSER_AGENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_video_links() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "http://m.youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "youtu.be/dQw4w9WgXcQ",
            "www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/playlist?list=PL1234567890",
            "https://www.youtube.com/user/somechannel",
        ] {
            assert!(can_play(url), "{url} should be playable");
        }
    }

    #[test]
    fn rejects_other_links() {
        for url in [
            "",
            "not a url",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQextra",
            "https://www.youtube.com/playlist",
            "https://youtu.be/",
            "ftp://youtu.be/dQw4w9WgXcQ",
            "https://notyoutube.com/watch?v=dQw4w9WgXcQ",
        ] {
            assert!(!can_play(url), "{url} should be rejected");
        }
    }

    #[test]
    fn parses_resolver_json() {
        let stdout = r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","duration":213.0,"url":"https://rr1.example/audio"}"#;
        let resolved = parse_resolver_output(stdout).unwrap();
        assert_eq!(resolved.stream_url, "https://rr1.example/audio");
        assert_eq!(resolved.title.as_deref(), Some("Never Gonna Give You Up"));
        assert_eq!(resolved.duration, Some(213.0));
    }

    #[test]
    fn uses_first_entry_of_multi_line_output() {
        let stdout = "\n{\"url\":\"https://a\",\"title\":\"first\"}\n{\"url\":\"https://b\",\"title\":\"second\"}\n";
        let resolved = parse_resolver_output(stdout).unwrap();
        assert_eq!(resolved.stream_url, "https://a");
        assert_eq!(resolved.duration, None);
    }

    #[test]
    fn missing_stream_url_is_a_resolve_error() {
        assert!(matches!(
            parse_resolver_output(r#"{"title":"no formats"}"#),
            Err(App::Resolve(_))
        ));
        assert!(matches!(parse_resolver_output(""), Err(App::Resolve(_))));
        assert!(matches!(
            parse_resolver_output("ERROR: garbage"),
            Err(App::DataParsing(_))
        ));
    }
}
