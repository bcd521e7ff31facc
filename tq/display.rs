use crate::scores::{Player, SortBy};
use serde::Deserialize;

const BAR_WIDTH: usize = 30;
/// Smallest visible fill so a near-zero bar still shows.
const MIN_FILL_PERCENT: f64 = 0.5;

/// Mirror of the daemon's status snapshot.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub url: Option<String>,
    pub loaded: bool,
    pub is_playing: bool,
    pub volume: f64,
    pub duration: f64,
    pub played: f64,
    pub current_time: f64,
    pub seeking: bool,
    pub error: Option<String>,
    pub title: Option<String>,
    pub show_title: bool,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "0:00".to_string();
    }
    let total = seconds.max(0.0) as u64;
    let (hh, mm, ss) = (total / 3600, (total / 60) % 60, total % 60);
    if hh > 0 {
        format!("{hh}:{mm:02}:{ss:02}")
    } else {
        format!("{mm}:{ss:02}")
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn bar(fraction: f64) -> String {
    let percent = if fraction.is_finite() {
        (fraction * 100.0).clamp(MIN_FILL_PERCENT, 100.0)
    } else {
        MIN_FILL_PERCENT
    };
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).ceil() as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

pub fn render_status(report: &StatusReport) -> String {
    let mut lines = Vec::new();
    match &report.url {
        None => lines.push("No audio loaded.".to_string()),
        Some(_) if !report.loaded && report.error.is_none() => {
            lines.push("Loading...".to_string());
        }
        Some(_) if !report.loaded => {}
        Some(_) => {
            let mode = if report.seeking {
                "Seeking"
            } else if report.is_playing {
                "Playing"
            } else {
                "Paused"
            };
            lines.push(mode.to_string());
            lines.push(format!(
                "{} {} {}",
                format_time(report.current_time),
                bar(report.played),
                format_time(report.duration)
            ));
            lines.push(format!(
                "vol {} {:.0}%",
                bar(report.volume),
                report.volume * 100.0
            ));
            match (&report.title, report.show_title) {
                (Some(title), true) => lines.push(format!("Title: {title}")),
                _ => lines.push("Title: (hidden)".to_string()),
            }
        }
    }
    if let Some(error) = &report.error {
        lines.push(error.clone());
    }
    lines.join("\n")
}

pub fn render_scores(view: &[&Player], sort_by: SortBy) -> String {
    if view.is_empty() {
        return "No players added yet.".to_string();
    }
    let count = view.len();
    let noun = if count == 1 { "player" } else { "players" };
    let name_width = view
        .iter()
        .map(|player| player.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut lines = vec![format!("Sort by: {sort_by}    {count} {noun}")];
    for (row, player) in view.iter().enumerate() {
        lines.push(format!(
            "{:>3}. {:>4}  {:<name_width$}  ({})",
            row + 1,
            player.score,
            player.name,
            player.id
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> StatusReport {
        StatusReport {
            url: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            loaded: true,
            is_playing: true,
            volume: 0.5,
            duration: 213.0,
            played: 0.5,
            current_time: 106.5,
            seeking: false,
            error: None,
            title: None,
            show_title: false,
        }
    }

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.9), "0:09");
        assert_eq!(format_time(213.0), "3:33");
        assert_eq!(format_time(3_723.0), "1:02:03");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(-5.0), "0:00");
    }

    #[test]
    fn bars_keep_a_minimum_fill() {
        assert_eq!(bar(0.0), format!("[#{}]", "-".repeat(29)));
        assert_eq!(bar(1.0), format!("[{}]", "#".repeat(30)));
        assert_eq!(bar(0.5), format!("[{}{}]", "#".repeat(15), "-".repeat(15)));
    }

    #[test]
    fn status_hides_title_until_revealed() {
        let mut status = report();
        let text = render_status(&status);
        assert!(text.contains("Playing"));
        assert!(text.contains("1:46"));
        assert!(text.contains("3:33"));
        assert!(text.contains("Title: (hidden)"));

        status.show_title = true;
        status.title = Some("Never Gonna Give You Up".to_string());
        assert!(render_status(&status).contains("Title: Never Gonna Give You Up"));
    }

    #[test]
    fn failed_load_shows_only_the_message() {
        let mut status = report();
        status.loaded = false;
        status.is_playing = false;
        status.error = Some("Invalid YouTube URL".to_string());
        assert_eq!(render_status(&status), "Invalid YouTube URL");
    }

    #[test]
    fn scores_table_counts_players() {
        assert_eq!(render_scores(&[], SortBy::Name), "No players added yet.");
        let ada = Player {
            id: "1".to_string(),
            name: "Ada".to_string(),
            score: 3,
        };
        let text = render_scores(&[&ada], SortBy::Score);
        assert!(text.starts_with("Sort by: score    1 player\n"));
        assert!(text.contains("Ada"));
    }
}
