// Result renderers (HTML, CSV, JSON) and the sinks they are written to.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use jukebox_core::game::Review;
use jukebox_core::report::{GameResults, ReportError, ResultReporter};
use minijinja::{context, Environment};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::config::{ResultsConfig, ResultsFormat, ResultsSink};

const FILE_PREFIX: &str = "jukebox_jury_results_";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const HTML_TEMPLATE_NAME: &str = "results.html";
const HTML_TEMPLATE: &str = include_str!("../templates/results.html");

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render(results: &GameResults, format: ResultsFormat) -> Result<String, ReportError> {
    match format {
        ResultsFormat::Html => render_html(results),
        ResultsFormat::Csv => render_csv(results),
        ResultsFormat::Json => {
            serde_json::to_string_pretty(results).map_err(|e| ReportError::Render(e.to_string()))
        }
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.2}"))
}

fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Per-panelist view handed to the HTML template.
#[derive(Serialize)]
struct HtmlPanelist<'a> {
    name: &'a str,
    description: &'a str,
    /// Only set for web links; anything else is shown as plain text.
    link: Option<&'a str>,
    average: String,
    reviews: &'a [Review],
}

fn web_link(url: &str) -> Option<&str> {
    Url::parse(url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|_| url)
}

fn render_html(results: &GameResults) -> Result<String, ReportError> {
    let render_err = |e: minijinja::Error| ReportError::Render(e.to_string());

    // The `.html` name turns on HTML auto-escaping.
    let mut env = Environment::new();
    env.add_template(HTML_TEMPLATE_NAME, HTML_TEMPLATE)
        .map_err(render_err)?;

    let panelists: Vec<HtmlPanelist<'_>> = results
        .panelists
        .iter()
        .map(|p| HtmlPanelist {
            name: &p.name,
            description: &p.description,
            link: web_link(&p.url),
            average: format_score(p.average_score),
            reviews: &p.reviews,
        })
        .collect();

    env.get_template(HTML_TEMPLATE_NAME)
        .and_then(|template| {
            template.render(context! {
                started => results.started_at.format(TIMESTAMP_FORMAT).to_string(),
                lasted => format_duration(results.duration_secs),
                winner => &results.winner,
                panelists => panelists,
                generated => results.finished_at.format(TIMESTAMP_FORMAT).to_string(),
            })
        })
        .map_err(render_err)
}

/// One row per review, with the song's average repeated on every row.
fn render_csv(results: &GameResults) -> Result<String, ReportError> {
    let render_err = |e: csv::Error| ReportError::Render(e.to_string());
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "panelist",
            "description",
            "url",
            "average_score",
            "reviewer",
            "comment",
            "rating",
        ])
        .map_err(render_err)?;

    for panelist in &results.panelists {
        let average = format_score(panelist.average_score);
        for review in &panelist.reviews {
            writer
                .write_record([
                    panelist.name.as_str(),
                    panelist.description.as_str(),
                    panelist.url.as_str(),
                    average.as_str(),
                    review.from.as_str(),
                    review.comment.as_str(),
                    review.rating.to_string().as_str(),
                ])
                .map_err(render_err)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Render(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Render(e.to_string()))
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Writes one new file per game into a directory that is served at
/// `public_url`.
pub struct DirectoryReporter {
    directory: PathBuf,
    public_url: String,
    format: ResultsFormat,
}

impl DirectoryReporter {
    pub fn new(directory: PathBuf, public_url: impl Into<String>, format: ResultsFormat) -> Self {
        DirectoryReporter {
            directory,
            public_url: public_url.into(),
            format,
        }
    }

    pub fn file_name(&self, results: &GameResults) -> String {
        format!(
            "{FILE_PREFIX}{}.{}",
            results.finished_at.format(TIMESTAMP_FORMAT),
            self.format.extension()
        )
    }
}

impl ResultReporter for DirectoryReporter {
    fn publish(&mut self, results: &GameResults) -> Result<Option<String>, ReportError> {
        let rendered = render(results, self.format)?;

        let file_name = self.file_name(results);
        let path = self.directory.join(&file_name);
        let write_err = |source: io::Error| ReportError::Write {
            path: path.display().to_string(),
            source,
        };

        // Plain blocking I/O on the app task. One small file per game.
        // Never overwrite an earlier game's results.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_err)?;
        file.write_all(rendered.as_bytes()).map_err(write_err)?;

        info!("Results written to {}", path.display());
        Ok(Some(format!(
            "{}/{}",
            self.public_url.trim_end_matches('/'),
            file_name
        )))
    }
}

/// Writes the rendered report to a stream, stdout in production.
pub struct StreamReporter<W> {
    writer: W,
    format: ResultsFormat,
}

impl<W: Write> StreamReporter<W> {
    pub fn new(writer: W, format: ResultsFormat) -> Self {
        StreamReporter { writer, format }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl StreamReporter<io::Stdout> {
    pub fn stdout(format: ResultsFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write> ResultReporter for StreamReporter<W> {
    fn publish(&mut self, results: &GameResults) -> Result<Option<String>, ReportError> {
        let rendered = render(results, self.format)?;
        let write_err = |source: io::Error| ReportError::Write {
            path: "<stream>".to_string(),
            source,
        };
        self.writer
            .write_all(rendered.as_bytes())
            .map_err(write_err)?;
        self.writer.flush().map_err(write_err)?;
        Ok(None)
    }
}

/// Build the reporter the results section asks for.
pub fn from_config(config: &ResultsConfig) -> Box<dyn ResultReporter + Send> {
    match config.sink {
        ResultsSink::Directory => Box::new(DirectoryReporter::new(
            config.resolved_directory(),
            config.public_url.clone(),
            config.format,
        )),
        ResultsSink::Stdout => Box::new(StreamReporter::stdout(config.format)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use jukebox_core::report::PanelistResult;
    use std::fs;

    fn sample_results() -> GameResults {
        let started_at = Local.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let finished_at = Local.with_ymd_and_hms(2024, 5, 1, 20, 34, 12).unwrap();
        GameResults {
            started_at,
            finished_at,
            duration_secs: 34 * 60 + 12,
            panelists: vec![
                PanelistResult {
                    name: "Satan".into(),
                    description: "My favourite song".into(),
                    url: "https://example.com/satan_you_rock".into(),
                    average_score: Some(10.0),
                    reviews: vec![Review {
                        from: "Jesus".into(),
                        comment: "Great song1".into(),
                        rating: 10,
                    }],
                },
                PanelistResult {
                    name: "Jesus".into(),
                    description: "Hallelujah <3 & \"amen\"".into(),
                    url: "https://example.com/hesus".into(),
                    average_score: Some(1.0),
                    reviews: vec![Review {
                        from: "Satan".into(),
                        comment: "Terrible, song1".into(),
                        rating: 1,
                    }],
                },
            ],
            winner: Some("Satan".into()),
        }
    }

    #[test]
    fn html_lists_panelists_and_escapes_text() {
        let html = render(&sample_results(), ResultsFormat::Html).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h2>Satan: <a href=\"https:"));
        assert!(html.contains("satan_you_rock\">My favourite song</a></h2>"));
        assert!(html.contains("Hallelujah &lt;3 &amp; &quot;amen&quot;"));
        assert!(html.contains("<td>Jesus</td><td>Great song1</td><td>10</td>"));
        assert!(html.contains("Average score: 10.00"));
        assert!(html.contains("lasted 0h 34m 12s"));
        assert!(html.contains("Winner: <strong>Satan</strong>"));
    }

    #[test]
    fn html_never_links_non_web_urls() {
        let mut results = sample_results();
        results.panelists[0].description = "click me".into();
        results.panelists[0].url = "javascript:alert(document.cookie)".into();
        results.panelists[1].name = "<script>alert(1)</script>".into();

        let html = render(&results, ResultsFormat::Html).unwrap();
        assert!(!html.contains("href=\"javascript:"));
        assert!(!html.contains("javascript:alert"));
        assert!(html.contains("<h2>Satan: click me</h2>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn csv_has_one_row_per_review() {
        let csv = render(&sample_results(), ResultsFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "panelist,description,url,average_score,reviewer,comment,rating"
        );
        assert_eq!(
            lines[1],
            "Satan,My favourite song,https://example.com/satan_you_rock,10.00,Jesus,Great song1,10"
        );
        // Commas in comments get quoted.
        assert!(lines[2].contains("\"Terrible, song1\""));
    }

    #[test]
    fn json_round_trips_through_serde_value() {
        let json = render(&sample_results(), ResultsFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["winner"], "Satan");
        assert_eq!(value["duration_secs"], 34 * 60 + 12);
        assert_eq!(value["panelists"][1]["reviews"][0]["rating"], 1);
    }

    #[test]
    fn directory_reporter_writes_new_file_and_returns_public_url() {
        let dir = std::env::temp_dir().join("jukebox_report_directory");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut reporter =
            DirectoryReporter::new(dir.clone(), "https://example.com/jury/", ResultsFormat::Html);
        let results = sample_results();

        let location = reporter.publish(&results).unwrap();
        assert_eq!(
            location.as_deref(),
            Some("https://example.com/jury/jukebox_jury_results_2024-05-01T20:34:12.html")
        );
        let written =
            fs::read_to_string(dir.join("jukebox_jury_results_2024-05-01T20:34:12.html")).unwrap();
        assert!(written.contains("Jukebox jury results"));

        // Same finish time again: the earlier file is left alone.
        match reporter.publish(&results) {
            Err(ReportError::Write { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists)
            }
            other => panic!("expected Write error, got {other:?}"),
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn directory_reporter_missing_directory_is_write_error() {
        let dir = std::env::temp_dir().join("jukebox_report_missing/nested");
        let _ = fs::remove_dir_all(std::env::temp_dir().join("jukebox_report_missing"));

        let mut reporter = DirectoryReporter::new(dir, "https://example.com", ResultsFormat::Csv);
        assert!(matches!(
            reporter.publish(&sample_results()),
            Err(ReportError::Write { .. })
        ));
    }

    #[test]
    fn stream_reporter_has_no_location() {
        let mut reporter = StreamReporter::new(Vec::new(), ResultsFormat::Json);
        assert!(reporter.publish(&sample_results()).unwrap().is_none());
        let written = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(written.contains("\"winner\": \"Satan\""));
    }
}
