//! Output formatting for the banner, the periodic status line and the final report
//!
//! All output flows through [`OutputWriter`], which handles text vs JSON.

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use echidna_core::{RunPhase, StatusSnapshot};
use echidna_plugin_scanner::ScanResult;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes CLI output in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Whether progress output (banner, status lines) should be shown.
    pub fn is_text(&self) -> bool {
        self.format == OutputFormat::Text
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        match self.format {
            OutputFormat::Text => {
                payload.render_text(&mut handle)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut handle, payload)?;
                writeln!(handle)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

// ---- banner ----

/// Startup banner.
#[derive(Debug, Serialize)]
pub struct Banner {
    pub run_id: String,
    pub modules: Vec<String>,
    pub max_in_flight: usize,
    pub pages: u32,
    pub results: u64,
    pub work_dir: String,
}

impl Render for Banner {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "Echidna plugin registry scanner".bold())?;
        writeln!(w, "  Run:      {}", self.run_id)?;
        writeln!(w, "  Modules:  {}", self.modules.join(", ").cyan())?;
        writeln!(w, "  Workers:  {}", self.max_in_flight)?;
        writeln!(
            w,
            "  Registry: {} pages, {} plugins",
            self.pages,
            self.results.to_string().bold()
        )?;
        writeln!(w, "  Work dir: {}", self.work_dir)?;
        Ok(())
    }
}

// ---- status line ----

/// One periodic progress line.
#[derive(Debug, Serialize)]
pub struct StatusLine {
    #[serde(flatten)]
    pub status: StatusSnapshot,
    pub elapsed_secs: u64,
    pub per_second: f64,
}

impl StatusLine {
    pub fn new(status: StatusSnapshot, elapsed: Duration) -> Self {
        let per_second = status.throughput(elapsed);
        Self {
            status,
            elapsed_secs: elapsed.as_secs(),
            per_second,
        }
    }
}

impl Render for StatusLine {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let s = &self.status;
        write!(
            w,
            "[{}s] remaining: {} | scanned: {} | vulns: {} | skipped: {} | pages: {}/{} | {:.1}/s",
            self.elapsed_secs,
            s.remaining,
            s.scanned.to_string().green(),
            s.vulns_found.to_string().red().bold(),
            s.skipped.to_string().yellow(),
            s.page,
            s.pages,
            self.per_second,
        )?;
        if let Some(latest) = &s.latest_finding {
            write!(w, " | latest: {}", truncate(latest, 80).red())?;
        }
        writeln!(w)
    }
}

// ---- final report ----

/// Flagged plugin entry in the final report.
#[derive(Debug, Serialize)]
pub struct FlaggedPlugin {
    pub plugin: String,
    pub modules: Vec<String>,
    pub matches: usize,
}

impl From<&ScanResult> for FlaggedPlugin {
    fn from(result: &ScanResult) -> Self {
        Self {
            plugin: result.plugin.clone(),
            modules: result.modules.keys().cloned().collect(),
            matches: result.match_count(),
        }
    }
}

/// Final run report.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub phase: RunPhase,
    #[serde(flatten)]
    pub status: StatusSnapshot,
    pub elapsed_ms: u64,
    pub per_second: f64,
    pub errors_logged: u64,
    pub drained: bool,
    pub flagged: Vec<FlaggedPlugin>,
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let headline = match self.phase {
            RunPhase::Done => "Scan complete".green().bold(),
            RunPhase::Cancelled => "Scan interrupted".yellow().bold(),
            other => other.to_string().normal(),
        };
        writeln!(w, "{headline} ({:.1}s)", self.elapsed_ms as f64 / 1000.0)?;
        writeln!(
            w,
            "  scanned: {} | skipped: {} | vulns: {} | failed pages: {} | {:.1}/s",
            self.status.scanned,
            self.status.skipped,
            self.status.vulns_found.to_string().red().bold(),
            self.status.pages_failed,
            self.per_second,
        )?;
        if self.errors_logged > 0 {
            writeln!(w, "  {} item errors written to the error log", self.errors_logged)?;
        }
        if !self.drained {
            writeln!(
                w,
                "  {}",
                "some tasks were still running when current/ was removed".yellow()
            )?;
        }
        for flagged in &self.flagged {
            writeln!(
                w,
                "  {} {} ({} matches)",
                flagged.plugin.red(),
                flagged.modules.join(","),
                flagged.matches
            )?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(payload: &dyn Render) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        payload.render_text(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_status_line_fields() {
        let line = StatusLine::new(
            StatusSnapshot {
                page: 3,
                pages: 140,
                remaining: 812,
                scanned: 90,
                skipped: 10,
                vulns_found: 4,
                latest_finding: Some("Foo: XSS: foo/a.php: echo $_GET['x'];".to_owned()),
                ..Default::default()
            },
            Duration::from_secs(20),
        );
        let text = render(&line);
        assert!(text.starts_with("[20s] remaining: 812 | scanned: 90 | vulns: 4 | skipped: 10"));
        assert!(text.contains("pages: 3/140"));
        assert!(text.contains("5.0/s"));
        assert!(text.contains("latest: Foo: XSS"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_status_line_json_is_flat() {
        let line = StatusLine::new(
            StatusSnapshot {
                scanned: 2,
                ..Default::default()
            },
            Duration::from_secs(1),
        );
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["scanned"], 2);
        assert_eq!(json["elapsed_secs"], 1);
    }

    #[test]
    fn test_banner_lists_modules() {
        let banner = Banner {
            run_id: "r".to_owned(),
            modules: vec!["XSS".to_owned(), "LFI".to_owned()],
            max_in_flight: 70,
            pages: 140,
            results: 55_000,
            work_dir: ".".to_owned(),
        };
        let text = render(&banner);
        assert!(text.contains("XSS, LFI"));
        assert!(text.contains("Workers:  70"));
        assert!(text.contains("140 pages, 55000 plugins"));
    }

    #[test]
    fn test_report_interrupted_headline() {
        let report = RunReport {
            run_id: "r".to_owned(),
            phase: RunPhase::Cancelled,
            status: StatusSnapshot::default(),
            elapsed_ms: 1500,
            per_second: 0.0,
            errors_logged: 3,
            drained: false,
            flagged: vec![FlaggedPlugin {
                plugin: "Leaky".to_owned(),
                modules: vec!["SQLI".to_owned()],
                matches: 2,
            }],
        };
        let text = render(&report);
        assert!(text.starts_with("Scan interrupted (1.5s)"));
        assert!(text.contains("3 item errors"));
        assert!(text.contains("still running"));
        assert!(text.contains("Leaky SQLI (2 matches)"));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
