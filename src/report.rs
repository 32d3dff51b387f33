//! Per-job diagnostic output
//!
//! The reporter turns job results into text lines according to the
//! selected result mode. Request echoing and status lines are independent
//! toggles layered on top of the mode.

use crate::config::PrintResults;
use crate::migrate::JobResult;
use std::io::{self, Write};

/// Writes job diagnostics to a sink
pub struct Reporter<W: Write> {
    out: W,
    mode: PrintResults,
    print_status: bool,
    print_request: bool,
}

impl<W: Write> Reporter<W> {
    /// Create a reporter writing to `out`
    pub fn new(out: W, mode: PrintResults, print_status: bool, print_request: bool) -> Self {
        Self {
            out,
            mode,
            print_status,
            print_request,
        }
    }

    /// Whether any output can be produced at all
    pub fn is_silent(&self) -> bool {
        self.mode == PrintResults::Silent && !self.print_status && !self.print_request
    }

    /// Format the lines for one job result
    pub fn lines(&self, result: &JobResult) -> Vec<String> {
        let mut lines = Vec::new();

        if self.print_request {
            if let Some(body) = &result.request_body {
                lines.push(body.clone());
            }
        }

        match self.mode {
            PrintResults::Silent => {}
            PrintResults::All => {
                lines.extend(result.responses.iter().map(ToString::to_string));
            }
            PrintResults::Error => {
                lines.extend(
                    result
                        .responses
                        .iter()
                        .filter(|r| r.is_error())
                        .map(ToString::to_string),
                );
            }
            PrintResults::ErrorAndDoc => {
                // Responses line up with the submitted documents, not the job's keys
                for (i, response) in result.responses.iter().enumerate() {
                    if !response.is_error() {
                        continue;
                    }
                    lines.push(response.to_string());
                    match result.documents.get(i) {
                        Some(doc) => lines.push(format!("key={} doc={}", doc.key, doc.body)),
                        None => lines.push("doc=<unavailable>".to_string()),
                    }
                }
            }
            PrintResults::Raw => {
                if let Some(raw) = &result.raw_body {
                    lines.push(raw.clone());
                }
            }
        }

        if self.print_status {
            lines.push(status_line(result));
        }

        lines
    }

    /// Write the lines for one job result
    pub fn report(&mut self, result: &JobResult) -> io::Result<()> {
        if self.is_silent() {
            return Ok(());
        }

        for line in self.lines(result) {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }

    /// Consume the reporter, returning the sink
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn status_line(result: &JobResult) -> String {
    let ms = result.elapsed.as_millis();

    match &result.save_error {
        Some(e) => format!(
            "job {} (worker {}): {}/{} docs, save failed: {} in {}ms",
            result.job_id, result.worker_id, result.submitted, result.key_count, e, ms
        ),
        None => format!(
            "job {} (worker {}): {}/{} docs submitted, {} saved, {} rejected, {} skipped in {}ms",
            result.job_id,
            result.worker_id,
            result.submitted,
            result.key_count,
            result.saved_count(),
            result.rejected_count(),
            result.fetch_failures.len(),
            ms
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, SaveError};
    use crate::migrate::{DocResponse, Document};

    fn sample() -> JobResult {
        let mut result = JobResult::empty(4, 2, 3);
        result.submitted = 2;
        result.documents = vec![
            Document {
                key: "a".into(),
                body: r#"{"_id":"a"}"#.into(),
            },
            Document {
                key: "c".into(),
                body: r#"{"_id":"c"}"#.into(),
            },
        ];
        result.fetch_failures = vec![FetchError::ReservedKey {
            key: "_b".into(),
        }];
        result.request_body = Some(r#"{"docs":[{"_id":"a"},{"_id":"c"}]}"#.into());
        result.responses = vec![
            DocResponse {
                ok: true,
                id: "a".into(),
                rev: "1-a".into(),
                ..Default::default()
            },
            DocResponse {
                id: "c".into(),
                error: "conflict".into(),
                reason: "Document update conflict.".into(),
                ..Default::default()
            },
        ];
        result.raw_body = Some("[raw]".into());
        result
    }

    fn reporter(mode: PrintResults) -> Reporter<Vec<u8>> {
        Reporter::new(Vec::new(), mode, false, false)
    }

    #[test]
    fn test_silent() {
        let mut r = reporter(PrintResults::Silent);
        assert!(r.is_silent());
        r.report(&sample()).unwrap();
        assert!(r.into_inner().is_empty());
    }

    #[test]
    fn test_all_and_error() {
        let lines = reporter(PrintResults::All).lines(&sample());
        assert_eq!(lines, vec![
            "ok id=a rev=1-a".to_string(),
            "error id=c error=conflict reason=Document update conflict.".to_string(),
        ]);

        let lines = reporter(PrintResults::Error).lines(&sample());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("error id=c"));
    }

    #[test]
    fn test_error_and_doc_pairs_with_origin_key() {
        let lines = reporter(PrintResults::ErrorAndDoc).lines(&sample());
        assert_eq!(lines.len(), 2);
        // The skipped "_b" key does not shift the pairing
        assert_eq!(lines[1], r#"key=c doc={"_id":"c"}"#);
    }

    #[test]
    fn test_error_and_doc_without_document() {
        let mut result = sample();
        result.documents.truncate(1);
        let lines = reporter(PrintResults::ErrorAndDoc).lines(&result);
        assert_eq!(lines[1], "doc=<unavailable>");
    }

    #[test]
    fn test_raw() {
        let lines = reporter(PrintResults::Raw).lines(&sample());
        assert_eq!(lines, vec!["[raw]".to_string()]);
    }

    #[test]
    fn test_status_and_request_are_independent() {
        let mut r = Reporter::new(Vec::new(), PrintResults::Silent, true, true);
        assert!(!r.is_silent());
        r.report(&sample()).unwrap();

        let out = String::from_utf8(r.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"docs":[{"_id":"a"},{"_id":"c"}]}"#);
        assert!(lines[1].starts_with("job 4 (worker 2): 2/3 docs submitted, 1 saved, 1 rejected, 1 skipped"));
    }

    #[test]
    fn test_status_for_failed_job() {
        let mut result = JobResult::empty(1, 0, 5);
        result.save_error = Some(SaveError::Transport("connection refused".into()));
        let lines = Reporter::new(Vec::new(), PrintResults::All, true, false).lines(&result);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("save failed: Transport error: connection refused"));
    }
}
