//! Evolving HTML report accumulator
//!
//! One report per process lifetime. Annotated fragments and advisory blocks
//! are appended in pipeline order; a manual re-analysis replaces the whole
//! report with the freshly formatted transcript and builds up from there.

/// Line break appended after every fragment
const FRAGMENT_BREAK: &str = "<br>";

/// Append-only HTML report. Owners guard it with a lock; appends are
/// serialized by that lock, so fragment order is arrival order.
#[derive(Debug, Default)]
pub struct ReportBuffer {
    html: String,
}

impl ReportBuffer {
    pub fn new() -> Self {
        Self { html: String::new() }
    }

    /// Append one HTML fragment followed by a line break
    pub fn append(&mut self, fragment: &str) {
        self.html.push_str(fragment);
        self.html.push_str(FRAGMENT_BREAK);
    }

    /// Discard the accumulated report and start over from this fragment
    pub fn replace(&mut self, fragment: &str) {
        self.html.clear();
        self.append(fragment);
    }

    /// Current report HTML
    pub fn html(&self) -> &str {
        &self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_adds_line_break() {
        let mut report = ReportBuffer::new();
        report.append("<em>knee</em> pain");
        assert_eq!(report.html(), "<em>knee</em> pain<br>");
    }

    #[test]
    fn test_append_preserves_order() {
        let mut report = ReportBuffer::new();
        report.append("first");
        report.append("second");
        report.append("third");
        assert_eq!(report.html(), "first<br>second<br>third<br>");
    }

    #[test]
    fn test_replace_discards_previous_content() {
        let mut report = ReportBuffer::new();
        report.append("old fragment");
        report.append("another old fragment");

        report.replace("rebuilt");
        assert_eq!(report.html(), "rebuilt<br>");

        // Appends after a replace accumulate normally
        report.append("follow-up");
        assert_eq!(report.html(), "rebuilt<br>follow-up<br>");
    }

    #[test]
    fn test_new_report_is_empty() {
        let report = ReportBuffer::new();
        assert_eq!(report.html(), "");
    }
}
