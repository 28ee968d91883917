//! PDF report generation
//!
//! Writes a small PDF 1.4 file by hand: A4 pages, the standard Helvetica
//! fonts in WinAnsiEncoding, one text line per `Tj`. Characters that
//! encoding cannot show fail the report rather than being dropped.

use super::{ReportError, ReportResult};
use crate::finding::{Finding, Issue, ScanItems, ScanPayload, ScanResult};
use crate::lifecycle::ScanRecord;
use chrono::{DateTime, Utc};

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Heading,
    Item,
    Body,
    Detail,
}

impl Style {
    /// Font resource name and size
    fn font(&self) -> (&'static str, u32) {
        match self {
            Style::Title => ("F2", 16),
            Style::Heading => ("F2", 12),
            Style::Item => ("F2", 10),
            Style::Body | Style::Detail => ("F1", 10),
        }
    }

    fn leading(&self) -> u32 {
        match self {
            Style::Title => 28,
            Style::Heading => 20,
            Style::Item => 16,
            Style::Body | Style::Detail => 13,
        }
    }

    fn indent(&self) -> u32 {
        match self {
            Style::Detail => 20,
            _ => 0,
        }
    }

    /// Characters per line before wrapping
    fn width(&self) -> usize {
        match self {
            Style::Title => 55,
            Style::Heading => 75,
            Style::Item => 85,
            Style::Body => 90,
            Style::Detail => 86,
        }
    }
}

#[derive(Default)]
struct Document {
    lines: Vec<(Style, Vec<u8>)>,
}

impl Document {
    fn push(&mut self, style: Style, text: &str) -> ReportResult<()> {
        let encoded = encode(text)?;
        for line in wrap(&encoded, style.width()) {
            self.lines.push((style, line));
        }
        Ok(())
    }

    fn field(&mut self, label: &str, value: &str) -> ReportResult<()> {
        let value = if value.trim().is_empty() { "N/A" } else { value };
        self.push(Style::Detail, &format!("{}: {}", label, value))
    }

    fn blank(&mut self) {
        self.lines.push((Style::Body, Vec::new()));
    }

    /// Lay lines out top to bottom, starting a new page when one is full
    fn paginate(&self) -> Vec<Vec<(u32, Style, &[u8])>> {
        let mut pages = Vec::new();
        let mut current = Vec::new();
        let mut y = PAGE_HEIGHT - MARGIN;

        for (style, text) in &self.lines {
            let leading = style.leading();
            if y < MARGIN + leading {
                pages.push(std::mem::take(&mut current));
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= leading;
            current.push((y, *style, text.as_slice()));
        }

        if !current.is_empty() || pages.is_empty() {
            pages.push(current);
        }
        pages
    }

    fn render(&self) -> Vec<u8> {
        let pages = self.paginate();

        // 1 catalog, 2 page tree, 3-4 fonts, then a page + content pair per
        // page, then the info dictionary
        let mut objects: Vec<Vec<u8>> = vec![
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            Vec::new(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_vec(),
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        ];

        let mut kids = Vec::new();
        for page in &pages {
            let page_id = objects.len() + 1;
            let content_id = page_id + 1;
            kids.push(format!("{} 0 R", page_id));

            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    PAGE_WIDTH, PAGE_HEIGHT, content_id
                )
                .into_bytes(),
            );

            let stream = content_stream(page);
            let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            body.extend_from_slice(&stream);
            body.extend_from_slice(b"\nendstream");
            objects.push(body);
        }

        objects[1] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .into_bytes();
        objects.push(b"<< /Title (CyferTrace Security Scan Report) /Producer (ct-core) >>".to_vec());
        let info_id = objects.len();

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                info_id,
                xref_offset
            )
            .as_bytes(),
        );

        out
    }
}

/// Text operators for one page, without a trailing end-of-line
fn content_stream(lines: &[(u32, Style, &[u8])]) -> Vec<u8> {
    let mut stream = b"BT\n".to_vec();
    for (y, style, text) in lines {
        if text.is_empty() {
            continue;
        }
        let (font, size) = style.font();
        stream.extend_from_slice(
            format!(
                "/{} {} Tf\n1 0 0 1 {} {} Tm\n(",
                font,
                size,
                MARGIN + style.indent(),
                y
            )
            .as_bytes(),
        );
        stream.extend_from_slice(&escape(text));
        stream.extend_from_slice(b") Tj\n");
    }
    stream.extend_from_slice(b"ET");
    stream
}

/// WinAnsiEncoding code for a character, if the standard fonts can show it
fn winansi(c: char) -> Option<u8> {
    let code = match c {
        ' '..='~' | '\u{a0}'..='\u{ff}' => return Some(c as u8),
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// Collapse whitespace and encode for the document fonts. Characters
/// outside WinAnsiEncoding fail the report.
fn encode(text: &str) -> ReportResult<Vec<u8>> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .map(|c| {
            winansi(c).ok_or_else(|| {
                ReportError::Render(format!("unsupported character {:?} in {:?}", c, collapsed))
            })
        })
        .collect()
}

/// Escape a string operand; bytes outside ASCII are written as octal
fn escape(text: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(text.len());
    for &b in text {
        match b {
            b'\\' | b'(' | b')' => {
                escaped.push(b'\\');
                escaped.push(b);
            }
            0x20..=0x7e => escaped.push(b),
            _ => escaped.extend_from_slice(format!("\\{:03o}", b).as_bytes()),
        }
    }
    escaped
}

/// Greedy word wrap over encoded text; one byte per glyph
fn wrap(text: &[u8], width: usize) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for word in text.split(|&b| b == b' ').filter(|w| !w.is_empty()) {
        let mut word = word;
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word[..width].to_vec());
            word = &word[width..];
        }

        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(b' ');
        }
        current.extend_from_slice(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render a scan as a PDF document
pub fn generate(record: &ScanRecord, payload: &ScanPayload) -> ReportResult<Vec<u8>> {
    let mut doc = Document::default();

    doc.push(Style::Title, "CyferTrace Security Scan Report")?;
    doc.push(Style::Body, &format!("Scan ID: {}", record.id()))?;
    doc.push(Style::Body, &format!("Target: {}", record.target()))?;
    doc.push(Style::Body, &format!("Scan Type: {}", record.scan_type()))?;
    doc.push(Style::Body, &format!("Status: {}", record.status()))?;
    doc.push(Style::Body, &format!("Created: {}", timestamp(record.created_at())))?;
    let completed = record
        .completed_at()
        .map(timestamp)
        .unwrap_or_else(|| "N/A".to_string());
    doc.push(Style::Body, &format!("Completed: {}", completed))?;

    match payload {
        ScanPayload::Result(result) => write_result(&mut doc, result)?,
        ScanPayload::Error { error } => {
            doc.blank();
            doc.push(Style::Heading, "Scan Failed")?;
            doc.push(Style::Body, &format!("Error: {}", error))?;
        }
    }

    Ok(doc.render())
}

fn write_result(doc: &mut Document, result: &ScanResult) -> ReportResult<()> {
    doc.push(Style::Body, &format!("Scanned Target: {}", result.target))?;
    doc.push(Style::Body, &format!("Scan Timestamp: {}", timestamp(result.timestamp)))?;

    doc.blank();
    doc.push(Style::Heading, "Summary")?;
    let s = &result.summary;
    doc.push(Style::Body, &format!("Total: {}", s.total))?;
    doc.push(Style::Body, &format!("Critical: {}", s.critical))?;
    doc.push(Style::Body, &format!("High: {}", s.high))?;
    doc.push(Style::Body, &format!("Medium: {}", s.medium))?;
    doc.push(Style::Body, &format!("Low: {}", s.low))?;

    doc.blank();
    match &result.items {
        ScanItems::Findings(findings) => {
            doc.push(Style::Heading, &format!("Findings ({})", findings.len()))?;
            if findings.is_empty() {
                doc.push(Style::Body, "No findings reported.")?;
            }
            for (i, finding) in findings.iter().enumerate() {
                write_finding(doc, i + 1, finding)?;
            }
        }
        ScanItems::Issues(issues) => {
            doc.push(Style::Heading, &format!("Issues ({})", issues.len()))?;
            if issues.is_empty() {
                doc.push(Style::Body, "No issues reported.")?;
            }
            for (i, issue) in issues.iter().enumerate() {
                write_issue(doc, i + 1, issue)?;
            }
        }
    }

    Ok(())
}

fn write_finding(doc: &mut Document, n: usize, finding: &Finding) -> ReportResult<()> {
    doc.push(
        Style::Item,
        &format!("{}. [{}] {}", n, finding.severity, finding.name),
    )?;
    doc.field("Location", &finding.location)?;
    doc.field("CWE", &finding.cwe)?;
    doc.field("Risk", &finding.risk)?;
    doc.field("Confidence", &finding.confidence)?;
    doc.field("Description", &finding.description)?;
    doc.field("Remediation", &finding.solution)?;
    doc.blank();
    Ok(())
}

fn write_issue(doc: &mut Document, n: usize, issue: &Issue) -> ReportResult<()> {
    doc.push(
        Style::Item,
        &format!("{}. [{}] {}: {}", n, issue.severity, issue.check_id, issue.check_name),
    )?;
    let lines = issue
        .line_range
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join("-");
    doc.field("File", &issue.file_path)?;
    doc.field("Lines", &lines)?;
    doc.field("Resource", &issue.resource)?;
    doc.field("Guideline", &issue.guideline)?;
    doc.field("Description", &issue.description)?;
    doc.field("Remediation", &issue.remediation)?;
    doc.blank();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[u8], width: usize) -> Vec<String> {
        wrap(text, width)
            .into_iter()
            .map(|l| String::from_utf8(l).unwrap())
            .collect()
    }

    #[test]
    fn test_wrap() {
        assert_eq!(lines(b"", 10), vec![String::new()]);
        assert_eq!(lines(b"one two three", 7), vec!["one two", "three"]);
        assert_eq!(lines(b"abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        for line in wrap("word ".repeat(100).as_bytes(), 30) {
            assert!(line.len() <= 30);
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(br"a(b)c\d"), br"a\(b\)c\\d".to_vec());
        assert_eq!(escape(&[b'x', 0xe9, 0x92]), br"x\351\222".to_vec());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode("line one\n\tline two").unwrap(), b"line one line two".to_vec());
        assert_eq!(encode("caf\u{e9}").unwrap(), vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(encode("isn\u{2019}t").unwrap(), vec![b'i', b's', b'n', 0x92, b't']);
        assert_eq!(encode("a \u{2013} b \u{2022}").unwrap(), vec![b'a', b' ', 0x96, b' ', b'b', b' ', 0x95]);
        assert!(matches!(encode("\u{4f8b}"), Err(ReportError::Render(_))));
        assert!(matches!(encode("\u{1f600}"), Err(ReportError::Render(_))));
    }

    #[test]
    fn test_latin1_and_punctuation_render() {
        let mut doc = Document::default();
        doc.push(Style::Body, "Target: https://caf\u{e9}.example.fr").unwrap();
        doc.field("Description", "Bucket isn\u{2019}t versioned").unwrap();

        let pdf = String::from_utf8(doc.render()).unwrap();
        assert!(pdf.contains(r"(Target: https://caf\351.example.fr) Tj"));
        assert!(pdf.contains(r"(Description: Bucket isn\222t versioned) Tj"));
    }

    #[test]
    fn test_long_document_spans_pages() {
        let mut doc = Document::default();
        for i in 0..200 {
            doc.push(Style::Body, &format!("line {}", i)).unwrap();
        }
        let pages = doc.paginate();
        assert!(pages.len() >= 4);
        for page in &pages {
            assert!(page.iter().all(|(y, _, _)| *y >= MARGIN));
        }

        let pdf = String::from_utf8(doc.render()).unwrap();
        assert!(pdf.contains(&format!("/Count {}", pages.len())));
    }

    #[test]
    fn test_stream_length_is_exact() {
        let mut doc = Document::default();
        doc.push(Style::Title, "hello").unwrap();
        doc.push(Style::Body, "Remediation: caf\u{e9} (see docs)").unwrap();
        let pdf = String::from_utf8(doc.render()).unwrap();

        let after = pdf.split("/Length ").nth(1).unwrap();
        let length: usize = after[..after.find(' ').unwrap()].parse().unwrap();
        let start = pdf.find("stream\n").unwrap() + "stream\n".len();
        let end = pdf.find("\nendstream").unwrap();
        assert_eq!(end - start, length);
        assert!(pdf[start..end].ends_with("ET"));
    }

    #[test]
    fn test_xref_points_at_table() {
        let mut doc = Document::default();
        doc.push(Style::Title, "hello").unwrap();
        let pdf = String::from_utf8(doc.render()).unwrap();

        let tail = pdf.rsplit("startxref\n").next().unwrap();
        let offset: usize = tail.lines().next().unwrap().parse().unwrap();
        assert!(pdf[offset..].starts_with("xref\n"));
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.ends_with("%%EOF\n"));
    }
}
