// ==============================================================================
// output.rs - Window Track Output
// ==============================================================================
// Description: Formats flushed windows as GFF3 feature lines or JSON lines
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// GFF3 line layout (tab-separated):
//   seqid  source  window  start  end  .  .  .  attributes
// Attributes (fixed order, ';'-joined):
//   value=<n>;same=<n>;diff=<n>;ref_<reference>=<n>;same_<id>=<n>;diff_<id>=<n>;total_<id>=<n>;...;undefined=<n>
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::accumulator::SampleTally;

/// GFF3 feature type of every emitted window
pub const FEATURE_TYPE: &str = "window";

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// GFF3 feature lines (track viewers)
    Gff3,
    /// One JSON object per window (scripts, web clients)
    JsonLines,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Gff3 => "gff3",
            OutputFormat::JsonLines => "jsonl",
        }
    }
}

/// Counters of one comparison sample inside a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub sample: String,
    #[serde(flatten)]
    pub tally: SampleTally,
}

/// One aggregate output record, covering one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub contig: String,
    /// 1-based, inclusive
    pub start: u64,
    /// inclusive, clipped to the contig length when known
    pub end: u64,
    /// Sites with a defined reference call
    pub value: u64,
    /// Same calls summed over all comparison samples
    pub same: u64,
    /// Different calls summed over all comparison samples
    pub different: u64,
    pub reference: String,
    pub reference_count: u64,
    pub samples: Vec<SampleWindow>,
    /// Undefined comparison calls across all samples
    pub undefined: u64,
}

/// Destination of flushed windows
pub trait WindowSink {
    fn write_window(&mut self, record: &WindowRecord) -> io::Result<()>;

    /// Flush buffered output; called once after the last window
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WindowSink for Vec<WindowRecord> {
    fn write_window(&mut self, record: &WindowRecord) -> io::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

impl<S: WindowSink + ?Sized> WindowSink for &mut S {
    fn write_window(&mut self, record: &WindowRecord) -> io::Result<()> {
        (**self).write_window(record)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

impl<S: WindowSink + ?Sized> WindowSink for Box<S> {
    fn write_window(&mut self, record: &WindowRecord) -> io::Result<()> {
        (**self).write_window(record)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

/// Build a sink writing `format` into `writer`
pub fn sink_for<W>(format: OutputFormat, writer: W, source: &str) -> io::Result<Box<dyn WindowSink + Send>>
where
    W: Write + Send + 'static,
{
    Ok(match format {
        OutputFormat::Gff3 => Box::new(GffWriter::new(writer, source)?),
        OutputFormat::JsonLines => Box::new(JsonLinesWriter::new(writer)),
    })
}

/// GFF3 writer; the version pragma is written on construction
pub struct GffWriter<W: Write> {
    inner: W,
    source: String,
    line: String,
}

impl<W: Write> GffWriter<W> {
    pub fn new(mut inner: W, source: &str) -> io::Result<Self> {
        writeln!(inner, "##gff-version 3")?;
        Ok(Self {
            inner,
            source: escape_seqid(source).into_owned(),
            line: String::new(),
        })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> WindowSink for GffWriter<W> {
    fn write_window(&mut self, record: &WindowRecord) -> io::Result<()> {
        self.line.clear();
        format_gff_line(&mut self.line, &self.source, record);
        self.inner.write_all(self.line.as_bytes())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Render one window as a GFF3 line (with trailing newline); `source` is pre-escaped
fn format_gff_line(buf: &mut String, source: &str, record: &WindowRecord) {
    // Writing into a String cannot fail
    let _ = write!(
        buf,
        "{}\t{}\t{}\t{}\t{}\t.\t.\t.\t",
        escape_seqid(&record.contig),
        source,
        FEATURE_TYPE,
        record.start,
        record.end
    );

    let _ = write!(
        buf,
        "value={};same={};diff={};ref_{}={}",
        record.value,
        record.same,
        record.different,
        escape_attribute(&record.reference),
        record.reference_count
    );
    for sample in &record.samples {
        let id = escape_attribute(&sample.sample);
        let _ = write!(
            buf,
            ";same_{id}={};diff_{id}={};total_{id}={}",
            sample.tally.same, sample.tally.different, sample.tally.total
        );
    }
    let _ = writeln!(buf, ";undefined={}", record.undefined);
}

/// JSON-lines writer
pub struct JsonLinesWriter<W: Write> {
    inner: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> WindowSink for JsonLinesWriter<W> {
    fn write_window(&mut self, record: &WindowRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.inner, record)?;
        self.inner.write_all(b"\n")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Percent-encode characters reserved in GFF3 column 9
fn escape_attribute(s: &str) -> Cow<'_, str> {
    escape_with(s, |c| matches!(c, ';' | '=' | '&' | ',' | '%') || c.is_control())
}

/// Percent-encode characters outside the GFF3 seqid alphabet
fn escape_seqid(s: &str) -> Cow<'_, str> {
    escape_with(s, |c| {
        !(c.is_ascii_alphanumeric() || ".:^*$@!+_?-|".contains(c))
    })
}

fn escape_with(s: &str, reserved: impl Fn(char) -> bool) -> Cow<'_, str> {
    if !s.chars().any(&reserved) {
        return Cow::Borrowed(s);
    }

    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if reserved(c) {
            let mut bytes = [0u8; 4];
            for b in c.encode_utf8(&mut bytes).bytes() {
                let _ = write!(escaped, "%{:02X}", b);
            }
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}
