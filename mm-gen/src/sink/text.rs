use std::borrow::Cow;
use std::io::{
    BufWriter,
    Write,
};

use mm_core::MeshResult;

use super::Sink;
use crate::catalog::{
    BucketMode,
    MetricSpec,
};
use crate::expand::Labels;
use crate::simulate::Observation;

/// Renders each series as one exposition line, `name {k="v",...} value`.
///
/// No `# HELP`/`# TYPE` metadata and no family grouping: every series is an independent line.
/// Output is buffered and flushed by [`Sink::finish`].
pub struct TextSink<W: Write> {
    /// Buffered destination.
    out: BufWriter<W>,
}

impl<W: Write> TextSink<W> {
    /// Buffer output to `out`.
    pub fn new(out: W) -> Self {
        Self { out: BufWriter::new(out) }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> MeshResult<W> {
        self.out.into_inner().map_err(|e| e.into_error().into())
    }
}

/// Escape `\`, `"` and newlines in a label value.
fn escape(value: &str) -> Cow<'_, str> {
    if value.contains(&['\\', '"', '\n'][..]) {
        Cow::Owned(value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n"))
    } else {
        Cow::Borrowed(value)
    }
}

impl<W: Write> Sink for TextSink<W> {
    fn bucket_mode(&self) -> BucketMode {
        BucketMode::Expanded
    }

    fn emit(&mut self, metric: &MetricSpec, labels: &Labels, observation: Observation) -> MeshResult<usize> {
        write!(self.out, "{} {{", metric.series_name)?;
        for (i, (key, value)) in labels.iter().enumerate() {
            if i > 0 {
                self.out.write_all(b",")?;
            }
            write!(self.out, "{key}=\"{}\"", escape(value))?;
        }
        self.out.write_all(b"} ")?;
        match observation {
            Observation::Count(n) => writeln!(self.out, "{n}")?,
            // exposition values are integers
            Observation::Gauge(v) | Observation::Sample(v) => writeln!(self.out, "{}", v.floor())?,
        }
        Ok(1)
    }

    fn finish(&mut self) -> MeshResult<()> {
        self.out.flush()?;
        Ok(())
    }
}
