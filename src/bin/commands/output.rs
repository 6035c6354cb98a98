use anyhow::{anyhow, Result};
use asnmap::lens::lookup::{format_records, ResultBatch, CSV_HEADER};
use asnmap::lens::utils::OutputFormat;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Writes rendered batches to stdout or a file
pub struct OutputWriter {
    writer: Box<dyn Write>,
    format: OutputFormat,
    include_ipv6: bool,
    lines: usize,
}

impl OutputWriter {
    pub fn new(path: Option<&str>, format: OutputFormat, include_ipv6: bool) -> Result<Self> {
        let writer: Box<dyn Write> = match path {
            Some(p) => {
                let file =
                    File::create(p).map_err(|e| anyhow!("Unable to create output file {}: {}", p, e))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(BufWriter::new(std::io::stdout())),
        };

        let mut output = Self {
            writer,
            format,
            include_ipv6,
            lines: 0,
        };
        if format == OutputFormat::Csv {
            writeln!(output.writer, "{}", CSV_HEADER)?;
        }
        Ok(output)
    }

    pub fn write_batch(&mut self, batch: &ResultBatch) -> Result<()> {
        for line in format_records(&batch.records, self.format, self.include_ipv6)? {
            writeln!(self.writer, "{}", line)?;
            self.lines += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Lines written so far, not counting the CSV header
    pub fn lines(&self) -> usize {
        self.lines
    }
}

/// Whether an error came from writing into a closed pipe
pub fn is_broken_pipe(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::BrokenPipe)
    })
}
