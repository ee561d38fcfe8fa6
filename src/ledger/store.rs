use crate::error::CrawlError;
use crate::ledger::csv::tokenize;
use log::{info, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

pub const LEDGER_SCHEMA_VERSION: u32 = 2;

pub const LEDGER_HEADER: [&str; 11] = [
    "company",
    "phone",
    "email",
    "industry",
    "head_office",
    "company_size",
    "avg_hires",
    "source_url",
    "detail_table",
    "status",
    "captured_at",
];

pub struct LedgerWriter {
    writer: csv::Writer<Box<dyn Write>>,
    // Existing file did not end with a newline; fixed on first append only.
    needs_newline: bool,
}

impl LedgerWriter {
    /// Opens the ledger for appending and returns the writer together with
    /// the current file contents (for seeding the dedup set).
    ///
    /// A missing file is created with the header. A file whose first
    /// record is not the current header gets that line replaced; data rows
    /// are kept byte for byte. A file that is not valid UTF-8 is seeded
    /// from a lossy decoding and its header is never rewritten.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, String), CrawlError> {
        let path = path.as_ref();
        let header_line = encode_row(&LEDGER_HEADER)?;

        let text = if path.exists() {
            let (text, lossless) = match String::from_utf8(fs::read(path)?) {
                Ok(text) => (text, true),
                Err(e) => {
                    warn!("Ledger {:?} is not valid UTF-8; undecodable bytes are ignored for dedup.", path);
                    (String::from_utf8_lossy(e.as_bytes()).into_owned(), false)
                }
            };
            let records = tokenize(&text);
            match records.first() {
                Some(first) if first.fields == LEDGER_HEADER => text,
                Some(_) if !lossless => {
                    warn!("Ledger {:?} header differs from schema v{}; left as is.", path, LEDGER_SCHEMA_VERSION);
                    text
                }
                Some(first) => {
                    warn!(
                        "Ledger {:?} header differs from schema v{}; rewriting header line.",
                        path, LEDGER_SCHEMA_VERSION
                    );
                    let rewritten = format!("{}{}", header_line, &text[first.end..]);
                    fs::write(path, &rewritten)?;
                    rewritten
                }
                None => {
                    fs::write(path, &header_line)?;
                    header_line.clone()
                }
            }
        } else {
            info!("Creating ledger {:?}", path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &header_line)?;
            header_line.clone()
        };

        let file = OpenOptions::new().append(true).open(path)?;
        let mut ledger = LedgerWriter::from_writer(file);
        ledger.needs_newline = !text.is_empty() && !text.ends_with('\n');
        Ok((ledger, text))
    }

    pub(crate) fn from_writer<W: Write + 'static>(w: W) -> Self {
        let sink: Box<dyn Write> = Box::new(w);
        LedgerWriter {
            writer: row_writer(sink),
            needs_newline: false,
        }
    }

    /// Writes one row and flushes it before returning.
    pub fn append(&mut self, row: &[String]) -> Result<(), CrawlError> {
        if self.needs_newline {
            let placeholder: Box<dyn Write> = Box::new(std::io::sink());
            let csv_writer = std::mem::replace(&mut self.writer, row_writer(placeholder));
            let mut sink = csv_writer.into_inner().map_err(|e| e.into_error())?;
            sink.write_all(b"\n")?;
            self.writer = row_writer(sink);
            self.needs_newline = false;
        }
        self.writer.write_record(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn row_writer<W: Write>(w: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(w)
}

/// One row in ledger encoding, terminator included.
pub fn encode_row<I, T>(row: I) -> Result<String, CrawlError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut w = row_writer(Vec::new());
    w.write_record(row)?;
    let bytes = w
        .into_inner()
        .map_err(|e| CrawlError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
