//! Text I/O helpers shared by the table readers and writers.
//!
//! Paths ending in `.gz` are transparently (de)compressed.

use crate::error::Result;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Whether a path names a gzip-compressed file.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a text file for buffered reading, decompressing `.gz` input.
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Buffered text output, optionally gzip-compressed.
///
/// Call [`TextWriter::finish`] when done: it flushes the buffer and, for
/// gzip output, writes the trailer and reports any error doing so.
pub enum TextWriter {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl TextWriter {
    /// Flush everything to disk, completing the gzip stream if any.
    pub fn finish(self) -> Result<()> {
        match self {
            TextWriter::Plain(mut w) => w.flush()?,
            TextWriter::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?;
            }
        }
        Ok(())
    }
}

impl Write for TextWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            TextWriter::Plain(w) => w.write(buf),
            TextWriter::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            TextWriter::Plain(w) => w.flush(),
            TextWriter::Gzip(w) => w.flush(),
        }
    }
}

/// Create a buffered writer, creating parent directories and compressing
/// when the path ends in `.gz`.
pub fn create_text<P: AsRef<Path>>(path: P) -> Result<TextWriter> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    if is_gzipped(path) {
        Ok(TextWriter::Gzip(BufWriter::new(GzEncoder::new(
            file,
            Compression::default(),
        ))))
    } else {
        Ok(TextWriter::Plain(BufWriter::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_gz_detection() {
        assert!(is_gzipped("table.tsv.gz"));
        assert!(is_gzipped("TABLE.TSV.GZ"));
        assert!(!is_gzipped("table.tsv"));
        assert!(!is_gzipped("gz"));
    }

    #[test]
    fn test_gzip_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.tsv.gz");
        {
            let mut w = create_text(&path).unwrap();
            writeln!(w, "feature\tS1").unwrap();
            writeln!(w, "A\t1.5").unwrap();
            w.finish().unwrap();
        }

        let mut text = String::new();
        open_text(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "feature\tS1\nA\t1.5\n");
    }

    #[test]
    fn test_finish_completes_gzip_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.tsv.gz");
        let mut w = create_text(&path).unwrap();
        for i in 0..20_000 {
            writeln!(w, "F{}\t{}", i, i as f64 * 0.5).unwrap();
        }
        w.finish().unwrap();

        // A strict single-member decoder fails on a missing trailer
        let bytes = fs::read(&path).unwrap();
        let mut text = String::new();
        flate2::read::GzDecoder::new(&bytes[..])
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text.lines().count(), 20_000);
        assert_eq!(text.lines().last(), Some("F19999\t9999.5"));
    }

    #[test]
    fn test_finish_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let mut w = create_text(&path).unwrap();
        write!(w, "a\tb").unwrap();
        w.finish().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\tb");
    }
}
