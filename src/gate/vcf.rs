// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Bounded VCF prefix reading
//!
//! Parsing goes through noodles. BGZF is detected from the block header;
//! plain gzip and uncompressed text are accepted as well.

use flate2::read::MultiGzDecoder;
use noodles::bgzf;
use noodles::vcf;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Take};
use std::path::Path;

use crate::errors::{GplError, GplResult};

type BoundedReader = vcf::io::Reader<BufReader<Take<Box<dyn Read + Send>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Bgzf,
}

fn gate_error(path: &Path, message: impl Into<String>) -> GplError {
    GplError::Gate {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Sniff the compression from the first member header, then rewind
fn detect_compression(file: &mut File) -> std::io::Result<Compression> {
    let mut header = [0u8; 12];
    let n = file.read(&mut header)?;
    file.seek(SeekFrom::Start(0))?;

    if n < 10 || header[0] != 0x1f || header[1] != 0x8b || header[2] != 0x08 {
        return Ok(Compression::None);
    }
    // FEXTRA must be set and carry a `BC` subfield for BGZF
    if header[3] & 0x04 == 0 || n < 12 {
        return Ok(Compression::Gzip);
    }

    let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
    let mut extra = vec![0u8; xlen];
    file.seek(SeekFrom::Start(12))?;
    let read = file.read(&mut extra)?;
    file.seek(SeekFrom::Start(0))?;

    let extra = &extra[..read];
    let mut i = 0usize;
    while i + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[i + 2], extra[i + 3]]) as usize;
        if extra[i] == b'B' && extra[i + 1] == b'C' && slen == 2 {
            return Ok(Compression::Bgzf);
        }
        i = i.saturating_add(4 + slen);
    }
    Ok(Compression::Gzip)
}

/// Open a VCF with at most `max_scan_bytes` of decompressed text readable
fn open_bounded(path: &Path, max_scan_bytes: u64) -> GplResult<BoundedReader> {
    let mut file = File::open(path).map_err(|e| GplError::read_failed(path, e))?;
    let compression = detect_compression(&mut file).map_err(|e| GplError::read_failed(path, e))?;

    let inner: Box<dyn Read + Send> = match compression {
        Compression::Bgzf => Box::new(bgzf::Reader::new(file)),
        Compression::Gzip => Box::new(MultiGzDecoder::new(file)),
        Compression::None => Box::new(file),
    };

    Ok(vcf::io::Reader::new(BufReader::new(inner.take(max_scan_bytes))))
}

/// Read the header, treating a budget cut inside it as an error
fn read_header(reader: &mut BoundedReader, path: &Path, max_scan_bytes: u64) -> GplResult<vcf::Header> {
    reader.read_header().map_err(|e| {
        if reader.get_ref().get_ref().limit() == 0 {
            gate_error(
                path,
                format!("header does not end within the first {} bytes", max_scan_bytes),
            )
        } else {
            gate_error(path, format!("invalid VCF header: {}", e))
        }
    })
}

/// Whether the VCF holds at least one data record
///
/// Reading stops at the first record. At most `max_scan_bytes` of
/// decompressed text are read; running out of budget before reaching either
/// a record or end of file is an error.
pub fn has_data_record(path: &Path, max_scan_bytes: u64) -> GplResult<bool> {
    let mut reader = open_bounded(path, max_scan_bytes)?;
    read_header(&mut reader, path, max_scan_bytes)?;

    match reader.records().next() {
        Some(Ok(_)) => return Ok(true),
        Some(Err(e)) => return Err(gate_error(path, e.to_string())),
        None => {}
    }

    let bounded = reader.get_mut().get_mut();
    if bounded.limit() > 0 {
        return Ok(false);
    }

    // Budget spent: only a true end of file means "no records"
    let mut next = [0u8; 1];
    let more = bounded
        .get_mut()
        .read(&mut next)
        .map_err(|e| gate_error(path, e.to_string()))?;
    if more == 0 {
        Ok(false)
    } else {
        Err(gate_error(
            path,
            format!("no data record within the first {} bytes", max_scan_bytes),
        ))
    }
}

/// Sample column names from the VCF header
pub fn sample_names(path: &Path, max_scan_bytes: u64) -> GplResult<Vec<String>> {
    let mut reader = open_bounded(path, max_scan_bytes)?;
    let header = read_header(&mut reader, path, max_scan_bytes)?;
    Ok(header.sample_names().iter().cloned().collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    pub(crate) const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNORMAL\tTUMOUR\n";
    pub(crate) const RECORD: &str = "chr1\t10000\tgridss0o\tN\tN[chr2:20000[\t100\tPASS\tSVTYPE=BND\tGT\t./.\t./.\n";

    /// Write a BGZF-compressed VCF, optionally with one record
    pub(crate) fn write_vcf_gz(path: &Path, with_record: bool) {
        let file = File::create(path).unwrap();
        let mut writer = bgzf::Writer::new(file);
        writer.write_all(HEADER.as_bytes()).unwrap();
        if with_record {
            writer.write_all(RECORD.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_plain_vcf() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.vcf");
        let full = temp_dir.path().join("full.vcf");
        std::fs::write(&empty, HEADER).unwrap();
        std::fs::write(&full, format!("{}{}", HEADER, RECORD)).unwrap();

        assert!(!has_data_record(&empty, 1024).unwrap());
        assert!(has_data_record(&full, 1024).unwrap());
    }

    #[test]
    fn test_bgzf_vcf() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.vcf.gz");
        let full = temp_dir.path().join("full.vcf.gz");
        write_vcf_gz(&empty, false);
        write_vcf_gz(&full, true);

        assert!(!has_data_record(&empty, 1024).unwrap());
        assert!(has_data_record(&full, 1024).unwrap());
    }

    #[test]
    fn test_record_in_second_bgzf_block() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocks.vcf.gz");

        let mut writer = bgzf::Writer::new(File::create(&path).unwrap());
        writer.write_all(HEADER.as_bytes()).unwrap();
        // Flushing closes the current block
        writer.flush().unwrap();
        writer.write_all(RECORD.as_bytes()).unwrap();
        writer.finish().unwrap();

        assert!(has_data_record(&path, 1024).unwrap());
    }

    #[test]
    fn test_plain_gzip_vcf() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.vcf.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(HEADER.as_bytes()).unwrap();
        encoder.write_all(RECORD.as_bytes()).unwrap();
        encoder.finish().unwrap();

        assert!(has_data_record(&path, 1024).unwrap());
        assert_eq!(sample_names(&path, 1024).unwrap(), vec!["NORMAL", "TUMOUR"]);
    }

    #[test]
    fn test_budget_exhausted_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("long_header.vcf");
        let mut content = String::from("##fileformat=VCFv4.2\n");
        for i in 0..100 {
            content.push_str(&format!("##contig=<ID=chr{},length=1000>\n", i));
        }
        content.push_str(&HEADER[HEADER.find("#CHROM").unwrap()..]);
        content.push_str(RECORD);
        std::fs::write(&path, content).unwrap();

        assert!(has_data_record(&path, 64).is_err());
        assert!(has_data_record(&path, 1 << 20).unwrap());
    }

    #[test]
    fn test_budget_equal_to_file_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("exact.vcf");
        std::fs::write(&path, HEADER).unwrap();

        assert!(!has_data_record(&path, HEADER.len() as u64).unwrap());
    }

    #[test]
    fn test_sample_names() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calls.vcf.gz");
        write_vcf_gz(&path, true);

        assert_eq!(sample_names(&path, 1024).unwrap(), vec!["NORMAL", "TUMOUR"]);
    }

    #[test]
    fn test_corrupt_gzip_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.vcf.gz");
        // Valid gzip header followed by a deflate block with a reserved type
        let mut bytes = vec![0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
        bytes.extend([0xff; 16]);
        std::fs::write(&path, bytes).unwrap();

        assert!(has_data_record(&path, 1024).is_err());
    }
}
