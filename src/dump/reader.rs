//! Dump reader

use crate::error::{Error, Result};
use crate::pokey::{RegisterBlock, BLOCK_SIZE};
use crate::song::Snapshot;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, Read};
use std::path::Path;

/// Line that ends the dump of a finite song
pub const END_MARKER: &str = "NO RESPONSE";

/// Read every snapshot from a dump
pub fn read_dump<R: BufRead>(input: R) -> Result<Vec<Snapshot>> {
    let mut snapshots: Vec<Snapshot> = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == END_MARKER {
            break;
        }

        let snapshot = parse_line(line, line_no)?;
        if let Some(first) = snapshots.first() {
            if snapshot.blocks.len() != first.blocks.len() {
                return Err(Error::Parse {
                    line: line_no,
                    message: format!(
                        "expected {} register blocks, found {}",
                        first.blocks.len(),
                        snapshot.blocks.len()
                    ),
                });
            }
        }
        snapshots.push(snapshot);
    }

    if snapshots.is_empty() {
        return Err(Error::UnsupportedInput("no POKEY data found".to_string()));
    }

    log::info!(
        "Read {} frames for {} POKEY chip(s)",
        snapshots.len(),
        snapshots[0].blocks.len()
    );
    Ok(snapshots)
}

/// Parse one `timestamp block|block|...` line
pub fn parse_line(line: &str, line_no: usize) -> Result<Snapshot> {
    let parse_error = |message: String| Error::Parse {
        line: line_no,
        message,
    };

    if line.contains(':') {
        return Err(Error::UnsupportedInput(
            "plain asapscan output has no timestamps; a patched asapscan is required".to_string(),
        ));
    }

    let line = line.trim();
    let (time, data) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| parse_error("missing register data".to_string()))?;

    let timestamp: f64 = time
        .parse()
        .map_err(|_| parse_error(format!("invalid timestamp '{}'", time)))?;
    if !timestamp.is_finite() {
        return Err(parse_error(format!("invalid timestamp '{}'", time)));
    }

    let blocks = data
        .split('|')
        .map(|hex| {
            decode_block(hex).ok_or_else(|| parse_error(format!("invalid register block '{}'", hex.trim())))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Snapshot::new(timestamp, blocks))
}

/// Decode 18 hex digits (whitespace between digits allowed) into a block
fn decode_block(hex: &str) -> Option<RegisterBlock> {
    let digits: Vec<u8> = hex
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()?;

    if digits.len() != BLOCK_SIZE * 2 {
        return None;
    }

    let mut block = [0u8; BLOCK_SIZE];
    for (byte, pair) in block.iter_mut().zip(digits.chunks(2)) {
        *byte = (pair[0] << 4) | pair[1];
    }
    Some(block)
}

/// Read a dump file, decompressing gzip if necessary
pub fn open_dump(path: &Path) -> Result<Vec<Snapshot>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let is_gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
        || (data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b);

    if is_gzip {
        let mut decoder = GzDecoder::new(data.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        data = decompressed;
    }

    let text = String::from_utf8(data)
        .map_err(|_| Error::UnsupportedInput(format!("{} is not a text POKEY dump", path.display())))?;

    read_dump(text.as_bytes())
}
