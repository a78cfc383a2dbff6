//! `encode` and `decode` commands.

use serde_json::Value;

use jsongate_protocol::{Frame, ReassemblyStats, Reassembler, encode_json, split_chunks};

use crate::error::{ClientError, ClientResult};
use crate::hex;

/// Result of feeding hex notifications through a reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// One line per completed frame.
    pub lines: Vec<String>,
    /// Reassembly counters.
    pub stats: ReassemblyStats,
    /// Bytes left over in an incomplete frame.
    pub trailing: usize,
}

/// Frames `json` and prints one hex line per chunk.
pub fn encode(json: &str, mtu: usize) -> ClientResult<()> {
    for line in encode_lines(json, mtu)? {
        println!("{}", line);
    }
    Ok(())
}

/// Frames `json` and returns the hex of each chunk.
pub fn encode_lines(json: &str, mtu: usize) -> ClientResult<Vec<String>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ClientError::invalid_input(format!("not JSON: {}", e)))?;
    let frame = encode_json(&value)?;
    Ok(split_chunks(&frame, mtu)?.iter().map(hex::encode).collect())
}

/// Treats each argument as one notification and prints the frames they
/// complete.
pub fn decode(chunks: &[String]) -> ClientResult<()> {
    let decoded = decode_lines(chunks)?;
    for line in &decoded.lines {
        println!("{}", line);
    }
    if decoded.stats.resyncs > 0 {
        eprintln!(
            "resynchronised {} time(s), skipped {} byte(s)",
            decoded.stats.resyncs, decoded.stats.skipped_bytes
        );
    }
    if decoded.trailing > 0 {
        eprintln!("{} byte(s) of an incomplete frame left over", decoded.trailing);
    }
    Ok(())
}

/// Reassembles hex notifications into printable lines.
pub fn decode_lines(chunks: &[String]) -> ClientResult<Decoded> {
    let mut reassembler = Reassembler::new();
    let mut lines = Vec::new();

    for chunk in chunks {
        let bytes = hex::decode(chunk)?;
        lines.extend(reassembler.push(&bytes).iter().map(describe));
    }

    Ok(Decoded {
        lines,
        stats: reassembler.stats(),
        trailing: reassembler.buffered_len(),
    })
}

fn describe(frame: &Frame) -> String {
    match frame.decode_json::<Value>() {
        Ok(_) => String::from_utf8_lossy(frame.payload()).into_owned(),
        Err(err) => format!("# undecodable JSON frame: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_get_config() {
        let lines = encode_lines(r#"{"cmd":"get_config"}"#, 100).unwrap();
        insta::assert_snapshot!(
            lines.join("\n"),
            @"0014007b22636d64223a226765745f636f6e666967227d"
        );
    }

    #[test]
    fn encode_respects_mtu() {
        let lines = encode_lines(r#"{"cmd":"get_config"}"#, 10).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.len() <= 20));
    }

    #[test]
    fn encode_rejects_non_json() {
        assert!(matches!(
            encode_lines("cmd=get_config", 100),
            Err(ClientError::InvalidInput(_))
        ));
    }

    #[test]
    fn decode_across_arguments() {
        let chunks: Vec<String> = encode_lines(r#"{"cmd":"save_ok"}"#, 6).unwrap();
        let decoded = decode_lines(&chunks).unwrap();

        assert_eq!(decoded.lines, vec![r#"{"cmd":"save_ok"}"#.to_string()]);
        assert_eq!(decoded.stats.resyncs, 0);
        assert_eq!(decoded.trailing, 0);
    }

    #[test]
    fn decode_reports_garbage_and_bad_json() {
        let chunks = vec![
            "ffffff0002007b7d".to_string(),
            "00 02 00 7b 7b".to_string(),
            "0005".to_string(),
        ];
        let decoded = decode_lines(&chunks).unwrap();

        assert_eq!(decoded.lines.len(), 2);
        assert_eq!(decoded.lines[0], "{}");
        assert!(decoded.lines[1].starts_with("# undecodable JSON frame"));
        assert_eq!(decoded.stats.frames, 2);
        assert_eq!(decoded.stats.resyncs, 1);
        assert_eq!(decoded.trailing, 2);
    }
}
