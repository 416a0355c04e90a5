//! Record Input Module
//!
//! Reads newline-delimited records for the pipeline. Blank and
//! whitespace-only lines carry no record and are skipped whatever the
//! measurement mode.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

/// Feed one record per non-blank line into `records`
///
/// Stops early, without error, once the receiving side is gone; the
/// pipeline reports its own failure in that case.
///
/// # Returns
/// The number of records sent
pub async fn read_records<R>(reader: R, records: mpsc::Sender<String>) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0;
    let mut skipped = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            skipped += 1;
            continue;
        }
        if records.send(line).await.is_err() {
            break;
        }
        sent += 1;
    }

    debug!("Read {} records, skipped {} blank lines", sent, skipped);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(text: &str) -> Vec<String> {
        let (tx, mut rx) = mpsc::channel(16);
        let sent = read_records(text.as_bytes(), tx).await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(sent, lines.len());
        lines
    }

    #[tokio::test]
    async fn test_blank_and_whitespace_lines_are_skipped() {
        let lines = collect("a\n\n   \n\tb\r\n\nc").await;
        assert_eq!(lines, vec!["a", "\tb", "c"]);
    }

    #[tokio::test]
    async fn test_json_lines_keep_their_text() {
        let lines = collect("{\"a\":1}\n\n  { \"b\" : 2 }\n").await;
        assert_eq!(lines, vec!["{\"a\":1}", "  { \"b\" : 2 }"]);
    }

    #[tokio::test]
    async fn test_stops_when_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert_eq!(read_records("a\nb\n".as_bytes(), tx).await.unwrap(), 0);
    }
}
