//! Append-only JSONL record of outgoing transfers, one file per backend in
//! the configured log directory.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::KeeperError;
use crate::types::Coin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    SendFrom,
    SendToAddress,
    Move,
}

#[derive(Debug, Serialize)]
pub struct TransferRecord<'a> {
    pub kind: TransferKind,
    pub from: &'a str,
    pub to: &'a str,
    pub amount: Decimal,
    pub txid: Option<&'a str>,
}

pub struct TransferJournal {
    coin: Coin,
    path: Option<PathBuf>,
    // Serializes appends so concurrent transfers never interleave lines.
    write_lock: Mutex<()>,
}

impl TransferJournal {
    /// Journal writing to `<log_dir>/<coin>-transfers.jsonl`, or a no-op
    /// journal when no log directory is configured.
    pub fn new(coin: Coin, log_dir: Option<&Path>) -> Result<Self, KeeperError> {
        let path = match log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Some(dir.join(format!("{coin}-transfers.jsonl")))
            }
            None => None,
        };
        Ok(Self {
            coin,
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record. The transfer already happened on the daemon, so a
    /// failing write is logged and never turned into a request error.
    pub async fn record(&self, record: TransferRecord<'_>) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = self.append(path, &record).await {
            tracing::warn!(
                coin = %self.coin,
                path = %path.display(),
                error = %e,
                "failed to append transfer journal"
            );
        }
    }

    async fn append(&self, path: &Path, record: &TransferRecord<'_>) -> Result<(), KeeperError> {
        #[derive(Serialize)]
        struct Line<'a> {
            coin: Coin,
            recorded_at: u64,
            #[serde(flatten)]
            record: &'a TransferRecord<'a>,
        }

        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut line = serde_json::to_string(&Line {
            coin: self.coin,
            recorded_at,
            record,
        })
        .map_err(|e| KeeperError::Io(std::io::Error::other(e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::test_util::scratch_dir;

    #[tokio::test]
    async fn records_are_appended_as_jsonl() {
        let dir = scratch_dir("journal");
        let journal = TransferJournal::new(Coin::Btc, Some(&dir)).expect("journal must open");
        for txid in ["aa", "bb"] {
            journal
                .record(TransferRecord {
                    kind: TransferKind::SendFrom,
                    from: "alice",
                    to: "mzBc4XEFSdzCDcTxAgf6EZXgsZWpztRhef",
                    amount: Decimal::from_str("1.5").expect("literal"),
                    txid: Some(txid),
                })
                .await;
        }

        let path = journal.path().expect("journal has a path").to_path_buf();
        assert!(path.ends_with("btc-transfers.jsonl"));
        let content = std::fs::read_to_string(&path).expect("journal must be readable");
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).expect("each line is JSON"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["coin"], "btc");
        assert_eq!(lines[0]["kind"], "sendfrom");
        assert_eq!(lines[0]["amount"], "1.5");
        assert_eq!(lines[1]["txid"], "bb");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn journal_without_log_dir_is_a_no_op() {
        let journal = TransferJournal::new(Coin::Eth, None).expect("no-op journal");
        assert!(journal.path().is_none());
        journal
            .record(TransferRecord {
                kind: TransferKind::Move,
                from: "a",
                to: "b",
                amount: Decimal::ONE,
                txid: None,
            })
            .await;
    }
}
