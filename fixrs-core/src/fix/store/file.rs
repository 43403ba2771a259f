//! File-tree reference implementation of [`super::Store`]. One directory per epoch under the
//! configured store path:
//!
//! ```text
//! <store_path>/<epoch>/
//!     seqnums            "<next_incoming> <next_outgoing>"
//!     last_send_time      RFC3339 timestamp of the most recent outgoing message
//!     messages/<seqnum>   raw bytes of the outgoing message with that sequence number
//! ```
//!
//! Resend recovery re-reads the individual message files rather than keeping them in memory,
//! so the footprint of this backend is bounded by what's on disk, not by session lifetime.

use anyhow::{Context, Result};
use chrono::offset::Utc;
use chrono::DateTime;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio::sync::{mpsc, oneshot};

use crate::fix::mem::MsgBuf;

const SEQNUMS_FILE: &str = "seqnums";
const LAST_SEND_TIME_FILE: &str = "last_send_time";
const MESSAGES_DIR: &str = "messages";

enum StoreRequest {
    StoreOutgoing(u32, Instant, Arc<MsgBuf>),
    #[allow(clippy::type_complexity)]
    GetPrevMessages(u32, u32, oneshot::Sender<Result<Vec<(u32, Vec<u8>)>>>),
    GetSequences(oneshot::Sender<Result<(u32, u32)>>),
    SetSequences(u32, u32, oneshot::Sender<Result<()>>),
    LastSendTime(oneshot::Sender<Result<Option<DateTime<Utc>>>>),
    Reset(oneshot::Sender<Result<()>>),
    Disconnect(oneshot::Sender<Result<()>>),
}

pub(crate) struct FileStore {
    sender: mpsc::UnboundedSender<StoreRequest>,
}

impl FileStore {
    pub(crate) async fn build(store_path: &std::path::Path, epoch: Arc<String>) -> Result<FileStore> {
        let root = store_path.join(epoch.as_str());
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(MESSAGES_DIR)).await?;
        ensure_seqnums(&root).await?;

        let (sender, mut receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let begin_time = Utc::now();
            let begin_instant = Instant::now();
            while let Some(req) = receiver.recv().await {
                match req {
                    StoreRequest::StoreOutgoing(msg_seq_num, send_instant, msg) => {
                        let send_time = match chrono::Duration::from_std(
                            send_instant.duration_since(begin_instant),
                        ) {
                            Ok(d) => begin_time + d,
                            Err(_) => Utc::now(),
                        };
                        if store_outgoing(&root, msg_seq_num, send_time, msg)
                            .await
                            .is_err()
                        {
                            eprintln!("error storing outgoing message");
                        }
                    }
                    StoreRequest::GetPrevMessages(begin, end, sender) => {
                        let resp = get_prev_messages(&root, begin, end).await;
                        let _ = sender.send(resp);
                    }
                    StoreRequest::GetSequences(sender) => {
                        let resp = read_seqnums(&root).await;
                        let _ = sender.send(resp);
                    }
                    StoreRequest::SetSequences(next_outgoing, next_incoming, sender) => {
                        let resp = write_seqnums(&root, next_incoming, next_outgoing).await;
                        let _ = sender.send(resp);
                    }
                    StoreRequest::LastSendTime(sender) => {
                        let resp = read_last_send_time(&root).await;
                        let _ = sender.send(resp);
                    }
                    StoreRequest::Reset(sender) => {
                        let resp = reset(&root).await;
                        let _ = sender.send(resp);
                    }
                    StoreRequest::Disconnect(sender) => {
                        let _ = sender.send(Ok(()));
                        break;
                    }
                }
            }
        });

        Ok(FileStore { sender })
    }

    pub(crate) fn store_outgoing(
        &self,
        _epoch: Arc<String>,
        msg_seq_num: u32,
        send_instant: Instant,
        msg: Arc<MsgBuf>,
    ) -> Result<()> {
        let req = StoreRequest::StoreOutgoing(msg_seq_num, send_instant, msg);
        self.sender.send(req)?;
        Ok(())
    }

    pub(crate) async fn get_sequences(&self, _epoch: Arc<String>) -> Result<(u32, u32)> {
        let (sender, receiver) = oneshot::channel();
        self.sender.send(StoreRequest::GetSequences(sender))?;
        receiver.await?
    }

    pub(crate) async fn get_prev_messages(
        &self,
        _epoch: Arc<String>,
        begin: u32,
        end: u32,
        _last: u32,
    ) -> Result<Vec<(u32, Vec<u8>)>> {
        let (sender, receiver) = oneshot::channel();
        self.sender
            .send(StoreRequest::GetPrevMessages(begin, end, sender))?;
        receiver.await?
    }

    pub(crate) async fn set_sequences(
        &self,
        _epoch: Arc<String>,
        next_outgoing: u32,
        next_incoming: u32,
    ) -> Result<()> {
        let (sender, receiver) = oneshot::channel();
        self.sender.send(StoreRequest::SetSequences(
            next_outgoing,
            next_incoming,
            sender,
        ))?;
        receiver.await?
    }

    pub(crate) async fn last_send_time(&self, _epoch: Arc<String>) -> Result<Option<DateTime<Utc>>> {
        let (sender, receiver) = oneshot::channel();
        self.sender.send(StoreRequest::LastSendTime(sender))?;
        receiver.await?
    }

    pub(crate) async fn reset(&self, _epoch: Arc<String>) -> Result<()> {
        let (sender, receiver) = oneshot::channel();
        self.sender.send(StoreRequest::Reset(sender))?;
        receiver.await?
    }

    pub(crate) async fn disconnect(&self) -> Result<()> {
        let (sender, receiver) = oneshot::channel();
        self.sender.send(StoreRequest::Disconnect(sender))?;
        receiver.await?
    }
}

async fn ensure_seqnums(root: &std::path::Path) -> Result<()> {
    let path = root.join(SEQNUMS_FILE);
    if fs::metadata(&path).await.is_err() {
        fs::write(&path, b"1 1").await?;
    }
    Ok(())
}

async fn read_seqnums(root: &std::path::Path) -> Result<(u32, u32)> {
    let contents = fs::read_to_string(root.join(SEQNUMS_FILE)).await?;
    let mut parts = contents.split_whitespace();
    let next_incoming: u32 = parts
        .next()
        .context("missing next_incoming field in seqnums file")?
        .parse()?;
    let next_outgoing: u32 = parts
        .next()
        .context("missing next_outgoing field in seqnums file")?
        .parse()?;
    Ok((next_incoming, next_outgoing))
}

async fn write_seqnums(root: &std::path::Path, next_incoming: u32, next_outgoing: u32) -> Result<()> {
    let tmp = root.join(format!("{SEQNUMS_FILE}.tmp"));
    fs::write(&tmp, format!("{next_incoming} {next_outgoing}")).await?;
    fs::rename(&tmp, root.join(SEQNUMS_FILE)).await?;
    Ok(())
}

async fn store_outgoing(
    root: &std::path::Path,
    msg_seq_num: u32,
    send_time: DateTime<Utc>,
    msg: Arc<MsgBuf>,
) -> Result<()> {
    let path = root.join(MESSAGES_DIR).join(msg_seq_num.to_string());
    fs::write(&path, &msg.0).await?;
    fs::write(
        root.join(LAST_SEND_TIME_FILE),
        send_time.to_rfc3339(),
    )
    .await?;
    Ok(())
}

async fn get_prev_messages(
    root: &std::path::Path,
    begin_seq_no: u32,
    end_seq_no: u32,
) -> Result<Vec<(u32, Vec<u8>)>> {
    let mut output = Vec::new();
    for seq in begin_seq_no..=end_seq_no {
        let path = root.join(MESSAGES_DIR).join(seq.to_string());
        if let Ok(bytes) = fs::read(&path).await {
            output.push((seq, bytes));
        }
    }
    output.sort_by(|(a, _), (b, _)| b.cmp(a));
    Ok(output)
}

async fn read_last_send_time(root: &std::path::Path) -> Result<Option<DateTime<Utc>>> {
    match fs::read_to_string(root.join(LAST_SEND_TIME_FILE)).await {
        Ok(contents) => Ok(Some(DateTime::parse_from_rfc3339(contents.trim())?.with_timezone(&Utc))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn reset(root: &std::path::Path) -> Result<()> {
    write_seqnums(root, 1, 1).await?;
    let messages_dir = root.join(MESSAGES_DIR);
    let mut entries = fs::read_dir(&messages_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        fs::remove_file(entry.path()).await?;
    }
    let _ = fs::remove_file(root.join(LAST_SEND_TIME_FILE)).await;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_sequences_and_messages() {
        let dir = tempdir().unwrap();
        let epoch = Arc::new("epoch-a".to_string());
        let store = FileStore::build(dir.path(), Arc::clone(&epoch)).await.unwrap();

        assert_eq!(store.get_sequences(Arc::clone(&epoch)).await.unwrap(), (1, 1));

        let msg = Arc::new(MsgBuf(b"8=FIX.4.2|".to_vec()));
        store
            .store_outgoing(Arc::clone(&epoch), 1, Instant::now(), msg)
            .unwrap();
        store
            .set_sequences(Arc::clone(&epoch), 2, 2)
            .await
            .unwrap();
        store.disconnect().await.unwrap();

        let store = FileStore::build(dir.path(), Arc::clone(&epoch)).await.unwrap();
        assert_eq!(store.get_sequences(epoch).await.unwrap(), (2, 2));
    }
}
