//! Pluggable persistence for the session's sequence-number and outgoing-message state.
//!
//! A session engine must survive process restarts without losing its place in the sequence
//! space or its ability to resend. [`Store`] is a thin facade over the concrete backend chosen
//! by [`StoreConfig`] at settings-build time: `sqlite` (relational, durable, the default),
//! `file` (a plain directory tree, durable, no database dependency), or `memory`
//! (non-durable, for tests). All three honor the same contract, so a session never has to know
//! which one is underneath.

mod file;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::offset::Utc;
use chrono::DateTime;

use crate::fix::mem::MsgBuf;
use crate::SessionSettings;

use file::FileStore;
use memory::MemoryStore;
#[cfg(feature = "sqlite")]
use sqlite::SqliteStore;

/// Selects which [`Store`] backend a session is persisted with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreConfig {
    /// Relational backend under `store_path`, via sqlite. Requires the `sqlite` feature.
    #[cfg(feature = "sqlite")]
    Sqlite,
    /// One directory per epoch under `store_path`, one file per outgoing message.
    File,
    /// Held in process memory only; lost on restart. Intended for tests.
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        #[cfg(feature = "sqlite")]
        {
            StoreConfig::Sqlite
        }
        #[cfg(not(feature = "sqlite"))]
        {
            StoreConfig::File
        }
    }
}

enum StoreImpl {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStore),
    File(FileStore),
    Memory(MemoryStore),
}

/// Facade over the sequence-number and resend-history persistence backends. Every method
/// dispatches to whichever concrete backend the session was configured with; callers never
/// match on the backend themselves.
pub struct Store {
    inner: StoreImpl,
}

impl Store {
    pub(crate) async fn build(settings: &SessionSettings) -> Result<Store> {
        let epoch = settings.epoch.clone();
        let inner = match &settings.store_config {
            #[cfg(feature = "sqlite")]
            StoreConfig::Sqlite => {
                StoreImpl::Sqlite(SqliteStore::build(&settings.store_path, epoch).await?)
            }
            StoreConfig::File => {
                StoreImpl::File(FileStore::build(&settings.store_path, epoch).await?)
            }
            StoreConfig::Memory => StoreImpl::Memory(MemoryStore::build()?),
        };
        Ok(Store { inner })
    }

    pub(crate) fn store_outgoing(
        &self,
        epoch: Arc<String>,
        msg_seq_num: u32,
        send_instant: Instant,
        msg: Arc<MsgBuf>,
    ) -> Result<()> {
        match &self.inner {
            #[cfg(feature = "sqlite")]
            StoreImpl::Sqlite(s) => s.store_outgoing(epoch, msg_seq_num, send_instant, msg),
            StoreImpl::File(s) => s.store_outgoing(epoch, msg_seq_num, send_instant, msg),
            StoreImpl::Memory(s) => s.store_outgoing(epoch, msg_seq_num, send_instant, msg),
        }
    }

    pub(crate) async fn get_sequences(&self, epoch: Arc<String>) -> Result<(u32, u32)> {
        match &self.inner {
            #[cfg(feature = "sqlite")]
            StoreImpl::Sqlite(s) => s.get_sequences(epoch).await,
            StoreImpl::File(s) => s.get_sequences(epoch).await,
            StoreImpl::Memory(s) => s.get_sequences(epoch).await,
        }
    }

    pub(crate) async fn get_prev_messages(
        &self,
        epoch: Arc<String>,
        begin: u32,
        end: u32,
        last: u32,
    ) -> Result<Vec<(u32, Vec<u8>)>> {
        match &self.inner {
            #[cfg(feature = "sqlite")]
            StoreImpl::Sqlite(s) => s.get_prev_messages(epoch, begin, end, last).await,
            StoreImpl::File(s) => s.get_prev_messages(epoch, begin, end, last).await,
            StoreImpl::Memory(s) => s.get_prev_messages(epoch, begin, end, last).await,
        }
    }

    pub(crate) async fn set_sequences(
        &self,
        epoch: Arc<String>,
        next_outgoing: u32,
        next_incoming: u32,
    ) -> Result<()> {
        match &self.inner {
            #[cfg(feature = "sqlite")]
            StoreImpl::Sqlite(s) => s.set_sequences(epoch, next_outgoing, next_incoming).await,
            StoreImpl::File(s) => s.set_sequences(epoch, next_outgoing, next_incoming).await,
            StoreImpl::Memory(s) => s.set_sequences(epoch, next_outgoing, next_incoming).await,
        }
    }

    pub(crate) async fn last_send_time(&self, epoch: Arc<String>) -> Result<Option<DateTime<Utc>>> {
        match &self.inner {
            #[cfg(feature = "sqlite")]
            StoreImpl::Sqlite(s) => s.last_send_time(epoch).await,
            StoreImpl::File(s) => s.last_send_time(epoch).await,
            StoreImpl::Memory(s) => s.last_send_time(epoch).await,
        }
    }

    /// Resets a session's sequence numbers to 1 and clears its resend history. Used when an
    /// operator forces a fresh epoch outside of normal logon negotiation.
    pub async fn reset(&self, epoch: Arc<String>) -> Result<()> {
        match &self.inner {
            #[cfg(feature = "sqlite")]
            StoreImpl::Sqlite(s) => s.reset(epoch).await,
            StoreImpl::File(s) => s.reset(epoch).await,
            StoreImpl::Memory(s) => s.reset(epoch).await,
        }
    }

    pub(crate) async fn disconnect(&self) -> Result<()> {
        match &self.inner {
            #[cfg(feature = "sqlite")]
            StoreImpl::Sqlite(s) => s.disconnect().await,
            StoreImpl::File(s) => s.disconnect().await,
            StoreImpl::Memory(s) => s.disconnect().await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trips_sequences() {
        let store = Store {
            inner: StoreImpl::Memory(MemoryStore::build().unwrap()),
        };
        let epoch = Arc::new("epoch-a".to_string());
        assert_eq!(store.get_sequences(epoch.clone()).await.unwrap(), (1, 1));
        store.set_sequences(epoch.clone(), 5, 5).await.unwrap();
        assert_eq!(store.get_sequences(epoch.clone()).await.unwrap(), (5, 5));
        store.reset(epoch.clone()).await.unwrap();
        assert_eq!(store.get_sequences(epoch).await.unwrap(), (1, 1));
    }
}
