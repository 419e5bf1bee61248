// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The map lifecycle coordinator.
//!
//! [`MapHolder`] is a handle to a single-writer task that owns every open [`MapDocument`],
//! the active-map pointer, the backup baselines and the discoverable-map index. Requests
//! are answered over oneshot replies; lifecycle changes are broadcast as [`HolderEvent`]s.
//!
//! Loading and saving run on the blocking pool. A save and a close of the same map never
//! overlap: the close is held back until the save has finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::catalog::SharedCatalog;
use crate::config::EditorConfig;
use crate::format::dmm::{DmmParseError, DmmWriteError};
use crate::model::{MapDocument, MapId};
use crate::store::{BackupStore, StoreError};

mod discovery;
mod events;
mod state;

pub use discovery::discover_maps;
pub use events::{DiscoverableMap, HolderEvent, MapInfo};

const REQUEST_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum HolderError {
    #[error("failed to load {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: DmmParseError,
    },
    #[error("no backup baseline for map {id}; refusing to save without one")]
    MissingBaseline { id: MapId },
    #[error("failed to encode map {id}: {source}")]
    Encode {
        id: MapId,
        #[source]
        source: DmmWriteError,
    },
    #[error("map {id} is already being saved")]
    SaveInProgress { id: MapId },
    #[error(transparent)]
    Store(StoreError),
    #[error("map holder has stopped")]
    Stopped,
}

impl From<StoreError> for HolderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingBaseline { id } => Self::MissingBaseline { id },
            other => Self::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The map was already the active one.
    AlreadyActive,
    /// The map was open and is now active.
    Reselected(MapInfo),
    Opened(MapInfo),
    /// A load of the same map is still running.
    AlreadyLoading,
    NotAFile,
    /// The holder was reset while the map was loading.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    NotOpen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { id: MapId, path: PathBuf, rev: u64 },
    NoActiveMap,
}

type Edit = Box<dyn FnOnce(&mut MapDocument) + Send>;
type Query = Box<dyn FnOnce(&[Arc<MapDocument>]) + Send>;

enum Request {
    Open {
        path: PathBuf,
        reply: oneshot::Sender<Result<OpenOutcome, HolderError>>,
    },
    Close {
        id: MapId,
        reply: oneshot::Sender<CloseOutcome>,
    },
    FetchActive {
        reply: oneshot::Sender<Option<MapInfo>>,
    },
    Change {
        id: MapId,
        reply: oneshot::Sender<bool>,
    },
    Save {
        reply: oneshot::Sender<Result<SaveOutcome, HolderError>>,
    },
    Modify {
        id: MapId,
        edit: Edit,
        reply: oneshot::Sender<bool>,
    },
    Read {
        query: Query,
    },
    OpenedMaps {
        reply: oneshot::Sender<Vec<MapInfo>>,
    },
    DiscoverableMaps {
        reply: oneshot::Sender<Arc<[DiscoverableMap]>>,
    },
    CatalogChanged {
        catalog: SharedCatalog,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the map holder task. Clones talk to the same task; it stops once every handle
/// is dropped.
#[derive(Clone)]
pub struct MapHolder {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<HolderEvent>,
    catalog: watch::Receiver<Option<SharedCatalog>>,
    backups: BackupStore,
}

impl std::fmt::Debug for MapHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapHolder")
            .field("backups", &self.backups.root())
            .field("stopped", &self.requests.is_closed())
            .finish_non_exhaustive()
    }
}

impl MapHolder {
    /// Starts the holder task on the current tokio runtime.
    pub fn spawn(config: &EditorConfig) -> Result<Self, HolderError> {
        let backups = match &config.backup.dir {
            Some(dir) => BackupStore::in_dir(dir)?,
            None => BackupStore::scratch()?,
        }
        .with_durability(config.save.durability());
        Ok(Self::spawn_with_backups(config, backups))
    }

    pub fn spawn_with_backups(config: &EditorConfig, backups: BackupStore) -> Self {
        let (requests, inbox) = mpsc::channel(REQUEST_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (catalog_tx, catalog) = watch::channel(None);

        let holder = state::HolderState::new(config, backups.clone(), events.clone(), catalog_tx);
        tokio::spawn(holder.run(inbox));

        Self {
            requests,
            events,
            catalog,
            backups,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HolderEvent> {
        self.events.subscribe()
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// The catalog most recently installed with [`MapHolder::catalog_changed`].
    pub fn catalog(&self) -> Option<SharedCatalog> {
        self.catalog.borrow().clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, HolderError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(build(reply))
            .await
            .map_err(|_| HolderError::Stopped)?;
        answer.await.map_err(|_| HolderError::Stopped)
    }

    /// Opens `path`, or reselects it when it is already open.
    ///
    /// A fresh load waits for a catalog to be installed; the holder keeps serving other
    /// requests meanwhile.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<OpenOutcome, HolderError> {
        let path = path.as_ref().to_path_buf();
        self.request(|reply| Request::Open { path, reply }).await?
    }

    pub async fn close(&self, id: MapId) -> Result<CloseOutcome, HolderError> {
        self.request(|reply| Request::Close { id, reply }).await
    }

    pub async fn fetch_active(&self) -> Result<Option<MapInfo>, HolderError> {
        self.request(|reply| Request::FetchActive { reply }).await
    }

    /// Makes `id` active. Returns `false` when it is not open or already active.
    pub async fn change(&self, id: MapId) -> Result<bool, HolderError> {
        self.request(|reply| Request::Change { id, reply }).await
    }

    /// Saves the active map against its backup baseline.
    pub async fn save(&self) -> Result<SaveOutcome, HolderError> {
        self.request(|reply| Request::Save { reply }).await?
    }

    /// Applies `edit` to map `id`. Returns `None` when the map is not open.
    pub async fn modify<R, F>(&self, id: MapId, edit: F) -> Result<Option<R>, HolderError>
    where
        R: Send + 'static,
        F: FnOnce(&mut MapDocument) -> R + Send + 'static,
    {
        let (out_tx, out_rx) = oneshot::channel();
        let edit: Edit = Box::new(move |doc: &mut MapDocument| {
            let _ = out_tx.send(edit(doc));
        });
        if !self
            .request(|reply| Request::Modify { id, edit, reply })
            .await?
        {
            return Ok(None);
        }
        out_rx.await.map(Some).map_err(|_| HolderError::Stopped)
    }

    /// Runs `query` against the open maps, in open order.
    pub async fn read_maps<R, F>(&self, query: F) -> Result<R, HolderError>
    where
        R: Send + 'static,
        F: FnOnce(&[Arc<MapDocument>]) -> R + Send + 'static,
    {
        let (out_tx, out_rx) = oneshot::channel();
        let query: Query = Box::new(move |maps: &[Arc<MapDocument>]| {
            let _ = out_tx.send(query(maps));
        });
        self.requests
            .send(Request::Read { query })
            .await
            .map_err(|_| HolderError::Stopped)?;
        out_rx.await.map_err(|_| HolderError::Stopped)
    }

    pub async fn opened_maps(&self) -> Result<Vec<MapInfo>, HolderError> {
        self.request(|reply| Request::OpenedMaps { reply }).await
    }

    pub async fn discoverable_maps(&self) -> Result<Arc<[DiscoverableMap]>, HolderError> {
        self.request(|reply| Request::DiscoverableMaps { reply }).await
    }

    /// Installs a catalog and rescans its root for map files in the background.
    pub async fn catalog_changed(&self, catalog: SharedCatalog) -> Result<(), HolderError> {
        self.requests
            .send(Request::CatalogChanged { catalog })
            .await
            .map_err(|_| HolderError::Stopped)
    }

    /// Closes everything, drops the catalog and the discoverable-map index.
    pub async fn reset(&self) -> Result<(), HolderError> {
        self.request(|reply| Request::Reset { reply }).await
    }
}
