// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::discovery::discover_maps;
use super::events::{DiscoverableMap, HolderEvent, MapInfo};
use super::{CloseOutcome, HolderError, OpenOutcome, Request, SaveOutcome};
use crate::catalog::SharedCatalog;
use crate::config::EditorConfig;
use crate::format::dmm::{load_map, save_map, SaveFormat};
use crate::model::{MapDocument, MapId};
use crate::store::{write_atomic, BackupStore, StoreError, WriteDurability};

/// Completions reported back by background work.
enum Internal {
    Loaded {
        id: MapId,
        epoch: u64,
        result: Result<MapDocument, HolderError>,
        reply: oneshot::Sender<Result<OpenOutcome, HolderError>>,
    },
    SaveFinished {
        id: MapId,
        rev: u64,
        result: Result<PathBuf, HolderError>,
        reply: oneshot::Sender<Result<SaveOutcome, HolderError>>,
    },
    Discovered {
        generation: u64,
        maps: Arc<[DiscoverableMap]>,
    },
}

/// Open maps in the order they were opened.
#[derive(Default)]
struct OpenMaps {
    docs: Vec<Arc<MapDocument>>,
}

impl OpenMaps {
    fn position(&self, id: MapId) -> Option<usize> {
        self.docs.iter().position(|doc| doc.id() == id)
    }

    fn get(&self, id: MapId) -> Option<&Arc<MapDocument>> {
        self.docs.iter().find(|doc| doc.id() == id)
    }

    fn get_mut(&mut self, id: MapId) -> Option<&mut Arc<MapDocument>> {
        self.docs.iter_mut().find(|doc| doc.id() == id)
    }

    fn contains(&self, id: MapId) -> bool {
        self.position(id).is_some()
    }

    fn push(&mut self, doc: Arc<MapDocument>) {
        self.docs.push(doc);
    }

    /// Removes `id` and returns it with the map that now holds its position, or the one
    /// before it when it was last.
    fn remove(&mut self, id: MapId) -> Option<(Arc<MapDocument>, Option<MapId>)> {
        let pos = self.position(id)?;
        let removed = self.docs.remove(pos);
        let successor = self
            .docs
            .get(pos)
            .or_else(|| pos.checked_sub(1).and_then(|prev| self.docs.get(prev)))
            .map(|doc| doc.id());
        Some((removed, successor))
    }

    fn infos(&self) -> Vec<MapInfo> {
        self.docs.iter().map(|doc| MapInfo::of(doc)).collect()
    }

    fn ids(&self) -> Vec<MapId> {
        self.docs.iter().map(|doc| doc.id()).collect()
    }

    fn clear(&mut self) -> Vec<Arc<MapDocument>> {
        std::mem::take(&mut self.docs)
    }
}

struct SaveSlot {
    epoch: u64,
    deferred_closes: Vec<oneshot::Sender<CloseOutcome>>,
}

pub(super) struct HolderState {
    extension: String,
    save_format: SaveFormat,
    durability: WriteDurability,
    backups: BackupStore,
    events: broadcast::Sender<HolderEvent>,
    catalog: watch::Sender<Option<SharedCatalog>>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,

    open: OpenMaps,
    active: Option<MapId>,
    loading: HashSet<MapId>,
    saving: HashMap<MapId, SaveSlot>,
    discoverable: Arc<[DiscoverableMap]>,
    /// Bumped by reset; background results from an older epoch are stale.
    epoch: u64,
    discovery_generation: u64,
}

impl HolderState {
    pub(super) fn new(
        config: &EditorConfig,
        backups: BackupStore,
        events: broadcast::Sender<HolderEvent>,
        catalog: watch::Sender<Option<SharedCatalog>>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            extension: config.maps.extension.clone(),
            save_format: config.save.format,
            durability: config.save.durability(),
            backups,
            events,
            catalog,
            internal_tx,
            internal_rx,
            open: OpenMaps::default(),
            active: None,
            loading: HashSet::new(),
            saving: HashMap::new(),
            discoverable: Arc::from(Vec::new()),
            epoch: 0,
            discovery_generation: 0,
        }
    }

    pub(super) async fn run(mut self, mut inbox: mpsc::Receiver<Request>) {
        debug!(backups = %self.backups.root().display(), "map holder started");
        loop {
            tokio::select! {
                biased;
                Some(done) = self.internal_rx.recv() => self.on_internal(done),
                request = inbox.recv() => match request {
                    Some(request) => self.on_request(request),
                    None => break,
                },
            }
        }
        self.discard_backups_on_shutdown();
        debug!("map holder stopped");
    }

    fn discard_backups_on_shutdown(&self) {
        if self.saving.is_empty() {
            // Also covers baselines of loads that never reported back.
            if let Err(err) = self.backups.discard_all() {
                warn!(error = %err, "failed to discard backups");
            }
            return;
        }
        // A save still running reads its baseline.
        for id in self.open.ids() {
            if !self.saving.contains_key(&id) {
                self.discard_backup(id);
            }
        }
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Open { path, reply } => self.open(path, reply),
            Request::Close { id, reply } => {
                if let Some(slot) = self.saving.get_mut(&id) {
                    debug!(map = %id, "close deferred until save finishes");
                    slot.deferred_closes.push(reply);
                } else {
                    let _ = reply.send(self.close(id));
                }
            }
            Request::FetchActive { reply } => {
                let active = self.active.and_then(|id| self.open.get(id));
                let _ = reply.send(active.map(|doc| MapInfo::of(doc)));
            }
            Request::Change { id, reply } => {
                let _ = reply.send(self.change(id));
            }
            Request::Save { reply } => self.save(reply),
            Request::Modify { id, edit, reply } => match self.open.get_mut(id) {
                Some(doc) => {
                    edit(Arc::make_mut(doc));
                    let _ = reply.send(true);
                }
                None => {
                    let _ = reply.send(false);
                }
            },
            Request::Read { query } => query(&self.open.docs),
            Request::OpenedMaps { reply } => {
                let _ = reply.send(self.open.infos());
            }
            Request::DiscoverableMaps { reply } => {
                let _ = reply.send(self.discoverable.clone());
            }
            Request::CatalogChanged { catalog } => self.catalog_changed(catalog),
            Request::Reset { reply } => {
                self.reset();
                let _ = reply.send(());
            }
        }
    }

    fn on_internal(&mut self, done: Internal) {
        match done {
            Internal::Loaded {
                id,
                epoch,
                result,
                reply,
            } => self.loaded(id, epoch, result, reply),
            Internal::SaveFinished {
                id,
                rev,
                result,
                reply,
            } => self.save_finished(id, rev, result, reply),
            Internal::Discovered { generation, maps } => {
                if generation == self.discovery_generation {
                    info!(count = maps.len(), "discoverable maps updated");
                    self.discoverable = maps.clone();
                    self.emit(HolderEvent::DiscoverableMaps(maps));
                }
            }
        }
    }

    fn emit(&self, event: HolderEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn emit_active(&self) {
        let active = self
            .active
            .and_then(|id| self.open.get(id))
            .map(|doc| MapInfo::of(doc));
        self.emit(HolderEvent::ActiveChanged(active));
    }

    fn discard_backup(&self, id: MapId) {
        if let Err(err) = self.backups.discard(id) {
            warn!(map = %id, error = %err, "failed to discard backup");
        }
    }

    fn open(&mut self, path: PathBuf, reply: oneshot::Sender<Result<OpenOutcome, HolderError>>) {
        let path = absolute(path);
        let id = MapId::from_path(&path);

        if self.active == Some(id) {
            let _ = reply.send(Ok(OpenOutcome::AlreadyActive));
            return;
        }
        if let Some(doc) = self.open.get(id) {
            let info = MapInfo::of(doc);
            self.active = Some(id);
            self.emit_active();
            let _ = reply.send(Ok(OpenOutcome::Reselected(info)));
            return;
        }
        if self.loading.contains(&id) {
            let _ = reply.send(Ok(OpenOutcome::AlreadyLoading));
            return;
        }
        if !path.is_file() {
            debug!(path = %path.display(), "open ignored: not a regular file");
            let _ = reply.send(Ok(OpenOutcome::NotAFile));
            return;
        }

        self.loading.insert(id);
        info!(map = %id, path = %path.display(), "loading map");

        let epoch = self.epoch;
        let backups = self.backups.clone();
        let mut catalog = self.catalog.subscribe();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            // Loads wait until a catalog is installed.
            let catalog = catalog
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|current| current.clone());
            let result = match catalog {
                Some(catalog) => tokio::task::spawn_blocking(move || {
                    load_and_snapshot(id, &path, &catalog, &backups)
                })
                .await
                .unwrap_or(Err(HolderError::Stopped)),
                None => Err(HolderError::Stopped),
            };
            let _ = internal.send(Internal::Loaded {
                id,
                epoch,
                result,
                reply,
            });
        });
    }

    fn loaded(
        &mut self,
        id: MapId,
        epoch: u64,
        result: Result<MapDocument, HolderError>,
        reply: oneshot::Sender<Result<OpenOutcome, HolderError>>,
    ) {
        if epoch != self.epoch {
            if result.is_ok() && !self.open.contains(id) && !self.loading.contains(&id) {
                self.discard_backup(id);
            }
            debug!(map = %id, "load finished after reset; discarded");
            let _ = reply.send(Ok(OpenOutcome::Discarded));
            return;
        }
        self.loading.remove(&id);

        match result {
            Ok(doc) => {
                let info = MapInfo::of(&doc);
                info!(map = %id, size = %info.size, "map opened");
                self.open.push(Arc::new(doc));
                self.active = Some(id);
                self.emit_active();
                self.emit(HolderEvent::OpenedMaps(self.open.infos()));
                let _ = reply.send(Ok(OpenOutcome::Opened(info)));
            }
            Err(err) => {
                warn!(map = %id, error = %err, "failed to open map");
                let _ = reply.send(Err(err));
            }
        }
    }

    fn close(&mut self, id: MapId) -> CloseOutcome {
        let Some((doc, successor)) = self.open.remove(id) else {
            debug!(map = %id, "close ignored: map is not open");
            return CloseOutcome::NotOpen;
        };
        self.discard_backup(id);
        info!(map = %id, "map closed");
        self.emit(HolderEvent::Closed(doc));

        if self.active == Some(id) {
            self.active = successor;
            self.emit_active();
        }
        self.emit(HolderEvent::OpenedMaps(self.open.infos()));
        CloseOutcome::Closed
    }

    fn change(&mut self, id: MapId) -> bool {
        if self.active == Some(id) || !self.open.contains(id) {
            return false;
        }
        self.active = Some(id);
        self.emit_active();
        true
    }

    fn save(&mut self, reply: oneshot::Sender<Result<SaveOutcome, HolderError>>) {
        let Some(doc) = self.active.and_then(|id| self.open.get(id)).cloned() else {
            let _ = reply.send(Ok(SaveOutcome::NoActiveMap));
            return;
        };
        let id = doc.id();
        if self.saving.contains_key(&id) {
            let _ = reply.send(Err(HolderError::SaveInProgress { id }));
            return;
        }
        if !self.backups.contains(id) {
            let _ = reply.send(Err(HolderError::MissingBaseline { id }));
            return;
        }

        self.saving.insert(
            id,
            SaveSlot {
                epoch: self.epoch,
                deferred_closes: Vec::new(),
            },
        );
        let rev = doc.rev();
        let backups = self.backups.clone();
        let (format, durability) = (self.save_format, self.durability);
        let internal = self.internal_tx.clone();
        debug!(map = %id, rev, "saving map");

        tokio::task::spawn_blocking(move || {
            let result = encode_and_write(&doc, &backups, format, durability);
            drop(doc);
            let _ = internal.send(Internal::SaveFinished {
                id,
                rev,
                result,
                reply,
            });
        });
    }

    fn save_finished(
        &mut self,
        id: MapId,
        rev: u64,
        result: Result<PathBuf, HolderError>,
        reply: oneshot::Sender<Result<SaveOutcome, HolderError>>,
    ) {
        let Some(slot) = self.saving.remove(&id) else {
            return;
        };

        if slot.epoch != self.epoch {
            // Reset while saving: the backup outlived its map.
            if !self.open.contains(id) && !self.loading.contains(&id) {
                self.discard_backup(id);
            }
        } else if result.is_ok() {
            if let Some(doc) = self.open.get_mut(id) {
                Arc::make_mut(doc).mark_saved(rev);
            }
        }

        let outcome = match result {
            Ok(path) => {
                info!(map = %id, rev, path = %path.display(), "map saved");
                Ok(SaveOutcome::Saved { id, path, rev })
            }
            Err(err) => {
                warn!(map = %id, error = %err, "save failed");
                Err(err)
            }
        };
        let _ = reply.send(outcome);

        for close in slot.deferred_closes {
            let _ = close.send(self.close(id));
        }
    }

    fn catalog_changed(&mut self, catalog: SharedCatalog) {
        let root = catalog.root_path().to_path_buf();
        self.catalog.send_replace(Some(catalog));
        self.discovery_generation += 1;
        info!(root = %root.display(), "catalog changed; rescanning maps");

        let generation = self.discovery_generation;
        let extension = self.extension.clone();
        let internal = self.internal_tx.clone();
        tokio::task::spawn_blocking(move || {
            let maps = Arc::from(discover_maps(&root, &extension));
            let _ = internal.send(Internal::Discovered { generation, maps });
        });
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.discovery_generation += 1;
        self.loading.clear();
        self.catalog.send_replace(None);

        let closed = self.open.clear();
        for doc in &closed {
            // Maps still saving keep their baseline until the save finishes.
            if !self.saving.contains_key(&doc.id()) {
                self.discard_backup(doc.id());
            }
        }
        let had_active = self.active.take().is_some();
        self.discoverable = Arc::from(Vec::new());
        info!(closed = closed.len(), "map holder reset");

        if had_active {
            self.emit(HolderEvent::ActiveChanged(None));
        }
        self.emit(HolderEvent::OpenedMaps(Vec::new()));
        self.emit(HolderEvent::DiscoverableMaps(self.discoverable.clone()));
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

/// Reads, parses, then snapshots. Nothing is recorded unless the parse succeeds.
fn load_and_snapshot(
    id: MapId,
    path: &Path,
    catalog: &SharedCatalog,
    backups: &BackupStore,
) -> Result<MapDocument, HolderError> {
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = load_map(path, &bytes, catalog.as_ref()).map_err(|source| {
        HolderError::Malformed {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug_assert_eq!(doc.id(), id);
    backups.snapshot(id, &bytes)?;
    Ok(doc)
}

fn encode_and_write(
    doc: &MapDocument,
    backups: &BackupStore,
    format: SaveFormat,
    durability: WriteDurability,
) -> Result<PathBuf, HolderError> {
    let id = doc.id();
    let baseline = backups.read_baseline(id)?;
    let bytes = save_map(doc, &baseline, format)
        .map_err(|source| HolderError::Encode { id, source })?;
    write_atomic(doc.source_path(), &bytes, durability)?;
    Ok(doc.source_path().to_path_buf())
}
