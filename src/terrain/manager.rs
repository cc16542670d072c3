use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use archterrain_files::segment::types::Segment;
use glam::{Vec2, Vec3};
use log::{debug, error, info, trace, warn};
use tokio::sync::watch;

use crate::rendering::renderer::Renderer;
use crate::settings::TerrainSettings;
use crate::terrain::draw_buffer::DrawBuffer;
use crate::terrain::loader::{LoadRequest, LoadResult};
use crate::terrain::saver::{SaveRequest, SaveResult};
use crate::terrain::sector::{Sector, SectorFlags, SectorGrid};
use crate::terrain::tasks::{Completion, Operation, TaskContext};
use crate::terrain::world::{SECTOR_WIDTH, SectorIndex, compute_visible};
use crate::util::task_pool::TaskPool;
use crate::util::xz;

/// Delay between an edit that changes the material layout and the draw buffer rebuild, coalescing bursts of edits.
pub const DRAW_BUFFER_UPDATE_DELAY: Duration = Duration::from_millis(50);
/// Load scratch buffers kept around for reuse.
const MAX_POOLED_SCRATCH: usize = 16;

/// `Idle -> LoadSector -> PreDrawBuffer -> DrawBuffer -> Flush -> Idle`. Edits and syncs only happen in `Idle`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    /// Sector loads are in flight.
    LoadSector,
    /// The sector list for the next draw buffer is about to be snapshotted.
    PreDrawBuffer,
    /// A draw buffer is being built on a worker.
    DrawBuffer,
    /// The new draw buffer is ready to replace the live one.
    Flush,
}

/// Published after every draw buffer swap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostLoadSectors {
    pub sync_pos: Vec2,
    pub view_distance: f32,
    /// Visible sectors with detail geometry.
    pub sectors: Vec<SectorIndex>,
}

/// Published when segment painting changed at least one segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentModification {
    /// Visible sectors with both detail geometry and segments.
    pub sectors: Vec<SectorIndex>,
}

pub struct TerrainManager {
    pub(super) context: Arc<TaskContext>,
    tasks: TaskPool<Completion>,
    pub(super) grid: SectorGrid,
    pub(super) state: TaskState,
    view_distance: f32,
    last_sync_pos: Option<Vec2>,
    /// The view distance the visible set was last computed with.
    synced_view_distance: f32,
    /// Sorted by [`SectorIndex::load_order`].
    pub(super) visible_sectors: Vec<SectorIndex>,
    pending_unload: Vec<SectorIndex>,
    ongoing_load_count: usize,
    /// The buffer `render` draws from.
    pub(super) draw_buffer: DrawBuffer,
    constructed_draw_buffer: Option<DrawBuffer>,
    pub(super) update_draw_buffer_in: Option<Duration>,
    scratch_pool: Vec<Vec<u8>>,
    save_task_count: usize,
    completed_save_task_count: usize,
    post_load_sectors: watch::Sender<PostLoadSectors>,
    segment_modification: watch::Sender<SegmentModification>,
    is_shut_down: bool,
}

impl TerrainManager {
    pub fn new(settings: &TerrainSettings, renderer: Arc<dyn Renderer>) -> Result<Self, Error> {
        let context = Arc::new(TaskContext {
            client_dir: settings.client_dir.clone(),
            renderer,
        });

        Ok(TerrainManager {
            context,
            tasks: TaskPool::new(settings.worker_threads)?,
            grid: SectorGrid::new(),
            state: TaskState::Idle,
            view_distance: settings.view_distance,
            last_sync_pos: None,
            synced_view_distance: settings.view_distance,
            visible_sectors: Vec::new(),
            pending_unload: Vec::new(),
            ongoing_load_count: 0,
            draw_buffer: DrawBuffer::default(),
            constructed_draw_buffer: None,
            update_draw_buffer_in: None,
            scratch_pool: Vec::new(),
            save_task_count: 0,
            completed_save_task_count: 0,
            post_load_sectors: watch::Sender::new(PostLoadSectors::default()),
            segment_modification: watch::Sender::new(SegmentModification::default()),
            is_shut_down: false,
        })
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.context.renderer.as_ref()
    }

    pub fn view_distance(&self) -> f32 {
        self.view_distance
    }

    /// Takes effect with the next sync, whether or not the viewer moved since the last one.
    pub fn set_view_distance(&mut self, view_distance: f32) {
        self.view_distance = view_distance;
    }

    pub fn visible_sectors(&self) -> &[SectorIndex] {
        &self.visible_sectors
    }

    pub fn is_visible(&self, index: SectorIndex) -> bool {
        self.visible_sectors
            .binary_search_by(|probe| probe.load_order(&index))
            .is_ok()
    }

    pub fn draw_buffer(&self) -> &DrawBuffer {
        &self.draw_buffer
    }

    pub fn get_sector(&self, x: u32, z: u32) -> Option<&Sector> {
        self.grid.get(SectorIndex { x, z })
    }

    pub fn get_sector_at(&self, pos: Vec3) -> Option<&Sector> {
        self.grid.get_at(pos)
    }

    /// The segment under `pos`, or a default one where no segments are loaded.
    pub fn get_segment(&self, pos: Vec3) -> Segment {
        self.grid
            .get_at(pos)
            .and_then(|sector| sector.segment_at(pos))
            .copied()
            .unwrap_or_default()
    }

    pub fn subscribe_sectors(&self) -> watch::Receiver<PostLoadSectors> {
        self.post_load_sectors.subscribe()
    }

    pub fn subscribe_segments(&self) -> watch::Receiver<SegmentModification> {
        self.segment_modification.subscribe()
    }

    /// Whether a commit's save tasks are still outstanding.
    pub fn is_committing(&self) -> bool {
        self.save_task_count != 0
    }

    fn spawn(&mut self, operation: Operation) {
        let context = self.context.clone();
        self.tasks.spawn(move || operation.execute(&context));
    }

    /// Updates the visible sector set for a viewer at `pos`, unloading what left the view and loading what entered it.
    /// Without `force`, nothing happens until the viewer moved at least a sector width since the last sync.
    pub fn sync(&mut self, pos: Vec3, force: bool) {
        if self.state != TaskState::Idle {
            trace!("Skipping sync while {:?}", self.state);
            return;
        }
        let sync_pos = xz(pos);
        if !force
            && self.synced_view_distance == self.view_distance
            && self
                .last_sync_pos
                .is_some_and(|last| last.distance(sync_pos) < SECTOR_WIDTH)
        {
            return;
        }

        let previous = std::mem::replace(&mut self.visible_sectors, compute_visible(pos, self.view_distance));
        for index in previous {
            if self.is_visible(index) || self.pending_unload.contains(&index) {
                continue;
            }
            if let Some(sector) = self.grid.get(index)
                && sector.is_detail_loaded()
                && !sector.has_changes()
            {
                self.pending_unload.push(index);
            }
        }

        let to_load = self
            .visible_sectors
            .iter()
            .copied()
            .filter(|&index| self.grid.get(index).is_some_and(|s| !s.is_detail_loaded()))
            .collect::<Vec<_>>();
        debug!(
            "Sync at {}: {} visible, {} to load, {} to unload",
            pos,
            self.visible_sectors.len(),
            to_load.len(),
            self.pending_unload.len()
        );
        for index in to_load {
            self.create_load_task(index);
        }

        self.last_sync_pos = Some(sync_pos);
        self.synced_view_distance = self.view_distance;
        if self.ongoing_load_count == 0 {
            self.state = TaskState::PreDrawBuffer;
        }
    }

    fn create_load_task(&mut self, index: SectorIndex) {
        let scratch = self.scratch_pool.pop().unwrap_or_default();
        self.ongoing_load_count += 1;
        self.state = TaskState::LoadSector;
        self.spawn(Operation::LoadSector(LoadRequest { index, scratch }));
    }

    /// Applies finished tasks and advances the state machine. Never blocks.
    pub fn update(&mut self, dt: Duration) {
        while let Some(completion) = self.tasks.try_recv() {
            self.apply(completion);
        }

        if let Some(remaining) = self.update_draw_buffer_in {
            let remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() && self.state == TaskState::Idle {
                self.update_draw_buffer_in = None;
                self.state = TaskState::PreDrawBuffer;
            } else {
                self.update_draw_buffer_in = Some(remaining);
            }
        }

        self.advance();
    }

    /// Blocks until every outstanding task, including the ones their results trigger, has been applied.
    pub fn flush_tasks(&mut self) {
        self.advance();
        while let Some(completion) = self.tasks.recv_blocking() {
            self.apply(completion);
            self.advance();
        }
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::SectorLoaded(result) => self.on_sector_loaded(result),
            Completion::SectorSaved(result) => self.on_sector_saved(result),
            Completion::DrawBufferBuilt(draw_buffer) => {
                if let Some(mut stale) = self.constructed_draw_buffer.replace(draw_buffer) {
                    stale.release(self.context.renderer.as_ref());
                }
                self.state = TaskState::Flush;
            }
        }
    }

    /// A panicked task never reports back. Once nothing is outstanding, stop waiting for it.
    fn recover_lost_tasks(&mut self) {
        if self.tasks.outstanding() != 0 {
            return;
        }
        if self.ongoing_load_count != 0 {
            warn!("{} sector loads were lost", self.ongoing_load_count);
            self.ongoing_load_count = 0;
        }
        match self.state {
            TaskState::LoadSector => self.state = TaskState::PreDrawBuffer,
            TaskState::DrawBuffer => {
                warn!("The draw buffer build was lost, keeping the current one");
                self.state = TaskState::Idle;
            }
            _ => {}
        }
        if self.save_task_count != 0 {
            warn!(
                "Only {} of {} save tasks reported back",
                self.completed_save_task_count, self.save_task_count
            );
            self.save_task_count = 0;
            self.completed_save_task_count = 0;
        }
    }

    fn advance(&mut self) {
        self.recover_lost_tasks();
        loop {
            match self.state {
                TaskState::Idle | TaskState::LoadSector | TaskState::DrawBuffer => return,
                TaskState::PreDrawBuffer => {
                    let sectors = self
                        .visible_sectors
                        .iter()
                        .filter_map(|&index| {
                            let geometry = self.grid.get(index)?.loaded_geometry()?;
                            Some((index, geometry.clone()))
                        })
                        .collect::<Vec<_>>();
                    trace!("Building a draw buffer of {} sectors", sectors.len());
                    self.state = TaskState::DrawBuffer;
                    self.spawn(Operation::BuildDrawBuffer(sectors));
                }
                TaskState::Flush => {
                    self.flush();
                    self.state = TaskState::Idle;
                }
            }
        }
    }

    fn on_sector_loaded(&mut self, result: LoadResult) {
        let LoadResult {
            index,
            segment_info,
            geometry,
            mut scratch,
        } = result;
        self.ongoing_load_count = self.ongoing_load_count.saturating_sub(1);
        if self.scratch_pool.len() < MAX_POOLED_SCRATCH {
            scratch.clear();
            self.scratch_pool.push(scratch);
        }

        let visible = self.is_visible(index);
        if let Some(sector) = self.grid.get_mut(index) {
            if let Some(info) = segment_info {
                if sector.flags.contains(SectorFlags::HAS_SEGMENT_CHANGES) {
                    debug!("Keeping the edited segments of sector {}", index);
                } else {
                    sector.segment_info = Some(Arc::new(info));
                }
                sector.flags |= SectorFlags::SEGMENT_LOADED;
            }

            if let Some(geometry) = geometry {
                if visible && !sector.is_detail_loaded() {
                    sector.geometry = Some(Arc::new(geometry));
                    sector.flags |= SectorFlags::DETAIL_LOADED;
                } else {
                    trace!("Sector {} left the view while loading, dropping its geometry", index);
                }
            }
        }

        if self.ongoing_load_count == 0 && self.state == TaskState::LoadSector {
            self.state = TaskState::PreDrawBuffer;
        }
    }

    fn flush(&mut self) {
        for index in std::mem::take(&mut self.pending_unload) {
            if self.is_visible(index) {
                continue;
            }
            if let Some(sector) = self.grid.get_mut(index)
                && sector.is_detail_loaded()
                && !sector.has_changes()
            {
                unload_sector(sector);
            }
        }

        if let Some(draw_buffer) = self.constructed_draw_buffer.take() {
            let mut previous = std::mem::replace(&mut self.draw_buffer, draw_buffer);
            previous.release(self.context.renderer.as_ref());
        }

        let sectors = self
            .visible_sectors
            .iter()
            .copied()
            .filter(|&index| self.grid.get(index).is_some_and(Sector::is_detail_loaded))
            .collect();
        self.post_load_sectors.send_replace(PostLoadSectors {
            sync_pos: self.last_sync_pos.unwrap_or_default(),
            view_distance: self.view_distance,
            sectors,
        });
    }

    pub(super) fn notify_segment_modification(&self) {
        let sectors = self
            .visible_sectors
            .iter()
            .copied()
            .filter(|&index| {
                self.grid.get(index).is_some_and(|s| {
                    s.flags
                        .contains(SectorFlags::DETAIL_LOADED | SectorFlags::SEGMENT_LOADED)
                })
            })
            .collect();
        self.segment_modification
            .send_replace(SegmentModification { sectors });
    }

    /// Binds the live draw buffer and issues one draw call per batch.
    pub fn render(&self) {
        self.draw_buffer.render(self.context.renderer.as_ref());
    }

    /// Writes every sector with pending changes to disk. Does nothing while the previous commit is still running.
    pub fn commit_changes(&mut self) {
        if self.save_task_count != 0 {
            debug!(
                "Commit in progress ({}/{}), ignoring",
                self.completed_save_task_count, self.save_task_count
            );
            return;
        }

        let requests = self
            .grid
            .iter()
            .filter_map(|sector| {
                let geometry = sector
                    .flags
                    .contains(SectorFlags::DETAIL_LOADED | SectorFlags::HAS_DETAIL_CHANGES)
                    .then(|| sector.geometry.clone())
                    .flatten();
                let segment_info = sector
                    .flags
                    .contains(SectorFlags::SEGMENT_LOADED | SectorFlags::HAS_SEGMENT_CHANGES)
                    .then(|| sector.segment_info.clone())
                    .flatten();
                (geometry.is_some() || segment_info.is_some()).then_some(SaveRequest {
                    index: sector.index,
                    geometry,
                    segment_info,
                })
            })
            .collect::<Vec<_>>();
        if requests.is_empty() {
            return;
        }

        info!("Committing {} sectors", requests.len());
        self.save_task_count = requests.len();
        self.completed_save_task_count = 0;
        for request in requests {
            self.spawn(Operation::SaveSector(request));
        }
    }

    /// Flags everything loaded as changed, so the next commit rewrites it in the latest formats.
    pub fn mark_loaded_sectors_changed(&mut self) -> usize {
        let mut count = 0;
        for sector in self.grid.iter_mut() {
            let before = sector.flags;
            if sector.flags.contains(SectorFlags::DETAIL_LOADED) {
                sector.flags |= SectorFlags::HAS_DETAIL_CHANGES;
            }
            if sector.flags.contains(SectorFlags::SEGMENT_LOADED) {
                sector.flags |= SectorFlags::HAS_SEGMENT_CHANGES;
            }
            if sector.flags != before {
                count += 1;
            }
        }
        count
    }

    fn on_sector_saved(&mut self, result: SaveResult) {
        self.completed_save_task_count += 1;
        let (completed, total) = (self.completed_save_task_count, self.save_task_count);

        if let Some(sector) = self.grid.get_mut(result.index) {
            if let Some(saved) = result.geometry {
                match &saved.result {
                    Ok(path) if saved.is_current(sector.geometry.as_ref()) => {
                        sector.flags.remove(SectorFlags::HAS_DETAIL_CHANGES);
                        info!("({}/{}) Saved file {}", completed, total, path.display());
                    }
                    // An edit during the save replaced the geometry, which stays dirty.
                    Ok(path) => {
                        info!("({}/{}) Saved file {}", completed, total, path.display());
                        debug!("Sector {} was edited while saving its geometry", result.index);
                    }
                    Err(e) => error!(
                        "({}/{}) Failed to save the geometry of sector {}: {:?}",
                        completed, total, result.index, e
                    ),
                }
            }
            if let Some(saved) = result.segment_info {
                match &saved.result {
                    Ok(path) if saved.is_current(sector.segment_info.as_ref()) => {
                        sector.flags.remove(SectorFlags::HAS_SEGMENT_CHANGES);
                        info!("({}/{}) Saved file {}", completed, total, path.display());
                    }
                    Ok(path) => {
                        info!("({}/{}) Saved file {}", completed, total, path.display());
                        debug!("Sector {} was edited while saving its segments", result.index);
                    }
                    Err(e) => error!(
                        "({}/{}) Failed to save the segments of sector {}: {:?}",
                        completed, total, result.index, e
                    ),
                }
            }
        }

        if completed >= total {
            self.save_task_count = 0;
            self.completed_save_task_count = 0;
        }
    }

    /// Waits for all outstanding tasks, then releases the draw buffers. Called by `Drop` as well.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.flush_tasks();

        let renderer = self.context.renderer.clone();
        self.draw_buffer.release(renderer.as_ref());
        if let Some(mut draw_buffer) = self.constructed_draw_buffer.take() {
            draw_buffer.release(renderer.as_ref());
        }
        for sector in self.grid.iter_mut().filter(|s| s.is_detail_loaded()) {
            unload_sector(sector);
        }
        self.is_shut_down = true;
    }
}

impl Drop for TerrainManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn unload_sector(sector: &mut Sector) {
    if sector.flags.contains(SectorFlags::HAS_DETAIL_CHANGES) {
        warn!("Unloading sector {} with pending detail changes", sector.index);
    }
    if sector.flags.contains(SectorFlags::HAS_SEGMENT_CHANGES) {
        warn!("Unloading sector {} with pending segment changes", sector.index);
    }
    sector.geometry = None;
    sector.flags.remove(SectorFlags::DETAIL_LOADED);
}
