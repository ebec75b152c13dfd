//! One visualization surface: its trees, their timers and the shared cache.
//!
//! Nothing here runs on its own. Callers push work in (`add_tree_*`, `request_render`,
//! `pan`, …) and drive virtual time with [`TreeWorkspace::advance`] or
//! [`TreeWorkspace::run_until_idle`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::cache::{CachedTree, TreeCache};
use crate::config::Settings;
use crate::error::{Error, ExportError, Result};
use crate::export::{
    self, ConvertFormat, GraphConverter, LocalConverter, NewickOptions, RasterImage,
    RasterOptions, TreeGraph, TreeMeta,
};
use crate::minimap::MiniMap;
use crate::outline::parse_outline;
use crate::render::{
    Container, DisplayNode, LayoutStatus, RenderEngine, Surface, VisualizationAdapter,
    apply_colors, svg,
};
use crate::scheduler::{Fire, RenderScheduler, RenderState};
use crate::taxonomy::{TaxonId, TaxonRow, build_forest};
use crate::theme::Theme;
use crate::timeline::{TimerId, Timeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u64);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeSource {
    Rows {
        rows: Vec<TaxonRow>,
        base_id: Option<TaxonId>,
    },
    Outline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub id: TreeId,
    pub meta: TreeMeta,
    pub source: TreeSource,
    /// Annotated outline the labels were decoded from.
    pub outline: String,
    pub labels: Vec<DisplayNode>,
    /// Ids cut off by a forced base root.
    pub unreachable: Vec<TaxonId>,
    pub container: Container,
    pub minimap: Option<MiniMap>,
    pub visible: bool,
    pub render_count: u64,
}

impl Tree {
    pub fn cache_key(&self) -> String {
        export::file_stem(&self.meta)
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.container.surface()
    }

    pub fn notice(&self) -> Option<&str> {
        self.container.notice.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Render(TreeId),
    Release(TreeId),
    ColorPass(TreeId),
    PollLayout { id: TreeId, attempt: u32 },
    MiniMapSync(TreeId),
}

pub struct TreeWorkspace<E: RenderEngine> {
    trees: BTreeMap<TreeId, Tree>,
    next_id: u64,
    timeline: Timeline<Task>,
    scheduler: RenderScheduler<TreeId>,
    adapter: VisualizationAdapter<E>,
    minimap_timers: HashMap<TreeId, TimerId>,
    settings: Settings,
    theme: Theme,
    cache: Option<TreeCache>,
    active: Option<TreeId>,
}

impl<E: RenderEngine> TreeWorkspace<E> {
    pub fn new(engine: E, settings: Settings, theme: Theme) -> Self {
        Self {
            trees: BTreeMap::new(),
            next_id: 1,
            timeline: Timeline::new(),
            scheduler: RenderScheduler::new(&settings.scheduler),
            adapter: VisualizationAdapter::new(engine),
            minimap_timers: HashMap::new(),
            settings,
            theme,
            cache: None,
            active: None,
        }
    }

    /// Share `cache` with this workspace; built trees are stored in it and closing a
    /// tree evicts its entry.
    pub fn with_cache(mut self, cache: TreeCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Only affects serialisation; drawn surfaces are theme-independent.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn now(&self) -> u64 {
        self.timeline.now()
    }

    pub fn active(&self) -> Option<TreeId> {
        self.active
    }

    pub fn tree(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(&id)
    }

    pub fn tree_ids(&self) -> Vec<TreeId> {
        self.trees.keys().copied().collect()
    }

    pub fn render_state(&self, id: TreeId) -> RenderState {
        self.scheduler.state(id)
    }

    /// Build a tree from taxon rows, make it the active tab and request its first render.
    pub fn add_tree_from_rows(
        &mut self,
        rows: Vec<TaxonRow>,
        base_id: Option<TaxonId>,
        meta: TreeMeta,
    ) -> Result<TreeId> {
        self.add_tree(TreeSource::Rows { rows, base_id }, meta)
    }

    pub fn add_tree_from_outline(&mut self, outline: &str, meta: TreeMeta) -> Result<TreeId> {
        self.add_tree(TreeSource::Outline(outline.to_string()), meta)
    }

    /// Reopen a tree stored in the shared cache.
    pub fn restore(&mut self, key: &str) -> Result<Option<TreeId>> {
        let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(key)) else {
            return Ok(None);
        };
        self.add_tree(TreeSource::Outline(cached.outline), cached.meta)
            .map(Some)
    }

    fn add_tree(&mut self, source: TreeSource, meta: TreeMeta) -> Result<TreeId> {
        let id = TreeId(self.next_id);
        self.next_id += 1;

        let render = &self.settings.render;
        let mut tree = Tree {
            id,
            meta,
            source,
            outline: String::new(),
            labels: Vec::new(),
            unreachable: Vec::new(),
            container: Container::new(render.client_width, render.client_height),
            minimap: None,
            visible: false,
            render_count: 0,
        };
        rebuild(&mut tree);
        log::debug!("{id}: built {} top-level node(s)", tree.labels.len());

        if let Some(cache) = &self.cache {
            cache.put(
                tree.cache_key(),
                CachedTree {
                    meta: tree.meta.clone(),
                    outline: tree.outline.clone(),
                },
            );
        }
        self.trees.insert(id, tree);
        self.activate(id)?;
        Ok(id)
    }

    /// Swap a tree's input and redraw it in place.
    pub fn replace_source(&mut self, id: TreeId, source: TreeSource) -> Result<()> {
        let tree = self.trees.get_mut(&id).ok_or(Error::UnknownTree(id))?;
        tree.source = source;
        rebuild(tree);
        self.request_render(id, None)?;
        Ok(())
    }

    /// Show `id` and hide every other tree. Only the shown tree is asked to render, and
    /// only when it has not been drawn yet.
    pub fn activate(&mut self, id: TreeId) -> Result<()> {
        if !self.trees.contains_key(&id) {
            return Err(Error::UnknownTree(id));
        }
        for (tree_id, tree) in &mut self.trees {
            tree.visible = *tree_id == id;
        }
        self.active = Some(id);
        let drawn = self.trees[&id].container.handle.is_some();
        if !drawn {
            self.request_render(id, None)?;
        }
        Ok(())
    }

    /// Debounced render request. Hidden trees are ignored and `Ok(None)` is returned.
    pub fn request_render(&mut self, id: TreeId, delay_ms: Option<u64>) -> Result<Option<TimerId>> {
        let tree = self.trees.get(&id).ok_or(Error::UnknownTree(id))?;
        if !tree.visible {
            log::debug!("{id}: render request ignored (hidden)");
            return Ok(None);
        }
        Ok(Some(self.scheduler.request(
            &mut self.timeline,
            id,
            delay_ms,
            Task::Render(id),
        )))
    }

    /// Expand or collapse the node at `path`, followed by a best-effort color pass.
    pub fn toggle_node(&mut self, id: TreeId, path: &[usize]) -> Result<bool> {
        let tree = self.trees.get_mut(&id).ok_or(Error::UnknownTree(id))?;
        let toggled = self.adapter.toggle(&mut tree.container, path);
        if toggled {
            self.timeline
                .schedule(self.settings.scheduler.color_frame_ms, Task::ColorPass(id));
        }
        Ok(toggled)
    }

    pub fn pan(&mut self, id: TreeId, dx: f32, dy: f32) -> Result<()> {
        self.with_surface(id, |surface| surface.pan(dx, dy))
    }

    pub fn zoom(&mut self, id: TreeId, factor: f32, cx: f32, cy: f32) -> Result<()> {
        self.with_surface(id, |surface| surface.zoom(factor, cx, cy))
    }

    pub fn resize(&mut self, id: TreeId, width: f32, height: f32) -> Result<()> {
        let tree = self.trees.get_mut(&id).ok_or(Error::UnknownTree(id))?;
        tree.container.width = width.max(0.0);
        tree.container.height = height.max(0.0);
        self.with_surface(id, |surface| surface.resize(width, height))
    }

    /// Re-fit the drawing into its container.
    pub fn fit(&mut self, id: TreeId) -> Result<()> {
        let tree = self.trees.get_mut(&id).ok_or(Error::UnknownTree(id))?;
        self.adapter.fit(&mut tree.container);
        self.schedule_minimap_sync(id);
        Ok(())
    }

    fn with_surface(&mut self, id: TreeId, f: impl FnOnce(&mut Surface)) -> Result<()> {
        let tree = self.trees.get_mut(&id).ok_or(Error::UnknownTree(id))?;
        if let Some(surface) = tree.container.surface_mut() {
            f(surface);
            self.schedule_minimap_sync(id);
        }
        Ok(())
    }

    fn schedule_minimap_sync(&mut self, id: TreeId) {
        if let Some(previous) = self.minimap_timers.remove(&id) {
            self.timeline.cancel(previous);
        }
        let timer = self
            .timeline
            .schedule(self.settings.scheduler.minimap_debounce_ms, Task::MiniMapSync(id));
        self.minimap_timers.insert(id, timer);
    }

    /// Drop the tree with its handle, mini-map, timers and cache entry.
    pub fn close(&mut self, id: TreeId) -> Result<Tree> {
        let mut tree = self.trees.remove(&id).ok_or(Error::UnknownTree(id))?;
        self.scheduler.forget(&mut self.timeline, id);
        if let Some(timer) = self.minimap_timers.remove(&id) {
            self.timeline.cancel(timer);
        }
        self.adapter.detach(&mut tree.container);
        tree.minimap = None;
        if let Some(cache) = &self.cache {
            cache.evict(&tree.cache_key());
        }
        log::debug!("{id}: closed");

        if self.active == Some(id) {
            self.active = None;
            if let Some(next) = self.trees.keys().next().copied() {
                self.activate(next)?;
            }
        }
        Ok(tree)
    }

    /// Close every tree and empty the shared cache.
    pub fn clear_all(&mut self) {
        for id in self.tree_ids() {
            if let Some(mut tree) = self.trees.remove(&id) {
                self.scheduler.forget(&mut self.timeline, id);
                self.adapter.detach(&mut tree.container);
            }
        }
        self.minimap_timers.clear();
        self.timeline.clear();
        self.active = None;
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Run every task due within the next `ms` milliseconds.
    pub fn advance(&mut self, ms: u64) {
        let until = self.timeline.now().saturating_add(ms);
        while let Some((timer, task)) = self.timeline.pop_due(until) {
            self.dispatch(timer, task);
        }
        self.timeline.advance_to(until);
    }

    /// Run until no timers are left. Returns the virtual time reached.
    pub fn run_until_idle(&mut self) -> u64 {
        while let Some(at) = self.timeline.next_deadline() {
            if let Some((timer, task)) = self.timeline.pop_due(at) {
                self.dispatch(timer, task);
            }
        }
        self.timeline.now()
    }

    fn dispatch(&mut self, timer: TimerId, task: Task) {
        match task {
            Task::Render(id) => {
                if self.scheduler.fire(id, timer) == Fire::Run {
                    self.render(id);
                    self.scheduler.finish(&mut self.timeline, Task::Release(id));
                }
            }
            Task::Release(id) => self.scheduler.release(id),
            Task::ColorPass(id) => self.color_pass(id),
            Task::PollLayout { id, attempt } => self.poll_layout(id, attempt),
            Task::MiniMapSync(id) => {
                self.minimap_timers.remove(&id);
                self.sync_minimap(id);
            }
        }
    }

    fn render(&mut self, id: TreeId) {
        let Some(tree) = self.trees.get_mut(&id) else {
            return;
        };
        if !tree.visible {
            log::debug!("{id}: render skipped (hidden)");
            return;
        }
        let title = tree.meta.root_label();
        tree.render_count += 1;
        if !self
            .adapter
            .update(&mut tree.container, &tree.labels, title.as_deref())
        {
            tree.minimap = None;
            return;
        }

        let scheduler = &self.settings.scheduler;
        match self.adapter.layout_status(&tree.container) {
            Some(LayoutStatus::Settled) => {
                self.timeline
                    .schedule(scheduler.color_frame_ms, Task::ColorPass(id));
            }
            Some(LayoutStatus::Pending) => {
                self.timeline.schedule(
                    scheduler.layout_poll_ms,
                    Task::PollLayout { id, attempt: 1 },
                );
            }
            None => {}
        }
    }

    fn poll_layout(&mut self, id: TreeId, attempt: u32) {
        let Some(tree) = self.trees.get(&id) else {
            return;
        };
        let scheduler = &self.settings.scheduler;
        match self.adapter.layout_status(&tree.container) {
            Some(LayoutStatus::Settled) => {
                self.timeline
                    .schedule(scheduler.color_frame_ms, Task::ColorPass(id));
            }
            Some(LayoutStatus::Pending) if attempt < scheduler.layout_poll_attempts => {
                self.timeline.schedule(
                    scheduler.layout_poll_ms,
                    Task::PollLayout {
                        id,
                        attempt: attempt + 1,
                    },
                );
            }
            Some(LayoutStatus::Pending) => {
                log::warn!("{id}: layout still pending after {attempt} checks, coloring anyway");
                self.color_pass(id);
            }
            None => {}
        }
    }

    fn color_pass(&mut self, id: TreeId) {
        let Some(surface) = self
            .trees
            .get_mut(&id)
            .and_then(|tree| tree.container.surface_mut())
        else {
            return;
        };
        apply_colors(surface);
        self.sync_minimap(id);
    }

    fn sync_minimap(&mut self, id: TreeId) {
        let Some(tree) = self.trees.get_mut(&id) else {
            return;
        };
        let Some(surface) = tree.container.surface() else {
            tree.minimap = None;
            return;
        };
        match &mut tree.minimap {
            Some(minimap) => {
                minimap.sync(surface);
            }
            None => tree.minimap = Some(MiniMap::build(surface)),
        }
    }

    fn get(&self, id: TreeId) -> Result<&Tree> {
        self.trees.get(&id).ok_or(Error::UnknownTree(id))
    }

    fn drawn(&self, id: TreeId) -> Result<(&Tree, &Surface)> {
        let tree = self.get(id)?;
        let surface = tree.surface().ok_or(ExportError::Empty)?;
        Ok((tree, surface))
    }

    pub fn file_stem(&self, id: TreeId) -> Result<String> {
        Ok(export::file_stem(&self.get(id)?.meta))
    }

    /// SVG of the main view as currently panned and zoomed.
    pub fn live_svg(&self, id: TreeId) -> Result<String> {
        let (_, surface) = self.drawn(id)?;
        Ok(svg::live_svg(surface, &self.theme))
    }

    pub fn minimap_svg(&self, id: TreeId) -> Result<Option<String>> {
        Ok(self
            .get(id)?
            .minimap
            .as_ref()
            .map(|minimap| minimap.to_svg(&self.theme)))
    }

    pub fn export_svg(&self, id: TreeId) -> Result<String> {
        let (_, surface) = self.drawn(id)?;
        Ok(export::export_svg(
            surface,
            &self.theme,
            self.settings.export.padding,
        )?)
    }

    pub fn export_raster(&self, id: TreeId, options: &RasterOptions) -> Result<RasterImage> {
        let (_, surface) = self.drawn(id)?;
        Ok(export::export_raster(surface, &self.theme, options)?)
    }

    /// Interactive HTML page; carries an SVG snapshot when the tree has been drawn.
    pub fn export_html(&self, id: TreeId) -> Result<String> {
        let tree = self.get(id)?;
        let snapshot = tree.surface().and_then(|surface| {
            svg::export_svg(surface, &self.theme, self.settings.export.padding)
                .map(|(svg, _)| svg)
        });
        Ok(export::export_interactive_document(
            &tree.outline,
            &tree.meta,
            &self.theme,
            &self.settings.export,
            snapshot.as_deref(),
        )?)
    }

    pub fn export_newick(&self, id: TreeId) -> Result<String> {
        let tree = self.get(id)?;
        let options = NewickOptions {
            include_internal_labels: self.settings.export.include_internal_labels,
            root_label: tree
                .meta
                .root_label()
                .unwrap_or_else(|| NewickOptions::default().root_label),
        };
        Ok(export::to_newick(&tree.labels, &options))
    }

    pub fn export_graph(&self, id: TreeId) -> Result<TreeGraph> {
        let tree = self.get(id)?;
        let title = tree.meta.root_label();
        Ok(TreeGraph::from_forest(&tree.labels, title.as_deref()))
    }

    pub fn export_converted(&self, id: TreeId, format: ConvertFormat) -> Result<String> {
        let graph = self.export_graph(id)?;
        let converter = LocalConverter::new(Some(self.get(id)?.meta.label()));
        Ok(converter.convert(&graph, format)?)
    }
}

fn rebuild(tree: &mut Tree) {
    match &tree.source {
        TreeSource::Rows { rows, base_id } => {
            let forest = build_forest(rows, *base_id);
            tree.outline = forest.to_outline();
            tree.unreachable = forest.unreachable;
        }
        TreeSource::Outline(text) => {
            tree.outline = text.clone();
            tree.unreachable.clear();
        }
    }
    tree.labels = parse_outline(&tree.outline)
        .iter()
        .map(DisplayNode::from_outline)
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::fonts::ApproxTextMeasure;
    use crate::render::{RenderOptions, TidyTreeEngine};

    type Engine = TidyTreeEngine<ApproxTextMeasure>;

    fn engine() -> Engine {
        TidyTreeEngine::new(ApproxTextMeasure::default(), RenderOptions::default())
    }

    fn workspace() -> TreeWorkspace<Engine> {
        TreeWorkspace::new(engine(), Settings::default(), Theme::light())
    }

    fn meta(name: &str) -> TreeMeta {
        TreeMeta {
            users: vec!["alice".into()],
            taxon_name: Some(name.into()),
            ..TreeMeta::default()
        }
    }

    const CATS: &str = "- Felidae {rank:family}\n  - Felis {rank:genus}\n    - Felis catus {rank:species}\n  - Lynx {rank:genus}";

    /// Layout that never reports completion.
    struct SlowEngine(Engine);

    impl RenderEngine for SlowEngine {
        fn create(
            &mut self,
            root: &DisplayNode,
            w: f32,
            h: f32,
        ) -> std::result::Result<Surface, RenderError> {
            self.0.create(root, w, h)
        }

        fn set_data(
            &mut self,
            surface: &mut Surface,
            root: &DisplayNode,
        ) -> std::result::Result<(), RenderError> {
            self.0.set_data(surface, root)
        }

        fn fit(&mut self, surface: &mut Surface) {
            self.0.fit(surface)
        }

        fn layout_status(&self, _surface: &Surface) -> LayoutStatus {
            LayoutStatus::Pending
        }
    }

    #[test]
    fn first_render_then_color_pass_then_release() {
        let mut ws = workspace();
        let id = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        assert_eq!(ws.render_state(id), RenderState::Scheduled);

        ws.advance(50);
        let tree = ws.tree(id).unwrap();
        assert_eq!(tree.render_count, 1);
        assert!(tree.surface().is_some());
        assert!(tree.surface().unwrap().nodes.iter().all(|n| n.stroke.is_none()));
        assert_eq!(ws.render_state(id), RenderState::Rendering);

        ws.advance(16);
        let tree = ws.tree(id).unwrap();
        assert!(tree.surface().unwrap().nodes.iter().all(|n| n.stroke.is_some()));
        assert!(tree.minimap.is_some());

        assert_eq!(ws.run_until_idle(), 170);
        assert_eq!(ws.render_state(id), RenderState::Idle);
    }

    #[test]
    fn rapid_requests_coalesce_into_one_render() {
        let mut ws = workspace();
        let id = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        ws.request_render(id, None).unwrap();
        ws.advance(20);
        ws.request_render(id, None).unwrap();
        ws.advance(20);
        ws.request_render(id, None).unwrap();
        ws.run_until_idle();
        assert_eq!(ws.tree(id).unwrap().render_count, 1);
    }

    #[test]
    fn requests_firing_during_a_render_are_dropped() {
        let mut ws = workspace();
        let id = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        ws.advance(60);
        ws.request_render(id, None).unwrap();
        ws.run_until_idle();
        assert_eq!(ws.tree(id).unwrap().render_count, 1);

        ws.request_render(id, None).unwrap();
        ws.run_until_idle();
        assert_eq!(ws.tree(id).unwrap().render_count, 2);
    }

    #[test]
    fn hidden_trees_get_no_render_requests() {
        let mut ws = workspace();
        let a = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        ws.run_until_idle();
        let b = ws.add_tree_from_outline("- Canidae", meta("Canidae")).unwrap();
        assert_eq!(ws.active(), Some(b));
        assert!(!ws.tree(a).unwrap().visible);
        assert_eq!(ws.request_render(a, None).unwrap(), None);

        ws.run_until_idle();
        assert_eq!(ws.tree(a).unwrap().render_count, 1);
        assert_eq!(ws.tree(b).unwrap().render_count, 1);

        // Already drawn, so switching back does not redraw.
        ws.activate(a).unwrap();
        ws.run_until_idle();
        assert_eq!(ws.tree(a).unwrap().render_count, 1);
    }

    #[test]
    fn pending_layout_is_polled_then_colored_anyway() {
        let mut ws = TreeWorkspace::new(SlowEngine(engine()), Settings::default(), Theme::light());
        let id = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        ws.advance(549);
        let uncolored = ws.tree(id).unwrap().surface().unwrap();
        assert!(uncolored.nodes.iter().all(|n| n.stroke.is_none()));

        assert_eq!(ws.run_until_idle(), 550);
        let colored = ws.tree(id).unwrap().surface().unwrap();
        assert!(colored.nodes.iter().all(|n| n.stroke.is_some()));
    }

    #[test]
    fn empty_tree_shows_a_notice() {
        let mut ws = workspace();
        let id = ws.add_tree_from_outline("", meta("Nothing")).unwrap();
        ws.run_until_idle();
        let tree = ws.tree(id).unwrap();
        assert!(tree.surface().is_none());
        assert_eq!(tree.notice(), Some("Nothing to render"));
        assert!(matches!(
            ws.export_svg(id),
            Err(Error::Export(ExportError::Empty))
        ));
    }

    #[test]
    fn pan_resyncs_minimap_after_debounce() {
        let mut ws = workspace();
        let id = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        ws.run_until_idle();
        let before = ws.tree(id).unwrap().minimap.as_ref().unwrap().viewport;

        ws.pan(id, 40.0, 0.0).unwrap();
        ws.advance(119);
        assert_eq!(ws.tree(id).unwrap().minimap.as_ref().unwrap().viewport, before);
        ws.advance(1);
        let tree = ws.tree(id).unwrap();
        let after = tree.minimap.as_ref().unwrap().viewport;
        let k = tree.surface().unwrap().transform.k;
        assert!((after.x - (before.x - 40.0 / k)).abs() < 1e-3);
    }

    #[test]
    fn toggle_collapses_and_recolors() {
        let mut ws = workspace();
        let id = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        ws.run_until_idle();
        let before = ws.tree(id).unwrap().surface().unwrap().nodes.len();

        assert!(ws.toggle_node(id, &[0]).unwrap());
        ws.run_until_idle();
        let surface = ws.tree(id).unwrap().surface().unwrap();
        assert_eq!(surface.nodes.len(), before - 1);
        assert!(surface.nodes.iter().all(|n| n.stroke.is_some()));
        assert!(!ws.toggle_node(id, &[0, 0]).unwrap());
    }

    #[test]
    fn close_releases_everything_and_evicts_cache() {
        let cache = TreeCache::new(8);
        let mut ws = workspace().with_cache(cache.clone());
        let id = ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        let key = ws.tree(id).unwrap().cache_key();
        assert!(cache.contains(&key));

        let closed = ws.close(id).unwrap();
        assert!(closed.container.handle.is_none());
        assert!(closed.minimap.is_none());
        assert!(!cache.contains(&key));
        assert_eq!(ws.render_state(id), RenderState::Idle);
        assert_eq!(ws.run_until_idle(), 0);
        assert!(matches!(ws.close(id), Err(Error::UnknownTree(_))));
    }

    #[test]
    fn restores_from_a_shared_cache() {
        let cache = TreeCache::default();
        let mut first = workspace().with_cache(cache.clone());
        let id = first.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        let key = first.tree(id).unwrap().cache_key();

        let mut second = workspace().with_cache(cache);
        let restored = second.restore(&key).unwrap().unwrap();
        assert_eq!(second.tree(restored).unwrap().outline, CATS);
        assert_eq!(second.restore("missing").unwrap(), None);
    }

    #[test]
    fn rows_become_a_rendered_tree_with_exports() {
        let rows = vec![
            TaxonRow::new(1, "Felidae", "family"),
            TaxonRow::new(2, "Felis", "genus").with_ancestors(&[1]),
            TaxonRow::new(3, "Felis catus", "species").with_ancestors(&[1, 2]),
        ];
        let mut ws = workspace();
        let id = ws.add_tree_from_rows(rows, Some(1), meta("Felidae")).unwrap();
        ws.run_until_idle();

        assert_eq!(
            ws.tree(id).unwrap().outline,
            "- Felidae {rank:family}\n  - Felis {rank:genus}\n    - Felis catus {rank:species}"
        );
        assert_eq!(ws.export_newick(id).unwrap(), "(('Felis catus'));");
        assert_eq!(ws.export_graph(id).unwrap().nodes.len(), 3);
        assert!(ws.export_svg(id).unwrap().starts_with("<svg"));
        assert!(ws.export_html(id).unwrap().contains("data:image/svg+xml;base64,"));
        assert!(
            ws.export_converted(id, ConvertFormat::Nhx)
                .unwrap()
                .ends_with("Felidae[&&NHX:rank=family];")
        );
        assert_eq!(ws.file_stem(id).unwrap(), "alice-Felidae");
    }

    #[test]
    fn clear_all_empties_workspace_and_cache() {
        let cache = TreeCache::default();
        let mut ws = workspace().with_cache(cache.clone());
        ws.add_tree_from_outline(CATS, meta("Felidae")).unwrap();
        ws.add_tree_from_outline("- Canidae", meta("Canidae")).unwrap();
        ws.clear_all();
        assert!(ws.tree_ids().is_empty());
        assert!(cache.is_empty());
        assert_eq!(ws.active(), None);
    }
}
