use super::{DisplayNode, LayoutStatus, RenderEngine, Surface};
use crate::error::RenderError;

/// A live rendering: the drawn surface plus the data it was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderHandle {
    pub surface: Surface,
    pub root: DisplayNode,
}

/// Where a tree is drawn. Holds at most one live handle and the inline notice shown
/// in place of the drawing when rendering fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub width: f32,
    pub height: f32,
    pub handle: Option<RenderHandle>,
    pub notice: Option<String>,
}

impl Container {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            handle: None,
            notice: None,
        }
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.handle.as_ref().map(|h| &h.surface)
    }

    pub fn surface_mut(&mut self) -> Option<&mut Surface> {
        self.handle.as_mut().map(|h| &mut h.surface)
    }
}

/// Error boundary around a [`RenderEngine`]: engine failures become a notice on the
/// container instead of propagating.
pub struct VisualizationAdapter<E: RenderEngine> {
    engine: E,
}

impl<E: RenderEngine> VisualizationAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Draw `forest` into `container`, replacing any previous handle. Returns whether a
    /// surface is now live.
    pub fn attach(
        &mut self,
        container: &mut Container,
        forest: &[DisplayNode],
        title: Option<&str>,
    ) -> bool {
        container.handle = None;
        container.notice = None;
        let result = match DisplayNode::root_of(forest, title) {
            None => Err(RenderError::EmptyForest),
            Some(root) => self
                .engine
                .create(&root, container.width, container.height)
                .map(|mut surface| {
                    self.engine.fit(&mut surface);
                    RenderHandle { surface, root }
                }),
        };
        self.settle(container, result.map(Some))
    }

    /// Incremental redraw when a handle exists, otherwise a fresh attach.
    pub fn update(
        &mut self,
        container: &mut Container,
        forest: &[DisplayNode],
        title: Option<&str>,
    ) -> bool {
        let Some(mut handle) = container.handle.take() else {
            return self.attach(container, forest, title);
        };
        let result = match DisplayNode::root_of(forest, title) {
            None => Err(RenderError::EmptyForest),
            Some(root) => self.engine.set_data(&mut handle.surface, &root).map(|()| {
                handle.root = root;
                Some(handle)
            }),
        };
        self.settle(container, result)
    }

    /// Flip the collapse state of the node at `path` and redraw incrementally. Leaves
    /// and unknown paths are ignored.
    pub fn toggle(&mut self, container: &mut Container, path: &[usize]) -> bool {
        let Some(mut handle) = container.handle.take() else {
            return false;
        };
        let has_children = handle
            .root
            .get(path)
            .is_some_and(|node| !node.children.is_empty());
        if !has_children {
            container.handle = Some(handle);
            return false;
        }
        if !handle.surface.collapsed.remove(path) {
            handle.surface.collapsed.insert(path.to_vec());
        }
        let root = handle.root.clone();
        let result = self
            .engine
            .set_data(&mut handle.surface, &root)
            .map(|()| Some(handle));
        self.settle(container, result)
    }

    pub fn detach(&mut self, container: &mut Container) -> Option<RenderHandle> {
        container.notice = None;
        container.handle.take()
    }

    pub fn layout_status(&self, container: &Container) -> Option<LayoutStatus> {
        container
            .surface()
            .map(|surface| self.engine.layout_status(surface))
    }

    pub fn fit(&mut self, container: &mut Container) {
        if let Some(surface) = container.surface_mut() {
            self.engine.fit(surface);
        }
    }

    fn settle(
        &mut self,
        container: &mut Container,
        result: Result<Option<RenderHandle>, RenderError>,
    ) -> bool {
        match result {
            Ok(handle) => {
                container.notice = None;
                container.handle = handle;
                container.handle.is_some()
            }
            Err(err) => {
                log::warn!("render failed: {err}");
                container.notice = Some(err.to_string());
                container.handle = None;
                false
            }
        }
    }
}
