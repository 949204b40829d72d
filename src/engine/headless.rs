// src/engine/headless.rs

//! In-memory rendering engine.
//!
//! Implements the full [`RenderEngine`] contract against a cell grid
//! instead of a terminal: planes are real (z-ordered, margin-aware,
//! cascading resizes), text and decorations land in cells that
//! `plane_contents` can read back, and the input queue is backed by a real
//! pipe so the readiness descriptor behaves exactly like a live engine's.
//!
//! Used by the test suite and by hosts that want to drive the bridge
//! without a terminal attached. Glyph handling is approximate (one `char`
//! per cell, no wide-character accounting) since compositing fidelity is
//! the real engine's concern, not this layer's.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::channel::{Channel, Channels};
use crate::config::ContextOptions;
use crate::keys::{MiceEvents, Style};
use crate::plane::{PerimeterKind, PlaneFlags, Rect};
use crate::visual::Blitter;

use super::{
    BlitSpec, EngineError, PixelSupport, PlaneId, PlaneSpec, RawInput, RenderEngine, ResizeSink,
    SinkFlow, VisualId,
};

type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Default)]
struct Cell {
    ch: char, // '\0' = untouched
    styles: Style,
    channels: Channels,
}

#[derive(Debug)]
struct Node {
    parent: Option<PlaneId>,
    children: Vec<PlaneId>, // bottom of the z-order first
    y: i32,
    x: i32,
    rows: u32,
    cols: u32,
    cells: Vec<Cell>,
    base: Cell,
    cursor: (u32, u32),
    styles: Style,
    channels: Channels,
    name: Option<String>,
    flags: PlaneFlags,
    margin_bottom: u32,
    margin_right: u32,
    notify_resize: bool,
    token: u64,
}

impl Node {
    fn cell_mut(&mut self, y: u32, x: u32) -> &mut Cell {
        &mut self.cells[(y * self.cols + x) as usize]
    }

    fn cell(&self, y: u32, x: u32) -> &Cell {
        &self.cells[(y * self.cols + x) as usize]
    }

    fn resize_grid(&mut self, rows: u32, cols: u32) {
        let mut cells = vec![Cell::default(); (rows * cols) as usize];
        for y in 0..rows.min(self.rows) {
            for x in 0..cols.min(self.cols) {
                cells[(y * cols + x) as usize] = self.cell(y, x).clone();
            }
        }
        self.rows = rows;
        self.cols = cols;
        self.cells = cells;
        self.cursor = (self.cursor.0.min(rows - 1), self.cursor.1.min(cols - 1));
    }
}

#[derive(Debug)]
struct Image {
    pixels: Vec<u8>,
    rows: u32,
    cols: u32,
    rowstride: u32,
}

#[derive(Debug, Default)]
struct FeedState {
    queue: VecDeque<RawInput>,
    broken: bool,
}

/// Test-side handle for injecting input into a [`HeadlessEngine`] after it
/// has been boxed into a context. Pushing an event makes the engine's
/// readiness descriptor readable, exactly as buffered terminal input would.
#[derive(Clone)]
pub struct InputFeed {
    state: Rc<RefCell<FeedState>>,
    pipe_wr: RawFd,
}

impl InputFeed {
    /// Queues one input record and signals readiness.
    pub fn push(&self, event: RawInput) {
        self.state.borrow_mut().queue.push_back(event);
        let byte = [0u8];
        if unsafe { libc::write(self.pipe_wr, byte.as_ptr().cast(), 1) } != 1 {
            warn!(
                "InputFeed: readiness signal write failed: {}",
                io::Error::last_os_error()
            );
        }
    }

    /// Marks the input source broken: the next fetch reports an error, the
    /// state a live engine enters when its readiness descriptor dies.
    pub fn break_source(&self) {
        self.state.borrow_mut().broken = true;
        let byte = [0u8];
        unsafe { libc::write(self.pipe_wr, byte.as_ptr().cast(), 1) };
    }
}

/// The in-memory engine. See the module docs.
pub struct HeadlessEngine {
    term_rows: u32,
    term_cols: u32,
    running: bool,
    nodes: HashMap<PlaneId, Node>,
    next_plane: PlaneId,
    std_id: PlaneId,
    images: HashMap<VisualId, Image>,
    next_visual: VisualId,
    feed: Rc<RefCell<FeedState>>,
    pipe_rd: RawFd,
    pipe_wr: RawFd,
    pixel_support: PixelSupport,
    mice_supported: bool,
    mice_enabled: MiceEvents,
    frames_rendered: u64,
}

impl HeadlessEngine {
    /// An engine whose virtual terminal is `rows` x `cols` cells.
    pub fn new(rows: u32, cols: u32) -> io::Result<Self> {
        assert!(rows > 0 && cols > 0, "terminal dimensions must be nonzero");
        let mut fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // the drain loop must never block on its own pipe
        if unsafe { libc::fcntl(fds[0], libc::F_SETFL, libc::O_NONBLOCK) } == -1 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fds[0]);
                libc::close(fds[1]);
            }
            return Err(err);
        }
        debug!("HeadlessEngine: readiness pipe {} -> {}", fds[1], fds[0]);
        Ok(HeadlessEngine {
            term_rows: rows,
            term_cols: cols,
            running: false,
            nodes: HashMap::new(),
            next_plane: 1,
            std_id: 0,
            images: HashMap::new(),
            next_visual: 1,
            feed: Rc::new(RefCell::new(FeedState::default())),
            pipe_rd: fds[0],
            pipe_wr: fds[1],
            pixel_support: PixelSupport::None,
            mice_supported: true,
            mice_enabled: MiceEvents::empty(),
            frames_rendered: 0,
        })
    }

    /// The injection handle paired with this engine.
    pub fn input_feed(&self) -> InputFeed {
        InputFeed {
            state: Rc::clone(&self.feed),
            pipe_wr: self.pipe_wr,
        }
    }

    /// Configures the capability probe's answer.
    pub fn set_pixel_support(&mut self, support: PixelSupport) {
        self.pixel_support = support;
    }

    /// Makes `mice_enable` fail, for terminals without mouse protocols.
    pub fn deny_mice(&mut self) {
        self.mice_supported = false;
    }

    /// Frames flushed so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Mouse event classes currently enabled.
    pub fn mice_enabled(&self) -> MiceEvents {
        self.mice_enabled
    }

    fn alloc_plane(&mut self, node: Node) -> PlaneId {
        let id = self.next_plane;
        self.next_plane += 1;
        self.nodes.insert(id, node);
        id
    }

    fn node(&self, id: PlaneId) -> EngineResult<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| EngineError::op("plane lookup", format!("unknown plane {}", id)))
    }

    fn node_mut(&mut self, id: PlaneId) -> EngineResult<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| EngineError::op("plane lookup", format!("unknown plane {}", id)))
    }

    /// `root` first, then descendants, parents before children, lowest
    /// sibling first. This is the traversal order resize notifications
    /// fire in.
    fn subtree(&self, root: PlaneId) -> Vec<PlaneId> {
        let mut order = vec![root];
        let mut i = 0;
        while i < order.len() {
            if let Some(node) = self.nodes.get(&order[i]) {
                order.extend(node.children.iter().copied());
            }
            i += 1;
        }
        order
    }

    fn detach_from_parent(&mut self, id: PlaneId) {
        let parent = self.nodes[&id].parent;
        if let Some(parent) = parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|&c| c != id);
            }
        }
    }

    /// Recomputes a marginalized plane's size from its parent. Returns
    /// whether the dimensions changed.
    fn realign(&mut self, id: PlaneId) -> bool {
        let node = &self.nodes[&id];
        if !node.flags.contains(PlaneFlags::MARGINALIZED) {
            return false;
        }
        let Some(parent) = node.parent else {
            return false;
        };
        let (prows, pcols) = {
            let p = &self.nodes[&parent];
            (p.rows, p.cols)
        };
        let top = node.y.max(0) as u32;
        let left = node.x.max(0) as u32;
        let rows = prows
            .saturating_sub(top)
            .saturating_sub(node.margin_bottom)
            .max(1);
        let cols = pcols
            .saturating_sub(left)
            .saturating_sub(node.margin_right)
            .max(1);
        if rows == node.rows && cols == node.cols {
            return false;
        }
        self.nodes.get_mut(&id).unwrap().resize_grid(rows, cols);
        true
    }

    /// Realigns every descendant of `root` (excluding `root` itself) and
    /// reports each changed, notification-subscribed plane through the
    /// sink in traversal order.
    fn cascade(&mut self, root: PlaneId, sink: ResizeSink) -> EngineResult<()> {
        let order = self.subtree(root);
        for &id in order.iter().skip(1) {
            if self.realign(id) {
                let node = &self.nodes[&id];
                if node.notify_resize && sink(id, node.token) == SinkFlow::Abort {
                    return Err(EngineError::Aborted);
                }
            }
        }
        Ok(())
    }

    fn abs_origin(&self, id: PlaneId) -> (i32, i32) {
        let mut y = 0;
        let mut x = 0;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let node = &self.nodes[&c];
            y += node.y;
            x += node.x;
            cur = node.parent;
        }
        (y, x)
    }

    fn sample(image: &Image, py: u32, px: u32) -> (u8, u8, u8) {
        let py = py.min(image.rows.saturating_sub(1));
        let px = px.min(image.cols.saturating_sub(1));
        let base = (py * image.rowstride + px * 4) as usize;
        (
            image.pixels[base],
            image.pixels[base + 1],
            image.pixels[base + 2],
        )
    }

    /// A minimal 2x1 half-block blit: each cell covers two image rows,
    /// foreground from the upper pixel and background from the lower.
    fn paint_image(node: &mut Node, image: &Image, rows: u32, cols: u32, stretch: bool) {
        for cy in 0..rows.min(node.rows) {
            for cx in 0..cols.min(node.cols) {
                let (py, px) = if stretch {
                    (
                        cy * 2 * image.rows / (rows * 2).max(1),
                        cx * image.cols / cols.max(1),
                    )
                } else {
                    (cy * 2, cx)
                };
                let (tr, tg, tb) = Self::sample(image, py, px);
                let (br, bg_, bb) = Self::sample(image, py + 1, px);
                let mut fg = Channel::DEFAULT;
                fg.set_rgb(u32::from(tr) << 16 | u32::from(tg) << 8 | u32::from(tb));
                let mut bg = Channel::DEFAULT;
                bg.set_rgb(u32::from(br) << 16 | u32::from(bg_) << 8 | u32::from(bb));
                *node.cell_mut(cy, cx) = Cell {
                    ch: '▀',
                    styles: Style::empty(),
                    channels: Channels::combine(fg, bg),
                };
            }
        }
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.pipe_rd);
            libc::close(self.pipe_wr);
        }
    }
}

impl RenderEngine for HeadlessEngine {
    fn init(&mut self, options: &ContextOptions) -> EngineResult<()> {
        if self.running {
            return Err(EngineError::op("init", "engine already initialized"));
        }
        let m = options.margins;
        let rows = self
            .term_rows
            .saturating_sub(m.top)
            .saturating_sub(m.bottom)
            .max(1);
        let cols = self
            .term_cols
            .saturating_sub(m.left)
            .saturating_sub(m.right)
            .max(1);
        let std = Node {
            parent: None,
            children: Vec::new(),
            y: m.top as i32,
            x: m.left as i32,
            rows,
            cols,
            cells: vec![Cell::default(); (rows * cols) as usize],
            base: Cell::default(),
            cursor: (0, 0),
            styles: Style::empty(),
            channels: Channels::DEFAULT,
            name: None,
            flags: PlaneFlags::empty(),
            margin_bottom: 0,
            margin_right: 0,
            notify_resize: false,
            token: 0,
        };
        self.std_id = self.alloc_plane(std);
        self.running = true;
        debug!(
            "HeadlessEngine: up, standard plane {} is {}x{}",
            self.std_id, rows, cols
        );
        Ok(())
    }

    fn stop(&mut self) -> EngineResult<()> {
        if !self.running {
            return Err(EngineError::op("stop", "engine not running"));
        }
        self.running = false;
        self.nodes.clear();
        self.images.clear();
        debug!("HeadlessEngine: stopped");
        Ok(())
    }

    fn render(&mut self) -> EngineResult<()> {
        if !self.running {
            return Err(EngineError::op("render", "engine not running"));
        }
        self.frames_rendered += 1;
        trace!("HeadlessEngine: frame {} flushed", self.frames_rendered);
        Ok(())
    }

    fn pixel_support(&self) -> PixelSupport {
        self.pixel_support
    }

    fn std_plane(&self) -> PlaneId {
        self.std_id
    }

    fn set_plane_token(&mut self, plane: PlaneId, token: u64) -> EngineResult<()> {
        self.node_mut(plane)?.token = token;
        Ok(())
    }

    fn input_ready_fd(&self) -> RawFd {
        self.pipe_rd
    }

    fn mice_enable(&mut self, classes: MiceEvents) -> EngineResult<()> {
        if !self.mice_supported {
            return Err(EngineError::op("mice_enable", "terminal has no mouse protocol"));
        }
        self.mice_enabled = classes;
        Ok(())
    }

    fn next_input(&mut self) -> EngineResult<Option<RawInput>> {
        let mut state = self.feed.borrow_mut();
        if state.broken {
            return Err(EngineError::InputBroken(String::from(
                "readiness descriptor reported an error",
            )));
        }
        let event = state.queue.pop_front();
        if event.is_some() {
            // consume the readiness byte this event was announced with
            let mut byte = [0u8];
            unsafe { libc::read(self.pipe_rd, byte.as_mut_ptr().cast(), 1) };
        }
        Ok(event)
    }

    fn plane_create(&mut self, parent: PlaneId, spec: &PlaneSpec) -> EngineResult<Option<PlaneId>> {
        self.node(parent)?;
        let marginalized = spec.flags.contains(PlaneFlags::MARGINALIZED);
        let (rows, cols) = if marginalized {
            if spec.rows != 0 || spec.cols != 0 {
                trace!("plane_create: margin flags with explicit size, rejecting");
                return Ok(None);
            }
            (0, 0) // sized by realign below
        } else if spec.rows == 0 || spec.cols == 0 {
            if !spec.flags.contains(PlaneFlags::AUTOGROW) {
                trace!("plane_create: zero dimensions without auto-grow, rejecting");
                return Ok(None);
            }
            (spec.rows.max(1), spec.cols.max(1))
        } else {
            (spec.rows, spec.cols)
        };
        let node = Node {
            parent: Some(parent),
            children: Vec::new(),
            y: spec.y,
            x: spec.x,
            rows: rows.max(1),
            cols: cols.max(1),
            cells: vec![Cell::default(); (rows.max(1) * cols.max(1)) as usize],
            base: Cell::default(),
            cursor: (0, 0),
            styles: Style::empty(),
            channels: Channels::DEFAULT,
            name: spec.name.clone(),
            flags: spec.flags,
            margin_bottom: spec.margin_bottom,
            margin_right: spec.margin_right,
            notify_resize: spec.notify_resize,
            token: spec.token,
        };
        let id = self.alloc_plane(node);
        self.nodes.get_mut(&parent).unwrap().children.push(id);
        if marginalized {
            self.realign(id);
        }
        trace!("plane_create: {} under {}", id, parent);
        Ok(Some(id))
    }

    fn plane_destroy(&mut self, plane: PlaneId) -> EngineResult<()> {
        if plane == self.std_id {
            return Err(EngineError::op("plane_destroy", "cannot destroy the standard plane"));
        }
        self.node(plane)?;
        self.detach_from_parent(plane);
        let node = self.nodes.remove(&plane).expect("checked");
        // orphaned children rebind to the destroyed plane's parent
        if let Some(parent) = node.parent {
            for child in &node.children {
                if let Some(c) = self.nodes.get_mut(child) {
                    c.parent = Some(parent);
                }
            }
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.extend(node.children.iter().copied());
            }
        }
        Ok(())
    }

    fn plane_destroy_family(&mut self, plane: PlaneId) -> EngineResult<()> {
        if plane == self.std_id {
            return Err(EngineError::op(
                "plane_destroy_family",
                "cannot destroy the standard plane",
            ));
        }
        self.node(plane)?;
        self.detach_from_parent(plane);
        for id in self.subtree(plane) {
            self.nodes.remove(&id);
        }
        Ok(())
    }

    fn plane_reparent_family(
        &mut self,
        plane: PlaneId,
        new_parent: PlaneId,
        sink: ResizeSink,
    ) -> EngineResult<()> {
        if plane == self.std_id {
            return Err(EngineError::op(
                "plane_reparent_family",
                "cannot reparent the standard plane",
            ));
        }
        self.node(plane)?;
        self.node(new_parent)?;
        if self.subtree(plane).contains(&new_parent) {
            return Err(EngineError::op(
                "plane_reparent_family",
                "new parent lies inside the moved subtree",
            ));
        }
        self.detach_from_parent(plane);
        self.nodes.get_mut(&plane).unwrap().parent = Some(new_parent);
        self.nodes.get_mut(&new_parent).unwrap().children.push(plane);
        // margins are relative to the parent, so the move can resize
        if self.realign(plane) {
            let node = &self.nodes[&plane];
            if node.notify_resize && sink(plane, node.token) == SinkFlow::Abort {
                return Err(EngineError::Aborted);
            }
        }
        self.cascade(plane, sink)
    }

    fn plane_move(&mut self, plane: PlaneId, y: i32, x: i32) -> EngineResult<()> {
        let node = self.node_mut(plane)?;
        node.y = y;
        node.x = x;
        Ok(())
    }

    fn plane_resize(
        &mut self,
        plane: PlaneId,
        rows: u32,
        cols: u32,
        sink: ResizeSink,
    ) -> EngineResult<()> {
        if rows == 0 || cols == 0 {
            return Err(EngineError::op("plane_resize", "zero dimensions"));
        }
        let node = self.node_mut(plane)?;
        let changed = node.rows != rows || node.cols != cols;
        node.resize_grid(rows, cols);
        if changed {
            let node = &self.nodes[&plane];
            if node.notify_resize && sink(plane, node.token) == SinkFlow::Abort {
                return Err(EngineError::Aborted);
            }
        }
        self.cascade(plane, sink)
    }

    fn refresh(&mut self, sink: ResizeSink) -> EngineResult<()> {
        if !self.running {
            return Err(EngineError::op("refresh", "engine not running"));
        }
        self.cascade(self.std_id, sink)
    }

    fn plane_raise(&mut self, plane: PlaneId) -> EngineResult<()> {
        let parent = self.node(plane)?.parent;
        if let Some(parent) = parent {
            let p = self.nodes.get_mut(&parent).unwrap();
            p.children.retain(|&c| c != plane);
            p.children.push(plane);
        }
        Ok(())
    }

    fn plane_lower(&mut self, plane: PlaneId) -> EngineResult<()> {
        let parent = self.node(plane)?.parent;
        if let Some(parent) = parent {
            let p = self.nodes.get_mut(&parent).unwrap();
            p.children.retain(|&c| c != plane);
            p.children.insert(0, plane);
        }
        Ok(())
    }

    fn plane_yx(&self, plane: PlaneId) -> EngineResult<(i32, i32)> {
        let node = self.node(plane)?;
        Ok((node.y, node.x))
    }

    fn plane_dims(&self, plane: PlaneId) -> EngineResult<(u32, u32)> {
        let node = self.node(plane)?;
        Ok((node.rows, node.cols))
    }

    fn plane_cursor(&self, plane: PlaneId) -> EngineResult<(u32, u32)> {
        Ok(self.node(plane)?.cursor)
    }

    fn plane_cursor_move(&mut self, plane: PlaneId, y: u32, x: u32) -> EngineResult<()> {
        let node = self.node_mut(plane)?;
        if y >= node.rows || x >= node.cols {
            return Err(EngineError::op("plane_cursor_move", "cursor out of bounds"));
        }
        node.cursor = (y, x);
        Ok(())
    }

    fn plane_styles(&self, plane: PlaneId) -> EngineResult<Style> {
        Ok(self.node(plane)?.styles)
    }

    fn plane_set_styles(&mut self, plane: PlaneId, styles: Style) -> EngineResult<()> {
        self.node_mut(plane)?.styles = styles;
        Ok(())
    }

    fn plane_channels(&self, plane: PlaneId) -> EngineResult<Channels> {
        Ok(self.node(plane)?.channels)
    }

    fn plane_set_channels(&mut self, plane: PlaneId, channels: Channels) -> EngineResult<()> {
        self.node_mut(plane)?.channels = channels;
        Ok(())
    }

    fn plane_name(&self, plane: PlaneId) -> EngineResult<Option<String>> {
        Ok(self.node(plane)?.name.clone())
    }

    fn plane_set_name(&mut self, plane: PlaneId, name: &str) -> EngineResult<()> {
        self.node_mut(plane)?.name = Some(name.to_owned());
        Ok(())
    }

    fn plane_erase(&mut self, plane: PlaneId) -> EngineResult<()> {
        let node = self.node_mut(plane)?;
        node.cells.fill(Cell::default());
        node.cursor = (0, 0);
        Ok(())
    }

    fn plane_set_base(
        &mut self,
        plane: PlaneId,
        glyph: &str,
        styles: Style,
        channels: Channels,
    ) -> EngineResult<()> {
        let node = self.node_mut(plane)?;
        node.base = Cell {
            ch: glyph.chars().next().unwrap_or('\0'),
            styles,
            channels,
        };
        Ok(())
    }

    fn plane_put_text(
        &mut self,
        plane: PlaneId,
        y: i32,
        x: i32,
        text: &str,
    ) -> EngineResult<usize> {
        let node = self.node_mut(plane)?;
        let cy = if y < 0 { node.cursor.0 } else { y as u32 };
        let mut cx = if x < 0 { node.cursor.1 } else { x as u32 };
        if cy >= node.rows || cx >= node.cols {
            return Err(EngineError::op("plane_put_text", "write starts out of bounds"));
        }
        let styles = node.styles;
        let channels = node.channels;
        let mut written = 0;
        for ch in text.chars() {
            if cx >= node.cols {
                break;
            }
            *node.cell_mut(cy, cx) = Cell {
                ch,
                styles,
                channels,
            };
            cx += 1;
            written += 1;
        }
        node.cursor = (cy, cx.min(node.cols - 1));
        Ok(written)
    }

    fn plane_contents(&self, plane: PlaneId, rect: Rect) -> EngineResult<String> {
        let node = self.node(plane)?;
        if rect.y >= node.rows || rect.x >= node.cols {
            return Ok(String::new());
        }
        let end_y = if rect.rows == 0 {
            node.rows
        } else {
            (rect.y + rect.rows).min(node.rows)
        };
        let end_x = if rect.cols == 0 {
            node.cols
        } else {
            (rect.x + rect.cols).min(node.cols)
        };
        // untouched cells show the plane's base cell, blank by default
        let fill = if node.base.ch == '\0' { ' ' } else { node.base.ch };
        let mut lines: Vec<String> = Vec::new();
        for y in rect.y..end_y {
            let mut line = String::new();
            for x in rect.x..end_x {
                let cell = node.cell(y, x);
                line.push(if cell.ch == '\0' { fill } else { cell.ch });
            }
            lines.push(line.trim_end().to_owned());
        }
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Ok(lines.join("\n"))
    }

    fn plane_vline(&mut self, plane: PlaneId, glyph: &str, len: u32) -> EngineResult<usize> {
        let node = self.node_mut(plane)?;
        let ch = glyph
            .chars()
            .next()
            .ok_or_else(|| EngineError::op("plane_vline", "empty glyph"))?;
        let (cy, cx) = node.cursor;
        let styles = node.styles;
        let channels = node.channels;
        let mut drawn = 0;
        for y in cy..(cy + len).min(node.rows) {
            *node.cell_mut(y, cx) = Cell {
                ch,
                styles,
                channels,
            };
            drawn += 1;
        }
        Ok(drawn)
    }

    fn plane_merge_down(&mut self, src: PlaneId, dst: PlaneId) -> EngineResult<()> {
        self.node(src)?;
        self.node(dst)?;
        let (sy, sx) = self.abs_origin(src);
        let (dy, dx) = self.abs_origin(dst);
        let (src_rows, src_cols) = {
            let s = &self.nodes[&src];
            (s.rows, s.cols)
        };
        for r in 0..src_rows {
            for c in 0..src_cols {
                let cell = self.nodes[&src].cell(r, c).clone();
                if cell.ch == '\0' {
                    continue;
                }
                let ty = sy + r as i32 - dy;
                let tx = sx + c as i32 - dx;
                let d = self.nodes.get_mut(&dst).unwrap();
                if ty >= 0 && tx >= 0 && (ty as u32) < d.rows && (tx as u32) < d.cols {
                    *d.cell_mut(ty as u32, tx as u32) = cell;
                }
            }
        }
        Ok(())
    }

    fn plane_perimeter(
        &mut self,
        plane: PlaneId,
        kind: PerimeterKind,
        styles: Style,
        channels: Channels,
        _ctlword: u32,
    ) -> EngineResult<()> {
        let node = self.node_mut(plane)?;
        if node.rows < 2 || node.cols < 2 {
            return Err(EngineError::op("plane_perimeter", "plane smaller than 2x2"));
        }
        let (ul, ur, ll, lr, hl, vl) = match kind {
            PerimeterKind::Rounded => ('╭', '╮', '╰', '╯', '─', '│'),
            PerimeterKind::Double => ('╔', '╗', '╚', '╝', '═', '║'),
        };
        let rows = node.rows;
        let cols = node.cols;
        let mut edge = vec![
            (0, 0, ul),
            (0, cols - 1, ur),
            (rows - 1, 0, ll),
            (rows - 1, cols - 1, lr),
        ];
        for x in 1..cols - 1 {
            edge.push((0, x, hl));
            edge.push((rows - 1, x, hl));
        }
        for y in 1..rows - 1 {
            edge.push((y, 0, vl));
            edge.push((y, cols - 1, vl));
        }
        for (y, x, ch) in edge {
            *node.cell_mut(y, x) = Cell {
                ch,
                styles,
                channels,
            };
        }
        Ok(())
    }

    fn visual_from_rgba(
        &mut self,
        pixels: &[u8],
        rows: u32,
        rowstride: u32,
        cols: u32,
    ) -> EngineResult<VisualId> {
        if rowstride < cols * 4 {
            return Err(EngineError::op("visual_from_rgba", "rowstride narrower than row"));
        }
        if (pixels.len() as u64) < u64::from(rows) * u64::from(rowstride) {
            return Err(EngineError::op("visual_from_rgba", "pixel buffer shorter than geometry"));
        }
        let id = self.next_visual;
        self.next_visual += 1;
        self.images.insert(
            id,
            Image {
                pixels: pixels.to_vec(),
                rows,
                cols,
                rowstride,
            },
        );
        Ok(id)
    }

    fn visual_destroy(&mut self, visual: VisualId) -> EngineResult<()> {
        self.images
            .remove(&visual)
            .map(|_| ())
            .ok_or_else(|| EngineError::op("visual_destroy", format!("unknown visual {}", visual)))
    }

    fn visual_blit(&mut self, visual: VisualId, spec: &BlitSpec) -> EngineResult<Option<PlaneId>> {
        if !self.images.contains_key(&visual) {
            return Err(EngineError::op("visual_blit", format!("unknown visual {}", visual)));
        }
        if spec.blitter == Blitter::Pixel && self.pixel_support == PixelSupport::None {
            trace!("visual_blit: pixel blitter without pixel support");
            return Ok(None);
        }
        let (img_rows, img_cols) = {
            let image = &self.images[&visual];
            (image.rows, image.cols)
        };
        let cell_rows = img_rows.div_ceil(2).max(1);
        let cell_cols = img_cols.max(1);

        let target = match spec.dst {
            Some(dst) => {
                self.node(dst)?;
                dst
            }
            None => {
                let node = Node {
                    parent: Some(self.std_id),
                    children: Vec::new(),
                    y: spec.y,
                    x: spec.x,
                    rows: cell_rows,
                    cols: cell_cols,
                    cells: vec![Cell::default(); (cell_rows * cell_cols) as usize],
                    base: Cell::default(),
                    cursor: (0, 0),
                    styles: Style::empty(),
                    channels: Channels::DEFAULT,
                    name: None,
                    flags: PlaneFlags::empty(),
                    margin_bottom: 0,
                    margin_right: 0,
                    notify_resize: false,
                    token: spec.token,
                };
                let id = self.alloc_plane(node);
                self.nodes.get_mut(&self.std_id).unwrap().children.push(id);
                id
            }
        };

        let image = self.images.remove(&visual).expect("checked");
        let stretch = spec.dst.is_some() && spec.scale != crate::visual::Scale::None;
        let node = self.nodes.get_mut(&target).unwrap();
        let (rows, cols) = if stretch {
            (node.rows, node.cols)
        } else {
            (cell_rows, cell_cols)
        };
        Self::paint_image(node, &image, rows, cols, stretch);
        self.images.insert(visual, image);
        Ok(Some(target))
    }
}
