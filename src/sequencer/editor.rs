//! Grid editor - pointer hit-testing and cell toggling for the selected group
use tracing::debug;

use super::{Group, Lane, SharedGrid, Step, STEPS};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A step/lane pair of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub step: Step,
    pub lane: Lane,
}

/// Fixed geometry of the grid in screen units: 16 columns, one row per lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub origin_x: f32,
    pub origin_y: f32,
    pub column_spacing: f32,
    pub row_spacing: f32,
    pub cell_size: f32,
}

impl Default for GridLayout {
    /// Grid across the top of a 320 unit wide screen with a 55 unit label gutter
    fn default() -> Self {
        Self {
            origin_x: 55.0,
            origin_y: 10.0,
            column_spacing: (320.0 - 55.0) / STEPS as f32,
            row_spacing: 10.0,
            cell_size: 10.0,
        }
    }
}

impl GridLayout {
    /// Hit rectangle of a cell, centred on its grid intersection
    pub fn cell_rect(&self, cell: Cell) -> Rect {
        let half = self.cell_size / 2.0;
        Rect::new(
            self.column_x(cell.step) - half,
            self.row_y(cell.lane) - half,
            self.cell_size,
            self.cell_size,
        )
    }

    pub fn column_x(&self, step: Step) -> f32 {
        self.origin_x + step.index() as f32 * self.column_spacing
    }

    pub fn row_y(&self, lane: Lane) -> f32 {
        self.origin_y + lane.index() as f32 * self.row_spacing
    }

    /// Cell under the pointer, treating the pointer as a one unit square
    pub fn hit_test(&self, group: Group, pointer: Point) -> Option<Cell> {
        let probe = Rect::new(pointer.x, pointer.y, 1.0, 1.0);
        Step::all()
            .flat_map(|step| group.lanes().map(move |lane| Cell { step, lane }))
            .find(|cell| self.cell_rect(*cell).intersects(&probe))
    }
}

/// One frame of input as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputFrame {
    /// In layout units; `None` when the pointer is outside the window
    pub pointer: Option<Point>,
    pub primary_pressed: bool,
    pub toggle_play_pressed: bool,
    /// BPM to add this frame
    pub tempo_delta: f32,
}

/// A toggle applied by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub group: Group,
    pub cell: Cell,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct GridEditor {
    layout: GridLayout,
    selected: Option<Group>,
    cursor: Option<Cell>,
    visited: [bool; Group::COUNT],
}

impl GridEditor {
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            selected: None,
            cursor: None,
            visited: [false; Group::COUNT],
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Returns `true` the first time `group` is selected
    pub fn select_group(&mut self, group: Group) -> bool {
        self.selected = Some(group);
        let first = !self.visited[group.index()];
        self.visited[group.index()] = true;
        first
    }

    pub fn selected(&self) -> Option<Group> {
        self.selected
    }

    pub fn cursor(&self) -> Option<Cell> {
        self.cursor
    }

    /// Recompute the cursor and apply a click to the selected group's grid
    pub fn update(&mut self, input: &InputFrame, grid: &SharedGrid) -> Option<Edit> {
        let group = self.selected?;
        self.cursor = input
            .pointer
            .and_then(|pointer| self.layout.hit_test(group, pointer));

        if !input.primary_pressed {
            return None;
        }
        let cell = self.cursor?;
        let active = grid.toggle(group, cell.step, cell.lane);
        debug!(%group, step = %cell.step, lane = %cell.lane, active, "cell toggled");
        Some(Edit { group, cell, active })
    }
}

impl Default for GridEditor {
    fn default() -> Self {
        Self::new(GridLayout::default())
    }
}
