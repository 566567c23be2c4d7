//! Window predicates that look ahead of the agent for a class of hazard.
//!
//! Every sensor scans a rectangle anchored on the agent cell and stops at the
//! first matching sprite. Parts of a window that fall outside the frame are
//! clipped, so a sensor never fails.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{Position, Sprite, map::SpriteGrid};

const GROUND_ENEMIES: &[Sprite] = &[Sprite::Goomba, Sprite::Koopa, Sprite::KoopaBombShell];
const FLYING_ENEMIES: &[Sprite] = &[Sprite::FighterFly];
const OBSTACLES: &[Sprite] = &[
    Sprite::Ground,
    Sprite::MovingPlatform,
    Sprite::Pipe,
    Sprite::Brick,
    Sprite::PowerupBlock,
];
const PIPES: &[Sprite] = &[Sprite::Pipe];
const PITS: &[Sprite] = &[Sprite::Air];

/// The hazard classes the policy can test for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    GroundEnemy,
    FlyingEnemy,
    Obstacle,
    /// Scans a single row `height` cells above the agent row.
    Pipe,
    /// Scans the bottom row of the frame for missing ground.
    Pit,
}

/// Extent of a sensor scan relative to the agent cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorWindow {
    /// Columns ahead, exclusive end measured from the agent column.
    pub distance: usize,
    /// Rows above and below the agent row. For [`Sensor::Pipe`] this is the
    /// offset of the single scanned row above the agent.
    #[serde(default)]
    pub height: usize,
    /// First scanned column relative to the agent, 0 or 1.
    #[serde(default)]
    pub column_offset: usize,
}

impl SensorWindow {
    pub const fn new(distance: usize, height: usize, column_offset: usize) -> Self {
        Self {
            distance,
            height,
            column_offset,
        }
    }

    /// Column range clipped to the frame width.
    fn columns(&self, agent: Position, width: usize) -> Range<usize> {
        let start = agent.x.saturating_add(self.column_offset).min(width);
        let end = agent.x.saturating_add(self.distance).min(width);
        start..end.max(start)
    }

    /// Row range `[y - height, y + height]` clipped to the frame height.
    fn rows(&self, agent: Position, height: usize) -> Range<usize> {
        let start = agent.y.saturating_sub(self.height);
        let end = agent.y.saturating_add(self.height).saturating_add(1).min(height);
        start.min(end)..end
    }
}

impl Sensor {
    /// Sprite categories this sensor reacts to.
    pub fn targets(self) -> &'static [Sprite] {
        match self {
            Sensor::GroundEnemy => GROUND_ENEMIES,
            Sensor::FlyingEnemy => FLYING_ENEMIES,
            Sensor::Obstacle => OBSTACLES,
            Sensor::Pipe => PIPES,
            Sensor::Pit => PITS,
        }
    }

    /// Tests the window around `agent` for this sensor's hazard.
    pub fn detect(self, grid: &SpriteGrid, agent: Position, window: SensorWindow) -> bool {
        let columns = window.columns(agent, grid.width());
        match self {
            Sensor::GroundEnemy | Sensor::FlyingEnemy | Sensor::Obstacle => {
                let targets = self.targets();
                let rows = window.rows(agent, grid.height());
                for x in columns {
                    for y in rows.clone() {
                        if grid.get(x, y).is_some_and(|s| targets.contains(s)) {
                            return true;
                        }
                    }
                }
                false
            }
            Sensor::Pipe => {
                let Some(y) = agent.y.checked_sub(window.height) else {
                    return false;
                };
                scan_row(grid, y, columns, PIPES)
            }
            Sensor::Pit => scan_row(grid, grid.bottom_row(), columns, PITS),
        }
    }
}

fn scan_row(grid: &SpriteGrid, y: usize, columns: Range<usize>, targets: &[Sprite]) -> bool {
    let Some(row) = grid.row(y) else {
        return false;
    };
    row.get(columns)
        .is_some_and(|cells| cells.iter().any(|s| targets.contains(s)))
}

pub fn ground_enemy_ahead(grid: &SpriteGrid, agent: Position, distance: usize, height: usize) -> bool {
    Sensor::GroundEnemy.detect(grid, agent, SensorWindow::new(distance, height, 0))
}

pub fn flying_enemy_ahead(grid: &SpriteGrid, agent: Position, distance: usize, height: usize) -> bool {
    Sensor::FlyingEnemy.detect(grid, agent, SensorWindow::new(distance, height, 0))
}

pub fn obstacle_ahead(grid: &SpriteGrid, agent: Position, distance: usize, height: usize) -> bool {
    Sensor::Obstacle.detect(grid, agent, SensorWindow::new(distance, height, 1))
}

pub fn pipe_ahead(grid: &SpriteGrid, agent: Position, distance: usize, height_offset: usize) -> bool {
    Sensor::Pipe.detect(grid, agent, SensorWindow::new(distance, height_offset, 1))
}

pub fn pit_ahead(grid: &SpriteGrid, agent: Position, distance: usize) -> bool {
    Sensor::Pit.detect(grid, agent, SensorWindow::new(distance, 0, 1))
}
