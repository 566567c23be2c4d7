use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Button, ButtonSet, HEIGHT, Position, Sprite, WIDTH,
    actuator::Simulation,
    map::{Grid, SpriteGrid},
};

/// Cells risen by a jump even when the button is only tapped.
const MIN_JUMP: u8 = 2;
/// Cells risen while the jump button stays held.
const MAX_JUMP: u8 = 4;
/// Ground enemies step once every this many ticks.
const ENEMY_PERIOD: u64 = 3;
/// Columns kept visible behind the agent.
const CAMERA_LEAD: usize = 6;
const STOMP_SCORE: u32 = 100;
const COIN_SCORE: u32 = 10;
const DEFAULT_TICK_LIMIT: u64 = 4_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    #[error("Level string is empty")]
    Empty,
    #[error("Level has {found} rows, expected {expected}")]
    Height { expected: usize, found: usize },
    #[error("Level is {found} columns wide, needs at least {minimum}")]
    TooNarrow { minimum: usize, found: usize },
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown level code '{code}' at position ({x}, {y})")]
    UnknownCode { code: char, x: usize, y: usize },
    #[error("No start position ('M') found in level")]
    NoStart,
    #[error("Multiple start positions ('M') found")]
    MultipleStarts,
}

/// How an episode ended, if it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Running,
    Cleared,
    Died,
    TimedOut,
}

/// Running totals for the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub ticks: u64,
    /// Rightmost level column reached.
    pub distance: usize,
    pub coins: u32,
    pub score: u32,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Enemy {
    kind: Sprite,
    position: Position,
    heading: isize,
    alive: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct JumpState {
    risen: u8,
    remaining: u8,
    /// Set once a jump starts, cleared when the button is released.
    latched: bool,
}

#[derive(Debug, Clone)]
struct LevelState {
    tiles: Grid<Sprite>,
    enemies: Vec<Enemy>,
    agent: Position,
    jump: JumpState,
    held: ButtonSet,
    stats: EpisodeStats,
}

/// A side-scrolling level that plays out on a tile grid.
///
/// Levels are exactly [`HEIGHT`] rows tall and at least [`WIDTH`] columns wide.
/// Each tick the agent walks (faster while B is held), jumps with A, falls
/// under gravity, collects coins and fights or dies to enemies. Reaching the
/// last column clears the level.
#[derive(Debug, Clone)]
pub struct Level {
    initial: LevelState,
    state: LevelState,
    tick_limit: u64,
}

impl Level {
    fn new(tiles: Grid<Sprite>, enemies: Vec<Enemy>, start: Position) -> Self {
        let initial = LevelState {
            tiles,
            enemies,
            agent: start,
            jump: JumpState::default(),
            held: ButtonSet::EMPTY,
            stats: EpisodeStats {
                distance: start.x,
                ..EpisodeStats::default()
            },
        };
        Level {
            state: initial.clone(),
            initial,
            tick_limit: DEFAULT_TICK_LIMIT,
        }
    }

    /// Sets the number of ticks after which the episode times out.
    pub fn with_tick_limit(mut self, tick_limit: u64) -> Self {
        self.tick_limit = tick_limit;
        self
    }

    pub fn width(&self) -> usize {
        self.state.tiles.width()
    }

    pub fn stats(&self) -> EpisodeStats {
        self.state.stats
    }

    /// Agent position in level coordinates.
    pub fn agent_position(&self) -> Position {
        self.state.agent
    }

    pub fn held_buttons(&self) -> ButtonSet {
        self.state.held
    }

    /// First level column shown by [`Simulation::grid_snapshot`].
    pub fn camera_x(&self) -> usize {
        let max = self.width().saturating_sub(WIDTH);
        self.state.agent.x.saturating_sub(CAMERA_LEAD).min(max)
    }

    fn solid(&self, x: usize, y: usize) -> bool {
        self.state.tiles.get(x, y).is_some_and(|s| s.is_solid())
    }

    fn on_ground(&self) -> bool {
        let Position { x, y } = self.state.agent;
        self.solid(x, y + 1)
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state.stats.outcome = outcome;
        debug!(?outcome, ticks = self.state.stats.ticks, "Episode finished");
    }

    fn step_horizontal(&mut self) {
        let held = self.state.held;
        let heading: isize = match (held.contains(Button::Right), held.contains(Button::Left)) {
            (true, false) => 1,
            (false, true) => -1,
            _ => return,
        };
        if !held.contains(Button::B) && self.state.stats.ticks % 2 == 1 {
            return;
        }
        let Position { x, y } = self.state.agent;
        let Some(target) = x.checked_add_signed(heading) else {
            return;
        };
        if target < self.width() && !self.solid(target, y) {
            self.state.agent.x = target;
        }
    }

    /// Returns true when the agent moved down this tick.
    fn step_vertical(&mut self) -> bool {
        let jump_held = self.state.held.contains(Button::A);
        let grounded = self.on_ground();
        let jump = &mut self.state.jump;

        if jump_held && grounded && !jump.latched {
            *jump = JumpState {
                risen: 0,
                remaining: MAX_JUMP,
                latched: true,
            };
        } else if !jump_held {
            jump.latched = false;
            jump.remaining = jump.remaining.min(MIN_JUMP.saturating_sub(jump.risen));
        }

        let Position { x, y } = self.state.agent;
        if self.state.jump.remaining > 0 {
            if y > 0 && !self.solid(x, y - 1) {
                self.state.agent.y = y - 1;
                self.state.jump.risen += 1;
                self.state.jump.remaining -= 1;
            } else {
                self.state.jump.remaining = 0;
            }
            return false;
        }
        if grounded {
            return false;
        }
        if y + 1 >= self.state.tiles.height() {
            self.finish(Outcome::Died);
            return false;
        }
        self.state.agent.y = y + 1;
        true
    }

    fn collect(&mut self) {
        let at = self.state.agent;
        if self.state.tiles[at] == Sprite::Coin {
            self.state.tiles[at] = Sprite::Air;
            self.state.stats.coins += 1;
            self.state.stats.score += COIN_SCORE;
        }
    }

    fn step_enemies(&mut self) {
        if self.state.stats.ticks % ENEMY_PERIOD != 0 {
            return;
        }
        let tiles = &self.state.tiles;
        let blocked = |x: usize, y: usize| {
            tiles.get(x, y).is_none_or(|s| s.is_solid())
                || !tiles.get(x, y + 1).is_some_and(|s| s.is_solid())
        };
        for enemy in self.state.enemies.iter_mut() {
            if !enemy.alive || enemy.kind == Sprite::FighterFly {
                continue;
            }
            let Position { x, y } = enemy.position;
            match x.checked_add_signed(enemy.heading) {
                Some(next) if !blocked(next, y) => enemy.position.x = next,
                _ => enemy.heading = -enemy.heading,
            }
        }
    }

    fn resolve_contacts(&mut self, descending: bool) {
        let at = self.state.agent;
        let mut killed = false;
        for enemy in self.state.enemies.iter_mut() {
            if !enemy.alive || enemy.position != at {
                continue;
            }
            if descending {
                enemy.alive = false;
                self.state.stats.score += STOMP_SCORE;
            } else {
                killed = true;
            }
        }
        if killed {
            self.finish(Outcome::Died);
        }
    }
}

impl Simulation for Level {
    fn grid_snapshot(&self) -> SpriteGrid {
        let camera = self.camera_x();
        let mut grid = Grid::from_generator(WIDTH, HEIGHT, |x, y| {
            match self.state.tiles.get(camera + x, y) {
                Some(Sprite::Agent) | None => Sprite::Air,
                Some(sprite) => *sprite,
            }
        });
        let mut place = |position: Position, sprite: Sprite| {
            if let Some(x) = position.x.checked_sub(camera) {
                let _ = grid.set(x, position.y, sprite);
            }
        };
        for enemy in self.state.enemies.iter().filter(|e| e.alive) {
            place(enemy.position, enemy.kind);
        }
        place(self.state.agent, Sprite::Agent);
        grid
    }

    fn advance_tick(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.state.stats.ticks += 1;

        self.step_horizontal();
        let descending = self.step_vertical();
        if self.is_terminal() {
            return;
        }
        self.collect();
        // contact before and after the enemy step, so swapping cells counts
        self.resolve_contacts(descending);
        if self.is_terminal() {
            return;
        }
        self.step_enemies();
        self.resolve_contacts(descending);

        let x = self.state.agent.x;
        self.state.stats.distance = self.state.stats.distance.max(x);
        if self.is_terminal() {
            return;
        }
        if x + 1 >= self.width() {
            self.finish(Outcome::Cleared);
        } else if self.state.stats.ticks >= self.tick_limit {
            self.finish(Outcome::TimedOut);
        }
    }

    fn send_input(&mut self, button: Button) {
        self.state.held.insert(button);
    }

    fn release_input(&mut self, button: Button) {
        self.state.held.remove(button);
        if button == Button::A {
            self.state.jump.latched = false;
        }
    }

    fn is_terminal(&self) -> bool {
        self.state.stats.outcome != Outcome::Running
    }

    fn reset(&mut self) {
        self.state = self.initial.clone();
    }
}

/// Loads a level from its text form, one character per cell:
///
/// `.` air, `M` start, `#` ground, `B` brick, `?` power-up block, `P` pipe,
/// `=` platform, `o` coin, `g` goomba, `k` koopa, `s` shell, `f` fighter fly.
pub fn load_level_from_string(level: &str) -> Result<Level, LevelError> {
    let lines: Vec<&str> = level
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(LevelError::Empty);
    }
    if lines.len() != HEIGHT {
        return Err(LevelError::Height {
            expected: HEIGHT,
            found: lines.len(),
        });
    }
    let width = lines[0].chars().count();
    if width < WIDTH {
        return Err(LevelError::TooNarrow {
            minimum: WIDTH,
            found: width,
        });
    }

    let mut tiles = Grid::new(width, HEIGHT);
    let mut enemies = Vec::new();
    let mut start: Option<Position> = None;

    for (y, line) in lines.iter().enumerate() {
        let found = line.chars().count();
        if found != width {
            return Err(LevelError::Ragged {
                row: y,
                expected: width,
                found,
            });
        }
        for (x, code) in line.chars().enumerate() {
            let pos = Position { x, y };
            let tile = match code {
                '.' => Sprite::Air,
                '#' => Sprite::Ground,
                'B' => Sprite::Brick,
                '?' => Sprite::PowerupBlock,
                'P' => Sprite::Pipe,
                '=' => Sprite::MovingPlatform,
                'o' => Sprite::Coin,
                'M' => {
                    if start.replace(pos).is_some() {
                        return Err(LevelError::MultipleStarts);
                    }
                    Sprite::Air
                }
                'g' | 'k' | 's' | 'f' => {
                    let kind = match code {
                        'g' => Sprite::Goomba,
                        'k' => Sprite::Koopa,
                        's' => Sprite::KoopaBombShell,
                        _ => Sprite::FighterFly,
                    };
                    enemies.push(Enemy {
                        kind,
                        position: pos,
                        heading: -1,
                        alive: true,
                    });
                    Sprite::Air
                }
                unknown => return Err(LevelError::UnknownCode { code: unknown, x, y }),
            };
            tiles[pos] = tile;
        }
    }

    let start = start.ok_or(LevelError::NoStart)?;
    Ok(Level::new(tiles, enemies, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat floor two rows thick with the agent standing at column 2.
    fn flat_level(extra: &[(usize, usize, char)]) -> Level {
        let mut rows: Vec<Vec<char>> = (0..HEIGHT)
            .map(|y| vec![if y >= HEIGHT - 2 { '#' } else { '.' }; 30])
            .collect();
        rows[HEIGHT - 3][2] = 'M';
        for (x, y, c) in extra {
            rows[*y][*x] = *c;
        }
        let text: Vec<String> = rows.into_iter().map(|r| r.into_iter().collect()).collect();
        load_level_from_string(&text.join("\n")).unwrap()
    }

    fn hold(level: &mut Level, buttons: &[Button], ticks: usize) {
        for b in buttons {
            level.send_input(*b);
        }
        for _ in 0..ticks {
            level.advance_tick();
        }
        for b in buttons {
            level.release_input(*b);
        }
    }

    #[test]
    fn loader_rejects_malformed_levels() {
        assert_eq!(load_level_from_string("   ").unwrap_err(), LevelError::Empty);
        assert!(matches!(
            load_level_from_string("M...").unwrap_err(),
            LevelError::Height { found: 1, .. }
        ));

        let narrow = vec!["M..."; HEIGHT].join("\n");
        assert!(matches!(
            load_level_from_string(&narrow).unwrap_err(),
            LevelError::TooNarrow { found: 4, .. }
        ));

        let mut rows = vec![".".repeat(WIDTH); HEIGHT];
        assert_eq!(
            load_level_from_string(&rows.join("\n")).unwrap_err(),
            LevelError::NoStart
        );
        rows[3] = format!("M{}", ".".repeat(WIDTH - 1));
        rows[4] = format!("M{}", ".".repeat(WIDTH - 1));
        assert_eq!(
            load_level_from_string(&rows.join("\n")).unwrap_err(),
            LevelError::MultipleStarts
        );
        rows[4] = format!("x{}", ".".repeat(WIDTH - 1));
        assert_eq!(
            load_level_from_string(&rows.join("\n")).unwrap_err(),
            LevelError::UnknownCode { code: 'x', x: 0, y: 4 }
        );
        rows[4] = ".".repeat(WIDTH + 1);
        assert!(matches!(
            load_level_from_string(&rows.join("\n")).unwrap_err(),
            LevelError::Ragged { row: 4, .. }
        ));
    }

    #[test]
    fn walking_is_half_speed_without_b() {
        let mut level = flat_level(&[]);
        hold(&mut level, &[Button::Right], 4);
        assert_eq!(level.agent_position().x, 4);

        let mut level = flat_level(&[]);
        hold(&mut level, &[Button::Right, Button::B], 4);
        assert_eq!(level.agent_position().x, 6);
    }

    #[test]
    fn walls_block_movement() {
        let mut level = flat_level(&[(3, HEIGHT - 3, 'B')]);
        hold(&mut level, &[Button::Right, Button::B], 3);
        assert_eq!(level.agent_position(), Position::new(2, HEIGHT - 3));
    }

    #[test]
    fn tap_jump_rises_the_minimum_then_lands() {
        let mut level = flat_level(&[]);
        let ground_row = HEIGHT - 3;
        hold(&mut level, &[Button::A], 1);
        assert_eq!(level.agent_position().y, ground_row - 1);
        hold(&mut level, &[], 1);
        assert_eq!(level.agent_position().y, ground_row - 2);
        hold(&mut level, &[], 2);
        assert_eq!(level.agent_position().y, ground_row);
    }

    #[test]
    fn held_jump_reaches_full_height_once() {
        let mut level = flat_level(&[]);
        let ground_row = HEIGHT - 3;
        hold(&mut level, &[Button::A], 12);
        // landed after a single jump; holding A did not bounce again
        assert_eq!(level.agent_position().y, ground_row);
        assert_eq!(level.stats().ticks, 12);

        level.send_input(Button::A);
        level.advance_tick();
        level.advance_tick();
        level.advance_tick();
        level.advance_tick();
        assert_eq!(level.agent_position().y, ground_row - MAX_JUMP as usize);
    }

    #[test]
    fn falling_into_a_pit_kills() {
        let mut level = flat_level(&[(3, HEIGHT - 1, '.'), (3, HEIGHT - 2, '.')]);
        hold(&mut level, &[Button::Right, Button::B], 4);
        assert_eq!(level.stats().outcome, Outcome::Died);
        assert!(level.is_terminal());
    }

    #[test]
    fn walking_into_an_enemy_kills_and_stomping_scores() {
        let mut level = flat_level(&[(4, HEIGHT - 3, 'f')]);
        hold(&mut level, &[Button::Right, Button::B], 2);
        assert_eq!(level.stats().outcome, Outcome::Died);

        let mut level = flat_level(&[(5, HEIGHT - 3, 'f')]);
        hold(&mut level, &[Button::Right, Button::B, Button::A], 2);
        hold(&mut level, &[Button::Right, Button::B], 1);
        // one row above the fly, landing on it next tick
        assert_eq!(level.agent_position(), Position::new(5, HEIGHT - 4));
        hold(&mut level, &[], 2);
        assert_eq!(level.stats().outcome, Outcome::Running);
        assert_eq!(level.stats().score, STOMP_SCORE);
    }

    #[test]
    fn agent_and_goomba_cannot_pass_through_each_other() {
        // the goomba steps left on tick 3, the same tick the agent reaches its cell
        let mut level = flat_level(&[(5, HEIGHT - 3, 'g')]);
        hold(&mut level, &[Button::Right, Button::B], 6);
        assert_eq!(level.stats().outcome, Outcome::Died);
        assert_eq!(level.stats().ticks, 3);
        assert_eq!(level.agent_position(), Position::new(5, HEIGHT - 3));
        assert_eq!(level.state.enemies[0].position.x, 5);
    }

    #[test]
    fn coins_are_collected_once() {
        let mut level = flat_level(&[(3, HEIGHT - 3, 'o')]);
        hold(&mut level, &[Button::Right, Button::B], 3);
        assert_eq!(level.stats().coins, 1);
        assert_eq!(level.stats().score, COIN_SCORE);
        hold(&mut level, &[Button::Left, Button::B], 3);
        assert_eq!(level.stats().coins, 1);
    }

    #[test]
    fn goombas_patrol_and_turn_at_walls() {
        let mut level = flat_level(&[(10, HEIGHT - 3, 'g'), (8, HEIGHT - 3, 'B')]);
        for _ in 0..(ENEMY_PERIOD * 3) {
            level.advance_tick();
        }
        let goomba = &level.state.enemies[0];
        assert_eq!(goomba.position.x, 10);
        assert_eq!(goomba.heading, 1);
    }

    #[test]
    fn reaching_the_end_clears_and_reset_restores() {
        let mut level = flat_level(&[]);
        hold(&mut level, &[Button::Right, Button::B], 40);
        assert_eq!(level.stats().outcome, Outcome::Cleared);
        assert_eq!(level.stats().distance, 29);
        assert_eq!(level.stats().ticks, 27);

        level.reset();
        assert_eq!(level.stats(), EpisodeStats { distance: 2, ..EpisodeStats::default() });
        assert_eq!(level.agent_position(), Position::new(2, HEIGHT - 3));
        assert!(level.held_buttons().is_empty());
    }

    #[test]
    fn tick_limit_times_out() {
        let mut level = flat_level(&[]).with_tick_limit(5);
        hold(&mut level, &[], 10);
        assert_eq!(level.stats().outcome, Outcome::TimedOut);
        assert_eq!(level.stats().ticks, 5);
    }

    #[test]
    fn snapshot_follows_the_agent() {
        let mut level = flat_level(&[(20, HEIGHT - 3, 'k')]);
        let grid = level.grid_snapshot();
        assert_eq!(level.camera_x(), 0);
        assert_eq!(grid[(2, HEIGHT - 3)], Sprite::Agent);

        level.state.agent.x = 15;
        assert_eq!(level.camera_x(), 9);
        let grid = level.grid_snapshot();
        assert_eq!(grid[(6, HEIGHT - 3)], Sprite::Agent);
        assert_eq!(grid[(11, HEIGHT - 3)], Sprite::Koopa);
        assert_eq!(grid[(0, HEIGHT - 1)], Sprite::Ground);

        level.state.agent.x = 29;
        assert_eq!(level.camera_x(), 10);
    }
}
