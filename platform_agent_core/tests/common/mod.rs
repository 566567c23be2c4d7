#![allow(dead_code)]

use platform_agent_core::{
    Button, ButtonSet, HEIGHT, Position, Sprite, WIDTH,
    actuator::Simulation,
    environment::{Level, load_level_from_string},
    map::SpriteGrid,
};

/// Scripted backend that records every input and tick.
#[derive(Debug, Default)]
pub struct ScriptedSimulation {
    pub ticks: u32,
    pub held: ButtonSet,
    pub presses: Vec<Button>,
    pub releases: Vec<Button>,
    pub resets: u32,
    /// Episode ends once this many ticks have passed.
    pub terminal_at: Option<u32>,
    /// Agent appears in snapshots once this many ticks have passed.
    pub agent_visible_from: Option<u32>,
    pub agent_at: Option<Position>,
}

impl ScriptedSimulation {
    pub fn with_agent(agent_at: Position) -> Self {
        Self {
            agent_at: Some(agent_at),
            agent_visible_from: Some(0),
            ..Self::default()
        }
    }
}

impl Simulation for ScriptedSimulation {
    fn grid_snapshot(&self) -> SpriteGrid {
        let mut grid = flat_grid();
        if let (Some(at), Some(from)) = (self.agent_at, self.agent_visible_from) {
            if self.ticks >= from {
                grid[at] = Sprite::Agent;
            }
        }
        grid
    }

    fn advance_tick(&mut self) {
        self.ticks += 1;
    }

    fn send_input(&mut self, button: Button) {
        self.held.insert(button);
        self.presses.push(button);
    }

    fn release_input(&mut self, button: Button) {
        self.held.remove(button);
        self.releases.push(button);
    }

    fn is_terminal(&self) -> bool {
        self.terminal_at.is_some_and(|t| self.ticks >= t)
    }

    fn reset(&mut self) {
        self.ticks = 0;
        self.held = ButtonSet::EMPTY;
        self.resets += 1;
    }
}

/// Empty frame with a two row floor.
pub fn flat_grid() -> SpriteGrid {
    let mut grid = SpriteGrid::empty();
    for x in 0..WIDTH {
        grid[(x, HEIGHT - 1)] = Sprite::Ground;
        grid[(x, HEIGHT - 2)] = Sprite::Ground;
    }
    grid
}

/// 30 column level with a two row floor, agent starting at (2, 13).
/// `edits` overwrite single cells.
pub fn flat_level(edits: &[(usize, usize, char)]) -> Level {
    let mut rows: Vec<Vec<char>> = (0..HEIGHT)
        .map(|y| vec![if y >= HEIGHT - 2 { '#' } else { '.' }; 30])
        .collect();
    rows[HEIGHT - 3][2] = 'M';
    for (x, y, code) in edits {
        rows[*y][*x] = *code;
    }
    let text: Vec<String> = rows.into_iter().map(|r| r.into_iter().collect()).collect();
    load_level_from_string(&text.join("\n")).expect("valid test level")
}
