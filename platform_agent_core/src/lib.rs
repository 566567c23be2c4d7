use serde::{Deserialize, Serialize};

pub mod actuator;
pub mod agent;
pub mod config;
pub mod driver;
pub mod environment;
pub mod locator;
pub mod map;
pub mod policy;
pub mod sensors;

/// Number of rows in a sampled sprite grid.
pub const HEIGHT: usize = 16;
/// Number of columns in a sampled sprite grid.
pub const WIDTH: usize = 20;

/// Represents a 2D grid coordinate. Row 0 is the top of the visible world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Sprite categories found in a grid cell.
///
/// The discriminants match the codes produced by the game area export, so a raw
/// snapshot converts with [`Sprite::try_from`]. Ground, coin bricks and used
/// power-up blocks all share code 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Sprite {
    #[default]
    Air = 0,
    Agent = 1,
    Coin = 5,
    Mushroom = 6,
    Star = 8,
    Ground = 10,
    MovingPlatform = 11,
    Brick = 12,
    PowerupBlock = 13,
    Pipe = 14,
    Goomba = 15,
    Koopa = 16,
    FighterFly = 18,
    KoopaBombShell = 25,
}

impl Sprite {
    /// Numeric code of this sprite in the external grid format.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the agent collides with this sprite instead of passing through it.
    pub fn is_solid(self) -> bool {
        matches!(
            self,
            Sprite::Ground
                | Sprite::MovingPlatform
                | Sprite::Brick
                | Sprite::PowerupBlock
                | Sprite::Pipe
        )
    }
}

impl TryFrom<u8> for Sprite {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let sprite = match code {
            0 => Sprite::Air,
            1 => Sprite::Agent,
            5 => Sprite::Coin,
            6 => Sprite::Mushroom,
            8 => Sprite::Star,
            10 => Sprite::Ground,
            11 => Sprite::MovingPlatform,
            12 => Sprite::Brick,
            13 => Sprite::PowerupBlock,
            14 => Sprite::Pipe,
            15 => Sprite::Goomba,
            16 => Sprite::Koopa,
            18 => Sprite::FighterFly,
            25 => Sprite::KoopaBombShell,
            unknown => return Err(unknown),
        };
        Ok(sprite)
    }
}

/// Controller buttons, numbered the way the controller exposes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Button {
    Down = 0,
    Left = 1,
    Right = 2,
    Up = 3,
    /// Jump.
    A = 4,
    /// Speed modifier / fireball.
    B = 5,
}

impl Button {
    pub const ALL: [Button; 6] = [
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Up,
        Button::A,
        Button::B,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of buttons held together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Button>", into = "Vec<Button>")]
pub struct ButtonSet(u8);

impl ButtonSet {
    pub const EMPTY: ButtonSet = ButtonSet(0);

    /// Builds a set in a const context, used by the built-in plan table.
    pub const fn of(buttons: &[Button]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < buttons.len() {
            bits |= buttons[i].bit();
            i += 1;
        }
        ButtonSet(bits)
    }

    pub fn insert(&mut self, button: Button) {
        self.0 |= button.bit();
    }

    pub fn remove(&mut self, button: Button) {
        self.0 &= !button.bit();
    }

    #[inline]
    pub const fn contains(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Buttons in `self` that are not in `other`.
    pub fn difference(self, other: ButtonSet) -> ButtonSet {
        ButtonSet(self.0 & !other.0)
    }

    /// Iterates in controller code order.
    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl From<Vec<Button>> for ButtonSet {
    fn from(buttons: Vec<Button>) -> Self {
        let mut set = ButtonSet::EMPTY;
        for button in buttons {
            set.insert(button);
        }
        set
    }
}

impl From<ButtonSet> for Vec<Button> {
    fn from(set: ButtonSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<Button> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        let mut set = ButtonSet::EMPTY;
        for button in iter {
            set.insert(button);
        }
        set
    }
}
