use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use platform_agent_core::{
    Button, Sprite,
    actuator::{Simulation, TimedInputActuator},
    agent::{Agent, ExpertAgent, RandomAgent},
    config::AgentConfig,
    driver::{AgentLoop, Cycle},
    environment::{Level, load_level_from_string},
    map::SpriteGrid,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Level file to load
    #[arg(short, long, value_name = "LEVEL_FILE")]
    level: Option<PathBuf>,

    /// Agent configuration (TOML); built-in rules when absent
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Which agent plays
    #[arg(short, long, value_enum, default_value_t = AgentKind::Expert)]
    agent: AgentKind,

    /// Seed for the random agent
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Run without the terminal UI and print a summary per episode
    #[arg(long)]
    headless: bool,

    /// Episodes to play in headless mode
    #[arg(long, default_value_t = 1)]
    episodes: u32,

    /// Write logs to this file (the UI otherwise discards them)
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AgentKind {
    Expert,
    Random,
}

struct App {
    /// The agent loop driving the level.
    agent_loop: AgentLoop<Level>,
    /// The most recent cycle, shown in the side panel.
    last_cycle: Option<Cycle>,
    /// Set when the driver gave up on the episode.
    error: Option<String>,
    /// Set by `q` or `Esc`.
    should_quit: bool,
    /// Flag to control if the episode is over.
    game_over: bool,
}

impl App {
    fn new(agent_loop: AgentLoop<Level>) -> Self {
        App {
            agent_loop,
            last_cycle: None,
            error: None,
            should_quit: false,
            game_over: false,
        }
    }

    /// Runs one decision cycle.
    fn tick(&mut self) {
        if self.game_over {
            return;
        }
        match self.agent_loop.step() {
            Ok(Cycle::Terminal) => {
                self.game_over = true;
                let stats = self.agent_loop.simulation().stats();
                info!(outcome = ?stats.outcome, score = stats.score, "Episode over");
            }
            Ok(cycle) => self.last_cycle = Some(cycle),
            Err(err) => {
                self.error = Some(err.to_string());
                self.game_over = true;
            }
        }
    }

    fn reset(&mut self) {
        self.agent_loop.reset();
        self.last_cycle = None;
        self.error = None;
        self.game_over = false;
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.headless, args.log_file.as_deref())?;

    // If no level file is provided, use the default level
    let level_file = args
        .level
        .clone()
        .unwrap_or(PathBuf::from("levels/level01.txt"));
    if !level_file.exists() {
        return Err(anyhow::anyhow!(
            "Level file does not exist: {}",
            level_file.display()
        ));
    }
    let level_text = std::fs::read_to_string(&level_file)
        .with_context(|| format!("Failed to read level {}", level_file.display()))?;
    let level = load_level_from_string(&level_text)
        .with_context(|| format!("Failed to load level {}", level_file.display()))?;

    let config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::load(Path::new("config/agent.toml"))?,
    };
    let agent_loop = build_loop(&args, &config, level)?;

    if args.headless {
        return run_headless(agent_loop, args.episodes);
    }

    // Enter raw mode on the alternate screen
    let mut terminal = setup_terminal()?;
    let mut app = App::new(agent_loop);
    let result = run_app(&mut terminal, &mut app);
    // Restore the terminal state even when the loop failed
    restore_terminal(&mut terminal)?;
    result
}

/// Installs the log subscriber. `RUST_LOG` picks the level, `info` by default.
fn init_tracing(headless: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if headless {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    }
    Ok(())
}

fn build_loop(args: &Args, config: &AgentConfig, level: Level) -> Result<AgentLoop<Level>> {
    let policy = config.policy.build().context("Invalid policy configuration")?;
    let agent: Box<dyn Agent> = match args.agent {
        AgentKind::Expert => Box::new(ExpertAgent::new(policy)),
        AgentKind::Random => Box::new(RandomAgent::new(&policy, args.seed)),
    };
    Ok(AgentLoop::new(
        level,
        agent,
        TimedInputActuator::new(config.actuator),
        config.driver,
    ))
}

/// Plays `episodes` episodes back to back and prints one line per episode.
fn run_headless(mut agent_loop: AgentLoop<Level>, episodes: u32) -> Result<()> {
    for episode in 1..=episodes {
        let report = agent_loop.run_episode()?;
        let stats = agent_loop.simulation().stats();
        info!(
            episode,
            outcome = ?stats.outcome,
            distance = stats.distance,
            coins = stats.coins,
            score = stats.score,
            ticks = stats.ticks,
            rule_hits = ?report.rule_hits,
            "Episode finished"
        );
        println!(
            "episode {episode}: {:?} distance {}/{} coins {} score {} ticks {} cycles {}",
            stats.outcome,
            stats.distance,
            agent_loop.simulation().width() - 1,
            stats.coins,
            stats.score,
            stats.ticks,
            report.cycles,
        );
    }
    Ok(())
}

/// Switches stdout to raw mode on the alternate screen.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Leaves raw mode and the alternate screen.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Advances the agent loop every tick and handles keys between ticks.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char('r') => app.reset(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Draws the frame view and the episode panel.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(HEIGHT_ROWS), Constraint::Length(2)])
        .split(frame.area());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    let grid = app.agent_loop.simulation().grid_snapshot();
    render_grid(frame, body[0], &grid);
    render_status(frame, body[1], app);

    let help_text = Paragraph::new("Press 'r' to restart, 'q' or 'Esc' to quit.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[1]);
}

/// Grid rows plus the block border.
const HEIGHT_ROWS: u16 = platform_agent_core::HEIGHT as u16 + 2;

fn sprite_span(sprite: Sprite) -> Span<'static> {
    let (glyph, style) = match sprite {
        Sprite::Air => (" ", Style::default()),
        Sprite::Agent => ("@", Style::default().fg(Color::Red).bold()),
        Sprite::Coin => ("o", Style::default().fg(Color::Yellow)),
        Sprite::Mushroom => ("m", Style::default().fg(Color::LightRed)),
        Sprite::Star => ("*", Style::default().fg(Color::LightYellow)),
        Sprite::Ground => ("#", Style::default().fg(Color::DarkGray)),
        Sprite::MovingPlatform => ("=", Style::default().fg(Color::Gray)),
        Sprite::Brick => ("B", Style::default().fg(Color::Rgb(170, 85, 0))),
        Sprite::PowerupBlock => ("?", Style::default().fg(Color::Yellow).bold()),
        Sprite::Pipe => ("P", Style::default().fg(Color::Green)),
        Sprite::Goomba => ("g", Style::default().fg(Color::Magenta)),
        Sprite::Koopa => ("k", Style::default().fg(Color::LightGreen)),
        Sprite::FighterFly => ("f", Style::default().fg(Color::Cyan)),
        Sprite::KoopaBombShell => ("s", Style::default().fg(Color::LightMagenta)),
    };
    Span::styled(glyph, style)
}

/// Renders the sampled frame the agent sees.
fn render_grid(frame: &mut Frame, area: Rect, grid: &SpriteGrid) {
    let lines: Vec<Line> = grid
        .rows()
        .map(|row| Line::from(row.iter().map(|s| sprite_span(*s)).collect::<Vec<_>>()))
        .collect();

    let grid_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Agent View").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(grid_paragraph, area);
}

fn buttons_label(buttons: impl Iterator<Item = Button>) -> String {
    buttons
        .map(|b| format!("{b:?}"))
        .collect::<Vec<_>>()
        .join("+")
}

/// Renders episode totals and the last decision.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let level = app.agent_loop.simulation();
    let stats = level.stats();
    let mut items = vec![
        ListItem::new(format!("Agent: {}", app.agent_loop.agent_name())),
        ListItem::new(format!("Outcome: {:?}", stats.outcome)),
        ListItem::new(format!("Ticks: {}", stats.ticks)),
        ListItem::new(format!(
            "Distance: {}/{}",
            stats.distance,
            level.width().saturating_sub(1)
        )),
        ListItem::new(format!("Coins: {}  Score: {}", stats.coins, stats.score)),
        ListItem::new(format!("Held: {}", buttons_label(level.held_buttons().iter()))),
    ];

    match &app.last_cycle {
        Some(Cycle::Acted {
            position,
            decision,
            actuation,
        }) => {
            items.push(ListItem::new(Line::from(vec![
                Span::raw("Rule: "),
                Span::styled(
                    decision.rule_name().to_string(),
                    Style::default().fg(Color::Cyan).bold(),
                ),
            ])));
            items.push(ListItem::new(format!(
                "Plan: {} x {}",
                decision.plan.duration(),
                buttons_label(decision.plan.buttons().iter())
            )));
            items.push(ListItem::new(format!(
                "At: ({}, {})  ran {} ticks",
                position.x, position.y, actuation.ticks
            )));
        }
        Some(Cycle::AgentMissing { frames }) => {
            items.push(ListItem::new(format!("Agent missing for {frames} frames")));
        }
        Some(Cycle::Terminal) | None => {}
    }
    if let Some(error) = &app.error {
        items.push(ListItem::new(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    let status_widget =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Episode"));
    frame.render_widget(status_widget, area);
}
