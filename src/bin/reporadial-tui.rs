use anyhow::Context;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use glam::Vec2;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect as UiRect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use reporadial::canvas::ViewTransform;
use reporadial::cli::Cli;
use reporadial::diagram::{LabelAnchor, RadialDiagram};
use reporadial::expand_state::Toggle;
use reporadial::logging::{self, LogTarget};
use reporadial::provider::GitHubProvider;
use reporadial::request::{FetchCoordinator, RepoSource};
use reporadial::tree::NodeKind;
use reporadial::watch::RepoWatcher;
use reporadial::{Config, FileTree};

/// Virtual drawing surface handed to the diagram; the terminal view scales it.
const SURFACE: f32 = 800.0;
const PAN_STEP: f32 = 40.0;
const ZOOM_STEP: f32 = 1.25;
/// World units kept free around the outermost ring.
const MARGIN: f32 = 60.0;
/// Deepest ring that gets a label without being selected.
const LABEL_DEPTH: usize = 1;

#[derive(Default, Clone, Copy)]
struct CanvasBounds {
    area: Option<UiRect>,
    x: [f64; 2],
    y: [f64; 2],
}

impl CanvasBounds {
    /// World position under a terminal cell, if it lies on the canvas.
    fn cell_to_world(&self, column: u16, row: u16) -> Option<Vec2> {
        let area = self.area?;
        if column < area.x || row < area.y || column >= area.x + area.width || row >= area.y + area.height {
            return None;
        }
        let fx = (column - area.x) as f64 + 0.5;
        let fy = (row - area.y) as f64 + 0.5;
        let x = self.x[0] + fx / area.width as f64 * (self.x[1] - self.x[0]);
        // canvas y grows upwards, world y downwards
        let canvas_y = self.y[1] - fy / area.height as f64 * (self.y[1] - self.y[0]);
        Some(Vec2::new(x as f32, -canvas_y as f32))
    }

    fn world_per_cell(&self) -> f32 {
        match self.area {
            Some(area) if area.width > 0 => ((self.x[1] - self.x[0]) / area.width as f64) as f32,
            _ => 1.0,
        }
    }
}

struct App {
    config: Config,
    repo_input: String,
    input_mode: bool,
    status: String,
    fetcher: FetchCoordinator,
    diagram: Option<RadialDiagram>,
    view: ViewTransform,
    selected_key: Option<String>,
    watch_local: bool,
    watcher: Option<RepoWatcher>,
    canvas: CanvasBounds,
    should_quit: bool,
}

impl App {
    fn new(config: Config, provider: Arc<GitHubProvider>, watch_local: bool) -> Self {
        Self {
            config,
            repo_input: String::new(),
            input_mode: true,
            status: String::from("Type owner/repo and press Enter"),
            fetcher: FetchCoordinator::new(provider),
            diagram: None,
            view: ViewTransform::new(0.0, 0.0),
            selected_key: None,
            watch_local,
            watcher: None,
            canvas: CanvasBounds::default(),
            should_quit: false,
        }
    }

    fn load(&mut self, source: RepoSource) {
        self.repo_input = source.to_string();
        self.input_mode = false;
        self.status = format!("Loading {source} ...");
        self.fetcher.submit(source);
    }

    fn submit_input(&mut self) {
        match self.fetcher.submit_input(&self.repo_input) {
            Ok(_) => {
                self.input_mode = false;
                self.status = format!("Loading {} ...", self.repo_input.trim());
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn poll_fetch(&mut self) {
        if let Some(watcher) = self.watcher.as_mut() {
            if watcher.poll_changed() {
                info!(root = %watcher.root().display(), "change detected, reloading");
                self.fetcher.reload();
            }
        }

        let Some(delivery) = self.fetcher.poll() else {
            return;
        };
        match delivery.result {
            Ok(records) => {
                let tree = FileTree::from_records(&records);
                self.status = format!(
                    "{}: {} files, {} entries",
                    delivery.source,
                    tree.leaf_count(),
                    tree.node_count()
                );
                if !tree.conflicts().is_empty() {
                    self.status
                        .push_str(&format!(", {} name conflicts", tree.conflicts().len()));
                }
                self.diagram = Some(RadialDiagram::render(tree, SURFACE, SURFACE, &self.config));
                self.selected_key = None;
                self.view.reset();
                self.ensure_watcher(&delivery.source);
            }
            Err(err) => self.status = format!("Fetch failed: {err}"),
        }
    }

    fn ensure_watcher(&mut self, source: &RepoSource) {
        let RepoSource::Local(root) = source else {
            self.watcher = None;
            return;
        };
        if !self.watch_local || self.watcher.as_ref().map(|w| w.root() == root.as_path()).unwrap_or(false) {
            return;
        }
        match RepoWatcher::new(root) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(err) => warn!(error = %err, "could not watch local checkout"),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        if self.input_mode {
            match key.code {
                KeyCode::Enter => self.submit_input(),
                KeyCode::Esc => self.input_mode = false,
                KeyCode::Backspace => {
                    self.repo_input.pop();
                }
                KeyCode::Char(ch) => self.repo_input.push(ch),
                _ => {}
            }
            return;
        }

        let center = self.view.viewport_center();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.input_mode = true,
            KeyCode::Char('r') => {
                if self.fetcher.reload().is_some() {
                    self.status = "Reloading ...".to_string();
                }
            }
            KeyCode::Left => self.view.pan(Vec2::new(PAN_STEP, 0.0)),
            KeyCode::Right => self.view.pan(Vec2::new(-PAN_STEP, 0.0)),
            KeyCode::Up => self.view.pan(Vec2::new(0.0, PAN_STEP)),
            KeyCode::Down => self.view.pan(Vec2::new(0.0, -PAN_STEP)),
            KeyCode::Char('+') | KeyCode::Char('=') => self.view.zoom(ZOOM_STEP, center),
            KeyCode::Char('-') => self.view.zoom(1.0 / ZOOM_STEP, center),
            KeyCode::Char('0') => self.view.reset(),
            KeyCode::Tab => self.cycle_selection(1),
            KeyCode::BackTab => self.cycle_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('c') => {
                if let Some(diagram) = self.diagram.as_mut() {
                    diagram.collapse_all();
                }
            }
            KeyCode::Char('e') => {
                if let Some(diagram) = self.diagram.as_mut() {
                    diagram.expand_all();
                }
            }
            KeyCode::Esc => self.select(None),
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        let center = self.view.viewport_center();
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(world) = self.canvas.cell_to_world(event.column, event.row) else {
                    return;
                };
                let tolerance = self.canvas.world_per_cell() * 1.5;
                let Some(diagram) = self.diagram.as_mut() else {
                    return;
                };
                if let Some(id) = diagram.hit_test(world, tolerance) {
                    let key = diagram.tree().stable_key(id);
                    self.select(Some(key));
                    self.toggle_selected();
                }
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let pivot = self
                    .canvas
                    .cell_to_world(event.column, event.row)
                    .map(|world| self.view.world_to_screen(world))
                    .unwrap_or(center);
                let factor = if matches!(event.kind, MouseEventKind::ScrollUp) {
                    ZOOM_STEP
                } else {
                    1.0 / ZOOM_STEP
                };
                self.view.zoom(factor, pivot);
            }
            _ => {}
        }
    }

    fn cycle_selection(&mut self, step: isize) {
        let Some(diagram) = self.diagram.as_ref() else {
            return;
        };
        let keys: Vec<&str> = diagram.nodes().map(|s| s.key.as_str()).collect();
        if keys.is_empty() {
            return;
        }
        let current = self
            .selected_key
            .as_deref()
            .and_then(|key| keys.iter().position(|k| *k == key));
        let next = match current {
            Some(i) => (i as isize + step).rem_euclid(keys.len() as isize) as usize,
            None if step < 0 => keys.len() - 1,
            None => 0,
        };
        let key = keys[next].to_string();
        self.select(Some(key));
    }

    fn select(&mut self, key: Option<String>) {
        if let Some(diagram) = self.diagram.as_mut() {
            let id = key
                .as_deref()
                .and_then(|key| diagram.nodes().find(|s| s.key == key).map(|s| s.id));
            diagram.hover(id);
        }
        self.selected_key = key;
    }

    fn toggle_selected(&mut self) {
        let Some(diagram) = self.diagram.as_mut() else {
            return;
        };
        let Some(id) = diagram.hovered() else {
            return;
        };
        match diagram.click(id) {
            Toggle::Collapsed(n) => self.status = format!("Collapsed {n} children"),
            Toggle::Expanded(n) => self.status = format!("Expanded {n} children"),
            Toggle::Ignored => {}
        }
    }
}

fn node_color(rgb: (u8, u8, u8)) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let root = frame.area();
    let split = Layout::horizontal([Constraint::Length(38), Constraint::Min(30)]).split(root);
    let left = split[0];
    let right = split[1];

    let left_block = Block::default().title(" reporadial ").borders(Borders::ALL);
    let left_inner = left_block.inner(left);
    frame.render_widget(left_block, left);

    let left_rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(5),
        Constraint::Min(6),
        Constraint::Length(7),
    ])
    .split(left_inner);

    let input_title = if app.input_mode {
        " Repository (typing) "
    } else {
        " Repository "
    };
    let input_style = if app.input_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    frame.render_widget(
        Paragraph::new(app.repo_input.as_str())
            .style(input_style)
            .block(Block::default().title(input_title).borders(Borders::ALL)),
        left_rows[0],
    );

    let status = if app.fetcher.is_pending() {
        format!("{} (waiting)", app.status)
    } else {
        app.status.clone()
    };
    frame.render_widget(
        Paragraph::new(status)
            .wrap(ratatui::widgets::Wrap { trim: true })
            .block(Block::default().title(" Status ").borders(Borders::ALL)),
        left_rows[1],
    );

    let mut selection = Vec::new();
    if let (Some(diagram), Some(key)) = (app.diagram.as_ref(), app.selected_key.as_deref()) {
        if let Some(sprite) = diagram.nodes().find(|s| s.key == key) {
            let kind = match sprite.kind {
                NodeKind::Branch if sprite.collapsed => "folder (collapsed)",
                NodeKind::Branch => "folder",
                NodeKind::Leaf => "file",
            };
            selection.push(Line::from(vec![
                Span::styled("Key: ", Style::default().fg(Color::Gray)),
                Span::raw(sprite.key.clone()),
            ]));
            selection.push(Line::from(vec![
                Span::styled("Type: ", Style::default().fg(Color::Gray)),
                Span::raw(kind),
            ]));
            selection.push(Line::from(vec![
                Span::styled("Category: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    sprite.category.label(),
                    Style::default().fg(node_color(RadialDiagram::marker_color(sprite))),
                ),
            ]));
            selection.push(Line::from(format!("Depth: {}", sprite.depth)));
        }
    }
    if selection.is_empty() {
        selection.push(Line::from("Selected: (none)"));
    }
    frame.render_widget(
        Paragraph::new(selection).block(Block::default().title(" Selection ").borders(Borders::ALL)),
        left_rows[2],
    );

    let help_lines = vec![
        Line::from("/: edit repo   r: reload   q: quit"),
        Line::from("Arrows: pan   +/-: zoom   0: reset"),
        Line::from("Tab: select   Enter: collapse/expand"),
        Line::from("c/e: collapse/expand all"),
        Line::from("Click: toggle folder"),
    ];
    frame.render_widget(
        Paragraph::new(help_lines).block(Block::default().title(" Controls ").borders(Borders::ALL)),
        left_rows[3],
    );

    let canvas_block = Block::default()
        .title(format!(" Diagram {:.1}x ", app.view.zoom_level))
        .borders(Borders::ALL);
    let canvas_inner = canvas_block.inner(right);

    let Some(diagram) = app.diagram.as_ref() else {
        app.canvas.area = None;
        frame.render_widget(
            Paragraph::new("No diagram yet. Press / and enter owner/repo.")
                .style(Style::default().fg(Color::Gray))
                .block(canvas_block),
            right,
        );
        return;
    };

    // braille cells are roughly twice as tall as they are wide
    let aspect = if canvas_inner.height > 0 {
        (canvas_inner.width as f32 / 2.0) / canvas_inner.height as f32
    } else {
        1.0
    };
    let (x_bounds, y_bounds) = fit_view(&mut app.view, diagram.layout().extent(), aspect);
    app.canvas = CanvasBounds {
        area: Some(canvas_inner),
        x: x_bounds,
        y: y_bounds,
    };
    let cell_w = app.canvas.world_per_cell() as f64;

    let view = &app.view;
    let links: Vec<(Vec2, Vec2)> = diagram
        .links()
        .map(|l| (l.source.current().to_cartesian(), l.target.current().to_cartesian()))
        .filter(|(from, to)| view.is_in_viewport(*from, 0.0) || view.is_in_viewport(*to, 0.0))
        .collect();
    let markers: Vec<(Vec2, &'static str, Color, bool)> = diagram
        .nodes()
        .filter(|s| view.is_in_viewport(s.tween.current().to_cartesian(), 0.0))
        .map(|s| {
            let glyph = match s.kind {
                NodeKind::Branch if s.collapsed => "▣",
                NodeKind::Branch => "■",
                NodeKind::Leaf => "●",
            };
            let selected = app.selected_key.as_deref() == Some(s.key.as_str());
            (
                s.tween.current().to_cartesian(),
                glyph,
                node_color(RadialDiagram::marker_color(s)),
                selected,
            )
        })
        .collect();
    let depths: std::collections::HashMap<&str, usize> =
        diagram.nodes().map(|s| (s.key.as_str(), s.depth)).collect();
    let labels: Vec<(f64, f64, String, bool)> = diagram
        .labels()
        .into_iter()
        .filter_map(|label| {
            let selected = app.selected_key.as_deref() == Some(label.key.as_str());
            let depth = depths.get(label.key.as_str()).copied().unwrap_or(usize::MAX);
            if (!selected && depth > LABEL_DEPTH) || !view.is_in_viewport(label.position, 0.0) {
                return None;
            }
            let width = label.text.chars().count() as f64 * cell_w;
            let x = match label.anchor {
                LabelAnchor::Start => label.position.x as f64 + cell_w,
                LabelAnchor::End => label.position.x as f64 - cell_w - width,
            };
            Some((x, -label.position.y as f64, label.text, selected))
        })
        .collect();

    let canvas = Canvas::default()
        .block(canvas_block)
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(move |ctx| {
            for (from, to) in &links {
                ctx.draw(&CanvasLine {
                    x1: from.x as f64,
                    y1: -from.y as f64,
                    x2: to.x as f64,
                    y2: -to.y as f64,
                    color: Color::DarkGray,
                });
            }
            ctx.layer();
            for (at, glyph, color, selected) in &markers {
                let style = if *selected {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(*color)
                };
                ctx.print(at.x as f64, -at.y as f64, Span::styled(*glyph, style));
            }
            for (x, y, text, selected) in &labels {
                let style = if *selected {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default().fg(Color::Gray)
                };
                ctx.print(*x, *y, Span::styled(text.clone(), style));
            }
        });
    frame.render_widget(canvas, right);
}

/// Size the view's screen space to the diagram at zoom 1 and return the
/// visible world rectangle as canvas `(x_bounds, y_bounds)`. Canvas y grows
/// upwards, world y downwards.
fn fit_view(view: &mut ViewTransform, extent: f32, aspect: f32) -> ([f64; 2], [f64; 2]) {
    let half_h = extent + MARGIN;
    view.update_viewport(2.0 * half_h * aspect, 2.0 * half_h);
    let top_left = view.screen_to_world(Vec2::ZERO);
    let bottom_right = view.screen_to_world(view.viewport);
    (
        [top_left.x as f64, bottom_right.x as f64],
        [-bottom_right.y as f64, -top_left.y as f64],
    )
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut App) -> io::Result<()> {
    let mut last_frame = Instant::now();

    loop {
        app.poll_fetch();

        let dt = last_frame.elapsed().as_secs_f32().min(0.1);
        last_frame = Instant::now();
        if let Some(diagram) = app.diagram.as_mut() {
            diagram.tick(dt);
        }

        terminal.draw(|frame| {
            draw_ui(frame, app);
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(33))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let log_path = logging::default_tui_log_path();
    let _log_guard = logging::init(&config.log_level.0, LogTarget::File(log_path));

    let provider = GitHubProvider::new(&config.github).context("building GitHub client")?;
    let mut app = App::new(config, Arc::new(provider), cli.watch);
    match cli.initial_source() {
        Ok(Some(source)) => app.load(source),
        Ok(None) => {}
        Err(err) => app.status = err.to_string(),
    }

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app_result.context("terminal UI failed")
}
