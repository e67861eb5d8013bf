use anyhow::Context;
use clap::Parser;
use eframe::egui;
use glam::Vec2;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use reporadial::canvas::ViewTransform;
use reporadial::category::NodeCategory;
use reporadial::cli::Cli;
use reporadial::diagram::{LabelAnchor, RadialDiagram, HOVER_MARKER_RADIUS};
use reporadial::logging::{self, LogTarget};
use reporadial::provider::GitHubProvider;
use reporadial::request::{FetchCoordinator, RepoSource};
use reporadial::tree::NodeKind;
use reporadial::watch::RepoWatcher;
use reporadial::{Config, FileTree};

const OVERLAY_PADDING: f32 = 12.0;
const OUTLINE_SAMPLES: usize = 8;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = logging::init(&config.log_level.0, LogTarget::Stderr);

    let provider = GitHubProvider::new(&config.github).context("building GitHub client")?;
    let mut app = RadialApp::new(config, Arc::new(provider), cli.watch);
    match cli.initial_source() {
        Ok(Some(source)) => app.load(source),
        Ok(None) => {}
        Err(err) => app.status = err.to_string(),
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("reporadial"),
        ..Default::default()
    };

    eframe::run_native(
        "reporadial",
        options,
        Box::new(|cc| {
            configure_style(&cc.egui_ctx);
            Box::new(app)
        }),
    )
    .map_err(|err| anyhow::anyhow!("{err}"))
}

fn configure_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = egui::Color32::from_rgb(18, 22, 30);
    visuals.window_rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);
    style.visuals = visuals;
    style.spacing.item_spacing = egui::vec2(10.0, 6.0);
    ctx.set_style(style);
}

struct RadialApp {
    config: Config,
    repo_input: String,
    status: String,
    fetcher: FetchCoordinator,
    diagram: Option<RadialDiagram>,
    view: ViewTransform,
    surface: egui::Vec2,
    watch_local: bool,
    watcher: Option<RepoWatcher>,
}

impl RadialApp {
    fn new(config: Config, provider: Arc<GitHubProvider>, watch_local: bool) -> Self {
        Self {
            config,
            repo_input: String::new(),
            status: String::from("Enter a repository as owner/repo"),
            fetcher: FetchCoordinator::new(provider),
            diagram: None,
            view: ViewTransform::new(1200.0, 800.0),
            surface: egui::vec2(1200.0, 800.0),
            watch_local,
            watcher: None,
        }
    }

    fn load(&mut self, source: RepoSource) {
        self.repo_input = source.to_string();
        self.status = format!("Loading {source} ...");
        self.fetcher.submit(source);
    }

    fn submit_input(&mut self) {
        match self.fetcher.submit_input(&self.repo_input) {
            Ok(_) => self.status = format!("Loading {} ...", self.repo_input.trim()),
            // not ready yet: no fetch
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
                let conflicts = tree.conflicts().len();
                self.status = format!(
                    "{}: {} files, {} entries",
                    delivery.source,
                    tree.leaf_count(),
                    tree.node_count()
                );
                if conflicts > 0 {
                    self.status.push_str(&format!(", {conflicts} name conflicts"));
                }
                self.diagram = Some(RadialDiagram::render(
                    tree,
                    self.surface.x,
                    self.surface.y,
                    &self.config,
                ));
                self.view.reset();
                self.ensure_watcher(&delivery.source);
            }
            Err(err) => {
                self.status = format!("Fetch failed: {err}");
            }
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

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("reporadial");
            ui.separator();

            ui.label("Repository:");
            let input = ui.add(
                egui::TextEdit::singleline(&mut self.repo_input)
                    .hint_text("owner/repo")
                    .desired_width(260.0),
            );
            let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Load").clicked() || submitted {
                self.submit_input();
            }

            if self.fetcher.is_pending() {
                ui.spinner();
            }

            ui.separator();
            if let Some(diagram) = self.diagram.as_mut() {
                if ui.button("Collapse all").clicked() {
                    diagram.collapse_all();
                }
                if ui.button("Expand all").clicked() {
                    diagram.expand_all();
                }
                if ui.button("Reset view").clicked() {
                    self.view.reset();
                }
            }
            ui.label(format!("{:.1}x", self.view.zoom_level));
        });
        ui.label(egui::RichText::new(&self.status).small());
    }

    fn draw_diagram(&mut self, ui: &mut egui::Ui) {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());

        if rect.size() != self.surface {
            self.surface = rect.size();
            self.view.update_viewport(rect.width(), rect.height());
            if let Some(diagram) = self.diagram.as_mut() {
                diagram.resize(rect.width(), rect.height());
            }
        }

        let Some(diagram) = self.diagram.as_mut() else {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No diagram yet",
                egui::FontId::proportional(16.0),
                egui::Color32::GRAY,
            );
            return;
        };

        let origin = rect.min.to_vec2();
        let local = |pos: egui::Pos2| Vec2::new(pos.x - origin.x, pos.y - origin.y);

        if response.dragged() {
            let delta = response.drag_delta();
            self.view.pan(Vec2::new(delta.x, delta.y));
        }
        if response.hovered() {
            let zoom = ui.input(|i| i.zoom_delta());
            if (zoom - 1.0).abs() > f32::EPSILON {
                if let Some(pos) = response.hover_pos() {
                    self.view.zoom(zoom, local(pos));
                }
            }
        }

        let tolerance = HOVER_MARKER_RADIUS / self.view.zoom_level;
        let hovered = response
            .hover_pos()
            .and_then(|pos| diagram.hit_test(self.view.screen_to_world(local(pos)), tolerance));
        diagram.hover(hovered);
        if hovered.is_some() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                diagram.click_at(self.view.screen_to_world(local(pos)), tolerance);
            }
        }

        let dt = ui.input(|i| i.stable_dt).min(0.1);
        if diagram.tick(dt) {
            ui.ctx().request_repaint();
        }

        let view = &self.view;
        let to_screen = |world: Vec2| {
            let p = view.world_to_screen(world);
            egui::pos2(p.x + origin.x, p.y + origin.y)
        };
        let painter = ui.painter_at(rect);

        let root = diagram.tree().get_root();
        for (id, envelope) in diagram.live_overlays().iter() {
            if *id == root || envelope.is_degenerate() {
                continue;
            }
            let points: Vec<egui::Pos2> = envelope
                .padded(OVERLAY_PADDING)
                .outline(OUTLINE_SAMPLES)
                .into_iter()
                .map(to_screen)
                .collect();
            painter.add(egui::Shape::convex_polygon(
                points,
                egui::Color32::from_rgba_unmultiplied(120, 140, 170, 18),
                egui::Stroke::new(1.0, egui::Color32::from_rgba_unmultiplied(120, 140, 170, 60)),
            ));
        }

        let link_stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(0x55, 0x60, 0x70));
        for link in diagram.links() {
            let from = to_screen(link.source.current().to_cartesian());
            let to = to_screen(link.target.current().to_cartesian());
            painter.line_segment([from, to], link_stroke);
        }

        for sprite in diagram.nodes() {
            let world = sprite.tween.current().to_cartesian();
            if !view.is_in_viewport(world, HOVER_MARKER_RADIUS * 2.0) {
                continue;
            }
            let center = to_screen(world);
            let radius = diagram.marker_radius(sprite.id);
            let (r, g, b) = RadialDiagram::marker_color(sprite);
            let fill = egui::Color32::from_rgb(r, g, b);
            match sprite.kind {
                NodeKind::Branch => {
                    let marker = egui::Rect::from_center_size(center, egui::vec2(radius * 2.0, radius * 2.0));
                    let stroke = if sprite.collapsed {
                        egui::Stroke::new(1.5, egui::Color32::WHITE)
                    } else {
                        egui::Stroke::NONE
                    };
                    painter.rect(marker, 1.0, fill, stroke);
                }
                NodeKind::Leaf => {
                    painter.circle_filled(center, radius, fill);
                }
            }
        }

        for label in diagram.labels() {
            if !view.is_in_viewport(label.position, 200.0) {
                continue;
            }
            let anchor = to_screen(label.position) + egui::vec2(label.offset, 0.0);
            let align = match label.anchor {
                LabelAnchor::Start => egui::Align2::LEFT_CENTER,
                LabelAnchor::End => egui::Align2::RIGHT_CENTER,
            };
            painter.text(
                anchor,
                align,
                &label.text,
                egui::FontId::proportional(11.0),
                egui::Color32::from_gray(210),
            );
        }

        if let Some(sprite) = hovered.and_then(|id| diagram.nodes().find(|s| s.id == id)) {
            let kind = match sprite.kind {
                NodeKind::Branch if sprite.collapsed => "folder (collapsed)",
                NodeKind::Branch => "folder",
                NodeKind::Leaf => "file",
            };
            let summary = if sprite.category == NodeCategory::None {
                format!("{}  [{}]", sprite.key, kind)
            } else {
                format!("{}  [{}, {}]", sprite.key, kind, sprite.category.label())
            };
            painter.text(
                rect.left_bottom() + egui::vec2(8.0, -8.0),
                egui::Align2::LEFT_BOTTOM,
                summary,
                egui::FontId::monospace(12.0),
                egui::Color32::from_gray(180),
            );
        }
    }
}

impl eframe::App for RadialApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_fetch();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            self.toolbar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_diagram(ui);
        });

        if self.fetcher.is_pending() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else if self.watcher.is_some() {
            ctx.request_repaint_after(Duration::from_millis(500));
        }
    }
}
