use egui::{Color32, Context, RichText, ScrollArea, Ui};
use glam::Vec3;

use crate::math::SurfaceParams;
use crate::scene::audio::SpatialMix;
use crate::scene::{DisplayOptions, ParameterChange, StereoMode};
use crate::ui::state::UiState;
use crate::ui::theme::*;

/// Read-only values shown in the panel.
pub struct PanelInfo<'a> {
    pub fps: f32,
    pub adapter: &'a str,
    pub surface_vertices: usize,
    pub line_strips: usize,
    pub marker: Vec3,
    pub mix: SpatialMix,
    pub background: Option<&'a str>,
    pub background_ready: bool,
}

#[derive(Default)]
pub struct UiActions {
    pub parameter_changes: Vec<ParameterChange>,
    pub surface: Option<SurfaceParams>,
    pub display: Option<DisplayOptions>,
    pub vsync: Option<bool>,
    pub reset_view: bool,
}

impl UiActions {
    pub fn needs_redraw(&self) -> bool {
        !self.parameter_changes.is_empty()
            || self.surface.is_some()
            || self.display.is_some()
            || self.reset_view
    }
}

pub fn draw_side_panel(ctx: &Context, state: &mut UiState, info: &PanelInfo) -> UiActions {
    let mut actions = UiActions::default();

    egui::SidePanel::right("control_panel")
        .min_width(300.0)
        .max_width(400.0)
        .default_width(320.0)
        .frame(egui::Frame::default().fill(BG_PANEL).inner_margin(16.0))
        .show(ctx, |ui| {
            ScrollArea::vertical().show(ui, |ui| {
                ui.heading(RichText::new("Stereo Surface").strong());
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    ui.label(RichText::new("left").color(ACCENT_RED).size(11.0));
                    ui.label(RichText::new("/").color(TEXT_MUTED).size(11.0));
                    ui.label(RichText::new("right").color(ACCENT_CYAN).size(11.0));
                    ui.label(RichText::new("anaglyph spindle torus").color(TEXT_MUTED).size(11.0));
                });
                ui.add_space(16.0);

                section_header(ui, "STEREO CAMERA");
                let before = state.stereo;
                stereo_sliders(ui, state);
                actions.parameter_changes = state.stereo.changes_since(&before);
                ui.add_space(16.0);

                section_header(ui, "DISPLAY");
                let display_before = state.display.clone();
                display_controls(ui, &mut state.display);
                if state.display != display_before {
                    actions.display = Some(state.display.clone());
                }
                if ui.button("Reset rotation").clicked() {
                    actions.reset_view = true;
                }
                ui.add_space(16.0);

                ui.separator();
                ui.add_space(12.0);

                section_header(ui, "SURFACE");
                if surface_controls(ui, &mut state.surface) {
                    actions.surface = Some(state.surface);
                }
                if let Some(err) = &state.last_error {
                    error_box(ui, err);
                }
                ui.add_space(16.0);

                section_header(ui, "PERFORMANCE");
                ui.horizontal(|ui| {
                    if ui.checkbox(&mut state.vsync_enabled, "VSync").changed() {
                        actions.vsync = Some(state.vsync_enabled);
                    }
                    ui.checkbox(&mut state.show_stats, "Stats");
                });
                ui.add_space(12.0);

                if state.show_stats {
                    stats_panel(ui, info);
                }
            });
        });

    actions
}

fn section_header(ui: &mut Ui, text: &str) {
    ui.label(RichText::new(text).color(TEXT_MUTED).size(11.0).strong());
    ui.add_space(4.0);
}

fn stereo_sliders(ui: &mut Ui, state: &mut UiState) {
    let sliders = &mut state.stereo;
    egui::Grid::new("stereo_sliders")
        .num_columns(2)
        .spacing([8.0, 6.0])
        .show(ui, |ui| {
            ui.label("Convergence");
            ui.add(egui::Slider::new(&mut sliders.convergence, 0.1..=20.0).logarithmic(true));
            ui.end_row();

            ui.label("Eye separation");
            ui.add(egui::Slider::new(&mut sliders.eye_separation, 0.01..=2.0));
            ui.end_row();

            ui.label("Field of view");
            ui.add(egui::Slider::new(&mut sliders.fov_degrees, 10.0..=120.0).suffix("°"));
            ui.end_row();

            ui.label("Near clip");
            ui.add(egui::Slider::new(&mut sliders.near_clip, 0.1..=20.0));
            ui.end_row();

            ui.label("Far clip");
            ui.add(egui::Slider::new(&mut sliders.far_clip, 5.0..=200.0));
            ui.end_row();
        });
}

fn display_controls(ui: &mut Ui, display: &mut DisplayOptions) {
    ui.horizontal(|ui| {
        ui.label("Mode:");
        ui.selectable_value(&mut display.stereo_mode, StereoMode::Anaglyph, "Anaglyph");
        ui.selectable_value(&mut display.stereo_mode, StereoMode::Mono, "Mono");
    });
    ui.horizontal(|ui| {
        ui.checkbox(&mut display.show_fill, "Fill");
        ui.checkbox(&mut display.show_wireframe, "Wireframe");
        ui.checkbox(&mut display.lighting, "Lighting");
    });
    ui.checkbox(&mut display.animate, "Animate marker");
}

/// Returns true when the user asked for a new mesh.
fn surface_controls(ui: &mut Ui, params: &mut SurfaceParams) -> bool {
    egui::Grid::new("surface_params")
        .num_columns(4)
        .spacing([8.0, 4.0])
        .show(ui, |ui| {
            for (label, value) in [("a", &mut params.a), ("b", &mut params.b)] {
                ui.label(label);
                ui.add(egui::DragValue::new(value).speed(0.01));
            }
            ui.end_row();
            for (label, value) in [("c", &mut params.c), ("d", &mut params.d)] {
                ui.label(label);
                ui.add(egui::DragValue::new(value).speed(0.01));
            }
            ui.end_row();
            ui.label("v");
            ui.add(egui::DragValue::new(&mut params.v_range).speed(0.05).suffix("π"));
            ui.label("t");
            ui.add(egui::DragValue::new(&mut params.t_range).speed(0.05).suffix("π"));
            ui.end_row();
        });

    ui.add_space(8.0);
    let mut regenerate = false;
    ui.horizontal(|ui| {
        if ui
            .add(
                egui::Button::new(RichText::new("Regenerate").color(BG_PURE_BLACK))
                    .fill(ACCENT_YELLOW)
                    .min_size(egui::vec2(120.0, 28.0)),
            )
            .clicked()
        {
            regenerate = true;
        }
        if ui.button("Defaults").clicked() {
            *params = SurfaceParams::default();
            regenerate = true;
        }
    });
    regenerate
}

fn error_box(ui: &mut Ui, err: &str) {
    ui.add_space(6.0);
    egui::Frame::default()
        .fill(Color32::from_rgb(40, 15, 15))
        .stroke(egui::Stroke::new(1.0, ACCENT_RED))
        .rounding(4.0)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.label(RichText::new(err).color(ACCENT_RED).size(11.0));
        });
}

fn stats_panel(ui: &mut Ui, info: &PanelInfo) {
    section_header(ui, "STATISTICS");
    egui::Frame::default()
        .fill(BG_WIDGET)
        .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
        .rounding(6.0)
        .inner_margin(12.0)
        .show(ui, |ui| {
            ui.style_mut().override_font_id =
                Some(egui::FontId::new(11.0, egui::FontFamily::Monospace));

            let fps_color = if info.fps >= 60.0 {
                ACCENT_GREEN
            } else if info.fps >= 30.0 {
                ACCENT_ORANGE
            } else {
                ACCENT_RED
            };

            egui::Grid::new("stats")
                .num_columns(2)
                .spacing([20.0, 4.0])
                .show(ui, |ui| {
                    row(ui, "FPS", RichText::new(format!("{:.0}", info.fps)).color(fps_color));
                    row(ui, "Adapter", RichText::new(info.adapter).color(TEXT_PRIMARY));
                    row(
                        ui,
                        "Vertices",
                        RichText::new(fmt_num(info.surface_vertices)).color(ACCENT_YELLOW),
                    );
                    row(
                        ui,
                        "Strips",
                        RichText::new(info.line_strips.to_string()).color(TEXT_PRIMARY),
                    );
                    row(
                        ui,
                        "Marker",
                        RichText::new(format!(
                            "({:+.2}, {:+.2}, {:+.2})",
                            info.marker.x, info.marker.y, info.marker.z
                        ))
                        .color(ACCENT_RED),
                    );
                    row(
                        ui,
                        "Pan",
                        RichText::new(format!(
                            "{:+.0}° L {:.2} R {:.2}",
                            info.mix.azimuth, info.mix.left, info.mix.right
                        ))
                        .color(ACCENT_CYAN),
                    );
                    row(
                        ui,
                        "Gain",
                        RichText::new(format!("{:.2} @ {:.2}", info.mix.gain, info.mix.distance))
                            .color(TEXT_PRIMARY),
                    );
                });

            ui.add_space(8.0);

            let status = match info.background {
                None => RichText::new("No background").color(TEXT_MUTED),
                Some(name) if info.background_ready => RichText::new(name).color(ACCENT_GREEN),
                Some(_) => RichText::new("Background warming up").color(ACCENT_ORANGE),
            };
            ui.horizontal(|ui| {
                ui.label(RichText::new("Feed:").color(TEXT_MUTED));
                ui.label(status);
            });
        });
}

fn row(ui: &mut Ui, label: &str, value: RichText) {
    ui.label(RichText::new(label).color(TEXT_MUTED));
    ui.label(value);
    ui.end_row();
}

pub fn draw_help_overlay(ctx: &Context, mode: StereoMode) {
    let hint = match mode {
        StereoMode::Anaglyph => "Red/cyan glasses: red lens on the left eye",
        StereoMode::Mono => "Mono view",
    };
    egui::Area::new(egui::Id::new("help_overlay"))
        .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(12.0, -12.0))
        .show(ctx, |ui| {
            egui::Frame::default()
                .fill(Color32::from_black_alpha(180))
                .rounding(6.0)
                .inner_margin(10.0)
                .show(ui, |ui| {
                    ui.style_mut().override_font_id =
                        Some(egui::FontId::new(11.0, egui::FontFamily::Monospace));
                    ui.label(RichText::new("LMB+Drag - Rotate | R - Reset | Space - Animate").color(TEXT_MUTED));
                    ui.label(RichText::new(hint).color(TEXT_MUTED));
                });
        });
}

fn fmt_num(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}
