use egui_glow::glow;

use super::StageApp;
use super::data::{Layer, StateChange, resolve_object};
use crate::color::Color;
use crate::renderer::SceneSummary;
use crate::schema::SceneId;
use crate::settings::{FileSetting, NumberSetting, SettingNode};

impl eframe::App for StageApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.step(ctx);

        egui::SidePanel::right("controls_panel")
            .default_width(280.0)
            .resizable(true)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.heading("Controls");
                    ui.add_space(8.0);

                    // Time controls
                    ui.horizontal(|ui| {
                        ui.checkbox(&mut self.state.auto_time, "Auto Time");
                        if !self.state.auto_time {
                            ui.add(egui::Slider::new(&mut self.state.time, 0.0..=100.0).text("Time"));
                        }
                        if ui.button("Reset").clicked() {
                            self.state.time = 0.0;
                        }
                    });

                    ui.separator();
                    self.selectors(ui);
                    ui.separator();
                    self.object_controls(ui);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::canvas(ui.style()).show(ui, |ui| {
                self.custom_painting(ui);
            });
        });

        ctx.request_repaint();
    }

    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        self.release();
    }
}

impl StageApp {
    /// Layer, renderer and scene pickers. Picks are queued, never applied here.
    fn selectors(&self, ui: &mut egui::Ui) {
        let events = &self.events;

        egui::ComboBox::from_label("Layer")
            .selected_text(self.state.layer.label())
            .show_ui(ui, |ui| {
                for layer in Layer::ALL {
                    if ui.selectable_label(layer == self.state.layer, layer.label()).clicked() {
                        events.push(StateChange::SwitchLayer(layer));
                    }
                }
            });

        let (Some(layer_state), Some(set)) = (self.state.current(), self.layers.get(&self.state.layer)) else {
            return;
        };

        egui::ComboBox::from_label("Renderer")
            .selected_text(layer_state.active_renderer.as_str())
            .show_ui(ui, |ui| {
                for name in set.names() {
                    if ui.selectable_label(name == layer_state.active_renderer, name).clicked() {
                        events.push(StateChange::SwitchRenderer(name.to_string()));
                    }
                }
            });

        let Some(renderer) = set.get(&layer_state.active_renderer) else {
            return;
        };
        let slot = layer_state.renderer();
        let active = slot.and_then(|s| s.active_scene);
        let pending = slot.and_then(|s| s.pending_scene);
        let scenes: Vec<SceneSummary> = renderer
            .scenes()
            .into_iter()
            .filter(|s| self.state.debug || !s.debug_only)
            .collect();
        let label = |id: Option<SceneId>| {
            id.and_then(|id| scenes.iter().find(|s| s.id == id))
                .map(scene_label)
                .unwrap_or_default()
        };

        egui::ComboBox::from_label("Scene")
            .selected_text(label(active))
            .show_ui(ui, |ui| {
                for scene in &scenes {
                    let selected = Some(scene.id) == active || Some(scene.id) == pending;
                    if ui.selectable_label(selected, scene_label(scene)).clicked() {
                        events.push(StateChange::SwitchScene(scene.id));
                    }
                }
            });

        if let Some(id) = pending {
            ui.label(egui::RichText::new(format!("Waiting for {}", label(Some(id)))).small());
        }
    }

    /// Object picker plus the settings tree of the selected object.
    fn object_controls(&self, ui: &mut egui::Ui) {
        let scene = self.state.current().and_then(|layer_state| {
            let renderer = self.layers.get(&self.state.layer)?.get(&layer_state.active_renderer)?;
            renderer.scene(layer_state.renderer()?.active_scene?)
        });
        let Some(scene) = scene else {
            ui.label("No scene loaded");
            return;
        };

        let objects = scene.objects();
        let Some(index) = resolve_object(self.state.selected_object(), &objects) else {
            return;
        };
        let selected = &objects[index];

        egui::ComboBox::from_label("Object")
            .selected_text(object_label(&selected.name))
            .show_ui(ui, |ui| {
                for object in &objects {
                    if ui
                        .selectable_label(object.id == selected.id, object_label(&object.name))
                        .clicked()
                    {
                        self.events.push(StateChange::SwitchObject(object.id));
                    }
                }
            });

        ui.add_space(4.0);
        ui.push_id(("object", selected.id), |ui| settings_ui(ui, &selected.settings));
    }
}

fn scene_label(scene: &SceneSummary) -> String {
    if scene.ready {
        scene.name.clone()
    } else {
        format!("{} (not loaded)", scene.name)
    }
}

fn object_label(name: &str) -> &str {
    if name.trim().is_empty() { "(new)" } else { name }
}

/// Renders a settings tree. Widgets edit a local copy of each value and hand
/// it to `submit`; the next frame shows whatever the renderer reports.
pub fn settings_ui(ui: &mut egui::Ui, nodes: &[SettingNode]) {
    for (i, node) in nodes.iter().enumerate() {
        ui.push_id((i, node.name()), |ui| setting_ui(ui, node));
    }
}

fn setting_ui(ui: &mut egui::Ui, node: &SettingNode) {
    match node {
        SettingNode::Float(s) => {
            let mut value = s.value;
            if number_row(ui, s, &mut value, 0.01) {
                s.submit(value);
            }
        }
        SettingNode::Int(s) => {
            let mut value = s.value;
            if number_row(ui, s, &mut value, 1.0) {
                s.submit(value);
            }
        }
        SettingNode::Color(s) => {
            ui.horizontal(|ui| {
                let mut rgb = s.value.to_array();
                if ui.color_edit_button_srgb(&mut rgb).changed() {
                    s.submit(Color::from_array(rgb));
                }
                ui.label(&s.name);
            });
        }
        SettingNode::Text(s) => {
            ui.label(&s.name);
            let mut value = s.value.clone();
            if ui.text_edit_singleline(&mut value).changed() {
                s.submit(value);
            }
        }
        SettingNode::Dropdown(s) => {
            egui::ComboBox::from_label(&s.name)
                .selected_text(s.active.as_str())
                .show_ui(ui, |ui| {
                    for option in &s.options {
                        if ui.selectable_label(*option == s.active, option).clicked() {
                            s.submit(option.clone());
                        }
                    }
                });
        }
        SettingNode::Button(s) => {
            if ui.button(&s.name).clicked() {
                s.push();
            }
        }
        SettingNode::File(s) => file_row(ui, s),
        SettingNode::ImagePreview(s) => {
            if let Some((texture, size)) = s.image {
                let width = ui.available_width().min(size.x).max(1.0);
                let preview = size * (width / size.x.max(1.0));
                ui.add(egui::Image::new(egui::load::SizedTexture::new(texture, preview)));
            }
        }
        SettingNode::Group(s) => {
            egui::CollapsingHeader::new(&s.name)
                .default_open(true)
                .show(ui, |ui| settings_ui(ui, &s.children));
        }
    }
}

fn number_row<T: egui::emath::Numeric + Copy + Into<f64>>(
    ui: &mut egui::Ui,
    setting: &NumberSetting<T>,
    value: &mut T,
    speed: f64,
) -> bool {
    let min = T::from_f64(setting.min.unwrap_or(T::MIN.to_f64()));
    let max = T::from_f64(setting.max.unwrap_or(T::MAX.to_f64()));
    ui.horizontal(|ui| {
        let changed = ui
            .add(egui::DragValue::new(value).speed(speed).clamp_range(min..=max))
            .changed();
        ui.label(&setting.name);
        changed
    })
    .inner
}

fn file_row(ui: &mut egui::Ui, setting: &FileSetting) {
    ui.horizontal(|ui| {
        let shown = std::path::Path::new(&setting.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("none");
        ui.label(egui::RichText::new(shown).family(egui::FontFamily::Monospace).small());

        if ui.button("Open").clicked() {
            let accept: Vec<&str> = setting.accept.iter().map(String::as_str).collect();
            let dialog = rfd::FileDialog::new().add_filter(&setting.name, &accept);
            if let Some(path) = dialog.pick_file() {
                setting.set(vec![path]);
            }
        }
    });
}
