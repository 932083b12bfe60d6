use std::sync::Arc;

use egui::epaint::{Mesh, Vertex};
use egui::{Color32, FontFamily, FontId, Galley};

use super::{ObjectHandle, OverlayPoll, Payload, Transform, anchor, clamp_alpha};
use crate::color::Color;
use crate::renderer::Canvas;
use crate::settings::{GroupSetting, SettingNode};

const FILL_STYLES: [&str; 2] = ["fill", "stroke"];
const FONT_FAMILIES: [&str; 2] = ["sans-serif", "monospace"];
/// Size the text is laid out at before being fitted to the stage.
const REFERENCE_SIZE: f32 = 100.0;
/// Half-width of the outline drawn for the `stroke` style, in points.
const STROKE_WIDTH: f32 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub content: String,
    pub transform: Transform,
    pub color: Color,
    pub alpha: f64,
    /// One of `FILL_STYLES`.
    pub fill_style: String,
    /// Empty means "fit to the stage"; otherwise a size in points, with an
    /// optional `px` suffix.
    pub font_size: String,
    /// One of `FONT_FAMILIES`.
    pub font_family: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            content: String::new(),
            transform: Transform::default(),
            color: Color::BLACK,
            alpha: 1.0,
            fill_style: FILL_STYLES[0].to_string(),
            font_size: String::new(),
            font_family: FONT_FAMILIES[0].to_string(),
        }
    }
}

impl TextStyle {
    fn family(&self) -> FontFamily {
        match self.font_family.as_str() {
            "monospace" => FontFamily::Monospace,
            _ => FontFamily::Proportional,
        }
    }

    /// Font size in points for a stage of `stage` size. `laid_out` is the
    /// text measured at `REFERENCE_SIZE`.
    pub fn resolved_size(&self, stage: egui::Vec2, laid_out: egui::Vec2) -> f32 {
        if let Some(size) = parse_font_size(&self.font_size) {
            return size;
        }
        if laid_out.x <= 0.0 || laid_out.y <= 0.0 {
            return REFERENCE_SIZE;
        }
        let vertical = stage.y / laid_out.y;
        let horizontal = stage.x / (laid_out.x * 1.05);
        (vertical.min(horizontal) * REFERENCE_SIZE).floor().max(1.0)
    }
}

pub fn parse_font_size(input: &str) -> Option<f32> {
    let trimmed = input.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    number.parse::<f32>().ok().filter(|size| size.is_finite() && *size > 0.0)
}

impl Payload for TextStyle {
    type Context = ();

    const TIMING_FROM_END: usize = 2;

    fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    fn label(&self) -> &str {
        &self.content
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    fn settings(&self, handle: &ObjectHandle<Self>, _cx: &()) -> Vec<SettingNode> {
        let mut settings = vec![SettingNode::Text(handle.text("Text content", &self.content, true, |o, v| {
            o.payload.content = v;
            o.payload.content.clone()
        }))];
        settings.extend(handle.transform_settings(&self.transform));
        settings.push(SettingNode::Group(GroupSetting::new(
            "Color",
            vec![
                SettingNode::Color(handle.color("Color", self.color, |o, v| {
                    o.payload.color = v;
                    v
                })),
                SettingNode::Float(
                    handle
                        .number("Opacity", self.alpha, |o, v| {
                            o.payload.alpha = clamp_alpha(v);
                            o.payload.alpha
                        })
                        .with_bounds(Some(0.0), Some(1.0)),
                ),
            ],
        )));
        settings.push(SettingNode::Dropdown(handle.dropdown(
            "Fill style",
            &FILL_STYLES,
            &self.fill_style,
            |o, v| {
                if FILL_STYLES.contains(&v.as_str()) {
                    o.payload.fill_style = v;
                }
                o.payload.fill_style.clone()
            },
        )));
        settings.push(SettingNode::Group(GroupSetting::new(
            "Font",
            vec![
                SettingNode::Text(handle.text("Font size", &self.font_size, false, |o, v| {
                    o.payload.font_size = v;
                    o.payload.font_size.clone()
                })),
                SettingNode::Dropdown(handle.dropdown("Font family", &FONT_FAMILIES, &self.font_family, |o, v| {
                    if FONT_FAMILIES.contains(&v.as_str()) {
                        o.payload.font_family = v;
                    }
                    o.payload.font_family.clone()
                })),
            ],
        )));
        settings
    }

    fn draw(&self, canvas: &Canvas<'_>) {
        let painter = canvas.painter;
        let measured = painter.layout_no_wrap(
            self.content.clone(),
            FontId::new(REFERENCE_SIZE, self.family()),
            Color32::WHITE,
        );
        let size = self.resolved_size(canvas.size(), measured.size());
        let galley = painter.layout_no_wrap(self.content.clone(), FontId::new(size, self.family()), Color32::WHITE);

        let color = self.color.to_color32(self.alpha as f32);
        let center = anchor(canvas, &self.transform);
        let atlas = painter.ctx().fonts(|f| f.font_image_size());

        if self.fill_style == "stroke" {
            let ring = egui::Vec2::splat(STROKE_WIDTH);
            for (dx, dy) in [(-1.0, -1.0), (0.0, -1.0), (1.0, -1.0), (-1.0, 0.0), (1.0, 0.0), (-1.0, 1.0), (0.0, 1.0), (1.0, 1.0)] {
                let nudge = egui::vec2(dx * ring.x, dy * ring.y);
                painter.add(text_mesh(&galley, center + nudge, &self.transform, color, atlas));
            }
            let inner = if self.color.luminance() > 0.5 { Color32::BLACK } else { Color32::WHITE };
            let inner = Color32::from_rgba_unmultiplied(inner.r(), inner.g(), inner.b(), color.a());
            painter.add(text_mesh(&galley, center, &self.transform, inner, atlas));
        } else {
            painter.add(text_mesh(&galley, center, &self.transform, color, atlas));
        }
    }
}

impl OverlayPoll for TextStyle {}

/// Glyph quads of `galley`, centred on `center`, with the object's
/// (possibly non-uniform) scale and rotation applied.
fn text_mesh(galley: &Arc<Galley>, center: egui::Pos2, transform: &Transform, color: Color32, atlas: [usize; 2]) -> Mesh {
    let uv_scale = egui::vec2(1.0 / atlas[0].max(1) as f32, 1.0 / atlas[1].max(1) as f32);
    let middle = galley.rect.center().to_vec2();
    let scale = egui::vec2(transform.scale[0] as f32, transform.scale[1] as f32);
    let rot = egui::emath::Rot2::from_angle((transform.rotation as f32).to_radians());

    let mut mesh = Mesh::default();
    for row in &galley.rows {
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend(row.visuals.mesh.vertices.iter().map(|v| {
            Vertex {
                pos: place_glyph(v.pos.to_vec2() - middle, center, scale, rot),
                uv: (v.uv.to_vec2() * uv_scale).to_pos2(),
                color: tint(v.color, color),
            }
        }));
        mesh.indices.extend(row.visuals.mesh.indices.iter().map(|i| base + i));
    }
    mesh
}

/// Rotates about the text centre first, then scales along the stage axes.
fn place_glyph(local: egui::Vec2, center: egui::Pos2, scale: egui::Vec2, rot: egui::emath::Rot2) -> egui::Pos2 {
    center + (rot * local) * scale
}

/// Glyph vertices carry coverage in their alpha; keep it and take the rest
/// from the object's color.
fn tint(glyph: Color32, color: Color32) -> Color32 {
    let coverage = glyph.a() as f32 / 255.0;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), (color.a() as f32 * coverage).round() as u8)
}
