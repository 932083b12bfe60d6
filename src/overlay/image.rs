use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;

use egui::epaint::{Mesh, Vertex};
use egui::{Color32, TextureHandle, TextureOptions};

use super::{ObjectHandle, ObjectScene, OverlayPoll, Payload, Transform, anchor, clamp_alpha, placed_quad};
use crate::errors::ImageLoadError;
use crate::renderer::{Canvas, ObjectId};
use crate::settings::{FileSetting, GroupSetting, ImagePreview, SettingNode};

pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

pub struct ImageLayer {
    pub name: String,
    /// File the texture was decoded from, empty until one is attached.
    pub path: String,
    pub texture: Option<TextureHandle>,
    pub transform: Transform,
    pub alpha: f64,
}

impl Default for ImageLayer {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            texture: None,
            transform: Transform::default(),
            alpha: 1.0,
        }
    }
}

impl ImageLayer {
    /// On-stage size of the image before the object's own scale: as large
    /// as fits entirely inside the stage.
    pub fn fitted_size(natural: egui::Vec2, stage: egui::Vec2) -> egui::Vec2 {
        if natural.x <= 0.0 || natural.y <= 0.0 {
            return egui::Vec2::ZERO;
        }
        natural * (stage.y / natural.y).min(stage.x / natural.x)
    }
}

struct Decoded {
    id: ObjectId,
    path: PathBuf,
    result: Result<egui::ColorImage, ImageLoadError>,
}

/// Decodes picked files on worker threads; results are picked up by
/// `poll` on the render thread, where the texture upload happens.
pub struct ImageDecoder {
    sender: mpsc::Sender<Decoded>,
    receiver: mpsc::Receiver<Decoded>,
}

impl ImageDecoder {
    pub fn new() -> Rc<Self> {
        let (sender, receiver) = mpsc::channel();
        Rc::new(Self { sender, receiver })
    }

    fn spawn(&self, id: ObjectId, path: PathBuf) {
        let sender = self.sender.clone();
        thread::spawn(move || {
            let result = decode(&path);
            let _ = sender.send(Decoded { id, path, result });
        });
    }
}

pub fn decode(path: &Path) -> Result<egui::ColorImage, ImageLoadError> {
    let image = image::open(path).map_err(|source| ImageLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

impl Payload for ImageLayer {
    type Context = Rc<ImageDecoder>;

    const TIMING_FROM_END: usize = 0;

    fn is_blank(&self) -> bool {
        self.texture.is_none()
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    fn settings(&self, handle: &ObjectHandle<Self>, decoder: &Rc<ImageDecoder>) -> Vec<SettingNode> {
        let mut settings = vec![SettingNode::Text(handle.text("Name", &self.name, true, |o, v| {
            o.payload.name = v;
            o.payload.name.clone()
        }))];

        let picker = {
            let handle = handle.clone();
            let decoder = decoder.clone();
            FileSetting::new("File", self.path.clone(), &ACCEPTED_EXTENSIONS, move |files: Vec<PathBuf>| {
                match files.into_iter().next() {
                    Some(path) => decoder.spawn(handle.id(), path),
                    None => log::warn!("{}", ImageLoadError::NoFile),
                }
            })
        };
        settings.push(SettingNode::Group(GroupSetting::new(
            "Image",
            vec![
                SettingNode::File(picker),
                SettingNode::ImagePreview(ImagePreview {
                    name: "Preview".to_string(),
                    image: self.texture.as_ref().map(|t| (t.id(), t.size_vec2())),
                }),
            ],
        )));
        settings.extend(handle.transform_settings(&self.transform));
        settings.push(SettingNode::Float(
            handle
                .number("Opacity", self.alpha, |o, v| {
                    o.payload.alpha = clamp_alpha(v);
                    o.payload.alpha
                })
                .with_bounds(Some(0.0), Some(1.0)),
        ));
        settings
    }

    fn draw(&self, canvas: &Canvas<'_>) {
        let Some(texture) = &self.texture else {
            return;
        };
        let size = Self::fitted_size(texture.size_vec2(), canvas.size());
        let corners = placed_quad(anchor(canvas, &self.transform), size, &self.transform);
        let alpha = (self.alpha as f32 * 255.0).round() as u8;
        let tint = Color32::from_rgba_unmultiplied(255, 255, 255, alpha);

        let mut mesh = Mesh::with_texture(texture.id());
        let uvs = [egui::pos2(0.0, 0.0), egui::pos2(1.0, 0.0), egui::pos2(1.0, 1.0), egui::pos2(0.0, 1.0)];
        for (pos, uv) in corners.into_iter().zip(uvs) {
            mesh.vertices.push(Vertex { pos, uv, color: tint });
        }
        mesh.indices.extend([0, 1, 2, 0, 2, 3]);
        canvas.painter.add(mesh);
    }

    fn release(&mut self) {
        self.texture = None;
    }
}

impl OverlayPoll for ImageLayer {
    /// Uploads finished decodes and attaches them to their objects.
    fn poll(ctx: &egui::Context, scene: &ObjectScene<Self>) -> bool {
        let mut changed = false;
        while let Ok(done) = scene.context().receiver.try_recv() {
            let image = match done.result {
                Ok(image) => image,
                Err(err) => {
                    log::error!("{err}");
                    continue;
                }
            };
            let mut store = scene.list().borrow_mut();
            let Some(object) = store.get_mut(done.id) else {
                log::warn!("image for removed object {} dropped", done.id);
                continue;
            };
            let texture = ctx.load_texture(done.path.display().to_string(), image, TextureOptions::LINEAR);
            let layer = &mut object.payload;
            layer.texture = Some(texture);
            layer.path = done.path.display().to_string();
            if layer.name.is_empty() {
                layer.name = done
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }
            log::info!("attached {} to image object {}", layer.path, done.id);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::data::Messenger;
    use crate::renderer::Scene;
    use std::time::Duration;

    fn names(settings: &[SettingNode]) -> Vec<&str> {
        settings.iter().map(SettingNode::name).collect()
    }

    #[test]
    fn fit_keeps_aspect_inside_stage() {
        let fitted = ImageLayer::fitted_size(egui::vec2(400.0, 200.0), egui::vec2(100.0, 100.0));
        assert_eq!(fitted, egui::vec2(100.0, 50.0));
        let fitted = ImageLayer::fitted_size(egui::vec2(100.0, 400.0), egui::vec2(200.0, 200.0));
        assert_eq!(fitted, egui::vec2(50.0, 200.0));
    }

    #[test]
    fn timing_leaves_follow_image_settings() {
        let scene = ObjectScene::<ImageLayer>::new(Messenger::default(), ImageDecoder::new());
        let objects = scene.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(
            names(&objects[0].settings),
            ["Name", "Image", "Scale", "Rotation", "Offset", "Opacity", "Active time", "Inactive time", "Time offset"]
        );
    }

    #[test]
    fn picked_file_is_decoded_and_attached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logo.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .expect("write png");

        let ctx = egui::Context::default();
        let scene = ObjectScene::<ImageLayer>::new(Messenger::default(), ImageDecoder::new());
        let objects = scene.objects();
        let Some(SettingNode::File(file)) = SettingNode::find(&objects[0].settings, "File") else {
            panic!("image objects have a file setting");
        };
        file.set(vec![path.clone()]);

        let mut attached = false;
        for _ in 0..500 {
            if ImageLayer::poll(&ctx, &scene) {
                attached = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(attached, "decode never finished");

        let objects = scene.objects();
        assert_eq!(objects.len(), 2, "attaching an image appends a fresh blank");
        assert_eq!(objects[0].name, "logo");
        match SettingNode::find(&objects[0].settings, "Preview") {
            Some(SettingNode::ImagePreview(p)) => assert_eq!(p.image.map(|i| i.1), Some(egui::vec2(4.0, 2.0))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undecodable_file_leaves_object_blank() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").expect("write");
        assert!(matches!(decode(&path), Err(ImageLoadError::Decode { .. })));
    }
}
