//! Interactive window for a rendered surface

use crate::error::{Result, SurfaceError};
use eframe::egui;
use egui::{ColorImage, TextureHandle, TextureOptions};
use tracing::{info, warn};

/// Shows one pre-rendered surface image until the window is closed
pub struct SurfaceViewer {
    title: String,
    summary: String,
    image: Option<ColorImage>,
    texture: Option<TextureHandle>,
}

impl SurfaceViewer {
    pub fn new(title: &str, summary: &str, image: ColorImage) -> Self {
        Self {
            title: title.to_string(),
            summary: summary.to_string(),
            image: Some(image),
            texture: None,
        }
    }
}

impl eframe::App for SurfaceViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Upload once; the image never changes
        if self.texture.is_none() {
            if let Some(image) = self.image.take() {
                self.texture =
                    Some(ctx.load_texture("volatility-surface", image, TextureOptions::LINEAR));
            }
        }

        egui::TopBottomPanel::top("summary").show(ctx, |ui| {
            ui.heading(&self.title);
            ui.label(&self.summary);
        });

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) => {
                ui.centered_and_justified(|ui| {
                    ui.add(
                        egui::Image::new(egui::load::SizedTexture::from_handle(texture))
                            .shrink_to_fit(),
                    );
                });
            }
            None => {
                ui.label("Rendering volatility surface...");
            }
        });
    }
}

/// Block the calling thread on a native window showing `image`
pub fn show_surface_window(title: &str, summary: &str, image: ColorImage) -> Result<()> {
    let [width, height] = image.size;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(title)
            .with_inner_size([width as f32, height as f32 + 60.0]),
        ..Default::default()
    };

    let app = SurfaceViewer::new(title, summary, image);
    info!("Opening surface window; close it to exit");

    eframe::run_native(title, native_options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|e| {
            let err_msg = format!("Failed to start GUI: {}", e);
            warn!("{}", err_msg);
            SurfaceError::GuiError(err_msg)
        })
}
