pub mod asset;
pub mod config;
pub mod drag;
pub mod preview;
pub mod render;
pub mod web;
pub mod workflow;

use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use futures_channel::oneshot;

use crate::asset::AssetFile;
use crate::config::StudioConfig;
use crate::drag::{DragEvent, DragTracker};
use crate::preview::PlatformBackend;
use crate::render::{HttpTransport, RenderError, TransportError};
use crate::workflow::{Mode, Slot, Studio, WorkflowError};

type Inbox = Arc<Mutex<Option<AssetFile>>>;

const PREVIEW_MAX_HEIGHT: f32 = 160.0;
const RESULT_MAX_HEIGHT: f32 = 360.0;

/// egui front end over a single [`Studio`].
///
/// Pickers and the render task run detached; they only ever drop their
/// result into an inbox or channel that `ui` drains at the start of a frame,
/// so every state change happens on the UI thread.
pub struct StudioApp {
    config: StudioConfig,
    studio: Studio<PlatformBackend>,
    drag: DragTracker,
    /// Whether egui reported hovered files last frame.
    hovering: bool,
    primary_pick: Inbox,
    room_pick: Inbox,
    pending: Option<oneshot::Receiver<Result<String, RenderError>>>,
    /// Model URL last pushed to the external viewer.
    synced_model: Option<String>,
}

impl StudioApp {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            config,
            studio: Studio::new(PlatformBackend::default()),
            drag: DragTracker::new(),
            hovering: false,
            primary_pick: Arc::new(Mutex::new(None)),
            room_pick: Arc::new(Mutex::new(None)),
            pending: None,
            synced_model: None,
        }
    }

    pub fn studio(&self) -> &Studio<PlatformBackend> {
        &self.studio
    }

    pub fn studio_mut(&mut self) -> &mut Studio<PlatformBackend> {
        &mut self.studio
    }

    pub fn drag(&self) -> &DragTracker {
        &self.drag
    }

    /// One frame: apply whatever arrived since the last one, then draw.
    pub fn ui(&mut self, ctx: &egui::Context) {
        self.poll_pickers();
        self.handle_drag_and_drop(ctx);
        self.poll_render();
        self.sync_viewer();

        egui::SidePanel::left("side_panel")
            .resizable(false)
            .min_width(180.0)
            .show(ctx, |ui| {
                ui.heading("ATURE Studio");
                ui.separator();

                match self.studio.mode() {
                    Mode::None => {
                        if ui.button("Let's design").clicked() {
                            report("select picture mode", self.studio.select_mode(Mode::Picture));
                        }
                        ui.label("Blend furniture into your room");
                        ui.separator();
                        if ui.button("Explore in AR").clicked() {
                            report("select AR mode", self.studio.select_mode(Mode::Ar));
                        }
                        ui.label("View 3D models in AR");
                    }
                    mode => {
                        ui.label(mode.label());
                        let change = egui::Button::new("Change mode");
                        if ui.add_enabled(!self.studio.is_rendering(), change).clicked() {
                            report("change mode", self.studio.change_mode());
                        }
                    }
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let mode = self.studio.mode();
            if mode == Mode::None {
                ui.label("Pick a mode to get started.");
                return;
            }

            // ── drop zone ────────────────────────────────────────────────
            let fill = if self.drag.is_active() {
                ui.visuals().selection.bg_fill
            } else {
                ui.visuals().faint_bg_color
            };
            egui::Frame::group(ui.style()).fill(fill).show(ui, |ui| {
                ui.set_min_width(ui.available_width());
                let prompt = if self.drag.is_active() {
                    "Release to upload"
                } else {
                    "Drop your file here"
                };
                ui.label(prompt);
                ui.small(mode.drop_hint());

                let primary = if mode == Mode::Ar { Slot::Model } else { Slot::Furniture };
                if let Some(name) = self.studio.display_name(primary) {
                    ui.label(name);
                }
                if primary == Slot::Furniture {
                    self.show_preview(ui, primary);
                }
                if let Some(handle) = self.studio.preview(primary) {
                    ui.hyperlink_to("Open preview", handle.url());
                }

                let browse = egui::Button::new("Browse files");
                if ui.add_enabled(!self.studio.is_rendering(), browse).clicked() {
                    spawn_file_picker(
                        Arc::clone(&self.primary_pick),
                        mode.label(),
                        mode.accepted_extensions(),
                        ctx,
                    );
                }
            });

            ui.separator();
            match mode {
                Mode::Picture => self.picture_controls(ui, ctx),
                Mode::Ar => {
                    ui.label(
                        "Upload a 3D model to view it in augmented reality \
                         using your device camera.",
                    );
                    if self.studio.preview(Slot::Model).is_some() {
                        ui.small(
                            "Tap \"View in AR\" to place this model in your space \
                             using your device camera.",
                        );
                    }
                }
                Mode::None => {}
            }
        });
    }

    fn picture_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            let room = egui::Button::new("Choose room photo");
            if ui.add_enabled(self.studio.accepts_room(), room).clicked() {
                spawn_file_picker(
                    Arc::clone(&self.room_pick),
                    "Room photo",
                    Mode::Picture.accepted_extensions(),
                    ctx,
                );
            }
            if let Some(name) = self.studio.display_name(Slot::Room) {
                ui.label(name);
            }
        });
        self.show_preview(ui, Slot::Room);
        if let Some(handle) = self.studio.preview(Slot::Room) {
            ui.hyperlink_to("Open room preview", handle.url());
        }

        ui.separator();
        let see_result = egui::Button::new("See result");
        if ui.add_enabled(self.studio.can_request_render(), see_result).clicked() {
            self.start_render(ctx);
        }

        if self.studio.is_rendering() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Generating visualization…");
            });
        }
        if let Some(url) = self.studio.result_url() {
            ui.add(egui::Image::from_uri(url.to_owned()).max_height(RESULT_MAX_HEIGHT));
            ui.hyperlink_to("View result", url);
        }
        if let Some(message) = self.studio.error() {
            ui.colored_label(ui.visuals().error_fg_color, message);
        }
    }

    /// Thumbnail of an image slot, decoded from the file bytes and keyed by
    /// the slot's preview URL so a replaced file gets a fresh texture.
    fn show_preview(&self, ui: &mut egui::Ui, slot: Slot) {
        let (Some(file), Some(handle)) = (self.studio.file(slot), self.studio.preview(slot)) else {
            return;
        };
        let image = egui::Image::from_bytes(handle.url().to_owned(), Arc::clone(&file.bytes))
            .max_height(PREVIEW_MAX_HEIGHT)
            .maintain_aspect_ratio(true);
        ui.add(image);
    }

    fn poll_pickers(&mut self) {
        if let Some(file) = take_inbox(&self.primary_pick) {
            report("picked file", self.studio.ingest_file(file));
        }
        if let Some(file) = take_inbox(&self.room_pick) {
            report("picked room", self.studio.ingest_room_file(file));
        }
    }

    fn handle_drag_and_drop(&mut self, ctx: &egui::Context) {
        let (hovering, dropped) =
            ctx.input(|i| (!i.raw.hovered_files.is_empty(), i.raw.dropped_files.clone()));
        let was_hovering = std::mem::replace(&mut self.hovering, hovering);

        match drag_event(was_hovering, hovering, !dropped.is_empty()) {
            Some(DragEvent::Drop) => {
                let (_, first) = self.drag.drop_files(dropped);
                if let Some(file) = first.and_then(asset_from_dropped) {
                    report("dropped file", self.studio.ingest_file(file));
                }
            }
            Some(event) => {
                self.drag.handle(event);
            }
            None => {}
        }
    }

    fn start_render(&mut self, ctx: &egui::Context) {
        let Some(payload) = report("request render", self.studio.request_render()) else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        let endpoint = self.config.endpoint.clone();
        let ctx = ctx.clone();
        execute(async move {
            let outcome = render::render(&HttpTransport, &endpoint, &payload).await;
            // The receiver is gone only if the app was torn down meanwhile.
            let _ = tx.send(outcome);
            ctx.request_repaint();
        });
        self.pending = Some(rx);
    }

    fn poll_render(&mut self) {
        let Some(rx) = self.pending.as_mut() else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(None) => return,
            Ok(Some(outcome)) => outcome,
            Err(_canceled) => {
                let lost = TransportError("render task was dropped".into());
                Err(RenderError::Transport(lost))
            }
        };
        self.pending = None;
        report("finish render", self.studio.finish_render(outcome));
    }

    fn sync_viewer(&mut self) {
        let current = self.studio.preview(Slot::Model).map(|h| h.url().to_owned());
        if current != self.synced_model {
            web::sync_model_viewer(&self.config.model_viewer_id, current.as_deref());
            self.synced_model = current;
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.studio.teardown();
    }
}

/// Maps egui's per-frame file hover state onto drag events.
fn drag_event(was_hovering: bool, hovering: bool, dropped: bool) -> Option<DragEvent> {
    if dropped {
        return Some(DragEvent::Drop);
    }
    match (was_hovering, hovering) {
        (false, true) => Some(DragEvent::Enter),
        (true, true) => Some(DragEvent::Over),
        (true, false) => Some(DragEvent::Leave),
        (false, false) => None,
    }
}

/// Rejected transitions are expected UI noise; keep them out of the user's face.
fn report<T>(action: &str, result: Result<T, WorkflowError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(WorkflowError::Preview(e)) => {
            log::error!("{action}: {e}");
            None
        }
        Err(e) => {
            log::debug!("{action} ignored: {e}");
            None
        }
    }
}

fn take_inbox(inbox: &Inbox) -> Option<AssetFile> {
    inbox.lock().ok().and_then(|mut guard| guard.take())
}

fn asset_from_dropped(file: egui::DroppedFile) -> Option<AssetFile> {
    if let Some(bytes) = file.bytes {
        return Some(AssetFile::new(file.name, bytes).with_mime(&file.mime));
    }
    let path = file.path?;
    let name = path.file_name()?.to_string_lossy().into_owned();
    match std::fs::read(&path) {
        Ok(bytes) => Some(AssetFile::new(name, bytes).with_mime(&file.mime)),
        Err(e) => {
            log::warn!("could not read dropped file {}: {e}", path.display());
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn spawn_file_picker(
    target: Inbox,
    filter_name: &'static str,
    exts: &'static [&'static str],
    ctx: &egui::Context,
) {
    let ctx = ctx.clone();
    execute(async move {
        if let Some(handle) = rfd::AsyncFileDialog::new()
            .add_filter(filter_name, exts)
            .pick_file()
            .await
        {
            let bytes = handle.read().await;
            let file = AssetFile::new(handle.file_name(), bytes);
            if let Ok(mut slot) = target.lock() {
                *slot = Some(file);
            }
            ctx.request_repaint();
        }
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_file_picker(
    _target: Inbox,
    filter_name: &'static str,
    _exts: &'static [&'static str],
    _ctx: &egui::Context,
) {
    log::warn!("{filter_name}: file picker is only available in the browser, drop a file instead");
}

// ── Web entry‑point ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    use wasm_bindgen::JsCast;

    let loaded = StudioConfig::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // Redirect `log` macros & panic messages to the browser console
    eframe::WebLogger::init(config.level_filter().unwrap_or(log::LevelFilter::Debug)).ok();
    console_error_panic_hook::set_once();
    if let Err(e) = &loaded {
        log::warn!("falling back to default config: {e:#}");
    }

    let canvas = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id("ature_canvas"))
        .ok_or_else(|| JsValue::from_str("missing #ature_canvas"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()?;

    eframe::WebRunner::new()
        .start(
            canvas,
            eframe::WebOptions::default(),
            Box::new(|cc| {
                egui_extras::install_image_loaders(&cc.egui_ctx);
                Ok(Box::new(StudioApp::new(config)))
            }),
        )
        .await?;

    Ok(())
}

// Executes an async future without blocking the egui thread
#[cfg(not(target_arch = "wasm32"))]
fn execute<F: Future<Output = ()> + Send + 'static>(f: F) {
    std::thread::spawn(move || futures::executor::block_on(f));
}
#[cfg(target_arch = "wasm32")]
fn execute<F: Future<Output = ()> + 'static>(f: F) {
    wasm_bindgen_futures::spawn_local(f);
}
