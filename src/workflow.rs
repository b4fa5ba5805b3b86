//! The studio controller: mode, slots, previews and the render cycle.
//!
//! [`Studio`] is the single owner of every piece of workflow state. The
//! externally visible [`Stage`] is derived from that state rather than stored,
//! so it cannot drift out of sync with the slots.
//!
//! Slot writes go through `fill_slot` / `clear_slot`, which are the only
//! callers of the preview registry. The async render path never touches
//! previews; it only reports back through [`Studio::finish_render`].

use std::collections::HashMap;

use thiserror::Error;

use crate::asset::{AssetFile, AssetKind, IMAGE_EXTENSIONS, MODEL_EXTENSIONS};
use crate::preview::{PreviewBackend, PreviewError, PreviewHandle, PreviewRegistry};
use crate::render::{RenderError, RenderPayload};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    None,
    /// Blend a furniture photo into a room photo.
    Picture,
    /// View a 3D model in augmented reality.
    Ar,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::None => "",
            Mode::Picture => "Design Mode",
            Mode::Ar => "Explore Mode",
        }
    }

    /// Extensions the primary picker offers in this mode.
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            Mode::None => &[],
            Mode::Picture => IMAGE_EXTENSIONS,
            Mode::Ar => MODEL_EXTENSIONS,
        }
    }

    pub fn drop_hint(self) -> &'static str {
        match self {
            Mode::None => "",
            Mode::Picture => "Images (JPG, PNG, WEBP)",
            Mode::Ar => "3D models (GLB, GLTF, USDZ)",
        }
    }

    /// Asset kind the primary slot of this mode takes.
    fn primary_kind(self) -> Option<AssetKind> {
        match self {
            Mode::None => None,
            Mode::Picture => Some(AssetKind::Image),
            Mode::Ar => Some(AssetKind::Model3D),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Furniture,
    Room,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unselected,
    PictureMode,
    AwaitingRoom,
    ReadyToRender,
    Rendering,
    Rendered,
    RenderFailed,
    ArMode,
    ModelLoaded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RenderState {
    #[default]
    Idle,
    InFlight,
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("mode already selected ({0:?}); change mode first")]
    ModeAlreadySelected(Mode),
    #[error("`{0:?}` is not a selectable mode")]
    InvalidMode(Mode),
    #[error("no mode selected")]
    NoModeSelected,
    #[error("{kind:?} files are not accepted in {mode:?} mode")]
    WrongAssetKind { mode: Mode, kind: AssetKind },
    #[error("room images are only used in picture mode")]
    RoomOutsidePictureMode,
    #[error("add a furniture image before the room")]
    FurnitureMissing,
    #[error("a render is already in flight")]
    RenderInFlight,
    #[error("render needs both images (currently {0:?})")]
    NotReady(Stage),
    #[error("no render is in flight")]
    NotRendering,
    #[error(transparent)]
    Preview(#[from] PreviewError),
}

pub struct Studio<B: PreviewBackend> {
    mode: Mode,
    files: HashMap<Slot, AssetFile>,
    previews: PreviewRegistry<B>,
    render: RenderState,
}

impl<B: PreviewBackend> Studio<B> {
    pub fn new(backend: B) -> Self {
        Self {
            mode: Mode::None,
            files: HashMap::new(),
            previews: PreviewRegistry::new(backend),
            render: RenderState::Idle,
        }
    }

    // ── queries ──────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stage(&self) -> Stage {
        match self.mode {
            Mode::None => Stage::Unselected,
            Mode::Ar if self.files.contains_key(&Slot::Model) => Stage::ModelLoaded,
            Mode::Ar => Stage::ArMode,
            Mode::Picture => match (self.file(Slot::Furniture), self.file(Slot::Room)) {
                (None, _) => Stage::PictureMode,
                (Some(_), None) => Stage::AwaitingRoom,
                (Some(_), Some(_)) => match self.render {
                    RenderState::Idle => Stage::ReadyToRender,
                    RenderState::InFlight => Stage::Rendering,
                    RenderState::Succeeded(_) => Stage::Rendered,
                    RenderState::Failed(_) => Stage::RenderFailed,
                },
            },
        }
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    pub fn result_url(&self) -> Option<&str> {
        match &self.render {
            RenderState::Succeeded(url) => Some(url.as_str()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.render {
            RenderState::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn file(&self, slot: Slot) -> Option<&AssetFile> {
        self.files.get(&slot)
    }

    pub fn display_name(&self, slot: Slot) -> Option<&str> {
        self.file(slot).map(|f| f.name.as_str())
    }

    pub fn preview(&self, slot: Slot) -> Option<&PreviewHandle> {
        self.previews.get(slot)
    }

    pub fn previews(&self) -> &PreviewRegistry<B> {
        &self.previews
    }

    pub fn live_previews(&self) -> usize {
        self.previews.live_count()
    }

    pub fn is_rendering(&self) -> bool {
        self.render == RenderState::InFlight
    }

    /// Whether the room picker should be enabled.
    pub fn accepts_room(&self) -> bool {
        self.mode == Mode::Picture
            && self.files.contains_key(&Slot::Furniture)
            && !self.is_rendering()
    }

    /// Whether the "see result" control should be enabled.
    ///
    /// A successful result stays put until an input changes; a failure can be retried.
    pub fn can_request_render(&self) -> bool {
        matches!(self.stage(), Stage::ReadyToRender | Stage::RenderFailed)
    }

    // ── transitions ──────────────────────────────────────────────────────

    pub fn select_mode(&mut self, mode: Mode) -> Result<(), WorkflowError> {
        if mode == Mode::None {
            return Err(WorkflowError::InvalidMode(mode));
        }
        if self.mode != Mode::None {
            return Err(WorkflowError::ModeAlreadySelected(self.mode));
        }
        log::info!("mode selected: {mode:?}");
        self.mode = mode;
        Ok(())
    }

    /// Back to [`Stage::Unselected`], dropping every slot and preview.
    pub fn change_mode(&mut self) -> Result<(), WorkflowError> {
        if self.mode == Mode::None {
            return Err(WorkflowError::NoModeSelected);
        }
        self.ensure_idle()?;
        for slot in [Slot::Furniture, Slot::Room, Slot::Model] {
            self.clear_slot(slot);
        }
        self.render = RenderState::Idle;
        log::info!("mode cleared (was {:?})", self.mode);
        self.mode = Mode::None;
        Ok(())
    }

    /// Primary ingestion path (drop target and main picker).
    ///
    /// Picture mode takes images into the furniture slot; AR mode takes 3D
    /// models into the model slot. Anything else is rejected without touching
    /// state.
    pub fn ingest_file(&mut self, file: AssetFile) -> Result<Slot, WorkflowError> {
        let expected = self.mode.primary_kind().ok_or(WorkflowError::NoModeSelected)?;
        self.ensure_idle()?;
        let kind = file.kind();
        if kind != expected {
            return Err(WorkflowError::WrongAssetKind { mode: self.mode, kind });
        }
        let slot = match kind {
            AssetKind::Image => Slot::Furniture,
            AssetKind::Model3D => Slot::Model,
        };
        if slot == Slot::Furniture {
            self.invalidate_result();
        }
        self.fill_slot(slot, file)?;
        Ok(slot)
    }

    pub fn ingest_room_file(&mut self, file: AssetFile) -> Result<(), WorkflowError> {
        match self.mode {
            Mode::None => return Err(WorkflowError::NoModeSelected),
            Mode::Ar => return Err(WorkflowError::RoomOutsidePictureMode),
            Mode::Picture => {}
        }
        self.ensure_idle()?;
        if !self.files.contains_key(&Slot::Furniture) {
            return Err(WorkflowError::FurnitureMissing);
        }
        let kind = file.kind();
        if kind != AssetKind::Image {
            return Err(WorkflowError::WrongAssetKind { mode: self.mode, kind });
        }
        self.invalidate_result();
        self.fill_slot(Slot::Room, file)
    }

    /// Moves to [`Stage::Rendering`] and hands back the inputs for the remote call.
    ///
    /// Also accepted from [`Stage::RenderFailed`], which is how a failure gets
    /// retried. [`Stage::Rendered`] needs a changed input first.
    pub fn request_render(&mut self) -> Result<RenderPayload, WorkflowError> {
        self.ensure_idle()?;
        let stage = self.stage();
        if !self.can_request_render() {
            return Err(WorkflowError::NotReady(stage));
        }
        let (Some(furniture), Some(room)) = (self.file(Slot::Furniture), self.file(Slot::Room))
        else {
            return Err(WorkflowError::NotReady(stage));
        };
        let payload = RenderPayload { furniture: furniture.clone(), room: room.clone() };
        self.render = RenderState::InFlight;
        log::info!("render requested: {} + {}", payload.furniture.name, payload.room.name);
        Ok(payload)
    }

    pub fn on_render_success(
        &mut self,
        result_url: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        if !self.is_rendering() {
            return Err(WorkflowError::NotRendering);
        }
        let url = result_url.into();
        log::info!("render finished: {url}");
        self.render = RenderState::Succeeded(url);
        Ok(())
    }

    pub fn on_render_failure(
        &mut self,
        message: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        if !self.is_rendering() {
            return Err(WorkflowError::NotRendering);
        }
        let message = message.into();
        log::warn!("render failed: {message}");
        self.render = RenderState::Failed(message);
        Ok(())
    }

    /// Applies the outcome of [`crate::render::render`].
    pub fn finish_render(
        &mut self,
        outcome: Result<String, RenderError>,
    ) -> Result<(), WorkflowError> {
        match outcome {
            Ok(url) => self.on_render_success(url),
            Err(err) => {
                log::debug!("render error detail: {err}");
                self.on_render_failure(err.user_message())
            }
        }
    }

    /// Releases every live preview and forgets all inputs.
    pub fn teardown(&mut self) {
        let released = self.previews.release_all();
        self.files.clear();
        self.render = RenderState::Idle;
        self.mode = Mode::None;
        log::debug!("studio torn down, {released} preview(s) released");
    }

    // ── internals ────────────────────────────────────────────────────────

    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        if self.is_rendering() {
            return Err(WorkflowError::RenderInFlight);
        }
        Ok(())
    }

    fn invalidate_result(&mut self) {
        if self.render != RenderState::Idle {
            log::debug!("inputs changed, discarding {:?}", self.render);
            self.render = RenderState::Idle;
        }
    }

    fn fill_slot(&mut self, slot: Slot, file: AssetFile) -> Result<(), WorkflowError> {
        self.clear_slot(slot);
        self.previews.install(slot, &file)?;
        log::info!("{slot:?} <- {} ({} bytes)", file.name, file.len());
        self.files.insert(slot, file);
        Ok(())
    }

    fn clear_slot(&mut self, slot: Slot) {
        self.previews.release(slot);
        self.files.remove(&slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::MemoryBackend;

    fn file(name: &str) -> AssetFile {
        AssetFile::new(name, name.as_bytes().to_vec())
    }

    fn picture_studio() -> Studio<MemoryBackend> {
        let mut studio = Studio::new(MemoryBackend::new());
        studio.select_mode(Mode::Picture).unwrap();
        studio
    }

    fn ready_studio() -> Studio<MemoryBackend> {
        let mut studio = picture_studio();
        studio.ingest_file(file("chair.jpg")).unwrap();
        studio.ingest_room_file(file("room.png")).unwrap();
        studio
    }

    #[test]
    fn starts_unselected() {
        let studio = Studio::new(MemoryBackend::new());
        assert_eq!(studio.mode(), Mode::None);
        assert_eq!(studio.stage(), Stage::Unselected);
        assert!(!studio.can_request_render());
        assert_eq!(studio.live_previews(), 0);
    }

    #[test]
    fn select_mode_only_from_unselected() {
        let mut studio = picture_studio();
        assert!(matches!(
            studio.select_mode(Mode::Ar),
            Err(WorkflowError::ModeAlreadySelected(Mode::Picture))
        ));
        assert_eq!(studio.mode(), Mode::Picture);

        let mut fresh = Studio::new(MemoryBackend::new());
        assert!(matches!(fresh.select_mode(Mode::None), Err(WorkflowError::InvalidMode(_))));
        assert!(matches!(fresh.change_mode(), Err(WorkflowError::NoModeSelected)));
    }

    #[test]
    fn picture_flow_stages() {
        let mut studio = picture_studio();
        assert_eq!(studio.stage(), Stage::PictureMode);
        assert_eq!(studio.ingest_file(file("chair.jpg")).unwrap(), Slot::Furniture);
        assert_eq!(studio.stage(), Stage::AwaitingRoom);
        assert!(studio.accepts_room());
        studio.ingest_room_file(file("room.png")).unwrap();
        assert_eq!(studio.stage(), Stage::ReadyToRender);
        assert_eq!(studio.display_name(Slot::Room), Some("room.png"));
        assert_eq!(studio.live_previews(), 2);
    }

    #[test]
    fn room_before_furniture_is_rejected() {
        let mut studio = picture_studio();
        let err = studio.ingest_room_file(file("room.png")).unwrap_err();
        assert!(matches!(err, WorkflowError::FurnitureMissing));
        assert_eq!(studio.stage(), Stage::PictureMode);
        assert_eq!(studio.live_previews(), 0);
    }

    #[test]
    fn model_in_picture_mode_is_rejected_without_side_effects() {
        let mut studio = picture_studio();
        studio.ingest_file(file("chair.jpg")).unwrap();
        let before = studio.preview(Slot::Furniture).cloned();
        let err = studio.ingest_file(file("table.glb")).unwrap_err();
        assert!(matches!(err, WorkflowError::WrongAssetKind { kind: AssetKind::Model3D, .. }));
        assert_eq!(studio.preview(Slot::Furniture).cloned(), before);
        assert!(studio.file(Slot::Model).is_none());
        assert!(studio.error().is_none());
    }

    #[test]
    fn unknown_extension_goes_down_the_image_path() {
        let mut studio = picture_studio();
        assert_eq!(studio.ingest_file(file("scan")).unwrap(), Slot::Furniture);

        let mut ar = Studio::new(MemoryBackend::new());
        ar.select_mode(Mode::Ar).unwrap();
        assert!(ar.ingest_file(file("scan.heic")).is_err());
        assert_eq!(ar.stage(), Stage::ArMode);
    }

    #[test]
    fn reingest_releases_previous_preview_once() {
        let mut studio = picture_studio();
        studio.ingest_file(file("a.jpg")).unwrap();
        let old = studio.preview(Slot::Furniture).unwrap().url().to_owned();
        studio.ingest_file(file("b.jpg")).unwrap();
        let new = studio.preview(Slot::Furniture).unwrap().url().to_owned();

        let backend = studio.previews().backend();
        assert_ne!(old, new);
        assert_eq!(backend.revoked(), [old.clone()]);
        assert!(!backend.is_live(&old));
        assert!(backend.is_live(&new));
        assert_eq!(backend.live_count(), 1);
    }

    #[test]
    fn change_mode_clears_everything() {
        let mut studio = ready_studio();
        studio.request_render().unwrap();
        studio.on_render_success("https://x/result.png").unwrap();

        studio.change_mode().unwrap();
        assert_eq!(studio.mode(), Mode::None);
        assert_eq!(studio.stage(), Stage::Unselected);
        assert_eq!(studio.live_previews(), 0);
        assert_eq!(studio.previews().backend().live_count(), 0);
        assert!(studio.file(Slot::Furniture).is_none());
        assert!(studio.result_url().is_none());
    }

    #[test]
    fn render_requires_both_images() {
        let mut studio = picture_studio();
        let err = studio.request_render().unwrap_err();
        assert!(matches!(err, WorkflowError::NotReady(Stage::PictureMode)));
        studio.ingest_file(file("chair.jpg")).unwrap();
        let err = studio.request_render().unwrap_err();
        assert!(matches!(err, WorkflowError::NotReady(Stage::AwaitingRoom)));
        assert_eq!(studio.render_state(), &RenderState::Idle);
    }

    #[test]
    fn payload_carries_both_inputs() {
        let mut studio = ready_studio();
        let payload = studio.request_render().unwrap();
        assert_eq!(payload.furniture.name, "chair.jpg");
        assert_eq!(payload.room.name, "room.png");
        assert_eq!(studio.stage(), Stage::Rendering);
        assert!(!studio.can_request_render());
    }

    #[test]
    fn inputs_and_mode_are_locked_while_rendering() {
        let mut studio = ready_studio();
        studio.request_render().unwrap();
        assert!(matches!(studio.request_render(), Err(WorkflowError::RenderInFlight)));
        assert!(matches!(studio.change_mode(), Err(WorkflowError::RenderInFlight)));
        let err = studio.ingest_room_file(file("other.png")).unwrap_err();
        assert!(matches!(err, WorkflowError::RenderInFlight));
        let err = studio.ingest_file(file("other.jpg")).unwrap_err();
        assert!(matches!(err, WorkflowError::RenderInFlight));
        assert!(!studio.accepts_room());
        assert_eq!(studio.display_name(Slot::Room), Some("room.png"));
        assert_eq!(studio.stage(), Stage::Rendering);
    }

    #[test]
    fn replacing_room_after_render_discards_result() {
        let mut studio = ready_studio();
        studio.request_render().unwrap();
        studio.on_render_success("https://x/result.png").unwrap();
        assert_eq!(studio.stage(), Stage::Rendered);

        studio.ingest_room_file(file("kitchen.png")).unwrap();
        assert_eq!(studio.stage(), Stage::ReadyToRender);
        assert!(studio.result_url().is_none());
    }

    #[test]
    fn replacing_furniture_after_render_discards_result() {
        let mut studio = ready_studio();
        studio.request_render().unwrap();
        studio.on_render_success("https://x/result.png").unwrap();
        let old_room = studio.preview(Slot::Room).cloned();

        studio.ingest_file(file("sofa.jpg")).unwrap();
        assert_eq!(studio.stage(), Stage::ReadyToRender);
        assert!(studio.result_url().is_none());
        assert_eq!(studio.display_name(Slot::Furniture), Some("sofa.jpg"));
        assert_eq!(studio.preview(Slot::Room).cloned(), old_room);

        studio.request_render().unwrap();
        studio.on_render_failure("Failed to generate visualization").unwrap();
        assert_eq!(studio.stage(), Stage::RenderFailed);

        studio.ingest_file(file("armchair.jpg")).unwrap();
        assert_eq!(studio.stage(), Stage::ReadyToRender);
        assert!(studio.error().is_none());
        assert!(studio.result_url().is_none());
    }

    #[test]
    fn rendered_result_is_kept_until_inputs_change() {
        let mut studio = ready_studio();
        studio.request_render().unwrap();
        studio.on_render_success("https://x/result.png").unwrap();
        assert!(!studio.can_request_render());

        let err = studio.request_render().unwrap_err();
        assert!(matches!(err, WorkflowError::NotReady(Stage::Rendered)));
        assert_eq!(studio.result_url(), Some("https://x/result.png"));

        studio.ingest_room_file(file("kitchen.png")).unwrap();
        assert!(studio.can_request_render());
    }

    #[test]
    fn failure_can_be_retried() {
        let mut studio = ready_studio();
        studio.request_render().unwrap();
        studio.finish_render(Err(RenderError::Rejected { status: 502 })).unwrap();
        assert_eq!(studio.stage(), Stage::RenderFailed);
        assert_eq!(studio.error(), Some("Failed to generate visualization"));
        assert!(studio.can_request_render());

        studio.request_render().unwrap();
        assert!(studio.error().is_none());
        studio.finish_render(Ok("https://x/2.png".into())).unwrap();
        assert_eq!(studio.result_url(), Some("https://x/2.png"));
    }

    #[test]
    fn completion_outside_rendering_is_rejected() {
        let mut studio = ready_studio();
        assert!(matches!(studio.on_render_success("u"), Err(WorkflowError::NotRendering)));
        assert!(matches!(studio.on_render_failure("m"), Err(WorkflowError::NotRendering)));
        assert_eq!(studio.stage(), Stage::ReadyToRender);
    }

    #[test]
    fn ar_mode_takes_models_only() {
        let mut studio = Studio::new(MemoryBackend::new());
        studio.select_mode(Mode::Ar).unwrap();
        assert_eq!(studio.stage(), Stage::ArMode);
        assert_eq!(studio.ingest_file(file("table.glb")).unwrap(), Slot::Model);
        assert_eq!(studio.stage(), Stage::ModelLoaded);
        let err = studio.ingest_room_file(file("room.png")).unwrap_err();
        assert!(matches!(err, WorkflowError::RoomOutsidePictureMode));
        assert!(studio.ingest_file(file("photo.jpg")).is_err());
        assert_eq!(studio.display_name(Slot::Model), Some("table.glb"));
        assert_eq!(studio.live_previews(), 1);
    }

    #[test]
    fn change_mode_from_loaded_model_releases_it() {
        let mut studio = Studio::new(MemoryBackend::new());
        studio.select_mode(Mode::Ar).unwrap();
        studio.ingest_file(file("table.glb")).unwrap();
        let url = studio.preview(Slot::Model).unwrap().url().to_owned();
        assert_eq!(studio.stage(), Stage::ModelLoaded);

        studio.change_mode().unwrap();
        assert_eq!(studio.mode(), Mode::None);
        assert_eq!(studio.live_previews(), 0);
        assert!(studio.file(Slot::Model).is_none());
        let backend = studio.previews().backend();
        assert!(!backend.is_live(&url));
        assert_eq!(backend.revoked(), [url]);
    }

    #[test]
    fn teardown_releases_all_handles() {
        let mut studio = ready_studio();
        studio.teardown();
        assert_eq!(studio.live_previews(), 0);
        assert_eq!(studio.previews().backend().live_count(), 0);
        assert_eq!(studio.previews().backend().revoked().len(), 2);
        studio.teardown();
        assert_eq!(studio.previews().backend().revoked().len(), 2);
    }

    #[test]
    fn mode_presentation() {
        assert_eq!(Mode::Picture.label(), "Design Mode");
        assert_eq!(Mode::Ar.drop_hint(), "3D models (GLB, GLTF, USDZ)");
        assert!(Mode::Picture.accepted_extensions().contains(&"webp"));
        assert!(Mode::None.accepted_extensions().is_empty());
    }
}
