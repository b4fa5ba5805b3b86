//! Browser glue for wasm32.
//!
//! - `Blob` construction for previews and multipart bodies
//! - reading text out of a page element (config block)
//! - pointing the external `<model-viewer>` element at the current model
//!
//! Native builds get inert stand-ins so the rest of the crate stays target-agnostic.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use crate::asset::AssetFile;

#[cfg(target_arch = "wasm32")]
fn document() -> Option<web_sys::Document> {
    web_sys::window().expect("no `window` in this context").document()
}

#[cfg(target_arch = "wasm32")]
pub fn js_err_string(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{e:?}"))
}

/// Copies the file bytes into a typed `Blob`.
#[cfg(target_arch = "wasm32")]
pub fn blob_from_file(file: &AssetFile) -> Result<web_sys::Blob, String> {
    let bytes = js_sys::Uint8Array::from(&file.bytes[..]);
    let parts = js_sys::Array::of1(&bytes);
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(&file.mime);
    web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|e| js_err_string(&e))
}

#[cfg(target_arch = "wasm32")]
pub fn read_element_text(id: &str) -> Option<String> {
    document()?.get_element_by_id(id)?.text_content()
}

/// Sets or clears the `src` of the viewer element. Missing element is not an error.
#[cfg(target_arch = "wasm32")]
pub fn sync_model_viewer(id: &str, url: Option<&str>) {
    let Some(viewer) = document().and_then(|d| d.get_element_by_id(id)) else {
        log::debug!("no #{id} element, skipping viewer sync");
        return;
    };
    let result = match url {
        Some(url) => viewer.set_attribute("src", url),
        None => viewer.remove_attribute("src"),
    };
    if let Err(e) = result {
        log::warn!("could not update #{id}: {}", js_err_string(&e));
    }
}

// --------------------------- non-wasm stubs ---------------------------

#[cfg(not(target_arch = "wasm32"))]
pub fn read_element_text(_id: &str) -> Option<String> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
pub fn sync_model_viewer(id: &str, url: Option<&str>) {
    log::trace!("viewer #{id} -> {url:?} (no browser)");
}
