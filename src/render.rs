//! Remote visualization call.
//!
//! One `POST` with two multipart parts (`furniture`, `room`) to a fixed
//! endpoint. The answer must be a 2xx JSON body carrying a non-empty
//! `imageUrl`; every other outcome becomes a [`RenderError`].
//!
//! The network itself sits behind [`VisualizeTransport`] so the decoding rules
//! can be exercised without a browser. On wasm32 [`HttpTransport`] goes through
//! `gloo-net`; elsewhere it is an inert stub that always fails.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::asset::AssetFile;

pub const DEFAULT_ENDPOINT: &str = "/api/nano-banana/visualize";
pub const FURNITURE_FIELD: &str = "furniture";
pub const ROOM_FIELD: &str = "room";

pub const MSG_REJECTED: &str = "Failed to generate visualization";
pub const MSG_MISSING_RESULT: &str = "Missing imageUrl in response";
pub const MSG_GENERIC: &str = "Something went wrong while generating the result.";

/// The two inputs of a render, captured when the request was made.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub furniture: AssetFile,
    pub room: AssetFile,
}

impl RenderPayload {
    /// Multipart parts in wire order.
    pub fn parts(&self) -> [(&'static str, &AssetFile); 2] {
        [(FURNITURE_FIELD, &self.furniture), (ROOM_FIELD, &self.room)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (network down, CORS, aborted...).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

pub trait VisualizeTransport {
    fn post(
        &self,
        endpoint: &str,
        payload: &RenderPayload,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>>;
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("request did not complete: {0}")]
    Transport(#[from] TransportError),
    #[error("endpoint answered with HTTP {status}")]
    Rejected { status: u16 },
    #[error("response body is not valid JSON: {0}")]
    Undecodable(#[from] serde_json::Error),
    #[error("response carries no imageUrl")]
    MissingResult,
}

impl RenderError {
    /// Text shown to the user in the error slot.
    pub fn user_message(&self) -> &'static str {
        match self {
            RenderError::Rejected { .. } => MSG_REJECTED,
            RenderError::MissingResult => MSG_MISSING_RESULT,
            RenderError::Transport(_) | RenderError::Undecodable(_) => MSG_GENERIC,
        }
    }
}

/// Field of the response object that carries the result reference.
pub const RESULT_FIELD: &str = "imageUrl";

/// Issues the call and returns the result image reference.
pub async fn render<T: VisualizeTransport>(
    transport: &T,
    endpoint: &str,
    payload: &RenderPayload,
) -> Result<String, RenderError> {
    log::info!(
        "POST {endpoint} ({} {} bytes, {} {} bytes)",
        payload.furniture.name,
        payload.furniture.len(),
        payload.room.name,
        payload.room.len()
    );
    let response = transport.post(endpoint, payload).await?;
    if !response.is_success() {
        return Err(RenderError::Rejected { status: response.status });
    }
    decode_result(&response.body)
}

/// Only a body that is not JSON at all counts as undecodable. Any JSON value
/// without a non-empty string `imageUrl` is a missing result.
fn decode_result(body: &[u8]) -> Result<String, RenderError> {
    let parsed: Value = serde_json::from_slice(body)?;
    match parsed.get(RESULT_FIELD).and_then(Value::as_str) {
        Some(url) if !url.is_empty() => Ok(url.to_owned()),
        _ => Err(RenderError::MissingResult),
    }
}

// --------------------------- transports ---------------------------

/// Browser `fetch` transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

#[cfg(target_arch = "wasm32")]
impl VisualizeTransport for HttpTransport {
    async fn post(
        &self,
        endpoint: &str,
        payload: &RenderPayload,
    ) -> Result<TransportResponse, TransportError> {
        use gloo_net::http::Request;

        let form = web_sys::FormData::new().map_err(js_transport_err)?;
        for (field, file) in payload.parts() {
            let blob = crate::web::blob_from_file(file).map_err(TransportError)?;
            form.append_with_blob_and_filename(field, &blob, &file.name)
                .map_err(js_transport_err)?;
        }

        let resp = Request::post(endpoint)
            .body(form)
            .map_err(to_transport_err)?
            .send()
            .await
            .map_err(to_transport_err)?;
        let status = resp.status();
        // Error bodies are not inspected, so don't bother reading them.
        let body = if resp.ok() {
            resp.binary().await.map_err(to_transport_err)?
        } else {
            Vec::new()
        };
        Ok(TransportResponse { status, body })
    }
}

#[cfg(target_arch = "wasm32")]
fn to_transport_err<E: core::fmt::Display>(e: E) -> TransportError {
    TransportError(e.to_string())
}

#[cfg(target_arch = "wasm32")]
fn js_transport_err(e: wasm_bindgen::JsValue) -> TransportError {
    TransportError(crate::web::js_err_string(&e))
}

// --------------------------- non-wasm stub ---------------------------

#[cfg(not(target_arch = "wasm32"))]
impl VisualizeTransport for HttpTransport {
    async fn post(
        &self,
        endpoint: &str,
        _payload: &RenderPayload,
    ) -> Result<TransportResponse, TransportError> {
        Err(TransportError(format!("{endpoint}: remote visualization needs a browser runtime")))
    }
}
