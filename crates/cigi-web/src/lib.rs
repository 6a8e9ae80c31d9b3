#![forbid(unsafe_code)]

//! Browser binding for the CIGI page overlay.
//!
//! # Role in CIGI Overlay
//! `cigi-web` is the only crate that touches the browser. It implements the
//! runtime's seams over real platform objects: [`dom_host::DomHost`] over the
//! DOM, [`chrome::ChromeStore`] over `chrome.storage.local`,
//! [`chrome::LocalStorageStore`] over the page's `localStorage`, and
//! [`chrome::ChromeMessages`] over `chrome.i18n`. The exported `start`
//! function wires window and document listeners to one
//! [`cigi_overlay::Overlay`].
//!
//! # How it fits in the system
//! Pointer signals pass through [`pointer_capture::PointerCaptureAdapter`]
//! before reaching the runtime, and log lines leave through
//! [`logging`]. Both, plus the payload conversions in [`bridge`], are plain
//! Rust and tested natively; everything that needs `web-sys` is compiled on
//! `wasm32` only.

pub mod bridge;
pub mod logging;
pub mod pointer_capture;

#[cfg(target_arch = "wasm32")]
pub mod chrome;
#[cfg(target_arch = "wasm32")]
pub mod dom_host;
#[cfg(target_arch = "wasm32")]
mod js;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::start;

pub use pointer_capture::{
    PointerButton, PointerCaptureAdapter, PointerCaptureConfig, PointerDispatch,
    PointerIgnoredReason, PointerLogEntry, PointerLogOutcome, PointerPhase,
};
