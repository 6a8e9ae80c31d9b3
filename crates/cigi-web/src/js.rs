#![forbid(unsafe_code)]

//! Reflection helpers for the JS boundary.
//!
//! Extension APIs (`chrome.*`) have no `web-sys` bindings, and several DOM
//! properties are reached the same way to keep the `web-sys` feature list
//! short. Only compiled on `wasm32` targets.

use js_sys::{Array, Function, JSON, Reflect};
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};

use crate::logging::LineSink;

/// Walk `globalThis.<path...>`. `None` if any segment is missing.
pub(crate) fn js_path(path: &[&str]) -> Option<JsValue> {
    let mut current: JsValue = js_sys::global().into();
    for segment in path {
        current = Reflect::get(&current, &JsValue::from_str(segment)).ok()?;
        if current.is_undefined() || current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Call `target[name](...args)`.
pub(crate) fn call_method(
    target: &JsValue,
    name: &str,
    args: &[JsValue],
) -> Result<JsValue, JsValue> {
    let method = Reflect::get(target, &JsValue::from_str(name))?;
    let function = method.dyn_into::<Function>()?;
    let args: Array = args.iter().collect();
    Reflect::apply(&function, target, &args)
}

pub(crate) fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|error| JsValue::from_str(&error.to_string()))?;
    JSON::parse(&text)
}

/// Deep-copy a JSON-compatible JS value. `undefined` maps to `None`.
pub(crate) fn from_js(value: &JsValue) -> Option<Value> {
    if value.is_undefined() {
        return None;
    }
    let text: String = JSON::stringify(value).ok()?.into();
    serde_json::from_str(&text).ok()
}

/// Best-effort message of a thrown JS value.
pub(crate) fn describe(error: &JsValue) -> String {
    error
        .as_string()
        .or_else(|| {
            Reflect::get(error, &JsValue::from_str("message"))
                .ok()
                .and_then(|message| message.as_string())
        })
        .unwrap_or_else(|| format!("{error:?}"))
}

fn console_call(method: &str, msg: &str) {
    let Some(console) = js_path(&["console"]) else {
        return;
    };
    let _ = call_method(&console, method, &[JsValue::from_str(msg)]);
}

pub(crate) fn console_error(msg: &str) {
    console_call("error", msg);
}

/// [`LineSink`] writing to `console.log`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LineSink for ConsoleSink {
    fn write_line(&self, line: &str) {
        console_call("log", line);
    }
}

pub(crate) fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "{} panic at {}:{}:{}: {info}",
                    crate::logging::LOG_PREFIX,
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("{} panic: {info}", crate::logging::LOG_PREFIX)
            };
            console_error(&msg);
        }));
    });
}
