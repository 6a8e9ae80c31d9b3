#![forbid(unsafe_code)]

//! [`OverlayHost`] over the live DOM. Only compiled on `wasm32` targets.

use std::collections::BTreeMap;

use cigi_core::{DockSide, HorizontalAnchor, Placement, Rect, Size, SnapTransition};
use cigi_overlay::{
    Cursor, ElementContent, ElementHandle, ElementKind, HostError, OverlayHost, PanelContent,
    ThemeName, ThemeSink,
};
use js_sys::Reflect;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, Window};

use crate::js::{call_method, describe, js_path};

const TOP_LAYER: &str = "2147483647";

fn px(value: f64) -> String {
    format!("{value}px")
}

/// Set one inline style property. Failures are ignored; a missing style
/// only costs appearance.
fn set_style(element: &HtmlElement, property: &str, value: &str) {
    // Reflection keeps `CssStyleDeclaration` out of the web-sys features.
    let target: &JsValue = element.as_ref();
    let Ok(style) = Reflect::get(target, &JsValue::from_str("style")) else {
        return;
    };
    let _ = call_method(
        &style,
        "setProperty",
        &[JsValue::from_str(property), JsValue::from_str(value)],
    );
}

fn set_styles(element: &HtmlElement, pairs: &[(&str, &str)]) {
    for (property, value) in pairs {
        set_style(element, property, value);
    }
}

/// Extension-relative asset path resolved through `chrome.runtime.getURL`.
fn asset_url(path: &str) -> String {
    js_path(&["chrome", "runtime"])
        .and_then(|runtime| call_method(&runtime, "getURL", &[JsValue::from_str(path)]).ok())
        .and_then(|url| url.as_string())
        .unwrap_or_else(|| path.to_owned())
}

/// DOM-backed host. Nodes are tracked by the handle ids it mints.
#[derive(Debug)]
pub struct DomHost {
    window: Window,
    document: Document,
    nodes: BTreeMap<u64, HtmlElement>,
    next_node: u64,
}

impl DomHost {
    #[must_use]
    pub fn new(window: Window, document: Document) -> Self {
        Self {
            window,
            document,
            nodes: BTreeMap::new(),
            next_node: 1,
        }
    }

    /// Whether the page asks for a dark color scheme. `None` if it cannot
    /// be queried.
    #[must_use]
    pub fn prefers_dark(&self) -> Option<bool> {
        let query = self.window.match_media("(prefers-color-scheme: dark)").ok()??;
        Some(query.matches())
    }

    fn register(&mut self, kind: ElementKind, element: HtmlElement) -> ElementHandle {
        let node = self.next_node;
        self.next_node += 1;
        self.nodes.insert(node, element);
        ElementHandle::new(kind, node)
    }

    fn element(&self, handle: ElementHandle) -> Option<&HtmlElement> {
        self.nodes.get(&handle.node())
    }

    fn create(&self, tag: &str) -> Result<HtmlElement, JsValue> {
        self.document.create_element(tag)?.dyn_into::<HtmlElement>().map_err(JsValue::from)
    }

    fn build_button(&self, title: &str, icon: &str) -> Result<HtmlElement, JsValue> {
        let button = self.create("div")?;
        button.set_id(ElementKind::FloatingButton.dom_id());
        button.set_attribute("role", "button")?;
        button.set_title(title);
        set_styles(
            &button,
            &[
                ("position", "fixed"),
                ("z-index", TOP_LAYER),
                ("display", "none"),
                ("align-items", "center"),
                ("justify-content", "center"),
                ("border-radius", "50%"),
                ("box-sizing", "border-box"),
                ("touch-action", "none"),
                ("user-select", "none"),
                ("background", "var(--cigi-surface, #1f2430)"),
                ("box-shadow", "0 2px 8px rgba(0, 0, 0, 0.35)"),
            ],
        );
        let image = self.create("img")?;
        image.set_attribute("src", &asset_url(icon))?;
        image.set_attribute("alt", "")?;
        image.set_attribute("draggable", "false")?;
        set_styles(&image, &[("width", "60%"), ("height", "60%"), ("pointer-events", "none")]);
        button.append_child(&image)?;
        Ok(button)
    }

    fn build_panel(&self, content: &PanelContent) -> Result<HtmlElement, JsValue> {
        let panel = self.create("div")?;
        panel.set_id(ElementKind::Panel.dom_id());
        set_styles(
            &panel,
            &[
                ("position", "fixed"),
                ("z-index", TOP_LAYER),
                ("display", "none"),
                ("flex-direction", "column"),
                ("box-sizing", "border-box"),
                ("overflow", "hidden"),
                ("border-radius", "8px"),
                ("background", "var(--cigi-surface, #1f2430)"),
                ("color", "var(--cigi-text, #e6e6e6)"),
                ("box-shadow", "0 8px 24px rgba(0, 0, 0, 0.4)"),
            ],
        );

        let header = self.create("div")?;
        header.set_attribute("data-cigi-role", "header")?;
        set_styles(
            &header,
            &[
                ("display", "flex"),
                ("align-items", "center"),
                ("justify-content", "space-between"),
                ("padding", "6px 10px"),
                ("cursor", "move"),
                ("touch-action", "none"),
                ("user-select", "none"),
            ],
        );
        let title = self.create("span")?;
        title.set_text_content(Some(&content.title));
        header.append_child(&title)?;
        let minimize = self.create("button")?;
        minimize.set_attribute("data-cigi-role", "minimize")?;
        minimize.set_attribute("type", "button")?;
        minimize.set_title(&content.minimize_label);
        minimize.set_text_content(Some("\u{2013}"));
        header.append_child(&minimize)?;
        panel.append_child(&header)?;

        let tabs = self.create("nav")?;
        tabs.set_attribute("data-cigi-role", "tabs")?;
        set_styles(&tabs, &[("display", "flex"), ("gap", "4px"), ("padding", "0 10px")]);
        for label in &content.tabs {
            let tab = self.create("button")?;
            tab.set_attribute("type", "button")?;
            tab.set_text_content(Some(label));
            tabs.append_child(&tab)?;
        }
        panel.append_child(&tabs)?;

        let body = self.create("div")?;
        body.set_attribute("data-cigi-role", "body")?;
        set_styles(&body, &[("flex", "1"), ("overflow", "auto"), ("padding", "10px")]);
        panel.append_child(&body)?;

        let resize = self.create("div")?;
        resize.set_attribute("data-cigi-role", "resize")?;
        set_styles(
            &resize,
            &[
                ("position", "absolute"),
                ("right", "0"),
                ("bottom", "0"),
                ("width", "14px"),
                ("height", "14px"),
                ("cursor", Cursor::ResizeDiagonal.as_css()),
                ("touch-action", "none"),
            ],
        );
        panel.append_child(&resize)?;
        Ok(panel)
    }

    fn attach(&self, element: &HtmlElement) -> Result<(), JsValue> {
        let parent: Element = match self.document.body() {
            Some(body) => body.into(),
            None => self
                .document
                .document_element()
                .ok_or_else(|| JsValue::from_str("document has no root element"))?,
        };
        parent.append_child(element)?;
        Ok(())
    }
}

impl OverlayHost for DomHost {
    fn viewport(&self) -> Size {
        let width = self.window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        let height = self.window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Size::new(width, height)
    }

    fn find(&mut self, kind: ElementKind) -> Option<ElementHandle> {
        let element = self.document.get_element_by_id(kind.dom_id())?;
        let element = element.dyn_into::<HtmlElement>().ok()?;
        Some(self.register(kind, element))
    }

    fn mount(&mut self, content: &ElementContent) -> Result<ElementHandle, HostError> {
        let kind = content.kind();
        let built = match content {
            ElementContent::FloatingButton { title, icon } => self.build_button(title, icon),
            ElementContent::Panel(panel) => self.build_panel(panel),
        };
        let element = built
            .and_then(|element| self.attach(&element).map(|()| element))
            .map_err(|error| HostError::Mount {
                kind,
                reason: describe(&error),
            })?;
        Ok(self.register(kind, element))
    }

    fn unmount(&mut self, handle: ElementHandle) {
        if let Some(element) = self.nodes.remove(&handle.node()) {
            element.remove();
        }
    }

    fn set_visible(&mut self, handle: ElementHandle, visible: bool) {
        if let Some(element) = self.element(handle) {
            set_style(element, "display", if visible { "flex" } else { "none" });
        }
    }

    fn measure(&self, handle: ElementHandle) -> Rect {
        let Some(element) = self.element(handle) else {
            return Rect::default();
        };
        let rect = element.get_bounding_client_rect();
        Rect::new(rect.left(), rect.top(), rect.width(), rect.height())
    }

    fn place(&mut self, handle: ElementHandle, placement: Placement) {
        let Some(element) = self.element(handle) else {
            return;
        };
        match placement.horizontal {
            HorizontalAnchor::Left(left) => {
                set_style(element, "left", &px(left));
                set_style(element, "right", "auto");
            }
            HorizontalAnchor::Right(right) => {
                set_style(element, "left", "auto");
                set_style(element, "right", &px(right));
            }
        }
        set_style(element, "top", &px(placement.top));
    }

    fn set_size(&mut self, handle: ElementHandle, size: Size) {
        if let Some(element) = self.element(handle) {
            set_style(element, "width", &px(size.width));
            set_style(element, "height", &px(size.height));
        }
    }

    fn set_transition(&mut self, handle: ElementHandle, transition: Option<SnapTransition>) {
        if let Some(element) = self.element(handle) {
            let css = transition.map_or_else(|| "none".to_owned(), |t| t.to_css());
            set_style(element, "transition", &css);
        }
    }

    fn set_cursor(&mut self, handle: ElementHandle, cursor: Cursor) {
        if let Some(element) = self.element(handle) {
            set_style(element, "cursor", cursor.as_css());
        }
    }

    fn set_dock_side(&mut self, handle: ElementHandle, side: DockSide) {
        if let Some(element) = self.element(handle) {
            let _ = element.set_attribute("data-side", side.as_str());
        }
    }

    fn capture_pointer(&mut self, handle: ElementHandle, pointer_id: u32) -> Result<(), HostError> {
        let Some(element) = self.element(handle) else {
            return Ok(());
        };
        let id = i32::try_from(pointer_id).unwrap_or(i32::MAX);
        element
            .set_pointer_capture(id)
            .map_err(|error| HostError::PointerCapture {
                pointer_id,
                reason: describe(&error),
            })
    }

    fn release_pointer(&mut self, handle: ElementHandle, pointer_id: u32) -> Result<(), HostError> {
        let Some(element) = self.element(handle) else {
            return Ok(());
        };
        let id = i32::try_from(pointer_id).unwrap_or(i32::MAX);
        element
            .release_pointer_capture(id)
            .map_err(|error| HostError::PointerCapture {
                pointer_id,
                reason: describe(&error),
            })
    }
}

impl ThemeSink for DomHost {
    fn apply_palette(&mut self, theme: ThemeName) {
        if let Some(root) = self.document.document_element() {
            let _ = root.set_attribute("data-cigi-theme", theme.as_str());
        }
    }
}
