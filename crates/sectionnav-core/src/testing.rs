//! In-memory [`Host`] for unit tests

use std::collections::HashMap;

use crate::host::{HistoryMode, Host, ObserverOptions, Rect, ScrollBehavior};
use crate::section::ElementRef;
use crate::{Error, Result};

#[derive(Debug)]
struct MockElement {
    /// Offset from the top of the document
    top: f64,
    height: f64,
    mounted: bool,
    attributes: HashMap<String, String>,
}

/// Records every call; scrolling is instant
#[derive(Debug)]
pub struct MockHost {
    pub viewport: f64,
    pub scroll_top: f64,
    pub hash: String,
    pub pushes: Vec<String>,
    pub replaces: Vec<String>,
    /// Fallback fragment writes
    pub raw_writes: Vec<(String, HistoryMode)>,
    pub history_fails: bool,
    pub reduced_motion: bool,
    pub intersection_supported: bool,
    pub observed: Vec<ElementRef>,
    pub disconnects: usize,
    pub scroll_calls: Vec<(ElementRef, ScrollBehavior)>,
    pub focused: Option<ElementRef>,
    pub focus_prevent_scroll: Option<bool>,
    pub focus_calls: usize,
    elements: HashMap<ElementRef, MockElement>,
}

impl MockHost {
    pub fn new(viewport: f64) -> Self {
        Self {
            viewport,
            scroll_top: 0.0,
            hash: String::new(),
            pushes: Vec::new(),
            replaces: Vec::new(),
            raw_writes: Vec::new(),
            history_fails: false,
            reduced_motion: false,
            intersection_supported: true,
            observed: Vec::new(),
            disconnects: 0,
            scroll_calls: Vec::new(),
            focused: None,
            focus_prevent_scroll: None,
            focus_calls: 0,
            elements: HashMap::new(),
        }
    }

    pub fn add_section(&mut self, top: f64, height: f64) -> ElementRef {
        let element = ElementRef::new();
        self.elements.insert(
            element,
            MockElement {
                top,
                height,
                mounted: true,
                attributes: HashMap::new(),
            },
        );
        element
    }

    pub fn set_mounted(&mut self, element: ElementRef, mounted: bool) {
        if let Some(el) = self.elements.get_mut(&element) {
            el.mounted = mounted;
        }
    }

    fn write(&mut self, fragment: &str) -> Result<()> {
        if self.history_fails {
            return Err(Error::History("history api disabled".into()));
        }
        self.hash = fragment.to_string();
        Ok(())
    }
}

impl Host for MockHost {
    fn location_hash(&self) -> String {
        self.hash.clone()
    }

    fn push_history(&mut self, fragment: &str) -> Result<()> {
        self.write(fragment)?;
        self.pushes.push(fragment.to_string());
        Ok(())
    }

    fn replace_history(&mut self, fragment: &str) -> Result<()> {
        self.write(fragment)?;
        self.replaces.push(fragment.to_string());
        Ok(())
    }

    fn set_url_fragment(&mut self, fragment: &str, mode: HistoryMode) {
        self.hash = fragment.to_string();
        self.raw_writes.push((fragment.to_string(), mode));
    }

    fn viewport_height(&self) -> f64 {
        self.viewport
    }

    fn bounding_rect(&self, element: ElementRef) -> Option<Rect> {
        self.elements
            .get(&element)
            .filter(|el| el.mounted)
            .map(|el| Rect::new(el.top - self.scroll_top, el.height))
    }

    fn scroll_into_view(&mut self, element: ElementRef, behavior: ScrollBehavior) {
        self.scroll_calls.push((element, behavior));
        if let Some(el) = self.elements.get(&element) {
            self.scroll_top = el.top;
        }
    }

    fn attribute(&self, element: ElementRef, name: &str) -> Option<String> {
        self.elements
            .get(&element)
            .and_then(|el| el.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, element: ElementRef, name: &str, value: &str) {
        if let Some(el) = self.elements.get_mut(&element) {
            el.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&mut self, element: ElementRef, name: &str) {
        if let Some(el) = self.elements.get_mut(&element) {
            el.attributes.remove(name);
        }
    }

    fn focus(&mut self, element: ElementRef, prevent_scroll: bool) {
        self.focused = Some(element);
        self.focus_prevent_scroll = Some(prevent_scroll);
        self.focus_calls += 1;
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    fn supports_intersection_observer(&self) -> bool {
        self.intersection_supported
    }

    fn observe(&mut self, element: ElementRef, _options: &ObserverOptions) {
        self.observed.push(element);
    }

    fn disconnect_observer(&mut self) {
        self.observed.clear();
        self.disconnects += 1;
    }
}
