//! Immutable description of the dragged content.
//!
//! Produced once by the host at gesture start. The session owns it; handlers
//! see item tags, and bytes only during `drop`.

use serde::{Deserialize, Serialize};

use crate::config::DragConfig;
use crate::error::DragError;

/// What started the gesture. Only `Element` may be dragged without content
/// (a `draggable` element whose dragstart handler stored nothing).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureKind {
    Selection,
    Link,
    Image,
    Files,
    Element,
}

impl GestureKind {
    pub fn requires_content(self) -> bool {
        !matches!(self, GestureKind::Element)
    }
}

/// Opaque handle to content that lives outside the engine (e.g. a file).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    pub handle: u64,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemBody {
    Inline(Vec<u8>),
    External(ExternalRef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadItem {
    mime: String,
    body: ItemBody,
}

impl PayloadItem {
    pub fn inline(mime: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime: mime.into(),
            body: ItemBody::Inline(bytes.into()),
        }
    }

    pub fn external(mime: impl Into<String>, reference: ExternalRef) -> Self {
        Self {
            mime: mime.into(),
            body: ItemBody::External(reference),
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn body(&self) -> &ItemBody {
        &self.body
    }

    pub fn is_external(&self) -> bool {
        matches!(self.body, ItemBody::External(_))
    }

    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ItemBody::Inline(bytes) => Some(bytes),
            ItemBody::External(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    kind: GestureKind,
    items: Vec<PayloadItem>,
}

impl Payload {
    pub fn new(kind: GestureKind, items: Vec<PayloadItem>) -> Self {
        Self { kind, items }
    }

    /// Single `text/uri-list` item, the shape of a dragged hyperlink.
    pub fn url(url: &str) -> Self {
        Self::new(
            GestureKind::Link,
            vec![PayloadItem::inline("text/uri-list", url.as_bytes())],
        )
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn items(&self) -> &[PayloadItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_types(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(PayloadItem::mime)
    }

    /// First inline item with this tag (ASCII case-insensitive).
    pub fn inline_data(&self, mime: &str) -> Option<&[u8]> {
        self.items
            .iter()
            .filter(|item| item.mime.eq_ignore_ascii_case(mime))
            .find_map(PayloadItem::inline_bytes)
    }

    /// Checks the payload before a session takes ownership of it.
    pub fn validate(&self, config: &DragConfig) -> Result<(), DragError> {
        if self.items.is_empty() && config.require_content && self.kind.requires_content() {
            return Err(DragError::InvalidPayload(format!(
                "{:?} gesture carries no items",
                self.kind
            )));
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.mime.trim().is_empty() {
                return Err(DragError::InvalidPayload(format!(
                    "item {index} has an empty type"
                )));
            }
            if item.is_external() {
                continue;
            }
            let duplicate = self.items[..index]
                .iter()
                .any(|prev| !prev.is_external() && prev.mime.eq_ignore_ascii_case(&item.mime));
            if duplicate {
                return Err(DragError::InvalidPayload(format!(
                    "duplicate inline item of type `{}`",
                    item.mime
                )));
            }
        }

        Ok(())
    }

    /// Would dropping this payload onto a document make it navigate?
    pub fn is_navigation_capable(&self, config: &DragConfig) -> bool {
        matches!(self.kind, GestureKind::Link | GestureKind::Files)
            || self.items.iter().any(|item| config.is_navigation_type(&item.mime))
    }
}
