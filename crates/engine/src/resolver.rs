//! Product data resolution.
//!
//! Product pages expose the same product facts several times, in several
//! encodings, and none of the encodings is guaranteed present. The
//! resolver walks the sources in trust order and keeps the first value
//! each field gets:
//!
//! 1. component variant context - the serialized attribute reflecting the
//!    live variant selection (entity-escaped JSON);
//! 2. structured payloads - `application/json` product scripts, the
//!    legacy `var productInfo` inline global, then JSON-LD `Product`
//!    nodes;
//! 3. meta tags - `og:` title/image/price.
//!
//! A source that fails to parse is logged and skipped; it never aborts
//! resolution. Whatever is still missing afterwards is filled from
//! configured fallbacks, so resolution always produces a renderable
//! product.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::warn;
use url::Url;

use local_cart_core::{Price, VariantId};

use crate::config::CartConfig;
use crate::entities::decode_html_entities;
use crate::page::PageDocument;

/// Matches the legacy inline product global, e.g.
/// `var productInfo = {...};`.
static PRODUCT_INFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var\s+productInfo\s*=\s*(\{.+?\})\s*;").expect("valid pattern")
});

/// Fully resolved product facts for one add-to-cart action.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProduct {
    /// Selected variant, when any source carried one.
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub price: Price,
    pub image: String,
    pub handle: String,
    pub url: String,
}

/// Accumulator for the source cascade: first writer wins per field.
#[derive(Debug, Default)]
struct PartialProduct {
    variant_id: Option<VariantId>,
    title: Option<String>,
    price: Option<Price>,
    image: Option<String>,
    handle: Option<String>,
    url: Option<String>,
}

impl PartialProduct {
    fn set_variant_id(&mut self, value: Option<VariantId>) {
        if self.variant_id.is_none() {
            self.variant_id = value.filter(|v| !v.is_empty());
        }
    }

    fn set_title(&mut self, value: Option<String>) {
        if self.title.is_none() {
            self.title = value.filter(|v| !v.trim().is_empty());
        }
    }

    fn set_price(&mut self, value: Option<Price>) {
        if self.price.is_none() {
            self.price = value;
        }
    }

    fn set_image(&mut self, value: Option<String>) {
        if self.image.is_none() {
            self.image = value;
        }
    }

    fn set_handle(&mut self, value: Option<String>) {
        if self.handle.is_none() {
            self.handle = value.filter(|v| !v.is_empty());
        }
    }

    fn set_url(&mut self, value: Option<String>) {
        if self.url.is_none() {
            self.url = value.filter(|v| !v.is_empty());
        }
    }

    fn is_complete(&self) -> bool {
        self.variant_id.is_some()
            && self.title.is_some()
            && self.price.is_some()
            && self.image.is_some()
            && self.handle.is_some()
            && self.url.is_some()
    }
}

// =============================================================================
// Component variant context
// =============================================================================

/// The live variant selection inside a component context payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VariantSelected {
    /// Variant id; pages emit it as either a number or a string.
    pub id: Option<Value>,
    /// Price in minor units when integral, major units when fractional.
    pub price: Option<Value>,
    /// Full variant name, typically `"Product - Variant"`.
    pub name: Option<String>,
    /// Variant-only title, e.g. `"M / Black"`.
    pub public_title: Option<String>,
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
}

impl VariantSelected {
    /// The variant id as the loose string identity used for comparisons.
    pub(crate) fn id_string(&self) -> Option<String> {
        self.id.as_ref().and_then(loose_string)
    }

    pub(crate) fn price_value(&self) -> Option<Price> {
        self.price.as_ref().and_then(price_from_value)
    }
}

/// Decoded component context/data attribute payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ComponentContext {
    #[serde(rename = "variantSelected")]
    pub variant_selected: Option<VariantSelected>,
    #[serde(rename = "productTitle")]
    pub product_title: Option<String>,
    #[serde(rename = "productUrl")]
    pub product_url: Option<String>,
    #[serde(rename = "productHandle")]
    pub product_handle: Option<String>,
}

/// Decode and parse one serialized component attribute.
///
/// Returns `None` (after logging) when the payload is not usable JSON.
pub(crate) fn parse_component_context(attr: &str) -> Option<ComponentContext> {
    let decoded = decode_html_entities(attr);
    match serde_json::from_str(&decoded) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            warn!(error = %e, "unparseable component context, skipping");
            None
        }
    }
}

// =============================================================================
// Value coercion
// =============================================================================

/// Loose string identity: numbers and strings compare by their decimal
/// text form.
pub(crate) fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret a price value from a page payload.
///
/// Integral numbers are minor units (the platform serializes cents);
/// fractional numbers and decimal strings are major units.
pub(crate) fn price_from_value(value: &Value) -> Option<Price> {
    match value {
        Value::Number(n) => {
            if let Some(minor) = n.as_i64() {
                Some(Price::from_minor_units(minor))
            } else {
                n.as_f64().map(Price::from_f64_lossy)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if let Ok(minor) = s.parse::<i64>() {
                Some(Price::from_minor_units(minor))
            } else {
                Some(Price::parse_lossy(s))
            }
        }
        _ => None,
    }
}

/// Normalize a raw image reference into an absolute URL.
///
/// Protocol-relative and site-relative forms resolve against the page
/// origin; template leftovers (the literal text `undefined`) and empty
/// strings yield `None`.
#[must_use]
pub fn normalize_image_url(raw: &str, origin: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains("undefined") {
        return None;
    }
    if raw.starts_with("data:") || raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    let path = if raw.starts_with('/') {
        raw.to_string()
    } else {
        let mut rest = raw;
        while let Some(stripped) = rest.strip_prefix("../") {
            rest = stripped;
        }
        format!("/{rest}")
    };
    origin.join(&path).ok().map(String::from)
}

/// Derive a product handle from a page path: last segment, `.html`
/// stripped.
fn handle_from_path(path: &str) -> Option<String> {
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let handle = segment.strip_suffix(".html").unwrap_or(segment);
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Priority-cascade product resolver.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: Arc<CartConfig>,
}

impl Resolver {
    #[must_use]
    pub fn new(config: Arc<CartConfig>) -> Self {
        Self { config }
    }

    /// Resolve product facts for the page as a whole.
    #[must_use]
    pub fn resolve(&self, page: &PageDocument) -> ResolvedProduct {
        self.resolve_for(page, None, None)
    }

    /// Resolve product facts, preferring the variant context of the given
    /// component and matching `target` against variant enumerations in
    /// structured payloads.
    #[must_use]
    pub fn resolve_for(
        &self,
        page: &PageDocument,
        component: Option<usize>,
        target: Option<&VariantId>,
    ) -> ResolvedProduct {
        let mut partial = PartialProduct::default();

        Self::from_variant_context(page, component, &mut partial);
        if !partial.is_complete() {
            Self::from_structured_payloads(page, target, &mut partial);
        }
        if !partial.is_complete() {
            Self::from_meta_tags(page, &mut partial);
        }

        self.finalize(page, partial)
    }

    /// Source 1: serialized component context (live variant selection).
    fn from_variant_context(
        page: &PageDocument,
        component: Option<usize>,
        partial: &mut PartialProduct,
    ) {
        let indices: Vec<usize> = match component {
            Some(i) => std::iter::once(i)
                .chain((0..page.components.len()).filter(|&j| j != i))
                .collect(),
            None => (0..page.components.len()).collect(),
        };

        for idx in indices {
            let Some(comp) = page.components.get(idx) else {
                continue;
            };
            for attr in [comp.context_attr.as_deref(), comp.data_attr.as_deref()]
                .into_iter()
                .flatten()
            {
                let Some(ctx) = parse_component_context(attr) else {
                    continue;
                };
                if let Some(variant) = &ctx.variant_selected {
                    partial.set_variant_id(variant.id_string().map(VariantId::new));
                    partial.set_price(variant.price_value());
                    partial.set_title(variant.name.clone());
                }
                partial.set_title(ctx.product_title.clone());
                partial.set_url(ctx.product_url.clone());
                partial.set_handle(ctx.product_handle.clone());
            }
            if partial.variant_id.is_some() {
                break;
            }
        }
    }

    /// Source 2: structured payloads, most specific encoding first.
    fn from_structured_payloads(
        page: &PageDocument,
        target: Option<&VariantId>,
        partial: &mut PartialProduct,
    ) {
        for body in &page.json_scripts {
            match serde_json::from_str::<Value>(body) {
                Ok(value) => Self::from_product_json(&value, target, page, partial),
                Err(e) => warn!(error = %e, "unparseable product JSON script, skipping"),
            }
            if partial.is_complete() {
                return;
            }
        }

        for body in &page.inline_scripts {
            if let Some(captures) = PRODUCT_INFO_RE.captures(body) {
                match serde_json::from_str::<Value>(&captures[1]) {
                    Ok(value) => Self::from_product_json(&value, target, page, partial),
                    Err(e) => warn!(error = %e, "unparseable inline product global, skipping"),
                }
            }
            if partial.is_complete() {
                return;
            }
        }

        for body in &page.json_ld_scripts {
            match serde_json::from_str::<Value>(body) {
                Ok(value) => Self::from_json_ld(&value, page, partial),
                Err(e) => warn!(error = %e, "unparseable JSON-LD script, skipping"),
            }
            if partial.is_complete() {
                return;
            }
        }
    }

    /// A platform product payload: `{product: {variants: [...]}}` or the
    /// bare product object. The enumerated variant matching `target` (by
    /// loose string identity) supplies the variant facts; without a match
    /// the first variant stands in.
    fn from_product_json(
        value: &Value,
        target: Option<&VariantId>,
        page: &PageDocument,
        partial: &mut PartialProduct,
    ) {
        let product = value.get("product").unwrap_or(value);
        let Some(variants) = product.get("variants").and_then(Value::as_array) else {
            return;
        };

        let matched = target
            .and_then(|t| {
                variants.iter().find(|v| {
                    v.get("id").and_then(loose_string).as_deref() == Some(t.as_str())
                })
            })
            .or_else(|| variants.first());
        if let Some(variant) = matched {
            partial.set_variant_id(
                variant.get("id").and_then(loose_string).map(VariantId::new),
            );
            partial.set_price(variant.get("price").and_then(price_from_value));
        }
        partial.set_title(
            product
                .get("title")
                .and_then(Value::as_str)
                .map(String::from),
        );
        partial.set_handle(
            product
                .get("handle")
                .and_then(Value::as_str)
                .map(String::from),
        );
        let image = product
            .get("featured_image")
            .and_then(Value::as_str)
            .or_else(|| {
                product
                    .get("images")
                    .and_then(Value::as_array)
                    .and_then(|a| a.first())
                    .and_then(Value::as_str)
            });
        partial.set_image(image.and_then(|raw| normalize_image_url(raw, &page.origin)));
    }

    /// A JSON-LD `Product` node. Prices here are major units.
    fn from_json_ld(value: &Value, page: &PageDocument, partial: &mut PartialProduct) {
        if value.get("@type").and_then(Value::as_str) != Some("Product") {
            return;
        }
        partial.set_title(value.get("name").and_then(Value::as_str).map(String::from));

        let image = match value.get("image") {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Array(a)) => a.first().and_then(Value::as_str),
            _ => None,
        };
        partial.set_image(image.and_then(|raw| normalize_image_url(raw, &page.origin)));

        if let Some(offers) = value.get("offers") {
            let offer = offers
                .get(0)
                .unwrap_or(offers);
            let price = match offer.get("price") {
                Some(Value::Number(n)) => n.as_f64().map(Price::from_f64_lossy),
                Some(Value::String(s)) => Some(Price::parse_lossy(s)),
                _ => None,
            };
            partial.set_price(price);
        }
    }

    /// Source 3: `og:` meta tags. Prices here are major units.
    fn from_meta_tags(page: &PageDocument, partial: &mut PartialProduct) {
        partial.set_title(page.meta.og_title.clone());
        let image = page
            .meta
            .og_image_secure_url
            .as_deref()
            .or(page.meta.og_image.as_deref());
        partial.set_image(image.and_then(|raw| normalize_image_url(raw, &page.origin)));
        partial.set_price(
            page.meta
                .og_price_amount
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Price::parse_lossy),
        );
    }

    /// Fill whatever the cascade left empty from fallbacks.
    fn finalize(&self, page: &PageDocument, partial: PartialProduct) -> ResolvedProduct {
        ResolvedProduct {
            variant_id: partial.variant_id,
            title: partial
                .title
                .unwrap_or_else(|| self.config.fallback_title.clone()),
            price: partial.price.unwrap_or(Price::ZERO),
            image: partial
                .image
                .unwrap_or_else(|| self.config.placeholder_image.clone()),
            handle: partial
                .handle
                .or_else(|| handle_from_path(&page.path))
                .unwrap_or_default(),
            url: partial.url.unwrap_or_else(|| page.path.clone()),
        }
    }
}
