//! Typed snapshot of the page data the engine consumes.
//!
//! The engine reads a fixed, predictable set of page-provided data: meta
//! description tags, embedded JSON/JSON-LD scripts, product components'
//! serialized context attributes, and option controls following the
//! `options[...]` naming convention. The host hands that contract over as
//! a structured snapshot; the only page field the engine ever writes back
//! is a form's hidden variant-id field (kept current by the variant
//! tracking observer).

use serde::{Deserialize, Serialize};
use url::Url;

/// Form action path fragment identifying a cart-add form.
const CART_ADD_ACTION: &str = "/cart/add";

/// Page-type marker value emitted by the page builder on product pages.
const PRODUCT_PAGE_MARKER: &str = "GP_PRODUCT";

/// Meta description tags present in the page head.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaTags {
    pub og_type: Option<String>,
    pub og_title: Option<String>,
    pub og_image: Option<String>,
    pub og_image_secure_url: Option<String>,
    pub og_price_amount: Option<String>,
}

/// A select control scoped to an option field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectControl {
    /// Control name, e.g. `options[Size]`.
    pub name: String,
    /// Associated label text, when one exists.
    pub label: Option<String>,
    /// Currently selected value (empty when nothing is selected).
    pub value: String,
}

/// A radio group scoped to an option field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioGroup {
    /// Group name, e.g. `options[Color]`.
    pub name: String,
    /// Associated label text, when one exists.
    pub label: Option<String>,
    /// Value of the checked member, if any member is checked.
    pub checked: Option<String>,
}

/// A form on the page, identified by a stable key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartForm {
    /// Stable form identity. The idempotency guard is keyed by this, not
    /// by which capture point delivered the event.
    pub key: String,
    /// Submission target path.
    pub action: String,
    /// Hidden variant-id field (`input[name="id"]`). Written by the
    /// variant tracking observer.
    pub variant_id_field: Option<String>,
    /// Quantity field value, when present.
    pub quantity_field: Option<String>,
    /// Option select controls.
    pub selects: Vec<SelectControl>,
    /// Option radio groups.
    pub radio_groups: Vec<RadioGroup>,
}

impl CartForm {
    /// A bare cart-add form with the given key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            action: CART_ADD_ACTION.to_string(),
            variant_id_field: None,
            quantity_field: None,
            selects: Vec::new(),
            radio_groups: Vec::new(),
        }
    }

    /// Whether this form submits to the cart-add endpoint.
    #[must_use]
    pub fn is_cart_add(&self) -> bool {
        self.action.contains(CART_ADD_ACTION)
    }
}

/// A product component: the page element carrying serialized variant
/// context, wrapping zero or more cart forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductComponent {
    /// Serialized context attribute (HTML-entity-escaped JSON); reflects
    /// the currently selected variant.
    pub context_attr: Option<String>,
    /// Serialized data attribute, same encoding; carries product url and
    /// handle in addition to the selected variant.
    pub data_attr: Option<String>,
    /// Cart forms owned by this component.
    pub forms: Vec<CartForm>,
}

/// Snapshot of one page as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDocument {
    /// Page origin (scheme + host), used to resolve relative image URLs.
    pub origin: Url,
    /// Location path, e.g. `/products/socks.html`.
    pub path: String,
    /// Meta description tags.
    pub meta: MetaTags,
    /// Page-type markers (`data-page-type` values and style markers).
    pub page_type_markers: Vec<String>,
    /// Bodies of `application/json` scripts.
    pub json_scripts: Vec<String>,
    /// Bodies of `application/ld+json` scripts.
    pub json_ld_scripts: Vec<String>,
    /// Bodies of untyped scripts (searched for product globals).
    pub inline_scripts: Vec<String>,
    /// Product components with their owned forms.
    pub components: Vec<ProductComponent>,
    /// Cart forms not wrapped by any product component.
    pub loose_forms: Vec<CartForm>,
}

impl PageDocument {
    /// An empty snapshot for the given origin and path.
    #[must_use]
    pub fn new(origin: Url, path: impl Into<String>) -> Self {
        Self {
            origin,
            path: path.into(),
            meta: MetaTags::default(),
            page_type_markers: Vec::new(),
            json_scripts: Vec::new(),
            json_ld_scripts: Vec::new(),
            inline_scripts: Vec::new(),
            components: Vec::new(),
            loose_forms: Vec::new(),
        }
    }

    /// Classify the page as a product page.
    ///
    /// First match wins: structured metadata (og:type), then structural
    /// page-type markers, then the URL shape.
    #[must_use]
    pub fn is_product_page(&self) -> bool {
        if self.meta.og_type.as_deref() == Some("product") {
            return true;
        }
        if self
            .page_type_markers
            .iter()
            .any(|m| m == PRODUCT_PAGE_MARKER || m.eq_ignore_ascii_case("product"))
        {
            return true;
        }
        self.path.contains("/products/")
    }

    /// All cart-add forms on the page, component-owned first, in document
    /// order.
    pub fn cart_forms(&self) -> impl Iterator<Item = &CartForm> {
        self.components
            .iter()
            .flat_map(|c| c.forms.iter())
            .chain(self.loose_forms.iter())
            .filter(|f| f.is_cart_add())
    }

    /// Key of the first cart-add form on the page, if any.
    #[must_use]
    pub fn first_cart_form_key(&self) -> Option<String> {
        self.cart_forms().next().map(|f| f.key.clone())
    }

    /// Find a cart-add form by key.
    #[must_use]
    pub fn find_form(&self, key: &str) -> Option<&CartForm> {
        self.cart_forms().find(|f| f.key == key)
    }

    /// Find a form by key for mutation (hidden variant-id updates).
    pub fn find_form_mut(&mut self, key: &str) -> Option<&mut CartForm> {
        self.components
            .iter_mut()
            .flat_map(|c| c.forms.iter_mut())
            .chain(self.loose_forms.iter_mut())
            .find(|f| f.key == key)
    }

    /// Index of the product component owning the given form, if any.
    #[must_use]
    pub fn owning_component_index(&self, form_key: &str) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.forms.iter().any(|f| f.key == form_key))
    }

    /// Key of the first cart-add form inside the given component, falling
    /// back to the first form anywhere on the page (the page may render
    /// the buy button and the form in sibling trees).
    #[must_use]
    pub fn component_form_key(&self, component: usize) -> Option<String> {
        self.components
            .get(component)
            .and_then(|c| c.forms.iter().find(|f| f.is_cart_add()))
            .map(|f| f.key.clone())
            .or_else(|| self.first_cart_form_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(path: &str) -> PageDocument {
        PageDocument::new(Url::parse("https://shop.example.com").expect("url"), path)
    }

    #[test]
    fn test_product_page_via_meta() {
        let mut p = page("/");
        p.meta.og_type = Some("product".to_string());
        assert!(p.is_product_page());
    }

    #[test]
    fn test_product_page_via_marker() {
        let mut p = page("/landing");
        p.page_type_markers.push("GP_PRODUCT".to_string());
        assert!(p.is_product_page());
    }

    #[test]
    fn test_product_page_via_url() {
        assert!(page("/products/socks.html").is_product_page());
        assert!(!page("/collections/all").is_product_page());
    }

    #[test]
    fn test_home_page_is_not_product_page() {
        let mut p = page("/");
        p.page_type_markers.push("GP_INDEX".to_string());
        assert!(!p.is_product_page());
    }

    #[test]
    fn test_cart_forms_skip_non_cart_actions() {
        let mut p = page("/products/socks");
        let mut contact = CartForm::new("contact");
        contact.action = "/contact".to_string();
        p.loose_forms.push(contact);
        p.loose_forms.push(CartForm::new("buy"));

        assert_eq!(p.first_cart_form_key().as_deref(), Some("buy"));
    }

    #[test]
    fn test_component_form_falls_back_to_page_form() {
        let mut p = page("/products/socks");
        p.components.push(ProductComponent::default());
        p.loose_forms.push(CartForm::new("buy"));

        assert_eq!(p.component_form_key(0).as_deref(), Some("buy"));
        assert_eq!(p.component_form_key(9).as_deref(), Some("buy"));
    }

    #[test]
    fn test_owning_component_index() {
        let mut p = page("/products/socks");
        let mut component = ProductComponent::default();
        component.forms.push(CartForm::new("buy"));
        p.components.push(component);

        assert_eq!(p.owning_component_index("buy"), Some(0));
        assert_eq!(p.owning_component_index("other"), None);
    }
}
