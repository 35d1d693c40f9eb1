//! Add-to-cart interception.
//!
//! A single user intent ("add this") can surface as several page events:
//! the form submit, the buy-button click, and a click on the surrounding
//! product component. The session funnels all of them through one
//! pipeline and an idempotency guard keyed by form identity, so
//! overlapping capture points within the processing window produce
//! exactly one cart mutation.
//!
//! The pipeline for an add event: gate on page type, settle on the target
//! form, claim the processing window, validate the option controls,
//! resolve the variant id and product facts, assemble the candidate, and
//! hand it to the cart engine. Any failure after the claim still consumes
//! the window - a rejected submit should not let a double-click through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{instrument, warn};

use local_cart_core::{SelectedOptions, VariantId};

use crate::cart::{CandidateItem, CartEngine};
use crate::config::CartConfig;
use crate::error::CartError;
use crate::observer;
use crate::options::{RawOptionMap, normalize_options};
use crate::page::{CartForm, PageDocument};
use crate::resolver::{Resolver, VariantSelected, normalize_image_url, parse_component_context};

/// Placeholder values a select/radio control can report while nothing
/// real is chosen.
const UNSELECTED_VALUES: [&str; 3] = ["", "0", "null"];

/// Generic option name used in validation errors when the control has no
/// label.
const GENERIC_OPTION_NAME: &str = "option";

/// A page event delivered to the session by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A cart-add form was submitted.
    FormSubmit { form_key: String },
    /// An add-to-cart button was clicked; `form_key` is the owning form
    /// when the host could determine one.
    AddButtonClick { form_key: Option<String> },
    /// A click landed inside a product component (delegated capture).
    ComponentClick { component: usize },
    /// An option control in a form changed value.
    OptionChange { form_key: String },
    /// A product component's serialized context attribute was replaced
    /// (the page's own variant picker ran).
    ComponentContextChange { component: usize, context: String },
}

/// Outcome of dispatching one page event.
#[derive(Debug)]
pub enum Dispatch {
    /// The event is not the session's concern (wrong page type, no cart
    /// form, unknown target).
    NotHandled,
    /// A duplicate capture arrived inside the processing window and was
    /// dropped.
    DroppedWhileProcessing,
    /// The add was rejected; the error says why.
    Rejected(CartError),
    /// An item landed in the cart.
    Added { merged: bool },
    /// A variant change was synced into the form's hidden field.
    VariantSynced,
}

// =============================================================================
// Idempotency guard
// =============================================================================

/// Per-form processing window with lazy expiry.
///
/// A form's first claim within the window wins; later claims fail until
/// the window elapses. Entries expire on the next claim attempt rather
/// than on a timer.
#[derive(Debug)]
pub struct ProcessingGuard {
    window: Duration,
    in_flight: HashMap<String, Instant>,
}

impl ProcessingGuard {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            in_flight: HashMap::new(),
        }
    }

    /// Try to claim the processing window for `form_key` at `now`.
    ///
    /// Every claim attempt also sweeps out expired entries, so the map
    /// only ever holds forms whose window is still open.
    pub fn try_begin_at(&mut self, form_key: &str, now: Instant) -> bool {
        self.in_flight
            .retain(|_, claimed| now.duration_since(*claimed) < self.window);
        if self.in_flight.contains_key(form_key) {
            return false;
        }
        self.in_flight.insert(form_key.to_string(), now);
        true
    }

    /// Try to claim the processing window for `form_key` now.
    pub fn try_begin(&mut self, form_key: &str) -> bool {
        self.try_begin_at(form_key, Instant::now())
    }
}

// =============================================================================
// Session
// =============================================================================

/// One browsing context's cart session: the event entry point tying the
/// guard, resolver, and engine together.
#[derive(Debug)]
pub struct CartSession {
    config: Arc<CartConfig>,
    engine: CartEngine,
    resolver: Resolver,
    guard: ProcessingGuard,
}

impl CartSession {
    #[must_use]
    pub fn new(config: Arc<CartConfig>, engine: CartEngine) -> Self {
        let resolver = Resolver::new(Arc::clone(&config));
        let guard = ProcessingGuard::new(config.processing_window());
        Self {
            config,
            engine,
            resolver,
            guard,
        }
    }

    /// The underlying cart engine.
    #[must_use]
    pub fn engine(&self) -> &CartEngine {
        &self.engine
    }

    /// Mutable access to the cart engine (quantity updates, subscriptions,
    /// checkout).
    pub fn engine_mut(&mut self) -> &mut CartEngine {
        &mut self.engine
    }

    /// Dispatch one page event.
    ///
    /// Add-intent events run the interception pipeline; option and
    /// context changes go to the variant tracking observer. Everything is
    /// gated on the page being a product page, matching where the capture
    /// points are installed.
    #[instrument(skip(self, page), fields(path = %page.path))]
    pub fn handle_event(&mut self, page: &mut PageDocument, event: PageEvent) -> Dispatch {
        if !page.is_product_page() {
            return Dispatch::NotHandled;
        }

        match event {
            PageEvent::FormSubmit { form_key } => self.intercept_add(page, &form_key),
            PageEvent::AddButtonClick { form_key } => {
                let Some(key) = form_key.or_else(|| page.first_cart_form_key()) else {
                    return Dispatch::NotHandled;
                };
                self.intercept_add(page, &key)
            }
            PageEvent::ComponentClick { component } => {
                let Some(key) = page.component_form_key(component) else {
                    return Dispatch::NotHandled;
                };
                self.intercept_add(page, &key)
            }
            PageEvent::OptionChange { form_key } => {
                if observer::sync_variant_field(page, &form_key) {
                    Dispatch::VariantSynced
                } else {
                    Dispatch::NotHandled
                }
            }
            PageEvent::ComponentContextChange { component, context } => {
                if observer::apply_context_change(page, component, &context) {
                    Dispatch::VariantSynced
                } else {
                    Dispatch::NotHandled
                }
            }
        }
    }

    /// Apply cross-context storage changes; see
    /// [`CartEngine::pump_storage_events`].
    pub fn pump_storage_events(&mut self) -> bool {
        self.engine.pump_storage_events()
    }

    // =========================================================================
    // Add pipeline
    // =========================================================================

    fn intercept_add(&mut self, page: &PageDocument, form_key: &str) -> Dispatch {
        let Some(form) = page.find_form(form_key) else {
            return Dispatch::NotHandled;
        };

        if !self.guard.try_begin(form_key) {
            return Dispatch::DroppedWhileProcessing;
        }

        let candidate = match self.build_candidate(page, form) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(form = form_key, error = %e, "add-to-cart rejected");
                return Dispatch::Rejected(e);
            }
        };

        match self.engine.add_item(candidate) {
            Ok(outcome) => Dispatch::Added {
                merged: outcome.is_merge(),
            },
            Err(e) => {
                warn!(form = form_key, error = %e, "add-to-cart failed");
                Dispatch::Rejected(e)
            }
        }
    }

    /// Validate the form and assemble the candidate line item.
    fn build_candidate(
        &self,
        page: &PageDocument,
        form: &CartForm,
    ) -> crate::error::Result<CandidateItem> {
        validate_selections(form)?;

        let component = page.owning_component_index(&form.key);
        let variant = component
            .and_then(|i| page.components.get(i))
            .and_then(|c| {
                [c.context_attr.as_deref(), c.data_attr.as_deref()]
                    .into_iter()
                    .flatten()
                    .filter_map(parse_component_context)
                    .find_map(|ctx| ctx.variant_selected)
            });

        // Live context wins over whatever the hidden field last held.
        let variant_id = variant
            .as_ref()
            .and_then(VariantSelected::id_string)
            .or_else(|| {
                form.variant_id_field
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from)
            })
            .map(VariantId::new)
            .ok_or(CartError::MissingVariantId)?;

        let quantity = form
            .quantity_field
            .as_deref()
            .and_then(|q| q.trim().parse::<u32>().ok())
            .unwrap_or(1);

        let mut raw_options = harvest_options(form, variant.as_ref());
        let resolved = self.resolver.resolve_for(page, component, Some(&variant_id));

        // Package selections override title composition and, optionally,
        // the image.
        let package = raw_options
            .values()
            .find_map(|v| self.config.match_package_override(v))
            .cloned();
        let mut image = resolved.image.clone();
        if let Some(pkg) = &package {
            raw_options.insert("packageVariant".to_string(), pkg.display_name.clone());
            if let Some(override_image) = pkg
                .image
                .as_deref()
                .and_then(|raw| normalize_image_url(raw, &page.origin))
            {
                image = override_image;
            }
        }

        let title = compose_title(
            &resolved.title,
            &normalize_options(&raw_options),
            variant.as_ref(),
        );

        Ok(CandidateItem {
            variant_id,
            raw_options,
            title,
            image,
            price: resolved.price,
            handle: resolved.handle,
            url: resolved.url,
            quantity,
        })
    }
}

// =============================================================================
// Form helpers
// =============================================================================

fn is_unselected(value: &str) -> bool {
    UNSELECTED_VALUES.contains(&value.trim())
}

/// User-facing name of an option control: label text, else the bare
/// option name from `options[...]`, else a generic term.
fn option_display_name(name: &str, label: Option<&str>) -> String {
    if let Some(label) = label {
        let label = label.trim().trim_end_matches(':');
        if !label.is_empty() {
            return label.to_string();
        }
    }
    let bare = bare_option_name(name);
    if bare.is_empty() {
        GENERIC_OPTION_NAME.to_string()
    } else {
        bare.to_string()
    }
}

/// `options[Size]` -> `Size`; anything else passes through.
fn bare_option_name(name: &str) -> &str {
    name.strip_prefix("options[")
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(name)
}

/// Reject the form when any option control reports no real selection.
fn validate_selections(form: &CartForm) -> crate::error::Result<()> {
    for select in &form.selects {
        if is_unselected(&select.value) {
            return Err(CartError::MissingOption(option_display_name(
                &select.name,
                select.label.as_deref(),
            )));
        }
    }
    for group in &form.radio_groups {
        let checked = group.checked.as_deref().unwrap_or("");
        if is_unselected(checked) {
            return Err(CartError::MissingOption(option_display_name(
                &group.name,
                group.label.as_deref(),
            )));
        }
    }
    Ok(())
}

/// Gather raw option selections: variant context first, form controls on
/// top (the control is what the user actually touched).
fn harvest_options(form: &CartForm, variant: Option<&VariantSelected>) -> RawOptionMap {
    let mut raw = RawOptionMap::new();

    if let Some(variant) = variant {
        for (slot, value) in [
            ("option1", &variant.option1),
            ("option2", &variant.option2),
            ("option3", &variant.option3),
        ] {
            if let Some(value) = value {
                raw.insert(slot.to_string(), value.clone());
            }
        }
    }

    for select in &form.selects {
        raw.insert(
            bare_option_name(&select.name).to_string(),
            select.value.clone(),
        );
    }
    for group in &form.radio_groups {
        if let Some(checked) = &group.checked {
            raw.insert(bare_option_name(&group.name).to_string(), checked.clone());
        }
    }

    raw
}

/// Compose the line-item title: base product name plus the variant
/// descriptor built from the canonical package/size/color slots (already
/// promoted from their aliases by normalization), falling back to the
/// variant's own public title.
fn compose_title(
    resolved_title: &str,
    options: &SelectedOptions,
    variant: Option<&VariantSelected>,
) -> String {
    let base = resolved_title
        .split(" - ")
        .next()
        .unwrap_or(resolved_title)
        .trim();

    let mut parts: Vec<&str> = Vec::new();
    for slot in ["packageVariant", "size", "color"] {
        if let Some(value) = options.get(slot)
            && !value.is_empty()
            && !parts.contains(&value)
        {
            parts.push(value);
        }
    }

    let descriptor = if parts.is_empty() {
        variant
            .and_then(|v| v.public_title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("default title"))
            .map(String::from)
    } else {
        Some(parts.join(" / "))
    };

    match descriptor {
        Some(descriptor) => format!("{base} - {descriptor}"),
        None => base.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::page::{ProductComponent, RadioGroup, SelectControl};
    use crate::store::{ChangeHub, MemoryBackend, PersistentStore, StorageBackend};
    use local_cart_core::Price;
    use url::Url;

    const CONTEXT: &str = "{&quot;variantSelected&quot;:{&quot;id&quot;:45123,\
        &quot;price&quot;:1299,&quot;name&quot;:&quot;Wool Socks - M / Black&quot;,\
        &quot;public_title&quot;:&quot;M / Black&quot;,\
        &quot;option2&quot;:&quot;M&quot;,&quot;option3&quot;:&quot;Black&quot;}}";

    fn session() -> CartSession {
        session_with(CartConfig::default())
    }

    fn session_with(config: CartConfig) -> CartSession {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let hub = Arc::new(ChangeHub::new());
        let config = Arc::new(config);
        let engine = CartEngine::new(PersistentStore::new(
            backend,
            hub,
            config.cart_storage_key.clone(),
        ));
        CartSession::new(config, engine)
    }

    fn product_page() -> PageDocument {
        let mut page = PageDocument::new(
            Url::parse("https://shop.example.com").unwrap(),
            "/products/wool-socks.html",
        );
        let mut form = CartForm::new("buy");
        form.variant_id_field = Some("45123".to_string());
        page.components.push(ProductComponent {
            context_attr: Some(CONTEXT.to_string()),
            data_attr: None,
            forms: vec![form],
        });
        page
    }

    fn submit(form_key: &str) -> PageEvent {
        PageEvent::FormSubmit {
            form_key: form_key.to_string(),
        }
    }

    #[test]
    fn test_submit_adds_item() {
        let mut session = session();
        let mut page = product_page();

        let dispatch = session.handle_event(&mut page, submit("buy"));
        assert!(matches!(dispatch, Dispatch::Added { merged: false }));

        let items = session.engine().items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].variant_id.as_str(), "45123");
        assert_eq!(items[0].price, Price::from_minor_units(1299));
        assert_eq!(items[0].title, "Wool Socks - M / Black");
        assert_eq!(items[0].selected_options.get("size"), Some("M"));
        assert_eq!(items[0].selected_options.get("color"), Some("Black"));
    }

    #[test]
    fn test_double_capture_adds_once() {
        let mut session = session();
        let mut page = product_page();

        // Click bubbles to the button, the component, and the form submit
        // within one window.
        let first = session.handle_event(
            &mut page,
            PageEvent::AddButtonClick {
                form_key: Some("buy".to_string()),
            },
        );
        let second = session.handle_event(&mut page, PageEvent::ComponentClick { component: 0 });
        let third = session.handle_event(&mut page, submit("buy"));

        assert!(matches!(first, Dispatch::Added { .. }));
        assert!(matches!(second, Dispatch::DroppedWhileProcessing));
        assert!(matches!(third, Dispatch::DroppedWhileProcessing));
        assert_eq!(session.engine().total_items(), 1);
    }

    #[test]
    fn test_window_expiry_allows_next_add() {
        let mut guard = ProcessingGuard::new(Duration::from_millis(500));
        let start = Instant::now();
        assert!(guard.try_begin_at("buy", start));
        assert!(!guard.try_begin_at("buy", start + Duration::from_millis(499)));
        assert!(guard.try_begin_at("buy", start + Duration::from_millis(500)));
        // Other forms are independent
        assert!(guard.try_begin_at("other", start));
    }

    #[test]
    fn test_expired_claims_are_swept_out() {
        let mut guard = ProcessingGuard::new(Duration::from_millis(500));
        let start = Instant::now();
        for key in ["form-a", "form-b", "form-c"] {
            assert!(guard.try_begin_at(key, start));
        }

        // A claim past the window drops every stale entry, not just the
        // one being claimed.
        assert!(guard.try_begin_at("form-d", start + Duration::from_secs(1)));
        assert_eq!(guard.in_flight.len(), 1);
        assert!(guard.in_flight.contains_key("form-d"));
    }

    #[test]
    fn test_second_add_after_window_merges() {
        let mut session = session();
        let mut page = product_page();
        session.handle_event(&mut page, submit("buy"));

        // Simulate the window elapsing.
        session.guard = ProcessingGuard::new(Duration::ZERO);
        let dispatch = session.handle_event(&mut page, submit("buy"));

        assert!(matches!(dispatch, Dispatch::Added { merged: true }));
        assert_eq!(session.engine().items().len(), 1);
        assert_eq!(session.engine().total_items(), 2);
    }

    #[test]
    fn test_non_product_page_not_handled() {
        let mut session = session();
        let mut page = product_page();
        page.path = "/collections/all".to_string();

        let dispatch = session.handle_event(&mut page, submit("buy"));
        assert!(matches!(dispatch, Dispatch::NotHandled));
        assert!(session.engine().is_empty());
    }

    #[test]
    fn test_unselected_option_rejected_with_label() {
        let mut session = session();
        let mut page = product_page();
        page.components[0].forms[0].selects.push(SelectControl {
            name: "options[Size]".to_string(),
            label: Some("Size:".to_string()),
            value: "0".to_string(),
        });

        let dispatch = session.handle_event(&mut page, submit("buy"));
        let Dispatch::Rejected(CartError::MissingOption(name)) = dispatch else {
            panic!("expected MissingOption, got {dispatch:?}");
        };
        assert_eq!(name, "Size");
        assert!(session.engine().is_empty());
    }

    #[test]
    fn test_unchecked_radio_rejected() {
        let mut session = session();
        let mut page = product_page();
        page.components[0].forms[0].radio_groups.push(RadioGroup {
            name: "options[Color]".to_string(),
            label: None,
            checked: None,
        });

        let dispatch = session.handle_event(&mut page, submit("buy"));
        let Dispatch::Rejected(CartError::MissingOption(name)) = dispatch else {
            panic!("expected MissingOption, got {dispatch:?}");
        };
        assert_eq!(name, "Color");
    }

    #[test]
    fn test_missing_variant_id_rejected() {
        let mut session = session();
        let mut page = product_page();
        page.components[0].context_attr = None;
        page.components[0].forms[0].variant_id_field = None;

        let dispatch = session.handle_event(&mut page, submit("buy"));
        assert!(matches!(
            dispatch,
            Dispatch::Rejected(CartError::MissingVariantId)
        ));
    }

    #[test]
    fn test_hidden_field_used_when_context_absent() {
        let mut session = session();
        let mut page = product_page();
        page.components[0].context_attr = None;

        let dispatch = session.handle_event(&mut page, submit("buy"));
        assert!(matches!(dispatch, Dispatch::Added { .. }));
        assert_eq!(session.engine().items()[0].variant_id.as_str(), "45123");
    }

    #[test]
    fn test_quantity_field_respected() {
        let mut session = session();
        let mut page = product_page();
        page.components[0].forms[0].quantity_field = Some("3".to_string());

        session.handle_event(&mut page, submit("buy"));
        assert_eq!(session.engine().total_items(), 3);
    }

    #[test]
    fn test_package_override_rewrites_title_and_image() {
        let config = CartConfig::from_json(
            r#"{"package_overrides":[{
                "matches":["2x Black"],
                "display_name":"5-pack",
                "image":"//cdn.example.com/5-pack.png"
            }]}"#,
        )
        .unwrap();
        let mut session = session_with(config);

        let mut page = product_page();
        page.components[0].forms[0].selects.push(SelectControl {
            name: "options[Package]".to_string(),
            label: Some("Package".to_string()),
            value: "2x Black + 1x Blue".to_string(),
        });

        session.handle_event(&mut page, submit("buy"));
        let item = &session.engine().items()[0];
        assert_eq!(item.selected_options.get("packageVariant"), Some("5-pack"));
        assert_eq!(item.image, "https://cdn.example.com/5-pack.png");
        assert!(item.title.starts_with("Wool Socks - 5-pack"));
    }

    #[test]
    fn test_button_click_without_key_uses_first_form() {
        let mut session = session();
        let mut page = product_page();

        let dispatch = session.handle_event(&mut page, PageEvent::AddButtonClick { form_key: None });
        assert!(matches!(dispatch, Dispatch::Added { .. }));
    }

    #[test]
    fn test_unknown_form_not_handled() {
        let mut session = session();
        let mut page = product_page();
        let dispatch = session.handle_event(&mut page, submit("missing"));
        assert!(matches!(dispatch, Dispatch::NotHandled));
    }

    #[test]
    fn test_rejection_consumes_window() {
        let mut session = session();
        let mut page = product_page();
        page.components[0].forms[0].selects.push(SelectControl {
            name: "options[Size]".to_string(),
            label: None,
            value: String::new(),
        });

        let first = session.handle_event(&mut page, submit("buy"));
        assert!(matches!(first, Dispatch::Rejected(_)));

        // Fixing the selection inside the window still has to wait.
        page.components[0].forms[0].selects[0].value = "M".to_string();
        let second = session.handle_event(&mut page, submit("buy"));
        assert!(matches!(second, Dispatch::DroppedWhileProcessing));
    }

    #[test]
    fn test_title_composition() {
        let mut options = SelectedOptions::new();
        options.insert("size", "M");
        options.insert("color", "Black");
        assert_eq!(
            compose_title("Wool Socks - stale", &options, None),
            "Wool Socks - M / Black"
        );

        assert_eq!(
            compose_title("Wool Socks", &SelectedOptions::new(), None),
            "Wool Socks"
        );
    }

    #[test]
    fn test_alias_options_reach_the_title() {
        // Context carries option2/option3 spellings and no public_title;
        // the descriptor still has to come out of the size/color slots.
        let mut session = session();
        let mut page = product_page();
        page.components[0].context_attr = Some(
            "{&quot;variantSelected&quot;:{&quot;id&quot;:45123,\
             &quot;price&quot;:1299,&quot;name&quot;:&quot;Wool Socks - M&quot;,\
             &quot;option2&quot;:&quot;M&quot;}}"
                .to_string(),
        );

        let dispatch = session.handle_event(&mut page, submit("buy"));
        assert!(matches!(dispatch, Dispatch::Added { .. }));
        assert_eq!(session.engine().items()[0].title, "Wool Socks - M");
    }
}
