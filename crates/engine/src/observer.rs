//! Variant tracking.
//!
//! The page's own variant picker rewrites the product component's
//! serialized context attribute when the user changes an option. The
//! observer mirrors that selection into the form's hidden variant-id
//! field so a plain form submit always carries the variant the user is
//! looking at. It never touches the cart; the interceptor reads the
//! synced state when an add actually happens.

use tracing::debug;

use crate::page::PageDocument;
use crate::resolver::parse_component_context;

/// Re-sync a form's hidden variant-id field from its owning component's
/// context (or, for loose forms, the first component carrying one).
///
/// Returns whether the field was updated to a new value.
pub fn sync_variant_field(page: &mut PageDocument, form_key: &str) -> bool {
    let component = page
        .owning_component_index(form_key)
        .or_else(|| (!page.components.is_empty()).then_some(0));

    let variant_id = component
        .and_then(|i| page.components.get(i))
        .and_then(|c| {
            [c.context_attr.as_deref(), c.data_attr.as_deref()]
                .into_iter()
                .flatten()
                .filter_map(parse_component_context)
                .find_map(|ctx| ctx.variant_selected.and_then(|v| v.id_string()))
        });

    let Some(variant_id) = variant_id else {
        return false;
    };
    write_variant_field(page, form_key, &variant_id)
}

/// Install a replacement context attribute on a component and push the
/// new selection into the hidden fields of the component's forms.
///
/// Returns whether any field changed.
pub fn apply_context_change(page: &mut PageDocument, component: usize, context: &str) -> bool {
    let Some(comp) = page.components.get_mut(component) else {
        return false;
    };
    comp.context_attr = Some(context.to_string());

    let Some(variant_id) = parse_component_context(context)
        .and_then(|ctx| ctx.variant_selected)
        .and_then(|v| v.id_string())
    else {
        return false;
    };

    let form_keys: Vec<String> = page.components[component]
        .forms
        .iter()
        .filter(|f| f.is_cart_add())
        .map(|f| f.key.clone())
        .collect();

    let mut changed = false;
    if form_keys.is_empty() {
        // Buy button and form rendered in sibling trees.
        if let Some(key) = page.first_cart_form_key() {
            changed = write_variant_field(page, &key, &variant_id);
        }
    } else {
        for key in form_keys {
            changed |= write_variant_field(page, &key, &variant_id);
        }
    }
    changed
}

fn write_variant_field(page: &mut PageDocument, form_key: &str, variant_id: &str) -> bool {
    let Some(form) = page.find_form_mut(form_key) else {
        return false;
    };
    if form.variant_id_field.as_deref() == Some(variant_id) {
        return false;
    }
    debug!(form = form_key, variant = variant_id, "synced hidden variant field");
    form.variant_id_field = Some(variant_id.to_string());
    true
}
