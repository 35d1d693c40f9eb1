//! Cross-context behavior: two sessions sharing one storage origin, like
//! two tabs on the same shop.

#![allow(clippy::unwrap_used)]

use local_cart_core::LineItem;
use local_cart_engine::PageEvent;
use local_cart_integration_tests::{TestOrigin, product_page};

use std::cell::RefCell;
use std::rc::Rc;

fn submit() -> PageEvent {
    PageEvent::FormSubmit {
        form_key: "product-form".to_string(),
    }
}

#[test]
fn test_other_tab_sees_add_after_pump() {
    let origin = TestOrigin::new();
    let mut tab_a = origin.open_session();
    let mut tab_b = origin.open_session();

    tab_a.handle_event(&mut product_page(), submit());
    assert!(tab_b.engine().is_empty());

    assert!(tab_b.pump_storage_events());
    assert_eq!(tab_b.engine().items(), tab_a.engine().items());
}

#[test]
fn test_writer_tab_gets_no_echo() {
    let origin = TestOrigin::new();
    let mut tab_a = origin.open_session();
    let _tab_b = origin.open_session();

    tab_a.handle_event(&mut product_page(), submit());
    assert!(!tab_a.pump_storage_events());
}

#[test]
fn test_last_write_wins_between_tabs() {
    let origin = TestOrigin::new();
    let mut tab_a = origin.open_session();
    let mut tab_b = origin.open_session();

    tab_a.handle_event(&mut product_page(), submit());
    tab_b.pump_storage_events();

    // Tab B clears, tab A adds again without pumping first: A's write
    // replaces B's wholesale.
    tab_b.engine_mut().clear().unwrap();
    let mut page = product_page();
    page.components[0].forms[0].key = "product-form-2".to_string();
    tab_a.handle_event(
        &mut page,
        PageEvent::FormSubmit {
            form_key: "product-form-2".to_string(),
        },
    );

    tab_b.pump_storage_events();
    assert_eq!(tab_b.engine().total_items(), 2);
    assert_eq!(tab_b.engine().items(), tab_a.engine().items());
}

#[test]
fn test_reload_notifies_subscribers() {
    let origin = TestOrigin::new();
    let mut tab_a = origin.open_session();
    let mut tab_b = origin.open_session();

    let seen: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    tab_b
        .engine_mut()
        .on_change(move |items: &[LineItem]| sink.borrow_mut().push(items.len()));

    tab_a.handle_event(&mut product_page(), submit());
    tab_b.pump_storage_events();

    assert_eq!(*seen.borrow(), vec![1]);
}

#[test]
fn test_pump_without_changes_is_noop() {
    let origin = TestOrigin::new();
    let mut tab_a = origin.open_session();

    assert!(!tab_a.pump_storage_events());
    assert!(tab_a.engine().is_empty());
}
