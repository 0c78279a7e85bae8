//! Tests for protocol/observer

use super::*;
use crate::protocol::MemoryDocument;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn observer() -> FieldObserver<Vec<BridgeCall>> {
    FieldObserver::new(Vec::new(), ObserverSettings::default())
}

struct Page {
    doc: MemoryDocument,
    form: NodeId,
    email: NodeId,
    password: NodeId,
    comment: NodeId,
}

fn signup_page() -> Page {
    let mut doc = MemoryDocument::new("https://shop.test/signup");
    let form = doc.append(doc.body(), "form", &[("id", "signup")]);
    let email = doc.append_input(form, &[("type", "email"), ("name", "email")]);
    let password = doc.append_input(form, &[("type", "password"), ("id", "pw")]);
    let comment = doc.append(form, "textarea", &[("id", "comment")]);
    doc.append_input(form, &[("type", "checkbox"), ("id", "terms")]);
    doc.append_input(form, &[("type", "text")]);
    Page {
        doc,
        form,
        email,
        password,
        comment,
    }
}

fn calls_for<'a>(calls: &'a [BridgeCall], field: &str) -> Vec<&'a BridgeCall> {
    calls
        .iter()
        .filter(|c| c.field_identifier() == Some(field))
        .collect()
}

// =========================================================================
// Eligibility
// =========================================================================

#[test]
fn test_eligible_field_types() {
    let mut doc = MemoryDocument::new("https://a.test");
    let body = doc.body();
    let plain = doc.append_input(body, &[]);
    let upper = doc.append_input(body, &[("type", "EMAIL")]);
    let hidden = doc.append_input(body, &[("type", "hidden")]);
    let password = doc.append_input(body, &[("type", "password")]);
    let area = doc.append(body, "textarea", &[]);
    let div = doc.append(body, "div", &[]);

    assert_eq!(eligible_field_type(&doc, plain).as_deref(), Some("text"));
    assert_eq!(eligible_field_type(&doc, upper).as_deref(), Some("email"));
    assert_eq!(eligible_field_type(&doc, hidden), None);
    assert_eq!(eligible_field_type(&doc, password), None);
    assert_eq!(eligible_field_type(&doc, area).as_deref(), Some("textarea"));
    assert_eq!(eligible_field_type(&doc, div), None);
}

#[test]
fn test_identifier_prefers_id_over_name() {
    let mut doc = MemoryDocument::new("https://a.test");
    let body = doc.body();
    let both = doc.append_input(body, &[("id", "user"), ("name", "login")]);
    let blank_id = doc.append_input(body, &[("id", "  "), ("name", "login")]);
    let neither = doc.append_input(body, &[]);

    assert_eq!(field_identifier(&doc, both).unwrap(), "user");
    assert_eq!(field_identifier(&doc, blank_id).unwrap(), "login");
    assert!(matches!(
        field_identifier(&doc, neither),
        Err(FormfillError::UntrackableField)
    ));
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn test_install_tracks_identifiable_eligible_fields() {
    let page = signup_page();
    let mut obs = observer();

    let tracked = obs.install(&page.doc, Instant::now());

    assert_eq!(tracked, 2);
    assert!(obs.is_installed());
    assert_eq!(obs.tracked_identifiers(), vec!["email", "comment"]);
    assert_eq!(obs.sink(), &vec![BridgeCall::ReportFieldCount { count: 2 }]);
}

#[test]
fn test_events_before_install_are_ignored() {
    let page = signup_page();
    let mut obs = observer();
    obs.handle_event(&page.doc, DomEvent::Focus(page.email));
    assert!(obs.sink().is_empty());
}

#[test]
fn test_focus_input_blur_sequence() {
    let mut page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());
    obs.sink_mut().clear();

    obs.handle_event(&page.doc, DomEvent::Focus(page.email));
    page.doc.set_value(page.email, "a@b.com");
    obs.handle_event(&page.doc, DomEvent::Input(page.email));
    obs.handle_event(&page.doc, DomEvent::Blur(page.email));

    assert_eq!(
        obs.into_sink(),
        vec![
            BridgeCall::InputFocused {
                field_identifier: "email".into(),
                field_type: "email".into(),
            },
            BridgeCall::InputValueChanged {
                field_identifier: "email".into(),
                value: "a@b.com".into(),
            },
            BridgeCall::SaveSubmittedValue {
                field_identifier: "email".into(),
                value: "a@b.com".into(),
                field_type: "email".into(),
            },
            BridgeCall::InputBlurred {
                field_identifier: "email".into(),
            },
        ]
    );
}

#[test]
fn test_blur_with_empty_value_does_not_save() {
    let page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());
    obs.sink_mut().clear();

    obs.handle_event(&page.doc, DomEvent::Blur(page.comment));

    assert_eq!(
        obs.sink(),
        &vec![BridgeCall::InputBlurred {
            field_identifier: "comment".into()
        }]
    );
}

#[test]
fn test_password_field_never_emits() {
    let mut page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());

    page.doc.set_value(page.password, "hunter2");
    obs.handle_event(&page.doc, DomEvent::Focus(page.password));
    obs.handle_event(&page.doc, DomEvent::Input(page.password));
    obs.handle_event(&page.doc, DomEvent::Blur(page.password));
    obs.handle_event(&page.doc, DomEvent::Submit(page.form));

    let calls = obs.into_sink();
    assert!(calls_for(&calls, "pw").is_empty());
    assert!(!calls.iter().any(|c| matches!(
        c,
        BridgeCall::SaveSubmittedValue { value, .. } | BridgeCall::InputValueChanged { value, .. }
            if value == "hunter2"
    )));
}

#[test]
fn test_password_revealed_as_text_stays_silent() {
    let mut doc = MemoryDocument::new("https://a.test/login");
    let form = doc.append(doc.body(), "form", &[]);
    let pw = doc.append_input(form, &[("type", "password"), ("id", "pw")]);
    let mut obs = observer();
    let t0 = Instant::now();
    obs.install(&doc, t0);

    // "Show password" toggles flip the element's type in place
    doc.set_attribute(pw, "type", "text");
    doc.set_value(pw, "hunter2");
    obs.handle_event(&doc, DomEvent::Mutation { inserted: vec![pw] });
    obs.handle_event(&doc, DomEvent::Focus(pw));
    obs.handle_event(&doc, DomEvent::Blur(pw));
    obs.handle_event(&doc, DomEvent::Submit(form));
    doc.set_url("https://a.test/login#again");
    obs.poll(&doc, t0 + ms(600));

    assert_eq!(obs.tracked_count(), 0);
    let calls = obs.into_sink();
    assert!(calls_for(&calls, "pw").is_empty());
}

#[test]
fn test_submit_saves_non_empty_eligible_fields() {
    let mut page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());
    obs.sink_mut().clear();

    page.doc.set_value(page.email, "a@b.com");
    page.doc.set_value(page.password, "secret");
    obs.handle_event(&page.doc, DomEvent::Submit(page.form));

    assert_eq!(
        obs.sink(),
        &vec![BridgeCall::SaveSubmittedValue {
            field_identifier: "email".into(),
            value: "a@b.com".into(),
            field_type: "email".into(),
        }]
    );
}

#[test]
fn test_mutation_tracks_inserted_fields() {
    let mut page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());
    obs.sink_mut().clear();

    let section = page.doc.append(page.doc.body(), "div", &[]);
    let city = page.doc.append_input(section, &[("name", "city")]);
    obs.handle_event(&page.doc, DomEvent::Mutation {
        inserted: vec![section],
    });
    obs.handle_event(&page.doc, DomEvent::Focus(city));

    assert_eq!(
        obs.sink(),
        &vec![
            BridgeCall::ReportFieldCount { count: 3 },
            BridgeCall::InputFocused {
                field_identifier: "city".into(),
                field_type: "text".into(),
            },
        ]
    );
}

#[test]
fn test_mutation_without_new_fields_is_silent() {
    let mut page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());
    obs.sink_mut().clear();

    let banner = page.doc.append(page.doc.body(), "div", &[]);
    obs.handle_event(&page.doc, DomEvent::Mutation {
        inserted: vec![banner],
    });
    assert!(obs.sink().is_empty());
}

#[test]
fn test_poll_reports_url_change_once_per_interval() {
    let mut page = signup_page();
    let mut obs = observer();
    let t0 = Instant::now();
    obs.install(&page.doc, t0);
    obs.sink_mut().clear();

    page.doc.set_url("https://shop.test/checkout");
    assert!(!obs.poll(&page.doc, t0 + ms(100)));
    assert!(obs.poll(&page.doc, t0 + ms(500)));
    assert!(!obs.poll(&page.doc, t0 + ms(1000)));

    assert_eq!(
        obs.sink().first(),
        Some(&BridgeCall::PageUrlChanged {
            url: "https://shop.test/checkout".into()
        })
    );
    assert_eq!(obs.sink().len(), 2);
}

#[test]
fn test_poll_rescan_drops_detached_fields() {
    let mut page = signup_page();
    let mut obs = observer();
    let t0 = Instant::now();
    obs.install(&page.doc, t0);

    page.doc.remove(page.comment);
    page.doc.set_url("https://shop.test/step-2");
    obs.poll(&page.doc, t0 + ms(600));

    assert_eq!(obs.tracked_identifiers(), vec!["email"]);
}

#[test]
fn test_set_input_value_writes_and_synthesizes_events() {
    let mut page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());

    assert!(obs.set_input_value(&mut page.doc, "email", "x@y.org"));
    assert_eq!(page.doc.value(page.email), "x@y.org");
    assert_eq!(
        page.doc.dispatched(page.email),
        &[
            SyntheticEvent::Input,
            SyntheticEvent::Change,
            SyntheticEvent::KeyDown,
            SyntheticEvent::KeyUp,
        ]
    );
}

#[test]
fn test_set_input_value_unknown_or_password_field() {
    let mut page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());

    assert!(!obs.set_input_value(&mut page.doc, "missing", "x"));
    assert!(!obs.set_input_value(&mut page.doc, "pw", "x"));
    assert_eq!(page.doc.value(page.password), "");
}

#[test]
fn test_teardown_stops_emitting() {
    let page = signup_page();
    let mut obs = observer();
    obs.install(&page.doc, Instant::now());
    obs.teardown();
    obs.sink_mut().clear();

    obs.handle_event(&page.doc, DomEvent::Focus(page.email));
    assert!(obs.sink().is_empty());
    assert_eq!(obs.tracked_count(), 0);
}

#[test]
fn test_reinstall_is_idempotent() {
    let page = signup_page();
    let mut obs = observer();
    let t0 = Instant::now();
    obs.install(&page.doc, t0);
    let tracked = obs.install(&page.doc, t0 + ms(10));

    assert_eq!(tracked, 2);
    assert_eq!(obs.tracked_count(), 2);
}
