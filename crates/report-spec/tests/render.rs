use report_spec::{
    FieldValue, FileHandle, FormSchema, FormSession, RenderStatus, render_json_ui, render_text,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "incident_report" => include_str!("../tests/fixtures/incident_report.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn session() -> FormSession {
    let schema = FormSchema::from_json_str(fixture("incident_report")).expect("deserialize");
    FormSession::new(schema).expect("session")
}

#[test]
fn fresh_form_needs_input() {
    let session = session();
    let payload = session.render();
    assert_eq!(payload.status, RenderStatus::NeedInput);
    assert_eq!(payload.progress.filled, 0);
    assert_eq!(payload.progress.total, 5);

    let text = render_text(&payload);
    assert!(text.contains("Form: Community Incident Report (incident-report)"));
    assert!(text.contains(" - reporter (Your name) [required]"));
    assert!(text.contains("[ ] flood"));
    assert!(text.contains("photos (Photos) [required]: no files"));
}

#[test]
fn json_ui_maps_each_field_type_to_a_control() {
    let mut session = session();
    session.toggle_option("category", "fire").unwrap();
    let preview = session
        .attach_image("photos", FileHandle::new("smoke.png", vec![1, 2, 3]))
        .unwrap();

    let ui = render_json_ui(&session.render());
    assert_eq!(ui["form_id"], "incident-report");
    let controls = ui["controls"].as_array().expect("controls array");
    let kinds = controls
        .iter()
        .map(|control| control["control"].as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        [
            "text_input",
            "number_input",
            "checkbox_group",
            "file_picker",
            "text_input"
        ]
    );

    let options = controls[2]["options"].as_array().expect("options");
    assert_eq!(options.len(), 4);
    assert_eq!(options[1]["value"], "fire");
    assert_eq!(options[1]["checked"], true);
    assert_eq!(options[0]["checked"], false);

    let picker = &controls[3];
    assert_eq!(picker["accept"], "image/*");
    assert_eq!(picker["multiple"], true);
    assert_eq!(picker["files"][0]["name"], "smoke.png");
    assert_eq!(picker["files"][0]["content_type"], "image/png");
    assert_eq!(picker["files"][0]["preview"], preview.as_str());
}

#[test]
fn validation_errors_are_rendered_inline() {
    let mut session = session();
    session.validate();
    let payload = session.render();
    assert_eq!(payload.status, RenderStatus::Invalid);

    let ui = render_json_ui(&payload);
    assert_eq!(ui["controls"][0]["error"], "Your name is required");
    assert!(ui["controls"][4].get("error").is_none());

    let text = render_text(&payload);
    assert!(text.contains("   ! Household size is required"));
}

#[test]
fn complete_form_is_ready() {
    let mut session = session();
    session
        .update_field("reporter", FieldValue::text("Ana"))
        .unwrap();
    session
        .update_field("household_size", FieldValue::text("3"))
        .unwrap();
    session.toggle_option("category", "flood").unwrap();
    session
        .attach_image("photos", FileHandle::new("water.jpg", vec![9]))
        .unwrap();

    let payload = session.render();
    assert_eq!(payload.status, RenderStatus::Ready);
    assert_eq!(payload.progress.filled, 4);
}
