//! End-to-end widget sessions against the in-memory engine.

use std::rc::Rc;
use std::time::Duration;

use inline_text_core::sanitize::{CARET_HOLDER_ATTR, MIRROR_CARET_ATTR};
use inline_text_core::testing::{MemoryEngine, MemoryTransport, RecordingHost};
use inline_text_core::{
    DomPoint, EditingEngine, EditorHandle, EditorRegistry, Environment, HostCommand, HostEnvelope,
    HostEvent, NoopHook, SaveOutcome, Session, WidgetConfig, WidgetData, sanitize,
};
use web_time::Instant;

struct Harness {
    session: Session<MemoryEngine, MemoryTransport, NoopHook>,
    host: Rc<RecordingHost>,
    transport: Rc<MemoryTransport>,
    _registry: EditorRegistry,
    t0: Instant,
}

impl Harness {
    fn new(html: &str) -> Self {
        let host = Rc::new(RecordingHost::default());
        let transport = Rc::new(MemoryTransport::default());
        let mut session = Session::new(
            WidgetData::new("w1", html),
            WidgetConfig::default(),
            Environment::interact(),
            host.clone(),
            Rc::clone(&transport),
            Rc::new(NoopHook),
        );
        let mut registry = EditorRegistry::new();
        session
            .attach(MemoryEngine::new("ed-1", html), &mut registry)
            .unwrap();
        Self {
            session,
            host,
            transport,
            _registry: registry,
            t0: Instant::now(),
        }
    }

    fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    fn engine(&mut self) -> &mut MemoryEngine {
        self.session.engine_mut().unwrap()
    }

    fn caret_in(&mut self, needle: &str, offset: usize) {
        let engine = self.engine();
        let text = engine.find_text(needle).unwrap();
        engine.set_cursor(DomPoint::new(text, offset));
    }

    fn command(&mut self, command: HostCommand, ms: u64) -> bool {
        let now = self.at(ms);
        self.session
            .handle_host_command(HostEnvelope::to(EditorHandle::new("ed-1"), command), now)
    }

    async fn run_saves(&mut self) -> Vec<SaveOutcome> {
        let mut outcomes = Vec::new();
        for task in self.session.take_save_requests() {
            outcomes.push(task.await.unwrap());
        }
        outcomes
    }

    fn active_scripts(&mut self) -> (bool, bool) {
        let engine = self.engine();
        (
            engine.format_matches("subscript").unwrap(),
            engine.format_matches("superscript").unwrap(),
        )
    }
}

#[test]
fn sanitize_is_idempotent() {
    let corpus = [
        "",
        "<p>Hello</p>",
        "<p class=\"fl-mirror-root fl-mirror-element\">x<span class=\"fl-mirror-element\">\u{200B}</span></p>",
        "<div class=\"fl-wysiwyg-text mce-content-body\"><div class=\"fl-wysiwyg-text mce-content-body\"><p>n</p></div></div>",
        "<p><span data-fl-caret-holder=\"1\">\u{200B}</span>a</p>",
        "<p><span data-fl-caret-holder=\"1\" style=\"color: red\">\u{200B}Hi</span></p>",
        "<p>unclosed <b>bold <i>both</p><td>stray",
        "<table><tr><td>1</td><td><ol><li>a<li>b</ol></td></tr></table>",
        "<p class=\"\">&nbsp;\u{FEFF}</p>",
        "<style>p { color: red }</style><p>Hello</p>",
        "<p>a<script>x < y</script></p><ul><li>b</ul>",
    ];
    for html in corpus {
        let once = sanitize(html);
        assert_eq!(sanitize(&once), once, "input: {html:?}");
        assert!(!once.contains('\u{200B}'), "input: {html:?}");
    }
}

#[tokio::test]
async fn unchanged_content_is_never_persisted() {
    let mut h = Harness::new("<p>Hello</p>");
    h.session.on_focus(h.at(0));
    h.session.on_animation_frame(h.at(0));
    assert_eq!(h.run_saves().await, vec![SaveOutcome::Baseline]);

    h.session.schedule_save(h.at(1000));
    assert_eq!(h.run_saves().await, vec![SaveOutcome::Unchanged]);
    assert!(h.transport.calls().is_empty());
    assert!(!h.host.events().contains(&HostEvent::PageChanged));
}

#[tokio::test]
async fn typed_red_text_in_empty_widget_is_saved_with_its_color() {
    let mut h = Harness::new("");
    h.session.on_widget_click();
    h.session.on_focus(h.at(0));
    h.session.on_animation_frame(h.at(0));
    assert_eq!(h.run_saves().await, vec![SaveOutcome::Baseline]);

    assert!(h.command(
        HostCommand::ApplyFormat {
            format: "forecolor".into(),
            value: Some("red".into()),
        },
        10,
    ));
    assert_eq!(h.session.sticky().fore_color.as_deref(), Some("red"));

    h.engine().type_text("Hi");
    h.session.on_content_change(h.at(20));
    h.session.tick(h.at(600));
    assert_eq!(
        h.run_saves().await,
        vec![SaveOutcome::Saved { persisted: true }]
    );

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "w1");
    insta::assert_snapshot!(calls[0].1.html, @r#"<p><span style="color: red;">Hi</span></p>"#);
    assert!(!calls[0].1.html.contains(CARET_HOLDER_ATTR));

    let events = h.host.events();
    assert!(events.contains(&HostEvent::PageChanged));
    assert!(events.contains(&HostEvent::ComponentRendered {
        widget_id: "w1".into()
    }));

    // Blurring with the same content does not write again.
    h.session.on_blur(h.at(2000));
    assert_eq!(h.run_saves().await, vec![SaveOutcome::Unchanged]);
    assert_eq!(h.transport.calls().len(), 1);
}

#[tokio::test]
async fn emptied_widget_is_saved_as_empty_string() {
    let mut h = Harness::new("<p>x</p>");
    h.session.on_before_unload();
    assert_eq!(h.run_saves().await, vec![SaveOutcome::Baseline]);

    h.engine().set_content("");
    h.session.on_before_unload();
    assert_eq!(
        h.run_saves().await,
        vec![SaveOutcome::Saved { persisted: true }]
    );
    assert_eq!(h.transport.calls()[0].1.html, "");
    assert_eq!(h.session.saver().widget().html, "");
}

#[tokio::test]
async fn sticky_color_survives_enter() {
    let mut h = Harness::new("<p><span style=\"color: red\">Hello</span></p>");
    h.caret_in("Hello", 5);
    h.session.on_editor_click(h.at(0));
    h.session.on_animation_frame(h.at(0));
    assert_eq!(h.session.sticky().fore_color.as_deref(), Some("red"));

    h.session.on_key_down("Enter", h.at(100));
    h.engine().press_enter();
    h.session.tick(h.at(101));

    let engine = h.engine();
    let caret = engine.caret_element().unwrap();
    assert_eq!(
        engine.surface().style_property(caret, "color").as_deref(),
        Some("red")
    );

    // The engine reports the new line; the sticky color is still there.
    h.session.on_animation_frame(h.at(102));
    assert_eq!(h.session.sticky().fore_color.as_deref(), Some("red"));

    h.engine().type_text("!");
    h.session.on_content_change(h.at(110));
    h.session.tick(h.at(700));
    h.run_saves().await;
    let saved = h.transport.calls().pop().unwrap().1.html;
    assert_eq!(
        saved,
        "<p><span style=\"color: red\">Hello</span></p><p><span style=\"color: red;\">!</span><br></p>"
    );
}

#[test]
fn nested_scripts_are_normalized_to_one() {
    let mut h = Harness::new("<p><sub><sup>x</sup></sub></p>");
    h.caret_in("x", 1);
    h.session.on_editor_click(h.at(0));
    h.session.on_animation_frame(h.at(0));
    assert_eq!(h.active_scripts(), (false, true));

    // An explicit choice wins the next tie.
    assert!(h.command(
        HostCommand::ExecCommand {
            cmd: "mceToggleFormat".into(),
            ui: false,
            value: Some("subscript".into()),
        },
        10,
    ));
    assert_eq!(h.active_scripts(), (true, false));

    h.engine().set_content("<p><sub><sup>y</sup></sub></p>");
    h.caret_in("y", 0);
    h.session.on_editor_click(h.at(20));
    h.session.on_animation_frame(h.at(20));
    assert_eq!(h.active_scripts(), (true, false));
}

#[test]
fn superscript_over_subscript_is_one_undo_step() {
    let mut h = Harness::new("<p><sub>x</sub></p>");
    h.caret_in("x", 1);
    assert_eq!(h.active_scripts(), (true, false));
    let steps = h.engine().undo_depth();

    assert!(h.command(
        HostCommand::ApplyFormat {
            format: "superscript".into(),
            value: None,
        },
        0,
    ));
    assert_eq!(h.active_scripts(), (false, true));
    assert_eq!(h.engine().undo_depth(), steps + 1);

    assert!(h.engine().undo());
    assert_eq!(
        h.engine().content().as_deref(),
        Some("<p><sub>x</sub></p>")
    );
}

#[test]
fn mirror_carries_one_caret_marker_at_the_caret() {
    let mut h = Harness::new("<p>a<b>bc<i>de</i></b>f</p><p>other</p>");
    h.caret_in("de", 1);
    h.session.on_editor_click(h.at(0));
    h.session.on_animation_frame(h.at(0));

    let (editor, html) = h
        .host
        .events()
        .into_iter()
        .find_map(|e| match e {
            HostEvent::MirrorUpdate { editor, html, .. } => Some((editor, html)),
            _ => None,
        })
        .unwrap();
    assert_eq!(editor.as_str(), "ed-1");
    assert_eq!(html.matches(MIRROR_CARET_ATTR).count(), 1);
    assert!(html.contains("<i>d<span"), "{html}");
    assert!(html.contains("</span>e</i>"), "{html}");
    assert!(!html.contains("other"));

    // The live document is untouched.
    assert_eq!(
        h.engine().content().as_deref(),
        Some("<p>a<b>bc<i>de</i></b>f</p><p>other</p>")
    );
}
