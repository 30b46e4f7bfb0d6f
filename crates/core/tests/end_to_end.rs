use note_model::{Locator, NoteSide};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use sticker_core::{
    decode, encode, place_element, BadgeRecorder, BadgeUpdate, NodeId, NoteBoard, Placement,
    PlacementConfig, PlacementStyle, Rect, StaticDocument, ViewOutcome, ViewportSize,
};
use sticker_scheduler::{ManualFrameHost, PositionBroadcaster, ViewportEvent};
use storage::{FileStore, NoteStore};

const URL: &str = "https://example.com/article";

fn page(with_anchor: bool) -> (Rc<StaticDocument>, Option<NodeId>) {
    let doc = Rc::new(StaticDocument::new(ViewportSize::new(1280.0, 800.0)));
    let header = doc.append(doc.body_element(), "header");
    doc.set_rect(header, Rect::new(0.0, 0.0, 1280.0, 60.0));

    let anchor = with_anchor.then(|| {
        let anchor = doc.append(doc.body_element(), "div");
        doc.set_id(anchor, "a");
        doc.set_rect(anchor, Rect::new(100.0, 100.0, 200.0, 150.0));
        anchor
    });
    (doc, anchor)
}

fn open_board(
    doc: Rc<StaticDocument>,
    root: &std::path::Path,
    badge: &Rc<BadgeRecorder>,
) -> (NoteBoard<StaticDocument, FileStore>, Rc<ManualFrameHost>) {
    let host = Rc::new(ManualFrameHost::new());
    let board = NoteBoard::new(
        doc,
        FileStore::with_root(root),
        PositionBroadcaster::new(Rc::clone(&host)),
        Rc::clone(badge),
        URL,
    );
    (board, host)
}

#[test]
fn anchor_with_id_is_encoded_and_placed_to_the_right() {
    let (doc, anchor) = page(true);
    let anchor = anchor.expect("anchor present");

    let locator = encode(&*doc, &anchor);
    assert_eq!(locator.as_str(), "#a");
    assert_eq!(decode(&*doc, &locator), Some(anchor));

    let placement = place_element(&*doc, &anchor, &PlacementConfig::default());
    assert_eq!(placement, Placement { side: NoteSide::Right, top: 100.0, left: 212.0 });
    assert_eq!(
        placement.style(),
        PlacementStyle { top: "100px".to_owned(), left: "212px".to_owned() }
    );
}

#[test]
fn notes_follow_their_anchor_across_reloads() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let badge = Rc::new(BadgeRecorder::new());

    // First visit: create the note.
    let note = {
        let (doc, anchor) = page(true);
        let (mut board, _host) = open_board(doc, temp.path(), &badge);
        board.load().expect("load");
        board
            .create_note(&anchor.expect("anchor present"), "<p>remember this</p>")
            .expect("create note")
    };
    assert_eq!(note.selector, Locator::new("#a"));
    assert_eq!(badge.last(), Some(BadgeUpdate::new(1)));

    let raw = std::fs::read(temp.path().join("notes.json")).expect("notes file written");
    let mut stored: Value = serde_json::from_slice(&raw).expect("notes file is json");
    let persisted = &mut stored["notes"][URL][0];
    assert_eq!(persisted["id"], Value::String(note.id.to_string()));
    persisted["id"] = Value::String("<ID>".to_owned());
    persisted["createdAt"] = Value::String("<TIMESTAMP>".to_owned());
    persisted["updatedAt"] = Value::String("<TIMESTAMP>".to_owned());
    insta::assert_json_snapshot!(stored, @r##"
    {
      "notes": {
        "https://example.com/article": [
          {
            "content": "<p>remember this</p>",
            "createdAt": "<TIMESTAMP>",
            "id": "<ID>",
            "position": "right",
            "selector": "#a",
            "updatedAt": "<TIMESTAMP>",
            "url": "https://example.com/article"
          }
        ]
      },
      "version": 1
    }
    "##);

    // Second visit: the anchor is still there and the note tracks it.
    {
        let (doc, _) = page(true);
        let (mut board, host) = open_board(Rc::clone(&doc), temp.path(), &badge);
        board.load().expect("load");
        assert_eq!(board.active_notes().len(), 1);
        assert!(board.orphan_notes().is_empty());
        assert!(!board.is_visible());

        assert!(board.toggle_visibility().expect("toggle"));
        assert_eq!(
            board.placement(&note.id),
            Some(Placement { side: NoteSide::Right, top: 100.0, left: 212.0 })
        );

        let passes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&passes);
        let probe = board.broadcaster().subscribe(move || {
            counter.set(counter.get() + 1);
            Ok(())
        });

        doc.scroll_by(0.0, 50.0);
        for _ in 0..50 {
            board.broadcaster().handle_event(ViewportEvent::Scroll);
        }
        let frame = host.take_requested_frame().expect("one frame requested");
        assert_eq!(host.take_requested_frame(), None);
        assert!(board.broadcaster().run_frame(frame));

        assert_eq!(passes.get(), 1);
        assert_eq!(board.placement(&note.id).map(|placement| placement.top), Some(50.0));

        probe.unsubscribe();
        probe.unsubscribe();
        assert_eq!(board.broadcaster().subscriber_count(), 1);

        assert!(board.update_note_content(&note.id, "<p>edited</p>").expect("update"));
    }

    // Third visit: the anchor is gone, the note is an orphan.
    {
        let (doc, _) = page(false);
        let (mut board, host) = open_board(doc, temp.path(), &badge);
        board.load().expect("load");

        assert!(board.active_notes().is_empty());
        assert_eq!(board.orphan_notes().len(), 1);
        assert_eq!(board.orphan_notes()[0].content, "<p>edited</p>");
        assert_eq!(badge.last(), Some(BadgeUpdate::new(1)));

        assert_eq!(board.view_note(&note.id).expect("view"), ViewOutcome::Orphan);
        assert!(board.is_visible());
        assert!(!host.is_listening());
        assert!(board.store().visibility().expect("visibility"));

        assert!(board.delete_note(&note.id).expect("delete"));
        assert_eq!(badge.last(), Some(BadgeUpdate::new(0)));
    }

    let store = FileStore::with_root(temp.path());
    assert!(store.all_notes().expect("all notes").is_empty());
}
