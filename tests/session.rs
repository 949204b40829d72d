// tests/session.rs

//! End-to-end scenarios driving the bridge over the headless engine:
//! session lifecycle, plane-tree invalidation, visual binding, and the
//! input polling state machine.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use termplane::engine::headless::{HeadlessEngine, InputFeed};
use termplane::engine::{PixelSupport, RawInput};
use termplane::{
    BlitOptions, Blitter, Channels, Context, ContextOptions, Drain, Error, MiceEvents,
    PerimeterKind, PlaneFlags, PlaneOptions, PumpOutcome, Rect, Scale, Style,
};

fn session(rows: u32, cols: u32) -> (Context, InputFeed) {
    let engine = HeadlessEngine::new(rows, cols).expect("engine setup");
    let feed = engine.input_feed();
    let ctx = Context::init(Box::new(engine), &ContextOptions::default()).expect("context init");
    (ctx, feed)
}

fn key_event(ch: char) -> RawInput {
    RawInput {
        id: ch as u32,
        kind: 1,
        utf8: ch.to_string(),
        ..Default::default()
    }
}

#[test]
fn basic_session_lifecycle() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    assert_eq!(ctx.plane_dims(root).unwrap(), (24, 80));

    let child = ctx
        .plane_create(
            root,
            PlaneOptions {
                y: 0,
                x: 0,
                rows: 10,
                cols: 20,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(ctx.plane_dims(child).unwrap(), (10, 20));

    ctx.render().unwrap();
    // input was never started; stop is a no-op and destroy still succeeds
    ctx.input_stop().unwrap();
    ctx.destroy().unwrap();
}

#[test]
fn plane_text_and_decorations() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let pane = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 5,
                cols: 12,
                name: Some(String::from("status")),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(ctx.plane_name(pane).unwrap().as_deref(), Some("status"));
    ctx.plane_set_name(pane, "statusbar").unwrap();
    assert_eq!(ctx.plane_name(pane).unwrap().as_deref(), Some("statusbar"));

    let mut channels = Channels::DEFAULT;
    channels.set_fg_rgb(0x00ff00);
    ctx.plane_set_channels(pane, channels).unwrap();
    ctx.plane_set_styles(pane, Style::BOLD | Style::ITALIC).unwrap();
    assert_eq!(ctx.plane_styles(pane).unwrap(), Style::BOLD | Style::ITALIC);
    assert_eq!(ctx.plane_channels(pane).unwrap(), channels);

    ctx.plane_perimeter(pane, PerimeterKind::Rounded, Style::empty(), channels, 0)
        .unwrap();
    assert_eq!(ctx.plane_put_text(pane, 1, 1, "helloруст").unwrap(), 9);
    let contents = ctx.plane_contents(pane, Rect::default()).unwrap();
    assert!(contents.contains("hello"));
    assert!(contents.starts_with('╭'));

    // cursor ops and vline
    ctx.plane_cursor_move(pane, 1, 1).unwrap();
    assert_eq!(ctx.plane_cursor(pane).unwrap(), (1, 1));
    assert_eq!(ctx.plane_vline(pane, "│", 3).unwrap(), 3);
    ctx.plane_home(pane).unwrap();
    assert_eq!(ctx.plane_cursor(pane).unwrap(), (0, 0));

    ctx.plane_erase(pane).unwrap();
    assert_eq!(ctx.plane_contents(pane, Rect::default()).unwrap(), "");
}

#[test]
fn put_text_out_of_bounds_is_an_error() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let pane = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 2,
                cols: 4,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(matches!(
        ctx.plane_put_text(pane, 5, 0, "x"),
        Err(Error::Engine(_))
    ));
}

#[test]
fn geometry_rejection_is_typed() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let rejected = ctx.plane_create(
        root,
        PlaneOptions {
            rows: 0,
            cols: 20,
            ..Default::default()
        },
    );
    assert!(matches!(rejected, Err(Error::PlaneRejected)));

    // the failed creation leaked nothing: the next plane works
    ctx.plane_create(
        root,
        PlaneOptions {
            rows: 1,
            cols: 1,
            ..Default::default()
        },
    )
    .unwrap();
}

#[test]
fn destroy_family_invalidates_descendants_atomically() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let parent = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 10,
                cols: 10,
                ..Default::default()
            },
        )
        .unwrap();
    let a = ctx
        .plane_create(
            parent,
            PlaneOptions {
                rows: 2,
                cols: 2,
                ..Default::default()
            },
        )
        .unwrap();
    let b = ctx
        .plane_create(
            parent,
            PlaneOptions {
                rows: 3,
                cols: 3,
                ..Default::default()
            },
        )
        .unwrap();

    ctx.plane_destroy_family(parent).unwrap();
    for handle in [parent, a, b] {
        assert!(matches!(ctx.plane_dims(handle), Err(Error::InvalidHandle(_))));
        assert!(matches!(
            ctx.plane_destroy(handle),
            Err(Error::InvalidHandle(_))
        ));
    }
}

#[test]
fn single_destroy_rebinds_children() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let mid = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 8,
                cols: 8,
                ..Default::default()
            },
        )
        .unwrap();
    let leaf = ctx
        .plane_create(
            mid,
            PlaneOptions {
                rows: 2,
                cols: 2,
                ..Default::default()
            },
        )
        .unwrap();

    ctx.plane_destroy(mid).unwrap();
    assert!(ctx.plane_dims(mid).is_err());
    // the leaf survives, now bound to the root
    assert_eq!(ctx.plane_dims(leaf).unwrap(), (2, 2));
    ctx.plane_destroy(leaf).unwrap();
}

#[test]
fn resize_callbacks_fire_in_traversal_order() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let calls = Rc::new(RefCell::new(Vec::new()));

    let parent_calls = Rc::clone(&calls);
    let parent = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 10,
                cols: 20,
                on_resize: Some(Box::new(move || {
                    parent_calls.borrow_mut().push("parent");
                    Ok(())
                })),
                ..Default::default()
            },
        )
        .unwrap();

    let child_calls = Rc::clone(&calls);
    let child = ctx
        .plane_create(
            parent,
            PlaneOptions {
                flags: PlaneFlags::MARGINALIZED,
                margin_bottom: 1,
                margin_right: 1,
                on_resize: Some(Box::new(move || {
                    child_calls.borrow_mut().push("child");
                    Ok(())
                })),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(ctx.plane_dims(child).unwrap(), (9, 19));

    ctx.plane_resize(parent, 6, 12).unwrap();
    // exactly one invocation per resized plane, parent before child
    assert_eq!(*calls.borrow(), vec!["parent", "child"]);
    assert_eq!(ctx.plane_dims(child).unwrap(), (5, 11));

    // resizing to the same dimensions changes nothing and fires nothing
    calls.borrow_mut().clear();
    ctx.plane_resize(parent, 6, 12).unwrap();
    assert!(calls.borrow().is_empty());
}

#[test]
fn resize_callback_abort_stops_the_cascade() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();

    let parent = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 10,
                cols: 20,
                on_resize: Some(Box::new(|| anyhow::bail!("layout failed"))),
                ..Default::default()
            },
        )
        .unwrap();

    let child_ran = Rc::new(Cell::new(false));
    let observed = Rc::clone(&child_ran);
    let child = ctx
        .plane_create(
            parent,
            PlaneOptions {
                flags: PlaneFlags::MARGINALIZED,
                on_resize: Some(Box::new(move || {
                    observed.set(true);
                    Ok(())
                })),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(ctx.plane_dims(child).unwrap(), (10, 20));

    let err = ctx.plane_resize(parent, 5, 5).unwrap_err();
    assert!(matches!(err, Error::CallbackAborted(_)));
    // the abort prevented the rest of the cascade
    assert!(!child_ran.get());
    assert_eq!(ctx.plane_dims(child).unwrap(), (10, 20));
}

#[test]
fn reparent_family_moves_subtree() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let left = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 10,
                cols: 10,
                ..Default::default()
            },
        )
        .unwrap();
    let right = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 20,
                cols: 30,
                ..Default::default()
            },
        )
        .unwrap();
    let follower = ctx
        .plane_create(
            left,
            PlaneOptions {
                flags: PlaneFlags::MARGINALIZED,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(ctx.plane_dims(follower).unwrap(), (10, 10));

    ctx.plane_reparent_family(follower, right).unwrap();
    // margins now measure against the new parent
    assert_eq!(ctx.plane_dims(follower).unwrap(), (20, 30));

    // destroying the old parent no longer touches the moved plane
    ctx.plane_destroy_family(left).unwrap();
    assert!(ctx.plane_dims(follower).is_ok());
}

#[test]
fn visual_binding_and_fresh_plane_blit() {
    let (mut ctx, _feed) = session(24, 80);
    // 4x4 RGBA, 64 bytes: a red square
    let mut pixels = Vec::with_capacity(64);
    for _ in 0..16 {
        pixels.extend_from_slice(&[0xff, 0x00, 0x00, 0xff]);
    }
    let buffer = Rc::new(pixels);

    let visual = ctx
        .visual_create(Rc::clone(&buffer), 0, 64, 4, 4, 4)
        .unwrap();
    assert_eq!(ctx.visual_geometry(visual).unwrap(), (4, 4));
    assert_eq!(ctx.visual_source_range(visual).unwrap(), (0, 64));
    // the context's record holds a second reference to the buffer
    assert_eq!(ctx.visual_buffer_refs(visual).unwrap(), 2);

    let blitted = ctx
        .visual_blit(
            visual,
            &BlitOptions {
                dst: None,
                scale: Scale::None,
                ..Default::default()
            },
        )
        .unwrap()
        .expect("fresh plane");
    // the new plane exists with live native state: 4 pixel rows -> 2 cell rows
    assert_eq!(ctx.plane_dims(blitted).unwrap(), (2, 4));
    let cells = ctx.plane_contents(blitted, Rect::default()).unwrap();
    assert!(cells.contains('▀'));

    // ordered teardown: engine image first, then the buffer reference
    ctx.visual_destroy(visual).unwrap();
    assert_eq!(Rc::strong_count(&buffer), 1);
    assert!(matches!(
        ctx.visual_geometry(visual),
        Err(Error::InvalidHandle(_))
    ));
}

#[test]
fn visual_blit_into_existing_plane() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let target = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 4,
                cols: 8,
                ..Default::default()
            },
        )
        .unwrap();

    let buffer = Rc::new(vec![0x40u8; 4 * 4 * 4]);
    let visual = ctx.visual_create(buffer, 0, 64, 4, 4, 4).unwrap();
    let returned = ctx
        .visual_blit(
            visual,
            &BlitOptions {
                dst: Some(target),
                scale: Scale::Stretch,
                ..Default::default()
            },
        )
        .unwrap();
    // in-place blit returns no new handle
    assert!(returned.is_none());
    let cells = ctx.plane_contents(target, Rect::default()).unwrap();
    assert!(cells.contains('▀'));
}

#[test]
fn invalid_buffers_are_rejected_before_decode() {
    let (mut ctx, _feed) = session(24, 80);
    let buffer = Rc::new(vec![0u8; 64]);

    // len does not match 4x4 RGBA
    let short = ctx.visual_create(Rc::clone(&buffer), 0, 32, 4, 4, 4);
    assert!(matches!(short, Err(Error::InvalidBuffer(_))));

    // range escapes the buffer
    let escape = ctx.visual_create(Rc::clone(&buffer), 16, 64, 4, 4, 4);
    assert!(matches!(escape, Err(Error::InvalidBuffer(_))));

    // no engine resource was allocated; the buffer is only ours again
    assert_eq!(Rc::strong_count(&buffer), 1);
}

#[test]
fn pixel_blit_without_support_fails_recoverably() {
    let mut engine = HeadlessEngine::new(24, 80).expect("engine setup");
    engine.set_pixel_support(PixelSupport::None);
    let mut ctx = Context::init(Box::new(engine), &ContextOptions::default()).unwrap();
    assert_eq!(ctx.pixel_support(), PixelSupport::None);

    let buffer = Rc::new(vec![0u8; 16]);
    let visual = ctx.visual_create(buffer, 0, 16, 2, 2, 4).unwrap();
    let err = ctx
        .visual_blit(
            visual,
            &BlitOptions {
                blitter: Blitter::Pixel,
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::BlitFailed));

    // recoverable: a cell blitter still works
    assert!(ctx
        .visual_blit(
            visual,
            &BlitOptions {
                blitter: Blitter::Halves,
                ..Default::default()
            },
        )
        .unwrap()
        .is_some());
}

#[test_log::test]
fn polling_lifecycle_and_drain() {
    let (mut ctx, feed) = session(24, 80);
    let seen = Rc::new(RefCell::new(String::new()));
    let sink = Rc::clone(&seen);

    ctx.input_start(
        Box::new(move |event| {
            sink.borrow_mut().push_str(event.utf8());
            Ok(Drain::Continue)
        }),
        MiceEvents::empty(),
    )
    .unwrap();
    assert!(ctx.is_polling());

    // double start is refused
    let again = ctx.input_start(Box::new(|_| Ok(Drain::Continue)), MiceEvents::empty());
    assert!(matches!(again, Err(Error::AlreadyPolling)));

    // nothing queued: the wait times out
    assert_eq!(ctx.input_pump(0).unwrap(), PumpOutcome::Empty);

    for ch in ['h', 'e', 'y'] {
        feed.push(key_event(ch));
    }
    assert_eq!(ctx.input_pump(1000).unwrap(), PumpOutcome::Drained(3));
    // dispatched synchronously, in engine order
    assert_eq!(*seen.borrow(), "hey");

    // after stop, start succeeds again
    ctx.input_stop().unwrap();
    assert!(!ctx.is_polling());
    ctx.input_start(Box::new(|_| Ok(Drain::Continue)), MiceEvents::empty())
        .unwrap();
    ctx.input_stop().unwrap();
    ctx.destroy().unwrap();
}

#[test]
fn callback_cancellation_fails_closed() {
    let (mut ctx, feed) = session(24, 80);
    let count = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&count);

    ctx.input_start(
        Box::new(move |_| {
            counter.set(counter.get() + 1);
            Ok(Drain::Stop)
        }),
        MiceEvents::empty(),
    )
    .unwrap();

    feed.push(key_event('a'));
    feed.push(key_event('b'));
    assert_eq!(ctx.input_pump(1000).unwrap(), PumpOutcome::Stopped);
    // the second event was never fetched
    assert_eq!(count.get(), 1);
    assert!(!ctx.is_polling());

    // pumping while idle is a no-op
    assert_eq!(ctx.input_pump(0).unwrap(), PumpOutcome::Idle);

    // polling resumes only through an explicit restart, which then picks
    // up the event still queued in the engine
    let drained = Rc::new(RefCell::new(String::new()));
    let sink = Rc::clone(&drained);
    ctx.input_start(
        Box::new(move |event| {
            sink.borrow_mut().push_str(event.utf8());
            Ok(Drain::Continue)
        }),
        MiceEvents::empty(),
    )
    .unwrap();
    assert_eq!(ctx.input_pump(1000).unwrap(), PumpOutcome::Drained(1));
    assert_eq!(*drained.borrow(), "b");
}

#[test]
fn callback_error_surfaces_and_disables_polling() {
    let (mut ctx, feed) = session(24, 80);
    ctx.input_start(
        Box::new(|_| anyhow::bail!("handler exploded")),
        MiceEvents::empty(),
    )
    .unwrap();

    feed.push(key_event('x'));
    let err = ctx.input_pump(1000).unwrap_err();
    assert!(matches!(err, Error::CallbackAborted(_)));
    assert!(!ctx.is_polling());
}

#[test]
fn broken_input_source_is_fatal_for_polling() {
    let (mut ctx, feed) = session(24, 80);
    ctx.input_start(Box::new(|_| Ok(Drain::Continue)), MiceEvents::empty())
        .unwrap();

    feed.break_source();
    let err = ctx.input_pump(1000).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert!(!ctx.is_polling());
}

#[test]
fn denied_mouse_enable_is_recoverable() {
    let mut engine = HeadlessEngine::new(24, 80).expect("engine setup");
    engine.deny_mice();
    let mut ctx = Context::init(Box::new(engine), &ContextOptions::default()).unwrap();

    let err = ctx
        .input_start(Box::new(|_| Ok(Drain::Continue)), MiceEvents::ALL)
        .unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    // nothing was registered; starting without mice succeeds
    assert!(!ctx.is_polling());
    ctx.input_start(Box::new(|_| Ok(Drain::Continue)), MiceEvents::empty())
        .unwrap();
    assert!(ctx.is_polling());
}

#[test]
fn mouse_events_carry_coordinates() {
    let (mut ctx, feed) = session(24, 80);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ctx.input_start(
        Box::new(move |event| {
            sink.borrow_mut()
                .push((event.id(), event.y(), event.x(), event.is_mouse()));
            Ok(Drain::Continue)
        }),
        MiceEvents::BUTTON,
    )
    .unwrap();

    feed.push(RawInput {
        id: termplane::key::BUTTON1,
        kind: 1,
        y: 5,
        x: 9,
        ypx: 3,
        xpx: 1,
        ..Default::default()
    });
    assert_eq!(ctx.input_pump(1000).unwrap(), PumpOutcome::Drained(1));
    assert_eq!(*seen.borrow(), vec![(termplane::key::BUTTON1, 5, 9, true)]);
}

#[test]
fn merge_down_composites_overlap() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let below = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 3,
                cols: 10,
                ..Default::default()
            },
        )
        .unwrap();
    let above = ctx
        .plane_create(
            root,
            PlaneOptions {
                y: 1,
                x: 2,
                rows: 1,
                cols: 5,
                ..Default::default()
            },
        )
        .unwrap();
    ctx.plane_put_text(above, 0, 0, "over").unwrap();
    ctx.plane_merge_down(above, below).unwrap();
    let merged = ctx.plane_contents(below, Rect::default()).unwrap();
    assert_eq!(merged, "\n  over");
}

#[test]
fn z_order_moves_are_tracked() {
    let (mut ctx, _feed) = session(24, 80);
    let root = ctx.std_plane();
    let a = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 2,
                cols: 2,
                ..Default::default()
            },
        )
        .unwrap();
    let b = ctx
        .plane_create(
            root,
            PlaneOptions {
                rows: 2,
                cols: 2,
                ..Default::default()
            },
        )
        .unwrap();
    ctx.plane_raise(a).unwrap();
    ctx.plane_lower(b).unwrap();
    ctx.plane_move_to(a, 3, 4).unwrap();
    assert_eq!(ctx.plane_yx(a).unwrap(), (3, 4));
}

#[test]
fn runtime_strings_are_exported() {
    let info = termplane::runtime();
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    assert!(!info.hostname.is_empty());
}
