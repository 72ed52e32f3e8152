use std::cell::RefCell;
use std::rc::Rc;

use mbind_core::{Value, ValueKind};
use mbind_runtime::{
    FieldSpec, HandlerError, RegistryBuilder, TraversalMode, UiContext, ViewId, ViewTree,
    ViewTypeBuilder,
};

type Log = Rc<RefCell<Vec<String>>>;

const NO_ATTRS: [(&str, &str); 0] = [];

fn logging_tree(log: &Log) -> ViewTree {
    let (l1, l2, l3, l4) = (
        Rc::clone(log),
        Rc::clone(log),
        Rc::clone(log),
        Rc::clone(log),
    );
    let mut b = RegistryBuilder::new();
    b.register(
        ViewTypeBuilder::new("Outer")
            .component("Inner", "Inner")
            .field(FieldSpec::new("Title", ValueKind::Text).on_change("OnTitle"))
            .field(FieldSpec::new("Echo", ValueKind::Int).on_change("OnEcho"))
            .field(FieldSpec::new("Spin", ValueKind::Bool).on_change("Again"))
            .handler("OnTitle", move |tree: &mut ViewTree, id: ViewId| {
                l1.borrow_mut().push("outer".into());
                let inner = tree
                    .find_child_by_name(id, "Inner", TraversalMode::SkipTemplates)
                    .ok_or_else(|| HandlerError::new("inner component missing"))?;
                let next = tree.get_field(inner, "Count").and_then(|v| v.as_int()).unwrap_or(0) + 1;
                tree.set_field(inner, "Count", next)?;
                Ok(())
            })
            .handler("OnEcho", move |_: &mut ViewTree, _: ViewId| {
                l2.borrow_mut().push("echo".into());
                Ok(())
            })
            .handler("Again", move |tree: &mut ViewTree, id: ViewId| {
                l3.borrow_mut().push("again".into());
                tree.queue_handler(id, "Again")?;
                Ok(())
            }),
    )
    .register(
        ViewTypeBuilder::new("Inner")
            .field(FieldSpec::new("Count", ValueKind::Int).on_change("OnCount"))
            .handler("OnCount", move |tree: &mut ViewTree, id: ViewId| {
                l4.borrow_mut().push("inner".into());
                let outer = tree
                    .parent(id)
                    .ok_or_else(|| HandlerError::new("inner has no parent"))?;
                let count = tree.get_field(id, "Count").unwrap_or(Value::Int(0));
                tree.set_field(outer, "Echo", count)?;
                Ok(())
            }),
    );
    ViewTree::new(UiContext::new(b.try_build().unwrap()))
}

fn drain(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

#[test]
fn creation_runs_no_handlers() {
    let log = Log::default();
    let mut tree = logging_tree(&log);
    let _report = tree
        .create_view("Outer", None, None, [("Title", "hello"), ("Echo", "3")])
        .unwrap();
    let report = tree.tick();
    assert_eq!(report.handlers_run, 0);
    assert!(drain(&log).is_empty());
}

#[test]
fn handlers_run_on_tick_not_on_write() {
    let log = Log::default();
    let mut tree = logging_tree(&log);
    let outer = tree.create_view("Outer", None, None, NO_ATTRS).unwrap().view;
    tree.set_field(outer, "Title", "a").unwrap();
    tree.set_field(outer, "Title", "b").unwrap();
    assert!(drain(&log).is_empty());
    assert_eq!(tree.node(outer).unwrap().pending_handlers().len(), 1);

    tree.tick();
    assert_eq!(drain(&log), ["outer", "inner"]);
}

#[test]
fn later_views_see_writes_in_the_same_tick() {
    let log = Log::default();
    let mut tree = logging_tree(&log);
    let outer = tree.create_view("Outer", None, None, NO_ATTRS).unwrap().view;
    tree.set_field(outer, "Title", "go").unwrap();

    // Inner follows Outer in pre-order, so its handler joins this tick.
    // Outer was already flushed, so Echo waits for the next one.
    let first = tree.tick();
    assert_eq!(first.views_flushed, 2);
    assert_eq!(drain(&log), ["outer", "inner"]);
    assert_eq!(tree.get_field(outer, "Echo"), Some(Value::Int(1)));

    let second = tree.tick();
    assert_eq!(second.handlers_run, 1);
    assert_eq!(drain(&log), ["echo"]);

    assert_eq!(tree.tick().handlers_run, 0);
}

#[test]
fn self_requeueing_handler_runs_once_per_tick() {
    let log = Log::default();
    let mut tree = logging_tree(&log);
    let outer = tree.create_view("Outer", None, None, NO_ATTRS).unwrap().view;
    tree.set_field(outer, "Spin", true).unwrap();

    for _ in 0..3 {
        let report = tree.tick();
        assert_eq!(report.handlers_run, 1);
    }
    assert_eq!(drain(&log), ["again", "again", "again"]);
}

#[test]
fn destroyed_views_drop_their_queue() {
    let log = Log::default();
    let mut tree = logging_tree(&log);
    let outer = tree.create_view("Outer", None, None, NO_ATTRS).unwrap().view;
    tree.set_field(outer, "Title", "x").unwrap();
    assert!(tree.destroy(outer));
    assert_eq!(tree.tick().handlers_run, 0);
    assert!(drain(&log).is_empty());
}
