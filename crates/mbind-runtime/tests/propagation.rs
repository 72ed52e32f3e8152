use std::cell::Cell;
use std::rc::Rc;

use mbind_core::{Value, ValueKind};
use mbind_runtime::{
    FieldSpec, Observable, RegistryBuilder, TraversalMode, UiContext, ViewId, ViewTree,
    ViewTypeBuilder,
};
use proptest::prelude::*;

const NO_ATTRS: [(&str, &str); 0] = [];

fn fan_tree() -> (ViewTree, ViewId) {
    let mut b = RegistryBuilder::new();
    b.register(
        ViewTypeBuilder::new("Fan")
            .component("Left", "Leaf")
            .field(
                FieldSpec::new("A", ValueKind::Int)
                    .map_to("B")
                    .map_to("C")
                    .map_to("Left.Value"),
            )
            .field(FieldSpec::new("B", ValueKind::Int))
            .field(FieldSpec::new("C", ValueKind::Int)),
    )
    .register(ViewTypeBuilder::new("Leaf").field(FieldSpec::new("Value", ValueKind::Int)));
    let mut tree = ViewTree::new(UiContext::new(b.try_build().unwrap()));
    let view = tree.create_view("Fan", None, None, NO_ATTRS).unwrap().view;
    (tree, view)
}

#[test]
fn repeated_identical_writes_notify_once() {
    let obs = Observable::new(Value::Int(0));
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let _sub = obs.subscribe(move |_| h.set(h.get() + 1));
    for _ in 0..10 {
        obs.set(Value::Int(5));
    }
    assert_eq!(hits.get(), 1);
}

#[test]
fn one_source_reaches_every_target() {
    let (mut tree, view) = fan_tree();
    let leaf = tree
        .find_child_by_name(view, "Left", TraversalMode::SkipTemplates)
        .unwrap();
    tree.set_field(view, "A", 11).unwrap();
    assert_eq!(tree.get_field(view, "B"), Some(Value::Int(11)));
    assert_eq!(tree.get_field(view, "C"), Some(Value::Int(11)));
    assert_eq!(tree.get_field(leaf, "Value"), Some(Value::Int(11)));
}

#[test]
fn last_writer_wins_in_declared_order() {
    let mut b = RegistryBuilder::new();
    b.register(
        ViewTypeBuilder::new("Merge")
            .field(FieldSpec::new("First", ValueKind::Int).map_to("Target"))
            .field(FieldSpec::new("Second", ValueKind::Int).map_to("Target"))
            .field(FieldSpec::new("Target", ValueKind::Int)),
    );
    let mut tree = ViewTree::new(UiContext::new(b.try_build().unwrap()));
    let v = tree
        .create_view("Merge", None, None, [("Second", "2"), ("First", "1")])
        .unwrap()
        .view;
    assert_eq!(tree.get_field(v, "Target"), Some(Value::Int(2)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn targets_track_source(values in prop::collection::vec(-50i64..50, 1..40)) {
        let (mut tree, view) = fan_tree();
        let b_field = tree.field(view, "B").unwrap();
        let hits = Rc::new(Cell::new(0usize));
        let h = Rc::clone(&hits);
        let _sub = b_field.subscribe(move |_| h.set(h.get() + 1));

        let mut expected_hits = 0;
        let mut last = 0;
        for v in values {
            tree.set_field(view, "A", v).unwrap();
            if v != last {
                expected_hits += 1;
                last = v;
            }
            prop_assert_eq!(tree.get_field(view, "B"), Some(Value::Int(v)));
            prop_assert_eq!(tree.get_field(view, "C"), Some(Value::Int(v)));
        }
        prop_assert_eq!(hits.get(), expected_hits);
    }
}
