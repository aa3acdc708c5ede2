// Run tree behaviour through the public API

use allure_relay::reporter::{NodeKind, RunTree};

fn tree() -> RunTree<&'static str> {
    RunTree::new("root")
}

#[test]
fn test_suite_push_pop_is_symmetric() {
    let mut tree = tree();
    let outer = tree.add_suite("outer", "g1");
    let inner = tree.add_suite("inner", "g2");
    assert_eq!(tree.current_suite(), Some(inner));
    assert_eq!(tree.parent(inner), Some(outer));

    tree.end_suite();
    assert_eq!(tree.current_suite(), Some(outer));
    tree.end_suite();
    assert_eq!(tree.current_suite(), None);

    // ending past the root is a no-op
    tree.end_suite();
    assert_eq!(tree.current_suite(), None);
}

#[test]
fn test_steps_nest_under_innermost_executable() {
    let mut tree = tree();
    tree.add_suite("suite", "g");
    assert!(tree.add_step("orphan", "s0").is_none());

    let test = tree.add_test("works", "t");
    let first = tree.add_step("open page", "s1").expect("step under test");
    let nested = tree.add_step("click", "s2").expect("step under step");

    assert_eq!(tree.parent(first), Some(test));
    assert_eq!(tree.parent(nested), Some(first));
    assert!(tree.is_descendant(nested, test));

    tree.end_step();
    assert_eq!(tree.current_step(), Some(first));
}

#[test]
fn test_end_all_steps_is_idempotent() {
    let mut tree = tree();
    tree.add_suite("suite", "g");
    tree.add_test("works", "t");
    tree.add_step("a", "s1");
    tree.add_step("b", "s2");
    tree.add_step("c", "s3");

    tree.end_all_steps();
    assert_eq!(tree.current_step(), None);
    tree.end_all_steps();
    assert_eq!(tree.current_step(), None);
    assert!(tree.current_test().is_some());
}

#[test]
fn test_ending_a_test_closes_its_steps() {
    let mut tree = tree();
    tree.add_suite("suite", "g");
    tree.add_test("works", "t");
    tree.add_step("a", "s1");

    tree.end_test();
    assert_eq!(tree.current_test(), None);
    assert_eq!(tree.current_step(), None);
}

#[test]
fn test_find_hooks_for_current_suite() {
    let mut tree = tree();
    let global = tree.add_hook("\"before all\" hook", "h0");
    tree.end_hook();
    let outer = tree.add_suite("outer", "g1");
    let local = tree.add_hook("\"before all\" hook", "h1");
    tree.end_hook();
    tree.add_suite("inner", "g2");
    // arrives after the current suite, so it does not belong to it
    tree.add_hook("late", "h2");
    tree.end_hook();

    let hooks = tree.find_hooks_for_current_suite();
    assert_eq!(hooks, vec![global, local]);

    tree.end_suite();
    assert_eq!(tree.current_suite(), Some(outer));
    assert_eq!(tree.find_hooks_for_current_suite(), vec![global]);
}

#[test]
fn test_no_hooks_without_a_suite() {
    let mut tree = tree();
    tree.add_hook("global", "h");
    assert!(tree.find_hooks_for_current_suite().is_empty());
}

#[test]
fn test_ancestors_and_siblings() {
    let mut tree = tree();
    let outer = tree.add_suite("outer", "g1");
    let inner = tree.add_suite("inner", "g2");
    let test = tree.add_test("t", "t1");
    let step = tree.add_step("s", "s1").expect("step");

    let suites = tree.ancestors(step, |node| node.kind == NodeKind::Suite);
    assert_eq!(suites, vec![inner, outer]);

    tree.end_step();
    tree.end_test();
    let second = tree.add_test("t2", "t2");
    let hook = tree.add_hook("h", "h1");

    let tests = tree.siblings(second, |node| node.kind == NodeKind::Test);
    assert_eq!(tests, vec![test]);
    let all = tree.siblings(hook, |_| true);
    assert_eq!(all, vec![test, second]);
}

#[test]
fn test_remove_repairs_current_pointers() {
    let mut tree = tree();
    let outer = tree.add_suite("outer", "g1");
    let inner = tree.add_suite("inner", "g2");
    tree.add_test("t", "t1");
    tree.add_step("s", "s1");

    assert!(tree.remove(inner));
    assert_eq!(tree.current_suite(), Some(outer));
    assert_eq!(tree.current_test(), None);
    assert_eq!(tree.current_step(), None);
    assert!(tree.node(inner).is_none());
    assert!(tree.children(outer).is_empty());

    assert!(!tree.remove(tree.root()));
}

#[test]
fn test_remove_and_merge_splices_children() {
    let mut tree = tree();
    let outer = tree.add_suite("outer", "g1");
    let before = tree.add_test("before", "t0");
    tree.end_test();
    let middle = tree.add_suite("middle", "g2");
    let a = tree.add_test("a", "t1");
    tree.end_test();
    let b = tree.add_test("b", "t2");
    tree.end_test();
    tree.end_suite();
    let after = tree.add_test("after", "t3");
    tree.end_test();

    assert!(tree.remove_and_merge(middle));
    assert_eq!(tree.children(outer), &[before, a, b, after]);
    assert_eq!(tree.parent(a), Some(outer));
    assert_eq!(tree.current_suite(), Some(outer));
}

#[test]
fn test_arena_stays_bounded_across_many_tests() {
    let mut tree = tree();
    tree.add_suite("suite", "g1");

    for _ in 0..10_000 {
        let test = tree.add_test("t", "t1");
        tree.add_step("s", "s1");
        tree.end_all_steps();
        tree.end_test();
        assert!(tree.remove(test));
    }

    assert_eq!(tree.len(), 2);
    assert!(tree.capacity() <= 4, "slots: {}", tree.capacity());
}

#[test]
fn test_hook_order_survives_slot_reuse() {
    let mut tree = tree();
    let scratch = tree.add_test("scratch", "t0");
    tree.end_test();
    let global = tree.add_hook("\"before all\" hook", "h0");
    tree.end_hook();
    assert!(tree.remove(scratch));

    // the suite takes the freed slot, which sits below the hook's
    let suite = tree.add_suite("suite", "g1");
    assert_eq!(suite, scratch);
    assert!(tree.arrived_before(global, suite));
    assert_eq!(tree.find_hooks_for_current_suite(), vec![global]);
}
