use flowy::prelude::*;
use flowy::GroupState;

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

type Seen = Rc<RefCell<Vec<Outcome>>>;

/// An operation which answers through an error-first callback after `ticks`.
fn echo_after<C>(ev: &EventLoop, ticks: usize, value: &str, callback: C)
where
    C: FnOnce(Outcome) + 'static,
{
    let value = Value::from(value);
    ev.defer_after(ticks, move || callback(Ok(vec![value])));
}

/// An operation which answers with two values, like `cb(null, name, gender)`.
fn spread_kitty<C>(ev: &EventLoop, callback: C)
where
    C: FnOnce(Outcome) + 'static,
{
    ev.defer(move || callback(Ok(vec![Value::from("robert"), Value::from("male")])));
}

fn fail_after<C>(ev: &EventLoop, ticks: usize, message: &'static str, callback: C)
where
    C: FnOnce(Outcome) + 'static,
{
    ev.defer_after(ticks, move || callback(Err(Error::msg(message))));
}

fn record(group: &Group) -> Seen {
    let seen: Seen = Rc::new(RefCell::new(vec![]));
    let out = seen.clone();
    group.end(move |outcome| out.borrow_mut().push(outcome));
    seen
}

fn strs(values: &[&str]) -> Vec<Value> {
    values.iter().map(|s| Value::from(*s)).collect()
}

#[test]
fn results_follow_reservation_order() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    echo_after(&ev, 20, "late", group.slot().into_callback());
    group.pass([Value::from("early")]);
    let seen = record(&group);
    ev.run();
    assert_eq!(*seen.borrow(), [Ok(strs(&["late", "early"]))]);
}

#[test]
fn first_error_wins_over_later_success() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    fail_after(&ev, 1, "a failed", group.slot().into_callback());
    echo_after(&ev, 10, "b", group.slot().into_callback());
    let seen = record(&group);
    ev.run();
    assert_eq!(*seen.borrow(), [Err(Error::msg("a failed"))]);
    assert_eq!(group.outcome(), Some(Err(Error::msg("a failed"))));
}

#[test]
fn multi_slot_collects_every_value() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    spread_kitty(&ev, group.multi_slot().into_callback());
    spread_kitty(&ev, group.slot().into_callback());
    let seen = record(&group);
    ev.run();
    let expected = vec![json!(["robert", "male"]), Value::from("robert")];
    assert_eq!(*seen.borrow(), [Ok(expected)]);
}

#[test]
fn subgroup_collapses_into_one_slot() {
    let ev = EventLoop::new();
    let out = Group::<Value>::chain(&ev, |group| {
        group.pass([Value::from("pass")]);
        echo_after(&ev, 3, "async", group.slot().into_callback());
        group.subgroup().fcall(|nested| {
            nested.pass([Value::from("a")]);
            echo_after(&ev, 1, "b", nested.slot().into_callback());
            Ok(())
        });
        Ok(())
    })
    .anyway(|group, outcome| {
        group.resolve(outcome?);
        Ok(())
    });
    ev.run();

    let values = out.outcome().unwrap().unwrap();
    assert_eq!(values[0], Value::from("pass"));
    assert_eq!(values[1], Value::from("async"));
    assert_eq!(values[2], json!(["a", "b"]));
}

#[test]
fn subgroup_error_rejects_the_parent() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    group.pass([Value::from("pass")]);
    group.slot_group().fcall(|_| Err(Error::msg("Boom")));
    let seen = record(&group);
    ev.run();
    assert_eq!(*seen.borrow(), [Err(Error::msg("Boom"))]);
}

#[test]
fn many_synchronous_and_asynchronous_values_in_a_subgroup() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    let nested = group.subgroup();
    for i in 0..5 {
        nested.pass([Value::from(format!("test{i}"))]);
    }
    for i in 5..10 {
        echo_after(&ev, 10 - i, &format!("test{i}"), nested.slot().into_callback());
    }
    ev.run();
    let values = group.outcome().unwrap().unwrap();
    let list = values[0].as_array().unwrap();
    assert_eq!(list.len(), 10);
    assert_eq!(list[0], Value::from("test0"));
    assert_eq!(list[9], Value::from("test9"));
}

#[test]
fn then_without_callback_propagates_values() {
    let ev = EventLoop::new();
    let out = Group::<Value>::chain(&ev, |group| {
        echo_after(&ev, 2, "kitty", group.slot().into_callback());
        Ok(())
    })
    .then(Group::propagate, |_, _| panic!("never should be called"))
    .then(Group::propagate, Group::rethrow);
    let seen = record(&out);
    ev.run();
    assert_eq!(*seen.borrow(), [Ok(strs(&["kitty"]))]);
}

#[test]
fn errors_flow_down_to_the_first_errback() {
    let ev = EventLoop::new();
    let recovered = Group::<Value>::chain(&ev, |_| Err(Error::msg("Hello error")))
        .then_ok(|_, _| panic!("never should be called"))
        .fail(|group, err| {
            assert_eq!(err, Error::msg("Hello error"));
            echo_after(group.event_loop(), 1, "kitty", group.slot().into_callback());
            Ok(())
        });
    let seen = record(&recovered);
    ev.run();
    assert_eq!(*seen.borrow(), [Ok(strs(&["kitty"]))]);
}

#[test]
fn panics_in_then_become_the_childs_error() {
    let ev = EventLoop::new();
    let out = Group::<Value>::when(&ev, Ok(vec![]))
        .then_ok(|_, _| panic!("exploded"))
        .then_ok(|_, _| Ok(()));
    let seen = record(&out);
    ev.run();
    assert_eq!(*seen.borrow(), [Err(Error::Panicked("exploded".into()))]);
}

#[test]
fn end_callbacks_are_not_sandboxed() {
    let ev = EventLoop::new();
    let group = Group::<Value>::when(&ev, Ok(vec![]));
    group.end(|_| panic!("naked"));
    let sandboxed = group.anyway(|group, _| {
        group.pass([Value::Null]);
        Ok(())
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| ev.run()));
    let payload = result.expect_err("the end callback must escape the loop");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"naked"));

    // The loop is still usable and later continuations still run.
    ev.run();
    assert_eq!(sandboxed.state(), GroupState::Fulfilled);
}

#[test]
fn resolution_happens_once() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    let slot = group.slot();
    group.pass([Value::from("first")]);
    let seen = record(&group);
    group.error("explicit");
    slot.ok(Value::from("late"));
    group.resolve(strs(&["ignored"]));
    ev.run();
    assert_eq!(*seen.borrow(), [Err(Error::msg("explicit"))]);
}

#[test]
fn several_callbacks_on_one_group() {
    let ev = EventLoop::new();
    let out = Group::<Value>::chain(&ev, |group| {
        let inner: Group = Group::new(group.event_loop());
        echo_after(group.event_loop(), 1, "kitty", inner.slot().into_callback());
        inner.end(group.slot().into_callback());
        inner.end(group.slot().into_callback());
        Ok(())
    });
    let seen = record(&out);
    ev.run();
    assert_eq!(*seen.borrow(), [Ok(strs(&["kitty", "kitty"]))]);
}

#[test]
fn queuing_on_a_resolved_group() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    echo_after(&ev, 0, "kitty", group.slot().into_callback());
    let seen: Seen = Rc::new(RefCell::new(vec![]));
    let out = seen.clone();
    let target = group.clone();
    group.end(move |_| {
        assert_eq!(target.state(), GroupState::Fulfilled);
        target.end(move |outcome| out.borrow_mut().push(outcome));
    });
    ev.run();
    assert_eq!(*seen.borrow(), [Ok(strs(&["kitty"]))]);
}

#[test]
fn pass_keeps_falsy_values() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    group.pass([Value::Null, json!(0), Value::from(""), Value::Bool(false)]);
    group.pass([]);
    ev.run();
    let expected = vec![Value::Null, json!(0), Value::from(""), Value::Bool(false)];
    assert_eq!(group.outcome(), Some(Ok(expected)));
}

#[test]
fn context_is_shared_along_the_chain() {
    let ev = EventLoop::new();
    let context = SharedContext::new();
    context.insert("message", String::from("hello"));
    let out = ev
        .group_with::<Value>(context.clone())
        .fcall(|group| {
            let message = group.context().get::<String>("message").ok_or("no message")?;
            group.pass([Value::from(message.as_str())]);
            Ok(())
        })
        .then_ok(|group, values| {
            assert_eq!(values, strs(&["hello"]));
            group.context().insert("response", String::from("hi"));
            group.pass([Value::from("hi")]);
            Ok(())
        })
        .anyway(|group, outcome| {
            let response = group.context().get::<String>("response").ok_or("missing")?;
            assert_eq!(outcome?, strs(&[response.as_str()]));
            group.pass([Value::Bool(true)]);
            Ok(())
        });
    ev.run();
    assert_eq!(out.outcome(), Some(Ok(vec![Value::Bool(true)])));
    assert!(out.context().ptr_eq(&context));
}

#[test]
fn flow_runs_steps_in_sequence() {
    let ev = EventLoop::new();
    let seen: Seen = Rc::new(RefCell::new(vec![]));
    let out = seen.clone();
    let reached_last = Rc::new(RefCell::new(false));
    let flag = reached_last.clone();
    flow::run(
        &ev,
        [
            flow::step(|group: &Group, _| {
                echo_after(group.event_loop(), 4, "file contents", group.slot().into_callback());
                echo_after(group.event_loop(), 1, "timeouted", group.slot().into_callback());
                Ok(())
            }),
            flow::step(|group: &Group, input| {
                let values = input?;
                assert_eq!(values, strs(&["file contents", "timeouted"]));
                let upper = values[0].as_str().unwrap_or_default().to_uppercase();
                group.pass([Value::from(upper), Value::from("uppercasing")]);
                Ok(())
            }),
            // Publishes nothing, so the chain stops here.
            flow::step(move |_: &Group, input| {
                out.borrow_mut().push(input);
                Ok(())
            }),
        ],
        move |_| *flag.borrow_mut() = true,
    );
    ev.run();
    assert_eq!(*seen.borrow(), [Ok(strs(&["FILE CONTENTS", "uppercasing"]))]);
    assert!(!*reached_last.borrow());
}

#[test]
fn composed_flow_as_an_operation() {
    let ev = EventLoop::new();
    let upper: Flow = flow::compose(
        &ev,
        [
            flow::step(|group: &Group, input| {
                let value = input?.remove(0);
                let slot = group.slot();
                group.event_loop().defer(move || slot.ok(value));
                Ok(())
            }),
            flow::step(|group: &Group, input| {
                let text = input?[0].as_str().unwrap_or_default().to_uppercase();
                group.pass([Value::from(text)]);
                Ok(())
            }),
        ],
    );

    let seen: Seen = Rc::new(RefCell::new(vec![]));
    let out = seen.clone();
    Flow::<Value>::new(&ev)
        .step(|group, _| {
            echo_after(group.event_loop(), 2, "text", group.slot().into_callback());
            Ok(())
        })
        .step(move |group, input| {
            upper.call(input?, group.slot().into_callback());
            Ok(())
        })
        .run(move |outcome| out.borrow_mut().push(outcome));
    ev.run();
    assert_eq!(*seen.borrow(), [Ok(strs(&["TEXT"]))]);
}

#[test]
fn flow_errors_reach_the_final_callback() {
    let ev = EventLoop::new();
    let seen: Seen = Rc::new(RefCell::new(vec![]));
    let out = seen.clone();
    Flow::<Value>::new(&ev)
        .step(|_, _| Err(Error::msg("hello error!")))
        .step(|_, _| panic!("should not be there"))
        .step(|_, _| panic!("should not be there"))
        .run(move |outcome| out.borrow_mut().push(outcome));
    ev.run();
    assert_eq!(*seen.borrow(), [Err(Error::msg("hello error!"))]);
}

#[test]
fn awaiting_a_chain() {
    let ev = EventLoop::new();
    let chain = Group::<Value>::chain(&ev, |group| {
        echo_after(group.event_loop(), 5, "x", group.slot().into_callback());
        Ok(())
    })
    .then_ok(|group, mut values| {
        values.push(Value::from("y"));
        group.pass(values);
        Ok(())
    });
    let values = ev.block_on(chain).unwrap();
    assert_eq!(values, Ok(strs(&["x", "y"])));
}

#[test]
fn json_values_through_every_kind_of_slot() {
    let ev = EventLoop::new();
    let group: Group = ev.group();
    echo_after(&ev, 3, "late", group.slot().into_callback());
    group.pass([json!("early")]);
    group.multi_slot().settle(Ok(vec![json!("x"), json!(1)]));
    let nested = group.subgroup();
    nested.pass([json!("a"), json!({ "b": true })]);
    let seen = record(&group);
    ev.run();
    assert_eq!(
        *seen.borrow(),
        [Ok(vec![
            json!("late"),
            json!("early"),
            json!(["x", 1]),
            json!(["a", { "b": true }]),
        ])]
    );
}
