mod common;

use common::eval_number;
use common::eval_string;
use common::with_context;
use common::with_isolate;
use embed_js::CallbackInfo;
use embed_js::EmbedError;
use embed_js::IsolateParams;
use embed_js::Scope;
use embed_js::ScriptErrorKind;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

type Lines = Rc<RefCell<Vec<(String, usize)>>>;

fn println(
  scope: &mut Scope<'_>,
  info: &CallbackInfo,
  argc: usize,
  data: &dyn Any,
) -> Result<(), EmbedError> {
  assert_eq!(argc, info.len());
  let lines = data
    .downcast_ref::<Lines>()
    .ok_or_else(|| EmbedError::host("println expects a line sink"))?;
  let message = info.get_args(1)?[0];
  let mut buf = [0u8; 256];
  let written = scope.get_utf8(message, &mut buf)?;
  let text = String::from_utf8_lossy(&buf[..written]);
  lines
    .borrow_mut()
    .push((text.trim_end_matches('\0').to_string(), written));
  Ok(())
}

#[test]
fn println_receives_script_string() -> Result<(), EmbedError> {
  let lines: Lines = Rc::default();
  with_isolate(IsolateParams::default(), |scope| {
    let global = scope.create_object_template()?;
    let function = scope.create_function_template("println", println, Box::new(lines.clone()))?;
    scope.set_binding(global, "println", function)?;
    scope.run_script(Some(global), r#"println("AKING V1.0")"#)?;
    Ok(())
  })?;
  assert_eq!(*lines.borrow(), vec![("AKING V1.0".to_string(), 11)]);
  Ok(())
}

#[test]
fn reading_missing_arguments_throws_into_script() -> Result<(), EmbedError> {
  with_context(|scope| {
    let needs_two = scope.create_closure("needsTwo", |_, info| {
      info.get_args(2)?;
      Ok(())
    })?;
    scope.set_global("needsTwo", needs_two)?;
    let message = eval_string(
      scope,
      "try { needsTwo(1); 'unreachable' } catch (e) { e.message }",
    )?;
    assert_eq!(message, "requested 2 arguments but the call received 1");
    Ok(())
  })
}

#[test]
fn return_value_reaches_script() -> Result<(), EmbedError> {
  with_context(|scope| {
    let add = scope.create_closure("add", |scope, info| {
      let args = info.get_args(2)?;
      let sum = scope.get_number(args[0])? + scope.get_number(args[1])?;
      let sum = scope.create_double(sum)?;
      info.set_return_value(sum);
      Ok(())
    })?;
    scope.set_global("add", add)?;
    assert_eq!(eval_number(scope, "add(2, 3) * 2")?, 10.0);

    let silent = scope.create_closure("silent", |_, _| Ok(()))?;
    scope.set_global("silent", silent)?;
    assert_eq!(eval_string(scope, "typeof silent(1, 2, 3)")?, "undefined");
    Ok(())
  })
}

#[test]
fn host_errors_are_catchable() -> Result<(), EmbedError> {
  with_context(|scope| {
    let fail = scope.create_closure("fail", |_, _| Err(EmbedError::host("nope")))?;
    scope.set_global("fail", fail)?;
    let caught = eval_string(
      scope,
      "try { fail(); 'unreachable' } catch (e) { (e instanceof Error) + ':' + e.message }",
    )?;
    assert_eq!(caught, "true:nope");

    match scope.run_script(None, "fail()") {
      Err(EmbedError::Script(err)) => {
        assert_eq!(err.kind, ScriptErrorKind::Runtime);
        assert!(err.message.contains("nope"), "{}", err.message);
      }
      other => panic!("expected an uncaught exception, got {other:?}"),
    }
    Ok(())
  })
}

#[test]
fn callbacks_can_call_back_into_script() -> Result<(), EmbedError> {
  with_context(|scope| {
    let apply = scope.create_closure("apply", |scope, info| {
      let args = info.get_args(2)?;
      let result = scope.call_function(args[0], &args[1..])?;
      info.set_return_value(result);
      Ok(())
    })?;
    scope.set_global("apply", apply)?;
    assert_eq!(
      eval_number(scope, "apply(function (v) { return v + 1; }, 41)")?,
      42.0
    );
    // Nested: script -> host -> script -> host.
    assert_eq!(
      eval_number(scope, "apply(function (v) { return apply(function (w) { return w * 2; }, v); }, 4)")?,
      8.0
    );
    Ok(())
  })
}

#[test]
fn calling_script_functions_from_the_host() -> Result<(), EmbedError> {
  with_context(|scope| {
    scope.run_script(
      None,
      "var counter = { n: 1, bump(by) { this.n += by; return this.n; } };",
    )?;
    let global = scope.global()?;
    let counter = scope.get_property(global, "counter")?;
    let by = scope.create_int32(2)?;
    let result = scope.invoke(counter, "bump", &[by])?;
    assert_eq!(scope.get_number(result)?, 3.0);

    let bump = scope.get_property(counter, "bump")?;
    let result = scope.call_method(bump, counter, &[by])?;
    assert_eq!(scope.get_number(result)?, 5.0);

    let not_a_function = scope.create_int32(1)?;
    assert_eq!(
      scope.call_function(not_a_function, &[]).unwrap_err(),
      EmbedError::NotCallable
    );
    Ok(())
  })
}

#[test]
fn closure_data_is_passed_through() -> Result<(), EmbedError> {
  fn scaled(
    scope: &mut Scope<'_>,
    info: &CallbackInfo,
    _argc: usize,
    data: &dyn Any,
  ) -> Result<(), EmbedError> {
    let factor = *data
      .downcast_ref::<f64>()
      .ok_or_else(|| EmbedError::host("missing factor"))?;
    let input = scope.get_number(info.get_args(1)?[0])?;
    let output = scope.create_double(input * factor)?;
    info.set_return_value(output);
    Ok(())
  }

  with_context(|scope| {
    let triple = scope.create_function("triple", scaled, Box::new(3.0f64))?;
    let half = scope.create_function("half", scaled, Box::new(0.5f64))?;
    scope.set_global("triple", triple)?;
    scope.set_global("half", half)?;
    assert_eq!(eval_number(scope, "triple(half(8))")?, 12.0);
    assert!(scope.live_functions() >= 2);
    Ok(())
  })
}

#[test]
fn functions_need_an_entered_context() -> Result<(), EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let err = scope.create_closure("early", |_, _| Ok(())).unwrap_err();
    assert_eq!(err, EmbedError::NoContext);

    // Templates are the pre-context form and instantiate once a context exists.
    let template = scope.create_closure_template("early", |scope, info| {
      let answer = scope.create_int32(42)?;
      info.set_return_value(answer);
      Ok(())
    })?;
    let context = scope.create_context(None)?;
    let mut entered = scope.enter_context(context)?;
    let function = entered.get_function(template)?;
    let result = entered.call_function(function, &[])?;
    assert_eq!(entered.get_number(result)?, 42.0);
    Ok(())
  })
}

#[test]
fn closure_data_is_dropped_with_the_isolate() -> Result<(), EmbedError> {
  let marker = Rc::new(());
  let captured = marker.clone();
  let boxed = marker.clone();
  with_isolate(IsolateParams::default(), move |scope| {
    fn noop(
      _scope: &mut Scope<'_>,
      _info: &CallbackInfo,
      _argc: usize,
      _data: &dyn Any,
    ) -> Result<(), EmbedError> {
      Ok(())
    }
    let template = scope.create_function_template("boxed", noop, Box::new(boxed))?;
    scope.set_global("boxed", template)?;

    let context = scope.create_context(None)?;
    let mut entered = scope.enter_context(context)?;
    let holder = entered.create_closure("holder", move |scope, info| {
      let count = scope.create_uint32(Rc::strong_count(&captured) as u32)?;
      info.set_return_value(count);
      Ok(())
    })?;
    entered.set_global("holder", holder)?;
    assert_eq!(eval_number(&mut entered, "boxed(); holder()")?, 3.0);
    Ok(())
  })?;
  assert_eq!(Rc::strong_count(&marker), 1);
  Ok(())
}

#[test]
fn unreachable_functions_release_their_bundles() -> Result<(), EmbedError> {
  with_context(|scope| {
    let before = scope.live_functions();
    {
      let mut inner = scope.reborrow();
      inner.create_closure("temporary", |_, _| Ok(()))?;
      assert_eq!(inner.live_functions(), before + 1);
    }
    boa_gc::force_collect();
    assert_eq!(scope.live_functions(), before);
    Ok(())
  })
}
