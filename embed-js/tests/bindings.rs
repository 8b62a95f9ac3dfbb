mod common;

use common::eval_number;
use common::eval_string;
use common::with_context;
use common::with_isolate;
use embed_js::BindingTarget;
use embed_js::EmbedError;
use embed_js::IsolateParams;
use embed_js::ValueKind;

#[test]
fn template_bindings_seed_the_global() -> Result<(), EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let global = scope.create_object_template()?;
    let answer = scope.create_int32(42)?;
    scope.set_binding(global, "answer", answer)?;
    let x = scope.create_string("single")?;
    scope.set_binding(global, "x", x)?;

    let config = scope.create_object_template()?;
    let debug = scope.create_boolean(true)?;
    scope.set_binding(config, "debug", debug)?;
    scope.set_binding(global, "config", config)?;

    let double = scope.create_closure_template("double", |scope, info| {
      let input = scope.get_number(info.get_args(1)?[0])?;
      let output = scope.create_double(input * 2.0)?;
      info.set_return_value(output);
      Ok(())
    })?;
    scope.set_binding(global, "double", double)?;

    let result = scope.run_script(
      Some(global),
      "[double(answer), x, typeof config, config.debug].join(' ')",
    )?;
    assert_eq!(scope.get_string(result)?, "84 single object true");
    Ok(())
  })
}

#[test]
fn templates_only_accept_primitives_and_templates() -> Result<(), EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let template = scope.create_object_template()?;
    let object = scope.create_object()?;
    assert_eq!(
      scope.set_binding(template, "o", object).unwrap_err(),
      EmbedError::NotTemplateCompatible(ValueKind::Object)
    );
    let array = scope.create_array()?;
    assert_eq!(
      scope.set_binding(template, "a", array).unwrap_err(),
      EmbedError::NotTemplateCompatible(ValueKind::Array)
    );
    Ok(())
  })
}

#[test]
fn template_cycles_are_rejected() -> Result<(), EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let a = scope.create_object_template()?;
    let b = scope.create_object_template()?;
    assert_eq!(
      scope.set_binding(a, "self", a).unwrap_err(),
      EmbedError::TemplateCycle
    );
    scope.set_binding(a, "b", b)?;
    assert_eq!(
      scope.set_binding(b, "a", a).unwrap_err(),
      EmbedError::TemplateCycle
    );
    // Sharing a template between two parents is not a cycle.
    let c = scope.create_object_template()?;
    scope.set_binding(a, "c", c)?;
    scope.set_binding(b, "c", c)?;
    Ok(())
  })
}

#[test]
fn rebinding_a_key_replaces_it() -> Result<(), EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let global = scope.create_object_template()?;
    let first = scope.create_int32(1)?;
    let second = scope.create_int32(2)?;
    scope.set_binding(global, "v", first)?;
    scope.set_binding(global, "v", second)?;
    let result = scope.run_script(Some(global), "v")?;
    assert_eq!(scope.get_number(result)?, 2.0);
    Ok(())
  })
}

#[test]
fn live_object_bindings_after_entry() -> Result<(), EmbedError> {
  with_context(|scope| {
    let global = scope.global()?;
    let greeting = scope.create_string("hello")?;
    scope.set_binding(BindingTarget::Object(global), "greeting", greeting)?;

    let settings = scope.create_object()?;
    let level = scope.create_int32(3)?;
    scope.set_binding(settings, "level", level)?;
    scope.set_binding(global, "settings", settings)?;

    assert_eq!(eval_string(scope, "greeting + ' ' + settings.level")?, "hello 3");
    Ok(())
  })
}

#[test]
fn set_global_before_and_after_entering() -> Result<(), EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let early = scope.create_int32(1)?;
    scope.set_global("early", early)?;
    let helper = scope.create_closure_template("helper", |scope, info| {
      let value = scope.create_string("from template")?;
      info.set_return_value(value);
      Ok(())
    })?;
    scope.set_global("helper", helper)?;

    let context = scope.create_context(None)?;
    let mut entered = scope.enter_context(context)?;
    let late = entered.create_int32(2)?;
    entered.set_global("late", late)?;
    let closure = entered.create_closure("closure", |scope, info| {
      let value = scope.create_int32(3)?;
      info.set_return_value(value);
      Ok(())
    })?;
    entered.set_global("closure", closure)?;

    assert_eq!(eval_number(&mut entered, "early + late + closure()")?, 6.0);
    assert_eq!(eval_string(&mut entered, "helper()")?, "from template");
    Ok(())
  })
}

#[test]
fn new_instance_populates_an_object() -> Result<(), EmbedError> {
  with_context(|scope| {
    let template = scope.create_object_template()?;
    let kind = scope.create_string("point")?;
    scope.set_binding(template, "kind", kind)?;

    let first = scope.new_instance(template)?;
    let second = scope.new_instance(template)?;
    let value = scope.create_int32(5)?;
    scope.set_property(first, "kind", value)?;

    let untouched = scope.get_property(second, "kind")?;
    assert_eq!(scope.get_string(untouched)?, "point");
    Ok(())
  })
}

#[test]
fn contexts_have_separate_globals() -> Result<(), EmbedError> {
  with_isolate(IsolateParams::default(), |scope| {
    let first = scope.create_context(None)?;
    let second = scope.create_context(None)?;
    {
      let mut entered = scope.enter_context(first)?;
      entered.run_script(None, "var onlyHere = 1;")?;
    }
    let mut entered = scope.enter_context(second)?;
    assert_eq!(eval_string(&mut entered, "typeof onlyHere")?, "undefined");
    Ok(())
  })
}
