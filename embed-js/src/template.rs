use crate::error::engine_error;
use crate::error::EmbedError;
use crate::function::build_function;
use crate::function::Bundle;
use crate::handle::Template;
use crate::handle::Value;
use crate::scope::Scope;
use crate::value::ValueKind;
use ahash::AHashMap;
use boa_engine::JsObject;
use boa_engine::JsString;
use boa_engine::JsValue;
use std::rc::Rc;

/// A binding stored on an object template.
///
/// Templates outlive handle scopes, so they only hold primitives (which the engine copies) and
/// other templates.
#[derive(Clone)]
pub(crate) enum TemplateBinding {
  Primitive(JsValue),
  Template(Template),
}

#[derive(Default)]
pub(crate) struct ObjectTemplate {
  bindings: Vec<(String, TemplateBinding)>,
  // Key to position in `bindings`; rebinding a key keeps its original position.
  index: AHashMap<String, usize>,
}

impl ObjectTemplate {
  fn set(&mut self, key: &str, binding: TemplateBinding) {
    match self.index.get(key) {
      Some(&at) => self.bindings[at].1 = binding,
      None => {
        self.index.insert(key.to_string(), self.bindings.len());
        self.bindings.push((key.to_string(), binding));
      }
    }
  }

  fn templates(&self) -> impl Iterator<Item = Template> + '_ {
    self.bindings.iter().filter_map(|(_, binding)| match binding {
      TemplateBinding::Template(template) => Some(*template),
      TemplateBinding::Primitive(_) => None,
    })
  }
}

pub(crate) enum TemplateData {
  Object(ObjectTemplate),
  Function { bundle: Rc<Bundle> },
}

/// What to bind under a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
  /// A value of the current scope. Only primitives may be bound on a template.
  Value(Value),
  /// An object or function template, instantiated when the binding is materialized.
  Template(Template),
}

impl From<Value> for Binding {
  fn from(value: Value) -> Self {
    Binding::Value(value)
  }
}

impl From<Template> for Binding {
  fn from(template: Template) -> Self {
    Binding::Template(template)
  }
}

/// Where a binding goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingTarget {
  /// An object template, populated into every object created from it.
  Template(Template),
  /// A live object of the entered context.
  Object(Value),
}

impl From<Template> for BindingTarget {
  fn from(template: Template) -> Self {
    BindingTarget::Template(template)
  }
}

impl From<Value> for BindingTarget {
  fn from(object: Value) -> Self {
    BindingTarget::Object(object)
  }
}

/// Global and template builder.
impl<'i> Scope<'i> {
  /// Creates an empty object template.
  pub fn create_object_template(&mut self) -> Result<Template, EmbedError> {
    let id = self
      .state_mut()
      .templates
      .insert(TemplateData::Object(ObjectTemplate::default()))?;
    Ok(Template(id))
  }

  /// Binds `key` on a template or a live object.
  ///
  /// Rebinding an existing key replaces the earlier binding.
  pub fn set_binding(
    &mut self,
    target: impl Into<BindingTarget>,
    key: &str,
    binding: impl Into<Binding>,
  ) -> Result<(), EmbedError> {
    match target.into() {
      BindingTarget::Template(template) => self.bind_on_template(template, key, binding.into()),
      BindingTarget::Object(object) => {
        let object = self.resolve_object(object)?;
        self.bind_on_object(&object, key, binding.into())
      }
    }
  }

  /// Binds a global under `key`.
  ///
  /// With a context entered, the binding is set on its live global object. Otherwise it is
  /// recorded on the isolate's default global template, which seeds every context created
  /// without an explicit template.
  pub fn set_global(&mut self, key: &str, binding: impl Into<Binding>) -> Result<(), EmbedError> {
    let binding = binding.into();
    if self.state().entered.is_some() {
      let global = self.engine.global_object();
      return self.bind_on_object(&global, key, binding);
    }
    let blueprint = self.state().default_global;
    let blueprint = match blueprint {
      Some(template) => template,
      None => {
        let template = self.create_object_template()?;
        self.state_mut().default_global = Some(template);
        template
      }
    };
    self.bind_on_template(blueprint, key, binding)
  }

  /// Creates an object from an object template in the entered context.
  pub fn new_instance(&mut self, template: Template) -> Result<Value, EmbedError> {
    self.require_context()?;
    let object = self.instantiate_object(template)?;
    self.push(object.into())
  }

  fn bind_on_template(
    &mut self,
    template: Template,
    key: &str,
    binding: Binding,
  ) -> Result<(), EmbedError> {
    let binding = match binding {
      Binding::Value(value) => {
        let value = self.resolve(value)?;
        let kind = ValueKind::of(&value);
        if !kind.is_primitive() {
          return Err(EmbedError::NotTemplateCompatible(kind));
        }
        TemplateBinding::Primitive(value)
      }
      Binding::Template(inner) => {
        if self.state().templates.get(inner.0).is_none() {
          return Err(EmbedError::InvalidTemplate);
        }
        if self.reaches(inner, template) {
          return Err(EmbedError::TemplateCycle);
        }
        TemplateBinding::Template(inner)
      }
    };
    match self.state_mut().templates.get_mut(template.0) {
      Some(TemplateData::Object(object)) => {
        object.set(key, binding);
        Ok(())
      }
      _ => Err(EmbedError::InvalidTemplate),
    }
  }

  fn bind_on_object(
    &mut self,
    object: &JsObject,
    key: &str,
    binding: Binding,
  ) -> Result<(), EmbedError> {
    let value = match binding {
      Binding::Value(value) => self.resolve(value)?,
      Binding::Template(template) => self.instantiate(template)?,
    };
    object
      .set(JsString::from(key), value, true, self.engine)
      .map_err(engine_error)?;
    Ok(())
  }

  /// Whether `to` is reachable from `from` through template bindings.
  fn reaches(&self, from: Template, to: Template) -> bool {
    let state = self.state();
    let mut pending = vec![from];
    while let Some(next) = pending.pop() {
      if next == to {
        return true;
      }
      if let Some(TemplateData::Object(object)) = state.templates.get(next.0) {
        pending.extend(object.templates());
      }
    }
    false
  }

  /// Materializes a template in the current realm.
  pub(crate) fn instantiate(&mut self, template: Template) -> Result<JsValue, EmbedError> {
    let bundle = match self.state().templates.get(template.0) {
      Some(TemplateData::Function { bundle }) => Some(bundle.clone()),
      Some(TemplateData::Object(_)) => None,
      None => return Err(EmbedError::InvalidTemplate),
    };
    match bundle {
      Some(bundle) => Ok(build_function(
        self.engine,
        Rc::downgrade(&self.state),
        bundle,
      )),
      None => Ok(self.instantiate_object(template)?.into()),
    }
  }

  fn instantiate_object(&mut self, template: Template) -> Result<JsObject, EmbedError> {
    let object = JsObject::with_object_proto(self.engine.intrinsics());
    self.populate(&object, template)?;
    Ok(object)
  }

  /// Copies every binding of an object template onto `object`.
  pub(crate) fn populate(&mut self, object: &JsObject, template: Template) -> Result<(), EmbedError> {
    // Cloned out so the state is not borrowed while the engine runs.
    let bindings = match self.state().templates.get(template.0) {
      Some(TemplateData::Object(blueprint)) => blueprint.bindings.clone(),
      _ => return Err(EmbedError::InvalidTemplate),
    };
    for (key, binding) in bindings {
      let value = match binding {
        TemplateBinding::Primitive(value) => value,
        TemplateBinding::Template(inner) => self.instantiate(inner)?,
      };
      object
        .set(JsString::from(key.as_str()), value, true, self.engine)
        .map_err(engine_error)?;
    }
    Ok(())
  }
}
