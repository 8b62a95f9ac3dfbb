use crate::error::EmbedError;
use crate::handle::Reference;
use crate::handle::Value;
use crate::scope::Scope;

/// Persistent references.
///
/// A [`Reference`] anchors a value independently of handle scopes, so the host can keep a
/// script-provided value (typically a callback) across event-loop iterations that each open and
/// close their own scope. References live until [`Scope::release_ref`] or isolate disposal.
impl<'i> Scope<'i> {
  pub fn create_ref(&mut self, value: Value) -> Result<Reference, EmbedError> {
    let value = self.resolve(value)?;
    let id = self.state_mut().references.insert(value)?;
    Ok(Reference(id))
  }

  /// Produces a handle in this scope aliasing the referenced value.
  pub fn get_ref_value(&mut self, reference: Reference) -> Result<Value, EmbedError> {
    let value = self
      .state()
      .references
      .get(reference.0)
      .cloned()
      .ok_or(EmbedError::InvalidReference)?;
    self.push(value)
  }

  /// Releases a reference. The value stays alive while other handles or references reach it.
  pub fn release_ref(&mut self, reference: Reference) -> Result<(), EmbedError> {
    self
      .state_mut()
      .references
      .remove(reference.0)
      .map(drop)
      .ok_or(EmbedError::InvalidReference)
  }

  pub fn live_references(&self) -> usize {
    self.state().references.len()
  }
}
