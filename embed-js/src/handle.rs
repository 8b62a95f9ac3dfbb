use core::fmt;

// Handles cross the host boundary as a single machine word.
#[cfg(not(target_pointer_width = "64"))]
compile_error!("embed-js packs handles into one 64-bit word and only supports 64-bit targets");

/// A stable identifier for a slot in one of the isolate's handle tables.
///
/// This is a packed `{ index: u32, generation: u32 }`.
/// - `index` selects a slot in the owning table.
/// - `generation` is drawn from a process-wide counter each time the slot is filled, so it is
///   never shared by two fills of any slot in any isolate.
///
/// A `SlotId` is **only valid** if:
/// - `index` is in-bounds for the owning table,
/// - the slot at `index` is occupied, and
/// - the slot's generation matches this handle's generation.
///
/// Generation `0` is never issued, so the all-zero word is always invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SlotId(u64);

impl SlotId {
  pub(crate) fn from_parts(index: u32, generation: u32) -> Self {
    Self((index as u64) | ((generation as u64) << 32))
  }

  /// The slot index within the owning table.
  #[inline]
  pub fn index(self) -> u32 {
    self.0 as u32
  }

  /// The generation of the slot when this handle was created.
  #[inline]
  pub fn generation(self) -> u32 {
    (self.0 >> 32) as u32
  }

  #[inline]
  fn to_raw(self) -> usize {
    self.0 as usize
  }

  #[inline]
  fn from_raw(raw: usize) -> Self {
    Self(raw as u64)
  }
}

impl fmt::Debug for SlotId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlotId")
      .field("index", &self.index())
      .field("generation", &self.generation())
      .finish()
  }
}

macro_rules! opaque_handle {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    #[repr(transparent)]
    pub struct $name(pub(crate) SlotId);

    impl $name {
      /// Converts the handle into its opaque pointer-sized form.
      #[inline]
      pub fn into_raw(self) -> usize {
        self.0.to_raw()
      }

      /// Reconstructs a handle from its opaque pointer-sized form.
      ///
      /// This never fails: validity is checked when the handle is used, and a forged or
      /// outdated word is reported as an error at that point.
      #[inline]
      pub fn from_raw(raw: usize) -> Self {
        Self(SlotId::from_raw(raw))
      }

      /// The underlying [`SlotId`].
      #[inline]
      pub fn id(self) -> SlotId {
        self.0
      }
    }
  };
}

opaque_handle!(
  /// A scope-bound handle to a JavaScript value.
  ///
  /// The handle stays usable until the [`Scope`](crate::Scope) that produced it is dropped.
  /// Afterwards every operation taking it fails with
  /// [`EmbedError::StaleHandle`](crate::EmbedError::StaleHandle). Promote it with
  /// [`Scope::create_ref`](crate::Scope::create_ref) to keep it across scopes.
  Value
);

opaque_handle!(
  /// A pre-context blueprint: an object template or a function template.
  Template
);

opaque_handle!(
  /// A persistent, scope-independent handle wrapping exactly one value.
  Reference
);

opaque_handle!(
  /// An execution context (a realm with its own global object).
  ContextId
);

const _: () = assert!(core::mem::size_of::<Value>() == core::mem::size_of::<usize>());
const _: () = assert!(core::mem::size_of::<Template>() == core::mem::size_of::<usize>());
const _: () = assert!(core::mem::size_of::<Reference>() == core::mem::size_of::<usize>());

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn slot_id_packs_index_and_generation() {
    let id = SlotId::from_parts(7, 3);
    assert_eq!(id.index(), 7);
    assert_eq!(id.generation(), 3);

    let max = SlotId::from_parts(u32::MAX, u32::MAX);
    assert_eq!(max.index(), u32::MAX);
    assert_eq!(max.generation(), u32::MAX);
  }

  #[test]
  fn raw_conversion_is_lossless() {
    let value = Value(SlotId::from_parts(12, 9));
    let raw = value.into_raw();
    assert_eq!(Value::from_raw(raw), value);
    assert_eq!(Value::from_raw(raw).id().index(), 12);
  }

  #[test]
  fn null_word_has_generation_zero() {
    assert_eq!(Value::from_raw(0).id().generation(), 0);
    assert_eq!(Reference::from_raw(0).id().generation(), 0);
  }
}
