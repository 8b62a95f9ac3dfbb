use crate::error::EmbedError;
use crate::handle::SlotId;
use boa_engine::JsValue;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

// Shared by every table of every isolate, so a handle never matches a slot it was not issued for,
// even after its isolate is gone.
static GENERATIONS: AtomicU32 = AtomicU32::new(1);

fn fresh_generation() -> u32 {
  loop {
    // Generation 0 is reserved for the null handle.
    let generation = GENERATIONS.fetch_add(1, Ordering::Relaxed);
    if generation != 0 {
      return generation;
    }
  }
}

fn slot_index(len: usize) -> Result<u32, EmbedError> {
  u32::try_from(len).map_err(|_| EmbedError::OutOfHandles)
}

/// Position of an open scope on the [`HandleStack`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct ScopeMark {
  depth: usize,
  height: usize,
}

impl ScopeMark {
  pub(crate) fn depth(self) -> usize {
    self.depth
  }
}

/// Scope-indexed stack of engine values backing [`Value`](crate::Value) handles.
///
/// Values are pushed onto the innermost open scope. Closing a scope truncates the stack back to
/// the height recorded when it was opened. Every push stamps its slot with a process-wide fresh
/// generation, so a handle that survives its scope (or its isolate) is detected as stale rather
/// than aliasing whatever value reuses the slot next.
#[derive(Default)]
pub(crate) struct HandleStack {
  slots: Vec<(u32, JsValue)>,
  scopes: Vec<usize>,
}

impl HandleStack {
  pub(crate) fn open_scope(&mut self) -> ScopeMark {
    let mark = ScopeMark {
      depth: self.scopes.len(),
      height: self.slots.len(),
    };
    self.scopes.push(mark.height);
    mark
  }

  pub(crate) fn close_scope(&mut self, mark: ScopeMark) {
    debug_assert_eq!(
      self.scopes.len(),
      mark.depth + 1,
      "handle scopes must be closed in LIFO order"
    );
    self.slots.truncate(mark.height);
    self.scopes.truncate(mark.depth);
  }

  pub(crate) fn push(&mut self, value: JsValue) -> Result<SlotId, EmbedError> {
    if self.scopes.is_empty() {
      return Err(EmbedError::NoHandleScope);
    }
    let index = slot_index(self.slots.len())?;
    let generation = fresh_generation();
    self.slots.push((generation, value));
    Ok(SlotId::from_parts(index, generation))
  }

  pub(crate) fn get(&self, id: SlotId) -> Result<&JsValue, EmbedError> {
    match self.slots.get(id.index() as usize) {
      Some((generation, value)) if *generation == id.generation() => Ok(value),
      _ => Err(EmbedError::StaleHandle),
    }
  }

  /// Number of live values across all open scopes.
  pub(crate) fn len(&self) -> usize {
    self.slots.len()
  }

  pub(crate) fn clear(&mut self) {
    self.slots.clear();
    self.scopes.clear();
  }
}

struct Entry<T> {
  generation: u32,
  value: Option<T>,
}

/// Generation-checked table with a free list, used for handles whose lifetime is not tied to
/// handle scopes (templates, references, contexts).
pub(crate) struct SlotTable<T> {
  entries: Vec<Entry<T>>,
  free: Vec<u32>,
  live: usize,
}

impl<T> Default for SlotTable<T> {
  fn default() -> Self {
    Self {
      entries: Vec::new(),
      free: Vec::new(),
      live: 0,
    }
  }
}

impl<T> SlotTable<T> {
  pub(crate) fn insert(&mut self, value: T) -> Result<SlotId, EmbedError> {
    let generation = fresh_generation();
    let index = match self.free.pop() {
      Some(index) => {
        let entry = &mut self.entries[index as usize];
        debug_assert!(entry.value.is_none());
        entry.generation = generation;
        entry.value = Some(value);
        index
      }
      None => {
        let index = slot_index(self.entries.len())?;
        self.entries.push(Entry {
          generation,
          value: Some(value),
        });
        index
      }
    };
    self.live += 1;
    Ok(SlotId::from_parts(index, generation))
  }

  pub(crate) fn get(&self, id: SlotId) -> Option<&T> {
    self
      .entries
      .get(id.index() as usize)
      .filter(|entry| entry.generation == id.generation())
      .and_then(|entry| entry.value.as_ref())
  }

  pub(crate) fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
    self
      .entries
      .get_mut(id.index() as usize)
      .filter(|entry| entry.generation == id.generation())
      .and_then(|entry| entry.value.as_mut())
  }

  pub(crate) fn remove(&mut self, id: SlotId) -> Option<T> {
    let entry = self
      .entries
      .get_mut(id.index() as usize)
      .filter(|entry| entry.generation == id.generation())?;
    let value = entry.value.take()?;
    self.free.push(id.index());
    self.live -= 1;
    Some(value)
  }

  pub(crate) fn len(&self) -> usize {
    self.live
  }

  pub(crate) fn clear(&mut self) {
    for (index, entry) in self.entries.iter_mut().enumerate() {
      if entry.value.take().is_some() {
        self.free.push(index as u32);
      }
    }
    self.live = 0;
  }
}
