use crate::error::engine_error;
use crate::error::EmbedError;
use crate::handle::Value;
use crate::scope::Scope;
use boa_engine::js_string;
use boa_engine::object::builtins::JsArray;
use boa_engine::object::builtins::JsArrayBuffer;
use boa_engine::object::builtins::JsUint16Array;
use boa_engine::object::builtins::JsUint32Array;
use boa_engine::object::builtins::JsUint8Array;
use boa_engine::JsBigInt;
use boa_engine::JsObject;
use boa_engine::JsString;
use boa_engine::JsValue;
use std::ffi::CStr;
use std::fmt;
use std::fmt::Display;

/// The coarse type of a value, as seen by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
  Undefined,
  Null,
  Boolean,
  Number,
  BigInt,
  String,
  Symbol,
  Object,
  Array,
  Function,
}

impl ValueKind {
  pub(crate) fn of(value: &JsValue) -> Self {
    match value {
      JsValue::Undefined => ValueKind::Undefined,
      JsValue::Null => ValueKind::Null,
      JsValue::Boolean(_) => ValueKind::Boolean,
      JsValue::Integer(_) | JsValue::Rational(_) => ValueKind::Number,
      JsValue::BigInt(_) => ValueKind::BigInt,
      JsValue::String(_) => ValueKind::String,
      JsValue::Symbol(_) => ValueKind::Symbol,
      JsValue::Object(obj) if obj.is_callable() => ValueKind::Function,
      JsValue::Object(obj) if JsArray::from_object(obj.clone()).is_ok() => ValueKind::Array,
      JsValue::Object(_) => ValueKind::Object,
    }
  }

  /// Whether values of this kind live outside any scope and may be stored on a template.
  pub fn is_primitive(self) -> bool {
    !matches!(
      self,
      ValueKind::Object | ValueKind::Array | ValueKind::Function
    )
  }

  pub const fn as_str(self) -> &'static str {
    match self {
      ValueKind::Undefined => "undefined",
      ValueKind::Null => "null",
      ValueKind::Boolean => "boolean",
      ValueKind::Number => "number",
      ValueKind::BigInt => "bigint",
      ValueKind::String => "string",
      ValueKind::Symbol => "symbol",
      ValueKind::Object => "object",
      ValueKind::Array => "array",
      ValueKind::Function => "function",
    }
  }
}

impl Display for ValueKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Decodes a string, replacing unpaired surrogates with U+FFFD.
pub(crate) fn lossy_string(string: &JsString) -> String {
  string
    .to_std_string_with_surrogates()
    .map(|chunk| chunk.unwrap_or_else(|_| char::REPLACEMENT_CHARACTER.to_string()))
    .collect()
}

/// Copies as many whole UTF-8 sequences of `text` as fit into `buf`, followed by a NUL
/// terminator when the complete text and the terminator both fit. Returns the number of bytes
/// written, terminator included.
fn write_utf8(text: &str, buf: &mut [u8]) -> usize {
  let mut written = 0;
  for ch in text.chars() {
    let len = ch.len_utf8();
    if written + len > buf.len() {
      return written;
    }
    ch.encode_utf8(&mut buf[written..written + len]);
    written += len;
  }
  if written < buf.len() {
    buf[written] = 0;
    written += 1;
  }
  written
}

/// Value factory.
///
/// Every created value is owned by the innermost open scope.
impl<'i> Scope<'i> {
  pub fn create_undefined(&mut self) -> Result<Value, EmbedError> {
    self.push(JsValue::undefined())
  }

  pub fn create_null(&mut self) -> Result<Value, EmbedError> {
    self.push(JsValue::null())
  }

  pub fn create_boolean(&mut self, value: bool) -> Result<Value, EmbedError> {
    self.push(JsValue::from(value))
  }

  pub fn create_int32(&mut self, value: i32) -> Result<Value, EmbedError> {
    self.push(JsValue::from(value))
  }

  pub fn create_uint32(&mut self, value: u32) -> Result<Value, EmbedError> {
    self.push(JsValue::from(value))
  }

  /// Creates a Number from a 64-bit integer.
  ///
  /// Numbers are doubles, so magnitudes above 2^53 lose precision. Use
  /// [`Scope::create_bigint64`] when every bit matters.
  pub fn create_int64(&mut self, value: i64) -> Result<Value, EmbedError> {
    self.push(JsValue::from(value as f64))
  }

  /// Creates a BigInt holding `value` exactly.
  pub fn create_bigint64(&mut self, value: i64) -> Result<Value, EmbedError> {
    self.push(JsValue::from(JsBigInt::from(value)))
  }

  pub fn create_double(&mut self, value: f64) -> Result<Value, EmbedError> {
    self.push(JsValue::from(value))
  }

  pub fn create_object(&mut self) -> Result<Value, EmbedError> {
    let object = JsObject::with_object_proto(self.engine.intrinsics());
    self.push(object.into())
  }

  pub fn create_array(&mut self) -> Result<Value, EmbedError> {
    let array = JsArray::new(self.engine);
    self.push(array.into())
  }

  /// Creates an array whose `length` is `length` and whose elements are holes.
  pub fn create_array_with_length(&mut self, length: usize) -> Result<Value, EmbedError> {
    let array = JsArray::new(self.engine);
    array
      .set(js_string!("length"), length as f64, true, self.engine)
      .map_err(engine_error)?;
    self.push(array.into())
  }

  fn array_buffer(
    &mut self,
    byte_length: usize,
    element_size: usize,
  ) -> Result<JsArrayBuffer, EmbedError> {
    if byte_length % element_size != 0 {
      return Err(EmbedError::InvalidBufferLength {
        byte_length,
        element_size,
      });
    }
    JsArrayBuffer::new(byte_length, self.engine).map_err(engine_error)
  }

  /// Creates a `Uint8Array` over a fresh zeroed buffer of `byte_length` bytes.
  pub fn create_uint8_array(&mut self, byte_length: usize) -> Result<Value, EmbedError> {
    let buffer = self.array_buffer(byte_length, 1)?;
    let array = JsUint8Array::from_array_buffer(buffer, self.engine).map_err(engine_error)?;
    self.push(array.into())
  }

  /// Creates a `Uint16Array` over a fresh zeroed buffer of `byte_length` bytes.
  pub fn create_uint16_array(&mut self, byte_length: usize) -> Result<Value, EmbedError> {
    let buffer = self.array_buffer(byte_length, 2)?;
    let array = JsUint16Array::from_array_buffer(buffer, self.engine).map_err(engine_error)?;
    self.push(array.into())
  }

  /// Creates a `Uint32Array` over a fresh zeroed buffer of `byte_length` bytes.
  pub fn create_uint32_array(&mut self, byte_length: usize) -> Result<Value, EmbedError> {
    let buffer = self.array_buffer(byte_length, 4)?;
    let array = JsUint32Array::from_array_buffer(buffer, self.engine).map_err(engine_error)?;
    self.push(array.into())
  }

  pub fn create_string(&mut self, value: &str) -> Result<Value, EmbedError> {
    self.push(JsString::from(value).into())
  }

  /// Creates a string from UTF-8 bytes, replacing invalid sequences with U+FFFD.
  pub fn create_string_utf8(&mut self, bytes: &[u8]) -> Result<Value, EmbedError> {
    let text = String::from_utf8_lossy(bytes);
    self.create_string(&text)
  }

  /// Creates a string from a NUL-terminated UTF-8 buffer.
  pub fn create_string_from_cstr(&mut self, value: &CStr) -> Result<Value, EmbedError> {
    self.create_string_utf8(value.to_bytes())
  }

  /// Creates a string from UTF-16 code units, kept verbatim (unpaired surrogates included).
  pub fn create_string_utf16(&mut self, units: &[u16]) -> Result<Value, EmbedError> {
    self.push(JsString::from(units).into())
  }

  /// Creates a string from UTF-16 code units up to (not including) the first `0` unit.
  pub fn create_string_utf16_nul(&mut self, units: &[u16]) -> Result<Value, EmbedError> {
    let end = units.iter().position(|&unit| unit == 0).unwrap_or(units.len());
    self.create_string_utf16(&units[..end])
  }
}

/// Reading values back.
impl<'i> Scope<'i> {
  pub fn kind(&self, value: Value) -> Result<ValueKind, EmbedError> {
    Ok(ValueKind::of(&self.resolve(value)?))
  }

  pub fn is_callable(&self, value: Value) -> Result<bool, EmbedError> {
    Ok(self.resolve(value)?.is_callable())
  }

  /// Writes the UTF-8 encoding of a string value into `buf` and returns the number of bytes
  /// written.
  ///
  /// Output stops at the last complete character that fits. A NUL terminator is appended (and
  /// counted) when the whole string and the terminator fit. Unpaired surrogates are written as
  /// U+FFFD; this never fails on encoding grounds.
  pub fn get_utf8(&self, value: Value, buf: &mut [u8]) -> Result<usize, EmbedError> {
    let text = self.get_string(value)?;
    Ok(write_utf8(&text, buf))
  }

  /// Decodes a string value (lossily, see [`Scope::get_utf8`]).
  pub fn get_string(&self, value: Value) -> Result<String, EmbedError> {
    match self.resolve(value)? {
      JsValue::String(string) => Ok(lossy_string(&string)),
      _ => Err(EmbedError::NotAString),
    }
  }

  /// Converts any value to text using the script `String(value)` conversion.
  pub fn to_string_lossy(&mut self, value: Value) -> Result<String, EmbedError> {
    let value = self.resolve(value)?;
    let string = value.to_string(self.engine).map_err(engine_error)?;
    Ok(lossy_string(&string))
  }

  pub fn get_number(&self, value: Value) -> Result<f64, EmbedError> {
    self
      .resolve(value)?
      .as_number()
      .ok_or(EmbedError::NotANumber)
  }

  /// Reads a Number or BigInt as a 64-bit integer.
  ///
  /// Numbers are truncated toward zero and saturate at the `i64` bounds; BigInts outside the
  /// `i64` range are rejected.
  pub fn get_int64(&self, value: Value) -> Result<i64, EmbedError> {
    match self.resolve(value)? {
      JsValue::BigInt(bigint) => bigint
        .to_string()
        .parse::<i64>()
        .map_err(|_| EmbedError::NotANumber),
      other => other
        .as_number()
        .map(|number| number as i64)
        .ok_or(EmbedError::NotANumber),
    }
  }

  pub fn get_boolean(&self, value: Value) -> Result<bool, EmbedError> {
    Ok(self.resolve(value)?.to_boolean())
  }

  pub(crate) fn resolve_object(&self, value: Value) -> Result<JsObject, EmbedError> {
    match self.resolve(value)? {
      JsValue::Object(object) => Ok(object),
      _ => Err(EmbedError::NotAnObject),
    }
  }

  /// Sets `object[key] = value`.
  pub fn set_property(&mut self, object: Value, key: &str, value: Value) -> Result<(), EmbedError> {
    let target = self.resolve_object(object)?;
    let value = self.resolve(value)?;
    target
      .set(JsString::from(key), value, true, self.engine)
      .map_err(engine_error)?;
    Ok(())
  }

  /// Reads `object[key]`.
  pub fn get_property(&mut self, object: Value, key: &str) -> Result<Value, EmbedError> {
    let target = self.resolve_object(object)?;
    let value = target
      .get(JsString::from(key), self.engine)
      .map_err(engine_error)?;
    self.push(value)
  }
}
