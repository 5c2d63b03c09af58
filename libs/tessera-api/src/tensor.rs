use std::fmt;

use crate::error::{Error, Result};
use crate::meta::Meta;
use crate::row::Cell;
use crate::value::{Kind, Value};

// ════════════════════════════════════════════════════════════════
//  Dim
// ════════════════════════════════════════════════════════════════

/// Tensor shape: channels × height × width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dim {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Dim {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Number of elements a tensor of this shape holds; `None` when the
    /// product does not fit in `usize`.
    pub fn volume(&self) -> Option<usize> {
        self.channels.checked_mul(self.height)?.checked_mul(self.width)
    }
}

// ════════════════════════════════════════════════════════════════
//  Element type
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorElem {
    Byte,
    Float32,
}

impl TensorElem {
    /// One-letter tag that prefixes the text form.
    pub fn magic(&self) -> char {
        match self {
            TensorElem::Byte => 'u',
            TensorElem::Float32 => 'f',
        }
    }

    fn from_magic(c: char) -> Option<Self> {
        match c {
            'u' => Some(TensorElem::Byte),
            'f' => Some(TensorElem::Float32),
            _ => None,
        }
    }

    /// Kind of a single element.
    pub fn kind(&self) -> Kind {
        match self {
            TensorElem::Byte => Kind::UInt8,
            TensorElem::Float32 => Kind::Float32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Buffer {
    Byte(Vec<u8>),
    Float32(Vec<f32>),
}

// ════════════════════════════════════════════════════════════════
//  Tensor
// ════════════════════════════════════════════════════════════════

/// Fixed-shape numeric buffer, channel-major then row then column.
///
/// The buffer length always equals the shape's volume; a tensor is never
/// resized after construction, only mutated element-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    dim: Dim,
    values: Buffer,
}

impl Tensor {
    /// Zero-filled tensor of the given element type and shape.
    pub fn zeros(elem: TensorElem, dim: Dim) -> Result<Self> {
        let n = volume(dim)?;
        let values = match elem {
            TensorElem::Byte => Buffer::Byte(vec![0; n]),
            TensorElem::Float32 => Buffer::Float32(vec![0.0; n]),
        };
        Ok(Self { dim, values })
    }

    /// Take ownership of `values` as a byte tensor.
    pub fn bytes(dim: Dim, values: Vec<u8>) -> Result<Self> {
        check_len(dim, values.len())?;
        Ok(Self { dim, values: Buffer::Byte(values) })
    }

    /// Byte tensor backed by a copy of `values`.
    pub fn copy_bytes(dim: Dim, values: &[u8]) -> Result<Self> {
        Self::bytes(dim, values.to_vec())
    }

    pub fn floats(dim: Dim, values: Vec<f32>) -> Result<Self> {
        check_len(dim, values.len())?;
        Ok(Self { dim, values: Buffer::Float32(values) })
    }

    pub fn copy_floats(dim: Dim, values: &[f32]) -> Result<Self> {
        Self::floats(dim, values.to_vec())
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn elem(&self) -> TensorElem {
        match self.values {
            Buffer::Byte(_) => TensorElem::Byte,
            Buffer::Float32(_) => TensorElem::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            Buffer::Byte(v) => v.len(),
            Buffer::Float32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` as a scalar value.
    pub fn index(&self, index: usize) -> Option<Value> {
        match &self.values {
            Buffer::Byte(v) => v.get(index).map(|x| Value::UInt8(*x)),
            Buffer::Float32(v) => v.get(index).map(|x| Value::Float32(*x)),
        }
    }

    /// Parse one scalar into `values[index]`.
    pub fn convert_elem(&mut self, text: &str, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(Error::convert(text, format!("tensor index {index} out of range 0..{len}")));
        }
        let text = text.trim();
        match &mut self.values {
            Buffer::Byte(v) => v[index] = text.parse::<u8>().map_err(|e| Error::convert(text, e))?,
            Buffer::Float32(v) => v[index] = text.parse::<f32>().map_err(|e| Error::convert(text, e))?,
        }
        Ok(())
    }

    /// Index of the maximum element; the first maximum wins.
    pub fn hot_one(&self) -> usize {
        fn first_max<T: PartialOrd>(values: &[T]) -> usize {
            let mut j = 0;
            for (i, v) in values.iter().enumerate() {
                if values[j] < *v {
                    j = i;
                }
            }
            j
        }
        match &self.values {
            Buffer::Byte(v) => first_max(v),
            Buffer::Float32(v) => first_max(v),
        }
    }

    /// Elements as normalized `f32`. Bytes are divided by 256.
    pub fn floats32(&self) -> Vec<f32> {
        match &self.values {
            Buffer::Byte(v) => v.iter().map(|x| f32::from(*x) / 256.0).collect(),
            Buffer::Float32(v) => v.clone(),
        }
    }

    /// Copy `floats32()` into `out`, which must be at least `len()` long.
    pub fn copy_to(&self, out: &mut [f32]) -> Result<()> {
        if out.len() < self.len() {
            return Err(Error::type_err(format!(
                "output buffer of {} elements is smaller than tensor of {}",
                out.len(),
                self.len()
            )));
        }
        for (o, v) in out.iter_mut().zip(self.floats32()) {
            *o = v;
        }
        Ok(())
    }

    /// Parse the `<magic><c>x<h>x<w>[v0,v1,...]` text form.
    pub fn decode(text: &str) -> Result<Self> {
        let text = text.trim();
        let bad = |reason: &str| Error::convert(text, reason);

        let mut chars = text.chars();
        let elem = chars
            .next()
            .and_then(TensorElem::from_magic)
            .ok_or_else(|| bad("unknown tensor element tag"))?;
        let rest = chars.as_str();
        let (shape, body) = rest.split_once('[').ok_or_else(|| bad("missing `[`"))?;
        let body = body.strip_suffix(']').ok_or_else(|| bad("missing `]`"))?;

        let dims: Vec<usize> = shape
            .split('x')
            .map(|s| s.parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::convert(text, e))?;
        let [channels, height, width] = dims.as_slice() else {
            return Err(bad("shape must be <channels>x<height>x<width>"));
        };

        let dim = Dim::new(*channels, *height, *width);
        let n = dim.volume().ok_or_else(|| bad("tensor shape is too large"))?;
        let items: Vec<&str> = if body.trim().is_empty() { Vec::new() } else { body.split(',').collect() };
        if items.len() != n {
            return Err(Error::convert(text, format!("expected {n} elements, got {}", items.len())));
        }
        let mut tensor = Tensor::zeros(elem, dim)?;
        for (i, item) in items.iter().enumerate() {
            tensor.convert_elem(item, i)?;
        }
        Ok(tensor)
    }
}

fn volume(dim: Dim) -> Result<usize> {
    dim.volume().ok_or_else(|| {
        Error::type_err(format!("tensor {}x{}x{} is too large", dim.channels, dim.height, dim.width))
    })
}

fn check_len(dim: Dim, len: usize) -> Result<()> {
    let n = volume(dim)?;
    if n != len {
        return Err(Error::type_err(format!(
            "tensor {}x{}x{} needs {n} elements, got {len}",
            dim.channels, dim.height, dim.width
        )));
    }
    Ok(())
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.dim;
        write!(f, "{}{}x{}x{}[", self.elem().magic(), d.channels, d.height, d.width)?;
        match &self.values {
            Buffer::Byte(v) => write_joined(f, v)?,
            Buffer::Float32(v) => write_joined(f, v)?,
        }
        f.write_str("]")
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i != 0 {
            f.write_str(",")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════
//  TensorMeta
// ════════════════════════════════════════════════════════════════

/// Meta adapter for tensor columns.
///
/// With `width == 1` the text is a whole tensor literal. With a wider
/// group the slot gets a `1x1xwidth` tensor on the first element and
/// each following call fills element `index` of that same tensor.
#[derive(Debug, Clone, Copy)]
pub struct TensorMeta {
    pub elem: TensorElem,
}

impl TensorMeta {
    pub fn new(elem: TensorElem) -> Self {
        Self { elem }
    }
}

impl Meta for TensorMeta {
    fn kind(&self) -> Kind {
        Kind::Tensor
    }

    fn convert(&self, text: &str, slot: &mut Cell, index: usize, width: usize) -> Result<()> {
        if width <= 1 {
            *slot = Some(Value::Tensor(Tensor::decode(text)?));
            return Ok(());
        }
        match slot {
            Some(Value::Tensor(t)) => t.convert_elem(text, index),
            Some(other) => Err(Error::type_err(format!("slot holds {} instead of a tensor", other.kind()))),
            None => {
                let mut t = Tensor::zeros(self.elem, Dim::new(1, 1, width))?;
                t.convert_elem(text, index)?;
                *slot = Some(Value::Tensor(t));
                Ok(())
            }
        }
    }

    fn format(&self, value: Option<&Value>) -> Result<String> {
        match value {
            None => Ok(String::new()),
            Some(Value::Tensor(t)) => Ok(t.to_string()),
            Some(other) => Err(Error::type_err(format!("`{other}` is not a tensor value"))),
        }
    }
}
