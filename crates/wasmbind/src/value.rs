//! Value accessors for the engine's scalar value type.
//!
//! The engine hands host functions a slice of tagged [`Val`]s, but the
//! calling convention behind them is an untagged union: a slot holds one
//! bit pattern and the reader decides how to interpret it. [`ValAccess`]
//! reproduces that contract. Getters reinterpret whatever bits the slot
//! carries, setters overwrite the slot with the requested kind. Nothing here
//! checks a value against a function signature; callers match accessors to
//! the [`ValueType`]s they declared when registering the function.

use extism::{Val, ValType};
use serde::{Deserialize, Serialize};

/// Scalar kinds that can cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// 32-bit integer.
    I32,
    /// 64-bit integer. Also used for memory handles.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// 128-bit vector.
    V128,
    /// Function reference.
    FuncRef,
    /// External reference.
    ExternRef,
}

impl ValueType {
    /// Memory handles travel as 64-bit integers.
    pub const PTR: Self = Self::I64;

    /// A zero value of this kind, for pre-filling output slots.
    #[must_use]
    pub fn zeroed(self) -> Val {
        match self {
            Self::I32 => Val::I32(0),
            Self::I64 => Val::I64(0),
            Self::F32 => Val::F32(0),
            Self::F64 => Val::F64(0),
            Self::V128 => Val::V128(0_u128.into()),
            Self::FuncRef => Val::FuncRef(None),
            Self::ExternRef => Val::ExternRef(None),
        }
    }
}

impl From<ValueType> for ValType {
    fn from(ty: ValueType) -> Self {
        match ty {
            ValueType::I32 => ValType::I32,
            ValueType::I64 => ValType::I64,
            ValueType::F32 => ValType::F32,
            ValueType::F64 => ValType::F64,
            ValueType::V128 => ValType::V128,
            ValueType::FuncRef => ValType::FuncRef,
            ValueType::ExternRef => ValType::ExternRef,
        }
    }
}

/// Untagged-union style access to a value slot.
pub trait ValAccess {
    /// The low 64 bits stored in the slot. References read as zero.
    fn raw_bits(&self) -> u64;

    /// Read the slot as a 32-bit integer.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn get_i32(&self) -> i32 {
        self.raw_bits() as u32 as i32
    }

    /// Read the slot as a 64-bit integer.
    #[allow(clippy::cast_possible_wrap)]
    fn get_i64(&self) -> i64 {
        self.raw_bits() as i64
    }

    /// Read the slot as an unsigned 64-bit integer (memory handles).
    fn get_u64(&self) -> u64 {
        self.raw_bits()
    }

    /// Read the slot as a 32-bit float.
    #[allow(clippy::cast_possible_truncation)]
    fn get_f32(&self) -> f32 {
        f32::from_bits(self.raw_bits() as u32)
    }

    /// Read the slot as a 64-bit float.
    fn get_f64(&self) -> f64 {
        f64::from_bits(self.raw_bits())
    }

    /// Store a 32-bit integer.
    fn set_i32(&mut self, v: i32);

    /// Store a 64-bit integer.
    fn set_i64(&mut self, v: i64);

    /// Store a 32-bit float.
    fn set_f32(&mut self, v: f32);

    /// Store a 64-bit float.
    fn set_f64(&mut self, v: f64);
}

impl ValAccess for Val {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn raw_bits(&self) -> u64 {
        match self {
            Val::I32(v) => u64::from(*v as u32),
            Val::I64(v) => *v as u64,
            Val::F32(bits) => u64::from(*bits),
            Val::F64(bits) => *bits,
            Val::V128(v) => v.as_u128() as u64,
            _ => 0,
        }
    }

    fn set_i32(&mut self, v: i32) {
        *self = Val::I32(v);
    }

    fn set_i64(&mut self, v: i64) {
        *self = Val::I64(v);
    }

    fn set_f32(&mut self, v: f32) {
        *self = Val::F32(v.to_bits());
    }

    fn set_f64(&mut self, v: f64) {
        *self = Val::F64(v.to_bits());
    }
}
