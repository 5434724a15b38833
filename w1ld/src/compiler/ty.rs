//! Value types.
use std::fmt;

use crate::{
    bytecode::Opcode,
    constants::{CHAR_SIZE, WORD_SIZE},
};

/// Type at the bottom of a pointer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Char,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    Char,
    Int,
    /// Pointer to `Scalar` with the given level of indirection, at least 1.
    Ptr(Scalar, u32),
}

impl Ty {
    /// Pointer to a value of this type.
    pub fn pointer_to(self) -> Ty {
        match self {
            Ty::Char => Ty::Ptr(Scalar::Char, 1),
            Ty::Int => Ty::Ptr(Scalar::Int, 1),
            Ty::Ptr(base, depth) => Ty::Ptr(base, depth.saturating_add(1)),
        }
    }

    /// Type produced by dereferencing, or `None` when this isn't a pointer.
    pub fn pointee(self) -> Option<Ty> {
        match self {
            Ty::Char | Ty::Int => None,
            Ty::Ptr(base, 1) => Some(base.into()),
            Ty::Ptr(base, depth) => Some(Ty::Ptr(base, depth - 1)),
        }
    }

    #[inline]
    pub fn is_pointer(self) -> bool {
        matches!(self, Ty::Ptr(..))
    }

    /// Size of a value of this type in bytes.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            Ty::Char => CHAR_SIZE,
            Ty::Int | Ty::Ptr(..) => WORD_SIZE,
        }
    }

    /// Amount added by `++`/`--` and by one step of pointer arithmetic.
    ///
    /// The element size for pointers, 1 for everything else.
    #[inline]
    pub fn stride(self) -> usize {
        self.pointee().map(Ty::size).unwrap_or(1)
    }

    /// Instruction that loads a value of this type from the address in `ax`.
    #[inline]
    pub fn load_op(self) -> Opcode {
        match self {
            Ty::Char => Opcode::LC,
            _ => Opcode::LI,
        }
    }

    /// Instruction that stores a value of this type to the address on the stack.
    #[inline]
    pub fn store_op(self) -> Opcode {
        match self {
            Ty::Char => Opcode::SC,
            _ => Opcode::SI,
        }
    }
}

impl From<Scalar> for Ty {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Char => Ty::Char,
            Scalar::Int => Ty::Int,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ty::Char => write!(f, "char"),
            Ty::Int => write!(f, "int"),
            Ty::Ptr(base, depth) => {
                write!(f, "{}", Ty::from(*base))?;
                for _ in 0..*depth {
                    write!(f, "*")?;
                }
                Ok(())
            }
        }
    }
}
