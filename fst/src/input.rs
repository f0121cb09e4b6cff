//! Key symbols and how labels are encoded.

use crate::{arc::Label, Error};
use std::fmt::Debug;

/// How arc labels are encoded, which bounds the largest label an [crate::Fst] can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputType {
    /// One byte per label (`0..=255`).
    Byte1,
    /// Two big-endian bytes per label (`0..=65_535`).
    Byte2,
    /// A vint per label (`0..=i32::MAX`).
    Byte4,
}

impl InputType {
    /// The largest label representable with this input type.
    pub fn max_label(self) -> Label {
        match self {
            Self::Byte1 => u8::MAX as Label,
            Self::Byte2 => u16::MAX as Label,
            Self::Byte4 => Label::MAX,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Byte1 => 0,
            Self::Byte2 => 1,
            Self::Byte4 => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(Self::Byte1),
            1 => Ok(Self::Byte2),
            2 => Ok(Self::Byte4),
            _ => Err(Error::InvalidInputType(code)),
        }
    }
}

/// A unit of a key.
///
/// Keys are slices of symbols and are ordered by comparing symbols as unsigned integers.
pub trait Symbol: Copy + Ord + Debug {
    /// The label of this symbol, or `None` if it exceeds the largest label of any [InputType].
    fn to_label(self) -> Option<Label>;

    /// The symbol of a label.
    ///
    /// # Panics
    ///
    /// Panics if `label` is out of range for the symbol type.
    fn from_label(label: Label) -> Self;
}

macro_rules! impl_symbol {
    ($type:ty) => {
        impl Symbol for $type {
            #[inline]
            fn to_label(self) -> Option<Label> {
                Label::try_from(self).ok()
            }

            #[inline]
            fn from_label(label: Label) -> Self {
                <$type>::try_from(label).expect("label out of range for symbol")
            }
        }
    };
}
impl_symbol!(u8);
impl_symbol!(u16);
impl_symbol!(u32);
