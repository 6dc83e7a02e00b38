//! Presenting caller-supplied integer sequences to native calls.

use std::borrow::Cow;
use std::os::raw::c_int;

/// A contiguous `i64` buffer pinned for the duration of one native call.
///
/// Slices are borrowed as-is; other sequences are collected once. The
/// pointer handed to the closure in [`StableArray::with_raw`] is valid only
/// inside that closure: the borrow checker keeps the buffer alive and
/// unmoved for exactly that scope.
#[derive(Debug, Clone)]
pub struct StableArray<'a> {
    values: Cow<'a, [i64]>,
}

impl<'a> StableArray<'a> {
    /// Borrow an existing slice without copying.
    pub fn borrowed(values: &'a [i64]) -> Self {
        Self {
            values: Cow::Borrowed(values),
        }
    }

    /// Collect any sequence of signed integers.
    pub fn collect<I>(values: I) -> StableArray<'static>
    where
        I: IntoIterator,
        I::Item: Into<i64>,
    {
        StableArray {
            values: Cow::Owned(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values as a slice.
    pub fn as_slice(&self) -> &[i64] {
        &self.values
    }

    /// Run `call` with a fixed address and explicit length for the values.
    ///
    /// Lengths beyond `c_int::MAX` are reported as `c_int::MAX`; the engine
    /// then reads a prefix and rejects the configuration itself.
    pub fn with_raw<R, F>(&self, call: F) -> R
    where
        F: FnOnce(*const i64, c_int) -> R,
    {
        let len = c_int::try_from(self.values.len()).unwrap_or(c_int::MAX);
        call(self.values.as_ptr(), len)
    }
}

impl<'a> From<&'a [i64]> for StableArray<'a> {
    fn from(values: &'a [i64]) -> Self {
        StableArray::borrowed(values)
    }
}

impl<'a, const N: usize> From<&'a [i64; N]> for StableArray<'a> {
    fn from(values: &'a [i64; N]) -> Self {
        StableArray::borrowed(values)
    }
}

impl<'a> From<&'a Vec<i64>> for StableArray<'a> {
    fn from(values: &'a Vec<i64>) -> Self {
        StableArray::borrowed(values)
    }
}

impl From<Vec<i64>> for StableArray<'static> {
    fn from(values: Vec<i64>) -> Self {
        StableArray {
            values: Cow::Owned(values),
        }
    }
}
