//! Element storage.
//!
//! Every buffer in this crate is a [`Buffer`], whose allocator is captured
//! from the registry when the buffer is created. There is no constructor
//! taking another allocator, so matrix storage cannot bypass the active
//! resource.

use crate::error::{LinalgError, Result};
use strata_log::warn;
use strata_mem::ActiveAlloc;

/// Growable storage allocated from the resource active at creation.
pub type Buffer<T> = allocator_api2::vec::Vec<T, ActiveAlloc>;

/// Empty buffer bound to the active resource.
#[must_use]
pub fn buffer<T>() -> Buffer<T> {
    Buffer::new_in(ActiveAlloc::current())
}

/// Empty buffer with room for `capacity` elements.
///
/// Allocation failure aborts, like any growable container.
#[must_use]
pub fn buffer_with_capacity<T>(capacity: usize) -> Buffer<T> {
    Buffer::with_capacity_in(capacity, ActiveAlloc::current())
}

/// Number of elements in a `rows x cols` matrix.
///
/// # Errors
///
/// Returns [`LinalgError::DimensionOverflow`] if the product overflows.
pub fn element_count(rows: usize, cols: usize) -> Result<usize> {
    rows.checked_mul(cols)
        .ok_or(LinalgError::DimensionOverflow { rows, cols })
}

/// Length of the column-pointer array of a matrix with `cols` columns.
///
/// # Errors
///
/// Returns [`LinalgError::DimensionOverflow`] for `cols == usize::MAX`.
pub fn column_pointer_count(rows: usize, cols: usize) -> Result<usize> {
    cols.checked_add(1)
        .ok_or(LinalgError::DimensionOverflow { rows, cols })
}

/// `len` copies of `value`, reporting allocation failure as an error.
///
/// # Errors
///
/// Returns [`LinalgError::AllocationFailed`] if the active resource refuses
/// the storage or `len` elements exceed the addressable size.
pub fn try_filled<T: Clone>(value: T, len: usize) -> Result<Buffer<T>> {
    let mut data = buffer();
    data.try_reserve_exact(len).map_err(|err| {
        warn!(
            "storage: could not reserve {len} elements of {} bytes: {err:?}",
            size_of::<T>()
        );
        LinalgError::AllocationFailed { elements: len }
    })?;
    data.resize(len, value);
    Ok(data)
}

/// `len` copies of `value`.
#[must_use]
pub fn filled<T: Clone>(value: T, len: usize) -> Buffer<T> {
    let mut data = buffer_with_capacity(len);
    data.resize(len, value);
    data
}

/// Copy of `items` in a fresh buffer bound to the active resource.
#[must_use]
pub fn copied<T: Copy>(items: &[T]) -> Buffer<T> {
    let mut data = buffer_with_capacity(items.len());
    data.extend_from_slice(items);
    data
}

/// Overwrites `dst` with `src`, reusing `dst`'s allocation (and resource).
pub(crate) fn assign_slice<T: Copy>(dst: &mut Buffer<T>, src: &[T]) {
    dst.clear();
    dst.extend_from_slice(src);
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_mem::registry::{self, FallbackPolicy};
    use strata_mem::{DebugResource, system_resource};

    #[test]
    fn test_buffers_use_the_active_resource() {
        let debug = DebugResource::new(system_resource());
        {
            let _guard = unsafe { registry::install(&debug) };
            let data = filled(0.0f64, 16);
            assert_eq!(data.len(), 16);
            assert_eq!(debug.current_bytes_outstanding(), 16 * 8);
        }
        assert_eq!(debug.current_bytes_outstanding(), 0);
    }

    #[test]
    fn test_assign_reuses_allocation() {
        let debug = DebugResource::new(system_resource());
        {
            let _guard = unsafe { registry::install(&debug) };
            let mut data = copied(&[1, 2, 3, 4]);
            assign_slice(&mut data, &[5, 6, 7]);
            assert_eq!(&data[..], &[5, 6, 7]);
            assert_eq!(debug.num_allocations(), 1);
        }
    }

    #[test]
    fn test_element_count_overflow() {
        assert_eq!(element_count(3, 4), Ok(12));
        assert_eq!(
            element_count(usize::MAX, 2),
            Err(LinalgError::DimensionOverflow {
                rows: usize::MAX,
                cols: 2
            })
        );
        assert_eq!(column_pointer_count(0, 5), Ok(6));
        assert!(column_pointer_count(0, usize::MAX).is_err());
    }

    #[test]
    fn test_try_filled_reports_capacity_overflow() {
        let result = try_filled(0u64, usize::MAX / 2);
        assert_eq!(
            result.err(),
            Some(LinalgError::AllocationFailed {
                elements: usize::MAX / 2
            })
        );
    }

    #[test]
    fn test_try_filled_reports_failure() {
        let previous = registry::set_fallback_policy(FallbackPolicy::Reject);
        let result = try_filled(0u8, 32);
        registry::set_fallback_policy(previous);

        assert_eq!(
            result.err(),
            Some(LinalgError::AllocationFailed { elements: 32 })
        );
    }
}
