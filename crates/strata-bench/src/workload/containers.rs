//! Container workloads over an explicit resource: vectors, nested vectors,
//! string-keyed maps and maps of maps. Keys are decimal strings whose bytes
//! are allocated through the same resource.

use strata_mem::{MemoryResource, ResMap, ResVec, ResourceAlloc, res_map};

/// Byte string allocated through a resource.
type ResString<'r> = ResVec<'r, u8>;

/// Decimal representation of `value`.
fn decimal_key(value: usize, alloc: ResourceAlloc<'_>) -> ResString<'_> {
    let mut digits = [0u8; 20];
    let mut start = digits.len();
    let mut rest = value;
    loop {
        start -= 1;
        digits[start] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }

    let mut key = ResString::with_capacity_in(digits.len() - start, alloc);
    key.extend_from_slice(&digits[start..]);
    key
}

/// Pushes `0..len` one at a time.
pub fn vector_push(resource: &dyn MemoryResource, len: usize) -> usize {
    let mut values: ResVec<'_, usize> = ResVec::new_in(ResourceAlloc::new(resource));
    for i in 0..len {
        values.push(i);
    }
    values.len()
}

/// Builds `outer` vectors of `inner` integers and moves each into a parent
/// vector.
pub fn nested_vectors(resource: &dyn MemoryResource, outer: usize, inner: usize) -> usize {
    let alloc = ResourceAlloc::new(resource);
    let mut vectors: ResVec<'_, ResVec<'_, usize>> = ResVec::new_in(alloc);
    for _ in 0..outer {
        let mut values = ResVec::new_in(alloc);
        for j in 0..inner {
            values.push(j);
        }
        vectors.push(values);
    }
    vectors.iter().map(|values| values.len()).sum()
}

/// Inserts `len` entries keyed by their decimal representation.
pub fn string_map(resource: &dyn MemoryResource, len: usize) -> usize {
    let alloc = ResourceAlloc::new(resource);
    let mut map: ResMap<'_, ResString<'_>, usize> = res_map(resource);
    for i in 0..len {
        map.insert(decimal_key(i, alloc), i);
    }
    map.len()
}

/// Builds `outer` maps of `inner` entries and inserts each into a parent map.
pub fn nested_maps(resource: &dyn MemoryResource, outer: usize, inner: usize) -> usize {
    let alloc = ResourceAlloc::new(resource);
    let mut maps: ResMap<'_, ResString<'_>, ResMap<'_, ResString<'_>, usize>> = res_map(resource);
    for i in 0..outer {
        let mut map = res_map(resource);
        for j in 0..inner {
            map.insert(decimal_key(j, alloc), j);
        }
        maps.insert(decimal_key(i, alloc), map);
    }
    maps.values().map(|map| map.len()).sum()
}
