use std::hint::black_box;

use crate::elem::Elem;
use crate::tunables::SWAP_CHUNK_SIZE;

/// Conditionally swap `a` and `b`.
///
/// Branch-free: the same loads and stores execute for both values of
/// `cond`. The mask is laundered through `black_box` so the compiler
/// cannot specialize either path on the condition. Slices are processed
/// in `SWAP_CHUNK_SIZE`-byte steps, u64 lanes first, byte tail after.
///
/// # Panics
/// Panics if `a` and `b` differ in length.
pub fn oswap_bytes(a: &mut [u8], b: &mut [u8], cond: bool) {
    assert_eq!(a.len(), b.len());
    let mask64 = black_box(u64::from(cond).wrapping_neg());
    let mask8 = mask64 as u8;

    for (ca, cb) in a
        .chunks_mut(SWAP_CHUNK_SIZE)
        .zip(b.chunks_mut(SWAP_CHUNK_SIZE))
    {
        let mut ia = ca.chunks_exact_mut(8);
        let mut ib = cb.chunks_exact_mut(8);
        for (la, lb) in ia.by_ref().zip(ib.by_ref()) {
            let va = u64::from_ne_bytes(la.try_into().unwrap());
            let vb = u64::from_ne_bytes(lb.try_into().unwrap());
            let x = (va ^ vb) & mask64;
            la.copy_from_slice(&(va ^ x).to_ne_bytes());
            lb.copy_from_slice(&(vb ^ x).to_ne_bytes());
        }
        for (ta, tb) in ia
            .into_remainder()
            .iter_mut()
            .zip(ib.into_remainder().iter_mut())
        {
            let x = (*ta ^ *tb) & mask8;
            *ta ^= x;
            *tb ^= x;
        }
    }
}

/// Conditionally swap two elements with a data-independent access
/// pattern.
pub fn oswap_elems(a: &mut Elem, b: &mut Elem, cond: bool) {
    // SAFETY: the two &mut borrows guarantee disjoint allocations; Elem
    // is #[repr(C)] without padding, so every byte is initialized and any
    // byte pattern written back is a valid Elem.
    let (ba, bb) = unsafe {
        (
            std::slice::from_raw_parts_mut(a as *mut Elem as *mut u8, Elem::SIZE),
            std::slice::from_raw_parts_mut(b as *mut Elem as *mut u8, Elem::SIZE),
        )
    };
    oswap_bytes(ba, bb, cond);
}
