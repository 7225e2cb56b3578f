use std::cmp::Ordering;
use std::mem;

/// Opaque payload bytes carried by every element.
pub const PAYLOAD_SIZE: usize = 48;

/// Fixed-size sort record.
///
/// `key` carries the caller's sort key; `orp_id` is a random tiebreak
/// assigned after the shuffle. All comparisons use the lexicographic
/// `(key, orp_id)` pair; the payload never participates.
///
/// The wire format is little-endian (`to_bytes`/`from_bytes`). The
/// layout is `#[repr(C)]` with no padding (8 + 8 + 48 bytes), so on a
/// little-endian target an element slice doubles as its own wire format
/// and `elems_as_bytes` can hand it to the transport without a copy.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Elem {
    pub key: u64,
    pub orp_id: u64,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl Elem {
    /// Size of one element in bytes.
    pub const SIZE: usize = mem::size_of::<Elem>();

    /// Element with the given key, zero ORP ID and zero payload.
    pub fn with_key(key: u64) -> Self {
        Self {
            key,
            orp_id: 0,
            payload: [0u8; PAYLOAD_SIZE],
        }
    }

    /// The comparison pair.
    pub fn sort_pair(&self) -> (u64, u64) {
        (self.key, self.orp_id)
    }

    /// Copy this element into a byte array.
    pub fn to_bytes(&self) -> [u8; Elem::SIZE] {
        let mut out = [0u8; Elem::SIZE];
        out[..8].copy_from_slice(&self.key.to_le_bytes());
        out[8..16].copy_from_slice(&self.orp_id.to_le_bytes());
        out[16..].copy_from_slice(&self.payload);
        out
    }

    /// Reconstruct an element from `to_bytes` output.
    pub fn from_bytes(bytes: &[u8; Elem::SIZE]) -> Self {
        let mut key = [0u8; 8];
        key.copy_from_slice(&bytes[..8]);
        let mut orp_id = [0u8; 8];
        orp_id.copy_from_slice(&bytes[8..16]);
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload.copy_from_slice(&bytes[16..]);
        Self {
            key: u64::from_le_bytes(key),
            orp_id: u64::from_le_bytes(orp_id),
            payload,
        }
    }
}

impl PartialEq for Elem {
    fn eq(&self, other: &Self) -> bool {
        self.sort_pair() == other.sort_pair()
    }
}

impl Eq for Elem {}

impl PartialOrd for Elem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Elem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_pair().cmp(&other.sort_pair())
    }
}

// The zero-copy view below reuses the in-memory representation as the
// wire encoding; it only matches the little-endian field codec of
// `to_bytes`/`from_bytes` on a little-endian target.
const _: () = assert!(
    cfg!(target_endian = "little"),
    "Elem wire format is little-endian; elems_as_bytes requires a little-endian target"
);

/// View an element slice as its wire bytes.
///
/// Decoded by `elems_from_bytes` on the receiving side; the layout and
/// endianness constraints above make the two agree.
pub fn elems_as_bytes(elems: &[Elem]) -> &[u8] {
    // SAFETY: Elem is #[repr(C)] with no padding; any byte pattern is a
    // valid u8, and the slice covers exactly `len * Elem::SIZE` bytes of
    // initialized memory.
    unsafe { std::slice::from_raw_parts(elems.as_ptr() as *const u8, elems.len() * Elem::SIZE) }
}

/// Copy a whole number of elements out of a byte buffer.
///
/// Returns `None` if `bytes` is not a multiple of the element size.
pub fn elems_from_bytes(bytes: &[u8]) -> Option<Vec<Elem>> {
    if bytes.len() % Elem::SIZE != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(bytes.len() / Elem::SIZE);
    for chunk in bytes.chunks_exact(Elem::SIZE) {
        let mut buf = [0u8; Elem::SIZE];
        buf.copy_from_slice(chunk);
        out.push(Elem::from_bytes(&buf));
    }
    Some(out)
}
