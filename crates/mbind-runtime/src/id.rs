#![forbid(unsafe_code)]

//! Arena keys.

slotmap::new_key_type! {
    /// Key of a view in the [`ViewTree`](crate::ViewTree) arena.
    ///
    /// Keys are generational: a key to a destroyed view never resolves to a
    /// view created later in the same slot.
    pub struct ViewId;
}
