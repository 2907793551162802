//! Business-key equality predicates.
//!
//! A predicate decides whether an active contract is "the same logical
//! contract" as a target value. It must be symmetric and give the same answer
//! for the same inputs.

/// Structural equality of whole payloads.
pub fn structural<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Equality of a projected business key, e.g. `(issuer, instrument_id)`.
///
/// ```
/// use acs_resolver::predicate::by_key;
///
/// struct Holding { owner: String, instrument: String, amount: u64 }
///
/// let same_holding = by_key(|h: &Holding| (h.owner.clone(), h.instrument.clone()));
/// let a = Holding { owner: "alice".into(), instrument: "X".into(), amount: 5 };
/// let b = Holding { owner: "alice".into(), instrument: "X".into(), amount: 9 };
/// assert!(same_holding(&a, &b));
/// ```
pub fn by_key<T, K, F>(key: F) -> impl Fn(&T, &T) -> bool
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    move |a, b| key(a) == key(b)
}
