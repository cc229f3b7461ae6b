use rand::seq::SliceRandom;
use rand::Rng;

/// Uniform pick over `candidates`; `None` when there is nothing to pick.
pub fn select<'a, R: Rng + ?Sized>(candidates: &'a [String], rng: &mut R) -> Option<&'a str> {
    candidates.choose(rng).map(String::as_str)
}
