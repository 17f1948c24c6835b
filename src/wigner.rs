//! Wigner 3j symbols with all magnetic quantum numbers zero.
//!
//! The coupling builder only ever needs `(l1 l2 l3; 0 0 0)`, and only for
//! triples that satisfy the triangle inequality `|l1 − l2| ≤ l3 ≤ l1 + l2`
//! with `l1 + l2 + l3` even. Any generator with that contract plugs in through
//! [`Wigner3jProvider`]; [`Wigner3j000`] is the built-in closed-form one.
//!
//! # Closed form
//!
//! With `J = l1 + l2 + l3` even and `g = J / 2`:
//!
//! ```text
//! (l1 l2 l3)          g   ⎡ (J−2l1)! (J−2l2)! (J−2l3)! ⎤½        g!
//! (0  0  0 )  =  (−1)  · ⎢ ─────────────────────────── ⎥  · ─────────────────────
//!                         ⎣          (J+1)!            ⎦    (g−l1)! (g−l2)! (g−l3)!
//! ```
//!
//! Evaluated in log space from a precomputed `ln k!` table so that large
//! multipoles do not overflow.

use core::cell::RefCell;

use hashbrown::HashMap;

/// Source of `(l1 l2 l3; 0 0 0)` values.
///
/// Callers guarantee the triangle inequality and even parity; implementations
/// may return anything for other triples.
pub trait Wigner3jProvider {
    /// The 3j symbol `(l1 l2 l3; 0 0 0)`.
    fn w000(&self, l1: usize, l2: usize, l3: usize) -> f64;
}

impl<F> Wigner3jProvider for F
where
    F: Fn(usize, usize, usize) -> f64,
{
    #[inline]
    fn w000(&self, l1: usize, l2: usize, l3: usize) -> f64 {
        self(l1, l2, l3)
    }
}

/// `true` when `(l1, l2, l3)` passes the triangle and parity selection rules.
#[inline]
pub fn is_allowed(l1: usize, l2: usize, l3: usize) -> bool {
    l3 >= l1.abs_diff(l2) && l3 <= l1 + l2 && (l1 + l2 + l3) % 2 == 0
}

/// Closed-form `(l1 l2 l3; 0 0 0)` backed by a log-factorial table.
#[derive(Clone, Debug)]
pub struct Wigner3j000 {
    /// `ln_fact[k] = ln(k!)`.
    ln_fact: Vec<f64>,
    lmax: usize,
}

impl Wigner3j000 {
    /// Precompute enough of the factorial table for every triple with all
    /// `l ≤ lmax`. Larger arguments still work, they are just slower.
    pub fn new(lmax: usize) -> Self {
        // J + 1 ≤ 3·lmax + 1 is the largest factorial the closed form needs.
        let size = 3 * lmax + 2;
        let mut ln_fact = Vec::with_capacity(size);
        let mut acc = 0.0f64;
        ln_fact.push(0.0);
        for k in 1..size {
            acc += (k as f64).ln();
            ln_fact.push(acc);
        }
        Self { ln_fact, lmax }
    }

    /// Largest multipole the table was sized for.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    fn ln_factorial(&self, n: usize) -> f64 {
        if let Some(&v) = self.ln_fact.get(n) {
            return v;
        }
        let last = self.ln_fact.len() - 1;
        let mut acc = self.ln_fact[last];
        for k in last + 1..=n {
            acc += (k as f64).ln();
        }
        acc
    }
}

impl Wigner3jProvider for Wigner3j000 {
    fn w000(&self, l1: usize, l2: usize, l3: usize) -> f64 {
        if !is_allowed(l1, l2, l3) {
            return 0.0;
        }
        let j = l1 + l2 + l3;
        let g = j / 2;
        let ln_mag = 0.5
            * (self.ln_factorial(j - 2 * l1) + self.ln_factorial(j - 2 * l2)
                + self.ln_factorial(j - 2 * l3)
                - self.ln_factorial(j + 1))
            + self.ln_factorial(g)
            - self.ln_factorial(g - l1)
            - self.ln_factorial(g - l2)
            - self.ln_factorial(g - l3);
        let mag = ln_mag.exp();
        if g % 2 == 0 { mag } else { -mag }
    }
}

/// Memoising wrapper around any provider.
///
/// With all `m = 0` and even `J`, the symbol is invariant under any
/// permutation of its columns, so entries are keyed by the sorted triple.
/// Useful when the inner provider is expensive to call (for example a
/// foreign-language callback).
pub struct CachedWigner<P: Wigner3jProvider> {
    inner: P,
    cache: RefCell<HashMap<(usize, usize, usize), f64>>,
}

impl<P: Wigner3jProvider> CachedWigner<P> {
    /// Wrap `inner` with an empty cache.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct triples evaluated so far.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Drop the cache and return the wrapped provider.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Wigner3jProvider> Wigner3jProvider for CachedWigner<P> {
    fn w000(&self, l1: usize, l2: usize, l3: usize) -> f64 {
        let mut key = [l1, l2, l3];
        key.sort_unstable();
        let key = (key[0], key[1], key[2]);
        if let Some(&v) = self.cache.borrow().get(&key) {
            return v;
        }
        let v = self.inner.w000(l1, l2, l3);
        self.cache.borrow_mut().insert(key, v);
        v
    }
}

/// Adapter for generators that can fail, such as foreign callbacks.
///
/// The first error is kept and every later call returns `0.0` without
/// touching the inner generator. Callers check [`FallibleWigner::into_error`]
/// once the sum is done and discard the result if it is `Some`.
pub struct FallibleWigner<F, E> {
    inner: F,
    first_err: RefCell<Option<E>>,
}

impl<F, E> FallibleWigner<F, E>
where
    F: Fn(usize, usize, usize) -> core::result::Result<f64, E>,
{
    /// Wrap `inner`; no error recorded yet.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            first_err: RefCell::new(None),
        }
    }

    /// `true` once the inner generator has failed.
    pub fn has_failed(&self) -> bool {
        self.first_err.borrow().is_some()
    }

    /// The first error the inner generator returned, if any.
    pub fn into_error(self) -> Option<E> {
        self.first_err.into_inner()
    }
}

impl<F, E> Wigner3jProvider for FallibleWigner<F, E>
where
    F: Fn(usize, usize, usize) -> core::result::Result<f64, E>,
{
    fn w000(&self, l1: usize, l2: usize, l3: usize) -> f64 {
        if self.has_failed() {
            return 0.0;
        }
        match (self.inner)(l1, l2, l3) {
            Ok(v) => v,
            Err(e) => {
                *self.first_err.borrow_mut() = Some(e);
                0.0
            }
        }
    }
}
