//! Algebraic decision diagrams.
//!
//! ADDs share the node pool, the unique table and the cache with BDDs, but
//! their terminals carry arbitrary values and their edges are never
//! complemented. `one()` doubles as the ADD constant 1; the ADD constant 0
//! is the separate terminal [`Manager::add_zero`].

use crate::cache::CacheOp;
use crate::error::{Result, Step};
use crate::manager::Manager;
use crate::reference::Ref;
use crate::types::Var;

/// Pointwise operators for [`Manager::add_apply`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AddOp {
    Plus,
    Times,
    Minus,
    Minimum,
    Maximum,
    Divide,
    /// `f` where `f == g`, the background (ADD zero) elsewhere.
    Agreement,
    /// Disjunction of 0-1 ADDs.
    Or,
    /// Conjunction of 0-1 ADDs.
    And,
}

impl AddOp {
    fn tag(self) -> CacheOp {
        match self {
            AddOp::Plus => CacheOp::AddPlus,
            AddOp::Times => CacheOp::AddTimes,
            AddOp::Minus => CacheOp::AddMinus,
            AddOp::Minimum => CacheOp::AddMinimum,
            AddOp::Maximum => CacheOp::AddMaximum,
            AddOp::Divide => CacheOp::AddDivide,
            AddOp::Agreement => CacheOp::AddAgreement,
            AddOp::Or => CacheOp::AddOr,
            AddOp::And => CacheOp::AddAnd,
        }
    }

    fn is_commutative(self) -> bool {
        !matches!(self, AddOp::Minus | AddOp::Divide)
    }

    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            AddOp::Plus => a + b,
            AddOp::Times => a * b,
            AddOp::Minus => a - b,
            AddOp::Minimum => a.min(b),
            AddOp::Maximum => a.max(b),
            AddOp::Divide => a / b,
            AddOp::Agreement => {
                if a == b {
                    a
                } else {
                    0.0
                }
            }
            AddOp::Or => {
                if a != 0.0 || b != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            AddOp::And => {
                if a != 0.0 && b != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl Manager {
    fn add_value(&self, f: Ref) -> Option<f64> {
        self.constant_value(f)
    }

    /// Terminal cases of [`Manager::add_apply_rec`]. `Ok(None)` means the
    /// operands have to be split.
    fn add_terminal(&mut self, op: AddOp, f: Ref, g: Ref) -> Step<Option<Ref>> {
        let zero = self.add_zero;
        let one = self.one;
        let r = match op {
            AddOp::Plus if f == zero => Some(g),
            AddOp::Plus if g == zero => Some(f),
            AddOp::Times if f == zero || g == zero => Some(zero),
            AddOp::Times if f == one => Some(g),
            AddOp::Times if g == one => Some(f),
            AddOp::Minus if f == g => Some(zero),
            AddOp::Minus if f == zero => Some(self.add_negate_rec(g)?),
            AddOp::Minus if g == zero => Some(f),
            AddOp::Minimum if f == self.plus_inf || f == g => Some(g),
            AddOp::Minimum if g == self.plus_inf => Some(f),
            AddOp::Maximum if f == self.minus_inf || f == g => Some(g),
            AddOp::Maximum if g == self.minus_inf => Some(f),
            AddOp::Divide if f == zero => Some(zero),
            AddOp::Divide if g == one => Some(f),
            AddOp::Agreement if f == g || f == zero => Some(f),
            AddOp::Agreement if g == zero => Some(g),
            AddOp::Or if f == one || g == one => Some(one),
            AddOp::Or if f == zero || f == g => Some(g),
            AddOp::Or if g == zero => Some(f),
            AddOp::And if f == zero || g == zero => Some(zero),
            AddOp::And if f == one || f == g => Some(g),
            AddOp::And if g == one => Some(f),
            _ => None,
        };
        if r.is_some() {
            return Ok(r);
        }
        match (self.add_value(f), self.add_value(g)) {
            (Some(a), Some(b)) => Ok(Some(self.unique_const(op.combine(a, b))?)),
            _ => Ok(None),
        }
    }

    /// Recursive step of [`Manager::add_apply`].
    pub(crate) fn add_apply_rec(&mut self, op: AddOp, f: Ref, g: Ref) -> Step<Ref> {
        let (f, g) = if op.is_commutative() && f > g { (g, f) } else { (f, g) };
        if let Some(r) = self.add_terminal(op, f, g)? {
            return Ok(r);
        }
        if let Some(r) = self.cache_lookup(op.tag(), f, g, Ref::INVALID) {
            return Ok(r);
        }

        let top = self.level_of_ref(f).min(self.level_of_ref(g));
        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);

        let t = self.add_apply_rec(op, f1, g1)?;
        self.ref_node(t);
        let e = self.add_apply_rec(op, f0, g0);
        let e = self.keep(e, &[t])?;
        let r = self.join_add(index, t, e)?;

        self.cache.insert(op.tag(), f, g, Ref::INVALID, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::add_ite`]; `f` is a 0-1 ADD.
    pub(crate) fn add_ite_rec(&mut self, f: Ref, g: Ref, h: Ref) -> Step<Ref> {
        let one = self.one;
        let zero = self.add_zero;

        // Terminal cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        if f == one {
            return Ok(g);
        }
        if f == zero {
            return Ok(h);
        }
        if g == h {
            return Ok(g);
        }
        if g == one && h == zero {
            return Ok(f);
        }

        let topf = self.level_of_ref(f);
        let v = self.level_of_ref(g).min(self.level_of_ref(h));
        let node = self.nodes[f.id()];
        // F is the literal x above G and H: build (x,G,H) directly.
        if topf < v && node.high == one && node.low == zero {
            return self.unique_inter(node.index, g, h);
        }
        if topf < v && node.high == zero && node.low == one {
            return self.unique_inter(node.index, h, g);
        }

        if let Some(r) = self.cache_lookup(CacheOp::AddIte, f, g, h) {
            return Ok(r);
        }

        let top = topf.min(v);
        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);
        let (h1, h0) = self.branches(h, top);

        let t = self.add_ite_rec(f1, g1, h1)?;
        self.ref_node(t);
        let e = self.add_ite_rec(f0, g0, h0);
        let e = self.keep(e, &[t])?;
        let r = self.join_add(index, t, e)?;

        self.cache.insert(CacheOp::AddIte, f, g, h, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::add_negate`].
    pub(crate) fn add_negate_rec(&mut self, f: Ref) -> Step<Ref> {
        if let Some(value) = self.add_value(f) {
            return self.unique_const(-value);
        }
        if let Some(r) = self.cache_lookup(CacheOp::AddNegate, f, Ref::INVALID, Ref::INVALID) {
            return Ok(r);
        }

        let index = self.nodes[f.id()].index;
        let (f1, f0) = (self.high(f), self.low(f));
        let t = self.add_negate_rec(f1)?;
        self.ref_node(t);
        let e = self.add_negate_rec(f0);
        let e = self.keep(e, &[t])?;
        let r = self.join_add(index, t, e)?;

        self.cache.insert(CacheOp::AddNegate, f, Ref::INVALID, Ref::INVALID, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::bdd_to_add`].
    pub(crate) fn bdd_to_add_rec(&mut self, f: Ref) -> Step<Ref> {
        if self.is_constant(f) {
            return Ok(if f == self.one { self.one } else { self.add_zero });
        }
        if let Some(r) = self.cache_lookup(CacheOp::BddToAdd, f, Ref::INVALID, Ref::INVALID) {
            return Ok(r);
        }

        let index = self.nodes[f.id()].index;
        let (f1, f0) = (self.high(f), self.low(f));
        let t = self.bdd_to_add_rec(f1)?;
        self.ref_node(t);
        let e = self.bdd_to_add_rec(f0);
        let e = self.keep(e, &[t])?;
        let r = self.join_add(index, t, e)?;

        self.cache.insert(CacheOp::BddToAdd, f, Ref::INVALID, Ref::INVALID, r);
        Ok(r)
    }

    /// Recursive step shared by the ADD-to-BDD conversions. With a
    /// `threshold` node the result is `f >= threshold`, otherwise `f != 0`.
    fn add_to_bdd_rec(&mut self, f: Ref, threshold: Option<Ref>) -> Step<Ref> {
        if let Some(value) = self.add_value(f) {
            let holds = match threshold {
                Some(th) => value >= self.nodes[th.id()].value,
                None => value != 0.0,
            };
            return Ok(self.one.negate_if(!holds));
        }

        let (op, key) = match threshold {
            Some(th) => (CacheOp::AddThreshold, th),
            None => (CacheOp::AddPattern, Ref::INVALID),
        };
        if let Some(r) = self.cache_lookup(op, f, key, Ref::INVALID) {
            return Ok(r);
        }

        let index = self.nodes[f.id()].index;
        let (f1, f0) = (self.high(f), self.low(f));
        let t = self.add_to_bdd_rec(f1, threshold)?;
        self.ref_node(t);
        let e = self.add_to_bdd_rec(f0, threshold);
        let e = self.keep(e, &[t])?;
        let r = self.join(index, t, e)?;

        self.cache.insert(op, f, key, Ref::INVALID, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::add_exist_abstract`]; `cube` is a
    /// positive BDD cube.
    pub(crate) fn add_exist_rec(&mut self, f: Ref, cube: Ref) -> Step<Ref> {
        if f == self.add_zero || cube == self.one {
            return Ok(f);
        }

        let topf = self.level_of_ref(f);
        let topc = self.level_of_ref(cube);
        if topf > topc {
            // F does not depend on the top cube variable: sum of two equal
            // halves.
            let half = self.add_exist_rec(f, self.high(cube))?;
            self.ref_node(half);
            let r = self.add_apply_rec(AddOp::Plus, half, half);
            let r = self.keep(r, &[half])?;
            self.deref_node(half);
            self.deref_plain(r);
            return Ok(r);
        }

        if let Some(r) = self.cache_lookup(CacheOp::AddExists, f, cube, Ref::INVALID) {
            return Ok(r);
        }

        let index = self.nodes[f.id()].index;
        let (f1, f0) = (self.high(f), self.low(f));
        let r = if topf == topc {
            let rest = self.high(cube);
            let t = self.add_exist_rec(f1, rest)?;
            self.ref_node(t);
            let e = self.add_exist_rec(f0, rest);
            let e = self.keep(e, &[t])?;
            let r = self.add_apply_rec(AddOp::Plus, t, e);
            let r = self.keep(r, &[t, e])?;
            self.deref_node(t);
            self.deref_node(e);
            self.deref_plain(r);
            r
        } else {
            let t = self.add_exist_rec(f1, cube)?;
            self.ref_node(t);
            let e = self.add_exist_rec(f0, cube);
            let e = self.keep(e, &[t])?;
            self.join_add(index, t, e)?
        };

        self.cache.insert(CacheOp::AddExists, f, cube, Ref::INVALID, r);
        Ok(r)
    }
}

impl Manager {
    /// Sums over client variables one at a time, `f + f[x := ¬x]`, for
    /// diagrams under a linear transform.
    fn client_add_exist_rec(&mut self, f: Ref, vars: &[Var]) -> Step<Ref> {
        let mut acc = f;
        self.ref_node(acc);
        for &v in vars {
            let s = self.flip_var_rec(acc, v, true);
            let s = self.keep(s, &[acc])?;
            let r = self.add_apply_rec(AddOp::Plus, acc, s);
            let r = self.keep(r, &[acc, s])?;
            self.deref_node(acc);
            self.deref_node(s);
            acc = r;
        }
        self.deref_plain(acc);
        Ok(acc)
    }
}

/// Public ADD operations.
impl Manager {
    /// Applies `op` pointwise.
    ///
    /// ```
    /// use dd_rs::add::AddOp;
    /// use dd_rs::manager::Manager;
    ///
    /// let mut mgr = Manager::new(2);
    /// let x = mgr.bdd_to_add(mgr.var(0)).unwrap();
    /// let three = mgr.constant(3.0).unwrap();
    /// let f = mgr.add_apply(AddOp::Times, x, three).unwrap();
    /// assert_eq!(mgr.add_eval(f, &[true, false]), 3.0);
    /// assert_eq!(mgr.add_eval(f, &[false, false]), 0.0);
    /// ```
    pub fn add_apply(&mut self, op: AddOp, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.add_apply_rec(op, f, g))
    }

    /// `f ? g : h` for a 0-1 ADD `f`.
    pub fn add_ite(&mut self, f: Ref, g: Ref, h: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.add_ite_rec(f, g, h))
    }

    pub fn add_negate(&mut self, f: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.add_negate_rec(f))
    }

    /// 0-1 ADD of a BDD.
    pub fn bdd_to_add(&mut self, f: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.bdd_to_add_rec(f))
    }

    /// BDD of the points where `f >= value`.
    pub fn add_bdd_threshold(&mut self, f: Ref, value: f64) -> Result<Ref> {
        let threshold = self.constant(value)?;
        let r = self.run(|mgr| mgr.add_to_bdd_rec(f, Some(threshold)));
        self.release(threshold);
        r
    }

    /// BDD of the points where `f` is non-zero.
    pub fn add_bdd_pattern(&mut self, f: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.add_to_bdd_rec(f, None))
    }

    /// Sums `f` over every assignment of the variables of a positive cube.
    pub fn add_exist_abstract(&mut self, f: Ref, cube: Ref) -> Result<Ref> {
        let vars = self.positive_cube_vars(cube)?;
        self.run(|mgr| {
            if mgr.linear_active() {
                mgr.client_add_exist_rec(f, &vars)
            } else {
                mgr.add_exist_rec(f, cube)
            }
        })
    }

    /// Value of the ADD `f` under `assignment`, indexed by variable.
    pub fn add_eval(&self, f: Ref, assignment: &[bool]) -> f64 {
        let values = self.effective_assignment(assignment);
        let mut cur = f;
        loop {
            if let Some(value) = self.constant_value(cur) {
                return value;
            }
            let index = self.nodes[cur.id()].index as usize;
            cur = if values[index] { self.high(cur) } else { self.low(cur) };
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::DdError;

    fn assignments(n: usize) -> impl Iterator<Item = Vec<bool>> {
        (0..1u32 << n).map(move |bits| (0..n).map(|i| bits >> i & 1 == 1).collect())
    }

    #[test]
    fn test_apply_pointwise() {
        let mut mgr = Manager::new(3);
        let a = mgr.bdd_to_add(mgr.var(0)).unwrap();
        let b = mgr.bdd_to_add(mgr.var(1)).unwrap();
        let two = mgr.constant(2.0).unwrap();
        let five = mgr.constant(5.0).unwrap();
        let fa = mgr.add_ite(a, two, five).unwrap();
        let fb = mgr.add_ite(b, five, mgr.add_zero()).unwrap();

        for op in [
            AddOp::Plus,
            AddOp::Times,
            AddOp::Minus,
            AddOp::Minimum,
            AddOp::Maximum,
            AddOp::Agreement,
        ] {
            let r = mgr.add_apply(op, fa, fb).unwrap();
            for x in assignments(3) {
                let (va, vb) = (mgr.add_eval(fa, &x), mgr.add_eval(fb, &x));
                assert_eq!(mgr.add_eval(r, &x), op.combine(va, vb), "{:?} at {:?}", op, x);
            }
            mgr.release(r);
        }

        let q = mgr.add_apply(AddOp::Divide, fb, fa).unwrap();
        assert_eq!(mgr.add_eval(q, &[false, true, false]), 1.0);
        assert_eq!(mgr.add_eval(q, &[true, true, false]), 2.5);
    }

    #[test]
    fn test_zero_one_add_logic() {
        let mut mgr = Manager::new(2);
        let (x, y) = (mgr.var(0), mgr.var(1));
        let ax = mgr.bdd_to_add(x).unwrap();
        let ay = mgr.bdd_to_add(y).unwrap();
        let or = mgr.add_apply(AddOp::Or, ax, ay).unwrap();
        let and = mgr.add_apply(AddOp::And, ax, ay).unwrap();

        let bor = mgr.or(x, y).unwrap();
        let band = mgr.and(x, y).unwrap();
        assert_eq!(mgr.add_bdd_pattern(or).unwrap(), bor);
        assert_eq!(mgr.add_bdd_pattern(and).unwrap(), band);
        assert_eq!(mgr.bdd_to_add(bor).unwrap(), or);

        let not_x = mgr.bdd_to_add(-x).unwrap();
        assert_eq!(mgr.add_eval(not_x, &[false, false]), 1.0);
        assert_eq!(mgr.add_eval(not_x, &[true, false]), 0.0);
    }

    #[test]
    fn test_threshold_and_negate() {
        let mut mgr = Manager::new(2);
        let a = mgr.bdd_to_add(mgr.var(0)).unwrap();
        let seven = mgr.constant(7.0).unwrap();
        let one = mgr.one();
        let f = mgr.add_ite(a, seven, one).unwrap();
        let t = mgr.add_bdd_threshold(f, 5.0).unwrap();
        assert_eq!(t, mgr.var(0));
        let all = mgr.add_bdd_threshold(f, 1.0).unwrap();
        assert_eq!(all, mgr.one());

        let n = mgr.add_negate(f).unwrap();
        assert_eq!(mgr.add_eval(n, &[true, false]), -7.0);
        assert_eq!(mgr.add_eval(n, &[false, false]), -1.0);
    }

    #[test]
    fn test_exist_sums() {
        let mut mgr = Manager::new(3);
        let a = mgr.bdd_to_add(mgr.var(0)).unwrap();
        let three = mgr.constant(3.0).unwrap();
        let f = mgr.add_ite(a, three, mgr.one()).unwrap();

        let c0 = mgr.cube(&[Var::new(0)]).unwrap();
        let s = mgr.add_exist_abstract(f, c0).unwrap();
        assert_eq!(mgr.constant_value(s), Some(4.0));

        // Summing over a variable outside the support doubles.
        let c2 = mgr.cube(&[Var::new(2)]).unwrap();
        let d = mgr.add_exist_abstract(f, c2).unwrap();
        assert_eq!(mgr.add_eval(d, &[true, false, false]), 6.0);
        assert_eq!(mgr.add_eval(d, &[false, false, false]), 2.0);

        let not_cube = mgr.nvar(1);
        assert!(matches!(mgr.add_exist_abstract(f, not_cube), Err(DdError::InvalidArgument(_))));
    }

    #[test]
    fn test_undefined_results_share_one_terminal() {
        let mut mgr = Manager::new(1);
        let (pos, neg) = (mgr.plus_infinity(), mgr.minus_infinity());
        let a = mgr.add_apply(AddOp::Plus, pos, neg).unwrap();
        let b = mgr.add_apply(AddOp::Divide, pos, pos).unwrap();
        assert!(mgr.constant_value(a).is_some_and(f64::is_nan));
        assert_eq!(a, b);

        let x = mgr.bdd_to_add(mgr.var(0)).unwrap();
        let p = mgr.add_ite(x, a, pos).unwrap();
        let q = mgr.add_ite(x, b, pos).unwrap();
        assert_eq!(p, q);
        assert!(mgr.add_eval(p, &[true]).is_nan());
        for r in [a, b, x, p, q] {
            mgr.release(r);
        }
        assert!(mgr.debug_check().is_ok());
    }
}
