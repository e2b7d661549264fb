//! Boolean operations on BDDs with complemented edges.
//!
//! Every operation has a recursive core (`*_rec`) working on the manager's
//! shared state and following the reference protocol of [`crate::unique`],
//! and a public wrapper that runs it through [`Manager::run`], restarting it
//! when an automatic reordering interrupted the recursion.
//!
//! Recursion depth is bounded by the number of variables. Whole-diagram
//! walks (support, sizes, evaluation) use explicit stacks instead.
//!
//! Variables named by the caller, in cubes, abstractions, cofactors and
//! compositions, are client variables. Once linear sifting has mixed them,
//! a client variable is no longer a single level: those operations then
//! flip every diagram variable whose row contains it. Structural queries
//! ([`Manager::top_var`], [`Manager::support`], [`Manager::is_cube`], the
//! sizes) describe the diagram as stored.

use crate::bitset::BitSet;
use crate::cache::CacheOp;
use crate::error::{DdError, Result, Step};
use crate::manager::Manager;
use crate::reference::Ref;
use crate::types::Var;

impl Manager {
    /// Cofactors of `f` with respect to the variable at `level`.
    #[inline]
    pub(crate) fn branches(&self, f: Ref, level: usize) -> (Ref, Ref) {
        if self.level_of_ref(f) == level {
            (self.high(f), self.low(f))
        } else {
            (f, f)
        }
    }

    /// Recursive step of [`Manager::ite`].
    pub(crate) fn ite_rec(&mut self, f: Ref, g: Ref, h: Ref) -> Step<Ref> {
        let one = self.one;
        let zero = -one;

        // Terminal cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if f == one {
            return Ok(g);
        }
        if f == zero {
            return Ok(h);
        }

        // From now on, F is known not to be a constant.
        //   ite(F,1,H) == ite(F,F,H) => F ∨ H
        //   ite(F,0,H) == ite(F,~F,H) => ~F ∧ H
        if g == one || f == g {
            if h == zero || f == h {
                return Ok(f);
            }
            return Ok(-self.and_rec(-f, -h)?);
        } else if g == zero || f == -g {
            if h == one || f == -h {
                return Ok(-f);
            }
            return self.and_rec(-f, h);
        }

        //   ite(F,G,0) == ite(F,G,F) => F ∧ G
        //   ite(F,G,1) == ite(F,G,~F) => ~F ∨ G
        if h == zero || f == h {
            return self.and_rec(f, g);
        } else if h == one || f == -h {
            return Ok(-self.and_rec(f, -g)?);
        }

        //   ite(F,G,G) => G
        //   ite(F,G,~G) => F ≡ G
        if g == h {
            return Ok(g);
        } else if g == -h {
            return self.xor_rec(f, h);
        }

        // No constants are left. Make the first two operands regular:
        //   ite(~F,G,H) => ite(F,H,G)
        //   ite(F,~G,H) => ~ite(F,G,~H)
        let (mut f, mut g, mut h) = (f, g, h);
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }
        let negate = g.is_negated();
        if negate {
            g = -g;
            h = -h;
        }

        let topf = self.level_of_ref(f);
        let v = self.level_of_ref(g).min(self.level_of_ref(h));

        // ite(F,G,H) => (x,G,H) if F is the literal x and x sits above G and H.
        let node = self.nodes[f.id()];
        if topf < v && node.high == one && node.low == zero {
            return Ok(self.unique_inter(node.index, g, h)?.negate_if(negate));
        }

        if let Some(r) = self.cache_lookup(CacheOp::Ite, f, g, h) {
            return Ok(r.negate_if(negate));
        }

        let top = topf.min(v);
        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);
        let (h1, h0) = self.branches(h, top);

        let t = self.ite_rec(f1, g1, h1)?;
        self.ref_node(t);
        let e = self.ite_rec(f0, g0, h0);
        let e = self.keep(e, &[t])?;
        let r = self.join(index, t, e)?;

        self.cache.insert(CacheOp::Ite, f, g, h, r);
        Ok(r.negate_if(negate))
    }

    /// Recursive step of [`Manager::and`].
    pub(crate) fn and_rec(&mut self, f: Ref, g: Ref) -> Step<Ref> {
        let one = self.one;

        // Terminal cases:
        //   F ∧ F => F, F ∧ ~F => 0
        //   1 ∧ G => G, 0 ∧ G => 0
        if f.regular() == g.regular() {
            return Ok(if f == g { f } else { -one });
        }
        if f.regular() == one {
            return Ok(if f == one { g } else { f });
        }
        if g.regular() == one {
            return Ok(if g == one { f } else { g });
        }

        let (f, g) = if f > g { (g, f) } else { (f, g) };
        if let Some(r) = self.cache_lookup(CacheOp::And, f, g, Ref::INVALID) {
            return Ok(r);
        }

        let top = self.level_of_ref(f).min(self.level_of_ref(g));
        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);

        let t = self.and_rec(f1, g1)?;
        self.ref_node(t);
        let e = self.and_rec(f0, g0);
        let e = self.keep(e, &[t])?;
        let r = self.join(index, t, e)?;

        self.cache.insert(CacheOp::And, f, g, Ref::INVALID, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::xor`].
    pub(crate) fn xor_rec(&mut self, f: Ref, g: Ref) -> Step<Ref> {
        let one = self.one;

        // Terminal cases:
        //   F ⊕ F => 0, F ⊕ ~F => 1
        //   F ⊕ 0 => F, F ⊕ 1 => ~F
        if f == g {
            return Ok(-one);
        }
        if f == -g {
            return Ok(one);
        }
        let (mut f, mut g) = if f > g { (g, f) } else { (f, g) };
        if g == -one {
            return Ok(f);
        }
        if g == one {
            return Ok(-f);
        }
        // ~F ⊕ G => F ⊕ ~G
        if f.is_negated() {
            f = -f;
            g = -g;
        }
        if f == one {
            return Ok(-g);
        }

        if let Some(r) = self.cache_lookup(CacheOp::Xor, f, g, Ref::INVALID) {
            return Ok(r);
        }

        let top = self.level_of_ref(f).min(self.level_of_ref(g));
        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);

        let t = self.xor_rec(f1, g1)?;
        self.ref_node(t);
        let e = self.xor_rec(f0, g0);
        let e = self.keep(e, &[t])?;
        let r = self.join(index, t, e)?;

        self.cache.insert(CacheOp::Xor, f, g, Ref::INVALID, r);
        Ok(r)
    }

    /// `t ∨ e` for two held operands. Both holds are consumed.
    fn or_consume(&mut self, t: Ref, e: Ref) -> Step<Ref> {
        let r = self.and_rec(-t, -e);
        let r = self.keep(r, &[t, e])?;
        self.deref_node(t);
        self.deref_node(e);
        self.deref_plain(r);
        Ok(-r)
    }

    /// Recursive step of [`Manager::exist_abstract`]; `cube` is a positive
    /// cube.
    pub(crate) fn exist_rec(&mut self, f: Ref, cube: Ref) -> Step<Ref> {
        let one = self.one;
        if cube == one || f.regular() == one {
            return Ok(f);
        }

        // Skip cube variables above the top of F.
        let topf = self.level_of_ref(f);
        let mut cube = cube;
        while topf > self.level_of_ref(cube) {
            cube = self.high(cube);
            if cube == one {
                return Ok(f);
            }
        }

        if let Some(r) = self.cache_lookup(CacheOp::Exists, f, cube, Ref::INVALID) {
            return Ok(r);
        }

        let (f1, f0) = (self.high(f), self.low(f));
        let r = if topf == self.level_of_ref(cube) {
            let rest = self.high(cube);
            let t = self.exist_rec(f1, rest)?;
            if t == one {
                self.cache.insert(CacheOp::Exists, f, cube, Ref::INVALID, one);
                return Ok(one);
            }
            self.ref_node(t);
            let e = self.exist_rec(f0, rest);
            let e = self.keep(e, &[t])?;
            self.or_consume(t, e)?
        } else {
            let index = self.nodes[f.id()].index;
            let t = self.exist_rec(f1, cube)?;
            self.ref_node(t);
            let e = self.exist_rec(f0, cube);
            let e = self.keep(e, &[t])?;
            self.join(index, t, e)?
        };

        self.cache.insert(CacheOp::Exists, f, cube, Ref::INVALID, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::and_abstract`]: `∃cube. f ∧ g`.
    pub(crate) fn and_exists_rec(&mut self, f: Ref, g: Ref, cube: Ref) -> Step<Ref> {
        let one = self.one;
        let zero = -one;

        // Terminal cases.
        if f == zero || g == zero || f == -g {
            return Ok(zero);
        }
        if f == one && g == one {
            return Ok(one);
        }
        if cube == one {
            return self.and_rec(f, g);
        }
        if f == one || f == g {
            return self.exist_rec(g, cube);
        }
        if g == one {
            return self.exist_rec(f, cube);
        }

        let (f, g) = if f > g { (g, f) } else { (f, g) };
        let topf = self.level_of_ref(f);
        let topg = self.level_of_ref(g);
        let top = topf.min(topg);

        let mut cube = cube;
        while self.level_of_ref(cube) < top {
            cube = self.high(cube);
            if cube == one {
                return self.and_rec(f, g);
            }
        }

        if let Some(r) = self.cache_lookup(CacheOp::AndExists, f, g, cube) {
            return Ok(r);
        }

        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);

        let r = if self.level_of_ref(cube) == top {
            let rest = self.high(cube);
            let t = self.and_exists_rec(f1, g1, rest)?;
            // 1 ∨ anything == 1, and t ∨ (t ∧ anything) == t; t == f0 means
            // f0 does not depend on the rest of the cube.
            if t == one || t == f0 || t == g0 {
                self.cache.insert(CacheOp::AndExists, f, g, cube, t);
                return Ok(t);
            }
            self.ref_node(t);
            // t ∨ (~t ∧ anything) == t ∨ anything
            let e = if t == -f0 {
                self.exist_rec(g0, rest)
            } else if t == -g0 {
                self.exist_rec(f0, rest)
            } else {
                self.and_exists_rec(f0, g0, rest)
            };
            let e = self.keep(e, &[t])?;
            if t == e {
                self.deref_plain(e);
                self.deref_plain(t);
                t
            } else {
                self.or_consume(t, e)?
            }
        } else {
            let t = self.and_exists_rec(f1, g1, cube)?;
            self.ref_node(t);
            let e = self.and_exists_rec(f0, g0, cube);
            let e = self.keep(e, &[t])?;
            self.join(index, t, e)?
        };

        self.cache.insert(CacheOp::AndExists, f, g, cube, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::xor_exist_abstract`]: `∃cube. f ⊕ g`.
    pub(crate) fn xor_exists_rec(&mut self, f: Ref, g: Ref, cube: Ref) -> Step<Ref> {
        let one = self.one;
        let zero = -one;

        if f == g {
            return Ok(zero);
        }
        if f == -g {
            return Ok(one);
        }
        if cube == one {
            return self.xor_rec(f, g);
        }
        if f == one {
            return self.exist_rec(-g, cube);
        }
        if g == one {
            return self.exist_rec(-f, cube);
        }
        if f == zero {
            return self.exist_rec(g, cube);
        }
        if g == zero {
            return self.exist_rec(f, cube);
        }

        let (f, g) = if f > g { (g, f) } else { (f, g) };
        let top = self.level_of_ref(f).min(self.level_of_ref(g));

        let mut cube = cube;
        while self.level_of_ref(cube) < top {
            cube = self.high(cube);
            if cube == one {
                return self.xor_rec(f, g);
            }
        }

        if let Some(r) = self.cache_lookup(CacheOp::XorExists, f, g, cube) {
            return Ok(r);
        }

        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);

        let r = if self.level_of_ref(cube) == top {
            let rest = self.high(cube);
            let t = self.xor_exists_rec(f1, g1, rest)?;
            if t == one {
                self.cache.insert(CacheOp::XorExists, f, g, cube, t);
                return Ok(t);
            }
            self.ref_node(t);
            let e = self.xor_exists_rec(f0, g0, rest);
            let e = self.keep(e, &[t])?;
            self.or_consume(t, e)?
        } else {
            let t = self.xor_exists_rec(f1, g1, cube)?;
            self.ref_node(t);
            let e = self.xor_exists_rec(f0, g0, cube);
            let e = self.keep(e, &[t])?;
            self.join(index, t, e)?
        };

        self.cache.insert(CacheOp::XorExists, f, g, cube, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::boolean_diff`].
    pub(crate) fn boolean_diff_rec(&mut self, f: Ref, index: u32) -> Step<Ref> {
        // The difference of F and of ~F is the same.
        let f = f.regular();
        if self.level_of_ref(f) > self.perm[index as usize] {
            return Ok(-self.one);
        }
        let node = self.nodes[f.id()];
        if node.index == index {
            return self.xor_rec(node.high, node.low);
        }

        let var = self.vars[index as usize];
        if let Some(r) = self.cache_lookup(CacheOp::BooleanDiff, f, var, Ref::INVALID) {
            return Ok(r);
        }

        let t = self.boolean_diff_rec(node.high, index)?;
        self.ref_node(t);
        let e = self.boolean_diff_rec(node.low, index);
        let e = self.keep(e, &[t])?;
        let r = self.join(node.index, t, e)?;

        self.cache.insert(CacheOp::BooleanDiff, f, var, Ref::INVALID, r);
        Ok(r)
    }

    fn var_dependent_rec(&mut self, f: Ref, index: u32) -> bool {
        let level = self.perm[index as usize];
        let topf = self.level_of_ref(f);
        if topf > level {
            return false;
        }

        let var = self.vars[index as usize];
        if let Some(r) = self.cache_lookup(CacheOp::VarDependent, f, var, Ref::INVALID) {
            return r == self.one;
        }

        let (f1, f0) = (self.high(f), self.low(f));
        let dependent = if topf == level {
            self.leq_rec(f1, -f0)
        } else {
            self.var_dependent_rec(f1, index) && self.var_dependent_rec(f0, index)
        };

        let answer = self.one.negate_if(!dependent);
        self.cache.insert(CacheOp::VarDependent, f, var, Ref::INVALID, answer);
        dependent
    }

    /// Recursive step of [`Manager::leq`]. Never creates nodes.
    pub(crate) fn leq_rec(&mut self, f: Ref, g: Ref) -> bool {
        if f == g {
            return true;
        }
        let (f, g) = if g.is_negated() {
            // F(1,..,1) = 1 > 0 = G(1,..,1) when only G is complemented.
            if !f.is_negated() {
                return false;
            }
            // F ≤ G <=> ~G ≤ ~F
            (-g, -f)
        } else if f.is_negated() && g < f {
            (-g, -f)
        } else {
            (f, g)
        };

        // G is regular now.
        let one = self.one;
        if g == one {
            return true;
        }
        if f == one {
            return false;
        }
        if -f == g {
            return false;
        }
        if f == -one {
            return true;
        }

        if let Some(r) = self.cache_lookup(CacheOp::Leq, f, g, Ref::INVALID) {
            return r == one;
        }

        let top = self.level_of_ref(f).min(self.level_of_ref(g));
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);

        // Negative cofactors first: they are where F(1..1) > G(1..1) can show.
        let result = self.leq_rec(f0, g0) && self.leq_rec(f1, g1);
        self.cache.insert(CacheOp::Leq, f, g, Ref::INVALID, one.negate_if(!result));
        result
    }

    /// Recursive step of [`Manager::constrain`].
    pub(crate) fn constrain_rec(&mut self, f: Ref, c: Ref) -> Step<Ref> {
        let one = self.one;
        let zero = -one;

        if c == one {
            return Ok(f);
        }
        if c == zero {
            return Ok(zero);
        }
        if self.nodes[f.id()].is_terminal() {
            return Ok(f);
        }
        if f == c {
            return Ok(one);
        }
        if f == -c {
            return Ok(zero);
        }

        let negate = f.is_negated();
        let f = f.regular();
        if let Some(r) = self.cache_lookup(CacheOp::Constrain, f, c, Ref::INVALID) {
            return Ok(r.negate_if(negate));
        }

        let topf = self.level_of_ref(f);
        let topc = self.level_of_ref(c);
        let top = topf.min(topc);
        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (c1, c0) = self.branches(c, top);

        let t = if !self.is_constant(c1) {
            self.constrain_rec(f1, c1)?
        } else if c1 == one {
            f1
        } else {
            // C1 is zero: the result is F0 constrained by C0.
            let r = if c0 == one { f0 } else { self.constrain_rec(f0, c0)? };
            self.cache.insert(CacheOp::Constrain, f, c, Ref::INVALID, r);
            return Ok(r.negate_if(negate));
        };
        self.ref_node(t);

        let e = if !self.is_constant(c0) {
            self.constrain_rec(f0, c0)
        } else if c0 == one {
            Ok(f0)
        } else {
            // C0 is zero: the result is the then-branch computed above.
            self.deref_plain(t);
            self.cache.insert(CacheOp::Constrain, f, c, Ref::INVALID, t);
            return Ok(t.negate_if(negate));
        };
        let e = self.keep(e, &[t])?;
        let r = self.join(index, t, e)?;

        self.cache.insert(CacheOp::Constrain, f, c, Ref::INVALID, r);
        Ok(r.negate_if(negate))
    }

    /// Recursive step of [`Manager::compose`]: substitutes `g` for the
    /// variable whose projection is `var`.
    pub(crate) fn compose_rec(&mut self, f: Ref, g: Ref, var: Ref) -> Step<Ref> {
        let v = self.level_of_ref(var);
        let topf = self.level_of_ref(f);
        if topf > v {
            return Ok(f);
        }

        let negate = f.is_negated();
        let f = f.regular();
        if let Some(r) = self.cache_lookup(CacheOp::Compose, f, g, var) {
            return Ok(r.negate_if(negate));
        }

        let r = if topf == v {
            let (f1, f0) = (self.high(f), self.low(f));
            self.ite_rec(g, f1, f0)?
        } else {
            let top = topf.min(self.level_of_ref(g));
            let index = self.invperm[top];
            let (f1, f0) = self.branches(f, top);
            let (g1, g0) = self.branches(g, top);

            let t = self.compose_rec(f1, g1, var)?;
            self.ref_node(t);
            let e = self.compose_rec(f0, g0, var);
            let e = self.keep(e, &[t])?;
            self.join(index as u32, t, e)?
        };

        self.cache.insert(CacheOp::Compose, f, g, var, r);
        Ok(r.negate_if(negate))
    }

    /// Recursive step of [`Manager::intersect`].
    pub(crate) fn intersect_rec(&mut self, f: Ref, g: Ref) -> Step<Ref> {
        let one = self.one;
        let zero = -one;

        if f == zero || g == zero || f == -g {
            return Ok(zero);
        }
        if f == g || g == one {
            return Ok(f);
        }
        if f == one {
            return Ok(g);
        }

        let (f, g) = if f > g { (g, f) } else { (f, g) };
        if let Some(r) = self.cache_lookup(CacheOp::Intersect, f, g, Ref::INVALID) {
            return Ok(r);
        }

        let top = self.level_of_ref(f).min(self.level_of_ref(g));
        let index = self.invperm[top] as u32;
        let (f1, f0) = self.branches(f, top);
        let (g1, g0) = self.branches(g, top);

        let t = self.intersect_rec(f1, g1)?;
        self.ref_node(t);
        // One witness is enough.
        let e = if t != zero { Ok(zero) } else { self.intersect_rec(f0, g0) };
        let e = self.keep(e, &[t])?;
        let r = self.join(index, t, e)?;

        self.cache.insert(CacheOp::Intersect, f, g, Ref::INVALID, r);
        Ok(r)
    }

    /// Recursive step of [`Manager::cofactor`]; `cube` is a non-zero cube.
    pub(crate) fn cofactor_rec(&mut self, f: Ref, cube: Ref) -> Step<Ref> {
        let one = self.one;
        if self.is_constant(f) || cube == one {
            return Ok(f);
        }

        let negate = f.is_negated();
        let f = f.regular();
        if let Some(r) = self.cache_lookup(CacheOp::Cofactor, f, cube, Ref::INVALID) {
            return Ok(r.negate_if(negate));
        }

        let topf = self.level_of_ref(f);
        let topc = self.level_of_ref(cube);
        let (f1, f0) = if topf <= topc { (self.high(f), self.low(f)) } else { (f, f) };

        let r = if topf >= topc {
            let (c1, c0) = (self.high(cube), self.low(cube));
            if c0 == -one {
                self.cofactor_rec(f1, c1)?
            } else {
                self.cofactor_rec(f0, c0)?
            }
        } else {
            let index = self.nodes[f.id()].index;
            let t = self.cofactor_rec(f1, cube)?;
            self.ref_node(t);
            let e = self.cofactor_rec(f0, cube);
            let e = self.keep(e, &[t])?;
            self.join(index, t, e)?
        };

        self.cache.insert(CacheOp::Cofactor, f, cube, Ref::INVALID, r);
        Ok(r.negate_if(negate))
    }

    /// Builds the conjunction of literals, from the bottom level up.
    fn cube_rec(&mut self, literals: &[(Var, bool)]) -> Step<Ref> {
        let mut sorted: Vec<(Var, bool)> = literals.to_vec();
        sorted.sort_by_key(|&(v, _)| std::cmp::Reverse(self.perm[v.index()]));

        let zero = -self.one;
        let linear = self.linear_active();
        let mut acc = self.one;
        self.ref_node(acc);
        for (v, positive) in sorted {
            let r = if linear {
                let literal = self.vars[v.index()].negate_if(!positive);
                self.and_rec(acc, literal)
            } else {
                let (high, low) = if positive { (acc, zero) } else { (zero, acc) };
                self.make_node(v.id(), high, low)
            };
            let r = self.keep(r, &[acc])?;
            self.deref_node(acc);
            acc = r;
        }
        self.deref_plain(acc);
        Ok(acc)
    }

    /// `f` with every variable of the positive diagram cube `cube`
    /// complemented. `add` selects ADD node construction.
    pub(crate) fn flip_rec(&mut self, f: Ref, cube: Ref, add: bool) -> Step<Ref> {
        let one = self.one;
        if self.is_constant(f) || cube == one {
            return Ok(f);
        }

        let topf = self.level_of_ref(f);
        let mut cube = cube;
        while topf > self.level_of_ref(cube) {
            cube = self.high(cube);
            if cube == one {
                return Ok(f);
            }
        }

        // Flipping commutes with complementation.
        let negate = !add && f.is_negated();
        let f = if add { f } else { f.regular() };
        let op = if add { CacheOp::AddFlip } else { CacheOp::Flip };
        if let Some(r) = self.cache_lookup(op, f, cube, Ref::INVALID) {
            return Ok(r.negate_if(negate));
        }

        let index = self.nodes[f.id()].index;
        let (f1, f0) = (self.high(f), self.low(f));
        let (f1, f0, rest) = if topf == self.level_of_ref(cube) {
            (f0, f1, self.high(cube))
        } else {
            (f1, f0, cube)
        };
        let t = self.flip_rec(f1, rest, add)?;
        self.ref_node(t);
        let e = self.flip_rec(f0, rest, add);
        let e = self.keep(e, &[t])?;
        let r = if add { self.join_add(index, t, e)? } else { self.join(index, t, e)? };

        self.cache.insert(op, f, cube, Ref::INVALID, r);
        Ok(r.negate_if(negate))
    }

    /// `f` with client variable `var` complemented. Under a linear
    /// transform this flips every diagram variable whose row contains it.
    pub(crate) fn flip_var_rec(&mut self, f: Ref, var: Var, add: bool) -> Step<Ref> {
        let zero = -self.one;
        let mut cube = self.one;
        let mut column = self.linear_column(var.index());
        column.sort_by_key(|v| std::cmp::Reverse(self.perm[v.index()]));
        for v in column {
            // Builds on the diagram variable itself, whatever the transform.
            let r = self.make_node(v.id(), cube, zero);
            let r = self.keep(r, &[cube])?;
            self.deref_node(cube);
            cube = r;
        }
        let r = self.flip_rec(f, cube, add);
        let r = self.keep(r, &[cube])?;
        self.deref_node(cube);
        self.deref_plain(r);
        Ok(r)
    }

    /// Quantifies client variables one at a time: `∃x. f = f ∨ f[x := ¬x]`.
    fn client_exist_rec(&mut self, f: Ref, vars: &[Var]) -> Step<Ref> {
        let mut acc = f;
        self.ref_node(acc);
        for &v in vars {
            let s = self.flip_var_rec(acc, v, false);
            let s = self.keep(s, &[acc])?;
            let r = self.and_rec(-acc, -s).map(|r| -r);
            let r = self.keep(r, &[acc, s])?;
            self.deref_node(acc);
            self.deref_node(s);
            acc = r;
        }
        self.deref_plain(acc);
        Ok(acc)
    }

    /// Restricts `f` by client literals: `f|x=b = (x ⊕ b) ? f[x := ¬x] : f`.
    fn client_cofactor_rec(&mut self, f: Ref, literals: &[(Var, bool)]) -> Step<Ref> {
        let mut acc = f;
        self.ref_node(acc);
        for &(v, positive) in literals {
            let s = self.flip_var_rec(acc, v, false);
            let s = self.keep(s, &[acc])?;
            let differs = self.vars[v.index()].negate_if(positive);
            let r = self.ite_rec(differs, s, acc);
            let r = self.keep(r, &[acc, s])?;
            self.deref_node(acc);
            self.deref_node(s);
            acc = r;
        }
        self.deref_plain(acc);
        Ok(acc)
    }

    /// Substitutes `g` for client variable `var`: wherever `g` differs
    /// from the variable, `f` is read with the variable flipped.
    fn client_compose_rec(&mut self, f: Ref, g: Ref, var: Var) -> Step<Ref> {
        let differs = self.xor_rec(self.vars[var.index()], g)?;
        self.ref_node(differs);
        let s = self.flip_var_rec(f, var, false);
        let s = self.keep(s, &[differs])?;
        let r = self.ite_rec(differs, s, f);
        let r = self.keep(r, &[differs, s])?;
        self.deref_node(differs);
        self.deref_node(s);
        self.deref_plain(r);
        Ok(r)
    }

    /// `f ⊕ f[var := ¬var]`.
    fn client_diff_rec(&mut self, f: Ref, var: Var) -> Step<Ref> {
        let s = self.flip_var_rec(f, var, false)?;
        self.ref_node(s);
        let r = self.xor_rec(f, s);
        let r = self.keep(r, &[s])?;
        self.deref_node(s);
        self.deref_plain(r);
        Ok(r)
    }

    /// Literals of a cube, as client variables.
    ///
    /// Without a transform the cube is read off its nodes. Under one, each
    /// variable is tested against the cube and the conjunction of the
    /// found literals must give the cube back.
    pub(crate) fn cube_literals(&mut self, cube: Ref) -> Result<Vec<(Var, bool)>> {
        self.check_ref(cube)?;
        let one = self.one;
        let zero = -one;
        if cube == zero {
            return Err(DdError::invalid("zero is not a cube"));
        }
        if !self.linear_active() {
            if !self.is_cube(cube) {
                return Err(DdError::invalid(format!("{} is not a cube", cube)));
            }
            let mut literals = Vec::new();
            let mut cur = cube;
            while cur != one {
                let index = self.nodes[cur.id()].index;
                let (t, e) = (self.high(cur), self.low(cur));
                if e == zero {
                    literals.push((Var::new(index), true));
                    cur = t;
                } else {
                    literals.push((Var::new(index), false));
                    cur = e;
                }
            }
            return Ok(literals);
        }

        let mut literals = Vec::new();
        for v in 0..self.vars.len() {
            let x = self.vars[v];
            if self.leq_rec(cube, x) {
                literals.push((Var::new(v as u32), true));
            } else if self.leq_rec(cube, -x) {
                literals.push((Var::new(v as u32), false));
            }
        }
        let rebuilt = self.literal_cube(&literals)?;
        self.release(rebuilt);
        if rebuilt != cube {
            return Err(DdError::invalid(format!("{} is not a cube", cube)));
        }
        Ok(literals)
    }

    /// Variables of a cube of positive literals.
    pub(crate) fn positive_cube_vars(&mut self, cube: Ref) -> Result<Vec<Var>> {
        let literals = self.cube_literals(cube)?;
        if literals.iter().any(|&(_, positive)| !positive) {
            return Err(DdError::invalid(format!("{} is not a cube of positive literals", cube)));
        }
        Ok(literals.into_iter().map(|(v, _)| v).collect())
    }
}

/// Public Boolean operations.
impl Manager {
    /// Complement of `f`, held once like every other result.
    pub fn not(&mut self, f: Ref) -> Ref {
        self.ref_node(f);
        -f
    }

    /// If-then-else: `(f ∧ g) ∨ (¬f ∧ h)`.
    ///
    /// ```
    /// use dd_rs::manager::Manager;
    ///
    /// let mut mgr = Manager::new(3);
    /// let (x, y, z) = (mgr.var(0), mgr.var(1), mgr.var(2));
    /// let f = mgr.ite(x, y, z).unwrap();
    /// assert!(mgr.eval(f, &[true, true, false]));
    /// assert!(!mgr.eval(f, &[false, true, false]));
    /// mgr.release(f);
    /// ```
    pub fn ite(&mut self, f: Ref, g: Ref, h: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.ite_rec(f, g, h))
    }

    pub fn and(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.and_rec(f, g))
    }

    pub fn or(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| Ok(-mgr.and_rec(-f, -g)?))
    }

    pub fn xor(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.xor_rec(f, g))
    }

    pub fn nand(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| Ok(-mgr.and_rec(f, g)?))
    }

    pub fn nor(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.and_rec(-f, -g))
    }

    pub fn xnor(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| Ok(-mgr.xor_rec(f, g)?))
    }

    /// `f → g`.
    pub fn implies(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| Ok(-mgr.and_rec(f, -g)?))
    }

    /// Conjunction of all operands; `one()` for none.
    pub fn and_all(&mut self, fs: impl IntoIterator<Item = Ref>) -> Result<Ref> {
        let mut acc = self.one;
        self.ref_node(acc);
        for f in fs {
            let r = self.and(acc, f);
            self.release(acc);
            acc = r?;
        }
        Ok(acc)
    }

    /// Disjunction of all operands; `zero()` for none.
    pub fn or_all(&mut self, fs: impl IntoIterator<Item = Ref>) -> Result<Ref> {
        let mut acc = self.zero();
        self.ref_node(acc);
        for f in fs {
            let r = self.or(acc, f);
            self.release(acc);
            acc = r?;
        }
        Ok(acc)
    }

    /// Existential quantification of the variables of a positive cube.
    pub fn exist_abstract(&mut self, f: Ref, cube: Ref) -> Result<Ref> {
        let vars = self.positive_cube_vars(cube)?;
        self.run(|mgr| {
            if mgr.linear_active() {
                mgr.client_exist_rec(f, &vars)
            } else {
                mgr.exist_rec(f, cube)
            }
        })
    }

    /// Universal quantification of the variables of a positive cube.
    pub fn univ_abstract(&mut self, f: Ref, cube: Ref) -> Result<Ref> {
        let vars = self.positive_cube_vars(cube)?;
        self.run(|mgr| {
            let r = if mgr.linear_active() {
                mgr.client_exist_rec(-f, &vars)?
            } else {
                mgr.exist_rec(-f, cube)?
            };
            Ok(-r)
        })
    }

    /// Relational product `∃cube. f ∧ g`, without building `f ∧ g`.
    pub fn and_abstract(&mut self, f: Ref, g: Ref, cube: Ref) -> Result<Ref> {
        let vars = self.positive_cube_vars(cube)?;
        self.run(|mgr| {
            if !mgr.linear_active() {
                return mgr.and_exists_rec(f, g, cube);
            }
            let p = mgr.and_rec(f, g)?;
            mgr.ref_node(p);
            let r = mgr.client_exist_rec(p, &vars);
            let r = mgr.keep(r, &[p])?;
            mgr.deref_node(p);
            mgr.deref_plain(r);
            Ok(r)
        })
    }

    /// `∃cube. f ⊕ g`.
    pub fn xor_exist_abstract(&mut self, f: Ref, g: Ref, cube: Ref) -> Result<Ref> {
        let vars = self.positive_cube_vars(cube)?;
        self.run(|mgr| {
            if !mgr.linear_active() {
                return mgr.xor_exists_rec(f, g, cube);
            }
            let p = mgr.xor_rec(f, g)?;
            mgr.ref_node(p);
            let r = mgr.client_exist_rec(p, &vars);
            let r = mgr.keep(r, &[p])?;
            mgr.deref_node(p);
            mgr.deref_plain(r);
            Ok(r)
        })
    }

    /// Boolean difference `f|var ⊕ f|¬var`.
    pub fn boolean_diff(&mut self, f: Ref, var: impl Into<Var>) -> Result<Ref> {
        let var = var.into();
        self.check_var(var)?;
        self.run(|mgr| {
            if mgr.linear_active() {
                mgr.client_diff_rec(f, var)
            } else {
                mgr.boolean_diff_rec(f, var.id())
            }
        })
    }

    /// Returns true if `var` is determined by the other variables of `f`,
    /// that is, if `f|var ∧ f|¬var` is unsatisfiable.
    pub fn var_is_dependent(&mut self, f: Ref, var: impl Into<Var>) -> Result<bool> {
        let var = var.into();
        self.check_var(var)?;
        if self.is_constant(f) {
            return Ok(false);
        }
        self.run_value(|mgr| {
            if !mgr.linear_active() {
                return Ok(mgr.var_dependent_rec(f, var.id()));
            }
            // f|var ∧ f|¬var is f ∧ f[var := ¬var].
            let s = mgr.flip_var_rec(f, var, false)?;
            mgr.ref_node(s);
            let both = mgr.and_rec(f, s);
            let both = mgr.keep(both, &[s])?;
            mgr.deref_node(s);
            mgr.deref_node(both);
            Ok(both == -mgr.one)
        })
    }

    /// Generalized cofactor of `f` with respect to `c`.
    ///
    /// Agrees with `f` wherever `c` holds. Constraining by `zero()` gives
    /// `zero()`.
    pub fn constrain(&mut self, f: Ref, c: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.constrain_rec(f, c))
    }

    /// Substitutes `g` for `var` in `f`.
    pub fn compose(&mut self, f: Ref, g: Ref, var: impl Into<Var>) -> Result<Ref> {
        let var = var.into();
        self.check_var(var)?;
        self.run(|mgr| {
            if mgr.linear_active() {
                return mgr.client_compose_rec(f, g, var);
            }
            let projection = mgr.vars[var.index()];
            mgr.compose_rec(f, g, projection)
        })
    }

    /// A function implying both `f` and `g`, non-zero iff `f ∧ g` is
    /// satisfiable. Cheaper than the conjunction.
    pub fn intersect(&mut self, f: Ref, g: Ref) -> Result<Ref> {
        self.run(|mgr| mgr.intersect_rec(f, g))
    }

    /// Restricts `f` by a cube of literals.
    pub fn cofactor(&mut self, f: Ref, cube: Ref) -> Result<Ref> {
        let literals = self.cube_literals(cube)?;
        self.run(|mgr| {
            if mgr.linear_active() {
                mgr.client_cofactor_rec(f, &literals)
            } else {
                mgr.cofactor_rec(f, cube)
            }
        })
    }

    /// Conjunction of the positive literals of `vars`.
    pub fn cube(&mut self, vars: &[Var]) -> Result<Ref> {
        let literals: Vec<(Var, bool)> = vars.iter().map(|&v| (v, true)).collect();
        self.literal_cube(&literals)
    }

    /// Conjunction of literals given as `(variable, polarity)`.
    ///
    /// Repeated literals are merged; a variable with both polarities is an
    /// invalid argument.
    pub fn literal_cube(&mut self, literals: &[(Var, bool)]) -> Result<Ref> {
        let mut literals = literals.to_vec();
        for &(v, _) in &literals {
            self.check_var(v)?;
        }
        literals.sort();
        literals.dedup();
        if literals.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(DdError::invalid("cube contains a variable in both polarities"));
        }
        self.run(|mgr| mgr.cube_rec(&literals))
    }

    /// Returns true if `f` is a conjunction of literals. `one()` is the
    /// empty cube; `zero()` is not a cube.
    pub fn is_cube(&self, f: Ref) -> bool {
        let one = self.one;
        let zero = -one;
        let mut cur = f;
        loop {
            if cur == one {
                return true;
            }
            if self.is_constant(cur) {
                return false;
            }
            let (t, e) = (self.high(cur), self.low(cur));
            cur = if e == zero {
                t
            } else if t == zero {
                e
            } else {
                return false;
            };
        }
    }

    /// Variables `f` depends on, sorted by index.
    pub fn support(&self, f: Ref) -> Vec<Var> {
        let mut marks = BitSet::new(self.nodes.len());
        let mut seen = vec![false; self.vars.len()];
        let mut stack = vec![f.id()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_terminal() || !marks.mark(id) {
                continue;
            }
            seen[node.index as usize] = true;
            stack.push(node.high.id());
            stack.push(node.low.id());
        }
        seen.iter()
            .enumerate()
            .filter(|&(_, &s)| s)
            .map(|(i, _)| Var::new(i as u32))
            .collect()
    }

    pub fn support_size(&self, f: Ref) -> usize {
        self.support(f).len()
    }

    /// Number of nodes of `f`, terminals included.
    pub fn dag_size(&self, f: Ref) -> usize {
        self.shared_size(&[f])
    }

    /// Number of nodes of a set of functions, shared nodes counted once.
    pub fn shared_size(&self, fs: &[Ref]) -> usize {
        let mut marks = BitSet::new(self.nodes.len());
        let mut stack: Vec<_> = fs.iter().map(|f| f.id()).collect();
        while let Some(id) = stack.pop() {
            if !marks.mark(id) {
                continue;
            }
            let node = &self.nodes[id];
            if !node.is_terminal() {
                stack.push(node.high.id());
                stack.push(node.low.id());
            }
        }
        marks.len()
    }

    /// Value of `f` under `assignment`, indexed by variable. Missing
    /// variables read as false.
    ///
    /// When linear sifting has replaced variables by linear combinations,
    /// the assignment is mapped through the recorded transform first, so a
    /// function keeps its truth table across every reordering.
    pub fn eval(&self, f: Ref, assignment: &[bool]) -> bool {
        let values = self.effective_assignment(assignment);
        let mut cur = f;
        loop {
            let node = &self.nodes[cur.id()];
            if node.is_terminal() {
                return !cur.is_negated();
            }
            cur = if values[node.index as usize] { self.high(cur) } else { self.low(cur) };
        }
    }

    /// Assignment of the diagram variables for a given assignment of the
    /// client variables.
    pub(crate) fn effective_assignment(&self, assignment: &[bool]) -> Vec<bool> {
        let base: Vec<bool> = (0..self.vars.len())
            .map(|i| assignment.get(i).copied().unwrap_or(false))
            .collect();
        match &self.linear {
            Some(linear) => linear.apply(&base),
            None => base,
        }
    }

    /// Returns true if `f` implies `g`. Creates no nodes.
    pub fn leq(&mut self, f: Ref, g: Ref) -> bool {
        self.leq_rec(f, g)
    }

    /// Semantic equality, which canonicity reduces to handle equality.
    pub fn equal(&self, f: Ref, g: Ref) -> bool {
        f == g
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    /// Truth table of `f` over the first `n` variables.
    fn table(mgr: &Manager, f: Ref, n: usize) -> Vec<bool> {
        (0..1u32 << n)
            .map(|bits| {
                let a: Vec<bool> = (0..n).map(|i| bits >> i & 1 == 1).collect();
                mgr.eval(f, &a)
            })
            .collect()
    }

    #[test]
    fn test_and_or_canonical() {
        let mut mgr = Manager::new(3);
        let (a, b) = (mgr.var(0), mgr.var(1));
        let f = mgr.and(a, b).unwrap();
        let g = {
            let o = mgr.or(-a, -b).unwrap();
            mgr.release(o);
            -o
        };
        assert_eq!(f, g);
        let h = mgr.nand(b, a).unwrap();
        assert_eq!(h, -f);
        mgr.release(f);
        mgr.release(h);
    }

    #[test]
    fn test_ite_terminal_rules() {
        let mut mgr = Manager::new(3);
        let (x, y, z) = (mgr.var(0), mgr.var(1), mgr.var(2));
        let one = mgr.one();
        let zero = mgr.zero();
        assert_eq!(mgr.ite(one, y, z).unwrap(), y);
        assert_eq!(mgr.ite(zero, y, z).unwrap(), z);
        assert_eq!(mgr.ite(x, one, zero).unwrap(), x);
        assert_eq!(mgr.ite(x, zero, one).unwrap(), -x);
        assert_eq!(mgr.ite(x, y, y).unwrap(), y);

        let f = mgr.ite(x, x, z).unwrap();
        let g = mgr.or(x, z).unwrap();
        assert_eq!(f, g);

        let h = mgr.ite(x, y, -y).unwrap();
        let k = mgr.xnor(x, y).unwrap();
        assert_eq!(h, k);
        for r in [f, g, h, k] {
            mgr.release(r);
        }
    }

    #[test]
    fn test_ite_matches_truth_table() {
        let mut mgr = Manager::new(4);
        let (a, b, c, d) = (mgr.var(0), mgr.var(1), mgr.var(2), mgr.var(3));
        let f = mgr.xor(a, d).unwrap();
        let g = mgr.and(b, -c).unwrap();
        let h = mgr.or(c, -a).unwrap();
        let r = mgr.ite(f, g, h).unwrap();

        let (tf, tg, th, tr) = (table(&mgr, f, 4), table(&mgr, g, 4), table(&mgr, h, 4), table(&mgr, r, 4));
        for i in 0..16 {
            assert_eq!(tr[i], if tf[i] { tg[i] } else { th[i] });
        }
        for x in [f, g, h, r] {
            mgr.release(x);
        }
    }

    #[test]
    fn test_exist_and_univ() {
        let mut mgr = Manager::new(3);
        let (a, b, c) = (mgr.var(0), mgr.var(1), mgr.var(2));
        let f = mgr.and(a, b).unwrap();
        let cube = mgr.cube(&[Var::new(1)]).unwrap();
        let e = mgr.exist_abstract(f, cube).unwrap();
        assert_eq!(e, a);
        let u = mgr.univ_abstract(f, cube).unwrap();
        assert_eq!(u, mgr.zero());

        // Abstracting a variable outside the support is the identity.
        let cz = mgr.cube(&[Var::new(2)]).unwrap();
        let same = mgr.exist_abstract(f, cz).unwrap();
        assert_eq!(same, f);
        let same = mgr.exist_abstract(f, mgr.one()).unwrap();
        assert_eq!(same, f);

        assert!(matches!(mgr.exist_abstract(f, -c), Err(DdError::InvalidArgument(_))));
        assert!(matches!(mgr.exist_abstract(f, f), Ok(_)));
    }

    #[test]
    fn test_and_abstract_is_relational_product() {
        let mut mgr = Manager::new(4);
        let (a, b, c, d) = (mgr.var(0), mgr.var(1), mgr.var(2), mgr.var(3));
        let f = mgr.xor(a, b).unwrap();
        let g = mgr.or(b, c).unwrap();
        let g = {
            let t = mgr.and(g, d).unwrap();
            mgr.release(g);
            t
        };
        let cube = mgr.cube(&[Var::new(1), Var::new(3)]).unwrap();
        let direct = mgr.and_abstract(f, g, cube).unwrap();
        let conj = mgr.and(f, g).unwrap();
        let two_step = mgr.exist_abstract(conj, cube).unwrap();
        assert_eq!(direct, two_step);

        let x = mgr.xor_exist_abstract(f, g, cube).unwrap();
        let xr = mgr.xor(f, g).unwrap();
        let x2 = mgr.exist_abstract(xr, cube).unwrap();
        assert_eq!(x, x2);
    }

    #[test]
    fn test_boolean_diff_and_dependence() {
        let mut mgr = Manager::new(3);
        let (a, b, c) = (mgr.var(0), mgr.var(1), mgr.var(2));
        let f = mgr.and(a, b).unwrap();
        let d = mgr.boolean_diff(f, 0u32).unwrap();
        assert_eq!(d, b);
        let d = mgr.boolean_diff(f, 2u32).unwrap();
        assert_eq!(d, mgr.zero());

        // In a ↔ c, c is fixed by a.
        let g = mgr.xnor(a, c).unwrap();
        assert!(mgr.var_is_dependent(g, 2u32).unwrap());
        assert!(!mgr.var_is_dependent(f, 1u32).unwrap());
        assert!(matches!(mgr.boolean_diff(f, 9u32), Err(DdError::InvalidArgument(_))));
    }

    #[test]
    fn test_leq() {
        let mut mgr = Manager::new(3);
        let (a, b) = (mgr.var(0), mgr.var(1));
        let f = mgr.and(a, b).unwrap();
        let g = mgr.or(a, b).unwrap();
        assert!(mgr.leq(f, g));
        assert!(mgr.leq(f, a));
        assert!(!mgr.leq(g, f));
        assert!(mgr.leq(mgr.zero(), f));
        assert!(mgr.leq(f, mgr.one()));
        assert!(!mgr.leq(-f, f));
        assert!(mgr.leq(-g, -f));
    }

    #[test]
    fn test_constrain_agrees_on_care_set() {
        let mut mgr = Manager::new(3);
        let (a, b, c) = (mgr.var(0), mgr.var(1), mgr.var(2));
        let f = mgr.ite(a, b, c).unwrap();
        let care = mgr.or(a, -c).unwrap();
        let r = mgr.constrain(f, care).unwrap();
        let (tf, tc, tr) = (table(&mgr, f, 3), table(&mgr, care, 3), table(&mgr, r, 3));
        for i in 0..8 {
            if tc[i] {
                assert_eq!(tf[i], tr[i]);
            }
        }
        assert_eq!(mgr.constrain(f, mgr.one()).unwrap(), f);
        assert_eq!(mgr.constrain(f, mgr.zero()).unwrap(), mgr.zero());
        assert_eq!(mgr.constrain(f, f).unwrap(), mgr.one());
    }

    #[test]
    fn test_compose() {
        let mut mgr = Manager::new(3);
        let (a, b, c) = (mgr.var(0), mgr.var(1), mgr.var(2));
        let f = mgr.and(a, b).unwrap();
        let g = mgr.xor(b, c).unwrap();
        let r = mgr.compose(f, g, 0u32).unwrap();
        let expected = mgr.and(g, b).unwrap();
        assert_eq!(r, expected);
        // Substituting a variable for itself changes nothing.
        assert_eq!(mgr.compose(f, a, 0u32).unwrap(), f);
    }

    #[test]
    fn test_intersect_witness() {
        let mut mgr = Manager::new(3);
        let (a, b) = (mgr.var(0), mgr.var(1));
        let f = mgr.or(a, b).unwrap();
        let g = mgr.and(-a, b).unwrap();
        let w = mgr.intersect(f, g).unwrap();
        assert_ne!(w, mgr.zero());
        assert!(mgr.leq(w, f));
        assert!(mgr.leq(w, g));
        let h = mgr.and(-a, -b).unwrap();
        assert_eq!(mgr.intersect(f, h).unwrap(), mgr.zero());
    }

    #[test]
    fn test_cubes_and_cofactor() {
        let mut mgr = Manager::new(4);
        let lits = [(Var::new(2), false), (Var::new(0), true)];
        let cube = mgr.literal_cube(&lits).unwrap();
        assert!(mgr.is_cube(cube));
        assert!(mgr.positive_cube_vars(cube).is_err());
        assert!(mgr.is_cube(mgr.one()));
        assert!(!mgr.is_cube(mgr.zero()));
        assert_eq!(mgr.support(cube), vec![Var::new(0), Var::new(2)]);

        let (a, b, c) = (mgr.var(0), mgr.var(1), mgr.var(2));
        let f = mgr.ite(a, b, c).unwrap();
        let r = mgr.cofactor(f, cube).unwrap();
        assert_eq!(r, b);
        let not_cube = mgr.or(a, c).unwrap();
        assert!(matches!(mgr.cofactor(f, not_cube), Err(DdError::InvalidArgument(_))));
        assert!(matches!(
            mgr.literal_cube(&[(Var::new(1), true), (Var::new(1), false)]),
            Err(DdError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sizes_and_support() {
        let mut mgr = Manager::new(4);
        let (a, b, c) = (mgr.var(0), mgr.var(1), mgr.var(3));
        let f = mgr.and(a, b).unwrap();
        assert_eq!(mgr.dag_size(f), 3);
        let g = mgr.xor(b, c).unwrap();
        assert_eq!(mgr.support(g), vec![Var::new(1), Var::new(3)]);
        assert_eq!(mgr.support_size(f), 2);
        assert!(mgr.support(mgr.one()).is_empty());
        assert_eq!(mgr.dag_size(mgr.one()), 1);
        let shared = mgr.shared_size(&[f, g]);
        assert!(shared < mgr.dag_size(f) + mgr.dag_size(g));
    }

    #[test]
    fn test_release_everything_leaves_no_live_nodes() {
        let mut mgr = Manager::new(5);
        let base = mgr.live_count();
        let vars: Vec<Ref> = (0..5u32).map(|i| mgr.var(i)).collect();
        let f = mgr.and_all(vars.iter().copied()).unwrap();
        let g = mgr.or_all(vars.iter().copied()).unwrap();
        let h = mgr.ite(f, g, vars[2]).unwrap();
        for r in [f, g, h] {
            mgr.release(r);
        }
        assert_eq!(mgr.live_count(), base);
        mgr.garbage_collect();
        assert_eq!(mgr.node_count(), base);
    }
}
