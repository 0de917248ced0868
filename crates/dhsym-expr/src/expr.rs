//! Symbolic expression AST.
//!
//! Expressions are sums of trig/polynomial monomials over the per-joint
//! symbols `t{n}` / `d{n}` and their rates `td{n}` / `dd{n}`. The AST
//! replaces string-level surgery with explicit tagged variants; every
//! expression handed between pipeline stages is kept in expanded additive
//! normal form (a [`Expr::Sum`] of non-Sum monomials, or a single monomial).

use std::collections::HashMap;

use crate::error::EvalError;

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// A typed joint symbol. The index is the 1-based joint number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Var {
    /// Revolute joint angle `t{n}`.
    Theta(u32),
    /// Revolute joint rate `td{n}`.
    ThetaDot(u32),
    /// Prismatic joint extension `d{n}`.
    D(u32),
    /// Prismatic joint rate `dd{n}`.
    DDot(u32),
}

impl Var {
    /// Whether this symbol is a joint rate (`td{n}` or `dd{n}`).
    pub const fn is_rate(self) -> bool {
        matches!(self, Self::ThetaDot(_) | Self::DDot(_))
    }

    /// The 1-based joint index this symbol belongs to.
    pub const fn joint(self) -> u32 {
        match self {
            Self::Theta(n) | Self::ThetaDot(n) | Self::D(n) | Self::DDot(n) => n,
        }
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Theta(n) => write!(f, "t{n}"),
            Self::ThetaDot(n) => write!(f, "td{n}"),
            Self::D(n) => write!(f, "d{n}"),
            Self::DDot(n) => write!(f, "dd{n}"),
        }
    }
}

/// Trigonometric function tag for [`Expr::Call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trig {
    Sin,
    Cos,
}

impl Trig {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Explicit, immutable symbol-to-number binding map.
///
/// Built fresh for every evaluation; there is deliberately no global
/// variable environment anywhere in the workspace, so concurrent or
/// repeated derivations can never observe each other's bindings.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<Var, f64>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style bind.
    #[must_use]
    pub fn bind(mut self, var: Var, value: f64) -> Self {
        self.bindings.insert(var, value);
        self
    }

    pub fn set(&mut self, var: Var, value: f64) {
        self.bindings.insert(var, value);
    }

    pub fn get(&self, var: Var) -> Option<f64> {
        self.bindings.get(&var).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Expr
// ---------------------------------------------------------------------------

/// A symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Sym(Var),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    /// Integer power of a base expression.
    Power(Box<Expr>, i32),
    Call(Trig, Box<Expr>),
}

impl Expr {
    /// Numeric constant, with `-0.0` normalized to `0.0`.
    pub fn num(value: f64) -> Self {
        Self::Const(if value == 0.0 { 0.0 } else { value })
    }

    pub const fn zero() -> Self {
        Self::Const(0.0)
    }

    pub const fn one() -> Self {
        Self::Const(1.0)
    }

    pub const fn sym(var: Var) -> Self {
        Self::Sym(var)
    }

    pub fn sin(angle: Expr) -> Self {
        Self::Call(Trig::Sin, Box::new(angle))
    }

    pub fn cos(angle: Expr) -> Self {
        Self::Call(Trig::Cos, Box::new(angle))
    }

    pub fn powi(self, exponent: i32) -> Self {
        Self::Power(Box::new(self), exponent)
    }

    /// Sum of `terms`, collapsing the empty and singleton cases.
    pub fn sum(mut terms: Vec<Expr>) -> Self {
        match terms.len() {
            0 => Self::zero(),
            1 => terms.pop().unwrap_or_else(Self::zero),
            _ => Self::Sum(terms),
        }
    }

    /// Product of `factors`, collapsing the empty and singleton cases.
    pub fn product(mut factors: Vec<Expr>) -> Self {
        match factors.len() {
            0 => Self::one(),
            1 => factors.pop().unwrap_or_else(Self::one),
            _ => Self::Product(factors),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Const(c) if *c == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Self::Const(c) if *c == 1.0)
    }

    /// The additive terms of this expression at the top level.
    ///
    /// Only meaningful on expanded expressions; a non-Sum expression is a
    /// single term.
    pub fn into_terms(self) -> Vec<Expr> {
        match self {
            Self::Sum(terms) => terms,
            other => vec![other],
        }
    }

    /// Borrowing variant of [`into_terms`](Self::into_terms).
    pub fn terms(&self) -> Vec<Expr> {
        match self {
            Self::Sum(terms) => terms.clone(),
            other => vec![other.clone()],
        }
    }

    /// Whether `var` occurs anywhere in this expression.
    pub fn contains(&self, var: Var) -> bool {
        match self {
            Self::Const(_) => false,
            Self::Sym(v) => *v == var,
            Self::Sum(children) | Self::Product(children) => {
                children.iter().any(|c| c.contains(var))
            }
            Self::Power(base, _) => base.contains(var),
            Self::Call(_, angle) => angle.contains(var),
        }
    }

    /// Replace every bound symbol with its value, leaving unbound symbols
    /// in place. Does not expand or fold the result.
    pub fn substitute(&self, scope: &Scope) -> Expr {
        match self {
            Self::Const(_) => self.clone(),
            Self::Sym(v) => match scope.get(*v) {
                Some(value) => Self::num(value),
                None => self.clone(),
            },
            Self::Sum(children) => {
                Self::Sum(children.iter().map(|c| c.substitute(scope)).collect())
            }
            Self::Product(children) => {
                Self::Product(children.iter().map(|c| c.substitute(scope)).collect())
            }
            Self::Power(base, n) => Self::Power(Box::new(base.substitute(scope)), *n),
            Self::Call(f, angle) => Self::Call(*f, Box::new(angle.substitute(scope))),
        }
    }

    /// Evaluate to a number under `scope`.
    ///
    /// # Errors
    ///
    /// [`EvalError::Unbound`] if any symbol has no binding.
    pub fn evaluate(&self, scope: &Scope) -> Result<f64, EvalError> {
        match self {
            Self::Const(c) => Ok(*c),
            Self::Sym(v) => scope.get(*v).ok_or(EvalError::Unbound(*v)),
            Self::Sum(children) => {
                let mut acc = 0.0;
                for c in children {
                    acc += c.evaluate(scope)?;
                }
                Ok(acc)
            }
            Self::Product(children) => {
                let mut acc = 1.0;
                for c in children {
                    acc *= c.evaluate(scope)?;
                }
                Ok(acc)
            }
            Self::Power(base, n) => Ok(base.evaluate(scope)?.powi(*n)),
            Self::Call(f, angle) => Ok(f.apply(angle.evaluate(scope)?)),
        }
    }

    // -----------------------------------------------------------------------
    // Expansion
    // -----------------------------------------------------------------------

    /// Expand to additive normal form.
    ///
    /// Distributes products over sums, expands non-negative integer powers
    /// of sums, flattens nesting, and folds constants (including trig calls
    /// on constant angles). The result is a `Sum` of monomials, a single
    /// monomial, or a `Const`; each monomial is a `Product` whose factors
    /// are sorted canonically with at most one leading constant.
    pub fn expand(&self) -> Expr {
        rebuild_terms(self.expanded_monomials())
    }

    /// Expand and return the monomials as `(coefficient, atoms)` pairs.
    ///
    /// Atoms are non-constant, non-sum factors (symbols, trig calls, and
    /// residual powers of atoms), sorted by display form.
    pub(crate) fn expanded_monomials(&self) -> Vec<Monomial> {
        match self {
            Self::Const(c) => {
                if *c == 0.0 {
                    Vec::new()
                } else {
                    vec![Monomial::constant(*c)]
                }
            }
            Self::Sym(v) => vec![Monomial::atom(Self::Sym(*v))],
            Self::Call(f, angle) => {
                let angle = angle.expand();
                match angle {
                    Self::Const(c) => {
                        let v = f.apply(c);
                        if v == 0.0 {
                            Vec::new()
                        } else {
                            vec![Monomial::constant(v)]
                        }
                    }
                    angle => vec![Monomial::atom(Self::Call(*f, Box::new(angle)))],
                }
            }
            Self::Power(base, n) => {
                let base = base.expand();
                match *n {
                    0 => vec![Monomial::constant(1.0)],
                    1 => base.expanded_monomials(),
                    n if n > 0 => {
                        let unit = base.expanded_monomials();
                        let mut acc = unit.clone();
                        for _ in 1..n {
                            acc = multiply_monomials(&acc, &unit);
                        }
                        acc
                    }
                    // Negative powers cannot arise from DH propagation;
                    // keep them as opaque atoms so parsing stays total.
                    n => match base {
                        Self::Const(c) => vec![Monomial::constant(c.powi(n))],
                        base => vec![Monomial::atom(Self::Power(Box::new(base), n))],
                    },
                }
            }
            Self::Sum(children) => {
                let mut out = Vec::new();
                let mut konst = 0.0;
                for child in children {
                    for m in child.expanded_monomials() {
                        if m.atoms.is_empty() {
                            konst += m.coeff;
                        } else if m.coeff != 0.0 {
                            out.push(m);
                        }
                    }
                }
                if konst != 0.0 {
                    out.push(Monomial::constant(konst));
                }
                out
            }
            Self::Product(children) => {
                let mut acc = vec![Monomial::constant(1.0)];
                for child in children {
                    acc = multiply_monomials(&acc, &child.expanded_monomials());
                }
                acc
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Monomials
// ---------------------------------------------------------------------------

/// One additive term in expanded form: a coefficient times atom factors.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Monomial {
    pub coeff: f64,
    pub atoms: Vec<Expr>,
}

impl Monomial {
    pub fn constant(coeff: f64) -> Self {
        Self {
            coeff,
            atoms: Vec::new(),
        }
    }

    pub fn atom(atom: Expr) -> Self {
        Self {
            coeff: 1.0,
            atoms: vec![atom],
        }
    }

    /// Rebuild the `Expr` form of this monomial.
    pub fn into_expr(mut self) -> Expr {
        if self.coeff == 0.0 || self.atoms.is_empty() {
            return Expr::num(self.coeff);
        }
        if self.coeff == 1.0 {
            return Expr::product(self.atoms);
        }
        let mut factors = Vec::with_capacity(self.atoms.len() + 1);
        factors.push(Expr::num(self.coeff));
        factors.append(&mut self.atoms);
        Expr::Product(factors)
    }
}

fn multiply_monomials(lhs: &[Monomial], rhs: &[Monomial]) -> Vec<Monomial> {
    let mut out = Vec::with_capacity(lhs.len() * rhs.len());
    for a in lhs {
        for b in rhs {
            let coeff = a.coeff * b.coeff;
            if coeff == 0.0 {
                continue;
            }
            let mut atoms = Vec::with_capacity(a.atoms.len() + b.atoms.len());
            atoms.extend(a.atoms.iter().cloned());
            atoms.extend(b.atoms.iter().cloned());
            atoms.sort_by(atom_order);
            out.push(Monomial { coeff, atoms });
        }
    }
    out
}

/// Canonical factor ordering: by display form. Stable across runs and
/// platforms, which is all the wire format requires.
pub(crate) fn atom_order(a: &Expr, b: &Expr) -> std::cmp::Ordering {
    a.to_string().cmp(&b.to_string())
}

pub(crate) fn rebuild_terms(monomials: Vec<Monomial>) -> Expr {
    let terms: Vec<Expr> = monomials
        .into_iter()
        .filter(|m| m.coeff != 0.0)
        .map(Monomial::into_expr)
        .collect();
    Expr::sum(terms)
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Sum(mut a), Self::Sum(b)) => {
                a.extend(b);
                Self::Sum(a)
            }
            (Self::Sum(mut a), b) => {
                a.push(b);
                Self::Sum(a)
            }
            (a, Self::Sum(mut b)) => {
                b.insert(0, a);
                Self::Sum(b)
            }
            (a, b) => Self::Sum(vec![a, b]),
        }
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Product(mut a), Self::Product(b)) => {
                a.extend(b);
                Self::Product(a)
            }
            (Self::Product(mut a), b) => {
                a.push(b);
                Self::Product(a)
            }
            (a, Self::Product(mut b)) => {
                b.insert(0, a);
                Self::Product(b)
            }
            (a, b) => Self::Product(vec![a, b]),
        }
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self {
        Expr::num(-1.0) * self
    }
}

// ---------------------------------------------------------------------------
// Display (wire syntax)
// ---------------------------------------------------------------------------

/// Format a constant in the wire syntax: integral values print without a
/// decimal point, negative values print parenthesized.
fn fmt_const(c: f64, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if c < 0.0 {
        write!(f, "(-")?;
        fmt_magnitude(-c, f)?;
        write!(f, ")")
    } else {
        fmt_magnitude(c, f)
    }
}

fn fmt_magnitude(c: f64, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if c.fract() == 0.0 && c.abs() < 1e15 {
        write!(f, "{}", c as i64)
    } else {
        write!(f, "{c}")
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Const(c) => fmt_const(*c, f),
            Self::Sym(v) => write!(f, "{v}"),
            Self::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "+")?;
                    }
                    match term {
                        Self::Sum(_) => write!(f, "({term})")?,
                        _ => write!(f, "{term}")?,
                    }
                }
                Ok(())
            }
            Self::Product(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    match factor {
                        Self::Sum(_) => write!(f, "({factor})")?,
                        _ => write!(f, "{factor}")?,
                    }
                }
                Ok(())
            }
            Self::Power(base, n) => {
                match **base {
                    Self::Sum(_) | Self::Product(_) => write!(f, "({base})")?,
                    _ => write!(f, "{base}")?,
                }
                if *n < 0 {
                    write!(f, "^({n})")
                } else {
                    write!(f, "^{n}")
                }
            }
            Self::Call(func, angle) => write!(f, "{}({angle})", func.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn t(n: u32) -> Expr {
        Expr::sym(Var::Theta(n))
    }

    fn td(n: u32) -> Expr {
        Expr::sym(Var::ThetaDot(n))
    }

    #[test]
    fn display_wire_syntax() {
        let e = Expr::num(5.0) * td(1) + Expr::num(-3.0) * td(2) * Expr::cos(t(1));
        assert_eq!(e.to_string(), "5*td1+(-3)*td2*cos(t1)");
    }

    #[test]
    fn display_power_and_nested_angle() {
        let e = Expr::sin(t(1) + t(2)).powi(2);
        assert_eq!(e.to_string(), "sin(t1+t2)^2");
    }

    #[test]
    fn expand_distributes_over_sums() {
        // (a + b) * (c + d) -> four monomials
        let e = (t(1) + t(2)) * (td(1) + td(2));
        let expanded = e.expand();
        assert_eq!(expanded.terms().len(), 4);
    }

    #[test]
    fn expand_folds_constants() {
        let e = Expr::num(2.0) * Expr::num(3.0) + Expr::num(4.0);
        assert_eq!(e.expand(), Expr::num(10.0));
    }

    #[test]
    fn expand_drops_zero_products() {
        let e = Expr::num(0.0) * Expr::cos(t(1)) + td(1);
        assert_eq!(e.expand(), td(1));
    }

    #[test]
    fn expand_power_of_sum() {
        // (x + y)^2 -> x*x + 2 x y + y*y split into monomials (like terms
        // are not collected by expand, so the cross terms stay separate).
        let e = (t(1) + t(2)).powi(2);
        let expanded = e.expand();
        assert_eq!(expanded.terms().len(), 4);
    }

    #[test]
    fn expand_folds_trig_of_constant() {
        let e = Expr::cos(Expr::zero()) * td(1);
        assert_eq!(e.expand(), td(1));
        let z = Expr::sin(Expr::zero()) * td(1);
        assert!(z.expand().is_zero());
    }

    #[test]
    fn evaluate_with_scope() {
        let e = Expr::num(2.0) * Expr::cos(t(1)) + td(1);
        let scope = Scope::new()
            .bind(Var::Theta(1), 0.0)
            .bind(Var::ThetaDot(1), 0.5);
        assert_relative_eq!(e.evaluate(&scope).unwrap(), 2.5);
    }

    #[test]
    fn evaluate_unbound_symbol_errors() {
        let e = Expr::cos(t(1));
        assert_eq!(
            e.evaluate(&Scope::new()),
            Err(EvalError::Unbound(Var::Theta(1)))
        );
    }

    #[test]
    fn substitute_is_partial() {
        let e = t(1) + td(1);
        let scope = Scope::new().bind(Var::Theta(1), 1.5);
        let out = e.substitute(&scope);
        assert!(out.contains(Var::ThetaDot(1)));
        assert!(!out.contains(Var::Theta(1)));
    }

    #[test]
    fn expansion_is_idempotent() {
        let e = (t(1) + t(2)) * (td(1) - td(2)) * Expr::cos(t(1));
        let once = e.expand();
        assert_eq!(once.expand(), once);
    }
}
