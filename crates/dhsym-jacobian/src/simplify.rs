//! Fixpoint trigonometric identity rewriting.
//!
//! Repeated symbolic matrix multiplication across N joints grows terms like
//! `cos(t1)*cos(t2) + (-1)*sin(t1)*sin(t2)` at every entry; left alone the
//! term count is near-exponential in N. This module recognizes a bounded set
//! of sum/difference identities over pairs of additive terms and rewrites
//! each match into a single term:
//!
//! - `cos(A)*cos(B) ± sin(A)*sin(B)  ->  cos(A∓B)`
//! - `sin(A)*cos(B) ± cos(A)*sin(B)  ->  sin(A±B)`
//! - same-angle degenerates: `sin(2A)`, `cos(2A)`, `cos(0)`, or exact `0`
//!
//! A merge fires only when the two terms agree on every other factor and on
//! coefficient magnitude; unmatched pairs are left unsimplified. Soundness
//! over completeness. Every merge removes two terms and inserts at most one,
//! so the term count strictly decreases and the scan terminates.

use std::collections::BTreeMap;

use dhsym_expr::{Expr, Trig};

// ---------------------------------------------------------------------------
// Signed-term normal form
// ---------------------------------------------------------------------------

/// One factor of a signed term, cached with its canonical display key.
#[derive(Debug, Clone)]
struct SFactor {
    expr: Expr,
    key: String,
}

impl SFactor {
    fn new(expr: Expr) -> Self {
        let key = expr.to_string();
        Self { expr, key }
    }

    /// The trig function and canonical angle, if this factor is a call.
    fn as_trig(&self) -> Option<(Trig, &Expr)> {
        match &self.expr {
            Expr::Call(func, angle) => Some((*func, angle)),
            _ => None,
        }
    }
}

/// One additive term: a coefficient times a multiset of atom factors,
/// kept sorted by key.
#[derive(Debug, Clone)]
struct STerm {
    coeff: f64,
    factors: Vec<SFactor>,
}

impl STerm {
    fn keys(&self) -> Vec<&str> {
        self.factors.iter().map(|f| f.key.as_str()).collect()
    }

    fn into_expr(self) -> Expr {
        let atoms: Vec<Expr> = self.factors.into_iter().map(|f| f.expr).collect();
        if atoms.is_empty() {
            return Expr::num(self.coeff);
        }
        if self.coeff == 1.0 {
            return Expr::product(atoms);
        }
        let mut factors = Vec::with_capacity(atoms.len() + 1);
        factors.push(Expr::num(self.coeff));
        factors.extend(atoms);
        Expr::Product(factors)
    }
}

// ---------------------------------------------------------------------------
// Angle canonicalization
// ---------------------------------------------------------------------------

/// Canonicalize a (linear) angle expression.
///
/// Returns `(sign, canon)` with the original angle equal to `sign * canon`
/// and the leading coefficient of `canon` positive, so that `cos` can
/// ignore the sign and `sin` folds it into the term coefficient. Angles
/// that are not linear in the symbols are returned unchanged.
fn canonical_angle(angle: &Expr) -> (f64, Expr) {
    let expanded = angle.expand();

    let mut linear: BTreeMap<String, (Expr, f64)> = BTreeMap::new();
    let mut constant = 0.0;

    for term in expanded.terms() {
        let (coeff, atoms) = split_term(&term);
        match atoms.len() {
            0 => constant += coeff,
            1 => {
                let atom = atoms[0].clone();
                let entry = linear
                    .entry(atom.to_string())
                    .or_insert_with(|| (atom, 0.0));
                entry.1 += coeff;
            }
            // Nonlinear angle: leave as-is rather than mis-canonicalize.
            _ => return (1.0, expanded),
        }
    }
    linear.retain(|_, (_, coeff)| *coeff != 0.0);

    if linear.is_empty() {
        return (1.0, Expr::num(constant));
    }

    let mut sign = 1.0;
    if let Some((_, (_, first))) = linear.iter().next()
        && *first < 0.0
    {
        sign = -1.0;
        constant = -constant;
        for (_, coeff) in linear.values_mut() {
            *coeff = -*coeff;
        }
    }

    let mut terms: Vec<Expr> = linear
        .into_values()
        .map(|(atom, coeff)| {
            if coeff == 1.0 {
                atom
            } else {
                Expr::Product(vec![Expr::num(coeff), atom])
            }
        })
        .collect();
    if constant != 0.0 {
        terms.push(Expr::num(constant));
    }
    (sign, Expr::sum(terms))
}

/// Split one expanded term into `(coefficient, atom factors)`.
fn split_term(term: &Expr) -> (f64, Vec<&Expr>) {
    match term {
        Expr::Const(c) => (*c, Vec::new()),
        Expr::Product(factors) => {
            let mut coeff = 1.0;
            let mut atoms = Vec::with_capacity(factors.len());
            for factor in factors {
                match factor {
                    Expr::Const(c) => coeff *= c,
                    other => atoms.push(other),
                }
            }
            (coeff, atoms)
        }
        other => (1.0, vec![other]),
    }
}

/// Canonical sum of two angles.
fn angle_add(a: &Expr, b: &Expr) -> (f64, Expr) {
    canonical_angle(&(a.clone() + b.clone()))
}

/// Canonical difference of two angles.
fn angle_sub(a: &Expr, b: &Expr) -> (f64, Expr) {
    canonical_angle(&(a.clone() - b.clone()))
}

/// Build a trig factor over a canonical `(sign, angle)` pair, folding
/// constant angles into the returned coefficient multiplier.
///
/// Returns `(coeff_multiplier, factor)`; a `None` factor means the call
/// collapsed to a constant (e.g. `cos(0)`).
fn trig_factor(func: Trig, sign: f64, angle: Expr) -> (f64, Option<SFactor>) {
    if let Expr::Const(c) = angle {
        let value = func.apply(c);
        let value = if func == Trig::Sin { sign * value } else { value };
        return (value, None);
    }
    match func {
        Trig::Cos => (1.0, Some(SFactor::new(Expr::cos(angle)))),
        Trig::Sin => (sign, Some(SFactor::new(Expr::sin(angle)))),
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Expand `expr` and flatten it into signed terms: powers become repeated
/// factors, trig angles are canonicalized, factors are sorted by key.
fn normalize(expr: &Expr) -> Vec<STerm> {
    let mut terms = Vec::new();
    for term in expr.expand().into_terms() {
        if let Some(sterm) = normalize_term(&term)
            && sterm.coeff != 0.0
        {
            terms.push(sterm);
        }
    }
    terms
}

fn push_atom(atom: &Expr, coeff: &mut f64, factors: &mut Vec<SFactor>) {
    match atom {
        Expr::Call(func, angle) => {
            let (sign, canon) = canonical_angle(angle);
            let (mult, factor) = trig_factor(*func, sign, canon);
            *coeff *= mult;
            if let Some(factor) = factor {
                factors.push(factor);
            }
        }
        other => factors.push(SFactor::new(other.clone())),
    }
}

fn normalize_term(term: &Expr) -> Option<STerm> {
    let mut coeff = 1.0;
    let mut factors: Vec<SFactor> = Vec::new();

    let flat = match term {
        Expr::Product(children) => children.clone(),
        other => vec![other.clone()],
    };

    for factor in flat {
        match factor {
            Expr::Const(c) => coeff *= c,
            // Integer powers expand into repeated products so that e.g.
            // cos(t1)^2 can pair against sin(t1)*sin(t1).
            Expr::Power(base, n) if n > 0 => {
                for _ in 0..n {
                    push_atom(base.as_ref(), &mut coeff, &mut factors);
                }
            }
            other => push_atom(&other, &mut coeff, &mut factors),
        }
    }

    if coeff == 0.0 {
        return None;
    }
    factors.sort_by(|a, b| a.key.cmp(&b.key));
    Some(STerm { coeff, factors })
}

// ---------------------------------------------------------------------------
// Pairwise merging
// ---------------------------------------------------------------------------

enum Merged {
    Zero,
    Term(STerm),
}

/// Try to merge two terms under the bounded identity set.
fn try_merge(a: &STerm, b: &STerm) -> Option<Merged> {
    if a.keys() == b.keys() {
        return merge_identical_factors(a, b);
    }
    if a.coeff.abs() != b.coeff.abs() {
        return None;
    }

    let (only_a, only_b) = factor_diff(a, b);
    if only_a.len() != 2 || only_b.len() != 2 {
        return None;
    }

    let pair_a = (only_a[0].as_trig()?, only_a[1].as_trig()?);
    let pair_b = (only_b[0].as_trig()?, only_b[1].as_trig()?);

    let common: Vec<SFactor> = residual_factors(a, &only_a);

    merge_cos_rule(a, b, pair_a, pair_b, &common)
        .or_else(|| merge_cos_rule(b, a, pair_b, pair_a, &common))
        .or_else(|| merge_sin_rule(a, b, pair_a, pair_b, &common))
        .or_else(|| merge_sin_rule(b, a, pair_b, pair_a, &common))
}

/// Identical factor multisets: collect like terms; a same-angle sin/cos
/// pair with equal coefficients folds to `sin(2A)` instead.
fn merge_identical_factors(a: &STerm, b: &STerm) -> Option<Merged> {
    let total = a.coeff + b.coeff;
    if total == 0.0 {
        return Some(Merged::Zero);
    }

    if a.coeff == b.coeff
        && let Some((i, j, angle)) = find_same_angle_sin_cos(a)
    {
        let mut factors: Vec<SFactor> = Vec::with_capacity(a.factors.len() - 1);
        for (k, factor) in a.factors.iter().enumerate() {
            if k != i && k != j {
                factors.push(factor.clone());
            }
        }
        let doubled = Expr::Product(vec![Expr::num(2.0), angle.clone()]);
        let (sign, canon) = canonical_angle(&doubled);
        let (mult, factor) = trig_factor(Trig::Sin, sign, canon);
        let coeff = a.coeff * mult;
        if coeff == 0.0 {
            return Some(Merged::Zero);
        }
        if let Some(factor) = factor {
            factors.push(factor);
        }
        factors.sort_by(|x, y| x.key.cmp(&y.key));
        return Some(Merged::Term(STerm { coeff, factors }));
    }

    Some(Merged::Term(STerm {
        coeff: total,
        factors: a.factors.clone(),
    }))
}

/// Find a `sin(X)`/`cos(X)` factor pair over the same angle.
fn find_same_angle_sin_cos(term: &STerm) -> Option<(usize, usize, Expr)> {
    for (i, fi) in term.factors.iter().enumerate() {
        let Some((Trig::Sin, angle)) = fi.as_trig() else {
            continue;
        };
        let cos_key = Expr::cos(angle.clone()).to_string();
        for (j, fj) in term.factors.iter().enumerate() {
            if j != i && fj.key == cos_key {
                return Some((i, j, angle.clone()));
            }
        }
    }
    None
}

/// `cos_term` holds `cos(P)*cos(Q)`, `sin_term` holds `sin(P)*sin(Q)`:
/// same sign merges to `cos(P-Q)`, opposite sign to `cos(P+Q)`, with the
/// result carrying the cos-cos term's coefficient.
fn merge_cos_rule(
    cos_term: &STerm,
    sin_term: &STerm,
    cos_pair: ((Trig, &Expr), (Trig, &Expr)),
    sin_pair: ((Trig, &Expr), (Trig, &Expr)),
    common: &[SFactor],
) -> Option<Merged> {
    let ((fa0, p), (fa1, q)) = cos_pair;
    let ((fb0, p2), (fb1, q2)) = sin_pair;
    if fa0 != Trig::Cos || fa1 != Trig::Cos || fb0 != Trig::Sin || fb1 != Trig::Sin {
        return None;
    }

    // Orient the sin angles against the cos angles (unordered pair match).
    let (p_key, q_key) = (p.to_string(), q.to_string());
    let (p2_key, q2_key) = (p2.to_string(), q2.to_string());
    if !((p_key == p2_key && q_key == q2_key) || (p_key == q2_key && q_key == p2_key)) {
        return None;
    }

    let same_sign = sin_term.coeff == cos_term.coeff;
    let (sign, angle) = if same_sign {
        angle_sub(p, q)
    } else {
        angle_add(p, q)
    };

    let (mult, factor) = trig_factor(Trig::Cos, sign, angle);
    finish_merge(cos_term.coeff * mult, factor, common)
}

/// `lead_term` holds `sin(P)*cos(Q)`, `other` holds `cos(P)*sin(Q)`:
/// same sign merges to `sin(P+Q)`, opposite sign to `sin(P-Q)`, with the
/// result carrying the lead term's coefficient. The crossed angle match
/// (lead sin angle == other cos angle) is what distinguishes a genuine
/// pair from two unrelated products.
fn merge_sin_rule(
    lead_term: &STerm,
    other: &STerm,
    lead_pair: ((Trig, &Expr), (Trig, &Expr)),
    other_pair: ((Trig, &Expr), (Trig, &Expr)),
    common: &[SFactor],
) -> Option<Merged> {
    let (sin_a, cos_a) = orient_sin_cos(lead_pair)?;
    let (sin_b, cos_b) = orient_sin_cos(other_pair)?;

    // lead = sin(P)cos(Q), other = cos(P)sin(Q)
    let p = sin_a;
    let q = cos_a;
    if cos_b.to_string() != p.to_string() || sin_b.to_string() != q.to_string() {
        return None;
    }

    let same_sign = other.coeff == lead_term.coeff;
    let (sign, angle) = if same_sign {
        angle_add(p, q)
    } else {
        angle_sub(p, q)
    };

    let (mult, factor) = trig_factor(Trig::Sin, sign, angle);
    finish_merge(lead_term.coeff * mult, factor, common)
}

/// Split a two-factor trig pair into its sin and cos angles.
fn orient_sin_cos<'a>(
    pair: ((Trig, &'a Expr), (Trig, &'a Expr)),
) -> Option<(&'a Expr, &'a Expr)> {
    match pair {
        ((Trig::Sin, s), (Trig::Cos, c)) | ((Trig::Cos, c), (Trig::Sin, s)) => Some((s, c)),
        _ => None,
    }
}

fn finish_merge(coeff: f64, factor: Option<SFactor>, common: &[SFactor]) -> Option<Merged> {
    if coeff == 0.0 {
        return Some(Merged::Zero);
    }
    let mut factors: Vec<SFactor> = common.to_vec();
    if let Some(factor) = factor {
        factors.push(factor);
    }
    factors.sort_by(|a, b| a.key.cmp(&b.key));
    Some(Merged::Term(STerm { coeff, factors }))
}

/// Multiset difference of the two terms' factors, by key.
fn factor_diff<'a>(a: &'a STerm, b: &'a STerm) -> (Vec<&'a SFactor>, Vec<&'a SFactor>) {
    let mut b_remaining: Vec<Option<&SFactor>> = b.factors.iter().map(Some).collect();
    let mut only_a = Vec::new();
    for factor in &a.factors {
        let matched = b_remaining
            .iter_mut()
            .find(|slot| slot.is_some_and(|f| f.key == factor.key));
        match matched {
            Some(slot) => *slot = None,
            None => only_a.push(factor),
        }
    }
    let only_b = b_remaining.into_iter().flatten().collect();
    (only_a, only_b)
}

/// The factors of `term` minus the (at most two) factors in `removed`.
fn residual_factors(term: &STerm, removed: &[&SFactor]) -> Vec<SFactor> {
    let mut skip: Vec<&str> = removed.iter().map(|f| f.key.as_str()).collect();
    let mut out = Vec::with_capacity(term.factors.len());
    for factor in &term.factors {
        if let Some(pos) = skip.iter().position(|k| *k == factor.key) {
            skip.remove(pos);
        } else {
            out.push(factor.clone());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Simplify one scalar expression to fixpoint.
///
/// Idempotent: re-running on already-simplified output yields an identical
/// term set.
pub fn simplify(expr: &Expr) -> Expr {
    let mut terms = normalize(expr);

    'scan: loop {
        for i in 0..terms.len() {
            for j in (i + 1)..terms.len() {
                if let Some(merged) = try_merge(&terms[i], &terms[j]) {
                    terms.remove(j);
                    terms.remove(i);
                    if let Merged::Term(term) = merged {
                        terms.push(term);
                    }
                    continue 'scan;
                }
            }
        }
        break;
    }

    let mut rebuilt: Vec<Expr> = terms.into_iter().map(STerm::into_expr).collect();
    rebuilt.sort_by_key(|term| term.to_string());
    Expr::sum(rebuilt)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn simplified(text: &str) -> String {
        simplify(&Expr::parse(text).unwrap()).to_string()
    }

    #[test]
    fn sin_sum_identity() {
        assert_eq!(simplified("sin(t1)*cos(t2)+cos(t1)*sin(t2)"), "sin(t1+t2)");
    }

    #[test]
    fn sin_difference_identity() {
        assert_eq!(
            simplified("sin(t1)*cos(t2)-cos(t1)*sin(t2)"),
            "sin(t1+(-1)*t2)"
        );
    }

    #[test]
    fn cos_difference_identity() {
        assert_eq!(
            simplified("cos(t1)*cos(t2)+sin(t1)*sin(t2)"),
            "cos(t1+(-1)*t2)"
        );
    }

    #[test]
    fn cos_sum_identity() {
        assert_eq!(
            simplified("cos(t1)*cos(t2)-sin(t1)*sin(t2)"),
            "cos(t1+t2)"
        );
    }

    #[test]
    fn same_angle_double_angle() {
        assert_eq!(simplified("sin(t1)*cos(t1)+cos(t1)*sin(t1)"), "sin(2*t1)");
    }

    #[test]
    fn same_angle_pythagorean() {
        // cos^2 + sin^2 -> cos(0) -> 1
        assert_eq!(simplified("cos(t1)*cos(t1)+sin(t1)*sin(t1)"), "1");
        assert_eq!(simplified("cos(t1)^2+sin(t1)^2"), "1");
    }

    #[test]
    fn same_angle_cos_double() {
        assert_eq!(simplified("cos(t1)^2-sin(t1)^2"), "cos(2*t1)");
    }

    #[test]
    fn exact_cancellation() {
        assert_eq!(simplified("sin(t1)*cos(t2)-sin(t1)*cos(t2)"), "0");
    }

    #[test]
    fn shared_factors_are_carried() {
        assert_eq!(
            simplified("3*d3*sin(t1)*cos(t2)+3*d3*cos(t1)*sin(t2)"),
            "3*d3*sin(t1+t2)"
        );
    }

    #[test]
    fn mismatched_coefficients_do_not_merge() {
        let out = simplified("2*sin(t1)*cos(t2)+3*cos(t1)*sin(t2)");
        assert_eq!(out, "2*cos(t2)*sin(t1)+3*cos(t1)*sin(t2)");
    }

    #[test]
    fn mismatched_angles_do_not_merge() {
        let out = simplified("sin(t1)*cos(t2)+cos(t3)*sin(t2)");
        assert_eq!(out, "cos(t2)*sin(t1)+cos(t3)*sin(t2)");
    }

    #[test]
    fn merged_angles_can_merge_again() {
        // Two passes: inner pairs first, then the compound angles.
        let text = "sin(t1)*cos(t2)*cos(t3)+cos(t1)*sin(t2)*cos(t3)\
                    +cos(t1)*cos(t2)*sin(t3)-sin(t1)*sin(t2)*sin(t3)";
        assert_eq!(simplified(text), "sin(t1+t2+t3)");
    }

    #[test]
    fn fixpoint_is_idempotent() {
        for text in [
            "sin(t1)*cos(t2)+cos(t1)*sin(t2)",
            "2*sin(t1)*cos(t2)+3*cos(t1)*sin(t2)",
            "cos(t1)*cos(t2)*d3+sin(t1)*sin(t2)*d3+cos(t1)",
            "5*td1+(-3)*td2*cos(t1)",
        ] {
            let once = simplify(&Expr::parse(text).unwrap());
            let twice = simplify(&once);
            assert_eq!(once, twice, "not idempotent for {text}");
        }
    }

    #[test]
    fn like_terms_collect() {
        assert_eq!(simplified("2*cos(t1)+3*cos(t1)"), "5*cos(t1)");
    }

    #[test]
    fn random_expressions_preserve_value_under_simplification() {
        use approx::assert_relative_eq;
        use dhsym_expr::{Scope, Var};
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(19);

        let random_angle = |rng: &mut ChaCha8Rng| -> Expr {
            let a = Expr::sym(Var::Theta(rng.gen_range(1..=3)));
            match rng.gen_range(0..4) {
                0 => a,
                1 => a + Expr::sym(Var::Theta(rng.gen_range(1..=3))),
                2 => a - Expr::sym(Var::Theta(rng.gen_range(1..=3))),
                _ => -a,
            }
        };

        for _ in 0..200 {
            let mut terms = Vec::new();
            for _ in 0..rng.gen_range(1..=5) {
                let sign = if rng.gen_bool(0.5) { -1.0 } else { 1.0 };
                let mut term = Expr::num(sign * f64::from(rng.gen_range(1..=3u8)));
                for _ in 0..rng.gen_range(1..=3) {
                    let angle = random_angle(&mut rng);
                    term = if rng.gen_bool(0.5) {
                        term * Expr::sin(angle)
                    } else {
                        term * Expr::cos(angle)
                    };
                }
                terms.push(term);
            }
            let expr = Expr::sum(terms);
            let simplified = simplify(&expr);
            assert_eq!(simplify(&simplified), simplified);

            let scope = Scope::new()
                .bind(Var::Theta(1), rng.gen_range(-3.0..3.0))
                .bind(Var::Theta(2), rng.gen_range(-3.0..3.0))
                .bind(Var::Theta(3), rng.gen_range(-3.0..3.0));
            assert_relative_eq!(
                expr.evaluate(&scope).unwrap(),
                simplified.evaluate(&scope).unwrap(),
                epsilon = 1e-9,
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn negated_angle_normalizes() {
        // sin(-t1) = -sin(t1); cos(-t1) = cos(t1)
        assert_eq!(simplified("sin(-t1)+sin(t1)"), "0");
        assert_eq!(simplified("cos(-t1)-cos(t1)"), "0");
    }
}
