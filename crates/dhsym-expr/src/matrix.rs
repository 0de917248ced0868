//! Symbolic vectors and matrices over [`Expr`].
//!
//! The dense [`SymMatrix`] serializes as `matrix([e11,e12,...],[e21,...])`;
//! parsing splits on depth-zero brackets and hands each entry to the
//! expression parser, so producer and consumer agree bit-exactly on the
//! nesting.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EvalError, ParseError};
use crate::expr::{Expr, Scope};

// ---------------------------------------------------------------------------
// SymVector3
// ---------------------------------------------------------------------------

/// A 3-vector of symbolic expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct SymVector3(pub [Expr; 3]);

impl SymVector3 {
    pub fn zeros() -> Self {
        Self([Expr::zero(), Expr::zero(), Expr::zero()])
    }

    pub fn new(x: Expr, y: Expr, z: Expr) -> Self {
        Self([x, y, z])
    }

    pub fn x(&self) -> &Expr {
        &self.0[0]
    }

    pub fn y(&self) -> &Expr {
        &self.0[1]
    }

    pub fn z(&self) -> &Expr {
        &self.0[2]
    }

    /// Symbolic cross product `self x rhs`.
    pub fn cross(&self, rhs: &Self) -> Self {
        let [a1, a2, a3] = &self.0;
        let [b1, b2, b3] = &rhs.0;
        Self([
            a2.clone() * b3.clone() - a3.clone() * b2.clone(),
            a3.clone() * b1.clone() - a1.clone() * b3.clone(),
            a1.clone() * b2.clone() - a2.clone() * b1.clone(),
        ])
    }

    pub fn add(&self, rhs: &Self) -> Self {
        Self(std::array::from_fn(|i| {
            self.0[i].clone() + rhs.0[i].clone()
        }))
    }

    /// Expand every component to additive normal form.
    pub fn expanded(&self) -> Self {
        Self(std::array::from_fn(|i| self.0[i].expand()))
    }
}

// ---------------------------------------------------------------------------
// SymMatrix3
// ---------------------------------------------------------------------------

/// A 3x3 matrix of symbolic expressions (rotation matrices, mostly).
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix3([[Expr; 3]; 3]);

impl SymMatrix3 {
    pub fn identity() -> Self {
        Self(std::array::from_fn(|r| {
            std::array::from_fn(|c| if r == c { Expr::one() } else { Expr::zero() })
        }))
    }

    pub fn from_rows(rows: [[Expr; 3]; 3]) -> Self {
        Self(rows)
    }

    pub fn get(&self, row: usize, col: usize) -> &Expr {
        &self.0[row][col]
    }

    pub fn transpose(&self) -> Self {
        Self(std::array::from_fn(|r| {
            std::array::from_fn(|c| self.0[c][r].clone())
        }))
    }

    /// `self * v`, components expanded.
    pub fn mul_vec(&self, v: &SymVector3) -> SymVector3 {
        SymVector3(std::array::from_fn(|r| {
            let mut acc = Expr::zero();
            for c in 0..3 {
                acc = acc + self.0[r][c].clone() * v.0[c].clone();
            }
            acc.expand()
        }))
    }

    pub fn mul_mat(&self, rhs: &Self) -> Self {
        Self(std::array::from_fn(|r| {
            std::array::from_fn(|c| {
                let mut acc = Expr::zero();
                for k in 0..3 {
                    acc = acc + self.0[r][k].clone() * rhs.0[k][c].clone();
                }
                acc.expand()
            })
        }))
    }
}

// ---------------------------------------------------------------------------
// SymMatrix
// ---------------------------------------------------------------------------

/// A dense rows x cols matrix of symbolic expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Expr>,
}

impl SymMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![Expr::zero(); rows * cols],
        }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> Expr) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    /// Build from row vectors. Panics if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<Expr>>) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|r| r.len() == ncols),
            "ragged rows in SymMatrix::from_rows"
        );
        Self {
            rows: nrows,
            cols: ncols,
            data: rows.into_iter().flatten().collect(),
        }
    }

    /// Embed a 3x3 block twice along the diagonal: `[[R, 0], [0, R]]`.
    pub fn doubled(block: &SymMatrix3) -> Self {
        Self::from_fn(6, 6, |r, c| {
            if r < 3 && c < 3 {
                block.get(r, c).clone()
            } else if r >= 3 && c >= 3 {
                block.get(r - 3, c - 3).clone()
            } else {
                Expr::zero()
            }
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> &Expr {
        &self.data[row * self.cols + col]
    }

    /// `self * rhs`, entries expanded. Panics on dimension mismatch.
    pub fn mul(&self, rhs: &Self) -> Self {
        assert_eq!(
            self.cols, rhs.rows,
            "dimension mismatch: {}x{} * {}x{}",
            self.rows, self.cols, rhs.rows, rhs.cols
        );
        Self::from_fn(self.rows, rhs.cols, |r, c| {
            let mut acc = Expr::zero();
            for k in 0..self.cols {
                acc = acc + self.get(r, k).clone() * rhs.get(k, c).clone();
            }
            acc.expand()
        })
    }

    /// Apply `f` to every entry.
    pub fn map(&self, mut f: impl FnMut(&Expr) -> Expr) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|e| f(e)).collect(),
        }
    }

    /// Evaluate every entry under `scope` into a row-major `Vec<f64>`.
    pub fn evaluate(&self, scope: &Scope) -> Result<Vec<f64>, EvalError> {
        self.data.iter().map(|e| e.evaluate(scope)).collect()
    }

    /// Parse the `matrix([...],[...])` wire form.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = input.trim();
        let inner = text
            .strip_prefix("matrix(")
            .and_then(|t| t.strip_suffix(')'))
            .ok_or_else(|| ParseError::MalformedMatrix("missing matrix(...) wrapper".into()))?;

        let mut rows: Vec<Vec<Expr>> = Vec::new();
        for row_text in split_depth_zero(inner, ',') {
            let row_text = row_text.trim();
            let row_inner = row_text
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .ok_or_else(|| {
                    ParseError::MalformedMatrix(format!("row is not bracketed: {row_text}"))
                })?;
            let mut row = Vec::new();
            for entry in split_depth_zero(row_inner, ',') {
                row.push(Expr::parse(entry.trim())?);
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Err(ParseError::MalformedMatrix("no rows".into()));
        }
        let ncols = rows[0].len();
        if !rows.iter().all(|r| r.len() == ncols) {
            return Err(ParseError::MalformedMatrix("ragged rows".into()));
        }
        Ok(Self::from_rows(rows))
    }
}

/// Split `text` at occurrences of `sep` that sit at bracket depth zero.
fn split_depth_zero(text: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

impl std::fmt::Display for SymMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "matrix(")?;
        for r in 0..self.rows {
            if r > 0 {
                write!(f, ",")?;
            }
            write!(f, "[")?;
            for c in 0..self.cols {
                if c > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", self.get(r, c))?;
            }
            write!(f, "]")?;
        }
        write!(f, ")")
    }
}

impl Serialize for SymMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SymMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
