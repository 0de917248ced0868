//! Symbolic velocity propagation down the serial chain.
//!
//! Runs the standard recursive Newton-Euler velocity propagation, evaluated
//! symbolically: starting from `omega_0 = v_0 = 0`, each DH row rotates the
//! accumulated angular/linear velocity into its own frame and adds the
//! joint's rate contribution. The output is the end-effector velocity pair
//! as fully expanded expressions over `t{n}`/`d{n}` and their rates.

use dhsym_core::{JointKind, RobotDescription, SpecError};
use dhsym_expr::{Expr, SymMatrix3, SymVector3, Var};

/// End-effector velocity in the end-effector frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagatedVelocity {
    /// Linear velocity components `[vx, vy, vz]`.
    pub v: SymVector3,
    /// Angular velocity components `[wx, wy, wz]`.
    pub omega: SymVector3,
}

/// Output of one propagation run over a validated description.
#[derive(Debug, Clone)]
pub struct Propagation {
    pub velocity: PropagatedVelocity,
    /// Per-row link rotation `R(i-1, i)`, in chain order, terminal row
    /// included. Consumed by the frame converter.
    pub link_rotations: Vec<SymMatrix3>,
}

/// Build the link rotation `R(i-1, i)` for one DH row (modified DH).
///
/// `theta` may be symbolic (revolute) or constant; `alpha` is always a
/// fixed numeric constant, so its trig collapses at expansion time.
fn link_rotation(theta: &Expr, alpha: f64) -> SymMatrix3 {
    let (sa, ca) = alpha.sin_cos();
    let st = Expr::sin(theta.clone());
    let ct = Expr::cos(theta.clone());
    SymMatrix3::from_rows([
        [ct.clone(), -st.clone(), Expr::zero()],
        [
            st.clone() * Expr::num(ca),
            ct.clone() * Expr::num(ca),
            Expr::num(-sa),
        ],
        [st * Expr::num(sa), ct * Expr::num(sa), Expr::num(ca)],
    ])
}

/// The rate symbols of the actuated joints, in chain (column) order.
pub fn rate_symbols(desc: &RobotDescription) -> Vec<Var> {
    let mut symbols = Vec::with_capacity(desc.dof());
    let mut index = 0u32;
    for joint in &desc.joints {
        match joint.kind {
            JointKind::Revolute => {
                index += 1;
                symbols.push(Var::ThetaDot(index));
            }
            JointKind::Prismatic => {
                index += 1;
                symbols.push(Var::DDot(index));
            }
            JointKind::EndEffector => {}
        }
    }
    symbols
}

/// The position symbols of the actuated joints, in chain (column) order.
pub fn position_symbols(desc: &RobotDescription) -> Vec<Var> {
    let mut symbols = Vec::with_capacity(desc.dof());
    let mut index = 0u32;
    for joint in &desc.joints {
        match joint.kind {
            JointKind::Revolute => {
                index += 1;
                symbols.push(Var::Theta(index));
            }
            JointKind::Prismatic => {
                index += 1;
                symbols.push(Var::D(index));
            }
            JointKind::EndEffector => {}
        }
    }
    symbols
}

/// Propagate end-effector velocity expressions for `desc`.
///
/// # Errors
///
/// Rejects invalid descriptions with [`SpecError`] before touching any
/// symbolic state.
pub fn propagate(desc: &RobotDescription) -> Result<Propagation, SpecError> {
    desc.validate()?;

    let mut omega = SymVector3::zeros();
    let mut v = SymVector3::zeros();
    let mut link_rotations = Vec::with_capacity(desc.joints.len());
    let mut index = 0u32;

    for joint in &desc.joints {
        // Actuated variables get a symbol (plus any fixed zero-offset);
        // everything else stays numeric and folds during expansion.
        let (theta, d) = match joint.kind {
            JointKind::Revolute => {
                index += 1;
                let mut theta = Expr::sym(Var::Theta(index));
                if joint.row.theta != 0.0 {
                    theta = theta + Expr::num(joint.row.theta);
                }
                (theta, Expr::num(joint.row.d))
            }
            JointKind::Prismatic => {
                index += 1;
                let mut d = Expr::sym(Var::D(index));
                if joint.row.d != 0.0 {
                    d = d + Expr::num(joint.row.d);
                }
                (Expr::num(joint.row.theta), d)
            }
            JointKind::EndEffector => (Expr::num(joint.row.theta), Expr::num(joint.row.d)),
        };

        let rotation = link_rotation(&theta, joint.row.alpha);
        let transposed = rotation.transpose();

        // Frame-i origin expressed in frame i-1.
        let (sa, ca) = joint.row.alpha.sin_cos();
        let translation = SymVector3::new(
            Expr::num(joint.row.a),
            Expr::num(-sa) * d.clone(),
            Expr::num(ca) * d,
        );

        let carried = v.add(&omega.cross(&translation));
        let mut next_v = transposed.mul_vec(&carried);
        let mut next_omega = transposed.mul_vec(&omega);

        match joint.kind {
            JointKind::Revolute => {
                next_omega = next_omega
                    .add(&SymVector3::new(
                        Expr::zero(),
                        Expr::zero(),
                        Expr::sym(Var::ThetaDot(index)),
                    ))
                    .expanded();
            }
            JointKind::Prismatic => {
                next_v = next_v
                    .add(&SymVector3::new(
                        Expr::zero(),
                        Expr::zero(),
                        Expr::sym(Var::DDot(index)),
                    ))
                    .expanded();
            }
            JointKind::EndEffector => {}
        }

        omega = next_omega;
        v = next_v;
        link_rotations.push(rotation);
    }

    Ok(Propagation {
        velocity: PropagatedVelocity { v, omega },
        link_rotations,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
