//! The derivation coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;
use tracing::{debug, warn};

use dhsym_core::{RobotDescription, SpecError, TopologyVersion};
use dhsym_expr::{Expr, SymMatrix};
use dhsym_jacobian::extractor::VelocityComponent;
use dhsym_jacobian::frame::convert_to_base;
use dhsym_jacobian::propagator::{propagate, rate_symbols};
use dhsym_jacobian::simplify::simplify;
use dhsym_jacobian::{FinalJacobianData, extract_row};

/// Pipeline-facing errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("specification error: {0}")]
    Spec(#[from] SpecError),

    #[error("pipeline is shut down")]
    Disconnected,
}

enum Command {
    Derive {
        desc: RobotDescription,
        version: TopologyVersion,
    },
    Shutdown,
}

/// Handle to the derivation coordinator thread.
///
/// Dropping the handle shuts the coordinator down and joins it.
pub struct JacobianPipeline {
    command_tx: Sender<Command>,
    result_rx: Receiver<FinalJacobianData>,
    latest: Arc<AtomicU64>,
    coordinator: Option<JoinHandle<()>>,
}

impl JacobianPipeline {
    /// Start the coordinator thread.
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let latest = Arc::new(AtomicU64::new(0));

        let coordinator = {
            let latest = Arc::clone(&latest);
            std::thread::spawn(move || coordinate(&command_rx, &result_tx, &latest))
        };

        Self {
            command_tx,
            result_rx,
            latest,
            coordinator: Some(coordinator),
        }
    }

    /// Request a derivation for `desc`, superseding any outstanding work.
    ///
    /// Returns the topology version the eventual artifact will carry.
    /// The version is bumped before this call returns, so work for any
    /// older version is already condemned by the time the caller observes
    /// the new id.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Spec`] if the description fails validation (checked
    /// here, before derivation starts); [`PipelineError::Disconnected`] if
    /// the coordinator is gone.
    pub fn request(&self, desc: RobotDescription) -> Result<TopologyVersion, PipelineError> {
        desc.validate()?;
        let version = TopologyVersion(self.latest.fetch_add(1, Ordering::SeqCst) + 1);
        self.command_tx
            .send(Command::Derive { desc, version })
            .map_err(|_| PipelineError::Disconnected)?;
        Ok(version)
    }

    /// Block until the next settled artifact arrives.
    pub fn settled(&self) -> Result<FinalJacobianData, PipelineError> {
        self.result_rx.recv().map_err(|_| PipelineError::Disconnected)
    }

    /// Non-blocking poll for a settled artifact.
    pub fn try_settled(&self) -> Option<FinalJacobianData> {
        self.result_rx.try_recv().ok()
    }

    /// The raw result channel, for callers integrating with their own
    /// event loop.
    pub fn results(&self) -> Receiver<FinalJacobianData> {
        self.result_rx.clone()
    }
}

impl Drop for JacobianPipeline {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(handle) = self.coordinator.take() {
            let _ = handle.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

fn coordinate(
    command_rx: &Receiver<Command>,
    result_tx: &Sender<FinalJacobianData>,
    latest: &AtomicU64,
) {
    while let Ok(command) = command_rx.recv() {
        match command {
            Command::Shutdown => break,
            Command::Derive { desc, version } => {
                if version.0 < latest.load(Ordering::SeqCst) {
                    debug!(%version, "request superseded before it started");
                    continue;
                }
                match derive_staged(&desc, version, latest) {
                    Ok(Some(artifact)) => {
                        if result_tx.send(artifact).is_err() {
                            break;
                        }
                    }
                    Ok(None) => debug!(%version, "abandoned stale derivation"),
                    // Validation runs in request(); reaching this means the
                    // description mutated between there and here.
                    Err(err) => warn!(%version, %err, "derivation rejected"),
                }
            }
        }
    }
}

/// Run the three stages for one topology version, abandoning at stage
/// boundaries once a newer version exists. Returns `None` when abandoned.
fn derive_staged(
    desc: &RobotDescription,
    version: TopologyVersion,
    latest: &AtomicU64,
) -> Result<Option<FinalJacobianData>, SpecError> {
    let is_stale = || latest.load(Ordering::SeqCst) != version.0;

    // Stage 1: velocity propagation (single dependency of every extractor).
    let propagation = propagate(desc)?;
    if is_stale() {
        return Ok(None);
    }

    // Stage 2: six independent extractions, fanned out across scoped
    // workers, joined through a channel. Row order is restored from the
    // component index; completion order is irrelevant.
    let rates = rate_symbols(desc);
    let mut collected: Vec<(usize, Vec<Expr>)> = std::thread::scope(|scope| {
        let (row_tx, row_rx) = unbounded();
        for component in VelocityComponent::ALL {
            let row_tx = row_tx.clone();
            let velocity = &propagation.velocity;
            let rates = &rates;
            scope.spawn(move || {
                let row = extract_row(component.select(velocity), rates);
                let _ = row_tx.send((component.index(), row.entries));
            });
        }
        drop(row_tx);
        row_rx.iter().collect()
    });
    assert_eq!(collected.len(), 6, "every extraction worker reports a row");
    collected.sort_by_key(|(index, _)| *index);
    if is_stale() {
        return Ok(None);
    }

    // Stage 3: stack, simplify, and re-express in the base frame.
    let rows = collected.into_iter().map(|(_, entries)| entries).collect();
    let complete_jacobian = SymMatrix::from_rows(rows).map(|e| simplify(e));
    let (conversion, final_jacobian) =
        convert_to_base(&complete_jacobian, &propagation.link_rotations);
    if is_stale() {
        return Ok(None);
    }

    Ok(Some(FinalJacobianData {
        complete_jacobian,
        doubled_rotation_matrices: conversion.doubled_rotations,
        down_to_zero_rot_mat: conversion.down_to_zero,
        final_jacobian,
        version,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use dhsym_core::{DhRow, JointKind, JointSpec};
    use std::time::Duration;

    fn planar(joints: usize) -> RobotDescription {
        let row = DhRow::new(2.0, 0.0, 0.0, 0.0);
        let mut desc = RobotDescription {
            name: format!("planar-{joints}r"),
            joints: vec![JointSpec::new(JointKind::Revolute, row); joints],
        };
        desc.joints.push(JointSpec::end_effector());
        desc
    }

    /// Deliberately heavy topology: nonzero twists defeat the planar
    /// shortcuts, so derivation stays busy long enough to supersede.
    fn spatial(joints: usize) -> RobotDescription {
        let row = DhRow::new(0.3, std::f64::consts::FRAC_PI_2, 0.1, 0.0);
        let mut desc = RobotDescription {
            name: format!("spatial-{joints}r"),
            joints: vec![JointSpec::new(JointKind::Revolute, row); joints],
        };
        desc.joints.push(JointSpec::end_effector());
        desc
    }

    #[test]
    fn single_request_settles_with_its_version() {
        let pipeline = JacobianPipeline::spawn();
        let version = pipeline.request(planar(3)).unwrap();
        let artifact = pipeline.settled().unwrap();
        assert_eq!(artifact.version, version);
        assert_eq!(artifact.final_jacobian.nrows(), 6);
        assert_eq!(artifact.final_jacobian.ncols(), 3);
    }

    #[test]
    fn staged_result_matches_synchronous_derivation() {
        let desc = planar(3);
        let pipeline = JacobianPipeline::spawn();
        pipeline.request(desc.clone()).unwrap();
        let staged = pipeline.settled().unwrap();
        let direct = dhsym_jacobian::derive_jacobian(&desc).unwrap();
        assert_eq!(
            staged.final_jacobian.to_string(),
            direct.final_jacobian.to_string()
        );
    }

    #[test]
    fn superseded_request_never_settles() {
        let pipeline = JacobianPipeline::spawn();
        // Request a heavy topology, then immediately supersede it. The
        // version bump happens synchronously in request(), so the first
        // derivation is condemned before its final staleness check.
        let first = pipeline.request(spatial(6)).unwrap();
        let second = pipeline.request(planar(2)).unwrap();
        assert!(second > first);

        let artifact = pipeline.settled().unwrap();
        assert_eq!(artifact.version, second);
        assert_eq!(artifact.final_jacobian.ncols(), 2);

        // Nothing else arrives: the stale artifact was discarded.
        assert!(pipeline
            .results()
            .recv_timeout(Duration::from_millis(200))
            .is_err());
    }

    #[test]
    fn invalid_description_is_rejected_at_request_time() {
        let pipeline = JacobianPipeline::spawn();
        let desc = RobotDescription {
            name: "bad".into(),
            joints: vec![JointSpec::revolute(0.0, 0.0, 0.0)],
        };
        assert!(matches!(
            pipeline.request(desc),
            Err(PipelineError::Spec(SpecError::MissingEndEffector(_)))
        ));
    }

    #[test]
    fn pipeline_is_reusable_across_topologies() {
        let pipeline = JacobianPipeline::spawn();

        let v1 = pipeline.request(planar(2)).unwrap();
        let first = pipeline.settled().unwrap();
        assert_eq!(first.version, v1);
        assert_eq!(first.final_jacobian.ncols(), 2);

        let v2 = pipeline.request(planar(4)).unwrap();
        let second = pipeline.settled().unwrap();
        assert_eq!(second.version, v2);
        assert_eq!(second.final_jacobian.ncols(), 4);
    }
}
