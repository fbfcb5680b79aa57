//! Fixed-point solver for cyclic groups
//!
//! Members of a cyclic group are updated sequentially in declaration
//! order; each update is immediately visible to the members evaluated
//! after it within the same sweep (Gauss-Seidel, not Jacobi). The group
//! converges when the maximum absolute change across members in one
//! sweep drops below the caller's threshold.
//!
//! Exhausting the iteration cap is a diagnostic, not an error: the last
//! computed values are kept and the group is reported not converged.

use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, trace};

use metron_foundation::AttributeId;
use metron_model::{AttributeSpec, DefinitionError, DepSnapshot, SealedModel};

use crate::error::{Error, Result};
use crate::types::{GroupDiagnostic, RunOptions};

/// Values and diagnostics of one solved cyclic group
pub(crate) struct GroupOutcome {
    /// Final member values, in update order
    pub values: Vec<(AttributeId, f64)>,
    pub diagnostic: GroupDiagnostic,
    /// The wall-clock deadline fired before convergence
    pub deadline_hit: bool,
}

/// Iterate one cyclic group to a fixed point.
///
/// `context` is the read-only evaluation context with every dependency
/// from earlier levels already materialized. `seeds` supplies warm-start
/// values for members (last cached snapshot); members without a seed
/// start at zero.
pub(crate) fn solve_group(
    model: &SealedModel,
    members: &[AttributeId],
    context: &IndexMap<AttributeId, f64>,
    seeds: Option<&IndexMap<AttributeId, f64>>,
    opts: &RunOptions,
    deadline: Option<Instant>,
) -> Result<GroupOutcome> {
    let mut local = context.clone();
    for member in members {
        let seed = seeds
            .and_then(|s| s.get(member))
            .copied()
            .unwrap_or(0.0);
        local.insert(member.clone(), seed);
    }

    let mut iterations = 0u32;
    let mut converged = false;
    let mut max_delta = f64::INFINITY;
    let mut deadline_hit = false;

    while iterations < opts.max_iterations {
        if let Some(cancel) = &opts.cancel {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        iterations += 1;

        let previous: Vec<f64> = members.iter().map(|m| local[m]).collect();

        // Sequential sweep: each update is visible to later members
        for member in members {
            let attr = model
                .resolve(member)
                .ok_or_else(|| DefinitionError::UnknownAttribute(member.clone()))?;
            let AttributeSpec::Calculated {
                dependencies,
                formula,
            } = &attr.spec
            else {
                // Inputs have no incoming edges and can never be cyclic
                continue;
            };
            let value = formula(&DepSnapshot::new(&local, dependencies));
            if !value.is_finite() {
                return Err(Error::FormulaEvaluation {
                    attribute: member.clone(),
                    iteration: iterations,
                    message: if value.is_nan() {
                        "NaN result"
                    } else {
                        "infinite result"
                    },
                });
            }
            local.insert(member.clone(), value);
        }

        max_delta = members
            .iter()
            .zip(&previous)
            .map(|(m, prev)| (local[m] - prev).abs())
            .fold(0.0, f64::max);
        trace!(iteration = iterations, max_delta, "solver sweep");

        if max_delta < opts.threshold {
            converged = true;
            break;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                deadline_hit = true;
                break;
            }
        }
    }

    debug!(
        members = members.len(),
        iterations, converged, max_delta, "group solved"
    );

    let values = members.iter().map(|m| (m.clone(), local[m])).collect();
    Ok(GroupOutcome {
        values,
        diagnostic: GroupDiagnostic {
            members: members.to_vec(),
            converged,
            iterations,
            max_delta,
        },
        deadline_hit,
    })
}
