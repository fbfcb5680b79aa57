//! Evaluation scheduler
//!
//! Walks the condensed dependency graph level by level. Within a level,
//! acyclic attributes and cyclic groups touch disjoint attribute sets
//! and are evaluated concurrently; their results are applied to the
//! context sequentially for determinism. Levels are separated by a
//! barrier: by the time a level starts, every dependency of its nodes
//! is materialized in the context.

use std::time::Instant;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{instrument, trace, warn};

use metron_foundation::AttributeId;
use metron_model::{AttributeSpec, DefinitionError, DepSnapshot, SealedModel};

use crate::analyze::Analysis;
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::solver::{solve_group, GroupOutcome};
use crate::types::{GroupDiagnostic, RunOptions, RunState};

/// Outcome of one scheduled run
pub struct ScheduleOutcome {
    /// Every attribute's final value, in model declaration order
    pub values: IndexMap<AttributeId, f64>,
    pub diagnostics: Vec<GroupDiagnostic>,
    /// `Done`, or `Exhausted` when any group missed convergence
    pub state: RunState,
    /// A wall-clock deadline cut at least one group short; such results
    /// are not value-deterministic and must not be cached
    pub deadline_hit: bool,
}

enum TaskOutcome {
    /// Input already bound in the context
    Bound,
    Single(AttributeId, f64),
    Group(GroupOutcome),
}

/// Executes one evaluation run over an analyzed model.
pub struct Scheduler<'a> {
    model: &'a SealedModel,
    graph: &'a DependencyGraph,
    analysis: &'a Analysis,
}

impl<'a> Scheduler<'a> {
    pub fn new(model: &'a SealedModel, graph: &'a DependencyGraph, analysis: &'a Analysis) -> Self {
        Self {
            model,
            graph,
            analysis,
        }
    }

    /// Run the full schedule: bind inputs, process levels in order,
    /// assemble the final context and convergence diagnostics.
    #[instrument(skip_all, fields(levels = self.analysis.levels.len()))]
    pub fn execute(
        &self,
        inputs: &IndexMap<AttributeId, f64>,
        warm: Option<&IndexMap<AttributeId, f64>>,
        opts: &RunOptions,
    ) -> Result<ScheduleOutcome> {
        let state = RunState::Initializing;
        trace!(?state, inputs = inputs.len(), "run starting");

        let mut context: IndexMap<AttributeId, f64> =
            IndexMap::with_capacity(self.model.len());
        for (id, value) in inputs {
            context.insert(id.clone(), *value);
        }

        let deadline = opts.deadline.map(|d| Instant::now() + d);
        let mut diagnostics = Vec::new();
        let mut deadline_hit = false;

        for (level_idx, level) in self.analysis.levels.iter().enumerate() {
            if let Some(cancel) = &opts.cancel {
                if cancel.is_cancelled() {
                    trace!(state = ?RunState::Cancelled, level = level_idx, "run cancelled");
                    return Err(Error::Cancelled);
                }
            }

            let has_cyclic = level
                .components
                .iter()
                .any(|&c| self.analysis.components[c].cyclic);
            let state = if has_cyclic {
                RunState::Converging
            } else {
                RunState::LevelProcessing
            };
            trace!(?state, level = level_idx, components = level.components.len(), "level start");

            // Components within a level touch disjoint attribute sets
            let outcomes: Vec<Result<TaskOutcome>> = level
                .components
                .par_iter()
                .map(|&ci| self.run_component(ci, &context, warm, opts, deadline))
                .collect();

            // Apply sequentially for determinism
            for outcome in outcomes {
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        trace!(state = ?RunState::from_error(&err), level = level_idx, "run aborted");
                        return Err(err);
                    }
                };
                match outcome {
                    TaskOutcome::Bound => {}
                    TaskOutcome::Single(id, value) => {
                        context.insert(id, value);
                    }
                    TaskOutcome::Group(group) => {
                        for (id, value) in group.values {
                            context.insert(id, value);
                        }
                        if !group.diagnostic.converged {
                            warn!(
                                members = ?group.diagnostic.members,
                                iterations = group.diagnostic.iterations,
                                max_delta = group.diagnostic.max_delta,
                                "cyclic group did not converge"
                            );
                        }
                        deadline_hit |= group.deadline_hit;
                        diagnostics.push(group.diagnostic);
                    }
                }
            }
        }

        let state = if diagnostics.iter().all(|d| d.converged) {
            RunState::Done
        } else {
            RunState::Exhausted
        };
        trace!(?state, "run complete");

        // Reorder to model declaration order; every attribute was
        // materialized by some level
        let values = self
            .model
            .attribute_ids()
            .map(|id| (id.clone(), context[id]))
            .collect();

        Ok(ScheduleOutcome {
            values,
            diagnostics,
            state,
            deadline_hit,
        })
    }

    fn run_component(
        &self,
        component: usize,
        context: &IndexMap<AttributeId, f64>,
        warm: Option<&IndexMap<AttributeId, f64>>,
        opts: &RunOptions,
        deadline: Option<Instant>,
    ) -> Result<TaskOutcome> {
        let comp = &self.analysis.components[component];
        if comp.cyclic {
            let members: Vec<AttributeId> = comp
                .members
                .iter()
                .map(|&n| self.graph.id(n).clone())
                .collect();
            let outcome = solve_group(self.model, &members, context, warm, opts, deadline)?;
            return Ok(TaskOutcome::Group(outcome));
        }

        let id = self.graph.id(comp.members[0]);
        let attr = self
            .model
            .resolve(id)
            .ok_or_else(|| DefinitionError::UnknownAttribute(id.clone()))?;
        match &attr.spec {
            // Inputs are bound during initialization
            AttributeSpec::Input { .. } => Ok(TaskOutcome::Bound),
            AttributeSpec::Calculated {
                dependencies,
                formula,
            } => {
                let value = formula(&DepSnapshot::new(context, dependencies));
                if !value.is_finite() {
                    return Err(Error::FormulaEvaluation {
                        attribute: id.clone(),
                        iteration: 0,
                        message: if value.is_nan() {
                            "NaN result"
                        } else {
                            "infinite result"
                        },
                    });
                }
                Ok(TaskOutcome::Single(id.clone(), value))
            }
        }
    }
}
