//! Tasks and standard jobs.
//!
//! A task is the primitive of simulated work; a standard job is an
//! ordered collection of tasks submitted to one compute service. Both are
//! plain value types: the engine tracks runtime state (submit and end
//! dates) separately, keyed by job name.

use serde::{Deserialize, Serialize};

/// An immutable unit of work inside a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task name.
    pub name: String,
    /// Compute cost in flops.
    pub flops: f64,
    /// Minimum number of cores the task can run on.
    pub min_cores: u32,
    /// Maximum number of cores the task can use.
    pub max_cores: u32,
    /// Memory requirement in bytes.
    pub memory: f64,
}

/// A standard job: an ordered collection of tasks.
///
/// The name is engine-assigned and unique for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardJob {
    /// Engine-assigned job name.
    pub name: String,
    /// The job's tasks, in execution order.
    pub tasks: Vec<TaskSpec>,
}

impl StandardJob {
    /// Total compute cost of the job in flops.
    pub fn total_flops(&self) -> f64 {
        self.tasks.iter().map(|t| t.flops).sum()
    }

    /// The widest minimum-core requirement across the job's tasks.
    pub fn min_cores_required(&self) -> u32 {
        self.tasks.iter().map(|t| t.min_cores).max().unwrap_or(0)
    }

    /// Number of tasks in the job.
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_tasks(flops: &[f64]) -> StandardJob {
        StandardJob {
            name: "standard_job_1".to_owned(),
            tasks: flops
                .iter()
                .enumerate()
                .map(|(i, f)| TaskSpec {
                    name: format!("t{i}"),
                    flops: *f,
                    min_cores: 1,
                    max_cores: 1,
                    memory: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn total_flops_sums_tasks() {
        let job = job_with_tasks(&[100.0, 250.0]);
        assert_eq!(job.total_flops(), 350.0);
        assert_eq!(job.num_tasks(), 2);
    }

    #[test]
    fn min_cores_is_widest_requirement() {
        let mut job = job_with_tasks(&[100.0, 100.0]);
        job.tasks[1].min_cores = 8;
        assert_eq!(job.min_cores_required(), 8);
    }

    #[test]
    fn empty_job_has_zero_cost() {
        let job = job_with_tasks(&[]);
        assert_eq!(job.total_flops(), 0.0);
        assert_eq!(job.min_cores_required(), 0);
    }
}
