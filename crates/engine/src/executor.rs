// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-driven workflow executor.
//!
//! Validates the job graph up front, creates every job record tagged with
//! the workflow uuid, launches the initial ready set, and reacts to
//! terminal job events: satisfied predicates launch dependents, impossible
//! predicates cancel them (and, through re-evaluation, their transitive
//! downstream).

use crate::error::EngineError;
use crate::manager::JobManager;
use jl_core::{
    Clock, Event, FileUpload, Job, JobStatus, SystemClock, Workflow, WorkflowJobSpec,
    WorkflowStatus,
};
use jl_store::{NetworkStore, VolumeStore};
use jl_workflow::{validate, CompiledPredicate, ResourceCatalog, Tri};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Launch seam between the executor and the job runner.
pub trait JobLauncher: Send + Sync {
    /// Register a job record without starting it.
    fn create(&self, job: Job) -> Result<Job, EngineError>;
    /// Dispatch a previously created job into its sandbox.
    fn start(&self, uuid: &str) -> Result<(), EngineError>;
}

impl JobLauncher for Arc<crate::runner::JobRunner> {
    fn create(&self, job: Job) -> Result<Job, EngineError> {
        self.manager().create(job)
    }

    fn start(&self, uuid: &str) -> Result<(), EngineError> {
        self.launch(uuid)
    }
}

/// [`ResourceCatalog`] over the live stores plus the configured runtimes.
pub struct StoreCatalog {
    volumes: Arc<VolumeStore>,
    networks: Arc<NetworkStore>,
    runtimes: HashSet<String>,
}

impl StoreCatalog {
    pub fn new(volumes: Arc<VolumeStore>, networks: Arc<NetworkStore>, runtimes: Vec<String>) -> Self {
        Self { volumes, networks, runtimes: runtimes.into_iter().collect() }
    }
}

impl ResourceCatalog for StoreCatalog {
    fn volume_exists(&self, name: &str) -> bool {
        self.volumes.exists(name)
    }

    fn network_exists(&self, name: &str) -> bool {
        self.networks.exists(name)
    }

    fn runtime_exists(&self, name: &str) -> bool {
        self.runtimes.contains(name)
    }
}

pub struct WorkflowExecutor {
    manager: Arc<JobManager>,
    launcher: Arc<dyn JobLauncher>,
    catalog: Arc<dyn ResourceCatalog + Send + Sync>,
    workflows: Arc<RwLock<HashMap<String, Workflow>>>,
    clock: SystemClock,
}

impl WorkflowExecutor {
    pub fn new(
        manager: Arc<JobManager>,
        launcher: Arc<dyn JobLauncher>,
        catalog: Arc<dyn ResourceCatalog + Send + Sync>,
    ) -> Self {
        Self {
            manager,
            launcher,
            catalog,
            workflows: Arc::new(RwLock::new(HashMap::new())),
            clock: SystemClock,
        }
    }

    /// Validate and start a workflow. Returns its uuid; jobs run in a
    /// background task. Validation failure means nothing was created.
    pub fn run(
        &self,
        name: &str,
        yaml_content: &str,
        workflow_files: Vec<FileUpload>,
    ) -> Result<String, EngineError> {
        let (yaml_name, jobs) = jl_workflow::parse_yaml(yaml_content)?;
        let predicates = validate(&jobs, self.catalog.as_ref())?;

        let now = self.clock.epoch_ms();
        let display_name = if name.is_empty() {
            yaml_name.unwrap_or_else(|| "workflow".to_string())
        } else {
            name.to_string()
        };
        let mut workflow = Workflow::new(display_name, jobs, now);
        workflow.yaml_source = yaml_content.to_string();
        workflow.status = WorkflowStatus::Running;
        workflow.started_at_ms = Some(now);
        let workflow_uuid = workflow.uuid.clone();
        self.workflows.write().insert(workflow_uuid.clone(), workflow.clone());

        let run = WorkflowRun {
            manager: Arc::clone(&self.manager),
            launcher: Arc::clone(&self.launcher),
            workflows: Arc::clone(&self.workflows),
            workflow,
            predicates,
            workflow_files,
        };
        tokio::spawn(async move {
            if let Err(e) = run.execute().await {
                tracing::error!(error = %e, "workflow execution failed");
            }
        });
        Ok(workflow_uuid)
    }

    pub fn get(&self, uuid: &str) -> Result<Workflow, EngineError> {
        self.workflows
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| EngineError::not_found("workflow", uuid))
    }

    pub fn list(&self, include_completed: bool) -> Vec<Workflow> {
        self.workflows
            .read()
            .values()
            .filter(|w| include_completed || !w.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Jobs belonging to a workflow, from the live job set.
    pub fn jobs_of(&self, workflow_uuid: &str) -> Vec<Job> {
        self.manager
            .list()
            .into_iter()
            .filter(|j| j.workflow_uuid.as_deref() == Some(workflow_uuid))
            .collect()
    }
}

struct WorkflowRun {
    manager: Arc<JobManager>,
    launcher: Arc<dyn JobLauncher>,
    workflows: Arc<RwLock<HashMap<String, Workflow>>>,
    workflow: Workflow,
    predicates: HashMap<String, CompiledPredicate>,
    workflow_files: Vec<FileUpload>,
}

impl WorkflowRun {
    async fn execute(self) -> Result<(), EngineError> {
        let clock = SystemClock;
        // Subscribe before launching anything so fast completions are not
        // missed.
        let mut sub = self.manager.subscribe();

        // Create every job record up front, pending.
        let mut uuids: HashMap<String, String> = HashMap::new();
        let mut names_by_uuid: HashMap<String, String> = HashMap::new();
        for (name, spec) in &self.workflow.jobs {
            let job = self.job_from_spec(name, spec, clock.epoch_ms());
            let job = self.launcher.create(job)?;
            uuids.insert(name.clone(), job.uuid.clone());
            names_by_uuid.insert(job.uuid, name.clone());
        }

        let mut known: HashMap<String, JobStatus> = HashMap::new();
        let mut pending: Vec<String> = Vec::new();
        for name in self.workflow.jobs.keys() {
            if self.predicates.contains_key(name) {
                pending.push(name.clone());
            } else if let Some(uuid) = uuids.get(name) {
                self.start_job(name, uuid);
            }
        }

        let total = self.workflow.jobs.len();
        while known.len() < total {
            let Some(event) = sub.recv().await else {
                // Bus closed (daemon shutdown); leave the workflow as-is.
                return Ok(());
            };
            let Event::JobUpdated { uuid, status, .. } = event else {
                continue;
            };
            if !status.is_terminal() {
                continue;
            }
            let Some(name) = names_by_uuid.get(&uuid) else {
                continue;
            };
            if known.contains_key(name) {
                continue;
            }
            known.insert(name.clone(), status);

            // Re-evaluate until no predicate makes progress; cancellations
            // feed back into `known`, cascading downstream.
            loop {
                let mut progressed = false;
                let mut index = 0;
                while index < pending.len() {
                    let name = pending[index].clone();
                    let verdict = self
                        .predicates
                        .get(&name)
                        .map(|p| p.eval(&known))
                        .unwrap_or(Tri::True);
                    match verdict {
                        Tri::True => {
                            pending.remove(index);
                            if let Some(uuid) = uuids.get(&name) {
                                self.start_job(&name, uuid);
                            }
                            progressed = true;
                        }
                        Tri::False => {
                            pending.remove(index);
                            if let Some(uuid) = uuids.get(&name) {
                                self.cancel_job(&name, uuid);
                            }
                            known.insert(name, JobStatus::Canceled);
                            progressed = true;
                        }
                        Tri::Unknown => index += 1,
                    }
                }
                if !progressed {
                    break;
                }
            }

            self.update_progress(&known, known.len() == total);
        }
        Ok(())
    }

    fn job_from_spec(&self, name: &str, spec: &WorkflowJobSpec, now: u64) -> Job {
        let mut job = Job::new(name, &spec.command, now);
        job.args = spec.args.clone();
        job.limits = spec.limits.clone();
        job.runtime_tag = spec.runtime.clone();
        job.network_name = spec.network.clone();
        job.volumes = spec.volumes.clone();
        job.uploads = spec.uploads.clone();
        job.uploads.extend(self.workflow_files.iter().cloned());
        job.env = spec.env.clone();
        job.workflow_uuid = Some(self.workflow.uuid.clone());
        job.dependencies = spec.requires.clone();
        job
    }

    fn start_job(&self, name: &str, uuid: &str) {
        if let Err(e) = self.launcher.start(uuid) {
            tracing::error!(workflow = %self.workflow.uuid, job = name, error = %e, "launch failed");
            // Launch failures surface through the job's own Failed event.
        }
    }

    fn cancel_job(&self, name: &str, uuid: &str) {
        tracing::info!(workflow = %self.workflow.uuid, job = name, "dependency unsatisfiable; cancelling");
        if let Err(e) = self.manager.transition(uuid, JobStatus::Canceled, None) {
            tracing::warn!(workflow = %self.workflow.uuid, job = name, error = %e, "cancel failed");
        }
    }

    /// Update registry counters and, once every job is terminal, the
    /// workflow's final status.
    fn update_progress(&self, known: &HashMap<String, JobStatus>, finished: bool) {
        let completed = known.values().filter(|s| **s == JobStatus::Completed).count();
        let failed = known.values().filter(|s| **s == JobStatus::Failed).count();

        let mut workflows = self.workflows.write();
        let Some(workflow) = workflows.get_mut(&self.workflow.uuid) else {
            return;
        };
        workflow.completed_jobs = completed;
        workflow.failed_jobs = failed;
        if finished && !workflow.status.is_terminal() {
            workflow.status = if completed == workflow.total_jobs {
                WorkflowStatus::Completed
            } else {
                WorkflowStatus::Failed
            };
            workflow.completed_at_ms = Some(SystemClock.epoch_ms());
        }
        let event = Event::WorkflowUpdated {
            uuid: workflow.uuid.clone(),
            status: workflow.status,
            completed_jobs: workflow.completed_jobs,
            failed_jobs: workflow.failed_jobs,
        };
        drop(workflows);
        if let Err(e) = self.manager.bus().publish(crate::bus::TOPIC_JOBS, event) {
            tracing::debug!(error = %e, "workflow event publish skipped");
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
