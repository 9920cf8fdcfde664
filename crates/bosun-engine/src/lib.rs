//! Bosun Engine
//!
//! The three entity kinds and the runners that execute them:
//!
//! - [`Task`] - a single unit of work backed by a [`Handler`]
//! - [`Job`] - an ordered group of tasks, run through a nested [`TaskRunner`]
//! - [`Deployment`] - deploy / rollback / destroy handlers with before and
//!   after [`Hooks`]
//!
//! Every entity goes through a [`Pipeline`](bosun_pipeline::Pipeline) of
//! [`Execute`] and [`ApplyContext`], driven one entity at a time by an
//! [`Orchestrator`].

mod definition;
mod deployment;
mod entity;
mod handler;
mod job;
mod middleware;
mod orchestrator;
mod task;

pub use definition::{Data, Definition};
pub use deployment::{Action, Deployment, Hooks, Phase};
pub use entity::{DeploymentContext, Entity, EntityContext, JobContext, TaskContext};
pub use handler::{Handler, Invocation, handler_fn};
pub use job::Job;
pub use middleware::{ApplyContext, Execute, default_pipeline};
pub use orchestrator::{DeploymentRunner, JobRunner, Orchestrator, TaskRunner};
pub use task::Task;
