use anyhow::Result;
use chrono::Utc;
use colored::*;
use std::future::Future;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::credentials;
use crate::instances::{list_instances, InstanceRecord, InstanceSource};
use crate::output::{print_error, print_info};
use crate::selector;
use crate::session::{start_session, InterruptScope};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SessionExpired,
    NoInstances,
    NoSelection,
    /// The session child's exit code, if it ran and exited normally.
    SessionEnded(Option<i32>),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::SessionExpired => 1,
            _ => 0,
        }
    }
}

/// The steps that hand the terminal to the operator.
pub trait Operator {
    fn choose(
        &self,
        instances: Vec<InstanceRecord>,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    fn connect(&self, config: &Config, instance_id: &str) -> impl Future<Output = Option<i32>> + Send;
}

/// Fuzzy prompt plus `aws ssm start-session` on the controlling terminal.
pub struct Terminal;

impl Operator for Terminal {
    async fn choose(&self, instances: Vec<InstanceRecord>) -> Result<Option<String>> {
        selector::select_instance(instances).await
    }

    async fn connect(&self, config: &Config, instance_id: &str) -> Option<i32> {
        start_session(config, instance_id).await
    }
}

pub async fn run<S, C, O>(config: &Config, source: &S, store: &C, operator: &O) -> Result<Outcome>
where
    S: InstanceSource,
    C: CacheStore,
    O: Operator,
{
    if !credentials::is_session_valid(&config.sso_cache_path, Utc::now(), config.verbose) {
        print_error("SSO session is expired. Please login using 'aws sso login'.");
        return Ok(Outcome::SessionExpired);
    }

    print_info(&format!("Region: {}", config.region.green()));

    let instances = list_instances(source, store, config).await;
    if instances.is_empty() {
        print_info("No instances available.");
        return Ok(Outcome::NoInstances);
    }

    // Held until the session child exits.
    let _interrupts = InterruptScope::enter();

    let Some(instance_id) = operator.choose(instances).await? else {
        print_info("No instance selected.");
        return Ok(Outcome::NoSelection);
    };

    let exit_code = operator.connect(config, &instance_id).await;
    Ok(Outcome::SessionEnded(exit_code))
}
