use anyhow::{anyhow, Result};
use aws_config::Region;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Instance;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::cache::{CacheEntry, CacheStore};
use crate::config::Config;
use crate::output::{print_debug, print_error, print_info, print_warning};

pub const UNNAMED_INSTANCE: &str = "Unnamed Instance";

/// An instance as shown in the picker and stored in the cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Prompt label, `"<Name tag> (<instance id>)"`.
    pub name: String,
    #[serde(rename = "value")]
    pub instance_id: String,
    pub description: String,
    #[serde(default)]
    pub state: String,
}

impl InstanceRecord {
    pub fn new(display_name: &str, instance_id: &str, state: &str) -> Self {
        Self {
            name: format!("{} ({})", display_name, instance_id),
            instance_id: instance_id.to_string(),
            description: format!("Instance ID: {}, State: {}", instance_id, state),
            state: state.to_string(),
        }
    }
}

/// Where instance descriptions come from when the cache can't answer.
pub trait InstanceSource {
    fn describe_instances(&self) -> impl Future<Output = Result<Vec<Instance>>> + Send;
}

pub struct Ec2InstanceSource {
    client: aws_sdk_ec2::Client,
}

impl Ec2InstanceSource {
    pub async fn new(config: &Config) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(profile) = config.explicit_profile() {
            config_loader = config_loader.profile_name(profile);
        }

        let sdk_config = config_loader.load().await;
        Self {
            client: aws_sdk_ec2::Client::new(&sdk_config),
        }
    }
}

impl InstanceSource for Ec2InstanceSource {
    async fn describe_instances(&self) -> Result<Vec<Instance>> {
        let response = self
            .client
            .describe_instances()
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(e)))?;

        Ok(response
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .cloned()
            .collect())
    }
}

pub fn record_from_instance(instance: &Instance) -> InstanceRecord {
    let display_name = instance
        .tags()
        .iter()
        .find(|tag| tag.key() == Some("Name"))
        .and_then(|tag| tag.value())
        .unwrap_or(UNNAMED_INSTANCE);

    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|n| n.as_str())
        .unwrap_or("unknown");

    InstanceRecord::new(
        display_name,
        instance.instance_id().unwrap_or("Unknown"),
        state,
    )
}

/// Cache-or-fetch listing for the active profile.
///
/// Never fails: a provider error yields an empty list and leaves the cache
/// untouched, which the caller treats as "nothing to select".
pub async fn list_instances<S, C>(source: &S, store: &C, config: &Config) -> Vec<InstanceRecord>
where
    S: InstanceSource,
    C: CacheStore,
{
    let now = Utc::now();

    match store.get(&config.profile) {
        Ok(Some(entry)) if !config.refresh && entry.is_fresh(now, config.cache_ttl) => {
            print_info("Using cached instance data.");
            return entry.instances;
        }
        Ok(Some(_)) => print_debug(
            &format!("Cache entry for profile '{}' is stale", config.profile),
            config.verbose,
        ),
        Ok(None) => print_debug(
            &format!("No cache entry for profile '{}'", config.profile),
            config.verbose,
        ),
        Err(e) => print_warning(&format!("Ignoring instance cache: {}", e)),
    }

    print_info("Fetching instance data from AWS...");
    let instances = match source.describe_instances().await {
        Ok(instances) => instances,
        Err(e) => {
            print_error(&format!("Error retrieving instances: {}", e));
            return Vec::new();
        }
    };

    let records: Vec<InstanceRecord> = instances.iter().map(record_from_instance).collect();
    print_debug(
        &format!("Fetched {} instances in {}", records.len(), config.region),
        config.verbose,
    );

    let entry = CacheEntry::new(records, Utc::now());
    if let Err(e) = store.put(&config.profile, &entry) {
        print_warning(&format!("Could not update instance cache: {}", e));
    }

    entry.instances
}
