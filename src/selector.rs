use anyhow::{anyhow, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::FuzzySelect;
use std::io;

use crate::instances::InstanceRecord;

const PROMPT: &str = "Start typing to filter instances";

fn choice_labels(instances: &[InstanceRecord]) -> Vec<String> {
    instances.iter().map(|instance| instance.name.clone()).collect()
}

fn chosen_id(instances: &[InstanceRecord], selection: Option<usize>) -> Option<String> {
    selection
        .and_then(|index| instances.get(index))
        .map(|instance| instance.instance_id.clone())
}

/// Prompts for one instance and returns its id, or `None` if the operator
/// backed out. Blocks until the operator answers.
pub async fn select_instance(instances: Vec<InstanceRecord>) -> Result<Option<String>> {
    tokio::task::spawn_blocking(move || {
        let labels = choice_labels(&instances);
        let theme = ColorfulTheme::default();

        let selection = match FuzzySelect::with_theme(&theme)
            .with_prompt(PROMPT)
            .items(&labels)
            .default(0)
            .interact_opt()
        {
            Ok(selection) => selection,
            // Ctrl+C arrives as a key while the terminal is in raw mode
            Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::Interrupted => None,
            Err(e) => return Err(anyhow!("Instance prompt failed: {}", e)),
        };

        Ok(chosen_id(&instances, selection))
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn records() -> Vec<InstanceRecord> {
        vec![
            InstanceRecord::new("web1", "i-123", "running"),
            InstanceRecord::new("Unnamed Instance", "i-456", "stopped"),
        ]
    }

    #[test]
    fn test_labels_use_record_names() {
        assert_eq!(
            choice_labels(&records()),
            vec!["web1 (i-123)", "Unnamed Instance (i-456)"]
        );
    }

    #[test]
    fn test_chosen_id_maps_index_to_instance_id() {
        assert_eq!(chosen_id(&records(), Some(1)), Some("i-456".to_string()));
    }

    #[test]
    fn test_cancelled_or_out_of_range_selection() {
        assert_eq!(chosen_id(&records(), None), None);
        assert_eq!(chosen_id(&records(), Some(7)), None);
    }
}
