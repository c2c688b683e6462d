use std::collections::HashMap;

use siphon_domain::TopicSetting;

/// Suffix for the backfill topic of feeds that may emit recovery batches.
const RECOVERED_SUFFIX: &str = "recovered";

/// Topic path of one feed:
/// `{default_topic_path}/{group_id}/{sensor_type}/{sensor_name}`.
pub fn build_topic(setting: &TopicSetting) -> String {
    format!(
        "{}/{}/{}/{}",
        setting.default_topic_path, setting.group_id, setting.sensor_type, setting.sensor_name
    )
}

/// Backfill topic of one feed.
pub fn recovered_topic(setting: &TopicSetting) -> String {
    format!("{}/{}", build_topic(setting), RECOVERED_SUFFIX)
}

/// Wrap a topic filter in a shared-subscription group so the broker delivers
/// each message to exactly one member of the group.
pub fn shared_subscription(group: &str, topic: &str) -> String {
    format!("$share/{}/{}", group, topic)
}

/// Lookup table from concrete topic strings to their owning setting.
///
/// Built once at subscribe time; both the live topic and, for feeds with
/// recovery, the `/recovered` topic resolve to the same setting.
pub struct TopicIndex {
    routes: HashMap<String, TopicSetting>,
}

impl TopicIndex {
    pub fn from_settings(settings: Vec<TopicSetting>) -> Self {
        let mut routes = HashMap::with_capacity(settings.len() * 2);
        for setting in settings {
            if setting.has_recovery {
                routes.insert(recovered_topic(&setting), setting.clone());
            }
            routes.insert(build_topic(&setting), setting);
        }
        Self { routes }
    }

    /// Resolve a received topic to its owning setting.
    pub fn resolve(&self, topic: &str) -> Option<&TopicSetting> {
        self.routes.get(topic)
    }

    /// All concrete topics to subscribe.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(name: &str, has_recovery: bool) -> TopicSetting {
        TopicSetting {
            group_id: "grp-1".to_string(),
            sensor_type: "temperature".to_string(),
            sensor_name: name.to_string(),
            location: "backyard".to_string(),
            default_topic_path: "sensors".to_string(),
            has_recovery,
        }
    }

    #[test]
    fn test_build_topic_shape() {
        assert_eq!(
            build_topic(&setting("garden-01", false)),
            "sensors/grp-1/temperature/garden-01"
        );
    }

    #[test]
    fn test_recovered_topic_shape() {
        assert_eq!(
            recovered_topic(&setting("garden-01", true)),
            "sensors/grp-1/temperature/garden-01/recovered"
        );
    }

    #[test]
    fn test_shared_subscription_wrapping() {
        assert_eq!(
            shared_subscription("siphon-ingest", "sensors/grp-1/temperature/garden-01"),
            "$share/siphon-ingest/sensors/grp-1/temperature/garden-01"
        );
    }

    #[test]
    fn test_index_resolves_live_topic() {
        let index = TopicIndex::from_settings(vec![setting("garden-01", false)]);

        let resolved = index.resolve("sensors/grp-1/temperature/garden-01");
        assert_eq!(resolved.map(|s| s.sensor_name.as_str()), Some("garden-01"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_index_resolves_recovered_topic_to_same_setting() {
        let index = TopicIndex::from_settings(vec![setting("garden-01", true)]);

        let live = index.resolve("sensors/grp-1/temperature/garden-01");
        let recovered = index.resolve("sensors/grp-1/temperature/garden-01/recovered");

        assert_eq!(live, recovered);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_index_without_recovery_skips_recovered_topic() {
        let index = TopicIndex::from_settings(vec![setting("garden-01", false)]);

        assert!(index
            .resolve("sensors/grp-1/temperature/garden-01/recovered")
            .is_none());
    }

    #[test]
    fn test_index_unknown_topic_is_none() {
        let index = TopicIndex::from_settings(vec![setting("garden-01", false)]);

        assert!(index.resolve("sensors/other/humidity/kitchen-02").is_none());
    }
}
