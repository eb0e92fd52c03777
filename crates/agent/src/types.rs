//! Domain values exchanged with the discovery agent, and their JSON codecs.
//!
//! Output casing is significant: the agent expects PascalCase keys, except
//! for the lowercase `"check"` key on a service registration body, which the
//! agent accepts as-is and which existing deployments rely on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default TTL for a service check.
pub const DEFAULT_TTL: &str = "10s";

/// Default window after which the agent drops a critical service.
pub const DEFAULT_DEREGISTER_AFTER: &str = "10m";

/// Key identifying an announced service: the `(id, name)` pair.
pub type AnnounceKey = (Option<String>, Option<String>);

/// A service definition as registered with the local agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Unique id per local agent.
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Logical service name, shared by peer instances.
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "Address", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(rename = "Port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,

    // TODO: the agent also accepts "Check"; confirm nothing depends on the
    // lowercase key before switching it to PascalCase.
    #[serde(rename = "check", skip_serializing_if = "Option::is_none")]
    pub check: Option<Check>,
}

impl Service {
    /// Dump to the agent's wire form. `None` fields are omitted.
    pub fn dump(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Load from the agent's wire form.
    ///
    /// `name` is the fallback when the reply carries no `Name` key, so a
    /// discovery result is always attributable to the name it was queried
    /// under. Missing `Tags` default to an empty sequence.
    pub fn load(name: Option<&str>, data: &Value) -> serde_json::Result<Service> {
        let mut service: Service = serde_json::from_value(data.clone())?;
        if service.name.is_none() {
            service.name = name.map(str::to_string);
        }
        Ok(service)
    }

    /// The check id the agent exposes for this service, `"service:" + (id ?? name)`.
    ///
    /// Absent when the service has neither an id nor a name.
    pub fn check_id(&self) -> Option<String> {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .map(|ident| format!("service:{ident}"))
    }

    /// The registry key under which this service is announced.
    pub fn announce_key(&self) -> AnnounceKey {
        (self.id.clone(), self.name.clone())
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ident = self
            .id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("<unnamed>");
        write!(f, "{ident}")
    }
}

/// A TTL-based health check attached to a service registration.
///
/// Duration strings are interpreted by the agent; locally only `ttl` is
/// parsed, to derive the heartbeat interval.
///
/// Fields absent on load take the documented defaults (`ttl` `"10s"`,
/// `deregister_critical_service_after` `"10m"`), the same values
/// [`Check::default`] carries. Hand-built checks should start from
/// `Check::default()` too: a `None` field is serialized as an omitted key,
/// and agents reject a check registration without a `TTL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Check {
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,

    #[serde(
        rename = "DeregisterCriticalServiceAfter",
        skip_serializing_if = "Option::is_none"
    )]
    pub deregister_critical_service_after: Option<String>,
}

impl Default for Check {
    fn default() -> Self {
        Self {
            ttl: Some(DEFAULT_TTL.to_string()),
            deregister_critical_service_after: Some(DEFAULT_DEREGISTER_AFTER.to_string()),
        }
    }
}

/// Variant of a check status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Passing,
    Warning,
    Critical,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Passing => write!(f, "passing"),
            State::Warning => write!(f, "warning"),
            State::Critical => write!(f, "critical"),
        }
    }
}

/// A check status as reported to or by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "Status")]
    pub state: State,

    #[serde(rename = "Output", default)]
    pub output: Option<String>,
}

impl Status {
    pub fn passing() -> Self {
        Self {
            state: State::Passing,
            output: None,
        }
    }

    pub fn new(state: State, output: impl Into<String>) -> Self {
        Self {
            state,
            output: Some(output.into()),
        }
    }
}

/// An agent-reported peer node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "Node", default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    #[serde(rename = "Address", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(
        rename = "TaggedAddresses",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tagged_addresses: Option<TaggedAddresses>,
}

/// LAN/WAN addresses reported for a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggedAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wan: Option<String>,
}

/// One element of a discovery response: a peer instance of a service.
///
/// `status` is present when the agent reported a check whose id matches the
/// service's check id. The service address is always routable: an empty or
/// absent address is replaced by the node address during response shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovered {
    pub node: Node,
    pub service: Service,
    pub status: Option<Status>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_service() -> Service {
        Service {
            id: Some("foobar".to_string()),
            name: Some("foobar".to_string()),
            address: Some("10.0.0.1".to_string()),
            port: Some(9000),
            tags: vec!["v1".to_string(), "edge".to_string()],
            check: Some(Check::default()),
        }
    }

    #[test]
    fn test_service_dump_omits_absent_fields() {
        let service = Service {
            id: Some("a".to_string()),
            name: Some("b".to_string()),
            ..Service::default()
        };

        let dumped = service.dump().unwrap();
        let object = dumped.as_object().unwrap();
        assert_eq!(object.get("ID"), Some(&json!("a")));
        assert_eq!(object.get("Name"), Some(&json!("b")));
        assert!(!object.contains_key("Address"));
        assert!(!object.contains_key("Port"));
        assert!(!object.contains_key("check"));
        assert_eq!(object.get("Tags"), Some(&json!([])));
    }

    #[test]
    fn test_service_dump_emits_lowercase_check_key() {
        let dumped = sample_service().dump().unwrap();
        let object = dumped.as_object().unwrap();
        assert!(object.contains_key("check"));
        assert!(!object.contains_key("Check"));
        assert_eq!(
            object.get("check").unwrap().get("TTL"),
            Some(&json!("10s"))
        );
    }

    #[test]
    fn test_service_round_trip() {
        let service = sample_service();
        let reloaded = Service::load(None, &service.dump().unwrap()).unwrap();
        assert_eq!(reloaded, service);
    }

    #[test]
    fn test_service_load_defaults_tags() {
        let service = Service::load(None, &json!({})).unwrap();
        assert!(service.tags.is_empty());

        let service = Service::load(None, &json!({"Tags": ["x"]})).unwrap();
        assert_eq!(service.tags, vec!["x".to_string()]);
    }

    #[test]
    fn test_service_load_fallback_name() {
        let service = Service::load(Some("web"), &json!({})).unwrap();
        assert_eq!(service.name.as_deref(), Some("web"));

        // An explicit Name in the reply wins over the fallback.
        let service = Service::load(Some("web"), &json!({"Name": "api"})).unwrap();
        assert_eq!(service.name.as_deref(), Some("api"));
    }

    #[test]
    fn test_check_id_derivation() {
        let mut service = Service::default();
        assert_eq!(service.check_id(), None);

        service.name = Some("web".to_string());
        assert_eq!(service.check_id().as_deref(), Some("service:web"));

        service.id = Some("web-1".to_string());
        assert_eq!(service.check_id().as_deref(), Some("service:web-1"));
    }

    #[test]
    fn test_announce_key() {
        let service = sample_service();
        assert_eq!(
            service.announce_key(),
            (Some("foobar".to_string()), Some("foobar".to_string()))
        );
    }

    #[test]
    fn test_check_defaults() {
        let check = Check::default();
        assert_eq!(check.ttl.as_deref(), Some("10s"));
        assert_eq!(check.deregister_critical_service_after.as_deref(), Some("10m"));
    }

    #[test]
    fn test_check_round_trip() {
        let check = Check {
            ttl: Some("1s".to_string()),
            deregister_critical_service_after: None,
        };
        let dumped = serde_json::to_value(&check).unwrap();
        assert_eq!(dumped, json!({"TTL": "1s"}));

        // The omitted field comes back as its documented default.
        let reloaded: Check = serde_json::from_value(dumped).unwrap();
        assert_eq!(reloaded.ttl.as_deref(), Some("1s"));
        assert_eq!(
            reloaded.deregister_critical_service_after.as_deref(),
            Some("10m")
        );
    }

    #[test]
    fn test_check_load_empty_applies_defaults() {
        let check: Check = serde_json::from_value(json!({})).unwrap();
        assert_eq!(check, Check::default());
    }

    #[test]
    fn test_status_wire_form() {
        let dumped = serde_json::to_value(Status::passing()).unwrap();
        assert_eq!(dumped, json!({"Status": "passing", "Output": null}));

        let dumped = serde_json::to_value(Status::new(State::Critical, "boom")).unwrap();
        assert_eq!(dumped, json!({"Status": "critical", "Output": "boom"}));
    }

    #[test]
    fn test_status_parse_variants() {
        for (text, state) in [
            ("passing", State::Passing),
            ("warning", State::Warning),
            ("critical", State::Critical),
        ] {
            let status: Status = serde_json::from_value(json!({"Status": text})).unwrap();
            assert_eq!(status.state, state);
            assert_eq!(status.output, None);
            assert_eq!(status.state.to_string(), text);
        }
    }

    #[test]
    fn test_node_round_trip() {
        let node = Node {
            id: Some("n1".to_string()),
            node: Some("worker-1".to_string()),
            address: Some("10.1.2.3".to_string()),
            tagged_addresses: Some(TaggedAddresses {
                lan: Some("10.1.2.3".to_string()),
                wan: Some("203.0.113.9".to_string()),
            }),
        };

        let dumped = serde_json::to_value(&node).unwrap();
        assert_eq!(dumped.get("Node"), Some(&json!("worker-1")));
        assert_eq!(
            dumped.get("TaggedAddresses"),
            Some(&json!({"lan": "10.1.2.3", "wan": "203.0.113.9"}))
        );

        let reloaded: Node = serde_json::from_value(dumped).unwrap();
        assert_eq!(reloaded, node);
    }

    #[test]
    fn test_service_display() {
        assert_eq!(sample_service().to_string(), "foobar");
        assert_eq!(Service::default().to_string(), "<unnamed>");
    }
}
