//! Simulated platform description.
//!
//! A platform is a static set of hosts parsed from an XML description in
//! the SimGrid dialect. The daemon passes the XML through opaquely; the
//! engine is the only component that looks inside it. Once loaded, the
//! platform is immutable and shared read-only across threads.

use crate::error::EngineError;

/// One simulated host.
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    /// The hostname, unique within the platform.
    pub name: String,
    /// Compute speed in flop/s.
    pub speed: f64,
    /// Number of cores.
    pub cores: u32,
}

/// An immutable set of simulated hosts.
///
/// Host order is document order, so repeated hostname listings always
/// come back identical.
#[derive(Debug, Clone)]
pub struct Platform {
    hosts: Vec<Host>,
}

impl Platform {
    /// Parse a platform from its XML description.
    ///
    /// Recognizes `<host id="..." speed="..." core="..."/>` elements
    /// anywhere in the document. `core` defaults to 1. Speed accepts the
    /// flop-rate suffixes `f`, `Kf`, `Mf`, `Gf`, `Tf` or a bare number.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPlatform`] on malformed XML, a host
    /// without an `id`, an unparsable `speed` or `core` attribute, a
    /// duplicate hostname, or a platform with no hosts at all.
    pub fn from_xml(xml: &str) -> Result<Self, EngineError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| EngineError::InvalidPlatform {
            reason: format!("XML parse error: {e}"),
        })?;

        let mut hosts: Vec<Host> = Vec::new();
        for node in doc.descendants().filter(|n| n.has_tag_name("host")) {
            let name = node
                .attribute("id")
                .ok_or_else(|| EngineError::InvalidPlatform {
                    reason: "host element without an 'id' attribute".to_owned(),
                })?
                .to_owned();

            if hosts.iter().any(|h| h.name == name) {
                return Err(EngineError::InvalidPlatform {
                    reason: format!("duplicate host id '{name}'"),
                });
            }

            let speed_attr =
                node.attribute("speed")
                    .ok_or_else(|| EngineError::InvalidPlatform {
                        reason: format!("host '{name}' has no 'speed' attribute"),
                    })?;
            let speed = parse_flop_rate(speed_attr).ok_or_else(|| {
                EngineError::InvalidPlatform {
                    reason: format!("host '{name}' has unparsable speed '{speed_attr}'"),
                }
            })?;

            let cores = match node.attribute("core") {
                Some(raw) => raw.parse::<u32>().map_err(|_| EngineError::InvalidPlatform {
                    reason: format!("host '{name}' has unparsable core count '{raw}'"),
                })?,
                None => 1,
            };

            hosts.push(Host { name, speed, cores });
        }

        if hosts.is_empty() {
            return Err(EngineError::InvalidPlatform {
                reason: "platform contains no hosts".to_owned(),
            });
        }

        Ok(Self { hosts })
    }

    /// Whether a host with this name exists.
    pub fn contains_host(&self, name: &str) -> bool {
        self.hosts.iter().any(|h| h.name == name)
    }

    /// Look up a host by name.
    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// All hostnames, in document order.
    pub fn hostnames(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }

    /// All hosts.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }
}

/// Parse a flop-rate string such as `1Gf`, `100Mf`, or `1000000000`.
///
/// Returns `None` for non-positive or unparsable rates.
fn parse_flop_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (number, multiplier) = if let Some(stripped) = raw.strip_suffix("Tf") {
        (stripped, 1e12)
    } else if let Some(stripped) = raw.strip_suffix("Gf") {
        (stripped, 1e9)
    } else if let Some(stripped) = raw.strip_suffix("Mf") {
        (stripped, 1e6)
    } else if let Some(stripped) = raw.strip_suffix("Kf") {
        (stripped, 1e3)
    } else if let Some(stripped) = raw.strip_suffix('f') {
        (stripped, 1.0)
    } else {
        (raw, 1.0)
    };

    let value: f64 = number.trim().parse().ok()?;
    if value <= 0.0 {
        return None;
    }
    Some(value * multiplier)
}
