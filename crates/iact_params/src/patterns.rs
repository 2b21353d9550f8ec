//! Parameter key name patterns used by the heuristic pass.

use regex::Regex;

/// What a parameter key looks like it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Subnet,
    Vpc,
    Zone,
    Name,
    Password,
    Uuid,
    SecurityGroup,
}

/// Compiled key patterns, matched case-insensitively against the whole key.
#[derive(Debug, Clone)]
pub struct KeyPatterns {
    subnet: Regex,
    vpc: Regex,
    zone: Regex,
    name: Regex,
    password: Regex,
    uuid: Regex,
    security_group: Regex,
}

impl KeyPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            subnet: Regex::new(r"(?i)^\w*(?:v_?switch|subnet)_?id_?\d*$")?,
            vpc: Regex::new(r"(?i)^\w*vpc_?id_?\d*$")?,
            zone: Regex::new(r"(?i)^\w*zone_?id_?\d*$")?,
            name: Regex::new(r"(?i)^\w*name_?\d*$")?,
            password: Regex::new(r"(?i)^\w*password_?\d*$")?,
            uuid: Regex::new(r"(?i)^\w*uuid_?\d*$")?,
            security_group: Regex::new(r"(?i)^\w*security_?group_?id_?\d*$")?,
        })
    }

    /// First matching kind, checked in a fixed precedence order.
    pub fn classify(&self, key: &str) -> Option<KeyKind> {
        let ordered = [
            (&self.subnet, KeyKind::Subnet),
            (&self.vpc, KeyKind::Vpc),
            (&self.zone, KeyKind::Zone),
            (&self.name, KeyKind::Name),
            (&self.password, KeyKind::Password),
            (&self.uuid, KeyKind::Uuid),
            (&self.security_group, KeyKind::SecurityGroup),
        ];
        ordered
            .into_iter()
            .find(|(re, _)| re.is_match(key))
            .map(|(_, kind)| kind)
    }

    pub fn is_zone(&self, key: &str) -> bool {
        self.zone.is_match(key)
    }
}
