//! CIDR and port parsing, and stable identities for rule sets
//!
//! A rule's identity is the CRC-32 of its canonical user-facing fields, so a
//! rule keeps the same identity no matter which order its CIDRs or ports
//! were written in.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

pub const PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "all"];

#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("{0:?} is not a valid CIDR: {1}")]
    InvalidCidr(String, String),

    #[error("{0:?} is not a valid port value. Valid options are '80' or '80-90'")]
    InvalidPort(String),

    #[error("{0:?} is not a valid protocol. Valid options are 'tcp', 'udp', 'icmp' and 'all'")]
    InvalidProtocol(String),

    #[error("Parameter ports is a required parameter when using protocol '{0}'")]
    MissingPorts(String),

    #[error("Parameter {0} is a required parameter when using protocol 'icmp'")]
    MissingIcmp(&'static str),
}

/// Parses `address/prefix`
pub fn parse_cidr(s: &str) -> Result<(IpAddr, u8), RuleError> {
    let invalid = |reason: &str| RuleError::InvalidCidr(s.to_string(), reason.to_string());

    let (addr, prefix) = s.split_once('/').ok_or_else(|| invalid("missing prefix length"))?;
    let addr = IpAddr::from_str(addr).map_err(|_| invalid("invalid address"))?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid("invalid prefix length"))?;

    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid("prefix length out of range"));
    }

    Ok((addr, prefix))
}

/// Validates every CIDR and joins them with commas
pub fn cidr_list(cidrs: &[String]) -> Result<String, RuleError> {
    for cidr in cidrs {
        parse_cidr(cidr)?;
    }
    Ok(cidrs.join(","))
}

pub fn split_cidr_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Single port or inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        let invalid = || RuleError::InvalidPort(s.to_string());
        let port = |p: &str| match p.parse::<u16>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(invalid()),
        };

        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (port(start)?, port(end)?),
            None => {
                let p = port(s)?;
                (p, p)
            }
        };

        if start > end {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }

    /// Builds a range from the optional start/end ports a rule listing returns
    pub fn from_remote(start: Option<i64>, end: Option<i64>) -> Option<Self> {
        let start = u16::try_from(start?).ok()?;
        let end = end.and_then(|e| u16::try_from(e).ok()).unwrap_or(start);
        Some(Self { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// CRC-32 (IEEE) of `s`, the hash Terraform uses for string sets
pub fn hash_string(s: &str) -> u32 {
    crc32fast::hash(s.as_bytes())
}

/// One element of a rule set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub protocol: String,
    pub cidr_list: Vec<String>,
    pub icmp_type: Option<i64>,
    pub icmp_code: Option<i64>,
    pub ports: Vec<String>,
    pub action: Option<String>,
    pub traffic_type: Option<String>,
    /// Port (or `icmp` / `all`) to remote rule ID
    pub uuids: BTreeMap<String, String>,
}

impl Rule {
    /// Protocols created as a single remote rule without ports
    pub fn is_portless(&self) -> bool {
        self.protocol == "icmp" || self.protocol == "all"
    }

    /// Hash of the configured fields, ignoring order and remote IDs
    pub fn identity(&self) -> u32 {
        let mut cidrs = self.cidr_list.clone();
        cidrs.sort();
        let mut ports = self.ports.clone();
        ports.sort();

        let canonical = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.protocol,
            cidrs.join(","),
            self.icmp_type.map(|t| t.to_string()).unwrap_or_default(),
            self.icmp_code.map(|c| c.to_string()).unwrap_or_default(),
            ports.join(","),
            self.action.as_deref().unwrap_or_default(),
            self.traffic_type.as_deref().unwrap_or_default(),
        );
        hash_string(&canonical)
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        if !PROTOCOLS.contains(&self.protocol.as_str()) {
            return Err(RuleError::InvalidProtocol(self.protocol.clone()));
        }

        for cidr in &self.cidr_list {
            parse_cidr(cidr)?;
        }

        match self.protocol.as_str() {
            "icmp" => {
                if self.icmp_type.is_none() {
                    return Err(RuleError::MissingIcmp("icmp_type"));
                }
                if self.icmp_code.is_none() {
                    return Err(RuleError::MissingIcmp("icmp_code"));
                }
            }
            "tcp" | "udp" if self.ports.is_empty() => {
                return Err(RuleError::MissingPorts(self.protocol.clone()));
            }
            _ => {}
        }

        for port in &self.ports {
            PortRange::parse(port)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RuleDiff {
    /// Unchanged rules, carrying their remote IDs forward
    pub keep: Vec<Rule>,
    pub delete: Vec<Rule>,
    pub create: Vec<Rule>,
}

/// Matches old and new rules by identity
pub fn diff_rules(old: &[Rule], new: &[Rule]) -> RuleDiff {
    let mut unmatched: Vec<Option<&Rule>> = old.iter().map(Some).collect();
    let mut diff = RuleDiff::default();

    for rule in new {
        let identity = rule.identity();
        let matched = unmatched
            .iter_mut()
            .find(|slot| slot.is_some_and(|o| o.identity() == identity))
            .and_then(Option::take);

        match matched {
            Some(prior) => diff.keep.push(Rule {
                uuids: prior.uuids.clone(),
                ..rule.clone()
            }),
            None => diff.create.push(rule.clone()),
        }
    }

    diff.delete = unmatched.into_iter().flatten().cloned().collect();
    diff
}
