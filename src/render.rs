//! Output forms: line-oriented text and the JSON envelope.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;

use crate::calculator::Calculation;
use crate::catalog::{Families, Family, FamilyKind, GroupObj, GROUP_LIVENESS, GROUP_READINESS, GROUP_RESOURCES};
use crate::error::CalcError;
use crate::types::{OutputFormat, ResponseMessage};

const GROUP_PADDING: &str = "  ";
const PARAM_PADDING: &str = "    ";

pub fn render(calc: &Calculation, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Human => Ok(human(calc)),
        OutputFormat::Json => json(calc),
    }
}

pub fn json(calc: &Calculation) -> serde_json::Result<String> {
    serde_json::to_string_pretty(calc)
}

/// `[message]` block followed by every family, group and parameter.
pub fn human(calc: &Calculation) -> String {
    let mut b = message_block(&calc.message);
    for (_, family) in calc.answer.iter() {
        b.push_str(&family_human(family));
    }
    b
}

fn message_block(message: &ResponseMessage) -> String {
    let mut b = String::from("[message]\n");
    let _ = writeln!(b, "name = {}", message.name);
    let _ = writeln!(b, "type = {}", message.kind.code());
    let _ = writeln!(b, "text = {}", message.text);
    b
}

pub fn family_human(family: &Family) -> String {
    let mut b = format!("[{}]\n", family.name);
    for (key, group) in &family.groups {
        let _ = writeln!(b, "{GROUP_PADDING}[{key}]");
        b.push_str(&params_human(group, PARAM_PADDING));
    }
    b
}

fn params_human(group: &GroupObj, padding: &str) -> String {
    group
        .parameters
        .iter()
        .fold(String::new(), |mut acc, (key, p)| {
            let _ = writeln!(acc, "{padding}{key} = {}", p.value);
            acc
        })
}

/// Envelope for a rejected request: message only, no answer.
#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    message: &'a ResponseMessage,
}

pub fn error_envelope(message: &ResponseMessage, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Human => Ok(message_block(message)),
        OutputFormat::Json => serde_json::to_string_pretty(&ErrorEnvelope { message }),
    }
}

// ============================================================================
// Selective rendering
// ============================================================================

/// One slice of a family, as consumed by a deployment template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Every configuration group under a single `[mysqld]` header.
    Mysqld,
    Probes,
    Resources,
    /// Proxy settings without a header.
    HaproxyConfig,
}

impl FromStr for Selector {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mysqld" => Ok(Selector::Mysqld),
            "probes" => Ok(Selector::Probes),
            "resources" => Ok(Selector::Resources),
            "haproxyConfig" => Ok(Selector::HaproxyConfig),
            other => Err(CalcError::invalid(format!("Invalid Group name {other}"))),
        }
    }
}

fn is_probe(key: &str) -> bool {
    key == GROUP_READINESS || key == GROUP_LIVENESS
}

/// Renders part of one family. Missing families render as nothing.
pub fn family_section(families: &Families, kind: FamilyKind, selector: Selector, padding: &str) -> String {
    let Some(family) = families.family(kind) else {
        return String::new();
    };
    let mut b = String::new();
    match selector {
        Selector::Mysqld | Selector::HaproxyConfig => {
            if selector == Selector::Mysqld {
                b.push_str("[mysqld]\n");
            }
            for (key, group) in &family.groups {
                if !is_probe(key) && key != GROUP_RESOURCES {
                    b.push_str(&params_human(group, padding));
                }
            }
        }
        Selector::Probes | Selector::Resources => {
            for (key, group) in &family.groups {
                let wanted = match selector {
                    Selector::Probes => is_probe(key),
                    _ => key == GROUP_RESOURCES,
                };
                if wanted {
                    let _ = writeln!(b, "[{key}]");
                    b.push_str(&params_human(group, padding));
                }
            }
        }
    }
    b
}
