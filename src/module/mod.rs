// src/module/mod.rs

//! Module streams and modular filtering
//!
//! A module offers several parallel streams, each shipping its own set of
//! package builds. At most one stream per module is active; packages of
//! inactive streams are hidden from resolution.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{AsRefStr, Display, EnumString};

/// One stream of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStream {
    pub name: String,
    pub stream: String,
    /// Stream active when the module has no recorded state
    #[serde(default)]
    pub is_default: bool,
    /// NEVRAs of the packages built for this stream
    #[serde(default)]
    pub packages: Vec<String>,
}

impl ModuleStream {
    /// `name:stream`
    pub fn full_identifier(&self) -> String {
        format!("{}:{}", self.name, self.stream)
    }
}

/// Persisted state of a module
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum ModuleState {
    #[default]
    Available,
    Enabled,
    Disabled,
}

/// State of one module as tracked by the system state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatus {
    #[serde(default)]
    pub enabled_stream: String,
    #[serde(default)]
    pub state: ModuleState,
}

/// Outcome of resolving a module spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleMatch<'a> {
    /// Exactly one stream selected
    Stream(&'a ModuleStream),
    /// Module exists but the spec names several streams and none is default
    MultipleStreams(Vec<&'a ModuleStream>),
    /// No module matches
    NotFound,
}

/// All module streams of the enabled repositories
#[derive(Debug, Clone, Default)]
pub struct ModuleSack {
    streams: Vec<ModuleStream>,
}

impl ModuleSack {
    pub fn new(mut streams: Vec<ModuleStream>) -> Self {
        streams.sort_by(|a, b| (&a.name, &a.stream).cmp(&(&b.name, &b.stream)));
        streams.dedup_by(|a, b| a.name == b.name && a.stream == b.stream);
        Self { streams }
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Streams of the module `name`
    pub fn streams_of<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a ModuleStream> {
        self.streams.iter().filter(move |s| s.name == name)
    }

    /// Resolve `name` or `name:stream` to one stream
    ///
    /// Without a stream the currently enabled stream wins, then the default
    /// stream; several candidates with neither is `MultipleStreams`.
    pub fn resolve_spec<'a>(
        &'a self,
        spec: &str,
        states: &BTreeMap<String, ModuleStatus>,
    ) -> Result<ModuleMatch<'a>> {
        let (name, stream) = match spec.split_once(':') {
            Some((n, s)) => (n, Some(s)),
            None => (spec, None),
        };
        if name.is_empty() || stream == Some("") {
            return Err(Error::ParseError(format!("invalid module spec '{}'", spec)));
        }

        let candidates: Vec<&ModuleStream> = self
            .streams_of(name)
            .filter(|s| stream.is_none_or(|wanted| s.stream == wanted))
            .collect();

        match candidates.len() {
            0 => Ok(ModuleMatch::NotFound),
            1 => Ok(ModuleMatch::Stream(candidates[0])),
            _ => {
                let enabled = states
                    .get(name)
                    .filter(|st| st.state == ModuleState::Enabled)
                    .map(|st| st.enabled_stream.as_str());
                if let Some(found) = candidates
                    .iter()
                    .find(|s| Some(s.stream.as_str()) == enabled)
                    .or_else(|| candidates.iter().find(|s| s.is_default))
                {
                    Ok(ModuleMatch::Stream(*found))
                } else {
                    Ok(ModuleMatch::MultipleStreams(candidates))
                }
            }
        }
    }

    /// NEVRAs hidden by modular filtering under the given module states
    ///
    /// Disabled modules hide every stream. An enabled module hides all but
    /// its enabled stream. A module without state hides all but its
    /// default stream.
    pub fn filtered_nevras(&self, states: &BTreeMap<String, ModuleStatus>) -> BTreeSet<String> {
        let (active, inactive): (Vec<&ModuleStream>, Vec<&ModuleStream>) =
            self.streams.iter().partition(|s| is_active(s, states));
        let mut hidden: BTreeSet<String> = inactive
            .iter()
            .flat_map(|s| s.packages.iter().cloned())
            .collect();
        // A NEVRA shipped by an active stream stays visible
        for stream in active {
            for nevra in &stream.packages {
                hidden.remove(nevra);
            }
        }
        hidden
    }
}

fn is_active(stream: &ModuleStream, states: &BTreeMap<String, ModuleStatus>) -> bool {
    match states.get(&stream.name) {
        Some(st) if st.state == ModuleState::Disabled => false,
        Some(st) if st.state == ModuleState::Enabled => st.enabled_stream == stream.stream,
        _ => stream.is_default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sack() -> ModuleSack {
        ModuleSack::new(vec![
            ModuleStream {
                name: "nodejs".to_string(),
                stream: "18".to_string(),
                is_default: true,
                packages: vec!["nodejs-18.0-1.x86_64".to_string()],
            },
            ModuleStream {
                name: "nodejs".to_string(),
                stream: "20".to_string(),
                is_default: false,
                packages: vec!["nodejs-20.0-1.x86_64".to_string()],
            },
            ModuleStream {
                name: "perl".to_string(),
                stream: "5.30".to_string(),
                is_default: false,
                packages: vec![],
            },
            ModuleStream {
                name: "perl".to_string(),
                stream: "5.32".to_string(),
                is_default: false,
                packages: vec![],
            },
        ])
    }

    #[test]
    fn test_resolve_spec_default_stream() {
        let sack = sack();
        let states = BTreeMap::new();
        match sack.resolve_spec("nodejs", &states).unwrap() {
            ModuleMatch::Stream(s) => assert_eq!(s.stream, "18"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_spec_multiple_streams() {
        let sack = sack();
        let states = BTreeMap::new();
        assert!(matches!(
            sack.resolve_spec("perl", &states).unwrap(),
            ModuleMatch::MultipleStreams(v) if v.len() == 2
        ));
        assert_eq!(sack.resolve_spec("ruby", &states).unwrap(), ModuleMatch::NotFound);
        assert!(sack.resolve_spec("perl:", &states).is_err());
    }

    #[test]
    fn test_filtered_nevras_follow_enabled_stream() {
        let sack = sack();
        let mut states = BTreeMap::new();
        let hidden = sack.filtered_nevras(&states);
        assert!(hidden.contains("nodejs-20.0-1.x86_64"));
        assert!(!hidden.contains("nodejs-18.0-1.x86_64"));

        states.insert(
            "nodejs".to_string(),
            ModuleStatus {
                enabled_stream: "20".to_string(),
                state: ModuleState::Enabled,
            },
        );
        let hidden = sack.filtered_nevras(&states);
        assert!(hidden.contains("nodejs-18.0-1.x86_64"));
        assert!(!hidden.contains("nodejs-20.0-1.x86_64"));
    }
}
