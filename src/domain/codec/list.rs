//! Negotiable codec lists

use super::descriptor::{CodecCapabilities, CodecDescriptor};
use crate::domain::shared::{MpfError, Result};
use serde::{Deserialize, Serialize};

/// Ordered list of codec descriptors
///
/// `primary` and `event` cache the positions chosen by the last
/// intersection. After a successful intersection at most one primary and
/// one event descriptor remain enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecList {
    descriptors: Vec<CodecDescriptor>,
    primary: Option<usize>,
    event: Option<usize>,
}

impl CodecList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: Vec<CodecDescriptor>) -> Self {
        Self {
            descriptors,
            primary: None,
            event: None,
        }
    }

    /// Append a descriptor
    pub fn add(&mut self, descriptor: CodecDescriptor) -> &mut CodecDescriptor {
        self.descriptors.push(descriptor);
        let last = self.descriptors.len() - 1;
        &mut self.descriptors[last]
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn descriptors(&self) -> &[CodecDescriptor] {
        &self.descriptors
    }

    pub fn descriptors_mut(&mut self) -> &mut [CodecDescriptor] {
        &mut self.descriptors
    }

    /// Enabled descriptors in declaration order
    pub fn enabled(&self) -> impl Iterator<Item = &CodecDescriptor> {
        self.descriptors.iter().filter(|d| d.enabled)
    }

    /// Negotiated primary (audio) descriptor
    pub fn primary(&self) -> Option<&CodecDescriptor> {
        self.primary.and_then(|i| self.descriptors.get(i))
    }

    /// Negotiated named event descriptor
    pub fn event(&self) -> Option<&CodecDescriptor> {
        self.event.and_then(|i| self.descriptors.get(i))
    }

    /// Position of the first descriptor matching `descriptor`
    pub fn find(&self, descriptor: &CodecDescriptor) -> Option<usize> {
        self.descriptors.iter().position(|d| d.matches(descriptor))
    }

    /// First enabled descriptor matching `descriptor`
    pub fn find_enabled(&self, descriptor: &CodecDescriptor) -> Option<usize> {
        self.descriptors
            .iter()
            .position(|d| d.enabled && d.matches(descriptor))
    }

    /// Disable descriptors not covered by `capabilities`
    ///
    /// Returns true if at least one descriptor remains enabled.
    pub fn matches(&mut self, capabilities: &CodecCapabilities) -> bool {
        let mut status = false;
        for descriptor in self.descriptors.iter_mut().filter(|d| d.enabled) {
            if capabilities.matches(descriptor) {
                status = true;
            } else {
                descriptor.enabled = false;
            }
        }
        status
    }

    /// Restrict an offered list to what the local side can handle
    pub fn modify(&mut self, capabilities: &CodecCapabilities) -> bool {
        self.matches(capabilities)
    }

    /// Intersect two lists, `self` being the preferred one
    ///
    /// A single pass over `self` picks the first enabled event descriptor and
    /// the first enabled primary descriptor that have an enabled counterpart
    /// in `other`; everything else in both lists ends up disabled.
    pub fn intersect(&mut self, other: &mut CodecList) -> Result<()> {
        self.primary = None;
        self.event = None;
        other.primary = None;
        other.event = None;

        for i in 0..self.descriptors.len() {
            if !self.descriptors[i].enabled {
                continue;
            }

            let is_event = self.descriptors[i].is_event();
            let chosen = if is_event { self.event } else { self.primary };
            if chosen.is_some() {
                self.descriptors[i].enabled = false;
                continue;
            }

            match other.find_enabled(&self.descriptors[i]) {
                Some(j) => {
                    if is_event {
                        self.event = Some(i);
                        other.event = Some(j);
                    } else {
                        self.primary = Some(i);
                        other.primary = Some(j);
                    }
                }
                None => self.descriptors[i].enabled = false,
            }
        }

        for (j, descriptor) in other.descriptors.iter_mut().enumerate() {
            if Some(j) != other.primary && Some(j) != other.event {
                descriptor.enabled = false;
            }
        }

        if self.primary.is_none() {
            return Err(MpfError::NoCodecMatch(format!(
                "offered [{}] answered [{}]",
                self.describe(),
                other.describe()
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.descriptors
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Intersect according to the preference flag
///
/// With `own_preference` the local list drives the selection, otherwise the
/// remote list does.
pub fn lists_intersect(local: &mut CodecList, remote: &mut CodecList, own_preference: bool) -> Result<()> {
    if own_preference {
        local.intersect(remote)
    } else {
        remote.intersect(local)
    }
}
