//! Codec registry
//!
//! Maps descriptors to codec implementations and builds the codec lists a
//! stream offers by default.

use super::g711::{G711Codec, G711Type};
use super::linear::{L16Codec, LpcmCodec};
use super::Codec;
use crate::domain::codec::{
    CodecAttribs, CodecCapabilities, CodecDescriptor, CodecList, RTP_PT_UNKNOWN, TELEPHONE_EVENT,
};
use crate::domain::shared::{MpfError, Result};
use tracing::{debug, warn};

type CodecCtor = fn() -> Box<dyn Codec>;

struct CodecEntry {
    attribs: CodecAttribs,
    /// Descriptor offered by default; None for internal-only codecs
    descriptor: Option<CodecDescriptor>,
    create: CodecCtor,
}

/// Codec manager
pub struct CodecManager {
    codecs: Vec<CodecEntry>,
    event_descriptor: Option<CodecDescriptor>,
}

impl CodecManager {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            codecs: Vec::new(),
            event_descriptor: None,
        }
    }

    /// Registry with G.711, L16, LPCM and telephone-event
    pub fn with_default_codecs() -> Self {
        let mut manager = Self::new();
        manager.register(
            G711Type::PCMU.attribs(),
            Some(G711Type::PCMU.descriptor()),
            || Box::new(G711Codec::pcmu()) as Box<dyn Codec>,
        );
        manager.register(
            G711Type::PCMA.attribs(),
            Some(G711Type::PCMA.descriptor()),
            || Box::new(G711Codec::pcma()) as Box<dyn Codec>,
        );
        manager.register(
            L16Codec::new().attribs().clone(),
            Some(L16Codec::descriptor()),
            || Box::new(L16Codec::new()) as Box<dyn Codec>,
        );
        manager.register(LpcmCodec::new().attribs().clone(), None, || {
            Box::new(LpcmCodec::new()) as Box<dyn Codec>
        });
        manager.event_descriptor = Some(CodecDescriptor::telephone_event(101, 8000));
        manager
    }

    /// Register a codec implementation
    pub fn register(
        &mut self,
        attribs: CodecAttribs,
        descriptor: Option<CodecDescriptor>,
        create: CodecCtor,
    ) {
        debug!("Register codec {}", attribs.name);
        self.codecs.push(CodecEntry {
            attribs,
            descriptor,
            create,
        });
    }

    /// Create a codec instance able to handle `descriptor`
    pub fn codec_get(&self, descriptor: &CodecDescriptor) -> Option<Box<dyn Codec>> {
        self.codecs
            .iter()
            .find(|entry| entry.attribs.matches(descriptor))
            .map(|entry| (entry.create)())
    }

    /// Default offered list: every registered codec plus named events
    pub fn codec_list_get(&self) -> CodecList {
        let mut list = CodecList::new();
        for descriptor in self.codecs.iter().filter_map(|e| e.descriptor.as_ref()) {
            list.add(descriptor.clone());
        }
        if let Some(event) = &self.event_descriptor {
            list.add(event.clone());
        }
        list
    }

    /// Capabilities covering every registered codec
    pub fn capabilities(&self) -> CodecCapabilities {
        let mut capabilities = CodecCapabilities::new();
        for entry in &self.codecs {
            capabilities.add_attribs(&entry.attribs);
        }
        capabilities.allow_named_events = self.event_descriptor.is_some();
        capabilities
    }

    fn default_descriptor(&self, name: &str) -> Option<&CodecDescriptor> {
        if name.eq_ignore_ascii_case(TELEPHONE_EVENT) {
            return self.event_descriptor.as_ref();
        }
        self.codecs
            .iter()
            .filter_map(|e| e.descriptor.as_ref())
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Parse a codec list such as `"PCMU PCMA L16/96/8000 telephone-event/101/8000"`
    ///
    /// Each entry is `name[/payload_type[/sampling_rate[/channels]]]`;
    /// omitted fields come from the registered default descriptor.
    pub fn codec_list_load(&self, text: &str) -> Result<CodecList> {
        let mut list = CodecList::new();
        for entry in text.split_whitespace() {
            let mut fields = entry.split('/');
            let name = fields.next().unwrap_or_default();
            let mut descriptor = match self.default_descriptor(name) {
                Some(d) => d.clone(),
                None => CodecDescriptor::new(RTP_PT_UNKNOWN, name, 8000),
            };

            if let Some(pt) = fields.next() {
                descriptor.payload_type = parse_field(entry, pt)?;
            }
            if let Some(rate) = fields.next() {
                descriptor.sampling_rate = parse_field(entry, rate)?;
            }
            if let Some(channels) = fields.next() {
                descriptor.channel_count = parse_field(entry, channels)?;
            }

            if descriptor.payload_type == RTP_PT_UNKNOWN {
                warn!("Skip codec {}: no payload type", entry);
                continue;
            }
            if !descriptor.is_event() && self.codec_get(&descriptor).is_none() {
                warn!("Skip codec {}: not registered", entry);
                continue;
            }
            list.add(descriptor);
        }
        Ok(list)
    }
}

fn parse_field<T: std::str::FromStr>(entry: &str, field: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| MpfError::Config(format!("invalid codec entry '{}'", entry)))
}

impl Default for CodecManager {
    fn default() -> Self {
        Self::with_default_codecs()
    }
}
